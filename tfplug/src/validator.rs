//! Built-in attribute validators
//!
//! Validators only see known, non-null values. The server skips null and
//! unknown configuration before calling them.

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};
use std::net::Ipv4Addr;

fn error(request: &ValidatorRequest, summary: String, detail: String) -> ValidatorResponse {
    ValidatorResponse {
        diagnostics: vec![Diagnostic::error(summary, detail).with_attribute(request.path.clone())],
    }
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl StringLengthValidator {
    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn at_most(max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: None,
            max: Some(max),
        })
    }
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        format!(
            "string length between {} and {}",
            self.min.unwrap_or(0),
            self.max.map(|m| m.to_string()).unwrap_or_else(|| "unbounded".into())
        )
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.as_str() else {
            return ValidatorResponse::default();
        };
        let len = s.chars().count();
        if let Some(min) = self.min {
            if len < min {
                return error(
                    &request,
                    format!("{} must have minimum length of {}", request.path, min),
                    format!("Got length {}", len),
                );
            }
        }
        if let Some(max) = self.max {
            if len > max {
                return error(
                    &request,
                    format!("{} must have maximum length of {}", request.path, max),
                    format!("Got length {}", len),
                );
            }
        }
        ValidatorResponse::default()
    }
}

/// Accepts only the listed strings
pub struct StringOneOfValidator {
    pub values: Vec<String>,
}

impl StringOneOfValidator {
    pub fn create(values: &[&str]) -> Box<dyn Validator> {
        Box::new(Self {
            values: values.iter().map(|v| v.to_string()).collect(),
        })
    }
}

impl Validator for StringOneOfValidator {
    fn description(&self) -> String {
        format!("one of [{}]", self.values.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match request.config_value.as_str() {
            Some(s) if !self.values.iter().any(|v| v == s) => error(
                &request,
                format!("{} must be {}", request.path, self.description()),
                format!("Got '{}'", s),
            ),
            _ => ValidatorResponse::default(),
        }
    }
}

/// Accepts only the listed integers
pub struct IntOneOfValidator {
    pub values: Vec<i64>,
}

impl IntOneOfValidator {
    pub fn create(values: &[i64]) -> Box<dyn Validator> {
        Box::new(Self {
            values: values.to_vec(),
        })
    }
}

impl Validator for IntOneOfValidator {
    fn description(&self) -> String {
        let values: Vec<String> = self.values.iter().map(i64::to_string).collect();
        format!("one of [{}]", values.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match request.config_value.as_number() {
            Some(n) if n.fract() != 0.0 || !self.values.contains(&(n as i64)) => error(
                &request,
                format!("{} must be {}", request.path, self.description()),
                format!("Got {}", n),
            ),
            _ => ValidatorResponse::default(),
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRangeValidator {
    pub fn between(min: f64, max: f64) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        format!("number between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(n) = request.config_value.as_number() else {
            return ValidatorResponse::default();
        };
        if let Some(min) = self.min {
            if n < min {
                return error(
                    &request,
                    format!("{} must be at least {}", request.path, min),
                    format!("Got {}", n),
                );
            }
        }
        if let Some(max) = self.max {
            if n > max {
                return error(
                    &request,
                    format!("{} must be at most {}", request.path, max),
                    format!("Got {}", n),
                );
            }
        }
        ValidatorResponse::default()
    }
}

pub struct StringPatternValidator {
    pub pattern: regex::Regex,
    pub description: String,
}

impl StringPatternValidator {
    pub fn create(pattern: regex::Regex, description: &str) -> Box<dyn Validator> {
        Box::new(Self {
            pattern,
            description: description.to_string(),
        })
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match request.config_value.as_str() {
            Some(s) if !self.pattern.is_match(s) => error(
                &request,
                format!("{} must match {}", request.path, self.description),
                format!("Value '{}' does not match pattern", s),
            ),
            _ => ValidatorResponse::default(),
        }
    }
}

/// Parses `a.b.c.d/n` with a prefix length of at most 32
pub fn parse_cidr(value: &str) -> Option<(Ipv4Addr, u8)> {
    let (ip, prefix) = value.split_once('/')?;
    let ip: Ipv4Addr = ip.parse().ok()?;
    let prefix: u8 = prefix.parse().ok()?;
    (prefix <= 32).then_some((ip, prefix))
}

/// Accepts IPv4 CIDR blocks such as `10.0.0.0/16`
pub struct CidrValidator;

impl CidrValidator {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for CidrValidator {
    fn description(&self) -> String {
        "IPv4 CIDR block".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match request.config_value.as_str() {
            Some(s) if parse_cidr(s).is_none() => error(
                &request,
                format!("{} must be a valid CIDR block", request.path),
                format!("'{}' is not of the form a.b.c.d/n", s),
            ),
            _ => ValidatorResponse::default(),
        }
    }
}

pub struct Ipv4Validator;

impl Ipv4Validator {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for Ipv4Validator {
    fn description(&self) -> String {
        "IPv4 address".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match request.config_value {
            Dynamic::String(s) if s.parse::<Ipv4Addr>().is_err() => error(
                &request,
                format!("{} must be a valid IPv4 address", request.path),
                format!("Got '{}'", s),
            ),
            Dynamic::List(items) => {
                let bad: Vec<&str> = items
                    .iter()
                    .filter_map(Dynamic::as_str)
                    .filter(|s| s.parse::<Ipv4Addr>().is_err())
                    .collect();
                if bad.is_empty() {
                    ValidatorResponse::default()
                } else {
                    error(
                        &request,
                        format!("{} must contain valid IPv4 addresses", request.path),
                        format!("Invalid: {}", bad.join(", ")),
                    )
                }
            }
            _ => ValidatorResponse::default(),
        }
    }
}

/// Bounds the number of elements of a list, set or map
pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl ListLengthValidator {
    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn at_least(min: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: None,
        })
    }

    pub fn at_most(max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: None,
            max: Some(max),
        })
    }
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        format!("collection length between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let len = match request.config_value {
            Dynamic::List(items) => items.len(),
            Dynamic::Map(items) => items.len(),
            _ => return ValidatorResponse::default(),
        };
        if let Some(min) = self.min {
            if len < min {
                return error(
                    &request,
                    format!("{} must have at least {} items", request.path, min),
                    format!("Got {} items", len),
                );
            }
        }
        if let Some(max) = self.max {
            if len > max {
                return error(
                    &request,
                    format!("{} must have at most {} items", request.path, max),
                    format!("Got {} items", len),
                );
            }
        }
        ValidatorResponse::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;

    fn run(validator: &dyn Validator, value: Dynamic) -> Vec<Diagnostic> {
        validator
            .validate(ValidatorRequest {
                config_value: &value,
                path: AttributePath::new("field"),
            })
            .diagnostics
    }

    #[test]
    fn string_length_counts_characters() {
        let validator = StringLengthValidator::between(1, 3);

        assert!(run(validator.as_ref(), Dynamic::from("私有网")).is_empty());
        assert!(run(validator.as_ref(), Dynamic::from("")).len() == 1);
        let diags = run(validator.as_ref(), Dynamic::from("abcd"));
        assert!(diags[0].summary.contains("maximum length"));
        assert_eq!(diags[0].attribute, Some(AttributePath::new("field")));
    }

    #[test]
    fn string_one_of_rejects_unknown_choice() {
        let validator = StringOneOfValidator::create(&["ingress", "egress"]);

        assert!(run(validator.as_ref(), Dynamic::from("egress")).is_empty());
        let diags = run(validator.as_ref(), Dynamic::from("inbound"));
        assert_eq!(diags.len(), 1);
        assert!(diags[0].summary.contains("ingress, egress"));
    }

    #[test]
    fn int_one_of_checks_integral_values() {
        let validator = IntOneOfValidator::create(&[20, 50, 100]);

        assert!(run(validator.as_ref(), Dynamic::from(50i64)).is_empty());
        assert_eq!(run(validator.as_ref(), Dynamic::from(30i64)).len(), 1);
        assert_eq!(run(validator.as_ref(), Dynamic::Number(50.5)).len(), 1);
    }

    #[test]
    fn number_range_rejects_out_of_range() {
        let validator = NumberRangeValidator::between(1.0, 30.0);

        assert!(run(validator.as_ref(), Dynamic::from(30i64)).is_empty());
        let diags = run(validator.as_ref(), Dynamic::from(0i64));
        assert!(diags[0].summary.contains("at least"));
    }

    #[test]
    fn cidr_validator() {
        let validator = CidrValidator::create();

        assert!(run(validator.as_ref(), Dynamic::from("10.0.0.0/16")).is_empty());
        assert_eq!(run(validator.as_ref(), Dynamic::from("10.0.0.0/33")).len(), 1);
        assert_eq!(run(validator.as_ref(), Dynamic::from("10.0.0.0")).len(), 1);
        assert_eq!(parse_cidr("192.168.1.0/24").unwrap().1, 24);
    }

    #[test]
    fn ipv4_validator_accepts_lists() {
        let validator = Ipv4Validator::create();

        assert!(run(validator.as_ref(), Dynamic::from("119.29.29.29")).is_empty());
        let diags = run(
            validator.as_ref(),
            Dynamic::string_list(["1.1.1.1", "dns.example"]),
        );
        assert_eq!(diags.len(), 1);
        assert!(diags[0].detail.contains("dns.example"));
    }

    #[test]
    fn pattern_validator() {
        let validator = StringPatternValidator::create(
            regex::Regex::new(r"^(\d{1,5},)*\d{1,5}$|^\d{1,5}-\d{1,5}$").unwrap(),
            "port range",
        );

        assert!(run(validator.as_ref(), Dynamic::from("80,443")).is_empty());
        assert!(run(validator.as_ref(), Dynamic::from("8000-9000")).is_empty());
        assert_eq!(run(validator.as_ref(), Dynamic::from("80-")).len(), 1);
    }

    #[test]
    fn list_length_validator() {
        let validator = ListLengthValidator::at_most(2);

        assert!(run(validator.as_ref(), Dynamic::string_list(["a", "b"])).is_empty());
        assert_eq!(
            run(validator.as_ref(), Dynamic::string_list(["a", "b", "c"])).len(),
            1
        );
    }
}
