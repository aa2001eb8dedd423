//! `ACTION#CIDR#PORT#PROTOCOL` rule strings of security group lite rules
//! and network ACLs

use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tfplug::schema::{Validator, ValidatorRequest, ValidatorResponse};
use tfplug::types::{Diagnostic, Dynamic};
use tfplug::validator::parse_cidr;

static PORT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,5},)*\d{1,5}$|^\d{1,5}-\d{1,5}$").expect("port range pattern")
});

/// `ALL`, a single port, a comma list or a dash range
pub fn valid_port_range(port_range: &str) -> bool {
    port_range == "ALL" || PORT_RANGE.is_match(port_range)
}

#[derive(Debug, Error, PartialEq)]
pub enum RuleError {
    #[error("invalid {1} rule {0}")]
    Format(String, &'static str),

    #[error("invalid action {0}, allow action is `ACCEPT` or `DROP`")]
    Action(String),

    #[error("invalid cidr_ip {0}, allow cidr_ip format is `8.8.8.8` or `10.0.1.0/24`")]
    Cidr(String),

    #[error("invalid port {0}, allow port format is `ALL`, `53`, `80,443` or `80-90`")]
    Port(String),

    #[error("invalid protocol {0}, allow protocol is `ALL`, `TCP`, `UDP` or `ICMP`")]
    Protocol(String),

    #[error("when protocol is {0}, port must be ALL")]
    PortNotAll(String),
}

/// One parsed rule. `port` is empty for `ALL` and `ICMP`, which is how the
/// API wants it sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiteRule {
    pub action: String,
    pub cidr_ip: String,
    pub port: String,
    pub protocol: String,
}

impl LiteRule {
    /// `kind` only names the rule family in the format error
    pub fn parse(rule: &str, kind: &'static str) -> Result<Self, RuleError> {
        let parts: Vec<&str> = rule.split('#').collect();
        let [action, cidr_ip, port, protocol] = parts[..] else {
            return Err(RuleError::Format(rule.to_string(), kind));
        };

        if action != "ACCEPT" && action != "DROP" {
            return Err(RuleError::Action(action.to_string()));
        }
        if cidr_ip.parse::<IpAddr>().is_err() && parse_cidr(cidr_ip).is_none() {
            return Err(RuleError::Cidr(cidr_ip.to_string()));
        }
        if !valid_port_range(port) {
            return Err(RuleError::Port(port.to_string()));
        }

        let port = match protocol {
            "ALL" | "ICMP" if port != "ALL" => {
                return Err(RuleError::PortNotAll(protocol.to_string()))
            }
            "ALL" | "ICMP" => "",
            "TCP" | "UDP" => port,
            _ => return Err(RuleError::Protocol(protocol.to_string())),
        };

        Ok(Self {
            action: action.to_string(),
            cidr_ip: cidr_ip.to_string(),
            port: port.to_string(),
            protocol: protocol.to_string(),
        })
    }

    /// Rule as reported by a Describe call; the protocol is upper cased and
    /// a missing port reads as `ALL`
    pub fn from_cloud(action: &str, cidr_ip: &str, port: &str, protocol: &str) -> Self {
        let protocol = protocol.to_uppercase();
        let port = if port.is_empty() || port.eq_ignore_ascii_case("ALL") {
            String::new()
        } else {
            port.to_string()
        };
        Self {
            action: action.to_uppercase(),
            cidr_ip: cidr_ip.to_string(),
            port,
            protocol,
        }
    }
}

impl fmt::Display for LiteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = if self.port.is_empty() { "ALL" } else { &self.port };
        write!(f, "{}#{}#{}#{}", self.action, self.cidr_ip, port, self.protocol)
    }
}

/// Parses every rule of a list, stopping at the first bad one
pub fn parse_rules(rules: &[String], kind: &'static str) -> Result<Vec<LiteRule>, RuleError> {
    rules.iter().map(|rule| LiteRule::parse(rule, kind)).collect()
}

/// Rejects list elements that are not well formed rule strings. Unknown
/// elements are left for apply time.
pub struct RuleListValidator {
    kind: &'static str,
}

impl RuleListValidator {
    pub fn create(kind: &'static str) -> Box<dyn Validator> {
        Box::new(Self { kind })
    }
}

impl Validator for RuleListValidator {
    fn description(&self) -> String {
        format!("every element is an {} rule `ACTION#CIDR#PORT#PROTOCOL`", self.kind)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::List(items) = request.config_value else {
            return ValidatorResponse::default();
        };
        let diagnostics = items
            .iter()
            .filter_map(|item| match item {
                Dynamic::String(rule) => LiteRule::parse(rule, self.kind).err(),
                _ => None,
            })
            .map(|e| {
                Diagnostic::error(format!("Invalid {}", request.path), e.to_string())
                    .with_attribute(request.path.clone())
            })
            .collect();
        ValidatorResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_range_formats() {
        for ok in ["ALL", "80", "80,443", "8000-9000"] {
            assert!(valid_port_range(ok), "{ok} should be valid");
        }
        for bad in ["", "all", "80-", "80;443", "123456"] {
            assert!(!valid_port_range(bad), "{bad} should be invalid");
        }
    }

    #[test]
    fn parses_tcp_and_clears_port_for_all() {
        let rule = LiteRule::parse("ACCEPT#10.0.0.0/16#80,443#TCP", "security group").unwrap();
        assert_eq!(rule.port, "80,443");
        assert_eq!(rule.to_string(), "ACCEPT#10.0.0.0/16#80,443#TCP");

        let rule = LiteRule::parse("DROP#1.1.1.1#ALL#ICMP", "acl").unwrap();
        assert_eq!(rule.port, "");
        assert_eq!(rule.to_string(), "DROP#1.1.1.1#ALL#ICMP");
    }

    #[test]
    fn rejects_each_bad_part() {
        let parse = |rule: &str| LiteRule::parse(rule, "acl").unwrap_err();
        assert_eq!(
            parse("ACCEPT#10.0.0.0/16#80"),
            RuleError::Format("ACCEPT#10.0.0.0/16#80".to_string(), "acl")
        );
        assert!(parse("ACCEPT#10.0.0.0/16#80").to_string().contains("invalid acl rule"));
        assert!(matches!(parse("ALLOW#10.0.0.0/16#80#TCP"), RuleError::Action(_)));
        assert!(matches!(parse("ACCEPT#10.0.0#80#TCP"), RuleError::Cidr(_)));
        assert!(matches!(parse("ACCEPT#10.0.0.0/16#http#TCP"), RuleError::Port(_)));
        assert!(matches!(parse("ACCEPT#10.0.0.0/16#80#GRE"), RuleError::Protocol(_)));
        assert!(matches!(parse("ACCEPT#10.0.0.0/16#80#ICMP"), RuleError::PortNotAll(_)));
    }

    #[test]
    fn cloud_rules_print_like_configured_ones() {
        let rule = LiteRule::from_cloud("accept", "10.0.0.0/16", "ALL", "all");
        assert_eq!(rule.to_string(), "ACCEPT#10.0.0.0/16#ALL#ALL");
        assert_eq!(rule, LiteRule::parse("ACCEPT#10.0.0.0/16#ALL#ALL", "acl").unwrap());

        let rule = LiteRule::from_cloud("DROP", "0.0.0.0/0", "22", "tcp");
        assert_eq!(rule.to_string(), "DROP#0.0.0.0/0#22#TCP");
    }

    #[test]
    fn list_validator_reports_each_bad_rule() {
        let value = Dynamic::List(vec![
            Dynamic::String("ACCEPT#10.0.0.0/16#ALL#ALL".to_string()),
            Dynamic::String("DROP#10.0.0.0/16#80#GRE".to_string()),
            Dynamic::Unknown,
            Dynamic::String("bad".to_string()),
        ]);
        let response = RuleListValidator::create("acl").validate(ValidatorRequest {
            config_value: &value,
            path: tfplug::types::AttributePath::new("ingress"),
        });
        assert_eq!(response.diagnostics.len(), 2);
        assert!(response.diagnostics[1].detail.contains("invalid acl rule bad"));
    }
}
