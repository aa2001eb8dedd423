use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::{Diagnostic, Dynamic};

/// Marks an attribute as requiring replacement when its configured value changes.
///
/// Computed values the user did not configure never force replacement, so an
/// optional+computed ForceNew attribute only replaces on an explicit change.
pub struct RequiresReplaceIfChanged;

impl PlanModifier for RequiresReplaceIfChanged {
    fn description(&self) -> String {
        "requires replacement when the value changes".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let requires_replace = !request.state_value.is_null()
            && !request.config_value.is_null()
            && !values_equal(&request.state_value, &request.plan_value);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Uses the prior state value when the planned value is unknown
///
/// Useful for computed attributes that never change after create, such as
/// ids and creation timestamps.
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "keeps the prior state value while the planned value is unknown".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = match (&request.plan_value, &request.state_value) {
            (Dynamic::Unknown, state) if !state.is_null() => state.clone(),
            _ => request.plan_value,
        };

        PlanModifierResponse::unchanged(plan_value)
    }
}

pub struct RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync,
{
    predicate: F,
    description: String,
}

impl<F> RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync,
{
    pub fn new(predicate: F, description: impl Into<String>) -> Self {
        Self {
            predicate,
            description: description.into(),
        }
    }
}

impl<F> PlanModifier for RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync,
{
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let mut diagnostics = vec![];
        let requires_replace = !request.state_value.is_null() && (self.predicate)(&request);

        if requires_replace {
            diagnostics.push(Diagnostic::warning(
                format!("Attribute '{}' requires resource replacement", request.path),
                self.description.clone(),
            ));
        }

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics,
        }
    }
}

/// Compares two values, treating numbers with float tolerance
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;
    use std::collections::HashMap;

    fn request(state: Dynamic, plan: Dynamic, config: Dynamic) -> PlanModifierRequest {
        PlanModifierRequest {
            state_value: state,
            plan_value: plan,
            config_value: config,
            path: AttributePath::new("cidr_block"),
        }
    }

    #[test]
    fn requires_replace_does_not_trigger_on_same_value() {
        let response = RequiresReplaceIfChanged.modify(request(
            Dynamic::from("10.0.0.0/16"),
            Dynamic::from("10.0.0.0/16"),
            Dynamic::from("10.0.0.0/16"),
        ));

        assert!(!response.requires_replace);
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn requires_replace_triggers_on_different_value() {
        let response = RequiresReplaceIfChanged.modify(request(
            Dynamic::from("10.0.0.0/16"),
            Dynamic::from("172.16.0.0/16"),
            Dynamic::from("172.16.0.0/16"),
        ));

        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_triggers_on_unknown_configured_value() {
        let response = RequiresReplaceIfChanged.modify(request(
            Dynamic::from("vpc-aaaa"),
            Dynamic::Unknown,
            Dynamic::Unknown,
        ));

        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_ignores_create_and_unconfigured_computed() {
        let create = RequiresReplaceIfChanged.modify(request(
            Dynamic::Null,
            Dynamic::from("x"),
            Dynamic::from("x"),
        ));
        assert!(!create.requires_replace);

        let computed = RequiresReplaceIfChanged.modify(request(
            Dynamic::from("ap-guangzhou-3"),
            Dynamic::Unknown,
            Dynamic::Null,
        ));
        assert!(!computed.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_prior_value() {
        let response = UseStateForUnknown.modify(request(
            Dynamic::from("2024-01-01 00:00:00"),
            Dynamic::Unknown,
            Dynamic::Null,
        ));
        assert_eq!(response.plan_value, Dynamic::from("2024-01-01 00:00:00"));

        let on_create = UseStateForUnknown.modify(request(
            Dynamic::Null,
            Dynamic::Unknown,
            Dynamic::Null,
        ));
        assert_eq!(on_create.plan_value, Dynamic::Unknown);
    }

    #[test]
    fn requires_replace_if_uses_predicate() {
        let modifier = RequiresReplaceIf::new(
            |req: &PlanModifierRequest| {
                req.state_value.as_number().unwrap_or(0.0) > req.plan_value.as_number().unwrap_or(0.0)
            },
            "ipv4_count can only grow in place",
        );

        let shrink = modifier.modify(request(
            Dynamic::from(4i64),
            Dynamic::from(2i64),
            Dynamic::from(2i64),
        ));
        assert!(shrink.requires_replace);
        assert_eq!(shrink.diagnostics.len(), 1);

        let grow = modifier.modify(request(
            Dynamic::from(2i64),
            Dynamic::from(4i64),
            Dynamic::from(4i64),
        ));
        assert!(!grow.requires_replace);
    }

    #[test]
    fn values_equal_compares_nested_values() {
        let a = Dynamic::Map(HashMap::from([(
            "ips".to_string(),
            Dynamic::string_list(["10.0.0.1"]),
        )]));
        let b = a.clone();
        assert!(values_equal(&a, &b));
        assert!(!values_equal(&a, &Dynamic::Null));
    }
}
