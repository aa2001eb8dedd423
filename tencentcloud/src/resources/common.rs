//! Helpers shared by resources and data sources

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use crate::api::{ApiError, Client};
use crate::rules::{parse_rules, LiteRule};
use crate::tags;
use crate::TencentCloudProviderData;

pub(crate) type Outcome<T> = Result<T, Diagnostic>;

pub(crate) fn path(name: &str) -> AttributePath {
    AttributePath::new(name)
}

/// Downcasts the data handed over by `ConfigureProvider`
pub(crate) fn extract_provider_data(
    data: Option<Arc<dyn Any + Send + Sync>>,
    kind: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<TencentCloudProviderData> {
    let Some(data) = data else {
        tracing::warn!("no provider data provided to {}", kind);
        diagnostics.push(Diagnostic::error(
            "No provider data",
            format!("No provider data was provided to the {}", kind),
        ));
        return None;
    };

    match data.downcast_ref::<TencentCloudProviderData>() {
        Some(provider_data) => Some(provider_data.clone()),
        None => {
            tracing::error!("failed to downcast provider data to TencentCloudProviderData");
            diagnostics.push(Diagnostic::error(
                "Invalid provider data",
                "Failed to extract TencentCloudProviderData from provider data",
            ));
            None
        }
    }
}

pub(crate) fn require_client<'a>(
    provider_data: &'a Option<TencentCloudProviderData>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<&'a Client> {
    match provider_data {
        Some(data) => Some(data.client.as_ref()),
        None => {
            diagnostics.push(Diagnostic::error(
                "Provider not configured",
                "Provider data was not properly configured",
            ));
            None
        }
    }
}

/// `map_err` adapter turning an API failure into an error diagnostic
pub(crate) fn api_error(summary: &'static str) -> impl FnOnce(ApiError) -> Diagnostic {
    move |e| Diagnostic::error(summary, format!("API error: {}", e))
}

pub(crate) fn state_id(state: &DynamicValue) -> Outcome<String> {
    state
        .get_string_opt(&path("id"))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Diagnostic::error("Missing id", "The resource state has no id"))
}

pub(crate) fn required_string(value: &DynamicValue, name: &str) -> Outcome<String> {
    value.get_string_opt(&path(name)).ok_or_else(|| {
        Diagnostic::error(
            format!("Missing {}", name),
            format!("The '{}' attribute is required", name),
        )
        .with_attribute(path(name))
    })
}

/// True when the planned value of `name` differs from the prior state
pub(crate) fn changed(prior: &DynamicValue, planned: &DynamicValue, name: &str) -> bool {
    prior.get(&path(name)) != planned.get(&path(name))
}

pub(crate) fn id_attribute() -> Attribute {
    AttributeBuilder::new("id", AttributeType::String)
        .description("ID of the resource.")
        .computed()
        .plan_modifier(Box::new(UseStateForUnknown))
        .build()
}

pub(crate) fn tags_attribute() -> Attribute {
    AttributeBuilder::new("tags", AttributeType::map_of(AttributeType::String))
        .description("Tags of the resource.")
        .optional()
        .build()
}

pub(crate) fn create_time_attribute(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description("Creation time of the resource.")
        .computed()
        .plan_modifier(Box::new(UseStateForUnknown))
        .build()
}

/// Sets tags on a freshly created resource through the tag service
pub(crate) async fn apply_tags(
    client: &Client,
    resource_type: &str,
    id: &str,
    tags: &HashMap<String, String>,
) -> Outcome<()> {
    if tags.is_empty() {
        return Ok(());
    }
    let name = tags::resource_name("vpc", resource_type, client.region(), id);
    client
        .tags()
        .modify_tags(&name, tags, &[])
        .await
        .map_err(api_error("Failed to set tags"))
}

/// Pushes the tag diff between prior and planned state
pub(crate) async fn update_tags(
    client: &Client,
    resource_type: &str,
    id: &str,
    prior: &DynamicValue,
    planned: &DynamicValue,
) -> Outcome<()> {
    update_service_tags(client, "vpc", resource_type, id, prior, planned).await
}

/// [`update_tags`] for resources tagged under another service, such as EIPs
/// under `cvm`
pub(crate) async fn update_service_tags(
    client: &Client,
    service: &str,
    resource_type: &str,
    id: &str,
    prior: &DynamicValue,
    planned: &DynamicValue,
) -> Outcome<()> {
    if !changed(prior, planned, "tags") {
        return Ok(());
    }
    let (replace, delete) = tags::diff(
        &prior.get_string_map(&path("tags")),
        &planned.get_string_map(&path("tags")),
    );
    let name = tags::resource_name(service, resource_type, client.region(), id);
    client
        .tags()
        .modify_tags(&name, &replace, &delete)
        .await
        .map_err(api_error("Failed to update tags"))
}

/// Reads tags from the tag service for resources whose Describe call does
/// not return them
pub(crate) async fn read_tags(
    client: &Client,
    resource_type: &str,
    id: &str,
) -> Outcome<HashMap<String, String>> {
    client
        .tags()
        .describe_tags("vpc", resource_type, id)
        .await
        .map_err(api_error("Failed to read tags"))
}

pub(crate) fn set_tags(state: &mut DynamicValue, tags: HashMap<String, String>) {
    let _ = state.set_string_map(&path("tags"), tags);
}

/// Optional list attribute that reads back as null when the cloud has none
pub(crate) fn set_optional_list(state: &mut DynamicValue, name: &str, items: Vec<String>) {
    if items.is_empty() {
        let _ = state.set_null(&path(name));
    } else {
        let _ = state.set_string_list(&path(name), items);
    }
}

/// Parses a rule list attribute into its rules
pub(crate) fn rule_list(
    value: &DynamicValue,
    name: &str,
    kind: &'static str,
) -> Outcome<Vec<LiteRule>> {
    parse_rules(&value.get_string_list(&path(name)), kind).map_err(|e| {
        Diagnostic::error(format!("Invalid {} rule", kind), e.to_string())
            .with_attribute(path(name))
    })
}
