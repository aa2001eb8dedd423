//! Generated types for the Terraform Plugin Protocol v6.
//!
//! Names collide with the framework types (`DynamicValue`, `Diagnostic`,
//! `Schema`), so callers refer to these through the `proto::` prefix.

#![allow(clippy::all)]

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::{Provider as ProviderService, ProviderServer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_types_are_generated() {
        let _ = diagnostic::Severity::Error;
        let _ = attribute_path::step::Selector::AttributeName("vpc_id".to_string());
        let _ = schema::nested_block::NestingMode::Set;
        let _ = deferred::Reason::ResourceConfigUnknown;
    }

    #[test]
    fn request_response_types_are_generated() {
        let _ = get_provider_schema::Response::default();
        let _ = plan_resource_change::Request::default();
        let _ = apply_resource_change::Response::default();
        let _ = import_resource_state::ImportedResource::default();
    }
}
