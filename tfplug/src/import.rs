//! Import helpers for simplifying resource import implementations

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Sets the import ID to a specific attribute in state
///
/// The following ReadResource fills in everything else from the ID.
///
/// Example: ID "vpc-2q0xd7ud" -> state.id = "vpc-2q0xd7ud"
pub fn import_state_passthrough_id(
    _ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::empty_object();

    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                format!("Failed to set import ID: {}", e),
                format!(
                    "Could not set attribute '{}' to value '{}'",
                    attr_path, request.id
                ),
            )
            .with_attribute(attr_path),
        );
        return;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
        private: Vec::new(),
    });
}

/// Passthrough import that also rejects IDs without the expected number of
/// `sep`-separated parts, e.g. `"<route_id>.<route_table_id>"`
pub fn import_state_composite_id(
    ctx: &Context,
    sep: &str,
    parts: usize,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let found = request.id.split(sep).filter(|p| !p.is_empty()).count();
    if found != parts {
        response.diagnostics.push(Diagnostic::error(
            "Invalid import ID",
            format!(
                "expected {} parts separated by '{}', got '{}'",
                parts, sep, request.id
            ),
        ));
        return;
    }
    import_state_passthrough_id(ctx, AttributePath::new("id"), request, response);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientCapabilities;

    fn request(id: &str) -> ImportResourceStateRequest {
        ImportResourceStateRequest {
            type_name: "tencentcloud_vpc".to_string(),
            id: id.to_string(),
            client_capabilities: ClientCapabilities::default(),
        }
    }

    fn empty_response() -> ImportResourceStateResponse {
        ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
            deferred: None,
        }
    }

    #[test]
    fn passthrough_sets_id() {
        let mut response = empty_response();
        import_state_passthrough_id(
            &Context::new(),
            AttributePath::new("id"),
            &request("vpc-2q0xd7ud"),
            &mut response,
        );

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.imported_resources.len(), 1);
        let imported = &response.imported_resources[0];
        assert_eq!(imported.type_name, "tencentcloud_vpc");
        assert_eq!(
            imported.state.get_string(&AttributePath::new("id")).unwrap(),
            "vpc-2q0xd7ud"
        );
    }

    #[test]
    fn composite_id_rejects_wrong_arity() {
        let mut response = empty_response();
        import_state_composite_id(&Context::new(), "#", 2, &request("havip-1"), &mut response);

        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics.len(), 1);

        let mut response = empty_response();
        import_state_composite_id(
            &Context::new(),
            "#",
            2,
            &request("havip-1#1.1.1.1"),
            &mut response,
        );
        assert_eq!(response.imported_resources.len(), 1);
    }
}
