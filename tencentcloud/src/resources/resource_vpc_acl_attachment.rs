//! Network ACL subnet attachment resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::ListLengthValidator;

use super::common::{
    api_error, extract_provider_data, id_attribute, path, require_client, required_string,
    state_id, Outcome,
};
use crate::api::Client;
use crate::ids::{self, ATTACHMENT_SEP};

/// `acl-xxx#subnet-a#subnet-b` into the ACL id and its subnets
fn parse_attachment_id(id: &str) -> Outcome<(String, Vec<String>)> {
    let mut parts = id.split(ATTACHMENT_SEP);
    let acl_id = parts.next().unwrap_or_default().to_string();
    let subnet_ids: Vec<String> = parts.map(str::to_string).collect();
    if acl_id.is_empty() || subnet_ids.is_empty() || subnet_ids.iter().any(String::is_empty) {
        return Err(Diagnostic::error(
            "Invalid network ACL attachment id",
            format!("expected [acl_id]{0}[subnet_id]{0}..., got {1}", ATTACHMENT_SEP, id),
        ));
    }
    Ok((acl_id, subnet_ids))
}

#[derive(Default)]
pub struct VpcAclAttachmentResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl VpcAclAttachmentResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for VpcAclAttachmentResource {
    fn type_name(&self) -> &str {
        "tencentcloud_vpc_acl_attachment"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provide a resource to attach an existing subnet to Network ACL.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("acl_id", AttributeType::String)
                    .description("ID of the attached ACL.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subnet_ids", AttributeType::list_of(AttributeType::String))
                    .description("The Subnet instance ID list.")
                    .required()
                    .force_new()
                    .validator(ListLengthValidator::at_least(1))
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let Some(client) = require_client(&self.provider_data, &mut diagnostics) else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics,
            };
        };

        let mut state = request.planned_state.clone();
        if let Err(diag) = self.create_attachment(client, &request.planned_state, &mut state).await {
            diagnostics.push(diag);
        }

        CreateResourceResponse {
            new_state: state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let Some(client) = require_client(&self.provider_data, &mut diagnostics) else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics,
                private: request.private,
                deferred: None,
            };
        };

        let mut state = request.current_state.clone();
        let result = match state_id(&state) {
            Ok(id) => self.read_attachment(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "network acl attachment not found, removing from state");
                None
            }
            Err(diag) => {
                diagnostics.push(diag);
                Some(request.current_state)
            }
        };

        ReadResourceResponse {
            new_state,
            diagnostics,
            private: request.private,
            deferred: None,
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let Some(client) = require_client(&self.provider_data, &mut diagnostics) else {
            return DeleteResourceResponse { diagnostics };
        };

        let result = async {
            let (acl_id, subnet_ids) = parse_attachment_id(&state_id(&request.prior_state)?)?;
            client
                .network_acls()
                .disassociate_subnets(&acl_id, &subnet_ids)
                .await
                .map_err(api_error("Failed to detach subnets from network ACL"))
        }
        .await;
        if let Err(diag) = result {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

impl VpcAclAttachmentResource {
    async fn create_attachment(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let acl_id = required_string(planned, "acl_id")?;
        let subnet_ids = planned.get_string_list(&path("subnet_ids"));

        client
            .network_acls()
            .associate_subnets(&acl_id, &subnet_ids)
            .await
            .map_err(api_error("Failed to attach subnets to network ACL"))?;

        let mut parts = vec![acl_id.as_str()];
        parts.extend(subnet_ids.iter().map(String::as_str));
        let id = ids::join(&parts, ATTACHMENT_SEP);
        let _ = state.set_string(&path("id"), id.clone());

        if !self.read_attachment(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read network ACL attachment",
                format!("Network ACL attachment [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    /// Keeps the subnets of the id that are still bound to the ACL; gone
    /// when none are
    async fn read_attachment(
        &self,
        client: &Client,
        id: &str,
        state: &mut DynamicValue,
    ) -> Outcome<bool> {
        let (acl_id, subnet_ids) = parse_attachment_id(id)?;

        let Some(acl) = client
            .network_acls()
            .describe_by_id(&acl_id)
            .await
            .map_err(api_error("Failed to read network ACL attachment"))?
        else {
            return Ok(false);
        };
        let bound = acl.subnet_ids();
        let still_bound: Vec<String> = subnet_ids
            .into_iter()
            .filter(|subnet_id| bound.contains(subnet_id))
            .collect();
        if still_bound.is_empty() {
            return Ok(false);
        }

        let _ = state.set_string(&path("id"), id.to_string());
        let _ = state.set_string(&path("acl_id"), acl_id);
        let _ = state.set_string_list(&path("subnet_ids"), still_bound);

        Ok(true)
    }
}

#[async_trait]
impl ResourceWithImportState for VpcAclAttachmentResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
            deferred: None,
        };
        import_state_passthrough_id(&ctx, path("id"), &request, &mut response);
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for VpcAclAttachmentResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];
        self.provider_data =
            extract_provider_data(request.provider_data, "resource", &mut diagnostics);
        ConfigureResourceResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_id_carries_every_subnet() {
        assert_eq!(
            parse_attachment_id("acl-1#subnet-1#subnet-2").unwrap(),
            (
                "acl-1".to_string(),
                vec!["subnet-1".to_string(), "subnet-2".to_string()]
            )
        );
        assert!(parse_attachment_id("acl-1").is_err());
        assert!(parse_attachment_id("acl-1##subnet-2").is_err());
    }
}
