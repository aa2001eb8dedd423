//! Bandwidth package attachment resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_composite_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

use super::common::{
    api_error, extract_provider_data, id_attribute, path, require_client, required_string,
    state_id, Outcome,
};
use crate::api::bandwidth_package::BandwidthPackageResourcesRequest;
use crate::api::Client;
use crate::ids::{self, ATTACHMENT_SEP};

fn parse_attachment_id(id: &str) -> Outcome<(String, String)> {
    let mut parts = ids::split(id, ATTACHMENT_SEP, 2)
        .map_err(|e| Diagnostic::error("Invalid bandwidth package attachment id", e.to_string()))?;
    let resource_id = parts.pop().unwrap_or_default();
    let bwp_id = parts.pop().unwrap_or_default();
    Ok((bwp_id, resource_id))
}

#[derive(Default)]
pub struct VpcBandwidthPackageAttachmentResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl VpcBandwidthPackageAttachmentResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for VpcBandwidthPackageAttachmentResource {
    fn type_name(&self) -> &str {
        "tencentcloud_vpc_bandwidth_package_attachment"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to attach an EIP or load balancer to a bandwidth package.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("bandwidth_package_id", AttributeType::String)
                    .description("Bandwidth package unique ID, in the form of `bwp-xxxx`.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_id", AttributeType::String)
                    .description("The resource ID to add, such as `eip-xxxx` or `lb-xxxx`.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("network_type", AttributeType::String)
                    .description("Bandwidth packet type, such as `BGP`, `HIGH_QUALITY_BGP` or `ANYCAST`.")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .description("Bandwidth packet protocol type. Currently supports `ipv4` and `ipv6`.")
                    .optional()
                    .force_new()
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
                tracing::warn!(log_id = %ctx.log_id(), "bandwidth package attachment not found, removing from state");
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
            let (bwp_id, resource_id) = parse_attachment_id(&state_id(&request.prior_state)?)?;
            client
                .bandwidth_packages()
                .remove_resources(&BandwidthPackageResourcesRequest::new(&bwp_id, &resource_id))
                .await
                .map_err(api_error("Failed to remove resource from bandwidth package"))
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

impl VpcBandwidthPackageAttachmentResource {
    async fn create_attachment(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let bwp_id = required_string(planned, "bandwidth_package_id")?;
        let resource_id = required_string(planned, "resource_id")?;

        let mut request = BandwidthPackageResourcesRequest::new(&bwp_id, &resource_id);
        request.network_type = planned.get_string_opt(&path("network_type"));
        request.protocol = planned.get_string_opt(&path("protocol"));

        client
            .bandwidth_packages()
            .add_resources(&request)
            .await
            .map_err(api_error("Failed to add resource to bandwidth package"))?;

        let id = ids::join(&[&bwp_id, &resource_id], ATTACHMENT_SEP);
        let _ = state.set_string(&path("id"), id.clone());

        if !self.read_attachment(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read bandwidth package attachment",
                format!("bandwidth package attachment [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_attachment(
        &self,
        client: &Client,
        id: &str,
        state: &mut DynamicValue,
    ) -> Outcome<bool> {
        let (bwp_id, resource_id) = parse_attachment_id(id)?;

        let Some(resource) = client
            .bandwidth_packages()
            .describe_resource(&bwp_id, &resource_id)
            .await
            .map_err(api_error("Failed to read bandwidth package attachment"))?
        else {
            return Ok(false);
        };

        let _ = state.set_string(&path("id"), id.to_string());
        let _ = state.set_string(&path("bandwidth_package_id"), bwp_id);
        let _ = state.set_string(&path("resource_id"), resource.resource_id);

        Ok(true)
    }
}

#[async_trait]
impl ResourceWithImportState for VpcBandwidthPackageAttachmentResource {
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
        import_state_composite_id(&ctx, ATTACHMENT_SEP, 2, &request, &mut response);
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for VpcBandwidthPackageAttachmentResource {
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
    fn attachment_id_parts() {
        assert_eq!(
            parse_attachment_id("bwp-1#eip-2").unwrap(),
            ("bwp-1".to_string(), "eip-2".to_string())
        );
        assert!(parse_attachment_id("bwp-1#").is_err());
    }
}
