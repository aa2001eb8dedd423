//! HA VIP EIP attachment resource implementation

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
use tfplug::validator::Ipv4Validator;

use super::common::{
    api_error, extract_provider_data, id_attribute, path, require_client, required_string,
    state_id, Outcome,
};
use crate::api::Client;
use crate::ids::{self, ATTACHMENT_SEP};

fn parse_attachment_id(id: &str) -> Outcome<(String, String)> {
    let mut parts = ids::split(id, ATTACHMENT_SEP, 2)
        .map_err(|e| Diagnostic::error("Invalid HA VIP attachment id", e.to_string()))?;
    let address_ip = parts.pop().unwrap_or_default();
    let ha_vip_id = parts.pop().unwrap_or_default();
    Ok((ha_vip_id, address_ip))
}

#[derive(Default)]
pub struct HaVipEipAttachmentResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl HaVipEipAttachmentResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for HaVipEipAttachmentResource {
    fn type_name(&self) -> &str {
        "tencentcloud_ha_vip_eip_attachment"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to create a HA VIP EIP attachment.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("havip_id", AttributeType::String)
                    .description("ID of the attached HA VIP.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("address_ip", AttributeType::String)
                    .description("Public address of the EIP.")
                    .required()
                    .force_new()
                    .validator(Ipv4Validator::create())
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
                tracing::warn!(log_id = %ctx.log_id(), "ha vip eip attachment not found, removing from state");
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
            let (ha_vip_id, _) = parse_attachment_id(&state_id(&request.prior_state)?)?;
            client
                .ha_vips()
                .disassociate_address(&ha_vip_id)
                .await
                .map_err(api_error("Failed to detach EIP from HA VIP"))
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

impl HaVipEipAttachmentResource {
    async fn create_attachment(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let ha_vip_id = required_string(planned, "havip_id")?;
        let address_ip = required_string(planned, "address_ip")?;

        client
            .ha_vips()
            .associate_address(&ha_vip_id, &address_ip)
            .await
            .map_err(api_error("Failed to attach EIP to HA VIP"))?;

        let id = ids::join(&[&ha_vip_id, &address_ip], ATTACHMENT_SEP);
        let _ = state.set_string(&path("id"), id.clone());

        if !self.read_attachment(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read HA VIP attachment",
                format!("HA VIP attachment [{}] not found after create", id),
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
        let (ha_vip_id, address_ip) = parse_attachment_id(id)?;

        let Some(vip) = client
            .ha_vips()
            .describe_by_id(&ha_vip_id)
            .await
            .map_err(api_error("Failed to read HA VIP attachment"))?
        else {
            return Ok(false);
        };
        if vip.address_ip != address_ip {
            return Ok(false);
        }

        let _ = state.set_string(&path("id"), id.to_string());
        let _ = state.set_string(&path("havip_id"), ha_vip_id);
        let _ = state.set_string(&path("address_ip"), address_ip);

        Ok(true)
    }
}

#[async_trait]
impl ResourceWithImportState for HaVipEipAttachmentResource {
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
impl ResourceWithConfigure for HaVipEipAttachmentResource {
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
