//! HA VIP resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{Ipv4Validator, StringLengthValidator};

use super::common::{
    api_error, changed, create_time_attribute, extract_provider_data, id_attribute, path,
    require_client, required_string, state_id, Outcome,
};
use crate::api::ha_vip::CreateHaVipRequest;
use crate::api::Client;

fn computed_string(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .computed()
        .build()
}

#[derive(Default)]
pub struct HaVipResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl HaVipResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for HaVipResource {
    fn type_name(&self) -> &str {
        "tencentcloud_ha_vip"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to create a HA VIP.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("VPC ID.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subnet_id", AttributeType::String)
                    .description("Subnet ID.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the HA VIP. The length of character is limited to 1-60.")
                    .required()
                    .validator(StringLengthValidator::between(1, 60))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vip", AttributeType::String)
                    .description("Virtual IP address, it must not be occupied and in this VPC network segment. If not set, it will be assigned after resource created automatically.")
                    .optional()
                    .computed()
                    .force_new()
                    .validator(Ipv4Validator::create())
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(computed_string("state", "State of the HA VIP. Valid value: `AVAILABLE`, `UNBIND`."))
            .attribute(computed_string("network_interface_id", "Instance ID that is associated."))
            .attribute(computed_string("instance_id", "Instance ID that is associated."))
            .attribute(computed_string("address_ip", "EIP that is associated."))
            .attribute(create_time_attribute("create_time"))
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
        if let Err(diag) = self.create_ha_vip(client, &request.planned_state, &mut state).await {
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
            Ok(id) => self.read_ha_vip(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "ha vip not found, removing from state");
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
        let mut diagnostics = vec![];

        let Some(client) = require_client(&self.provider_data, &mut diagnostics) else {
            return UpdateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics,
            };
        };

        let mut state = request.planned_state.clone();
        if let Err(diag) = self
            .update_ha_vip(client, &request.prior_state, &request.planned_state, &mut state)
            .await
        {
            diagnostics.push(diag);
            state = request.prior_state;
        }

        UpdateResourceResponse {
            new_state: state,
            private: vec![],
            diagnostics,
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let Some(client) = require_client(&self.provider_data, &mut diagnostics) else {
            return DeleteResourceResponse { diagnostics };
        };

        let result = match state_id(&request.prior_state) {
            Ok(id) => client
                .ha_vips()
                .delete(&id)
                .await
                .map_err(api_error("Failed to delete HA VIP")),
            Err(diag) => Err(diag),
        };
        if let Err(diag) = result {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

impl HaVipResource {
    async fn create_ha_vip(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let request = CreateHaVipRequest {
            vpc_id: required_string(planned, "vpc_id")?,
            subnet_id: required_string(planned, "subnet_id")?,
            ha_vip_name: required_string(planned, "name")?,
            vip: planned.get_string_opt(&path("vip")),
        };

        let vip = client
            .ha_vips()
            .create(&request)
            .await
            .map_err(api_error("Failed to create HA VIP"))?;
        let id = vip.ha_vip_id;
        let _ = state.set_string(&path("id"), id.clone());

        if !self.read_ha_vip(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read HA VIP",
                format!("HA VIP [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_ha_vip(&self, client: &Client, id: &str, state: &mut DynamicValue) -> Outcome<bool> {
        let Some(vip) = client
            .ha_vips()
            .describe_by_id(id)
            .await
            .map_err(api_error("Failed to read HA VIP"))?
        else {
            return Ok(false);
        };

        let _ = state.set_string(&path("id"), vip.ha_vip_id.clone());
        let _ = state.set_string(&path("name"), vip.ha_vip_name.clone());
        let _ = state.set_string(&path("vpc_id"), vip.vpc_id.clone());
        let _ = state.set_string(&path("subnet_id"), vip.subnet_id.clone());
        let _ = state.set_string(&path("vip"), vip.vip.clone());
        let _ = state.set_string(&path("state"), vip.state.clone());
        let _ = state.set_string(&path("network_interface_id"), vip.network_interface_id.clone());
        let _ = state.set_string(&path("instance_id"), vip.instance_id.clone());
        let _ = state.set_string(&path("address_ip"), vip.address_ip.clone());
        let _ = state.set_string(&path("create_time"), vip.created_time.clone());

        Ok(true)
    }

    async fn update_ha_vip(
        &self,
        client: &Client,
        prior: &DynamicValue,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let id = state_id(prior)?;

        if changed(prior, planned, "name") {
            client
                .ha_vips()
                .modify_name(&id, &required_string(planned, "name")?)
                .await
                .map_err(api_error("Failed to update HA VIP"))?;
        }

        if !self.read_ha_vip(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read HA VIP",
                format!("HA VIP [{}] not found after update", id),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceWithImportState for HaVipResource {
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
impl ResourceWithConfigure for HaVipResource {
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
