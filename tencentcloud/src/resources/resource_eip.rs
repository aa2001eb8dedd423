//! EIP resource implementation

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
use tfplug::validator::{NumberRangeValidator, StringLengthValidator, StringOneOfValidator};

use super::common::{
    api_error, changed, extract_provider_data, id_attribute, path, require_client,
    required_string, set_tags, state_id, tags_attribute, update_service_tags, Outcome,
};
use crate::api::address::AllocateAddressRequest;
use crate::api::{tags_from_map, tags_to_map, Client};

/// EIPs are tagged under the CVM service
const TAG_SERVICE: &str = "cvm";

fn optional_force_new(name: &str, description: &str) -> AttributeBuilder {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .optional()
        .computed()
        .force_new()
        .plan_modifier(Box::new(UseStateForUnknown))
}

fn computed_string(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .computed()
        .build()
}

#[derive(Default)]
pub struct EipResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl EipResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for EipResource {
    fn type_name(&self) -> &str {
        "tencentcloud_eip"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides an EIP resource.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of eip.")
                    .optional()
                    .computed()
                    .validator(StringLengthValidator::between(1, 128))
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                optional_force_new(
                    "type",
                    "The type of eip. Valid value: `EIP`, `AnycastEIP` and `HighQualityEIP`.",
                )
                .validator(StringOneOfValidator::create(&[
                    "EIP",
                    "AnycastEIP",
                    "HighQualityEIP",
                ]))
                .build(),
            )
            .attribute(
                optional_force_new(
                    "internet_service_provider",
                    "Internet service provider of eip, such as `BGP`, `CMCC` or `CTCC`.",
                )
                .build(),
            )
            .attribute(
                optional_force_new(
                    "internet_charge_type",
                    "The charge type of eip, such as `TRAFFIC_POSTPAID_BY_HOUR` or `BANDWIDTH_PACKAGE`.",
                )
                .build(),
            )
            .attribute(
                AttributeBuilder::new("internet_max_bandwidth_out", AttributeType::Number)
                    .description("The bandwidth limit of EIP, unit is Mbps.")
                    .optional()
                    .computed()
                    .force_new()
                    .validator(NumberRangeValidator::between(1.0, 100000.0))
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("bandwidth_package_id", AttributeType::String)
                    .description("ID of bandwidth package, it will set when `internet_charge_type` is `BANDWIDTH_PACKAGE`.")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(tags_attribute())
            .attribute(computed_string("public_ip", "The elastic IP address."))
            .attribute(computed_string("status", "The EIP current status."))
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
        if let Err(diag) = self.create_eip(client, &request.planned_state, &mut state).await {
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
            Ok(id) => self.read_eip(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "eip not found, removing from state");
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
            .update_eip(client, &request.prior_state, &request.planned_state, &mut state)
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

        let result = async {
            let id = state_id(&request.prior_state)?;
            client
                .addresses()
                .disassociate(&id)
                .await
                .map_err(api_error("Failed to unbind EIP"))?;
            client
                .addresses()
                .release(&id)
                .await
                .map_err(api_error("Failed to release EIP"))
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

impl EipResource {
    async fn create_eip(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let request = AllocateAddressRequest {
            address_name: planned.get_string_opt(&path("name")),
            address_type: planned.get_string_opt(&path("type")),
            internet_service_provider: planned.get_string_opt(&path("internet_service_provider")),
            internet_charge_type: planned.get_string_opt(&path("internet_charge_type")),
            internet_max_bandwidth_out: planned.get_i64_opt(&path("internet_max_bandwidth_out")),
            bandwidth_package_id: planned.get_string_opt(&path("bandwidth_package_id")),
            tags: tags_from_map(&planned.get_string_map(&path("tags"))),
        };

        let id = client
            .addresses()
            .allocate(&request)
            .await
            .map_err(api_error("Failed to allocate EIP"))?;
        let _ = state.set_string(&path("id"), id.clone());

        if !self.read_eip(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read EIP",
                format!("EIP [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_eip(&self, client: &Client, id: &str, state: &mut DynamicValue) -> Outcome<bool> {
        let Some(eip) = client
            .addresses()
            .describe_by_id(id)
            .await
            .map_err(api_error("Failed to read EIP"))?
        else {
            return Ok(false);
        };

        let _ = state.set_string(&path("id"), eip.address_id.clone());
        let _ = state.set_string(&path("name"), eip.address_name.clone());
        let _ = state.set_string(&path("type"), eip.address_type.clone());
        let _ = state.set_string(&path("public_ip"), eip.address_ip.clone());
        let _ = state.set_string(&path("status"), eip.address_status.clone());
        if !eip.internet_service_provider.is_empty() {
            let _ = state.set_string(
                &path("internet_service_provider"),
                eip.internet_service_provider.clone(),
            );
        }
        if !eip.internet_charge_type.is_empty() {
            let _ = state.set_string(&path("internet_charge_type"), eip.internet_charge_type.clone());
        }
        if let Some(bandwidth) = eip.bandwidth {
            let _ = state.set_i64(&path("internet_max_bandwidth_out"), bandwidth as i64);
        }
        set_tags(state, tags_to_map(&eip.tag_set));

        Ok(true)
    }

    async fn update_eip(
        &self,
        client: &Client,
        prior: &DynamicValue,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let id = state_id(prior)?;

        if changed(prior, planned, "name") {
            client
                .addresses()
                .modify_name(&id, &required_string(planned, "name")?)
                .await
                .map_err(api_error("Failed to update EIP"))?;
        }

        update_service_tags(client, TAG_SERVICE, "eip", &id, prior, planned).await?;

        if !self.read_eip(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read EIP",
                format!("EIP [{}] not found after update", id),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceWithImportState for EipResource {
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
impl ResourceWithConfigure for EipResource {
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
