//! Bandwidth package resource implementation

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
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

use super::common::{
    api_error, changed, extract_provider_data, id_attribute, path, read_tags, require_client,
    set_tags, state_id, tags_attribute, update_tags, Outcome,
};
use crate::api::bandwidth_package::CreateBandwidthPackageRequest;
use crate::api::{tags_from_map, Client};

const TAG_RESOURCE_TYPE: &str = "bandwidthPackage";

const NETWORK_TYPES: &[&str] = &[
    "BGP",
    "SINGLEISP",
    "ANYCAST",
    "SINGLEISP_CMCC",
    "SINGLEISP_CTCC",
    "SINGLEISP_CUCC",
];

const CHARGE_TYPES: &[&str] = &[
    "TOP5_POSTPAID_BY_MONTH",
    "PERCENT95_POSTPAID_BY_MONTH",
    "ENHANCED95_POSTPAID_BY_MONTH",
    "FIXED_PREPAID_BY_MONTH",
    "PEAK_BANDWIDTH_POSTPAID_BY_DAY",
];

#[derive(Default)]
pub struct VpcBandwidthPackageResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl VpcBandwidthPackageResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for VpcBandwidthPackageResource {
    fn type_name(&self) -> &str {
        "tencentcloud_vpc_bandwidth_package"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to create a vpc bandwidth package.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("network_type", AttributeType::String)
                    .description("Bandwidth packet type, default: `BGP`. Optional value: `BGP`, `SINGLEISP`, `ANYCAST`, `SINGLEISP_CMCC`, `SINGLEISP_CTCC`, `SINGLEISP_CUCC`.")
                    .optional()
                    .computed()
                    .force_new()
                    .validator(StringOneOfValidator::create(NETWORK_TYPES))
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("charge_type", AttributeType::String)
                    .description("Bandwidth package billing type, default: `TOP5_POSTPAID_BY_MONTH`.")
                    .optional()
                    .computed()
                    .force_new()
                    .validator(StringOneOfValidator::create(CHARGE_TYPES))
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("bandwidth_package_name", AttributeType::String)
                    .description("Bandwidth package name.")
                    .optional()
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("internet_max_bandwidth", AttributeType::Number)
                    .description("Bandwidth packet speed limit size. Unit: Mbps, -1 means no speed limit.")
                    .optional()
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("egress", AttributeType::String)
                    .description("Network egress. It defaults to `center_egress1`.")
                    .optional()
                    .computed()
                    .force_new()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(tags_attribute())
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
        if let Err(diag) = self.create_package(client, &request.planned_state, &mut state).await {
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
            Ok(id) => self.read_package(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "bandwidth package not found, removing from state");
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
            .update_package(client, &request.prior_state, &request.planned_state, &mut state)
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
                .bandwidth_packages()
                .delete(&id)
                .await
                .map_err(api_error("Failed to delete bandwidth package")),
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

impl VpcBandwidthPackageResource {
    async fn create_package(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let request = CreateBandwidthPackageRequest {
            network_type: planned.get_string_opt(&path("network_type")),
            charge_type: planned.get_string_opt(&path("charge_type")),
            bandwidth_package_name: planned.get_string_opt(&path("bandwidth_package_name")),
            internet_max_bandwidth: planned.get_i64_opt(&path("internet_max_bandwidth")),
            egress: planned.get_string_opt(&path("egress")),
            tags: tags_from_map(&planned.get_string_map(&path("tags"))),
        };

        let id = client
            .bandwidth_packages()
            .create(&request)
            .await
            .map_err(api_error("Failed to create bandwidth package"))?;
        let _ = state.set_string(&path("id"), id.clone());

        if !self.read_package(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read bandwidth package",
                format!("bandwidth package [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_package(&self, client: &Client, id: &str, state: &mut DynamicValue) -> Outcome<bool> {
        let Some(bwp) = client
            .bandwidth_packages()
            .describe_by_id(id)
            .await
            .map_err(api_error("Failed to read bandwidth package"))?
        else {
            return Ok(false);
        };

        let _ = state.set_string(&path("id"), bwp.bandwidth_package_id.clone());
        let _ = state.set_string(&path("network_type"), bwp.network_type.clone());
        let _ = state.set_string(&path("charge_type"), bwp.charge_type.clone());
        let _ = state.set_string(&path("bandwidth_package_name"), bwp.bandwidth_package_name.clone());
        let _ = state.set_i64(&path("internet_max_bandwidth"), bwp.bandwidth);
        let _ = state.set_string(&path("egress"), bwp.egress.clone());

        set_tags(state, read_tags(client, TAG_RESOURCE_TYPE, id).await?);

        Ok(true)
    }

    async fn update_package(
        &self,
        client: &Client,
        prior: &DynamicValue,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let id = state_id(prior)?;
        let packages = client.bandwidth_packages();

        if changed(prior, planned, "bandwidth_package_name") {
            if let Some(name) = planned.get_string_opt(&path("bandwidth_package_name")) {
                packages
                    .modify_name(&id, &name)
                    .await
                    .map_err(api_error("Failed to rename bandwidth package"))?;
            }
        }

        if changed(prior, planned, "internet_max_bandwidth") {
            if let Some(bandwidth) = planned.get_i64_opt(&path("internet_max_bandwidth")) {
                packages
                    .modify_bandwidth(&id, bandwidth)
                    .await
                    .map_err(api_error("Failed to update bandwidth package bandwidth"))?;
            }
        }

        update_tags(client, TAG_RESOURCE_TYPE, &id, prior, planned).await?;

        if !self.read_package(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read bandwidth package",
                format!("bandwidth package [{}] not found after update", id),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceWithImportState for VpcBandwidthPackageResource {
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
impl ResourceWithConfigure for VpcBandwidthPackageResource {
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
