//! NAT gateway resource implementation

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
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{IntOneOfValidator, Ipv4Validator, ListLengthValidator, StringLengthValidator};

use super::common::{
    api_error, apply_tags, changed, create_time_attribute, extract_provider_data, id_attribute,
    path, read_tags, require_client, required_string, set_tags, state_id, tags_attribute,
    update_tags, Outcome,
};
use crate::api::nat_gateway::CreateNatGatewayRequest;
use crate::api::{wait_for_state, wait_vpc_task, ApiError, Client, PollState};

const NAT_STATE_AVAILABLE: &str = "AVAILABLE";
const NAT_STATE_FAILED: &str = "FAILED";

/// Upper bound of EIPs bound to one gateway
pub(crate) const NAT_EIP_MAX_LIMIT: usize = 10;

/// Standard NAT only accepts these two values
const STANDARD_MAX_CONCURRENT: i64 = 2_000_000;
const STANDARD_BANDWIDTH: i64 = 5000;

const DEFAULT_MAX_CONCURRENT: i64 = 1_000_000;
const DEFAULT_BANDWIDTH: i64 = 100;

/// Order in which EIPs are moved when `assigned_eip_set` changes.
///
/// A gateway always needs one address bound, so when every old address goes
/// away the last one is kept as `backup_old` until the new ones are attached.
/// When the new addresses would hit [`NAT_EIP_MAX_LIMIT`] while that backup
/// is still bound, one of them waits as `backup_new`.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct EipPlan {
    pub disassociate: Vec<String>,
    pub associate: Vec<String>,
    pub backup_old: Option<String>,
    pub backup_new: Option<String>,
}

pub(crate) fn plan_eip_changes(old: &[String], new: &[String]) -> EipPlan {
    let mut plan = EipPlan::default();

    for ip in old.iter().filter(|ip| !new.contains(ip)) {
        if plan.disassociate.len() + 1 == old.len() {
            plan.backup_old = Some(ip.clone());
        } else {
            plan.disassociate.push(ip.clone());
        }
    }

    let still_bound = old.len() - plan.disassociate.len();
    for ip in new.iter().filter(|ip| !old.contains(ip)) {
        if plan.backup_old.is_some()
            && plan.backup_new.is_none()
            && still_bound + plan.associate.len() >= NAT_EIP_MAX_LIMIT
        {
            plan.backup_new = Some(ip.clone());
        } else {
            plan.associate.push(ip.clone());
        }
    }

    plan
}

#[derive(Default)]
pub struct NatGatewayResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl NatGatewayResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for NatGatewayResource {
    fn type_name(&self) -> &str {
        "tencentcloud_nat_gateway"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to create a NAT gateway.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("ID of the vpc.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the NAT gateway.")
                    .required()
                    .validator(StringLengthValidator::between(1, 60))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_concurrent", AttributeType::Number)
                    .description("The upper limit of concurrent connection of NAT gateway. Valid values: `1000000`, `3000000`, `10000000`. Default is `1000000`. When `nat_product_version` is 2 this defaults to `2000000`.")
                    .optional()
                    .computed()
                    .validator(IntOneOfValidator::create(&[1_000_000, 2_000_000, 3_000_000, 10_000_000]))
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("bandwidth", AttributeType::Number)
                    .description("The maximum public network output bandwidth of NAT gateway (unit: Mbps). Valid values: `20`, `50`, `100`, `200`, `500`, `1000`, `2000`, `5000`. Default is `100`. When `nat_product_version` is 2 this defaults to `5000`.")
                    .optional()
                    .computed()
                    .validator(IntOneOfValidator::create(&[20, 50, 100, 200, 500, 1000, 2000, 5000]))
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("assigned_eip_set", AttributeType::set_of(AttributeType::String))
                    .description("EIP IP address set bound to the gateway. The value of at least 1 and at most 10 if do not apply for a whitelist.")
                    .required()
                    .validator(ListLengthValidator::at_least(1))
                    .validator(Ipv4Validator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("zone", AttributeType::String)
                    .description("The availability zone, such as `ap-guangzhou-3`.")
                    .optional()
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subnet_id", AttributeType::String)
                    .description("Subnet of NAT.")
                    .optional()
                    .computed()
                    .force_new()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("nat_product_version", AttributeType::Number)
                    .description("1: traditional NAT, 2: standard NAT, default value is 1.")
                    .optional()
                    .computed()
                    .force_new()
                    .validator(IntOneOfValidator::create(&[1, 2]))
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("stock_public_ip_addresses_bandwidth_out", AttributeType::Number)
                    .description("The elastic public IP bandwidth value (unit: Mbps) for binding NAT gateway.")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(tags_attribute())
            .attribute(create_time_attribute("created_time"))
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];
        let config = &request.config;

        if config.get_i64_opt(&path("nat_product_version")) == Some(2) {
            if let Some(max) = config.get_i64_opt(&path("max_concurrent")) {
                if max != STANDARD_MAX_CONCURRENT {
                    diagnostics.push(
                        Diagnostic::error(
                            "Invalid max_concurrent",
                            "If `nat_product_version` is 2, `max_concurrent` can only be set to `2000000` or not set at all.",
                        )
                        .with_attribute(path("max_concurrent")),
                    );
                }
            }
            if let Some(bandwidth) = config.get_i64_opt(&path("bandwidth")) {
                if bandwidth != STANDARD_BANDWIDTH {
                    diagnostics.push(
                        Diagnostic::error(
                            "Invalid bandwidth",
                            "If `nat_product_version` is 2, `bandwidth` can only be set to `5000` or not set at all.",
                        )
                        .with_attribute(path("bandwidth")),
                    );
                }
            }
        }

        ValidateResourceConfigResponse { diagnostics }
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
        if let Err(diag) = self
            .create_nat_gateway(client, &request.planned_state, &mut state)
            .await
        {
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
            Ok(id) => self.read_nat_gateway(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "nat gateway not found, removing from state");
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
            .update_nat_gateway(client, &request.prior_state, &request.planned_state, &mut state)
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
            Ok(id) => delete_nat_gateway(client, &id)
                .await
                .map_err(api_error("Failed to delete NAT gateway")),
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

impl NatGatewayResource {
    async fn create_nat_gateway(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let version = planned.get_i64_opt(&path("nat_product_version"));
        let (default_max, default_bandwidth) = if version == Some(2) {
            (STANDARD_MAX_CONCURRENT, STANDARD_BANDWIDTH)
        } else {
            (DEFAULT_MAX_CONCURRENT, DEFAULT_BANDWIDTH)
        };

        let request = CreateNatGatewayRequest {
            nat_gateway_name: required_string(planned, "name")?,
            vpc_id: required_string(planned, "vpc_id")?,
            internet_max_bandwidth_out: Some(
                planned.get_i64_opt(&path("bandwidth")).unwrap_or(default_bandwidth) as u64,
            ),
            max_concurrent_connection: Some(
                planned.get_i64_opt(&path("max_concurrent")).unwrap_or(default_max) as u64,
            ),
            public_ip_addresses: planned.get_string_list(&path("assigned_eip_set")),
            zone: planned.get_string_opt(&path("zone")),
            subnet_id: planned.get_string_opt(&path("subnet_id")),
            nat_product_version: version.map(|v| v as u64),
            stock_public_ip_addresses_bandwidth_out: planned
                .get_i64_opt(&path("stock_public_ip_addresses_bandwidth_out"))
                .map(|v| v as u64),
            tags: vec![],
        };

        let nat = client
            .nat_gateways()
            .create(&request)
            .await
            .map_err(api_error("Failed to create NAT gateway"))?;
        let id = nat.nat_gateway_id;
        let _ = state.set_string(&path("id"), id.clone());

        wait_available(client, &id)
            .await
            .map_err(api_error("Failed to create NAT gateway"))?;

        apply_tags(client, "nat", &id, &planned.get_string_map(&path("tags"))).await?;

        if !self.read_nat_gateway(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read NAT gateway",
                format!("NAT gateway [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_nat_gateway(
        &self,
        client: &Client,
        id: &str,
        state: &mut DynamicValue,
    ) -> Outcome<bool> {
        let Some(nat) = client
            .nat_gateways()
            .describe_by_id(id)
            .await
            .map_err(api_error("Failed to read NAT gateway"))?
        else {
            return Ok(false);
        };

        let public_ips = nat.public_ips();

        let _ = state.set_string(&path("id"), nat.nat_gateway_id.clone());
        let _ = state.set_string(&path("vpc_id"), nat.vpc_id.clone());
        let _ = state.set_string(&path("name"), nat.nat_gateway_name.clone());
        let _ = state.set_i64(&path("max_concurrent"), nat.max_concurrent_connection as i64);
        let _ = state.set_i64(&path("bandwidth"), nat.internet_max_bandwidth_out as i64);
        let _ = state.set_string(&path("created_time"), nat.created_time.clone());
        let _ = state.set_string_list(&path("assigned_eip_set"), public_ips.clone());
        let _ = state.set_string(&path("zone"), nat.zone.clone());
        if !nat.subnet_id.is_empty() {
            let _ = state.set_string(&path("subnet_id"), nat.subnet_id.clone());
        }
        if nat.nat_product_version > 0 {
            let _ = state.set_i64(&path("nat_product_version"), nat.nat_product_version as i64);
        }

        if let Some(ip) = public_ips.first() {
            let address = client
                .addresses()
                .describe_by_ip(ip)
                .await
                .map_err(api_error("Failed to read NAT gateway addresses"))?;
            if let Some(bandwidth) = address.and_then(|a| a.bandwidth) {
                let _ = state.set_i64(
                    &path("stock_public_ip_addresses_bandwidth_out"),
                    bandwidth as i64,
                );
            }
        }

        set_tags(state, read_tags(client, "nat", id).await?);

        Ok(true)
    }

    async fn update_nat_gateway(
        &self,
        client: &Client,
        prior: &DynamicValue,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let id = state_id(prior)?;

        if changed(prior, planned, "zone") {
            return Err(Diagnostic::error(
                "Immutable attribute",
                "argument `zone` cannot be changed",
            )
            .with_attribute(path("zone")));
        }

        let nats = client.nat_gateways();

        if changed(prior, planned, "name") || changed(prior, planned, "bandwidth") {
            let bandwidth = if changed(prior, planned, "bandwidth") {
                planned.get_i64_opt(&path("bandwidth")).map(|b| b as u64)
            } else {
                None
            };
            nats.modify_attribute(&id, &required_string(planned, "name")?, bandwidth)
                .await
                .map_err(api_error("Failed to update NAT gateway"))?;
        }

        if changed(prior, planned, "max_concurrent") {
            if let Some(max) = planned.get_i64_opt(&path("max_concurrent")) {
                nats.reset_connection(&id, max as u64)
                    .await
                    .map_err(api_error("Failed to reset NAT gateway connection limit"))?;
            }
        }

        if changed(prior, planned, "assigned_eip_set") {
            let plan = plan_eip_changes(
                &prior.get_string_list(&path("assigned_eip_set")),
                &planned.get_string_list(&path("assigned_eip_set")),
            );
            apply_eip_plan(client, &id, &plan)
                .await
                .map_err(api_error("Failed to update NAT gateway EIPs"))?;
        }

        update_tags(client, "nat", &id, prior, planned).await?;

        if !self.read_nat_gateway(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read NAT gateway",
                format!("NAT gateway [{}] not found after update", id),
            ));
        }
        Ok(())
    }
}

async fn apply_eip_plan(client: &Client, id: &str, plan: &EipPlan) -> Result<(), ApiError> {
    let nats = client.nat_gateways();

    if !plan.disassociate.is_empty() {
        let task = nats.disassociate_addresses(id, &plan.disassociate).await?;
        wait_vpc_task(client, &task).await?;
    }
    if !plan.associate.is_empty() {
        let task = nats.associate_addresses(id, &plan.associate).await?;
        wait_vpc_task(client, &task).await?;
    }
    if let Some(ip) = &plan.backup_old {
        let task = nats.disassociate_addresses(id, std::slice::from_ref(ip)).await?;
        wait_vpc_task(client, &task).await?;
    }
    if let Some(ip) = &plan.backup_new {
        let task = nats.associate_addresses(id, std::slice::from_ref(ip)).await?;
        wait_vpc_task(client, &task).await?;
    }
    Ok(())
}

async fn wait_available(client: &Client, id: &str) -> Result<(), ApiError> {
    wait_for_state(client.read_timeout(), client.poll_interval(), move || async move {
        match client.nat_gateways().describe_by_id(id).await {
            Ok(Some(nat)) if nat.state == NAT_STATE_AVAILABLE => PollState::Done(()),
            Ok(Some(nat)) if nat.state == NAT_STATE_FAILED => PollState::Failed(
                ApiError::InconsistentState(format!("NAT gateway [{}] failed to create", id)),
            ),
            Ok(_) => PollState::Pending,
            Err(e) => PollState::from_error(e),
        }
    })
    .await
}

async fn delete_nat_gateway(client: &Client, id: &str) -> Result<(), ApiError> {
    client.nat_gateways().delete(id).await?;

    wait_for_state(client.read_timeout(), client.poll_interval(), move || async move {
        match client.nat_gateways().describe_by_id(id).await {
            Ok(None) => PollState::Done(()),
            Ok(Some(nat)) if nat.state == NAT_STATE_FAILED => PollState::Failed(
                ApiError::InconsistentState(format!("delete NAT gateway [{}] failed", id)),
            ),
            Ok(Some(_)) => PollState::Pending,
            Err(e) => PollState::from_error(e),
        }
    })
    .await
}

#[async_trait]
impl ResourceWithImportState for NatGatewayResource {
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
impl ResourceWithConfigure for NatGatewayResource {
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
    use tfplug::grpc::plan_change;
    use tfplug::types::Dynamic;

    fn ips(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn replacing_every_address_keeps_one_bound() {
        let plan = plan_eip_changes(&ips(&["1.1.1.1"]), &ips(&["2.2.2.2"]));
        assert_eq!(
            plan,
            EipPlan {
                disassociate: vec![],
                associate: ips(&["2.2.2.2"]),
                backup_old: Some("1.1.1.1".to_string()),
                backup_new: None,
            }
        );
    }

    #[test]
    fn partial_change_moves_addresses_directly() {
        let plan = plan_eip_changes(
            &ips(&["1.1.1.1", "2.2.2.2", "3.3.3.3"]),
            &ips(&["1.1.1.1", "4.4.4.4"]),
        );
        assert_eq!(plan.disassociate, ips(&["2.2.2.2", "3.3.3.3"]));
        assert_eq!(plan.associate, ips(&["4.4.4.4"]));
        assert_eq!(plan.backup_old, None);
        assert_eq!(plan.backup_new, None);
    }

    #[test]
    fn full_replacement_at_limit_holds_one_new_address() {
        let new: Vec<String> = (1..=10).map(|i| format!("10.0.0.{}", i)).collect();
        let plan = plan_eip_changes(&ips(&["1.1.1.1"]), &new);

        assert_eq!(plan.backup_old.as_deref(), Some("1.1.1.1"));
        assert_eq!(plan.associate.len(), NAT_EIP_MAX_LIMIT - 1);
        assert_eq!(plan.backup_new.as_deref(), Some("10.0.0.10"));
    }

    #[test]
    fn unchanged_set_plans_nothing() {
        let set = ips(&["1.1.1.1", "2.2.2.2"]);
        assert_eq!(plan_eip_changes(&set, &set), EipPlan::default());
    }

    fn object(pairs: &[(&str, Dynamic)]) -> Dynamic {
        Dynamic::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn strings(list: &[&str]) -> Dynamic {
        Dynamic::List(list.iter().map(|s| Dynamic::from(*s)).collect())
    }

    #[tokio::test]
    async fn eip_bandwidth_plans_unknown_when_eips_change() {
        let schema = NatGatewayResource::new()
            .schema(Context::new(), ResourceSchemaRequest)
            .await
            .schema;

        let prior = object(&[
            ("id", Dynamic::from("nat-1")),
            ("vpc_id", Dynamic::from("vpc-1")),
            ("name", Dynamic::from("demo")),
            ("assigned_eip_set", strings(&["1.1.1.1"])),
            ("stock_public_ip_addresses_bandwidth_out", Dynamic::Number(100.0)),
        ]);
        let config = object(&[
            ("vpc_id", Dynamic::from("vpc-1")),
            ("name", Dynamic::from("demo")),
            ("assigned_eip_set", strings(&["2.2.2.2"])),
        ]);
        let mut proposed = prior.clone();
        if let Dynamic::Map(map) = &mut proposed {
            map.insert("assigned_eip_set".to_string(), strings(&["2.2.2.2"]));
        }

        let plan = plan_change(&schema.block, &prior, proposed, &config);
        let planned = DynamicValue::new(plan.planned_state);

        assert!(planned.is_unknown_at(&path("stock_public_ip_addresses_bandwidth_out")));
        assert!(plan.requires_replace.is_empty());
    }
}
