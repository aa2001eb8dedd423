//! Elastic network interface resource implementation

use std::collections::HashMap;

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{Ipv4Validator, NumberRangeValidator, StringLengthValidator};

use super::common::{
    api_error, apply_tags, changed, create_time_attribute, extract_provider_data, id_attribute,
    path, require_client, required_string, set_tags, state_id, tags_attribute, update_tags,
    Outcome,
};
use crate::api::eni::{chunk_count, chunk_ips, CreateEniRequest, PrivateIpAddress};
use crate::api::{tags_to_map, Client};

/// Private IP changes derived from the old and new `ipv4s` blocks
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Ipv4Change {
    /// Primary IP whose description changes
    pub primary_description: Option<(String, String)>,
    pub unassign: Vec<String>,
    pub assign: Vec<PrivateIpAddress>,
}

/// The primary IP can never be removed or replaced, only its description
/// may change
pub(crate) fn plan_ipv4_change(
    old: &[PrivateIpAddress],
    new: &[PrivateIpAddress],
) -> Result<Ipv4Change, String> {
    if new.is_empty() {
        return Err("can't remove all ipv4s".to_string());
    }

    let mut change = Ipv4Change::default();
    let mut removed_primary: Option<&str> = None;

    for ip in old.iter().filter(|ip| !new.contains(ip)) {
        if ip.primary {
            removed_primary = Some(&ip.private_ip_address);
        } else {
            change.unassign.push(ip.private_ip_address.clone());
        }
    }

    for ip in new.iter().filter(|ip| !old.contains(ip)) {
        if !ip.primary {
            change.assign.push(ip.clone());
            continue;
        }
        let Some(primary) = removed_primary else {
            return Err("can't set more than one primary ipv4".to_string());
        };
        if change.primary_description.is_some() {
            return Err("can't set more than one primary ipv4".to_string());
        }
        if primary != ip.private_ip_address {
            return Err("can't change primary ipv4".to_string());
        }
        change.primary_description = Some((ip.private_ip_address.clone(), ip.description.clone()));
    }

    if removed_primary.is_some() && change.primary_description.is_none() {
        return Err("can't remove primary ipv4".to_string());
    }

    Ok(change)
}

fn ipv4s_of(value: &DynamicValue) -> Vec<PrivateIpAddress> {
    value
        .get_object_list(&path("ipv4s"))
        .into_iter()
        .map(|item| PrivateIpAddress {
            private_ip_address: item
                .get("ip")
                .and_then(Dynamic::as_str)
                .unwrap_or_default()
                .to_string(),
            primary: item.get("primary").and_then(Dynamic::as_bool).unwrap_or(false),
            description: item
                .get("description")
                .and_then(Dynamic::as_str)
                .unwrap_or_default()
                .to_string(),
        })
        .collect()
}

fn ipv4_object(ip: &PrivateIpAddress) -> HashMap<String, Dynamic> {
    HashMap::from([
        ("ip".to_string(), Dynamic::from(ip.private_ip_address.as_str())),
        ("primary".to_string(), Dynamic::from(ip.primary)),
        ("description".to_string(), Dynamic::from(ip.description.as_str())),
    ])
}

/// `orderly_security_groups` wins when both are configured
fn security_groups_of(value: &DynamicValue) -> Vec<String> {
    let orderly = value.get_string_list(&path("orderly_security_groups"));
    if orderly.is_empty() {
        value.get_string_list(&path("security_groups"))
    } else {
        orderly
    }
}

fn ipv4_block() -> tfplug::schema::Block {
    SchemaBuilder::new()
        .attribute(
            AttributeBuilder::new("ip", AttributeType::String)
                .description("Intranet IP.")
                .required()
                .validator(Ipv4Validator::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("primary", AttributeType::Bool)
                .description("Indicates whether the IP is primary.")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("description", AttributeType::String)
                .description("Description of the IP, maximum length 25.")
                .default(StaticDefault::string(""))
                .validator(StringLengthValidator::at_most(25))
                .build(),
        )
        .build_block()
}

#[derive(Default)]
pub struct EniResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl EniResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for EniResource {
    fn type_name(&self) -> &str {
        "tencentcloud_eni"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let ipv4_info = AttributeType::object([
            ("ip", AttributeType::String),
            ("primary", AttributeType::Bool),
            ("description", AttributeType::String),
        ]);

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to create an ENI.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the ENI, maximum length 60.")
                    .required()
                    .validator(StringLengthValidator::between(1, 60))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("ID of the vpc.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subnet_id", AttributeType::String)
                    .description("ID of the subnet within this vpc.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("Description of the ENI, maximum length 60.")
                    .default(StaticDefault::string(""))
                    .validator(StringLengthValidator::at_most(60))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("security_groups", AttributeType::set_of(AttributeType::String))
                    .description("A set of security group IDs. Conflicts with `orderly_security_groups`.")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("orderly_security_groups", AttributeType::list_of(AttributeType::String))
                    .description("A list of security group IDs, applied in order.")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ipv4_count", AttributeType::Number)
                    .description("The number of intranet IPv4s. When it is greater than 1, there is only one primary intranet IP. The others are auxiliary intranet IPs, which range from 1 to 30. Conflict with `ipv4s`.")
                    .optional()
                    .computed()
                    .validator(NumberRangeValidator::between(1.0, 30.0))
                    .build(),
            )
            .attribute(tags_attribute())
            .attribute(
                AttributeBuilder::new("mac", AttributeType::String)
                    .description("MAC address.")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("state", AttributeType::String)
                    .description("State of the ENI.")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("primary", AttributeType::Bool)
                    .description("Indicates whether the IP is primary.")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(create_time_attribute("create_time"))
            .attribute(
                AttributeBuilder::new("cdc_id", AttributeType::String)
                    .description("CDC instance ID.")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ipv4_info", AttributeType::list_of(ipv4_info))
                    .description("An information list of IPv4s.")
                    .computed()
                    .build(),
            )
            .block(NestedBlock::set("ipv4s", ipv4_block()).max_items(30))
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

        if config.is_set(&path("security_groups")) && config.is_set(&path("orderly_security_groups")) {
            diagnostics.push(
                Diagnostic::error(
                    "Conflicting attributes",
                    "`security_groups` conflicts with `orderly_security_groups`",
                )
                .with_attribute(path("security_groups")),
            );
        }

        if config.is_unknown_at(&path("ipv4s")) || config.is_unknown_at(&path("ipv4_count")) {
            return ValidateResourceConfigResponse { diagnostics };
        }

        let ipv4s = ipv4s_of(config);
        let has_count = config.is_set(&path("ipv4_count"));
        match (ipv4s.is_empty(), has_count) {
            (false, true) => diagnostics.push(
                Diagnostic::error("Conflicting attributes", "`ipv4s` conflicts with `ipv4_count`")
                    .with_attribute(path("ipv4_count")),
            ),
            (true, false) => diagnostics.push(Diagnostic::error(
                "Missing attribute",
                "ipv4s or ipv4_count must be set",
            )),
            _ => {}
        }

        if !ipv4s.is_empty() {
            match ipv4s.iter().filter(|ip| ip.primary).count() {
                1 => {}
                0 => diagnostics.push(
                    Diagnostic::error("Invalid ipv4s", "need a primary ipv4")
                        .with_attribute(path("ipv4s")),
                ),
                _ => diagnostics.push(
                    Diagnostic::error("Invalid ipv4s", "only can have a primary ipv4")
                        .with_attribute(path("ipv4s")),
                ),
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
        if let Err(diag) = self.create_eni(client, &request.planned_state, &mut state).await {
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
            Ok(id) => self.read_eni(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "eni not found, removing from state");
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
            .update_eni(client, &request.prior_state, &request.planned_state, &mut state)
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
                .enis()
                .delete(&id)
                .await
                .map_err(api_error("Failed to delete ENI")),
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

impl EniResource {
    async fn create_eni(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let mut request = CreateEniRequest {
            network_interface_name: required_string(planned, "name")?,
            vpc_id: required_string(planned, "vpc_id")?,
            subnet_id: required_string(planned, "subnet_id")?,
            network_interface_description: planned
                .get_string_opt(&path("description"))
                .unwrap_or_default(),
            security_group_ids: security_groups_of(planned),
            ..Default::default()
        };

        let mut ipv4s = ipv4s_of(planned);
        let (rest, total) = if !ipv4s.is_empty() {
            if let Some(idx) = ipv4s.iter().position(|ip| ip.primary) {
                ipv4s.swap(0, idx);
            }
            let mut chunks = chunk_ips(&ipv4s).into_iter();
            request.private_ip_addresses = chunks.next().unwrap_or_default();
            (Pending::Ips(chunks.collect()), ipv4s.len())
        } else {
            let count = planned.get_i64_opt(&path("ipv4_count")).unwrap_or(1).max(1) as u64;
            let mut chunks = chunk_count(count).into_iter();
            // the primary IP comes with the interface
            request.secondary_private_ip_address_count =
                Some(chunks.next().unwrap_or(1).saturating_sub(1));
            (Pending::Count(chunks.collect()), count as usize)
        };

        let eni = client
            .enis()
            .create(&request)
            .await
            .map_err(api_error("Failed to create ENI"))?;
        let id = eni.network_interface_id;
        let _ = state.set_string(&path("id"), id.clone());

        match rest {
            Pending::Ips(chunks) => {
                for chunk in chunks {
                    client
                        .enis()
                        .assign_private_ips(&id, &chunk, None)
                        .await
                        .map_err(api_error("Failed to assign ENI IPs"))?;
                }
            }
            Pending::Count(chunks) => {
                for count in chunks {
                    client
                        .enis()
                        .assign_private_ips(&id, &[], Some(count))
                        .await
                        .map_err(api_error("Failed to assign ENI IPs"))?;
                }
            }
        }

        client
            .enis()
            .wait_ready(&id, total)
            .await
            .map_err(api_error("Failed to wait for ENI"))?;

        apply_tags(client, "eni", &id, &planned.get_string_map(&path("tags"))).await?;

        if !self.read_eni(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read ENI",
                format!("ENI [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_eni(&self, client: &Client, id: &str, state: &mut DynamicValue) -> Outcome<bool> {
        let Some(eni) = client
            .enis()
            .describe_by_id(id)
            .await
            .map_err(api_error("Failed to read ENI"))?
        else {
            return Ok(false);
        };

        let _ = state.set_string(&path("id"), eni.network_interface_id.clone());
        let _ = state.set_string(&path("name"), eni.network_interface_name.clone());
        let _ = state.set_string(&path("vpc_id"), eni.vpc_id.clone());
        let _ = state.set_string(&path("subnet_id"), eni.subnet_id.clone());
        let _ = state.set_string(&path("description"), eni.network_interface_description.clone());
        let _ = state.set_string(&path("mac"), eni.mac_address.clone());
        let _ = state.set_string(&path("state"), eni.state.clone());
        let _ = state.set_bool(&path("primary"), eni.primary);
        let _ = state.set_string(&path("create_time"), eni.created_time.clone());
        let _ = state.set_string(&path("cdc_id"), eni.cdc_id.clone());
        let _ = state.set_string_list(&path("security_groups"), eni.group_set.clone());
        let _ = state.set_string_list(&path("orderly_security_groups"), eni.group_set.clone());

        let info: Vec<HashMap<String, Dynamic>> =
            eni.private_ip_address_set.iter().map(ipv4_object).collect();
        let _ = state.set_object_list(&path("ipv4_info"), info.clone());

        if !ipv4s_of(state).is_empty() {
            let _ = state.set_object_list(&path("ipv4s"), info);
        }
        let _ = state.set_i64(&path("ipv4_count"), eni.private_ip_address_set.len() as i64);

        set_tags(state, tags_to_map(&eni.tag_set));

        Ok(true)
    }

    async fn update_eni(
        &self,
        client: &Client,
        prior: &DynamicValue,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let id = state_id(prior)?;
        let enis = client.enis();

        let name_changed = changed(prior, planned, "name");
        let desc_changed = changed(prior, planned, "description");
        let sgs_changed = changed(prior, planned, "security_groups")
            || changed(prior, planned, "orderly_security_groups");

        if name_changed || desc_changed || sgs_changed {
            let name = planned.get_string_opt(&path("name"));
            let description = planned.get_string_opt(&path("description"));
            let security_groups = security_groups_of(planned);
            enis.modify_attribute(
                &id,
                name.as_deref().filter(|_| name_changed),
                description.as_deref().filter(|_| desc_changed),
                sgs_changed.then_some(security_groups.as_slice()),
            )
            .await
            .map_err(api_error("Failed to update ENI"))?;
        }

        let new_ipv4s = ipv4s_of(planned);
        if !new_ipv4s.is_empty() && changed(prior, planned, "ipv4s") {
            let change = plan_ipv4_change(&ipv4s_of(prior), &new_ipv4s)
                .map_err(|e| Diagnostic::error("Invalid ipv4s", e).with_attribute(path("ipv4s")))?;

            if let Some((ip, description)) = &change.primary_description {
                enis.modify_ip_description(&id, ip, description)
                    .await
                    .map_err(api_error("Failed to update primary IP description"))?;
            }
            for chunk in chunk_ips(&change.unassign) {
                enis.unassign_private_ips(&id, &chunk)
                    .await
                    .map_err(api_error("Failed to unassign ENI IPs"))?;
            }
            for chunk in chunk_ips(&change.assign) {
                enis.assign_private_ips(&id, &chunk, None)
                    .await
                    .map_err(api_error("Failed to assign ENI IPs"))?;
            }
        }

        if new_ipv4s.is_empty() && changed(prior, planned, "ipv4_count") {
            let old = prior.get_i64_opt(&path("ipv4_count")).unwrap_or(0);
            let new = planned.get_i64_opt(&path("ipv4_count")).unwrap_or(old);

            if new > old {
                for count in chunk_count((new - old) as u64) {
                    enis.assign_private_ips(&id, &[], Some(count))
                        .await
                        .map_err(api_error("Failed to assign ENI IPs"))?;
                }
            } else if new < old {
                let remove: Vec<String> = prior
                    .get_object_list(&path("ipv4_info"))
                    .iter()
                    .filter(|ip| ip.get("primary").and_then(Dynamic::as_bool) != Some(true))
                    .filter_map(|ip| ip.get("ip").and_then(Dynamic::as_str).map(str::to_string))
                    .take((old - new) as usize)
                    .collect();
                for chunk in chunk_ips(&remove) {
                    enis.unassign_private_ips(&id, &chunk)
                        .await
                        .map_err(api_error("Failed to unassign ENI IPs"))?;
                }
            }
        }

        update_tags(client, "eni", &id, prior, planned).await?;

        if !self.read_eni(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read ENI",
                format!("ENI [{}] not found after update", id),
            ));
        }
        Ok(())
    }
}

/// IPs still to assign after `CreateNetworkInterface`
enum Pending {
    Ips(Vec<Vec<PrivateIpAddress>>),
    Count(Vec<u64>),
}

#[async_trait]
impl ResourceWithImportState for EniResource {
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
impl ResourceWithConfigure for EniResource {
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

    fn ip(addr: &str, primary: bool, description: &str) -> PrivateIpAddress {
        PrivateIpAddress {
            private_ip_address: addr.to_string(),
            primary,
            description: description.to_string(),
        }
    }

    #[test]
    fn adds_and_removes_secondary_ips() {
        let old = vec![ip("10.0.0.1", true, ""), ip("10.0.0.2", false, "")];
        let new = vec![ip("10.0.0.1", true, ""), ip("10.0.0.3", false, "web")];

        let change = plan_ipv4_change(&old, &new).unwrap();
        assert_eq!(change.unassign, vec!["10.0.0.2".to_string()]);
        assert_eq!(change.assign, vec![ip("10.0.0.3", false, "web")]);
        assert_eq!(change.primary_description, None);
    }

    #[test]
    fn primary_description_only_changes_description() {
        let old = vec![ip("10.0.0.1", true, "old")];
        let new = vec![ip("10.0.0.1", true, "new")];

        let change = plan_ipv4_change(&old, &new).unwrap();
        assert_eq!(
            change.primary_description,
            Some(("10.0.0.1".to_string(), "new".to_string()))
        );
        assert!(change.unassign.is_empty());
        assert!(change.assign.is_empty());
    }

    #[test]
    fn primary_cannot_be_replaced() {
        let old = vec![ip("10.0.0.1", true, "")];
        let new = vec![ip("10.0.0.9", true, "")];
        assert_eq!(
            plan_ipv4_change(&old, &new).unwrap_err(),
            "can't change primary ipv4"
        );
    }

    #[test]
    fn primary_cannot_be_removed() {
        let old = vec![ip("10.0.0.1", true, ""), ip("10.0.0.2", false, "")];
        let new = vec![ip("10.0.0.2", false, "")];
        assert_eq!(
            plan_ipv4_change(&old, &new).unwrap_err(),
            "can't remove primary ipv4"
        );
    }

    #[test]
    fn second_primary_is_rejected() {
        let old = vec![ip("10.0.0.1", true, "")];
        let new = vec![ip("10.0.0.1", true, ""), ip("10.0.0.2", true, "")];
        assert_eq!(
            plan_ipv4_change(&old, &new).unwrap_err(),
            "can't set more than one primary ipv4"
        );
    }

    #[test]
    fn empty_set_is_rejected() {
        let old = vec![ip("10.0.0.1", true, "")];
        assert!(plan_ipv4_change(&old, &[]).is_err());
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
    async fn cloud_derived_attributes_plan_unknown_on_change() {
        let schema = EniResource::new()
            .schema(Context::new(), ResourceSchemaRequest)
            .await
            .schema;

        let prior = object(&[
            ("id", Dynamic::from("eni-1")),
            ("name", Dynamic::from("demo")),
            ("vpc_id", Dynamic::from("vpc-1")),
            ("subnet_id", Dynamic::from("subnet-1")),
            ("description", Dynamic::from("")),
            ("security_groups", strings(&["sg-1"])),
            ("orderly_security_groups", strings(&["sg-1"])),
            ("ipv4_count", Dynamic::Number(1.0)),
            ("mac", Dynamic::from("20:90:6F:00:00:01")),
        ]);
        let config = object(&[
            ("name", Dynamic::from("demo")),
            ("vpc_id", Dynamic::from("vpc-1")),
            ("subnet_id", Dynamic::from("subnet-1")),
            ("orderly_security_groups", strings(&["sg-2"])),
        ]);
        let mut proposed = prior.clone();
        if let Dynamic::Map(map) = &mut proposed {
            map.insert("orderly_security_groups".to_string(), strings(&["sg-2"]));
        }

        let plan = plan_change(&schema.block, &prior, proposed, &config);
        let planned = DynamicValue::new(plan.planned_state);

        assert!(planned.is_unknown_at(&path("security_groups")));
        assert!(planned.is_unknown_at(&path("ipv4_count")));
        assert_eq!(planned.get_string_list(&path("orderly_security_groups")), vec!["sg-2"]);
        assert_eq!(planned.get_string_opt(&path("id")).as_deref(), Some("eni-1"));
        assert_eq!(
            planned.get_string_opt(&path("mac")).as_deref(),
            Some("20:90:6F:00:00:01")
        );
        assert!(plan.requires_replace.is_empty());
    }
}
