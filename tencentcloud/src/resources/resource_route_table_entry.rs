//! Route table entry resource implementation

use std::net::Ipv4Addr;

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::import::import_state_composite_id;
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
use tfplug::validator::{CidrValidator, StringOneOfValidator};

use super::common::{
    api_error, extract_provider_data, id_attribute, path, require_client, required_string,
    state_id, Outcome,
};
use crate::api::route_table::Route;
use crate::api::Client;
use crate::ids::{self, ROUTE_ENTRY_SEP};

const NEXT_TYPES: &[&str] = &[
    "CVM",
    "VPN",
    "DIRECTCONNECT",
    "PEERCONNECTION",
    "HAVIP",
    "NAT",
    "NORMAL_CVM",
    "EIP",
    "LOCAL_GATEWAY",
    "INTRANAT",
    "USER_CCN",
    "CCN",
    "GWLB",
];

/// Splits `"<route_id>.<route_table_id>"`
fn parse_entry_id(id: &str) -> Outcome<(u64, String)> {
    let parts = ids::split(id, ROUTE_ENTRY_SEP, 2)
        .map_err(|e| Diagnostic::error("Invalid route entry id", e.to_string()))?;
    let route_id = parts[0].parse::<u64>().map_err(|_| {
        Diagnostic::error(
            "Invalid route entry id",
            format!("route id [{}] is not a number", parts[0]),
        )
    })?;
    Ok((route_id, parts[1].clone()))
}

#[derive(Default)]
pub struct RouteTableEntryResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl RouteTableEntryResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for RouteTableEntryResource {
    fn type_name(&self) -> &str {
        "tencentcloud_route_table_entry"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to create an entry of a routing table.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("route_table_id", AttributeType::String)
                    .description("ID of routing table to which this entry belongs.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("destination_cidr_block", AttributeType::String)
                    .description("Destination address block.")
                    .required()
                    .force_new()
                    .validator(CidrValidator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("next_type", AttributeType::String)
                    .description("Type of next-hop. Valid values: `CVM`, `VPN`, `DIRECTCONNECT`, `PEERCONNECTION`, `HAVIP`, `NAT`, `NORMAL_CVM`, `EIP`, `LOCAL_GATEWAY`, `INTRANAT`, `USER_CCN`, `CCN` and `GWLB`.")
                    .required()
                    .force_new()
                    .validator(StringOneOfValidator::create(NEXT_TYPES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("next_hub", AttributeType::String)
                    .description("ID of next-hop gateway. Note: when `next_type` is EIP, `next_hub` should be `0`.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("Description of the routing table entry.")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("disabled", AttributeType::Bool)
                    .description("Whether the entry is disabled, default is `false`.")
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("route_item_id", AttributeType::String)
                    .description("ID of route entry.")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
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

        let next_type = request.config.get_string_opt(&path("next_type"));
        let next_hub = request.config.get_string_opt(&path("next_hub"));
        if let (Some("CVM"), Some(hub)) = (next_type.as_deref(), next_hub) {
            if hub.parse::<Ipv4Addr>().is_err() {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid next_hub",
                        format!("`next_hub` must be an IPv4 address when `next_type` is CVM, got '{}'", hub),
                    )
                    .with_attribute(path("next_hub")),
                );
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
        if let Err(diag) = self.create_entry(client, &request.planned_state, &mut state).await {
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
            Ok(id) => self.read_entry(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "route entry not found, removing from state");
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
        if let Err(diag) = self.update_entry(client, &request.planned_state, &mut state).await {
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
            let (route_id, table_id) = parse_entry_id(&state_id(&request.prior_state)?)?;
            client
                .route_tables()
                .delete_route(&table_id, route_id)
                .await
                .map_err(api_error("Failed to delete route entry"))
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

impl RouteTableEntryResource {
    async fn create_entry(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let table_id = required_string(planned, "route_table_id")?;
        let route = Route {
            destination_cidr_block: required_string(planned, "destination_cidr_block")?,
            gateway_type: required_string(planned, "next_type")?,
            gateway_id: required_string(planned, "next_hub")?,
            route_description: planned.get_string_opt(&path("description")).unwrap_or_default(),
            ..Default::default()
        };

        let route_id = client
            .route_tables()
            .create_route(&table_id, route)
            .await
            .map_err(api_error("Failed to create route entry"))?;
        let id = ids::join(&[&route_id.to_string(), &table_id], ROUTE_ENTRY_SEP);
        let _ = state.set_string(&path("id"), id.clone());

        if planned.get_bool_opt(&path("disabled")).unwrap_or(false) {
            client
                .route_tables()
                .set_routes_enabled(&table_id, &[route_id], false)
                .await
                .map_err(api_error("Failed to disable route entry"))?;
        }

        if !self.read_entry(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read route entry",
                format!("route entry [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_entry(&self, client: &Client, id: &str, state: &mut DynamicValue) -> Outcome<bool> {
        let (route_id, table_id) = parse_entry_id(id)?;

        let Some(table) = client
            .route_tables()
            .describe_by_id(&table_id)
            .await
            .map_err(api_error("Failed to read route entry"))?
        else {
            return Ok(false);
        };
        let Some(route) = table.route_set.iter().find(|r| r.route_id == route_id) else {
            return Ok(false);
        };

        let _ = state.set_string(&path("id"), id.to_string());
        let _ = state.set_string(&path("route_table_id"), table_id);
        let _ = state.set_string(
            &path("destination_cidr_block"),
            route.destination_cidr_block.clone(),
        );
        let _ = state.set_string(&path("next_type"), route.gateway_type.clone());
        let _ = state.set_string(&path("next_hub"), route.gateway_id.clone());
        if route.route_description.is_empty() {
            let _ = state.set_null(&path("description"));
        } else {
            let _ = state.set_string(&path("description"), route.route_description.clone());
        }
        let _ = state.set_bool(&path("disabled"), !route.enabled);
        let _ = state.set_string(&path("route_item_id"), route.route_item_id.clone());

        Ok(true)
    }

    async fn update_entry(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let id = state_id(planned)?;
        let (route_id, table_id) = parse_entry_id(&id)?;
        let disabled = planned.get_bool_opt(&path("disabled")).unwrap_or(false);

        client
            .route_tables()
            .set_routes_enabled(&table_id, &[route_id], !disabled)
            .await
            .map_err(api_error("Failed to update route entry"))?;

        if !self.read_entry(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read route entry",
                format!("route entry [{}] not found after update", id),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceWithImportState for RouteTableEntryResource {
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
        import_state_composite_id(&ctx, ROUTE_ENTRY_SEP, 2, &request, &mut response);
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for RouteTableEntryResource {
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
