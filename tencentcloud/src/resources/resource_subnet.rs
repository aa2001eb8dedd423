//! Subnet resource implementation

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
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{CidrValidator, StringLengthValidator};

use super::common::{
    api_error, apply_tags, changed, create_time_attribute, extract_provider_data, id_attribute,
    path, require_client, required_string, set_tags, state_id, tags_attribute, update_tags,
    Outcome,
};
use crate::api::subnet::CreateSubnetRequest;
use crate::api::{tags_to_map, Client};

#[derive(Default)]
pub struct SubnetResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl SubnetResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for SubnetResource {
    fn type_name(&self) -> &str {
        "tencentcloud_subnet"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to create a VPC subnet.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("ID of the VPC to be associated.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cidr_block", AttributeType::String)
                    .description("A network address block of the subnet.")
                    .required()
                    .force_new()
                    .validator(CidrValidator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("availability_zone", AttributeType::String)
                    .description("The availability zone within which the subnet should be created.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of subnet to be created.")
                    .required()
                    .validator(StringLengthValidator::between(1, 60))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_multicast", AttributeType::Bool)
                    .description("Specify whether the multicast is enabled. The default value is 'true'.")
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("route_table_id", AttributeType::String)
                    .description("ID of a routing table to which the subnet should be associated.")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(tags_attribute())
            .attribute(
                AttributeBuilder::new("is_default", AttributeType::Bool)
                    .description("Indicates whether it is the default VPC for this region.")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("available_ip_count", AttributeType::Number)
                    .description("The number of available IPs.")
                    .computed()
                    .build(),
            )
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
        if let Err(diag) = self
            .create_subnet(client, &request.planned_state, &mut state)
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
            Ok(id) => self.read_subnet(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "subnet not found, removing from state");
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
            .update_subnet(client, &request.prior_state, &request.planned_state, &mut state)
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
                .subnets()
                .delete(&id)
                .await
                .map_err(api_error("Failed to delete subnet")),
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

impl SubnetResource {
    async fn create_subnet(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let vpc_id = required_string(planned, "vpc_id")?;
        let route_table_id = planned.get_string_opt(&path("route_table_id"));
        if let Some(route_table_id) = &route_table_id {
            check_route_table(client, route_table_id, &vpc_id).await?;
        }

        let request = CreateSubnetRequest {
            vpc_id: vpc_id.clone(),
            subnet_name: required_string(planned, "name")?,
            cidr_block: required_string(planned, "cidr_block")?,
            zone: required_string(planned, "availability_zone")?,
            tags: vec![],
        };
        let subnet = client
            .subnets()
            .create(&request)
            .await
            .map_err(api_error("Failed to create subnet"))?;
        let id = subnet.subnet_id;
        let _ = state.set_string(&path("id"), id.clone());

        if !planned.get_bool_opt(&path("is_multicast")).unwrap_or(true) {
            client
                .subnets()
                .modify_attribute(&id, &request.subnet_name, false)
                .await
                .map_err(api_error("Failed to update subnet"))?;
        }

        if let Some(route_table_id) = route_table_id {
            client
                .subnets()
                .replace_route_table(&id, &route_table_id)
                .await
                .map_err(api_error("Failed to associate route table"))?;
        }

        apply_tags(client, "subnet", &id, &planned.get_string_map(&path("tags"))).await?;

        if !self.read_subnet(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read subnet",
                format!("subnet [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_subnet(&self, client: &Client, id: &str, state: &mut DynamicValue) -> Outcome<bool> {
        let Some(subnet) = client
            .subnets()
            .describe_by_id(id)
            .await
            .map_err(api_error("Failed to read subnet"))?
        else {
            return Ok(false);
        };

        let _ = state.set_string(&path("id"), subnet.subnet_id.clone());
        let _ = state.set_string(&path("vpc_id"), subnet.vpc_id.clone());
        let _ = state.set_string(&path("name"), subnet.subnet_name.clone());
        let _ = state.set_string(&path("cidr_block"), subnet.cidr_block.clone());
        let _ = state.set_string(&path("availability_zone"), subnet.zone.clone());
        let _ = state.set_bool(&path("is_multicast"), subnet.enable_broadcast);
        let _ = state.set_string(&path("route_table_id"), subnet.route_table_id.clone());
        let _ = state.set_bool(&path("is_default"), subnet.is_default);
        let _ = state.set_i64(
            &path("available_ip_count"),
            subnet.available_ip_address_count as i64,
        );
        let _ = state.set_string(&path("create_time"), subnet.created_time.clone());
        set_tags(state, tags_to_map(&subnet.tag_set));

        Ok(true)
    }

    async fn update_subnet(
        &self,
        client: &Client,
        prior: &DynamicValue,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let id = state_id(prior)?;

        if changed(prior, planned, "name") || changed(prior, planned, "is_multicast") {
            client
                .subnets()
                .modify_attribute(
                    &id,
                    &required_string(planned, "name")?,
                    planned.get_bool_opt(&path("is_multicast")).unwrap_or(true),
                )
                .await
                .map_err(api_error("Failed to update subnet"))?;
        }

        if changed(prior, planned, "route_table_id") {
            if let Some(route_table_id) = planned.get_string_opt(&path("route_table_id")) {
                let vpc_id = required_string(planned, "vpc_id")?;
                check_route_table(client, &route_table_id, &vpc_id).await?;
                client
                    .subnets()
                    .replace_route_table(&id, &route_table_id)
                    .await
                    .map_err(api_error("Failed to associate route table"))?;
            }
        }

        update_tags(client, "subnet", &id, prior, planned).await?;

        if !self.read_subnet(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read subnet",
                format!("subnet [{}] not found after update", id),
            ));
        }
        Ok(())
    }
}

/// The route table must exist and belong to the subnet's VPC
async fn check_route_table(client: &Client, route_table_id: &str, vpc_id: &str) -> Outcome<()> {
    let table = client
        .route_tables()
        .describe_by_id(route_table_id)
        .await
        .map_err(api_error("Failed to read route table"))?;

    match table {
        Some(table) if table.vpc_id == vpc_id => Ok(()),
        Some(table) => Err(Diagnostic::error(
            "Invalid route table",
            format!(
                "route table [{}] belongs to vpc [{}], not [{}]",
                route_table_id, table.vpc_id, vpc_id
            ),
        )
        .with_attribute(path("route_table_id"))),
        None => Err(Diagnostic::error(
            "Invalid route table",
            format!("route table [{}] not found", route_table_id),
        )
        .with_attribute(path("route_table_id"))),
    }
}

#[async_trait]
impl ResourceWithImportState for SubnetResource {
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
impl ResourceWithConfigure for SubnetResource {
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
