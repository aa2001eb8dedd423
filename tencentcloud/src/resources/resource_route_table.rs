//! Route table resource implementation

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
use tfplug::validator::StringLengthValidator;

use super::common::{
    api_error, apply_tags, changed, create_time_attribute, extract_provider_data, id_attribute,
    path, require_client, required_string, set_tags, state_id, tags_attribute, update_tags,
    Outcome,
};
use crate::api::{tags_to_map, Client};

#[derive(Default)]
pub struct RouteTableResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl RouteTableResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for RouteTableResource {
    fn type_name(&self) -> &str {
        "tencentcloud_route_table"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to create a VPC routing table.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("ID of VPC to which the route table should be associated.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of routing table.")
                    .required()
                    .validator(StringLengthValidator::between(1, 60))
                    .build(),
            )
            .attribute(tags_attribute())
            .attribute(
                AttributeBuilder::new("subnet_ids", AttributeType::list_of(AttributeType::String))
                    .description("ID list of the subnets associated with this route table.")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("route_entry_ids", AttributeType::list_of(AttributeType::String))
                    .description("ID list of the routing entries.")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_default", AttributeType::Bool)
                    .description("Indicates whether it is the default routing table.")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
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
            .create_route_table(client, &request.planned_state, &mut state)
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
            Ok(id) => self.read_route_table(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "route table not found, removing from state");
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
            .update_route_table(client, &request.prior_state, &request.planned_state, &mut state)
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
                .route_tables()
                .delete(&id)
                .await
                .map_err(api_error("Failed to delete route table")),
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

impl RouteTableResource {
    async fn create_route_table(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let vpc_id = required_string(planned, "vpc_id")?;
        let name = required_string(planned, "name")?;

        let table = client
            .route_tables()
            .create(&vpc_id, &name, &[])
            .await
            .map_err(api_error("Failed to create route table"))?;
        let id = table.route_table_id;
        let _ = state.set_string(&path("id"), id.clone());

        apply_tags(client, "rtb", &id, &planned.get_string_map(&path("tags"))).await?;

        if !self.read_route_table(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read route table",
                format!("route table [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_route_table(
        &self,
        client: &Client,
        id: &str,
        state: &mut DynamicValue,
    ) -> Outcome<bool> {
        let Some(table) = client
            .route_tables()
            .describe_by_id(id)
            .await
            .map_err(api_error("Failed to read route table"))?
        else {
            return Ok(false);
        };

        let _ = state.set_string(&path("id"), table.route_table_id.clone());
        let _ = state.set_string(&path("vpc_id"), table.vpc_id.clone());
        let _ = state.set_string(&path("name"), table.route_table_name.clone());
        let _ = state.set_string_list(&path("subnet_ids"), table.subnet_ids());
        let _ = state.set_string_list(&path("route_entry_ids"), table.route_entry_ids());
        let _ = state.set_bool(&path("is_default"), table.main);
        let _ = state.set_string(&path("create_time"), table.created_time.clone());
        set_tags(state, tags_to_map(&table.tag_set));

        Ok(true)
    }

    async fn update_route_table(
        &self,
        client: &Client,
        prior: &DynamicValue,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let id = state_id(prior)?;

        if changed(prior, planned, "name") {
            client
                .route_tables()
                .modify_name(&id, &required_string(planned, "name")?)
                .await
                .map_err(api_error("Failed to update route table"))?;
        }

        update_tags(client, "rtb", &id, prior, planned).await?;

        if !self.read_route_table(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read route table",
                format!("route table [{}] not found after update", id),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceWithImportState for RouteTableResource {
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
impl ResourceWithConfigure for RouteTableResource {
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
