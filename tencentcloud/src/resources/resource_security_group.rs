//! Security group resource implementation

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
use tfplug::validator::StringLengthValidator;

use super::common::{
    api_error, changed, extract_provider_data, id_attribute, path, require_client,
    required_string, set_tags, state_id, tags_attribute, update_tags, Outcome,
};
use crate::api::{tags_from_map, tags_to_map, Client};

#[derive(Default)]
pub struct SecurityGroupResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl SecurityGroupResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for SecurityGroupResource {
    fn type_name(&self) -> &str {
        "tencentcloud_security_group"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to create a security group.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the security group to be queried.")
                    .required()
                    .validator(StringLengthValidator::between(1, 60))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("Description of the security group.")
                    .default(StaticDefault::string(""))
                    .validator(StringLengthValidator::at_most(100))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("project_id", AttributeType::Number)
                    .description("Project ID of the security group.")
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
        if let Err(diag) = self
            .create_security_group(client, &request.planned_state, &mut state)
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
            Ok(id) => self.read_security_group(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "security group not found, removing from state");
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
            .update_security_group(client, &request.prior_state, &request.planned_state, &mut state)
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
                .security_groups()
                .delete(&id)
                .await
                .map_err(api_error("Failed to delete security group")),
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

impl SecurityGroupResource {
    async fn create_security_group(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let group = client
            .security_groups()
            .create(
                &required_string(planned, "name")?,
                &planned.get_string_opt(&path("description")).unwrap_or_default(),
                planned.get_i64_opt(&path("project_id")),
                &tags_from_map(&planned.get_string_map(&path("tags"))),
            )
            .await
            .map_err(api_error("Failed to create security group"))?;
        let id = group.security_group_id;
        let _ = state.set_string(&path("id"), id.clone());

        if !self.read_security_group(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read security group",
                format!("security group [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_security_group(
        &self,
        client: &Client,
        id: &str,
        state: &mut DynamicValue,
    ) -> Outcome<bool> {
        let Some(group) = client
            .security_groups()
            .describe_by_id(id)
            .await
            .map_err(api_error("Failed to read security group"))?
        else {
            return Ok(false);
        };

        let _ = state.set_string(&path("id"), group.security_group_id.clone());
        let _ = state.set_string(&path("name"), group.security_group_name.clone());
        let _ = state.set_string(&path("description"), group.security_group_desc.clone());
        let _ = state.set_i64(
            &path("project_id"),
            group.project_id.parse::<i64>().unwrap_or_default(),
        );
        set_tags(state, tags_to_map(&group.tag_set));

        Ok(true)
    }

    async fn update_security_group(
        &self,
        client: &Client,
        prior: &DynamicValue,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let id = state_id(prior)?;

        if changed(prior, planned, "name") || changed(prior, planned, "description") {
            client
                .security_groups()
                .modify_attribute(
                    &id,
                    &required_string(planned, "name")?,
                    &planned.get_string_opt(&path("description")).unwrap_or_default(),
                )
                .await
                .map_err(api_error("Failed to update security group"))?;
        }

        update_tags(client, "securitygroup", &id, prior, planned).await?;

        if !self.read_security_group(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read security group",
                format!("security group [{}] not found after update", id),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceWithImportState for SecurityGroupResource {
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
impl ResourceWithConfigure for SecurityGroupResource {
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
