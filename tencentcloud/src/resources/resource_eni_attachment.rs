//! ENI attachment resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

use super::common::{
    api_error, extract_provider_data, id_attribute, path, require_client, required_string,
    state_id, Outcome,
};
use crate::api::Client;

/// Binds an ENI to a CVM instance. The ENI id doubles as the attachment id
/// since an ENI has at most one instance.
#[derive(Default)]
pub struct EniAttachmentResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl EniAttachmentResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for EniAttachmentResource {
    fn type_name(&self) -> &str {
        "tencentcloud_eni_attachment"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to attach an ENI to a CVM instance.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("eni_id", AttributeType::String)
                    .description("ID of the ENI.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("instance_id", AttributeType::String)
                    .description("ID of the instance which bind the ENI.")
                    .required()
                    .force_new()
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
                tracing::warn!(log_id = %ctx.log_id(), "eni attachment not found, removing from state");
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
            let eni_id = state_id(&request.prior_state)?;
            let instance_id = required_string(&request.prior_state, "instance_id")?;
            client
                .enis()
                .detach(&eni_id, &instance_id)
                .await
                .map_err(api_error("Failed to detach ENI"))
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

impl EniAttachmentResource {
    async fn create_attachment(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let eni_id = required_string(planned, "eni_id")?;
        let instance_id = required_string(planned, "instance_id")?;

        client
            .enis()
            .attach(&eni_id, &instance_id)
            .await
            .map_err(api_error("Failed to attach ENI"))?;
        let _ = state.set_string(&path("id"), eni_id.clone());

        if !self.read_attachment(client, &eni_id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read ENI attachment",
                format!("ENI [{}] is not attached after create", eni_id),
            ));
        }
        Ok(())
    }

    async fn read_attachment(
        &self,
        client: &Client,
        eni_id: &str,
        state: &mut DynamicValue,
    ) -> Outcome<bool> {
        let Some(eni) = client
            .enis()
            .describe_by_id(eni_id)
            .await
            .map_err(api_error("Failed to read ENI attachment"))?
        else {
            return Ok(false);
        };
        let Some(instance_id) = eni.attached_instance() else {
            return Ok(false);
        };

        let _ = state.set_string(&path("id"), eni_id.to_string());
        let _ = state.set_string(&path("eni_id"), eni_id.to_string());
        let _ = state.set_string(&path("instance_id"), instance_id.to_string());

        Ok(true)
    }
}

#[async_trait]
impl ResourceWithImportState for EniAttachmentResource {
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
impl ResourceWithConfigure for EniAttachmentResource {
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
