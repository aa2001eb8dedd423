//! gRPC service implementation
//!
//! Bridges the `tfplugin6.Provider` service onto the factory-based Provider
//! API. Every RPC gets a fresh Context and, where needed, a fresh resource or
//! data source instance configured with the stored provider data.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::error::TfplugError;
use crate::plan_modifier::values_equal;
use crate::proto as pb;
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderMetaSchemaRequest,
    ProviderMetadataRequest, ProviderSchemaRequest, ResourceFactory, StopProviderRequest,
    ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceSchemaRequest,
    ResourceWithConfigure, UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{
    AttributeType, Block, DefaultRequest, NestingMode, PlanModifierRequest, Schema, StringKind,
    ValidatorRequest,
};
use crate::types::{
    has_errors, AttributePath, AttributePathStep, ClientCapabilities, Deferred, DeferredReason,
    Diagnostic, DiagnosticSeverity, Dynamic, DynamicValue, ServerCapabilities,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use tracing::{debug, warn, Instrument};

type ProviderData = Option<Arc<dyn Any + Send + Sync>>;

pub struct GrpcProviderServer<P: Provider> {
    provider: Arc<RwLock<P>>,
    resources: HashMap<String, ResourceFactory>,
    data_sources: HashMap<String, DataSourceFactory>,
    provider_data: RwLock<ProviderData>,
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    pub fn new(provider: P) -> Self {
        let resources = provider.resources();
        let data_sources = provider.data_sources();
        Self {
            provider: Arc::new(RwLock::new(provider)),
            resources,
            data_sources,
            provider_data: RwLock::new(None),
        }
    }

    fn new_resource(&self, type_name: &str) -> Result<Box<dyn ResourceWithConfigure>, Status> {
        self.resources
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| TfplugError::ResourceNotFound(type_name.to_string()).into())
    }

    fn new_data_source(
        &self,
        type_name: &str,
    ) -> Result<Box<dyn DataSourceWithConfigure>, Status> {
        self.data_sources
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| TfplugError::DataSourceNotFound(type_name.to_string()).into())
    }

    /// Instantiates a resource and hands it the provider data
    async fn configured_resource(
        &self,
        ctx: &Context,
        type_name: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Box<dyn ResourceWithConfigure>, Status> {
        let mut resource = self.new_resource(type_name)?;
        let provider_data = self.provider_data.read().await.clone();
        if provider_data.is_none() {
            diagnostics.push(Diagnostic::error(
                TfplugError::ProviderNotConfigured.to_string(),
                format!("{} was used before the provider was configured", type_name),
            ));
            return Ok(resource);
        }
        let response = resource
            .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
            .await;
        diagnostics.extend(response.diagnostics);
        Ok(resource)
    }

    async fn configured_data_source(
        &self,
        ctx: &Context,
        type_name: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Box<dyn DataSourceWithConfigure>, Status> {
        let mut data_source = self.new_data_source(type_name)?;
        let provider_data = self.provider_data.read().await.clone();
        if provider_data.is_none() {
            diagnostics.push(Diagnostic::error(
                TfplugError::ProviderNotConfigured.to_string(),
                format!("{} was read before the provider was configured", type_name),
            ));
            return Ok(data_source);
        }
        let response = data_source
            .configure(ctx.clone(), ConfigureDataSourceRequest { provider_data })
            .await;
        diagnostics.extend(response.diagnostics);
        Ok(data_source)
    }

    async fn resource_schema(
        &self,
        ctx: &Context,
        resource: &dyn ResourceWithConfigure,
    ) -> Schema {
        resource
            .schema(ctx.clone(), ResourceSchemaRequest)
            .await
            .schema
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> pb::ProviderService for GrpcProviderServer<P> {
    async fn get_metadata(
        &self,
        _request: Request<pb::get_metadata::Request>,
    ) -> Result<Response<pb::get_metadata::Response>, Status> {
        let ctx = Context::new();
        let metadata = self
            .provider
            .read()
            .await
            .metadata(ctx, ProviderMetadataRequest)
            .await;

        let mut resources: Vec<_> = self.resources.keys().cloned().collect();
        resources.sort();
        let mut data_sources: Vec<_> = self.data_sources.keys().cloned().collect();
        data_sources.sort();

        Ok(Response::new(pb::get_metadata::Response {
            server_capabilities: Some(server_capabilities_to_proto(
                &metadata.server_capabilities,
            )),
            diagnostics: vec![],
            data_sources: data_sources
                .into_iter()
                .map(|type_name| pb::get_metadata::DataSourceMetadata { type_name })
                .collect(),
            resources: resources
                .into_iter()
                .map(|type_name| pb::get_metadata::ResourceMetadata { type_name })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<pb::get_provider_schema::Request>,
    ) -> Result<Response<pb::get_provider_schema::Response>, Status> {
        let ctx = Context::new();
        let mut diagnostics = Vec::new();

        let provider = self.provider.read().await;
        let provider_schema = provider.schema(ctx.clone(), ProviderSchemaRequest).await;
        diagnostics.extend(provider_schema.diagnostics);
        let meta_schema = provider
            .meta_schema(ctx.clone(), ProviderMetaSchemaRequest)
            .await;
        diagnostics.extend(meta_schema.diagnostics);
        let metadata = provider
            .metadata(ctx.clone(), ProviderMetadataRequest)
            .await;
        drop(provider);

        let mut resource_schemas = HashMap::new();
        for (type_name, factory) in &self.resources {
            let response = factory().schema(ctx.clone(), ResourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            resource_schemas.insert(type_name.clone(), schema_to_proto(&response.schema));
        }

        let mut data_source_schemas = HashMap::new();
        for (type_name, factory) in &self.data_sources {
            let response = factory().schema(ctx.clone(), DataSourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            data_source_schemas.insert(type_name.clone(), schema_to_proto(&response.schema));
        }

        debug!(
            log_id = %ctx.log_id(),
            resources = resource_schemas.len(),
            data_sources = data_source_schemas.len(),
            "GetProviderSchema"
        );

        Ok(Response::new(pb::get_provider_schema::Response {
            provider: Some(schema_to_proto(&provider_schema.schema)),
            resource_schemas,
            data_source_schemas,
            diagnostics: diagnostics_to_proto(diagnostics),
            provider_meta: meta_schema.schema.as_ref().map(schema_to_proto),
            server_capabilities: Some(server_capabilities_to_proto(
                &metadata.server_capabilities,
            )),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<pb::validate_provider_config::Request>,
    ) -> Result<Response<pb::validate_provider_config::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::new();
        let config = decode_dynamic_value(&req.config)?;

        let provider = self.provider.read().await;
        let schema = provider.schema(ctx.clone(), ProviderSchemaRequest).await.schema;
        let mut diagnostics = Vec::new();
        validate_block(&schema.block, &config.value, &AttributePath::root(), &mut diagnostics);

        let response = provider
            .validate(ctx, ValidateProviderConfigRequest { config })
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(pb::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<pb::validate_resource_config::Request>,
    ) -> Result<Response<pb::validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::new();
        let resource = self.new_resource(&req.type_name)?;
        let schema = self.resource_schema(&ctx, resource.as_ref()).await;
        let config = decode_dynamic_value(&req.config)?;

        let mut diagnostics = Vec::new();
        validate_block(&schema.block, &config.value, &AttributePath::root(), &mut diagnostics);

        let response = resource
            .validate(
                ctx,
                ValidateResourceConfigRequest {
                    type_name: req.type_name,
                    config,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(pb::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<pb::validate_data_resource_config::Request>,
    ) -> Result<Response<pb::validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::new();
        let data_source = self.new_data_source(&req.type_name)?;
        let schema = data_source
            .schema(ctx.clone(), DataSourceSchemaRequest)
            .await
            .schema;
        let config = decode_dynamic_value(&req.config)?;

        let mut diagnostics = Vec::new();
        validate_block(&schema.block, &config.value, &AttributePath::root(), &mut diagnostics);

        let response = data_source
            .validate(
                ctx,
                ValidateDataSourceConfigRequest {
                    type_name: req.type_name,
                    config,
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(pb::validate_data_resource_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<pb::upgrade_resource_state::Request>,
    ) -> Result<Response<pb::upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::new();
        let resource = self.new_resource(&req.type_name)?;
        let schema = self.resource_schema(&ctx, resource.as_ref()).await;

        if req.version > schema.version {
            let err = TfplugError::UpgradeFailed(format!(
                "state version {} is newer than schema version {}",
                req.version, schema.version
            ));
            return Ok(Response::new(pb::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: diagnostics_to_proto(vec![Diagnostic::error(
                    "Unsupported state version",
                    err.to_string(),
                )]),
            }));
        }

        let raw = req.raw_state.map(|raw| raw.json).unwrap_or_default();
        let state = DynamicValue::decode_json(&raw)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        let upgraded = DynamicValue::new(conform_block(&schema.block, &state.value, false));

        Ok(Response::new(pb::upgrade_resource_state::Response {
            upgraded_state: Some(encode_dynamic_value(&upgraded)?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<pb::configure_provider::Request>,
    ) -> Result<Response<pb::configure_provider::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::new();
        let config = decode_dynamic_value(&req.config)?;

        let response = self
            .provider
            .write()
            .await
            .configure(
                ctx.clone(),
                ConfigureProviderRequest {
                    terraform_version: req.terraform_version,
                    config,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;

        if !has_errors(&response.diagnostics) {
            *self.provider_data.write().await = response.provider_data;
        }
        debug!(log_id = %ctx.log_id(), "provider configured");

        Ok(Response::new(pb::configure_provider::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<pb::read_resource::Request>,
    ) -> Result<Response<pb::read_resource::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::new();
        let started = Instant::now();
        let mut diagnostics = Vec::new();
        let resource = self
            .configured_resource(&ctx, &req.type_name, &mut diagnostics)
            .await?;
        let current_state = decode_dynamic_value(&req.current_state)?;

        if has_errors(&diagnostics) {
            return Ok(Response::new(pb::read_resource::Response {
                new_state: Some(encode_dynamic_value(&current_state)?),
                diagnostics: diagnostics_to_proto(diagnostics),
                private: req.private,
                deferred: None,
            }));
        }

        let schema = self.resource_schema(&ctx, resource.as_ref()).await;
        let response = resource
            .read(
                ctx.clone(),
                ReadResourceRequest {
                    type_name: req.type_name.clone(),
                    current_state,
                    private: req.private,
                    provider_meta: decode_optional(&req.provider_meta)?,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .instrument(ctx.span())
            .await;
        diagnostics.extend(response.diagnostics);

        let new_state = match response.new_state {
            Some(state) => DynamicValue::new(conform_block(&schema.block, &state.value, true)),
            None => {
                debug!(log_id = %ctx.log_id(), type_name = %req.type_name, "resource is gone, removing from state");
                DynamicValue::null()
            }
        };
        log_elapsed(&ctx, &req.type_name, "read", started);

        Ok(Response::new(pb::read_resource::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            diagnostics: diagnostics_to_proto(diagnostics),
            private: response.private,
            deferred: response.deferred.as_ref().map(deferred_to_proto),
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<pb::plan_resource_change::Request>,
    ) -> Result<Response<pb::plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::new();
        let resource = self.new_resource(&req.type_name)?;
        let schema = self.resource_schema(&ctx, resource.as_ref()).await;

        let prior_state = decode_dynamic_value(&req.prior_state)?;
        let proposed_new_state = decode_dynamic_value(&req.proposed_new_state)?;
        let config = decode_dynamic_value(&req.config)?;

        // Destroy plans pass through untouched
        if proposed_new_state.is_null() {
            return Ok(Response::new(pb::plan_resource_change::Response {
                planned_state: req.proposed_new_state,
                requires_replace: vec![],
                planned_private: req.prior_private,
                diagnostics: vec![],
                legacy_type_system: false,
                deferred: None,
            }));
        }

        let plan = plan_change(
            &schema.block,
            &prior_state.value,
            proposed_new_state.value,
            &config.value,
        );
        debug!(
            log_id = %ctx.log_id(),
            type_name = %req.type_name,
            replace = plan.requires_replace.len(),
            "PlanResourceChange"
        );

        Ok(Response::new(pb::plan_resource_change::Response {
            planned_state: Some(encode_dynamic_value(&DynamicValue::new(plan.planned_state))?),
            requires_replace: plan
                .requires_replace
                .iter()
                .map(attribute_path_to_proto)
                .collect(),
            planned_private: req.prior_private,
            diagnostics: diagnostics_to_proto(plan.diagnostics),
            legacy_type_system: false,
            deferred: None,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<pb::apply_resource_change::Request>,
    ) -> Result<Response<pb::apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::new();
        let started = Instant::now();
        let mut diagnostics = Vec::new();
        let resource = self
            .configured_resource(&ctx, &req.type_name, &mut diagnostics)
            .await?;

        let prior_state = decode_dynamic_value(&req.prior_state)?;
        let planned_state = decode_dynamic_value(&req.planned_state)?;
        let config = decode_dynamic_value(&req.config)?;
        let provider_meta = decode_optional(&req.provider_meta)?;

        if has_errors(&diagnostics) {
            return Ok(Response::new(pb::apply_resource_change::Response {
                new_state: Some(encode_dynamic_value(&prior_state)?),
                private: vec![],
                diagnostics: diagnostics_to_proto(diagnostics),
                legacy_type_system: false,
            }));
        }

        let schema = self.resource_schema(&ctx, resource.as_ref()).await;

        let (op, new_state, private) = if prior_state.is_null() {
            let response = resource
                .create(
                    ctx.clone(),
                    CreateResourceRequest {
                        type_name: req.type_name.clone(),
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .instrument(ctx.span())
                .await;
            diagnostics.extend(response.diagnostics);
            // A failed create that never obtained an id leaves nothing to track
            let new_state = if has_errors(&diagnostics)
                && !response.new_state.is_set(&AttributePath::new("id"))
            {
                DynamicValue::null()
            } else {
                response.new_state
            };
            ("create", new_state, response.private)
        } else if planned_state.is_null() {
            let response = resource
                .delete(
                    ctx.clone(),
                    DeleteResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior_state.clone(),
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .instrument(ctx.span())
                .await;
            diagnostics.extend(response.diagnostics);
            let new_state = if has_errors(&diagnostics) {
                prior_state
            } else {
                DynamicValue::null()
            };
            ("delete", new_state, vec![])
        } else {
            let response = resource
                .update(
                    ctx.clone(),
                    UpdateResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state,
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .instrument(ctx.span())
                .await;
            diagnostics.extend(response.diagnostics);
            ("update", response.new_state, response.private)
        };

        let new_state = DynamicValue::new(conform_block(&schema.block, &new_state.value, true));
        if has_errors(&diagnostics) {
            warn!(log_id = %ctx.log_id(), type_name = %req.type_name, op, "apply finished with errors");
        }
        log_elapsed(&ctx, &req.type_name, op, started);

        Ok(Response::new(pb::apply_resource_change::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            private,
            diagnostics: diagnostics_to_proto(diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<pb::import_resource_state::Request>,
    ) -> Result<Response<pb::import_resource_state::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::new();
        let mut diagnostics = Vec::new();
        let resource = self
            .configured_resource(&ctx, &req.type_name, &mut diagnostics)
            .await?;

        let Some(importer) = resource.as_import_state() else {
            diagnostics.push(Diagnostic::error(
                "Resource Import Not Implemented",
                format!("{} does not support import", req.type_name),
            ));
            return Ok(Response::new(pb::import_resource_state::Response {
                imported_resources: vec![],
                diagnostics: diagnostics_to_proto(diagnostics),
                deferred: None,
            }));
        };

        let schema = self.resource_schema(&ctx, resource.as_ref()).await;
        let response = importer
            .import_state(
                ctx.clone(),
                ImportResourceStateRequest {
                    type_name: req.type_name.clone(),
                    id: req.id.clone(),
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .instrument(ctx.span())
            .await;
        diagnostics.extend(response.diagnostics);

        let mut imported_resources = Vec::with_capacity(response.imported_resources.len());
        for imported in response.imported_resources {
            let state = DynamicValue::new(conform_block(&schema.block, &imported.state.value, true));
            imported_resources.push(pb::import_resource_state::ImportedResource {
                type_name: imported.type_name,
                state: Some(encode_dynamic_value(&state)?),
                private: imported.private,
            });
        }
        debug!(log_id = %ctx.log_id(), type_name = %req.type_name, id = %req.id, "ImportResourceState");

        Ok(Response::new(pb::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(diagnostics),
            deferred: response.deferred.as_ref().map(deferred_to_proto),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<pb::read_data_source::Request>,
    ) -> Result<Response<pb::read_data_source::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::new();
        let started = Instant::now();
        let mut diagnostics = Vec::new();
        let data_source = self
            .configured_data_source(&ctx, &req.type_name, &mut diagnostics)
            .await?;
        let config = decode_dynamic_value(&req.config)?;

        if has_errors(&diagnostics) {
            return Ok(Response::new(pb::read_data_source::Response {
                state: None,
                diagnostics: diagnostics_to_proto(diagnostics),
                deferred: None,
            }));
        }

        let schema = data_source
            .schema(ctx.clone(), DataSourceSchemaRequest)
            .await
            .schema;
        let response = data_source
            .read(
                ctx.clone(),
                ReadDataSourceRequest {
                    type_name: req.type_name.clone(),
                    config,
                    provider_meta: decode_optional(&req.provider_meta)?,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .instrument(ctx.span())
            .await;
        diagnostics.extend(response.diagnostics);

        let state = DynamicValue::new(conform_block(&schema.block, &response.state.value, true));
        log_elapsed(&ctx, &req.type_name, "read", started);

        Ok(Response::new(pb::read_data_source::Response {
            state: Some(encode_dynamic_value(&state)?),
            diagnostics: diagnostics_to_proto(diagnostics),
            deferred: response.deferred.as_ref().map(deferred_to_proto),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<pb::stop_provider::Request>,
    ) -> Result<Response<pb::stop_provider::Response>, Status> {
        let response = self
            .provider
            .read()
            .await
            .stop(Context::new(), StopProviderRequest)
            .await;

        Ok(Response::new(pb::stop_provider::Response {
            error: response.error.unwrap_or_default(),
        }))
    }
}

fn log_elapsed(ctx: &Context, type_name: &str, op: &str, started: Instant) {
    debug!(
        log_id = %ctx.log_id(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "resource.{}.{}",
        type_name,
        op
    );
}

/// Result of planning a create or update
pub struct PlannedChange {
    pub planned_state: Dynamic,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Computes the planned state from the proposed new state.
///
/// Defaults fill null config values, computed attributes the user left
/// unset become unknown whenever the object is created or changes, and the
/// attribute plan modifiers run last.
pub fn plan_change(
    block: &Block,
    prior_state: &Dynamic,
    proposed_new_state: Dynamic,
    config: &Dynamic,
) -> PlannedChange {
    let mut planned_state = proposed_new_state;
    apply_defaults(block, config, &mut planned_state, &AttributePath::root());

    let changed = prior_state.is_null() || !values_equal(&planned_state, prior_state);

    let mut requires_replace = Vec::new();
    let mut diagnostics = Vec::new();
    plan_block(
        block,
        config,
        prior_state,
        &mut planned_state,
        &AttributePath::root(),
        changed,
        &mut requires_replace,
        &mut diagnostics,
    );

    PlannedChange {
        planned_state,
        requires_replace,
        diagnostics,
    }
}

fn child<'a>(value: &'a Dynamic, name: &str) -> &'a Dynamic {
    match value {
        Dynamic::Map(m) => m.get(name).unwrap_or(&Dynamic::Null),
        _ => &Dynamic::Null,
    }
}

fn element(value: &Dynamic, idx: usize) -> &Dynamic {
    match value {
        Dynamic::List(items) => items.get(idx).unwrap_or(&Dynamic::Null),
        _ => &Dynamic::Null,
    }
}

fn apply_defaults(block: &Block, config: &Dynamic, planned: &mut Dynamic, path: &AttributePath) {
    let Dynamic::Map(planned_map) = planned else {
        return;
    };

    for attr in &block.attributes {
        let Some(default) = &attr.default else {
            continue;
        };
        if child(config, &attr.name).is_null() {
            let response = default.default_value(DefaultRequest {
                path: path.clone().attribute(&attr.name),
            });
            planned_map.insert(attr.name.clone(), response.value);
        }
    }

    for nested in &block.block_types {
        let nested_config = child(config, &nested.type_name);
        let Some(nested_planned) = planned_map.get_mut(&nested.type_name) else {
            continue;
        };
        let nested_path = path.clone().attribute(&nested.type_name);
        match (nested.nesting, nested_planned) {
            (NestingMode::Single, value) => {
                apply_defaults(&nested.block, nested_config, value, &nested_path)
            }
            (_, Dynamic::List(items)) => {
                for (idx, item) in items.iter_mut().enumerate() {
                    apply_defaults(
                        &nested.block,
                        element(nested_config, idx),
                        item,
                        &nested_path.clone().index(idx as i64),
                    );
                }
            }
            _ => {}
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn plan_block(
    block: &Block,
    config: &Dynamic,
    prior: &Dynamic,
    planned: &mut Dynamic,
    path: &AttributePath,
    changed: bool,
    requires_replace: &mut Vec<AttributePath>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Dynamic::Map(planned_map) = planned else {
        return;
    };

    for attr in &block.attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let config_value = child(config, &attr.name).clone();
        let state_value = child(prior, &attr.name).clone();
        let mut plan_value = planned_map
            .get(&attr.name)
            .cloned()
            .unwrap_or(Dynamic::Null);

        if attr.computed && attr.default.is_none() && config_value.is_null() && changed {
            plan_value = Dynamic::Unknown;
        }

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify(PlanModifierRequest {
                config_value: config_value.clone(),
                state_value: state_value.clone(),
                plan_value,
                path: attr_path.clone(),
            });
            plan_value = response.plan_value;
            if response.requires_replace && !requires_replace.contains(&attr_path) {
                requires_replace.push(attr_path.clone());
            }
            diagnostics.extend(response.diagnostics);
        }

        planned_map.insert(attr.name.clone(), plan_value);
    }

    for nested in &block.block_types {
        let nested_path = path.clone().attribute(&nested.type_name);
        let nested_config = child(config, &nested.type_name);
        let nested_prior = child(prior, &nested.type_name);
        let Some(nested_planned) = planned_map.get_mut(&nested.type_name) else {
            continue;
        };
        match (nested.nesting, nested_planned) {
            (NestingMode::Single, value) => plan_block(
                &nested.block,
                nested_config,
                nested_prior,
                value,
                &nested_path,
                changed,
                requires_replace,
                diagnostics,
            ),
            (_, Dynamic::List(items)) => {
                for (idx, item) in items.iter_mut().enumerate() {
                    plan_block(
                        &nested.block,
                        element(nested_config, idx),
                        element(nested_prior, idx),
                        item,
                        &nested_path.clone().index(idx as i64),
                        changed,
                        requires_replace,
                        diagnostics,
                    );
                }
            }
            _ => {}
        }
    }
}

/// Runs attribute validators over known values of a block
pub fn validate_block(
    block: &Block,
    config: &Dynamic,
    path: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if !matches!(config, Dynamic::Map(_)) {
        return;
    }

    for attr in &block.attributes {
        let value = child(config, &attr.name);
        if value.is_null() || !value.is_fully_known() {
            continue;
        }
        for validator in &attr.validators {
            let response = validator.validate(ValidatorRequest {
                config_value: value,
                path: path.clone().attribute(&attr.name),
            });
            diagnostics.extend(response.diagnostics);
        }
    }

    for nested in &block.block_types {
        let nested_path = path.clone().attribute(&nested.type_name);
        match (nested.nesting, child(config, &nested.type_name)) {
            (NestingMode::Single, value) => {
                validate_block(&nested.block, value, &nested_path, diagnostics)
            }
            (_, Dynamic::List(items)) => {
                for (idx, item) in items.iter().enumerate() {
                    validate_block(
                        &nested.block,
                        item,
                        &nested_path.clone().index(idx as i64),
                        diagnostics,
                    );
                }
            }
            _ => {}
        }
    }
}

/// Shapes a value so it carries exactly the attributes and blocks of the
/// schema. Missing attributes become null and missing nested blocks become
/// empty collections. With `strip_unknown`, leftover unknowns become null.
pub fn conform_block(block: &Block, value: &Dynamic, strip_unknown: bool) -> Dynamic {
    let Dynamic::Map(map) = value else {
        return if strip_unknown && value.is_unknown() {
            Dynamic::Null
        } else {
            value.clone()
        };
    };

    let mut out = HashMap::with_capacity(block.attributes.len() + block.block_types.len());
    for attr in &block.attributes {
        let raw = map.get(&attr.name).unwrap_or(&Dynamic::Null);
        out.insert(
            attr.name.clone(),
            conform_value(&attr.r#type, raw, strip_unknown),
        );
    }

    for nested in &block.block_types {
        let raw = map.get(&nested.type_name).unwrap_or(&Dynamic::Null);
        let conformed = match (nested.nesting, raw) {
            (NestingMode::Single, Dynamic::Map(_)) => {
                conform_block(&nested.block, raw, strip_unknown)
            }
            (NestingMode::Single, Dynamic::List(items)) => items
                .first()
                .map(|item| conform_block(&nested.block, item, strip_unknown))
                .unwrap_or(Dynamic::Null),
            (NestingMode::Single, _) => Dynamic::Null,
            (_, Dynamic::List(items)) => Dynamic::List(
                items
                    .iter()
                    .map(|item| conform_block(&nested.block, item, strip_unknown))
                    .collect(),
            ),
            (_, Dynamic::Unknown) if !strip_unknown => Dynamic::Unknown,
            (_, _) => Dynamic::List(vec![]),
        };
        out.insert(nested.type_name.clone(), conformed);
    }

    Dynamic::Map(out)
}

fn conform_value(ty: &AttributeType, value: &Dynamic, strip_unknown: bool) -> Dynamic {
    match (ty, value) {
        (_, Dynamic::Unknown) if strip_unknown => Dynamic::Null,
        (AttributeType::Object(fields), Dynamic::Map(map)) => Dynamic::Map(
            fields
                .iter()
                .map(|(name, field_ty)| {
                    let raw = map.get(name).unwrap_or(&Dynamic::Null);
                    (name.clone(), conform_value(field_ty, raw, strip_unknown))
                })
                .collect(),
        ),
        (AttributeType::List(elem) | AttributeType::Set(elem), Dynamic::List(items)) => {
            Dynamic::List(
                items
                    .iter()
                    .map(|item| conform_value(elem, item, strip_unknown))
                    .collect(),
            )
        }
        (AttributeType::Map(elem), Dynamic::Map(map)) => Dynamic::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), conform_value(elem, v, strip_unknown)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

#[allow(clippy::result_large_err)]
fn decode_dynamic_value(value: &Option<pb::DynamicValue>) -> Result<DynamicValue, Status> {
    let Some(value) = value else {
        return Ok(DynamicValue::null());
    };

    let decoded = if !value.msgpack.is_empty() {
        DynamicValue::decode_msgpack(&value.msgpack)
    } else {
        DynamicValue::decode_json(&value.json)
    };
    decoded.map_err(Status::from)
}

#[allow(clippy::result_large_err)]
fn decode_optional(value: &Option<pb::DynamicValue>) -> Result<Option<DynamicValue>, Status> {
    let decoded = decode_dynamic_value(value)?;
    Ok((!decoded.is_null()).then_some(decoded))
}

#[allow(clippy::result_large_err)]
fn encode_dynamic_value(value: &DynamicValue) -> Result<pb::DynamicValue, Status> {
    Ok(pb::DynamicValue {
        msgpack: value.encode_msgpack()?,
        json: vec![],
    })
}

pub fn schema_to_proto(schema: &Schema) -> pb::Schema {
    pb::Schema {
        version: schema.version,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> pb::schema::Block {
    pb::schema::Block {
        version: block.version,
        attributes: block
            .attributes
            .iter()
            .map(|attr| pb::schema::Attribute {
                name: attr.name.clone(),
                r#type: attr.r#type.to_cty_bytes(),
                description: attr.description.clone(),
                required: attr.required,
                optional: attr.optional,
                computed: attr.computed,
                sensitive: attr.sensitive,
                description_kind: string_kind_to_proto(StringKind::Plain),
                deprecated: attr.deprecated,
                write_only: false,
            })
            .collect(),
        block_types: block
            .block_types
            .iter()
            .map(|nested| pb::schema::NestedBlock {
                type_name: nested.type_name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting: match nested.nesting {
                    NestingMode::Single => pb::schema::nested_block::NestingMode::Single,
                    NestingMode::List => pb::schema::nested_block::NestingMode::List,
                    NestingMode::Set => pb::schema::nested_block::NestingMode::Set,
                } as i32,
                min_items: nested.min_items,
                max_items: nested.max_items,
            })
            .collect(),
        description: block.description.clone(),
        description_kind: string_kind_to_proto(block.description_kind),
        deprecated: block.deprecated,
    }
}

fn string_kind_to_proto(kind: StringKind) -> i32 {
    match kind {
        StringKind::Plain => pb::StringKind::Plain as i32,
        StringKind::Markdown => pb::StringKind::Markdown as i32,
    }
}

fn server_capabilities_to_proto(caps: &ServerCapabilities) -> pb::ServerCapabilities {
    pb::ServerCapabilities {
        plan_destroy: caps.plan_destroy,
        get_provider_schema_optional: caps.get_provider_schema_optional,
        move_resource_state: caps.move_resource_state,
    }
}

fn client_capabilities_from_proto(caps: Option<&pb::ClientCapabilities>) -> ClientCapabilities {
    caps.map(|c| ClientCapabilities {
        deferral_allowed: c.deferral_allowed,
        write_only_attributes_allowed: c.write_only_attributes_allowed,
    })
    .unwrap_or_default()
}

fn deferred_to_proto(deferred: &Deferred) -> pb::Deferred {
    let reason = match deferred.reason {
        DeferredReason::Unknown => pb::deferred::Reason::Unknown,
        DeferredReason::ResourceConfigUnknown => pb::deferred::Reason::ResourceConfigUnknown,
        DeferredReason::ProviderConfigUnknown => pb::deferred::Reason::ProviderConfigUnknown,
        DeferredReason::AbsentPrereq => pb::deferred::Reason::AbsentPrereq,
    };
    pb::Deferred {
        reason: reason as i32,
    }
}

fn attribute_path_to_proto(path: &AttributePath) -> pb::AttributePath {
    use pb::attribute_path::{step::Selector, Step};

    pb::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<pb::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|diag| pb::Diagnostic {
            severity: match diag.severity {
                DiagnosticSeverity::Invalid => pb::diagnostic::Severity::Invalid,
                DiagnosticSeverity::Error => pb::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => pb::diagnostic::Severity::Warning,
            } as i32,
            summary: diag.summary,
            detail: diag.detail,
            attribute: diag.attribute.as_ref().map(attribute_path_to_proto),
        })
        .collect()
}
