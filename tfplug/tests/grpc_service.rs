//! End-to-end tests of the gRPC service against an in-memory provider

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tonic::Request;

use tfplug::context::Context;
use tfplug::grpc::GrpcProviderServer;
use tfplug::proto::{self, ProviderService};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetaSchemaRequest, ProviderMetaSchemaResponse, ProviderMetadataRequest,
    ProviderMetadataResponse, ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
    StopProviderRequest, StopProviderResponse, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue, ServerCapabilities};
use tfplug::validator::StringLengthValidator;

#[derive(Default)]
struct Store {
    notes: Mutex<HashMap<String, String>>,
    next_id: AtomicUsize,
}

struct NotesProvider {
    store: Arc<Store>,
}

#[async_trait]
impl Provider for NotesProvider {
    fn type_name(&self) -> &str {
        "notes"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: "notes".to_string(),
            server_capabilities: ServerCapabilities::default(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("prefix", AttributeType::String)
                        .optional()
                        .build(),
                )
                .build(),
            diagnostics: vec![],
        }
    }

    async fn meta_schema(
        &self,
        _ctx: Context,
        _request: ProviderMetaSchemaRequest,
    ) -> ProviderMetaSchemaResponse {
        ProviderMetaSchemaResponse {
            schema: None,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        _request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(self.store.clone() as Arc<dyn Any + Send + Sync>),
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        ValidateProviderConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn stop(&self, _ctx: Context, _request: StopProviderRequest) -> StopProviderResponse {
        StopProviderResponse { error: None }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        resources.insert(
            "notes_note".to_string(),
            Box::new(|| Box::new(NoteResource { store: None }) as Box<dyn ResourceWithConfigure>),
        );
        resources
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        HashMap::new()
    }
}

struct NoteResource {
    store: Option<Arc<Store>>,
}

impl NoteResource {
    fn store(&self) -> &Store {
        self.store.as_ref().unwrap()
    }

    fn state(id: &str, text: &str) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        state.set_string(&AttributePath::new("id"), id).unwrap();
        state.set_string(&AttributePath::new("text"), text).unwrap();
        state
    }
}

#[async_trait]
impl Resource for NoteResource {
    fn type_name(&self) -> &str {
        "notes_note"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("id", AttributeType::String)
                        .computed()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("text", AttributeType::String)
                        .required()
                        .validator(StringLengthValidator::between(1, 20))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("shelf", AttributeType::String)
                        .optional()
                        .force_new()
                        .build(),
                )
                .build(),
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let text = request
            .planned_state
            .get_string(&AttributePath::new("text"))
            .unwrap();
        if text == "fail" {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![Diagnostic::error("create failed", "refused")],
            };
        }
        let id = format!("note-{}", self.store().next_id.fetch_add(1, Ordering::SeqCst));
        self.store()
            .notes
            .lock()
            .unwrap()
            .insert(id.clone(), text.clone());
        CreateResourceResponse {
            new_state: Self::state(&id, &text),
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let id = request
            .current_state
            .get_string(&AttributePath::new("id"))
            .unwrap();
        let text = self.store().notes.lock().unwrap().get(&id).cloned();
        ReadResourceResponse {
            new_state: text.map(|text| Self::state(&id, &text)),
            diagnostics: vec![],
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
        let id = request
            .prior_state
            .get_string(&AttributePath::new("id"))
            .unwrap();
        self.store().notes.lock().unwrap().remove(&id);
        DeleteResourceResponse {
            diagnostics: vec![],
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for NoteResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        self.store = request
            .provider_data
            .and_then(|data| data.downcast::<Store>().ok());
        ConfigureResourceResponse {
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithImportState for NoteResource {
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
        tfplug::import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

fn server() -> (GrpcProviderServer<NotesProvider>, Arc<Store>) {
    let store = Arc::new(Store::default());
    (
        GrpcProviderServer::new(NotesProvider {
            store: store.clone(),
        }),
        store,
    )
}

fn encode(value: Dynamic) -> Option<proto::DynamicValue> {
    Some(proto::DynamicValue {
        msgpack: DynamicValue::new(value).encode_msgpack().unwrap(),
        json: vec![],
    })
}

fn decode(value: Option<proto::DynamicValue>) -> DynamicValue {
    DynamicValue::decode_msgpack(&value.unwrap().msgpack).unwrap()
}

fn note(pairs: &[(&str, Dynamic)]) -> Dynamic {
    Dynamic::Map(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

async fn configure(server: &GrpcProviderServer<NotesProvider>) {
    server
        .configure_provider(Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: encode(note(&[("prefix", Dynamic::Null)])),
            client_capabilities: None,
        }))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_metadata_lists_resources() {
    let (server, _) = server();
    let response = server
        .get_metadata(Request::new(proto::get_metadata::Request {}))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.resources.len(), 1);
    assert_eq!(response.resources[0].type_name, "notes_note");
    assert!(response.data_sources.is_empty());
}

#[tokio::test]
async fn test_schema_contains_resource_attributes() {
    let (server, _) = server();
    let response = server
        .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
        .await
        .unwrap()
        .into_inner();

    let schema = response.resource_schemas.get("notes_note").unwrap();
    let block = schema.block.as_ref().unwrap();
    let text = block.attributes.iter().find(|a| a.name == "text").unwrap();
    assert!(text.required);
    assert_eq!(text.r#type, b"\"string\"".to_vec());
}

#[tokio::test]
async fn test_validate_runs_attribute_validators() {
    let (server, _) = server();
    let response = server
        .validate_resource_config(Request::new(proto::validate_resource_config::Request {
            type_name: "notes_note".to_string(),
            config: encode(note(&[("text", Dynamic::from("this text is far too long"))])),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.diagnostics.len(), 1);
    assert!(response.diagnostics[0].attribute.is_some());
}

#[tokio::test]
async fn test_apply_before_configure_reports_error() {
    let (server, _) = server();
    let response = server
        .apply_resource_change(Request::new(proto::apply_resource_change::Request {
            type_name: "notes_note".to_string(),
            prior_state: encode(Dynamic::Null),
            planned_state: encode(note(&[("text", Dynamic::from("hi"))])),
            config: encode(note(&[("text", Dynamic::from("hi"))])),
            planned_private: vec![],
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "Provider not configured");
}

#[tokio::test]
async fn test_full_lifecycle() {
    let (server, store) = server();
    configure(&server).await;

    let config = note(&[("text", Dynamic::from("hello")), ("shelf", Dynamic::Null)]);
    let plan = server
        .plan_resource_change(Request::new(proto::plan_resource_change::Request {
            type_name: "notes_note".to_string(),
            prior_state: encode(Dynamic::Null),
            proposed_new_state: encode(config.clone()),
            config: encode(config.clone()),
            prior_private: vec![],
            provider_meta: None,
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    let planned = decode(plan.planned_state);
    assert!(planned.is_unknown_at(&AttributePath::new("id")));

    let applied = server
        .apply_resource_change(Request::new(proto::apply_resource_change::Request {
            type_name: "notes_note".to_string(),
            prior_state: encode(Dynamic::Null),
            planned_state: encode(planned.value),
            config: encode(config.clone()),
            planned_private: vec![],
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(applied.diagnostics.is_empty());
    let state = decode(applied.new_state);
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "note-0");
    // Attributes the resource never set are still present as null
    assert_eq!(state.get(&AttributePath::new("shelf")), Dynamic::Null);

    let read = server
        .read_resource(Request::new(proto::read_resource::Request {
            type_name: "notes_note".to_string(),
            current_state: encode(state.value.clone()),
            private: vec![],
            provider_meta: None,
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(decode(read.new_state).value, state.value);

    let deleted = server
        .apply_resource_change(Request::new(proto::apply_resource_change::Request {
            type_name: "notes_note".to_string(),
            prior_state: encode(state.value.clone()),
            planned_state: encode(Dynamic::Null),
            config: encode(Dynamic::Null),
            planned_private: vec![],
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(decode(deleted.new_state).is_null());
    assert!(store.notes.lock().unwrap().is_empty());

    let gone = server
        .read_resource(Request::new(proto::read_resource::Request {
            type_name: "notes_note".to_string(),
            current_state: encode(state.value),
            private: vec![],
            provider_meta: None,
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(decode(gone.new_state).is_null());
}

#[tokio::test]
async fn test_failed_create_without_id_returns_null_state() {
    let (server, _) = server();
    configure(&server).await;

    let config = note(&[("text", Dynamic::from("fail")), ("shelf", Dynamic::Null)]);
    let mut planned = config.clone();
    if let Dynamic::Map(map) = &mut planned {
        map.insert("id".to_string(), Dynamic::Unknown);
    }
    let response = server
        .apply_resource_change(Request::new(proto::apply_resource_change::Request {
            type_name: "notes_note".to_string(),
            prior_state: encode(Dynamic::Null),
            planned_state: encode(planned),
            config: encode(config),
            planned_private: vec![],
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.diagnostics.len(), 1);
    assert!(decode(response.new_state).is_null());
}

#[tokio::test]
async fn test_plan_marks_force_new_change() {
    let (server, _) = server();
    let prior = note(&[
        ("id", Dynamic::from("note-0")),
        ("text", Dynamic::from("hello")),
        ("shelf", Dynamic::from("a")),
    ]);
    let config = note(&[("text", Dynamic::from("hello")), ("shelf", Dynamic::from("b"))]);
    let mut proposed = prior.clone();
    if let Dynamic::Map(map) = &mut proposed {
        map.insert("shelf".to_string(), Dynamic::from("b"));
    }

    let plan = server
        .plan_resource_change(Request::new(proto::plan_resource_change::Request {
            type_name: "notes_note".to_string(),
            prior_state: encode(prior),
            proposed_new_state: encode(proposed),
            config: encode(config),
            prior_private: vec![],
            provider_meta: None,
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(plan.requires_replace.len(), 1);
}

#[tokio::test]
async fn test_import_then_upgrade() {
    let (server, _) = server();
    configure(&server).await;

    let imported = server
        .import_resource_state(Request::new(proto::import_resource_state::Request {
            type_name: "notes_note".to_string(),
            id: "note-7".to_string(),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(imported.imported_resources.len(), 1);
    let state = decode(imported.imported_resources[0].state.clone());
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "note-7");
    assert_eq!(state.get(&AttributePath::new("text")), Dynamic::Null);

    let upgraded = server
        .upgrade_resource_state(Request::new(proto::upgrade_resource_state::Request {
            type_name: "notes_note".to_string(),
            version: 0,
            raw_state: Some(proto::RawState {
                json: br#"{"id":"note-7","text":"hi"}"#.to_vec(),
                flatmap: HashMap::new(),
            }),
        }))
        .await
        .unwrap()
        .into_inner();
    let state = decode(upgraded.upgraded_state);
    assert_eq!(state.get_string(&AttributePath::new("text")).unwrap(), "hi");
    assert_eq!(state.get(&AttributePath::new("shelf")), Dynamic::Null);
}

#[tokio::test]
async fn test_unknown_resource_type_is_not_found() {
    let (server, _) = server();
    let status = server
        .validate_resource_config(Request::new(proto::validate_resource_config::Request {
            type_name: "notes_missing".to_string(),
            config: encode(Dynamic::Null),
            client_capabilities: None,
        }))
        .await
        .unwrap_err();

    assert_eq!(status.code(), tonic::Code::NotFound);
}
