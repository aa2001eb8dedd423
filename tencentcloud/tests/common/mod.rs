#![allow(dead_code)]

use mockito::{Mock, ServerGuard};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tencentcloud::api::{Client, ClientConfig};
use tencentcloud::{TencentCloudProvider, TencentCloudProviderData};
use tfplug::context::Context;
use tfplug::provider::Provider;
use tfplug::resource::{
    ConfigureResourceRequest, CreateResourceRequest, CreateResourceResponse,
    DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest, ReadResourceResponse, Resource,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::types::{AttributePath, ClientCapabilities, Diagnostic, DynamicValue};

pub fn path(name: &str) -> AttributePath {
    AttributePath::new(name)
}

/// Provider data whose client talks to the mock server and polls fast
pub fn provider_data(server: &ServerGuard) -> Arc<dyn Any + Send + Sync> {
    let mut config = ClientConfig::new("AKIDtest", "secret", "ap-guangzhou");
    config.endpoint = Some(server.url());
    config.poll_interval = Duration::from_millis(10);
    config.read_timeout = Duration::from_secs(3);
    config.write_timeout = Duration::from_secs(3);
    config.rate_limit = 1000;
    let client = Client::new(config).expect("client");
    Arc::new(TencentCloudProviderData::new(client))
}

pub async fn resource(
    provider_data: &Arc<dyn Any + Send + Sync>,
    type_name: &str,
) -> Box<dyn ResourceWithConfigure> {
    let provider = TencentCloudProvider::new();
    let factory = provider.resources().remove(type_name).expect("resource");
    let mut resource = factory();
    let response = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: Some(provider_data.clone()),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());
    resource
}

/// Responds to every call of `action` with `body`
pub async fn mock_action(server: &mut ServerGuard, action: &str, body: serde_json::Value) -> Mock {
    server
        .mock("POST", "/")
        .match_header("x-tc-action", action)
        .with_header("content-type", "application/json")
        .with_body(json!({ "Response": body }).to_string())
        .create_async()
        .await
}

/// Responds to exactly `times` calls of `action`; mocks registered later for
/// the same action answer once these are used up
pub async fn mock_times(
    server: &mut ServerGuard,
    action: &str,
    times: usize,
    body: serde_json::Value,
) -> Mock {
    server
        .mock("POST", "/")
        .match_header("x-tc-action", action)
        .with_header("content-type", "application/json")
        .with_body(json!({ "Response": body }).to_string())
        .expect(times)
        .create_async()
        .await
}

pub fn error_body(code: &str, message: &str) -> serde_json::Value {
    json!({"Error": {"Code": code, "Message": message}, "RequestId": "req-err"})
}

pub fn task_success() -> serde_json::Value {
    json!({"Status": "SUCCESS", "Output": "", "RequestId": "req-task"})
}

pub fn details(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics.iter().map(|d| d.detail.as_str()).collect()
}

pub async fn create(
    resource: &dyn ResourceWithConfigure,
    type_name: &str,
    planned: DynamicValue,
) -> CreateResourceResponse {
    resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: type_name.to_string(),
                planned_state: planned.clone(),
                config: planned,
                planned_private: vec![],
                provider_meta: None,
            },
        )
        .await
}

pub async fn read(
    resource: &dyn ResourceWithConfigure,
    type_name: &str,
    current: DynamicValue,
) -> ReadResourceResponse {
    resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: type_name.to_string(),
                current_state: current,
                private: vec![],
                provider_meta: None,
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await
}

pub async fn update(
    resource: &dyn ResourceWithConfigure,
    type_name: &str,
    prior: DynamicValue,
    planned: DynamicValue,
) -> UpdateResourceResponse {
    resource
        .update(
            Context::new(),
            UpdateResourceRequest {
                type_name: type_name.to_string(),
                prior_state: prior,
                planned_state: planned.clone(),
                config: planned,
                planned_private: vec![],
                provider_meta: None,
            },
        )
        .await
}

pub async fn delete(
    resource: &dyn ResourceWithConfigure,
    type_name: &str,
    prior: DynamicValue,
) -> DeleteResourceResponse {
    resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: type_name.to_string(),
                prior_state: prior,
                planned_private: vec![],
                provider_meta: None,
            },
        )
        .await
}

/// State holding only an id
pub fn with_id(id: &str) -> DynamicValue {
    let mut state = DynamicValue::empty_object();
    state.set_string(&path("id"), id).unwrap();
    state
}
