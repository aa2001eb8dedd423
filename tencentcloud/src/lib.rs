pub mod api;
pub mod data_sources;
pub mod ids;
pub mod provider_data;
pub mod resources;
pub mod rules;
pub mod tags;

pub use provider_data::TencentCloudProviderData;

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetaSchemaRequest, ProviderMetaSchemaResponse, ProviderMetadataRequest,
    ProviderMetadataResponse, ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
    StopProviderRequest, StopProviderResponse, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue, ServerCapabilities};
use tfplug::validator::StringOneOfValidator;

use api::{Client, ClientConfig};

/// Provider attributes and the environment variables they fall back to
const SETTINGS: &[(&str, &str)] = &[
    ("secret_id", "TENCENTCLOUD_SECRET_ID"),
    ("secret_key", "TENCENTCLOUD_SECRET_KEY"),
    ("security_token", "TENCENTCLOUD_SECURITY_TOKEN"),
    ("region", "TENCENTCLOUD_REGION"),
    ("protocol", "TENCENTCLOUD_PROTOCOL"),
    ("domain", "TENCENTCLOUD_DOMAIN"),
    ("endpoint", "TENCENTCLOUD_ENDPOINT"),
];

fn setting(config: &DynamicValue, name: &str) -> Option<String> {
    config
        .get_string_opt(&AttributePath::new(name))
        .filter(|v| !v.is_empty())
        .or_else(|| {
            SETTINGS
                .iter()
                .find(|(attr, _)| *attr == name)
                .and_then(|(_, env)| std::env::var(env).ok())
                .filter(|v| !v.is_empty())
        })
}

/// Builds the client settings from the provider block and the environment
fn client_config(config: &DynamicValue) -> Result<ClientConfig, Vec<Diagnostic>> {
    let mut diagnostics = vec![];
    let mut required = |name: &str| {
        let value = setting(config, name);
        if value.is_none() {
            let env = SETTINGS
                .iter()
                .find(|(attr, _)| *attr == name)
                .map(|(_, env)| *env)
                .unwrap_or_default();
            diagnostics.push(
                Diagnostic::error(
                    format!("{} is required", name),
                    format!("Set `{}` in the provider block or the {} environment variable", name, env),
                )
                .with_attribute(AttributePath::new(name)),
            );
        }
        value.unwrap_or_default()
    };

    let secret_id = required("secret_id");
    let secret_key = required("secret_key");
    let region = required("region");
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    let mut client_config = ClientConfig::new(&secret_id, &secret_key, &region).with_env_tuning();
    client_config.credentials.security_token = setting(config, "security_token");
    if let Some(protocol) = setting(config, "protocol") {
        client_config.protocol = protocol.to_uppercase();
    }
    if let Some(domain) = setting(config, "domain") {
        client_config.domain = domain;
    }
    client_config.endpoint = setting(config, "endpoint");

    Ok(client_config)
}

#[derive(Default)]
pub struct TencentCloudProvider;

impl TencentCloudProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

macro_rules! resource_factory {
    ($ty:ty) => {
        Box::new(|| Box::new(<$ty>::new()) as Box<dyn ResourceWithConfigure>) as ResourceFactory
    };
}

macro_rules! data_source_factory {
    ($ty:ty) => {
        Box::new(|| Box::new(<$ty>::new()) as Box<dyn DataSourceWithConfigure>) as DataSourceFactory
    };
}

#[async_trait]
impl Provider for TencentCloudProvider {
    fn type_name(&self) -> &str {
        "tencentcloud"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
            server_capabilities: ServerCapabilities::default(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Tencent Cloud VPC provider")
            .attribute(
                AttributeBuilder::new("secret_id", AttributeType::String)
                    .description("This is the TencentCloud access key. It must be provided, but it can also be sourced from the `TENCENTCLOUD_SECRET_ID` environment variable.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("secret_key", AttributeType::String)
                    .description("This is the TencentCloud secret key. It must be provided, but it can also be sourced from the `TENCENTCLOUD_SECRET_KEY` environment variable.")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("security_token", AttributeType::String)
                    .description("TencentCloud Security Token of temporary access credentials. It can be sourced from the `TENCENTCLOUD_SECURITY_TOKEN` environment variable.")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("region", AttributeType::String)
                    .description("This is the TencentCloud region. It must be provided, but it can also be sourced from the `TENCENTCLOUD_REGION` environment variable.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .description("The protocol of the API request. Valid values: `HTTP` and `HTTPS`. Default is `HTTPS`.")
                    .optional()
                    .validator(StringOneOfValidator::create(&["HTTP", "HTTPS"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("domain", AttributeType::String)
                    .description("The root domain of the API request, Default is `tencentcloudapi.com`.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("endpoint", AttributeType::String)
                    .description("Full URL replacing every service endpoint. It can be sourced from the `TENCENTCLOUD_ENDPOINT` environment variable.")
                    .optional()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
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
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let client_config = match client_config(&request.config) {
            Ok(config) => config,
            Err(diagnostics) => {
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                };
            }
        };

        tracing::debug!(
            log_id = %ctx.log_id(),
            region = %client_config.region,
            read_timeout_s = client_config.read_timeout.as_secs(),
            write_timeout_s = client_config.write_timeout.as_secs(),
            "configuring tencentcloud client"
        );

        match Client::new(client_config) {
            Ok(client) => {
                let data = TencentCloudProviderData::new(client);
                ConfigureProviderResponse {
                    diagnostics: vec![],
                    provider_data: Some(Arc::new(data) as Arc<dyn Any + Send + Sync>),
                }
            }
            Err(e) => ConfigureProviderResponse {
                diagnostics: vec![Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                )],
                provider_data: None,
            },
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
        HashMap::from([
            ("tencentcloud_vpc".to_string(), resource_factory!(resources::VpcResource)),
            ("tencentcloud_subnet".to_string(), resource_factory!(resources::SubnetResource)),
            (
                "tencentcloud_nat_gateway".to_string(),
                resource_factory!(resources::NatGatewayResource),
            ),
            ("tencentcloud_eni".to_string(), resource_factory!(resources::EniResource)),
            (
                "tencentcloud_route_table".to_string(),
                resource_factory!(resources::RouteTableResource),
            ),
            (
                "tencentcloud_route_table_entry".to_string(),
                resource_factory!(resources::RouteTableEntryResource),
            ),
            (
                "tencentcloud_security_group".to_string(),
                resource_factory!(resources::SecurityGroupResource),
            ),
            (
                "tencentcloud_security_group_rule".to_string(),
                resource_factory!(resources::SecurityGroupRuleResource),
            ),
            ("tencentcloud_ha_vip".to_string(), resource_factory!(resources::HaVipResource)),
            (
                "tencentcloud_ha_vip_eip_attachment".to_string(),
                resource_factory!(resources::HaVipEipAttachmentResource),
            ),
            (
                "tencentcloud_vpc_bandwidth_package".to_string(),
                resource_factory!(resources::VpcBandwidthPackageResource),
            ),
            (
                "tencentcloud_vpc_bandwidth_package_attachment".to_string(),
                resource_factory!(resources::VpcBandwidthPackageAttachmentResource),
            ),
            (
                "tencentcloud_vpc_private_nat_gateway_translation_nat_rule".to_string(),
                resource_factory!(resources::VpcPrivateNatGatewayTranslationNatRuleResource),
            ),
            (
                "tencentcloud_vpc_network_acl_quintuple".to_string(),
                resource_factory!(resources::VpcNetworkAclQuintupleResource),
            ),
            ("tencentcloud_vpc_acl".to_string(), resource_factory!(resources::VpcAclResource)),
            (
                "tencentcloud_vpc_acl_attachment".to_string(),
                resource_factory!(resources::VpcAclAttachmentResource),
            ),
            (
                "tencentcloud_security_group_lite_rule".to_string(),
                resource_factory!(resources::SecurityGroupLiteRuleResource),
            ),
            ("tencentcloud_eip".to_string(), resource_factory!(resources::EipResource)),
            (
                "tencentcloud_eip_association".to_string(),
                resource_factory!(resources::EipAssociationResource),
            ),
            (
                "tencentcloud_eni_attachment".to_string(),
                resource_factory!(resources::EniAttachmentResource),
            ),
        ])
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        HashMap::from([
            (
                "tencentcloud_vpc_instances".to_string(),
                data_source_factory!(data_sources::VpcInstancesDataSource),
            ),
            (
                "tencentcloud_vpc_subnets".to_string(),
                data_source_factory!(data_sources::VpcSubnetsDataSource),
            ),
            (
                "tencentcloud_nat_gateways".to_string(),
                data_source_factory!(data_sources::NatGatewaysDataSource),
            ),
            (
                "tencentcloud_enis".to_string(),
                data_source_factory!(data_sources::EnisDataSource),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::data_source::DataSource;
    use tfplug::resource::Resource;
    use tfplug::types::ClientCapabilities;

    const ENV: &[&str] = &[
        "TENCENTCLOUD_SECRET_ID",
        "TENCENTCLOUD_SECRET_KEY",
        "TENCENTCLOUD_SECURITY_TOKEN",
        "TENCENTCLOUD_REGION",
        "TENCENTCLOUD_PROTOCOL",
        "TENCENTCLOUD_DOMAIN",
        "TENCENTCLOUD_ENDPOINT",
    ];

    fn clear_env() {
        for name in ENV {
            std::env::remove_var(name);
        }
    }

    fn configure_request(config: DynamicValue) -> ConfigureProviderRequest {
        ConfigureProviderRequest {
            terraform_version: "1.9.0".to_string(),
            config,
            client_capabilities: ClientCapabilities::default(),
        }
    }

    #[tokio::test]
    #[serial]
    async fn provider_configures_successfully_with_env_vars() {
        clear_env();
        std::env::set_var("TENCENTCLOUD_SECRET_ID", "AKIDexample");
        std::env::set_var("TENCENTCLOUD_SECRET_KEY", "secret");
        std::env::set_var("TENCENTCLOUD_REGION", "ap-guangzhou");

        let mut provider = TencentCloudProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(DynamicValue::empty_object()))
            .await;

        assert!(response.diagnostics.is_empty());
        let data = response.provider_data.unwrap();
        let data = data.downcast_ref::<TencentCloudProviderData>().unwrap();
        assert_eq!(data.client.region(), "ap-guangzhou");

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_block_wins_over_environment() {
        clear_env();
        std::env::set_var("TENCENTCLOUD_SECRET_ID", "AKIDexample");
        std::env::set_var("TENCENTCLOUD_SECRET_KEY", "secret");
        std::env::set_var("TENCENTCLOUD_REGION", "ap-guangzhou");

        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("region"), "ap-shanghai")
            .unwrap();
        config
            .set_string(&AttributePath::new("protocol"), "http")
            .unwrap();

        let built = client_config(&config).unwrap();
        assert_eq!(built.region, "ap-shanghai");
        assert_eq!(built.protocol, "HTTP");
        assert_eq!(built.domain, "tencentcloudapi.com");
        assert!(built.credentials.security_token.is_none());

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_requires_credentials_and_region() {
        clear_env();

        let mut provider = TencentCloudProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(DynamicValue::empty_object()))
            .await;

        assert!(response.provider_data.is_none());
        let summaries: Vec<&str> = response
            .diagnostics
            .iter()
            .map(|d| d.summary.as_str())
            .collect();
        assert_eq!(
            summaries,
            vec![
                "secret_id is required",
                "secret_key is required",
                "region is required"
            ]
        );
    }

    #[test]
    fn provider_registers_every_resource_and_data_source() {
        let provider = TencentCloudProvider::new();
        let resources = provider.resources();
        assert_eq!(resources.len(), 20);
        for (type_name, factory) in &resources {
            assert_eq!(factory().type_name(), type_name);
        }

        let data_sources = provider.data_sources();
        assert_eq!(data_sources.len(), 4);
        for (type_name, factory) in &data_sources {
            assert_eq!(factory().type_name(), type_name);
        }
    }

    #[tokio::test]
    async fn resource_schemas_build() {
        let provider = TencentCloudProvider::new();
        for (type_name, factory) in provider.resources() {
            let response = factory()
                .schema(Context::new(), tfplug::resource::ResourceSchemaRequest)
                .await;
            assert!(response.diagnostics.is_empty(), "{}", type_name);
            assert!(
                response.schema.block.attributes.iter().any(|a| a.name == "id"),
                "{} has no id",
                type_name
            );
        }
    }
}
