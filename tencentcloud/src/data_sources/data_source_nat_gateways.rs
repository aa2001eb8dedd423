//! NAT gateways data source implementation

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Dynamic, DynamicValue};

use super::{ids_hash, result_output_file_attribute, tags_value, write_result_file};
use crate::api::nat_gateway::NatGatewayInfo;
use crate::api::{Client, Filter};
use crate::resources::common::{api_error, extract_provider_data, path, require_client, Outcome};

fn nat_type() -> AttributeType {
    AttributeType::object([
        ("id", AttributeType::String),
        ("name", AttributeType::String),
        ("vpc_id", AttributeType::String),
        ("state", AttributeType::String),
        ("max_concurrent", AttributeType::Number),
        ("bandwidth", AttributeType::Number),
        ("assigned_eip_set", AttributeType::list_of(AttributeType::String)),
        ("create_time", AttributeType::String),
        ("tags", AttributeType::map_of(AttributeType::String)),
    ])
}

fn nat_object(nat: &NatGatewayInfo) -> Dynamic {
    Dynamic::Map(HashMap::from([
        ("id".to_string(), Dynamic::from(nat.nat_gateway_id.as_str())),
        ("name".to_string(), Dynamic::from(nat.nat_gateway_name.as_str())),
        ("vpc_id".to_string(), Dynamic::from(nat.vpc_id.as_str())),
        ("state".to_string(), Dynamic::from(nat.state.as_str())),
        (
            "max_concurrent".to_string(),
            Dynamic::from(nat.max_concurrent_connection),
        ),
        ("bandwidth".to_string(), Dynamic::from(nat.internet_max_bandwidth_out)),
        ("assigned_eip_set".to_string(), Dynamic::string_list(nat.public_ips())),
        ("create_time".to_string(), Dynamic::from(nat.created_time.as_str())),
        ("tags".to_string(), tags_value(&nat.tag_set)),
    ]))
}

/// Gateway ids to ask for and the filters to send
fn nat_query(config: &DynamicValue) -> (Vec<String>, Vec<Filter>) {
    let ids = config.get_string_opt(&path("id")).into_iter().collect();
    let mut filters = vec![];
    if let Some(name) = config.get_string_opt(&path("name")) {
        filters.push(Filter::new("nat-gateway-name", name));
    }
    if let Some(vpc_id) = config.get_string_opt(&path("vpc_id")) {
        filters.push(Filter::new("vpc-id", vpc_id));
    }
    (ids, filters)
}

#[derive(Default)]
pub struct NatGatewaysDataSource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl NatGatewaysDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_nats(&self, client: &Client, config: &DynamicValue) -> Outcome<DynamicValue> {
        let (ids, filters) = nat_query(config);
        let nats = client
            .nat_gateways()
            .describe(&ids, &filters)
            .await
            .map_err(api_error("Failed to read NAT gateways"))?;
        tracing::debug!(count = nats.len(), "read nat gateways");

        let found: Vec<String> = nats.iter().map(|n| n.nat_gateway_id.clone()).collect();
        let list = Dynamic::List(nats.iter().map(nat_object).collect());
        write_result_file(config.get_string_opt(&path("result_output_file")), &list)?;

        let mut state = config.clone();
        if config.get_string_opt(&path("id")).is_none() {
            let _ = state.set_string(&path("id"), ids_hash(&found));
        }
        let _ = state.set_value(&path("nats"), list);
        Ok(state)
    }
}

#[async_trait]
impl DataSource for NatGatewaysDataSource {
    fn type_name(&self) -> &str {
        "tencentcloud_nat_gateways"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Use this data source to query detailed information of NAT gateways.")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("ID of the NAT gateway.")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the NAT gateway.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("ID of the VPC.")
                    .optional()
                    .build(),
            )
            .attribute(result_output_file_attribute())
            .attribute(
                AttributeBuilder::new("nats", AttributeType::list_of(nat_type()))
                    .description("Information list of the dedicated NATs.")
                    .computed()
                    .build(),
            )
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diagnostics = vec![];

        let Some(client) = require_client(&self.provider_data, &mut diagnostics) else {
            return ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics,
                deferred: None,
            };
        };

        let state = match self.read_nats(client, &request.config).await {
            Ok(state) => state,
            Err(diag) => {
                diagnostics.push(diag);
                DynamicValue::null()
            }
        };

        ReadDataSourceResponse {
            state,
            diagnostics,
            deferred: None,
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for NatGatewaysDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];
        self.provider_data =
            extract_provider_data(request.provider_data, "data source", &mut diagnostics);
        ConfigureDataSourceResponse { diagnostics }
    }
}
