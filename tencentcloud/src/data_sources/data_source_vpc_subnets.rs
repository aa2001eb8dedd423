//! VPC subnets data source implementation

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
use tfplug::validator::CidrValidator;

use super::{has_tags, ids_hash, result_output_file_attribute, tag_filters, tags_value, write_result_file};
use crate::api::subnet::SubnetInfo;
use crate::api::{bool_str, Client, Filter};
use crate::resources::common::{api_error, extract_provider_data, path, require_client, Outcome};

/// Filter arguments and the API filter names they map to
const STRING_FILTERS: &[(&str, &str)] = &[
    ("vpc_id", "vpc-id"),
    ("subnet_id", "subnet-id"),
    ("name", "subnet-name"),
    ("availability_zone", "zone"),
    ("cidr_block", "cidr-block"),
    ("tag_key", "tag-key"),
];

fn subnet_type() -> AttributeType {
    AttributeType::object([
        ("vpc_id", AttributeType::String),
        ("subnet_id", AttributeType::String),
        ("name", AttributeType::String),
        ("cidr_block", AttributeType::String),
        ("availability_zone", AttributeType::String),
        ("route_table_id", AttributeType::String),
        ("is_default", AttributeType::Bool),
        ("is_multicast", AttributeType::Bool),
        ("available_ip_count", AttributeType::Number),
        ("create_time", AttributeType::String),
        ("tags", AttributeType::map_of(AttributeType::String)),
    ])
}

fn subnet_object(subnet: &SubnetInfo) -> Dynamic {
    Dynamic::Map(HashMap::from([
        ("vpc_id".to_string(), Dynamic::from(subnet.vpc_id.as_str())),
        ("subnet_id".to_string(), Dynamic::from(subnet.subnet_id.as_str())),
        ("name".to_string(), Dynamic::from(subnet.subnet_name.as_str())),
        ("cidr_block".to_string(), Dynamic::from(subnet.cidr_block.as_str())),
        ("availability_zone".to_string(), Dynamic::from(subnet.zone.as_str())),
        ("route_table_id".to_string(), Dynamic::from(subnet.route_table_id.as_str())),
        ("is_default".to_string(), Dynamic::from(subnet.is_default)),
        ("is_multicast".to_string(), Dynamic::from(subnet.enable_broadcast)),
        (
            "available_ip_count".to_string(),
            Dynamic::from(subnet.available_ip_address_count),
        ),
        ("create_time".to_string(), Dynamic::from(subnet.created_time.as_str())),
        ("tags".to_string(), tags_value(&subnet.tag_set)),
    ]))
}

fn subnet_filters(config: &DynamicValue) -> Vec<Filter> {
    let mut filters: Vec<Filter> = STRING_FILTERS
        .iter()
        .filter_map(|(arg, name)| {
            config
                .get_string_opt(&path(arg))
                .map(|value| Filter::new(name, value))
        })
        .collect();
    if let Some(is_default) = config.get_bool_opt(&path("is_default")) {
        filters.push(Filter::new("is-default", bool_str(is_default)));
    }
    filters.extend(tag_filters(&config.get_string_map(&path("tags"))));
    filters
}

#[derive(Default)]
pub struct VpcSubnetsDataSource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl VpcSubnetsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_subnets(&self, client: &Client, config: &DynamicValue) -> Outcome<DynamicValue> {
        let wanted_tags = config.get_string_map(&path("tags"));

        let subnets: Vec<SubnetInfo> = client
            .subnets()
            .describe(&subnet_filters(config))
            .await
            .map_err(api_error("Failed to read subnets"))?
            .into_iter()
            .filter(|subnet| has_tags(&subnet.tag_set, &wanted_tags))
            .collect();
        tracing::debug!(count = subnets.len(), "read subnets");

        let ids: Vec<String> = subnets.iter().map(|s| s.subnet_id.clone()).collect();
        let list = Dynamic::List(subnets.iter().map(subnet_object).collect());
        write_result_file(config.get_string_opt(&path("result_output_file")), &list)?;

        let mut state = config.clone();
        let _ = state.set_string(&path("id"), ids_hash(&ids));
        let _ = state.set_value(&path("instance_list"), list);
        Ok(state)
    }
}

#[async_trait]
impl DataSource for VpcSubnetsDataSource {
    fn type_name(&self) -> &str {
        "tencentcloud_vpc_subnets"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Use this data source to query vpc subnets information.")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Hash of the returned subnet ids.")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("ID of the VPC to be queried.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subnet_id", AttributeType::String)
                    .description("ID of the subnet to be queried.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the subnet to be queried.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("availability_zone", AttributeType::String)
                    .description("Zone of the subnet to be queried.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cidr_block", AttributeType::String)
                    .description("Filter subnet with this CIDR.")
                    .optional()
                    .validator(CidrValidator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_default", AttributeType::Bool)
                    .description("Filter default or no default subnets.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tag_key", AttributeType::String)
                    .description("Filter the subnet this tag.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::map_of(AttributeType::String))
                    .description("Tags of the subnet to be queried.")
                    .optional()
                    .build(),
            )
            .attribute(result_output_file_attribute())
            .attribute(
                AttributeBuilder::new("instance_list", AttributeType::list_of(subnet_type()))
                    .description("List of subnets.")
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

        let state = match self.read_subnets(client, &request.config).await {
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
impl DataSourceWithConfigure for VpcSubnetsDataSource {
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
