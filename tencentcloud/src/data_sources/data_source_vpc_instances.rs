//! VPC instances data source implementation

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
use crate::api::vpc::VpcInfo;
use crate::api::{Client, Filter};
use crate::resources::common::{api_error, extract_provider_data, path, require_client, Outcome};

fn instance_type() -> AttributeType {
    AttributeType::object([
        ("vpc_id", AttributeType::String),
        ("name", AttributeType::String),
        ("cidr_block", AttributeType::String),
        ("is_default", AttributeType::Bool),
        ("is_multicast", AttributeType::Bool),
        ("dns_servers", AttributeType::list_of(AttributeType::String)),
        ("create_time", AttributeType::String),
        ("tags", AttributeType::map_of(AttributeType::String)),
    ])
}

fn instance_object(vpc: &VpcInfo) -> Dynamic {
    Dynamic::Map(HashMap::from([
        ("vpc_id".to_string(), Dynamic::from(vpc.vpc_id.as_str())),
        ("name".to_string(), Dynamic::from(vpc.vpc_name.as_str())),
        ("cidr_block".to_string(), Dynamic::from(vpc.cidr_block.as_str())),
        ("is_default".to_string(), Dynamic::from(vpc.is_default)),
        ("is_multicast".to_string(), Dynamic::from(vpc.enable_multicast)),
        (
            "dns_servers".to_string(),
            Dynamic::string_list(vpc.dns_server_set.iter().cloned()),
        ),
        ("create_time".to_string(), Dynamic::from(vpc.created_time.as_str())),
        ("tags".to_string(), tags_value(&vpc.tag_set)),
    ]))
}

fn vpc_filters(config: &DynamicValue) -> Vec<Filter> {
    let mut filters = vec![];
    if let Some(id) = config.get_string_opt(&path("vpc_id")) {
        filters.push(Filter::new("vpc-id", id));
    }
    if let Some(name) = config.get_string_opt(&path("name")) {
        filters.push(Filter::new("vpc-name", name));
    }
    if let Some(cidr) = config.get_string_opt(&path("cidr_block")) {
        filters.push(Filter::new("cidr-block", cidr));
    }
    if let Some(key) = config.get_string_opt(&path("tag_key")) {
        filters.push(Filter::new("tag-key", key));
    }
    filters.extend(tag_filters(&config.get_string_map(&path("tags"))));
    filters
}

#[derive(Default)]
pub struct VpcInstancesDataSource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl VpcInstancesDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_instances(&self, client: &Client, config: &DynamicValue) -> Outcome<DynamicValue> {
        let wanted_tags = config.get_string_map(&path("tags"));
        let is_default = config.get_bool_opt(&path("is_default"));

        let vpcs: Vec<VpcInfo> = client
            .vpcs()
            .describe(&vpc_filters(config))
            .await
            .map_err(api_error("Failed to read VPC instances"))?
            .into_iter()
            .filter(|vpc| is_default.map_or(true, |d| vpc.is_default == d))
            .filter(|vpc| has_tags(&vpc.tag_set, &wanted_tags))
            .collect();
        tracing::debug!(count = vpcs.len(), "read vpc instances");

        let ids: Vec<String> = vpcs.iter().map(|v| v.vpc_id.clone()).collect();
        let list = Dynamic::List(vpcs.iter().map(instance_object).collect());
        write_result_file(config.get_string_opt(&path("result_output_file")), &list)?;

        let mut state = config.clone();
        let _ = state.set_string(&path("id"), ids_hash(&ids));
        let _ = state.set_value(&path("instance_list"), list);
        Ok(state)
    }
}

#[async_trait]
impl DataSource for VpcInstancesDataSource {
    fn type_name(&self) -> &str {
        "tencentcloud_vpc_instances"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Use this data source to query vpc instances' information.")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Hash of the returned VPC ids.")
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
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the VPC to be queried.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cidr_block", AttributeType::String)
                    .description("Filter the VPC SET of the specified CIDR.")
                    .optional()
                    .validator(CidrValidator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tag_key", AttributeType::String)
                    .description("Filter if VPC has this tag.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_default", AttributeType::Bool)
                    .description("Filter default or no default VPC.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::map_of(AttributeType::String))
                    .description("Tags of the VPC to be queried.")
                    .optional()
                    .build(),
            )
            .attribute(result_output_file_attribute())
            .attribute(
                AttributeBuilder::new("instance_list", AttributeType::list_of(instance_type()))
                    .description("The information list of the VPC.")
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

        let state = match self.read_instances(client, &request.config).await {
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
impl DataSourceWithConfigure for VpcInstancesDataSource {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_follow_configured_arguments() {
        let mut config = DynamicValue::empty_object();
        config.set_string(&path("name"), "main").unwrap();
        config.set_string(&path("tag_key"), "env").unwrap();
        config
            .set_string_map(&path("tags"), [("team", "net")])
            .unwrap();

        assert_eq!(
            vpc_filters(&config),
            vec![
                Filter::new("vpc-name", "main"),
                Filter::new("tag-key", "env"),
                Filter::new("tag:team", "net"),
            ]
        );
    }

    #[test]
    fn instance_object_carries_every_field() {
        let vpc = VpcInfo {
            vpc_id: "vpc-1".to_string(),
            vpc_name: "main".to_string(),
            dns_server_set: vec!["183.60.83.19".to_string()],
            ..Default::default()
        };
        let Dynamic::Map(fields) = instance_object(&vpc) else {
            panic!("expected an object");
        };
        assert_eq!(fields.len(), 8);
        assert_eq!(fields["name"].as_str(), Some("main"));
    }
}
