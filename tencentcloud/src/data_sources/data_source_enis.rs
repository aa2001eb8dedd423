//! ENIs data source implementation

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
use tfplug::validator::Ipv4Validator;

use super::{ids_hash, result_output_file_attribute, tag_filters, tags_value, write_result_file};
use crate::api::eni::{EniInfo, PrivateIpAddress};
use crate::api::{Client, Filter};
use crate::resources::common::{api_error, extract_provider_data, path, require_client, Outcome};

const STRING_FILTERS: &[(&str, &str)] = &[
    ("vpc_id", "vpc-id"),
    ("subnet_id", "subnet-id"),
    ("name", "network-interface-name"),
    ("description", "network-interface-description"),
    ("ipv4", "address-ip"),
];

fn ipv4_type() -> AttributeType {
    AttributeType::object([
        ("ip", AttributeType::String),
        ("primary", AttributeType::Bool),
        ("description", AttributeType::String),
    ])
}

fn eni_type() -> AttributeType {
    AttributeType::object([
        ("id", AttributeType::String),
        ("name", AttributeType::String),
        ("vpc_id", AttributeType::String),
        ("subnet_id", AttributeType::String),
        ("description", AttributeType::String),
        ("primary", AttributeType::Bool),
        ("mac", AttributeType::String),
        ("state", AttributeType::String),
        ("create_time", AttributeType::String),
        ("security_groups", AttributeType::list_of(AttributeType::String)),
        ("ipv4s", AttributeType::list_of(ipv4_type())),
        ("tags", AttributeType::map_of(AttributeType::String)),
    ])
}

fn ipv4_object(ip: &PrivateIpAddress) -> Dynamic {
    Dynamic::Map(HashMap::from([
        ("ip".to_string(), Dynamic::from(ip.private_ip_address.as_str())),
        ("primary".to_string(), Dynamic::from(ip.primary)),
        ("description".to_string(), Dynamic::from(ip.description.as_str())),
    ]))
}

fn eni_object(eni: &EniInfo) -> Dynamic {
    Dynamic::Map(HashMap::from([
        ("id".to_string(), Dynamic::from(eni.network_interface_id.as_str())),
        ("name".to_string(), Dynamic::from(eni.network_interface_name.as_str())),
        ("vpc_id".to_string(), Dynamic::from(eni.vpc_id.as_str())),
        ("subnet_id".to_string(), Dynamic::from(eni.subnet_id.as_str())),
        (
            "description".to_string(),
            Dynamic::from(eni.network_interface_description.as_str()),
        ),
        ("primary".to_string(), Dynamic::from(eni.primary)),
        ("mac".to_string(), Dynamic::from(eni.mac_address.as_str())),
        ("state".to_string(), Dynamic::from(eni.state.as_str())),
        ("create_time".to_string(), Dynamic::from(eni.created_time.as_str())),
        (
            "security_groups".to_string(),
            Dynamic::string_list(eni.group_set.iter().cloned()),
        ),
        (
            "ipv4s".to_string(),
            Dynamic::List(eni.private_ip_address_set.iter().map(ipv4_object).collect()),
        ),
        ("tags".to_string(), tags_value(&eni.tag_set)),
    ]))
}

fn eni_filters(config: &DynamicValue) -> Vec<Filter> {
    let mut filters: Vec<Filter> = STRING_FILTERS
        .iter()
        .filter_map(|(arg, name)| {
            config
                .get_string_opt(&path(arg))
                .map(|value| Filter::new(name, value))
        })
        .collect();
    filters.extend(tag_filters(&config.get_string_map(&path("tags"))));
    filters
}

#[derive(Default)]
pub struct EnisDataSource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl EnisDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_enis(&self, client: &Client, config: &DynamicValue) -> Outcome<DynamicValue> {
        let mut ids = config.get_string_list(&path("ids"));
        ids.sort();

        let enis = client
            .enis()
            .describe(&ids, &eni_filters(config))
            .await
            .map_err(api_error("Failed to read ENIs"))?;
        tracing::debug!(count = enis.len(), "read enis");

        let found: Vec<String> = enis.iter().map(|e| e.network_interface_id.clone()).collect();
        let list = Dynamic::List(enis.iter().map(eni_object).collect());
        write_result_file(config.get_string_opt(&path("result_output_file")), &list)?;

        let mut state = config.clone();
        let _ = state.set_string(&path("id"), ids_hash(&found));
        let _ = state.set_value(&path("enis"), list);
        Ok(state)
    }
}

#[async_trait]
impl DataSource for EnisDataSource {
    fn type_name(&self) -> &str {
        "tencentcloud_enis"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Use this data source to query ENIs.")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Hash of the returned ENI ids.")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ids", AttributeType::set_of(AttributeType::String))
                    .description("ID of the ENIs to be queried.")
                    .optional()
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
                    .description("ID of the subnet within this VPC to be queried.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the ENI to be queried.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("Description of the ENI.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ipv4", AttributeType::String)
                    .description("Intranet IP of the ENI.")
                    .optional()
                    .validator(Ipv4Validator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::map_of(AttributeType::String))
                    .description("Tags of the ENI.")
                    .optional()
                    .build(),
            )
            .attribute(result_output_file_attribute())
            .attribute(
                AttributeBuilder::new("enis", AttributeType::list_of(eni_type()))
                    .description("An information list of ENIs.")
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

        let state = match self.read_enis(client, &request.config).await {
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
impl DataSourceWithConfigure for EnisDataSource {
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
    fn eni_object_lists_ipv4s() {
        let eni = EniInfo {
            network_interface_id: "eni-1".to_string(),
            private_ip_address_set: vec![PrivateIpAddress {
                private_ip_address: "10.0.0.2".to_string(),
                primary: true,
                description: String::new(),
            }],
            ..Default::default()
        };

        let Dynamic::Map(fields) = eni_object(&eni) else {
            panic!("expected an object");
        };
        let ipv4s = fields["ipv4s"].as_list().unwrap();
        assert_eq!(ipv4s.len(), 1);
        assert_eq!(ipv4s[0].as_map().unwrap()["primary"].as_bool(), Some(true));
    }

    #[test]
    fn ipv4_filter_uses_address_ip() {
        let mut config = DynamicValue::empty_object();
        config.set_string(&path("ipv4"), "10.0.0.2").unwrap();
        assert_eq!(eni_filters(&config), vec![Filter::new("address-ip", "10.0.0.2")]);
    }
}
