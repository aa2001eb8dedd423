//! VPC resource implementation

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
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{
    parse_cidr, CidrValidator, Ipv4Validator, ListLengthValidator, StringLengthValidator,
};

use super::common::{
    api_error, changed, create_time_attribute, extract_provider_data, id_attribute,
    path, require_client, required_string, set_tags, state_id, tags_attribute, update_tags,
    Outcome,
};
use crate::api::vpc::{CreateVpcRequest, ModifyVpcAttributeRequest};
use crate::api::{bool_str, tags_from_map, tags_to_map, Client};

#[derive(Default)]
pub struct VpcResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl VpcResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for VpcResource {
    fn type_name(&self) -> &str {
        "tencentcloud_vpc"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a VPC resource.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the VPC.")
                    .required()
                    .validator(StringLengthValidator::between(1, 60))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cidr_block", AttributeType::String)
                    .description("A network address block which should be a subnet of the three internal network segments (10.0.0.0/16, 172.16.0.0/12 and 192.168.0.0/16).")
                    .required()
                    .force_new()
                    .validator(CidrValidator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("dns_servers", AttributeType::set_of(AttributeType::String))
                    .description("The DNS server list of the VPC. And you can specify 0 to 4 servers, ip address only.")
                    .optional()
                    .computed()
                    .validator(ListLengthValidator::at_most(4))
                    .validator(Ipv4Validator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_multicast", AttributeType::Bool)
                    .description("Indicates whether VPC multicast is enabled. The default value is 'true'.")
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("assistant_cidrs", AttributeType::list_of(AttributeType::String))
                    .description("List of Assistant CIDR, NOTE: Only NORMAL typed CIDRs included, check the Docker CIDR by readonly `docker_assistant_cidrs`.")
                    .optional()
                    .build(),
            )
            .attribute(tags_attribute())
            .attribute(
                AttributeBuilder::new("is_default", AttributeType::Bool)
                    .description("Indicates whether it is the default VPC for this region.")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(create_time_attribute("create_time"))
            .attribute(
                AttributeBuilder::new("default_route_table_id", AttributeType::String)
                    .description("Default route table id, which created automatically after VPC create.")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        for cidr in request.config.get_string_list(&path("assistant_cidrs")) {
            if parse_cidr(&cidr).is_none() {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid assistant CIDR",
                        format!("'{}' is not a valid CIDR block", cidr),
                    )
                    .with_attribute(path("assistant_cidrs")),
                );
            }
        }

        ValidateResourceConfigResponse { diagnostics }
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
        if let Err(diag) = self.create_vpc(client, &request.planned_state, &mut state).await {
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
            Ok(id) => self.read_vpc(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "vpc not found, removing from state");
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
            .update_vpc(client, &request.prior_state, &request.planned_state, &mut state)
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
                .vpcs()
                .delete(&id)
                .await
                .map_err(api_error("Failed to delete VPC")),
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

impl VpcResource {
    async fn create_vpc(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let request = CreateVpcRequest {
            vpc_name: required_string(planned, "name")?,
            cidr_block: required_string(planned, "cidr_block")?,
            enable_multicast: bool_str(planned.get_bool_opt(&path("is_multicast")).unwrap_or(true)),
            dns_servers: planned.get_string_list(&path("dns_servers")),
            tags: tags_from_map(&planned.get_string_map(&path("tags"))),
        };

        let vpc = client
            .vpcs()
            .create(&request)
            .await
            .map_err(api_error("Failed to create VPC"))?;
        let _ = state.set_string(&path("id"), vpc.vpc_id.clone());

        let assistant_cidrs = planned.get_string_list(&path("assistant_cidrs"));
        if !assistant_cidrs.is_empty() {
            client
                .vpcs()
                .create_assistant_cidr(&vpc.vpc_id, &assistant_cidrs)
                .await
                .map_err(api_error("Failed to create assistant CIDR"))?;
        }

        if !self.read_vpc(client, &vpc.vpc_id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read VPC",
                format!("VPC [{}] not found after create", vpc.vpc_id),
            ));
        }
        Ok(())
    }

    /// Fills `state` from the cloud; false when the VPC is gone
    async fn read_vpc(&self, client: &Client, id: &str, state: &mut DynamicValue) -> Outcome<bool> {
        let Some(vpc) = client
            .vpcs()
            .describe_by_id(id)
            .await
            .map_err(api_error("Failed to read VPC"))?
        else {
            return Ok(false);
        };

        let default_route_table = client
            .route_tables()
            .describe_default(id)
            .await
            .map_err(api_error("Failed to read default route table"))?;

        let _ = state.set_string(&path("id"), vpc.vpc_id.clone());
        let _ = state.set_string(&path("name"), vpc.vpc_name.clone());
        let _ = state.set_string(&path("cidr_block"), vpc.cidr_block.clone());
        let _ = state.set_string_list(&path("dns_servers"), vpc.dns_server_set.clone());
        let _ = state.set_bool(&path("is_multicast"), vpc.enable_multicast);
        let _ = state.set_bool(&path("is_default"), vpc.is_default);
        let _ = state.set_string(&path("create_time"), vpc.created_time.clone());
        let _ = state.set_string(
            &path("default_route_table_id"),
            default_route_table
                .map(|t| t.route_table_id)
                .unwrap_or_default(),
        );

        let assistant_cidrs = vpc.assistant_cidrs();
        if assistant_cidrs.is_empty() {
            let _ = state.set_null(&path("assistant_cidrs"));
        } else {
            let _ = state.set_string_list(&path("assistant_cidrs"), assistant_cidrs);
        }
        set_tags(state, tags_to_map(&vpc.tag_set));

        Ok(true)
    }

    async fn update_vpc(
        &self,
        client: &Client,
        prior: &DynamicValue,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let id = state_id(prior)?;

        if ["name", "is_multicast", "dns_servers"]
            .iter()
            .any(|name| changed(prior, planned, name))
        {
            let request = ModifyVpcAttributeRequest {
                vpc_id: id.clone(),
                vpc_name: required_string(planned, "name")?,
                enable_multicast: bool_str(
                    planned.get_bool_opt(&path("is_multicast")).unwrap_or(true),
                ),
                dns_servers: planned.get_string_list(&path("dns_servers")),
            };
            client
                .vpcs()
                .modify_attribute(&request)
                .await
                .map_err(api_error("Failed to update VPC"))?;
        }

        if changed(prior, planned, "assistant_cidrs") {
            let old = prior.get_string_list(&path("assistant_cidrs"));
            let new = planned.get_string_list(&path("assistant_cidrs"));
            let added: Vec<String> = new.iter().filter(|c| !old.contains(c)).cloned().collect();
            let removed: Vec<String> = old.iter().filter(|c| !new.contains(c)).cloned().collect();
            client
                .vpcs()
                .modify_assistant_cidr(&id, &added, &removed)
                .await
                .map_err(api_error("Failed to update assistant CIDR"))?;
        }

        update_tags(client, "vpc", &id, prior, planned).await?;

        if !self.read_vpc(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read VPC",
                format!("VPC [{}] not found after update", id),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceWithImportState for VpcResource {
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
impl ResourceWithConfigure for VpcResource {
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
