//! EIP association resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
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
use tfplug::validator::Ipv4Validator;

use super::common::{
    api_error, extract_provider_data, id_attribute, path, require_client, required_string,
    state_id, Outcome,
};
use crate::api::address::AddressTarget;
use crate::api::Client;
use crate::ids::{self, ATTACHMENT_SEP};

/// `eip#instance` for a CVM binding, `eip#eni#private_ip` for an ENI one
fn parse_association_id(id: &str) -> Outcome<(String, AddressTarget)> {
    let parts: Vec<&str> = id.split(ATTACHMENT_SEP).collect();
    match parts[..] {
        [eip_id, instance_id] if !eip_id.is_empty() && !instance_id.is_empty() => Ok((
            eip_id.to_string(),
            AddressTarget {
                instance_id: Some(instance_id.to_string()),
                ..Default::default()
            },
        )),
        [eip_id, eni_id, private_ip]
            if !eip_id.is_empty() && !eni_id.is_empty() && !private_ip.is_empty() =>
        {
            Ok((
                eip_id.to_string(),
                AddressTarget {
                    network_interface_id: Some(eni_id.to_string()),
                    private_ip_address: Some(private_ip.to_string()),
                    ..Default::default()
                },
            ))
        }
        _ => Err(Diagnostic::error(
            "Invalid EIP association id",
            format!(
                "expected [eip_id]{0}[instance_id] or [eip_id]{0}[eni_id]{0}[private_ip], got {1}",
                ATTACHMENT_SEP, id
            ),
        )),
    }
}

fn association_id(eip_id: &str, target: &AddressTarget) -> String {
    match (&target.instance_id, &target.network_interface_id) {
        (Some(instance_id), _) => ids::join(&[eip_id, instance_id.as_str()], ATTACHMENT_SEP),
        (None, eni_id) => ids::join(
            &[
                eip_id,
                eni_id.as_deref().unwrap_or_default(),
                target.private_ip_address.as_deref().unwrap_or_default(),
            ],
            ATTACHMENT_SEP,
        ),
    }
}

/// The binding target from configuration: an instance, or an ENI together
/// with one of its private IPs
fn planned_target(planned: &DynamicValue) -> Outcome<AddressTarget> {
    let instance_id = planned.get_string_opt(&path("instance_id"));
    let eni_id = planned.get_string_opt(&path("network_interface_id"));
    let private_ip = planned.get_string_opt(&path("private_ip"));

    match (instance_id, eni_id, private_ip) {
        (Some(instance_id), None, None) => Ok(AddressTarget {
            instance_id: Some(instance_id),
            ..Default::default()
        }),
        (None, Some(eni_id), Some(private_ip)) => Ok(AddressTarget {
            network_interface_id: Some(eni_id),
            private_ip_address: Some(private_ip),
            ..Default::default()
        }),
        _ => Err(Diagnostic::error(
            "Invalid EIP association",
            "Set either `instance_id`, or both `network_interface_id` and `private_ip`",
        )),
    }
}

#[derive(Default)]
pub struct EipAssociationResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl EipAssociationResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for EipAssociationResource {
    fn type_name(&self) -> &str {
        "tencentcloud_eip_association"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides an eip resource associated with other resource like CVM, ENI and CLB.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("eip_id", AttributeType::String)
                    .description("The ID of EIP.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("instance_id", AttributeType::String)
                    .description("The CVM or CLB instance id going to bind with the EIP. This field is conflict with `network_interface_id` and `private_ip fields`.")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("network_interface_id", AttributeType::String)
                    .description("Indicates the network interface id like `eni-xxxxxx`. This field is conflict with `instance_id`.")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("private_ip", AttributeType::String)
                    .description("Indicates an IP belongs to the `network_interface_id`. This field is conflict with `instance_id`.")
                    .optional()
                    .force_new()
                    .validator(Ipv4Validator::create())
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

        let pending = ["instance_id", "network_interface_id", "private_ip"]
            .iter()
            .any(|name| request.config.is_unknown_at(&path(name)));
        if !pending {
            if let Err(diag) = planned_target(&request.config) {
                diagnostics.push(diag);
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
        if let Err(diag) = self.create_association(client, &request.planned_state, &mut state).await {
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
            Ok(id) => self.read_association(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "eip association not found, removing from state");
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
            let (eip_id, _) = parse_association_id(&state_id(&request.prior_state)?)?;
            client
                .addresses()
                .disassociate(&eip_id)
                .await
                .map_err(api_error("Failed to unbind EIP"))
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

impl EipAssociationResource {
    async fn create_association(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let eip_id = required_string(planned, "eip_id")?;
        let target = planned_target(planned)?;

        client
            .addresses()
            .associate(&eip_id, &target)
            .await
            .map_err(api_error("Failed to bind EIP"))?;

        let id = association_id(&eip_id, &target);
        let _ = state.set_string(&path("id"), id.clone());

        if !self.read_association(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read EIP association",
                format!("EIP association [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_association(
        &self,
        client: &Client,
        id: &str,
        state: &mut DynamicValue,
    ) -> Outcome<bool> {
        let (eip_id, target) = parse_association_id(id)?;

        let Some(address) = client
            .addresses()
            .describe_by_id(&eip_id)
            .await
            .map_err(api_error("Failed to read EIP association"))?
        else {
            return Ok(false);
        };
        if !address.is_bound() || !target.matches(&address) {
            return Ok(false);
        }

        let _ = state.set_string(&path("id"), id.to_string());
        let _ = state.set_string(&path("eip_id"), eip_id);
        match target.instance_id {
            Some(instance_id) => {
                let _ = state.set_string(&path("instance_id"), instance_id);
                let _ = state.set_null(&path("network_interface_id"));
                let _ = state.set_null(&path("private_ip"));
            }
            None => {
                let _ = state.set_null(&path("instance_id"));
                let _ = state.set_string(&path("network_interface_id"), address.network_interface_id);
                let _ = state.set_string(&path("private_ip"), address.private_address_ip);
            }
        }

        Ok(true)
    }
}

#[async_trait]
impl ResourceWithImportState for EipAssociationResource {
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
impl ResourceWithConfigure for EipAssociationResource {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn association_ids_name_their_target() {
        let (eip_id, target) = parse_association_id("eip-1#ins-1").unwrap();
        assert_eq!(eip_id, "eip-1");
        assert_eq!(target.instance_id.as_deref(), Some("ins-1"));
        assert_eq!(association_id(&eip_id, &target), "eip-1#ins-1");

        let (eip_id, target) = parse_association_id("eip-1#eni-1#10.0.0.5").unwrap();
        assert_eq!(target.network_interface_id.as_deref(), Some("eni-1"));
        assert_eq!(target.private_ip_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(association_id(&eip_id, &target), "eip-1#eni-1#10.0.0.5");

        assert!(parse_association_id("eip-1").is_err());
        assert!(parse_association_id("eip-1##10.0.0.5").is_err());
    }

    #[test]
    fn target_is_instance_or_eni_ip_pair() {
        let mut config = DynamicValue::empty_object();
        config.set_string(&path("instance_id"), "ins-1").unwrap();
        assert!(planned_target(&config).is_ok());

        config.set_string(&path("network_interface_id"), "eni-1").unwrap();
        assert!(planned_target(&config).is_err());

        let mut config = DynamicValue::empty_object();
        config.set_string(&path("network_interface_id"), "eni-1").unwrap();
        assert!(planned_target(&config).is_err());
        config.set_string(&path("private_ip"), "10.0.0.5").unwrap();
        assert_eq!(
            planned_target(&config).unwrap().private_ip_address.as_deref(),
            Some("10.0.0.5")
        );
    }
}
