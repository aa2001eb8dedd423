//! Composite resource ids

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Separator of `"<route_id>.<route_table_id>"`
pub const ROUTE_ENTRY_SEP: &str = ".";
/// Separator of attachment ids such as `"<havip_id>#<address_ip>"`
pub const ATTACHMENT_SEP: &str = "#";

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("id [{id}] is broken: expected {expected} parts separated by '{sep}'")]
    Arity {
        id: String,
        sep: String,
        expected: usize,
    },

    #[error("security group rule id [{0}] is invalid")]
    InvalidRule(String),
}

pub fn join(parts: &[&str], sep: &str) -> String {
    parts.join(sep)
}

/// Splits `id` into exactly `n` non-empty parts
pub fn split(id: &str, sep: &str, n: usize) -> Result<Vec<String>, IdError> {
    let parts: Vec<String> = id.split(sep).map(str::to_string).collect();
    if parts.len() != n || parts.iter().any(String::is_empty) {
        return Err(IdError::Arity {
            id: id.to_string(),
            sep: sep.to_string(),
            expected: n,
        });
    }
    Ok(parts)
}

/// Everything needed to find a security group policy again. Serialized to
/// JSON and base64 encoded it is the rule's Terraform id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRuleInfo {
    pub sg_id: String,
    pub policy_type: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_ip: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub port_range: Option<String>,
    #[serde(default)]
    pub source_sg_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_template_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_template_group_id: Option<String>,
}

impl SecurityGroupRuleInfo {
    /// Fills what the cloud reports for omitted fields: no CIDR, protocol
    /// and port `ALL`, no source group
    pub fn with_cloud_defaults(mut self) -> Self {
        self.cidr_ip.get_or_insert_with(String::new);
        self.protocol.get_or_insert_with(|| "ALL".to_string());
        self.port_range.get_or_insert_with(|| "ALL".to_string());
        self.source_sg_id.get_or_insert_with(String::new);
        self
    }

    pub fn to_id(&self) -> Result<String, IdError> {
        let json = serde_json::to_vec(self).map_err(|e| IdError::InvalidRule(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    /// Parses a base64 JSON id, falling back to the legacy
    /// `sgId=..&direction=..&...` form
    pub fn parse(id: &str) -> Result<Self, IdError> {
        if let Ok(bytes) = STANDARD.decode(id) {
            return serde_json::from_slice(&bytes).map_err(|_| IdError::InvalidRule(id.to_string()));
        }

        let mut fields = HashMap::new();
        for pair in id.split('&') {
            let kv: Vec<&str> = pair.split('=').collect();
            if kv.len() != 2 {
                return Err(IdError::InvalidRule(id.to_string()));
            }
            fields.insert(kv[0], kv[1]);
        }
        let get = |key: &str| fields.get(key).copied().unwrap_or_default().to_string();

        let source_sg_id = get("sourceSgid");
        let cidr_ip = if source_sg_id.is_empty() {
            get("cidrIp")
        } else {
            String::new()
        };

        Ok(Self {
            sg_id: get("sgId"),
            policy_type: get("direction"),
            action: get("action"),
            cidr_ip: Some(cidr_ip),
            protocol: Some(get("ipProtocol")),
            port_range: Some(get("portRange")),
            source_sg_id: Some(source_sg_id),
            description: Some(get("description")),
            ..Default::default()
        })
    }
}
