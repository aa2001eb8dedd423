//! Data source implementations

pub mod data_source_enis;
pub mod data_source_nat_gateways;
pub mod data_source_vpc_instances;
pub mod data_source_vpc_subnets;

pub use data_source_enis::EnisDataSource;
pub use data_source_nat_gateways::NatGatewaysDataSource;
pub use data_source_vpc_instances::VpcInstancesDataSource;
pub use data_source_vpc_subnets::VpcSubnetsDataSource;

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::types::{Diagnostic, Dynamic};

use crate::api::{Filter, Tag};

/// Stable id for a list result, derived from the ids it contains
pub(crate) fn ids_hash(ids: &[String]) -> String {
    let digest = Sha256::digest(ids.join("-").as_bytes());
    hex::encode(&digest[..8])
}

/// `tag:<key>` filters, sorted by key so requests are reproducible
pub(crate) fn tag_filters(tags: &HashMap<String, String>) -> Vec<Filter> {
    let mut keys: Vec<&String> = tags.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|k| Filter::new(&format!("tag:{}", k), tags[k].clone()))
        .collect()
}

/// True when every wanted tag is present with the same value
pub(crate) fn has_tags(tag_set: &[Tag], wanted: &HashMap<String, String>) -> bool {
    wanted
        .iter()
        .all(|(k, v)| tag_set.iter().any(|t| &t.key == k && &t.value == v))
}

pub(crate) fn tags_value(tag_set: &[Tag]) -> Dynamic {
    Dynamic::string_map(tag_set.iter().map(|t| (t.key.clone(), t.value.clone())))
}

pub(crate) fn result_output_file_attribute() -> Attribute {
    AttributeBuilder::new("result_output_file", AttributeType::String)
        .description("Used to save results.")
        .optional()
        .build()
}

/// Writes the result list as pretty JSON when `result_output_file` is set
pub(crate) fn write_result_file(output: Option<String>, results: &Dynamic) -> Result<(), Diagnostic> {
    let Some(output) = output.filter(|o| !o.is_empty()) else {
        return Ok(());
    };
    let body = serde_json::to_string_pretty(results)
        .map_err(|e| Diagnostic::error("Failed to encode results", e.to_string()))?;
    std::fs::write(&output, body).map_err(|e| {
        Diagnostic::error(
            "Failed to write result file",
            format!("writing {}: {}", output, e),
        )
    })?;
    tracing::debug!(file = %output, "wrote data source results");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(key: &str, value: &str) -> Tag {
        Tag {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn ids_hash_is_stable_and_order_sensitive() {
        let a = ids_hash(&["vpc-1".to_string(), "vpc-2".to_string()]);
        let b = ids_hash(&["vpc-1".to_string(), "vpc-2".to_string()]);
        let c = ids_hash(&["vpc-2".to_string(), "vpc-1".to_string()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn tag_filters_are_sorted() {
        let tags = HashMap::from([
            ("team".to_string(), "net".to_string()),
            ("env".to_string(), "prod".to_string()),
        ]);
        let filters = tag_filters(&tags);
        assert_eq!(filters[0], Filter::new("tag:env", "prod"));
        assert_eq!(filters[1], Filter::new("tag:team", "net"));
    }

    #[test]
    fn tag_subset_match() {
        let set = vec![tag("env", "prod"), tag("team", "net")];
        assert!(has_tags(&set, &HashMap::new()));
        assert!(has_tags(&set, &HashMap::from([("env".to_string(), "prod".to_string())])));
        assert!(!has_tags(&set, &HashMap::from([("env".to_string(), "dev".to_string())])));
    }

    #[test]
    fn result_file_is_written_only_when_requested() {
        assert!(write_result_file(None, &Dynamic::List(vec![])).is_ok());

        let path = std::env::temp_dir().join(format!("tc-result-{}.json", std::process::id()));
        let output = path.to_string_lossy().to_string();
        write_result_file(Some(output), &Dynamic::List(vec![Dynamic::from("vpc-1")])).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("vpc-1"));
        let _ = std::fs::remove_file(path);
    }
}
