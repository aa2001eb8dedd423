//! Tag diffing and resource naming

use std::collections::HashMap;

/// Splits a tag change into upserts and removed keys
pub fn diff(
    old: &HashMap<String, String>,
    new: &HashMap<String, String>,
) -> (HashMap<String, String>, Vec<String>) {
    let replace = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut delete: Vec<String> = old
        .keys()
        .filter(|k| !new.contains_key(*k))
        .cloned()
        .collect();
    delete.sort();

    (replace, delete)
}

/// `qcs::<service>:<region>:uin/:<type>/<id>`
pub fn resource_name(service: &str, resource_type: &str, region: &str, id: &str) -> String {
    format!("qcs::{}:{}:uin/:{}/{}", service, region, resource_type, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn diff_replaces_changed_and_deletes_missing() {
        let old = map(&[("env", "dev"), ("team", "net"), ("gone", "x")]);
        let new = map(&[("env", "prod"), ("team", "net"), ("new", "y")]);

        let (replace, delete) = diff(&old, &new);
        assert_eq!(replace, map(&[("env", "prod"), ("new", "y")]));
        assert_eq!(delete, vec!["gone".to_string()]);
    }

    #[test]
    fn diff_of_equal_maps_is_empty() {
        let tags = map(&[("a", "1")]);
        let (replace, delete) = diff(&tags, &tags);
        assert!(replace.is_empty());
        assert!(delete.is_empty());
    }

    #[test]
    fn resource_name_format() {
        assert_eq!(
            resource_name("vpc", "nat", "ap-guangzhou", "nat-123"),
            "qcs::vpc:ap-guangzhou:uin/:nat/nat-123"
        );
    }
}
