//! Label schema and sanitization rules.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::BTreeMap;

use dockprom_core::error::ErrorKind;
use dockprom_core::labels::{
    is_valid_metric_name, parse_label_list, sanitize_label_key, sanitize_metric_name, LabelSchema,
};
use dockprom_core::stats::Target;

fn target(labels: &[(&str, &str)]) -> Target {
    let labels: BTreeMap<String, String> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Target::new("id-1", "/web", labels)
}

#[test]
fn label_list_is_trimmed() {
    assert_eq!(parse_label_list(" team, com.example.tier ,,"), vec!["team", "com.example.tier"]);
    assert!(parse_label_list("").is_empty());
}

#[test]
fn label_keys_are_sanitized() {
    assert_eq!(sanitize_label_key("com.example-tier"), "com_example_tier");
    assert_eq!(sanitize_label_key("9lives"), "_9lives");
    assert_eq!(sanitize_metric_name("net_rx-bytes"), "net_rx_bytes");
    assert!(is_valid_metric_name("docker_container_"));
    assert!(!is_valid_metric_name("docker-container"));
    assert!(!is_valid_metric_name(""));
}

#[test]
fn schema_keys_start_with_name() {
    let schema = LabelSchema::new(&["team".into(), "com.example.tier".into()]).unwrap();
    assert_eq!(schema.keys(), vec!["name", "label_team", "label_com_example_tier"]);
}

#[test]
fn missing_label_is_empty_string() {
    let schema = LabelSchema::new(&["team".into(), "tier".into()]).unwrap();
    let set = schema.label_set(&target(&[("team", "infra")]));
    assert_eq!(set.get("name"), Some("web"));
    assert_eq!(set.get("label_team"), Some("infra"));
    assert_eq!(set.get("label_tier"), Some(""));
}

#[test]
fn colliding_labels_are_rejected() {
    let err = LabelSchema::new(&["a.b".into(), "a-b".into()]).expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn extra_labels_follow_base_labels() {
    let schema = LabelSchema::new(&["team".into()]).unwrap();
    let set = schema.label_set(&target(&[]));
    let all = set.with_extra(&[("network_interface", "eth0")]);
    assert_eq!(all, vec![("name", "web"), ("label_team", ""), ("network_interface", "eth0")]);
}
