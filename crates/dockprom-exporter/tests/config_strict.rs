#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use dockprom_core::error::ErrorKind;
use dockprom_exporter::config::{self, StatsMode};

fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn deny_unknown_fields() {
    let bad = r#"
version: 1
monitor_label: "com.example.scrape"
refresh_intervl_secs: 5 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.monitor_label, "be.vbgn.prometheus-docker-exporter");
    assert_eq!(cfg.stats_prefix, "docker_container_");
    assert!(cfg.expose_labels.is_empty());
    assert_eq!(cfg.refresh_interval(), Duration::from_secs(10));
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.stats_mode, StatsMode::Stream);
}

#[test]
fn version_is_required() {
    let err = config::load_from_str("monitor_label: x\n").expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::Config);
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn env_defaults_without_file() {
    let cfg = config::load_with(Vec::new()).unwrap();
    assert_eq!(cfg.listen().unwrap().to_string(), "0.0.0.0:8080");
    assert_eq!(cfg.docker_host, "unix:///var/run/docker.sock");
    assert_eq!(cfg.max_discovery_failures, 0);
}

#[test]
fn env_overrides() {
    let cfg = config::load_with(vars(&[
        ("MONITOR_LABEL", "com.example.scrape"),
        ("STATS_PREFIX", "ctr_"),
        ("EXPOSE_LABELS", " team, com.example.tier ,"),
        ("REFRESH_INTERVAL", "3"),
        ("EXPORTER_PORT", "9100"),
        ("STATS_MODE", "poll"),
        ("DOCKER_HOST", "tcp://127.0.0.1:2375"),
        ("MAX_DISCOVERY_FAILURES", "5"),
    ]))
    .unwrap();

    assert_eq!(cfg.monitor_label, "com.example.scrape");
    assert_eq!(cfg.stats_prefix, "ctr_");
    assert_eq!(cfg.expose_labels, vec!["team", "com.example.tier"]);
    assert_eq!(cfg.refresh_interval_secs, 3);
    assert_eq!(cfg.port, 9100);
    assert_eq!(cfg.stats_mode, StatsMode::Poll);
    assert_eq!(cfg.docker_host, "tcp://127.0.0.1:2375");
    assert_eq!(cfg.max_discovery_failures, 5);
    assert_eq!(
        cfg.label_schema().unwrap().keys(),
        vec!["name", "label_team", "label_com_example_tier"]
    );
}

#[test]
fn invalid_env_values_are_rejected() {
    for (key, value) in [
        ("REFRESH_INTERVAL", "ten"),
        ("REFRESH_INTERVAL", "0"),
        ("EXPORTER_PORT", "0"),
        ("EXPORTER_PORT", "70000"),
        ("STATS_PREFIX", "docker-container"),
        ("STATS_MODE", "push"),
        ("DOCKER_HOST", "npipe:////./pipe/docker_engine"),
        ("MONITOR_LABEL", " "),
        ("EXPOSE_LABELS", "a.b,a-b"),
    ] {
        let err = config::load_with(vars(&[(key, value)])).expect_err(key);
        assert_eq!(err.kind(), ErrorKind::Config, "{key}={value}");
    }
}

#[test]
fn env_overrides_yaml_file() {
    let path = std::env::temp_dir().join(format!("dockprom-config-{}.yaml", std::process::id()));
    std::fs::write(
        &path,
        "version: 1\nstats_prefix: file_\nrefresh_interval_secs: 30\nexpose_labels: [team]\n",
    )
    .unwrap();

    let cfg = config::load_with(vars(&[
        ("DOCKPROM_CONFIG", path.to_str().unwrap()),
        ("REFRESH_INTERVAL", "5"),
    ]))
    .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(cfg.stats_prefix, "file_");
    assert_eq!(cfg.expose_labels, vec!["team"]);
    assert_eq!(cfg.refresh_interval_secs, 5);
}

#[test]
fn missing_config_file_is_an_error() {
    let err = config::load_with(vars(&[("DOCKPROM_CONFIG", "/nonexistent/dockprom.yaml")]))
        .expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::Config);
}
