//! Section API responses for reads, updates and failures.

use labnode_config::api::SectionApi;
use labnode_config::section::SectionGroup;
use labnode_config::settings::{CapacitySettings, StoreSettings};
use labnode_config::storage::{MemoryFs, WriteFault};
use labnode_config::store::ConfigStore;
use serde_json::json;
use tracing_test::traced_test;

fn api_with(settings: StoreSettings) -> SectionApi<MemoryFs> {
    let mut store = ConfigStore::new(MemoryFs::new(), settings);
    store.load_all();
    SectionApi::new(store)
}

fn api() -> SectionApi<MemoryFs> {
    api_with(StoreSettings::default())
}

#[test]
fn test_get_interface_includes_firmware_version() {
    let api = api();
    let response = api.get_section(SectionGroup::Interface);
    assert_eq!(response.status, 200);
    assert_eq!(response.body["nodeId"], "labnode0001");
    assert_eq!(response.body["wifi"]["mode"], "AP");
    assert_eq!(
        response.body["fwVersion"],
        json!(api.store().settings().fw_version)
    );
    assert!(response.body.get("inputs").is_none());
}

#[test]
fn test_get_io_includes_limits_and_metadata() {
    let response = api().get_section(SectionGroup::Io);
    assert_eq!(response.status, 200);
    assert_eq!(response.body["limits"], json!({"maxInputs": 4, "maxOutputs": 2}));
    assert_eq!(response.body["metadata"]["nodeId"], "labnode0001");
    assert_eq!(response.body["inputCount"], 0);
    assert!(response.body.get("nodeId").is_none());
}

#[test]
fn test_get_all_has_every_section() {
    let body = api().get_all().body;
    for key in ["nodeId", "wifi", "modules", "inputs", "outputs", "virtualMultimeter", "peers"] {
        assert!(body.get(key).is_some(), "missing {}", key);
    }
}

#[test]
fn test_empty_body_is_rejected() {
    let mut api = api();
    let response = api.post_section(SectionGroup::Io, "  \n");
    assert_eq!(response.status, 400);
    assert_eq!(response.body, json!({"error": "no_body"}));
}

#[test]
fn test_invalid_json_reports_detail() {
    let mut api = api();
    let response = api.post_section(SectionGroup::Interface, r#"{"nodeId": "#);
    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"], "invalid_json");
    assert!(!response.body["detail"].as_str().unwrap().is_empty());
    assert!(!response.restart_required);
}

#[test]
fn test_oversized_body_is_payload_too_large() {
    let settings = StoreSettings {
        capacity: CapacitySettings {
            min_capacity: 256,
            safety_margin: 64,
            ceiling: 512,
            grow_increment: 128,
        },
        ..StoreSettings::default()
    };
    let mut api = api_with(settings);
    let long_unit = "x".repeat(600);
    let body = format!(
        r#"{{"inputs": [{{"name": "IN1", "type": "adc", "unit": "{}"}}], "outputs": []}}"#,
        long_unit
    );
    let response = api.post_section(SectionGroup::Io, &body);
    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"], "payload_too_large");
    assert!(api.store().config().inputs.is_empty());
}

#[test]
#[traced_test]
fn test_io_update_reports_changes() {
    let mut api = api();
    let response = api.post_section(
        SectionGroup::Io,
        r#"{"modules": {"ads1115": true},
            "inputs": [{"name": "IN1", "type": "ads1115", "adsChannel": 2}],
            "outputs": []}"#,
    );
    assert_eq!(response.status, 200, "{}", response.body_text());
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["verified"], true);
    assert_eq!(response.body["requiresReboot"], true);
    assert!(!response.restart_required);
    let changes = response.body["changes"].as_array().unwrap();
    assert!(changes[0]
        .as_str()
        .unwrap()
        .starts_with("Input added: IN1 (type=ads1115"));
    assert!(logs_contain("Input added: IN1"));
}

#[test]
fn test_interface_update_requires_restart() {
    let mut api = api();
    let response = api.post_section(
        SectionGroup::Interface,
        r#"{"nodeId": "labnode00AA", "wifi": {"mode": "STA", "ssid": "lab", "pass": "pw"}}"#,
    );
    assert_eq!(response.status, 200);
    assert!(response.restart_required);
    assert_eq!(response.body["nodeId"], "labnode00AA");
    assert_eq!(api.store().config().wifi.ssid, "lab");
}

#[test]
fn test_virtual_update_echoes_applied_channels() {
    let mut api = api();
    let response = api.post_section(
        SectionGroup::Virtual,
        r#"{"channels": [{"id": "m1", "input": "IN1", "bits": 40}]}"#,
    );
    assert_eq!(response.status, 200);
    let applied = &response.body["applied"];
    assert_eq!(applied["channelCount"], 1);
    assert_eq!(applied["channels"][0]["bits"], 32);
    assert_eq!(applied["channels"][0]["label"], "m1");
    assert!(response.body["warnings"].is_array());
}

#[test]
fn test_peers_require_an_array() {
    let mut api = api();
    let response = api.post_peers(r#"{"peers": {"labnode0002": {"pin": "1"}}}"#);
    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"], "invalid_json");

    let response = api.post_peers("");
    assert_eq!(response.body["error"], "no_body");
}

#[test]
fn test_peers_replace_list() {
    let mut api = api();
    let response = api.post_peers(
        r#"{"peers": [{"nodeId": "labnode0002", "pin": "1111"}, {"nodeId": "labnode0003", "pin": "2222"}]}"#,
    );
    assert_eq!(response.status, 200);
    assert_eq!(response.body["peerCount"], 2);

    let response = api.post_peers(r#"{"peers": []}"#);
    assert_eq!(response.status, 200);
    assert!(api.store().config().peers.is_empty());
    assert_eq!(api.get_section(SectionGroup::Interface).body["peerCount"], 0);
}

#[test]
fn test_save_failure_is_500() {
    let mut api = api();
    api.store_mut()
        .fs_mut()
        .inject_write_fault("io_config.json", WriteFault::Fail);
    let response = api.post_section(SectionGroup::Io, r#"{"inputs": [], "outputs": []}"#);
    assert_eq!(response.status, 500);
    assert_eq!(response.body["error"], "save_failed");
    assert!(response.body["detail"]
        .as_str()
        .unwrap()
        .contains("injected write failure"));
}

#[test]
fn test_verify_failure_is_500_with_field_path() {
    let mut api = api();
    api.store_mut().fs_mut().inject_write_fault(
        "interface_config.json",
        WriteFault::Replace(br#"{"nodeId": "labnode0001", "wifi": {"mode": "AP", "ssid": "other", "pass": ""}}"#.to_vec()),
    );
    let response = api.post_section(
        SectionGroup::Interface,
        r#"{"wifi": {"ssid": "bench"}}"#,
    );
    assert_eq!(response.status, 500);
    assert_eq!(response.body["error"], "verify_failed");
    assert_eq!(response.body["detail"], "wifi.ssid: bench -> other");
    assert_eq!(api.store().config().wifi.ssid, "labnode0001");
}
