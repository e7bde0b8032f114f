//! Configuration file round trips through the filesystem

use std::path::PathBuf;

use chatter_cli::{AppConfig, CliError};
use chatter_core::EditPolicy;

fn scratch_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("chatter-cli-{}-{}.toml", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_full_config_file() {
    let path = scratch_file(
        "full",
        r#"
        [server]
        server_name = "Lobby"
        server_id = 12
        bind_address = "0.0.0.0:5000"
        heartbeat_enabled = true
        heartbeat_interval_ms = 2500
        edit_policy = "sender_only"
        announce_connections = true
        outbound_buffer_size = 128
        max_line_length = 4096

        [logging]
        level = "debug"
        with_target = true
        "#,
    );

    let config = AppConfig::load_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.server.server_name, "Lobby");
    assert_eq!(config.server.server_id, 12);
    assert_eq!(config.server.heartbeat_interval_ms, 2500);
    assert_eq!(config.server.edit_policy, EditPolicy::SenderOnly);
    assert!(config.server.announce_connections);
    assert_eq!(config.server.outbound_buffer_size, 128);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_written_config_loads_back() {
    let mut original = AppConfig::default();
    original.server.server_name = "Written".to_string();
    original.server.heartbeat_enabled = false;

    let path = scratch_file("written", &original.to_toml().unwrap());
    let loaded = AppConfig::load_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, original);
}

#[test]
fn test_zero_buffer_is_rejected() {
    let path = scratch_file("zero-buffer", "[server]\noutbound_buffer_size = 0\n");
    let result = AppConfig::load_from_file(&path);
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(CliError::Core(_))));
}
