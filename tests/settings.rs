// tests/settings.rs
use std::time::Duration;
use std::{env, fs};

use teahaz_client::config::{
    load_settings_default, load_settings_from, ENV_CONFIG_PATH, ENV_DEDUP_HORIZON,
    ENV_OVERLAP_MULTIPLIER, ENV_POLL_INTERVAL, ENV_SERVER,
};
use teahaz_client::ConfigError;

fn clear_env() {
    for k in [
        ENV_CONFIG_PATH,
        ENV_SERVER,
        ENV_POLL_INTERVAL,
        ENV_OVERLAP_MULTIPLIER,
        ENV_DEDUP_HORIZON,
    ] {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn loads_toml_and_json_paths() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("teahaz.toml");
    fs::write(
        &p_toml,
        r#"
server = "http://localhost:13337"

[monitor]
interval_secs = 2
stop_on_failure = true
"#,
    )
    .unwrap();
    let s = load_settings_from(&p_toml).unwrap();
    assert_eq!(s.client.server(), "http://localhost:13337");
    assert_eq!(s.monitor.interval(), Duration::from_secs(2));
    assert!(s.monitor.stop_on_failure());

    let p_json = dir.path().join("teahaz.json");
    fs::write(
        &p_json,
        r#"{"server": "https://chat.example", "monitor": {"overlap_multiplier": 8}}"#,
    )
    .unwrap();
    let s = load_settings_from(&p_json).unwrap();
    assert_eq!(s.client.server(), "https://chat.example");
    assert_eq!(s.monitor.overlap_multiplier(), 8.0);
    assert_eq!(s.monitor.interval(), Duration::from_secs(1));
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    clear_env();
    // Isolate CWD so the repo's own config/ is not picked up.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    // 1) Nothing at all -> server is missing
    let err = load_settings_default().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::Missing("server"))
    ));

    // 2) Fallback TOML in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(
        cfg_dir.join("teahaz.toml"),
        "server = \"http://fallback.example\"\n",
    )
    .unwrap();
    let s = load_settings_default().unwrap();
    assert_eq!(s.client.server(), "http://fallback.example");

    // 3) Config path env var wins over the fallback
    let p_env = tmp.path().join("other.json");
    fs::write(&p_env, r#"{"server": "http://from-env-path.example"}"#).unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    let s = load_settings_default().unwrap();
    assert_eq!(s.client.server(), "http://from-env-path.example");

    // 4) Value overrides win over file values
    env::set_var(ENV_SERVER, "https://override.example");
    env::set_var(ENV_POLL_INTERVAL, "0.5");
    env::set_var(ENV_DEDUP_HORIZON, "5");
    let s = load_settings_default().unwrap();
    assert_eq!(s.client.server(), "https://override.example");
    assert_eq!(s.monitor.interval(), Duration::from_millis(500));
    assert_eq!(s.monitor.dedup_horizon().get(), 5);

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn non_numeric_interval_env_is_rejected() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("teahaz.toml");
    fs::write(&p, "server = \"http://localhost\"\n").unwrap();

    env::set_var(ENV_POLL_INTERVAL, "soon");
    let err = load_settings_from(&p).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidInterval(_))
    ));

    env::set_var(ENV_POLL_INTERVAL, "0");
    assert!(load_settings_from(&p).is_err());
    clear_env();
}

#[serial_test::serial]
#[test]
fn oversized_dedup_horizon_env_is_rejected() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("teahaz.toml");
    fs::write(&p, "server = \"http://localhost\"\n").unwrap();

    env::set_var(ENV_DEDUP_HORIZON, (1usize << 50).to_string());
    let err = load_settings_from(&p).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidHorizon)
    ));
    clear_env();
}

#[serial_test::serial]
#[test]
fn non_existent_config_path_is_an_error() {
    clear_env();
    env::set_var(ENV_CONFIG_PATH, "/definitely/not/here/teahaz.toml");
    assert!(load_settings_default().is_err());
    clear_env();
}
