use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use multihead_grabber::config::{GrabberConfig, Overrides};
use multihead_grabber::RoundPolicy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "MULTIHEAD_CONFIG",
        "MULTIHEAD_DEVICE",
        "MULTIHEAD_TIMEOUT_MS",
        "MULTIHEAD_POLICY",
        "MULTIHEAD_PARALLEL",
        "MULTIHEAD_ROUNDS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_match_reference_behaviour() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = GrabberConfig::load().expect("load defaults");
    assert_eq!(cfg.device, "stub://o3r");
    assert_eq!(cfg.acquisition.timeout, Duration::from_millis(3000));
    assert_eq!(cfg.acquisition.policy, RoundPolicy::CollectAll);
    assert!(!cfg.acquisition.parallel);
    assert_eq!(cfg.acquisition.rounds, 1);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "device": "/etc/multihead/platform.json",
        "acquisition": {
            "timeout_ms": 1500,
            "policy": "fail-fast",
            "parallel": true,
            "rounds": 4
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("MULTIHEAD_CONFIG", file.path());
    std::env::set_var("MULTIHEAD_TIMEOUT_MS", "250");
    std::env::set_var("MULTIHEAD_PARALLEL", "false");

    let cfg = GrabberConfig::load().expect("load config");

    assert_eq!(cfg.device, "/etc/multihead/platform.json");
    assert_eq!(cfg.acquisition.timeout, Duration::from_millis(250));
    assert_eq!(cfg.acquisition.policy, RoundPolicy::FailFast);
    assert!(!cfg.acquisition.parallel);
    assert_eq!(cfg.acquisition.rounds, 4);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MULTIHEAD_TIMEOUT_MS", "0");
    assert!(GrabberConfig::load().is_err());
    clear_env();

    std::env::set_var("MULTIHEAD_TIMEOUT_MS", "soon");
    assert!(GrabberConfig::load().is_err());
    clear_env();

    std::env::set_var("MULTIHEAD_POLICY", "best-effort");
    assert!(GrabberConfig::load().is_err());
    clear_env();

    std::env::set_var("MULTIHEAD_ROUNDS", "0");
    assert!(GrabberConfig::load().is_err());
    clear_env();
}

#[test]
fn unreadable_config_file_is_reported() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ \"acquisition\": 5 }").expect("write config");
    let err = GrabberConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
}

#[test]
fn blank_env_values_are_ignored() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    for key in [
        "MULTIHEAD_DEVICE",
        "MULTIHEAD_TIMEOUT_MS",
        "MULTIHEAD_POLICY",
        "MULTIHEAD_PARALLEL",
        "MULTIHEAD_ROUNDS",
    ] {
        std::env::set_var(key, "");
    }

    let cfg = GrabberConfig::load().expect("blank values fall back to defaults");
    assert_eq!(cfg.device, "stub://o3r");
    assert_eq!(cfg.acquisition.timeout, Duration::from_millis(3000));
    assert!(!cfg.acquisition.parallel);
    assert_eq!(cfg.acquisition.rounds, 1);

    clear_env();
}

#[test]
fn flag_overrides_beat_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "acquisition": { "parallel": true, "rounds": 3 } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    let mut cfg = GrabberConfig::load_from(Some(file.path())).expect("load config");
    assert!(cfg.acquisition.parallel);

    cfg.apply_overrides(Overrides {
        parallel: Some(false),
        policy: Some(RoundPolicy::FailFast),
        ..Overrides::default()
    })
    .expect("apply overrides");
    assert!(!cfg.acquisition.parallel);
    assert_eq!(cfg.acquisition.policy, RoundPolicy::FailFast);
    assert_eq!(cfg.acquisition.rounds, 3);

    let err = cfg
        .apply_overrides(Overrides {
            rounds: Some(0),
            ..Overrides::default()
        })
        .unwrap_err();
    assert!(err.to_string().contains("rounds"));
}
