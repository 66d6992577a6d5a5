//! Integration tests for tether-config

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use temp_env::with_vars;
use tether_config::*;

#[test]
fn test_default_config_validation() {
    let config = TetherConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("TETHER_POLL_INTERVAL_MS", Some("5")),
        ("TETHER_STARTUP_TIMEOUT_MS", Some("")),
        ("TETHER_SHUTDOWN_GRACE_MS", Some("250")),
        ("TETHER_WORKER_PROGRAM", Some("/usr/local/bin/tether")),
        ("TETHER_WORKER_TYPE", Some("counter")),
        ("TETHER_LOG_LEVEL", Some("debug")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.supervisor.poll_interval, Duration::from_millis(5));
        assert_eq!(config.supervisor.startup_timeout, None);
        assert_eq!(
            config.supervisor.shutdown_grace,
            Some(Duration::from_millis(250))
        );
        assert_eq!(
            config.worker.program,
            Some(PathBuf::from("/usr/local/bin/tether"))
        );
        assert_eq!(config.worker.worker_type.as_deref(), Some("counter"));
        assert_eq!(config.logging.level, LogLevel::Debug);
    });
}

#[test]
fn test_invalid_env_value_is_rejected() {
    with_vars(vec![("TETHER_POLL_INTERVAL_MS", Some("soon"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Env { ref var, .. } if var == "TETHER_POLL_INTERVAL_MS"
        ));
    });

    with_vars(vec![("TETHER_POLL_INTERVAL_MS", Some("0"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { domain: "supervisor", .. }));
    });

    with_vars(vec![("TETHER_LOG_LEVEL", Some("loud"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert_eq!(err.origin(), "TETHER_LOG_LEVEL");
        assert!(err.to_string().contains("loud"));
    });
}

#[test]
fn test_custom_prefix() {
    with_vars(vec![("MYAPP_LOG_LEVEL", Some("trace"))], || {
        let config = ConfigLoader::with_prefix("MYAPP").from_env().unwrap();
        assert_eq!(config.logging.level, LogLevel::Trace);
    });
}

#[test]
fn test_yaml_config_serialization() {
    let yaml = TetherConfig::generate_sample();
    let parsed: TetherConfig = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed, TetherConfig::default());
}

#[test]
fn test_load_from_file() {
    let yaml = r#"
supervisor:
  poll_interval: 2
  startup_timeout: 1500
  shutdown_grace: ~

worker:
  worker_type: echo
  args: [1, 2]
  kwargs:
    x: 3

logging:
  level: warn
  format: compact
  ansi: false
"#;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let config = ConfigLoader::new().load(Some(file.path())).unwrap();

    assert_eq!(config.supervisor.poll_interval, Duration::from_millis(2));
    assert_eq!(
        config.supervisor.startup_timeout,
        Some(Duration::from_millis(1500))
    );
    assert_eq!(config.supervisor.shutdown_grace, None);
    assert_eq!(config.worker.worker_type.as_deref(), Some("echo"));
    assert_eq!(config.worker.args.len(), 2);
    assert_eq!(config.worker.kwargs["x"], 3);
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert!(!config.logging.ansi);
}

#[test]
fn test_missing_file() {
    let err = ConfigLoader::new()
        .from_file("/nonexistent/tether.yaml")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("/nonexistent/tether.yaml"));
}
