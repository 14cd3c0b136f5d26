//! Configuration file loading

use mailsec_rs::config::Config;
use mailsec_rs::error::MailSecError;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_partial_file_keeps_defaults() {
    let file = write_config(
        r#"
[server]
listen_addr = "127.0.0.1:9000"

[analysis]
default_dkim_selector = "google"

[analysis.weights]
dmarc = 2.0
"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.server.listen_addr, "127.0.0.1:9000");
    assert_eq!(config.analysis.default_dkim_selector, "google");
    assert_eq!(config.analysis.weights.dmarc, 2.0);
    assert_eq!(config.analysis.weights.mx, 1.0);
    assert_eq!(config.rate_limit.max_requests, 30);
    assert_eq!(config.logging.format, "pretty");
}

#[test]
fn test_negative_weight_rejected() {
    let file = write_config("[analysis.weights]\nspf = -1.0\n");
    assert!(matches!(
        Config::from_file(file.path()),
        Err(MailSecError::Config(_))
    ));
}

#[test]
fn test_zero_window_rejected() {
    let file = write_config("[rate_limit]\nwindow_secs = 0\n");
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_malformed_toml() {
    let file = write_config("[server\nlisten_addr = ");
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}

#[test]
fn test_missing_file() {
    assert!(Config::from_file("/nonexistent/mailsec.toml").is_err());
}
