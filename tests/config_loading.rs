//! 配置加载集成测试

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::fmt::MakeWriter;

use json_translator::translation::config::{ConfigManager, StorageBackend};
use json_translator::translation::error::TranslationError;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn test_file_values_override_defaults() {
    let file = write_config(
        r#"
[provider]
auth_key = "test-key:fx"
timeout_secs = 15

[pipeline]
batch_size = 20

[queue]
callback_timeout_secs = 5

[queue.translation]
concurrency = 2
max_attempts = 7
backoff_base_ms = 100

[server]
port = 8080
"#,
    );

    let manager = ConfigManager::from_path(file.path()).unwrap();
    let config = manager.config();

    assert_eq!(manager.config_path(), Some(file.path()));
    assert_eq!(config.provider.auth_key.as_deref(), Some("test-key:fx"));
    assert_eq!(config.provider.timeout(), Duration::from_secs(15));
    assert_eq!(config.pipeline.batch_size, 20);
    assert_eq!(config.queue.callback_timeout(), Duration::from_secs(5));
    assert_eq!(config.queue.translation.concurrency, 2);
    assert_eq!(config.queue.translation.max_attempts, 7);
    assert_eq!(config.queue.translation.backoff_base(), Duration::from_millis(100));
    assert_eq!(config.server.port, 8080);

    // 未出现在文件中的值保持默认
    assert_eq!(config.pipeline.segment_threshold, 100);
    assert_eq!(config.queue.callback.concurrency, 10);
    assert_eq!(config.queue.callback.max_attempts, 10);
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert!(config.provider.api_url.starts_with("https://"));
}

#[test]
fn test_mongo_section_is_parsed() {
    let file = write_config(
        r#"
[storage]
backend = "mongo"
uri = "mongodb://localhost:27017"
database = "relay_test"
"#,
    );

    let config = ConfigManager::from_path(file.path()).unwrap().into_config();
    assert_eq!(config.storage.backend, StorageBackend::Mongo);
    assert_eq!(config.storage.uri.as_deref(), Some("mongodb://localhost:27017"));
    assert_eq!(config.storage.database, "relay_test");
}

#[test]
fn test_invalid_values_are_rejected() {
    let zero_batch = write_config("[pipeline]\nbatch_size = 0\n");
    assert!(matches!(
        ConfigManager::from_path(zero_batch.path()),
        Err(TranslationError::ConfigError(_))
    ));

    let mongo_without_uri = write_config("[storage]\nbackend = \"mongo\"\n");
    assert!(ConfigManager::from_path(mongo_without_uri.path()).is_err());

    let bad_url = write_config("[provider]\napi_url = \"not a url\"\n");
    assert!(ConfigManager::from_path(bad_url.path()).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let error = ConfigManager::from_path(&missing).unwrap_err();
    assert!(matches!(error, TranslationError::ConfigError(_)));
}

/// 收集日志输出的写入器
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn test_loading_logs_reach_installed_subscriber() {
    let file = write_config("[server]\nport = 8081\n");
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();

    let manager = tracing::subscriber::with_default(subscriber, || {
        ConfigManager::from_path(file.path())
    })
    .unwrap();

    assert_eq!(manager.config().server.port, 8081);
    let output = logs.contents();
    assert!(output.contains("加载配置文件"), "{}", output);
    assert!(output.contains(&file.path().display().to_string()), "{}", output);
}
