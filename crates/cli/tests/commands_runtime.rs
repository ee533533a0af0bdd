use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use cmdbot_cli::commands::{config, listen, register, send};
use cmdbot_core::config::ViberConfig;
use cmdbot_core::envelope::RelayEnvelope;
use cmdbot_core::executor::CommandExecutor;
use cmdbot_core::messages::OutboundMessage;
use cmdbot_core::registry::OutputFormat;
use cmdbot_relay::{InMemoryRelay, Relay};
use cmdbot_viber::{ReconnectPolicy, RecordingSender, RelayListener, ViberClient};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::watch;

const CONFIG: &str = r#"
[Viber]
authentication_token = "445da6az1s345z78-dazcczb2542zv51a"
name = "Command Bot"
webhook = "https://bot.example.com/"
notify_user_id = "admin=="
trusted_user_ids = ["admin==", "ops=="]

["Command uptime"]
execute = "uptime"

["Command snapshot"]
execute = "snapshot --json"
output_format = "json"

["Command broken"]
help = "no execute key"
"#;

#[test]
fn register_reports_config_failure_without_file() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let result = register::run(Some(&dir.path().join("absent.conf")), None);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "register");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[tokio::test]
async fn register_reports_unreachable_api() {
    let client = ViberClient::with_base_url(&viber_config(), "http://127.0.0.1:9")
        .expect("client builds");

    let result = register::register(&client, "https://bot.example.com/").await;
    assert_eq!(result.exit_code, 4);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["error_class"], "viber_api");
}

#[tokio::test]
async fn send_delivers_text_then_media() {
    let sender = RecordingSender::default();

    let result = send::send(&sender, "ops==", "front door", Some("https://cam/1.jpg")).await;
    assert_eq!(result.exit_code, 0);
    assert_eq!(parse_payload(&result.output)["status"], "ok");

    assert_eq!(
        sender.deliveries().await,
        vec![(
            "ops==".to_owned(),
            vec![
                OutboundMessage::Text("front door".to_owned()),
                OutboundMessage::Url("https://cam/1.jpg".to_owned()),
            ]
        )]
    );
}

#[tokio::test]
async fn send_without_content_is_a_no_op() {
    let sender = RecordingSender::default();

    let result = send::send(&sender, "ops==", "", None).await;
    assert_eq!(result.exit_code, 0);
    assert_eq!(parse_payload(&result.output)["message"], "nothing to send");
    assert!(sender.deliveries().await.is_empty());
}

#[test]
fn listen_requires_relay_channel() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let result = listen::run(Some(&write_config(&dir, CONFIG)));
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "listen");
        assert_eq!(payload["error_class"], "relay_disabled");
    });
}

#[tokio::test]
async fn listen_runs_relayed_commands_until_shutdown() {
    let relay = Arc::new(Relay::new(Arc::new(InMemoryRelay::default()), "viber", "Command Bot"));
    let sender = Arc::new(RecordingSender::default());
    relay.listen().await.expect("subscribe before publishing");

    let listener =
        RelayListener::new(relay.clone(), CommandExecutor::default(), sender.clone(), "alpha")
            .with_receive_timeout(Duration::from_millis(20));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let driver = async {
        let envelope =
            RelayEnvelope::execute("ops==", "echo relayed", "Operator", OutputFormat::Text);
        relay.publish(envelope).await;
        for _ in 0..500 {
            if !sender.deliveries().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown_tx.send(true).expect("signal shutdown");
    };
    let (result, ()) = tokio::join!(listen::listen(&listener, shutdown_rx), driver);

    assert_eq!(result.exit_code, 0);
    assert_eq!(sender.texts_for("ops==").await, vec!["relayed".to_owned()]);
}

#[tokio::test]
async fn listen_fails_once_the_broker_stays_unreachable() {
    let backend = Arc::new(InMemoryRelay::default());
    backend.set_unavailable(true);
    let relay = Arc::new(Relay::new(backend, "viber", "Command Bot"));
    let listener = RelayListener::new(
        relay,
        CommandExecutor::default(),
        Arc::new(RecordingSender::default()),
        "alpha",
    )
    .with_reconnect_policy(ReconnectPolicy { max_retries: 1, base_delay_ms: 0, max_delay_ms: 0 });
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let result = listen::listen(&listener, shutdown_rx).await;

    assert_eq!(result.exit_code, 4);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["error_class"], "relay");
    let message = payload["message"].as_str().expect("message");
    assert!(message.contains("gave up after 2 attempts"), "{message}");
    assert!(message.contains("broker unavailable"), "{message}");
}

#[test]
fn config_reports_sources_and_redacts_token() {
    with_env(&[("VIBER_LOG_LEVEL", "debug")], || {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(&dir, CONFIG);
        let result = config::run(Some(&path));
        assert_eq!(result.exit_code, 0);

        let output = result.output;
        assert!(!output.contains("445da6az1s345z78"), "token must be redacted");
        assert!(output.contains("- Viber.authentication_token = <redacted> (source: file"));
        assert!(output.contains("- Logger.level = debug (source: env (VIBER_LOG_LEVEL))"));
        assert!(output.contains("- Server.listen_port = 8443 (source: default)"));
        assert!(output.contains("- Viber.redis_channel = <unset> (source: default)"));
        assert!(output.contains("commands (3):"));
        assert!(output.contains("- snapshot: `snapshot --json` (json)"));
        assert!(output.contains("- broken: misconfigured:"));
    });
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(&dir, &CONFIG.replace("webhook =", "web ="));
        let result = config::run(Some(&path));

        assert_eq!(result.exit_code, 2);
        assert!(result.output.starts_with("config validation failed"));
        assert!(result.output.contains("webhook"));
    });
}

fn viber_config() -> ViberConfig {
    ViberConfig {
        authentication_token: "token".to_owned().into(),
        name: "Command Bot".to_owned(),
        avatar: None,
        webhook: "https://bot.example.com/".to_owned(),
        notify_user_id: "admin==".to_owned(),
        trusted_user_ids: vec!["admin==".to_owned()],
        command_executor: false,
    }
}

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("viber-command-bot.conf");
    fs::write(&path, contents).expect("write config");
    path
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "VIBER_CONF",
        "VIBER_AUTHENTICATION_TOKEN",
        "VIBER_REDIS_URL",
        "VIBER_REDIS_CHANNEL",
        "VIBER_COMMAND_EXECUTOR",
        "VIBER_LISTEN_ADDRESS",
        "VIBER_LISTEN_PORT",
        "VIBER_LOG_LEVEL",
        "VIBER_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
