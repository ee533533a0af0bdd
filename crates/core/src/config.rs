use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "VIBER_CONF";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/viber/viber-command-bot.conf";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

const VIBER_SECTION: &str = "Viber";
const LOGGER_SECTION: &str = "Logger";
const SERVER_SECTION: &str = "Server";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub viber: ViberConfig,
    pub relay: RelayConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// Every section that is not one of the fixed blocks, with values kept as
    /// literal strings. Command definitions are read from here.
    pub sections: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Clone, Debug)]
pub struct ViberConfig {
    pub authentication_token: SecretString,
    pub name: String,
    pub avatar: Option<String>,
    pub webhook: String,
    pub notify_user_id: String,
    pub trusted_user_ids: Vec<String>,
    pub command_executor: bool,
}

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub url: String,
    pub channel: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen_address: String,
    pub listen_port: u16,
    pub worker_limit: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub webhook: Option<String>,
    pub listen_address: Option<String>,
    pub listen_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("configuration file not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration block \"{0}\" is missing")]
    MissingSection(&'static str),
    #[error("{section} \"{key}\" is not configured")]
    MissingKey { section: &'static str, key: &'static str },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            viber: ViberConfig {
                authentication_token: String::new().into(),
                name: String::new(),
                avatar: None,
                webhook: String::new(),
                notify_user_id: String::new(),
                trusted_user_ids: Vec::new(),
                command_executor: false,
            },
            relay: RelayConfig { url: DEFAULT_REDIS_URL.to_string(), channel: None },
            server: ServerConfig {
                listen_address: "127.0.0.1".to_string(),
                listen_port: 8443,
                worker_limit: 8,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            sections: BTreeMap::new(),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl ViberConfig {
    pub fn is_trusted(&self, user_id: &str) -> bool {
        self.trusted_user_ids.iter().any(|trusted| trusted == user_id)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let path = resolve_config_path(options.config_path.as_deref());

        let mut found_viber_section = false;
        if path.exists() {
            let patch = read_patch(&path)?;
            found_viber_section = patch.viber.is_some();
            config.apply_patch(patch);
        } else if options.require_file {
            return Err(ConfigError::MissingConfigFile(path));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        if options.require_file && !found_viber_section {
            return Err(ConfigError::MissingSection(VIBER_SECTION));
        }
        config.validate()?;

        Ok(config)
    }

    /// Sections whose name starts with `prefix`, keyed by the trimmed remainder.
    pub fn sections_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a BTreeMap<String, String>)> + 'a {
        self.sections.iter().filter_map(move |(name, values)| {
            name.strip_prefix(prefix).map(|rest| (rest.trim(), values))
        })
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(viber) = patch.viber {
            if let Some(token) = viber.authentication_token {
                self.viber.authentication_token = token.into();
            }
            if let Some(name) = viber.name {
                self.viber.name = name;
            }
            if let Some(avatar) = viber.avatar {
                self.viber.avatar = Some(avatar);
            }
            if let Some(webhook) = viber.webhook {
                self.viber.webhook = webhook;
            }
            if let Some(notify_user_id) = viber.notify_user_id {
                self.viber.notify_user_id = notify_user_id;
            }
            if let Some(trusted) = viber.trusted_user_ids {
                self.viber.trusted_user_ids = trusted.into_vec();
            }
            if let Some(command_executor) = viber.command_executor {
                self.viber.command_executor = command_executor;
            }
            if let Some(url) = viber.redis_url {
                self.relay.url = url;
            } else if let Some(host) = viber.redis_host {
                self.relay.url = redis_url_from_host(&host);
            }
            if let Some(channel) = viber.redis_channel {
                self.relay.channel = Some(channel).filter(|value| !value.trim().is_empty());
            }
        }

        if let Some(logger) = patch.logger {
            if let Some(level) = logger.level {
                self.logging.level = level;
            }
            if let Some(format) = logger.format {
                self.logging.format = format;
            }
        }

        if let Some(server) = patch.server {
            if let Some(listen_address) = server.listen_address {
                self.server.listen_address = listen_address;
            }
            if let Some(listen_port) = server.listen_port {
                self.server.listen_port = listen_port;
            }
            if let Some(worker_limit) = server.worker_limit {
                self.server.worker_limit = worker_limit;
            }
        }

        self.sections = patch.sections;
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("VIBER_AUTHENTICATION_TOKEN") {
            self.viber.authentication_token = value.into();
        }
        if let Some(value) = read_env("VIBER_REDIS_URL") {
            self.relay.url = value;
        }
        if let Some(value) = read_env("VIBER_REDIS_CHANNEL") {
            self.relay.channel = Some(value);
        }
        if let Some(value) = read_env("VIBER_COMMAND_EXECUTOR") {
            self.viber.command_executor = parse_bool("VIBER_COMMAND_EXECUTOR", &value)?;
        }
        if let Some(value) = read_env("VIBER_LISTEN_ADDRESS") {
            self.server.listen_address = value;
        }
        if let Some(value) = read_env("VIBER_LISTEN_PORT") {
            self.server.listen_port = value.parse::<u16>().map_err(|_| {
                ConfigError::InvalidEnvOverride { key: "VIBER_LISTEN_PORT".to_string(), value }
            })?;
        }
        if let Some(value) = read_env("VIBER_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("VIBER_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(webhook) = overrides.webhook {
            self.viber.webhook = webhook;
        }
        if let Some(listen_address) = overrides.listen_address {
            self.server.listen_address = listen_address;
        }
        if let Some(listen_port) = overrides.listen_port {
            self.server.listen_port = listen_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_viber(&self.viber)?;
        if self.viber.command_executor && self.relay.channel.is_none() {
            return Err(ConfigError::Validation(
                "Viber.command_executor requires Viber.redis_channel".to_string(),
            ));
        }
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Explicit path, else `$VIBER_CONF`, else the system default.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit_path {
        return path.to_path_buf();
    }

    read_env(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let mut document = toml::from_str::<toml::Table>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })?;

    // Command tables hold shell text; `${VAR}` there belongs to the shell.
    for section in [VIBER_SECTION, LOGGER_SECTION, SERVER_SECTION] {
        if let Some(value) = document.get_mut(section) {
            interpolate_value(value)?;
        }
    }

    ConfigPatch::from_document(document)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_value(value: &mut toml::Value) -> Result<(), ConfigError> {
    match value {
        toml::Value::String(text) => *text = interpolate_env_vars(text)?,
        toml::Value::Array(items) => {
            for item in items {
                interpolate_value(item)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                interpolate_value(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || !matches!(chars.peek(), Some('{')) {
            output.push(ch);
            continue;
        }

        chars.next();
        let mut var = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(next) => var.push(next),
                None => return Err(ConfigError::UnterminatedInterpolation),
            }
        }

        match env::var(&var) {
            Ok(value) => output.push_str(&value),
            Err(_) => return Err(ConfigError::MissingEnvInterpolation { var }),
        }
    }

    Ok(output)
}

fn redis_url_from_host(host: &str) -> String {
    let host = host.trim();
    if host.contains("://") {
        host.to_string()
    } else {
        format!("redis://{host}")
    }
}

fn validate_viber(viber: &ViberConfig) -> Result<(), ConfigError> {
    let required = [
        ("authentication_token", viber.authentication_token.expose_secret()),
        ("name", viber.name.as_str()),
        ("webhook", viber.webhook.as_str()),
        ("notify_user_id", viber.notify_user_id.as_str()),
    ];
    for (key, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingKey { section: VIBER_SECTION, key });
        }
    }

    if viber.trusted_user_ids.is_empty() {
        return Err(ConfigError::MissingKey { section: VIBER_SECTION, key: "trusted_user_ids" });
    }

    if !viber.webhook.starts_with("https://") && !viber.webhook.starts_with("http://") {
        return Err(ConfigError::Validation(
            "Viber.webhook must start with https:// or http://".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.listen_port == 0 {
        return Err(ConfigError::Validation(
            "Server.listen_port must be greater than zero".to_string(),
        ));
    }

    if server.worker_limit == 0 {
        return Err(ConfigError::Validation(
            "Server.worker_limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "Logger.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Default)]
struct ConfigPatch {
    viber: Option<ViberPatch>,
    logger: Option<LoggerPatch>,
    server: Option<ServerPatch>,
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConfigPatch {
    fn from_document(document: toml::Table) -> Result<Self, toml::de::Error> {
        let mut patch = Self::default();

        for (name, value) in document {
            match name.as_str() {
                VIBER_SECTION => patch.viber = Some(value.try_into()?),
                LOGGER_SECTION => patch.logger = Some(value.try_into()?),
                SERVER_SECTION => patch.server = Some(value.try_into()?),
                _ => {
                    let toml::Value::Table(table) = value else {
                        continue;
                    };
                    let values = table
                        .into_iter()
                        .map(|(key, value)| (key, literal_value(value)))
                        .collect::<BTreeMap<_, _>>();
                    patch.sections.insert(name, values);
                }
            }
        }

        Ok(patch)
    }
}

fn literal_value(value: toml::Value) -> String {
    match value {
        toml::Value::String(text) => text,
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserIdList {
    List(Vec<String>),
    Joined(String),
}

impl UserIdList {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::List(ids) => ids.into_iter().filter(|id| !id.trim().is_empty()).collect(),
            Self::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ViberPatch {
    authentication_token: Option<String>,
    name: Option<String>,
    avatar: Option<String>,
    webhook: Option<String>,
    notify_user_id: Option<String>,
    trusted_user_ids: Option<UserIdList>,
    command_executor: Option<bool>,
    redis_url: Option<String>,
    redis_host: Option<String>,
    redis_channel: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggerPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    listen_address: Option<String>,
    listen_port: Option<u16>,
    worker_limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    const MINIMAL: &str = r#"
[Viber]
authentication_token = "token-from-file"
name = "Command Bot"
avatar = "https://example.com/avatar.png"
webhook = "https://bot.example.com/"
notify_user_id = "admin=="
trusted_user_ids = ["admin==", "ops=="]
"#;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("viber-command-bot.conf");
        fs::write(&path, contents).expect("write config");
        path
    }

    fn load(path: PathBuf) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions {
            config_path: Some(path),
            require_file: true,
            ..LoadOptions::default()
        })
    }

    #[test]
    fn loads_viber_block_and_command_sections() {
        let _guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            &format!(
                "{MINIMAL}\nredis_channel = \"viber\"\ncommand_executor = true\n\n\
                 [\"Command uptime\"]\nexecute = \"uptime\"\nhelp = \"Show uptime\"\n\n\
                 [\"Command weather\"]\nexecute = \"weather --json\"\noutput_format = \"json\"\n"
            ),
        );

        let config = load(path).expect("config loads");

        assert_eq!(config.viber.name, "Command Bot");
        assert_eq!(config.viber.authentication_token.expose_secret(), "token-from-file");
        assert!(config.viber.is_trusted("ops=="));
        assert!(!config.viber.is_trusted("ops"));
        assert!(config.viber.command_executor);
        assert_eq!(config.relay.channel.as_deref(), Some("viber"));

        let commands = config.sections_with_prefix("Command ").collect::<Vec<_>>();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].0, "uptime");
        assert_eq!(commands[0].1.get("execute").map(String::as_str), Some("uptime"));
        assert_eq!(commands[1].1.get("output_format").map(String::as_str), Some("json"));
    }

    #[test]
    fn trusted_ids_accept_comma_separated_string() {
        let _guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            &MINIMAL.replace(r#"["admin==", "ops=="]"#, r#""admin==, ops==""#),
        );

        let config = load(path).expect("config loads");
        assert_eq!(config.viber.trusted_user_ids, vec!["admin==", "ops=="]);
    }

    #[test]
    fn missing_required_key_is_reported_by_name() {
        let _guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(&dir, &MINIMAL.replace("notify_user_id = \"admin==\"\n", ""));

        let error = load(path).expect_err("must fail");
        assert!(matches!(error, ConfigError::MissingKey { key: "notify_user_id", .. }));
        assert_eq!(error.to_string(), "Viber \"notify_user_id\" is not configured");
    }

    #[test]
    fn missing_file_and_missing_block_fail_fast() {
        let _guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = TempDir::new().expect("tempdir");

        let missing = load(dir.path().join("absent.conf")).expect_err("must fail");
        assert!(matches!(missing, ConfigError::MissingConfigFile(_)));

        let path = write_config(&dir, "[Logger]\nlevel = \"debug\"\n");
        let no_block = load(path).expect_err("must fail");
        assert!(matches!(no_block, ConfigError::MissingSection("Viber")));
    }

    #[test]
    fn env_and_explicit_overrides_win_over_file() {
        let _guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        env::set_var("VIBER_LOG_FORMAT", "json");
        env::set_var("VIBER_REDIS_URL", "redis://relay.internal:6380");

        let result = (|| {
            let dir = TempDir::new().expect("tempdir");
            let path = write_config(&dir, &format!("{MINIMAL}\n[Logger]\nlevel = \"warn\"\n"));
            AppConfig::load(LoadOptions {
                config_path: Some(path),
                require_file: true,
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    listen_port: Some(9443),
                    ..ConfigOverrides::default()
                },
            })
        })();

        env::remove_var("VIBER_LOG_FORMAT");
        env::remove_var("VIBER_REDIS_URL");

        let config = result.expect("config loads");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.relay.url, "redis://relay.internal:6380");
        assert_eq!(config.server.listen_port, 9443);
    }

    #[test]
    fn redis_host_alias_and_interpolation() {
        let _guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        env::set_var("TEST_VIBER_TOKEN", "token-from-env");

        let result = (|| {
            let dir = TempDir::new().expect("tempdir");
            let contents = MINIMAL
                .replace("token-from-file", "${TEST_VIBER_TOKEN}")
                .replace("[Viber]\n", "[Viber]\nredis_host = \"cache.local:6390\"\n");
            load(write_config(&dir, &contents))
        })();

        env::remove_var("TEST_VIBER_TOKEN");

        let config = result.expect("config loads");
        assert_eq!(config.viber.authentication_token.expose_secret(), "token-from-env");
        assert_eq!(config.relay.url, "redis://cache.local:6390");
        assert_eq!(config.relay.channel, None);
    }

    #[test]
    fn command_tables_keep_shell_expansions_verbatim() {
        let _guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        env::set_var("TEST_VIBER_HOME", "/home/op");
        env::remove_var("TEST_VIBER_MOUNT");

        let result = (|| {
            let dir = TempDir::new().expect("tempdir");
            let contents = format!(
                "{MINIMAL}\n[\"Command disk\"]\nexecute = \"df -h ${{TEST_VIBER_MOUNT:-/}}\"\n\n\
                 [\"Command home\"]\nexecute = \"ls ${{TEST_VIBER_HOME}}\"\n"
            );
            load(write_config(&dir, &contents))
        })();

        env::remove_var("TEST_VIBER_HOME");

        let config = result.expect("shell expansions do not block startup");
        let commands = config.sections_with_prefix("Command ").collect::<BTreeMap<_, _>>();
        assert_eq!(
            commands["disk"].get("execute").map(String::as_str),
            Some("df -h ${TEST_VIBER_MOUNT:-/}")
        );
        assert_eq!(
            commands["home"].get("execute").map(String::as_str),
            Some("ls ${TEST_VIBER_HOME}")
        );
    }

    #[test]
    fn relay_executor_mode_requires_channel() {
        let _guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(&dir, &format!("{MINIMAL}command_executor = true\n"));

        let error = load(path).expect_err("must fail");
        assert!(matches!(
            error,
            ConfigError::Validation(message) if message.contains("redis_channel")
        ));
    }

    #[test]
    fn authentication_token_is_not_leaked_by_debug() {
        let _guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = TempDir::new().expect("tempdir");
        let config = load(write_config(&dir, MINIMAL)).expect("config loads");

        let debug = format!("{config:?}");
        assert!(!debug.contains("token-from-file"));
        assert_eq!(config.logging.format, LogFormat::Compact);
    }
}
