use secrecy::{ExposeSecret, SecretString};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not a supported environment. \
                Use either `local` or `production`."
            )),
        }
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub dq: QueueSettings,
    pub cache: CacheSettings,
    #[serde(default)]
    pub admission: AdmissionSettings,
    #[serde(default)]
    pub sweeper: SweeperSettings,
    pub cors: CorsSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub base_url: String,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: SecretString,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
            .database(&self.database_name)
    }
}

/// Connection and stream/consumer naming for the durable queue substrate.
#[derive(serde::Deserialize, Clone)]
pub struct QueueSettings {
    pub nats_url: SecretString,
    #[serde(default = "default_writes_stream")]
    pub writes_stream: String,
    #[serde(default = "default_dlq_stream")]
    pub dlq_stream: String,
    #[serde(default = "default_cdc_stream")]
    pub cdc_stream: String,
    #[serde(default = "default_max_deliver")]
    pub max_deliver: i64,
    #[serde(default = "default_ack_wait_secs")]
    pub ack_wait_secs: u64,
    #[serde(default = "default_nak_delay_ms")]
    pub nak_delay_ms: u64,
}

const fn default_max_deliver() -> i64 {
    5
}

const fn default_ack_wait_secs() -> u64 {
    30
}

const fn default_nak_delay_ms() -> u64 {
    1_000
}

fn default_writes_stream() -> String {
    "WRITES".to_string()
}

fn default_dlq_stream() -> String {
    "WRITES_DLQ".to_string()
}

fn default_cdc_stream() -> String {
    "DB_CDC".to_string()
}

#[derive(serde::Deserialize, Clone)]
pub struct CacheSettings {
    pub redis_uri: SecretString,
    #[serde(default = "default_t_entry_secs")]
    pub t_entry_secs: u64,
    #[serde(default = "default_tracked_set_multiplier")]
    pub tracked_set_multiplier: u64,
}

const fn default_t_entry_secs() -> u64 {
    300
}

const fn default_tracked_set_multiplier() -> u64 {
    2
}

impl CacheSettings {
    #[must_use]
    pub const fn t_set_secs(&self) -> u64 {
        self.t_entry_secs * self.tracked_set_multiplier
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct AdmissionSettings {
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: u32,
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
    #[serde(default = "default_breaker_reset_ms")]
    pub breaker_reset_ms: u64,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            breaker_threshold: default_breaker_threshold(),
            breaker_reset_ms: default_breaker_reset_ms(),
        }
    }
}

const fn default_max_in_flight() -> u32 {
    256
}

const fn default_breaker_threshold() -> u32 {
    5
}

const fn default_breaker_reset_ms() -> u64 {
    10_000
}

#[derive(serde::Deserialize, Clone)]
pub struct SweeperSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_sweeper_grace_period_secs")]
    pub grace_period_secs: i64,
    #[serde(default = "default_sweeper_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            grace_period_secs: default_sweeper_grace_period_secs(),
            interval_secs: default_sweeper_interval_secs(),
        }
    }
}

const fn default_sweeper_grace_period_secs() -> i64 {
    3600
}

const fn default_sweeper_interval_secs() -> u64 {
    300
}

#[derive(serde::Deserialize, Clone)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
    pub max_age: usize,
}

#[allow(clippy::missing_errors_doc)]
/// # Panics
/// panic gracefully please
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    // detect environment
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT");

    let environment_filename = format!("{}.yaml", environment.as_str());
    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
