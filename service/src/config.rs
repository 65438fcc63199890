use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Opaque identity of this broker process. Stamped on every outbound bus
    /// envelope so a node can ignore its own echoes; generated at boot when
    /// not provided.
    #[arg(long, env)]
    node_id: Option<String>,

    /// Symmetric secret used to verify publisher and client bearer tokens.
    #[arg(long, env)]
    auth_secret: Option<String>,

    /// Path to a file holding the auth secret, read when `auth_secret` is
    /// not set inline.
    #[arg(long, env)]
    auth_secret_path: Option<String>,

    /// Sets the database URL to connect to (any SeaORM-supported scheme)
    #[arg(short, long, env, default_value = "sqlite://./mercurio.db?mode=rwc")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool
    #[arg(long, env, default_value_t = 100)]
    pub db_max_connections: u32,

    /// Minimum number of idle database connections to maintain
    #[arg(long, env, default_value_t = 5)]
    pub db_min_connections: u32,

    /// Timeout in seconds for establishing a new database connection
    #[arg(long, env, default_value_t = 8)]
    pub db_connect_timeout_secs: u64,

    /// Timeout in seconds for acquiring a connection from the pool
    #[arg(long, env, default_value_t = 8)]
    pub db_acquire_timeout_secs: u64,

    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(long, env, value_delimiter = ',', use_value_delimiter = true, default_value = "*")]
    pub allowed_origins: Vec<String>,

    /// A list of HTTP request headers CORS allows through.
    #[arg(long, env, value_delimiter = ',', use_value_delimiter = true, default_value = "*")]
    pub allowed_headers: Vec<String>,

    /// A list of HTTP methods CORS allows through.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "GET,POST,PUT,DELETE,HEAD,OPTIONS"
    )]
    pub allowed_methods: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 8000)]
    pub port: u16,

    /// Enables the cross-node message bus
    #[arg(long, env, default_value_t = false)]
    pub mq: bool,

    /// AMQP URL of the message bus, required when `mq` is enabled
    #[arg(long, env)]
    mq_url: Option<String>,

    /// Name of the bus topic exchange shared by all broker nodes
    #[arg(long, env)]
    mq_topic: Option<String>,

    /// Routing key this node's queue is bound with
    #[arg(long, env)]
    mq_routing_key: Option<String>,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn node_id(&self) -> Option<String> {
        self.node_id.clone()
    }

    /// The auth secret, inline or read from the configured file path.
    pub fn auth_secret(&self) -> std::io::Result<String> {
        if let Some(secret) = &self.auth_secret {
            if !secret.is_empty() {
                return Ok(secret.clone());
            }
        }

        if let Some(path) = &self.auth_secret_path {
            return std::fs::read_to_string(path).map(|secret| secret.trim_end().to_owned());
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "environment variable AUTH_SECRET or AUTH_SECRET_PATH must be provided",
        ))
    }

    pub fn set_database_url(mut self, database_url: String) -> Self {
        self.database_url = Some(database_url);
        self
    }

    pub fn database_url(&self) -> &str {
        self.database_url
            .as_ref()
            .expect("No Database URL provided")
    }

    /// The bus addressing values, validated as a unit: enabling `mq` without
    /// all three of URL, topic, and routing key is a configuration error.
    /// Returns `Ok(None)` when the bus is disabled.
    pub fn mq_values(&self) -> std::io::Result<Option<(String, String, String)>> {
        if !self.mq {
            return Ok(None);
        }

        match (&self.mq_url, &self.mq_topic, &self.mq_routing_key) {
            (Some(url), Some(topic), Some(routing_key)) => {
                Ok(Some((url.clone(), topic.clone(), routing_key.clone())))
            }
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "environment variables MQ_URL, MQ_TOPIC and MQ_ROUTING_KEY must be provided when MQ is enabled",
            )),
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config(args: &[&str]) -> Config {
        let mut full_args = vec!["mercurio"];
        full_args.extend_from_slice(args);
        Config::parse_from(full_args)
    }

    #[test]
    fn defaults_bind_to_localhost_8000_without_a_bus() {
        let config = minimal_config(&[]);

        assert_eq!(config.interface.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.port, 8000);
        assert!(!config.mq);
    }

    #[test]
    fn auth_secret_prefers_the_inline_value() {
        let config = minimal_config(&["--auth-secret", "sekrit"]);

        assert_eq!(config.auth_secret().unwrap(), "sekrit");
    }

    #[test]
    fn auth_secret_is_required_one_way_or_another() {
        let config = minimal_config(&[]);

        assert!(config.auth_secret().is_err());
    }

    #[test]
    fn enabling_the_bus_requires_its_addressing() {
        let config = minimal_config(&["--mq"]);

        assert!(config.mq_values().is_err());
    }

    #[test]
    fn bus_addressing_is_returned_once_complete() {
        let config = minimal_config(&[
            "--mq",
            "--mq-url",
            "amqp://localhost:5672",
            "--mq-topic",
            "notifications",
            "--mq-routing-key",
            "broker",
        ]);

        let (url, topic, routing_key) = config.mq_values().unwrap().unwrap();
        assert_eq!(url, "amqp://localhost:5672");
        assert_eq!(topic, "notifications");
        assert_eq!(routing_key, "broker");
    }

    #[test]
    fn a_disabled_bus_needs_no_addressing() {
        let config = minimal_config(&[]);

        assert!(config.mq_values().unwrap().is_none());
    }

    #[test]
    fn cors_lists_split_on_commas() {
        let config = minimal_config(&["--allowed-origins", "http://a.test,http://b.test"]);

        assert_eq!(
            config.allowed_origins,
            vec!["http://a.test".to_owned(), "http://b.test".to_owned()]
        );
    }
}
