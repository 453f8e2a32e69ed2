use std::env;

use crate::observability::LogLevel;

pub const VERSION_MESSAGE: &str = concat!(env!("CARGO_PKG_VERSION"));

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid value for {key}: {v}")),
        Err(_) => Ok(default),
    }
}

fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(v) => v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Kafka broker connection and topic settings.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub broker_url: String,
    pub schema_registry_url: String,
    pub group_id: String,
    pub consumer_topics: Vec<String>,
    pub producer_topics: Vec<String>,
    pub schema_name_topics: Vec<String>,
}

/// Relational store connection settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub sslmode: String,
    pub timezone: String,
}

impl DbConfig {
    /// Builds a `postgres://` connection URL suitable for `sqlx::PgPool`.
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.name, self.sslmode
        )
    }
}

/// External KV/pub-sub store connection settings.
#[derive(Debug, Clone)]
pub struct KvConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub channel: String,
}

impl KvConfig {
    pub fn connection_url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}", password, self.host, self.port),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

/// Top-level configuration for both the worker and API binaries, loaded once
/// from the environment at process start. There is deliberately no CLI flag
/// surface beyond `--version`: the deployment model is env-var driven, same
/// as the service this crate replaces.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub network_name: String,

    pub port: u16,
    pub health_port: u16,
    pub metrics_port: u16,

    pub rest_prefix: String,
    pub websocket_prefix: String,
    pub health_prefix: String,
    pub metrics_prefix: String,

    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_file_name: String,

    pub broker: BrokerConfig,
    pub db: DbConfig,
    pub kv: KvConfig,

    pub cors_allow_origin: String,
    pub cors_expose_headers: Vec<String>,

    pub max_page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "icon-blocks".to_string(),
            network_name: "icon_mainnet".to_string(),

            port: 8000,
            health_port: 8001,
            metrics_port: 8002,

            rest_prefix: "/api/v1".to_string(),
            websocket_prefix: "/ws/v1".to_string(),
            health_prefix: "/health".to_string(),
            metrics_prefix: "/metrics".to_string(),

            log_level: LogLevel::Info,
            log_to_file: false,
            log_file_name: "icon-blocks.log".to_string(),

            broker: BrokerConfig {
                broker_url: "localhost:9092".to_string(),
                schema_registry_url: "http://localhost:8081".to_string(),
                group_id: "icon-blocks".to_string(),
                consumer_topics: vec![
                    "blocks".to_string(),
                    "transactions".to_string(),
                    "logs".to_string(),
                ],
                producer_topics: vec!["blocks-ws".to_string()],
                schema_name_topics: vec![],
            },

            db: DbConfig {
                driver: "postgres".to_string(),
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: String::new(),
                name: "icon_blocks".to_string(),
                sslmode: "disable".to_string(),
                timezone: "UTC".to_string(),
            },

            kv: KvConfig {
                host: "localhost".to_string(),
                port: 6379,
                password: None,
                channel: "icon_blocks_block".to_string(),
            },

            cors_allow_origin: "*".to_string(),
            cors_expose_headers: vec!["X-TOTAL-COUNT".to_string()],

            max_page_size: 1000,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let default = Self::default();

        Ok(Self {
            name: env_or("NAME", &default.name),
            network_name: env_or("NETWORK_NAME", &default.network_name),

            port: env_parse("PORT", default.port)?,
            health_port: env_parse("HEALTH_PORT", default.health_port)?,
            metrics_port: env_parse("METRICS_PORT", default.metrics_port)?,

            rest_prefix: env_or("REST_PREFIX", &default.rest_prefix),
            websocket_prefix: env_or("WEBSOCKET_PREFIX", &default.websocket_prefix),
            health_prefix: env_or("HEALTH_PREFIX", &default.health_prefix),
            metrics_prefix: env_or("METRICS_PREFIX", &default.metrics_prefix),

            log_level: env::var("LOG_LEVEL")
                .ok()
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(default.log_level),
            log_to_file: env_parse("LOG_TO_FILE", default.log_to_file)?,
            log_file_name: env_or("LOG_FILE_NAME", &default.log_file_name),

            broker: BrokerConfig {
                broker_url: env_or("KAFKA_BROKER_URL", &default.broker.broker_url),
                schema_registry_url: env_or(
                    "SCHEMA_REGISTRY_URL",
                    &default.broker.schema_registry_url,
                ),
                group_id: env_or("KAFKA_GROUP_ID", &default.broker.group_id),
                consumer_topics: env_list(
                    "CONSUMER_TOPICS",
                    &["blocks", "transactions", "logs"],
                ),
                producer_topics: env_list("PRODUCER_TOPICS", &["blocks-ws"]),
                schema_name_topics: env_list("SCHEMA_NAME_TOPICS", &[]),
            },

            db: DbConfig {
                driver: env_or("DB_DRIVER", &default.db.driver),
                host: env_or("DB_HOST", &default.db.host),
                port: env_parse("DB_PORT", default.db.port)?,
                user: env_or("DB_USER", &default.db.user),
                password: env_or("DB_PASSWORD", &default.db.password),
                name: env_or("DB_NAME", &default.db.name),
                sslmode: env_or("DB_SSLMODE", &default.db.sslmode),
                timezone: env_or("DB_TIMEZONE", &default.db.timezone),
            },

            kv: KvConfig {
                host: env_or("REDIS_HOST", &default.kv.host),
                port: env_parse("REDIS_PORT", default.kv.port)?,
                password: env::var("REDIS_PASSWORD").ok().filter(|s| !s.is_empty()),
                channel: env_or("REDIS_CHANNEL", &default.kv.channel),
            },

            cors_allow_origin: env_or("CORS_ALLOW_ORIGIN", &default.cors_allow_origin),
            cors_expose_headers: env_list("CORS_EXPOSE_HEADERS", &["X-TOTAL-COUNT"]),

            max_page_size: env_parse("MAX_PAGE_SIZE", default.max_page_size)?,
        })
    }

    /// Logs a startup banner summarizing the effective configuration.
    pub fn print(&self) {
        tracing::info!(
            name = %self.name,
            network = %self.network_name,
            port = self.port,
            health_port = self.health_port,
            metrics_port = self.metrics_port,
            broker_url = %self.broker.broker_url,
            consumer_topics = ?self.broker.consumer_topics,
            db_host = %self.db.host,
            db_name = %self.db.name,
            redis_host = %self.kv.host,
            max_page_size = self.max_page_size,
            "starting icon-blocks indexer"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_three_consumer_topics() {
        let config = Config::default();
        assert_eq!(
            config.broker.consumer_topics,
            vec!["blocks", "transactions", "logs"]
        );
    }

    #[test]
    fn db_connection_url_includes_sslmode() {
        let config = Config::default();
        let url = config.db.connection_url();
        assert!(url.starts_with("postgres://"));
        assert!(url.contains("sslmode=disable"));
    }

    #[test]
    fn kv_connection_url_omits_credentials_when_no_password() {
        let config = Config::default();
        assert_eq!(config.kv.connection_url(), "redis://localhost:6379");
    }
}
