use clap::ValueEnum;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::{fs::File, sync::Mutex};
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Log filter level for a binary.
#[derive(Default, Debug, Copy, Clone, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            LogLevel::Trace => f.pad("TRACE"),
            LogLevel::Debug => f.pad("DEBUG"),
            LogLevel::Info => f.pad("INFO"),
            LogLevel::Warn => f.pad("WARN"),
            LogLevel::Error => f.pad("ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => anyhow::bail!("unrecognized LOG_LEVEL: {other}"),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// A sharable reference to the observability stack, allowing the active log
/// level to be changed at runtime without restarting the process.
#[derive(Debug, Clone)]
pub struct Observability {
    binary_names: Vec<String>,
    reload_handle: reload::Handle<EnvFilter, Registry>,
    last_directives: Arc<RwLock<String>>,
}

impl Observability {
    /// Initialize the tracing subscriber for a binary. `log_file` is optional
    /// and, when present, receives a non-ANSI copy of every event alongside
    /// the compact stdout stream.
    pub fn init(
        binary_names: Vec<String>,
        log_level_filter: LevelFilter,
        log_file: Option<File>,
    ) -> Result<Self, anyhow::Error> {
        let directives = binary_names
            .iter()
            .map(|x| format!("{}={}", x, log_level_filter.to_string().to_lowercase()))
            .collect::<Vec<String>>()
            .join(",");
        let filter = Self::parse_filter(&directives)?;
        let (filter, reload_handle) = reload::Layer::new(filter);

        let stdout_layer = tracing_subscriber::fmt::layer().event_format(
            tracing_subscriber::fmt::format()
                .compact()
                .with_target(false),
        );

        let registry = tracing_subscriber::registry().with(filter).with(stdout_layer);

        match log_file {
            Some(file) => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .event_format(
                            tracing_subscriber::fmt::format()
                                .compact()
                                .with_target(false),
                        )
                        .with_writer(Mutex::new(file))
                        .with_ansi(false),
                )
                .init(),
            None => registry.init(),
        }

        Ok(Self {
            binary_names,
            reload_handle,
            last_directives: Arc::new(RwLock::new(directives)),
        })
    }

    /// Set the log level uniformly across every tracked binary target.
    pub fn set_log_level(&self, level: LogLevel) -> anyhow::Result<()> {
        let level = LevelFilter::from(level);
        let directives = self
            .binary_names
            .iter()
            .map(|name| format!("{}={}", name, level.to_string().to_lowercase()))
            .collect::<Vec<_>>()
            .join(",");
        let new_filter = Self::parse_filter(&directives)?;
        self.reload_handle.reload(new_filter)?;
        *self
            .last_directives
            .write()
            .expect("Observability lock is poisoned") = directives;

        Ok(())
    }

    /// Sets an advanced logging directive string, e.g. `"indexer_worker=debug,rdkafka=warn"`.
    pub fn set_logging(&self, directives: String) -> Result<(), anyhow::Error> {
        let new_filter = Self::parse_filter(&directives)?;
        self.reload_handle.reload(new_filter)?;
        *self
            .last_directives
            .write()
            .expect("Observability lock is poisoned") = directives;

        Ok(())
    }

    fn parse_filter(directives: &str) -> Result<EnvFilter, anyhow::Error> {
        let mut filter = EnvFilter::from_default_env();
        for directive in directives.split(',') {
            filter = filter.add_directive(directive.parse()?);
        }

        Ok(filter)
    }

    /// Re-enables logging with the latest directives after a call to [`Self::disable_logging`].
    pub fn enable_logging(&self) -> Result<(), anyhow::Error> {
        let last_directives = &*self
            .last_directives
            .read()
            .expect("Observability lock is poisoned");
        let new_filter = Self::parse_filter(last_directives)?;
        self.reload_handle.reload(new_filter)?;

        Ok(())
    }

    /// Disables all logging.
    pub fn disable_logging(&self) -> Result<(), anyhow::Error> {
        let new_filter = EnvFilter::new("off");
        self.reload_handle.reload(new_filter)?;

        Ok(())
    }
}
