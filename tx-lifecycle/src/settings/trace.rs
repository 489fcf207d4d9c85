use eyre::Result;
use serde::Deserialize;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt,
    prelude::*,
};

/// Logging level. A "higher level" means more will be logged.
#[derive(Default, Debug, Clone, Copy, Deserialize, PartialOrd, Ord, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Level {
    /// Off
    Off = 0,
    /// Error
    Error = 1,
    /// Warn
    Warn = 2,
    /// Debug
    Debug = 4,
    /// Trace
    Trace = 5,
    /// Info
    #[serde(other)]
    #[default]
    Info = 3,
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> LevelFilter {
        match level {
            Level::Off => LevelFilter::OFF,
            Level::Error => LevelFilter::ERROR,
            Level::Warn => LevelFilter::WARN,
            Level::Debug => LevelFilter::DEBUG,
            Level::Trace => LevelFilter::TRACE,
            Level::Info => LevelFilter::INFO,
        }
    }
}

/// Output format of the log lines
#[derive(Default, Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Style {
    /// Multi-line, human readable
    Pretty,
    /// Single line with all fields
    #[default]
    Full,
    /// Abbreviated single line
    Compact,
    /// One JSON object per line
    Json,
}

/// Configuration for the tracing subscriber
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TracingConfig {
    #[serde(default)]
    pub fmt: Style,
    #[serde(default)]
    pub level: Level,
}

impl TracingConfig {
    fn targets(&self) -> Targets {
        let mut target_layer = Targets::new().with_default(self.level);
        if self.level < Level::Trace {
            // only show these debug and trace logs at trace level
            target_layer = target_layer.with_target("hyper", Level::Info);
            target_layer = target_layer.with_target("reqwest", Level::Info);
            target_layer = target_layer.with_target("rocksdb", Level::Info);
        }
        target_layer
    }

    /// Attempt to instantiate and register a tracing subscriber setup from
    /// settings.
    pub fn start_tracing(&self) -> Result<()> {
        let registry = tracing_subscriber::Registry::default()
            .with(self.targets())
            .with(tracing_error::ErrorLayer::default());

        match self.fmt {
            Style::Pretty => registry.with(fmt::layer().pretty()).try_init()?,
            Style::Full => registry.with(fmt::layer()).try_init()?,
            Style::Compact => registry.with(fmt::layer().compact()).try_init()?,
            Style::Json => registry.with(fmt::layer().json()).try_init()?,
        }
        Ok(())
    }
}
