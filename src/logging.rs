//! Process-wide `tracing` subscriber.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::LogConfig;

/// Output format selected by a [`LogConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pretty,
    Compact,
    Json,
}

impl Format {
    pub fn of(cfg: &LogConfig) -> Self {
        if cfg.pretty {
            Format::Pretty
        } else if cfg.json {
            Format::Json
        } else {
            Format::Compact
        }
    }
}

/// `RUST_LOG` when set and valid, the configured level otherwise.
pub fn filter(cfg: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.level.trim().to_ascii_lowercase()))
}

/// Installs the global subscriber. A second call leaves the first one in place.
pub fn init(cfg: &LogConfig) {
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match Format::of(cfg) {
        Format::Pretty => fmt::layer().pretty().with_ansi(cfg.color).boxed(),
        Format::Json => fmt::layer().json().with_current_span(false).boxed(),
        Format::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_ansi(cfg.color)
            .boxed(),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(layer)
        .with(filter(cfg))
        .try_init()
    {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_wins_over_json() {
        let mut cfg = LogConfig::default();
        assert_eq!(Format::of(&cfg), Format::Compact);
        cfg.json = true;
        assert_eq!(Format::of(&cfg), Format::Json);
        cfg.pretty = true;
        assert_eq!(Format::of(&cfg), Format::Pretty);
    }

    #[test]
    fn init_twice_is_harmless() {
        let cfg = LogConfig::default();
        init(&cfg);
        init(&cfg);
    }
}
