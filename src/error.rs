//! Error types used by the supervisor, the actors and the configuration layer.
//!
//! This module defines four enums:
//!
//! - [`ConfigError`]: invalid or unreadable configuration, detected before any actor starts.
//! - [`ActorError`]: failures raised by an individual actor's `start` or `stop`.
//! - [`RuntimeError`]: the terminal outcome of a supervised actor group.
//! - [`Error`]: the top-level error returned by [`run_service`](crate::run_service).
//!
//! Each type provides `as_label` (a stable snake_case label for logs) in the same way.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced while building the configuration of a service.
///
/// All of these are fatal and surface before any actor is started.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The driver selection names no member of the capability's closed set.
    #[error("unknown {capability} driver {driver:?} (expected one of {expected:?})")]
    UnknownDriver {
        /// Capability the driver was requested for (`users`, `groups`, ...).
        capability: &'static str,
        /// The rejected driver name.
        driver: String,
        /// Accepted driver names for this capability.
        expected: &'static [&'static str],
    },

    /// A `--service` entry names a gRPC service this command cannot host.
    #[error("service {service:?} cannot be hosted by {command} (expected one of {expected:?})")]
    UnknownService {
        /// Subcommand name.
        command: &'static str,
        /// The rejected service name.
        service: String,
        /// Services the subcommand knows how to configure.
        expected: &'static [&'static str],
    },

    /// An explicitly requested configuration file does not exist.
    #[error("config file {path:?} not found")]
    NotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The configuration file exists but could not be read.
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML or does not match the model.
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        /// Path of the file.
        path: PathBuf,
        /// Underlying deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// A setting has a value outside its domain.
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Dotted key of the setting.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::UnknownDriver { .. } => "config_unknown_driver",
            ConfigError::UnknownService { .. } => "config_unknown_service",
            ConfigError::NotFound { .. } => "config_not_found",
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse { .. } => "config_parse",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}

/// # Errors produced by a single actor.
///
/// A start error is the supervisor's trigger event and becomes the group's result;
/// a stop error is logged and absorbed.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ActorError {
    /// The actor could not bind its listening address.
    #[error("bind failed on {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The HTTP server failed while serving.
    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    /// Registering for OS signals failed.
    #[error("signal registration failed: {0}")]
    Signal(#[source] io::Error),

    /// The backend runtime could not be written to disk.
    #[error("failed to write runtime config {path:?}: {source}")]
    WriteConfig {
        /// Target path of the runtime configuration.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The runtime configuration tree could not be encoded.
    #[error("failed to encode runtime config: {0}")]
    Encode(#[from] toml::ser::Error),

    /// The backend runtime process could not be spawned.
    #[error("failed to spawn {binary:?}: {source}")]
    Spawn {
        /// Binary that was executed.
        binary: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The backend runtime exited without being asked to.
    #[error("backend runtime exited unexpectedly with {status}")]
    RuntimeExited {
        /// Exit status of the process.
        status: ExitStatus,
    },

    /// Graceful stop did not complete within its deadline.
    #[error("graceful stop did not complete within {deadline:?}")]
    StopTimeout {
        /// The deadline that was exceeded.
        deadline: Duration,
    },

    /// Any other failure.
    #[error("{0}")]
    Fail(String),
}

impl ActorError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use storagevisor::ActorError;
    ///
    /// let err = ActorError::StopTimeout { deadline: Duration::from_secs(5) };
    /// assert_eq!(err.as_label(), "actor_stop_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ActorError::Bind { .. } => "actor_bind",
            ActorError::Serve(_) => "actor_serve",
            ActorError::Signal(_) => "actor_signal",
            ActorError::WriteConfig { .. } => "actor_write_config",
            ActorError::Encode(_) => "actor_encode",
            ActorError::Spawn { .. } => "actor_spawn",
            ActorError::RuntimeExited { .. } => "actor_runtime_exited",
            ActorError::StopTimeout { .. } => "actor_stop_timeout",
            ActorError::Fail(_) => "actor_failed",
        }
    }

    /// True for the error returned by a `stop` that overran its deadline.
    pub fn is_stop_timeout(&self) -> bool {
        matches!(self, ActorError::StopTimeout { .. })
    }
}

/// # Terminal outcome of a supervised actor group.
///
/// Only conditions that prevent the group from running at all end up here;
/// slow stops are logged instead.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The actor that triggered shutdown returned an error.
    #[error("actor {actor} failed: {source}")]
    ActorFailed {
        /// Name of the failing actor.
        actor: String,
        /// The error it returned.
        #[source]
        source: ActorError,
    },

    /// The actor that triggered shutdown panicked.
    #[error("actor {actor} panicked: {reason}")]
    ActorPanicked {
        /// Name of the panicking actor.
        actor: String,
        /// Panic payload, when it was a string.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::ActorFailed { .. } => "runtime_actor_failed",
            RuntimeError::ActorPanicked { .. } => "runtime_actor_panicked",
        }
    }

    /// Name of the actor that caused the failure.
    pub fn actor(&self) -> &str {
        match self {
            RuntimeError::ActorFailed { actor, .. } | RuntimeError::ActorPanicked { actor, .. } => {
                actor
            }
        }
    }
}

/// Top-level error of a service command.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration was rejected before any actor started.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The actor group terminated abnormally.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let err = ConfigError::UnknownDriver {
            capability: "groups",
            driver: "nis".into(),
            expected: &["json", "ldap", "rest"],
        };
        assert_eq!(err.as_label(), "config_unknown_driver");
        assert!(err.to_string().contains("\"nis\""));

        let err = RuntimeError::ActorFailed {
            actor: "debug".into(),
            source: ActorError::Fail("bind failed".into()),
        };
        assert_eq!(err.as_label(), "runtime_actor_failed");
        assert_eq!(err.actor(), "debug");
        assert_eq!(err.to_string(), "actor debug failed: bind failed");
    }

    #[test]
    fn stop_timeout_is_recognised() {
        let err = ActorError::StopTimeout {
            deadline: Duration::from_millis(10),
        };
        assert!(err.is_stop_timeout());
        assert!(!ActorError::Fail("x".into()).is_stop_timeout());
    }
}
