//! Error types for siteship

// This warning is a false positive from thiserror macro expansion
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for siteship operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for siteship
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[help]
        help: String,
    },

    /// The archive could not be produced
    #[error("Pack failed: {message}")]
    Pack {
        message: String,
        #[help]
        help: String,
    },

    /// Copying the archive to a target did not complete
    #[error("Transfer failed: {message}")]
    Transfer {
        message: String,
        #[help]
        help: String,
    },

    /// A shell command on a target exited unsuccessfully
    #[error("Command failed on {target} (exit status {}): {command}", display_status(.status))]
    #[diagnostic(help("{stderr}"))]
    RemoteCommand {
        /// Target the command ran on
        target: String,
        /// Command line as handed to the shell
        command: String,
        /// Exit code, `None` when killed by a signal
        status: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// A release could not be activated
    #[error("Activation failed: {message}")]
    Activation {
        message: String,
        #[help]
        help: String,
    },

    /// Deploy state could not be read or written
    #[error("Deploy state error: {message}")]
    State {
        message: String,
        #[help]
        help: String,
    },
}

fn display_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a pack error
    pub fn pack(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Pack {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a transfer error
    pub fn transfer(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Transfer {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a command failure
    pub fn remote_command(
        target: impl Into<String>,
        command: impl Into<String>,
        status: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::RemoteCommand {
            target: target.into(),
            command: command.into(),
            status,
            stderr: stderr.into(),
        }
    }

    /// Create an activation error
    pub fn activation(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Activation {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a deploy state error
    pub fn state(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
            help: help.into(),
        }
    }
}
