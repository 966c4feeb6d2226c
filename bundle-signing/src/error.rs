// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {std::path::PathBuf, thiserror::Error};

/// Coarse classification of a [SigningError].
///
/// Lets callers tell a run that was stopped apart from one that broke.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorCategory {
    /// The identity or configuration is missing or malformed.
    Config,
    /// An input path could not be turned into signing targets.
    Discovery,
    /// The signing tool could not be launched or reported failure.
    ToolInvocation,
    /// The caller cancelled the run.
    Cancelled,
    /// Progress output could not be written.
    Output,
}

/// Unified error type for signing runs.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("signing identity not defined")]
    IdentityMissing,

    #[error("malformed signing identity {0:?}: {1}")]
    IdentityMalformed(String, &'static str),

    #[error("error reading configuration file {0}: {1}")]
    ConfigRead(PathBuf, std::io::Error),

    #[error("error parsing configuration file {0}: {1}")]
    ConfigParse(PathBuf, serde_json::Error),

    #[error("configuration does not define a sign section")]
    ConfigNoSign,

    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("{0} is not a signable file or bundle")]
    NotSignable(PathBuf),

    #[error("I/O error discovering signable content at {0}: {1}")]
    DiscoveryIo(PathBuf, std::io::Error),

    #[error("error walking {0}: {1}")]
    Walk(PathBuf, walkdir::Error),

    #[error("error interfacing with directory-based bundle {0}: {1:#}")]
    DirectoryBundle(PathBuf, anyhow::Error),

    #[error("signing {} failed (exit status {}):\n{output}", .path.display(), display_code(.code))]
    ToolFailed {
        path: PathBuf,
        code: Option<i32>,
        output: String,
    },

    #[error("unable to launch {program} to sign {}: {message}", .path.display())]
    ToolLaunch {
        path: PathBuf,
        program: String,
        message: String,
    },

    #[error("signing cancelled{}", display_next(.next))]
    Cancelled { next: Option<PathBuf> },

    #[error("error writing progress output: {0}")]
    Output(std::io::Error),

    #[error("{} inputs failed to sign:\n{}", .0.len(), display_all(.0))]
    Multiple(Vec<SigningError>),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown".to_string(),
    }
}

fn display_next(next: &Option<PathBuf>) -> String {
    match next {
        Some(path) => format!(" before {}", path.display()),
        None => String::new(),
    }
}

fn display_all(errors: &[SigningError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl SigningError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IdentityMissing
            | Self::IdentityMalformed(..)
            | Self::ConfigRead(..)
            | Self::ConfigParse(..)
            | Self::ConfigNoSign => ErrorCategory::Config,
            Self::PathNotFound(_)
            | Self::NotSignable(_)
            | Self::DiscoveryIo(..)
            | Self::Walk(..)
            | Self::DirectoryBundle(..) => ErrorCategory::Discovery,
            Self::ToolFailed { .. } | Self::ToolLaunch { .. } => ErrorCategory::ToolInvocation,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::Output(_) => ErrorCategory::Output,
            Self::Multiple(errors) => errors
                .first()
                .map(|e| e.category())
                .unwrap_or(ErrorCategory::ToolInvocation),
        }
    }

    /// Whether this error represents a cancelled run.
    pub fn is_cancelled(&self) -> bool {
        self.category() == ErrorCategory::Cancelled
    }
}
