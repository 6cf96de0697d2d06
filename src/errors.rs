use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub type Result<T> = std::result::Result<T, CodeContextError>;

#[derive(Debug, thiserror::Error)]
pub enum CodeContextError {
    #[error("not a git repository: {}", .0.display())]
    RepositoryUnavailable(PathBuf),

    #[error("git backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("failed to parse {path}: {reason}")]
    ParseFailure { path: String, reason: String },

    #[error("cache I/O error: {0}")]
    CacheIo(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("analysis cancelled")]
    Cancelled,
}

impl CodeContextError {
    pub fn parse_failure(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ParseFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RepositoryUnavailable(_) | Self::BackendUnavailable(_) => 2,
            Self::ParseFailure { .. } => 3,
            Self::CacheIo(_) => 4,
            Self::Config(_) | Self::Timeout(_) | Self::Cancelled => 1,
        }
    }
}

/// Cooperative cancellation shared between the pipeline and long-running
/// loops in the miner and clusterer.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CodeContextError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_class() {
        assert_eq!(
            CodeContextError::RepositoryUnavailable(PathBuf::from("/tmp")).exit_code(),
            2
        );
        assert_eq!(
            CodeContextError::parse_failure("a.rs", "bad").exit_code(),
            3
        );
        assert_eq!(CodeContextError::CacheIo("disk".into()).exit_code(), 4);
        assert_eq!(CodeContextError::Cancelled.exit_code(), 1);
    }

    #[test]
    fn cancel_flag_trips_once_set() {
        let flag = CancelFlag::new();
        assert!(flag.check().is_ok());
        flag.cancel();
        assert!(matches!(flag.check(), Err(CodeContextError::Cancelled)));
    }
}
