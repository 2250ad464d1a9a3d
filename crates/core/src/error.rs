//! Shared error type for cross-cutting pipeline failures. Leaf crates define
//! their own typed errors (symbol/event validation, store I/O, websocket
//! framing) and convert into this one at the boundary where the supervisor
//! or CLI needs a single error to propagate with `anyhow`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("symbol error: {0}")]
    Symbol(#[from] crate::symbol::SymbolError),

    #[error("event validation error: {0}")]
    EventValidation(#[from] crate::events::EventValidationError),

    #[error("store error: {0}")]
    Store(String),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("upstream error: {0}")]
    Upstream(String),
}

impl PipelineError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::ChannelClosed(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_are_retryable() {
        assert!(PipelineError::Upstream("timeout".into()).is_retryable());
        assert!(!PipelineError::Configuration("bad toml".into()).is_retryable());
    }

    #[test]
    fn symbol_error_converts_via_from() {
        let symbol_err = crate::symbol::Symbol::parse("bad").unwrap_err();
        let pipeline_err: PipelineError = symbol_err.into();
        assert!(matches!(pipeline_err, PipelineError::Symbol(_)));
    }
}
