//! Error types for serialization passes.

use thiserror::Error;

use crate::event::Span;

/// Convenience alias used throughout the crate.
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// Classification of a [`GraphError`], independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Json,
    Structural,
    AliasNotFound,
    TagResolution,
    InvalidOperation,
    Wrapped,
    DepthExceeded,
    Construction,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The event stream does not have the shape the active strategy expects.
    #[error("Structural error at {span}: {message}")]
    Structural { span: Span, message: String },

    #[error("Alias [{label}] not found at {span}")]
    AliasNotFound { label: String, span: Span },

    #[error("Unable to resolve tag or type [{tag}]")]
    TagResolution { tag: String, span: Option<Span> },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    /// A nested failure annotated with the position of the node being read.
    #[error("Error while deserializing node [{node}] at {span}: {source}")]
    Wrapped {
        span: Span,
        node: String,
        #[source]
        source: Box<GraphError>,
    },

    #[error("Nesting depth exceeded (max: {max_depth})")]
    DepthExceeded { max_depth: usize },

    #[error("Cannot construct [{type_key}]: {message}")]
    Construction { type_key: String, message: String },
}

impl GraphError {
    pub(crate) fn structural(span: Span, message: impl Into<String>) -> Self {
        Self::Structural {
            span,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    pub(crate) fn unknown_tag(tag: impl Into<String>) -> Self {
        Self::TagResolution {
            tag: tag.into(),
            span: None,
        }
    }

    /// Source position carried by this error, if any.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Structural { span, .. }
            | Self::AliasNotFound { span, .. }
            | Self::Wrapped { span, .. } => Some(*span),
            Self::TagResolution { span, .. } => *span,
            Self::Json(_)
            | Self::InvalidOperation { .. }
            | Self::DepthExceeded { .. }
            | Self::Construction { .. } => None,
        }
    }

    /// Whether the error is already annotated with a position and must not be
    /// wrapped again.
    pub fn has_position(&self) -> bool {
        self.span().is_some()
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Json(_) => ErrorKind::Json,
            Self::Structural { .. } => ErrorKind::Structural,
            Self::AliasNotFound { .. } => ErrorKind::AliasNotFound,
            Self::TagResolution { .. } => ErrorKind::TagResolution,
            Self::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            Self::Wrapped { .. } => ErrorKind::Wrapped,
            Self::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            Self::Construction { .. } => ErrorKind::Construction,
        }
    }

    /// Follow `Wrapped` chains down to the original failure.
    pub fn innermost(&self) -> &GraphError {
        let mut current = self;
        while let Self::Wrapped { source, .. } = current {
            current = source;
        }
        current
    }
}
