pub type StageResult<T> = Result<T, StageError>;

#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("unsupported component kind: {0}")]
    UnsupportedComponentKind(String),

    #[error("no active render adapter")]
    NoActiveRenderAdapter,

    #[error("surface error: {0}")]
    Surface(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("texture error: {0}")]
    Texture(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    pub fn unsupported_kind(kind: impl Into<String>) -> Self {
        Self::UnsupportedComponentKind(kind.into())
    }

    pub fn surface(msg: impl Into<String>) -> Self {
        Self::Surface(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn texture(msg: impl Into<String>) -> Self {
        Self::Texture(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
