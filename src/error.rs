use thiserror::Error;

/// Result type alias for render tree operations
pub type Result<T> = std::result::Result<T, SceneError>;

/// Recoverable failures of the render tree and its storage strategies
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("no factory registered for node type `{0}`")]
    NoSuchFactory(String),

    #[error("device resources exhausted while loading `{0}`")]
    DeviceResourceExhausted(String),
}
