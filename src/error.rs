use std::path::PathBuf;
use thiserror::Error;

/// Main error type for javalens operations
#[derive(Error, Debug)]
pub enum JavalensError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Source root {0} does not exist or is not a directory")]
    InvalidRoot(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Visualization failed: {0}")]
    Visualization(String),
}

pub type Result<T> = std::result::Result<T, JavalensError>;
