use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Exec error: {0}")]
    ExecError(String),

    #[error("{description} failed with exit status {status}: {stderr}")]
    CommandFailed { description: String, status: i32, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
