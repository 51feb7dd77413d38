use thiserror::Error;

pub type Result<T> = std::result::Result<T, LinkError>;


#[derive(Error, Debug)]
pub enum LinkError {
    /// A local frame position was requested before an origin was announced.
    #[error("no origin established for the local frame")]
    NoOrigin,

    #[error("invalid configuration {0}")]
    Config(String),

    #[error("parse error {0}")]
    Parse(String),

    #[error("transport error {0}")]
    Transport(String),

    #[error("ingress queue full, message dropped")]
    QueueFull,

    #[error("link is closed")]
    LinkClosed,

    #[error("IO error {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error {0}")]
    Json(#[from] serde_json::Error),
}


macro_rules! parse_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        $crate::errors::LinkError::Parse(format!($fmt $(, $arg)*))
    };
}
pub(crate) use parse_error;
