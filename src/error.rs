use std::fmt;

/// Errors returned by the device model and the output encoders.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// A required argument or context was missing or invalid.
    Argument(String),
    /// An output option could not be applied. No session is created.
    Configuration(String),
    /// The driver refused a setting.
    NotApplicable(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn arg(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Configuration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::NotApplicable(msg) => write!(f, "not applicable: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
