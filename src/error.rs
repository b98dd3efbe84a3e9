use std::fmt;
use std::io;

/// Application-wide error taxonomy. Every route handler returns
/// `AppResult<Response>`; whatever bubbles past the handlers is turned into
/// an error response by the top-level dispatcher.
#[derive(Debug)]
pub enum AppError {
    /// One or more field checks failed; carries human-readable messages.
    Validation(Vec<String>),
    /// Unmatched route or missing record/file.
    NotFound,
    /// Missing, unknown or expired bearer token.
    Auth(String),
    /// A request body that could not be decoded.
    BodyDecode(String),
    /// Payment or email provider failed or returned an unexpected shape.
    Upstream(String),
    /// Underlying file store failure.
    Store(String),
    IoError(io::Error),
    InternalError(String),
    PanicError(String),
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BodyDecode(_) => 400,
            AppError::Auth(_) => 401,
            AppError::NotFound => 404,
            AppError::Validation(_) => 422,
            AppError::Upstream(_)
            | AppError::Store(_)
            | AppError::IoError(_)
            | AppError::InternalError(_)
            | AppError::PanicError(_) => 500,
        }
    }

    /// Messages for the `errors: [...]` payload every API failure uses.
    pub fn messages(&self) -> Vec<String> {
        match self {
            AppError::Validation(list) => list.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(list) => write!(f, "{}", list.join(", ")),
            AppError::NotFound => write!(f, "Not found"),
            AppError::Auth(msg) => write!(f, "{}", msg),
            AppError::BodyDecode(msg) => write!(f, "Could not decode request body: {}", msg),
            AppError::Upstream(msg) => write!(f, "{}", msg),
            AppError::Store(msg) => write!(f, "{}", msg),
            AppError::IoError(err) => write!(f, "IO error: {}", err),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::PanicError(msg) => write!(f, "Panic: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::IoError(err)
    }
}

pub type AppResult<T> = Result<T, AppError>;
