use thiserror::Error;

pub mod context;

pub type Result<T> = std::result::Result<T, Error>;

// Re-export context helpers
pub use context::{ErrorContext, OptionExt};

/// Main error type for the database router
#[derive(Error, Debug)]
pub enum Error {
    /// The `database` argument of an override was neither an alias nor a
    /// connection configuration.
    #[error("Invalid database: {0}")]
    InvalidDatabase(String),

    #[error("Database '{0}' not found")]
    DatabaseNotFound(String),

    /// Raised by host connectors when opening or closing fails
    #[error("Database connection error: {0}")]
    DatabaseConnection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[cfg(feature = "config")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Error with context chain
    #[error("{message}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn invalid_database(msg: impl Into<String>) -> Self {
        Self::InvalidDatabase(msg.into())
    }

    pub fn database_not_found(alias: impl Into<String>) -> Self {
        Self::DatabaseNotFound(alias.into())
    }

    pub fn database_connection(msg: impl Into<String>) -> Self {
        Self::DatabaseConnection(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    // Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// True for the invalid-argument failure raised while building an override
    pub fn is_invalid_database(&self) -> bool {
        match self {
            Error::InvalidDatabase(_) => true,
            Error::WithContext { source, .. } => source.is_invalid_database(),
            _ => false,
        }
    }

    /// Get a stable error code for logs and API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidDatabase(_) => "E_INVALID_DATABASE",
            Error::DatabaseNotFound(_) => "E_DB_NOT_FOUND",
            Error::DatabaseConnection(_) => "E_DB_CONNECTION",
            Error::Config(_) => "E_CONFIG",
            #[cfg(feature = "config")]
            Error::Toml(_) => "E_TOML",
            Error::Io(_) => "E_IO",
            Error::WithContext { source, .. } => source.error_code(),
        }
    }
}
