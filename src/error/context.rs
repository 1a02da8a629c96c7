//! Error context and chaining utilities
//!
//! Lets registry and configuration code attach the alias or file it was
//! working on before an error travels back to the caller.

use super::Error;

/// Trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to the error
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Into<String>;

    /// Add context with lazy evaluation
    fn with_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ErrorContext<T> for Result<T, Error> {
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Into<String>,
    {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

/// Extension trait turning registry lookups into errors
pub trait OptionExt<T> {
    /// Convert `None` into `Error::DatabaseNotFound` for `alias`
    fn or_not_found(self, alias: &str) -> Result<T, Error>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, alias: &str) -> Result<T, Error> {
        self.ok_or_else(|| Error::database_not_found(alias))
    }
}
