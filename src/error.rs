//! Error taxonomy for model compilation and query resolution
//!
//! Configuration errors are raised eagerly while the schema is built. The
//! remaining kinds surface at query time and fail only the field that hit them.

use async_graphql::ErrorExtensions;

use crate::store::StoreError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad class of an [`Error`], exposed to clients as the `code` extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Resolution,
    Cursor,
    Argument,
    Store,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Resolution => "RESOLUTION",
            ErrorKind::Cursor => "CURSOR",
            ErrorKind::Argument => "ARGUMENT",
            ErrorKind::Store => "STORE",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("\"id\" is a reserved property, model {model} cannot declare it")]
    ReservedProperty { model: String },

    #[error("model {model}: required property \"{property}\" is not a declared property or group")]
    UnresolvedRequired { model: String, property: String },

    #[error("model {model}: property group cycle through \"{property}\"")]
    CyclicGroup { model: String, property: String },

    #[error("unable to sanitize type name: {0}")]
    InvalidTypeName(String),

    #[error("invalid model definition: {0}")]
    InvalidModel(String),

    #[error("model {model} has no {variant} type")]
    UnsupportedVariant { model: String, variant: String },

    #[error("schema assembly failed: {0}")]
    Schema(String),

    #[error("model not found: {0}")]
    UnknownModel(String),

    #[error("model {model}: resource is missing primary key \"{key}\"")]
    MissingPrimaryKey { model: String, key: String },

    #[error("invalid cursor: {0}")]
    Cursor(String),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ReservedProperty { .. }
            | Error::UnresolvedRequired { .. }
            | Error::CyclicGroup { .. }
            | Error::InvalidTypeName(_)
            | Error::InvalidModel(_)
            | Error::UnsupportedVariant { .. }
            | Error::Schema(_) => ErrorKind::Configuration,
            Error::UnknownModel(_) | Error::MissingPrimaryKey { .. } => ErrorKind::Resolution,
            Error::Cursor(_) => ErrorKind::Cursor,
            Error::Argument(_) => ErrorKind::Argument,
            Error::Store(_) => ErrorKind::Store,
        }
    }
}

impl ErrorExtensions for Error {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string())
            .extend_with(|_, e| e.set("code", self.kind().as_str()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidModel(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::ReservedProperty { model: "a.B".into() }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(Error::UnknownModel("x".into()).kind(), ErrorKind::Resolution);
        assert_eq!(Error::Cursor("bad".into()).kind(), ErrorKind::Cursor);
        assert_eq!(
            Error::Store(StoreError::NotFound("l1".into())).kind(),
            ErrorKind::Store
        );
    }

    #[test]
    fn test_store_error_is_transparent() {
        let err = Error::from(StoreError::NotFound("abc".into()));
        assert_eq!(err.to_string(), StoreError::NotFound("abc".into()).to_string());
    }

    #[test]
    fn test_graphql_extension_code() {
        let err = Error::Cursor("nope".into()).extend();
        let code = err
            .extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .cloned();
        assert_eq!(code, Some(async_graphql::Value::from("CURSOR")));
    }
}
