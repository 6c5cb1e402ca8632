use std::{io, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ParseErrorKind {
    #[error("`Container` struct not found in declaration")]
    ContainerNotFound,
    #[error("unexpected type of `{field}`: {reason}")]
    UnexpectedType { field: String, reason: String },
    #[error("`{field}`: {what} is not supported")]
    NotSupported { field: String, what: &'static str },
    #[error("invalid definition of `{name}`: {reason}")]
    InvalidDefinition { name: String, reason: String },
    #[error("{0}")]
    Parsing(String),
    #[error("read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ParseErrorKind {
    #[inline]
    #[must_use]
    pub(crate) fn unexpected_type(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnexpectedType {
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn not_supported(field: impl Into<String>, what: &'static str) -> Self {
        Self::NotSupported { field: field.into(), what }
    }

    #[inline]
    #[must_use]
    pub(crate) fn invalid_definition(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<syn::Error> for ParseErrorKind {
    fn from(err: syn::Error) -> Self {
        Self::Parsing(err.to_string())
    }
}
