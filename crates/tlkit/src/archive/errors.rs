use std::{io, path::PathBuf};

use crate::{
    errors::{FormatError, PackError},
    utils::latin1::NotLatin1,
};

/// A name that cannot be stored in an archive directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidName {
    #[error("Archive entry names must not be empty")]
    Empty,
    #[error("Archive entry name {0:?} contains a NUL character")]
    ContainsNul(String),
    #[error("Archive entry name {name:?} is not Latin-1: {source}")]
    NotLatin1 {
        name: String,
        #[source]
        source: NotLatin1,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error(transparent)]
    InvalidName(#[from] InvalidName),
    #[error("Archive entry name {0:?} does not name a path inside the target directory")]
    UnsafeName(String),
    #[error("Archive entry {file:?} would have to be a directory to hold {nested:?}")]
    PathConflict { file: String, nested: String },
    #[error("Path {0} cannot be used as an archive entry name")]
    UnrepresentablePath(PathBuf),
}

pub(super) fn io_error(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
    move |source| Error::Io {
        path: path.into(),
        source,
    }
}
