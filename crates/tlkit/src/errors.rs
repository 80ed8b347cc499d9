use std::{io, path::PathBuf};

use crate::value::TreeError;

/// The input bytes do not describe a valid file of the expected format.
///
/// This covers truncated input as well as unrecognized header values. It
/// never represents an I/O failure; files are read in full before decoding.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error(
        "Not enough data at offset {position} reading {context}. Needed {required}, but only {available} available."
    )]
    NotEnoughData {
        context: String,
        position: usize,
        required: usize,
        available: usize,
    },
    #[error("Unknown file ID: {found} (expected {expected})")]
    UnknownId { expected: u32, found: u32 },
    #[error("Unknown file version: {0}")]
    UnsupportedVersion(u32),
    #[error("Unexpected {field}: {found:#010x} (expected {expected:#010x})")]
    BadConstant {
        field: &'static str,
        expected: u32,
        found: u32,
    },
    #[error("Invalid data at offset {position} in {context}: {message}")]
    InvalidData {
        context: String,
        position: usize,
        message: String,
    },
}

/// A tree or archive could not be flattened into its binary form.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("Only mappings can be packed as a file, got a {0}")]
    RootNotMap(crate::value::ValueKind),
    #[error("{what} is too large for its 32-bit field: {len}")]
    TooLarge { what: String, len: usize },
}

/// Errors from the text and file entry points of a codec.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("Invalid text representation: {0}")]
    Text(#[from] serde_json::Error),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Checks a fixed header constant.
pub(crate) fn expect_constant(
    field: &'static str,
    expected: u32,
    found: u32,
) -> Result<(), FormatError> {
    if found == expected {
        Ok(())
    } else {
        Err(FormatError::BadConstant {
            field,
            expected,
            found,
        })
    }
}

/// Returns an [`FormatError::InvalidData`] located at the reader's position
/// unless the condition holds.
macro_rules! ensure_format {
    ($reader:expr, $cond:expr, $msg:literal, $($arg:expr),*) => {
        if !$cond {
            return Err($reader.invalid_data(format!($msg, $($arg),*)).into());
        }
    };
    ($reader:expr, $cond:expr, $msg:literal) => {
        if !$cond {
            return Err($reader.invalid_data($msg).into());
        }
    };
}

pub(crate) use ensure_format;
