//! Codecs for the asset files of The Longest Journey.
//!
//! Binary assets are decoded into an ordered [`value::Value`] tree that can be
//! rendered as JSON, edited, and packed back into the exact original bytes.
//! The formats built on the tree are animations ([`formats::ani`]) and rigged
//! meshes ([`formats::cir`]). The archive container ([`archive`]) is handled
//! separately as an ordered map from file names to raw contents.

pub mod archive;
pub mod codec;
pub mod errors;
pub mod formats;
pub mod utils;
pub mod value;

pub use crate::{
    codec::DataCodec,
    errors::{FormatError, LoadError, PackError},
    value::{Map, Value},
};
