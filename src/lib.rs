//! jcheck: inspect and edit JPEG files through a small selector language.
//!
//! Selector options are parsed into typed lists up front ([`options::Options`]), then
//! resolved against a loaded [`jpeg::JpegDocument`] through the [`dispatch::Document`]
//! trait.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod jpeg;
pub mod options;
pub mod selector;

pub use dispatch::{Document, DispatchReport};
pub use error::{DispatchError, DocumentError, SelectorError};
pub use jpeg::JpegDocument;
pub use options::Options;
