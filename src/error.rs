//! Error types for selector parsing, document access and dispatch.

use std::io;

use thiserror::Error;

use crate::dispatch::Action;
use crate::selector::{Choice, Flag, TableDomain};

/// Errors raised while turning an option value into a selector list.
///
/// Every variant carries the flag and the raw option value so the message can point at
/// the offending option without further context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// Wrong delimiter count or an empty fragment
    #[error("syntax error in {flag}={value}: {reason}")]
    Syntax {
        flag: Flag,
        value: String,
        reason: &'static str,
    },

    /// A token outside its legal domain
    #[error("invalid {what} `{token}` in {flag}={value}")]
    InvalidSelector {
        flag: Flag,
        what: &'static str,
        token: String,
        value: String,
    },

    /// Individually valid tokens forming an unsupported combination
    #[error("unsupported combination in {flag}={value}: {reason}")]
    Constraint {
        flag: Flag,
        value: String,
        reason: &'static str,
    },
}

impl SelectorError {
    /// The raw option value the error was found in
    pub fn value(&self) -> &str {
        match self {
            SelectorError::Syntax { value, .. }
            | SelectorError::InvalidSelector { value, .. }
            | SelectorError::Constraint { value, .. } => value,
        }
    }
}

/// Failures reported by a [`crate::dispatch::Document`] implementation.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("frame {frame} does not exist (document has {count} frame(s))")]
    NoSuchFrame { frame: usize, count: usize },

    #[error("no {domain} table {destination} in frame {frame}")]
    NoSuchTable {
        frame: usize,
        domain: TableDomain,
        destination: u8,
    },

    #[error("no app segment matching app{0}")]
    NoSuchContainer(Choice<u8>),

    #[error("app{container} has no sub-container {sub_id}")]
    NoSuchSubContainer { container: u8, sub_id: u32 },

    #[error("no embedded thumbnail #{0}")]
    NoSuchThumbnail(u8),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("malformed document at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// A document operation failed while a selector list was being resolved.
///
/// `source` is the document's error, untouched; `succeeded` counts the concrete calls of
/// the same list that completed before the failure.
#[derive(Debug, Error)]
#[error("{action} failed after {succeeded} successful call(s)")]
pub struct DispatchError {
    pub action: Action,
    pub succeeded: usize,
    #[source]
    pub source: DocumentError,
}
