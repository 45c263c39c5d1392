//! Selector mini-language.
//!
//! Every selector option shares the same lexical conventions: entries are separated by
//! `,`, fields within an entry by `:`, `*` stands for "every legal value" and a trailing
//! `s`, `x` or `b` picks the rendering mode. The grammars themselves live in the
//! submodules, one per option family.

use std::fmt;
use std::ops::RangeInclusive;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SelectorError;

mod metadata;
mod save;
mod tables;

pub use metadata::{parse_metadata, MetadataSelector, MetadataUse, MAX_CONTAINER};
pub use save::{
    parse_picture, parse_thumbnails, Orientation, PictureSaveSelector, Side, ThumbnailId,
    ThumbnailSelector,
};
pub use tables::{
    parse_entropy, parse_quantization, parse_scan, EntropySelector, EntropyTarget,
    QuantizationSelector, ScanSelector, TableClass, MAX_DESTINATION,
};

/// Either every legal value of a field, or exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Choice<T> {
    All,
    One(T),
}

impl<T: Copy> Choice<T> {
    pub fn is_all(&self) -> bool {
        matches!(self, Choice::All)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Choice<U> {
        match self {
            Choice::All => Choice::All,
            Choice::One(v) => Choice::One(f(v)),
        }
    }

    /// True when `value` is selected by this choice
    pub fn covers(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        match self {
            Choice::All => true,
            Choice::One(v) => *v == value,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Choice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::All => f.write_str("*"),
            Choice::One(v) => v.fmt(f),
        }
    }
}

/// Which rendering(s) of a table to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputMode {
    #[default]
    Standard,
    Extra,
    Both,
}

impl OutputMode {
    pub fn standard(self) -> bool {
        matches!(self, OutputMode::Standard | OutputMode::Both)
    }

    pub fn extra(self) -> bool {
        matches!(self, OutputMode::Extra | OutputMode::Both)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputMode::Standard => "standard",
            OutputMode::Extra => "extra",
            OutputMode::Both => "both",
        })
    }
}

/// The kinds of table a document formats per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableDomain {
    Quantization,
    Entropy,
    Scan,
}

impl fmt::Display for TableDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TableDomain::Quantization => "quantization",
            TableDomain::Entropy => "entropy",
            TableDomain::Scan => "scan",
        })
    }
}

/// Options whose value is written in the selector language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Meta,
    RemoveMeta,
    Quantization,
    Entropy,
    Scan,
    SaveThumbnail,
    SavePicture,
}

impl Flag {
    pub fn name(self) -> &'static str {
        match self {
            Flag::Meta => "-meta",
            Flag::RemoveMeta => "-rmeta",
            Flag::Quantization => "-qu",
            Flag::Entropy => "-en",
            Flag::Scan => "-sc",
            Flag::SaveThumbnail => "-sthumb",
            Flag::SavePicture => "-spict",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Token standing for every legal value of a field.
pub const WILDCARD: &str = "*";

/// One raw option value being parsed; builds errors that carry the whole value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OptionValue<'a> {
    flag: Flag,
    raw: &'a str,
}

impl<'a> OptionValue<'a> {
    pub(crate) fn new(flag: Flag, raw: &'a str) -> Self {
        Self { flag, raw }
    }

    /// `,`-separated entries of the value, in input order
    pub(crate) fn entries(&self) -> std::str::Split<'a, char> {
        self.raw.split(',')
    }

    pub(crate) fn syntax(&self, reason: &'static str) -> SelectorError {
        SelectorError::Syntax {
            flag: self.flag,
            value: self.raw.to_string(),
            reason,
        }
    }

    pub(crate) fn invalid(&self, what: &'static str, token: &str) -> SelectorError {
        SelectorError::InvalidSelector {
            flag: self.flag,
            what,
            token: token.to_string(),
            value: self.raw.to_string(),
        }
    }

    pub(crate) fn constraint(&self, reason: &'static str) -> SelectorError {
        SelectorError::Constraint {
            flag: self.flag,
            value: self.raw.to_string(),
            reason,
        }
    }

    /// Strip the trailing mode letter of an entry.
    pub(crate) fn mode_suffix<'e>(
        &self,
        entry: &'e str,
    ) -> Result<(OutputMode, &'e str), SelectorError> {
        split_mode(entry).ok_or_else(|| self.syntax("empty entry"))
    }

    /// An integer token within `range`.
    pub(crate) fn bounded(
        &self,
        what: &'static str,
        token: &str,
        range: RangeInclusive<i64>,
    ) -> Result<i64, SelectorError> {
        parse_int(token)
            .filter(|v| range.contains(v))
            .ok_or_else(|| self.invalid(what, token))
    }

    /// `*` or an integer within `range`.
    pub(crate) fn choice(
        &self,
        what: &'static str,
        token: &str,
        range: RangeInclusive<i64>,
    ) -> Result<Choice<i64>, SelectorError> {
        if token == WILDCARD {
            return Ok(Choice::All);
        }
        self.bounded(what, token, range).map(Choice::One)
    }

    /// Optional frame field: `*`, a non-negative integer, or frame 0 when omitted.
    pub(crate) fn frame(
        &self,
        what: &'static str,
        token: Option<&str>,
    ) -> Result<Choice<usize>, SelectorError> {
        match token {
            None => Ok(Choice::One(0)),
            Some(token) => {
                let max = i64::try_from(usize::MAX).unwrap_or(i64::MAX);
                Ok(self.choice(what, token, 0..=max)?.map(|v| v as usize))
            }
        }
    }
}

/// Split the `:`-separated fields of an entry.
pub(crate) fn fields(entry: &str) -> Vec<&str> {
    entry.split(':').collect()
}

/// Interpret the final character of a fragment as an output mode.
///
/// Returns `None` for an empty fragment. A fragment without a mode letter comes back
/// unchanged with [`OutputMode::Standard`].
pub fn split_mode(fragment: &str) -> Option<(OutputMode, &str)> {
    let last = fragment.chars().last()?;
    let mode = match last {
        's' => OutputMode::Standard,
        'x' => OutputMode::Extra,
        'b' => OutputMode::Both,
        _ => return Some((OutputMode::Standard, fragment)),
    };
    Some((mode, &fragment[..fragment.len() - 1]))
}

static INTEGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?)(?:0[xX]([0-9a-fA-F]+)|0[bB]([01]+)|0[oO]?([0-7]+)|([1-9][0-9]*|0))$")
        .expect("integer token regex")
});

/// Parse an integer token with an optional sign and base prefix.
///
/// Accepts decimal, `0x` hexadecimal, `0b` binary, and `0o` or leading-zero octal.
pub fn parse_int(token: &str) -> Option<i64> {
    let caps = INTEGER.captures(token)?;
    let negative = caps.get(1).is_some_and(|m| m.as_str() == "-");
    let (digits, radix) = [(2, 16), (3, 2), (4, 8), (5, 10)]
        .into_iter()
        .find_map(|(group, radix)| caps.get(group).map(|m| (m.as_str(), radix)))?;
    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
