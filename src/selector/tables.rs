//! Grammars for the per-frame table options `-qu`, `-en` and `-sc`.

use crate::error::SelectorError;

use super::{fields, Choice, Flag, OptionValue, OutputMode, WILDCARD};

/// Highest table destination (and scan index) a frame can address.
pub const MAX_DESTINATION: u8 = 3;

const DESTINATIONS: std::ops::RangeInclusive<i64> = 0..=MAX_DESTINATION as i64;

/// `-qu=<dest|*>[:<frame|*>][s|x|b]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizationSelector {
    pub destination: Choice<u8>,
    pub frame: Choice<usize>,
    pub mode: OutputMode,
}

/// Huffman table class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableClass {
    Dc = 0,
    Ac = 1,
}

/// Class and destination of an entropy selector.
///
/// Either both are wildcards or both are concrete; the mixed forms are rejected by
/// [`parse_entropy`] and cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyTarget {
    All,
    One { class: TableClass, destination: u8 },
}

/// `-en=<DC|AC|*>:<dest|*>[:<frame|*>][s|x|b]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntropySelector {
    pub target: EntropyTarget,
    pub frame: Choice<usize>,
    pub mode: OutputMode,
}

impl EntropySelector {
    pub fn class(&self) -> Choice<TableClass> {
        match self.target {
            EntropyTarget::All => Choice::All,
            EntropyTarget::One { class, .. } => Choice::One(class),
        }
    }

    pub fn destination(&self) -> Choice<u8> {
        match self.target {
            EntropyTarget::All => Choice::All,
            EntropyTarget::One { destination, .. } => Choice::One(destination),
        }
    }

    /// Single destination index understood by the document: DC tables are 0-3, AC 4-7.
    pub fn flat_destination(&self) -> Choice<u8> {
        match self.target {
            EntropyTarget::All => Choice::All,
            EntropyTarget::One { class, destination } => {
                Choice::One(class as u8 * (MAX_DESTINATION + 1) + destination)
            }
        }
    }
}

/// `-sc=<index|*>[:<frame|*>][s|x|b]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSelector {
    pub index: Choice<u8>,
    pub frame: Choice<usize>,
    pub mode: OutputMode,
}

pub fn parse_quantization(value: &str) -> Result<Vec<QuantizationSelector>, SelectorError> {
    let opt = OptionValue::new(Flag::Quantization, value);
    opt.entries()
        .map(|entry| {
            let (mode, rest) = opt.mode_suffix(entry)?;
            let fields = fields(rest);
            if fields.len() > 2 {
                return Err(opt.syntax("expected <destination>[:<frame>]"));
            }
            let destination = opt
                .choice("quantization table destination", fields[0], DESTINATIONS)?
                .map(|v| v as u8);
            let frame = opt.frame("quantization table frame", fields.get(1).copied())?;
            Ok(QuantizationSelector {
                destination,
                frame,
                mode,
            })
        })
        .collect()
}

pub fn parse_entropy(value: &str) -> Result<Vec<EntropySelector>, SelectorError> {
    let opt = OptionValue::new(Flag::Entropy, value);
    opt.entries()
        .map(|entry| {
            let (mode, rest) = opt.mode_suffix(entry)?;
            let fields = fields(rest);
            if !(2..=3).contains(&fields.len()) {
                return Err(opt.syntax("expected <class>:<destination>[:<frame>]"));
            }
            let class = match fields[0] {
                WILDCARD => Choice::All,
                "DC" => Choice::One(TableClass::Dc),
                "AC" => Choice::One(TableClass::Ac),
                token => return Err(opt.invalid("entropy table class", token)),
            };
            let destination = opt
                .choice("entropy table destination", fields[1], DESTINATIONS)?
                .map(|v| v as u8);
            let target = match (class, destination) {
                (Choice::All, Choice::All) => EntropyTarget::All,
                (Choice::One(class), Choice::One(destination)) => {
                    EntropyTarget::One { class, destination }
                }
                (Choice::All, Choice::One(_)) => {
                    return Err(opt.constraint("specific destination for all classes"))
                }
                (Choice::One(_), Choice::All) => {
                    return Err(opt.constraint("all destinations for a specific class"))
                }
            };
            let frame = opt.frame("entropy table frame", fields.get(2).copied())?;
            Ok(EntropySelector {
                target,
                frame,
                mode,
            })
        })
        .collect()
}

pub fn parse_scan(value: &str) -> Result<Vec<ScanSelector>, SelectorError> {
    let opt = OptionValue::new(Flag::Scan, value);
    opt.entries()
        .map(|entry| {
            let (mode, rest) = opt.mode_suffix(entry)?;
            let fields = fields(rest);
            if fields.len() > 2 {
                return Err(opt.syntax("expected <index>[:<frame>]"));
            }
            let index = opt
                .choice("scan index", fields[0], DESTINATIONS)?
                .map(|v| v as u8);
            let frame = opt.frame("scan frame", fields.get(1).copied())?;
            Ok(ScanSelector { index, frame, mode })
        })
        .collect()
}
