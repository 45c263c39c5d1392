//! Grammar shared by `-meta` and `-rmeta`.

use crate::error::SelectorError;

use super::{fields, Choice, Flag, OptionValue, WILDCARD};

/// Highest application segment id.
pub const MAX_CONTAINER: u8 = 15;

/// Which option the metadata grammar is parsing for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataUse {
    Display,
    /// Container 0 can be shown but never removed
    Removal,
}

impl MetadataUse {
    pub fn low_bound(self) -> i64 {
        match self {
            MetadataUse::Display => 0,
            MetadataUse::Removal => 1,
        }
    }

    fn flag(self) -> Flag {
        match self {
            MetadataUse::Display => Flag::Meta,
            MetadataUse::Removal => Flag::RemoveMeta,
        }
    }
}

/// `<id>[:<sub>]*`: a container and, optionally, some of its sub-containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSelector {
    pub container: Choice<u8>,
    /// Empty means the whole container
    pub sub_ids: Vec<u32>,
}

impl MetadataSelector {
    pub fn whole(container: Choice<u8>) -> Self {
        Self {
            container,
            sub_ids: Vec::new(),
        }
    }
}

/// Parse `<id>[:<sub>]*[,<id>[:<sub>]*]*`.
///
/// The wildcard container is written `-1` (or `*`). It ends the list: whatever follows it,
/// sub-ids included, is ignored.
pub fn parse_metadata(
    value: &str,
    usage: MetadataUse,
) -> Result<Vec<MetadataSelector>, SelectorError> {
    let opt = OptionValue::new(usage.flag(), value);
    let low = usage.low_bound();
    let mut selectors = Vec::new();

    for entry in opt.entries() {
        let fields = fields(entry);
        let container = match fields[0] {
            WILDCARD | "-1" => Choice::All,
            token => {
                let id = opt.bounded("container id", token, low..=MAX_CONTAINER as i64)?;
                Choice::One(id as u8)
            }
        };
        if container.is_all() {
            selectors.push(MetadataSelector::whole(Choice::All));
            return Ok(selectors);
        }

        let sub_ids = fields[1..]
            .iter()
            .map(|token| {
                opt.bounded("sub-container id", token, low..=u32::MAX as i64)
                    .map(|v| v as u32)
            })
            .collect::<Result<Vec<_>, _>>()?;
        selectors.push(MetadataSelector { container, sub_ids });
    }
    Ok(selectors)
}
