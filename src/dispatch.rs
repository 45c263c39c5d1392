//! Deferred resolution of selector lists against a loaded document.
//!
//! Selectors are parsed before the document exists, so wildcard frames can only be
//! expanded once `frame_count()` is known. Resolution is a pure step producing the
//! concrete calls; execution runs them in order and stops at the first failure. Nothing
//! already written is undone.

use std::fmt;
use std::io::Write;
use std::ops::Range;

use tracing::debug;

use crate::error::{DispatchError, DocumentError};
use crate::selector::{
    Choice, EntropySelector, MetadataSelector, OutputMode, PictureSaveSelector,
    QuantizationSelector, ScanSelector, TableDomain, ThumbnailSelector,
};

/// Operations the dispatcher needs from a loaded document.
pub trait Document {
    fn frame_count(&self) -> usize;

    /// Format one table (or every table of `domain` when `destination` is `All`) of a
    /// frame. Entropy destinations are flattened: DC 0-3, AC 4-7. Returns bytes written.
    fn format_table(
        &self,
        out: &mut dyn Write,
        frame: usize,
        domain: TableDomain,
        destination: Choice<u8>,
        mode: OutputMode,
    ) -> Result<usize, DocumentError>;

    fn format_metadata(
        &self,
        out: &mut dyn Write,
        container: Choice<u8>,
        sub_ids: &[u32],
    ) -> Result<usize, DocumentError>;

    fn remove_container(
        &mut self,
        container: Choice<u8>,
        sub_ids: &[u32],
    ) -> Result<(), DocumentError>;

    fn save_thumbnails(&self, thumbnails: &[ThumbnailSelector]) -> Result<(), DocumentError>;

    fn save_picture(&self, picture: &PictureSaveSelector) -> Result<(), DocumentError>;
}

/// A fully resolved table formatting request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCall {
    pub frame: usize,
    pub domain: TableDomain,
    pub destination: Choice<u8>,
    pub mode: OutputMode,
}

/// The document operation a dispatch error refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FormatTable(TableCall),
    ShowMetadata(MetadataSelector),
    RemoveMetadata(MetadataSelector),
    SaveThumbnails,
    SavePicture(PictureSaveSelector),
}

fn fmt_sub_ids(f: &mut fmt::Formatter<'_>, sub_ids: &[u32]) -> fmt::Result {
    sub_ids.iter().try_for_each(|id| write!(f, ":{id}"))
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::FormatTable(call) => write!(
                f,
                "formatting {} table {} of frame {} ({})",
                call.domain, call.destination, call.frame, call.mode
            ),
            Action::ShowMetadata(sel) => {
                write!(f, "showing metadata app{}", sel.container)?;
                fmt_sub_ids(f, &sel.sub_ids)
            }
            Action::RemoveMetadata(sel) => {
                write!(f, "removing metadata app{}", sel.container)?;
                fmt_sub_ids(f, &sel.sub_ids)
            }
            Action::SaveThumbnails => f.write_str("saving thumbnails"),
            Action::SavePicture(sel) => write!(f, "saving picture to {}", sel.path.display()),
        }
    }
}

/// Counters accumulated while running a list of calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub calls: usize,
    pub bytes: usize,
}

impl DispatchReport {
    pub fn absorb(&mut self, other: DispatchReport) {
        self.calls += other.calls;
        self.bytes += other.bytes;
    }
}

fn frames(frame: Choice<usize>, frame_count: usize) -> Range<usize> {
    match frame {
        Choice::All => 0..frame_count,
        Choice::One(f) => f..f.saturating_add(1),
    }
}

fn expand(
    frame: Choice<usize>,
    frame_count: usize,
    domain: TableDomain,
    destination: Choice<u8>,
    mode: OutputMode,
) -> impl Iterator<Item = TableCall> {
    frames(frame, frame_count).map(move |frame| TableCall {
        frame,
        domain,
        destination,
        mode,
    })
}

pub fn resolve_quantization(
    selectors: &[QuantizationSelector],
    frame_count: usize,
) -> Vec<TableCall> {
    selectors
        .iter()
        .flat_map(|sel| {
            expand(
                sel.frame,
                frame_count,
                TableDomain::Quantization,
                sel.destination,
                sel.mode,
            )
        })
        .collect()
}

/// Wildcard entropy selectors stay `All`; the document expands them to all 8 tables.
pub fn resolve_entropy(selectors: &[EntropySelector], frame_count: usize) -> Vec<TableCall> {
    selectors
        .iter()
        .flat_map(|sel| {
            expand(
                sel.frame,
                frame_count,
                TableDomain::Entropy,
                sel.flat_destination(),
                sel.mode,
            )
        })
        .collect()
}

pub fn resolve_scan(selectors: &[ScanSelector], frame_count: usize) -> Vec<TableCall> {
    selectors
        .iter()
        .flat_map(|sel| expand(sel.frame, frame_count, TableDomain::Scan, sel.index, sel.mode))
        .collect()
}

/// Run resolved table calls in order, stopping at the first failure.
pub fn run_table_calls<D: Document + ?Sized>(
    doc: &D,
    out: &mut dyn Write,
    calls: &[TableCall],
) -> Result<DispatchReport, DispatchError> {
    let mut report = DispatchReport::default();
    for call in calls {
        debug!(?call, "format table");
        match doc.format_table(out, call.frame, call.domain, call.destination, call.mode) {
            Ok(bytes) => {
                report.calls += 1;
                report.bytes += bytes;
            }
            Err(source) => {
                return Err(DispatchError {
                    action: Action::FormatTable(*call),
                    succeeded: report.calls,
                    source,
                })
            }
        }
    }
    Ok(report)
}

pub fn show_metadata<D: Document + ?Sized>(
    doc: &D,
    out: &mut dyn Write,
    selectors: &[MetadataSelector],
) -> Result<DispatchReport, DispatchError> {
    let mut report = DispatchReport::default();
    for sel in selectors {
        debug!(container = %sel.container, sub_ids = ?sel.sub_ids, "show metadata");
        match doc.format_metadata(out, sel.container, &sel.sub_ids) {
            Ok(bytes) => {
                report.calls += 1;
                report.bytes += bytes;
            }
            Err(source) => {
                return Err(DispatchError {
                    action: Action::ShowMetadata(sel.clone()),
                    succeeded: report.calls,
                    source,
                })
            }
        }
    }
    Ok(report)
}

pub fn remove_metadata<D: Document + ?Sized>(
    doc: &mut D,
    selectors: &[MetadataSelector],
) -> Result<DispatchReport, DispatchError> {
    let mut report = DispatchReport::default();
    for sel in selectors {
        debug!(container = %sel.container, sub_ids = ?sel.sub_ids, "remove metadata");
        if let Err(source) = doc.remove_container(sel.container, &sel.sub_ids) {
            return Err(DispatchError {
                action: Action::RemoveMetadata(sel.clone()),
                succeeded: report.calls,
                source,
            });
        }
        report.calls += 1;
    }
    Ok(report)
}

pub fn save_thumbnails<D: Document + ?Sized>(
    doc: &D,
    thumbnails: &[ThumbnailSelector],
) -> Result<DispatchReport, DispatchError> {
    if thumbnails.is_empty() {
        return Ok(DispatchReport::default());
    }
    doc.save_thumbnails(thumbnails)
        .map(|()| DispatchReport { calls: 1, bytes: 0 })
        .map_err(|source| DispatchError {
            action: Action::SaveThumbnails,
            succeeded: 0,
            source,
        })
}

pub fn save_picture<D: Document + ?Sized>(
    doc: &D,
    picture: Option<&PictureSaveSelector>,
) -> Result<DispatchReport, DispatchError> {
    let Some(picture) = picture else {
        return Ok(DispatchReport::default());
    };
    doc.save_picture(picture)
        .map(|()| DispatchReport { calls: 1, bytes: 0 })
        .map_err(|source| DispatchError {
            action: Action::SavePicture(picture.clone()),
            succeeded: 0,
            source,
        })
}
