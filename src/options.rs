//! Selector lists collected from the command line.

use std::io::Write;

use tracing::debug;

use crate::cli::Args;
use crate::dispatch::{self, Document, DispatchReport};
use crate::error::{DispatchError, SelectorError};
use crate::selector::{
    parse_entropy, parse_metadata, parse_picture, parse_quantization, parse_scan,
    parse_thumbnails, EntropySelector, MetadataSelector, MetadataUse, PictureSaveSelector,
    QuantizationSelector, ScanSelector, ThumbnailSelector,
};

/// Every selector option, parsed and validated. Options left out are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// `-meta`
    pub metadata: Vec<MetadataSelector>,
    /// `-qu`
    pub quantization: Vec<QuantizationSelector>,
    /// `-en`
    pub entropy: Vec<EntropySelector>,
    /// `-sc`
    pub scans: Vec<ScanSelector>,
    /// `-sthumb`
    pub thumbnails: Vec<ThumbnailSelector>,
    /// `-spict`
    pub picture: Option<PictureSaveSelector>,
    /// `-rmeta`
    pub removals: Vec<MetadataSelector>,
    /// `-tidyup`
    pub tidy_up: bool,
}

// An empty option value is the same as leaving the option out.
fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn parse_opt<T>(
    value: &Option<String>,
    parse: impl FnOnce(&str) -> Result<T, SelectorError>,
) -> Result<Option<T>, SelectorError> {
    given(value).map(parse).transpose()
}

impl Options {
    /// Parse every selector option. The first invalid option aborts.
    pub fn from_args(args: &Args) -> Result<Self, SelectorError> {
        let options = Options {
            metadata: parse_opt(&args.meta, |v| parse_metadata(v, MetadataUse::Display))?
                .unwrap_or_default(),
            quantization: parse_opt(&args.qu, parse_quantization)?.unwrap_or_default(),
            entropy: parse_opt(&args.en, parse_entropy)?.unwrap_or_default(),
            scans: parse_opt(&args.sc, parse_scan)?.unwrap_or_default(),
            thumbnails: parse_opt(&args.sthumb, parse_thumbnails)?.unwrap_or_default(),
            picture: parse_opt(&args.spict, parse_picture)?,
            removals: parse_opt(&args.rmeta, |v| parse_metadata(v, MetadataUse::Removal))?
                .unwrap_or_default(),
            tidy_up: args.tidy_up,
        };
        debug!(?options, "parsed selectors");
        Ok(options)
    }

    /// True when running these options changes the document.
    pub fn modifies(&self) -> bool {
        self.tidy_up || !self.removals.is_empty()
    }

    /// Mismatches between the requested changes and the output file. They are shown
    /// whatever the log level, and the run goes on.
    pub fn output_warnings(&self, has_output: bool) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if !has_output {
            if self.tidy_up {
                warnings.push("tidying up the file is requested but no output file is given");
            }
            if !self.removals.is_empty() {
                warnings.push("removing metadata is requested but no output file is given");
            }
        } else if !self.modifies() {
            warnings.push(
                "an output file is requested but neither tidying up nor removing metadata is",
            );
        }
        warnings
    }

    /// Resolve and run every selector list against a loaded document.
    ///
    /// Order: metadata, quantization, entropy, scans, thumbnails, picture, removals.
    /// The first failing call ends the whole run.
    pub fn dispatch<D: Document + ?Sized>(
        &self,
        doc: &mut D,
        out: &mut dyn Write,
    ) -> Result<DispatchReport, DispatchError> {
        let frame_count = doc.frame_count();
        let mut report = DispatchReport::default();

        report.absorb(dispatch::show_metadata(&*doc, out, &self.metadata)?);
        for calls in [
            dispatch::resolve_quantization(&self.quantization, frame_count),
            dispatch::resolve_entropy(&self.entropy, frame_count),
            dispatch::resolve_scan(&self.scans, frame_count),
        ] {
            report.absorb(dispatch::run_table_calls(&*doc, out, &calls)?);
        }
        report.absorb(dispatch::save_thumbnails(&*doc, &self.thumbnails)?);
        report.absorb(dispatch::save_picture(&*doc, self.picture.as_ref())?);
        report.absorb(dispatch::remove_metadata(doc, &self.removals)?);

        debug!(calls = report.calls, bytes = report.bytes, "dispatch done");
        Ok(report)
    }
}
