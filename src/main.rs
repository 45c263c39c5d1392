use std::io::{self, Write};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jcheck::cli::{normalize_args, Args};
use jcheck::config::{load_config, show_config};
use jcheck::{JpegDocument, Options};

fn main() -> Result<()> {
    let args = Args::parse_from(normalize_args(std::env::args_os()));

    if args.config {
        return show_config();
    }

    let cfg = load_config().unwrap_or_default().merge_args(&args);
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(cfg.log_filter().into())
                .from_env_lossy(),
        )
        .init();

    let input = args
        .input
        .clone()
        .ok_or_else(|| anyhow!("Missing the name of the file to process"))?;

    // Every selector is validated before the file is touched.
    let options = Options::from_args(&args)?;
    for warning in options.output_warnings(args.output.is_some()) {
        eprintln!("jcheck: warning: {warning}; proceeding anyway");
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "jcheck: checking file {}", input.display())?;

    let mut doc = JpegDocument::open(&input, cfg.markers)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    doc.format_image_info(&mut out)?;
    if cfg.tables {
        doc.format_segments(&mut out)?;
    }
    if args.recurse {
        doc.format_embedded(&mut out, "0", cfg.markers, cfg.tables)?;
    }

    let report = options.dispatch(&mut doc, &mut out)?;
    info!(calls = report.calls, bytes = report.bytes, "selectors done");

    if options.tidy_up {
        let fixes = doc.tidy_up();
        writeln!(out, "jcheck: tidy up applied {fixes} fix(es)")?;
    }

    let (current, original) = doc.lengths();
    writeln!(
        out,
        "Actual JPEG length: {current} (original data length: {original})"
    )?;

    if let Some(output) = &args.output {
        writeln!(out, "Generating a copy as '{}'", output.display())?;
        let written = doc
            .write_to(output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        writeln!(out, "jcheck: written {written} bytes")?;
    }
    Ok(())
}
