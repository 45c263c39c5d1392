use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// jcheck: check a JPEG file, print its internal tables and metadata, and strip or
/// extract embedded data.
///
/// Selector options accept Go-style single-dash spelling (`-qu=*:*b`) as well as
/// `--qu=*:*b`.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, disable_version_flag = true)]
pub struct Args {
    /// JPEG file to process
    pub input: Option<PathBuf>,

    /// Print version and exit
    #[arg(short = 'v', long, action = ArgAction::Version)]
    pub version: Option<bool>,

    /// Warn about inconsistencies found while reading
    #[arg(short = 'w')]
    pub warn: bool,

    /// Fix framing errors (missing EOI, trailing bytes) in the written copy
    #[arg(long = "tidyup")]
    pub tidy_up: bool,

    /// Also report JPEG pictures embedded in app segments, recursively
    #[arg(long = "rp")]
    pub recurse: bool,

    /// Print markers and offsets as the file is read
    #[arg(short = 'm')]
    pub markers: bool,

    /// Print all tables in file order
    #[arg(short = 't')]
    pub tables: bool,

    /// Metadata to print: <app>[:<sub>]*[,...], -1 for every app segment
    #[arg(long = "meta", value_name = "SELECTORS", allow_hyphen_values = true)]
    pub meta: Option<String>,

    /// Metadata to remove: <app>[:<sub>]*[,...] with app 1-15, -1 for every app segment
    #[arg(long = "rmeta", value_name = "SELECTORS", allow_hyphen_values = true)]
    pub rmeta: Option<String>,

    /// Quantization tables: <dest|*>[:<frame|*>][s|x|b][,...]
    #[arg(long = "qu", value_name = "SELECTORS")]
    pub qu: Option<String>,

    /// Entropy tables: <DC|AC|*>:<dest|*>[:<frame|*>][s|x|b][,...]
    #[arg(long = "en", value_name = "SELECTORS")]
    pub en: Option<String>,

    /// Scan headers: <index|*>[:<frame|*>][s|x|b][,...]
    #[arg(long = "sc", value_name = "SELECTORS")]
    pub sc: Option<String>,

    /// Save embedded thumbnails: <0|1>:<path>[,...]
    #[arg(long = "sthumb", value_name = "SELECTORS")]
    pub sthumb: Option<String>,

    /// Save the picture: [<tl|tr|br|bl|lt|rt|rb|lb>[,<bw|cl>]:]<path>
    #[arg(long = "spict", value_name = "SELECTOR")]
    pub spict: Option<String>,

    /// Write the (possibly modified) JPEG data to this file
    #[arg(short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Show config file path and content, then exit
    #[arg(short, long)]
    pub config: bool,
}

const LONG_FLAGS: [&str; 11] = [
    "meta", "rmeta", "qu", "en", "sc", "sthumb", "spict", "tidyup", "rp", "config", "help",
];

/// Rewrite single-dash long flags (`-meta=0`) to the `--meta=0` form clap expects.
///
/// Only known flag names are rewritten, so negative values such as `-1` pass through.
/// Everything after `--` is left alone.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut rest_is_positional = false;
    args.into_iter()
        .map(|arg| {
            if rest_is_positional {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                rest_is_positional = true;
                return arg;
            }
            match text.strip_prefix('-') {
                Some(flag) if !flag.starts_with('-') => {
                    let name = flag.split_once('=').map_or(flag, |(name, _)| name);
                    if LONG_FLAGS.contains(&name) {
                        OsString::from(format!("-{text}"))
                    } else {
                        arg
                    }
                }
                _ => arg,
            }
        })
        .collect()
}
