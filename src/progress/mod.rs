//! Progress grammars for external tool output
//!
//! Each tool dialect is a [`LineParser`] turning one output line into at most
//! one [`ProgressEvent`]. Parsers are stateless; the running totals live in
//! [`DownloadTracker`] and [`transcode_progress`].

mod downloader;
mod transcoder;

pub use downloader::{DownloadTracker, DownloadUpdate, DownloaderDialect};
pub use transcoder::{
    TranscoderDialect, parse_codec_probe, parse_duration_probe, parse_timestamp,
    transcode_progress,
};

use std::time::Duration;

/// Something a tool reported about its progress
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// A new output file was started (file name only, no directory)
    FileStarted {
        /// Base name of the destination file
        name: String,
    },
    /// Total number of items the tool will process
    ItemCount {
        /// Item total
        total: u32,
    },
    /// Completion of the current item, 0-100
    Percent(f64),
    /// Media time processed so far in the current file
    Elapsed(Duration),
}

/// Parse one line of a tool's output.
pub trait LineParser {
    /// `None` when the line carries no progress information
    fn parse(&self, line: &str) -> Option<ProgressEvent>;
}
