//! Output phase: JSON files or JSON lines on a stream.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use medvid_core::error::Result;
use medvid_core::types::VideoMetadata;

/// Where fetched records go once the store phase is done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPlan {
    /// Pretty-printed JSON array of full records.
    pub output_file: Option<PathBuf>,
    /// JSON array of bare video IDs.
    pub video_ids_file: Option<PathBuf>,
}

impl OutputPlan {
    /// True when no file was requested and records go to the stream.
    pub fn uses_stream(&self) -> bool {
        self.output_file.is_none() && self.video_ids_file.is_none()
    }
}

/// What the line-oriented writer managed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub written: usize,
    pub skipped: usize,
    /// The reader went away; remaining records were not written.
    pub broken_pipe: bool,
}

/// What the output phase wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSummary {
    pub output_file: Option<PathBuf>,
    pub video_ids_file: Option<PathBuf>,
    pub stream: Option<StreamSummary>,
}

/// Run the output phase. File write failures propagate; stream failures do not.
pub fn emit<W: Write>(
    plan: &OutputPlan,
    records: &[VideoMetadata],
    stream: &mut W,
) -> Result<OutputSummary> {
    let mut summary = OutputSummary::default();

    if let Some(path) = &plan.output_file {
        write_records_file(path, records)?;
        summary.output_file = Some(path.clone());
    }
    if let Some(path) = &plan.video_ids_file {
        write_ids_file(path, records)?;
        summary.video_ids_file = Some(path.clone());
    }
    if plan.uses_stream() {
        summary.stream = Some(write_json_lines(stream, records));
    }

    Ok(summary)
}

/// Write all records as a pretty-printed JSON array.
pub fn write_records_file(path: &Path, records: &[VideoMetadata]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), count = records.len(), "Wrote metadata file");
    Ok(())
}

/// Write the record IDs as a JSON array of strings.
pub fn write_ids_file(path: &Path, records: &[VideoMetadata]) -> Result<()> {
    let ids: Vec<&str> = records.iter().map(|r| r.video_id.as_str()).collect();
    let json = serde_json::to_string_pretty(&ids)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), count = ids.len(), "Wrote video ID file");
    Ok(())
}

/// Write one JSON object per line.
///
/// A broken pipe stops the loop and is not an error. Any other failure
/// skips the affected record.
pub fn write_json_lines<W: Write>(out: &mut W, records: &[VideoMetadata]) -> StreamSummary {
    let mut summary = StreamSummary::default();

    for record in records {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                warn!(video_id = %record.video_id, error = %e, "Failed to serialize record, skipping");
                summary.skipped += 1;
                continue;
            }
        };

        match writeln!(out, "{}", line) {
            Ok(()) => summary.written += 1,
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                warn!("Output stream closed (broken pipe), stopping output");
                summary.broken_pipe = true;
                return summary;
            }
            Err(e) => {
                warn!(video_id = %record.video_id, error = %e, "Failed to write record, skipping");
                summary.skipped += 1;
            }
        }
    }

    match out.flush() {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            warn!("Output stream closed (broken pipe) while flushing");
            summary.broken_pipe = true;
        }
        Err(e) => warn!(error = %e, "Failed to flush output stream"),
    }

    summary
}
