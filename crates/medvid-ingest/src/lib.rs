//! medvid ingest crate - the fetch, store and output phases of a run.
//!
//! An IngestJob fetches metadata from a VideoSource, upserts every record
//! through the VideoRepository (collecting a per-item BatchReport), and then
//! writes the fetched records to files or to a line-oriented stream.

pub mod output;
pub mod pipeline;

pub use output::{OutputPlan, OutputSummary, StreamSummary};
pub use pipeline::{BatchReport, IngestJob, IngestReport, IngestTarget, ItemOutcome};
