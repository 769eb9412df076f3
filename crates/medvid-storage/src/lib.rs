//! medvid storage crate - SQLite persistence for videos, transcripts and analysis.
//!
//! Provides an explicitly constructed [`Database`] handle with bounded
//! connection retry, idempotent schema initialization, and repositories
//! exposing parameterized upsert and lookup queries.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::{parse_database_url, Database, DbTarget};
pub use repository::{AnalysisRepository, TranscriptRepository, VideoRepository};
