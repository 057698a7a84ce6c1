//! Command handlers for the newsbrief CLI.

pub mod ask;
pub mod ingest;

pub use ask::AskCommand;
pub use ingest::IngestCommand;
