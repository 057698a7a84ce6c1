//! Ingest command handler.
//!
//! Loads documents from a JSON file into the local corpus. Upstream
//! crawling and classification happen elsewhere; this command only
//! accepts their already-classified output.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use newsbrief_core::{config::AppConfig, AppResult};
use newsbrief_qa::store::{DocumentStore, SqliteDocumentStore};
use newsbrief_qa::Document;

/// Load documents into the corpus from a JSON file
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Path to a JSON file containing an array of documents
    pub file: PathBuf,

    /// Skip documents whose id already exists instead of replacing them
    #[arg(long)]
    pub skip_existing: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Ingesting documents from {:?}", self.file);

        let raw = std::fs::read_to_string(&self.file)?;
        let documents: Vec<Document> = serde_json::from_str(&raw)?;

        let store = Arc::new(SqliteDocumentStore::open(&config.db_path)?);

        let mut inserted = 0usize;
        let mut skipped = 0usize;

        for document in &documents {
            if self.skip_existing && store.get(&document.id).await?.is_some() {
                skipped += 1;
                continue;
            }
            store.insert(document).await?;
            inserted += 1;
        }

        tracing::info!(inserted, skipped, "ingest complete");
        println!(
            "Ingested {} documents ({} skipped) into {:?}",
            inserted, skipped, config.db_path
        );

        Ok(())
    }
}
