//! Ask command handler.
//!
//! Runs one question through the full pipeline against the local corpus,
//! in batch or streaming mode.

use std::io::Write;
use std::sync::Arc;

use clap::Args;
use futures::StreamExt;
use newsbrief_core::{config::AppConfig, AppError, AppResult};
use newsbrief_qa::embeddings::create_provider;
use newsbrief_qa::store::SqliteDocumentStore;
use newsbrief_qa::{
    encode_event, AskPipeline, AskRequest, PipelineConfig, Scope, SqliteCacheStore, StreamEvent,
    TimeWindow,
};

/// Ask a question over the news corpus
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Time window (today, 7d, 30d)
    #[arg(short = 'w', long, default_value = "7d")]
    pub window: String,

    /// Category filter ("all" for none)
    #[arg(long, default_value = "all")]
    pub category: String,

    /// Restrict to specific source ids (repeatable)
    #[arg(short, long)]
    pub source: Vec<String>,

    /// User identifier for cache scoping
    #[arg(short, long)]
    pub user: Option<String>,

    /// Stream the answer token by token
    #[arg(long)]
    pub stream: bool,

    /// Emit raw server-sent-event frames (implies --stream)
    #[arg(long)]
    pub sse: bool,

    /// Output the full response as JSON
    #[arg(long, conflicts_with = "stream")]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let pipeline = build_pipeline(config)?;
        let request = self.build_request()?;

        if self.stream || self.sse {
            self.execute_streaming(&pipeline, request).await
        } else {
            self.execute_batch(&pipeline, request).await
        }
    }

    fn build_request(&self) -> AppResult<AskRequest> {
        let time_window = parse_window(&self.window)?;
        let source_ids = if self.source.is_empty() {
            None
        } else {
            Some(self.source.clone())
        };

        Ok(AskRequest {
            user_id: self.user.clone(),
            question: self.question.clone(),
            scope: Scope {
                time_window,
                category: self.category.clone(),
                source_ids,
            },
            history: vec![],
        })
    }

    async fn execute_batch(&self, pipeline: &Arc<AskPipeline>, request: AskRequest) -> AppResult<()> {
        let response = pipeline.ask_shared(request).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
            return Ok(());
        }

        println!("{}", response.answer.answer_markdown);

        if !response.answer.takeaways.is_empty() {
            println!("\nKey takeaways:");
            for takeaway in &response.answer.takeaways {
                println!("  - {}", takeaway);
            }
        }

        if !response.answer.citations.is_empty() {
            println!("\nSources:");
            for (i, citation) in response.answer.citations.iter().enumerate() {
                println!(
                    "  [{}] {} ({}, {})",
                    i + 1,
                    citation.title,
                    citation.source_name,
                    citation.published_at
                );
            }
        }

        println!("\nFollow-up questions:");
        for follow_up in &response.answer.follow_ups {
            println!("  - {}", follow_up);
        }

        if response.cached {
            tracing::debug!("answer served from cache");
        }

        Ok(())
    }

    async fn execute_streaming(
        &self,
        pipeline: &Arc<AskPipeline>,
        request: AskRequest,
    ) -> AppResult<()> {
        let mut events = pipeline.ask_stream(request);
        let mut stdout = std::io::stdout();

        while let Some(event) = events.next().await {
            if self.sse {
                let frame = encode_event(&event)?;
                stdout.write_all(frame.as_bytes())?;
                stdout.flush()?;
                continue;
            }

            match event {
                StreamEvent::Token(text) => {
                    stdout.write_all(text.as_bytes())?;
                    stdout.flush()?;
                }
                StreamEvent::Done(answer) => {
                    println!();
                    if !answer.citations.is_empty() {
                        println!("\nSources:");
                        for (i, citation) in answer.citations.iter().enumerate() {
                            println!("  [{}] {} ({})", i + 1, citation.title, citation.source_name);
                        }
                    }
                    println!("\nFollow-up questions:");
                    for follow_up in &answer.follow_ups {
                        println!("  - {}", follow_up);
                    }
                }
                StreamEvent::Error(message) => {
                    return Err(AppError::Llm(message));
                }
            }
        }

        Ok(())
    }
}

fn parse_window(window: &str) -> AppResult<TimeWindow> {
    match window {
        "today" => Ok(TimeWindow::Today),
        "7d" => Ok(TimeWindow::Week),
        "30d" => Ok(TimeWindow::Month),
        other => Err(AppError::Validation(format!(
            "Unknown time window: {}. Supported: today, 7d, 30d",
            other
        ))),
    }
}

/// Wire the pipeline from configuration.
pub fn build_pipeline(config: &AppConfig) -> AppResult<Arc<AskPipeline>> {
    let store = Arc::new(SqliteDocumentStore::open(&config.db_path)?);
    // Answer cache shares the database file so hits survive restarts.
    let cache = Arc::new(SqliteCacheStore::open(&config.db_path)?);

    let embedding_provider = create_provider(
        &config.provider,
        &config.embedding_model,
        config.embedding_dim,
        config.endpoint.as_deref(),
    )?;

    let llm = newsbrief_llm::create_client(&config.provider, config.endpoint.as_deref())
        .map_err(AppError::Config)?;

    Ok(Arc::new(AskPipeline::new(
        store,
        cache,
        embedding_provider,
        llm,
        PipelineConfig {
            model: config.model.clone(),
            ..PipelineConfig::default()
        },
    )))
}
