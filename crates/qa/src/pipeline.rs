//! The ask pipeline: orchestration of every retrieval and generation
//! stage.
//!
//! Both protocols share the same stages through context building:
//! sanitize, cache check, relevance gate, candidate fetch, lexical rank,
//! embedding backfill, semantic selection, context assembly, and the
//! interleaved refusal checks. The batch path then runs structured
//! generation and validation; the streaming path forwards tokens and
//! derives citations, takeaways, and follow-ups from the transcript.

use std::pin::Pin;
use std::sync::Arc;

use futures::stream::Stream;
use futures::{FutureExt, StreamExt};
use newsbrief_core::{AppError, AppResult};
use newsbrief_llm::LlmClient;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{CacheKey, CacheManager, CacheStore, CACHE_TTL_SECS};
use crate::context;
use crate::derive::PostHocDeriver;
use crate::embeddings::EmbeddingProvider;
use crate::fetch::CandidateFetcher;
use crate::generate::Generator;
use crate::lexical;
use crate::refusal::RefusalKind;
use crate::relevance::RelevanceGate;
use crate::sanitize::Sanitizer;
use crate::semantic::{self, EnsureCache};
use crate::singleflight::SingleFlight;
use crate::sse::StreamEvent;
use crate::store::DocumentStore;
use crate::telemetry::RequestLogger;
use crate::types::{AskRequest, AskResponse, ContextItem};

/// Tuning knobs for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model identifier passed to the LLM provider.
    pub model: String,

    /// Answer cache TTL.
    pub cache_ttl_secs: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            cache_ttl_secs: CACHE_TTL_SECS,
        }
    }
}

/// Outcome of the shared retrieval stages.
enum Prepared {
    /// A fresh cached answer short-circuits everything downstream.
    Cached(crate::types::AnswerResult),
    /// A refusal check fired.
    Refused {
        kind: RefusalKind,
        detail: Option<String>,
    },
    /// Context is ready for generation. `key` is absent for anonymous
    /// requests, which never touch the answer cache.
    Ready {
        key: Option<CacheKey>,
        question: String,
        items: Vec<ContextItem>,
    },
}

pub struct AskPipeline {
    sanitizer: Sanitizer,
    gate: RelevanceGate,
    cache: CacheManager,
    fetcher: CandidateFetcher,
    ensurer: semantic::EmbeddingEnsurer,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    generator: Generator,
    deriver: PostHocDeriver,
    flight: SingleFlight<Result<AskResponse, Arc<AppError>>>,
}

impl AskPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache_store: Arc<dyn CacheStore>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmClient>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            sanitizer: Sanitizer::new(),
            gate: RelevanceGate::new(),
            cache: CacheManager::new(cache_store).with_ttl_secs(config.cache_ttl_secs),
            fetcher: CandidateFetcher::new(Arc::clone(&store)),
            ensurer: semantic::EmbeddingEnsurer::new(
                store,
                Arc::clone(&embedding_provider),
                Arc::new(EnsureCache::new()),
            ),
            embedding_provider,
            generator: Generator::new(llm, config.model),
            deriver: PostHocDeriver::new(),
            flight: SingleFlight::new(),
        }
    }

    /// Answer a question with the batch (structured JSON) protocol.
    pub async fn ask(&self, request: AskRequest) -> AppResult<AskResponse> {
        let request_id = Uuid::new_v4().to_string();
        let mut logger = RequestLogger::start(request_id.clone(), request.user_id.clone());

        let prepared = match self.prepare(&request, &mut logger).await {
            Ok(prepared) => prepared,
            Err(e) => {
                let message = e.to_string();
                logger.finish_error(&message);
                return Err(e);
            }
        };

        match prepared {
            Prepared::Cached(answer) => {
                logger.finish_success();
                Ok(AskResponse {
                    request_id,
                    answer,
                    cached: true,
                    refused: false,
                })
            }
            Prepared::Refused { kind, detail } => {
                let answer = kind.to_answer(detail.as_deref());
                logger.finish_refused(kind.reason());
                Ok(AskResponse {
                    request_id,
                    answer,
                    cached: false,
                    refused: true,
                })
            }
            Prepared::Ready {
                key,
                question,
                items,
            } => {
                logger.model_invoked();
                match self
                    .generator
                    .generate_batch(&items, &request.history, &question)
                    .await
                {
                    Ok(answer) => {
                        if let Some(key) = &key {
                            self.cache.set(key, answer.clone()).await;
                        }
                        logger.finish_success();
                        Ok(AskResponse {
                            request_id,
                            answer,
                            cached: false,
                            refused: false,
                        })
                    }
                    Err(e) => {
                        let message = e.to_string();
                        logger.finish_error(&message);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Batch protocol with in-flight de-duplication: identical concurrent
    /// questions from the same user share one execution.
    pub async fn ask_shared(self: &Arc<Self>, request: AskRequest) -> AppResult<AskResponse> {
        let flight_key = format!(
            "{}|{}|{}",
            request.user_id.as_deref().unwrap_or("anonymous"),
            request.question.trim().to_lowercase(),
            request.scope.cache_segment()
        );

        let pipeline = Arc::clone(self);
        let result = self
            .flight
            .run(&flight_key, move || {
                async move { pipeline.ask(request).await.map_err(Arc::new) }.boxed()
            })
            .await;

        // Every waiter gets its own copy with the variant intact.
        result.map_err(|e| e.duplicate())
    }

    /// Answer a question with the streaming protocol.
    ///
    /// Yields one [`StreamEvent::Token`] per model fragment, then exactly
    /// one terminal event: `Done` with the derived answer, or `Error` on
    /// mid-stream failure. Cache hits and refusals replay the answer body
    /// as a single token followed by `Done`.
    pub fn ask_stream(
        self: &Arc<Self>,
        request: AskRequest,
    ) -> Pin<Box<dyn Stream<Item = StreamEvent> + Send>> {
        let pipeline = Arc::clone(self);
        let (tx, rx) = mpsc::channel::<StreamEvent>(32);

        tokio::spawn(async move {
            pipeline.run_stream(request, tx).await;
        });

        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        }))
    }

    async fn run_stream(&self, request: AskRequest, tx: mpsc::Sender<StreamEvent>) {
        let request_id = Uuid::new_v4().to_string();
        let mut logger = RequestLogger::start(request_id, request.user_id.clone());

        let prepared = match self.prepare(&request, &mut logger).await {
            Ok(prepared) => prepared,
            Err(e) => {
                let message = e.to_string();
                let _ = tx.send(StreamEvent::Error(message.clone())).await;
                logger.finish_error(&message);
                return;
            }
        };

        match prepared {
            Prepared::Cached(answer) => {
                let _ = tx
                    .send(StreamEvent::Token(answer.answer_markdown.clone()))
                    .await;
                let _ = tx.send(StreamEvent::Done(answer)).await;
                logger.finish_success();
            }
            Prepared::Refused { kind, detail } => {
                let answer = kind.to_answer(detail.as_deref());
                let _ = tx
                    .send(StreamEvent::Token(answer.answer_markdown.clone()))
                    .await;
                let _ = tx.send(StreamEvent::Done(answer)).await;
                logger.finish_refused(kind.reason());
            }
            Prepared::Ready {
                key,
                question,
                items,
            } => {
                logger.model_invoked();
                let mut token_stream = match self
                    .generator
                    .start_stream(&items, &request.history, &question)
                    .await
                {
                    Ok(stream) => stream,
                    Err(e) => {
                        let message = e.to_string();
                        let _ = tx.send(StreamEvent::Error(message.clone())).await;
                        logger.finish_error(&message);
                        return;
                    }
                };

                let mut full_text = String::new();
                while let Some(chunk) = token_stream.next().await {
                    match chunk {
                        Ok(chunk) => {
                            if !chunk.content.is_empty() {
                                full_text.push_str(&chunk.content);
                                if tx
                                    .send(StreamEvent::Token(chunk.content))
                                    .await
                                    .is_err()
                                {
                                    logger.finish_error("client disconnected");
                                    return;
                                }
                            }
                            if chunk.done {
                                break;
                            }
                        }
                        Err(e) => {
                            let message = e.to_string();
                            let _ = tx.send(StreamEvent::Error(message.clone())).await;
                            logger.finish_error(&message);
                            return;
                        }
                    }
                }

                let answer = self.deriver.derive(&full_text, &items, &question);
                if let Some(key) = &key {
                    self.cache.set(key, answer.clone()).await;
                }
                let _ = tx.send(StreamEvent::Done(answer)).await;
                logger.finish_success();
            }
        }
    }

    /// Run the shared stages and the interleaved refusal checks.
    async fn prepare(
        &self,
        request: &AskRequest,
        logger: &mut RequestLogger,
    ) -> AppResult<Prepared> {
        let sanitized = self.sanitizer.sanitize(&request.question);
        if let Some(reason) = &sanitized.rejection_reason {
            logger.sanitization(false, sanitized.risk_score);
            return Ok(Prepared::Refused {
                kind: RefusalKind::Sanitization,
                detail: Some(reason.clone()),
            });
        }
        logger.sanitization(true, sanitized.risk_score);
        let question = sanitized.sanitized;

        // Anonymous requests bypass the cache: without a user identity,
        // a shared slot would leak one user's answer to everyone asking
        // the same question that day.
        let key = request
            .user_id
            .as_deref()
            .map(|user| CacheKey::build(user, &question, &request.scope));
        if let Some(key) = &key {
            if let Some(answer) = self.cache.get(key).await {
                debug!(key = %key, "serving cached answer");
                logger.cache_hit();
                return Ok(Prepared::Cached(answer));
            }
        }

        if !self.gate.is_relevant(&question) {
            return Ok(Prepared::Refused {
                kind: RefusalKind::OffTopic,
                detail: None,
            });
        }

        let candidates = self.fetcher.fetch(&request.scope).await?;
        if candidates.is_empty() {
            logger.counts(0, 0);
            return Ok(Prepared::Refused {
                kind: RefusalKind::NoArticles,
                detail: None,
            });
        }
        let candidate_count = candidates.len();

        let query_tokens = lexical::tokenize_query(&question);
        let ranked = lexical::rank(&query_tokens, candidates);

        let ensured = self.ensurer.ensure(ranked).await;
        if !ensured.iter().any(|d| d.embedding.is_some()) {
            logger.counts(candidate_count, 0);
            return Ok(Prepared::Refused {
                kind: RefusalKind::NoEmbeddedArticles,
                detail: None,
            });
        }

        let query_embedding = self.embedding_provider.embed(&question).await?;
        let selected = semantic::select_diverse(&query_embedding, &ensured);
        logger.counts(candidate_count, selected.len());

        let items = context::build_context(&selected);
        if !context::context_is_sufficient(&self.gate, &question, &items) {
            return Ok(Prepared::Refused {
                kind: RefusalKind::InsufficientContext,
                detail: None,
            });
        }

        Ok(Prepared::Ready {
            key,
            question,
            items,
        })
    }
}
