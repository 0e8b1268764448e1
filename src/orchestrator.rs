//! The multi-hop question session.
//!
//! A session moves through [`SessionState`]s until the model decides to
//! finalize or the loop is cut short: after `max_hops` retrieval passes, after
//! `max_stagnant_iterations` passes that only reproduce a context already seen
//! this session, on an expansion onto the entity set just searched, or on an
//! undecidable answer. Every model and graph call is bounded by a timeout and
//! retried here, and only here, when the failure is transient.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{Config, ExtractionMode, FallbackStrategy, OrchestratorConfig, UndecidedPolicy};
use crate::context::RetrievalContext;
use crate::decision::{Decision, DecisionEngine, DecisionOutcome, Operation, ParsePath};
use crate::embeddings::Embedder;
use crate::error::{ErrorKind, KgragError, Result};
use crate::extraction::{EntityExtractor, EntityMention};
use crate::graph::{GraphStore, Language, NodeLabel};
use crate::llm::LanguageModel;
use crate::search::{Bm25Retriever, StructuredResult, StructuredRetriever, UnstructuredRetriever, VectorRetriever};

/// Where a session currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Extracting,
    Retrieving,
    Deciding,
    /// Next pass searches the given neighbours; context is kept
    Expanding(Vec<EntityMention>),
    /// Revised mentions; empty means extract again
    Refining(Vec<EntityMention>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model chose to finalize
    Finalized,
    HopCeiling,
    Stagnated,
    Undecided,
}

/// What happened during one retrieval pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HopRecord {
    pub hop: usize,
    pub mentions: Vec<String>,
    pub structured_entities: usize,
    pub fallback_entities: usize,
    /// Context size after the pass
    pub context_len: usize,
    pub decision: Option<Decision>,
    pub parse_path: Option<ParsePath>,
}

/// Result of one session, handed to answer synthesis.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub question: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub context_text: String,
    pub entities: Vec<String>,
    pub edges: Vec<String>,
    pub node_ids: Vec<String>,
    pub hops: usize,
    pub finish_reason: FinishReason,
    pub trace: Vec<HopRecord>,
}

/// Knobs of the hop loop, gathered from several config sections.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub language: Language,
    pub extraction_mode: ExtractionMode,
    pub structured_k: usize,
    pub retrievable_labels: Vec<NodeLabel>,
    pub min_structured_entities: usize,
    pub orchestrator: OrchestratorConfig,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            language: config.language(),
            extraction_mode: config.llm.extraction_mode,
            structured_k: config.retrieval.structured_k,
            retrievable_labels: config.retrieval.retrievable_labels.clone(),
            min_structured_entities: config.retrieval.min_structured_entities,
            orchestrator: config.orchestrator.clone(),
        }
    }
}

/// Drives question sessions. Cheap to share: sessions keep their own state,
/// so one `HopLoop` may serve many concurrent questions.
pub struct HopLoop {
    extractor: EntityExtractor,
    structured: StructuredRetriever,
    fallback: Option<Arc<dyn UnstructuredRetriever>>,
    decider: DecisionEngine,
    settings: LoopSettings,
}

impl HopLoop {
    pub fn new(model: Arc<dyn LanguageModel>, store: Arc<dyn GraphStore>, settings: LoopSettings) -> Self {
        Self {
            extractor: EntityExtractor::new(Arc::clone(&model), settings.extraction_mode),
            structured: StructuredRetriever::new(store, settings.retrievable_labels.clone(), settings.structured_k),
            fallback: None,
            decider: DecisionEngine::new(model),
            settings,
        }
    }

    /// Build with the fallback named in `[retrieval]`. The vector fallback
    /// needs an embedder.
    pub fn from_config(
        config: &Config,
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn GraphStore>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self> {
        let r = &config.retrieval;
        let fallback: Option<Arc<dyn UnstructuredRetriever>> = match r.fallback {
            FallbackStrategy::None => None,
            FallbackStrategy::Bm25 => Some(Arc::new(Bm25Retriever::new(
                Arc::clone(&store),
                config.language(),
                r.bm25_k,
            ))),
            FallbackStrategy::Vector => {
                let embedder = embedder.ok_or_else(|| {
                    KgragError::Config("vector fallback requires an embedding model".to_string())
                })?;
                Some(Arc::new(VectorRetriever::new(
                    Arc::clone(&store),
                    embedder,
                    config.language(),
                    r.vector_label.clone(),
                    r.vector_threshold,
                    r.threshold_step,
                    r.vector_k,
                )))
            }
        };

        let hop_loop = Self::new(model, store, LoopSettings::from_config(config));
        Ok(match fallback {
            Some(fallback) => hop_loop.with_fallback(fallback),
            None => hop_loop,
        })
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn UnstructuredRetriever>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Timeout plus bounded retry with exponential backoff for transient errors.
    async fn call<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cfg = &self.settings.orchestrator;
        let timeout = Duration::from_secs(cfg.call_timeout_secs);
        let mut delay = Duration::from_millis(cfg.retry_backoff_ms);
        let mut attempt = 0;

        loop {
            let result = match tokio::time::timeout(timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(KgragError::Timeout(format!("{} exceeded {:?}", what, timeout))),
            };
            match result {
                Err(e) if e.is_transient() && attempt < cfg.max_io_retries => {
                    attempt += 1;
                    log::warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        what,
                        e,
                        attempt,
                        cfg.max_io_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                other => return other,
            }
        }
    }

    /// One structured pass plus the fallback when it comes back thin.
    async fn retrieve_pass(
        &self,
        question: &str,
        mentions: &[EntityMention],
        ctx: &mut RetrievalContext,
    ) -> Result<(usize, usize)> {
        let language = self.settings.language;
        let result = if mentions.is_empty() {
            StructuredResult::default()
        } else {
            self.call("structured retrieval", || self.structured.retrieve(mentions, language))
                .await?
        };
        let structured_added = ctx.absorb_structured(&result);

        let mut fallback_added = 0;
        if structured_added < self.settings.min_structured_entities {
            if let Some(fallback) = &self.fallback {
                let hits = self
                    .call("fallback retrieval", || fallback.retrieve(question))
                    .await?;
                fallback_added = ctx.absorb_fallback(&hits);
                log::debug!(
                    "{} fallback: {} hit(s), {} new entit(ies)",
                    fallback.name(),
                    hits.len(),
                    fallback_added
                );
            }
        }
        Ok((structured_added, fallback_added))
    }

    /// Run one question session to completion.
    pub async fn run(&self, question: &str) -> Result<SessionOutcome> {
        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        let cfg = &self.settings.orchestrator;
        log::info!("Session {} started: {:?}", session_id, question);

        let mut ctx = RetrievalContext::new();
        let mut state = SessionState::Extracting;
        let mut mentions: Vec<EntityMention> = Vec::new();
        let mut trace: Vec<HopRecord> = Vec::new();
        let mut hops = 0;
        let mut stagnant = 0;
        let mut seen_contexts: HashSet<u64> = HashSet::new();

        let finish_reason = loop {
            state = match state {
                SessionState::Extracting => {
                    mentions = match self.call("entity extraction", || self.extractor.extract(question)).await {
                        Ok(mentions) => mentions,
                        Err(e) if e.kind() == ErrorKind::Parse => {
                            log::warn!("Session {}: extraction unreadable ({}), using fallback only", session_id, e);
                            Vec::new()
                        }
                        Err(e) if e.kind() == ErrorKind::EmptyResult => {
                            log::debug!("Session {}: {}, using fallback only", session_id, e);
                            Vec::new()
                        }
                        Err(e) => return Err(e),
                    };
                    SessionState::Retrieving
                }

                SessionState::Retrieving => {
                    hops += 1;
                    let (structured_entities, fallback_entities) =
                        self.retrieve_pass(question, &mentions, &mut ctx).await?;
                    trace.push(HopRecord {
                        hop: hops,
                        mentions: mentions.iter().map(EntityMention::render).collect(),
                        structured_entities,
                        fallback_entities,
                        context_len: ctx.len(),
                        decision: None,
                        parse_path: None,
                    });

                    // a context seen before, even hops ago, is not progress
                    if seen_contexts.insert(ctx.fingerprint()) {
                        stagnant = 0;
                    } else {
                        stagnant += 1;
                        log::debug!("Session {}: context already seen ({} in a row)", session_id, stagnant);
                    }

                    if stagnant >= cfg.max_stagnant_iterations {
                        log::warn!("Session {}: no progress, forcing finalize", session_id);
                        break FinishReason::Stagnated;
                    }
                    if hops >= cfg.max_hops {
                        log::warn!("Session {}: hop ceiling {} reached, forcing finalize", session_id, cfg.max_hops);
                        break FinishReason::HopCeiling;
                    }
                    SessionState::Deciding
                }

                SessionState::Deciding => {
                    let keywords: Vec<String> = mentions.iter().map(EntityMention::render).collect();
                    let contexts = ctx.render();
                    let outcome = self
                        .call("decision", || self.decider.decide(question, &keywords, &contexts))
                        .await?;

                    let (decision, path) = match outcome {
                        DecisionOutcome::Decided { decision, path } => (decision, path),
                        DecisionOutcome::Undecided { raw } => match cfg.on_undecided {
                            UndecidedPolicy::Finalize => {
                                log::warn!("Session {}: undecided, finalizing with current context", session_id);
                                break FinishReason::Undecided;
                            }
                            UndecidedPolicy::Abort => {
                                return Err(KgragError::Parse(format!(
                                    "undecidable model answer: {}",
                                    raw.chars().take(200).collect::<String>()
                                )));
                            }
                        },
                    };

                    if let Some(record) = trace.last_mut() {
                        record.decision = Some(decision.clone());
                        record.parse_path = Some(path);
                    }
                    log::debug!(
                        "Session {} hop {}: {:?} ({}) {:?}",
                        session_id,
                        hops,
                        decision.operation,
                        decision.reason,
                        decision.parameters
                    );

                    let next = EntityMention::parse_all(&decision.parameters);
                    match decision.operation {
                        Operation::Finalize => break FinishReason::Finalized,
                        Operation::ExpandHop => {
                            let next: Vec<EntityMention> = if next.is_empty() { mentions.clone() } else { next };
                            if next == mentions {
                                log::warn!(
                                    "Session {}: expansion repeats the entity set just searched, forcing finalize",
                                    session_id
                                );
                                break FinishReason::Stagnated;
                            }
                            SessionState::Expanding(next)
                        }
                        Operation::RefineEntities => SessionState::Refining(next),
                    }
                }

                SessionState::Expanding(next) => {
                    mentions = next;
                    SessionState::Retrieving
                }

                SessionState::Refining(next) => {
                    if cfg.refine_discards_context {
                        ctx.discard();
                    }
                    if next.is_empty() {
                        SessionState::Extracting
                    } else {
                        mentions = next;
                        SessionState::Retrieving
                    }
                }
            };
        };

        let outcome = SessionOutcome {
            session_id,
            question: question.to_string(),
            started_at,
            finished_at: Utc::now(),
            context_text: ctx.render(),
            entities: ctx.entities().to_vec(),
            edges: ctx.edges().to_vec(),
            node_ids: ctx.node_ids().to_vec(),
            hops,
            finish_reason,
            trace,
        };
        log::info!(
            "Session {} finished after {} hop(s): {:?}, {} entities, {} edges",
            session_id,
            hops,
            finish_reason,
            outcome.entities.len(),
            outcome.edges.len()
        );
        Ok(outcome)
    }
}
