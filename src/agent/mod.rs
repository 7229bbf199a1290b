//! Text-to-SQL retrieval agent.
//!
//! [`RetrievalAgent::ask`] turns a question into an [`AgentResponse`]:
//! - [`QuerySynthesizer`] writes a candidate query from the question, the
//!   schema catalog and the earlier attempts
//! - [`QueryExecutor`] runs it read-only
//! - [`ResponseSynthesizer`] writes the answer from the final result
//!
//! The loop between them is the state machine in [`state`].

pub mod format;
pub mod prompts;
pub mod responder;
pub mod state;
pub mod synthesizer;

pub use responder::ResponseSynthesizer;
pub use state::{AgentEvent, AgentState, RetryPolicy};
pub use synthesizer::QuerySynthesizer;

use crate::catalog::SchemaCatalog;
use crate::config::AgentSettings;
use crate::db::{DbPool, QueryExecutor};
use crate::error::SynthesisError;
use crate::llm::TextGenerator;
use crate::models::{AgentResponse, Answer, Attempt, CandidateQuery, Outcome, Question};
use state::{InvalidTransition, ResultKind, transition};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Retrieval agent for one store, catalog and generator.
///
/// Cheap to share: wrap it in an `Arc` and call [`ask`](Self::ask) from as
/// many tasks as needed. Requests do not share any state.
#[derive(Debug, Clone)]
pub struct RetrievalAgent {
    catalog: Arc<SchemaCatalog>,
    synthesizer: QuerySynthesizer,
    executor: QueryExecutor,
    responder: ResponseSynthesizer,
    policy: RetryPolicy,
}

/// Per-request scratch space for the side effects of each state.
#[derive(Default)]
struct Run {
    attempts: Vec<Attempt>,
    pending: Option<CandidateQuery>,
    synthesis_error: Option<SynthesisError>,
    answer: Option<Answer>,
}

impl RetrievalAgent {
    pub fn new(
        pool: DbPool,
        catalog: Arc<SchemaCatalog>,
        generator: Arc<dyn TextGenerator>,
        settings: &AgentSettings,
    ) -> Self {
        let db_type = pool.db_type();
        let executor = QueryExecutor::new(pool, &catalog)
            .with_timeout(settings.query_timeout)
            .with_row_limit(settings.row_limit);
        let synthesizer = QuerySynthesizer::new(
            generator.clone(),
            catalog.clone(),
            db_type,
            settings.repeat_reprompts,
        );
        let responder = ResponseSynthesizer::new(generator, settings.prompt_rows);

        Self {
            catalog,
            synthesizer,
            executor,
            responder,
            policy: RetryPolicy {
                max_attempts: settings.max_attempts.max(1),
                empty_result_retries: settings.empty_result_retries,
            },
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Answer `question`. Never fails: errors end in [`Outcome::Failed`].
    pub async fn ask(&self, question: impl AsRef<str>) -> AgentResponse {
        let request_id = Uuid::new_v4();
        let question = Question::new(question);

        if question.is_empty() {
            return AgentResponse {
                request_id,
                question,
                outcome: Outcome::Failed {
                    reason: "The question is empty.".to_string(),
                },
                attempts: Vec::new(),
            };
        }

        info!(%request_id, question = %question, "Answering question");

        let mut run = Run::default();
        let mut state = AgentState::initial();

        while !state.is_terminal() {
            let event = self.step(state, &question, &mut run).await;
            state = match transition(state, event, &self.policy) {
                Ok(next) => next,
                Err(e) => return internal_failure(request_id, question, run, e),
            };
        }

        let outcome = match (state, run.answer, run.synthesis_error) {
            (AgentState::Done, Some(answer), _) => Outcome::Done { answer },
            (_, _, Some(e)) => Outcome::Failed {
                reason: e.user_reason(),
            },
            _ => Outcome::Failed {
                reason: "The request ended without an answer.".to_string(),
            },
        };

        match &outcome {
            Outcome::Done { answer } => info!(
                %request_id,
                attempts = run.attempts.len(),
                records = answer.record_count,
                "Question answered"
            ),
            Outcome::Failed { reason } => warn!(
                %request_id,
                attempts = run.attempts.len(),
                reason = %reason,
                "Question could not be answered"
            ),
        }

        AgentResponse {
            request_id,
            question,
            outcome,
            attempts: run.attempts,
        }
    }

    /// Perform the side effect of `state` and report what happened.
    async fn step(&self, state: AgentState, question: &Question, run: &mut Run) -> AgentEvent {
        match state {
            AgentState::Synthesizing(progress) => {
                match self
                    .synthesizer
                    .synthesize(question, &run.attempts, progress.attempt())
                    .await
                {
                    Ok(query) => {
                        run.pending = Some(query);
                        AgentEvent::QueryReady
                    }
                    Err(e) => {
                        warn!(attempt = progress.attempt(), error = %e, "Query synthesis failed");
                        run.synthesis_error = Some(e);
                        AgentEvent::SynthesisFailed
                    }
                }
            }
            AgentState::Executing(_) => {
                let Some(query) = run.pending.take() else {
                    // Executing is only entered after QueryReady
                    return AgentEvent::Advance;
                };
                let started = Instant::now();
                let result = self.executor.execute(&query).await;
                let kind = ResultKind::of(&result);
                run.attempts.push(Attempt {
                    query,
                    result,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
                AgentEvent::Executed(kind)
            }
            AgentState::Evaluating(..) | AgentState::Retrying(_) => AgentEvent::Advance,
            AgentState::Responding => {
                let Some(last) = run.attempts.last() else {
                    return AgentEvent::Advance;
                };
                run.answer = Some(self.responder.respond(question, &last.result).await);
                AgentEvent::Responded
            }
            AgentState::Done | AgentState::Failed => AgentEvent::Advance,
        }
    }
}

fn internal_failure(
    request_id: Uuid,
    question: Question,
    run: Run,
    err: InvalidTransition,
) -> AgentResponse {
    error!(%request_id, error = %err, "Agent state machine error");
    AgentResponse {
        request_id,
        question,
        outcome: Outcome::Failed {
            reason: "Internal error while answering the question.".to_string(),
        },
        attempts: run.attempts,
    }
}
