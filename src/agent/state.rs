//! Retrieval agent state machine.
//!
//! ```text
//! Synthesizing -> Executing -> Evaluating -> Retrying -> Synthesizing
//!      |                           |
//!      v                           v
//!    Failed                    Responding -> Done
//! ```
//!
//! [`transition`] is pure: the agent performs the side effect for the current
//! state, reports what happened as an [`AgentEvent`], and moves to whatever
//! state `transition` returns.

use crate::config::{DEFAULT_EMPTY_RESULT_RETRIES, DEFAULT_MAX_ATTEMPTS};
use crate::models::ExecutionResult;
use thiserror::Error;

/// Bounds on how often the agent goes back to synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total synthesize/execute rounds, including the first
    pub max_attempts: u32,
    /// Empty results that may trigger a broadened retry
    pub empty_result_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            empty_result_retries: DEFAULT_EMPTY_RESULT_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// True if a round after `round` (0-based) is still allowed.
    pub fn has_attempts_after(&self, round: u32) -> bool {
        round.saturating_add(1) < self.max_attempts
    }
}

/// Shape of an execution result, as far as the state machine cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Rows,
    Empty,
    Failure,
}

impl ResultKind {
    pub fn of(result: &ExecutionResult) -> Self {
        match result {
            ExecutionResult::Rows(rows) if rows.is_empty() => Self::Empty,
            ExecutionResult::Rows(_) => Self::Rows,
            ExecutionResult::Failure(_) => Self::Failure,
        }
    }
}

/// Per-request counters carried by the non-terminal states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// 0-based round; the attempt number shown to users is `round + 1`
    pub round: u32,
    /// Broadened retries already spent on empty results
    pub empty_retries: u32,
}

impl Progress {
    pub fn attempt(&self) -> u32 {
        self.round + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Synthesizing(Progress),
    Executing(Progress),
    Evaluating(Progress, ResultKind),
    Retrying(Progress),
    Responding,
    Done,
    Failed,
}

impl AgentState {
    pub fn initial() -> Self {
        Self::Synthesizing(Progress::default())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Synthesizing(_) => "synthesizing",
            Self::Executing(_) => "executing",
            Self::Evaluating(..) => "evaluating",
            Self::Retrying(_) => "retrying",
            Self::Responding => "responding",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent {
    /// The synthesizer produced a candidate query
    QueryReady,
    /// The synthesizer gave up
    SynthesisFailed,
    /// The candidate query ran
    Executed(ResultKind),
    /// Move on from a state that needs no side effect
    Advance,
    /// The answer was written
    Responded,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("event {event:?} is not valid in state '{state}'")]
pub struct InvalidTransition {
    pub state: &'static str,
    pub event: AgentEvent,
}

/// Compute the next state.
pub fn transition(
    state: AgentState,
    event: AgentEvent,
    policy: &RetryPolicy,
) -> Result<AgentState, InvalidTransition> {
    use AgentEvent::*;
    use AgentState::*;

    let next = match (state, event) {
        (Synthesizing(p), QueryReady) => Executing(p),
        (Synthesizing(_), SynthesisFailed) => Failed,
        (Executing(p), Executed(kind)) => Evaluating(p, kind),
        (Evaluating(_, ResultKind::Rows), Advance) => Responding,
        (Evaluating(p, ResultKind::Empty), Advance) => {
            if policy.has_attempts_after(p.round) && p.empty_retries < policy.empty_result_retries
            {
                Retrying(Progress {
                    empty_retries: p.empty_retries + 1,
                    ..p
                })
            } else {
                Responding
            }
        }
        (Evaluating(p, ResultKind::Failure), Advance) => {
            if policy.has_attempts_after(p.round) {
                Retrying(p)
            } else {
                Responding
            }
        }
        (Retrying(p), Advance) => Synthesizing(Progress {
            round: p.round + 1,
            ..p
        }),
        (Responding, Responded) => Done,
        (state, event) => {
            return Err(InvalidTransition {
                state: state.name(),
                event,
            });
        }
    };
    Ok(next)
}
