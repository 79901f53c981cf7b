//! Evaluation service: one orchestrated run plus extraction per candidate.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::extraction::{EvaluationRecord, Extractor};
use crate::pipeline::context::ConversationContext;
use crate::pipeline::orchestrator::{
    HandoffProtocolViolation, Orchestrator, OrchestratorError, RunStatus, TransitionEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Completed,
    Incomplete,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationStatus::Completed => "completed",
            EvaluationStatus::Incomplete => "incomplete",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutcome {
    pub record: EvaluationRecord,
    pub status: EvaluationStatus,
    pub transitions: Vec<TransitionEvent>,
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("candidate text is empty")]
    EmptyCandidate,

    #[error("job text is empty")]
    EmptyJob,

    #[error(transparent)]
    Protocol(#[from] HandoffProtocolViolation),

    #[error(transparent)]
    Orchestration(OrchestratorError),
}

impl From<OrchestratorError> for EvaluationError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::HandoffProtocolViolation(v) => EvaluationError::Protocol(v),
            other => EvaluationError::Orchestration(other),
        }
    }
}

pub struct Evaluator {
    orchestrator: Orchestrator,
    extractor: Extractor,
    entry_role: String,
    turn_budget: u32,
}

impl Evaluator {
    pub fn new(
        orchestrator: Orchestrator,
        extractor: Extractor,
        entry_role: impl Into<String>,
        turn_budget: u32,
    ) -> Self {
        Self {
            orchestrator,
            extractor,
            entry_role: entry_role.into(),
            turn_budget,
        }
    }

    pub async fn evaluate(
        &self,
        candidate_text: &str,
        job_text: &str,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        self.evaluate_streamed(candidate_text, job_text, None).await
    }

    /// Runs the role graph from the entry role and extracts a record from its
    /// output. A run that exhausts the turn budget still yields a record, flagged
    /// and marked `Incomplete`.
    pub async fn evaluate_streamed(
        &self,
        candidate_text: &str,
        job_text: &str,
        events: Option<&UnboundedSender<TransitionEvent>>,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        if candidate_text.trim().is_empty() {
            return Err(EvaluationError::EmptyCandidate);
        }
        if job_text.trim().is_empty() {
            return Err(EvaluationError::EmptyJob);
        }

        let context = ConversationContext::new(candidate_text, job_text);
        let run = self
            .orchestrator
            .run_streamed(&self.entry_role, context, self.turn_budget, events)
            .await?;

        let mut record = self
            .extractor
            .extract_run(&run.final_text, run.context.history());

        let status = match run.status {
            RunStatus::Terminated => EvaluationStatus::Completed,
            RunStatus::BudgetExhausted => {
                warn!(
                    "Evaluation stopped at '{}' after {} transitions (budget {})",
                    run.final_role,
                    run.trace.len(),
                    self.turn_budget
                );
                record.error_flag = true;
                EvaluationStatus::Incomplete
            }
        };

        info!(
            "Evaluation {}: overall {:.1} (skill {:.1}, cultural {:.1}), error_flag={}",
            status.as_str(),
            record.overall_score,
            record.skill_score,
            record.cultural_score,
            record.error_flag
        );

        Ok(EvaluationOutcome {
            record,
            status,
            transitions: run.trace,
        })
    }
}
