//! Handoff Orchestrator — drives one evaluation run over the role graph.
//!
//! State machine: the current role executes on the context; a declared handoff to a
//! permitted successor appends the output to history, emits a `TransitionEvent` and
//! moves on. No handoff ends the run (`Terminated`). When the accepted-handoff count
//! reaches the turn budget the run stops (`BudgetExhausted`) with the last output.
//! A handoff to anything outside the current role's successors aborts the run.
//!
//! Roles run strictly one at a time; each role's input depends on every prior output.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::pipeline::context::ConversationContext;
use crate::pipeline::roles::{RoleGraph, RoleSpec};

// ────────────────────────────────────────────────────────────────────────────
// Role execution boundary
// ────────────────────────────────────────────────────────────────────────────

/// What a role produced in one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleTurn {
    pub output: String,
    /// Name of the role this turn hands off to, if any.
    pub handoff: Option<String>,
}

impl RoleTurn {
    pub fn finish(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            handoff: None,
        }
    }

    pub fn handoff(output: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            handoff: Some(target.into()),
        }
    }
}

/// Runs a single role turn. Implemented by the model runtime; scripted in tests.
///
/// May be slow and non-deterministic. Timeouts and retries are the implementor's job.
#[async_trait]
pub trait RoleExecutor: Send + Sync {
    async fn execute(
        &self,
        role: &RoleSpec,
        successors: &[&str],
        context: &ConversationContext,
    ) -> anyhow::Result<RoleTurn>;
}

// ────────────────────────────────────────────────────────────────────────────
// Run results
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub source_role: String,
    pub target_role: String,
    /// 0-based position in the run's transition trace.
    pub sequence_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Terminated,
    BudgetExhausted,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub final_text: String,
    pub final_role: String,
    pub status: RunStatus,
    pub trace: Vec<TransitionEvent>,
    pub context: ConversationContext,
}

impl RunOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Terminated
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("role '{source_role}' handed off to '{requested_target}', permitted: [{}]", .permitted.join(", "))]
pub struct HandoffProtocolViolation {
    pub source_role: String,
    pub requested_target: String,
    pub permitted: Vec<String>,
    /// Transitions accepted before the violation.
    pub trace: Vec<TransitionEvent>,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("entry role '{0}' is not defined in the role graph")]
    UnknownEntryRole(String),

    #[error("turn budget must be at least 1")]
    ZeroTurnBudget,

    #[error("handoff protocol violation: {0}")]
    HandoffProtocolViolation(#[from] HandoffProtocolViolation),

    #[error("role '{role}' failed: {source}")]
    RoleExecution {
        role: String,
        #[source]
        source: anyhow::Error,
        trace: Vec<TransitionEvent>,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

/// Cheap to clone; the graph and executor are shared across concurrent runs.
#[derive(Clone)]
pub struct Orchestrator {
    graph: Arc<RoleGraph>,
    executor: Arc<dyn RoleExecutor>,
}

impl Orchestrator {
    pub fn new(graph: Arc<RoleGraph>, executor: Arc<dyn RoleExecutor>) -> Self {
        Self { graph, executor }
    }

    pub async fn run(
        &self,
        entry_role: &str,
        context: ConversationContext,
        turn_budget: u32,
    ) -> Result<RunOutcome, OrchestratorError> {
        self.run_streamed(entry_role, context, turn_budget, None)
            .await
    }

    /// Like `run`, additionally sending each accepted transition to `events` as it
    /// happens. A dropped receiver does not affect the run.
    pub async fn run_streamed(
        &self,
        entry_role: &str,
        mut context: ConversationContext,
        turn_budget: u32,
        events: Option<&UnboundedSender<TransitionEvent>>,
    ) -> Result<RunOutcome, OrchestratorError> {
        if turn_budget == 0 {
            return Err(OrchestratorError::ZeroTurnBudget);
        }
        let mut current = self
            .graph
            .lookup(entry_role)
            .ok_or_else(|| OrchestratorError::UnknownEntryRole(entry_role.to_string()))?;

        let mut trace: Vec<TransitionEvent> = Vec::new();
        let mut turns: u32 = 0;

        loop {
            let role = self.graph.get(current);
            let successors = self.graph.successor_names(current);
            debug!("Executing role '{}' (turn {})", role.name(), turns);

            let turn = match self.executor.execute(role, &successors, &context).await {
                Ok(turn) => turn,
                Err(source) => {
                    error!("Role '{}' failed: {source:#}", role.name());
                    return Err(OrchestratorError::RoleExecution {
                        role: role.name().to_string(),
                        source,
                        trace,
                    });
                }
            };

            let Some(target) = turn.handoff else {
                info!(
                    "Run terminated at role '{}' after {} transitions",
                    role.name(),
                    trace.len()
                );
                return Ok(RunOutcome {
                    final_text: turn.output,
                    final_role: role.name().to_string(),
                    status: RunStatus::Terminated,
                    trace,
                    context,
                });
            };

            let Some(next) = self.graph.permitted_successor(current, &target) else {
                error!(
                    "Role '{}' requested handoff to '{}', not among its successors",
                    role.name(),
                    target
                );
                return Err(HandoffProtocolViolation {
                    source_role: role.name().to_string(),
                    requested_target: target,
                    permitted: successors.iter().map(|s| s.to_string()).collect(),
                    trace,
                }
                .into());
            };

            context.append(role.name(), turn.output.clone());
            let event = TransitionEvent {
                source_role: role.name().to_string(),
                target_role: target,
                sequence_index: turns,
            };
            info!(
                "Handoff {} → {} (#{})",
                event.source_role, event.target_role, event.sequence_index
            );
            if let Some(tx) = events {
                let _ = tx.send(event.clone());
            }
            trace.push(event);
            turns += 1;

            if turns >= turn_budget {
                warn!("Turn budget of {turn_budget} exhausted before a terminal role");
                return Ok(RunOutcome {
                    final_text: turn.output,
                    final_role: role.name().to_string(),
                    status: RunStatus::BudgetExhausted,
                    trace,
                    context,
                });
            }
            current = next;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use crate::pipeline::capability::CapabilitySet;
    use crate::pipeline::roles::RoleGraphSpec;

    /// Replays canned turns per role and records what each role saw.
    #[derive(Default)]
    pub(crate) struct ScriptedExecutor {
        turns: Mutex<HashMap<String, VecDeque<RoleTurn>>>,
        pub calls: Mutex<Vec<(String, usize)>>,
    }

    impl ScriptedExecutor {
        pub(crate) fn script(self, role: &str, turn: RoleTurn) -> Self {
            self.turns
                .lock()
                .unwrap()
                .entry(role.to_string())
                .or_default()
                .push_back(turn);
            self
        }

        pub(crate) fn executed(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
        }
    }

    #[async_trait]
    impl RoleExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            role: &RoleSpec,
            _successors: &[&str],
            context: &ConversationContext,
        ) -> anyhow::Result<RoleTurn> {
            self.calls
                .lock()
                .unwrap()
                .push((role.name().to_string(), context.history().len()));
            self.turns
                .lock()
                .unwrap()
                .get_mut(role.name())
                .and_then(|q| q.pop_front())
                .ok_or_else(|| anyhow::anyhow!("no scripted turn left for {}", role.name()))
        }
    }

    fn graph(spec: RoleGraphSpec) -> Arc<RoleGraph> {
        Arc::new(RoleGraph::build(spec, &CapabilitySet::new()).unwrap())
    }

    fn two_cycle() -> Arc<RoleGraph> {
        graph(
            RoleGraphSpec::default()
                .role("A", "", &[], &["B"])
                .role("B", "", &[], &["A"]),
        )
    }

    fn ctx() -> ConversationContext {
        ConversationContext::new("cv text", "job text")
    }

    #[tokio::test]
    async fn test_chain_runs_until_terminal_role() {
        let graph = graph(
            RoleGraphSpec::default()
                .role("Main", "", &[], &["Skill"])
                .role("Skill", "", &[], &["Cultural"])
                .role("Cultural", "", &[], &["Summary"])
                .role("Summary", "", &[], &["Main"]),
        );
        let executor = Arc::new(
            ScriptedExecutor::default()
                .script("Main", RoleTurn::handoff("routing", "Skill"))
                .script("Skill", RoleTurn::handoff("skill 8/10", "Cultural"))
                .script("Cultural", RoleTurn::handoff("cultural 9/10", "Summary"))
                .script("Summary", RoleTurn::handoff("summary", "Main"))
                .script("Main", RoleTurn::finish("final synthesis")),
        );
        let orchestrator = Orchestrator::new(graph, executor.clone());

        let outcome = orchestrator.run("Main", ctx(), 10).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Terminated);
        assert!(outcome.is_complete());
        assert_eq!(outcome.final_text, "final synthesis");
        assert_eq!(outcome.final_role, "Main");
        assert_eq!(outcome.trace.len(), 4);
        let indices: Vec<u32> = outcome.trace.iter().map(|e| e.sequence_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(outcome.trace[3].source_role, "Summary");
        assert_eq!(outcome.trace[3].target_role, "Main");
        assert_eq!(outcome.context.history().len(), 4);
    }

    #[tokio::test]
    async fn test_later_roles_see_all_earlier_outputs() {
        let executor = Arc::new(
            ScriptedExecutor::default()
                .script("A", RoleTurn::handoff("a1", "B"))
                .script("B", RoleTurn::handoff("b1", "A"))
                .script("A", RoleTurn::finish("done")),
        );
        let orchestrator = Orchestrator::new(two_cycle(), executor.clone());
        orchestrator.run("A", ctx(), 10).await.unwrap();

        let calls = executor.calls.lock().unwrap().clone();
        let seen: Vec<usize> = calls.iter().map(|(_, n)| *n).collect();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_handoff_to_non_successor_aborts_without_running_target() {
        let graph = graph(
            RoleGraphSpec::default()
                .role("A", "", &[], &["B"])
                .role("B", "", &[], &[])
                .role("C", "", &[], &[]),
        );
        let executor = Arc::new(
            ScriptedExecutor::default()
                .script("A", RoleTurn::handoff("go to C", "C"))
                .script("C", RoleTurn::finish("should never run")),
        );
        let orchestrator = Orchestrator::new(graph, executor.clone());

        let err = orchestrator.run("A", ctx(), 10).await.unwrap_err();

        match err {
            OrchestratorError::HandoffProtocolViolation(v) => {
                assert_eq!(v.source_role, "A");
                assert_eq!(v.requested_target, "C");
                assert_eq!(v.permitted, vec!["B".to_string()]);
                assert!(v.trace.is_empty());
            }
            other => panic!("expected protocol violation, got {other:?}"),
        }
        assert_eq!(executor.executed(), vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn test_violation_preserves_trace_so_far() {
        let executor = Arc::new(
            ScriptedExecutor::default()
                .script("A", RoleTurn::handoff("a", "B"))
                .script("B", RoleTurn::handoff("b", "Nowhere")),
        );
        let orchestrator = Orchestrator::new(two_cycle(), executor);
        let err = orchestrator.run("A", ctx(), 10).await.unwrap_err();
        let OrchestratorError::HandoffProtocolViolation(v) = err else {
            panic!("expected protocol violation");
        };
        assert_eq!(v.trace.len(), 1);
        assert_eq!(v.trace[0].target_role, "B");
    }

    #[tokio::test]
    async fn test_two_cycle_halts_after_exactly_budget_transitions() {
        let mut executor = ScriptedExecutor::default();
        for i in 0..5 {
            executor = executor
                .script("A", RoleTurn::handoff(format!("a{i}"), "B"))
                .script("B", RoleTurn::handoff(format!("b{i}"), "A"));
        }
        let executor = Arc::new(executor);
        let orchestrator = Orchestrator::new(two_cycle(), executor.clone());

        let outcome = orchestrator.run("A", ctx(), 3).await.unwrap();

        assert_eq!(outcome.status, RunStatus::BudgetExhausted);
        assert!(!outcome.is_complete());
        assert_eq!(outcome.trace.len(), 3);
        assert_eq!(outcome.final_text, "a1");
        assert_eq!(executor.executed(), vec!["A", "B", "A"]);
    }

    #[tokio::test]
    async fn test_events_stream_matches_trace() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let executor = Arc::new(
            ScriptedExecutor::default()
                .script("A", RoleTurn::handoff("a", "B"))
                .script("B", RoleTurn::handoff("b", "A"))
                .script("A", RoleTurn::finish("end")),
        );
        let orchestrator = Orchestrator::new(two_cycle(), executor);

        let outcome = orchestrator
            .run_streamed("A", ctx(), 10, Some(&tx))
            .await
            .unwrap();
        drop(tx);

        let mut streamed = Vec::new();
        while let Some(event) = rx.recv().await {
            streamed.push(event);
        }
        assert_eq!(streamed, outcome.trace);
    }

    #[tokio::test]
    async fn test_unknown_entry_role_and_zero_budget_rejected() {
        let orchestrator = Orchestrator::new(two_cycle(), Arc::new(ScriptedExecutor::default()));
        assert!(matches!(
            orchestrator.run("Z", ctx(), 3).await,
            Err(OrchestratorError::UnknownEntryRole(name)) if name == "Z"
        ));
        assert!(matches!(
            orchestrator.run("A", ctx(), 0).await,
            Err(OrchestratorError::ZeroTurnBudget)
        ));
    }

    #[tokio::test]
    async fn test_executor_failure_propagates_with_partial_trace() {
        let executor = Arc::new(ScriptedExecutor::default().script("A", RoleTurn::handoff("a", "B")));
        let orchestrator = Orchestrator::new(two_cycle(), executor);

        let err = orchestrator.run("A", ctx(), 10).await.unwrap_err();
        match err {
            OrchestratorError::RoleExecution { role, trace, .. } => {
                assert_eq!(role, "B");
                assert_eq!(trace.len(), 1);
            }
            other => panic!("expected role execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_runs_share_one_graph() {
        let graph = two_cycle();
        let first = Orchestrator::new(
            graph.clone(),
            Arc::new(ScriptedExecutor::default().script("A", RoleTurn::finish("one"))),
        );
        let second = Orchestrator::new(
            graph,
            Arc::new(
                ScriptedExecutor::default()
                    .script("A", RoleTurn::handoff("x", "B"))
                    .script("B", RoleTurn::finish("two")),
            ),
        );

        let (a, b) = tokio::join!(first.run("A", ctx(), 5), second.run("A", ctx(), 5));
        assert_eq!(a.unwrap().final_text, "one");
        let b = b.unwrap();
        assert_eq!(b.final_text, "two");
        assert_eq!(b.trace.len(), 1);
    }
}
