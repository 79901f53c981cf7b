// Evaluator pipeline: role graph, conversation context and the handoff orchestrator.
// Model calls go through llm_client via `executor`; nothing here parses scores.

pub mod capability;
pub mod context;
pub mod executor;
pub mod orchestrator;
pub mod prompts;
pub mod roles;
pub mod topology;
