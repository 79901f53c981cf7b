// Candidate assessment: PDF ingestion, the evaluation service, persistence and HTTP handlers.
// The evaluator is built once in main and shared through AppState.

pub mod handlers;
pub mod pdf;
pub mod service;
pub mod store;
