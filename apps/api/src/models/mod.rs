pub mod cv;
pub mod evaluation;
pub mod job;
