//! Calibration pipeline services
//!
//! Leaf first: completion client, topic architect, probe generator,
//! evaluator, repair tutor, and the pipeline that composes them.

pub mod calibration;
pub mod completion;
pub mod evaluator;
pub mod probe_generator;
pub mod repair_tutor;
pub mod topic_architect;

pub use calibration::{CalibrationPipeline, PipelineSettings, Report};
pub use completion::{CompletionClient, CompletionError, GeminiClient};
pub use evaluator::Evaluation;
pub use topic_architect::ArchitectOutcome;
