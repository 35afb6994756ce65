pub mod generation;
pub mod orchestrator;
pub mod retrieval;
pub mod state;

pub use generation::{AnswerGenerator, ExtractiveGenerator};
pub use orchestrator::AnswerPipeline;
pub use retrieval::{InMemoryRetriever, Retriever};
pub use state::{PipelineConfig, RunReport, StageReport};
