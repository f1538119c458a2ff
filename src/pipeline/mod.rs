// Analysis pipeline — one request-scoped run, narrated as an event stream.

pub mod result;
pub mod run;
pub mod stream;

pub use result::{AnalysisResult, TopicResult};
pub use run::{AnalyzeRequest, Pipeline, PipelineConfig};
pub use stream::{Progress, Stage, StreamEvent};
