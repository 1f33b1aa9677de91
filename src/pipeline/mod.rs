pub mod extraction;
pub mod context;
pub mod structuring;
pub mod normalize;
pub mod mapping;
pub mod workbook;
pub mod processor;

pub use processor::{
    build_pipeline, Pipeline, PipelineError, PipelineFailure, PipelineState, StageObserver,
    TracingObserver,
};
