pub mod assessment;
pub mod classifier;
pub mod decoder;
pub mod error;
pub mod normalizer;
pub mod pipeline;
#[cfg(feature = "torch")]
pub mod torch;

pub use assessment::ClassSet;
pub use classifier::ClassifierHandle;
pub use error::{ErrorClass, PipelineError};
pub use pipeline::InspectionPipeline;
