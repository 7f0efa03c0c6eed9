//! Impactarea Processor - Impacted area use case
//!
//! This crate orchestrates one impacted area computation: input validation,
//! imagery lookup, the calculator, the area summary and the optional export.

pub mod backends;
pub mod pipeline;
pub mod settings;

pub use backends::{Backends, Imagery, PlatformBackends, Reference};
pub use pipeline::{ImpactedAreasProcessor, ProcessRequest};
pub use settings::ProcessorSettings;
