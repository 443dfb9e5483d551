// src/example/mod.rs
// ============================================================================
// EXAMPLE - Registro estructurado de salida (tf.train.Example)
// ============================================================================

pub mod builder;
pub mod detection;
pub mod features;

pub use builder::{normalize, BuildOutcome, ExampleBuilder, ImageDimensions, SkipReason};
pub use detection::{keys, DetectionExample};
pub use features::{Example, Feature};
