// src/lib.rs
// ============================================================================
// LISA-RECORD - Conversor del dataset LISA a TFRecord por shards
// ============================================================================

pub mod annotation;
pub mod config;
pub mod error;
pub mod example;
pub mod labelmap;
pub mod pipeline;
pub mod tfrecord;
pub mod walker;

// Re-exports principales
pub use annotation::{FrameRecord, RawBox};
pub use config::{ConvertConfig, NUM_SHARDS};
pub use error::{ConvertError, Result};
pub use example::{BuildOutcome, DetectionExample, ExampleBuilder, ImageDimensions, SkipReason};
pub use labelmap::LabelMap;
pub use pipeline::{convert, BuildStats, RunSummary};
pub use tfrecord::{RecordReader, ShardSet};
pub use walker::annotated_dirs;
