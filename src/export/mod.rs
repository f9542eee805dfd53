//! Measurement records, CSV export and per-model evaluation.

pub mod csv;
pub mod evaluation;
pub mod records;

pub use csv::{CSV_HEADER, export_csv, write_csv};
pub use evaluation::{ModelEvaluation, evaluate};
pub use records::{MeasurementRecord, MeasurementRecorder};
