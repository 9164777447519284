pub mod client;
pub mod csv;
pub mod export_step;
pub mod response;
pub mod result;

pub use client::{QueryRunner, WarehouseClient, WarehouseError};
pub use csv::{result_to_record_batch, write_csv, write_csv_bytes, CsvError};
pub use export_step::{ExportStep, ExportStepError, StepOutput};
pub use result::{Column, QueryMetadata, ResultTable};
