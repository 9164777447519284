//! Write [`ResultTable`](crate::result::ResultTable)s as CSV files.
//!
//! Rows go through a typed Arrow [`RecordBatch`](arrow::record_batch::RecordBatch)
//! first so numbers, booleans and timestamps are rendered consistently
//! regardless of how the warehouse spelled them on the wire.

mod error;
pub(crate) mod schema;
pub(crate) mod builders;
mod writer;


pub use error::CsvError;
pub use writer::{result_to_record_batch, write_csv, write_csv_bytes};
