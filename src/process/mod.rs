pub mod csv_processor;
pub mod transform;
pub mod utils;

pub use csv_processor::{transform_csv, transform_file, write_canonical_csv, TransformSummary};
pub use transform::{transform_record, RawRecord, TransformedRecord, Value};
