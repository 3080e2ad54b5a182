pub mod household;
pub mod types;

pub use household::{column_names, position, SCHEMA};
pub use types::{Column, ColumnType};
