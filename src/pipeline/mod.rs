// Cleaning pipeline: the in-memory table and the transformations applied to it

pub mod processing;
pub mod table;

pub use table::{Column, ColumnType, Row, Table, Value};
