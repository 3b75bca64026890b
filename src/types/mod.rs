mod schema;
mod value;

pub use schema::{Column, Schema};
pub use value::{DataType, Row, Value};
