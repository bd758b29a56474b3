pub mod io;
pub mod schema;
pub mod table;

pub use table::{Column, SurveyTable, TableError};
