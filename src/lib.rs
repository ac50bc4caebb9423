pub mod error;
pub mod exec;
pub mod query;
pub mod schema;
pub mod sql;
pub mod types;

pub use error::{GridError, GridResult};
