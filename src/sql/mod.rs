//! SQL building blocks: composable fragments, dialect strategies, and the
//! quote-aware scanner they share.

pub mod dialect;
pub mod fragment;
pub mod lex;

pub use dialect::{PostgresDialect, SqlDialect};
pub use fragment::{ParamSlot, Parameter, SqlFragment};
