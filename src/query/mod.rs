pub mod aggregate;
pub mod filter;
pub mod sort;

pub use aggregate::{Aggregate, AggregateKind, AggregateResult};
pub use filter::{Clause, CompareOp, SimpleFilter};
pub use sort::{Sort, SortDirection, SortField};
