pub mod change;
pub mod column;
pub mod descriptor;
pub mod field_key;
pub mod foreign_key;
pub mod table;

pub use change::{ChangeOp, ColumnSpec, ConstraintSpec, IndexSpec, TableChange};
pub use column::{ColumnInfo, WrappedColumn};
pub use descriptor::{ColumnDescriptor, TableDescriptor};
pub use field_key::FieldKey;
pub use foreign_key::{ForeignKey, LookupResolver};
pub use table::{ColumnResolver, TableInfo, TableSource};
