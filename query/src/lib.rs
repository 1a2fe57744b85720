//! Tenant-scoped dynamic querying for the billing admin.
//!
//! Two paths share one allow-list discipline:
//! - filter trees, compiled either to a parameterized SQL predicate
//!   ([`relational`]) or to an in-process record predicate ([`evaluator`]),
//!   both driven by the same resolved [`plan`];
//! - the admin ad-hoc path: a flat SELECT builder ([`assembler`]) and a
//!   guarded raw-SQL check ([`raw_sql`]).
//!
//! Nothing here performs I/O. Execution belongs to the caller.

pub mod assembler;
pub mod error;
pub mod evaluator;
pub mod plan;
pub mod raw_sql;
pub mod registry;
pub mod relational;
pub mod selector;
pub mod tree;
pub mod value;

pub use assembler::{assemble, AdHocOperator, QueryLimits, QuerySpec, SpecFilter};
pub use error::{FilterIssue, QueryError, SelectorTarget};
pub use evaluator::{predicate, RecordFilter};
pub use raw_sql::RawSqlGuard;
pub use registry::{
    all_resources, fields_for, schema_for, FieldDef, FieldType, Operator, Resource, ResourceSchema,
};
pub use relational::{compile, CompiledPredicate, SortDirection, SortSpec};
pub use selector::{allowed_tables, select_table, TableAllowList};
pub use tree::{FilterCond, FilterGroup, FilterNode, Logical};
pub use value::{SqlValue, Statement};
