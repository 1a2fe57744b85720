pub mod adhoc;
pub mod filters;
pub mod rows;
pub mod types;

pub use adhoc::RawQueryResult;
pub use filters::{filter_loaded, FilteredPage};
pub use types::Database;

#[cfg(test)]
pub mod test_helpers;
