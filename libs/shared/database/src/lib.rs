pub mod postgrest;
pub mod query;

pub use postgrest::PostgrestClient;
pub use query::{Direction, FilterValue, Op, TableQuery};
