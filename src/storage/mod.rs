pub mod memory;
pub mod pagination;
pub mod postgres;
pub mod seed;
pub mod traits;

pub use memory::MemoryStore;
pub use pagination::{Cursor, Direction, Page, PageRequest};
pub use postgres::PgStore;
pub use traits::{RulesetFilter, Store};
