pub mod db;
pub mod memory;
pub mod ml;

pub use db::PgStore;
pub use memory::MemoryStore;
pub use ml::{FailingMlAdapter, FixedMlAdapter, HttpMlAdapter};
