//! SQLite Persistence - SQLite 数据库持久化实现

mod content_store;
mod database;
mod profile_store;

pub use content_store::*;
pub use database::*;
pub use profile_store::*;
