//! Sled 持久化

mod render_cache;

pub use render_cache::{SledCacheConfig, SledRenderCache};
