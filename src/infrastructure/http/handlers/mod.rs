//! HTTP Handlers

mod cache;
mod ping;
mod speech;

pub use cache::*;
pub use ping::*;
pub use speech::*;
