//! 存储适配器

mod file_storage;

pub use file_storage::FileAudioStore;
