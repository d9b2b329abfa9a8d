pub mod core;
pub mod db;
pub mod engine;
pub mod models;
pub mod text;
pub mod toolkit;
pub mod utils;

pub use utils::safe_truncate;


pub use core::config::EngineConfig;
pub use core::error::{NewsrecError, Result};
pub use db::{MemoryStore, Snapshot, Store, StoreError};
pub use engine::NewsrecEngine;
pub use models::{Article, ArticleTag, EventType, Tag, User, UserEvent, UserTagWeight};


pub const DEFAULT_TOP_K: usize = 10;


pub const CONFIG_PATH_ENV: &str = "NEWSREC_CONFIG";
