//! Offline hybrid search core
//!
//! An in-process hybrid (semantic + fuzzy + keyword) search engine: an HNSW
//! graph index over unit-norm dense vectors, a float32/float16/int8
//! quantized vector store, an LRU embedding cache, a hybrid ranker, and a
//! background update queue that batches insertions off the caller's
//! critical path. All state lives in-process; no network calls are made at
//! query time.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hybrid_search_core::config::EngineConfig;
//! use hybrid_search_core::embedder::TestEmbedder;
//! use hybrid_search_core::engine::Engine;
//! use hybrid_search_core::item::Item;
//!
//! # async fn run() -> hybrid_search_core::error::Result<()> {
//! let items = vec![
//!     Item::new("1", "Bathroom floor cleaner"),
//!     Item::new("2", "USB-C phone charger cable"),
//! ];
//!
//! let mut engine = Engine::build(
//!     items,
//!     EngineConfig::new(32, "test-model"),
//!     TestEmbedder { dimensions: 32 },
//! )
//! .await?;
//!
//! let results = engine
//!     .search("phone charger", &Default::default(), None)
//!     .await?;
//! # let _ = results;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod hnsw;
pub mod item;
pub mod logging;
pub mod quantization;
pub mod ranker;
pub mod similarity;
pub mod updater;
pub mod vector;

pub use config::{EngineConfig, SearchOptions, Weights};
pub use embedder::{EmbedError, Embedder};
pub use engine::{Engine, EngineSnapshot, IndexInfo, SearchResultItem};
pub use error::{CoreError, Result};
pub use item::{Item, MetadataFilter};
pub use logging::{init_from_env, init_logging, LogConfig};
pub use updater::{BackgroundUpdater, UpdaterConfig, UpdaterStats};
pub use vector::Vector;
