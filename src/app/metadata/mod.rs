//! Metadata store for tracked dataset freshness
//!
//! The store exclusively owns the on-disk metadata document. Loading never
//! fails: an absent, unreadable or wrong-version document is replaced by the
//! built-in default, and the caller is told that no trustworthy history
//! existed. Saving replaces the whole file through a temp file + rename.
//!
//! # Examples
//!
//! ```rust,no_run
//! use csv_mirror::app::metadata::MetadataStore;
//! use csv_mirror::app::models::DatasetSource;
//!
//! # async fn example() {
//! let store = MetadataStore::new("/tmp/mirror/csv_meta.json", DatasetSource::default_sources());
//! let loaded = store.load().await;
//! if !loaded.existed_at_start {
//!     println!("No usable metadata, every file will be downloaded again");
//! }
//! if let Err(e) = store.save(&loaded.document).await {
//!     eprintln!("Could not persist metadata: {}", e);
//! }
//! # }
//! ```

pub mod store;

pub use store::{LoadedMetadata, MetadataStore};
