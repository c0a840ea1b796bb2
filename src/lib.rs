//! # docshelf
//!
//! Aggregates documentation from heterogeneous sources into a searchable,
//! normalized collection.
//!
//! The core is an ingestion-and-search pipeline: sources are crawled
//! (file discovery with filtering and change detection), multi-format
//! content is extracted into a normalized document model, everything is
//! persisted in SQLite, and an in-memory fuzzy index serves weighted,
//! filterable search with highlighting and similarity lookup.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌──────────┐   ┌─────────┐
//! │ Crawler │──▶│ Extractor │──▶│  SQLite  │──▶│  Index  │
//! │ walkdir │   │ md/html/  │   │  Store   │   │  fuzzy  │
//! │ + globs │   │ pdf/json  │   │          │   │  search │
//! └─────────┘   └───────────┘   └────┬─────┘   └────┬────┘
//!                                    │              │
//!                                    └──────┬───────┘
//!                                           ▼
//!                                       ┌───────┐
//!                                       │ Shelf │  (CLI: `shelf`)
//!                                       └───────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Multi-format content extraction |
//! | [`crawler`] | Source tree walking and ingestion |
//! | [`store`] | SQLite persistence |
//! | [`index`] | In-memory fuzzy search |
//! | [`service`] | Top-level context object (`Shelf`) |
//! | [`error`] | Core error taxonomy |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod crawler;
pub mod db;
pub mod error;
pub mod extract;
pub mod index;
pub mod migrate;
pub mod models;
pub mod service;
pub mod store;
