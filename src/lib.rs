//! # recipebox
//!
//! A local-first recipe collection manager.
//!
//! recipebox extracts structured recipe data from a URL, persists each
//! recipe as a human-readable markdown file with a YAML frontmatter
//! header, and maintains a small SQLite index for listing and search.
//! The files are the single source of truth; the index is a derived,
//! rebuildable cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌───────────┐
//! │ Extractor │──▶│ File Store │──▶│  SQLite   │
//! │ (ld+json) │   │ <slug>.md  │   │  index    │
//! └───────────┘   └─────┬──────┘   └────┬──────┘
//!                       │  rebuild ▲    │
//!                       └──────────┘    │
//!                      ┌────────────────┤
//!                      ▼                ▼
//!                 ┌──────────┐    ┌──────────┐
//!                 │   CLI    │    │   HTTP   │
//!                 │  (rbox)  │    │  (JSON)  │
//!                 └──────────┘    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rbox init                                  # create database
//! rbox add https://example.com/best-curry    # extract and store
//! rbox search curry --tag dinner             # search the index
//! rbox rebuild                               # reindex from the files
//! rbox serve                                 # start the JSON API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed error taxonomy |
//! | [`slug`] | Slug and filename derivation |
//! | [`frontmatter`] | Recipe file format (header + body) |
//! | [`store`] | Canonical file store |
//! | [`index`] | Derived SQLite search index |
//! | [`extract`] | Recipe extraction from source pages |
//! | [`service`] | High-level operations over store + index |
//! | [`server`] | JSON HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod frontmatter;
pub mod index;
pub mod migrate;
pub mod models;
pub mod server;
pub mod service;
pub mod slug;
pub mod store;
