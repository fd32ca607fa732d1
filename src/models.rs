//! Core data models used throughout recipebox.
//!
//! These types represent the recipes, index projections, and reports that
//! flow between the file store, the search index, and the API surface.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Canonical recipe entity, round-tripped through the markdown file format.
///
/// `slug` doubles as the file basename; `source_url` is the duplicate
/// detection key. `created_at` is immutable after the first write,
/// `updated_at` is refreshed on any content change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub servings: Option<String>,
    pub source_url: String,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub total_time: Option<i64>,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Denormalized projection of recipe metadata stored in the index.
///
/// Excludes the ingredient/instruction bodies; always derivable from the
/// canonical file, never hand-edited.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub servings: Option<String>,
    pub source_url: String,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub total_time: Option<i64>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page of search results plus the unpaginated match count.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub results: Vec<RecipeSummary>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// A tag name and how many recipes currently carry it.
#[derive(Debug, Clone, Serialize)]
pub struct TagCount {
    pub name: String,
    pub recipe_count: i64,
}

/// Summary returned by an index rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    /// Recipe files seen during the scan, parseable or not.
    pub scanned: usize,
    /// Recipes successfully re-indexed.
    pub indexed: usize,
    /// Files skipped because they failed to parse.
    pub skipped: usize,
    pub elapsed_ms: u128,
}
