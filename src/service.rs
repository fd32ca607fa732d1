//! High-level recipe operations across the extractor, file store, and index.
//!
//! This is the surface the CLI and HTTP layer consume. Writes go file
//! first, index second; a crash between the two leaves the index stale
//! until the next rebuild, which is the accepted consistency model. The
//! index is treated as a cache throughout: read paths that hit an index
//! failure fall back to rebuild-then-retry before giving up.

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::db;
use crate::error::{RecipeError, Result};
use crate::extract::{HttpExtractor, RecipeExtractor};
use crate::index::IndexStore;
use crate::migrate;
use crate::models::{RebuildReport, Recipe, SearchPage, TagCount};
use crate::store::FileStore;

pub struct RecipeService {
    store: FileStore,
    index: IndexStore,
    extractor: Box<dyn RecipeExtractor>,
    // Serializes add/delete so duplicate-check-then-write is not racy
    // between concurrent requests in this process.
    write_lock: Mutex<()>,
}

impl RecipeService {
    /// Open the store and index from configuration, running migrations.
    pub async fn open(config: &Config) -> Result<Self> {
        let extractor = HttpExtractor::new(&config.extract)?;
        Self::open_with_extractor(config, Box::new(extractor)).await
    }

    /// Like [`RecipeService::open`], with a caller-supplied extractor.
    pub async fn open_with_extractor(
        config: &Config,
        extractor: Box<dyn RecipeExtractor>,
    ) -> Result<Self> {
        let store = FileStore::new(&config.storage.recipes_dir, config.storage.max_file_bytes)?;
        let pool = db::connect(&config.db.path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            store,
            index: IndexStore::new(pool),
            extractor,
            write_lock: Mutex::new(()),
        })
    }

    /// Extract a recipe from `url`, persist it, and index it.
    ///
    /// Fails with [`RecipeError::Duplicate`] (carrying the existing slug)
    /// when the source URL is already stored. Extraction failures pass
    /// through unchanged. If the file write succeeds but the index upsert
    /// fails, the file stays on disk and the error names the index as the
    /// failing step; a rebuild reconciles.
    pub async fn add(&self, url: &str) -> Result<Recipe> {
        let _guard = self.write_lock.lock().await;

        if let Some(slug) = self.index.exists_by_source_url(url).await? {
            return Err(RecipeError::Duplicate { slug });
        }

        let extracted = self.extractor.extract(url).await?;
        if extracted.ingredients.is_empty() {
            warn!(url, "extracted recipe has no ingredients");
        }
        if extracted.instructions.is_empty() {
            warn!(url, "extracted recipe has no instructions");
        }

        let now = Utc::now();
        let mut recipe = Recipe {
            slug: String::new(),
            title: extracted.title,
            description: extracted.description,
            author: extracted.author,
            servings: extracted.servings,
            source_url: url.to_string(),
            prep_time: extracted.prep_time,
            cook_time: extracted.cook_time,
            total_time: extracted.total_time,
            tags: extracted.tags,
            ingredients: extracted.ingredients,
            instructions: extracted.instructions,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        self.store.write(&mut recipe)?;
        self.index.upsert(&recipe).await?;

        info!(slug = %recipe.slug, url, "recipe added");
        Ok(recipe)
    }

    /// Read the canonical recipe file. A malformed file is a hard
    /// [`RecipeError::Parse`] here, unlike during bulk scans.
    pub fn get(&self, slug: &str) -> Result<Recipe> {
        self.store.read(slug)
    }

    /// Query the index, falling back to a rebuild-then-retry when the
    /// index itself is broken.
    pub async fn search(
        &self,
        text: Option<&str>,
        tag: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<SearchPage> {
        match self.index.query(text, tag, page, page_size).await {
            Ok(found) => Ok(found),
            Err(err) if err.is_index_failure() => {
                warn!(error = %err, "index query failed; rebuilding and retrying");
                self.index.rebuild(&self.store).await?;
                self.index.query(text, tag, page, page_size).await
            }
            Err(err) => Err(err),
        }
    }

    pub async fn list_tags(&self) -> Result<Vec<TagCount>> {
        self.index.list_tags().await
    }

    pub async fn rebuild(&self) -> Result<RebuildReport> {
        self.index.rebuild(&self.store).await
    }

    /// Delete the recipe file, then its index row. Fails with
    /// [`RecipeError::NotFound`] when no file exists; a missing index row
    /// alone is only logged, since the file is the source of truth.
    pub async fn delete(&self, slug: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        self.store.delete(slug)?;
        if !self.index.remove(slug).await? {
            warn!(slug, "deleted recipe was not present in the index");
        }
        info!(slug, "recipe deleted");
        Ok(())
    }
}
