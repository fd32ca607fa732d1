//! Derived SQLite projection of the recipe files.
//!
//! The index is never authoritative: every row is reconstructible from the
//! file store via [`IndexStore::rebuild`], which is the sole repair
//! mechanism after corruption or a crash between a file write and its
//! index upsert. `upsert`, `remove`, and `rebuild` each run inside a
//! single transaction so readers never observe a recipe with only some of
//! its tags attached; rebuild additionally excludes concurrent upserts.

use std::time::Instant;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{RebuildReport, Recipe, RecipeSummary, SearchPage, TagCount};
use crate::store::FileStore;

/// Hard ceiling on page size for search queries.
pub const MAX_PAGE_SIZE: i64 = 100;

pub struct IndexStore {
    pool: SqlitePool,
    // Writer side held for the clear-then-repopulate window of rebuild.
    rebuild_lock: RwLock<()>,
}

impl IndexStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            rebuild_lock: RwLock::new(()),
        }
    }

    /// Insert or fully replace the index row and tag associations for one
    /// recipe, keyed by slug.
    pub async fn upsert(&self, recipe: &Recipe) -> Result<()> {
        let _guard = self.rebuild_lock.read().await;
        let mut tx = self.pool.begin().await?;
        upsert_tx(&mut tx, recipe).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete the index row; tag associations cascade, tag rows stay
    /// (shared across recipes). Returns whether a row was removed.
    pub async fn remove(&self, slug: &str) -> Result<bool> {
        let _guard = self.rebuild_lock.read().await;
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM recipes WHERE slug = ?")
            .bind(slug)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear all index tables and repopulate from a full file-store scan.
    pub async fn rebuild(&self, store: &FileStore) -> Result<RebuildReport> {
        let _guard = self.rebuild_lock.write().await;
        let started = Instant::now();

        let scan = store.list_all()?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM recipe_tags").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM recipes").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM tags").execute(&mut *tx).await?;

        let mut indexed = 0usize;
        for recipe in &scan.recipes {
            upsert_tx(&mut tx, recipe).await?;
            indexed += 1;
        }
        tx.commit().await?;

        let report = RebuildReport {
            scanned: scan.recipes.len() + scan.skipped,
            indexed,
            skipped: scan.skipped,
            elapsed_ms: started.elapsed().as_millis(),
        };
        info!(
            scanned = report.scanned,
            indexed = report.indexed,
            skipped = report.skipped,
            elapsed_ms = report.elapsed_ms as u64,
            "index rebuilt"
        );
        Ok(report)
    }

    /// Search the index.
    ///
    /// `text` matches case-insensitively as a substring against title and
    /// description (OR'd); `tag` restricts to recipes carrying that exact
    /// tag. Results are ordered most-recently-updated first, ties broken
    /// by slug ascending. `page` is 1-based; `page_size` is clamped to
    /// [`MAX_PAGE_SIZE`].
    pub async fn query(
        &self,
        text: Option<&str>,
        tag: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<SearchPage> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1) * page_size;

        let text_pattern = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| format!("%{}%", escape_like(t)));
        let tag_name = tag
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());

        let mut conditions: Vec<&str> = Vec::new();
        if text_pattern.is_some() {
            conditions.push("(title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\')");
        }
        if tag_name.is_some() {
            conditions.push(
                "id IN (SELECT rt.recipe_id FROM recipe_tags rt \
                 JOIN tags t ON t.id = rt.tag_id WHERE t.name = ?)",
            );
        }
        let where_sql = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM recipes{where_sql}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(ref pattern) = text_pattern {
            count_query = count_query.bind(pattern).bind(pattern);
        }
        if let Some(ref name) = tag_name {
            count_query = count_query.bind(name);
        }
        let total: i64 = count_query.fetch_one(&self.pool).await?;

        let rows_sql = format!(
            "SELECT id, slug, title, source_url, description, author, servings, \
             prep_time, cook_time, total_time, created_at, updated_at \
             FROM recipes{where_sql} \
             ORDER BY updated_at DESC, slug ASC LIMIT ? OFFSET ?"
        );
        let mut rows_query = sqlx::query(&rows_sql);
        if let Some(ref pattern) = text_pattern {
            rows_query = rows_query.bind(pattern).bind(pattern);
        }
        if let Some(ref name) = tag_name {
            rows_query = rows_query.bind(name);
        }
        let rows = rows_query
            .bind(page_size)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let recipe_id: i64 = row.get("id");
            let tags: Vec<String> = sqlx::query_scalar(
                "SELECT t.name FROM tags t \
                 JOIN recipe_tags rt ON rt.tag_id = t.id \
                 WHERE rt.recipe_id = ? ORDER BY t.name",
            )
            .bind(recipe_id)
            .fetch_all(&self.pool)
            .await?;

            results.push(RecipeSummary {
                slug: row.get("slug"),
                title: row.get("title"),
                description: row.get("description"),
                author: row.get("author"),
                servings: row.get("servings"),
                source_url: row.get("source_url"),
                prep_time: row.get("prep_time"),
                cook_time: row.get("cook_time"),
                total_time: row.get("total_time"),
                tags,
                created_at: from_epoch(row.get("created_at")),
                updated_at: from_epoch(row.get("updated_at")),
            });
        }

        Ok(SearchPage {
            results,
            total,
            page,
            page_size,
        })
    }

    /// Duplicate detection prior to any new extraction attempt.
    pub async fn exists_by_source_url(&self, url: &str) -> Result<Option<String>> {
        let slug = sqlx::query_scalar("SELECT slug FROM recipes WHERE source_url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(slug)
    }

    /// All tags with their recipe counts, name-ordered.
    pub async fn list_tags(&self) -> Result<Vec<TagCount>> {
        let rows = sqlx::query(
            "SELECT t.name AS name, COUNT(rt.recipe_id) AS recipe_count \
             FROM tags t \
             LEFT JOIN recipe_tags rt ON rt.tag_id = t.id \
             GROUP BY t.id, t.name \
             ORDER BY t.name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TagCount {
                name: row.get("name"),
                recipe_count: row.get("recipe_count"),
            })
            .collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let n = sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

async fn upsert_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    recipe: &Recipe,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO recipes (slug, title, source_url, description, author, servings,
                             prep_time, cook_time, total_time, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(slug) DO UPDATE SET
            title = excluded.title,
            source_url = excluded.source_url,
            description = excluded.description,
            author = excluded.author,
            servings = excluded.servings,
            prep_time = excluded.prep_time,
            cook_time = excluded.cook_time,
            total_time = excluded.total_time,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&recipe.slug)
    .bind(&recipe.title)
    .bind(&recipe.source_url)
    .bind(&recipe.description)
    .bind(&recipe.author)
    .bind(&recipe.servings)
    .bind(recipe.prep_time)
    .bind(recipe.cook_time)
    .bind(recipe.total_time)
    .bind(recipe.created_at.timestamp())
    .bind(recipe.updated_at.timestamp())
    .execute(&mut **tx)
    .await?;

    let recipe_id: i64 = sqlx::query_scalar("SELECT id FROM recipes WHERE slug = ?")
        .bind(&recipe.slug)
        .fetch_one(&mut **tx)
        .await?;

    // Full replace of tag associations; stale links must not survive.
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = ?")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;

    for tag in &recipe.tags {
        let name = tag.trim().to_lowercase();
        if name.is_empty() {
            warn!(slug = %recipe.slug, "ignoring empty tag");
            continue;
        }
        sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(&name)
            .execute(&mut **tx)
            .await?;
        let tag_id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
            .bind(&name)
            .fetch_one(&mut **tx)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO recipe_tags (recipe_id, tag_id) VALUES (?, ?)")
            .bind(recipe_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

fn from_epoch(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Escape `%`, `_`, and the escape character itself for a LIKE pattern
/// using `ESCAPE '\'`.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn test_index(tmp: &TempDir) -> IndexStore {
        let pool = db::connect(&tmp.path().join("index.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        IndexStore::new(pool)
    }

    fn recipe(slug: &str, title: &str, updated_minute: u32) -> Recipe {
        Recipe {
            slug: slug.to_string(),
            title: title.to_string(),
            description: Some(format!("{title} description")),
            author: None,
            servings: None,
            source_url: format!("https://x.test/{slug}"),
            prep_time: None,
            cook_time: None,
            total_time: None,
            tags: vec![],
            ingredients: vec!["thing".to_string()],
            instructions: vec!["do it".to_string()],
            notes: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::minutes(updated_minute as i64),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_query_by_text() {
        let tmp = TempDir::new().unwrap();
        let index = test_index(&tmp).await;

        index
            .upsert(&recipe("chicken-curry", "Chicken Curry", 1))
            .await
            .unwrap();
        index
            .upsert(&recipe("beef-stew", "Beef Stew", 2))
            .await
            .unwrap();

        let page = index.query(Some("curry"), None, 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.results[0].slug, "chicken-curry");

        // Case-insensitive, and matches description as well as title.
        let page = index.query(Some("CURRY"), None, 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        let page = index
            .query(Some("stew description"), None, 1, 10)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.results[0].slug, "beef-stew");
    }

    #[tokio::test]
    async fn test_query_orders_by_updated_then_slug() {
        let tmp = TempDir::new().unwrap();
        let index = test_index(&tmp).await;

        index.upsert(&recipe("b-dish", "Dish B", 5)).await.unwrap();
        index.upsert(&recipe("a-dish", "Dish A", 5)).await.unwrap();
        index.upsert(&recipe("newest", "Dish C", 9)).await.unwrap();

        let page = index.query(None, None, 1, 10).await.unwrap();
        let slugs: Vec<&str> = page.results.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["newest", "a-dish", "b-dish"]);
    }

    #[tokio::test]
    async fn test_pagination() {
        let tmp = TempDir::new().unwrap();
        let index = test_index(&tmp).await;

        for i in 0..25 {
            index
                .upsert(&recipe(&format!("dish-{i:02}"), &format!("Dish {i}"), i))
                .await
                .unwrap();
        }

        let page = index.query(None, None, 3, 10).await.unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.results.len(), 5);
        assert_eq!(page.page, 3);
        assert_eq!(index.count().await.unwrap(), 25);

        // Page size is clamped to the ceiling.
        let page = index.query(None, None, 1, 10_000).await.unwrap();
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_tag_filter_and_full_tag_replace() {
        let tmp = TempDir::new().unwrap();
        let index = test_index(&tmp).await;

        let mut r = recipe("chicken-curry", "Chicken Curry", 1);
        r.tags = vec!["curry".to_string(), "Dinner".to_string()];
        index.upsert(&r).await.unwrap();

        let page = index.query(None, Some("dinner"), 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(
            page.results[0].tags,
            vec!["curry".to_string(), "dinner".to_string()]
        );

        // Re-upsert with different tags: the old association must be gone.
        r.tags = vec!["weeknight".to_string()];
        index.upsert(&r).await.unwrap();
        let page = index.query(None, Some("dinner"), 1, 10).await.unwrap();
        assert_eq!(page.total, 0);
        let page = index.query(None, Some("weeknight"), 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_remove_keeps_tag_rows() {
        let tmp = TempDir::new().unwrap();
        let index = test_index(&tmp).await;

        let mut r = recipe("chicken-curry", "Chicken Curry", 1);
        r.tags = vec!["curry".to_string()];
        index.upsert(&r).await.unwrap();

        assert!(index.remove("chicken-curry").await.unwrap());
        assert!(!index.remove("chicken-curry").await.unwrap());

        let tags = index.list_tags().await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "curry");
        assert_eq!(tags[0].recipe_count, 0);
    }

    #[tokio::test]
    async fn test_exists_by_source_url() {
        let tmp = TempDir::new().unwrap();
        let index = test_index(&tmp).await;

        index
            .upsert(&recipe("chicken-curry", "Chicken Curry", 1))
            .await
            .unwrap();

        assert_eq!(
            index
                .exists_by_source_url("https://x.test/chicken-curry")
                .await
                .unwrap(),
            Some("chicken-curry".to_string())
        );
        assert_eq!(
            index
                .exists_by_source_url("https://x.test/unknown")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_like_wildcards_are_escaped() {
        let tmp = TempDir::new().unwrap();
        let index = test_index(&tmp).await;

        index
            .upsert(&recipe("fifty-percent-rye", "50% Rye Bread", 1))
            .await
            .unwrap();
        index
            .upsert(&recipe("plain-loaf", "Plain Loaf", 2))
            .await
            .unwrap();

        // A literal "%" must not act as a wildcard.
        let page = index.query(Some("50%"), None, 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        let page = index.query(Some("0%"), None, 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        let page = index.query(Some("___"), None, 1, 10).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_rebuild_matches_fresh_scan() {
        let tmp = TempDir::new().unwrap();
        let index = test_index(&tmp).await;
        let store = FileStore::new(tmp.path().join("recipes"), 1024 * 1024).unwrap();

        for i in 0..4 {
            let mut r = recipe(&format!("dish-{i}"), &format!("Dish {i}"), i);
            r.tags = vec!["dinner".to_string(), format!("tag-{i}")];
            store.write(&mut r).unwrap();
        }
        std::fs::write(store.root().join("junk.md"), "garbage").unwrap();

        // Seed the index with a row that has no file behind it; rebuild
        // must drop it.
        index
            .upsert(&recipe("orphan", "Orphan", 99))
            .await
            .unwrap();

        let report = index.rebuild(&store).await.unwrap();
        assert_eq!(report.scanned, 5);
        assert_eq!(report.indexed, 4);
        assert_eq!(report.skipped, 1);

        let scan = store.list_all().unwrap();
        let page = index.query(None, None, 1, 100).await.unwrap();
        assert_eq!(page.total as usize, scan.recipes.len());

        let mut indexed_slugs: Vec<String> =
            page.results.iter().map(|r| r.slug.clone()).collect();
        indexed_slugs.sort();
        let scan_slugs: Vec<String> = scan.recipes.iter().map(|r| r.slug.clone()).collect();
        assert_eq!(indexed_slugs, scan_slugs);
        assert!(!indexed_slugs.contains(&"orphan".to_string()));

        // Tag associations survive the rebuild.
        let page = index.query(None, Some("dinner"), 1, 100).await.unwrap();
        assert_eq!(page.total, 4);
    }
}
