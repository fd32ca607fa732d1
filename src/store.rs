//! Canonical recipe persistence as markdown files in a flat directory.
//!
//! The file on disk is always the durable source of truth; the SQLite
//! index is a projection of this directory. Writes go to a temporary path
//! in the same directory and are atomically renamed over the final path,
//! so a reader never observes a partially written file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{RecipeError, Result};
use crate::frontmatter;
use crate::models::Recipe;
use crate::slug::{sanitize_filename, slugify};

const RECIPE_EXT: &str = "md";
const SLUG_FALLBACK: &str = "recipe";

/// Bound on collision suffix probing before giving up.
const MAX_SLUG_ATTEMPTS: u32 = 10_000;

/// Result of a full directory scan.
pub struct Scan {
    pub recipes: Vec<Recipe>,
    /// Files skipped because they could not be read or parsed.
    pub skipped: usize,
}

pub struct FileStore {
    root: PathBuf,
    max_file_bytes: u64,
}

impl FileStore {
    /// Open (and create if missing) the recipes directory.
    pub fn new(root: impl Into<PathBuf>, max_file_bytes: u64) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| RecipeError::storage("create recipes directory", e))?;
        Ok(Self {
            root,
            max_file_bytes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, slug: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", sanitize_filename(slug), RECIPE_EXT))
    }

    pub fn exists(&self, slug: &str) -> bool {
        self.path_for(slug).is_file()
    }

    /// Write a recipe, resolving its final slug first.
    ///
    /// A missing slug is derived from the title. On a filename collision
    /// with the *same* `source_url` the file is fully replaced and the
    /// existing `created_at` is preserved; on a collision with a different
    /// source recipe a `-2`, `-3`, ... suffix is probed until a free name
    /// is found. The resolved slug is written back into `recipe`.
    pub fn write(&self, recipe: &mut Recipe) -> Result<PathBuf> {
        if recipe.slug.is_empty() {
            recipe.slug = slugify(&recipe.title);
        }
        let mut base = sanitize_filename(&recipe.slug);
        if base.is_empty() {
            base = SLUG_FALLBACK.to_string();
        }

        let path = self.resolve_collision(&base, recipe)?;

        let content = frontmatter::render(recipe)
            .map_err(|e| RecipeError::storage("serialize recipe", e))?;
        if content.len() as u64 > self.max_file_bytes {
            return Err(RecipeError::Storage(format!(
                "serialized recipe is {} bytes (max {})",
                content.len(),
                self.max_file_bytes
            )));
        }

        let tmp = path.with_extension("md.tmp");
        fs::write(&tmp, &content).map_err(|e| RecipeError::storage("write temp file", e))?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(RecipeError::storage("rename into place", e));
        }

        info!(slug = %recipe.slug, path = %path.display(), "recipe written");
        Ok(path)
    }

    fn resolve_collision(&self, base: &str, recipe: &mut Recipe) -> Result<PathBuf> {
        let mut candidate = base.to_string();
        let mut n = 1u32;
        loop {
            let path = self.root.join(format!("{candidate}.{RECIPE_EXT}"));
            if !path.is_file() {
                recipe.slug = candidate;
                return Ok(path);
            }

            // An unreadable occupant is treated as a different recipe:
            // we cannot prove it shares our source, so we step aside.
            let same_source = fs::read_to_string(&path)
                .ok()
                .and_then(|text| frontmatter::parse(&text).ok())
                .is_some_and(|existing| {
                    if existing.source_url == recipe.source_url {
                        recipe.created_at = existing.created_at;
                        true
                    } else {
                        false
                    }
                });
            if same_source {
                recipe.slug = candidate;
                return Ok(path);
            }

            n += 1;
            if n > MAX_SLUG_ATTEMPTS {
                return Err(RecipeError::Storage(format!(
                    "no free slug for '{base}' after {MAX_SLUG_ATTEMPTS} attempts"
                )));
            }
            candidate = format!("{base}-{n}");
        }
    }

    /// Load one recipe by slug.
    pub fn read(&self, slug: &str) -> Result<Recipe> {
        let path = self.path_for(slug);
        if !path.is_file() {
            return Err(RecipeError::NotFound {
                slug: slug.to_string(),
            });
        }

        let meta = fs::metadata(&path).map_err(|e| RecipeError::storage("stat recipe file", e))?;
        if meta.len() > self.max_file_bytes {
            return Err(RecipeError::Storage(format!(
                "recipe file {} is {} bytes (max {})",
                path.display(),
                meta.len(),
                self.max_file_bytes
            )));
        }

        let content =
            fs::read_to_string(&path).map_err(|e| RecipeError::storage("read recipe file", e))?;
        let mut recipe =
            frontmatter::parse(&content).map_err(|reason| RecipeError::parse(&path, reason))?;
        recipe.slug = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| slug.to_string());
        Ok(recipe)
    }

    /// Scan the whole directory. A single unreadable or corrupt file is
    /// logged and counted, never fatal.
    pub fn list_all(&self) -> Result<Scan> {
        let mut recipes = Vec::new();
        let mut skipped = 0usize;

        for entry in WalkDir::new(&self.root).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    skipped += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECIPE_EXT) {
                continue;
            }
            let Some(slug) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };

            match self.read(&slug) {
                Ok(recipe) => recipes.push(recipe),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping recipe file");
                    skipped += 1;
                }
            }
        }

        // Deterministic ordering for scans and rebuilds.
        recipes.sort_by(|a, b| a.slug.cmp(&b.slug));

        Ok(Scan { recipes, skipped })
    }

    /// Remove a recipe file. A second delete of the same slug reports
    /// not-found; idempotent deletion is deliberately not guaranteed.
    pub fn delete(&self, slug: &str) -> Result<()> {
        let path = self.path_for(slug);
        if !path.is_file() {
            return Err(RecipeError::NotFound {
                slug: slug.to_string(),
            });
        }
        fs::remove_file(&path).map_err(|e| RecipeError::storage("delete recipe file", e))?;
        info!(slug, path = %path.display(), "recipe deleted");
        Ok(())
    }
}
