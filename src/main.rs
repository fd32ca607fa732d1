//! # recipebox CLI (`rbox`)
//!
//! The `rbox` binary is the primary interface for recipebox. It provides
//! commands for database initialization, adding recipes from URLs, search,
//! index maintenance, and starting the JSON API server.
//!
//! ## Usage
//!
//! ```bash
//! rbox --config ./config/recipebox.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rbox init` | Create the SQLite index and the recipes directory |
//! | `rbox add <url>` | Extract a recipe from a URL and store it |
//! | `rbox get <slug>` | Print a stored recipe |
//! | `rbox search [query]` | Search indexed recipes |
//! | `rbox tags` | List all tags with recipe counts |
//! | `rbox rebuild` | Rebuild the index from the recipe files |
//! | `rbox delete <slug>` | Delete a recipe and its index entry |
//! | `rbox serve` | Start the JSON API server |

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use recipebox::service::RecipeService;
use recipebox::{config, db, migrate, models, server, store};

/// recipebox — a local-first recipe collection manager.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/recipebox.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rbox",
    about = "recipebox — a local-first recipe collection manager",
    version,
    long_about = "recipebox extracts structured recipe data from a URL, stores each recipe \
    as a markdown file with a YAML frontmatter header, and keeps a rebuildable SQLite \
    index for listing and search. The files are the source of truth."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recipebox.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the recipes directory and the index database.
    ///
    /// Creates the SQLite file and all required tables (recipes, tags,
    /// recipe_tags). This command is idempotent — running it multiple
    /// times is safe.
    Init,

    /// Extract a recipe from a URL and store it.
    ///
    /// Fails with a duplicate error (naming the existing slug) when the
    /// URL has already been added.
    Add {
        /// The recipe page URL.
        url: String,
    },

    /// Print a stored recipe from its canonical file.
    Get {
        /// Recipe slug (the file basename).
        slug: String,
    },

    /// Search indexed recipes.
    ///
    /// Without a query, lists recipes most-recently-updated first.
    Search {
        /// Text matched case-insensitively against title and description.
        query: Option<String>,

        /// Restrict to recipes carrying this exact tag.
        #[arg(long)]
        tag: Option<String>,

        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: i64,

        /// Results per page (capped at 100).
        #[arg(long, default_value_t = 20)]
        page_size: i64,
    },

    /// List all tags with their recipe counts.
    Tags,

    /// Rebuild the search index by re-scanning the recipe files.
    ///
    /// The index is never authoritative; this is the repair mechanism
    /// after corruption or a crash mid-write.
    Rebuild,

    /// Delete a recipe file and its index entry.
    Delete {
        /// Recipe slug.
        slug: String,
    },

    /// Start the JSON API server on the configured bind address.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            store::FileStore::new(&cfg.storage.recipes_dir, cfg.storage.max_file_bytes)?;
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Add { url } => {
            let service = RecipeService::open(&cfg).await?;
            let recipe = service.add(&url).await?;
            println!("added: {}", recipe.slug);
            println!("title: {}", recipe.title);
            if !recipe.tags.is_empty() {
                println!("tags:  {}", recipe.tags.join(", "));
            }
        }
        Commands::Get { slug } => {
            let service = RecipeService::open(&cfg).await?;
            print_recipe(&service.get(&slug)?);
        }
        Commands::Search {
            query,
            tag,
            page,
            page_size,
        } => {
            let service = RecipeService::open(&cfg).await?;
            let results = service
                .search(query.as_deref(), tag.as_deref(), page, page_size)
                .await?;
            if results.results.is_empty() {
                println!("No results.");
            } else {
                for (i, summary) in results.results.iter().enumerate() {
                    let rank = (results.page - 1) * results.page_size + i as i64 + 1;
                    println!("{}. {} [{}]", rank, summary.title, summary.slug);
                    println!("    updated: {}", summary.updated_at.format("%Y-%m-%d"));
                    if !summary.tags.is_empty() {
                        println!("    tags: {}", summary.tags.join(", "));
                    }
                    if let Some(ref desc) = summary.description {
                        println!("    {}", desc.lines().next().unwrap_or_default());
                    }
                }
                println!();
                println!(
                    "page {} ({} total)",
                    results.page, results.total
                );
            }
        }
        Commands::Tags => {
            let service = RecipeService::open(&cfg).await?;
            let tags = service.list_tags().await?;
            if tags.is_empty() {
                println!("No tags.");
            } else {
                for tag in tags {
                    println!("{} ({})", tag.name, tag.recipe_count);
                }
            }
        }
        Commands::Rebuild => {
            let service = RecipeService::open(&cfg).await?;
            let report = service.rebuild().await?;
            println!("rebuild");
            println!("  scanned: {} files", report.scanned);
            println!("  indexed: {} recipes", report.indexed);
            println!("  skipped: {}", report.skipped);
            println!("  elapsed: {} ms", report.elapsed_ms);
            println!("ok");
        }
        Commands::Delete { slug } => {
            let service = RecipeService::open(&cfg).await?;
            service.delete(&slug).await?;
            println!("deleted: {}", slug);
        }
        Commands::Serve => {
            let service = Arc::new(RecipeService::open(&cfg).await?);
            server::run_server(&cfg, service).await?;
        }
    }

    Ok(())
}

fn print_recipe(recipe: &models::Recipe) {
    println!("--- Recipe ---");
    println!("slug:       {}", recipe.slug);
    println!("title:      {}", recipe.title);
    println!("source:     {}", recipe.source_url);
    if let Some(ref author) = recipe.author {
        println!("author:     {}", author);
    }
    if let Some(ref servings) = recipe.servings {
        println!("servings:   {}", servings);
    }
    if let Some(minutes) = recipe.prep_time {
        println!("prep:       {} min", minutes);
    }
    if let Some(minutes) = recipe.cook_time {
        println!("cook:       {} min", minutes);
    }
    if let Some(minutes) = recipe.total_time {
        println!("total:      {} min", minutes);
    }
    if !recipe.tags.is_empty() {
        println!("tags:       {}", recipe.tags.join(", "));
    }
    println!("created_at: {}", recipe.created_at.to_rfc3339());
    println!("updated_at: {}", recipe.updated_at.to_rfc3339());

    if let Some(ref desc) = recipe.description {
        println!();
        println!("{}", desc);
    }

    println!();
    println!("Ingredients:");
    for item in &recipe.ingredients {
        println!("  - {}", item);
    }

    println!();
    println!("Instructions:");
    for (i, step) in recipe.instructions.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }

    if let Some(ref notes) = recipe.notes {
        println!();
        println!("Notes:");
        println!("{}", notes);
    }
}
