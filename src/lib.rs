pub mod config;
pub mod engine;
pub mod model;
pub mod search;
pub mod storage;
pub mod ui;
pub mod view;

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::EngineConfig;
use engine::SearchEngine;
use storage::SqliteCatalog;
use ui::listing::FrameReport;
use view::surface::ViewModel;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "invsearch",
    version,
    about = "Inventory browser with live search across ingredients and products"
)]
pub struct Cli {
    /// Path to the SQLite database (defaults to platform data dir)
    #[arg(long, global = true, env = "INVSEARCH_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch interactive TUI
    Tui {
        /// Render once and exit (headless-friendly)
        #[arg(long, default_value_t = false)]
        once: bool,
    },
    /// Run one search headlessly and print what the views show once settled
    Query {
        /// Search term; empty restores the full inventory
        term: String,

        /// Emit JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Bulk-load a JSON inventory document
    Import {
        /// File with `{"ingredients": [...], "products": [...]}`
        file: PathBuf,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page to stdout
    Man,
}

impl Commands {
    /// Whether logs must stay off the terminal.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Commands::Tui { once: false })
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let db_path = cli.db.unwrap_or_else(default_db_path);

    match cli.command {
        Commands::Tui { once } => ui::tui::run_tui(db_path, default_data_dir(), once).await,
        Commands::Query { term, json } => run_query(&db_path, &term, json).await,
        Commands::Import { file } => run_import(&db_path, &file),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "invsearch", &mut std::io::stdout());
            Ok(())
        }
        Commands::Man => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            let mut out = std::io::stdout();
            man.render(&mut out)?;
            Ok(())
        }
    }
}

async fn run_query(db_path: &Path, term: &str, json: bool) -> Result<()> {
    if !db_path.exists() {
        return Err(anyhow!(
            "database not found at {}; run `invsearch import <file>` first",
            db_path.display()
        ));
    }
    let catalog = Arc::new(
        SqliteCatalog::open(db_path)
            .with_context(|| format!("opening inventory at {}", db_path.display()))?,
    );
    let view = Arc::new(ViewModel::new());
    let engine = SearchEngine::new(EngineConfig::instant(), catalog, view.clone());
    engine.load().await?;
    engine.submit(term);
    engine.wait_idle().await;

    let report = FrameReport::build(term, &view.frame(), &engine.inventory());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.to_text());
    }
    Ok(())
}

fn run_import(db_path: &Path, file: &Path) -> Result<()> {
    let mut store = storage::InventoryStore::open(db_path)
        .with_context(|| format!("opening inventory at {}", db_path.display()))?;
    let summary = store
        .import_file(file)
        .with_context(|| format!("importing {}", file.display()))?;
    println!(
        "imported {} ingredients and {} products into {}",
        summary.ingredients,
        summary.products,
        db_path.display()
    );
    Ok(())
}

pub fn default_db_path() -> PathBuf {
    default_data_dir().join("inventory.db")
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "inventory-search", "inventory-search")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".inventory-search"))
}
