//! Command-line interface.
//!
//! One flat command with four modes: `--site CODE`, `--all`, `--reset CODE`
//! and `--list`. Returns the process exit code.

mod summary;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{ArgGroup, Parser};
use console::style;

use crate::config::{expand_path, Settings, SiteCatalog, DEFAULT_CONFIG_FILE};
use crate::engine::reset_site;
use crate::error::HarvestError;
use crate::orchestrator::{self, exit_code, DefaultFetcherFactory, Orchestrator};
use crate::plugins::PluginRegistry;

/// Exit code for invalid arguments or configuration.
pub const EXIT_USAGE: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(about = "Harvest postings from council and public-agency bulletin boards")]
#[command(version)]
#[command(group(ArgGroup::new("mode").required(true).args(["site", "all", "reset", "list"])))]
pub struct Cli {
    /// Harvest a single site
    #[arg(long, value_name = "CODE")]
    site: Option<String>,

    /// Harvest every configured site
    #[arg(long)]
    all: bool,

    /// Clear a site's checkpoint and DOCID index
    #[arg(long, value_name = "CODE")]
    reset: Option<String>,

    /// List available plugins and configured sites
    #[arg(long)]
    list: bool,

    /// Stop a site after this many list pages
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Earliest post date to collect; older rows end the walk
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    start: Option<NaiveDate>,

    /// Latest post date to collect
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    end: Option<NaiveDate>,

    /// Output directory (default: ./output or HARVEST_OUTPUT_DIR)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Sites harvested concurrently
    #[arg(short, long, value_name = "W")]
    workers: Option<usize>,

    /// Site configuration file (YAML, JSON or TOML)
    #[arg(short, long, env = "HARVEST_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Per-site time limit in seconds
    #[arg(long, value_name = "SECS")]
    site_timeout: Option<u64>,

    /// Pages between incremental snapshots (0 disables them)
    #[arg(long, value_name = "N")]
    snapshot_every: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{}' is not a YYYY-MM-DD date", s))
}

impl Cli {
    /// Environment settings with command-line overrides applied.
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::from_env()?;
        if let Some(dir) = &self.output {
            settings.output_dir = expand_path(&dir.to_string_lossy());
        }
        if let Some(n) = self.max_pages {
            settings.max_pages = n;
        }
        if let Some(w) = self.workers {
            settings.workers = w;
        }
        if let Some(secs) = self.site_timeout {
            settings.site_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.snapshot_every {
            settings.snapshot_every = n;
        }
        settings.range.start = self.start;
        settings.range.end = self.end;
        settings.validate()?;
        Ok(settings)
    }

    fn load_catalog(&self) -> anyhow::Result<SiteCatalog> {
        let path = expand_path(&self.config);
        SiteCatalog::load(&path).with_context(|| format!("loading sites from {}", path.display()))
    }
}

/// Parse arguments and run. Errors map to exit code 1 in `main`.
pub async fn run() -> anyhow::Result<i32> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return Ok(if e.use_stderr() { EXIT_USAGE } else { 0 });
        }
    };

    if cli.list {
        let catalog = cli.load_catalog();
        summary::print_list(&PluginRegistry::with_builtin(Vec::new()), catalog.as_ref().ok());
        if let Err(e) = catalog {
            println!("\n{} {:#}", style("!").yellow(), e);
        }
        return Ok(0);
    }

    let settings = cli.settings()?;

    if let Some(code) = &cli.reset {
        reset_site(&settings.output_dir, code).with_context(|| format!("resetting {}", code))?;
        println!(
            "{} Reset {} in {}",
            style("✓").green(),
            code,
            settings.output_dir.display()
        );
        return Ok(0);
    }

    let catalog = cli.load_catalog()?;
    let (codes, rejected, progress_bar) = if let Some(code) = &cli.site {
        if catalog.get(code).is_none() {
            if let Some(invalid) = catalog.invalid.iter().find(|i| &i.label == code) {
                anyhow::bail!("site '{}' is misconfigured: {}", code, invalid.error);
            }
            anyhow::bail!("unknown site '{}' (see --list)", code);
        }
        (vec![code.clone()], Vec::new(), false)
    } else {
        let codes: Vec<String> = catalog.codes().into_iter().map(str::to_string).collect();
        let rejected: Vec<(String, HarvestError)> = catalog
            .invalid
            .into_iter()
            .map(|invalid| (invalid.label, invalid.error))
            .collect();
        (codes, rejected, console::Term::stdout().is_term())
    };

    if codes.is_empty() && rejected.is_empty() {
        println!("{} No sites configured", style("!").yellow());
        return Ok(0);
    }

    let (trigger, shutdown) = orchestrator::channel();
    let ctrl_c = orchestrator::install_ctrl_c(trigger);

    let registry = Arc::new(PluginRegistry::with_builtin(catalog.sites));
    let factory = Arc::new(DefaultFetcherFactory::new(settings.clone()));
    let output_dir = settings.output_dir.clone();
    let run = Orchestrator::new(registry, factory, settings)
        .with_shutdown(shutdown)
        .with_progress_bar(progress_bar)
        .run(&codes, rejected)
        .await;
    ctrl_c.abort();

    let summary = run.with_context(|| format!("writing run files to {}", output_dir.display()))?;
    summary::print_summary(&summary);
    Ok(exit_code(&summary))
}
