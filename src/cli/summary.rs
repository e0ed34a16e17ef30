//! Console output for `--list` and the end-of-run summary.

use console::style;

use crate::config::SiteCatalog;
use crate::models::SiteStatus;
use crate::orchestrator::status_icon;
use crate::plugins::PluginRegistry;
use crate::storage::RunSummary;
use crate::utils::format_size;

pub fn print_list(registry: &PluginRegistry, catalog: Option<&SiteCatalog>) {
    println!("{}", style("Plugins").bold());
    for name in registry.list_available() {
        println!("  {}", name);
    }

    let Some(catalog) = catalog else {
        return;
    };
    println!("\n{}", style("Sites").bold());
    if catalog.sites.is_empty() {
        println!("  {}", style("(none configured)").dim());
    }
    for site in &catalog.sites {
        let js = if site.requires_js { " [js]" } else { "" };
        println!(
            "  {:<16} {:<20} {}{}",
            site.code,
            site.plugin_name,
            site.display_name,
            style(js).dim()
        );
    }
    for invalid in &catalog.invalid {
        println!("  {} {} {}", style("✗").red(), invalid.label, invalid.error);
    }
}

pub fn print_summary(summary: &RunSummary) {
    let totals = &summary.totals;
    println!();
    println!(
        "{} {} sites: {} completed, {} terminated, {} failed, {} skipped; {} records, {}",
        style("Summary").bold(),
        totals.sites,
        totals.completed,
        totals.terminated,
        totals.failed,
        totals.skipped,
        totals.items,
        format_size(totals.bytes)
    );

    let truncated: Vec<&str> = summary
        .sites
        .iter()
        .filter(|r| r.truncated)
        .map(|r| r.code.as_str())
        .collect();
    if !truncated.is_empty() {
        println!(
            "{} Page cap reached (results may be partial): {}",
            status_icon(SiteStatus::Terminated),
            truncated.join(", ")
        );
    }

    if !summary.failing_sites.is_empty() {
        println!(
            "{} Failing sites: {}",
            status_icon(SiteStatus::Failed),
            summary.failing_sites.join(", ")
        );
    }
    if summary.interrupted {
        println!("{} Interrupted; rerun to resume", style("!").yellow());
    }
}
