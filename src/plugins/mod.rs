//! Board parser plugins.
//!
//! A plugin knows how one family of boards paginates, how its list rows
//! are laid out, and where a detail page keeps its body, contact fields
//! and attachments. Plugins are synchronous: they receive an already
//! fetched [`Document`] and never touch the network.
//!
//! Built-in plugins:
//! - `standard_table_v1`: generic `<table>` boards
//! - `bid_board_v1`: bid and procurement notices
//! - `council_minutes_v1`: council meeting minutes
//! - `dynamic_list_v1`: JavaScript-rendered `div`/`li` boards

mod bid_board;
mod council_minutes;
pub mod detail;
mod dynamic_list;
mod registry;
mod standard_table;
pub mod table;

use std::sync::LazyLock;

use regex::Regex;

use crate::config::SiteDescriptor;
use crate::error::Result;
use crate::models::{DateRange, EnrichedRecord, ListItem};
use crate::scrapers::Document;
use crate::utils::text::is_notice_number;

pub use bid_board::BidBoard;
pub use council_minutes::CouncilMinutes;
pub use dynamic_list::DynamicList;
pub use registry::{PluginCtor, PluginRegistry, BUILTIN_PLUGINS};
pub use standard_table::StandardTable;

/// Date bounds a board can filter on the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerDateFilter {
    None,
    StartOnly,
    EndOnly,
    Both,
}

impl ServerDateFilter {
    /// Restrict a range to the bounds the server understands. The engine
    /// filters the rest client-side.
    pub fn apply(self, range: &DateRange) -> DateRange {
        match self {
            ServerDateFilter::None => DateRange::default(),
            ServerDateFilter::StartOnly => DateRange::new(range.start, None),
            ServerDateFilter::EndOnly => DateRange::new(None, range.end),
            ServerDateFilter::Both => *range,
        }
    }
}

/// Per-board parsing and parameterisation.
pub trait BoardPlugin: Send + Sync {
    /// Registry name, e.g. `standard_table_v1`.
    fn name(&self) -> &str;

    /// Whether list pages must be rendered by a browser.
    fn requires_js(&self) -> bool {
        false
    }

    fn server_date_filter(&self) -> ServerDateFilter {
        ServerDateFilter::Both
    }

    /// Query parameters for list page `page` (1-based).
    fn build_params(&self, page: u32, range: &DateRange) -> Vec<(String, String)>;

    /// Rows of a list page in document order.
    fn parse_list(&self, doc: &Document) -> Result<Vec<ListItem>>;

    /// Enrich a row from its detail page. Absent fields stay `None`.
    fn parse_detail(&self, doc: &Document, item: ListItem) -> Result<EnrichedRecord>;

    /// Pinned notices are emitted but never end the walk.
    fn is_pinned(&self, item: &ListItem) -> bool {
        item.pinned || is_notice_number(&item.number)
    }
}

/// Default list parameters: the site's template, or a bare page index.
pub(crate) fn template_params(
    site: &SiteDescriptor,
    page: u32,
    range: &DateRange,
    page_key: &str,
) -> Vec<(String, String)> {
    if site.list_params.is_empty() {
        return vec![(page_key.to_string(), page.to_string())];
    }
    site.render_params(page, range)
}

static JS_CALL_ARGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'([^']*)'|"([^"]*)"|(-?\d+)"#).unwrap());

/// Arguments of the first call in a `javascript:` href or `onclick`
/// handler, e.g. `fn_view('2024', 17)` → `["2024", "17"]`.
pub fn js_call_args(script: &str) -> Vec<String> {
    let Some(open) = script.find('(') else {
        return Vec::new();
    };
    if script[..open].trim_end().ends_with("void") {
        return Vec::new();
    }
    let inner = &script[open + 1..];
    let inner = match inner.find(')') {
        Some(close) => &inner[..close],
        None => inner,
    };
    JS_CALL_ARGS
        .captures_iter(inner)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Resolve a row link to `(detail_url, docid)`.
///
/// Plain links are resolved against the list page. `javascript:` links
/// and `onclick` handlers yield their call arguments as the docid and,
/// when the site has a `detail_template`, a detail URL.
pub(crate) fn resolve_link(
    site: &SiteDescriptor,
    href: Option<&str>,
    onclick: Option<&str>,
) -> (Option<String>, Option<String>) {
    if let Some(href) = href.map(str::trim) {
        if !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:") {
            return (site.resolve(href), None);
        }
    }

    let mut args = href
        .filter(|h| h.trim_start().starts_with("javascript:"))
        .map(js_call_args)
        .unwrap_or_default();
    if args.is_empty() {
        args = onclick.map(js_call_args).unwrap_or_default();
    }
    if args.is_empty() {
        return (None, None);
    }
    (site.detail_from_args(&args), Some(args.join("-")))
}
