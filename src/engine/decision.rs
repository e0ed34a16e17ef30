//! What the page loop does with one list row.

use crate::config::SiteDescriptor;
use crate::models::{DateRange, ListItem};
use crate::plugins::BoardPlugin;
use crate::repository::DocidIndex;

/// Outcome of inspecting one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemDecision {
    /// New row: fetch its detail page and persist it under this docid.
    Emit { docid: String },
    /// Docid already indexed by an earlier page or run.
    AlreadySeen,
    /// Rejected by the site's filter rules.
    Filtered,
    /// Dated after the end bound.
    AfterEnd,
    /// Older than the cutoff and not pinned: the walk ends here.
    StopAtCutoff,
}

/// Classify a row. Pinned notices never trigger the cutoff and are not
/// subject to the end bound; filtered rows never count toward the cutoff.
pub fn decide(
    site: &SiteDescriptor,
    plugin: &dyn BoardPlugin,
    range: &DateRange,
    index: &DocidIndex,
    item: &ListItem,
) -> ItemDecision {
    if !site.accepts(item) {
        return ItemDecision::Filtered;
    }

    if !plugin.is_pinned(item) {
        if let Some(date) = item.post_date {
            if range.is_before_cutoff(date) {
                return ItemDecision::StopAtCutoff;
            }
            if range.is_after_end(date) {
                return ItemDecision::AfterEnd;
            }
        }
    }

    let docid = item.effective_docid();
    if index.contains(&docid) {
        return ItemDecision::AlreadySeen;
    }
    ItemDecision::Emit { docid }
}
