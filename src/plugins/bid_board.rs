//! Bid and procurement notice boards.
//!
//! These boards only accept a start date on the server; the end bound is
//! left to the engine's client-side filter.

use super::detail::find_label;
use super::standard_table::{enrich_common, parse_table_list};
use super::{template_params, BoardPlugin, ServerDateFilter};
use crate::config::SiteDescriptor;
use crate::error::Result;
use crate::models::{DateRange, EnrichedRecord, ListItem};
use crate::scrapers::Document;

pub const NAME: &str = "bid_board_v1";

const OFFICE_LABELS: &[&str] = &["관리소", "발주기관", "공고기관", "관리기관", "수요기관"];

pub struct BidBoard {
    site: SiteDescriptor,
}

impl BidBoard {
    pub fn new(site: &SiteDescriptor) -> Self {
        Self { site: site.clone() }
    }
}

impl BoardPlugin for BidBoard {
    fn name(&self) -> &str {
        NAME
    }

    fn server_date_filter(&self) -> ServerDateFilter {
        ServerDateFilter::StartOnly
    }

    fn build_params(&self, page: u32, range: &DateRange) -> Vec<(String, String)> {
        let range = self.server_date_filter().apply(range);
        template_params(&self.site, page, &range, "page")
    }

    fn parse_list(&self, doc: &Document) -> Result<Vec<ListItem>> {
        Ok(parse_table_list(&self.site, doc))
    }

    fn parse_detail(&self, doc: &Document, item: ListItem) -> Result<EnrichedRecord> {
        let (mut record, pairs) = enrich_common(doc, item);
        record.forest_office =
            find_label(&pairs, OFFICE_LABELS).or_else(|| record.item.department.clone());
        Ok(record)
    }
}
