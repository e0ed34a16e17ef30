//! Boards rendered by JavaScript as `<li>`/`<div>` rows instead of a table.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::standard_table::enrich_common;
use super::table::{element_text, first_link, has_class_fragment, row_has_attachment_icon};
use super::{resolve_link, template_params, BoardPlugin};
use crate::config::SiteDescriptor;
use crate::error::Result;
use crate::models::{DateRange, EnrichedRecord, ListItem};
use crate::scrapers::Document;
use crate::utils::dates::extract_date;
use crate::utils::text::{extract_views, non_empty, NOTICE_MARKER};

pub const NAME: &str = "dynamic_list_v1";

/// Row containers, most specific first. The first one that matches any
/// element wins.
const ROW_SELECTORS: &[&str] = &[
    "ul.board_list > li",
    "ul.bbs_list > li",
    "ul.list_board > li",
    ".board-list > li",
    ".board_list > .item",
    ".list_wrap .list_item",
    "div.list_item",
    "li.list_item",
];

const TITLE_SELECTORS: &[&str] = &[".title", ".subject", ".tit", ".sbj", "strong", "a"];
const DATE_SELECTORS: &[&str] = &[".date", ".day", ".reg_date", "time"];
const DEPT_SELECTORS: &[&str] = &[".dept", ".depart", ".writer", ".org"];
const VIEWS_SELECTORS: &[&str] = &[".hit", ".views", ".view_cnt", ".count"];
const NUMBER_SELECTORS: &[&str] = &[".num", ".no", ".number"];

static COMPILED_ROWS: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(ROW_SELECTORS));
static COMPILED_TITLE: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(TITLE_SELECTORS));
static COMPILED_DATE: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(DATE_SELECTORS));
static COMPILED_DEPT: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(DEPT_SELECTORS));
static COMPILED_VIEWS: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(VIEWS_SELECTORS));
static COMPILED_NUMBER: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(NUMBER_SELECTORS));

fn compile(list: &[&str]) -> Vec<Selector> {
    list.iter().filter_map(|css| Selector::parse(css).ok()).collect()
}

/// Text of the first non-empty match among `selectors` inside `row`.
fn field(row: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        row.select(sel)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

fn find_rows(html: &Html) -> Vec<ElementRef<'_>> {
    COMPILED_ROWS
        .iter()
        .map(|sel| html.select(sel).collect::<Vec<_>>())
        .find(|rows| !rows.is_empty())
        .unwrap_or_default()
}

pub struct DynamicList {
    site: SiteDescriptor,
}

impl DynamicList {
    pub fn new(site: &SiteDescriptor) -> Self {
        Self { site: site.clone() }
    }

    fn row_to_item(&self, row: ElementRef<'_>) -> ListItem {
        let title = field(row, &COMPILED_TITLE).unwrap_or_default();

        let (href, onclick) = first_link(row)
            .unwrap_or((None, row.value().attr("onclick").map(str::to_string)));
        let (detail_url, docid) = resolve_link(&self.site, href.as_deref(), onclick.as_deref());

        // Without a date element the whole row text is scanned.
        let date_text = field(row, &COMPILED_DATE).unwrap_or_else(|| element_text(row));
        let (post_date, post_date_str) = extract_date(&date_text, self.site.date_format.as_deref());
        let post_date_str = if post_date.is_some() { post_date_str } else { String::new() };

        ListItem {
            number: field(row, &COMPILED_NUMBER).unwrap_or_default(),
            title,
            department: field(row, &COMPILED_DEPT).and_then(|t| non_empty(&t)),
            post_date,
            post_date_str,
            views: field(row, &COMPILED_VIEWS).map(|t| extract_views(&t)),
            has_attachment: row_has_attachment_icon(row),
            detail_url,
            docid,
            pinned: has_class_fragment(row, "notice"),
            meeting: None,
        }
    }
}

impl BoardPlugin for DynamicList {
    fn name(&self) -> &str {
        NAME
    }

    fn requires_js(&self) -> bool {
        true
    }

    fn build_params(&self, page: u32, range: &DateRange) -> Vec<(String, String)> {
        let range = self.server_date_filter().apply(range);
        template_params(&self.site, page, &range, "page")
    }

    fn parse_list(&self, doc: &Document) -> Result<Vec<ListItem>> {
        let html = doc.html();
        Ok(find_rows(&html)
            .into_iter()
            .map(|row| self.row_to_item(row))
            .filter(|item| !item.title.is_empty())
            .collect())
    }

    fn parse_detail(&self, doc: &Document, item: ListItem) -> Result<EnrichedRecord> {
        let (record, _) = enrich_common(doc, item);
        Ok(record)
    }

    /// Card layouts seldom show a number, so only explicit markers count.
    fn is_pinned(&self, item: &ListItem) -> bool {
        item.pinned || item.number.contains(NOTICE_MARKER) || item.title.starts_with("[공지]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn site() -> SiteDescriptor {
        SiteDescriptor {
            code: "spa".into(),
            display_name: "동적게시판".into(),
            base_url: "https://spa.example.go.kr".into(),
            list_path: "/board".into(),
            plugin_name: NAME.into(),
            detail_template: Some("/board/view?id={id}".into()),
            ..Default::default()
        }
    }

    const LIST: &str = r#"<div id="app"><ul class="board_list">
        <li class="notice"><a href="/board/view?id=1"><strong class="title">[공지] 시스템 안내</strong></a><span class="date">2020.01.02</span></li>
        <li><a href="javascript:;" onclick="openView(88)"><span class="title">예산안 심사 결과</span></a>
            <span class="dept">예산담당관</span><span class="date">2024.04.11</span><span class="hit">조회 1,204</span>
            <img src="/img/icon_file.png" alt="첨부"></li>
        <li><span class="title">날짜 없는 글</span></li>
    </ul></div>"#;

    #[test]
    fn test_card_rows() {
        let plugin = DynamicList::new(&site());
        assert!(plugin.requires_js());
        let items = plugin
            .parse_list(&Document::new("https://spa.example.go.kr/board", LIST))
            .unwrap();
        assert_eq!(items.len(), 3);

        assert!(plugin.is_pinned(&items[0]));
        assert_eq!(items[0].detail_url.as_deref(), Some("https://spa.example.go.kr/board/view?id=1"));

        let row = &items[1];
        assert!(!plugin.is_pinned(row));
        assert_eq!(row.title, "예산안 심사 결과");
        assert_eq!(row.docid.as_deref(), Some("88"));
        assert_eq!(row.detail_url.as_deref(), Some("https://spa.example.go.kr/board/view?id=88"));
        assert_eq!(row.department.as_deref(), Some("예산담당관"));
        assert_eq!(row.post_date.map(|d| d.date()), NaiveDate::from_ymd_opt(2024, 4, 11));
        assert_eq!(row.views, Some(1204));
        assert!(row.has_attachment);

        assert_eq!(items[2].post_date, None);
        assert_eq!(items[2].post_date_str, "");
        assert!(!items[2].has_attachment);
    }

    #[test]
    fn test_no_rows() {
        let plugin = DynamicList::new(&site());
        let doc = Document::new("https://spa.example.go.kr/board", "<div id=\"app\"></div>");
        assert!(plugin.parse_list(&doc).unwrap().is_empty());
    }
}
