//! Header-driven parsing of `<table>` boards.
//!
//! The header row is looked for in `<thead>` first, then as the first
//! `<tbody>` row when that row is made of `<th>` cells. Labels are matched
//! by substring against a canonical set. Positional indices are used only
//! when no header row exists.

use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::utils::text::collapse_whitespace;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

selector!(TABLE, "table");
selector!(THEAD_ROW, "thead tr");
selector!(TBODY_ROW, "tbody > tr");
selector!(ANY_ROW, "tr");
selector!(CELL, "th, td");
selector!(TH, "th");
selector!(TD, "td");
selector!(LINK, "a");
selector!(IMG, "img");

/// Canonical list columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Number,
    Title,
    Department,
    Date,
    Attachment,
    Views,
    Session,
    MeetingOrder,
    MeetingType,
}

/// Label fragments per column, checked in order. More specific fragments
/// come first so `회의일자` lands on `Date` and `담당부서` on `Department`.
const LABELS: &[(Column, &[&str])] = &[
    (Column::Attachment, &["첨부", "파일", "file"]),
    (Column::Views, &["조회", "view", "hit"]),
    (Column::Date, &["일자", "날짜", "등록", "작성일", "게시일", "공고일", "date"]),
    (Column::Department, &["부서", "담당", "기관", "발주", "작성자", "dept"]),
    (Column::MeetingOrder, &["차수"]),
    (Column::Session, &["회기", "대수", "session"]),
    (Column::MeetingType, &["회의명", "회의구분", "위원회", "구분"]),
    (Column::Title, &["제목", "title", "공고명", "안건"]),
    (Column::Number, &["번호", "순번"]),
];

/// Columns assumed when no header row can be found.
const POSITIONAL: &[Column] = &[
    Column::Number,
    Column::Title,
    Column::Department,
    Column::Date,
    Column::Attachment,
    Column::Views,
];

/// Classify one header label.
pub fn classify_label(label: &str) -> Option<Column> {
    let label: String = label
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if label.is_empty() {
        return None;
    }
    // "No", "No." and "NO" but not "Notice"
    if label.trim_end_matches('.') == "no" {
        return Some(Column::Number);
    }
    if is_person_label(&label) {
        return Some(Column::Department);
    }
    LABELS
        .iter()
        .find(|(_, fragments)| fragments.iter().any(|f| label.contains(f)))
        .map(|(column, _)| *column)
}

/// `등록자`, `작성자명`, `신청인`: who posted the row, not when.
fn is_person_label(label: &str) -> bool {
    let stem = label.trim_end_matches('명');
    (stem.ends_with('자') && !stem.ends_with("일자")) || stem.ends_with('인')
}

/// Column → cell index mapping for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<Column, usize>,
    positional: bool,
}

impl ColumnMap {
    /// Build from header labels; the first cell claiming a column wins.
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut columns = HashMap::new();
        for (index, label) in labels.into_iter().enumerate() {
            if let Some(column) = classify_label(label) {
                columns.entry(column).or_insert(index);
            }
        }
        Self {
            columns,
            positional: false,
        }
    }

    pub fn positional() -> Self {
        Self {
            columns: POSITIONAL.iter().enumerate().map(|(i, c)| (*c, i)).collect(),
            positional: true,
        }
    }

    pub fn get(&self, column: Column) -> Option<usize> {
        self.columns.get(&column).copied()
    }

    pub fn is_positional(&self) -> bool {
        self.positional
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A data row split into cells.
#[derive(Debug, Clone)]
pub struct TableRow<'a> {
    pub row: ElementRef<'a>,
    pub cells: Vec<ElementRef<'a>>,
}

impl<'a> TableRow<'a> {
    pub fn cell(&self, map: &ColumnMap, column: Column) -> Option<ElementRef<'a>> {
        map.get(column).and_then(|i| self.cells.get(i).copied())
    }

    /// Collapsed text of a mapped cell.
    pub fn text(&self, map: &ColumnMap, column: Column) -> Option<String> {
        self.cell(map, column).map(element_text)
    }

    /// Row-level notice markup (`class="notice"` and friends).
    pub fn has_notice_class(&self) -> bool {
        has_class_fragment(self.row, "notice")
            || self
                .cells
                .first()
                .map(|c| has_class_fragment(*c, "notice"))
                .unwrap_or(false)
    }
}

/// A parsed board table.
pub struct BoardTable<'a> {
    pub columns: ColumnMap,
    pub rows: Vec<TableRow<'a>>,
}

/// Parse the most likely board table in a document.
///
/// Picks the first table whose header maps a title column, else the table
/// with the most data rows.
pub fn parse_board_table(html: &Html) -> Option<BoardTable<'_>> {
    let mut fallback: Option<BoardTable<'_>> = None;

    for table in html.select(&TABLE) {
        // Skip layout tables wrapping the real board.
        if table.select(&TABLE).next().is_some() {
            continue;
        }
        let parsed = parse_table(table);
        if parsed.columns.get(Column::Title).is_some() && !parsed.columns.is_positional() {
            return Some(parsed);
        }
        let better = match &fallback {
            Some(current) => parsed.rows.len() > current.rows.len(),
            None => true,
        };
        if better {
            fallback = Some(parsed);
        }
    }
    fallback
}

/// Parse a single `<table>` element.
pub fn parse_table(table: ElementRef<'_>) -> BoardTable<'_> {
    let thead_header = table.select(&THEAD_ROW).next();

    let mut body_rows: Vec<ElementRef<'_>> = table.select(&TBODY_ROW).collect();
    if body_rows.is_empty() {
        body_rows = table
            .select(&ANY_ROW)
            .filter(|row| !is_inside_thead(*row))
            .collect();
    }

    let (columns, skip_first) = match thead_header {
        Some(header) => (labels_map(header), false),
        None => match body_rows.first() {
            Some(first) if is_header_row(*first) => (labels_map(*first), true),
            _ => (ColumnMap::positional(), false),
        },
    };

    let rows = body_rows
        .into_iter()
        .skip(usize::from(skip_first))
        .filter(|row| !is_header_row(*row))
        .map(|row| TableRow {
            row,
            cells: row.select(&CELL).filter(|c| is_direct_cell(*c, row)).collect(),
        })
        .filter(|row| row.cells.len() >= 2)
        .collect();

    let columns = if columns.is_empty() {
        ColumnMap::positional()
    } else {
        columns
    };

    BoardTable { columns, rows }
}

fn labels_map(header: ElementRef<'_>) -> ColumnMap {
    let labels: Vec<String> = header.select(&CELL).map(element_text).collect();
    ColumnMap::from_labels(labels.iter().map(String::as_str))
}

/// A row made only of `<th>` cells, none of them `scope="row"`.
fn is_header_row(row: ElementRef<'_>) -> bool {
    let has_td = row.select(&TD).next().is_some();
    let mut ths = row.select(&TH).peekable();
    if has_td || ths.peek().is_none() {
        return false;
    }
    !ths.any(|th| th.value().attr("scope") == Some("row"))
}

fn is_inside_thead(row: ElementRef<'_>) -> bool {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().name() == "thead")
}

fn is_direct_cell(cell: ElementRef<'_>, row: ElementRef<'_>) -> bool {
    cell.parent().map(|p| p.id()) == Some(row.id())
}

/// Collapsed visible text of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Whether any class on the element contains `fragment`.
pub fn has_class_fragment(el: ElementRef<'_>, fragment: &str) -> bool {
    el.value().classes().any(|c| c.to_lowercase().contains(fragment))
}

/// First link in an element: `(href, onclick)`.
pub fn first_link(el: ElementRef<'_>) -> Option<(Option<String>, Option<String>)> {
    let link = el.select(&LINK).next()?;
    let href = link.value().attr("href").map(str::to_string);
    let onclick = link
        .value()
        .attr("onclick")
        .or_else(|| el.value().attr("onclick"))
        .map(str::to_string);
    Some((href, onclick))
}

/// Attachment indicator in a cell: a link, an icon, or non-placeholder text.
pub fn cell_has_attachment(cell: ElementRef<'_>) -> bool {
    if cell.select(&LINK).next().is_some() || cell.select(&IMG).next().is_some() {
        return true;
    }
    if has_class_fragment(cell, "file") || has_class_fragment(cell, "attach") {
        return true;
    }
    let text = element_text(cell);
    !(text.is_empty() || text == "-" || text == "0" || text.eq_ignore_ascii_case("x"))
}

/// Attachment icons anywhere in a row (boards without an attachment column).
pub fn row_has_attachment_icon(row: ElementRef<'_>) -> bool {
    row.select(&IMG).any(|img| {
        let alt = img.value().attr("alt").unwrap_or("");
        let src = img.value().attr("src").unwrap_or("").to_lowercase();
        alt.contains("첨부") || alt.contains("파일") || src.contains("file") || src.contains("attach")
    }) || row
        .select(&CELL)
        .any(|c| has_class_fragment(c, "attach") || has_class_fragment(c, "file"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_labels() {
        assert_eq!(classify_label("번호"), Some(Column::Number));
        assert_eq!(classify_label("No."), Some(Column::Number));
        assert_eq!(classify_label("제 목"), Some(Column::Title));
        assert_eq!(classify_label("제목"), Some(Column::Title));
        assert_eq!(classify_label("담당부서"), Some(Column::Department));
        assert_eq!(classify_label("등록일"), Some(Column::Date));
        assert_eq!(classify_label("회의일자"), Some(Column::Date));
        assert_eq!(classify_label("첨부파일"), Some(Column::Attachment));
        assert_eq!(classify_label("조회수"), Some(Column::Views));
        assert_eq!(classify_label("Views"), Some(Column::Views));
        assert_eq!(classify_label("Notice"), None);
    }

    #[test]
    fn test_person_labels_are_not_dates() {
        assert_eq!(classify_label("등록자"), Some(Column::Department));
        assert_eq!(classify_label("작성자명"), Some(Column::Department));
        assert_eq!(classify_label("담당자"), Some(Column::Department));
        assert_eq!(classify_label("등록일자"), Some(Column::Date));

        let map = ColumnMap::from_labels(["번호", "제목", "등록자", "등록일"]);
        assert_eq!(map.get(Column::Department), Some(2));
        assert_eq!(map.get(Column::Date), Some(3));
    }

    #[test]
    fn test_thead_header() {
        let html = Html::parse_document(
            r#"<table>
                <thead><tr><th>번호</th><th>제목</th><th>등록일</th><th>조회</th></tr></thead>
                <tbody>
                  <tr><td>2</td><td><a href="v?id=2">둘</a></td><td>2024-03-02</td><td>5</td></tr>
                  <tr><td>1</td><td><a href="v?id=1">하나</a></td><td>2024-03-01</td><td>7</td></tr>
                </tbody></table>"#,
        );
        let table = parse_board_table(&html).unwrap();
        assert_eq!(table.columns.get(Column::Date), Some(2));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].text(&table.columns, Column::Title).as_deref(), Some("둘"));
    }

    #[test]
    fn test_tbody_th_header_row_is_not_data() {
        let html = Html::parse_document(
            r#"<table><tbody>
                <tr><th>No</th><th>Title</th><th>Date</th></tr>
                <tr><td>9</td><td>아홉</td><td>2024-01-09</td></tr>
            </tbody></table>"#,
        );
        let table = parse_board_table(&html).unwrap();
        assert!(!table.columns.is_positional());
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].text(&table.columns, Column::Number).as_deref(), Some("9"));
    }

    #[test]
    fn test_scope_row_cells_are_data() {
        let html = Html::parse_document(
            r#"<table>
                <thead><tr><th>번호</th><th>제목</th><th>작성일</th></tr></thead>
                <tbody><tr><th scope="row">15</th><td>열다섯</td><td>2024-02-15</td></tr></tbody>
            </table>"#,
        );
        let table = parse_board_table(&html).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].text(&table.columns, Column::Number).as_deref(), Some("15"));
        assert_eq!(table.rows[0].text(&table.columns, Column::Date).as_deref(), Some("2024-02-15"));
    }

    #[test]
    fn test_positional_fallback() {
        let html = Html::parse_document(
            r#"<table>
                <tr><td>3</td><td>셋</td><td>총무과</td><td>2024-01-03</td></tr>
                <tr><td colspan="4">등록된 게시물이 없습니다.</td></tr>
            </table>"#,
        );
        let table = parse_board_table(&html).unwrap();
        assert!(table.columns.is_positional());
        assert_eq!(table.rows.len(), 1);
        assert_eq!(
            table.rows[0].text(&table.columns, Column::Department).as_deref(),
            Some("총무과")
        );
        assert_eq!(table.rows[0].text(&table.columns, Column::Views), None);
    }

    #[test]
    fn test_attachment_detection() {
        let html = Html::parse_document(
            r#"<table><thead><tr><th>번호</th><th>제목</th><th>첨부</th></tr></thead><tbody>
                <tr class="notice"><td></td><td>공지</td><td><img src="/img/ico_file.gif" alt="첨부파일"></td></tr>
                <tr><td>1</td><td>일반</td><td>-</td></tr>
            </tbody></table>"#,
        );
        let table = parse_board_table(&html).unwrap();
        let attach = |i: usize| cell_has_attachment(table.rows[i].cell(&table.columns, Column::Attachment).unwrap());
        assert!(attach(0));
        assert!(!attach(1));
        assert!(table.rows[0].has_notice_class());
        assert!(!table.rows[1].has_notice_class());
    }
}
