//! Detail-page extraction shared by the table plugins.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::table::{element_text, has_class_fragment};
use crate::utils::text::{clean_body_text, non_empty};

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

selector!(LINK, "a[href]");
selector!(ROW, "tr");
selector!(TH, "th");
selector!(TD, "td");
selector!(DT, "dt");
selector!(BODY, "body");
selector!(NOISE, "script, style, noscript");

/// Content containers, most specific first.
const CONTENT_SELECTORS: &[&str] = &[
    ".view_content",
    ".view-content",
    ".view_cont",
    ".board_view .content",
    ".bbs_view .content",
    ".board-view-content",
    "td.content",
    "div.contents_view",
    ".view_con",
    "#content .view",
    "article",
];

const DOC_EXTENSIONS: &[&str] = &[
    ".pdf", ".hwp", ".hwpx", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".zip", ".txt",
];

static DOWNLOAD_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(download|filedown|file_down|atchfile|fileid=|getfile|attach)").unwrap()
});

/// Main text and HTML of the post body.
pub struct Content {
    pub text: String,
    pub html: String,
}

/// Locate the post body, falling back to `<body>`.
pub fn extract_content(html: &Html) -> Option<Content> {
    let element = CONTENT_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|sel| html.select(&sel).find(|el| !element_text(*el).is_empty()))
        .or_else(|| html.select(&BODY).next())?;

    let text = clean_body_text(&visible_text(element));
    if text.is_empty() {
        return None;
    }
    Some(Content {
        text,
        html: element.html(),
    })
}

/// Text with script/style contents removed and block breaks kept.
fn visible_text(element: ElementRef<'_>) -> String {
    let noise: Vec<_> = element.select(&NOISE).map(|n| n.id()).collect();
    let mut out = String::new();
    for node in element.descendants() {
        if node.ancestors().any(|a| noise.contains(&a.id())) {
            continue;
        }
        match node.value() {
            scraper::Node::Text(text) => out.push_str(text),
            scraper::Node::Element(el)
                if matches!(el.name(), "br" | "p" | "div" | "tr" | "li" | "h1" | "h2" | "h3") =>
            {
                out.push('\n')
            }
            _ => {}
        }
    }
    out
}

/// Attachment URLs, absolute and de-duplicated in document order.
pub fn extract_attachments(html: &Html, page_url: &str) -> Vec<String> {
    let base = Url::parse(page_url).ok();
    let mut found: Vec<String> = Vec::new();

    for link in html.select(&LINK) {
        let href = link.value().attr("href").unwrap_or("");
        let text = element_text(link).to_lowercase();
        let lower = href.to_lowercase();
        let path = lower.split(['?', '#']).next().unwrap_or("");
        if DOWNLOAD_HREF.is_match(href)
            || DOC_EXTENSIONS.iter().any(|ext| path.ends_with(ext) || text.ends_with(ext))
        {
            push_link(&mut found, base.as_ref(), href);
        }
    }

    if found.is_empty() {
        // boards that only mark the file box with a class
        for link in html.select(&LINK) {
            let in_file_box = link
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|el| has_class_fragment(el, "file") || has_class_fragment(el, "attach"));
            if in_file_box {
                push_link(&mut found, base.as_ref(), link.value().attr("href").unwrap_or(""));
            }
        }
    }

    found
}

fn push_link(found: &mut Vec<String>, base: Option<&Url>, href: &str) {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return;
    }
    let absolute = match base {
        Some(base) => match base.join(href) {
            Ok(u) => u.to_string(),
            Err(_) => return,
        },
        None => href.to_string(),
    };
    if !found.contains(&absolute) {
        found.push(absolute);
    }
}

/// `th/td` and `dt/dd` label-value pairs.
pub fn label_pairs(html: &Html) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for row in html.select(&ROW) {
        let ths: Vec<_> = row.select(&TH).collect();
        let tds: Vec<_> = row.select(&TD).collect();
        for (th, td) in ths.iter().zip(tds.iter()) {
            let label = element_text(*th);
            if !label.is_empty() {
                pairs.push((label, element_text(*td)));
            }
        }
    }

    for dt in html.select(&DT) {
        let value = dt
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "dd" || el.value().name() == "dt")
            .filter(|el| el.value().name() == "dd");
        if let Some(dd) = value {
            pairs.push((element_text(dt), element_text(dd)));
        }
    }

    pairs
}

/// First non-empty value whose label contains any of `labels`.
pub fn find_label(pairs: &[(String, String)], labels: &[&str]) -> Option<String> {
    pairs
        .iter()
        .filter(|(label, _)| {
            let compact: String = label.chars().filter(|c| !c.is_whitespace()).collect();
            labels.iter().any(|l| compact.contains(l))
        })
        .find_map(|(_, value)| non_empty(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL: &str = r#"<html><body>
        <div class="board_view">
          <table>
            <tr><th>담당자</th><td>김주무관</td><th>연락처</th><td>02-123-4567</td></tr>
            <tr><th>담당 부서</th><td>의사담당관</td></tr>
          </table>
          <dl><dt>관리기관</dt><dd>북부지방산림청</dd></dl>
          <div class="view_content"><p>첫 문단입니다.</p><script>var x = 1;</script><p>둘째 문단.</p></div>
          <ul class="file_list">
            <li><a href="/cmm/fileDown.do?atchFileId=F1&fileSn=0">회의록.hwp</a></li>
            <li><a href="./files/minutes.pdf">회의록.pdf</a></li>
            <li><a href="/cmm/fileDown.do?atchFileId=F1&fileSn=0">중복</a></li>
          </ul>
          <a href="/list.do">목록</a>
        </div>
    </body></html>"#;

    #[test]
    fn test_content_skips_scripts() {
        let html = Html::parse_document(DETAIL);
        let content = extract_content(&html).unwrap();
        assert!(content.text.contains("첫 문단입니다."));
        assert!(content.text.contains("둘째 문단."));
        assert!(!content.text.contains("var x"));
        assert!(content.html.contains("view_content"));
    }

    #[test]
    fn test_attachments_are_absolute_and_unique() {
        let html = Html::parse_document(DETAIL);
        let files = extract_attachments(&html, "https://council.example.go.kr/board/view.do?id=1");
        assert_eq!(
            files,
            vec![
                "https://council.example.go.kr/cmm/fileDown.do?atchFileId=F1&fileSn=0".to_string(),
                "https://council.example.go.kr/board/files/minutes.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn test_file_box_fallback() {
        let html = Html::parse_document(
            r#"<div class="attach"><a href="/dl?k=9">자료</a></div><a href="/home">홈</a>"#,
        );
        let files = extract_attachments(&html, "https://a.go.kr/view");
        assert_eq!(files, vec!["https://a.go.kr/dl?k=9".to_string()]);
    }

    #[test]
    fn test_label_pairs() {
        let html = Html::parse_document(DETAIL);
        let pairs = label_pairs(&html);
        assert_eq!(find_label(&pairs, &["담당자"]).as_deref(), Some("김주무관"));
        assert_eq!(find_label(&pairs, &["연락처", "전화"]).as_deref(), Some("02-123-4567"));
        assert_eq!(find_label(&pairs, &["담당부서"]).as_deref(), Some("의사담당관"));
        assert_eq!(find_label(&pairs, &["관리기관"]).as_deref(), Some("북부지방산림청"));
        assert_eq!(find_label(&pairs, &["팩스"]), None);
    }
}
