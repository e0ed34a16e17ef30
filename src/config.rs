//! Runtime settings and the site catalog.
//!
//! [`Settings`] carries the politeness and batch knobs (delays, retries,
//! page cap, worker count) with environment overrides. [`SiteDescriptor`]
//! describes one board; descriptors are loaded from a YAML, JSON or TOML
//! file and never change while a run is in progress.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, Result};
use crate::models::{DateRange, ListItem};
use crate::utils::dates::{MAX_YEAR, MIN_YEAR};

/// Site file used when neither `--config` nor `HARVEST_CONFIG` is given.
pub const DEFAULT_CONFIG_FILE: &str = "sites.yaml";
/// Output directory used when neither `--output` nor `HARVEST_OUTPUT_DIR` is given.
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

pub const MIN_REQUEST_DELAY: Duration = Duration::from_millis(500);
pub const MIN_PAGE_DELAY: Duration = Duration::from_secs(1);

/// Knobs shared by every site in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub output_dir: PathBuf,
    /// Overrides the default descriptive user agent.
    pub user_agent: Option<String>,
    pub timeout: Duration,
    pub request_delay: Duration,
    pub page_delay: Duration,
    /// Total attempts per URL.
    pub max_retries: u32,
    pub max_pages: u32,
    pub workers: usize,
    pub site_timeout: Duration,
    /// Pages between incremental snapshots; 0 disables them.
    pub snapshot_every: u32,
    pub range: DateRange,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            user_agent: None,
            timeout: Duration::from_secs(10),
            request_delay: MIN_REQUEST_DELAY,
            page_delay: MIN_PAGE_DELAY,
            max_retries: 3,
            max_pages: 500,
            workers: 10,
            site_timeout: Duration::from_secs(300),
            snapshot_every: 10,
            range: DateRange::default(),
        }
    }
}

impl Settings {
    /// Defaults with `HARVEST_*` environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = get("HARVEST_OUTPUT_DIR").filter(|v| !v.trim().is_empty()) {
            self.output_dir = expand_path(&dir);
        }
        if let Some(ua) = get("HARVEST_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            self.user_agent = Some(ua.trim().to_string());
        }
        if let Some(v) = get("HARVEST_TIMEOUT_S") {
            self.timeout = parse_seconds("HARVEST_TIMEOUT_S", &v)?;
        }
        if let Some(v) = get("HARVEST_REQUEST_DELAY_S") {
            self.request_delay = parse_delay("HARVEST_REQUEST_DELAY_S", &v)?;
        }
        if let Some(v) = get("HARVEST_PAGE_DELAY_S") {
            self.page_delay = parse_delay("HARVEST_PAGE_DELAY_S", &v)?;
        }
        Ok(())
    }

    /// Check the settings before any site starts.
    pub fn validate(&self) -> Result<()> {
        if self.request_delay < MIN_REQUEST_DELAY {
            return Err(HarvestError::InvalidDelay(format!(
                "request delay {:.2}s is below the {:.1}s minimum",
                self.request_delay.as_secs_f64(),
                MIN_REQUEST_DELAY.as_secs_f64()
            )));
        }
        if self.page_delay < MIN_PAGE_DELAY {
            return Err(HarvestError::InvalidDelay(format!(
                "page delay {:.2}s is below the {:.1}s minimum",
                self.page_delay.as_secs_f64(),
                MIN_PAGE_DELAY.as_secs_f64()
            )));
        }
        if self.timeout.is_zero() {
            return Err(HarvestError::InvalidConfig("timeout must be positive".into()));
        }
        if self.max_retries == 0 {
            return Err(HarvestError::InvalidConfig("max retries must be at least 1".into()));
        }
        if self.max_pages == 0 {
            return Err(HarvestError::InvalidConfig("max pages must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(HarvestError::InvalidConfig("workers must be at least 1".into()));
        }
        validate_range(&self.range)
    }
}

fn validate_range(range: &DateRange) -> Result<()> {
    for bound in [range.start, range.end].into_iter().flatten() {
        if !year_in_range(bound) {
            return Err(HarvestError::DateRangeExceeded(format!(
                "{} is outside {}..={}",
                bound, MIN_YEAR, MAX_YEAR
            )));
        }
    }
    if let (Some(start), Some(end)) = (range.start, range.end) {
        if start > end {
            return Err(HarvestError::DateRangeExceeded(format!(
                "start {} is after end {}",
                start, end
            )));
        }
    }
    Ok(())
}

fn year_in_range(date: NaiveDate) -> bool {
    use chrono::Datelike;
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}

fn parse_seconds(name: &str, value: &str) -> Result<Duration> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| HarvestError::InvalidConfig(format!("{}: '{}' is not a number", name, value)))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| HarvestError::InvalidConfig(format!("{}: '{}' is out of range", name, value)))
}

fn parse_delay(name: &str, value: &str) -> Result<Duration> {
    parse_seconds(name, value)
        .map_err(|_| HarvestError::InvalidDelay(format!("{}: '{}'", name, value)))
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

/// A list-parameter template value. Strings may contain `{page}`,
/// `{page0}`, `{start}`, `{end}` or `{start:FMT}` / `{end:FMT}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    /// Render for a page; `None` when the value needs a date bound that
    /// the run does not have.
    pub fn render(&self, page: u32, range: &DateRange) -> Option<String> {
        match self {
            ParamValue::Int(i) => Some(i.to_string()),
            ParamValue::Float(f) => Some(f.to_string()),
            ParamValue::Bool(b) => Some(b.to_string()),
            ParamValue::Text(t) => render_template(t, page, range),
        }
    }
}

fn render_template(template: &str, page: u32, range: &DateRange) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return Some(out);
        };
        let placeholder = &after[..close];
        let (name, fmt) = match placeholder.split_once(':') {
            Some((name, fmt)) => (name, fmt),
            None => (placeholder, "%Y-%m-%d"),
        };
        match name {
            "page" => out.push_str(&page.to_string()),
            "page0" => out.push_str(&page.saturating_sub(1).to_string()),
            "start" => write!(out, "{}", range.start?.format(fmt)).ok()?,
            "end" => write!(out, "{}", range.end?.format(fmt)).ok()?,
            _ => {
                out.push('{');
                out.push_str(placeholder);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}

/// Date formats named by `{start:FMT}` / `{end:FMT}` placeholders.
fn template_date_formats(template: &str) -> Vec<&str> {
    let mut formats = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        if let Some((name, fmt)) = after[..close].split_once(':') {
            if name == "start" || name == "end" {
                formats.push(fmt);
            }
        }
        rest = &after[close + 1..];
    }
    formats
}

/// Reject strftime strings chrono cannot render or parse with.
fn check_date_format(code: &str, field: &str, fmt: &str) -> Result<()> {
    if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        return Err(HarvestError::InvalidConfig(format!(
            "{}: invalid date format '{}' in {}",
            code, fmt, field
        )));
    }
    Ok(())
}

/// Which list field a filter rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterColumn {
    #[default]
    Title,
    Department,
    Number,
}

/// Client-side row filter: keep rows whose column contains any `include`
/// term (when given) and none of the `exclude` terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    #[serde(default)]
    pub column: FilterColumn,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl FilterRule {
    pub fn matches(&self, item: &ListItem) -> bool {
        let value = match self.column {
            FilterColumn::Title => item.title.as_str(),
            FilterColumn::Department => item.department.as_deref().unwrap_or(""),
            FilterColumn::Number => item.number.as_str(),
        };
        if !self.include.is_empty() && !self.include.iter().any(|t| value.contains(t.as_str())) {
            return false;
        }
        !self.exclude.iter().any(|t| value.contains(t.as_str()))
    }
}

/// One board to harvest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    pub code: String,
    #[serde(alias = "name")]
    pub display_name: String,
    pub base_url: String,
    pub list_path: String,
    #[serde(alias = "plugin")]
    pub plugin_name: String,
    #[serde(default, alias = "list_params_template")]
    pub list_params: BTreeMap<String, ParamValue>,
    /// Forces the browser backend even if the plugin does not ask for it.
    #[serde(default)]
    pub requires_js: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    /// Detail link for boards that open posts from JavaScript, with `{id}`
    /// (first call argument) or `{0}`, `{1}`, ... placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_template: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_rules: Vec<FilterRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SiteDescriptor {
    /// Absolute URL of the list page.
    pub fn list_url(&self) -> Result<Url> {
        let base = Url::parse(&self.base_url).map_err(|e| {
            HarvestError::InvalidConfig(format!("{}: bad base_url '{}': {}", self.code, self.base_url, e))
        })?;
        base.join(&self.list_path).map_err(|e| {
            HarvestError::InvalidConfig(format!("{}: bad list_path '{}': {}", self.code, self.list_path, e))
        })
    }

    /// Resolve a possibly relative link against the list page.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        let base = self.list_url().ok()?;
        base.join(href).ok().map(|u| u.to_string())
    }

    /// Detail URL from `detail_template` and JavaScript call arguments.
    pub fn detail_from_args(&self, args: &[String]) -> Option<String> {
        let template = self.detail_template.as_deref()?;
        let first = args.first()?;
        let mut filled = template.replace("{id}", first);
        for (i, arg) in args.iter().enumerate() {
            filled = filled.replace(&format!("{{{}}}", i), arg);
        }
        if filled.contains('{') {
            return None;
        }
        self.resolve(&filled)
    }

    /// Query pairs from `list_params` for one page; entries needing an
    /// absent date bound are omitted.
    pub fn render_params(&self, page: u32, range: &DateRange) -> Vec<(String, String)> {
        self.list_params
            .iter()
            .filter_map(|(key, value)| value.render(page, range).map(|v| (key.clone(), v)))
            .collect()
    }

    /// True when every filter rule accepts the row.
    pub fn accepts(&self, item: &ListItem) -> bool {
        self.filter_rules.iter().all(|rule| rule.matches(item))
    }

    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(HarvestError::InvalidConfig("site entry without code".into()));
        }
        if self.code.contains(['/', '\\']) || self.code.starts_with('.') {
            return Err(HarvestError::InvalidConfig(format!(
                "site code '{}' is not a valid file name",
                self.code
            )));
        }
        if self.plugin_name.trim().is_empty() {
            return Err(HarvestError::InvalidConfig(format!("{}: missing plugin_name", self.code)));
        }
        let url = self.list_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HarvestError::InvalidConfig(format!(
                "{}: unsupported scheme '{}'",
                self.code,
                url.scheme()
            )));
        }
        for (key, value) in &self.list_params {
            if let ParamValue::Text(template) = value {
                for fmt in template_date_formats(template) {
                    check_date_format(&self.code, key, fmt)?;
                }
            }
        }
        if let Some(fmt) = self.date_format.as_deref() {
            check_date_format(&self.code, "date_format", fmt)?;
        }
        Ok(())
    }
}

/// A site entry that failed to load. Reported as a failed site; the rest
/// of the catalog is still usable.
#[derive(Debug)]
pub struct InvalidSite {
    /// Code if the entry had one, else `#<index>`.
    pub label: String,
    pub error: HarvestError,
}

/// Every site from a configuration file.
#[derive(Debug, Default)]
pub struct SiteCatalog {
    pub sites: Vec<SiteDescriptor>,
    pub invalid: Vec<InvalidSite>,
}

impl SiteCatalog {
    /// Load a catalog, picking the parser by file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HarvestError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        Self::parse(&content, &ext)
    }

    /// Parse catalog text in `yaml`, `json` or `toml` form.
    pub fn parse(content: &str, format: &str) -> Result<Self> {
        let root: serde_json::Value = match format {
            "json" => serde_json::from_str(content)?,
            "toml" => toml::from_str(content)?,
            _ => serde_yaml::from_str(content)?,
        };

        let entries = match root {
            serde_json::Value::Array(entries) => entries,
            serde_json::Value::Object(mut map) => match map.remove("sites") {
                Some(serde_json::Value::Array(entries)) => entries,
                _ => {
                    return Err(HarvestError::InvalidConfig(
                        "expected a list of sites or a 'sites' list".into(),
                    ))
                }
            },
            serde_json::Value::Null => Vec::new(),
            _ => {
                return Err(HarvestError::InvalidConfig(
                    "expected a list of sites or a 'sites' list".into(),
                ))
            }
        };

        let mut catalog = SiteCatalog::default();
        for (index, entry) in entries.into_iter().enumerate() {
            let label = entry
                .get("code")
                .and_then(|c| c.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", index));

            let site = serde_json::from_value::<SiteDescriptor>(entry)
                .map_err(|e| HarvestError::InvalidConfig(format!("{}: {}", label, e)))
                .and_then(|site| site.validate().map(|_| site));

            match site {
                Ok(site) if catalog.get(&site.code).is_some() => {
                    catalog.invalid.push(InvalidSite {
                        label,
                        error: HarvestError::InvalidConfig(format!("duplicate site code '{}'", site.code)),
                    });
                }
                Ok(site) => catalog.sites.push(site),
                Err(error) => catalog.invalid.push(InvalidSite { label, error }),
            }
        }
        Ok(catalog)
    }

    pub fn get(&self, code: &str) -> Option<&SiteDescriptor> {
        self.sites.iter().find(|s| s.code == code)
    }

    pub fn codes(&self) -> Vec<&str> {
        self.sites.iter().map(|s| s.code.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const YAML: &str = r#"
sites:
  - code: seoul
    display_name: 서울특별시의회
    base_url: https://www.smc.seoul.kr
    list_path: /board/list.do
    plugin_name: standard_table_v1
    list_params: { pageIndex: "{page}", pageUnit: 10, startDt: "{start}", endDt: "{end:%Y%m%d}" }
    date_format: "%Y-%m-%d"
  - code: broken
    display_name: 깨진 설정
  - code: busan
    display_name: 부산광역시의회
    base_url: https://council.busan.go.kr
    list_path: minutes/list
    plugin_name: council_minutes_v1
    filter_rules:
      - column: title
        exclude: ["[공지]"]
"#;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_yaml_catalog_keeps_valid_sites() {
        let catalog = SiteCatalog::parse(YAML, "yaml").unwrap();
        assert_eq!(catalog.codes(), vec!["seoul", "busan"]);
        assert_eq!(catalog.invalid.len(), 1);
        assert_eq!(catalog.invalid[0].label, "broken");
        assert_eq!(catalog.invalid[0].error.kind(), "invalid_config");
    }

    #[test]
    fn test_bare_json_list() {
        let json = r#"[{"code":"a","display_name":"A","base_url":"https://a.go.kr","list_path":"/l","plugin_name":"bid_board_v1"}]"#;
        let catalog = SiteCatalog::parse(json, "json").unwrap();
        assert_eq!(catalog.sites.len(), 1);
        assert!(catalog.invalid.is_empty());
    }

    #[test]
    fn test_toml_catalog() {
        let toml = r#"
[[sites]]
code = "daegu"
display_name = "대구광역시의회"
base_url = "https://council.daegu.go.kr"
list_path = "/list"
plugin_name = "standard_table_v1"
list_params_template = { page = "{page}" }
"#;
        let catalog = SiteCatalog::parse(toml, "toml").unwrap();
        assert_eq!(catalog.sites[0].list_params.len(), 1);
    }

    #[test]
    fn test_duplicate_codes_rejected() {
        let json = r#"[
            {"code":"a","display_name":"A","base_url":"https://a.go.kr","list_path":"/l","plugin_name":"p"},
            {"code":"a","display_name":"A2","base_url":"https://a.go.kr","list_path":"/l","plugin_name":"p"}
        ]"#;
        let catalog = SiteCatalog::parse(json, "json").unwrap();
        assert_eq!(catalog.sites.len(), 1);
        assert_eq!(catalog.invalid.len(), 1);
    }

    #[test]
    fn test_render_params() {
        let catalog = SiteCatalog::parse(YAML, "yaml").unwrap();
        let seoul = catalog.get("seoul").unwrap();

        let full = DateRange::new(Some(date("2024-01-01")), Some(date("2024-06-30")));
        let params: HashMap<_, _> = seoul.render_params(3, &full).into_iter().collect();
        assert_eq!(params["pageIndex"], "3");
        assert_eq!(params["pageUnit"], "10");
        assert_eq!(params["startDt"], "2024-01-01");
        assert_eq!(params["endDt"], "20240630");

        let open = DateRange::default();
        let params: HashMap<_, _> = seoul.render_params(1, &open).into_iter().collect();
        assert!(!params.contains_key("startDt"));
        assert!(!params.contains_key("endDt"));
    }

    #[test]
    fn test_bad_date_formats_rejected_at_load() {
        let json = r#"[
            {"code":"a","display_name":"A","base_url":"https://a.go.kr","list_path":"/l",
             "plugin_name":"standard_table_v1","list_params":{"startDt":"{start:%Q}"}},
            {"code":"b","display_name":"B","base_url":"https://b.go.kr","list_path":"/l",
             "plugin_name":"standard_table_v1","date_format":"%Y.%"},
            {"code":"c","display_name":"C","base_url":"https://c.go.kr","list_path":"/l",
             "plugin_name":"standard_table_v1","list_params":{"endDt":"{end:%Y%m%d}"}}
        ]"#;
        let catalog = SiteCatalog::parse(json, "json").unwrap();
        assert_eq!(catalog.codes(), vec!["c"]);
        assert_eq!(catalog.invalid.len(), 2);
        assert!(catalog.invalid.iter().all(|s| s.error.kind() == "invalid_config"));
    }

    #[test]
    fn test_unrenderable_format_is_omitted() {
        let value = ParamValue::Text("{start:%Q}".into());
        let range = DateRange::new(Some(date("2024-01-01")), None);
        assert_eq!(value.render(1, &range), None);
    }

    #[test]
    fn test_resolve_relative_links() {
        let catalog = SiteCatalog::parse(YAML, "yaml").unwrap();
        let busan = catalog.get("busan").unwrap();
        assert_eq!(
            busan.resolve("view?id=3").as_deref(),
            Some("https://council.busan.go.kr/minutes/view?id=3")
        );
        assert_eq!(
            busan.resolve("/view?id=3").as_deref(),
            Some("https://council.busan.go.kr/view?id=3")
        );
        assert_eq!(busan.resolve("javascript:void(0)"), None);
        assert_eq!(busan.resolve("#"), None);
    }

    #[test]
    fn test_detail_from_args() {
        let site = SiteDescriptor {
            code: "x".into(),
            base_url: "https://council.example.go.kr".into(),
            list_path: "/minutes/list.do".into(),
            detail_template: Some("view.do?key={id}&gubun={1}".into()),
            ..Default::default()
        };
        let args = vec!["321".to_string(), "B".to_string()];
        assert_eq!(
            site.detail_from_args(&args).as_deref(),
            Some("https://council.example.go.kr/minutes/view.do?key=321&gubun=B")
        );
        assert_eq!(site.detail_from_args(&args[..1]), None);
        assert_eq!(site.detail_from_args(&[]), None);
    }

    #[test]
    fn test_filter_rules() {
        let catalog = SiteCatalog::parse(YAML, "yaml").unwrap();
        let busan = catalog.get("busan").unwrap();
        assert!(busan.accepts(&ListItem::new("1", "제300회 본회의")));
        assert!(!busan.accepts(&ListItem::new("", "[공지] 시스템 점검")));

        let rule = FilterRule {
            column: FilterColumn::Department,
            include: vec!["총무".into()],
            exclude: vec![],
        };
        let mut item = ListItem::new("1", "t");
        assert!(!rule.matches(&item));
        item.department = Some("총무과".into());
        assert!(rule.matches(&item));
    }

    #[test]
    fn test_validate_delays() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());

        settings.request_delay = Duration::from_millis(100);
        assert_eq!(settings.validate().unwrap_err().kind(), "invalid_delay");

        settings.request_delay = MIN_REQUEST_DELAY;
        settings.page_delay = Duration::from_millis(999);
        assert_eq!(settings.validate().unwrap_err().kind(), "invalid_delay");
    }

    #[test]
    fn test_validate_range() {
        let mut settings = Settings::default();
        settings.range = DateRange::new(Some(date("2024-05-01")), Some(date("2024-01-01")));
        assert_eq!(settings.validate().unwrap_err().kind(), "date_range_exceeded");

        settings.range = DateRange::new(Some(date("1999-01-01")), None);
        assert_eq!(settings.validate().unwrap_err().kind(), "date_range_exceeded");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("HARVEST_USER_AGENT", "TestBot/1.0 (ops@example.org)"),
            ("HARVEST_TIMEOUT_S", "2.5"),
            ("HARVEST_PAGE_DELAY_S", "3"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.user_agent.as_deref(), Some("TestBot/1.0 (ops@example.org)"));
        assert_eq!(settings.timeout, Duration::from_millis(2500));
        assert_eq!(settings.page_delay, Duration::from_secs(3));

        let mut settings = Settings::default();
        let err = settings
            .apply_env(|k| (k == "HARVEST_REQUEST_DELAY_S").then(|| "-1".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_delay");
    }
}
