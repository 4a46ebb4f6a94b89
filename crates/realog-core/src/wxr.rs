//! WordPress (WXR) import
//!
//! Reads the `<item>` posts of a WXR file back into free-text entries. The
//! body HTML is reduced to plain text; a leading mood line and an embedded
//! image become the entry's mood and photo. Imported entries get fresh ids
//! and are meant to be added in front of the existing ones, never to
//! replace the journal.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use tracing::debug;

use crate::backend::BackendError;
use crate::models::{Category, Entry};

const POST_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

struct WxrPatterns {
    item: Regex,
    cdata: Regex,
    category: Regex,
    attribute: Regex,
    comment: Regex,
    mood: Regex,
    mood_line: Regex,
    weather_line: Regex,
    image: Regex,
    image_tag: Regex,
    line_break: Regex,
    block_end: Regex,
    tag: Regex,
    blank_lines: Regex,
}

impl WxrPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            item: Regex::new(r"(?s)<item>(.*?)</item>")?,
            cdata: Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>")?,
            category: Regex::new(r"<category\b([^>]*)>")?,
            attribute: Regex::new(r#"([\w:-]+)="([^"]*)""#)?,
            comment: Regex::new(r"(?s)<!--.*?-->")?,
            mood: Regex::new(r"(?s)<strong>(?:Mood|Hangulat):\s*(.*?)</strong>")?,
            mood_line: Regex::new(r"(?s)<strong>(?:Mood|Hangulat):.*?</strong>(?:<br\s*/?>)?")?,
            weather_line: Regex::new(r"(?s)<em>(?:Weather|Időjárás):.*?</em>(?:<br\s*/?>)?")?,
            image: Regex::new(r#"<img\b[^>]*\bsrc="([^"]*)""#)?,
            image_tag: Regex::new(r"<img\b[^>]*>")?,
            line_break: Regex::new(r"<br\s*/?>")?,
            block_end: Regex::new(r"</(?:p|div)>|<hr\s*/?>")?,
            tag: Regex::new(r"<[^>]+>")?,
            blank_lines: Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+")?,
        })
    }

    /// Text content of the first `<tag>` in `item`
    fn field(&self, item: &str, tag: &str) -> Option<String> {
        let open = format!("<{}", tag);
        let close = format!("</{}>", tag);

        let mut search = 0;
        let start = loop {
            let at = search + item[search..].find(&open)?;
            let after = item[at + open.len()..].chars().next()?;
            if after == '>' || after.is_whitespace() {
                break at;
            }
            search = at + open.len();
        };
        let body_start = start + item[start..].find('>')? + 1;
        let body_end = body_start + item[body_start..].find(&close)?;
        Some(self.text(&item[body_start..body_end]))
    }

    /// CDATA sections joined, or entity-decoded character data
    fn text(&self, raw: &str) -> String {
        if self.cdata.is_match(raw) {
            self.cdata
                .captures_iter(raw)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str())
                .collect()
        } else {
            unescape(raw.trim())
        }
    }

    /// Category from `<category domain="category" nicename="...">`
    fn category(&self, item: &str) -> Category {
        self.category
            .captures_iter(item)
            .filter_map(|c| c.get(1))
            .filter_map(|attrs| {
                let mut domain = None;
                let mut nicename = None;
                for attr in self.attribute.captures_iter(attrs.as_str()) {
                    match (attr.get(1).map(|m| m.as_str()), attr.get(2)) {
                        (Some("domain"), Some(v)) => domain = Some(v.as_str()),
                        (Some("nicename"), Some(v)) => nicename = Some(v.as_str()),
                        _ => {}
                    }
                }
                nicename.filter(|_| domain == Some("category"))
            })
            .filter_map(|name| name.parse().ok())
            .last()
            .unwrap_or(Category::Daily)
    }

    fn entry(&self, item: &str, now: i64) -> Entry {
        let title = self.field(item, "title").filter(|t| !t.trim().is_empty());
        let body = self.field(item, "content:encoded").unwrap_or_default();

        let timestamp = self
            .field(item, "wp:post_date_gmt")
            .and_then(|d| parse_post_date(&d, &Utc))
            .or_else(|| {
                self.field(item, "wp:post_date")
                    .and_then(|d| parse_post_date(&d, &Local))
            })
            .or_else(|| {
                self.field(item, "pubDate")
                    .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
                    .map(|dt| dt.timestamp_millis())
            })
            .unwrap_or(now);

        let mut entry = Entry::at(self.category(item), timestamp);
        if let Some(title) = &title {
            entry.date_label = title.clone();
        }
        entry.title = title;
        entry.mood = self
            .mood
            .captures(&body)
            .and_then(|c| c.get(1))
            .map(|m| unescape(m.as_str().trim()))
            .filter(|m| !m.is_empty());
        entry.photo = self
            .image
            .captures(&body)
            .and_then(|c| c.get(1))
            .map(|m| unescape(m.as_str()));
        entry.is_private = self.field(item, "wp:status").as_deref() == Some("private");
        entry.set_free_text(self.plain_text(&body));
        entry
    }

    /// Body HTML reduced to text with paragraph breaks
    fn plain_text(&self, html: &str) -> String {
        let text = self.comment.replace_all(html, "");
        let text = self.mood_line.replace_all(&text, "");
        let text = self.weather_line.replace_all(&text, "");
        let text = self.image_tag.replace_all(&text, "");
        let text = self.line_break.replace_all(&text, "\n");
        let text = self.block_end.replace_all(&text, "\n\n");
        let text = self.tag.replace_all(&text, "");
        let text = unescape(&text);
        self.blank_lines
            .replace_all(&text, "\n\n")
            .trim()
            .to_string()
    }
}

fn parse_post_date<Tz: TimeZone>(value: &str, zone: &Tz) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() || value.starts_with("0000") {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(value, POST_DATE_FORMAT).ok()?;
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Parse the posts of a WXR export into new entries, in file order
pub fn parse_wxr(text: &str) -> Result<Vec<Entry>, BackendError> {
    if !text.contains("<rss") && !text.contains("<channel") {
        return Err(BackendError::ImportValidation {
            details: "not a WordPress export (no <rss> or <channel> element)".to_string(),
        });
    }

    let patterns = WxrPatterns::new().map_err(|e| BackendError::ImportValidation {
        details: e.to_string(),
    })?;
    let now = Utc::now().timestamp_millis();

    let entries: Vec<Entry> = patterns
        .item
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|item| patterns.entry(item.as_str(), now))
        .collect();

    debug!("Parsed {} posts from WXR", entries.len());
    Ok(entries)
}

/// Whether `path` names a WXR file rather than a JSON backup
pub fn is_wxr_file_name(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml") || ext.eq_ignore_ascii_case("wxr"))
}
