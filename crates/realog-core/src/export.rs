//! Export to downloadable files
//!
//! Formats:
//! - `json` - the full document with the selected entries, re-importable
//! - `txt`  - plain text, one block per entry
//! - `html` - standalone page
//! - `wxr`  - WordPress eXtended RSS 1.2, importable by WordPress

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone, Utc};

use crate::document::Document;
use crate::models::Entry;

pub use crate::filter::DateRange;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Txt,
    Html,
    Wxr,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Txt => "txt",
            ExportFormat::Html => "html",
            ExportFormat::Wxr => "xml",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Txt => "text/plain",
            ExportFormat::Html => "text/html",
            ExportFormat::Wxr => "application/rss+xml",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "txt" | "text" => Ok(ExportFormat::Txt),
            "html" => Ok(ExportFormat::Html),
            "wxr" | "wordpress" | "xml" => Ok(ExportFormat::Wxr),
            other => Err(format!(
                "Unknown export format '{}'. Use json, txt, html or wxr.",
                other
            )),
        }
    }
}

/// A rendered export, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub filename: String,
    pub mime: &'static str,
    pub contents: String,
}

impl ExportFile {
    /// Write into `dir` under the export's file name
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory {:?}", dir))?;
        let path = dir.join(&self.filename);
        fs::write(&path, &self.contents)
            .with_context(|| format!("Failed to write export to {:?}", path))?;
        Ok(path)
    }
}

/// Render the entries of `document` that fall in `range`
///
/// Private entries are left out unless `include_private` is set. Entries
/// are written newest first.
pub fn export(
    document: &Document,
    format: ExportFormat,
    range: DateRange,
    include_private: bool,
) -> Result<ExportFile> {
    let mut entries: Vec<&Entry> = document
        .entries
        .iter()
        .filter(|e| range.contains(e.timestamp))
        .filter(|e| include_private || !e.is_private)
        .collect();
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let today = Local::now().format("%Y-%m-%d").to_string();
    let contents = match format {
        ExportFormat::Json => render_json(document, &entries)?,
        ExportFormat::Txt => render_txt(document, &entries, &today),
        ExportFormat::Html => render_html(document, &entries),
        ExportFormat::Wxr => render_wxr(document, &entries),
    };

    Ok(ExportFile {
        filename: format!("realog-{}.{}", today, format.extension()),
        mime: format.mime(),
        contents,
    })
}

fn render_json(document: &Document, entries: &[&Entry]) -> Result<String> {
    let subset = Document {
        questions: document.questions.clone(),
        entries: entries.iter().map(|e| (*e).clone()).collect(),
        settings: document.settings.clone(),
        extra: document.extra.clone(),
    };
    subset
        .to_pretty_json()
        .context("Failed to serialize document")
}

fn local_time(timestamp: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(timestamp).single()
}

fn display_time(timestamp: i64) -> String {
    local_time(timestamp)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn render_txt(document: &Document, entries: &[&Entry], today: &str) -> String {
    const RULE: &str = "====================================";
    let mut out = format!(
        "{} EXPORT - {}\n{}\n\n",
        document.settings.app_name().to_uppercase(),
        today,
        RULE
    );

    for e in entries {
        let _ = writeln!(
            out,
            "[{}] {} ({})",
            display_time(e.timestamp),
            e.display_title(),
            e.category.label()
        );
        if let Some(mood) = &e.mood {
            let _ = writeln!(out, "Mood: {}", mood);
        }
        if let Some(w) = &e.weather {
            let _ = writeln!(out, "Weather: {}°C, {} ({})", w.temp, w.condition, w.location);
        }
        if let Some(location) = &e.location {
            let _ = writeln!(out, "Location: {}", location);
        }
        out.push_str("------------------------------------\n");

        for (question, answer) in document.answered_questions(e) {
            let _ = writeln!(out, "Q: {}\nA: {}\n", question.text, answer);
        }
        if let Some(text) = e.free_text() {
            let _ = writeln!(out, "{}\n", text);
        }
        let _ = write!(out, "\n{}\n\n", RULE);
    }
    out
}

/// Escape text for HTML element and attribute content
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// HTML body of one entry, shared by the page and WXR renderers
fn entry_body_html(document: &Document, entry: &Entry) -> String {
    let mut out = String::new();
    if let Some(photo) = &entry.photo {
        let _ = writeln!(
            out,
            "<img src=\"{}\" class=\"photo\" alt=\"Entry photo\" />",
            escape_html(photo)
        );
    }
    for (question, answer) in document.answered_questions(entry) {
        let _ = writeln!(
            out,
            "<div class=\"qa\"><div class=\"q\">{}</div><div class=\"a\">{}</div></div>",
            escape_html(&question.text),
            escape_html(answer)
        );
    }
    if let Some(text) = entry.free_text() {
        let _ = writeln!(out, "<div class=\"a\">{}</div>", escape_html(text));
    }
    out
}

fn render_html(document: &Document, entries: &[&Entry]) -> String {
    let title = escape_html(&format!("{} Export", document.settings.app_name()));
    let mut out = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; background: #f4f4f5; color: #18181b; }}
.entry {{ background: white; padding: 20px; margin-bottom: 20px; border-radius: 8px; }}
.meta {{ font-size: 0.85em; color: #71717a; margin-bottom: 10px; }}
.title {{ font-size: 1.5em; font-weight: bold; color: #059669; margin: 0 0 5px 0; }}
.qa {{ margin-bottom: 15px; }}
.q {{ font-weight: bold; color: #3f3f46; font-size: 0.9em; }}
.a {{ white-space: pre-wrap; margin-top: 2px; }}
.photo {{ max-width: 100%; height: auto; margin-top: 10px; border-radius: 4px; }}
</style>
</head>
<body>
<h1>{title}</h1>
"#
    );

    for e in entries {
        let mut meta = vec![
            display_time(e.timestamp),
            e.category.label().to_string(),
        ];
        if let Some(w) = &e.weather {
            meta.push(format!("{}°C, {}", w.temp, w.condition));
        }
        if let Some(location) = &e.location {
            meta.push(location.clone());
        }
        if let Some(mood) = &e.mood {
            meta.push(mood.clone());
        }

        let _ = write!(
            out,
            "<div class=\"entry\">\n<div class=\"meta\">{}</div>\n<h2 class=\"title\">{}</h2>\n{}</div>\n",
            escape_html(&meta.join(" | ")),
            escape_html(e.display_title()),
            entry_body_html(document, e)
        );
    }

    out.push_str("</body>\n</html>\n");
    out
}

/// Wrap text in CDATA, splitting any terminator it contains
fn cdata(s: &str) -> String {
    format!("<![CDATA[{}]]>", s.replace("]]>", "]]]]><![CDATA[>"))
}

fn render_wxr(document: &Document, entries: &[&Entry]) -> String {
    let app_name = escape_html(&document.settings.app_name());
    let now = Utc::now().to_rfc2822();

    let mut out = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
    xmlns:excerpt="http://wordpress.org/export/1.2/excerpt/"
    xmlns:content="http://purl.org/rss/1.0/modules/content/"
    xmlns:wfw="http://wellformedweb.org/CommentAPI/"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmlns:wp="http://wordpress.org/export/1.2/">
<channel>
    <title>{app_name}</title>
    <description>{app_name} journal export</description>
    <pubDate>{now}</pubDate>
    <language>en</language>
    <wp:wxr_version>1.2</wp:wxr_version>
"#
    );

    for (index, e) in entries.iter().enumerate() {
        let utc = Utc.timestamp_millis_opt(e.timestamp).single();
        let pub_date = utc.map(|dt| dt.to_rfc2822()).unwrap_or_default();
        let post_date = local_time(e.timestamp)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let post_date_gmt = utc
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let status = if e.is_private { "private" } else { "publish" };
        let category = e.category.label();

        let _ = write!(
            out,
            r#"    <item>
        <title>{title}</title>
        <pubDate>{pub_date}</pubDate>
        <dc:creator>{creator}</dc:creator>
        <guid isPermaLink="false">{guid}</guid>
        <content:encoded>{content}</content:encoded>
        <excerpt:encoded><![CDATA[]]></excerpt:encoded>
        <wp:post_id>{post_id}</wp:post_id>
        <wp:post_date>{post_date}</wp:post_date>
        <wp:post_date_gmt>{post_date_gmt}</wp:post_date_gmt>
        <wp:comment_status>closed</wp:comment_status>
        <wp:ping_status>closed</wp:ping_status>
        <wp:status>{status}</wp:status>
        <wp:post_type>post</wp:post_type>
        <category domain="category" nicename="{nicename}">{category_cdata}</category>
    </item>
"#,
            title = escape_html(e.display_title()),
            creator = cdata(document.settings.user_name.as_deref().unwrap_or("admin")),
            guid = escape_html(&e.id),
            content = cdata(&entry_body_html(document, e)),
            post_id = index + 1,
            nicename = category.to_lowercase(),
            category_cdata = cdata(category),
        );
    }

    out.push_str("</channel>\n</rss>\n");
    out
}
