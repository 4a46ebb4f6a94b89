//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chrono::{Local, TimeZone};
use serde::Serialize;

use realog_core::models::GeoPoint;
use realog_core::{Document, Entry, EntryMode, Question, SyncSnapshot};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single entry with its answers or free text
    pub fn print_entry(&self, document: &Document, entry: &Entry) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", entry.id);
                println!("Date:      {}", format_timestamp(entry.timestamp));
                println!("Category:  {}", entry.category);
                if let Some(ref title) = entry.title {
                    println!("Title:     {}", title);
                }
                if let Some(ref mood) = entry.mood {
                    println!("Mood:      {}", mood);
                }
                if let Some(ref weather) = entry.weather {
                    println!(
                        "Weather:   {:.1}°C, {} ({})",
                        weather.temp, weather.condition, weather.location
                    );
                }
                if let Some(ref location) = entry.location {
                    println!("Location:  {}", location);
                }
                if let Some(point) = entry.visible_gps() {
                    println!("GPS:       {}", format_point(point));
                }
                if entry.has_photo() {
                    println!("Photo:     {}", photo_label(entry.photo.as_deref()));
                }
                if !entry.tags.is_empty() {
                    let tags: Vec<String> = entry.tags.iter().map(|t| format!("#{}", t)).collect();
                    println!("Tags:      {}", tags.join(" "));
                }
                if entry.is_favorite {
                    println!("Favorite:  yes");
                }
                if entry.is_private || entry.is_location_private {
                    let mut flags = Vec::new();
                    if entry.is_private {
                        flags.push("entry");
                    }
                    if entry.is_location_private {
                        flags.push("location");
                    }
                    println!("Private:   {}", flags.join(", "));
                }

                println!();
                match entry.entry_mode {
                    EntryMode::Free => {
                        println!("{}", entry.free_text().unwrap_or("(empty)"));
                    }
                    EntryMode::Structured => {
                        let mut any = false;
                        for (question, answer) in document.answered_questions(entry) {
                            println!("── {} ──", question.text);
                            println!("{}", answer);
                            println!();
                            any = true;
                        }
                        if !any {
                            println!("(no answers)");
                        }
                    }
                }
            }
            OutputFormat::Json => print_json(entry),
            OutputFormat::Quiet => {
                println!("{}", entry.id);
            }
        }
    }

    /// Print a list of entries
    pub fn print_entries(&self, entries: &[&Entry]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("No entries found.");
                    return;
                }
                for entry in entries {
                    let private = if entry.is_private { " [private]" } else { "" };
                    let star = if entry.is_favorite { "* " } else { "" };
                    println!(
                        "{} | {} | {:<7} | {}{}{} | {}",
                        short_id(&entry.id),
                        entry.date_label,
                        entry.category.label(),
                        star,
                        truncate(entry.display_title(), 30),
                        private,
                        truncate_line(&entry_preview(entry), 40)
                    );
                }
                println!("\n{} entry(s)", entries.len());
            }
            OutputFormat::Json => print_json(entries),
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.id);
                }
            }
        }
    }

    /// Print entries with their shareable coordinates
    pub fn print_map_points(&self, points: &[(&Entry, GeoPoint)]) {
        match self.format {
            OutputFormat::Human => {
                if points.is_empty() {
                    println!("No entries with a location.");
                    return;
                }
                for (entry, point) in points {
                    println!(
                        "{} | {} | {} | {}",
                        short_id(&entry.id),
                        entry.date_label,
                        format_point(*point),
                        truncate(entry.display_title(), 35)
                    );
                }
                println!("\n{} location(s)", points.len());
            }
            OutputFormat::Json => {
                let json: Vec<_> = points
                    .iter()
                    .map(|(entry, point)| {
                        serde_json::json!({
                            "id": entry.id,
                            "dateLabel": entry.date_label,
                            "title": entry.title,
                            "lat": point.lat,
                            "lon": point.lon
                        })
                    })
                    .collect();
                print_json(&json);
            }
            OutputFormat::Quiet => {
                for (entry, _) in points {
                    println!("{}", entry.id);
                }
            }
        }
    }

    /// Print a list of questions
    pub fn print_questions(&self, questions: &[&Question]) {
        match self.format {
            OutputFormat::Human => {
                if questions.is_empty() {
                    println!("No questions found.");
                    return;
                }
                for question in questions {
                    let state = if question.is_active { " " } else { "x" };
                    println!(
                        "[{}] {:<12} | {:<7} | {}",
                        state,
                        truncate(&question.id, 12),
                        question.category.label(),
                        question.text
                    );
                }
                println!("\n{} question(s)", questions.len());
            }
            OutputFormat::Json => print_json(questions),
            OutputFormat::Quiet => {
                for question in questions {
                    println!("{}", question.id);
                }
            }
        }
    }

    /// Print the sync status line
    pub fn print_sync(&self, snapshot: &SyncSnapshot) {
        match self.format {
            OutputFormat::Human => {
                println!("Backend: {}", snapshot.backend);
                println!("Status:  {}", snapshot.status);
                if let Some(last_sync) = snapshot.last_sync {
                    println!(
                        "Synced:  {}",
                        last_sync.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                    );
                }
                if let Some(ref message) = snapshot.message {
                    println!("Probe:   {}", message);
                }
                if let Some(ref error) = snapshot.last_error {
                    println!("Error:   {}", error);
                }
            }
            OutputFormat::Json => print_json(snapshot),
            OutputFormat::Quiet => {
                println!("{}", snapshot.status);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (suppressed in quiet mode)
    pub fn warn(&self, message: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", message);
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Print any serializable value as indented JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// First line of an entry's content
fn entry_preview(entry: &Entry) -> String {
    match entry.entry_mode {
        EntryMode::Free => entry.free_text().unwrap_or("").to_string(),
        EntryMode::Structured => entry
            .answered_responses()
            .next()
            .map(|(_, answer)| answer.to_string())
            .unwrap_or_default(),
    }
}

fn format_timestamp(timestamp: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn format_point(point: GeoPoint) -> String {
    format!("{:.5}, {:.5}", point.lat, point.lon)
}

/// Embedded photos are too long to print
fn photo_label(photo: Option<&str>) -> String {
    match photo {
        Some(p) if p.starts_with("data:") => "(embedded image)".to_string(),
        Some(p) => p.to_string(),
        None => String::new(),
    }
}

/// First eight characters of an id
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        // Multi-byte characters are never split
        assert_eq!(truncate("árvíztűrő tükörfúrógép", 8), "árvíz...");
    }

    #[test]
    fn test_truncate_line() {
        assert_eq!(truncate_line("single line", 20), "single line");
        assert_eq!(truncate_line("line one\nline two", 20), "line one");
        assert_eq!(
            truncate_line("very long single line here", 10),
            "very lo..."
        );
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0f8fad5b-d9cb-469f-a165-70867728950e"), "0f8fad5b");
        assert_eq!(short_id("d1"), "d1");
    }

    #[test]
    fn test_entry_preview() {
        let mut entry = Entry::new(realog_core::Category::Daily);
        assert_eq!(entry_preview(&entry), "");

        entry.set_response("d1", "   ");
        entry.set_response("d2", "Went hiking");
        assert_eq!(entry_preview(&entry), "Went hiking");

        entry.set_free_text("Free thoughts\nsecond line");
        assert_eq!(entry_preview(&entry), "Free thoughts\nsecond line");
    }

    #[test]
    fn test_photo_label() {
        assert_eq!(
            photo_label(Some("data:image/png;base64,AAAA")),
            "(embedded image)"
        );
        assert_eq!(photo_label(Some("img/a.png")), "img/a.png");
    }
}
