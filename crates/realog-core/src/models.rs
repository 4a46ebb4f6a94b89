//! Data models for ReaLog
//!
//! Defines the journal's core data structures: entries, questions and the
//! settings bag. Field names follow the persisted document's camelCase wire
//! shape so the same JSON is read by every backend.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entry period, ordered from finest to coarsest granularity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Category {
    /// All categories, finest first
    pub const ALL: [Category; 4] = [
        Category::Daily,
        Category::Weekly,
        Category::Monthly,
        Category::Yearly,
    ];

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Category::Daily => "Daily",
            Category::Weekly => "Weekly",
            Category::Monthly => "Monthly",
            Category::Yearly => "Yearly",
        }
    }

    /// Wire name (`DAILY`, `WEEKLY`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Daily => "DAILY",
            Category::Weekly => "WEEKLY",
            Category::Monthly => "MONTHLY",
            Category::Yearly => "YEARLY",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" | "D" => Ok(Category::Daily),
            "WEEKLY" | "W" => Ok(Category::Weekly),
            "MONTHLY" | "M" => Ok(Category::Monthly),
            "YEARLY" | "Y" => Ok(Category::Yearly),
            other => Err(format!(
                "Unknown category '{}'. Use daily, weekly, monthly or yearly.",
                other
            )),
        }
    }
}

/// How an entry's content is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryMode {
    /// Question id -> answer pairs
    #[default]
    Structured,
    /// A single free-text blob
    Free,
}

/// Weather at the time of writing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Temperature in degrees Celsius
    pub temp: f64,
    /// Condition text, e.g. "light rain"
    pub condition: String,
    /// Name of the location the reading came from
    pub location: String,
    /// Provider icon code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// A GPS coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// A journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Unique identifier
    pub id: String,
    /// Creation/edit time in epoch milliseconds
    pub timestamp: i64,
    /// Display label, usually the date
    pub date_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub category: Category,
    /// Answers keyed by question id (structured mode)
    #[serde(default)]
    pub responses: BTreeMap<String, String>,
    #[serde(default)]
    pub entry_mode: EntryMode,
    /// Free-text content (free mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    /// Photo URL or embedded data URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSnapshot>,
    /// Human-readable location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GeoPoint>,
    /// Hidden from non-admin viewers entirely
    #[serde(default)]
    pub is_private: bool,
    /// Hides only the GPS marker on map views
    #[serde(default)]
    pub is_location_private: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_favorite: bool,
    /// Keys this version does not know about (habit values, drafts, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl Entry {
    /// Create a new, empty structured entry timestamped now
    pub fn new(category: Category) -> Self {
        Self::at(category, Utc::now().timestamp_millis())
    }

    /// Create an entry at a specific timestamp (epoch millis)
    pub fn at(category: Category, timestamp: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            date_label: date_label_for(timestamp),
            title: None,
            category,
            responses: BTreeMap::new(),
            entry_mode: EntryMode::Structured,
            free_text_content: None,
            mood: None,
            photo: None,
            weather: None,
            location: None,
            gps: None,
            is_private: false,
            is_location_private: false,
            tags: Vec::new(),
            is_favorite: false,
            extra: BTreeMap::new(),
        }
    }

    /// Set by clients with a trash bin; trashed entries stay out of views
    pub fn is_trashed(&self) -> bool {
        self.extra
            .get("isTrashed")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Whether the entry carries `tag`, ignoring case
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag.trim()))
    }

    /// Record an answer and switch the entry to structured mode
    pub fn set_response(&mut self, question_id: impl Into<String>, answer: impl Into<String>) {
        self.entry_mode = EntryMode::Structured;
        self.free_text_content = None;
        self.responses.insert(question_id.into(), answer.into());
    }

    /// Replace the content with free text
    ///
    /// Structured answers are dropped: the two modes are mutually exclusive.
    pub fn set_free_text(&mut self, text: impl Into<String>) {
        self.entry_mode = EntryMode::Free;
        self.responses.clear();
        self.free_text_content = Some(text.into());
    }

    /// Answers with non-blank text, in question-id order
    pub fn answered_responses(&self) -> impl Iterator<Item = (&str, &str)> {
        self.responses
            .iter()
            .filter(|(_, answer)| !answer.trim().is_empty())
            .map(|(id, answer)| (id.as_str(), answer.as_str()))
    }

    /// Free text, only when the entry is in free mode
    pub fn free_text(&self) -> Option<&str> {
        match self.entry_mode {
            EntryMode::Free => self.free_text_content.as_deref(),
            EntryMode::Structured => None,
        }
    }

    /// Case-insensitive substring search across the entry's text fields
    ///
    /// `needle` must already be lowercased.
    pub fn matches_query(&self, needle: &str) -> bool {
        let hit = |s: &str| s.to_lowercase().contains(needle);

        self.title.as_deref().is_some_and(hit)
            || self.location.as_deref().is_some_and(hit)
            || self.responses.values().any(|answer| hit(answer.as_str()))
            || self.free_text_content.as_deref().is_some_and(hit)
    }

    pub fn has_photo(&self) -> bool {
        self.photo.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// GPS position unless the location is marked private
    pub fn visible_gps(&self) -> Option<GeoPoint> {
        if self.is_location_private {
            None
        } else {
            self.gps
        }
    }

    /// Title if set, otherwise the date label
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.date_label)
    }
}

/// Default date label for a timestamp: the local calendar date
fn date_label_for(timestamp: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// A journaling prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    pub category: Category,
    /// Inactive questions are hidden from pickers but stay attached to
    /// entries that already answered them
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Question {
    pub fn new(text: impl Into<String>, category: Category) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            category,
            is_active: true,
        }
    }

    /// Create a question with a fixed id (built-in defaults)
    pub fn with_id(id: impl Into<String>, text: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            category,
            is_active: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Colour theme
///
/// Unknown theme names are preserved as-is so settings written by a newer
/// client survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Theme {
    Dark,
    Light,
    Lavender,
    /// Follow the operating system preference
    System,
    Other(String),
}

impl From<String> for Theme {
    fn from(s: String) -> Self {
        match s.as_str() {
            "dark" => Theme::Dark,
            "light" => Theme::Light,
            "lavender" => Theme::Lavender,
            "system" => Theme::System,
            _ => Theme::Other(s),
        }
    }
}

impl From<Theme> for String {
    fn from(theme: Theme) -> Self {
        match theme {
            Theme::Dark => "dark".to_string(),
            Theme::Light => "light".to_string(),
            Theme::Lavender => "lavender".to_string(),
            Theme::System => "system".to_string(),
            Theme::Other(s) => s,
        }
    }
}

/// Preferred presentation for a category's entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    Timeline,
    Calendar,
    Atlas,
    Gallery,
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" => Ok(ViewMode::Grid),
            "timeline" => Ok(ViewMode::Timeline),
            "calendar" => Ok(ViewMode::Calendar),
            "atlas" | "map" => Ok(ViewMode::Atlas),
            "gallery" => Ok(ViewMode::Gallery),
            other => Err(format!("Unknown view mode '{}'", other)),
        }
    }
}

/// Per-category view configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryConfig {
    #[serde(default)]
    pub view_mode: ViewMode,
    /// Fold daily entries into this category's view
    #[serde(default)]
    pub include_daily: bool,
    #[serde(default)]
    pub include_weekly: bool,
    #[serde(default)]
    pub include_monthly: bool,
}

/// Visibility of global views for anonymous viewers
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    #[serde(default)]
    pub show_atlas: bool,
    #[serde(default)]
    pub show_gallery: bool,
}

/// Third-party JSON blob endpoint configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Sent as bearer token and master/access key headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl CloudConfig {
    /// Enabled and pointing at a non-empty URL
    pub fn is_usable(&self) -> bool {
        self.enabled && self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Free-form application settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Overrides the built-in admin password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_weather_map_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    /// Custom mood tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moods: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<CloudConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_configs: Option<BTreeMap<Category, CategoryConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_config: Option<PublicConfig>,
    /// Keys this version does not know about
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl AppSettings {
    /// View configuration for a category (default when unset)
    pub fn category_config(&self, category: Category) -> CategoryConfig {
        self.category_configs
            .as_ref()
            .and_then(|configs| configs.get(&category))
            .cloned()
            .unwrap_or_default()
    }

    /// Mutable view configuration for a category, created on demand
    pub fn category_config_mut(&mut self, category: Category) -> &mut CategoryConfig {
        self.category_configs
            .get_or_insert_with(BTreeMap::new)
            .entry(category)
            .or_default()
    }

    /// Cloud configuration (disabled default when unset)
    pub fn cloud_config(&self) -> CloudConfig {
        self.cloud.clone().unwrap_or_default()
    }

    /// Display name used in export headers
    pub fn app_name(&self) -> String {
        match self.user_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => format!("{}Log", name),
            None => "ReaLog".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_ordering() {
        assert!(Category::Daily < Category::Weekly);
        assert!(Category::Weekly < Category::Monthly);
        assert!(Category::Monthly < Category::Yearly);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("daily".parse::<Category>().unwrap(), Category::Daily);
        assert_eq!("YEARLY".parse::<Category>().unwrap(), Category::Yearly);
        assert_eq!("m".parse::<Category>().unwrap(), Category::Monthly);
        assert!("hourly".parse::<Category>().is_err());
    }

    #[test]
    fn test_entry_new() {
        let entry = Entry::new(Category::Daily);
        assert_eq!(entry.category, Category::Daily);
        assert_eq!(entry.entry_mode, EntryMode::Structured);
        assert!(entry.responses.is_empty());
        assert!(!entry.is_private);
        assert!(!entry.date_label.is_empty());
    }

    #[test]
    fn test_entry_modes_are_exclusive() {
        let mut entry = Entry::new(Category::Daily);
        entry.set_response("q1", "answer");
        assert_eq!(entry.entry_mode, EntryMode::Structured);

        entry.set_free_text("just writing");
        assert_eq!(entry.entry_mode, EntryMode::Free);
        assert!(entry.responses.is_empty());
        assert_eq!(entry.free_text(), Some("just writing"));

        entry.set_response("q2", "back to questions");
        assert_eq!(entry.entry_mode, EntryMode::Structured);
        assert!(entry.free_text_content.is_none());
    }

    #[test]
    fn test_answered_responses_skips_blank() {
        let mut entry = Entry::new(Category::Weekly);
        entry.set_response("q1", "yes");
        entry.set_response("q2", "   ");
        let answered: Vec<_> = entry.answered_responses().collect();
        assert_eq!(answered, vec![("q1", "yes")]);
    }

    #[test]
    fn test_matches_query_fields() {
        let mut entry = Entry::new(Category::Daily);
        entry.title = Some("Morning Run".to_string());
        assert!(entry.matches_query("run"));

        let mut entry = Entry::new(Category::Daily);
        entry.location = Some("Budapest".to_string());
        assert!(entry.matches_query("budapest"));

        let mut entry = Entry::new(Category::Daily);
        entry.set_response("q1", "Felt GREAT today");
        assert!(entry.matches_query("great"));

        let mut entry = Entry::new(Category::Daily);
        entry.set_free_text("Coffee with Anna");
        assert!(entry.matches_query("anna"));
        assert!(!entry.matches_query("tea"));
    }

    #[test]
    fn test_visible_gps_respects_location_privacy() {
        let mut entry = Entry::new(Category::Daily);
        entry.gps = Some(GeoPoint { lat: 47.5, lon: 19.0 });
        assert!(entry.visible_gps().is_some());

        entry.is_location_private = true;
        assert!(entry.visible_gps().is_none());
        // Location privacy does not hide the entry itself
        assert!(!entry.is_private);
    }

    #[test]
    fn test_entry_wire_shape() {
        let mut entry = Entry::at(Category::Monthly, 1_700_000_000_000);
        entry.is_private = true;
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["category"], "MONTHLY");
        assert_eq!(json["entryMode"], "structured");
        assert_eq!(json["isPrivate"], true);
        assert!(json.get("dateLabel").is_some());
        assert!(json.get("title").is_none());
    }

    #[test]
    fn test_entry_defaults_when_fields_missing() {
        let json = r#"{"id":"a","timestamp":100,"dateLabel":"x","category":"DAILY"}"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.entry_mode, EntryMode::Structured);
        assert!(entry.responses.is_empty());
        assert!(!entry.is_private);
        assert!(!entry.is_location_private);
    }

    #[test]
    fn test_entry_keeps_unknown_fields() {
        let json = r#"{
            "id": "a",
            "timestamp": 100,
            "dateLabel": "x",
            "category": "DAILY",
            "tags": ["travel"],
            "isFavorite": true,
            "habitValues": {"h1": 3},
            "notebookId": "nb-1",
            "isDraft": false
        }"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.tags, vec!["travel".to_string()]);
        assert!(entry.is_favorite);
        assert!(entry.has_tag("Travel"));
        assert_eq!(entry.extra["notebookId"], "nb-1");

        let written = serde_json::to_value(&entry).unwrap();
        assert_eq!(written["tags"][0], "travel");
        assert_eq!(written["isFavorite"], true);
        assert_eq!(written["habitValues"]["h1"], 3);
        assert_eq!(written["isDraft"], false);
        // Flattened keys never shadow known ones
        assert_eq!(written["id"], "a");
    }

    #[test]
    fn test_plain_entry_omits_optional_collections() {
        let json = serde_json::to_value(Entry::at(Category::Daily, 0)).unwrap();
        assert!(json.get("tags").is_none());
        assert!(json.get("isFavorite").is_none());
    }

    #[test]
    fn test_theme_round_trip_preserves_unknown() {
        let theme: Theme = serde_json::from_str(r#""cyberpunk""#).unwrap();
        assert_eq!(theme, Theme::Other("cyberpunk".to_string()));
        assert_eq!(serde_json::to_string(&theme).unwrap(), r#""cyberpunk""#);

        let theme: Theme = serde_json::from_str(r#""system""#).unwrap();
        assert_eq!(theme, Theme::System);
    }

    #[test]
    fn test_settings_preserve_unknown_keys() {
        let json = r#"{"theme":"dark","language":"hu","enableHabits":true}"#;
        let settings: AppSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.theme, Some(Theme::Dark));
        assert_eq!(settings.extra["language"], "hu");

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["enableHabits"], true);
    }

    #[test]
    fn test_category_configs_keyed_by_wire_name() {
        let mut settings = AppSettings::default();
        settings.category_config_mut(Category::Yearly).include_monthly = true;
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["categoryConfigs"]["YEARLY"]["includeMonthly"], true);

        let parsed: AppSettings = serde_json::from_value(json).unwrap();
        assert!(parsed.category_config(Category::Yearly).include_monthly);
        assert!(!parsed.category_config(Category::Daily).include_daily);
    }

    #[test]
    fn test_cloud_config_usable() {
        let mut cloud = CloudConfig::default();
        assert!(!cloud.is_usable());
        cloud.enabled = true;
        assert!(!cloud.is_usable());
        cloud.url = Some("https://api.jsonbin.io/v3/b/abc".to_string());
        assert!(cloud.is_usable());
    }

    #[test]
    fn test_app_name() {
        let mut settings = AppSettings::default();
        assert_eq!(settings.app_name(), "ReaLog");
        settings.user_name = Some("Tomi".to_string());
        assert_eq!(settings.app_name(), "TomiLog");
    }
}
