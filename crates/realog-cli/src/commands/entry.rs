//! Entry command handlers

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, TimeZone};
use clap::Args;

use realog_core::filter::map_points;
use realog_core::filter::public_views;
use realog_core::models::GeoPoint;
use realog_core::{
    navigate, visible_entries, Category, Direction, Document, Entry, GlobalView, Question,
    SyncOrchestrator, ViewQuery,
};

use super::{is_admin, require_admin};
use crate::editor::{ask, confirm, edit_entry, is_interactive};
use crate::output::{short_id, Output};
use crate::weather::fetch_weather;

/// Entry fields settable from the command line
#[derive(Args, Debug, Default)]
pub struct EntryFields {
    /// Entry title
    #[arg(short, long)]
    pub title: Option<String>,

    /// Answer a question (repeatable)
    #[arg(short, long, value_name = "QUESTION_ID=TEXT")]
    pub answer: Vec<String>,

    /// Free-text content; switches the entry to free mode
    #[arg(long, conflicts_with = "answer")]
    pub text: Option<String>,

    /// Write free text in $EDITOR
    #[arg(long, conflicts_with_all = ["answer", "text"])]
    pub free: bool,

    /// Answer the questions in $EDITOR
    #[arg(short, long, conflicts_with_all = ["answer", "text", "free"])]
    pub editor: bool,

    /// Mood token
    #[arg(short, long)]
    pub mood: Option<String>,

    /// Place name
    #[arg(long)]
    pub location: Option<String>,

    /// GPS position
    #[arg(long, value_name = "LAT,LON", value_parser = parse_gps, allow_hyphen_values = true)]
    pub gps: Option<GeoPoint>,

    /// Image file to attach
    #[arg(long)]
    pub photo: Option<PathBuf>,

    /// Look up the day's weather at the entry's GPS position
    #[arg(long)]
    pub weather: bool,

    /// Hide the entry from visitors
    #[arg(long, conflicts_with = "public")]
    pub private: bool,

    /// Show the entry to visitors
    #[arg(long)]
    pub public: bool,

    /// Hide the entry's GPS position from visitors
    #[arg(long, conflicts_with = "share_location")]
    pub hide_location: bool,

    /// Show the entry's GPS position to visitors
    #[arg(long)]
    pub share_location: bool,

    /// Replace the entry's tags (repeatable; pass "" to clear)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Mark as favorite
    #[arg(long, conflicts_with = "unfavorite")]
    pub favorite: bool,

    /// Remove the favorite mark
    #[arg(long)]
    pub unfavorite: bool,
}

impl EntryFields {
    fn sets_content(&self) -> bool {
        self.text.is_some() || self.free || self.editor || !self.answer.is_empty()
    }

    fn is_empty(&self) -> bool {
        !self.sets_content()
            && self.title.is_none()
            && self.mood.is_none()
            && self.location.is_none()
            && self.gps.is_none()
            && self.photo.is_none()
            && !self.weather
            && !self.private
            && !self.public
            && !self.hide_location
            && !self.share_location
            && self.tags.is_empty()
            && !self.favorite
            && !self.unfavorite
    }
}

/// Filters for `entry list`
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Category view
    #[arg(short, long, default_value = "daily")]
    pub category: Category,

    /// Only entries containing this text
    #[arg(short, long)]
    pub search: Option<String>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Only entries with this mood
    #[arg(long)]
    pub mood: Option<String>,

    /// Only entries with a photo
    #[arg(long)]
    pub photos: bool,

    /// Only entries with this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Only favorite entries
    #[arg(long)]
    pub favorites: bool,

    /// Global view across all categories (atlas, gallery)
    #[arg(long, value_parser = parse_global_view)]
    pub view: Option<GlobalView>,
}

/// Create a new entry
pub async fn add(
    sync: &mut SyncOrchestrator,
    category: Category,
    date: Option<NaiveDate>,
    fields: EntryFields,
    output: &Output,
) -> Result<()> {
    require_admin(sync)?;

    let mut entry = match date {
        Some(date) => Entry::at(category, timestamp_on(date)?),
        None => Entry::new(category),
    };

    let prompt_answers = !fields.sets_content() && output.should_prompt() && is_interactive();
    apply_fields(sync, &mut entry, fields, output).await?;
    if prompt_answers {
        let questions: Vec<Question> = sync.document().active_questions(category).cloned().collect();
        prompt_for_answers(&mut entry, &questions)?;
    }

    sync.save_entry(entry.clone());

    output.success(&format!("Created entry: {}", entry.id));
    output.print_entry(sync.document(), &entry);
    Ok(())
}

/// List entries of a category view or a global view
pub fn list(sync: &SyncOrchestrator, args: ListArgs, output: &Output) -> Result<()> {
    let admin = is_admin(sync);
    let document = sync.document();

    if let Some(view) = args.view {
        let allowed = public_views(&document.settings, admin);
        let open = match view {
            GlobalView::Atlas => allowed.atlas,
            GlobalView::Gallery => allowed.gallery,
        };
        if !open {
            bail!("The {:?} view is not public. Log in to see it.", view);
        }
    }

    let query = ViewQuery {
        active_category: args.category,
        global_view: args.view,
        is_admin: admin,
        search: args.search,
        date_from: args.from,
        date_to: args.to,
        mood: args.mood,
        has_photo: args.photos,
        tag: args.tag,
        favorites_only: args.favorites,
    };
    let entries = visible_entries(&document.entries, &document.settings, &query);

    match args.view {
        Some(GlobalView::Atlas) => output.print_map_points(&map_points(&entries)),
        Some(GlobalView::Gallery) => {
            let with_photos: Vec<&Entry> = entries.into_iter().filter(|e| e.has_photo()).collect();
            output.print_entries(&with_photos);
        }
        None => output.print_entries(&entries),
    }
    Ok(())
}

/// Show a single entry
pub fn show(sync: &SyncOrchestrator, id: String, output: &Output) -> Result<()> {
    let document = sync.document();
    let id = resolve_entry_id(document, &id, is_admin(sync))?;
    let entry = document
        .find_entry(&id)
        .ok_or_else(|| anyhow::anyhow!("Entry not found: {}", id))?;

    output.print_entry(document, entry);
    Ok(())
}

/// Show the newer or older neighbour of an entry
///
/// Steps through the `view` category view, which defaults to the entry's
/// own category. A weekly entry reached from a daily view that includes
/// weeklies therefore steps back into that daily view.
pub fn step(
    sync: &SyncOrchestrator,
    id: String,
    view: Option<Category>,
    direction: Direction,
    output: &Output,
) -> Result<()> {
    let admin = is_admin(sync);
    let document = sync.document();
    let id = resolve_entry_id(document, &id, admin)?;

    match neighbour(document, &id, view, admin, direction)? {
        Some(neighbour) => output.print_entry(document, neighbour),
        None => {
            let edge = match direction {
                Direction::Next => "newest",
                Direction::Previous => "oldest",
            };
            output.message(&format!("Already at the {} entry.", edge));
        }
    }
    Ok(())
}

fn neighbour<'a>(
    document: &'a Document,
    id: &str,
    view: Option<Category>,
    is_admin: bool,
    direction: Direction,
) -> Result<Option<&'a Entry>> {
    let current = document
        .find_entry(id)
        .ok_or_else(|| anyhow::anyhow!("Entry not found: {}", id))?;

    let query = ViewQuery::category(view.unwrap_or(current.category), is_admin);
    let entries = visible_entries(&document.entries, &document.settings, &query);
    if !entries.iter().any(|e| e.id == id) {
        bail!(
            "Entry {} is not in the {} view",
            short_id(id),
            query.active_category
        );
    }
    Ok(navigate(&entries, id, direction))
}

/// Edit an entry
///
/// Without any field flags the whole entry opens in $EDITOR.
pub async fn edit(
    sync: &mut SyncOrchestrator,
    id: String,
    category: Option<Category>,
    fields: EntryFields,
    output: &Output,
) -> Result<()> {
    require_admin(sync)?;

    let id = resolve_entry_id(sync.document(), &id, true)?;
    let mut entry = sync
        .document()
        .find_entry(&id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Entry not found: {}", id))?;

    if let Some(category) = category {
        entry.category = category;
    }

    if fields.is_empty() && category.is_none() {
        if !is_interactive() {
            bail!("Nothing to change. Pass field flags or run in a terminal.");
        }
        open_editor(sync, &mut entry)?;
    } else {
        apply_fields(sync, &mut entry, fields, output).await?;
    }

    sync.save_entry(entry.clone());

    output.success("Entry updated");
    output.print_entry(sync.document(), &entry);
    Ok(())
}

/// Delete an entry
pub fn delete(sync: &mut SyncOrchestrator, id: String, output: &Output) -> Result<()> {
    require_admin(sync)?;

    let id = resolve_entry_id(sync.document(), &id, true)?;
    let entry = sync
        .document()
        .find_entry(&id)
        .ok_or_else(|| anyhow::anyhow!("Entry not found: {}", id))?;

    if output.should_prompt() {
        println!(
            "Delete entry: {} - {}",
            short_id(&entry.id),
            entry.display_title()
        );
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    sync.delete_entry(&id);
    output.success(&format!("Deleted entry: {}", id));
    Ok(())
}

/// Search entry text across all categories, or within one category view
pub fn search(
    sync: &SyncOrchestrator,
    query: String,
    category: Option<Category>,
    output: &Output,
) -> Result<()> {
    if query.trim().is_empty() {
        bail!("Search query is empty");
    }

    let admin = is_admin(sync);
    let document = sync.document();
    let results = match category {
        Some(category) => {
            let view = ViewQuery {
                search: Some(query),
                ..ViewQuery::category(category, admin)
            };
            visible_entries(&document.entries, &document.settings, &view)
        }
        None => search_all(document, &query, admin),
    };

    output.print_entries(&results);
    Ok(())
}

/// Entries from every category matching `query`, newest first
fn search_all<'a>(document: &'a Document, query: &str, is_admin: bool) -> Vec<&'a Entry> {
    let needle = query.trim().to_lowercase();
    let mut results: Vec<&Entry> = document
        .entries
        .iter()
        .filter(|e| is_admin || !e.is_private)
        .filter(|e| e.matches_query(&needle))
        .collect();
    results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    results
}

async fn apply_fields(
    sync: &SyncOrchestrator,
    entry: &mut Entry,
    fields: EntryFields,
    output: &Output,
) -> Result<()> {
    if let Some(title) = fields.title {
        entry.title = non_blank(title);
    }
    if let Some(mood) = fields.mood {
        entry.mood = non_blank(mood);
    }
    if let Some(location) = fields.location {
        entry.location = non_blank(location);
    }
    if let Some(point) = fields.gps {
        entry.gps = Some(point);
    }
    if fields.private {
        entry.is_private = true;
    }
    if fields.public {
        entry.is_private = false;
    }
    if fields.hide_location {
        entry.is_location_private = true;
    }
    if fields.share_location {
        entry.is_location_private = false;
    }

    if !fields.tags.is_empty() {
        entry.tags = fields
            .tags
            .iter()
            .map(|t| t.trim().trim_start_matches('#').to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }
    if fields.favorite {
        entry.is_favorite = true;
    }
    if fields.unfavorite {
        entry.is_favorite = false;
    }

    if let Some(text) = fields.text {
        entry.set_free_text(text);
    } else if fields.free {
        if entry.free_text().is_none() {
            entry.set_free_text(String::new());
        }
        open_editor(sync, entry)?;
    } else if fields.editor {
        open_editor(sync, entry)?;
    }

    for raw in &fields.answer {
        let (question_id, answer) = parse_answer(raw)?;
        if sync.document().find_question(question_id).is_none() {
            bail!("Unknown question: {}. List them with `realog question list`.", question_id);
        }
        entry.set_response(question_id, answer);
    }

    if let Some(path) = fields.photo {
        let bytes = fs::read(&path).with_context(|| format!("Failed to read photo {:?}", path))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo.jpg".to_string());
        let url = sync
            .attach_photo(bytes, &filename)
            .await
            .context("Failed to attach photo")?;
        entry.photo = Some(url);
    }

    if fields.weather {
        let key = sync
            .settings()
            .open_weather_map_key
            .as_deref()
            .filter(|k| !k.is_empty());
        match (entry.gps, key) {
            (None, _) => output.warn("Weather lookup needs a GPS position (--gps LAT,LON)"),
            (_, None) => output.warn(
                "No weather API key. Set one with:\n  realog settings set openWeatherMapKey <key>",
            ),
            (Some(point), Some(key)) => match fetch_weather(key, point).await {
                Some(weather) => entry.weather = Some(weather),
                None => output.warn("Weather lookup failed; saving without weather"),
            },
        }
    }

    Ok(())
}

/// Ask each question in turn, keeping the current answer on Enter
fn prompt_for_answers(entry: &mut Entry, questions: &[Question]) -> Result<()> {
    for question in questions {
        let current = entry.responses.get(&question.id).cloned().unwrap_or_default();
        if let Some(answer) = ask(&question.text, &current)? {
            entry.set_response(question.id.clone(), answer);
        }
    }
    Ok(())
}

/// Edit `entry` in $EDITOR against its category's active questions
fn open_editor(sync: &SyncOrchestrator, entry: &mut Entry) -> Result<()> {
    let document = sync.document();
    let questions: Vec<Question> = document.active_questions(entry.category).cloned().collect();
    edit_entry(entry, &questions, &document.questions)?;

    if let Some(unknown) = entry
        .responses
        .keys()
        .find(|id| document.find_question(id).is_none())
    {
        bail!("Unknown question: {}. List them with `realog question list`.", unknown);
    }
    Ok(())
}

/// Entries from earlier years written on `today`'s month and day
pub fn on_this_day(sync: &SyncOrchestrator, output: &Output) -> Result<()> {
    let admin = is_admin(sync);
    let visible: Vec<&Entry> = sync
        .document()
        .entries
        .iter()
        .filter(|e| admin || !e.is_private)
        .collect();

    let found = realog_core::on_this_day(&visible, Local::now().date_naive());
    if found.is_empty() {
        output.message("Nothing written on this day in earlier years.");
    } else {
        output.print_entries(&found);
    }
    Ok(())
}

/// Resolve a full entry id or an unambiguous prefix
///
/// Private entries only resolve for the admin.
fn resolve_entry_id(document: &Document, id: &str, is_admin: bool) -> Result<String> {
    let visible = document
        .entries
        .iter()
        .filter(|e| is_admin || !e.is_private);

    let mut matches = Vec::new();
    for entry in visible {
        if entry.id == id {
            return Ok(entry.id.clone());
        }
        if entry.id.starts_with(id) {
            matches.push(entry);
        }
    }

    match matches.as_slice() {
        [] => bail!("No entry found matching: {}", id),
        [entry] => Ok(entry.id.clone()),
        _ => {
            eprintln!("Multiple entries match '{}':", id);
            for entry in &matches {
                eprintln!("  {} - {}", entry.id, entry.display_title());
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Epoch millis for `date` at the current local time of day
fn timestamp_on(date: NaiveDate) -> Result<i64> {
    let naive = date.and_time(Local::now().time());
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| anyhow::anyhow!("{} has no such local time", date))
}

fn parse_answer(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((id, answer)) if !id.trim().is_empty() => Ok((id.trim(), answer)),
        _ => bail!("Answers are written QUESTION_ID=TEXT, got '{}'", raw),
    }
}

fn parse_gps(raw: &str) -> Result<GeoPoint, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{}'", raw))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude '{}'", lat.trim()))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude '{}'", lon.trim()))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(format!("coordinates out of range: {}", raw));
    }
    Ok(GeoPoint { lat, lon })
}

fn parse_global_view(raw: &str) -> Result<GlobalView, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "atlas" | "map" => Ok(GlobalView::Atlas),
        "gallery" => Ok(GlobalView::Gallery),
        other => Err(format!("Unknown view '{}'. Use atlas or gallery.", other)),
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_with(ids: &[(&str, bool)]) -> Document {
        let mut document = Document::initial();
        for (i, (id, private)) in ids.iter().enumerate() {
            let mut entry = Entry::at(Category::Daily, 1_700_000_000_000 + i as i64 * 1000);
            entry.id = id.to_string();
            entry.is_private = *private;
            document.entries.push(entry);
        }
        document
    }

    #[test]
    fn test_parse_gps() {
        let point = parse_gps("47.4979, 19.0402").unwrap();
        assert_eq!(point.lat, 47.4979);
        assert_eq!(point.lon, 19.0402);

        let south = parse_gps("-33.86,151.21").unwrap();
        assert_eq!(south.lat, -33.86);

        assert!(parse_gps("47.5").is_err());
        assert!(parse_gps("north,19").is_err());
        assert!(parse_gps("91,0").is_err());
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("d1=Slept well").unwrap(), ("d1", "Slept well"));
        // Only the first '=' separates
        assert_eq!(parse_answer("d2=a=b").unwrap(), ("d2", "a=b"));
        assert!(parse_answer("no separator").is_err());
        assert!(parse_answer("=orphan").is_err());
    }

    #[test]
    fn test_parse_global_view() {
        assert_eq!(parse_global_view("Atlas").unwrap(), GlobalView::Atlas);
        assert_eq!(parse_global_view("gallery").unwrap(), GlobalView::Gallery);
        assert!(parse_global_view("calendar").is_err());
    }

    #[test]
    fn test_resolve_entry_id() {
        let document = document_with(&[("abc123", false), ("abd456", false), ("secret1", true)]);

        assert_eq!(resolve_entry_id(&document, "abc123", false).unwrap(), "abc123");
        assert_eq!(resolve_entry_id(&document, "abd", false).unwrap(), "abd456");
        assert!(resolve_entry_id(&document, "ab", false).is_err());
        assert!(resolve_entry_id(&document, "zzz", false).is_err());
    }

    #[test]
    fn test_resolve_private_entry_needs_admin() {
        let document = document_with(&[("secret1", true)]);

        assert!(resolve_entry_id(&document, "secret1", false).is_err());
        assert_eq!(resolve_entry_id(&document, "secret", true).unwrap(), "secret1");
    }

    #[test]
    fn test_search_all_spans_categories() {
        let mut document = Document::initial();

        let mut daily = Entry::at(Category::Daily, 1_000);
        daily.set_free_text("Walked by the Danube");
        let mut yearly = Entry::at(Category::Yearly, 2_000);
        yearly.title = Some("Danube year".to_string());
        let mut hidden = Entry::at(Category::Weekly, 3_000);
        hidden.set_response("w1", "danube again");
        hidden.is_private = true;
        document.entries = vec![daily.clone(), yearly.clone(), hidden.clone()];

        let visitor = search_all(&document, "  DANUBE ", false);
        let ids: Vec<_> = visitor.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![yearly.id.as_str(), daily.id.as_str()]);

        let admin = search_all(&document, "danube", true);
        assert_eq!(admin.len(), 3);
        assert_eq!(admin[0].id, hidden.id);
    }

    #[test]
    fn test_entry_fields_emptiness() {
        let fields = EntryFields::default();
        assert!(fields.is_empty());
        assert!(!fields.sets_content());

        let fields = EntryFields {
            answer: vec!["d1=x".to_string()],
            ..Default::default()
        };
        assert!(fields.sets_content());

        let fields = EntryFields {
            private: true,
            ..Default::default()
        };
        assert!(!fields.is_empty());
        assert!(!fields.sets_content());
    }

    #[test]
    fn test_neighbour_follows_the_browsed_view() {
        let mut document = Document::initial();
        let mut daily_old = Entry::at(Category::Daily, 1_000);
        daily_old.id = "d-old".to_string();
        let mut weekly = Entry::at(Category::Weekly, 2_000);
        weekly.id = "w".to_string();
        let mut daily_new = Entry::at(Category::Daily, 3_000);
        daily_new.id = "d-new".to_string();
        document.entries = vec![daily_old, weekly, daily_new];
        document
            .settings
            .category_config_mut(Category::Weekly)
            .include_daily = true;

        // Own category: the weekly entry is alone
        let next = neighbour(&document, "w", None, true, Direction::Next).unwrap();
        assert!(next.is_none());

        // Weekly view with dailies pulled in
        let next = neighbour(&document, "w", Some(Category::Weekly), true, Direction::Next).unwrap();
        assert_eq!(next.unwrap().id, "d-new");
        let prev = neighbour(&document, "d-new", Some(Category::Weekly), true, Direction::Previous)
            .unwrap();
        assert_eq!(prev.unwrap().id, "w");

        // The daily view never contains weeklies
        assert!(neighbour(&document, "w", Some(Category::Daily), true, Direction::Next).is_err());
    }

    #[test]
    fn test_tag_and_favorite_fields() {
        let fields = EntryFields {
            tags: vec!["#Travel".to_string(), " ".to_string()],
            favorite: true,
            ..Default::default()
        };
        assert!(!fields.is_empty());
        assert!(!fields.sets_content());

        let editor = EntryFields {
            editor: true,
            ..Default::default()
        };
        assert!(editor.sets_content());
    }

    #[test]
    fn test_timestamp_on_keeps_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let entry = Entry::at(Category::Daily, timestamp_on(date).unwrap());
        assert_eq!(entry.date_label, "2024-03-15");
    }
}
