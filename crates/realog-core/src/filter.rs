//! Entry filtering and navigation
//!
//! Computes the list a viewer sees: privacy and trash first, then the
//! category view (with the finer categories it is configured to include),
//! then the optional date, mood, photo, tag and favorite filters and the
//! text search, newest first.

use chrono::{Days, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::models::{AppSettings, Category, Entry, GeoPoint};

/// Views that span every category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalView {
    Atlas,
    Gallery,
}

/// Inclusive timestamp bounds in epoch millis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl DateRange {
    /// Range covering whole calendar days in local time
    ///
    /// The end bound is pushed to the start of the following day so the
    /// whole `to` day is included.
    pub fn from_dates(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self {
            start: from.and_then(local_midnight_millis),
            end: to
                .and_then(|d| d.checked_add_days(Days::new(1)))
                .and_then(local_midnight_millis),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start.map_or(true, |start| timestamp >= start)
            && self.end.map_or(true, |end| timestamp <= end)
    }
}

fn local_midnight_millis(date: NaiveDate) -> Option<i64> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

/// What the viewer asked to see
#[derive(Debug, Clone, Default)]
pub struct ViewQuery {
    pub active_category: Category,
    pub global_view: Option<GlobalView>,
    pub is_admin: bool,
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Exact mood token
    pub mood: Option<String>,
    pub has_photo: bool,
    /// Tag to match, ignoring case and a leading `#`
    pub tag: Option<String>,
    pub favorites_only: bool,
}

impl ViewQuery {
    pub fn category(category: Category, is_admin: bool) -> Self {
        Self {
            active_category: category,
            is_admin,
            ..Default::default()
        }
    }
}

/// Categories shown in the view of `active`
///
/// Only categories finer than `active` can be pulled in, so a daily view
/// never absorbs anything and yearly entries only show in the yearly view.
pub fn included_categories(settings: &AppSettings, active: Category) -> Vec<Category> {
    let config = settings.category_config(active);
    let mut categories = vec![active];

    let candidates = [
        (Category::Daily, config.include_daily),
        (Category::Weekly, config.include_weekly),
        (Category::Monthly, config.include_monthly),
    ];
    for (category, flag) in candidates {
        if flag && category < active {
            categories.push(category);
        }
    }
    categories
}

/// Entries visible for `query`, newest first
///
/// Global views skip the category and supplementary filters and keep the
/// stored order.
pub fn visible_entries<'a>(
    entries: &'a [Entry],
    settings: &AppSettings,
    query: &ViewQuery,
) -> Vec<&'a Entry> {
    let visible = entries
        .iter()
        .filter(|e| !e.is_trashed())
        .filter(|e| query.is_admin || !e.is_private);

    if query.global_view.is_some() {
        return visible.collect();
    }

    let categories = included_categories(settings, query.active_category);
    let range = DateRange::from_dates(query.date_from, query.date_to);
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);
    let tag = query
        .tag
        .as_deref()
        .map(|t| t.trim().trim_start_matches('#'))
        .filter(|t| !t.is_empty());

    let mut result: Vec<&Entry> = visible
        .filter(|e| categories.contains(&e.category))
        .filter(|e| range.contains(e.timestamp))
        .filter(|e| match &query.mood {
            Some(mood) => e.mood.as_deref() == Some(mood.as_str()),
            None => true,
        })
        .filter(|e| !query.has_photo || e.has_photo())
        .filter(|e| tag.map_or(true, |t| e.has_tag(t)))
        .filter(|e| !query.favorites_only || e.is_favorite)
        .filter(|e| needle.as_deref().map_or(true, |n| e.matches_query(n)))
        .collect();

    result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    result
}

/// Entries with a shareable GPS position
pub fn map_points<'a>(entries: &[&'a Entry]) -> Vec<(&'a Entry, GeoPoint)> {
    entries
        .iter()
        .filter_map(|e| e.visible_gps().map(|point| (*e, point)))
        .collect()
}

/// Which global views a viewer may open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublicViews {
    pub atlas: bool,
    pub gallery: bool,
}

pub fn public_views(settings: &AppSettings, is_admin: bool) -> PublicViews {
    if is_admin {
        return PublicViews {
            atlas: true,
            gallery: true,
        };
    }
    let config = settings.public_config.clone().unwrap_or_default();
    PublicViews {
        atlas: config.show_atlas,
        gallery: config.show_gallery,
    }
}

/// Direction through a newest-first list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward the newer entry
    Next,
    /// Toward the older entry
    Previous,
}

/// Neighbour of `current_id` in `list`
///
/// `None` when stepping past either end or when the id is not in the list.
pub fn navigate<'a>(list: &[&'a Entry], current_id: &str, direction: Direction) -> Option<&'a Entry> {
    let index = list.iter().position(|e| e.id == current_id)?;
    let target = match direction {
        Direction::Next => index.checked_sub(1)?,
        Direction::Previous => index + 1,
    };
    list.get(target).copied()
}
