//! Journal statistics
//!
//! Writing streaks, per-category counts and the "on this day" list. All
//! day arithmetic uses local calendar days; trashed entries and entries
//! dated in the future never count.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone};
use serde::Serialize;

use crate::models::{Category, Entry};

/// Consecutive days with at least one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StreakInfo {
    /// Run ending today or yesterday, 0 otherwise
    pub current: u32,
    pub longest: u32,
}

/// Summary of the entries a viewer can see
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct JournalStats {
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub days_written: usize,
    pub with_photo: usize,
    pub favorites: usize,
    pub private: usize,
    pub words: usize,
    /// Mood tokens by number of entries
    pub moods: BTreeMap<String, usize>,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
    pub streak: StreakInfo,
}

fn local_day(timestamp: i64) -> Option<NaiveDate> {
    Local
        .timestamp_millis_opt(timestamp)
        .single()
        .map(|dt| dt.date_naive())
}

fn counts(entry: &Entry, now: &DateTime<Local>) -> bool {
    !entry.is_trashed() && entry.timestamp <= now.timestamp_millis()
}

/// Distinct local days with an entry, up to `now`
fn written_days<'a>(
    entries: impl IntoIterator<Item = &'a Entry>,
    now: &DateTime<Local>,
) -> BTreeSet<NaiveDate> {
    entries
        .into_iter()
        .filter(|e| counts(e, now))
        .filter_map(|e| local_day(e.timestamp))
        .collect()
}

/// Current and longest daily writing streak
///
/// The current streak survives until the end of the day after the last
/// entry, so an evening writer is not reset at midnight.
pub fn streak_info<'a>(
    entries: impl IntoIterator<Item = &'a Entry>,
    now: DateTime<Local>,
) -> StreakInfo {
    streak_over(&written_days(entries, &now), now.date_naive())
}

fn streak_over(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> StreakInfo {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for &day in days {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    let yesterday = today.pred_opt();
    let current = match days.iter().next_back() {
        Some(&last) if last == today || Some(last) == yesterday => {
            let mut current = 0;
            let mut expected = Some(last);
            for &day in days.iter().rev() {
                if Some(day) != expected {
                    break;
                }
                current += 1;
                expected = day.pred_opt();
            }
            current
        }
        _ => 0,
    };

    StreakInfo { current, longest }
}

/// Statistics over `entries`, which the caller has already filtered for
/// privacy
pub fn journal_stats(entries: &[&Entry], now: DateTime<Local>) -> JournalStats {
    let counted: Vec<&Entry> = entries.iter().copied().filter(|e| counts(e, &now)).collect();
    let days = written_days(counted.iter().copied(), &now);

    let mut stats = JournalStats {
        total: counted.len(),
        days_written: days.len(),
        first: days.iter().next().copied(),
        last: days.iter().next_back().copied(),
        streak: streak_over(&days, now.date_naive()),
        ..Default::default()
    };

    for entry in &counted {
        *stats.by_category.entry(entry.category).or_default() += 1;
        if entry.has_photo() {
            stats.with_photo += 1;
        }
        if entry.is_favorite {
            stats.favorites += 1;
        }
        if entry.is_private {
            stats.private += 1;
        }
        if let Some(mood) = entry.mood.as_deref().filter(|m| !m.is_empty()) {
            *stats.moods.entry(mood.to_string()).or_default() += 1;
        }
        stats.words += word_count(entry);
    }
    stats
}

fn word_count(entry: &Entry) -> usize {
    let answers = entry.responses.values().map(String::as_str);
    let free = entry.free_text();
    answers
        .chain(free)
        .map(|text| text.split_whitespace().count())
        .sum()
}

/// Entries written on today's month and day in earlier years, newest first
pub fn on_this_day<'a>(entries: &[&'a Entry], today: NaiveDate) -> Vec<&'a Entry> {
    let mut matches: Vec<&Entry> = entries
        .iter()
        .copied()
        .filter(|e| !e.is_trashed())
        .filter(|e| {
            local_day(e.timestamp).is_some_and(|day| {
                day.month() == today.month() && day.day() == today.day() && day.year() < today.year()
            })
        })
        .collect();
    matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    matches
}
