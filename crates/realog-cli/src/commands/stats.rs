//! Stats command handler

use anyhow::Result;
use chrono::Local;

use realog_core::{journal_stats, Entry, JournalStats, SyncOrchestrator};

use super::is_admin;
use crate::output::{print_json, Output, OutputFormat};

/// Show streaks and counts over the entries the viewer can see
pub fn show(sync: &SyncOrchestrator, output: &Output) -> Result<()> {
    let admin = is_admin(sync);
    let visible: Vec<&Entry> = sync
        .document()
        .entries
        .iter()
        .filter(|e| admin || !e.is_private)
        .collect();
    let stats = journal_stats(&visible, Local::now());

    match output.format {
        OutputFormat::Json => print_json(&stats),
        OutputFormat::Quiet => println!("{}", stats.streak.current),
        OutputFormat::Human => print_human(&stats, admin),
    }
    Ok(())
}

fn print_human(stats: &JournalStats, admin: bool) {
    println!("Streak:   {} day(s), longest {}", stats.streak.current, stats.streak.longest);
    println!("Entries:  {} on {} day(s)", stats.total, stats.days_written);
    if let (Some(first), Some(last)) = (stats.first, stats.last) {
        println!("Span:     {} to {}", first, last);
    }
    println!("Words:    {}", stats.words);
    println!();

    println!("By category:");
    for (category, count) in &stats.by_category {
        println!("  {:<8} {}", category.label(), count);
    }

    if !stats.moods.is_empty() {
        let mut moods: Vec<(&String, &usize)> = stats.moods.iter().collect();
        moods.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        println!();
        println!("Moods:");
        for (mood, count) in moods {
            println!("  {:<12} {}", mood, count);
        }
    }

    println!();
    println!("With photo: {}", stats.with_photo);
    println!("Favorites:  {}", stats.favorites);
    if admin {
        println!("Private:    {}", stats.private);
    }
}
