//! Import command handler

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use realog_core::wxr::{is_wxr_file_name, parse_wxr};
use realog_core::{Document, SyncOrchestrator};

use super::require_admin;
use crate::editor::confirm;
use crate::output::Output;

/// Import a JSON backup or a WordPress export
///
/// A JSON backup replaces the whole journal; WordPress posts are added in
/// front of the existing entries. `.xml` and `.wxr` files are read as
/// WordPress exports unless `wxr` forces it for other names. The file is
/// validated before anything is touched.
pub fn run(
    sync: &mut SyncOrchestrator,
    file: PathBuf,
    wxr: bool,
    yes: bool,
    output: &Output,
) -> Result<()> {
    require_admin(sync)?;

    let text =
        fs::read_to_string(&file).with_context(|| format!("Failed to read import file {:?}", file))?;

    if wxr || is_wxr_file_name(&file) {
        return import_posts(sync, &text, &file, yes, output);
    }

    let document = Document::from_import_json(&text).context("Import rejected")?;
    let (entries, questions) = (document.entries.len(), document.questions.len());

    let summary = format!(
        "The journal ({} entries) will be replaced by {} entries and {} questions from {}.",
        sync.document().entries.len(),
        entries,
        questions,
        file.display()
    );
    if !confirmed(yes, &summary, output)? {
        return Ok(());
    }

    sync.replace_document(document);
    output.success(&format!(
        "Imported {} entries and {} questions",
        entries, questions
    ));
    Ok(())
}

fn import_posts(
    sync: &mut SyncOrchestrator,
    text: &str,
    file: &std::path::Path,
    yes: bool,
    output: &Output,
) -> Result<()> {
    let entries = parse_wxr(text).context("Import rejected")?;
    if entries.is_empty() {
        output.message("No posts found; nothing imported.");
        return Ok(());
    }

    let count = entries.len();
    let summary = format!(
        "{} posts from {} will be added to the journal ({} entries).",
        count,
        file.display(),
        sync.document().entries.len()
    );
    if !confirmed(yes, &summary, output)? {
        return Ok(());
    }

    sync.mutate(|doc| doc.prepend_entries(entries));
    output.success(&format!("Imported {} posts as free-text entries", count));
    Ok(())
}

fn confirmed(yes: bool, summary: &str, output: &Output) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !output.should_prompt() {
        bail!("Re-run with --yes to confirm the import.");
    }
    println!("{}", summary);
    if !confirm("Continue?")? {
        println!("Cancelled.");
        return Ok(false);
    }
    Ok(true)
}
