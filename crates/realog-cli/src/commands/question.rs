//! Question command handlers

use anyhow::{bail, Result};

use realog_core::{Category, Document, Question, SyncOrchestrator};

use super::require_admin;
use crate::editor::confirm;
use crate::output::Output;

/// List questions, optionally for one category
pub fn list(
    sync: &SyncOrchestrator,
    category: Option<Category>,
    active_only: bool,
    output: &Output,
) -> Result<()> {
    let questions = select(sync.document(), category, active_only);
    output.print_questions(&questions);
    Ok(())
}

fn select(document: &Document, category: Option<Category>, active_only: bool) -> Vec<&Question> {
    document
        .questions
        .iter()
        .filter(|q| category.map_or(true, |c| q.category == c))
        .filter(|q| !active_only || q.is_active)
        .collect()
}

/// Add a question
pub fn add(
    sync: &mut SyncOrchestrator,
    text: String,
    category: Category,
    id: Option<String>,
    output: &Output,
) -> Result<()> {
    require_admin(sync)?;

    if text.trim().is_empty() {
        bail!("Question text is empty");
    }

    let question = match id {
        Some(id) => {
            if sync.document().find_question(&id).is_some() {
                bail!("A question with id '{}' already exists", id);
            }
            Question::with_id(id, text.trim(), category)
        }
        None => Question::new(text.trim(), category),
    };

    let id = question.id.clone();
    sync.add_question(question);
    output.success(&format!("Added {} question: {}", category.label(), id));
    Ok(())
}

/// Delete a question
///
/// Answers already given to it stay on their entries.
pub fn delete(sync: &mut SyncOrchestrator, id: String, output: &Output) -> Result<()> {
    require_admin(sync)?;

    let Some(question) = sync.document().find_question(&id) else {
        bail!("Question not found: {}", id);
    };

    if output.should_prompt() {
        println!("Delete question: {} - {}", question.id, question.text);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    sync.delete_question(&id);
    output.success(&format!("Deleted question: {}", id));
    Ok(())
}

/// Activate or deactivate a question
pub fn set_active(
    sync: &mut SyncOrchestrator,
    id: String,
    active: bool,
    output: &Output,
) -> Result<()> {
    require_admin(sync)?;

    if sync.document().find_question(&id).is_none() {
        bail!("Question not found: {}", id);
    }
    sync.set_question_active(&id, active);

    let state = if active { "Activated" } else { "Deactivated" };
    output.success(&format!("{} question: {}", state, id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_by_category() {
        let document = Document::initial();
        let weekly = select(&document, Some(Category::Weekly), false);
        assert!(!weekly.is_empty());
        assert!(weekly.iter().all(|q| q.category == Category::Weekly));

        let all = select(&document, None, false);
        assert_eq!(all.len(), document.questions.len());
    }

    #[test]
    fn test_select_active_only() {
        let mut document = Document::initial();
        let first = document.questions[0].id.clone();
        document.set_question_active(&first, false);

        let active = select(&document, None, true);
        assert_eq!(active.len(), document.questions.len() - 1);
        assert!(active.iter().all(|q| q.id != first));
    }
}
