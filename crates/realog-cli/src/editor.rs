//! Interactive editing support
//!
//! Entries are edited as a small Markdown document: `key: value` header
//! lines, a `---` separator, then either one `## Question {id}` section per
//! active question or the free text. The document is opened in the user's
//! editor and parsed back into the entry.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::Command;

use anyhow::{bail, Context, Result};

use realog_core::models::{Entry, EntryMode, Question};

const SEPARATOR: &str = "---";

/// Parsed editor document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntryDraft {
    pub title: Option<String>,
    pub mood: Option<String>,
    pub body: DraftBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DraftBody {
    /// Answers by question id; an empty answer clears it
    Answers(BTreeMap<String, String>),
    Free(String),
}

impl Default for DraftBody {
    fn default() -> Self {
        DraftBody::Answers(BTreeMap::new())
    }
}

/// Render `entry` for editing
///
/// Structured entries list `questions` (the category's active ones) and
/// keep any answered question that is no longer active.
pub fn render_entry(entry: &Entry, questions: &[Question], all_questions: &[Question]) -> String {
    let mut out = String::new();
    out.push_str(&format!("title: {}\n", entry.title.as_deref().unwrap_or("")));
    out.push_str(&format!("mood: {}\n", entry.mood.as_deref().unwrap_or("")));
    out.push_str(&format!("mode: {}\n", mode_name(entry.entry_mode)));
    out.push_str(SEPARATOR);
    out.push('\n');

    match entry.entry_mode {
        EntryMode::Free => {
            out.push_str(entry.free_text_content.as_deref().unwrap_or(""));
            out.push('\n');
        }
        EntryMode::Structured => {
            let mut listed: Vec<&Question> = questions.iter().collect();
            for id in entry.responses.keys() {
                if listed.iter().all(|q| &q.id != id) {
                    if let Some(q) = all_questions.iter().find(|q| &q.id == id) {
                        listed.push(q);
                    }
                }
            }
            for question in listed {
                let answer = entry
                    .responses
                    .get(&question.id)
                    .map(String::as_str)
                    .unwrap_or("");
                out.push_str(&format!("\n## {} {{{}}}\n{}\n", question.text, question.id, answer));
            }
        }
    }
    out
}

fn mode_name(mode: EntryMode) -> &'static str {
    match mode {
        EntryMode::Structured => "structured",
        EntryMode::Free => "free",
    }
}

/// Parse an edited document
///
/// The `mode` header picks the body format, so switching `structured` to
/// `free` in the editor converts the entry.
pub fn parse_entry(text: &str) -> Result<EntryDraft> {
    let mut lines = text.lines();
    let mut draft = EntryDraft::default();
    let mut free = false;

    let mut saw_separator = false;
    for line in lines.by_ref() {
        if line.trim() == SEPARATOR {
            saw_separator = true;
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            if line.trim().is_empty() {
                continue;
            }
            bail!("Expected 'key: value' before '{}', got '{}'", SEPARATOR, line);
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "title" => draft.title = Some(value.to_string()).filter(|v| !v.is_empty()),
            "mood" => draft.mood = Some(value.to_string()).filter(|v| !v.is_empty()),
            "mode" => {
                free = match value.to_ascii_lowercase().as_str() {
                    "free" => true,
                    "structured" | "" => false,
                    other => bail!("Unknown mode '{}'. Use structured or free.", other),
                }
            }
            other => bail!("Unknown header '{}'. Use title, mood or mode.", other),
        }
    }
    if !saw_separator {
        bail!("Missing '{}' line after the header", SEPARATOR);
    }

    let rest: Vec<&str> = lines.collect();
    draft.body = if free {
        DraftBody::Free(rest.join("\n").trim().to_string())
    } else {
        DraftBody::Answers(parse_answers(&rest)?)
    };
    Ok(draft)
}

fn parse_answers(lines: &[&str]) -> Result<BTreeMap<String, String>> {
    let mut answers = BTreeMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in lines {
        if let Some(heading) = line.strip_prefix("## ") {
            if let Some((id, body)) = current.take() {
                answers.insert(id, body.join("\n").trim().to_string());
            }
            current = Some((question_id(heading)?, Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        } else if !line.trim().is_empty() {
            bail!("Text before the first question heading: '{}'", line.trim());
        }
    }
    if let Some((id, body)) = current {
        answers.insert(id, body.join("\n").trim().to_string());
    }
    Ok(answers)
}

/// The `{id}` at the end of a question heading
fn question_id(heading: &str) -> Result<String> {
    let heading = heading.trim_end();
    heading
        .strip_suffix('}')
        .and_then(|h| h.rsplit_once('{'))
        .map(|(_, id)| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .with_context(|| format!("Question heading '{}' has no {{id}}", heading))
}

/// Apply a parsed draft to `entry`
pub fn apply_draft(entry: &mut Entry, draft: EntryDraft) {
    entry.title = draft.title;
    entry.mood = draft.mood;
    match draft.body {
        DraftBody::Free(text) => entry.set_free_text(text),
        DraftBody::Answers(answers) => {
            if entry.entry_mode == EntryMode::Free {
                entry.responses.clear();
            }
            entry.entry_mode = EntryMode::Structured;
            entry.free_text_content = None;
            for (id, answer) in answers {
                if answer.is_empty() {
                    entry.responses.remove(&id);
                } else {
                    entry.responses.insert(id, answer);
                }
            }
        }
    }
}

/// Open the entry in the editor until it parses or the user gives up
pub fn edit_entry(entry: &mut Entry, questions: &[Question], all_questions: &[Question]) -> Result<()> {
    let mut text = render_entry(entry, questions, all_questions);
    loop {
        text = open_in_editor(&text)?;
        match parse_entry(&text) {
            Ok(draft) => {
                apply_draft(entry, draft);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Could not read the entry: {}", e);
                if !confirm("Edit again?")? {
                    bail!("Entry left unchanged");
                }
            }
        }
    }
}

/// `$VISUAL`, then `$EDITOR`, then `vi`; may carry arguments ("code -w")
fn editor_command() -> Vec<String> {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .map(|cmd| cmd.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .find(|parts| !parts.is_empty())
        .unwrap_or_else(|| vec!["vi".to_string()])
}

fn open_in_editor(initial: &str) -> Result<String> {
    let file = tempfile::Builder::new()
        .prefix("realog-entry-")
        .suffix(".md")
        .tempfile()
        .context("Failed to create a temporary entry file")?;
    fs::write(file.path(), initial).context("Failed to write the temporary entry file")?;

    let command = editor_command();
    let (program, args) = command
        .split_first()
        .context("Editor command is empty")?;
    let status = Command::new(program)
        .args(args)
        .arg(file.path())
        .status()
        .with_context(|| format!("Failed to start editor '{}'. Set $EDITOR.", program))?;
    if !status.success() {
        bail!("Editor '{}' exited with {}", program, status);
    }

    fs::read_to_string(file.path()).context("Failed to read the edited entry")
}

/// Whether stdin is attached to a terminal
pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin)
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Yes/no question; anything but an explicit yes, or no terminal, is no
pub fn confirm(prompt: &str) -> Result<bool> {
    if !is_interactive() {
        return Ok(false);
    }
    let answer = read_line(&format!("{} [y/N] ", prompt))?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Ask for an answer; `None` keeps `current`
pub fn ask(question: &str, current: &str) -> Result<Option<String>> {
    let prompt = if current.is_empty() {
        format!("{}\n> ", question)
    } else {
        format!("{}\n  (now: {})\n> ", question, current)
    };
    let answer = read_line(&prompt)?;
    Ok(Some(answer).filter(|a| !a.is_empty()))
}

/// Read the admin password without echoing it
pub fn prompt_password() -> Result<String> {
    read_password(is_interactive(), || rpassword::prompt_password("Password: "))
}

fn read_password(interactive: bool, read: impl FnOnce() -> io::Result<String>) -> Result<String> {
    if !interactive {
        bail!("Password required. Pass --password when not running interactively.");
    }
    read().context("Failed to read password")
}
