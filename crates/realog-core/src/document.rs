//! The journal document
//!
//! A [`Document`] is the single unit of persistence: every backend reads and
//! writes the whole `{questions, entries, settings}` aggregate, never a
//! partial update. This module also holds the pure merge policy applied
//! when a remote document is adopted on load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::backend::BackendError;
use crate::models::{AppSettings, Category, CategoryConfig, Entry, Question};

/// Root aggregate of questions, entries and settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub settings: AppSettings,
    /// Top-level collections this version does not manage (habits, templates)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Document {
    /// Built-in document used when nothing has been stored yet
    ///
    /// Contains the default question set and a view configuration for every
    /// category with all inclusion flags off.
    pub fn initial() -> Self {
        let mut settings = AppSettings::default();
        for category in Category::ALL {
            *settings.category_config_mut(category) = CategoryConfig::default();
        }

        Self {
            questions: default_questions(),
            entries: Vec::new(),
            settings,
            extra: BTreeMap::new(),
        }
    }

    /// Parse an import file
    ///
    /// The file must be a JSON object carrying both `entries` and
    /// `questions`; anything else is rejected before it can overwrite data.
    pub fn from_import_json(text: &str) -> Result<Self, BackendError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| BackendError::ImportValidation {
                details: format!("not valid JSON: {}", e),
            })?;

        let Some(object) = value.as_object() else {
            return Err(BackendError::ImportValidation {
                details: "top level is not a JSON object".to_string(),
            });
        };

        for key in ["entries", "questions"] {
            if !object.contains_key(key) {
                return Err(BackendError::ImportValidation {
                    details: format!("missing '{}' field", key),
                });
            }
        }

        serde_json::from_value(value).map_err(|e| BackendError::ImportValidation {
            details: e.to_string(),
        })
    }

    /// Serialize as indented JSON
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Adopt a freshly loaded remote document
    ///
    /// Remote entries and questions replace the local ones; settings are
    /// merged with local as the base so preferences the remote never stored
    /// (theme, for instance) survive the first sync.
    pub fn adopt_remote(local: &Document, remote: Document) -> Document {
        Document {
            questions: remote.questions,
            entries: remote.entries,
            settings: merge_settings(&local.settings, &remote.settings),
            extra: remote.extra,
        }
    }

    // ==================== Entries ====================

    /// Put imported entries in front of the existing ones
    pub fn prepend_entries(&mut self, entries: Vec<Entry>) {
        self.entries.splice(0..0, entries);
    }

    /// Insert a new entry, or replace the stored entry with the same id
    ///
    /// New entries go to the front, matching the most-recent-first layout.
    pub fn upsert_entry(&mut self, entry: Entry) {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.insert(0, entry),
        }
    }

    /// Remove an entry; returns whether it existed
    pub fn delete_entry(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn find_entry(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    // ==================== Questions ====================

    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question);
    }

    /// Remove a question; answers already given to it stay on their entries
    pub fn delete_question(&mut self, id: &str) -> bool {
        let before = self.questions.len();
        self.questions.retain(|q| q.id != id);
        self.questions.len() != before
    }

    /// Toggle a question's active flag; returns whether it was found
    pub fn set_question_active(&mut self, id: &str, active: bool) -> bool {
        match self.questions.iter_mut().find(|q| q.id == id) {
            Some(question) => {
                question.is_active = active;
                true
            }
            None => false,
        }
    }

    /// Active questions for a category, in document order
    pub fn active_questions(&self, category: Category) -> impl Iterator<Item = &Question> {
        self.questions
            .iter()
            .filter(move |q| q.category == category && q.is_active)
    }

    pub fn find_question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Answered questions of an entry that still exist, in document order
    ///
    /// Answers to deleted questions are skipped.
    pub fn answered_questions<'a>(
        &'a self,
        entry: &'a Entry,
    ) -> impl Iterator<Item = (&'a Question, &'a str)> + 'a {
        self.questions.iter().filter_map(move |q| {
            entry
                .responses
                .get(&q.id)
                .map(String::as_str)
                .filter(|answer| !answer.trim().is_empty())
                .map(|answer| (q, answer))
        })
    }
}

/// Merge two settings bags
///
/// `local` is the base; every field present in `remote` overrides it. A
/// field absent from `remote` never erases a local value. Unknown keys are
/// merged the same way.
pub fn merge_settings(local: &AppSettings, remote: &AppSettings) -> AppSettings {
    fn pick<T: Clone>(local: &Option<T>, remote: &Option<T>) -> Option<T> {
        remote.clone().or_else(|| local.clone())
    }

    let mut extra = local.extra.clone();
    extra.extend(remote.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

    AppSettings {
        user_name: pick(&local.user_name, &remote.user_name),
        admin_password: pick(&local.admin_password, &remote.admin_password),
        open_weather_map_key: pick(&local.open_weather_map_key, &remote.open_weather_map_key),
        theme: pick(&local.theme, &remote.theme),
        moods: pick(&local.moods, &remote.moods),
        cloud: pick(&local.cloud, &remote.cloud),
        category_configs: pick(&local.category_configs, &remote.category_configs),
        public_config: pick(&local.public_config, &remote.public_config),
        extra,
    }
}

/// Built-in question set
fn default_questions() -> Vec<Question> {
    let q = Question::with_id;
    vec![
        q("d1", "What went well today?", Category::Daily),
        q("d2", "What could have gone better?", Category::Daily),
        q("d3", "What am I grateful for?", Category::Daily),
        q("w1", "What was the highlight of the week?", Category::Weekly),
        q("w2", "What did I learn this week?", Category::Weekly),
        q("m1", "Which goals did I move forward this month?", Category::Monthly),
        q("m2", "What do I want to change next month?", Category::Monthly),
        q("y1", "What defined this year?", Category::Yearly),
        q("y2", "What do I want next year to look like?", Category::Yearly),
    ]
}
