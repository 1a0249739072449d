//! Project metadata and project-scoped non-translatable patterns.
//!
//! Grounded on the `projects` and `non_translatables` tables in
//! `original_source/modules/database_manager.py`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A project-scoped, regex-driven "never touch this span" entry that
/// `ContextAssembler` may surface to the LLM as part of custom
/// instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonTranslatablePattern {
    pub id: i64,
    pub pattern: String,
    #[serde(default = "default_pattern_type")]
    pub pattern_type: String,
    pub description: String,
    pub project_id: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub example_text: Option<String>,
    pub category: Option<String>,
    pub created_date: DateTime<Utc>,
}

fn default_pattern_type() -> String {
    "regex".to_string()
}

fn default_true() -> bool {
    true
}

/// Persisted project state: the unit that owns a set of active TMs,
/// termbases, and run configuration, backing the "Project file" external
/// interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    pub last_opened: Option<DateTime<Utc>>,
    pub active_tm_ids: Vec<String>,
    pub active_termbase_ids: Vec<i64>,
    pub active_prompt_file: Option<String>,
    pub active_style_guide: Option<String>,
    pub segment_count: u64,
    pub translated_count: u64,
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            source_lang: None,
            target_lang: None,
            created_date: now,
            modified_date: now,
            last_opened: None,
            active_tm_ids: Vec::new(),
            active_termbase_ids: Vec::new(),
            active_prompt_file: None,
            active_style_guide: None,
            segment_count: 0,
            translated_count: 0,
            settings: serde_json::Value::Null,
        }
    }
}
