//! Explicit configuration structs threaded through constructors.
//!
//! Per spec §9's "Global mutable state" redesign flag, the private-mode
//! toggle and the API-key map are ordinary fields here, not process-wide
//! singletons. `DocumentProcessingConfig` keeps the name and shape of
//! `tradocflow-core/src/services/document_processing.rs`'s struct of the
//! same name, generalised to the languages/chunking this crate needs.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Parsed `api_keys.txt`: `key = value` lines, `#` comments. Recognised
/// keys accept the aliases spec §6 lists (`google|gemini`, `claude|anthropic`,
/// `openai|chatgpt`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    pub google: Option<String>,
    pub claude: Option<String>,
    pub openai: Option<String>,
}

const TEMPLATE: &str = "\
# Supervertaler API keys.
# One `key = value` per line. Lines starting with # are comments.
# Recognised keys: google (or gemini), claude (or anthropic), openai (or chatgpt).
# google = YOUR_GEMINI_KEY
# claude = YOUR_ANTHROPIC_KEY
# openai = YOUR_OPENAI_KEY
";

impl ApiKeyConfig {
    /// Load `api_keys.txt`. A missing file is created as a commented
    /// template and an empty config is returned.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let mut file = std::fs::File::create(path)?;
            file.write_all(TEMPLATE.as_bytes())?;
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse(&contents))
    }

    pub fn parse(contents: &str) -> Self {
        let mut config = Self::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "google" | "gemini" => config.google = Some(value),
                "claude" | "anthropic" => config.claude = Some(value),
                "openai" | "chatgpt" => config.openai = Some(value),
                _ => {}
            }
        }
        config
    }

    pub fn has_any(&self) -> bool {
        self.google.is_some() || self.claude.is_some() || self.openai.is_some()
    }
}

/// Disambiguates provider-specific batch sizing / output-token budgets
/// inside `LLMOrchestrator` without the orchestrator ever branching on
/// provider identity beyond this hint, per spec §4.I / §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderHint {
    Gemini,
    Claude,
    OpenAi,
}

impl ProviderHint {
    /// Conservative default batch size per provider, mirroring
    /// `ai_pretranslation_agent.py`'s per-provider token-budget comment
    /// (Gemini ~30K tokens, Claude ~200K, OpenAI ~128K) translated into a
    /// segment-count ceiling rather than a token estimate.
    pub fn default_chunk_size(&self) -> usize {
        match self {
            Self::Gemini => 40,
            Self::Claude => 150,
            Self::OpenAi => 100,
        }
    }
}

/// Translation vs. proofread mode, a tagged union per spec §9 rather than
/// a class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    Translate,
    Proofread,
}

/// Per-run configuration: languages, chunk size, provider, resources.
/// Grounded in shape on `DocumentProcessingConfig` in
/// `tradocflow-core/src/services/document_processing.rs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub source_lang: String,
    pub target_lang: String,
    pub mode: RunMode,
    pub provider: ProviderHint,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub custom_instructions: String,
    #[serde(default)]
    pub tm_ids: Vec<String>,
    #[serde(default)]
    pub termbase_project_id: Option<String>,
    #[serde(default = "default_true")]
    pub bidirectional_tm: bool,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_max_tm_matches")]
    pub max_tm_matches: usize,
    #[serde(default = "default_tracked_change_cap")]
    pub tracked_change_count: usize,
}

fn default_chunk_size() -> usize {
    100
}
fn default_true() -> bool {
    true
}
fn default_fuzzy_threshold() -> f64 {
    0.6
}
fn default_max_tm_matches() -> usize {
    5
}
fn default_tracked_change_cap() -> usize {
    5
}

impl RunConfig {
    pub fn new(source_lang: impl Into<String>, target_lang: impl Into<String>, mode: RunMode, provider: ProviderHint) -> Self {
        Self {
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            mode,
            provider,
            chunk_size: provider.default_chunk_size(),
            custom_instructions: String::new(),
            tm_ids: Vec::new(),
            termbase_project_id: None,
            bidirectional_tm: true,
            fuzzy_threshold: default_fuzzy_threshold(),
            max_tm_matches: default_max_tm_matches(),
            tracked_change_count: default_tracked_change_cap(),
        }
    }
}

/// Project file, deserialising into `supervertaler_tm::Project` plus the
/// run-configuration subset spec §6 names (UI language pair, provider/
/// model, mode, chunk size, custom instructions, file paths, selected
/// system prompts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    pub version: String,
    pub project: supervertaler_tm::Project,
    pub run_config: Option<RunConfig>,
    #[serde(default)]
    pub source_path: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub figures_dir: Option<String>,
    #[serde(default)]
    pub tracked_change_sources: Vec<String>,
    #[serde(default)]
    pub system_prompt_file: Option<String>,
}

impl ProjectFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| CoreError::InvalidInput(e.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).map_err(|e| CoreError::InvalidInput(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Extra per-project settings that don't warrant their own field, stored
/// as a typed map rather than an untyped `serde_json::Value` blob where
/// the caller needs simple string settings (e.g. last-used paths).
pub type SettingsMap = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_config_parses_recognised_aliases_and_comments() {
        let contents = "# comment\ngemini = abc123\nanthropic=def456\nopenai = ghi789\nbad-line\n";
        let config = ApiKeyConfig::parse(contents);
        assert_eq!(config.google.as_deref(), Some("abc123"));
        assert_eq!(config.claude.as_deref(), Some("def456"));
        assert_eq!(config.openai.as_deref(), Some("ghi789"));
    }

    #[test]
    fn missing_api_keys_file_is_created_as_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_keys.txt");
        let config = ApiKeyConfig::load_or_create(&path).unwrap();
        assert!(!config.has_any());
        assert!(path.exists());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("# Supervertaler API keys"));
    }
}
