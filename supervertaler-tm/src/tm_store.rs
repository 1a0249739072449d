//! SQLite-backed translation-unit store: exact hash lookup, FTS5 fuzzy
//! search, bidirectional matching, concordance.
//!
//! Schema and query shapes are grounded on the `translation_units` table
//! and its `translation_units_fts` virtual table plus sync triggers in
//! `original_source/modules/database_manager.py`.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, TmError};
use crate::models::translation_unit::{TranslationMatch, TranslationUnit};
use crate::similarity::sequence_similarity;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS translation_units (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_text TEXT NOT NULL,
    target_text TEXT NOT NULL,
    source_lang TEXT NOT NULL,
    target_lang TEXT NOT NULL,
    tm_id TEXT NOT NULL,
    project_id TEXT,
    context_before TEXT,
    context_after TEXT,
    source_hash TEXT NOT NULL,
    usage_count INTEGER NOT NULL DEFAULT 1,
    created_date TEXT NOT NULL,
    modified_date TEXT NOT NULL,
    UNIQUE(source_hash, target_text, tm_id)
);

CREATE INDEX IF NOT EXISTS idx_tu_source_hash ON translation_units(source_hash);
CREATE INDEX IF NOT EXISTS idx_tu_tm_id ON translation_units(tm_id);
CREATE INDEX IF NOT EXISTS idx_tu_project_id ON translation_units(project_id);
CREATE INDEX IF NOT EXISTS idx_tu_langs ON translation_units(source_lang, target_lang);

CREATE VIRTUAL TABLE IF NOT EXISTS translation_units_fts USING fts5(
    source_text, target_text, content='translation_units', content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS tu_ai AFTER INSERT ON translation_units BEGIN
    INSERT INTO translation_units_fts(rowid, source_text, target_text)
    VALUES (new.id, new.source_text, new.target_text);
END;

CREATE TRIGGER IF NOT EXISTS tu_ad AFTER DELETE ON translation_units BEGIN
    INSERT INTO translation_units_fts(translation_units_fts, rowid, source_text, target_text)
    VALUES ('delete', old.id, old.source_text, old.target_text);
END;

CREATE TRIGGER IF NOT EXISTS tu_au AFTER UPDATE ON translation_units BEGIN
    INSERT INTO translation_units_fts(translation_units_fts, rowid, source_text, target_text)
    VALUES ('delete', old.id, old.source_text, old.target_text);
    INSERT INTO translation_units_fts(rowid, source_text, target_text)
    VALUES (new.id, new.source_text, new.target_text);
END;
"#;

/// A single connection, mutex-guarded for the simple single-writer
/// discipline spec §5 asks for in place of a pooled multi-connection
/// setup.
#[derive(Clone)]
pub struct TmStore {
    conn: Arc<Mutex<Connection>>,
}

impl TmStore {
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| TmError::StorageUnavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    pub fn open_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| TmError::StorageUnavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert or, on `(source_hash, target_text, tm_id)` conflict,
    /// increment `usage_count` and refresh `modified_date`. Returns the id.
    pub fn add_unit(
        &self,
        source_text: &str,
        target_text: &str,
        source_lang: &str,
        target_lang: &str,
        tm_id: &str,
        project_id: Option<&str>,
        context_before: Option<&str>,
        context_after: Option<&str>,
    ) -> Result<i64> {
        let source_hash = TranslationUnit::source_hash(source_text);
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().expect("tm connection poisoned");

        conn.execute(
            "INSERT INTO translation_units
                (source_text, target_text, source_lang, target_lang, tm_id, project_id,
                 context_before, context_after, source_hash, usage_count, created_date, modified_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?10)
             ON CONFLICT(source_hash, target_text, tm_id) DO UPDATE SET
                usage_count = usage_count + 1,
                modified_date = excluded.modified_date",
            params![
                source_text,
                target_text,
                source_lang,
                target_lang,
                tm_id,
                project_id,
                context_before,
                context_after,
                source_hash,
                now,
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM translation_units WHERE source_hash = ?1 AND target_text = ?2 AND tm_id = ?3",
            params![source_hash, target_text, tm_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Exact lookup by source hash. With `bidirectional`, also searches
    /// with `source_lang`/`target_lang` swapped and flags those hits
    /// `reverse_match = true`.
    pub fn exact_match(
        &self,
        source_text: &str,
        tm_ids: Option<&[String]>,
        source_lang: Option<&str>,
        target_lang: Option<&str>,
        bidirectional: bool,
    ) -> Result<Option<TranslationMatch>> {
        let source_hash = TranslationUnit::source_hash(source_text);
        let conn = self.conn.lock().expect("tm connection poisoned");

        let forward = Self::query_exact(&conn, &source_hash, source_text, tm_ids, source_lang, target_lang)?;
        let candidate = match forward {
            Some(unit) => Some((unit, false)),
            None if bidirectional => {
                Self::query_exact_by_target(&conn, source_text, tm_ids, source_lang, target_lang)?
                    .map(|unit| (unit, true))
            }
            None => None,
        };

        let Some((unit, reverse_match)) = candidate else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE translation_units SET usage_count = usage_count + 1 WHERE id = ?1",
            params![unit.id],
        )?;

        Ok(Some(TranslationMatch::new(unit, 1.0, reverse_match)))
    }

    fn query_exact(
        conn: &Connection,
        source_hash: &str,
        source_text: &str,
        tm_ids: Option<&[String]>,
        source_lang: Option<&str>,
        target_lang: Option<&str>,
    ) -> Result<Option<TranslationUnit>> {
        let mut sql = String::from(
            "SELECT id, source_text, target_text, source_lang, target_lang, tm_id, project_id,
                    context_before, context_after, source_hash, usage_count, created_date, modified_date
             FROM translation_units
             WHERE source_hash = ?1 AND source_text = ?2",
        );
        if let Some(lang) = source_lang {
            sql.push_str(&format!(" AND source_lang = '{}'", lang.replace('\'', "''")));
        }
        if let Some(lang) = target_lang {
            sql.push_str(&format!(" AND target_lang = '{}'", lang.replace('\'', "''")));
        }
        if let Some(ids) = tm_ids {
            if ids.is_empty() {
                return Ok(None);
            }
            let list = ids
                .iter()
                .map(|id| format!("'{}'", id.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(",");
            sql.push_str(&format!(" AND tm_id IN ({list})"));
        }
        sql.push_str(" ORDER BY usage_count DESC, modified_date DESC LIMIT 1");

        conn.query_row(&sql, params![source_hash, source_text], row_to_unit)
            .optional()
            .map_err(TmError::from)
    }

    /// Bidirectional counterpart of [`Self::query_exact`]: looks the query
    /// text up against `target_text` instead of `source_text`, so a query
    /// in the target language can find a unit stored in the forward
    /// direction. Language/tm_id filters still apply to the unit's own
    /// `source_lang`/`target_lang` columns unchanged.
    fn query_exact_by_target(
        conn: &Connection,
        target_text: &str,
        tm_ids: Option<&[String]>,
        source_lang: Option<&str>,
        target_lang: Option<&str>,
    ) -> Result<Option<TranslationUnit>> {
        let mut sql = String::from(
            "SELECT id, source_text, target_text, source_lang, target_lang, tm_id, project_id,
                    context_before, context_after, source_hash, usage_count, created_date, modified_date
             FROM translation_units
             WHERE target_text = ?1",
        );
        if let Some(lang) = source_lang {
            sql.push_str(&format!(" AND source_lang = '{}'", lang.replace('\'', "''")));
        }
        if let Some(lang) = target_lang {
            sql.push_str(&format!(" AND target_lang = '{}'", lang.replace('\'', "''")));
        }
        if let Some(ids) = tm_ids {
            if ids.is_empty() {
                return Ok(None);
            }
            let list = ids
                .iter()
                .map(|id| format!("'{}'", id.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(",");
            sql.push_str(&format!(" AND tm_id IN ({list})"));
        }
        sql.push_str(" ORDER BY usage_count DESC, modified_date DESC LIMIT 1");

        conn.query_row(&sql, params![target_text], row_to_unit)
            .optional()
            .map_err(TmError::from)
    }

    /// Tokenise, FTS-query, then re-rank candidates by sequence similarity.
    /// Returns up to `max_results` matches with `similarity >= threshold`.
    pub fn fuzzy_match(
        &self,
        query: &str,
        max_results: usize,
        threshold: f64,
        tm_ids: Option<&[String]>,
        bidirectional: bool,
    ) -> Result<Vec<TranslationMatch>> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let fts_query = tokens
            .iter()
            .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR ");

        let conn = self.conn.lock().expect("tm connection poisoned");
        let candidates = Self::fts_candidates(&conn, &fts_query, max_results * 5, tm_ids)?;

        let mut scored: Vec<TranslationMatch> = candidates
            .into_iter()
            .filter_map(|unit| {
                let similarity = sequence_similarity(query, &unit.source_text);
                (similarity >= threshold).then(|| TranslationMatch::new(unit, similarity, false))
            })
            .collect();

        if bidirectional {
            let reverse = Self::fts_candidates(&conn, &fts_query, max_results * 5, tm_ids)?;
            for unit in reverse {
                let similarity = sequence_similarity(query, &unit.target_text);
                if similarity >= threshold {
                    scored.push(TranslationMatch::new(unit, similarity, true));
                }
            }
        }

        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_results);
        Ok(scored)
    }

    fn fts_candidates(
        conn: &Connection,
        fts_query: &str,
        limit: usize,
        tm_ids: Option<&[String]>,
    ) -> Result<Vec<TranslationUnit>> {
        let mut sql = String::from(
            "SELECT tu.id, tu.source_text, tu.target_text, tu.source_lang, tu.target_lang, tu.tm_id,
                    tu.project_id, tu.context_before, tu.context_after, tu.source_hash, tu.usage_count,
                    tu.created_date, tu.modified_date
             FROM translation_units_fts
             JOIN translation_units tu ON tu.id = translation_units_fts.rowid
             WHERE translation_units_fts MATCH ?1",
        );
        if let Some(ids) = tm_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let list = ids
                .iter()
                .map(|id| format!("'{}'", id.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(",");
            sql.push_str(&format!(" AND tu.tm_id IN ({list})"));
        }
        sql.push_str(" LIMIT ?2");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![fts_query, limit as i64], row_to_unit)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Substring search over both source and target text, unranked beyond
    /// recency, for human concordance lookups.
    pub fn concordance_search(&self, text: &str, limit: usize) -> Result<Vec<TranslationUnit>> {
        let conn = self.conn.lock().expect("tm connection poisoned");
        let pattern = format!("%{}%", text.replace('%', "\\%").replace('_', "\\_"));
        let mut stmt = conn.prepare(
            "SELECT id, source_text, target_text, source_lang, target_lang, tm_id, project_id,
                    context_before, context_after, source_hash, usage_count, created_date, modified_date
             FROM translation_units
             WHERE source_text LIKE ?1 ESCAPE '\\' OR target_text LIKE ?1 ESCAPE '\\'
             ORDER BY modified_date DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![pattern, limit as i64], row_to_unit)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_unit(&self, tm_id: &str, source_text: &str, target_text: &str) -> Result<usize> {
        let conn = self.conn.lock().expect("tm connection poisoned");
        let n = conn.execute(
            "DELETE FROM translation_units WHERE tm_id = ?1 AND source_text = ?2 AND target_text = ?3",
            params![tm_id, source_text, target_text],
        )?;
        Ok(n)
    }

    pub fn clear_tm(&self, tm_id: &str) -> Result<usize> {
        let conn = self.conn.lock().expect("tm connection poisoned");
        let n = conn.execute("DELETE FROM translation_units WHERE tm_id = ?1", params![tm_id])?;
        Ok(n)
    }
}

fn row_to_unit(row: &rusqlite::Row) -> rusqlite::Result<TranslationUnit> {
    let created: String = row.get(11)?;
    let modified: String = row.get(12)?;
    Ok(TranslationUnit {
        id: row.get(0)?,
        source_text: row.get(1)?,
        target_text: row.get(2)?,
        source_lang: row.get(3)?,
        target_lang: row.get(4)?,
        tm_id: row.get(5)?,
        project_id: row.get(6)?,
        context_before: row.get(7)?,
        context_after: row.get(8)?,
        source_hash: row.get(9)?,
        usage_count: row.get(10)?,
        created_date: parse_rfc3339(&created),
        modified_date: parse_rfc3339(&modified),
    })
}

fn parse_rfc3339(s: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Strip punctuation, keep tokens longer than one character.
fn tokenize(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_unit_is_idempotent_under_double_insertion() {
        let store = TmStore::open_in_memory().unwrap();
        let id1 = store.add_unit("Hello", "Bonjour", "en", "fr", "tm1", None, None, None).unwrap();
        let id2 = store.add_unit("Hello", "Bonjour", "en", "fr", "tm1", None, None, None).unwrap();
        assert_eq!(id1, id2);

        let m = store.exact_match("Hello", None, None, None, false).unwrap().unwrap();
        assert_eq!(m.unit.usage_count, 3);
    }

    #[test]
    fn exact_match_bidirectional_flags_reverse() {
        let store = TmStore::open_in_memory().unwrap();
        store.add_unit("Hello", "Bonjour", "en", "fr", "tm1", None, None, None).unwrap();

        let forward = store.exact_match("Hello", None, Some("en"), Some("fr"), true).unwrap().unwrap();
        assert!(!forward.reverse_match);

        let reverse = store.exact_match("Bonjour", None, Some("en"), Some("fr"), true).unwrap().unwrap();
        assert!(reverse.reverse_match);
    }

    #[test]
    fn fuzzy_match_ranks_by_similarity_and_respects_threshold() {
        let store = TmStore::open_in_memory().unwrap();
        store
            .add_unit("The cat sat on the mat", "Le chat", "en", "fr", "tm1", None, None, None)
            .unwrap();
        store
            .add_unit("The cat sits on the mat", "Le chat assis", "en", "fr", "tm1", None, None, None)
            .unwrap();
        store.add_unit("Completely unrelated text", "Texte sans rapport", "en", "fr", "tm1", None, None, None).unwrap();

        let results = store.fuzzy_match("The cat sat on the mat", 5, 0.6, None, false).unwrap();
        assert!(!results.is_empty());
        assert!(results[0].similarity >= results.last().unwrap().similarity);
    }

    #[test]
    fn empty_query_returns_empty_not_error() {
        let store = TmStore::open_in_memory().unwrap();
        let results = store.fuzzy_match("   ", 5, 0.5, None, false).unwrap();
        assert!(results.is_empty());
    }
}
