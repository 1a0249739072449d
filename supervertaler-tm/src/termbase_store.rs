//! Termbase CRUD, per-project activation, and priority-ranked term search.
//!
//! Grounded on `original_source/modules/termbase_manager.py`, in
//! particular `_reassign_rankings_for_project` for the ranking
//! reassignment transaction and `search_terms` for the substring/language/
//! project matching rules.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{Result, TmError};
use crate::models::termbase::{Term, Termbase, TermbaseSummary, TermHit};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS termbases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    source_lang TEXT,
    target_lang TEXT,
    project_id TEXT,
    description TEXT NOT NULL DEFAULT '',
    is_global INTEGER NOT NULL,
    priority INTEGER NOT NULL DEFAULT 50,
    is_project_termbase INTEGER NOT NULL DEFAULT 0,
    ranking INTEGER
);

CREATE TABLE IF NOT EXISTS terms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    termbase_id INTEGER NOT NULL REFERENCES termbases(id),
    source_term TEXT NOT NULL,
    target_term TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 99,
    source_lang TEXT,
    target_lang TEXT,
    domain TEXT,
    notes TEXT NOT NULL DEFAULT '',
    project TEXT,
    client TEXT,
    forbidden INTEGER NOT NULL DEFAULT 0,
    term_uuid TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_terms_termbase ON terms(termbase_id);
CREATE INDEX IF NOT EXISTS idx_terms_source ON terms(source_term);

CREATE VIRTUAL TABLE IF NOT EXISTS termbase_terms_fts USING fts5(
    source_term, content='terms', content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS term_ai AFTER INSERT ON terms BEGIN
    INSERT INTO termbase_terms_fts(rowid, source_term) VALUES (new.id, new.source_term);
END;

CREATE TRIGGER IF NOT EXISTS term_ad AFTER DELETE ON terms BEGIN
    INSERT INTO termbase_terms_fts(termbase_terms_fts, rowid, source_term) VALUES ('delete', old.id, old.source_term);
END;

CREATE TRIGGER IF NOT EXISTS term_au AFTER UPDATE ON terms BEGIN
    INSERT INTO termbase_terms_fts(termbase_terms_fts, rowid, source_term) VALUES ('delete', old.id, old.source_term);
    INSERT INTO termbase_terms_fts(rowid, source_term) VALUES (new.id, new.source_term);
END;

CREATE TABLE IF NOT EXISTS termbase_project_activations (
    termbase_id INTEGER NOT NULL REFERENCES termbases(id),
    project_id TEXT NOT NULL,
    is_active INTEGER NOT NULL,
    activated_date TEXT NOT NULL,
    PRIMARY KEY (termbase_id, project_id)
);
"#;

#[derive(Clone)]
pub struct TermbaseStore {
    conn: Arc<Mutex<Connection>>,
}

impl TermbaseStore {
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

    #[allow(clippy::too_many_arguments)]
    pub fn create_termbase(
        &self,
        name: &str,
        source_lang: Option<&str>,
        target_lang: Option<&str>,
        project_id: Option<&str>,
        description: &str,
        is_global: bool,
        is_project_termbase: bool,
    ) -> Result<i64> {
        let conn = self.conn.lock().expect("termbase connection poisoned");

        if is_project_termbase {
            if let Some(pid) = project_id {
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM termbases WHERE project_id = ?1 AND is_project_termbase = 1",
                        params![pid],
                        |row| row.get(0),
                    )
                    .optional()?;
                if exists.is_some() {
                    return Err(TmError::ConstraintConflict(format!(
                        "project {pid} already has a project termbase"
                    )));
                }
            }
        }

        conn.execute(
            "INSERT INTO termbases
                (name, source_lang, target_lang, project_id, description, is_global, priority, is_project_termbase, ranking)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 50, ?7, NULL)",
            params![
                name,
                source_lang,
                target_lang,
                project_id,
                description,
                is_global as i64,
                is_project_termbase as i64,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Ordered `is_project_termbase DESC, is_global DESC, name ASC`, each
    /// with its aggregated term count.
    pub fn list_termbases(&self) -> Result<Vec<TermbaseSummary>> {
        let conn = self.conn.lock().expect("termbase connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT t.id, t.name, t.source_lang, t.target_lang, t.project_id, t.description,
                    t.is_global, t.priority, t.is_project_termbase, t.ranking,
                    (SELECT COUNT(*) FROM terms WHERE termbase_id = t.id) AS term_count
             FROM termbases t
             ORDER BY t.is_project_termbase DESC, t.is_global DESC, t.name ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TermbaseSummary {
                    termbase: row_to_termbase(row)?,
                    term_count: row.get(10)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Upsert `(termbase_id, project_id, is_active=true)` then reassign
    /// rankings for the project in one transaction.
    pub fn activate(&self, termbase_id: i64, project_id: &str) -> Result<()> {
        let mut conn = self.conn.lock().expect("termbase connection poisoned");
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO termbase_project_activations (termbase_id, project_id, is_active, activated_date)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(termbase_id, project_id) DO UPDATE SET is_active = 1",
            params![termbase_id, project_id, now],
        )?;
        reassign_rankings_for_project(&tx, project_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Upsert `is_active=false`, clear that termbase's ranking, then
    /// reassign rankings for the project.
    pub fn deactivate(&self, termbase_id: i64, project_id: &str) -> Result<()> {
        let mut conn = self.conn.lock().expect("termbase connection poisoned");
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE termbase_project_activations SET is_active = 0
             WHERE termbase_id = ?1 AND project_id = ?2",
            params![termbase_id, project_id],
        )?;
        tx.execute(
            "UPDATE termbases SET ranking = NULL WHERE id = ?1",
            params![termbase_id],
        )?;
        reassign_rankings_for_project(&tx, project_id)?;
        tx.commit()?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_term(
        &self,
        termbase_id: i64,
        source_term: &str,
        target_term: &str,
        priority: i32,
        domain: Option<&str>,
        notes: &str,
        project: Option<&str>,
        client: Option<&str>,
        forbidden: bool,
        source_lang: Option<&str>,
        target_lang: Option<&str>,
        term_uuid: Option<Uuid>,
    ) -> Result<i64> {
        let term_uuid = term_uuid.unwrap_or_else(Uuid::new_v4);
        let conn = self.conn.lock().expect("termbase connection poisoned");
        conn.execute(
            "INSERT INTO terms
                (termbase_id, source_term, target_term, priority, source_lang, target_lang,
                 domain, notes, project, client, forbidden, term_uuid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                termbase_id,
                source_term,
                target_term,
                priority,
                source_lang,
                target_lang,
                domain,
                notes,
                project,
                client,
                forbidden as i64,
                term_uuid.to_string(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Matches rows whose `source_term` equals the query or appears as a
    /// whole word at the start, middle, or end of it. Language filter is
    /// "match or inherit": a term's own language wins if set, otherwise its
    /// termbase's language is consulted. Project filter accepts the given
    /// `project_id` or a null (global) one.
    pub fn search_terms(
        &self,
        query: &str,
        source_lang: Option<&str>,
        target_lang: Option<&str>,
        project_id: Option<&str>,
        min_length: Option<usize>,
    ) -> Result<Vec<TermHit>> {
        let conn = self.conn.lock().expect("termbase connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT t.id, t.termbase_id, t.source_term, t.target_term, t.priority, t.source_lang,
                    t.target_lang, t.domain, t.notes, t.project, t.client, t.forbidden, t.term_uuid,
                    tb.name, tb.source_lang, tb.target_lang, tb.ranking
             FROM terms t
             JOIN termbases tb ON tb.id = t.termbase_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let term = Term {
                    id: row.get(0)?,
                    termbase_id: row.get(1)?,
                    source_term: row.get(2)?,
                    target_term: row.get(3)?,
                    priority: row.get(4)?,
                    source_lang: row.get(5)?,
                    target_lang: row.get(6)?,
                    domain: row.get(7)?,
                    notes: row.get(8)?,
                    project: row.get(9)?,
                    client: row.get(10)?,
                    forbidden: row.get::<_, i64>(11)? != 0,
                    term_uuid: row
                        .get::<_, String>(12)?
                        .parse()
                        .unwrap_or_else(|_| Uuid::new_v4()),
                };
                let tb_name: String = row.get(13)?;
                let tb_source_lang: Option<String> = row.get(14)?;
                let tb_target_lang: Option<String> = row.get(15)?;
                let tb_ranking: Option<i32> = row.get(16)?;
                Ok((term, tb_name, tb_source_lang, tb_target_lang, tb_ranking))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let query_lower = query.to_lowercase();
        let mut hits: Vec<TermHit> = rows
            .into_iter()
            .filter(|(term, _, tb_src, tb_tgt, _)| {
                term_matches_fragment(&term.source_term, &query_lower)
                    && lang_matches(term.source_lang.as_deref(), tb_src.as_deref(), source_lang)
                    && lang_matches(term.target_lang.as_deref(), tb_tgt.as_deref(), target_lang)
                    && project_matches(term.project.as_deref(), project_id)
                    && min_length.map_or(true, |min| term.source_term.chars().count() >= min)
            })
            .map(|(term, tb_name, _, _, tb_ranking)| TermHit {
                term,
                termbase_name: tb_name,
                termbase_ranking: tb_ranking,
            })
            .collect();

        hits.sort_by(|a, b| {
            a.term
                .priority
                .cmp(&b.term.priority)
                .then_with(|| a.term.source_term.cmp(&b.term.source_term))
        });
        Ok(hits)
    }
}

fn term_matches_fragment(source_term: &str, query_lower: &str) -> bool {
    let term_lower = source_term.to_lowercase();
    if term_lower == *query_lower {
        return true;
    }
    let padded_hay = format!(" {term_lower} ");
    padded_hay.contains(&format!(" {query_lower} "))
}

fn lang_matches(term_lang: Option<&str>, termbase_lang: Option<&str>, requested: Option<&str>) -> bool {
    let Some(requested) = requested else {
        return true;
    };
    match term_lang {
        Some(lang) => lang == requested,
        None => match termbase_lang {
            Some(lang) => lang == requested,
            None => true,
        },
    }
}

fn project_matches(term_project: Option<&str>, requested: Option<&str>) -> bool {
    match (term_project, requested) {
        (None, _) => true,
        (Some(p), Some(req)) => p == req,
        (Some(_), None) => false,
    }
}

/// Collect termbases currently active for `project_id`, excluding project
/// termbases, ordered by `activated_date ASC`; assign ranking 1..K; clear
/// ranking of every other termbase belonging to the project.
fn reassign_rankings_for_project(tx: &rusqlite::Transaction, project_id: &str) -> Result<()> {
    tx.execute(
        "UPDATE termbases SET ranking = NULL
         WHERE (project_id = ?1 OR project_id IS NULL) AND is_project_termbase = 0",
        params![project_id],
    )?;

    let mut stmt = tx.prepare(
        "SELECT tb.id FROM termbase_project_activations a
         JOIN termbases tb ON tb.id = a.termbase_id
         WHERE a.project_id = ?1 AND a.is_active = 1 AND tb.is_project_termbase = 0
         ORDER BY a.activated_date ASC",
    )?;
    let active_ids: Vec<i64> = stmt
        .query_map(params![project_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    drop(stmt);

    for (idx, termbase_id) in active_ids.into_iter().enumerate() {
        tx.execute(
            "UPDATE termbases SET ranking = ?1 WHERE id = ?2",
            params![(idx + 1) as i64, termbase_id],
        )?;
    }
    Ok(())
}

fn row_to_termbase(row: &rusqlite::Row) -> rusqlite::Result<Termbase> {
    Ok(Termbase {
        id: row.get(0)?,
        name: row.get(1)?,
        source_lang: row.get(2)?,
        target_lang: row.get(3)?,
        project_id: row.get(4)?,
        description: row.get(5)?,
        is_global: row.get::<_, i64>(6)? != 0,
        priority: row.get(7)?,
        is_project_termbase: row.get::<_, i64>(8)? != 0,
        ranking: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_ranking_follows_order_then_clears_on_deactivate() {
        let store = TermbaseStore::open_in_memory().unwrap();
        let a = store.create_termbase("A", None, None, None, "", true, false).unwrap();
        let b = store.create_termbase("B", None, None, None, "", true, false).unwrap();
        let c = store.create_termbase("C", None, None, None, "", true, false).unwrap();

        store.activate(a, "P1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.activate(b, "P1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.activate(c, "P1").unwrap();

        let list = store.list_termbases().unwrap();
        let ranking_of = |id: i64| list.iter().find(|s| s.termbase.id == id).unwrap().termbase.ranking;
        assert_eq!(ranking_of(a), Some(1));
        assert_eq!(ranking_of(b), Some(2));
        assert_eq!(ranking_of(c), Some(3));

        store.deactivate(b, "P1").unwrap();
        let list = store.list_termbases().unwrap();
        let ranking_of = |id: i64| list.iter().find(|s| s.termbase.id == id).unwrap().termbase.ranking;
        assert_eq!(ranking_of(a), Some(1));
        assert_eq!(ranking_of(c), Some(2));
        assert_eq!(ranking_of(b), None);
    }

    #[test]
    fn project_termbase_uniqueness_is_enforced() {
        let store = TermbaseStore::open_in_memory().unwrap();
        store
            .create_termbase("Proj TB", None, None, Some("P1"), "", false, true)
            .unwrap();
        let result = store.create_termbase("Proj TB 2", None, None, Some("P1"), "", false, true);
        assert!(result.is_err());
    }

    #[test]
    fn search_matches_whole_word_occurrences() {
        let store = TermbaseStore::open_in_memory().unwrap();
        let tb = store.create_termbase("TB", Some("en"), Some("fr"), None, "", true, false).unwrap();
        store
            .add_term(tb, "API key", "clé API", 10, None, "", None, None, false, None, None, None)
            .unwrap();

        let hits = store.search_terms("API key", Some("en"), Some("fr"), None, None).unwrap();
        assert_eq!(hits.len(), 1);

        let hits = store.search_terms("unrelated", Some("en"), Some("fr"), None, None).unwrap();
        assert!(hits.is_empty());
    }
}
