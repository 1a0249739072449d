//! TMX 1.4 read/write, plus an optional database-backed mode for large
//! files that should not be held fully in memory.
//!
//! Grounded on `TMXGenerator.generate_tmx` in
//! `Supervertaler_v2.5.0.py` for the write format, and on
//! `original_source/modules/database_manager.py`'s `tmx_files` /
//! `tmx_translation_units` / `tmx_segments` tables for the DB-backed mode.

use std::io::{BufReader, Read, Write};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use rusqlite::{params, Connection};

use crate::error::{Result, TmError};

/// Error/missing-line placeholder prefixes the orchestrator emits (see
/// `supervertaler_core::llm::orchestrator::is_placeholder`); pairs whose
/// target starts with one of these are skipped on write.
const ERROR_MARKERS: [&str; 3] = ["[TL Err", "[TL Missing", "[Err:"];

#[derive(Debug, Clone, PartialEq)]
pub struct TmxPair {
    pub source: String,
    pub target: String,
}

/// Read TMX 1.4, extracting `(source, target)` pairs whose `tuv[@xml:lang]`
/// prefix-matches the requested codes (`en-US` matches `en`). Tus lacking
/// either side are ignored.
pub fn read_tmx(xml: &str, source_lang: &str, target_lang: &str) -> Result<Vec<TmxPair>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut pairs = Vec::new();
    let mut buf = Vec::new();

    let mut in_tu = false;
    let mut current_lang: Option<String> = None;
    let mut current_text = String::new();
    let mut tuv_texts: Vec<(String, String)> = Vec::new();
    let mut in_seg = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| TmError::Xml(e.to_string()))? {
            Event::Start(e) if e.name().as_ref() == b"tu" => {
                in_tu = true;
                tuv_texts.clear();
            }
            Event::End(e) if e.name().as_ref() == b"tu" => {
                in_tu = false;
                if let (Some(src), Some(tgt)) =
                    (find_lang_match(&tuv_texts, source_lang), find_lang_match(&tuv_texts, target_lang))
                {
                    if !src.is_empty() && !tgt.is_empty() {
                        pairs.push(TmxPair { source: src, target: tgt });
                    }
                }
            }
            Event::Start(e) if in_tu && e.name().as_ref() == b"tuv" => {
                current_lang = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"xml:lang" || a.key.as_ref() == b"lang")
                    .map(|a| String::from_utf8_lossy(&a.value).to_string());
            }
            Event::Start(e) if in_tu && e.name().as_ref() == b"seg" => {
                in_seg = true;
                current_text.clear();
            }
            Event::End(e) if e.name().as_ref() == b"seg" => {
                in_seg = false;
                if let Some(lang) = current_lang.clone() {
                    tuv_texts.push((lang, current_text.clone()));
                }
            }
            Event::Text(e) if in_seg => {
                current_text.push_str(&e.unescape().map_err(|err| TmError::Xml(err.to_string()))?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(pairs)
}

fn find_lang_match(tuv_texts: &[(String, String)], requested: &str) -> Option<String> {
    let requested_prefix = requested.split('-').next().unwrap_or(requested).to_lowercase();
    tuv_texts
        .iter()
        .find(|(lang, _)| {
            lang.split('-').next().unwrap_or(lang).to_lowercase() == requested_prefix
        })
        .map(|(_, text)| text.clone())
}

/// Write TMX 1.4 with a Supervertaler header. Pairs with empty source, or
/// with an empty or error-marker target, are skipped.
pub fn write_tmx(pairs: &[TmxPair], source_lang: &str, target_lang: &str) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| TmError::Xml(e.to_string()))?;

    let mut tmx_start = BytesStart::new("tmx");
    tmx_start.push_attribute(("version", "1.4"));
    writer.write_event(Event::Start(tmx_start)).map_err(|e| TmError::Xml(e.to_string()))?;

    let mut header = BytesStart::new("header");
    let creation_date = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    header.push_attribute(("creationtool", "Supervertaler"));
    header.push_attribute(("creationtoolversion", env!("CARGO_PKG_VERSION")));
    header.push_attribute(("segtype", "sentence"));
    header.push_attribute(("o-tmf", "Supervertaler"));
    header.push_attribute(("adminlang", "en"));
    header.push_attribute(("srclang", source_lang));
    header.push_attribute(("datatype", "plaintext"));
    header.push_attribute(("creationdate", creation_date.as_str()));
    writer.write_event(Event::Empty(header)).map_err(|e| TmError::Xml(e.to_string()))?;

    writer
        .write_event(Event::Start(BytesStart::new("body")))
        .map_err(|e| TmError::Xml(e.to_string()))?;

    for pair in pairs {
        if pair.source.is_empty() {
            continue;
        }
        if pair.target.is_empty() || ERROR_MARKERS.iter().any(|m| pair.target.starts_with(m)) {
            continue;
        }
        write_tu(&mut writer, &pair.source, &pair.target, source_lang, target_lang)?;
    }

    writer.write_event(Event::End(BytesEnd::new("body"))).map_err(|e| TmError::Xml(e.to_string()))?;
    writer.write_event(Event::End(BytesEnd::new("tmx"))).map_err(|e| TmError::Xml(e.to_string()))?;

    String::from_utf8(writer.into_inner()).map_err(|e| TmError::Xml(e.to_string()))
}

fn write_tu<W: Write>(
    writer: &mut Writer<W>,
    source: &str,
    target: &str,
    source_lang: &str,
    target_lang: &str,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("tu"))).map_err(|e| TmError::Xml(e.to_string()))?;
    write_tuv(writer, source_lang, source)?;
    write_tuv(writer, target_lang, target)?;
    writer.write_event(Event::End(BytesEnd::new("tu"))).map_err(|e| TmError::Xml(e.to_string()))?;
    Ok(())
}

fn write_tuv<W: Write>(writer: &mut Writer<W>, lang: &str, text: &str) -> Result<()> {
    let mut tuv = BytesStart::new("tuv");
    tuv.push_attribute(("xml:lang", lang));
    writer.write_event(Event::Start(tuv)).map_err(|e| TmError::Xml(e.to_string()))?;
    writer.write_event(Event::Start(BytesStart::new("seg"))).map_err(|e| TmError::Xml(e.to_string()))?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(|e| TmError::Xml(e.to_string()))?;
    writer.write_event(Event::End(BytesEnd::new("seg"))).map_err(|e| TmError::Xml(e.to_string()))?;
    writer.write_event(Event::End(BytesEnd::new("tuv"))).map_err(|e| TmError::Xml(e.to_string()))?;
    Ok(())
}

pub fn read_tmx_file(path: impl AsRef<std::path::Path>, source_lang: &str, target_lang: &str) -> Result<Vec<TmxPair>> {
    let mut file = BufReader::new(std::fs::File::open(path)?);
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    read_tmx(&contents, source_lang, target_lang)
}

const DB_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tmx_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name TEXT NOT NULL,
    source_lang TEXT NOT NULL,
    target_lang TEXT NOT NULL,
    imported_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tmx_translation_units (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tmx_file_id INTEGER NOT NULL REFERENCES tmx_files(id)
);

CREATE TABLE IF NOT EXISTS tmx_segments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tu_id INTEGER NOT NULL REFERENCES tmx_translation_units(id),
    lang TEXT NOT NULL,
    text TEXT NOT NULL,
    change_date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tmx_segments_tu ON tmx_segments(tu_id);
CREATE INDEX IF NOT EXISTS idx_tmx_segments_text ON tmx_segments(text);
"#;

/// Database-backed store for TMX files too large to hold entirely in
/// memory: supports paginated listing and substring filtering without
/// materialising the whole file.
#[derive(Clone)]
pub struct TmxDbStore {
    conn: Arc<Mutex<Connection>>,
}

impl TmxDbStore {
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| TmError::StorageUnavailable(e.to_string()))?;
        conn.execute_batch(DB_SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn import_pairs(&self, file_name: &str, pairs: &[TmxPair], source_lang: &str, target_lang: &str) -> Result<i64> {
        let mut conn = self.conn.lock().expect("tmx connection poisoned");
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO tmx_files (file_name, source_lang, target_lang, imported_date) VALUES (?1, ?2, ?3, ?4)",
            params![file_name, source_lang, target_lang, now],
        )?;
        let file_id = tx.last_insert_rowid();

        for pair in pairs {
            tx.execute(
                "INSERT INTO tmx_translation_units (tmx_file_id) VALUES (?1)",
                params![file_id],
            )?;
            let tu_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO tmx_segments (tu_id, lang, text, change_date) VALUES (?1, ?2, ?3, ?4)",
                params![tu_id, source_lang, pair.source, now],
            )?;
            tx.execute(
                "INSERT INTO tmx_segments (tu_id, lang, text, change_date) VALUES (?1, ?2, ?3, ?4)",
                params![tu_id, target_lang, pair.target, now],
            )?;
        }
        tx.commit()?;
        Ok(file_id)
    }

    /// Paginated listing of `(source_text, target_text)` for one file,
    /// optionally filtered by a substring of either side.
    pub fn list_pairs(
        &self,
        file_id: i64,
        source_lang: &str,
        target_lang: &str,
        filter: Option<&str>,
        case_insensitive: bool,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TmxPair>> {
        let conn = self.conn.lock().expect("tmx connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT ssrc.text, stgt.text
             FROM tmx_translation_units tu
             JOIN tmx_segments ssrc ON ssrc.tu_id = tu.id AND ssrc.lang = ?2
             JOIN tmx_segments stgt ON stgt.tu_id = tu.id AND stgt.lang = ?3
             WHERE tu.tmx_file_id = ?1
             ORDER BY tu.id ASC
             LIMIT ?4 OFFSET ?5",
        )?;
        let rows = stmt
            .query_map(params![file_id, source_lang, target_lang, limit, offset], |row| {
                Ok(TmxPair {
                    source: row.get(0)?,
                    target: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let Some(needle) = filter else {
            return Ok(rows);
        };
        let needle_cmp = if case_insensitive { needle.to_lowercase() } else { needle.to_string() };
        Ok(rows
            .into_iter()
            .filter(|p| {
                let (s, t) = if case_insensitive {
                    (p.source.to_lowercase(), p.target.to_lowercase())
                } else {
                    (p.source.clone(), p.target.clone())
                };
                s.contains(&needle_cmp) || t.contains(&needle_cmp)
            })
            .collect())
    }

    /// Update one segment's text, refreshing its `change_date`.
    pub fn update_segment(&self, tu_id: i64, lang: &str, text: &str) -> Result<()> {
        let conn = self.conn.lock().expect("tmx connection poisoned");
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tmx_segments SET text = ?1, change_date = ?2 WHERE tu_id = ?3 AND lang = ?4",
            params![text, now, tu_id, lang],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmx_round_trips_pairs() {
        let pairs = vec![
            TmxPair { source: "Hello".into(), target: "Bonjour".into() },
            TmxPair { source: "World".into(), target: "Monde".into() },
        ];
        let xml = write_tmx(&pairs, "en", "fr").unwrap();
        let read_back = read_tmx(&xml, "en", "fr").unwrap();
        assert_eq!(read_back.len(), 2);
        assert!(read_back.contains(&pairs[0]));
        assert!(read_back.contains(&pairs[1]));
    }

    #[test]
    fn write_skips_error_marker_targets() {
        let pairs = vec![
            TmxPair { source: "Hello".into(), target: "[ERR: timeout]".into() },
            TmxPair { source: "World".into(), target: "Monde".into() },
        ];
        let xml = write_tmx(&pairs, "en", "fr").unwrap();
        let read_back = read_tmx(&xml, "en", "fr").unwrap();
        assert_eq!(read_back.len(), 1);
        assert_eq!(read_back[0].source, "World");
    }

    #[test]
    fn read_matches_language_prefix() {
        let xml = write_tmx(
            &[TmxPair { source: "Hi".into(), target: "Salut".into() }],
            "en-US",
            "fr-FR",
        )
        .unwrap();
        let read_back = read_tmx(&xml, "en", "fr").unwrap();
        assert_eq!(read_back.len(), 1);
    }

    #[test]
    fn db_backed_mode_supports_pagination_and_filtering() {
        let store = TmxDbStore::open_in_memory().unwrap();
        let pairs = vec![
            TmxPair { source: "apple".into(), target: "pomme".into() },
            TmxPair { source: "banana".into(), target: "banane".into() },
        ];
        let file_id = store.import_pairs("big.tmx", &pairs, "en", "fr").unwrap();

        let all = store.list_pairs(file_id, "en", "fr", None, false, 0, 10).unwrap();
        assert_eq!(all.len(), 2);

        let filtered = store.list_pairs(file_id, "en", "fr", Some("APPLE"), true, 0, 10).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].source, "apple");
    }
}
