//! SQLite persistence for documents, chunks, and the audit log.
//!
//! One database holds three tables:
//!
//! - `document` - ingested files with descriptive metadata and a content
//!   hash used to skip unchanged re-ingests
//! - `chunk` - semantic chunks with their embedding vectors (little-endian
//!   f32 BLOBs)
//! - `audit` - one row per answered query, feeding [`crate::reports`]
//!
//! The database file and its directory are created with owner-only
//! permissions on Unix; queries and responses land here verbatim.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use sha2::{Digest, Sha256};

use sage_types::{Chunk, DocumentId, DocumentMeta, Language};

/// A stored chunk with its embedding, as loaded for retrieval.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub chunk_id: i64,
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// One answered query, as recorded in the audit log.
#[derive(Debug, Clone)]
pub struct AuditRecord<'a> {
    pub user_label: &'a str,
    pub query: &'a str,
    pub response: &'a str,
    pub document_ids: &'a [DocumentId],
    pub detected_language: &'a Language,
    pub context_count: usize,
}

/// One audit row as read back for reporting.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_label: String,
    pub query: String,
    pub response: String,
    pub detected_language: String,
    pub context_count: i64,
    pub event_time: String,
}

/// Handle to the Sage database.
pub struct Store {
    db: Connection,
}

impl Store {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS document (
            document_id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            authors TEXT NOT NULL DEFAULT '',
            term TEXT NOT NULL DEFAULT '',
            source_path TEXT NOT NULL,
            content_hash TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS chunk (
            chunk_id INTEGER PRIMARY KEY,
            document_id INTEGER NOT NULL,
            ordinal INTEGER NOT NULL,
            page_hint INTEGER,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (document_id) REFERENCES document(document_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS audit (
            audit_id INTEGER PRIMARY KEY,
            user_label TEXT NOT NULL,
            query TEXT NOT NULL,
            response TEXT NOT NULL,
            document_ids TEXT NOT NULL,
            detected_language TEXT NOT NULL,
            context_count INTEGER NOT NULL,
            event_time TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunk_document
        ON chunk(document_id);

        CREATE INDEX IF NOT EXISTS idx_audit_event_time
        ON audit(event_time);

        CREATE INDEX IF NOT EXISTS idx_audit_user
        ON audit(user_label);
    ";

    /// Open or create the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        prepare_db_path(path)?;

        let db = Connection::open(path)
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        Self::initialize(db)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory store")?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;",
        )
        .context("Failed to set store pragmas")?;
        db.execute_batch(Self::SCHEMA)
            .context("Failed to create store schema")?;
        Ok(Self { db })
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.db
    }

    /// Hex SHA-256 of raw file contents, as stored in `content_hash`.
    #[must_use]
    pub fn content_hash(contents: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(contents.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Look up a document by content hash.
    pub fn find_document_by_hash(&self, content_hash: &str) -> Result<Option<DocumentId>> {
        let mut stmt = self
            .db
            .prepare("SELECT document_id FROM document WHERE content_hash = ?1")
            .context("Failed to prepare hash lookup")?;

        let id = stmt
            .query_row(params![content_hash], |row| row.get::<_, i64>(0))
            .map(DocumentId);

        match id {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).context("Failed to query document by hash"),
        }
    }

    /// Insert a document and its chunks in one transaction.
    ///
    /// `chunks` pairs chunk text with an optional page hint; `embeddings`
    /// must be parallel to `chunks`.
    pub fn insert_document(
        &mut self,
        meta: &DocumentMeta,
        chunks: &[(String, Option<u32>)],
        embeddings: &[Vec<f32>],
    ) -> Result<DocumentId> {
        anyhow::ensure!(
            chunks.len() == embeddings.len(),
            "got {} chunks but {} embeddings",
            chunks.len(),
            embeddings.len()
        );

        let tx = self
            .db
            .transaction()
            .context("Failed to start ingest transaction")?;

        tx.execute(
            "INSERT INTO document (title, authors, term, source_path, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &meta.title,
                &meta.authors,
                &meta.term,
                &meta.source_path,
                &meta.content_hash,
            ],
        )
        .context("Failed to insert document")?;

        let document_id = tx.last_insert_rowid();

        for (ordinal, ((text, page_hint), embedding)) in
            chunks.iter().zip(embeddings.iter()).enumerate()
        {
            tx.execute(
                "INSERT INTO chunk (document_id, ordinal, page_hint, text, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    document_id,
                    ordinal as i64,
                    page_hint,
                    text,
                    embedding_to_blob(embedding),
                ],
            )
            .with_context(|| format!("Failed to insert chunk {ordinal}"))?;
        }

        tx.commit().context("Failed to commit ingest transaction")?;

        tracing::info!(
            document_id,
            chunks = chunks.len(),
            title = %meta.title,
            "ingested document"
        );

        Ok(DocumentId(document_id))
    }

    /// Load every chunk with its embedding, ordered by document and ordinal.
    pub fn chunk_records(&self) -> Result<Vec<ChunkRecord>> {
        let mut stmt = self
            .db
            .prepare(
                "SELECT chunk_id, document_id, ordinal, page_hint, text, embedding
                 FROM chunk
                 ORDER BY document_id ASC, ordinal ASC",
            )
            .context("Failed to prepare chunk query")?;

        let rows = stmt
            .query_map([], |row| {
                let chunk_id: i64 = row.get(0)?;
                let document_id: i64 = row.get(1)?;
                let ordinal: i64 = row.get(2)?;
                let page_hint: Option<i64> = row.get(3)?;
                let text: String = row.get(4)?;
                let blob: Vec<u8> = row.get(5)?;
                Ok((chunk_id, document_id, ordinal, page_hint, text, blob))
            })
            .context("Failed to query chunks")?;

        let mut records = Vec::new();
        for row in rows {
            let (chunk_id, document_id, ordinal, page_hint, text, blob) =
                row.context("Failed to read chunk row")?;
            records.push(ChunkRecord {
                chunk_id,
                chunk: Chunk {
                    document_id: DocumentId(document_id),
                    ordinal: ordinal as u32,
                    page_hint: page_hint.map(|p| p as u32),
                    text,
                },
                embedding: blob_to_embedding(&blob)?,
            });
        }

        Ok(records)
    }

    /// Metadata for the given documents, keyed by id. Unknown ids are absent.
    pub fn document_meta(
        &self,
        ids: &[DocumentId],
    ) -> Result<HashMap<DocumentId, DocumentMeta>> {
        let mut stmt = self
            .db
            .prepare(
                "SELECT title, authors, term, source_path, content_hash
                 FROM document WHERE document_id = ?1",
            )
            .context("Failed to prepare metadata query")?;

        let mut out = HashMap::new();
        for id in ids {
            let meta = stmt.query_row(params![id.0], |row| {
                Ok(DocumentMeta {
                    title: row.get(0)?,
                    authors: row.get(1)?,
                    term: row.get(2)?,
                    source_path: row.get(3)?,
                    content_hash: row.get(4)?,
                })
            });
            match meta {
                Ok(meta) => {
                    out.insert(*id, meta);
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {}
                Err(e) => return Err(e).context("Failed to query document metadata"),
            }
        }

        Ok(out)
    }

    /// Record one answered query.
    pub fn log_audit(&mut self, record: &AuditRecord<'_>) -> Result<i64> {
        let document_ids = serde_json::to_string(record.document_ids)
            .context("Failed to serialize cited document ids")?;

        self.db
            .execute(
                "INSERT INTO audit
                 (user_label, query, response, document_ids, detected_language,
                  context_count, event_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.user_label,
                    record.query,
                    record.response,
                    document_ids,
                    record.detected_language.code(),
                    record.context_count as i64,
                    now_utc(),
                ],
            )
            .context("Failed to insert audit row")?;

        Ok(self.db.last_insert_rowid())
    }

    /// The most recent audit rows, newest first.
    pub fn recent_audits(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        let mut stmt = self
            .db
            .prepare(
                "SELECT user_label, query, response, detected_language,
                        context_count, event_time
                 FROM audit
                 ORDER BY audit_id DESC
                 LIMIT ?1",
            )
            .context("Failed to prepare recent audit query")?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(AuditEntry {
                    user_label: row.get(0)?,
                    query: row.get(1)?,
                    response: row.get(2)?,
                    detected_language: row.get(3)?,
                    context_count: row.get(4)?,
                    event_time: row.get(5)?,
                })
            })
            .context("Failed to query recent audits")?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.context("Failed to read audit row")?);
        }
        Ok(entries)
    }

    /// Total stored chunks (used by reports and tests).
    pub fn chunk_count(&self) -> Result<i64> {
        self.db
            .query_row("SELECT COUNT(*) FROM chunk", [], |row| row.get(0))
            .context("Failed to count chunks")
    }

    /// Total stored documents.
    pub fn document_count(&self) -> Result<i64> {
        self.db
            .query_row("SELECT COUNT(*) FROM document", [], |row| row.get(0))
            .context("Failed to count documents")
    }
}

/// UTC timestamp in `YYYY-MM-DD HH:MM:SS`, the format SQLite's datetime
/// functions compare against lexicographically.
fn now_utc() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    anyhow::ensure!(
        blob.len() % 4 == 0,
        "embedding blob length {} is not a multiple of 4",
        blob.len()
    );
    Ok(blob
        .chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect())
}

/// Create the database's parent directory and file with owner-only
/// permissions (0o700 / 0o600 on Unix). No-ops where already satisfied.
fn prepare_db_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::{MetadataExt, PermissionsExt};

            let metadata = std::fs::metadata(parent).with_context(|| {
                format!("Failed to read directory metadata: {}", parent.display())
            })?;

            let our_uid = unsafe { libc::getuid() };
            if metadata.uid() == our_uid && metadata.permissions().mode() & 0o077 != 0 {
                std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))
                    .with_context(|| {
                        format!("Failed to set directory permissions: {}", parent.display())
                    })?;
            }
        }
    }

    if !path.exists() {
        let mut options = OpenOptions::new();
        options.create(true).truncate(false).read(true).write(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let _file = options
            .open(path)
            .with_context(|| format!("Failed to create database file: {}", path.display()))?;
    }

    Ok(())
}
