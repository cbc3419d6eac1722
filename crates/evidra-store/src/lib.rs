//! Evidra Storage Layer
//!
//! Implements the ClaimStore trait using SQLite.
//!
//! # Architecture
//!
//! - SQLite for claims, queue, relationships, hierarchy, and audit log
//! - Embeddings stored inline as little-endian f32 blobs; the vector
//!   index (evidra-search) is rebuilt from here on startup
//! - Lifecycle bookkeeping (versioning, embedding status pairing) is
//!   enforced here so callers cannot produce inconsistent rows
//!
//! # Examples
//!
//! ```no_run
//! use evidra_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for claim operations
//! ```

#![warn(missing_docs)]

use evidra_domain::traits::{
    AgentRunRecord, ClaimContentUpdate, ClaimFilter, ClaimStore, EmbeddingCounts, QueueCounts,
};
use evidra_domain::{
    Category, Claim, ClaimId, ClaimStatus, ClaimVersion, ConsensusLabel, EmbeddingStatus,
    EvidenceHierarchy, EvidenceLevel, KnowledgeRelationship, QueueId, QueueStatus,
    RelationshipType, ResearchQueueItem, SourceKind, StudyDesign, ValidationAction,
    ValidationLogEntry,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Claim or queue item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Column list shared by every claim SELECT, kept in one place so row
/// mapping stays in sync with the queries.
const CLAIM_COLUMNS: &str = "id, text, summary, category, evidence_level, confidence, \
     sample_size, study_design, source_title, source_doi, source_journal, source_url, \
     status, conflicting, validation_score, reviewed_by, embedding, embedding_status, \
     embedding_error, embedding_updated_at, version, created_at, updated_at";

const QUEUE_COLUMNS: &str = "id, title, authors, abstract_text, doi, url, journal, \
     published_at, source, priority, status, attempts, last_error, created_at, updated_at";

/// SQLite-based implementation of ClaimStore
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Share a single store behind
/// a mutex, or give each thread its own instance pointed at the same file.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    /// Convert a 128-bit identifier to bytes for storage
    fn id_to_bytes(value: u128) -> Vec<u8> {
        value.to_be_bytes().to_vec()
    }

    /// Convert bytes back to a 128-bit identifier
    fn bytes_to_id(bytes: &[u8]) -> Result<u128, StoreError> {
        if bytes.len() != 16 {
            return Err(StoreError::InvalidData(format!(
                "Expected 16 bytes for identifier, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 16];
        arr.copy_from_slice(bytes);
        Ok(u128::from_be_bytes(arr))
    }

    /// Encode an embedding as a little-endian f32 blob
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(embedding.len() * 4);
        for value in embedding {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Decode a little-endian f32 blob back into an embedding
    fn bytes_to_embedding(bytes: &[u8]) -> Result<Vec<f32>, StoreError> {
        if bytes.len() % 4 != 0 {
            return Err(StoreError::InvalidData(format!(
                "Embedding blob length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let mut embedding = Vec::with_capacity(bytes.len() / 4);
        for chunk in bytes.chunks_exact(4) {
            let mut arr = [0u8; 4];
            arr.copy_from_slice(chunk);
            embedding.push(f32::from_le_bytes(arr));
        }
        Ok(embedding)
    }

    fn conversion_failure(idx: usize, e: StoreError) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    }

    /// Map a full claim row (CLAIM_COLUMNS order) into a Claim
    fn claim_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Claim> {
        let id_bytes: Vec<u8> = row.get(0)?;
        let id = Self::bytes_to_id(&id_bytes)
            .map(ClaimId::from_value)
            .map_err(|e| Self::conversion_failure(0, e))?;

        let category: String = row.get(3)?;
        let category = Category::from_str_strict(&category)
            .map_err(|e| Self::conversion_failure(3, StoreError::InvalidData(e)))?;

        let evidence_level: i64 = row.get(4)?;
        let evidence_level = EvidenceLevel::from_rank(evidence_level as u8).ok_or_else(|| {
            Self::conversion_failure(
                4,
                StoreError::InvalidData(format!("Bad evidence level: {}", evidence_level)),
            )
        })?;

        let study_design: Option<String> = row.get(7)?;
        let study_design = study_design
            .map(|s| {
                StudyDesign::from_str_strict(&s)
                    .map_err(|e| Self::conversion_failure(7, StoreError::InvalidData(e)))
            })
            .transpose()?;

        let status: String = row.get(12)?;
        let status = ClaimStatus::from_str_strict(&status)
            .map_err(|e| Self::conversion_failure(12, StoreError::InvalidData(e)))?;

        let embedding: Option<Vec<u8>> = row.get(16)?;
        let embedding = embedding
            .map(|b| {
                Self::bytes_to_embedding(&b).map_err(|e| Self::conversion_failure(16, e))
            })
            .transpose()?;

        let embedding_status: String = row.get(17)?;
        let embedding_status = EmbeddingStatus::from_str_strict(&embedding_status)
            .map_err(|e| Self::conversion_failure(17, StoreError::InvalidData(e)))?;

        Ok(Claim {
            id,
            text: row.get(1)?,
            summary: row.get(2)?,
            category,
            evidence_level,
            confidence: row.get(5)?,
            sample_size: row.get::<_, Option<i64>>(6)?.map(|n| n as u32),
            study_design,
            source_title: row.get(8)?,
            source_doi: row.get(9)?,
            source_journal: row.get(10)?,
            source_url: row.get(11)?,
            status,
            conflicting: row.get::<_, i64>(13)? != 0,
            validation_score: row.get(14)?,
            reviewed_by: row.get(15)?,
            embedding,
            embedding_status,
            embedding_error: row.get(18)?,
            embedding_updated_at: row.get::<_, Option<i64>>(19)?.map(|t| t as u64),
            version: row.get::<_, i64>(20)? as u32,
            created_at: row.get::<_, i64>(21)? as u64,
            updated_at: row.get::<_, i64>(22)? as u64,
        })
    }

    /// Map a full queue row (QUEUE_COLUMNS order) into a ResearchQueueItem
    fn queue_item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResearchQueueItem> {
        let id_bytes: Vec<u8> = row.get(0)?;
        let id = Self::bytes_to_id(&id_bytes)
            .map(QueueId::from_value)
            .map_err(|e| Self::conversion_failure(0, e))?;

        let authors_json: String = row.get(2)?;
        let authors: Vec<String> = serde_json::from_str(&authors_json).map_err(|e| {
            Self::conversion_failure(2, StoreError::InvalidData(format!("Bad authors JSON: {}", e)))
        })?;

        let source: String = row.get(8)?;
        let source = SourceKind::from_str_strict(&source)
            .map_err(|e| Self::conversion_failure(8, StoreError::InvalidData(e)))?;

        let status: String = row.get(10)?;
        let status = QueueStatus::from_str_strict(&status)
            .map_err(|e| Self::conversion_failure(10, StoreError::InvalidData(e)))?;

        Ok(ResearchQueueItem {
            id,
            title: row.get(1)?,
            authors,
            abstract_text: row.get(3)?,
            doi: row.get(4)?,
            url: row.get(5)?,
            journal: row.get(6)?,
            published_at: row.get::<_, Option<i64>>(7)?.map(|t| t as u64),
            source,
            priority: row.get::<_, i64>(9)? as u8,
            status,
            attempts: row.get::<_, i64>(11)? as u32,
            last_error: row.get(12)?,
            created_at: row.get::<_, i64>(13)? as u64,
            updated_at: row.get::<_, i64>(14)? as u64,
        })
    }

    fn relationship_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeRelationship> {
        let source_bytes: Vec<u8> = row.get(0)?;
        let target_bytes: Vec<u8> = row.get(1)?;
        let type_str: String = row.get(2)?;

        let source = Self::bytes_to_id(&source_bytes)
            .map(ClaimId::from_value)
            .map_err(|e| Self::conversion_failure(0, e))?;
        let target = Self::bytes_to_id(&target_bytes)
            .map(ClaimId::from_value)
            .map_err(|e| Self::conversion_failure(1, e))?;
        let relationship_type = RelationshipType::from_str_strict(&type_str)
            .map_err(|e| Self::conversion_failure(2, StoreError::InvalidData(e)))?;

        Ok(KnowledgeRelationship {
            source,
            target,
            relationship_type,
            strength: row.get(3)?,
            created_at: row.get::<_, i64>(4)? as u64,
        })
    }
}

impl ClaimStore for SqliteStore {
    type Error = StoreError;

    fn insert_claim(&mut self, claim: Claim) -> Result<ClaimId, Self::Error> {
        if !claim.embedding_consistent() {
            return Err(StoreError::InvalidData(
                "Embedding presence does not match embedding status".to_string(),
            ));
        }

        let id_bytes = Self::id_to_bytes(claim.id.value());
        let embedding_bytes = claim.embedding.as_ref().map(|e| Self::embedding_to_bytes(e));

        self.conn.execute(
            &format!(
                "INSERT INTO claims ({}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                  ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
                CLAIM_COLUMNS
            ),
            params![
                &id_bytes,
                &claim.text,
                &claim.summary,
                claim.category.as_str(),
                claim.evidence_level.rank() as i64,
                claim.confidence,
                claim.sample_size.map(|n| n as i64),
                claim.study_design.map(|d| d.as_str()),
                &claim.source_title,
                &claim.source_doi,
                &claim.source_journal,
                &claim.source_url,
                claim.status.as_str(),
                claim.conflicting as i64,
                claim.validation_score,
                &claim.reviewed_by,
                embedding_bytes,
                claim.embedding_status.as_str(),
                &claim.embedding_error,
                claim.embedding_updated_at.map(|t| t as i64),
                claim.version as i64,
                claim.created_at as i64,
                claim.updated_at as i64,
            ],
        )?;

        Ok(claim.id)
    }

    fn get_claim(&self, id: ClaimId) -> Result<Option<Claim>, Self::Error> {
        let id_bytes = Self::id_to_bytes(id.value());
        let claim = self
            .conn
            .query_row(
                &format!("SELECT {} FROM claims WHERE id = ?1", CLAIM_COLUMNS),
                params![&id_bytes],
                Self::claim_from_row,
            )
            .optional()?;
        Ok(claim)
    }

    fn query_claims(&self, filter: &ClaimFilter) -> Result<Vec<Claim>, Self::Error> {
        let mut sql = format!("SELECT {} FROM claims WHERE 1=1", CLAIM_COLUMNS);
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(category) = filter.category {
            sql.push_str(" AND category = ?");
            params.push(Box::new(category.as_str()));
        }

        if let Some(min_evidence) = filter.min_evidence {
            sql.push_str(" AND evidence_level >= ?");
            params.push(Box::new(min_evidence.rank() as i64));
        }

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            params.push(Box::new(status.as_str()));
        }

        if filter.embedded_only {
            sql.push_str(" AND embedding_status = 'completed'");
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let claims = stmt
            .query_map(&param_refs[..], Self::claim_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(claims)
    }

    fn update_claim_content(
        &mut self,
        id: ClaimId,
        update: &ClaimContentUpdate,
        now: u64,
    ) -> Result<(), Self::Error> {
        if update.is_empty() {
            return Ok(());
        }

        let current = self
            .get_claim(id)?
            .ok_or_else(|| StoreError::NotFound(format!("claim {}", id)))?;

        let id_bytes = Self::id_to_bytes(id.value());
        let tx = self.conn.transaction()?;

        // Snapshot the outgoing state before touching the row
        tx.execute(
            "INSERT INTO claim_versions (claim_id, version, text, summary, confidence, status, snapshot_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &id_bytes,
                current.version as i64,
                &current.text,
                &current.summary,
                current.confidence,
                current.status.as_str(),
                now as i64,
            ],
        )?;

        let text = update.text.as_deref().unwrap_or(&current.text);
        let summary = update.summary.as_deref().unwrap_or(&current.summary);
        let confidence = update
            .confidence
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(current.confidence);

        tx.execute(
            "UPDATE claims SET text = ?2, summary = ?3, confidence = ?4,
                    version = version + 1, updated_at = ?5
             WHERE id = ?1",
            params![&id_bytes, text, summary, confidence, now as i64],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn set_claim_status(
        &mut self,
        id: ClaimId,
        status: ClaimStatus,
        score: Option<f64>,
        reviewed_by: Option<&str>,
        now: u64,
    ) -> Result<(), Self::Error> {
        let id_bytes = Self::id_to_bytes(id.value());
        let changed = self.conn.execute(
            "UPDATE claims SET status = ?2,
                    validation_score = COALESCE(?3, validation_score),
                    reviewed_by = COALESCE(?4, reviewed_by),
                    updated_at = ?5
             WHERE id = ?1",
            params![&id_bytes, status.as_str(), score, reviewed_by, now as i64],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("claim {}", id)));
        }
        Ok(())
    }

    fn set_conflicting(
        &mut self,
        id: ClaimId,
        conflicting: bool,
        now: u64,
    ) -> Result<(), Self::Error> {
        let id_bytes = Self::id_to_bytes(id.value());
        let changed = self.conn.execute(
            "UPDATE claims SET conflicting = ?2, updated_at = ?3 WHERE id = ?1",
            params![&id_bytes, conflicting as i64, now as i64],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("claim {}", id)));
        }
        Ok(())
    }

    fn claim_versions(&self, id: ClaimId) -> Result<Vec<ClaimVersion>, Self::Error> {
        let id_bytes = Self::id_to_bytes(id.value());
        let mut stmt = self.conn.prepare(
            "SELECT claim_id, version, text, summary, confidence, status, snapshot_at
             FROM claim_versions WHERE claim_id = ?1 ORDER BY version ASC",
        )?;

        let versions = stmt
            .query_map(params![&id_bytes], |row| {
                let claim_bytes: Vec<u8> = row.get(0)?;
                let claim_id = Self::bytes_to_id(&claim_bytes)
                    .map(ClaimId::from_value)
                    .map_err(|e| Self::conversion_failure(0, e))?;
                let status: String = row.get(5)?;
                let status = ClaimStatus::from_str_strict(&status)
                    .map_err(|e| Self::conversion_failure(5, StoreError::InvalidData(e)))?;
                Ok(ClaimVersion {
                    claim_id,
                    version: row.get::<_, i64>(1)? as u32,
                    text: row.get(2)?,
                    summary: row.get(3)?,
                    confidence: row.get(4)?,
                    status,
                    snapshot_at: row.get::<_, i64>(6)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    fn claim_pending_embeddings(
        &mut self,
        limit: usize,
        now: u64,
    ) -> Result<Vec<Claim>, Self::Error> {
        // Claim-and-lock in one statement so concurrent callers never
        // receive the same row. Only active claims are embedded; a
        // draft may still be rejected or deprecated by validation.
        let tx = self.conn.transaction()?;
        let ids: Vec<Vec<u8>> = {
            let mut stmt = tx.prepare(
                "UPDATE claims SET embedding_status = 'processing', embedding_updated_at = ?1
                 WHERE id IN (
                     SELECT id FROM claims
                     WHERE embedding_status = 'pending'
                       AND status = 'active'
                     ORDER BY created_at ASC, id ASC
                     LIMIT ?2
                 )
                 RETURNING id",
            )?;
            let rows = stmt.query_map(params![now as i64, limit as i64], |row| {
                row.get::<_, Vec<u8>>(0)
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        tx.commit()?;

        let mut claims = Vec::with_capacity(ids.len());
        for id_bytes in ids {
            let id = ClaimId::from_value(Self::bytes_to_id(&id_bytes)?);
            if let Some(claim) = self.get_claim(id)? {
                claims.push(claim);
            }
        }
        Ok(claims)
    }

    fn complete_embedding(
        &mut self,
        id: ClaimId,
        embedding: &[f32],
        now: u64,
    ) -> Result<(), Self::Error> {
        if embedding.is_empty() {
            return Err(StoreError::InvalidData("Empty embedding".to_string()));
        }
        let id_bytes = Self::id_to_bytes(id.value());
        let embedding_bytes = Self::embedding_to_bytes(embedding);
        let changed = self.conn.execute(
            "UPDATE claims SET embedding = ?2, embedding_status = 'completed',
                    embedding_error = NULL, embedding_updated_at = ?3, updated_at = ?3
             WHERE id = ?1",
            params![&id_bytes, &embedding_bytes, now as i64],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("claim {}", id)));
        }
        Ok(())
    }

    fn fail_embedding(&mut self, id: ClaimId, error: &str, now: u64) -> Result<(), Self::Error> {
        let id_bytes = Self::id_to_bytes(id.value());
        let changed = self.conn.execute(
            "UPDATE claims SET embedding = NULL, embedding_status = 'failed',
                    embedding_error = ?2, embedding_updated_at = ?3, updated_at = ?3
             WHERE id = ?1",
            params![&id_bytes, error, now as i64],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("claim {}", id)));
        }
        Ok(())
    }

    fn reset_stale_embeddings(
        &mut self,
        stale_before: u64,
        now: u64,
    ) -> Result<usize, Self::Error> {
        let changed = self.conn.execute(
            "UPDATE claims SET embedding_status = 'pending', embedding_updated_at = ?2
             WHERE embedding_status = 'processing'
               AND COALESCE(embedding_updated_at, 0) < ?1",
            params![stale_before as i64, now as i64],
        )?;
        Ok(changed)
    }

    fn retry_failed_embeddings(&mut self, now: u64) -> Result<usize, Self::Error> {
        let changed = self.conn.execute(
            "UPDATE claims SET embedding_status = 'pending', embedding_error = NULL,
                    embedding_updated_at = ?1
             WHERE embedding_status = 'failed'",
            params![now as i64],
        )?;
        Ok(changed)
    }

    fn embedding_counts(&self) -> Result<EmbeddingCounts, Self::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT embedding_status, COUNT(*) FROM claims GROUP BY embedding_status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;

        let mut counts = EmbeddingCounts::default();
        for row in rows {
            let (status, count) = row?;
            match EmbeddingStatus::from_str_strict(&status) {
                Ok(EmbeddingStatus::Pending) => counts.pending = count,
                Ok(EmbeddingStatus::Processing) => counts.processing = count,
                Ok(EmbeddingStatus::Completed) => counts.completed = count,
                Ok(EmbeddingStatus::Failed) => counts.failed = count,
                Err(e) => return Err(StoreError::InvalidData(e)),
            }
        }
        Ok(counts)
    }

    fn enqueue_item(&mut self, item: ResearchQueueItem) -> Result<bool, Self::Error> {
        let id_bytes = Self::id_to_bytes(item.id.value());
        let authors_json = serde_json::to_string(&item.authors)
            .map_err(|e| StoreError::InvalidData(format!("Bad authors list: {}", e)))?;
        let dedup_key = item.dedup_key();

        let changed = self.conn.execute(
            "INSERT INTO research_queue
                 (id, title, authors, abstract_text, doi, url, journal, published_at,
                  source, priority, status, attempts, last_error, dedup_key,
                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(dedup_key) DO NOTHING",
            params![
                &id_bytes,
                &item.title,
                &authors_json,
                &item.abstract_text,
                &item.doi,
                &item.url,
                &item.journal,
                item.published_at.map(|t| t as i64),
                item.source.as_str(),
                item.priority as i64,
                item.status.as_str(),
                item.attempts as i64,
                &item.last_error,
                &dedup_key,
                item.created_at as i64,
                item.updated_at as i64,
            ],
        )?;

        Ok(changed > 0)
    }

    fn pending_queue_items(&self, limit: usize) -> Result<Vec<ResearchQueueItem>, Self::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM research_queue
             WHERE status IN ('pending', 'failed')
             ORDER BY priority ASC, created_at ASC
             LIMIT ?1",
            QUEUE_COLUMNS
        ))?;

        let items = stmt
            .query_map(params![limit as i64], Self::queue_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    fn update_queue_item(
        &mut self,
        id: QueueId,
        status: QueueStatus,
        error: Option<&str>,
        now: u64,
    ) -> Result<(), Self::Error> {
        let id_bytes = Self::id_to_bytes(id.value());
        let changed = self.conn.execute(
            "UPDATE research_queue
             SET status = ?2,
                 last_error = COALESCE(?3, last_error),
                 attempts = attempts + (CASE WHEN ?2 = 'processing' THEN 1 ELSE 0 END),
                 updated_at = ?4
             WHERE id = ?1",
            params![&id_bytes, status.as_str(), error, now as i64],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("queue item {}", id)));
        }
        Ok(())
    }

    fn queue_counts(&self) -> Result<QueueCounts, Self::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM research_queue GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let (status, count) = row?;
            match QueueStatus::from_str_strict(&status) {
                Ok(QueueStatus::Pending) => counts.pending = count,
                Ok(QueueStatus::Processing) => counts.processing = count,
                Ok(QueueStatus::Completed) => counts.completed = count,
                Ok(QueueStatus::Failed) => counts.failed = count,
                Ok(QueueStatus::Rejected) => counts.rejected = count,
                Err(e) => return Err(StoreError::InvalidData(e)),
            }
        }
        Ok(counts)
    }

    fn upsert_relationship(&mut self, rel: KnowledgeRelationship) -> Result<(), Self::Error> {
        let source_bytes = Self::id_to_bytes(rel.source.value());
        let target_bytes = Self::id_to_bytes(rel.target.value());

        self.conn.execute(
            "INSERT INTO relationships (source_id, target_id, relationship_type, strength, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(source_id, target_id, relationship_type) DO UPDATE SET
             strength = excluded.strength, created_at = excluded.created_at",
            params![
                &source_bytes,
                &target_bytes,
                rel.relationship_type.as_str(),
                rel.strength,
                rel.created_at as i64,
            ],
        )?;

        Ok(())
    }

    fn relationships_for(&self, id: ClaimId) -> Result<Vec<KnowledgeRelationship>, Self::Error> {
        let id_bytes = Self::id_to_bytes(id.value());
        let mut stmt = self.conn.prepare(
            "SELECT source_id, target_id, relationship_type, strength, created_at
             FROM relationships WHERE source_id = ?1 OR target_id = ?1",
        )?;

        let relationships = stmt
            .query_map(params![&id_bytes], Self::relationship_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(relationships)
    }

    fn has_relationship(
        &self,
        a: ClaimId,
        b: ClaimId,
        relationship_type: RelationshipType,
    ) -> Result<bool, Self::Error> {
        let a_bytes = Self::id_to_bytes(a.value());
        let b_bytes = Self::id_to_bytes(b.value());

        let exists: bool = self
            .conn
            .query_row(
                "SELECT 1 FROM relationships
                 WHERE relationship_type = ?3
                   AND ((source_id = ?1 AND target_id = ?2)
                     OR (source_id = ?2 AND target_id = ?1))",
                params![&a_bytes, &b_bytes, relationship_type.as_str()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        Ok(exists)
    }

    fn store_hierarchy(&mut self, hierarchy: &EvidenceHierarchy) -> Result<(), Self::Error> {
        let top_claim = hierarchy.top_claim.map(|id| Self::id_to_bytes(id.value()));

        self.conn.execute(
            "INSERT INTO evidence_hierarchy
                 (category, claim_count, avg_strength, top_claim, conflicting_count,
                  consensus, computed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(category) DO UPDATE SET
                 claim_count = excluded.claim_count,
                 avg_strength = excluded.avg_strength,
                 top_claim = excluded.top_claim,
                 conflicting_count = excluded.conflicting_count,
                 consensus = excluded.consensus,
                 computed_at = excluded.computed_at",
            params![
                hierarchy.category.as_str(),
                hierarchy.claim_count as i64,
                hierarchy.avg_strength,
                top_claim,
                hierarchy.conflicting_count as i64,
                hierarchy.consensus.as_str(),
                hierarchy.computed_at as i64,
            ],
        )?;

        Ok(())
    }

    fn get_hierarchy(&self, category: Category) -> Result<Option<EvidenceHierarchy>, Self::Error> {
        let hierarchy = self
            .conn
            .query_row(
                "SELECT category, claim_count, avg_strength, top_claim, conflicting_count,
                        consensus, computed_at
                 FROM evidence_hierarchy WHERE category = ?1",
                params![category.as_str()],
                |row| {
                    let category: String = row.get(0)?;
                    let category = Category::from_str_strict(&category)
                        .map_err(|e| Self::conversion_failure(0, StoreError::InvalidData(e)))?;
                    let top_claim: Option<Vec<u8>> = row.get(3)?;
                    let top_claim = top_claim
                        .map(|b| {
                            Self::bytes_to_id(&b)
                                .map(ClaimId::from_value)
                                .map_err(|e| Self::conversion_failure(3, e))
                        })
                        .transpose()?;
                    let consensus: String = row.get(5)?;
                    let consensus = ConsensusLabel::from_str_strict(&consensus)
                        .map_err(|e| Self::conversion_failure(5, StoreError::InvalidData(e)))?;
                    Ok(EvidenceHierarchy {
                        category,
                        claim_count: row.get::<_, i64>(1)? as usize,
                        avg_strength: row.get(2)?,
                        top_claim,
                        conflicting_count: row.get::<_, i64>(4)? as usize,
                        consensus,
                        computed_at: row.get::<_, i64>(6)? as u64,
                    })
                },
            )
            .optional()?;

        Ok(hierarchy)
    }

    fn record_validation(&mut self, entry: ValidationLogEntry) -> Result<(), Self::Error> {
        let id_bytes = Self::id_to_bytes(entry.claim_id.value());
        let reasons_json = serde_json::to_string(&entry.reasons)
            .map_err(|e| StoreError::InvalidData(format!("Bad reasons list: {}", e)))?;

        self.conn.execute(
            "INSERT INTO validation_log (claim_id, action, score, reasons, actor, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &id_bytes,
                entry.action.as_str(),
                entry.score,
                &reasons_json,
                &entry.actor,
                entry.created_at as i64,
            ],
        )?;

        Ok(())
    }

    fn validation_log(&self, id: ClaimId) -> Result<Vec<ValidationLogEntry>, Self::Error> {
        let id_bytes = Self::id_to_bytes(id.value());
        let mut stmt = self.conn.prepare(
            "SELECT claim_id, action, score, reasons, actor, created_at
             FROM validation_log WHERE claim_id = ?1 ORDER BY id ASC",
        )?;

        let entries = stmt
            .query_map(params![&id_bytes], |row| {
                let claim_bytes: Vec<u8> = row.get(0)?;
                let claim_id = Self::bytes_to_id(&claim_bytes)
                    .map(ClaimId::from_value)
                    .map_err(|e| Self::conversion_failure(0, e))?;
                let action: String = row.get(1)?;
                let action = ValidationAction::from_str_strict(&action)
                    .map_err(|e| Self::conversion_failure(1, StoreError::InvalidData(e)))?;
                let reasons_json: String = row.get(3)?;
                let reasons: Vec<String> = serde_json::from_str(&reasons_json).map_err(|e| {
                    Self::conversion_failure(
                        3,
                        StoreError::InvalidData(format!("Bad reasons JSON: {}", e)),
                    )
                })?;
                Ok(ValidationLogEntry {
                    claim_id,
                    action,
                    score: row.get(2)?,
                    reasons,
                    actor: row.get(4)?,
                    created_at: row.get::<_, i64>(5)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn record_agent_run(&mut self, record: &AgentRunRecord) -> Result<(), Self::Error> {
        self.conn.execute(
            "INSERT INTO agent_runs (agent, last_run, processed, succeeded, failed, skipped, last_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(agent) DO UPDATE SET
                 last_run = excluded.last_run,
                 processed = excluded.processed,
                 succeeded = excluded.succeeded,
                 failed = excluded.failed,
                 skipped = excluded.skipped,
                 last_error = excluded.last_error",
            params![
                &record.agent,
                record.last_run as i64,
                record.processed as i64,
                record.succeeded as i64,
                record.failed as i64,
                record.skipped as i64,
                record.last_error.as_deref(),
            ],
        )?;

        Ok(())
    }

    fn agent_runs(&self) -> Result<Vec<AgentRunRecord>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT agent, last_run, processed, succeeded, failed, skipped, last_error
             FROM agent_runs ORDER BY agent ASC",
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(AgentRunRecord {
                    agent: row.get(0)?,
                    last_run: row.get::<_, i64>(1)? as u64,
                    processed: row.get::<_, i64>(2)? as usize,
                    succeeded: row.get::<_, i64>(3)? as usize,
                    failed: row.get::<_, i64>(4)? as usize,
                    skipped: row.get::<_, i64>(5)? as usize,
                    last_error: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}
