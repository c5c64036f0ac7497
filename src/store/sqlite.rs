//! `ResultStore` durável sobre SQLite.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use tokio::sync::Mutex;

use super::entry::{CacheEntry, EntryStatus};
use super::eviction::RetentionPolicy;
use super::{ResultStore, SimilarEntry, StoreStats};
use crate::fingerprint::PerceptualKey;
use crate::types::responses::{ArtifactPayload, PayloadMetadata};
use crate::VisageResult;

/// Store durável de resultados de artefatos.
pub struct SqliteStore {
    // Usa Mutex em vez de RwLock porque rusqlite::Connection não é Sync
    conn: Arc<Mutex<Connection>>,
    retention: RetentionPolicy,
}

impl SqliteStore {
    /// Cria ou abre o banco de resultados.
    pub fn new(db_path: &Path, retention: RetentionPolicy) -> VisageResult<Self> {
        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            retention,
        })
    }

    /// Cria um store em memória (testes).
    pub fn in_memory(retention: RetentionPolicy) -> VisageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            retention,
        })
    }

    fn init_schema(conn: &Connection) -> VisageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS artifact_results (
                exact_key TEXT PRIMARY KEY,
                perceptual_key TEXT,
                perceptual_len INTEGER,
                status TEXT NOT NULL,
                payload BLOB,
                metadata TEXT,
                error_kind TEXT,
                error_message TEXT,
                task_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 0,
                last_accessed TEXT,
                processing_duration_ms REAL NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_artifact_results_status ON artifact_results(status);
            CREATE INDEX IF NOT EXISTS idx_artifact_results_expires ON artifact_results(expires_at);
            CREATE INDEX IF NOT EXISTS idx_artifact_results_created ON artifact_results(created_at);
            CREATE INDEX IF NOT EXISTS idx_artifact_results_similar
                ON artifact_results(status, perceptual_len);
        "#,
        )?;
        Ok(())
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
        let perceptual_hex: Option<String> = row.get(1)?;
        let perceptual_len: Option<u16> = row.get(2)?;
        let perceptual_key = match (perceptual_hex, perceptual_len) {
            (Some(hex), Some(len)) => PerceptualKey::from_hex(&hex, len).ok(),
            _ => None,
        };

        let status = EntryStatus::parse(&row.get::<_, String>(3)?);
        let payload_blob: Option<Vec<u8>> = row.get(4)?;
        let metadata_json: Option<String> = row.get(5)?;
        let payload = match (status, payload_blob) {
            (EntryStatus::Success, Some(blob)) => {
                let metadata = metadata_json
                    .and_then(|m| serde_json::from_str::<PayloadMetadata>(&m).ok())
                    .unwrap_or_default();
                Some(ArtifactPayload::new(blob, metadata))
            }
            _ => None,
        };

        Ok(CacheEntry {
            exact_key: row.get(0)?,
            perceptual_key,
            status,
            payload,
            error_kind: row.get(6)?,
            error_message: row.get(7)?,
            task_id: row.get(8)?,
            created_at: row
                .get::<_, String>(9)?
                .parse()
                .unwrap_or_else(|_| Utc::now()),
            expires_at: row
                .get::<_, String>(10)?
                .parse()
                .unwrap_or_else(|_| Utc::now()),
            hit_count: row.get(11)?,
            processing_duration_ms: row.get(12)?,
        })
    }
}

/// Formata um timestamp em largura fixa (micros, sufixo Z), o que
/// mantém a comparação lexicográfica do SQLite correta.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const ENTRY_COLUMNS: &str = "exact_key, perceptual_key, perceptual_len, status, payload, metadata,
             error_kind, error_message, task_id, created_at, expires_at,
             hit_count, processing_duration_ms";

#[async_trait]
impl ResultStore for SqliteStore {
    async fn get_by_exact_key(&self, exact_key: &str) -> VisageResult<Option<CacheEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM artifact_results
             WHERE exact_key = ?1 AND expires_at > ?2"
        ))?;

        let mut rows = stmt.query_map(params![exact_key, fmt_ts(Utc::now())], Self::row_to_entry)?;

        match rows.next() {
            Some(entry) => Ok(Some(entry?)),
            None => Ok(None),
        }
    }

    async fn put(&self, entry: &CacheEntry) -> VisageResult<()> {
        let metadata_json = entry
            .payload
            .as_ref()
            .map(|p| serde_json::to_string(&p.metadata))
            .transpose()?;

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO artifact_results (
                exact_key, perceptual_key, perceptual_len, status, payload, metadata,
                error_kind, error_message, task_id, created_at, expires_at,
                hit_count, processing_duration_ms
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(exact_key) DO UPDATE SET
                perceptual_key = excluded.perceptual_key,
                perceptual_len = excluded.perceptual_len,
                status = excluded.status,
                payload = excluded.payload,
                metadata = excluded.metadata,
                error_kind = excluded.error_kind,
                error_message = excluded.error_message,
                task_id = excluded.task_id,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at,
                hit_count = excluded.hit_count,
                processing_duration_ms = excluded.processing_duration_ms",
            params![
                entry.exact_key,
                entry.perceptual_key.as_ref().map(|k| k.to_hex()),
                entry.perceptual_key.as_ref().map(|k| k.len()),
                entry.status.to_string(),
                entry.payload.as_ref().map(|p| p.blob.clone()),
                metadata_json,
                entry.error_kind,
                entry.error_message,
                entry.task_id,
                fmt_ts(entry.created_at),
                fmt_ts(entry.expires_at),
                entry.hit_count,
                entry.processing_duration_ms,
            ],
        )?;
        Ok(())
    }

    async fn find_similar(
        &self,
        perceptual_key: &PerceptualKey,
        max_distance: u32,
    ) -> VisageResult<Vec<SimilarEntry>> {
        let conn = self.conn.lock().await;
        // O SQL pré-filtra status, expiração e largura da chave; a
        // distância de Hamming é computada em Rust sobre os candidatos
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM artifact_results
             WHERE status = 'success'
               AND expires_at > ?1
               AND perceptual_key IS NOT NULL
               AND perceptual_len = ?2"
        ))?;

        let entries: Vec<CacheEntry> = stmt
            .query_map(
                params![fmt_ts(Utc::now()), perceptual_key.len()],
                Self::row_to_entry,
            )?
            .filter_map(|r| r.ok())
            .collect();

        let mut candidates: Vec<SimilarEntry> = entries
            .into_iter()
            .filter_map(|entry| {
                let distance = entry
                    .perceptual_key
                    .as_ref()?
                    .hamming_distance(perceptual_key)?;
                (distance <= max_distance).then_some(SimilarEntry { entry, distance })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then(b.entry.created_at.cmp(&a.entry.created_at))
        });

        Ok(candidates)
    }

    async fn increment_hit(&self, exact_key: &str) -> VisageResult<()> {
        let conn = self.conn.lock().await;
        // Um único UPDATE: o incremento é atômico no banco, nunca
        // read-modify-write no cliente
        conn.execute(
            "UPDATE artifact_results
             SET hit_count = hit_count + 1, last_accessed = ?2
             WHERE exact_key = ?1",
            params![exact_key, fmt_ts(Utc::now())],
        )?;
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> VisageResult<usize> {
        let failure_cutoff = now
            - chrono::Duration::from_std(self.retention.failure_retention)
                .unwrap_or(chrono::Duration::zero());
        let stale_cutoff = now
            - chrono::Duration::from_std(self.retention.stale_retention)
                .unwrap_or(chrono::Duration::zero());

        let conn = self.conn.lock().await;
        let removed = conn.execute(
            "DELETE FROM artifact_results
             WHERE expires_at <= ?1
                OR (status = 'failure' AND created_at < ?2)
                OR (hit_count = 0 AND created_at < ?3)",
            params![fmt_ts(now), fmt_ts(failure_cutoff), fmt_ts(stale_cutoff)],
        )?;
        Ok(removed)
    }

    async fn stats(&self) -> VisageResult<StoreStats> {
        let conn = self.conn.lock().await;
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'failure' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(hit_count), 0),
                    COALESCE(AVG(CASE WHEN status = 'success' THEN processing_duration_ms END), 0)
             FROM artifact_results",
            [],
            |row| {
                Ok(StoreStats {
                    total_entries: row.get::<_, i64>(0)? as usize,
                    success_entries: row.get::<_, i64>(1)? as usize,
                    failure_entries: row.get::<_, i64>(2)? as usize,
                    total_hits: row.get(3)?,
                    avg_processing_ms: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }

    async fn recent(&self, limit: usize) -> VisageResult<Vec<CacheEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM artifact_results
             ORDER BY created_at DESC
             LIMIT ?1"
        ))?;

        let entries = stmt
            .query_map(params![limit as i64], Self::row_to_entry)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::responses::{ArtifactPayload, FailureInfo, PayloadMetadata};
    use std::time::Duration;

    fn create_store() -> SqliteStore {
        SqliteStore::in_memory(RetentionPolicy::default()).unwrap()
    }

    fn success_entry(key: &str, ttl: Duration) -> CacheEntry {
        CacheEntry::success(
            key,
            Some(PerceptualKey::from_bits(&[true; 63])),
            ArtifactPayload::new(
                b"<svg/>".to_vec(),
                PayloadMetadata {
                    regions_detected: 10,
                    landmarks_count: 478,
                    image_width: 640,
                    image_height: 480,
                    extra: serde_json::Value::Null,
                },
            ),
            ttl,
            42.0,
            "task",
        )
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = create_store();
        let entry = success_entry("k1", Duration::from_secs(60));
        store.put(&entry).await.unwrap();

        let found = store.get_by_exact_key("k1").await.unwrap().unwrap();
        assert_eq!(found.exact_key, "k1");
        assert_eq!(found.status, EntryStatus::Success);
        assert_eq!(found.payload.as_ref().unwrap().blob, b"<svg/>");
        assert_eq!(found.payload.as_ref().unwrap().metadata.landmarks_count, 478);
        assert_eq!(found.perceptual_key, entry.perceptual_key);
    }

    #[tokio::test]
    async fn test_miss_when_absent() {
        let store = create_store();
        assert!(store.get_by_exact_key("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_is_miss_before_sweep() {
        let store = create_store();
        store
            .put(&success_entry("k1", Duration::ZERO))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.get_by_exact_key("k1").await.unwrap().is_none());
        // Ainda presente fisicamente
        assert_eq!(store.stats().await.unwrap().total_entries, 1);
    }

    #[tokio::test]
    async fn test_upsert_leaves_single_row() {
        let store = create_store();
        store
            .put(&success_entry("k1", Duration::from_secs(60)))
            .await
            .unwrap();
        let mut second = success_entry("k1", Duration::from_secs(60));
        second.processing_duration_ms = 99.0;
        store.put(&second).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_entries, 1);

        let found = store.get_by_exact_key("k1").await.unwrap().unwrap();
        assert!((found.processing_duration_ms - 99.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_failure_roundtrip() {
        let store = create_store();
        let failure = FailureInfo::new("DecodeError", "bad pixels");
        let entry = CacheEntry::failure(
            "bad",
            None,
            &failure,
            Duration::from_secs(60),
            2.0,
            "task",
        );
        store.put(&entry).await.unwrap();

        let found = store.get_by_exact_key("bad").await.unwrap().unwrap();
        assert_eq!(found.status, EntryStatus::Failure);
        assert!(found.payload.is_none());
        assert_eq!(found.failure_info().unwrap(), failure);
    }

    #[tokio::test]
    async fn test_increment_hit_persists() {
        let store = create_store();
        store
            .put(&success_entry("k1", Duration::from_secs(60)))
            .await
            .unwrap();

        store.increment_hit("k1").await.unwrap();
        store.increment_hit("k1").await.unwrap();
        store.increment_hit("k1").await.unwrap();

        let found = store.get_by_exact_key("k1").await.unwrap().unwrap();
        assert_eq!(found.hit_count, 3);
    }

    #[tokio::test]
    async fn test_find_similar_threshold_boundary() {
        let store = create_store();
        let query = PerceptualKey::from_bits(&[false; 63]);

        let mut bits = vec![false; 63];
        for b in bits.iter_mut().take(6) {
            *b = true;
        }
        let mut entry = success_entry("d6", Duration::from_secs(60));
        entry.perceptual_key = Some(PerceptualKey::from_bits(&bits));
        store.put(&entry).await.unwrap();

        // Distância 6: acha com limite 6, não acha com limite 5
        let hits = store.find_similar(&query, 6).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].distance, 6);

        let misses = store.find_similar(&query, 5).await.unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn test_find_similar_skips_failures_and_expired() {
        let store = create_store();
        let key = PerceptualKey::from_bits(&[false; 63]);

        let mut failed = CacheEntry::failure(
            "fail",
            Some(key.clone()),
            &FailureInfo::new("E", "x"),
            Duration::from_secs(60),
            1.0,
            "task",
        );
        failed.perceptual_key = Some(key.clone());
        store.put(&failed).await.unwrap();

        let mut dead = success_entry("dead", Duration::ZERO);
        dead.perceptual_key = Some(key.clone());
        store.put(&dead).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.find_similar(&key, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_similar_incomparable_width() {
        let store = create_store();
        store
            .put(&success_entry("k", Duration::from_secs(60)))
            .await
            .unwrap();

        // Chave de 15 bits contra entradas de 63: sem candidatos
        let narrow = PerceptualKey::from_bits(&[true; 15]);
        assert!(store.find_similar(&narrow, 63).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_expired_counts() {
        let store = create_store();
        store
            .put(&success_entry("dead1", Duration::ZERO))
            .await
            .unwrap();
        store
            .put(&success_entry("dead2", Duration::ZERO))
            .await
            .unwrap();
        let mut alive = success_entry("alive", Duration::from_secs(3600));
        alive.hit_count = 1;
        store.put(&alive).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let removed = store.sweep_expired(Utc::now()).await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.stats().await.unwrap().total_entries, 1);
        assert!(store.get_by_exact_key("alive").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweep_reclaims_old_failures() {
        let retention = RetentionPolicy {
            failure_retention: Duration::ZERO,
            stale_retention: Duration::from_secs(3600),
        };
        let store = SqliteStore::in_memory(retention).unwrap();

        let failure = FailureInfo::new("E", "x");
        store
            .put(&CacheEntry::failure(
                "f",
                None,
                &failure,
                Duration::from_secs(3600),
                1.0,
                "task",
            ))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let removed = store.sweep_expired(Utc::now()).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_recent_ordering() {
        let store = create_store();
        for i in 0..5 {
            let mut entry = success_entry(&format!("k{}", i), Duration::from_secs(60));
            entry.created_at = Utc::now() - chrono::Duration::seconds(10 - i);
            store.put(&entry).await.unwrap();
        }

        let recent = store.recent(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].exact_key, "k4");
        assert_eq!(recent[1].exact_key, "k3");
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("visage.db");

        {
            let store = SqliteStore::new(&db_path, RetentionPolicy::default()).unwrap();
            store
                .put(&success_entry("k1", Duration::from_secs(3600)))
                .await
                .unwrap();
        }

        let reopened = SqliteStore::new(&db_path, RetentionPolicy::default()).unwrap();
        assert!(reopened.get_by_exact_key("k1").await.unwrap().is_some());
    }
}
