//! Field schema cache (C4, spec §4.4): per-project TTL cache of tracker
//! field metadata, keyed by both id and name, with single-flight fetch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracker_client::{ApiError, FieldSchema, FieldType, TrackerClient};

#[derive(Debug, Error)]
pub enum FieldSchemaError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("field '{field}' requires a value")]
    Required { field: String },
    #[error("field '{field}' expects type {expected:?}, value did not match")]
    TypeMismatch { field: String, expected: FieldType },
    #[error("field '{field}' value is not one of the allowed values")]
    NotAllowed { field: String },
    #[error(transparent)]
    Tracker(#[from] ApiError),
}

struct ProjectCache {
    by_id: HashMap<String, Arc<FieldSchema>>,
    by_name: HashMap<String, Arc<FieldSchema>>,
    fetched_at: Instant,
}

/// TTL-bounded field metadata cache, one entry per project. Each project's
/// fetch is single-flighted via a per-project mutex so concurrent misses
/// collapse into a single tracker call.
pub struct FieldSchemaCache {
    client: TrackerClient,
    ttl: Duration,
    cache: RwLock<HashMap<String, Arc<ProjectCache>>>,
    fetch_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FieldSchemaCache {
    pub fn new(client: TrackerClient) -> Self {
        Self::with_ttl(client, Duration::from_secs(5 * 60))
    }

    pub fn with_ttl(client: TrackerClient, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            cache: RwLock::new(HashMap::new()),
            fetch_locks: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fraction of `ensure_fresh` calls served from a live cache entry
    /// rather than a tracker fetch, since process start. Feeds the
    /// Health Monitor's cache hit-rate probe.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        if hits + misses == 0.0 {
            return 1.0;
        }
        hits / (hits + misses)
    }

    async fn fetch_lock(&self, project: &str) -> Arc<Mutex<()>> {
        let mut locks = self.fetch_locks.lock().await;
        locks
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn ensure_fresh(&self, project: &str) -> Result<Arc<ProjectCache>, FieldSchemaError> {
        if let Some(entry) = self.cache.read().await.get(project) {
            if entry.fetched_at.elapsed() < self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.clone());
            }
        }

        let lock = self.fetch_lock(project).await;
        let _guard = lock.lock().await;

        // Re-check: another task may have refreshed while we waited.
        if let Some(entry) = self.cache.read().await.get(project) {
            if entry.fetched_at.elapsed() < self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let fields = self.client.get_fields(project).await?;
        let mut by_id = HashMap::with_capacity(fields.len());
        let mut by_name = HashMap::with_capacity(fields.len());
        for field in fields {
            let field = Arc::new(field);
            by_id.insert(field.id.clone(), field.clone());
            by_name.insert(field.name.clone(), field.clone());
        }

        let entry = Arc::new(ProjectCache {
            by_id,
            by_name,
            fetched_at: Instant::now(),
        });
        self.cache
            .write()
            .await
            .insert(project.to_string(), entry.clone());
        Ok(entry)
    }

    /// `get_field(name_or_id, project)`: looks up by id first, then name.
    pub async fn get_field(
        &self,
        name_or_id: &str,
        project: &str,
    ) -> Result<Arc<FieldSchema>, FieldSchemaError> {
        let cache = self.ensure_fresh(project).await?;
        cache
            .by_id
            .get(name_or_id)
            .or_else(|| cache.by_name.get(name_or_id))
            .cloned()
            .ok_or_else(|| FieldSchemaError::UnknownField(name_or_id.to_string()))
    }

    /// `validate(name_or_id, value, project)`: required/type/allowed-values.
    pub async fn validate(
        &self,
        name_or_id: &str,
        value: &serde_json::Value,
        project: &str,
    ) -> Result<(), FieldSchemaError> {
        let field = self.get_field(name_or_id, project).await?;

        if field.required && value.is_null() {
            return Err(FieldSchemaError::Required {
                field: field.name.clone(),
            });
        }
        if value.is_null() {
            return Ok(());
        }

        let type_matches = match field.field_type {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Array => value.is_array(),
            FieldType::Option => value.is_string(),
            FieldType::Date | FieldType::DateTime => value.is_string(),
        };
        if !type_matches {
            return Err(FieldSchemaError::TypeMismatch {
                field: field.name.clone(),
                expected: field.field_type,
            });
        }

        if let Some(allowed) = &field.allowed_values {
            let candidate = value.as_str().map(str::to_string);
            if let Some(candidate) = candidate {
                if !allowed.contains(&candidate) {
                    return Err(FieldSchemaError::NotAllowed {
                        field: field.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Force-expire a project's cache entry, e.g. after a schema change.
    pub async fn invalidate(&self, project: &str) {
        self.cache.write().await.remove(project);
    }
}

#[cfg(test)]
#[path = "field_schema_tests.rs"]
mod tests;
