//! In-memory record store for tests and development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use fulcrum_core::{EngineError, EngineResult, RecordId};

use crate::filter::Filter;
use crate::record::{Record, RecordStore};

/// In-memory implementation of [`RecordStore`].
///
/// Records are kept per collection in insertion order, the same order a
/// remote store would return them for this engine's queries. Filters are
/// evaluated in process; tenant scoping is just another field filter, exactly
/// as the transport would apply it.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: RwLock<HashMap<String, Vec<(RecordId, JsonValue)>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> EngineError {
        EngineError::store("record store lock poisoned")
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list(&self, collection: &str, filters: &[Filter]) -> EngineResult<Vec<Record>> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        let records = map
            .get(collection)
            .map(|rows| {
                rows.iter()
                    .filter(|(id, fields)| {
                        // Filters may address the store-issued id as `id`.
                        let mut view = fields.clone();
                        if let Some(obj) = view.as_object_mut() {
                            obj.insert("id".to_string(), JsonValue::String(id.to_string()));
                        }
                        filters.iter().all(|f| f.matches(&view))
                    })
                    .map(|(id, fields)| Record {
                        id: *id,
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn create(&self, collection: &str, fields: JsonValue) -> EngineResult<RecordId> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let id = RecordId::new();
        map.entry(collection.to_string()).or_default().push((id, fields));
        Ok(id)
    }

    async fn batch_create(
        &self,
        collection: &str,
        records: Vec<JsonValue>,
    ) -> EngineResult<Vec<RecordId>> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let rows = map.entry(collection.to_string()).or_default();
        let ids = records
            .into_iter()
            .map(|fields| {
                let id = RecordId::new();
                rows.push((id, fields));
                id
            })
            .collect();
        Ok(ids)
    }

    async fn update(&self, collection: &str, id: RecordId, patch: JsonValue) -> EngineResult<()> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let row = map
            .get_mut(collection)
            .and_then(|rows| rows.iter_mut().find(|(rid, _)| *rid == id))
            .ok_or_else(|| EngineError::not_found(format!("{collection}/{id}")))?;

        match (row.1.as_object_mut(), patch.as_object()) {
            (Some(fields), Some(changes)) => {
                for (k, v) in changes {
                    fields.insert(k.clone(), v.clone());
                }
                Ok(())
            }
            _ => Err(EngineError::store("update requires JSON objects")),
        }
    }
}
