//! Record-store trait and typed boundary helpers.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use fulcrum_core::{EngineError, EngineResult, RecordId};

use crate::filter::Filter;

/// A stored record: the id issued by the store plus the JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub fields: JsonValue,
}

/// Generic CRUD boundary over named record collections.
///
/// Ids are issued by the store on `create`/`batch_create`; `batch_create`
/// returns them in input order so callers can correlate. `update` is a
/// shallow field merge. Filters may address the store-issued id under the
/// field name `id`. There is no transaction spanning calls — callers own
/// partial-failure semantics.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(&self, collection: &str, filters: &[Filter]) -> EngineResult<Vec<Record>>;

    async fn create(&self, collection: &str, fields: JsonValue) -> EngineResult<RecordId>;

    async fn batch_create(
        &self,
        collection: &str,
        records: Vec<JsonValue>,
    ) -> EngineResult<Vec<RecordId>>;

    async fn update(&self, collection: &str, id: RecordId, patch: JsonValue) -> EngineResult<()>;
}

fn to_document<T: Serialize>(value: &T) -> EngineResult<JsonValue> {
    let mut doc = serde_json::to_value(value).map_err(|e| EngineError::store(e.to_string()))?;
    // The store issues the id; a serialized `id` field would shadow it.
    if let Some(obj) = doc.as_object_mut() {
        obj.remove("id");
    }
    Ok(doc)
}

fn from_document<T: DeserializeOwned>(record: Record) -> EngineResult<T> {
    let mut doc = record.fields;
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("id".to_string(), JsonValue::String(record.id.to_string()));
    }
    serde_json::from_value(doc).map_err(|e| EngineError::store(e.to_string()))
}

/// Serialize and create a single typed record; returns the issued id.
pub async fn insert<T: Serialize>(
    store: &dyn RecordStore,
    collection: &str,
    value: &T,
) -> EngineResult<RecordId> {
    store.create(collection, to_document(value)?).await
}

/// Serialize and create a batch of typed records; ids come back in input order.
pub async fn insert_batch<T: Serialize>(
    store: &dyn RecordStore,
    collection: &str,
    values: &[T],
) -> EngineResult<Vec<RecordId>> {
    let docs = values.iter().map(to_document).collect::<EngineResult<Vec<_>>>()?;
    store.batch_create(collection, docs).await
}

/// List and deserialize typed records. The store-issued id is injected into
/// the document under `id` before deserialization.
pub async fn fetch<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: &str,
    filters: &[Filter],
) -> EngineResult<Vec<T>> {
    let records = store.list(collection, filters).await?;
    records.into_iter().map(from_document).collect()
}

/// Fetch at most one typed record.
pub async fn fetch_one<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: &str,
    filters: &[Filter],
) -> EngineResult<Option<T>> {
    let mut records = fetch(store, collection, filters).await?;
    Ok(if records.is_empty() {
        None
    } else {
        Some(records.swap_remove(0))
    })
}
