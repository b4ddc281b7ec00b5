//! Batch catalog resolution.

use std::collections::HashMap;
use std::sync::Arc;

use fulcrum_core::{EngineError, EngineResult, RecordId, TenantId};
use fulcrum_store::{Filter, RecordStore, collections, fetch};

use crate::item::CatalogItem;

/// Resolves catalog items for the engine, always in one batch read.
#[derive(Clone)]
pub struct CatalogResolver {
    store: Arc<dyn RecordStore>,
}

impl CatalogResolver {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Resolve all referenced items with a single `In`-filtered list.
    ///
    /// Ids absent from the result map were not found for this tenant; the
    /// caller decides whether that is fatal.
    pub async fn resolve(
        &self,
        tenant_id: TenantId,
        ids: &[RecordId],
    ) -> EngineResult<HashMap<RecordId, CatalogItem>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let items: Vec<CatalogItem> = fetch(
            self.store.as_ref(),
            collections::CATALOG_ITEMS,
            &[Filter::tenant(tenant_id), Filter::id_in(ids)],
        )
        .await?;

        Ok(items.into_iter().map(|item| (item.id, item)).collect())
    }

    /// Resolve a single item; missing is a hard failure here.
    pub async fn require(
        &self,
        tenant_id: TenantId,
        item_id: RecordId,
    ) -> EngineResult<CatalogItem> {
        let mut map = self.resolve(tenant_id, &[item_id]).await?;
        map.remove(&item_id)
            .ok_or_else(|| EngineError::not_found(format!("catalog item {item_id}")))
    }
}
