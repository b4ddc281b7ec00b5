//! Composition ("kit") expansion boundary.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fulcrum_core::{EngineResult, RecordId, TenantId};

use crate::item::ItemKind;

/// One weighted component of an exploded kit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentLine {
    pub item_id: RecordId,
    pub name: String,
    pub kind: ItemKind,
    pub quantity: Decimal,
    pub sell_price: Decimal,
    pub cost_price: Decimal,
    pub track_stock: bool,
    pub requires_separation: bool,
    pub requires_delivery: bool,
    pub requires_scheduling: bool,
    pub unit_id: Option<RecordId>,
}

/// External service that explodes a kit item into its component lines.
///
/// Consumed as a black box: quantities in the result are already scaled by
/// the ordered quantity.
#[async_trait]
pub trait CompositionExpander: Send + Sync {
    async fn explode(
        &self,
        tenant_id: TenantId,
        item_id: RecordId,
        quantity: Decimal,
    ) -> EngineResult<Vec<ComponentLine>>;
}

/// Fixture-backed expander for tests and development.
///
/// Components are registered per item with per-unit quantities; `explode`
/// scales them by the ordered quantity.
#[derive(Debug, Default)]
pub struct StaticExpander {
    kits: RwLock<HashMap<RecordId, Vec<ComponentLine>>>,
}

impl StaticExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kit_item_id: RecordId, components: Vec<ComponentLine>) {
        if let Ok(mut kits) = self.kits.write() {
            kits.insert(kit_item_id, components);
        }
    }
}

#[async_trait]
impl CompositionExpander for StaticExpander {
    async fn explode(
        &self,
        _tenant_id: TenantId,
        item_id: RecordId,
        quantity: Decimal,
    ) -> EngineResult<Vec<ComponentLine>> {
        let kits = self
            .kits
            .read()
            .map_err(|_| fulcrum_core::EngineError::store("expander lock poisoned"))?;
        Ok(kits
            .get(&item_id)
            .map(|components| {
                components
                    .iter()
                    .map(|c| ComponentLine {
                        quantity: c.quantity * quantity,
                        ..c.clone()
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn component(name: &str, quantity: Decimal) -> ComponentLine {
        ComponentLine {
            item_id: RecordId::new(),
            name: name.to_string(),
            kind: ItemKind::Product,
            quantity,
            sell_price: dec!(5),
            cost_price: dec!(2),
            track_stock: true,
            requires_separation: false,
            requires_delivery: false,
            requires_scheduling: false,
            unit_id: None,
        }
    }

    #[tokio::test]
    async fn explode_scales_component_quantities() {
        let expander = StaticExpander::new();
        let kit = RecordId::new();
        expander.register(kit, vec![component("a", dec!(2)), component("b", dec!(0.5))]);

        let lines = expander
            .explode(TenantId::new(), kit, dec!(3))
            .await
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].quantity, dec!(6));
        assert_eq!(lines[1].quantity, dec!(1.5));
    }

    #[tokio::test]
    async fn unknown_kit_explodes_to_nothing() {
        let expander = StaticExpander::new();
        let lines = expander
            .explode(TenantId::new(), RecordId::new(), dec!(1))
            .await
            .unwrap();
        assert!(lines.is_empty());
    }
}
