//! Financial ledger collaborator.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use fulcrum_core::{EngineError, EngineResult, RecordId, TenantId, round_money};
use fulcrum_store::{Filter, RecordStore, collections};

/// One line of a sale as the financial side sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleDocumentLine {
    pub order_line_id: RecordId,
    pub item_id: RecordId,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// The narrow view of an order handed to the financial collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleDocument {
    pub order_id: RecordId,
    pub customer_id: RecordId,
    pub partner_id: Option<RecordId>,
    /// Percentage of the total earned by the partner, when one is attached.
    pub partner_commission_percent: Option<Decimal>,
    pub payment_method: String,
    pub total: Decimal,
    pub lines: Vec<SaleDocumentLine>,
}

/// Ids of the records the financial side created for a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleFinancials {
    pub invoice_id: RecordId,
    pub receivable_id: RecordId,
    pub payment_ids: Vec<RecordId>,
    pub partner_earning_id: Option<RecordId>,
}

/// Creates and voids the financial records attached to engine operations.
///
/// Called once per order; all callers treat failures as best-effort and
/// record them in a [`crate::SideEffectReport`] instead of propagating.
#[async_trait]
pub trait FinancialLedger: Send + Sync {
    /// Create invoice + line items, the receivable, payment record(s), and
    /// the optional partner earning for a completed sale.
    async fn post_sale(
        &self,
        tenant_id: TenantId,
        sale: &SaleDocument,
    ) -> EngineResult<SaleFinancials>;

    /// Cancel the invoice and receivable linked to an order.
    async fn void_sale(&self, tenant_id: TenantId, order_id: RecordId) -> EngineResult<()>;

    /// Create the accounts-payable entry for a fully received purchase.
    async fn post_payable(
        &self,
        tenant_id: TenantId,
        purchase_id: RecordId,
        total: Decimal,
    ) -> EngineResult<RecordId>;
}

/// Reference implementation writing plain records through the record store.
#[derive(Clone)]
pub struct StoreLedger {
    store: Arc<dyn RecordStore>,
}

impl StoreLedger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FinancialLedger for StoreLedger {
    async fn post_sale(
        &self,
        tenant_id: TenantId,
        sale: &SaleDocument,
    ) -> EngineResult<SaleFinancials> {
        let now = Utc::now();

        let invoice_id = self
            .store
            .create(
                collections::INVOICES,
                json!({
                    "tenant_id": tenant_id,
                    "order_id": sale.order_id,
                    "customer_id": sale.customer_id,
                    "total": sale.total,
                    "status": "issued",
                    "issued_at": now,
                }),
            )
            .await?;

        let line_docs = sale
            .lines
            .iter()
            .map(|line| {
                json!({
                    "tenant_id": tenant_id,
                    "invoice_id": invoice_id,
                    "order_line_id": line.order_line_id,
                    "item_id": line.item_id,
                    "description": line.description,
                    "quantity": line.quantity,
                    "unit_price": line.unit_price,
                    "subtotal": line.subtotal,
                })
            })
            .collect();
        self.store
            .batch_create(collections::INVOICE_LINES, line_docs)
            .await?;

        let receivable_id = self
            .store
            .create(
                collections::RECEIVABLES,
                json!({
                    "tenant_id": tenant_id,
                    "order_id": sale.order_id,
                    "invoice_id": invoice_id,
                    "customer_id": sale.customer_id,
                    "amount": sale.total,
                    "status": "open",
                    "created_at": now,
                }),
            )
            .await?;

        let payment_id = self
            .store
            .create(
                collections::PAYMENTS,
                json!({
                    "tenant_id": tenant_id,
                    "order_id": sale.order_id,
                    "invoice_id": invoice_id,
                    "method": sale.payment_method,
                    "amount": sale.total,
                    "created_at": now,
                }),
            )
            .await?;

        let partner_earning_id = match (sale.partner_id, sale.partner_commission_percent) {
            (Some(partner_id), Some(percent)) if percent > Decimal::ZERO => {
                let amount = round_money(sale.total * percent / Decimal::ONE_HUNDRED);
                Some(
                    self.store
                        .create(
                            collections::PARTNER_EARNINGS,
                            json!({
                                "tenant_id": tenant_id,
                                "order_id": sale.order_id,
                                "partner_id": partner_id,
                                "amount": amount,
                                "created_at": now,
                            }),
                        )
                        .await?,
                )
            }
            _ => None,
        };

        Ok(SaleFinancials {
            invoice_id,
            receivable_id,
            payment_ids: vec![payment_id],
            partner_earning_id,
        })
    }

    async fn void_sale(&self, tenant_id: TenantId, order_id: RecordId) -> EngineResult<()> {
        let filters = [Filter::tenant(tenant_id), Filter::ref_eq("order_id", order_id)];

        for collection in [collections::INVOICES, collections::RECEIVABLES] {
            let records = self.store.list(collection, &filters).await?;
            for record in records {
                self.store
                    .update(collection, record.id, json!({ "status": "cancelled" }))
                    .await?;
            }
        }
        Ok(())
    }

    async fn post_payable(
        &self,
        tenant_id: TenantId,
        purchase_id: RecordId,
        total: Decimal,
    ) -> EngineResult<RecordId> {
        self.store
            .create(
                collections::PAYABLES,
                json!({
                    "tenant_id": tenant_id,
                    "purchase_id": purchase_id,
                    "amount": total,
                    "status": "open",
                    "created_at": Utc::now(),
                }),
            )
            .await
    }
}

/// Test double that remembers every call and returns fresh ids.
#[derive(Debug, Default)]
pub struct RecordingLedger {
    pub sales: Mutex<Vec<(TenantId, SaleDocument)>>,
    pub voided: Mutex<Vec<(TenantId, RecordId)>>,
    pub payables: Mutex<Vec<(TenantId, RecordId, Decimal)>>,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FinancialLedger for RecordingLedger {
    async fn post_sale(
        &self,
        tenant_id: TenantId,
        sale: &SaleDocument,
    ) -> EngineResult<SaleFinancials> {
        self.sales
            .lock()
            .map_err(|_| EngineError::store("recording ledger poisoned"))?
            .push((tenant_id, sale.clone()));
        Ok(SaleFinancials {
            invoice_id: RecordId::new(),
            receivable_id: RecordId::new(),
            payment_ids: vec![RecordId::new()],
            partner_earning_id: sale.partner_id.map(|_| RecordId::new()),
        })
    }

    async fn void_sale(&self, tenant_id: TenantId, order_id: RecordId) -> EngineResult<()> {
        self.voided
            .lock()
            .map_err(|_| EngineError::store("recording ledger poisoned"))?
            .push((tenant_id, order_id));
        Ok(())
    }

    async fn post_payable(
        &self,
        tenant_id: TenantId,
        purchase_id: RecordId,
        total: Decimal,
    ) -> EngineResult<RecordId> {
        self.payables
            .lock()
            .map_err(|_| EngineError::store("recording ledger poisoned"))?
            .push((tenant_id, purchase_id, total));
        Ok(RecordId::new())
    }
}

/// Test double whose every call fails, for best-effort paths.
#[derive(Debug, Default)]
pub struct FailingLedger;

#[async_trait]
impl FinancialLedger for FailingLedger {
    async fn post_sale(&self, _: TenantId, _: &SaleDocument) -> EngineResult<SaleFinancials> {
        Err(EngineError::store("financial service unavailable"))
    }

    async fn void_sale(&self, _: TenantId, _: RecordId) -> EngineResult<()> {
        Err(EngineError::store("financial service unavailable"))
    }

    async fn post_payable(&self, _: TenantId, _: RecordId, _: Decimal) -> EngineResult<RecordId> {
        Err(EngineError::store("financial service unavailable"))
    }
}
