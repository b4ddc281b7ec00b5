//! Sale orchestration: order commit, stock deduction, best-effort handoffs.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use fulcrum_catalog::{CatalogResolver, CompositionExpander, ItemKind};
use fulcrum_core::{EngineResult, TenantId};
use fulcrum_finance::{
    FinancialLedger, SaleDocument, SaleDocumentLine, SideEffectReport, SideEffectStep,
    WorkflowService,
};
use fulcrum_stock::{MovementLinks, MovementType, StockLedger};
use fulcrum_store::{RecordStore, collections};

use crate::builder::{CreateOrderRequest, build_draft};
use crate::order::{Order, OrderLine};

/// Everything a completed checkout produced.
#[derive(Debug)]
pub struct SaleOutcome {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub side_effects: SideEffectReport,
}

/// The checkout entry point.
///
/// Stock deduction is part of the primary operation and propagates failures;
/// the financial and workflow handoffs are best-effort and only surface in
/// the [`SideEffectReport`].
pub struct SalesEngine {
    store: Arc<dyn RecordStore>,
    resolver: CatalogResolver,
    expander: Arc<dyn CompositionExpander>,
    ledger: Arc<StockLedger>,
    financial: Arc<dyn FinancialLedger>,
    workflow: Arc<dyn WorkflowService>,
}

impl SalesEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        expander: Arc<dyn CompositionExpander>,
        ledger: Arc<StockLedger>,
        financial: Arc<dyn FinancialLedger>,
        workflow: Arc<dyn WorkflowService>,
    ) -> Self {
        Self {
            resolver: CatalogResolver::new(store.clone()),
            store,
            expander,
            ledger,
            financial,
            workflow,
        }
    }

    pub async fn create_order(
        &self,
        tenant_id: TenantId,
        request: &CreateOrderRequest,
    ) -> EngineResult<SaleOutcome> {
        let draft = build_draft(&self.resolver, self.expander.as_ref(), tenant_id, request).await?;
        let (order, mut lines) = draft.commit(self.store.as_ref(), tenant_id).await?;
        info!(%tenant_id, order_id = %order.id, total = %order.total, "order created");

        // Stock leaves the building now; a deduction failure fails the sale.
        for line in &lines {
            if !line.is_composition_parent && line.kind == ItemKind::Product && line.track_stock {
                self.ledger
                    .record_movement(
                        tenant_id,
                        line.item_id,
                        MovementType::Sale,
                        -line.quantity,
                        MovementLinks::for_order(order.id, line.id),
                    )
                    .await?;
            }
        }

        let mut side_effects = self
            .post_financials(tenant_id, &order, &lines, request.partner_commission_percent)
            .await;
        side_effects.merge(self.start_workflows(tenant_id, &mut lines).await);

        Ok(SaleOutcome {
            order,
            lines,
            side_effects,
        })
    }

    async fn post_financials(
        &self,
        tenant_id: TenantId,
        order: &Order,
        lines: &[OrderLine],
        commission_percent: Option<rust_decimal::Decimal>,
    ) -> SideEffectReport {
        let document = SaleDocument {
            order_id: order.id,
            customer_id: order.customer_id,
            partner_id: order.partner_id,
            partner_commission_percent: order.partner_id.and(commission_percent),
            payment_method: order.payment_method.clone(),
            total: order.total,
            lines: lines
                .iter()
                .filter(|l| !l.is_composition_parent)
                .map(|l| SaleDocumentLine {
                    order_line_id: l.id,
                    item_id: l.item_id,
                    description: l.description.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    subtotal: l.subtotal,
                })
                .collect(),
        };

        let mut report = SideEffectReport::new();
        match self.financial.post_sale(tenant_id, &document).await {
            Ok(financials) => {
                report.ok(SideEffectStep::Invoice, Some(financials.invoice_id));
                report.ok(SideEffectStep::Receivable, Some(financials.receivable_id));
                for payment_id in financials.payment_ids {
                    report.ok(SideEffectStep::Payment, Some(payment_id));
                }
                if let Some(earning_id) = financials.partner_earning_id {
                    report.ok(SideEffectStep::PartnerEarning, Some(earning_id));
                }
            }
            Err(e) => {
                warn!(%tenant_id, order_id = %order.id, error = %e, "financial posting failed");
                report.failed(SideEffectStep::Invoice, e.to_string());
            }
        }
        report
    }

    async fn start_workflows(
        &self,
        tenant_id: TenantId,
        lines: &mut [OrderLine],
    ) -> SideEffectReport {
        let mut report = SideEffectReport::new();
        for line in lines.iter_mut() {
            if line.is_composition_parent
                || line.kind != ItemKind::Service
                || !line.requires_scheduling
            {
                continue;
            }
            let Some(service_type_id) = line.service_type_id else {
                continue;
            };
            match self
                .workflow
                .create_process_instance(tenant_id, service_type_id, line.id)
                .await
            {
                Ok(instance_id) => {
                    line.process_instance_id = Some(instance_id);
                    if let Err(e) = self
                        .store
                        .update(
                            collections::ORDER_LINES,
                            line.id,
                            json!({ "process_instance_id": instance_id }),
                        )
                        .await
                    {
                        warn!(
                            %tenant_id,
                            line_id = %line.id,
                            error = %e,
                            "failed to link process instance"
                        );
                        report.failed(SideEffectStep::ProcessInstance, e.to_string());
                        continue;
                    }
                    report.ok(SideEffectStep::ProcessInstance, Some(instance_id));
                }
                Err(e) => {
                    warn!(
                        %tenant_id,
                        line_id = %line.id,
                        error = %e,
                        "process instantiation failed"
                    );
                    report.failed(SideEffectStep::ProcessInstance, e.to_string());
                }
            }
        }
        report
    }
}
