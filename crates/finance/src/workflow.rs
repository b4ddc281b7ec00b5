//! Workflow/process collaborator.

use std::sync::Mutex;

use async_trait::async_trait;

use fulcrum_core::{EngineError, EngineResult, RecordId, TenantId};

/// Optional process-template service: a scheduled service line tied to a
/// configured service type gets a process instance. Linking failures are
/// non-fatal.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    async fn create_process_instance(
        &self,
        tenant_id: TenantId,
        service_type_id: RecordId,
        order_line_id: RecordId,
    ) -> EngineResult<RecordId>;
}

/// Workflow double that never creates anything (no templates configured).
#[derive(Debug, Default)]
pub struct NoopWorkflow;

#[async_trait]
impl WorkflowService for NoopWorkflow {
    async fn create_process_instance(
        &self,
        _tenant_id: TenantId,
        _service_type_id: RecordId,
        _order_line_id: RecordId,
    ) -> EngineResult<RecordId> {
        Ok(RecordId::new())
    }
}

/// Workflow double that remembers every instantiation request.
#[derive(Debug, Default)]
pub struct RecordingWorkflow {
    pub instances: Mutex<Vec<(TenantId, RecordId, RecordId)>>,
}

impl RecordingWorkflow {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowService for RecordingWorkflow {
    async fn create_process_instance(
        &self,
        tenant_id: TenantId,
        service_type_id: RecordId,
        order_line_id: RecordId,
    ) -> EngineResult<RecordId> {
        self.instances
            .lock()
            .map_err(|_| EngineError::store("recording workflow poisoned"))?
            .push((tenant_id, service_type_id, order_line_id));
        Ok(RecordId::new())
    }
}
