//! Field/operator/value filter triples.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use fulcrum_core::{RecordId, TenantId};

/// Comparison operator applied to a record field.
///
/// `Gt`/`Gte`/`Lt`/`Lte` compare JSON numbers only; decimal-typed fields are
/// persisted as strings and are matched by equality.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

/// A single filter predicate: `field <op> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: JsonValue,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<JsonValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::new(field, FilterOp::Ne, value)
    }

    /// Membership filter: field value must appear in `values`.
    pub fn is_in(field: impl Into<String>, values: Vec<JsonValue>) -> Self {
        Self::new(field, FilterOp::In, JsonValue::Array(values))
    }

    /// Tenant scope filter. Every list issued by the engine must include one.
    pub fn tenant(tenant_id: TenantId) -> Self {
        Self::eq("tenant_id", tenant_id.to_string())
    }

    /// Match a single record by its store-issued id.
    pub fn id_eq(id: RecordId) -> Self {
        Self::eq("id", id.to_string())
    }

    /// Match records whose id appears in `ids` (batch resolution).
    pub fn id_in(ids: &[RecordId]) -> Self {
        Self::is_in(
            "id",
            ids.iter().map(|id| JsonValue::String(id.to_string())).collect(),
        )
    }

    /// Match records referencing another record through a foreign-key field.
    pub fn ref_eq(field: impl Into<String>, id: RecordId) -> Self {
        Self::eq(field, id.to_string())
    }

    /// Whether a record's fields satisfy this predicate.
    pub fn matches(&self, fields: &JsonValue) -> bool {
        let actual = fields.get(&self.field).unwrap_or(&JsonValue::Null);
        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::Ne => actual != &self.value,
            FilterOp::In => match &self.value {
                JsonValue::Array(candidates) => candidates.contains(actual),
                _ => false,
            },
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                let (Some(a), Some(b)) = (actual.as_f64(), self.value.as_f64()) else {
                    return false;
                };
                match self.op {
                    FilterOp::Gt => a > b,
                    FilterOp::Gte => a >= b,
                    FilterOp::Lt => a < b,
                    FilterOp::Lte => a <= b,
                    _ => unreachable!(),
                }
            }
        }
    }
}
