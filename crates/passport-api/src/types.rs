//! Request and response envelopes for the RPC endpoint.
//!
//! Every call is `POST /rpc/{procedure}` with a `{"input": ...}` body. A
//! successful answer wraps its payload as `{"result": {"data": ...}}`; a
//! failed one carries `{"error": {"code": ..., "message": ...}}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use passport_core::CatalogEntityKind;

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a, I> {
    pub input: &'a I,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcSuccess<T> {
    pub result: RpcResult<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResult<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcFailure {
    pub error: RpcErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorBody {
    #[serde(default)]
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct NoInput {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobInput {
    pub job_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobPageInput {
    pub job_id: Uuid,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct KindInput {
    pub kind: CatalogEntityKind,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateEntityInput<'a> {
    pub kind: CatalogEntityKind,
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnsureCategoryInput<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MapUnmappedInput<'a> {
    pub job_id: Uuid,
    pub source_column: &'a str,
    pub raw_value: &'a str,
    pub entity_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DefineUnmappedInput<'a> {
    pub job_id: Uuid,
    pub entities: &'a [PendingEntity],
}

/// A catalog entity to create for an unmapped value during commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntity {
    pub source_column: String,
    pub raw_value: String,
    /// Name the new entity is created under.
    pub name: String,
}

/// An unmapped value the service defined during a batch create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinedValue {
    pub source_column: String,
    pub raw_value: String,
    pub entity_id: String,
}
