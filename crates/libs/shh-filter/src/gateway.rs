use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::ShhError;

/// Executes a named remote call with positional params.
///
/// Implementations must be safe for concurrent, independent calls: every
/// [`Filter`](crate::Filter) polls through the same shared gateway. Exactly one
/// of result or error is produced per call.
#[async_trait]
pub trait RpcGateway: Send + Sync {
    async fn call(&self, method: &str, params: Vec<JsonValue>) -> Result<JsonValue, ShhError>;
}
