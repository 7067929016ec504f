use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use crate::chat::{self, ChatFilter};
use crate::config::ShhConfig;
use crate::error::ShhError;
use crate::filter::{Filter, FilterContext, FilterHandlers};
use crate::gateway::RpcGateway;
use crate::method::ShhMethod;
use crate::transport::HttpGateway;
use crate::types::MessageFilterOptions;
use crate::watch::WatchDescriptor;

/// Client for a node's `shh` namespace: plain calls, message filters and
/// public chat subscriptions sharing one gateway.
#[derive(Clone, Debug)]
pub struct Shh {
    ctx: FilterContext,
}

impl Shh {
    /// Must be called inside a tokio runtime.
    pub fn new(gateway: Arc<dyn RpcGateway>, config: &ShhConfig) -> Result<Self, ShhError> {
        config.validate()?;
        let ctx = FilterContext::new(gateway, WatchDescriptor::SHH, config.poll_interval())?;
        Ok(Self { ctx })
    }

    pub fn connect(config: &ShhConfig) -> Result<Self, ShhError> {
        Self::new(Arc::new(HttpGateway::from_config(config)?), config)
    }

    pub fn from_context(ctx: FilterContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &FilterContext {
        &self.ctx
    }

    /// Issues `method` after checking its arity.
    pub async fn call(
        &self,
        method: ShhMethod,
        params: Vec<JsonValue>,
    ) -> Result<JsonValue, ShhError> {
        method.validate_params(&params)?;
        self.ctx.gateway().call(method.call(), params).await
    }

    async fn call_as<T: DeserializeOwned>(
        &self,
        method: ShhMethod,
        params: Vec<JsonValue>,
    ) -> Result<T, ShhError> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value).map_err(|err| {
            ShhError::invalid_response(format!("{}: {err}", method.call()))
        })
    }

    pub async fn version(&self) -> Result<String, ShhError> {
        self.call_as(ShhMethod::Version, Vec::new()).await
    }

    pub async fn info(&self) -> Result<JsonValue, ShhError> {
        self.call(ShhMethod::Info, Vec::new()).await
    }

    pub async fn set_max_message_size(&self, size: u64) -> Result<bool, ShhError> {
        self.call_as(ShhMethod::SetMaxMessageSize, vec![json!(size)]).await
    }

    pub async fn set_min_pow(&self, pow: f64) -> Result<bool, ShhError> {
        if !pow.is_finite() || pow < 0.0 {
            return Err(ShhError::invalid_params("pow must be a non-negative number"));
        }
        self.call_as(ShhMethod::SetMinPoW, vec![json!(pow)]).await
    }

    pub async fn mark_trusted_peer(&self, enode: &str) -> Result<bool, ShhError> {
        self.call_as(ShhMethod::MarkTrustedPeer, vec![json!(enode)]).await
    }

    pub async fn new_key_pair(&self) -> Result<String, ShhError> {
        self.call_as(ShhMethod::NewKeyPair, Vec::new()).await
    }

    pub async fn add_private_key(&self, private_key: &str) -> Result<String, ShhError> {
        self.call_as(ShhMethod::AddPrivateKey, vec![json!(private_key)]).await
    }

    pub async fn delete_key_pair(&self, key_id: &str) -> Result<bool, ShhError> {
        self.call_as(ShhMethod::DeleteKeyPair, vec![json!(key_id)]).await
    }

    pub async fn has_key_pair(&self, key_id: &str) -> Result<bool, ShhError> {
        self.call_as(ShhMethod::HasKeyPair, vec![json!(key_id)]).await
    }

    pub async fn get_public_key(&self, key_id: &str) -> Result<String, ShhError> {
        self.call_as(ShhMethod::GetPublicKey, vec![json!(key_id)]).await
    }

    pub async fn get_private_key(&self, key_id: &str) -> Result<String, ShhError> {
        self.call_as(ShhMethod::GetPrivateKey, vec![json!(key_id)]).await
    }

    pub async fn new_sym_key(&self) -> Result<String, ShhError> {
        self.call_as(ShhMethod::NewSymKey, Vec::new()).await
    }

    pub async fn add_sym_key(&self, raw_key: &str) -> Result<String, ShhError> {
        self.call_as(ShhMethod::AddSymKey, vec![json!(raw_key)]).await
    }

    pub async fn generate_sym_key_from_password(&self, password: &str) -> Result<String, ShhError> {
        self.call_as(ShhMethod::GenerateSymKeyFromPassword, vec![json!(password)]).await
    }

    pub async fn has_sym_key(&self, key_id: &str) -> Result<bool, ShhError> {
        self.call_as(ShhMethod::HasSymKey, vec![json!(key_id)]).await
    }

    pub async fn get_sym_key(&self, key_id: &str) -> Result<String, ShhError> {
        self.call_as(ShhMethod::GetSymKey, vec![json!(key_id)]).await
    }

    pub async fn delete_sym_key(&self, key_id: &str) -> Result<bool, ShhError> {
        self.call_as(ShhMethod::DeleteSymKey, vec![json!(key_id)]).await
    }

    /// Posts an envelope. The message object is passed through untouched.
    pub async fn post(&self, message: JsonValue) -> Result<JsonValue, ShhError> {
        self.call(ShhMethod::Post, vec![message]).await
    }

    /// Starts a message filter. Invalid options fail here without any remote
    /// call; node-side failures surface through the returned filter.
    pub fn new_message_filter(
        &self,
        options: &MessageFilterOptions,
        handlers: FilterHandlers,
    ) -> Result<Filter, ShhError> {
        let criteria = options.to_criteria()?;
        Ok(Filter::install(&self.ctx, criteria, handlers))
    }

    pub async fn join_public_chats<I, S>(
        &self,
        chats: I,
        handlers: FilterHandlers,
    ) -> Result<Vec<ChatFilter>, ShhError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        chat::join_public_chats(&self.ctx, chats, handlers).await
    }

    pub async fn leave_public_chats(&self, filters: &[ChatFilter]) -> Result<(), ShhError> {
        chat::leave_public_chats(&self.ctx, filters).await
    }
}
