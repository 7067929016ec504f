use serde_json::Value as JsonValue;

use crate::error::ShhError;

/// Stateless calls exposed by the node, with their wire names and arity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ShhMethod {
    Version,
    Info,
    SetMaxMessageSize,
    SetMinPoW,
    MarkTrustedPeer,
    NewKeyPair,
    AddPrivateKey,
    DeleteKeyPair,
    HasKeyPair,
    GetPublicKey,
    GetPrivateKey,
    NewSymKey,
    AddSymKey,
    GenerateSymKeyFromPassword,
    HasSymKey,
    GetSymKey,
    DeleteSymKey,
    Post,
    ExtPost,
    RequestMessages,
    ConfirmMessagesProcessed,
    SendDirectMessage,
    SendPairingMessage,
    SendPublicMessage,
    SendGroupMessage,
    JoinPublicChats,
    LeavePublicChats,
}

impl ShhMethod {
    pub const ALL: [Self; 27] = [
        Self::Version,
        Self::Info,
        Self::SetMaxMessageSize,
        Self::SetMinPoW,
        Self::MarkTrustedPeer,
        Self::NewKeyPair,
        Self::AddPrivateKey,
        Self::DeleteKeyPair,
        Self::HasKeyPair,
        Self::GetPublicKey,
        Self::GetPrivateKey,
        Self::NewSymKey,
        Self::AddSymKey,
        Self::GenerateSymKeyFromPassword,
        Self::HasSymKey,
        Self::GetSymKey,
        Self::DeleteSymKey,
        Self::Post,
        Self::ExtPost,
        Self::RequestMessages,
        Self::ConfirmMessagesProcessed,
        Self::SendDirectMessage,
        Self::SendPairingMessage,
        Self::SendPublicMessage,
        Self::SendGroupMessage,
        Self::JoinPublicChats,
        Self::LeavePublicChats,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Info => "info",
            Self::SetMaxMessageSize => "setMaxMessageSize",
            Self::SetMinPoW => "setMinPoW",
            Self::MarkTrustedPeer => "markTrustedPeer",
            Self::NewKeyPair => "newKeyPair",
            Self::AddPrivateKey => "addPrivateKey",
            Self::DeleteKeyPair => "deleteKeyPair",
            Self::HasKeyPair => "hasKeyPair",
            Self::GetPublicKey => "getPublicKey",
            Self::GetPrivateKey => "getPrivateKey",
            Self::NewSymKey => "newSymKey",
            Self::AddSymKey => "addSymKey",
            Self::GenerateSymKeyFromPassword => "generateSymKeyFromPassword",
            Self::HasSymKey => "hasSymKey",
            Self::GetSymKey => "getSymKey",
            Self::DeleteSymKey => "deleteSymKey",
            Self::Post => "post",
            Self::ExtPost => "extPost",
            Self::RequestMessages => "requestMessages",
            Self::ConfirmMessagesProcessed => "confirmMessagesProcessed",
            Self::SendDirectMessage => "sendDirectMessage",
            Self::SendPairingMessage => "sendPairingMessage",
            Self::SendPublicMessage => "sendPublicMessage",
            Self::SendGroupMessage => "sendGroupMessage",
            Self::JoinPublicChats => "joinPublicChats",
            Self::LeavePublicChats => "leavePublicChats",
        }
    }

    /// Remote call name as sent on the wire.
    pub fn call(self) -> &'static str {
        match self {
            Self::Version => "shh_version",
            Self::Info => "shh_info",
            Self::SetMaxMessageSize => "shh_setMaxMessageSize",
            Self::SetMinPoW => "shh_setMinPoW",
            Self::MarkTrustedPeer => "shh_markTrustedPeer",
            Self::NewKeyPair => "shh_newKeyPair",
            Self::AddPrivateKey => "shh_addPrivateKey",
            Self::DeleteKeyPair => "shh_deleteKeyPair",
            Self::HasKeyPair => "shh_hasKeyPair",
            Self::GetPublicKey => "shh_getPublicKey",
            Self::GetPrivateKey => "shh_getPrivateKey",
            Self::NewSymKey => "shh_newSymKey",
            Self::AddSymKey => "shh_addSymKey",
            Self::GenerateSymKeyFromPassword => "shh_generateSymKeyFromPassword",
            Self::HasSymKey => "shh_hasSymKey",
            Self::GetSymKey => "shh_getSymKey",
            Self::DeleteSymKey => "shh_deleteSymKey",
            Self::Post => "shh_post",
            Self::ExtPost => "shhext_post",
            Self::RequestMessages => "shhext_requestMessages",
            Self::ConfirmMessagesProcessed => "shhext_confirmMessagesProcessed",
            Self::SendDirectMessage => "shhext_sendDirectMessage",
            Self::SendPairingMessage => "shhext_sendPairingMessage",
            Self::SendPublicMessage => "shhext_sendPublicMessage",
            Self::SendGroupMessage => "shhext_sendGroupMessage",
            Self::JoinPublicChats => "shhext_joinPublicChats",
            Self::LeavePublicChats => "shhext_leavePublicChats",
        }
    }

    /// Number of positional params the node expects.
    pub fn params(self) -> usize {
        match self {
            Self::Version | Self::Info | Self::NewKeyPair | Self::NewSymKey => 0,
            _ => 1,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name || method.call() == name)
    }

    pub fn validate_params(self, params: &[JsonValue]) -> Result<(), ShhError> {
        if params.len() == self.params() {
            return Ok(());
        }
        Err(ShhError::invalid_params(format!(
            "{} expects {} param(s), got {}",
            self.call(),
            self.params(),
            params.len()
        )))
    }
}
