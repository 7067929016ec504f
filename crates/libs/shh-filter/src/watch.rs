use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::ShhError;

/// Remote call names implementing the install/poll/uninstall lifecycle of one
/// subscription category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchDescriptor {
    pub install: &'static str,
    pub poll: &'static str,
    pub uninstall: &'static str,
}

impl WatchDescriptor {
    /// Whisper message filters.
    pub const SHH: Self = Self {
        install: "shh_newMessageFilter",
        poll: "shh_getFilterMessages",
        uninstall: "shh_deleteMessageFilter",
    };
}

/// Node-assigned handle of an installed watch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct FilterId(pub String);

impl FilterId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub(crate) fn from_response(value: &JsonValue) -> Result<Self, ShhError> {
        match value.as_str() {
            Some(id) if !id.is_empty() => Ok(Self(id.to_owned())),
            _ => Err(ShhError::invalid_response(format!("expected filter id string, got {value}"))),
        }
    }

    pub(crate) fn to_param(&self) -> JsonValue {
        JsonValue::String(self.0.clone())
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FilterId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
