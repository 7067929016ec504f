use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ShhError;

/// Criteria for `shh_newMessageFilter`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct MessageFilterOptions {
    #[serde(rename = "symKeyID", default, skip_serializing_if = "Option::is_none")]
    pub sym_key_id: Option<String>,
    #[serde(rename = "privateKeyID", default, skip_serializing_if = "Option::is_none")]
    pub private_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_pow: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(rename = "allowP2P", default, skip_serializing_if = "Option::is_none")]
    pub allow_p2p: Option<bool>,
}

impl MessageFilterOptions {
    pub fn symmetric(sym_key_id: impl Into<String>) -> Self {
        Self { sym_key_id: Some(sym_key_id.into()), ..Self::default() }
    }

    pub fn asymmetric(private_key_id: impl Into<String>) -> Self {
        Self { private_key_id: Some(private_key_id.into()), ..Self::default() }
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sig(mut self, sig: impl Into<String>) -> Self {
        self.sig = Some(sig.into());
        self
    }

    pub fn with_min_pow(mut self, min_pow: f64) -> Self {
        self.min_pow = Some(min_pow);
        self
    }

    pub fn with_allow_p2p(mut self, allow_p2p: bool) -> Self {
        self.allow_p2p = Some(allow_p2p);
        self
    }

    pub fn validate(&self) -> Result<(), ShhError> {
        match (&self.sym_key_id, &self.private_key_id) {
            (Some(_), Some(_)) => Err(ShhError::invalid_params(
                "symKeyID and privateKeyID are mutually exclusive",
            )),
            (None, None) => {
                Err(ShhError::invalid_params("either symKeyID or privateKeyID must be set"))
            }
            _ => Ok(()),
        }?;
        if let Some(min_pow) = self.min_pow {
            if !min_pow.is_finite() || min_pow < 0.0 {
                return Err(ShhError::invalid_params("minPow must be a non-negative number"));
            }
        }
        Ok(())
    }

    pub fn to_criteria(&self) -> Result<JsonValue, ShhError> {
        self.validate()?;
        serde_json::to_value(self).map_err(|err| ShhError::invalid_params(err.to_string()))
    }
}
