//! Batched public chat subscriptions.
//!
//! One `shhext_joinPublicChats` round-trip yields one filter id per chat, in
//! request order; each id becomes a bound [`Filter`]. Leaving stops every
//! filter locally first and then issues one `shhext_leavePublicChats`.
//!
//! A failed leave is not rolled back: local polling is already stopped, and
//! the node may keep the chats joined until a later leave succeeds.

use log::{debug, warn};
use serde_json::{json, Value as JsonValue};

use crate::error::ShhError;
use crate::filter::{Filter, FilterContext, FilterHandlers};
use crate::method::ShhMethod;
use crate::watch::FilterId;

/// A joined chat and the filter polling it.
#[derive(Clone, Debug)]
pub struct ChatFilter {
    chat: String,
    filter: Filter,
}

impl ChatFilter {
    pub fn chat(&self) -> &str {
        self.chat.as_str()
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn into_filter(self) -> Filter {
        self.filter
    }
}

/// Joins `chats` in one call and returns one active filter per chat, in order.
///
/// All-or-nothing: a remote error or a response that is not exactly one id
/// per chat yields no filters. The failure is returned and also passed to the
/// handlers' `on_install_error`.
pub async fn join_public_chats<I, S>(
    ctx: &FilterContext,
    chats: I,
    handlers: FilterHandlers,
) -> Result<Vec<ChatFilter>, ShhError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let chats = chats.into_iter().map(Into::into).collect::<Vec<String>>();
    let method = ShhMethod::JoinPublicChats;
    let result = ctx
        .gateway()
        .call(method.call(), vec![chats_param(&chats)])
        .await
        .and_then(|response| parse_filter_ids(&response, chats.len()));

    let filter_ids = match result {
        Ok(filter_ids) => filter_ids,
        Err(err) => {
            let err = ShhError::join_failed(err);
            warn!("{}: {err}", method.call());
            handlers.notify_install_error(&err);
            return Err(err);
        }
    };

    debug!("joined {} public chat(s)", chats.len());
    Ok(chats
        .into_iter()
        .zip(filter_ids)
        .map(|(chat, filter_id)| ChatFilter {
            filter: Filter::bind_chat(ctx, filter_id, Some(chat.clone()), handlers.clone()),
            chat,
        })
        .collect())
}

/// Stops every filter, then leaves their chats in one call.
pub async fn leave_public_chats(
    ctx: &FilterContext,
    filters: &[ChatFilter],
) -> Result<(), ShhError> {
    let chats = filters
        .iter()
        .map(|chat_filter| {
            chat_filter.filter.stop_watching();
            chat_filter.chat.clone()
        })
        .collect::<Vec<_>>();

    let method = ShhMethod::LeavePublicChats;
    match ctx.gateway().call(method.call(), vec![chats_param(&chats)]).await {
        Ok(_) => {
            debug!("left {} public chat(s)", chats.len());
            Ok(())
        }
        Err(err) => {
            let err = ShhError::leave_failed(err);
            warn!("{}: {err}", method.call());
            Err(err)
        }
    }
}

fn chats_param(chats: &[String]) -> JsonValue {
    json!({ "chats": chats })
}

fn parse_filter_ids(response: &JsonValue, expected: usize) -> Result<Vec<FilterId>, ShhError> {
    let JsonValue::Array(values) = response else {
        return Err(ShhError::invalid_response(format!(
            "expected an array of filter ids, got {response}"
        )));
    };
    if values.len() != expected {
        return Err(ShhError::invalid_response(format!(
            "expected {expected} filter id(s), got {}",
            values.len()
        )));
    }
    values.iter().map(FilterId::from_response).collect()
}
