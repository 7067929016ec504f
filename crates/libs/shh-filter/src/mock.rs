use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::ShhError;
use crate::gateway::RpcGateway;

enum Scripted {
    Ready(Result<JsonValue, ShhError>),
    Gated(oneshot::Receiver<Result<JsonValue, ShhError>>),
}

/// Gateway answering from scripted queues. A queue keyed by method and exact
/// params wins over the per-method queue; with both empty the method answers
/// with its default (or `null`).
#[derive(Default)]
pub(crate) struct ScriptedGateway {
    queues: Mutex<HashMap<String, VecDeque<Scripted>>>,
    defaults: Mutex<HashMap<String, JsonValue>>,
    calls: Mutex<Vec<(String, Vec<JsonValue>)>>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_default(self, method: &str, value: JsonValue) -> Self {
        self.defaults.lock().expect("defaults mutex poisoned").insert(method.to_owned(), value);
        self
    }

    pub(crate) fn push(&self, method: &str, result: Result<JsonValue, ShhError>) {
        self.queues
            .lock()
            .expect("queues mutex poisoned")
            .entry(method.to_owned())
            .or_default()
            .push_back(Scripted::Ready(result));
    }

    /// Queues a response for one exact param list only.
    pub(crate) fn push_for(
        &self,
        method: &str,
        params: Vec<JsonValue>,
        result: Result<JsonValue, ShhError>,
    ) {
        self.queues
            .lock()
            .expect("queues mutex poisoned")
            .entry(keyed(method, &params))
            .or_default()
            .push_back(Scripted::Ready(result));
    }

    /// Queues a response that is held back until the returned sender fires.
    pub(crate) fn push_gated(&self, method: &str) -> oneshot::Sender<Result<JsonValue, ShhError>> {
        let (tx, rx) = oneshot::channel();
        self.queues
            .lock()
            .expect("queues mutex poisoned")
            .entry(method.to_owned())
            .or_default()
            .push_back(Scripted::Gated(rx));
        tx
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<JsonValue>)> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    pub(crate) fn calls_to(&self, method: &str) -> Vec<Vec<JsonValue>> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name == method)
            .map(|(_, params)| params)
            .collect()
    }

    pub(crate) async fn wait_for_calls(&self, method: &str, count: usize) {
        while self.calls_to(method).len() < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

#[async_trait]
impl RpcGateway for ScriptedGateway {
    async fn call(&self, method: &str, params: Vec<JsonValue>) -> Result<JsonValue, ShhError> {
        let key = keyed(method, &params);
        self.calls.lock().expect("calls mutex poisoned").push((method.to_owned(), params));
        let scripted = {
            let mut queues = self.queues.lock().expect("queues mutex poisoned");
            match queues.get_mut(&key).and_then(VecDeque::pop_front) {
                Some(scripted) => Some(scripted),
                None => queues.get_mut(method).and_then(VecDeque::pop_front),
            }
        };
        match scripted {
            Some(Scripted::Ready(result)) => result,
            Some(Scripted::Gated(rx)) => rx.await.unwrap_or_else(|_| {
                Err(ShhError::transport(format!("gated response for {method} dropped")))
            }),
            None => Ok(self
                .defaults
                .lock()
                .expect("defaults mutex poisoned")
                .get(method)
                .cloned()
                .unwrap_or(JsonValue::Null)),
        }
    }
}

fn keyed(method: &str, params: &[JsonValue]) -> String {
    format!("{method}:{}", JsonValue::Array(params.to_vec()))
}
