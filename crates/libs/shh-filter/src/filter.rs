//! Single-watch message filters.
//!
//! A [`Filter`] owns one remote watch. It is either installed from criteria
//! (`Installing -> Active`) or bound to an identifier the node already handed
//! out (born `Active`). While `Active` a background task polls the watch on a
//! fixed interval and hands every item to the registered consumer, in response
//! order. [`Filter::stop_watching`] is the only caller-driven transition and is
//! terminal.
//!
//! Polling holds only a weak reference to the filter: dropping the last handle
//! behaves like `stop_watching`.

use log::{debug, warn};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::ShhError;
use crate::gateway::RpcGateway;
use crate::watch::{FilterId, WatchDescriptor};

pub type Consumer = Arc<dyn Fn(JsonValue) + Send + Sync>;
pub type ChatConsumer = Arc<dyn Fn(&str, JsonValue) + Send + Sync>;
pub type ResultTransform = Arc<dyn Fn(JsonValue) -> JsonValue + Send + Sync>;
pub type InstallErrorConsumer = Arc<dyn Fn(ShhError) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterState {
    Installing,
    Active,
    Stopped,
}

/// Callbacks attached to a filter.
///
/// All of them are optional. A filter without `on_install_error` still reports
/// install failures through [`Filter::installed`]. `on_chat_message` only fires
/// for filters created by a public chat join.
#[derive(Clone, Default)]
pub struct FilterHandlers {
    consumer: Option<Consumer>,
    chat_consumer: Option<ChatConsumer>,
    transform: Option<ResultTransform>,
    on_install_error: Option<InstallErrorConsumer>,
}

impl FilterHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_message(mut self, consumer: impl Fn(JsonValue) + Send + Sync + 'static) -> Self {
        self.consumer = Some(Arc::new(consumer));
        self
    }

    pub fn on_chat_message(
        mut self,
        consumer: impl Fn(&str, JsonValue) + Send + Sync + 'static,
    ) -> Self {
        self.chat_consumer = Some(Arc::new(consumer));
        self
    }

    pub fn with_transform(
        mut self,
        transform: impl Fn(JsonValue) -> JsonValue + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn on_install_error(mut self, consumer: impl Fn(ShhError) + Send + Sync + 'static) -> Self {
        self.on_install_error = Some(Arc::new(consumer));
        self
    }

    pub(crate) fn notify_install_error(&self, err: &ShhError) {
        if let Some(callback) = &self.on_install_error {
            callback(err.clone());
        }
    }

    fn apply_transform(&self, item: JsonValue) -> JsonValue {
        match &self.transform {
            Some(transform) => transform(item),
            None => item,
        }
    }

    fn dispatch(&self, chat: Option<&str>, item: JsonValue) {
        match (&self.consumer, &self.chat_consumer, chat) {
            (Some(consumer), Some(chat_consumer), Some(chat)) => {
                chat_consumer(chat, item.clone());
                consumer(item);
            }
            (None, Some(chat_consumer), Some(chat)) => chat_consumer(chat, item),
            (Some(consumer), _, _) => consumer(item),
            _ => {}
        }
    }
}

impl fmt::Debug for FilterHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterHandlers")
            .field("consumer", &self.consumer.is_some())
            .field("chat_consumer", &self.chat_consumer.is_some())
            .field("transform", &self.transform.is_some())
            .field("on_install_error", &self.on_install_error.is_some())
            .finish()
    }
}

/// Everything a filter needs to talk to the node and schedule its polling.
#[derive(Clone)]
pub struct FilterContext {
    gateway: Arc<dyn RpcGateway>,
    watch: WatchDescriptor,
    poll_interval: Duration,
    runtime: Handle,
}

impl FilterContext {
    /// Captures the current tokio runtime; fails outside of one.
    pub fn new(
        gateway: Arc<dyn RpcGateway>,
        watch: WatchDescriptor,
        poll_interval: Duration,
    ) -> Result<Self, ShhError> {
        let runtime = Handle::try_current()
            .map_err(|err| ShhError::Runtime { message: err.to_string() })?;
        Ok(Self::with_runtime(gateway, watch, poll_interval, runtime))
    }

    pub fn with_runtime(
        gateway: Arc<dyn RpcGateway>,
        watch: WatchDescriptor,
        poll_interval: Duration,
        runtime: Handle,
    ) -> Self {
        Self { gateway, watch, poll_interval, runtime }
    }

    pub fn gateway(&self) -> &Arc<dyn RpcGateway> {
        &self.gateway
    }

    pub fn watch(&self) -> WatchDescriptor {
        self.watch
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn spawn_uninstall(&self, id: FilterId) {
        let gateway = Arc::clone(&self.gateway);
        let watch = self.watch;
        self.runtime.spawn(async move { uninstall(gateway.as_ref(), watch, &id).await });
    }
}

impl fmt::Debug for FilterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterContext")
            .field("watch", &self.watch)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

struct Slot {
    state: FilterState,
    filter_id: Option<FilterId>,
}

type InstallOutcome = Option<Result<FilterId, ShhError>>;

struct Inner {
    ctx: FilterContext,
    chat: Option<String>,
    owns_remote_watch: bool,
    handlers: FilterHandlers,
    slot: Mutex<Slot>,
    cancel: CancellationToken,
    outcome: watch::Sender<InstallOutcome>,
}

/// Handle to one polling subscription. Clones share the same filter.
#[derive(Clone)]
pub struct Filter {
    inner: Arc<Inner>,
}

impl Filter {
    /// Installs a new watch from `criteria` and starts polling once the node
    /// returns its identifier.
    ///
    /// Returns immediately in `Installing`. Install failures go to
    /// `on_install_error` (if set) and to [`Filter::installed`].
    pub fn install(ctx: &FilterContext, criteria: JsonValue, handlers: FilterHandlers) -> Self {
        let filter = Self::new(ctx.clone(), None, true, handlers, FilterState::Installing, None);
        let inner = Arc::clone(&filter.inner);
        ctx.runtime.spawn(run_install(inner, criteria));
        filter
    }

    /// Binds to an identifier the node already created and starts polling
    /// immediately.
    ///
    /// The remote watch is not owned by the filter: `stop_watching` only halts
    /// local polling, and whoever created the identifier tears it down.
    pub fn bind(ctx: &FilterContext, filter_id: FilterId, handlers: FilterHandlers) -> Self {
        Self::bind_chat(ctx, filter_id, None, handlers)
    }

    pub(crate) fn bind_chat(
        ctx: &FilterContext,
        filter_id: FilterId,
        chat: Option<String>,
        handlers: FilterHandlers,
    ) -> Self {
        let filter =
            Self::new(ctx.clone(), chat, false, handlers, FilterState::Active, Some(filter_id));
        let weak = Arc::downgrade(&filter.inner);
        let cancel = filter.inner.cancel.clone();
        ctx.runtime.spawn(poll_loop(weak, cancel, ctx.poll_interval));
        filter
    }

    fn new(
        ctx: FilterContext,
        chat: Option<String>,
        owns_remote_watch: bool,
        handlers: FilterHandlers,
        state: FilterState,
        filter_id: Option<FilterId>,
    ) -> Self {
        let (outcome, _) = watch::channel(filter_id.clone().map(Ok));
        Self {
            inner: Arc::new(Inner {
                ctx,
                chat,
                owns_remote_watch,
                handlers,
                slot: Mutex::new(Slot { state, filter_id }),
                cancel: CancellationToken::new(),
                outcome,
            }),
        }
    }

    pub fn state(&self) -> FilterState {
        self.inner.slot.lock().expect("filter slot mutex poisoned").state
    }

    pub fn filter_id(&self) -> Option<FilterId> {
        self.inner.slot.lock().expect("filter slot mutex poisoned").filter_id.clone()
    }

    /// Public chat this filter was joined for, if any.
    pub fn chat(&self) -> Option<&str> {
        self.inner.chat.as_deref()
    }

    /// Waits for the install round-trip to resolve.
    pub async fn installed(&self) -> Result<FilterId, ShhError> {
        let mut rx = self.inner.outcome.subscribe();
        let outcome = {
            let resolved = rx.wait_for(Option::is_some).await.map_err(|_| ShhError::Runtime {
                message: "install outcome channel closed".to_owned(),
            })?;
            resolved.clone()
        };
        outcome.unwrap_or(Err(ShhError::Stopped))
    }

    /// One-shot fetch of pending items through the poll call. Items are
    /// transformed but not handed to the consumer.
    pub async fn get(&self) -> Result<Vec<JsonValue>, ShhError> {
        let id = self.installed().await?;
        if self.state() == FilterState::Stopped {
            return Err(ShhError::Stopped);
        }
        let items = self.inner.fetch(&id).await?;
        Ok(items.into_iter().map(|item| self.inner.handlers.apply_transform(item)).collect())
    }

    /// Stops polling. Idempotent.
    ///
    /// An installed filter also removes its remote watch, exactly once. When
    /// called mid-install the watch is removed as soon as the node returns the
    /// identifier, and polling never starts.
    ///
    /// On a multi-threaded runtime an item whose delivery already passed the
    /// state check may still reach the consumer after this returns. The check
    /// is not held across the consumer call so that consumers may stop their
    /// own filter.
    pub fn stop_watching(&self) {
        self.inner.stop();
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.inner.slot.lock().expect("filter slot mutex poisoned");
        f.debug_struct("Filter")
            .field("chat", &self.inner.chat)
            .field("state", &slot.state)
            .field("filter_id", &slot.filter_id)
            .finish()
    }
}

impl Inner {
    fn stop(&self) {
        let uninstall = {
            let mut slot = self.slot.lock().expect("filter slot mutex poisoned");
            let previous = slot.state;
            slot.state = FilterState::Stopped;
            match previous {
                FilterState::Stopped => return,
                FilterState::Installing => None,
                FilterState::Active if self.owns_remote_watch => slot.filter_id.clone(),
                FilterState::Active => None,
            }
        };
        self.cancel.cancel();
        debug!("filter {}: stopped watching", self.label());
        if let Some(id) = uninstall {
            self.ctx.spawn_uninstall(id);
        }
    }

    fn active_id(&self) -> Option<FilterId> {
        let slot = self.slot.lock().expect("filter slot mutex poisoned");
        match slot.state {
            FilterState::Active => slot.filter_id.clone(),
            _ => None,
        }
    }

    fn is_active(&self) -> bool {
        self.slot.lock().expect("filter slot mutex poisoned").state == FilterState::Active
    }

    fn label(&self) -> String {
        let slot = self.slot.lock().expect("filter slot mutex poisoned");
        match (&self.chat, &slot.filter_id) {
            (Some(chat), Some(id)) => format!("{id} ({chat})"),
            (None, Some(id)) => id.to_string(),
            (_, None) => "<installing>".to_owned(),
        }
    }

    async fn fetch(&self, id: &FilterId) -> Result<Vec<JsonValue>, ShhError> {
        let response = self.ctx.gateway.call(self.ctx.watch.poll, vec![id.to_param()]).await?;
        match response {
            JsonValue::Array(items) => Ok(items),
            other => Err(ShhError::invalid_response(format!(
                "{} returned {other} instead of an array",
                self.ctx.watch.poll
            ))),
        }
    }

    async fn poll_tick(&self) {
        let Some(id) = self.active_id() else {
            return;
        };
        match self.fetch(&id).await {
            Ok(items) => self.deliver(&id, items),
            Err(err) if self.is_active() => warn!("filter {id}: poll failed: {err}"),
            Err(_) => {}
        }
    }

    fn deliver(&self, id: &FilterId, items: Vec<JsonValue>) {
        if items.is_empty() {
            return;
        }
        debug!("filter {id}: {} new message(s)", items.len());
        for item in items {
            // stop_watching may land between two items of the same batch
            if !self.is_active() {
                debug!("filter {id}: discarding poll result after stop");
                return;
            }
            let item = self.handlers.apply_transform(item);
            self.handlers.dispatch(self.chat.as_deref(), item);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_install(inner: Arc<Inner>, criteria: JsonValue) {
    let watch = inner.ctx.watch;
    let result = inner
        .ctx
        .gateway
        .call(watch.install, vec![criteria])
        .await
        .and_then(|response| FilterId::from_response(&response));

    let id = match result {
        Ok(id) => id,
        Err(err) => {
            let err = ShhError::install_failed(err);
            inner.slot.lock().expect("filter slot mutex poisoned").state = FilterState::Stopped;
            inner.cancel.cancel();
            warn!("{}: {err}", watch.install);
            inner.handlers.notify_install_error(&err);
            inner.outcome.send_replace(Some(Err(err)));
            return;
        }
    };

    let activated = {
        let mut slot = inner.slot.lock().expect("filter slot mutex poisoned");
        slot.filter_id = Some(id.clone());
        if slot.state == FilterState::Installing {
            slot.state = FilterState::Active;
            true
        } else {
            false
        }
    };

    if !activated {
        debug!("filter {id}: stopped during install, removing remote watch");
        uninstall(inner.ctx.gateway.as_ref(), watch, &id).await;
        inner.outcome.send_replace(Some(Ok(id)));
        return;
    }

    debug!("filter {id}: installed");
    inner.outcome.send_replace(Some(Ok(id)));
    let weak = Arc::downgrade(&inner);
    let cancel = inner.cancel.clone();
    let interval = inner.ctx.poll_interval;
    drop(inner);
    poll_loop(weak, cancel, interval).await;
}

async fn poll_loop(weak: Weak<Inner>, cancel: CancellationToken, interval: Duration) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let Some(inner) = weak.upgrade() else {
            break;
        };
        inner.poll_tick().await;
        drop(inner);

        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            },
            _ = time::sleep(interval) => {}
        }
    }
}

async fn uninstall(gateway: &dyn RpcGateway, watch: WatchDescriptor, id: &FilterId) {
    match gateway.call(watch.uninstall, vec![id.to_param()]).await {
        Ok(_) => debug!("filter {id}: remote watch removed"),
        Err(err) => warn!("filter {id}: {} failed: {err}", watch.uninstall),
    }
}
