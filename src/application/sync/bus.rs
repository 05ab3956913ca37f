// src/application/sync/bus.rs
use crate::application::{
    ApplicationError, ApplicationResult,
    ports::{
        storage::{DurableStore, StorageChange},
        time::Clock,
    },
};
use crate::domain::sync::{SyncEnvelope, SyncEvent, SyncEventKind, TabId};
use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError, Weak},
    time::Duration,
};
use tokio::{runtime::Handle, sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Durable key every tab writes its sync events to.
pub const SYNC_EVENT_KEY: &str = "auth_sync_event";
pub const DEFAULT_CLEAR_DELAY: Duration = Duration::from_millis(100);
pub const MIN_CLEAR_DELAY: Duration = Duration::from_millis(50);

type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<SyncEventKind, Vec<(u64, Listener)>>,
}

/// Handle returned by [`TabSyncBus::subscribe`].
#[must_use = "dropping a Subscription keeps the listener registered; call unsubscribe to remove it"]
pub struct Subscription {
    kind: SyncEventKind,
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn kind(&self) -> SyncEventKind {
        self.kind
    }

    pub fn unsubscribe(self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(listeners) = registry.listeners.get_mut(&self.kind) {
            listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Broadcasts session events to sibling tabs through durable storage and
/// dispatches the events they broadcast to local listeners.
pub struct TabSyncBus {
    tab_id: TabId,
    durable: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    clear_delay: Duration,
    registry: Arc<Mutex<Registry>>,
    // Bumped on every write; a pending clear only fires for its own write.
    generation: Arc<Mutex<u64>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl TabSyncBus {
    pub fn new(tab_id: TabId, durable: Arc<dyn DurableStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tab_id,
            durable,
            clock,
            clear_delay: DEFAULT_CLEAR_DELAY,
            registry: Arc::new(Mutex::new(Registry::default())),
            generation: Arc::new(Mutex::new(0)),
            listener: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_clear_delay(mut self, delay: Duration) -> Self {
        self.clear_delay = delay.max(MIN_CLEAR_DELAY);
        self
    }

    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    /// Publishes `event` to every other tab. The key is cleared before the
    /// write so an identical consecutive event still registers as a change,
    /// and again shortly after so the slot does not hold stale data.
    pub fn broadcast(&self, event: &SyncEvent) -> ApplicationResult<()> {
        let raw = SyncEnvelope::new(event, self.clock.now(), &self.tab_id)?.encode()?;
        let generation = {
            let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
            *generation += 1;
            self.durable.remove(SYNC_EVENT_KEY)?;
            self.durable.set(SYNC_EVENT_KEY, &raw)?;
            *generation
        };
        debug!(kind = %event.kind(), tab_id = %self.tab_id, "broadcast sync event");
        self.schedule_clear(generation);
        Ok(())
    }

    fn schedule_clear(&self, generation: u64) {
        let durable = Arc::clone(&self.durable);
        let current = Arc::clone(&self.generation);
        match Handle::try_current() {
            Ok(handle) => {
                let delay = self.clear_delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    clear_if_current(durable.as_ref(), &current, generation);
                });
            }
            Err(_) => clear_if_current(durable.as_ref(), &current, generation),
        }
    }

    /// Registers `callback` for events of `kind`. Callbacks for one kind run in
    /// registration order.
    pub fn subscribe<F>(&self, kind: SyncEventKind, callback: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        Subscription {
            kind,
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Starts consuming the durable store's change feed. Calling it again
    /// while running has no effect.
    pub fn start(self: &Arc<Self>) -> ApplicationResult<()> {
        let runtime = Handle::try_current()
            .map_err(|_| ApplicationError::infrastructure("tab sync requires a tokio runtime"))?;
        let mut slot = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }
        let mut changes = self.durable.subscribe();
        let bus = Arc::downgrade(self);
        *slot = Some(runtime.spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(bus) = bus.upgrade() else { break };
                        bus.handle_change(&change);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "sync listener lagged; events were dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("sync listener stopped");
        }));
        info!(tab_id = %self.tab_id, "tab sync started");
        Ok(())
    }

    pub fn stop(&self) {
        if let Some(handle) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    /// Handles one storage change. Only the sync key matters; removals,
    /// malformed envelopes and this tab's own broadcasts are ignored.
    pub fn handle_change(&self, change: &StorageChange) {
        if change.key != SYNC_EVENT_KEY {
            return;
        }
        let Some(raw) = change.new_value.as_deref() else {
            return;
        };
        let envelope = match SyncEnvelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "dropping malformed sync event");
                return;
            }
        };
        if envelope.is_from(&self.tab_id) {
            trace!(kind = %envelope.kind, "ignoring own sync event");
            return;
        }
        let origin = envelope.origin_tab_id.clone();
        match envelope.into_event() {
            Ok(event) => {
                debug!(kind = %event.kind(), origin = %origin, "received sync event");
                self.dispatch(&event);
            }
            Err(err) => warn!(error = %err, origin = %origin, "dropping sync event with bad payload"),
        }
    }

    fn dispatch(&self, event: &SyncEvent) {
        let listeners: Vec<Listener> = {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry
                .listeners
                .get(&event.kind())
                .map(|entries| entries.iter().map(|(_, listener)| Arc::clone(listener)).collect())
                .unwrap_or_default()
        };
        for listener in listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(kind = %event.kind(), "sync listener panicked");
            }
        }
    }
}

impl Drop for TabSyncBus {
    fn drop(&mut self) {
        self.stop();
    }
}

fn clear_if_current(durable: &dyn DurableStore, current: &Mutex<u64>, generation: u64) {
    let current = current.lock().unwrap_or_else(PoisonError::into_inner);
    if *current != generation {
        return;
    }
    if let Err(err) = durable.remove(SYNC_EVENT_KEY) {
        warn!(error = %err, "failed to clear sync event key");
    }
}
