// src/application/sync/mod.rs
pub mod bus;
pub mod tab;

pub use bus::{Subscription, TabSyncBus, SYNC_EVENT_KEY};
pub use tab::{TAB_ID_KEY, load_or_create_tab_id};
