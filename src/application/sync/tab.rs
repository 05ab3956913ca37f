// src/application/sync/tab.rs
use crate::application::{ApplicationResult, ports::storage::KeyValueStore};
use crate::domain::sync::TabId;
use tracing::debug;

/// Short-lived key holding this tab's identity.
pub const TAB_ID_KEY: &str = "tab_id";

/// Returns the tab id cached in the short-lived store, creating one on first
/// use. A blank or unreadable entry is replaced.
pub fn load_or_create_tab_id(store: &dyn KeyValueStore) -> ApplicationResult<TabId> {
    if let Some(existing) = store.get(TAB_ID_KEY).and_then(|raw| TabId::parse(raw).ok()) {
        return Ok(existing);
    }
    let tab_id = TabId::generate();
    store.set(TAB_ID_KEY, tab_id.as_str())?;
    debug!(tab_id = %tab_id, "assigned new tab id");
    Ok(tab_id)
}
