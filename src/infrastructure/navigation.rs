// src/infrastructure/navigation.rs
use crate::application::ports::navigation::{Navigator, Route};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Records and logs route changes. Stands in for a router where there is no
/// screen to change.
#[derive(Debug, Default)]
pub struct LoggingNavigator {
    history: Mutex<Vec<Route>>,
}

impl LoggingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Route> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn history(&self) -> Vec<Route> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Navigator for LoggingNavigator {
    fn navigate(&self, route: Route) {
        info!(route = %route, "navigate");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route);
    }
}
