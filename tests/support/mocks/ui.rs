// tests/support/mocks/ui.rs
use receipt_client_core::application::ports::{
    cache::{CacheInvalidator, CacheScope},
    navigation::{Navigator, Route},
    notify::{Notification, NotificationLevel, Notifier},
};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingNotifier {
    posted: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.posted.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.all().into_iter().map(|n| n.message).collect()
    }

    pub fn at_level(&self, level: NotificationLevel) -> Vec<Notification> {
        self.all().into_iter().filter(|n| n.level == level).collect()
    }

    pub fn count(&self) -> usize {
        self.posted.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.posted.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.posted.lock().unwrap().push(notification);
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }
}

#[derive(Default)]
pub struct RecordingCache {
    scopes: Mutex<Vec<CacheScope>>,
}

impl RecordingCache {
    pub fn scopes(&self) -> Vec<CacheScope> {
        self.scopes.lock().unwrap().clone()
    }
}

impl CacheInvalidator for RecordingCache {
    fn invalidate(&self, scope: CacheScope) {
        self.scopes.lock().unwrap().push(scope);
    }
}
