// tests/support/mocks/mod.rs
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod gateway;
pub mod http;
pub mod time;
pub mod ui;

pub use gateway::{ScriptedGateway, StatusStep};
pub use http::{RecordedRequest, ScriptedTransport};
pub use time::{MutableClock, fixed_now};
pub use ui::{RecordingCache, RecordingNavigator, RecordingNotifier};
