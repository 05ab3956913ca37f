// src/application/ports/mod.rs
pub mod cache;
pub mod http;
pub mod navigation;
pub mod notify;
pub mod receipts;
pub mod storage;
pub mod time;

// Type aliases to make port injection sites more descriptive and reduce `dyn` noise
pub type HttpTransportPort = dyn http::HttpTransport;
pub type KeyValueStorePort = dyn storage::KeyValueStore;
pub type DurableStorePort = dyn storage::DurableStore;
pub type NotifierPort = dyn notify::Notifier;
pub type NavigatorPort = dyn navigation::Navigator;
pub type CacheInvalidatorPort = dyn cache::CacheInvalidator;
pub type ReceiptGatewayPort = dyn receipts::ReceiptGateway;
pub type ClockPort = dyn time::Clock;
