// src/application/ports/cache.rs

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    Quota,
    ReceiptList,
}

/// Drops cached read models that a write has made stale.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, scope: CacheScope);
}
