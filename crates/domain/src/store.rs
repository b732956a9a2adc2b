use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::DomainError;

/// Persistence interface for the controller's key/value state
///
/// Implementations live in the infrastructure layer. Keys and values are
/// opaque text; parsing belongs to `DomeSettings`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load previously saved pairs; an empty map when nothing was saved yet
    async fn load(&self) -> Result<BTreeMap<String, String>, DomainError>;

    /// Replace the saved pairs
    async fn save(&self, pairs: &BTreeMap<String, String>) -> Result<(), DomainError>;
}
