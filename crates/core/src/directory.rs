//! Supplier contact lookup with an explicit read-through cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::quotation::BuyerId;
use crate::domain::supplier::{SupplierContact, SupplierId};
use crate::store::StoreError;

#[async_trait]
pub trait SupplierDirectory: Send + Sync {
    async fn find(&self, supplier_id: &SupplierId) -> Result<Option<SupplierContact>, StoreError>;

    /// Messaging address of the buyer that owns a quotation, when known.
    async fn buyer_phone(&self, _buyer_id: &BuyerId) -> Result<Option<String>, StoreError> {
        Ok(None)
    }
}

#[derive(Default)]
pub struct InMemorySupplierDirectory {
    suppliers: RwLock<HashMap<SupplierId, SupplierContact>>,
    buyers: RwLock<HashMap<BuyerId, String>>,
}

impl InMemorySupplierDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, contact: SupplierContact) {
        self.suppliers.write().await.insert(contact.id.clone(), contact);
    }

    pub async fn insert_buyer(&self, buyer_id: BuyerId, phone: impl Into<String>) {
        self.buyers.write().await.insert(buyer_id, phone.into());
    }

    pub async fn remove(&self, supplier_id: &SupplierId) {
        self.suppliers.write().await.remove(supplier_id);
    }
}

#[async_trait]
impl SupplierDirectory for InMemorySupplierDirectory {
    async fn find(&self, supplier_id: &SupplierId) -> Result<Option<SupplierContact>, StoreError> {
        Ok(self.suppliers.read().await.get(supplier_id).cloned())
    }

    async fn buyer_phone(&self, buyer_id: &BuyerId) -> Result<Option<String>, StoreError> {
        Ok(self.buyers.read().await.get(buyer_id).cloned())
    }
}

struct CachedContact {
    contact: SupplierContact,
    fetched_at: Instant,
}

/// Read-through cache in front of another directory.
///
/// Only hits are cached; a supplier that was missing is looked up again on the next call.
pub struct CachedSupplierDirectory<D> {
    inner: D,
    ttl: Duration,
    entries: Arc<RwLock<HashMap<SupplierId, CachedContact>>>,
}

impl<D: SupplierDirectory> CachedSupplierDirectory<D> {
    pub fn new(inner: D, ttl: Duration) -> Self {
        Self { inner, ttl, entries: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub async fn invalidate(&self, supplier_id: &SupplierId) {
        self.entries.write().await.remove(supplier_id);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn cached_len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl<D: SupplierDirectory> SupplierDirectory for CachedSupplierDirectory<D> {
    async fn find(&self, supplier_id: &SupplierId) -> Result<Option<SupplierContact>, StoreError> {
        if let Some(entry) = self.entries.read().await.get(supplier_id) {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!(
                    event_name = "directory.cache.hit",
                    supplier_id = %supplier_id,
                    "supplier contact served from cache"
                );
                return Ok(Some(entry.contact.clone()));
            }
        }

        let found = self.inner.find(supplier_id).await?;
        let mut entries = self.entries.write().await;
        match &found {
            Some(contact) => {
                entries.insert(
                    supplier_id.clone(),
                    CachedContact { contact: contact.clone(), fetched_at: Instant::now() },
                );
            }
            None => {
                entries.remove(supplier_id);
            }
        }
        Ok(found)
    }

    async fn buyer_phone(&self, buyer_id: &BuyerId) -> Result<Option<String>, StoreError> {
        self.inner.buyer_phone(buyer_id).await
    }
}
