use async_trait::async_trait;
use dashmap::DashMap;

use super::RingStore;
use crate::dht::interval::in_closed_open;
use crate::dht::RingId;
use crate::error::Result;

/// In-memory [RingStore].
#[derive(Debug, Default)]
pub struct MemStore {
    table: DashMap<RingId, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            table: DashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[async_trait]
impl RingStore for MemStore {
    async fn get(&self, key: &RingId) -> Result<Option<Vec<u8>>> {
        Ok(self.table.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &RingId, value: Vec<u8>) -> Result<()> {
        self.table.insert(key.clone(), value);
        Ok(())
    }

    async fn remove(&self, key: &RingId) -> Result<()> {
        self.table.remove(key);
        Ok(())
    }

    async fn keys_in_range(&self, from: &RingId, to: &RingId) -> Result<Vec<RingId>> {
        Ok(self
            .table
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| in_closed_open(from, to, key))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u64) -> RingId {
        RingId::from_u64(value, 3)
    }

    #[tokio::test]
    async fn test_basic_interface() {
        let store = MemStore::new();
        assert_eq!(store.get(&id(1)).await.unwrap(), None);

        store.set(&id(1), b"one".to_vec()).await.unwrap();
        assert_eq!(store.get(&id(1)).await.unwrap(), Some(b"one".to_vec()));

        store.set(&id(1), b"uno".to_vec()).await.unwrap();
        assert_eq!(store.get(&id(1)).await.unwrap(), Some(b"uno".to_vec()));

        store.remove(&id(1)).await.unwrap();
        assert_eq!(store.get(&id(1)).await.unwrap(), None);
        store.remove(&id(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_in_range_wraps() {
        let store = MemStore::new();
        for key in [0u64, 1, 3, 6, 7] {
            store.set(&id(key), vec![key as u8]).await.unwrap();
        }

        let mut keys = store.keys_in_range(&id(1), &id(6)).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec![id(1), id(3)]);

        // [6, 1) wraps through zero.
        let mut keys = store.keys_in_range(&id(6), &id(1)).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec![id(0), id(6), id(7)]);
    }
}
