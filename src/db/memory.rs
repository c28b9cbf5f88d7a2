// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for tests and local development.
//!
//! Each table is a `DashMap` keyed by the primary key value. A conditional
//! update holds the entry's shard lock between the precondition check and
//! the write, so it is atomic with respect to every other operation.

use crate::db::{Attributes, ConditionalUpdate, PutMode, StoreError, TableSchema, UserStore};
use crate::models::UserKey;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

struct Table {
    schema: TableSchema,
    items: DashMap<String, Attributes>,
}

/// Shared in-memory store. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<DashMap<String, Arc<Table>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, operation: &'static str, name: &str) -> Result<Arc<Table>, StoreError> {
        self.tables
            .get(name)
            .map(|table| Arc::clone(table.value()))
            .ok_or_else(|| StoreError::Backend {
                operation,
                key: name.to_string(),
                message: format!("table {name} does not exist"),
            })
    }

    /// Schema a table was created with.
    pub fn schema(&self, name: &str) -> Option<TableSchema> {
        self.tables.get(name).map(|table| table.schema.clone())
    }

    /// Number of items in a table (0 if the table does not exist).
    pub fn len(&self, name: &str) -> usize {
        self.tables
            .get(name)
            .map(|table| table.items.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, name: &str) -> bool {
        self.len(name) == 0
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, table: &str, key: &UserKey) -> Result<Option<Attributes>, StoreError> {
        let table = self.table("get", table)?;
        Ok(table.items.get(&key.value).map(|item| item.value().clone()))
    }

    async fn put(
        &self,
        table: &str,
        key: &UserKey,
        item: &Attributes,
        mode: PutMode,
    ) -> Result<(), StoreError> {
        let table = self.table("put", table)?;
        let result = match (table.items.entry(key.value.clone()), mode) {
            (Entry::Occupied(_), PutMode::CreateOnly) => Err(StoreError::AlreadyExists),
            (Entry::Occupied(mut entry), PutMode::Overwrite) => {
                entry.insert(item.clone());
                Ok(())
            }
            (Entry::Vacant(entry), _) => {
                entry.insert(item.clone());
                Ok(())
            }
        };
        result
    }

    async fn compare_and_swap(
        &self,
        table: &str,
        key: &UserKey,
        update: &ConditionalUpdate,
    ) -> Result<Attributes, StoreError> {
        let table = self.table("update", table)?;
        let mut item = table.items.get_mut(&key.value).ok_or(StoreError::NotFound)?;

        if !update.precondition_holds(item.value()) {
            return Err(StoreError::EditConflict);
        }

        let assigned = update.assigned();
        for (attribute, value) in &assigned {
            item.insert(attribute.clone(), value.clone());
        }
        Ok(assigned)
    }

    async fn delete(&self, table: &str, key: &UserKey) -> Result<(), StoreError> {
        let table = self.table("delete", table)?;
        table.items.remove(&key.value);
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        Ok(self.tables.contains_key(table))
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        match self.tables.entry(schema.name.clone()) {
            Entry::Occupied(_) => Err(StoreError::Backend {
                operation: "create_table",
                key: schema.name.clone(),
                message: format!("table {} already exists", schema.name),
            }),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Table {
                    schema: schema.clone(),
                    items: DashMap::new(),
                }));
                Ok(())
            }
        }
    }

    async fn delete_table(&self, table: &str) -> Result<(), StoreError> {
        self.tables
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| StoreError::Backend {
                operation: "delete_table",
                key: table.to_string(),
                message: format!("table {table} does not exist"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(version: i64) -> Attributes {
        let mut item = Attributes::new();
        item.insert("userID".to_string(), json!("u1"));
        item.insert("lastName".to_string(), json!("B"));
        item.insert("version".to_string(), json!(version));
        item
    }

    async fn store_with_table() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table(&TableSchema::users("User")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_operations_require_table() {
        let store = MemoryStore::new();
        let key = UserKey::from_id("u1");
        let err = store.get("User", &key).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend { operation: "get", .. }));
    }

    #[tokio::test]
    async fn test_create_only_put_refuses_existing_key() {
        let store = store_with_table().await;
        let key = UserKey::from_id("u1");

        store
            .put("User", &key, &item(1), PutMode::CreateOnly)
            .await
            .unwrap();
        let err = store
            .put("User", &key, &item(1), PutMode::CreateOnly)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));

        store
            .put("User", &key, &item(9), PutMode::Overwrite)
            .await
            .unwrap();
        let stored = store.get("User", &key).await.unwrap().unwrap();
        assert_eq!(stored["version"], json!(9));
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = store_with_table().await;
        let key = UserKey::from_id("u1");
        store
            .put("User", &key, &item(1), PutMode::Overwrite)
            .await
            .unwrap();

        let update = ConditionalUpdate::builder()
            .set("lastName", json!("C"))
            .set("version", json!(2))
            .condition_equals("version", json!(1))
            .build()
            .unwrap();

        let changed = store.compare_and_swap("User", &key, &update).await.unwrap();
        assert_eq!(changed["lastName"], json!("C"));
        assert_eq!(changed["version"], json!(2));
        assert!(!changed.contains_key("userID"));

        // Same precondition again: stored version has moved on.
        let err = store
            .compare_and_swap("User", &key, &update)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EditConflict));

        let stored = store.get("User", &key).await.unwrap().unwrap();
        assert_eq!(stored["lastName"], json!("C"));
        assert_eq!(stored["version"], json!(2));
    }

    #[tokio::test]
    async fn test_compare_and_swap_missing_item() {
        let store = store_with_table().await;
        let update = ConditionalUpdate::builder()
            .set("version", json!(2))
            .condition_equals("version", json!(1))
            .build()
            .unwrap();

        let err = store
            .compare_and_swap("User", &UserKey::from_id("nobody"), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_table_lifecycle() {
        let store = MemoryStore::new();
        assert!(!store.table_exists("User").await.unwrap());

        store.create_table(&TableSchema::users("User")).await.unwrap();
        assert!(store.table_exists("User").await.unwrap());
        assert_eq!(store.schema("User").unwrap().key_attribute, "userID");
        assert!(store.create_table(&TableSchema::users("User")).await.is_err());

        store.delete_table("User").await.unwrap();
        assert!(!store.table_exists("User").await.unwrap());
        assert!(store.delete_table("User").await.is_err());
    }
}
