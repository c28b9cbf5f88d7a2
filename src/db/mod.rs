// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! [`UserStore`] is the storage-adapter port: a schemaless item store with
//! single-attribute keys and an atomic compare-and-swap update. Two adapters
//! implement it, [`FirestoreStore`] for production and [`MemoryStore`] for
//! tests and local runs. [`UserModel`] is the repository built on top.

pub mod expression;
pub mod firestore;
pub mod memory;
pub mod users;

pub use expression::{ConditionalUpdate, UpdateBuilder};
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use users::{UpdatedUser, UserModel};

use crate::models::UserKey;
use async_trait::async_trait;

/// Table (collection) names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Schema records for provisioned tables.
    pub const TABLES: &str = "_tables";
}

/// Stored attribute representation of an item.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Errors surfaced by the store and the repository.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("edit conflict")]
    EditConflict,

    #[error("record already exists")]
    AlreadyExists,

    #[error("{operation} on {key} timed out")]
    Timeout { operation: &'static str, key: String },

    #[error("{operation} on {key} failed: {message}")]
    Backend {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("invalid update expression: {0}")]
    Expression(String),

    #[error("version counter of {key} is exhausted")]
    VersionExhausted { key: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// How a put treats an existing item with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Replace any existing item.
    Overwrite,
    /// Fail with [`StoreError::AlreadyExists`] if the key is taken.
    CreateOnly,
}

/// Indexing scheme of a table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub name: String,
    /// Partition key attribute (string-typed)
    pub key_attribute: String,
    /// Secondary indexes as (index name, attribute)
    pub indexes: Vec<SecondaryIndex>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryIndex {
    pub name: String,
    pub attribute: String,
}

impl TableSchema {
    /// Users are keyed on `userID` with a secondary index on `email`.
    pub fn users(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key_attribute: crate::models::user::KEY_ATTRIBUTE.to_string(),
            indexes: vec![SecondaryIndex {
                name: crate::models::user::EMAIL_ATTRIBUTE.to_string(),
                attribute: crate::models::user::EMAIL_ATTRIBUTE.to_string(),
            }],
        }
    }
}

/// Storage-adapter port. Implementations must be safe to share across tasks.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch an item by key, `None` if absent.
    async fn get(&self, table: &str, key: &UserKey) -> Result<Option<Attributes>, StoreError>;

    /// Write a full item.
    async fn put(
        &self,
        table: &str,
        key: &UserKey,
        item: &Attributes,
        mode: PutMode,
    ) -> Result<(), StoreError>;

    /// Atomically apply `update` iff its precondition holds on the stored
    /// item. Returns the post-update values of the assigned attributes.
    ///
    /// Fails with [`StoreError::EditConflict`] if the precondition does not
    /// hold and [`StoreError::NotFound`] if there is no item.
    async fn compare_and_swap(
        &self,
        table: &str,
        key: &UserKey,
        update: &ConditionalUpdate,
    ) -> Result<Attributes, StoreError>;

    /// Remove an item. Removing an absent item succeeds.
    async fn delete(&self, table: &str, key: &UserKey) -> Result<(), StoreError>;

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError>;

    async fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError>;

    /// Remove a table and every item in it.
    async fn delete_table(&self, table: &str) -> Result<(), StoreError>;
}
