// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User repository.
//!
//! [`UserModel`] is the only component that talks to the store about users.
//! It serializes users to stored attributes, bounds every store call with a
//! timeout, and enforces optimistic concurrency on updates: an update
//! carries the version the caller read, is applied only if the stored
//! version still matches, and bumps the version by exactly one.

use crate::db::{
    Attributes, ConditionalUpdate, PutMode, StoreError, TableSchema, UserStore,
};
use crate::models::user::VERSION_ATTRIBUTE;
use crate::models::{User, UserKey, UserPatch};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Timeout for single-item operations.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(3);
/// Timeout for table lifecycle operations.
pub const DEFAULT_TABLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedUser {
    /// Post-update values of the attributes the caller changed
    pub attributes: Attributes,
    /// Version now stored
    pub version: i64,
}

/// Repository for users in a single table.
#[derive(Clone)]
pub struct UserModel {
    store: Arc<dyn UserStore>,
    table: String,
    item_timeout: Duration,
    table_timeout: Duration,
}

impl UserModel {
    pub fn new(store: Arc<dyn UserStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            item_timeout: DEFAULT_ITEM_TIMEOUT,
            table_timeout: DEFAULT_TABLE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, item_timeout: Duration, table_timeout: Duration) -> Self {
        self.item_timeout = item_timeout;
        self.table_timeout = table_timeout;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Run a store call, failing with [`StoreError::Timeout`] past `limit`.
    async fn bounded<T>(
        operation: &'static str,
        key: &str,
        limit: Duration,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, key, ?limit, "Store operation timed out");
                Err(StoreError::Timeout {
                    operation,
                    key: key.to_string(),
                })
            }
        }
    }

    fn attributes(user: &User) -> Result<Attributes, StoreError> {
        match serde_json::to_value(user)? {
            Value::Object(attributes) => Ok(attributes),
            other => Err(StoreError::Serialization(format!(
                "user serialized to {other} instead of an object"
            ))),
        }
    }

    // ─── Item Operations ─────────────────────────────────────────

    /// Write the full user, replacing any stored user with the same id.
    ///
    /// The caller sets the id and initial version beforehand.
    pub async fn insert(&self, user: &User) -> Result<(), StoreError> {
        self.put(user, PutMode::Overwrite).await
    }

    /// Write the full user, failing with [`StoreError::AlreadyExists`] if
    /// the id is taken.
    pub async fn create(&self, user: &User) -> Result<(), StoreError> {
        self.put(user, PutMode::CreateOnly).await
    }

    async fn put(&self, user: &User, mode: PutMode) -> Result<(), StoreError> {
        let key = user.key();
        let item = Self::attributes(user)?;

        Self::bounded(
            "put",
            &key.value,
            self.item_timeout,
            self.store.put(&self.table, &key, &item, mode),
        )
        .await?;

        tracing::debug!(user_id = %user.id, version = user.version, ?mode, "User stored");
        Ok(())
    }

    /// Fetch the current snapshot of a user, including its version.
    pub async fn get(&self, id: &str) -> Result<User, StoreError> {
        let key = UserKey::from_id(id);

        let item = Self::bounded(
            "get",
            id,
            self.item_timeout,
            self.store.get(&self.table, &key),
        )
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(serde_json::from_value(Value::Object(item))?)
    }

    /// Apply `patch` to the stored user iff its version still equals
    /// `user.version`, bumping the stored version by one.
    ///
    /// Fails with [`StoreError::EditConflict`] if another update got there
    /// first. No retry is attempted.
    pub async fn update(&self, user: &User, patch: &UserPatch) -> Result<UpdatedUser, StoreError> {
        let key = user.key();
        let next_version = user
            .version
            .checked_add(1)
            .ok_or_else(|| StoreError::VersionExhausted {
                key: key.value.clone(),
            })?;

        let mut builder = ConditionalUpdate::builder();
        for (field, value) in patch.changes()? {
            builder = builder.set(field.attribute(), value);
        }
        let update = builder
            .set(VERSION_ATTRIBUTE, Value::from(next_version))
            .condition_equals(VERSION_ATTRIBUTE, Value::from(user.version))
            .build()?;

        let result = Self::bounded(
            "update",
            &key.value,
            self.item_timeout,
            self.store.compare_and_swap(&self.table, &key, &update),
        )
        .await;

        let mut attributes = match result {
            Ok(attributes) => attributes,
            Err(StoreError::EditConflict) => {
                tracing::warn!(
                    user_id = %user.id,
                    version = user.version,
                    "Edit conflict: stored version has moved on"
                );
                return Err(StoreError::EditConflict);
            }
            Err(e) => return Err(e),
        };

        let version = attributes
            .remove(VERSION_ATTRIBUTE)
            .and_then(|v| v.as_i64())
            .unwrap_or(next_version);

        tracing::debug!(
            user_id = %user.id,
            version,
            changed = attributes.len(),
            "User updated"
        );

        Ok(UpdatedUser {
            attributes,
            version,
        })
    }

    /// Remove the user. Removing an absent user succeeds.
    pub async fn delete(&self, user: &User) -> Result<(), StoreError> {
        let key = user.key();

        Self::bounded(
            "delete",
            &key.value,
            self.item_timeout,
            self.store.delete(&self.table, &key),
        )
        .await?;

        tracing::debug!(user_id = %user.id, "User deleted");
        Ok(())
    }

    // ─── Table Operations ────────────────────────────────────────

    pub async fn table_exists(&self) -> Result<bool, StoreError> {
        Self::bounded(
            "table_exists",
            &self.table,
            self.item_timeout,
            self.store.table_exists(&self.table),
        )
        .await
    }

    /// Create the users table: keyed on `userID`, indexed on `email`.
    pub async fn create_table(&self) -> Result<TableSchema, StoreError> {
        let schema = TableSchema::users(&self.table);

        Self::bounded(
            "create_table",
            &self.table,
            self.table_timeout,
            self.store.create_table(&schema),
        )
        .await?;

        tracing::info!(table = %self.table, "Users table created");
        Ok(schema)
    }

    pub async fn delete_table(&self) -> Result<(), StoreError> {
        Self::bounded(
            "delete_table",
            &self.table,
            self.table_timeout,
            self.store.delete_table(&self.table),
        )
        .await?;

        tracing::info!(table = %self.table, "Users table deleted");
        Ok(())
    }
}
