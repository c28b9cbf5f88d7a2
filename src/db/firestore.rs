// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore adapter for [`UserStore`].
//!
//! - Tables map to collections, items to documents keyed by the escaped
//!   primary key value.
//! - Conditional updates run in a transaction: the item is read under the
//!   transaction, the precondition is checked, and the field-masked write is
//!   committed atomically. A transaction aborted by contention is settled by
//!   re-reading the item: a moved version is an edit conflict, otherwise the
//!   transaction is retried a bounded number of times.
//! - Table schemas are recorded in the `_tables` collection. Firestore
//!   indexes single fields automatically, which covers the email index.

use crate::db::{
    collections, Attributes, ConditionalUpdate, PutMode, StoreError, TableSchema, UserStore,
};
use crate::models::UserKey;
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreConsistencySelector;
use std::time::Duration;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Transaction attempts per conditional update before giving up.
const CAS_ATTEMPTS: usize = 3;
const CAS_BACKOFF: Duration = Duration::from_millis(50);

/// Outcome of one conditional-update transaction.
enum CasAttempt {
    Committed(Attributes),
    /// Firestore aborted the transaction under contention.
    Aborted,
}

/// Whether Firestore aborted the transaction (gRPC `ABORTED`).
fn is_aborted(err: &FirestoreError) -> bool {
    matches!(err, FirestoreError::DatabaseError(e) if e.public.code == "Aborted")
}

/// Firestore-backed store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Option<firestore::FirestoreDb>,
}

/// Map a Firestore error onto the store taxonomy.
fn classify(operation: &'static str, key: &str, err: FirestoreError) -> StoreError {
    match err {
        FirestoreError::DataConflictError(_) => StoreError::AlreadyExists,
        FirestoreError::DataNotFoundError(_) => StoreError::NotFound,
        FirestoreError::SerializeError(e) => StoreError::Serialization(e.to_string()),
        FirestoreError::DeserializeError(e) => StoreError::Serialization(e.to_string()),
        other => StoreError::Backend {
            operation,
            key: key.to_string(),
            message: other.to_string(),
        },
    }
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| classify("connect", project_id, e))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| classify("connect", project_id, e))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every operation fails with a backend error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self, operation: &'static str) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client.as_ref().ok_or_else(|| StoreError::Backend {
            operation,
            key: String::new(),
            message: "Database not connected (offline mode)".to_string(),
        })
    }

    /// Delete documents in transactions of at most `BATCH_SIZE` writes.
    async fn batch_delete(&self, collection: &str, doc_ids: &[String]) -> Result<(), StoreError> {
        let client = self.get_client("delete_table")?;

        for chunk in doc_ids.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| classify("delete_table", collection, e))?;

            for doc_id in chunk {
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| classify("delete_table", doc_id, e))?;
            }

            transaction
                .commit()
                .await
                .map_err(|e| classify("delete_table", collection, e))?;
        }

        Ok(())
    }

    /// One transactional read-check-write pass of a conditional update.
    async fn try_compare_and_swap(
        &self,
        table: &str,
        key: &UserKey,
        update: &ConditionalUpdate,
    ) -> Result<CasAttempt, StoreError> {
        let client = self.get_client("update")?;
        let doc_id = key.document_id();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| classify("update", &key.value, e))?;

        // Reading through the transaction registers the document for
        // conflict detection at commit time.
        let read = client
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
            .fluent()
            .select()
            .by_id_in(table)
            .obj::<Attributes>()
            .one(&doc_id)
            .await;

        let current = match read {
            Ok(Some(item)) => item,
            Ok(None) => {
                let _ = transaction.rollback().await;
                return Err(StoreError::NotFound);
            }
            Err(e) => {
                let _ = transaction.rollback().await;
                return if is_aborted(&e) {
                    Ok(CasAttempt::Aborted)
                } else {
                    Err(classify("update", &key.value, e))
                };
            }
        };

        if !update.precondition_holds(&current) {
            let _ = transaction.rollback().await;
            return Err(StoreError::EditConflict);
        }

        let assigned = update.assigned();
        let fields: Vec<String> = assigned.keys().cloned().collect();

        client
            .fluent()
            .update()
            .fields(fields)
            .in_col(table)
            .document_id(&doc_id)
            .object(&assigned)
            .add_to_transaction(&mut transaction)
            .map_err(|e| classify("update", &key.value, e))?;

        match transaction.commit().await {
            Ok(_) => Ok(CasAttempt::Committed(assigned)),
            Err(e) if is_aborted(&e) => Ok(CasAttempt::Aborted),
            Err(e) => Err(classify("update", &key.value, e)),
        }
    }
}

#[async_trait]
impl UserStore for FirestoreStore {
    async fn get(&self, table: &str, key: &UserKey) -> Result<Option<Attributes>, StoreError> {
        self.get_client("get")?
            .fluent()
            .select()
            .by_id_in(table)
            .obj()
            .one(&key.document_id())
            .await
            .map_err(|e| classify("get", &key.value, e))
    }

    async fn put(
        &self,
        table: &str,
        key: &UserKey,
        item: &Attributes,
        mode: PutMode,
    ) -> Result<(), StoreError> {
        let client = self.get_client("put")?;
        let doc_id = key.document_id();

        match mode {
            PutMode::Overwrite => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(table)
                    .document_id(&doc_id)
                    .object(item)
                    .execute()
                    .await
                    .map_err(|e| classify("put", &key.value, e))?;
            }
            PutMode::CreateOnly => {
                let _: () = client
                    .fluent()
                    .insert()
                    .into(table)
                    .document_id(&doc_id)
                    .object(item)
                    .execute()
                    .await
                    .map_err(|e| classify("put", &key.value, e))?;
            }
        }
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        table: &str,
        key: &UserKey,
        update: &ConditionalUpdate,
    ) -> Result<Attributes, StoreError> {
        for attempt in 1..=CAS_ATTEMPTS {
            if let CasAttempt::Committed(assigned) =
                self.try_compare_and_swap(table, key, update).await?
            {
                return Ok(assigned);
            }

            // Contended transactions are aborted by Firestore. Decide from a
            // fresh read whether another writer moved the version on.
            let current: Option<Attributes> = self
                .get_client("update")?
                .fluent()
                .select()
                .by_id_in(table)
                .obj()
                .one(&key.document_id())
                .await
                .map_err(|e| classify("update", &key.value, e))?;

            match current {
                None => return Err(StoreError::NotFound),
                Some(item) if !update.precondition_holds(&item) => {
                    return Err(StoreError::EditConflict)
                }
                Some(_) => {
                    tracing::debug!(key = %key, attempt, "Update transaction aborted, retrying");
                    tokio::time::sleep(CAS_BACKOFF * attempt as u32).await;
                }
            }
        }

        // Still contended after every attempt: report it as a conflict so
        // the caller re-reads and tries again.
        tracing::warn!(key = %key, attempts = CAS_ATTEMPTS, "Update transaction kept aborting");
        Err(StoreError::EditConflict)
    }

    async fn delete(&self, table: &str, key: &UserKey) -> Result<(), StoreError> {
        self.get_client("delete")?
            .fluent()
            .delete()
            .from(table)
            .document_id(key.document_id())
            .execute()
            .await
            .map_err(|e| classify("delete", &key.value, e))?;
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let schema: Option<TableSchema> = self
            .get_client("table_exists")?
            .fluent()
            .select()
            .by_id_in(collections::TABLES)
            .obj()
            .one(table)
            .await
            .map_err(|e| classify("table_exists", table, e))?;
        Ok(schema.is_some())
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        let _: () = self
            .get_client("create_table")?
            .fluent()
            .insert()
            .into(collections::TABLES)
            .document_id(&schema.name)
            .object(schema)
            .execute()
            .await
            .map_err(|e| match classify("create_table", &schema.name, e) {
                StoreError::AlreadyExists => StoreError::Backend {
                    operation: "create_table",
                    key: schema.name.clone(),
                    message: format!("table {} already exists", schema.name),
                },
                other => other,
            })?;

        tracing::info!(table = %schema.name, "Table created");
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<(), StoreError> {
        if !self.table_exists(table).await? {
            return Err(StoreError::Backend {
                operation: "delete_table",
                key: table.to_string(),
                message: format!("table {table} does not exist"),
            });
        }

        let documents = self
            .get_client("delete_table")?
            .fluent()
            .select()
            .from(table)
            .query()
            .await
            .map_err(|e| classify("delete_table", table, e))?;

        let doc_ids: Vec<String> = documents
            .iter()
            .filter_map(|doc| doc.name.rsplit('/').next().map(str::to_string))
            .collect();
        let count = doc_ids.len();

        self.batch_delete(table, &doc_ids).await?;

        self.get_client("delete_table")?
            .fluent()
            .delete()
            .from(collections::TABLES)
            .document_id(table)
            .execute()
            .await
            .map_err(|e| classify("delete_table", table, e))?;

        tracing::info!(table, count, "Table deleted");
        Ok(())
    }
}
