// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::Arc;
use user_service::config::Config;
use user_service::db::{FirestoreStore, MemoryStore, UserModel};
use user_service::models::User;
use user_service::routes::create_router;
use user_service::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a Firestore store connected to the emulator.
#[allow(dead_code)]
pub async fn test_firestore() -> FirestoreStore {
    FirestoreStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a repository over a fresh in-memory store with the table in place.
#[allow(dead_code)]
pub async fn test_model() -> UserModel {
    let model = UserModel::new(Arc::new(MemoryStore::new()), "User");
    model.create_table().await.expect("Failed to create table");
    model
}

/// Create a test app backed by an in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub async fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default()).await
}

/// Create a test app from `config`, backed by an in-memory store.
#[allow(dead_code)]
pub async fn create_test_app_with(config: Config) -> (axum::Router, Arc<AppState>) {
    let users = UserModel::new(Arc::new(MemoryStore::new()), config.users_collection.clone());
    users.create_table().await.expect("Failed to create table");

    let state = Arc::new(AppState { config, users });

    (create_router(state.clone()), state)
}

/// Minimal valid user at version 1.
#[allow(dead_code)]
pub fn test_user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: "a@b.com".to_string(),
        first_name: "A".to_string(),
        last_name: "B".to_string(),
        province_code: "CA".to_string(),
        country_code_alpha2: "US".to_string(),
        version: 1,
        ..Default::default()
    }
}
