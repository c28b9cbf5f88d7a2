// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User service: profile and financial records in a document store
//!
//! This crate provides the user repository (optimistic-concurrency updates,
//! sparse patches, nested validation) and the HTTP API in front of it.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod validator;

use config::Config;
use db::UserModel;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub users: UserModel,
}
