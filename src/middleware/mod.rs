// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules.

pub mod rate_limit;

pub use rate_limit::{rate_limit, ClientRateLimiter};
