// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod patch;
pub mod user;

pub use patch::{ChangeSet, UserField, UserPatch};
pub use user::{
    validate_family_member, validate_user, Debt, FamilyMember, Goal, MetaField, Milestone,
    Protection, User, UserKey,
};
