// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.
//!
//! Attributes are stored under camelCase names. Empty optional fields are
//! omitted on write and defaulted on read, so a stored user reads back equal
//! to the one that was written.

use crate::validator::{self, Validator, EMAIL_RX};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Name of the primary key attribute in the users table.
pub const KEY_ATTRIBUTE: &str = "userID";
/// Name of the optimistic-concurrency counter attribute.
pub const VERSION_ATTRIBUTE: &str = "version";
/// Attribute backing the secondary lookup index.
pub const EMAIL_ATTRIBUTE: &str = "email";

/// User profile with nested financial data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// UUID of the user (also the primary key)
    #[serde(rename = "userID")]
    pub id: String,
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub province_code: String,
    /// Two-letter country code, e.g. "CA" for Canada
    #[serde(default)]
    pub country_code_alpha2: String,
    #[serde(default)]
    pub currency: String,
    /// Kind of division within the country, e.g. "province" for Canada
    #[serde(default)]
    pub administrative_division: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date_of_birth: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub occupation: String,
    /// Amount in the user's currency
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub income: String,
    /// Amount in the user's currency
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expenses: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub family_member_number: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_married: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spouse: Option<FamilyMember>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependents: Vec<FamilyMember>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<Milestone>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goals: Vec<Goal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protections: Vec<Protection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub debts: Vec<Debt>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub risk_tolerance: String,
    /// Creation date (YYYY-MM-DD)
    #[serde(default)]
    pub created_at: String,
    /// Optimistic-concurrency counter, owned by the repository
    #[serde(default)]
    pub version: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<MetaField>,
}

/// Spouse or dependent of a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "camelCase", default)]
pub struct FamilyMember {
    /// "spouse" or "dependent"
    #[serde(rename = "type")]
    pub kind: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub income: String,
    pub expenses: String,
}

/// Financial goal of the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "camelCase", default)]
pub struct Goal {
    pub date: String,
    pub title: String,
    pub progress_level: String,
    /// Nanoseconds
    pub estimated_duration: i64,
    pub description: String,
}

/// Financial achievement of the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "camelCase", default)]
pub struct Milestone {
    pub date: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

/// Insurance or other protection the user holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "camelCase", default)]
pub struct Protection {
    #[serde(rename = "type")]
    pub kind: String,
    pub premium: i64,
    pub claimed_date: String,
    pub expiration_date: String,
    pub description: String,
}

/// Debt the user currently carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "camelCase", default)]
pub struct Debt {
    #[serde(rename = "type")]
    pub kind: String,
    pub cost: String,
    pub interest_rate: i64,
    pub term: i64,
    pub collateral: String,
    pub description: String,
}

/// Free-form per-user configuration entry. Never validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(default)]
pub struct MetaField {
    pub key: String,
    pub namespace: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Primary key of a stored user: a single string attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserKey {
    pub attribute: &'static str,
    pub value: String,
}

impl UserKey {
    pub fn from_id(id: &str) -> Self {
        Self {
            attribute: KEY_ATTRIBUTE,
            value: id.to_string(),
        }
    }

    /// Document id safe for stores that reserve `/` in ids.
    pub fn document_id(&self) -> String {
        urlencoding::encode(&self.value).into_owned()
    }
}

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.attribute, self.value)
    }
}

impl User {
    /// Primary key derived from the user id alone.
    pub fn key(&self) -> UserKey {
        UserKey::from_id(&self.id)
    }
}

/// Check every user invariant, recording failures on `v`.
///
/// Nested family members are reported under `spouse_*` and
/// `dependent_<n>_*` keys (1-based), so failures never collide.
pub fn validate_user(v: &mut Validator, user: &User) {
    v.check(
        validator::matches(&user.email, &EMAIL_RX),
        "email",
        "must be valid",
    );
    v.check(!user.first_name.is_empty(), "first_name", "must be provided");
    v.check(
        user.country_code_alpha2.chars().count() == 2,
        "country_code_alpha_2",
        "must be two letters",
    );
    v.check(
        !user.province_code.is_empty(),
        "province_code",
        "must be provided",
    );

    if user.is_married {
        match &user.spouse {
            Some(spouse) => validate_family_member(v, spouse, "spouse"),
            None => v.add_error("spouse", "must be provided"),
        }
    }

    for (i, dependent) in user.dependents.iter().enumerate() {
        validate_family_member(v, dependent, &format!("dependent_{}", i + 1));
    }
}

/// Check a family member, prefixing failure keys with `label`.
pub fn validate_family_member(v: &mut Validator, member: &FamilyMember, label: &str) {
    v.check(
        !member.kind.is_empty(),
        format!("{label}_type"),
        "must be provided",
    );
    v.check(
        !member.first_name.is_empty(),
        format!("{label}_first_name"),
        "must be provided",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_user() -> User {
        User {
            id: "77d1cbe1-f734-4b94-b69e-e9d55b81ed19".to_string(),
            email: "john.doe@example.com".to_string(),
            first_name: "John".to_string(),
            country_code_alpha2: "US".to_string(),
            province_code: "CA".to_string(),
            is_married: true,
            spouse: Some(FamilyMember {
                kind: "spouse".to_string(),
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                ..Default::default()
            }),
            version: 1,
            ..Default::default()
        }
    }

    fn validate(user: &User) -> Validator {
        let mut v = Validator::new();
        validate_user(&mut v, user);
        v
    }

    #[test]
    fn test_key_is_derived_from_id() {
        let user = valid_user();
        let key = user.key();
        assert_eq!(key.attribute, "userID");
        assert_eq!(key.value, "77d1cbe1-f734-4b94-b69e-e9d55b81ed19");
        assert_eq!(key, user.key());
        assert_eq!(key, UserKey::from_id(&user.id));
    }

    #[test]
    fn test_empty_key() {
        let key = UserKey::from_id("");
        assert_eq!(key.value, "");
        assert_eq!(key.document_id(), "");
    }

    #[test]
    fn test_document_id_escapes_slashes() {
        let key = UserKey::from_id("a/b");
        assert_eq!(key.document_id(), "a%2Fb");
        assert_eq!(key.to_string(), "userID=a/b");
    }

    #[test]
    fn test_valid_user() {
        let v = validate(&valid_user());
        assert!(v.valid(), "unexpected errors: {:?}", v.errors());
    }

    #[test]
    fn test_invalid_user_reports_every_failure() {
        let user = User {
            email: "invalid-email".to_string(),
            first_name: String::new(),
            country_code_alpha2: "USA".to_string(),
            province_code: String::new(),
            is_married: true,
            spouse: None,
            ..Default::default()
        };

        let errors = validate(&user).into_errors();

        assert_eq!(errors.len(), 5, "errors: {:?}", errors);
        assert_eq!(errors["email"], "must be valid");
        assert_eq!(errors["first_name"], "must be provided");
        assert_eq!(errors["country_code_alpha_2"], "must be two letters");
        assert_eq!(errors["province_code"], "must be provided");
        assert_eq!(errors["spouse"], "must be provided");
    }

    #[test]
    fn test_invalid_family_members_are_keyed_per_entry() {
        let mut user = valid_user();
        user.last_name = "Doe".to_string();
        user.spouse = Some(FamilyMember {
            kind: "spouse".to_string(),
            last_name: "Doe".to_string(),
            ..Default::default()
        });
        user.dependents = vec![
            FamilyMember {
                kind: "dependent".to_string(),
                ..Default::default()
            },
            FamilyMember {
                first_name: "John".to_string(),
                last_name: "Doe".to_string(),
                ..Default::default()
            },
        ];

        let errors = validate(&user).into_errors();

        assert_eq!(errors.len(), 3, "errors: {:?}", errors);
        assert_eq!(errors["spouse_first_name"], "must be provided");
        assert_eq!(errors["dependent_1_first_name"], "must be provided");
        assert_eq!(errors["dependent_2_type"], "must be provided");
    }

    #[test]
    fn test_unmarried_user_ignores_spouse() {
        let mut user = valid_user();
        user.is_married = false;
        user.spouse = Some(FamilyMember::default());
        assert!(validate(&user).valid());
    }

    #[test]
    fn test_country_code_counts_characters() {
        let mut user = valid_user();
        user.country_code_alpha2 = "É1".to_string();
        assert!(validate(&user).valid());

        user.country_code_alpha2 = "C".to_string();
        assert!(!validate(&user).valid());
    }

    #[test]
    fn test_stored_attribute_names() {
        let mut user = valid_user();
        user.milestones = vec![Milestone {
            date: "2023-02-05".to_string(),
            title: "Bank Opened".to_string(),
            kind: "Debt".to_string(),
            description: String::new(),
        }];

        let value = serde_json::to_value(&user).unwrap();
        let attrs = value.as_object().unwrap();

        assert_eq!(attrs["userID"], "77d1cbe1-f734-4b94-b69e-e9d55b81ed19");
        assert_eq!(attrs["firstName"], "John");
        assert_eq!(attrs["countryCodeAlpha2"], "US");
        assert_eq!(attrs["isMarried"], true);
        assert_eq!(attrs["spouse"]["type"], "spouse");
        assert_eq!(attrs["spouse"]["firstName"], "Jane");
        assert_eq!(attrs["milestones"][0]["title"], "Bank Opened");
        assert_eq!(attrs["version"], 1);
        // Empty optional attributes are omitted.
        assert!(!attrs.contains_key("occupation"));
        assert!(!attrs.contains_key("dependents"));
        assert!(!attrs.contains_key("familyMemberNumber"));
    }

    #[test]
    fn test_stored_form_reads_back_equal() {
        let mut user = valid_user();
        user.dependents = vec![FamilyMember {
            kind: "dependent".to_string(),
            first_name: "Jim".to_string(),
            ..Default::default()
        }];
        user.goals = vec![Goal {
            title: "Retire".to_string(),
            estimated_duration: 3_600_000_000_000,
            ..Default::default()
        }];
        user.meta = vec![MetaField {
            key: "theme".to_string(),
            namespace: "ui".to_string(),
            value: "dark".to_string(),
            kind: "string".to_string(),
        }];

        let stored = serde_json::to_value(&user).unwrap();
        let read: User = serde_json::from_value(stored).unwrap();
        assert_eq!(read, user);
    }
}
