// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sparse updates to a stored user.
//!
//! [`UserField`] is the closed set of attributes a caller may change. The key
//! (`userID`) and the `version` counter are deliberately absent: the key is
//! immutable and the version belongs to the repository. [`UserPatch`]
//! deserializes with `deny_unknown_fields`, so a misspelled or forbidden
//! attribute is rejected before anything reaches the store.

use crate::models::user::{Debt, FamilyMember, Goal, MetaField, Milestone, Protection, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An attribute of [`User`] that can be changed through an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UserField {
    Email,
    FirstName,
    LastName,
    ProvinceCode,
    CountryCodeAlpha2,
    Currency,
    AdministrativeDivision,
    DateOfBirth,
    Occupation,
    Income,
    Expenses,
    FamilyMemberNumber,
    IsMarried,
    Spouse,
    Dependents,
    Milestones,
    Goals,
    Protections,
    Debts,
    RiskTolerance,
    CreatedAt,
    Meta,
}

impl UserField {
    pub const ALL: [UserField; 22] = [
        UserField::Email,
        UserField::FirstName,
        UserField::LastName,
        UserField::ProvinceCode,
        UserField::CountryCodeAlpha2,
        UserField::Currency,
        UserField::AdministrativeDivision,
        UserField::DateOfBirth,
        UserField::Occupation,
        UserField::Income,
        UserField::Expenses,
        UserField::FamilyMemberNumber,
        UserField::IsMarried,
        UserField::Spouse,
        UserField::Dependents,
        UserField::Milestones,
        UserField::Goals,
        UserField::Protections,
        UserField::Debts,
        UserField::RiskTolerance,
        UserField::CreatedAt,
        UserField::Meta,
    ];

    /// Stored attribute name.
    pub const fn attribute(self) -> &'static str {
        match self {
            UserField::Email => "email",
            UserField::FirstName => "firstName",
            UserField::LastName => "lastName",
            UserField::ProvinceCode => "provinceCode",
            UserField::CountryCodeAlpha2 => "countryCodeAlpha2",
            UserField::Currency => "currency",
            UserField::AdministrativeDivision => "administrativeDivision",
            UserField::DateOfBirth => "dateOfBirth",
            UserField::Occupation => "occupation",
            UserField::Income => "income",
            UserField::Expenses => "expenses",
            UserField::FamilyMemberNumber => "familyMemberNumber",
            UserField::IsMarried => "isMarried",
            UserField::Spouse => "spouse",
            UserField::Dependents => "dependents",
            UserField::Milestones => "milestones",
            UserField::Goals => "goals",
            UserField::Protections => "protections",
            UserField::Debts => "debts",
            UserField::RiskTolerance => "riskTolerance",
            UserField::CreatedAt => "createdAt",
            UserField::Meta => "meta",
        }
    }

    pub fn from_attribute(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.attribute() == name)
    }
}

/// Changed attributes, ready to be written.
pub type ChangeSet = BTreeMap<UserField, Value>;

/// Sparse update: every `Some` field is written, every `None` is untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code_alpha2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administrative_division: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expenses: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_member_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_married: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spouse: Option<FamilyMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependents: Option<Vec<FamilyMember>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestones: Option<Vec<Milestone>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<Vec<Goal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protections: Option<Vec<Protection>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debts: Option<Vec<Debt>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_tolerance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<MetaField>>,
}

fn collect<T: Serialize>(
    changes: &mut ChangeSet,
    field: UserField,
    value: &Option<T>,
) -> Result<(), serde_json::Error> {
    if let Some(value) = value {
        changes.insert(field, serde_json::to_value(value)?);
    }
    Ok(())
}

fn assign<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Stored representation of every attribute this patch sets.
    pub fn changes(&self) -> Result<ChangeSet, serde_json::Error> {
        let mut changes = ChangeSet::new();
        collect(&mut changes, UserField::Email, &self.email)?;
        collect(&mut changes, UserField::FirstName, &self.first_name)?;
        collect(&mut changes, UserField::LastName, &self.last_name)?;
        collect(&mut changes, UserField::ProvinceCode, &self.province_code)?;
        collect(
            &mut changes,
            UserField::CountryCodeAlpha2,
            &self.country_code_alpha2,
        )?;
        collect(&mut changes, UserField::Currency, &self.currency)?;
        collect(
            &mut changes,
            UserField::AdministrativeDivision,
            &self.administrative_division,
        )?;
        collect(&mut changes, UserField::DateOfBirth, &self.date_of_birth)?;
        collect(&mut changes, UserField::Occupation, &self.occupation)?;
        collect(&mut changes, UserField::Income, &self.income)?;
        collect(&mut changes, UserField::Expenses, &self.expenses)?;
        collect(
            &mut changes,
            UserField::FamilyMemberNumber,
            &self.family_member_number,
        )?;
        collect(&mut changes, UserField::IsMarried, &self.is_married)?;
        collect(&mut changes, UserField::Spouse, &self.spouse)?;
        collect(&mut changes, UserField::Dependents, &self.dependents)?;
        collect(&mut changes, UserField::Milestones, &self.milestones)?;
        collect(&mut changes, UserField::Goals, &self.goals)?;
        collect(&mut changes, UserField::Protections, &self.protections)?;
        collect(&mut changes, UserField::Debts, &self.debts)?;
        collect(&mut changes, UserField::RiskTolerance, &self.risk_tolerance)?;
        collect(&mut changes, UserField::CreatedAt, &self.created_at)?;
        collect(&mut changes, UserField::Meta, &self.meta)?;
        Ok(changes)
    }

    /// Apply this patch to an in-memory copy, e.g. to validate the result
    /// before it is written.
    pub fn apply_to(&self, user: &mut User) {
        assign(&mut user.email, &self.email);
        assign(&mut user.first_name, &self.first_name);
        assign(&mut user.last_name, &self.last_name);
        assign(&mut user.province_code, &self.province_code);
        assign(&mut user.country_code_alpha2, &self.country_code_alpha2);
        assign(&mut user.currency, &self.currency);
        assign(
            &mut user.administrative_division,
            &self.administrative_division,
        );
        assign(&mut user.date_of_birth, &self.date_of_birth);
        assign(&mut user.occupation, &self.occupation);
        assign(&mut user.income, &self.income);
        assign(&mut user.expenses, &self.expenses);
        assign(&mut user.family_member_number, &self.family_member_number);
        assign(&mut user.is_married, &self.is_married);
        if let Some(spouse) = &self.spouse {
            user.spouse = Some(spouse.clone());
        }
        assign(&mut user.dependents, &self.dependents);
        assign(&mut user.milestones, &self.milestones);
        assign(&mut user.goals, &self.goals);
        assign(&mut user.protections, &self.protections);
        assign(&mut user.debts, &self.debts);
        assign(&mut user.risk_tolerance, &self.risk_tolerance);
        assign(&mut user.created_at, &self.created_at);
        assign(&mut user.meta, &self.meta);
    }
}
