//! Shared types used across the Caduceus pipeline.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::CaduceusError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for user identifiers with validation.
///
/// User IDs must be 1-64 characters of alphanumerics, dots, hyphens,
/// underscores, or `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create a new `UserId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, CaduceusError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), CaduceusError> {
        static USER_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = USER_REGEX
            .get_or_init(|| Regex::new(r"^[A-Za-z0-9._@-]{1,64}$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(CaduceusError::Validation(format!(
                "invalid user ID: must be 1-64 characters of [A-Za-z0-9._@-], got '{id}'"
            )))
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for session identifiers with validation.
///
/// Session IDs follow the same character rules as user IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new `SessionId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, CaduceusError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a new random `SessionId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), CaduceusError> {
        static SESSION_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = SESSION_REGEX
            .get_or_init(|| Regex::new(r"^[A-Za-z0-9._@-]{1,64}$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(CaduceusError::Validation(format!(
                "invalid session ID: must be 1-64 characters of [A-Za-z0-9._@-], got '{id}'"
            )))
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key scoping a placeholder mapping set: one user within one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerKey {
    /// The user the mapping set belongs to
    pub user: UserId,
    /// The session the mapping set belongs to
    pub session: SessionId,
}

impl OwnerKey {
    /// Create a new `OwnerKey` from raw user and session strings.
    ///
    /// # Errors
    /// Returns error if either component fails validation.
    pub fn new(
        user: impl Into<String>,
        session: impl Into<String>,
    ) -> Result<Self, CaduceusError> {
        Ok(Self {
            user: UserId::new(user)?,
            session: SessionId::new(session)?,
        })
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user, self.session)
    }
}

/// Newtype for request identifiers.
///
/// Generated per inbound request and threaded through audit records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Create a new random `RequestId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User roles with distinct quota and routing privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// End user asking about their own care
    Patient,
    /// Licensed clinical staff
    Clinician,
    /// Operations and oversight
    Admin,
}

impl UserRole {
    /// Get the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Clinician => "clinician",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Categories of sensitive entities recognized by detectors.
///
/// The string form is the placeholder prefix: an entity of kind
/// `PhoneNumber` becomes `PHONE_NUMBER_1`, `PHONE_NUMBER_2`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Personal name
    Person,
    /// Date or time expression
    DateTime,
    /// Phone number
    PhoneNumber,
    /// Email address
    EmailAddress,
    /// Medical license number
    MedicalLicense,
    /// US Social Security Number
    UsSsn,
    /// Geographic location
    Location,
    /// Credit card number
    CreditCard,
    /// IP address
    IpAddress,
    /// Anything a detector flags outside the known categories
    Other,
}

impl EntityKind {
    /// Get the placeholder prefix for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::DateTime => "DATE_TIME",
            Self::PhoneNumber => "PHONE_NUMBER",
            Self::EmailAddress => "EMAIL_ADDRESS",
            Self::MedicalLicense => "MEDICAL_LICENSE",
            Self::UsSsn => "US_SSN",
            Self::Location => "LOCATION",
            Self::CreditCard => "CREDIT_CARD",
            Self::IpAddress => "IP_ADDRESS",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// UTC timestamp alias used throughout the pipeline.
pub type Timestamp = DateTime<Utc>;
