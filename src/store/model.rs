//! Profile records and the explicit update / search shapes the store accepts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform user identifier (primary key of a profile).
pub type UserId = i64;

/// Chat a reply is delivered to.
pub type ChatId = i64;

/// One user's profile. Empty strings mean "not specified".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub handle: String,
    pub department: String,
    pub profession: String,
    pub experience: String,
    pub portfolio: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of the editable profile fields.
///
/// `None` leaves the stored value untouched; `Some("")` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub department: Option<String>,
    pub profession: Option<String>,
    pub experience: Option<String>,
    pub portfolio: Option<String>,
    pub location: Option<String>,
}

/// Exact-match filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub department: Option<String>,
    pub profession: Option<String>,
    pub experience: Option<String>,
    pub location: Option<String>,
}

impl SearchCriteria {
    pub fn by_profession(department: impl Into<String>, profession: impl Into<String>) -> Self {
        Self {
            department: Some(department.into()),
            profession: Some(profession.into()),
            ..Self::default()
        }
    }
}
