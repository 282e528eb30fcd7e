use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role. Persisted by ordinal, so variant order is part of the
/// storage format: STUDENT=0, INSTRUCTOR=1, FACULTY=2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Instructor,
    Faculty,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Instructor => "INSTRUCTOR",
            Role::Faculty => "FACULTY",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "STUDENT" => Some(Role::Student),
            "INSTRUCTOR" => Some(Role::Instructor),
            "FACULTY" => Some(Role::Faculty),
            _ => None,
        }
    }

    pub fn ordinal(self) -> i64 {
        match self {
            Role::Student => 0,
            Role::Instructor => 1,
            Role::Faculty => 2,
        }
    }

    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(Role::Student),
            1 => Some(Role::Instructor),
            2 => Some(Role::Faculty),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}
