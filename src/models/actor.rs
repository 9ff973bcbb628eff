// src/models/actor.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{error::AppError, utils::jwt::Claims};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::AuthError(format!("Unknown role '{}'", other))),
        }
    }
}

/// The authenticated caller, as resolved by the access policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    /// Admins, or the teacher who owns the resource.
    pub fn can_manage(&self, owner_id: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Teacher => self.id == owner_id,
            Role::Student => false,
        }
    }
}

impl TryFrom<&Claims> for Actor {
    type Error = AppError;

    fn try_from(claims: &Claims) -> Result<Self, Self::Error> {
        if claims.sub.is_empty() {
            return Err(AppError::AuthError("Token has no subject".to_string()));
        }
        Ok(Actor {
            id: claims.sub.clone(),
            role: claims.role.parse()?,
        })
    }
}
