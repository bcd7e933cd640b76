//! Users and clients within a tenant

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Access role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Gerente,
    Vendedor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Gerente => "GERENTE",
            Role::Vendedor => "VENDEDOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "GERENTE" => Ok(Role::Gerente),
            "VENDEDOR" => Ok(Role::Vendedor),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Salesperson, manager or administrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub role: Role,
}

/// Customer whose calls are recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
}
