use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of roles an account can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    DivisionChief,
    Ocd,
    Administrator,
    Supervisor,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Employee,
        Role::DivisionChief,
        Role::Ocd,
        Role::Administrator,
        Role::Supervisor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::DivisionChief => "division_chief",
            Role::Ocd => "ocd",
            Role::Administrator => "administrator",
            Role::Supervisor => "supervisor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller of a workflow operation.
///
/// Always passed explicitly; the engine never looks up a current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i64, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }
}
