//! # Roles
//!
//! Explicit per-registry role membership. Each [`Role`] maps to a set of
//! addresses; membership checks are hash lookups.
//!
//! Roles carry a 32-byte identifier, `SHA-256("<NAME>_ROLE")`, so that tools
//! written against EVM access-control conventions compute the same ids.

use humanpass_protocol::crypto::sha256;
use humanpass_protocol::identity::Address;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// A capability within one credential registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Manages the other roles. Exactly one member once initialized.
    Admin,
    /// May mint credentials, to itself only.
    Issuer,
    /// May revoke credentials whose mode permits issuer-side burns.
    Burner,
}

impl Role {
    /// Every role, in schema order.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Issuer, Role::Burner];

    /// Canonical role name, as hashed into [`Role::id`].
    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN_ROLE",
            Role::Issuer => "ISSUER_ROLE",
            Role::Burner => "BURNER_ROLE",
        }
    }

    /// The 32-byte role identifier.
    pub fn id(&self) -> [u8; 32] {
        sha256(self.name().as_bytes())
    }

    /// The role whose members may grant and revoke this one.
    pub fn admin_role(&self) -> Role {
        Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Issuer => write!(f, "ISSUER"),
            Role::Burner => write!(f, "BURNER"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().trim_end_matches("_ROLE") {
            "ADMIN" => Ok(Role::Admin),
            "ISSUER" | "MINTER" => Ok(Role::Issuer),
            "BURNER" => Ok(Role::Burner),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Role memberships for one registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet {
    members: HashMap<Role, HashSet<Address>>,
}

impl RoleSet {
    /// An empty role set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `account` holds `role`.
    pub fn has(&self, role: Role, account: &Address) -> bool {
        self.members
            .get(&role)
            .is_some_and(|set| set.contains(account))
    }

    /// Whether `account` holds any of `roles`.
    pub fn has_any(&self, roles: &[Role], account: &Address) -> bool {
        roles.iter().any(|role| self.has(*role, account))
    }

    /// Add `account` to `role`. Returns `false` if it was already a member.
    pub fn grant(&mut self, role: Role, account: Address) -> bool {
        self.members.entry(role).or_default().insert(account)
    }

    /// Remove `account` from `role`. Returns `false` if it was not a member.
    pub fn revoke(&mut self, role: Role, account: &Address) -> bool {
        match self.members.get_mut(&role) {
            Some(set) => set.remove(account),
            None => false,
        }
    }

    /// Make `account` the only member of `role`, returning the previous
    /// members. Used for the single-holder admin role.
    pub fn replace_all(&mut self, role: Role, account: Address) -> Vec<Address> {
        let set = self.members.entry(role).or_default();
        let previous: Vec<Address> = set.drain().filter(|a| *a != account).collect();
        set.insert(account);
        previous
    }

    /// Number of members of `role`.
    pub fn member_count(&self, role: Role) -> usize {
        self.members.get(&role).map_or(0, HashSet::len)
    }

    /// Members of `role`, sorted for stable output.
    pub fn members(&self, role: Role) -> Vec<Address> {
        let mut out: Vec<Address> = self
            .members
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }
}
