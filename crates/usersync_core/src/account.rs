//! Account records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Internal identifier of an account in the local installation.
///
/// IDs are assigned by the host in ascending order; reconciliation walks
/// accounts in ascending ID order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl AccountId {
    /// Returns the raw numeric ID.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An account as the host application stores it.
///
/// `login` and `email` are each unique per installation. Roles form an
/// ordered set: insertion order is kept and duplicates are ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Internal ID (ignored on create; the store assigns one).
    #[serde(default = "unassigned")]
    pub id: AccountId,
    /// Login name.
    pub login: String,
    /// Email address.
    pub email: String,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Last name.
    #[serde(default)]
    pub last_name: String,
    /// Public display name.
    #[serde(default)]
    pub display_name: String,
    /// Website URL.
    #[serde(default)]
    pub url: String,
    /// Biography.
    #[serde(default)]
    pub description: String,
    /// Roles, in assignment order.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Free-form metadata (opaque values).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn unassigned() -> AccountId {
    AccountId(0)
}

impl Default for AccountId {
    fn default() -> Self {
        unassigned()
    }
}

impl AccountRecord {
    /// Creates a record with just the identity fields.
    pub fn new(login: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    /// Sets first and last name.
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Adds a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.add_role(role);
        self
    }

    /// Adds a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Adds a role unless already present.
    pub fn add_role(&mut self, role: impl Into<String>) {
        let role = role.into();
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
    }

    /// Replaces the whole role set: clears, then adds each role in order.
    pub fn set_roles<I, S>(&mut self, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.clear();
        for role in roles {
            self.add_role(role);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roles_are_an_ordered_set() {
        let mut account = AccountRecord::new("alice", "alice@example.com")
            .with_role("editor")
            .with_role("author")
            .with_role("editor");
        assert_eq!(account.roles, vec!["editor", "author"]);

        account.set_roles(["subscriber", "subscriber", "customer"]);
        assert_eq!(account.roles, vec!["subscriber", "customer"]);
    }

    #[test]
    fn deserialize_with_defaults() {
        let account: AccountRecord =
            serde_json::from_value(json!({"login": "bob", "email": "bob@example.com"})).unwrap();
        assert_eq!(account.id, AccountId(0));
        assert!(account.roles.is_empty());
        assert!(account.metadata.is_empty());
    }
}
