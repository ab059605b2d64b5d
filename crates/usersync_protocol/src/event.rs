//! Change events.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use usersync_core::AccountRecord;

/// What a change event asks the receiver to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Create the account (upserts if it already exists).
    Create,
    /// Update the account (creates it if missing).
    Update,
    /// Delete the account.
    Delete,
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// Parses a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "create" => Some(Action::Create),
            "update" => Some(Action::Update),
            "delete" => Some(Action::Delete),
            _ => None,
        }
    }
}

/// A serialized description of an account change.
///
/// `user_login` and `user_email` are always present. Profile fields, roles
/// and metadata are optional; delete events carry only the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Requested action.
    pub action: Action,
    /// Account login.
    pub user_login: String,
    /// Account email.
    pub user_email: String,
    /// First name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Website URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_url: Option<String>,
    /// Biography.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Full role set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    /// Metadata entries to upsert.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "meta")]
    pub user_meta: Option<BTreeMap<String, Value>>,
}

impl ChangeEvent {
    /// Creates an event carrying only the identity.
    pub fn new(action: Action, login: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            action,
            user_login: login.into(),
            user_email: email.into(),
            first_name: None,
            last_name: None,
            display_name: None,
            user_url: None,
            description: None,
            roles: None,
            user_meta: None,
        }
    }

    /// Creates an event with the account's identity and profile fields.
    pub fn from_account(action: Action, account: &AccountRecord) -> Self {
        Self {
            first_name: Some(account.first_name.clone()),
            last_name: Some(account.last_name.clone()),
            display_name: Some(account.display_name.clone()),
            user_url: Some(account.url.clone()),
            description: Some(account.description.clone()),
            ..Self::new(action, &account.login, &account.email)
        }
    }

    /// Creates a delete event for the account.
    pub fn delete(account: &AccountRecord) -> Self {
        Self::new(Action::Delete, &account.login, &account.email)
    }

    /// Attaches the role set.
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Attaches metadata.
    pub fn with_meta(mut self, meta: BTreeMap<String, Value>) -> Self {
        self.user_meta = Some(meta);
        self
    }

    /// Serializes to a JSON string.
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reads an inbound event.
    ///
    /// Checks happen in a fixed order: the identity fields first (non-empty
    /// strings, else [`ProtocolError::InvalidData`]), then the action
    /// (missing means `update`, anything unknown is
    /// [`ProtocolError::UnknownAction`]). Optional fields of the wrong type
    /// are ignored rather than rejected.
    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        let object = value.as_object().ok_or_else(missing_identity)?;

        let login = non_empty(object, "user_login").ok_or_else(missing_identity)?;
        let email = non_empty(object, "user_email").ok_or_else(missing_identity)?;

        let action = match object.get("action") {
            None | Some(Value::Null) => Action::Update,
            Some(Value::String(name)) => {
                Action::parse(name).ok_or_else(|| ProtocolError::UnknownAction(name.clone()))?
            }
            Some(other) => return Err(ProtocolError::UnknownAction(other.to_string())),
        };

        let mut event = Self::new(action, login, email);
        event.first_name = text(object, "first_name");
        event.last_name = text(object, "last_name");
        event.display_name = text(object, "display_name");
        event.user_url = text(object, "user_url");
        event.description = text(object, "description");
        event.roles = roles(object);
        event.user_meta = object
            .get("user_meta")
            .or_else(|| object.get("meta"))
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        Ok(event)
    }

    /// Parses an inbound event from JSON text.
    pub fn from_json(text: &str) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }
}

fn missing_identity() -> ProtocolError {
    ProtocolError::InvalidData("user_login and user_email are required".into())
}

fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn non_empty(object: &Map<String, Value>, key: &str) -> Option<String> {
    text(object, key)
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Roles may be sent as a list or as a single name.
fn roles(object: &Map<String, Value>) -> Option<Vec<String>> {
    match object.get("roles")? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
        ),
        Value::String(role) => Some(vec![role.clone()]),
        _ => None,
    }
}
