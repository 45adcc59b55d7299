use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{HttpMethod, MenuItem, ScreenKey},
    error::PayloadError,
};

/// UI-originated actions a screen can fire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ScreenEvent {
    LoadData,
    Refresh,
    LoadMore,
    Submit,
    Delete,
    Back,
    Custom { id: String },
}

impl ScreenEvent {
    pub fn custom(id: impl Into<String>) -> Self {
        Self::Custom { id: id.into() }
    }

    pub fn id(&self) -> &str {
        match self {
            ScreenEvent::LoadData => "load_data",
            ScreenEvent::Refresh => "refresh",
            ScreenEvent::LoadMore => "load_more",
            ScreenEvent::Submit => "submit",
            ScreenEvent::Delete => "delete",
            ScreenEvent::Back => "back",
            ScreenEvent::Custom { id } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
    Null,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

pub type FieldValues = BTreeMap<String, FieldValue>;

/// Input captured at the moment a screen event fires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    pub screen_key: Option<ScreenKey>,
    #[serde(default)]
    pub field_values: FieldValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl EventContext {
    pub fn for_screen(screen_key: impl Into<ScreenKey>) -> Self {
        Self {
            screen_key: Some(screen_key.into()),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.field_values.insert(name.into(), value.into());
        self
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.field_values.get(name)
    }

    /// Trimmed text value of `name`, or `None` when absent, blank, or not text.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.field_values.get(name) {
            Some(FieldValue::Text(value)) => {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }
}

/// Network operation resolved for an event, e.g. `iam:/api/v1/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub method: HttpMethod,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            address: address.into(),
            method,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.address)
    }
}

#[must_use]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventResult {
    Success {
        message: String,
    },
    Error {
        message: String,
    },
    SubmitTo {
        endpoint: String,
        method: HttpMethod,
        field_values: FieldValues,
    },
    Logout,
    Navigate {
        target: String,
    },
}

impl EventResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn submit_to(endpoint: Endpoint, field_values: FieldValues) -> Self {
        Self::SubmitTo {
            endpoint: endpoint.address,
            method: endpoint.method,
            field_values,
        }
    }

    pub fn navigate(target: impl Into<String>) -> Self {
        Self::Navigate {
            target: target.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EventResult::Error { .. })
    }
}

/// Parses the menu payload delivered by the sync/bundle fetcher.
pub fn parse_menu_payload(raw: &str) -> Result<Vec<MenuItem>, PayloadError> {
    let items: Vec<MenuItem> = serde_json::from_str(raw)?;
    validate_menu(&items)?;
    Ok(items)
}

/// Rejects a tree in which two siblings share a key.
pub fn validate_menu(items: &[MenuItem]) -> Result<(), PayloadError> {
    let mut seen = std::collections::HashSet::new();
    for item in items {
        if !seen.insert(item.key.as_str()) {
            return Err(PayloadError::DuplicateKey(item.key.clone()));
        }
        validate_menu(&item.children)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
