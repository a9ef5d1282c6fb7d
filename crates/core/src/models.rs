//! Inputs, outputs and stored document shapes for both engines.
//!
//! Inputs (`NewUser`, `NewRecordTemplate`) carry raw caller text and are only trusted after
//! [`ValidationRules`](crate::ValidationRules) has checked them. Documents carry validated
//! values and serialise with the camelCase keys listed in [`crate::constants`].

use crate::store::{Document, StoreError, ID_FIELD};
use crate::{ServiceError, ServiceResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tt_types::{NonEmptyList, NonEmptyText};
use tt_uuid::DocumentId;

/// Role a user is provisioned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Doctor,
    Assistant,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "Doctor",
            Role::Assistant => "Assistant",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Doctor" => Ok(Role::Doctor),
            "Assistant" => Ok(Role::Assistant),
            "Admin" => Ok(Role::Admin),
            other => Err(ServiceError::MissingFields(format!("unknown role '{other}'"))),
        }
    }
}

/// Role-specific input supplied alongside a new user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleDetails {
    Doctor {
        collegiate_number: String,
        specialty: String,
    },
    Assistant {
        start_date: String,
        end_date: String,
        dpi: String,
    },
    Admin,
}

impl RoleDetails {
    pub fn role(&self) -> Role {
        match self {
            RoleDetails::Doctor { .. } => Role::Doctor,
            RoleDetails::Assistant { .. } => Role::Assistant,
            RoleDetails::Admin => Role::Admin,
        }
    }
}

/// A user to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub names: String,
    pub last_names: String,
    pub phones: Vec<String>,
    pub mails: Vec<String>,
    pub details: RoleDetails,
}

impl NewUser {
    pub fn role(&self) -> Role {
        self.details.role()
    }
}

/// Outcome of a successful provisioning. `role_id` is `None` for admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedUser {
    pub user_id: DocumentId,
    pub role_id: Option<DocumentId>,
}

/// Types a template field may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum FieldType {
    Text,
    ShortText,
    Number,
    Float,
    Choice,
    Date,
}

impl FieldType {
    pub const ALL: [FieldType; 6] = [
        FieldType::Text,
        FieldType::ShortText,
        FieldType::Number,
        FieldType::Float,
        FieldType::Choice,
        FieldType::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::ShortText => "SHORT_TEXT",
            FieldType::Number => "NUMBER",
            FieldType::Float => "FLOAT",
            FieldType::Choice => "CHOICE",
            FieldType::Date => "DATE",
        }
    }

    /// Only `CHOICE` fields carry options.
    pub fn requires_options(&self) -> bool {
        matches!(self, FieldType::Choice)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ServiceError::InvalidFieldType(s.to_owned()))
    }
}

impl TryFrom<String> for FieldType {
    type Error = ServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A field of a template being created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A template to create.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecordTemplate {
    pub doctor_id: String,
    pub name: String,
    pub categories: Vec<String>,
    pub fields: Vec<NewField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedTemplate {
    pub doctor_id: DocumentId,
    pub template_id: DocumentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    pub names: NonEmptyText,
    pub last_names: NonEmptyText,
    pub phones: NonEmptyList<NonEmptyText>,
    pub mails: NonEmptyList<NonEmptyText>,
    pub role: Role,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_dependent_info: Option<DocumentId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorDocument {
    pub user: DocumentId,
    pub collegiate_number: NonEmptyText,
    pub specialty: NonEmptyText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantDocument {
    pub user: DocumentId,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(rename = "DPI")]
    pub dpi: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDocument {
    pub name: NonEmptyText,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTemplateDocument {
    pub doctor: DocumentId,
    pub name: NonEmptyText,
    pub categories: NonEmptyList<NonEmptyText>,
    pub last_update: DateTime<Utc>,
    pub fields: NonEmptyList<FieldDocument>,
}

/// A decoded document together with its store identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stored<T> {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(flatten)]
    pub document: T,
}

/// Serialises `value` into a store document.
pub(crate) fn to_document<T: Serialize>(value: &T) -> ServiceResult<Document> {
    match serde_json::to_value(value).map_err(StoreError::from)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidDocument("document must serialise to an object".into()).into()),
    }
}

/// Decodes a store document, keeping its `_id`.
pub(crate) fn from_document<T: DeserializeOwned>(document: Document) -> ServiceResult<Stored<T>> {
    if !document.contains_key(ID_FIELD) {
        return Err(StoreError::InvalidDocument("document has no _id".into()).into());
    }
    serde_json::from_value(serde_json::Value::Object(document))
        .map_err(|e| StoreError::from(e).into())
}
