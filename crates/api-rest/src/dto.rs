//! Request and response bodies.
//!
//! Requests keep caller text as-is; conversion into core inputs is where role and field type
//! strings become closed enums.

use serde::{Deserialize, Serialize};
use tt_core::constants::{TEMPLATE_CATEGORIES, TEMPLATE_FIELDS, TEMPLATE_NAME};
use tt_core::validation::TEMPLATE_DOCTOR_ID;
use tt_core::{
    FieldSource, FieldType, FieldValue, NewField, NewRecordTemplate, NewUser,
    RecordTemplateDocument, Role, RoleDetails, ServiceError, ServiceResult, Stored, UserDocument,
};
use utoipa::ToSchema;

/// Message returned with every successful mutation.
pub const REQUEST_SUCCESS: &str = "Request successful.";

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    pub message: String,
}

impl MessageRes {
    pub fn success() -> Self {
        Self {
            message: REQUEST_SUCCESS.into(),
        }
    }
}

/// Role-specific part of a user request. Which keys are required depends on `role`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleDependentInfoReq {
    #[serde(default)]
    pub collegiate_number: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default, rename = "DPI", alias = "dpi")]
    pub dpi: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserReq {
    pub names: String,
    pub last_names: String,
    pub phones: Vec<String>,
    pub mails: Vec<String>,
    /// `Doctor`, `Assistant` or `Admin`.
    pub role: String,
    #[serde(default)]
    pub role_dependent_info: Option<RoleDependentInfoReq>,
}

fn required(value: Option<String>, field: &str) -> ServiceResult<String> {
    value.ok_or_else(|| ServiceError::MissingFields(format!("{field} is required")))
}

impl TryFrom<CreateUserReq> for NewUser {
    type Error = ServiceError;

    fn try_from(req: CreateUserReq) -> Result<Self, Self::Error> {
        let role: Role = req.role.parse()?;
        let info = req.role_dependent_info.unwrap_or_default();
        let details = match role {
            Role::Doctor => RoleDetails::Doctor {
                collegiate_number: required(info.collegiate_number, "collegiateNumber")?,
                specialty: required(info.specialty, "specialty")?,
            },
            Role::Assistant => RoleDetails::Assistant {
                start_date: required(info.start_date, "startDate")?,
                end_date: required(info.end_date, "endDate")?,
                dpi: required(info.dpi, "DPI")?,
            },
            Role::Admin => RoleDetails::Admin,
        };

        Ok(NewUser {
            names: req.names,
            last_names: req.last_names,
            phones: req.phones,
            mails: req.mails,
            details,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRes {
    pub message: String,
    pub user_id: String,
    /// Empty for admins.
    pub role_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteUserReq {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRes {
    pub id: String,
    pub names: String,
    pub last_names: String,
    pub phones: Vec<String>,
    pub mails: Vec<String>,
    pub role: String,
    pub is_active: bool,
    pub role_dependent_info: Option<String>,
    pub created_at: String,
}

impl From<Stored<UserDocument>> for UserRes {
    fn from(stored: Stored<UserDocument>) -> Self {
        let user = stored.document;
        Self {
            id: stored.id.to_string(),
            names: user.names.into_string(),
            last_names: user.last_names.into_string(),
            phones: user.phones.to_strings(),
            mails: user.mails.to_strings(),
            role: user.role.to_string(),
            is_active: user.is_active,
            role_dependent_info: user.role_dependent_info.map(|id| id.to_string()),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FieldReq {
    pub name: String,
    /// One of `TEXT`, `SHORT_TEXT`, `NUMBER`, `FLOAT`, `CHOICE`, `DATE`.
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordTemplateReq {
    pub doctor_id: String,
    pub name: String,
    pub categories: Vec<String>,
    pub fields: Vec<FieldReq>,
}

/// Exposes the raw body to the template presence rules, so an incomplete body is reported as
/// such even when it also carries an unknown field type.
impl FieldSource for CreateRecordTemplateReq {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            TEMPLATE_DOCTOR_ID => Some(FieldValue::Text(&self.doctor_id)),
            TEMPLATE_NAME => Some(FieldValue::Text(&self.name)),
            TEMPLATE_CATEGORIES => Some(FieldValue::List(
                self.categories.iter().map(String::as_str).collect(),
            )),
            TEMPLATE_FIELDS => Some(FieldValue::List(
                self.fields.iter().map(|f| f.name.as_str()).collect(),
            )),
            _ => None,
        }
    }
}

impl TryFrom<CreateRecordTemplateReq> for NewRecordTemplate {
    type Error = ServiceError;

    fn try_from(req: CreateRecordTemplateReq) -> Result<Self, Self::Error> {
        let fields = req
            .fields
            .into_iter()
            .map(|f| -> ServiceResult<NewField> {
                Ok(NewField {
                    field_type: f.field_type.parse::<FieldType>()?,
                    name: f.name,
                    options: f.options,
                    description: f.description.filter(|d| !d.is_empty()),
                })
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        Ok(NewRecordTemplate {
            doctor_id: req.doctor_id,
            name: req.name,
            categories: req.categories,
            fields,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordTemplateRes {
    pub message: String,
    pub doctor_id: String,
    pub patient_template_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordTemplateRes {
    pub id: String,
    pub doctor_id: String,
    pub name: String,
    pub categories: Vec<String>,
    pub last_update: String,
    pub fields: Vec<FieldReq>,
}

impl From<Stored<RecordTemplateDocument>> for RecordTemplateRes {
    fn from(stored: Stored<RecordTemplateDocument>) -> Self {
        let template = stored.document;
        Self {
            id: stored.id.to_string(),
            doctor_id: template.doctor.to_string(),
            name: template.name.into_string(),
            categories: template.categories.to_strings(),
            last_update: template.last_update.to_rfc3339(),
            fields: template
                .fields
                .into_vec()
                .into_iter()
                .map(|f| FieldReq {
                    name: f.name.into_string(),
                    field_type: f.field_type.to_string(),
                    options: f.options,
                    description: f.description,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListRecordTemplatesRes {
    pub templates: Vec<RecordTemplateRes>,
}
