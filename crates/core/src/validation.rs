//! Input validation rules.
//!
//! [`ValidationRules`] is a plain value handed to every engine operation. It holds
//! `{field: constraint}` tables per input kind plus the template reserved names and the accepted
//! date layouts. Inputs expose their fields through [`FieldSource`]; the rules never reach into
//! input structs directly, so a table can name any field an input exposes.
//!
//! Everything here runs before the first store write.

use crate::constants::{
    ASSISTANT_DPI, ASSISTANT_END_DATE, ASSISTANT_START_DATE, DATE_FORMAT, DATE_TIME_FORMATS,
    DOCTOR_COLLEGIATE_NUMBER, DOCTOR_SPECIALTY, DPI_LENGTH, RESERVED_FIELD_NAMES,
    TEMPLATE_CATEGORIES, TEMPLATE_FIELDS, TEMPLATE_NAME, USER_LAST_NAMES, USER_MAILS, USER_NAMES,
    USER_PHONES,
};
use crate::models::{NewRecordTemplate, NewUser, RoleDetails};
use crate::{ServiceError, ServiceResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashSet;
use tt_types::{NonEmptyList, NonEmptyText};

/// Key under which a template input exposes its doctor reference.
pub const TEMPLATE_DOCTOR_ID: &str = "doctorId";

/// A check applied to one input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Text with at least one non-whitespace character.
    NonEmpty,
    /// At least one item, none of them blank.
    NonEmptyList,
    /// Exactly `n` ASCII digits.
    Digits(usize),
    /// Parses with one of the accepted date layouts.
    DateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub field: String,
    pub constraint: Constraint,
}

impl FieldRule {
    pub fn new(field: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            field: field.into(),
            constraint,
        }
    }
}

/// A field value as seen by the rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    List(Vec<&'a str>),
}

/// Something whose fields can be checked against a rule table.
pub trait FieldSource {
    /// Value of `name`, or `None` if this input has no such field.
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

impl FieldSource for NewUser {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            USER_NAMES => Some(FieldValue::Text(&self.names)),
            USER_LAST_NAMES => Some(FieldValue::Text(&self.last_names)),
            USER_PHONES => Some(FieldValue::List(self.phones.iter().map(String::as_str).collect())),
            USER_MAILS => Some(FieldValue::List(self.mails.iter().map(String::as_str).collect())),
            _ => None,
        }
    }
}

impl FieldSource for RoleDetails {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match (self, name) {
            (RoleDetails::Doctor { collegiate_number, .. }, DOCTOR_COLLEGIATE_NUMBER) => {
                Some(FieldValue::Text(collegiate_number))
            }
            (RoleDetails::Doctor { specialty, .. }, DOCTOR_SPECIALTY) => {
                Some(FieldValue::Text(specialty))
            }
            (RoleDetails::Assistant { start_date, .. }, ASSISTANT_START_DATE) => {
                Some(FieldValue::Text(start_date))
            }
            (RoleDetails::Assistant { end_date, .. }, ASSISTANT_END_DATE) => {
                Some(FieldValue::Text(end_date))
            }
            (RoleDetails::Assistant { dpi, .. }, ASSISTANT_DPI) => Some(FieldValue::Text(dpi)),
            _ => None,
        }
    }
}

impl FieldSource for NewRecordTemplate {
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

/// Role-specific values that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ValidatedDetails {
    Doctor {
        collegiate_number: NonEmptyText,
        specialty: NonEmptyText,
    },
    Assistant {
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        dpi: String,
    },
    Admin,
}

/// User values that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedUser {
    pub names: NonEmptyText,
    pub last_names: NonEmptyText,
    pub phones: NonEmptyList<NonEmptyText>,
    pub mails: NonEmptyList<NonEmptyText>,
    pub details: ValidatedDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    pub user: Vec<FieldRule>,
    pub doctor: Vec<FieldRule>,
    pub assistant: Vec<FieldRule>,
    pub template: Vec<FieldRule>,
    pub reserved_field_names: Vec<String>,
    /// Naive layouts tried after RFC 3339, in order.
    pub date_formats: Vec<String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            user: vec![
                FieldRule::new(USER_NAMES, Constraint::NonEmpty),
                FieldRule::new(USER_LAST_NAMES, Constraint::NonEmpty),
                FieldRule::new(USER_PHONES, Constraint::NonEmptyList),
                FieldRule::new(USER_MAILS, Constraint::NonEmptyList),
            ],
            doctor: vec![
                FieldRule::new(DOCTOR_COLLEGIATE_NUMBER, Constraint::NonEmpty),
                FieldRule::new(DOCTOR_SPECIALTY, Constraint::NonEmpty),
            ],
            assistant: vec![
                FieldRule::new(ASSISTANT_START_DATE, Constraint::DateTime),
                FieldRule::new(ASSISTANT_END_DATE, Constraint::DateTime),
                FieldRule::new(ASSISTANT_DPI, Constraint::Digits(DPI_LENGTH)),
            ],
            template: vec![
                FieldRule::new(TEMPLATE_DOCTOR_ID, Constraint::NonEmpty),
                FieldRule::new(TEMPLATE_NAME, Constraint::NonEmpty),
                FieldRule::new(TEMPLATE_CATEGORIES, Constraint::NonEmptyList),
                FieldRule::new(TEMPLATE_FIELDS, Constraint::NonEmptyList),
            ],
            reserved_field_names: RESERVED_FIELD_NAMES.iter().map(|s| s.to_string()).collect(),
            date_formats: DATE_TIME_FORMATS
                .iter()
                .chain(std::iter::once(&DATE_FORMAT))
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ValidationRules {
    /// Checks every rule in `table` against `source`, failing on the first violation.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::MissingFields`] naming the offending field.
    pub fn check(&self, table: &[FieldRule], source: &dyn FieldSource) -> ServiceResult<()> {
        for rule in table {
            let Some(value) = source.field(&rule.field) else {
                return Err(ServiceError::MissingFields(format!("{} is required", rule.field)));
            };
            if !self.satisfies(rule.constraint, &value) {
                return Err(ServiceError::MissingFields(format!(
                    "{} does not satisfy {:?}",
                    rule.field, rule.constraint
                )));
            }
        }
        Ok(())
    }

    fn satisfies(&self, constraint: Constraint, value: &FieldValue<'_>) -> bool {
        match (constraint, value) {
            (Constraint::NonEmpty, FieldValue::Text(text)) => NonEmptyText::new(text).is_ok(),
            (Constraint::NonEmptyList, FieldValue::List(items)) => {
                NonEmptyList::from_texts(items).is_ok()
            }
            (Constraint::Digits(n), FieldValue::Text(text)) => {
                text.len() == n && text.bytes().all(|b| b.is_ascii_digit())
            }
            (Constraint::DateTime, FieldValue::Text(text)) => self.parse_date_time(text).is_some(),
            _ => false,
        }
    }

    /// Parses `raw` as RFC 3339, then with each naive layout (as UTC).
    pub fn parse_date_time(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        self.date_formats.iter().find_map(|format| {
            NaiveDateTime::parse_from_str(raw, format)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(raw, format)
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(|naive| naive.and_utc())
        })
    }

    /// Validates a user and its role details.
    ///
    /// Assistant date order is checked here too, so a rejected assistant never reaches the store.
    pub(crate) fn validate_user(&self, user: &NewUser) -> ServiceResult<ValidatedUser> {
        self.check(&self.user, user)?;

        let details = match &user.details {
            RoleDetails::Doctor {
                collegiate_number,
                specialty,
            } => {
                self.check(&self.doctor, &user.details)?;
                ValidatedDetails::Doctor {
                    collegiate_number: required_text(DOCTOR_COLLEGIATE_NUMBER, collegiate_number)?,
                    specialty: required_text(DOCTOR_SPECIALTY, specialty)?,
                }
            }
            RoleDetails::Assistant {
                start_date,
                end_date,
                dpi,
            } => {
                self.check(&self.assistant, &user.details)?;
                let start_date = self.required_date(ASSISTANT_START_DATE, start_date)?;
                let end_date = self.required_date(ASSISTANT_END_DATE, end_date)?;
                if start_date >= end_date {
                    return Err(ServiceError::InvalidDateOrder);
                }
                ValidatedDetails::Assistant {
                    start_date,
                    end_date,
                    dpi: dpi.trim().to_owned(),
                }
            }
            RoleDetails::Admin => ValidatedDetails::Admin,
        };

        Ok(ValidatedUser {
            names: required_text(USER_NAMES, &user.names)?,
            last_names: required_text(USER_LAST_NAMES, &user.last_names)?,
            phones: required_list(USER_PHONES, &user.phones)?,
            mails: required_list(USER_MAILS, &user.mails)?,
            details,
        })
    }

    /// Runs the structural template checks: presence, unique field names, reserved names and
    /// choice options, in that order.
    pub(crate) fn validate_template(&self, template: &NewRecordTemplate) -> ServiceResult<()> {
        self.check(&self.template, template)?;

        // Names are stored trimmed, so they are compared trimmed.
        let names: Vec<&str> = template.fields.iter().map(|f| f.name.trim()).collect();

        let mut seen = HashSet::with_capacity(names.len());
        if !names.iter().all(|name| seen.insert(*name)) {
            return Err(ServiceError::DuplicateFieldNames);
        }

        if names
            .iter()
            .any(|name| self.reserved_field_names.iter().any(|r| r.as_str() == *name))
        {
            return Err(ServiceError::ReservedFieldNames);
        }

        if let Some(field) = template
            .fields
            .iter()
            .find(|f| f.field_type.requires_options() && NonEmptyList::from_texts(&f.options).is_err())
        {
            return Err(ServiceError::MissingFields(format!(
                "field '{}' of type {} needs options",
                field.name, field.field_type
            )));
        }

        Ok(())
    }

    fn required_date(&self, field: &str, raw: &str) -> ServiceResult<DateTime<Utc>> {
        self.parse_date_time(raw)
            .ok_or_else(|| ServiceError::MissingFields(format!("{field} is not a valid date")))
    }
}

fn required_text(field: &str, raw: &str) -> ServiceResult<NonEmptyText> {
    NonEmptyText::new(raw).map_err(|e| ServiceError::MissingFields(format!("{field}: {e}")))
}

fn required_list(field: &str, raw: &[String]) -> ServiceResult<NonEmptyList<NonEmptyText>> {
    NonEmptyList::from_texts(raw).map_err(|e| ServiceError::MissingFields(format!("{field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldType, NewField};

    fn assistant(start: &str, end: &str, dpi: &str) -> NewUser {
        NewUser {
            names: "Luis".into(),
            last_names: "Gómez".into(),
            phones: vec!["55551234".into()],
            mails: vec!["luis@example.com".into()],
            details: RoleDetails::Assistant {
                start_date: start.into(),
                end_date: end.into(),
                dpi: dpi.into(),
            },
        }
    }

    fn field(name: &str, field_type: FieldType, options: &[&str]) -> NewField {
        NewField {
            name: name.into(),
            field_type,
            options: options.iter().map(|s| s.to_string()).collect(),
            description: None,
        }
    }

    fn template(fields: Vec<NewField>) -> NewRecordTemplate {
        NewRecordTemplate {
            doctor_id: "550e8400e29b41d4a716446655440000".into(),
            name: "Intake".into(),
            categories: vec!["general".into()],
            fields,
        }
    }

    #[test]
    fn parses_accepted_date_layouts() {
        let rules = ValidationRules::default();
        for raw in [
            "2024-01-01",
            "2024-01-01T10:30:00Z",
            "2024-01-01T10:30:00+02:00",
            "2024-01-01T10:30:00",
            "2024-01-01T10:30",
            "2024-01-01 10:30:00",
            "2024-01-01 10:30",
        ] {
            assert!(rules.parse_date_time(raw).is_some(), "{raw} should parse");
        }
        assert!(rules.parse_date_time("01/05/2024").is_none());
        assert!(rules.parse_date_time("2024-13-01").is_none());
    }

    #[test]
    fn date_only_values_are_midnight_utc() {
        let parsed = ValidationRules::default().parse_date_time("2024-05-01").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T00:00:00+00:00");
    }

    #[test]
    fn assistant_with_reversed_dates_fails_date_order() {
        let err = ValidationRules::default()
            .validate_user(&assistant("2024-05-01", "2024-01-01", "1234567890123"))
            .expect_err("start after end");
        assert!(matches!(err, ServiceError::InvalidDateOrder));
    }

    #[test]
    fn assistant_with_equal_dates_fails_date_order() {
        let err = ValidationRules::default()
            .validate_user(&assistant("2024-05-01", "2024-05-01", "1234567890123"))
            .expect_err("start equal to end");
        assert!(matches!(err, ServiceError::InvalidDateOrder));
    }

    #[test]
    fn dpi_must_be_thirteen_digits() {
        let rules = ValidationRules::default();
        for dpi in ["123456789012", "12345678901234", "12345678901a3", ""] {
            let err = rules
                .validate_user(&assistant("2024-01-01", "2024-05-01", dpi))
                .expect_err("bad dpi");
            assert!(matches!(err, ServiceError::MissingFields(_)), "dpi {dpi:?}");
        }
        rules
            .validate_user(&assistant("2024-01-01", "2024-05-01", "1234567890123"))
            .expect("valid assistant");
    }

    #[test]
    fn unparseable_date_is_missing_fields() {
        let err = ValidationRules::default()
            .validate_user(&assistant("tomorrow", "2024-05-01", "1234567890123"))
            .expect_err("bad date");
        assert!(matches!(err, ServiceError::MissingFields(_)));
    }

    #[test]
    fn doctor_requires_collegiate_number_and_specialty() {
        let user = NewUser {
            names: "Ana".into(),
            last_names: "López".into(),
            phones: vec!["1".into()],
            mails: vec!["ana@example.com".into()],
            details: RoleDetails::Doctor {
                collegiate_number: "  ".into(),
                specialty: "Cardiology".into(),
            },
        };
        let err = ValidationRules::default()
            .validate_user(&user)
            .expect_err("blank collegiate number");
        assert!(matches!(err, ServiceError::MissingFields(msg) if msg.contains("collegiateNumber")));
    }

    #[test]
    fn user_lists_reject_empty_and_blank_entries() {
        let rules = ValidationRules::default();
        let mut user = assistant("2024-01-01", "2024-05-01", "1234567890123");
        user.mails.clear();
        assert!(matches!(rules.validate_user(&user), Err(ServiceError::MissingFields(_))));

        user.mails = vec![" ".into()];
        assert!(matches!(rules.validate_user(&user), Err(ServiceError::MissingFields(_))));
    }

    #[test]
    fn custom_table_can_require_extra_fields() {
        let mut rules = ValidationRules::default();
        rules.user.push(FieldRule::new("nickname", Constraint::NonEmpty));
        let err = rules
            .validate_user(&assistant("2024-01-01", "2024-05-01", "1234567890123"))
            .expect_err("input has no nickname");
        assert!(matches!(err, ServiceError::MissingFields(msg) if msg == "nickname is required"));
    }

    #[test]
    fn template_checks_run_in_order() {
        let rules = ValidationRules::default();

        let err = rules
            .validate_template(&template(vec![]))
            .expect_err("no fields");
        assert!(matches!(err, ServiceError::MissingFields(_)));

        // Duplicate wins over reserved when both apply.
        let err = rules
            .validate_template(&template(vec![
                field("id", FieldType::Text, &[]),
                field("id", FieldType::Text, &[]),
            ]))
            .expect_err("duplicate");
        assert!(matches!(err, ServiceError::DuplicateFieldNames));

        let err = rules
            .validate_template(&template(vec![field("name", FieldType::Text, &[])]))
            .expect_err("reserved");
        assert!(matches!(err, ServiceError::ReservedFieldNames));

        let err = rules
            .validate_template(&template(vec![field("age", FieldType::Choice, &[])]))
            .expect_err("choice without options");
        assert!(matches!(err, ServiceError::MissingFields(_)));
    }

    #[test]
    fn padded_field_names_are_compared_trimmed() {
        let rules = ValidationRules::default();

        let err = rules
            .validate_template(&template(vec![
                field("age", FieldType::Number, &[]),
                field("age ", FieldType::Text, &[]),
            ]))
            .expect_err("same name once trimmed");
        assert!(matches!(err, ServiceError::DuplicateFieldNames));

        let err = rules
            .validate_template(&template(vec![field(" id", FieldType::Text, &[])]))
            .expect_err("reserved once trimmed");
        assert!(matches!(err, ServiceError::ReservedFieldNames));
    }

    #[test]
    fn field_names_are_case_sensitive() {
        let rules = ValidationRules::default();
        rules
            .validate_template(&template(vec![
                field("Age", FieldType::Number, &[]),
                field("age", FieldType::Number, &[]),
                field("Name", FieldType::Text, &[]),
                field("sex", FieldType::Choice, &["F", "M"]),
            ]))
            .expect("distinct by case and not reserved");
    }
}
