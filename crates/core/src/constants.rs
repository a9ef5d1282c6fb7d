//! Constants used throughout the core crate.
//!
//! Stored document keys live here so the services, the validation rules and the reconciliation
//! job agree on spelling.

/// Field names a template may not use for its own fields.
pub const RESERVED_FIELD_NAMES: [&str; 2] = ["id", "name"];

/// Exact length of an assistant's DPI.
pub const DPI_LENGTH: usize = 13;

/// Default age (seconds) a user must reach before reconciliation treats it as orphaned.
pub const DEFAULT_ORPHAN_GRACE_SECONDS: i64 = 300;

/// Accepted naive date/time layouts, tried after RFC 3339. Naive values are taken as UTC.
pub const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Accepted date-only layout; the time is midnight UTC.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// User document keys.
pub const USER_NAMES: &str = "names";
pub const USER_LAST_NAMES: &str = "lastNames";
pub const USER_PHONES: &str = "phones";
pub const USER_MAILS: &str = "mails";
pub const USER_ROLE: &str = "role";
pub const USER_IS_ACTIVE: &str = "isActive";
pub const USER_ROLE_DEPENDENT_INFO: &str = "roleDependentInfo";

// Role-Detail document keys.
pub const DETAIL_USER: &str = "user";
pub const DOCTOR_COLLEGIATE_NUMBER: &str = "collegiateNumber";
pub const DOCTOR_SPECIALTY: &str = "specialty";
pub const ASSISTANT_START_DATE: &str = "startDate";
pub const ASSISTANT_END_DATE: &str = "endDate";
pub const ASSISTANT_DPI: &str = "DPI";

// Record template document keys.
pub const TEMPLATE_DOCTOR: &str = "doctor";
pub const TEMPLATE_NAME: &str = "name";
pub const TEMPLATE_CATEGORIES: &str = "categories";
pub const TEMPLATE_FIELDS: &str = "fields";
