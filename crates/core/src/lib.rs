//! # TherapistTrack Core
//!
//! Core business logic for the TherapistTrack clinical records backend.
//!
//! This crate contains the two engines and the persistence seam they share:
//! - [`UserService`]: provisions users and their role details as a compensating saga, soft
//!   deletes them, and reconciles orphans left behind by interrupted provisioning
//! - [`RecordTemplateService`]: validates and stores doctor-owned record templates
//! - [`store`]: the [`DocumentStore`] trait with in-memory and file-backed adapters
//!
//! Every operation takes its [`ValidationRules`] explicitly and reads behaviour switches from a
//! [`CoreConfig`] resolved at startup.
//!
//! **No API concerns**: HTTP routing, request decoding and status codes belong in `api-rest`.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod repositories;
pub mod store;
pub mod validation;

pub use config::{
    compensation_policy_from_env_value, doctor_reference_check_from_env_value,
    grace_period_from_env_value, template_name_scope_from_env_value, CompensationPolicy,
    CoreConfig, DoctorReferenceCheck, TemplateNameScope,
};
pub use error::{ServiceError, ServiceResult};
pub use models::{
    AssistantDocument, CreatedTemplate, CreatedUser, DoctorDocument, FieldDocument, FieldType,
    NewField, NewRecordTemplate, NewUser, RecordTemplateDocument, Role, RoleDetails, Stored,
    UserDocument,
};
pub use repositories::record_templates::RecordTemplateService;
pub use repositories::users::{ReconcileReport, UserService};
pub use store::{Collection, DocumentStore, FileStore, MemoryStore, StoreError, UniqueIndex};
pub use validation::{Constraint, FieldRule, FieldSource, FieldValue, ValidationRules};
