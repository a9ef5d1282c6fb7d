//! Record template creation and lookup.
//!
//! A template is validated in a fixed order, failing on the first problem:
//!
//! 1. `doctorId`, `name`, `categories` and `fields` are present and non-empty
//! 2. field names are unique
//! 3. no field is called `id` or `name`
//! 4. every `CHOICE` field has options
//! 5. no existing template has the same name (scope per [`TemplateNameScope`])
//! 6. the doctor reference is valid (per [`DoctorReferenceCheck`])
//!
//! Only then is the template inserted. Step 5 is a read before the write, so two concurrent
//! creations can both pass it; the insert result is what counts.

use crate::config::{CoreConfig, DoctorReferenceCheck, TemplateNameScope};
use crate::constants::{TEMPLATE_DOCTOR, TEMPLATE_NAME};
use crate::models::{
    from_document, to_document, CreatedTemplate, FieldDocument, NewRecordTemplate,
    RecordTemplateDocument, Stored,
};
use crate::store::{Collection, DocumentStore, Filter};
use crate::validation::ValidationRules;
use crate::{ServiceError, ServiceResult};
use chrono::Utc;
use std::sync::Arc;
use tt_types::{NonEmptyList, NonEmptyText};
use tt_uuid::DocumentId;

#[derive(Clone)]
pub struct RecordTemplateService {
    store: Arc<dyn DocumentStore>,
    cfg: Arc<CoreConfig>,
}

impl RecordTemplateService {
    pub fn new(store: Arc<dyn DocumentStore>, cfg: Arc<CoreConfig>) -> Self {
        Self { store, cfg }
    }

    /// Validates and stores a new record template.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::MissingFields`], [`ServiceError::DuplicateFieldNames`] or
    ///   [`ServiceError::ReservedFieldNames`] for structurally invalid input.
    /// - [`ServiceError::ResourceAlreadyExists`] when the name is taken.
    /// - [`ServiceError::DoctorNotFound`] when the doctor reference fails the configured check.
    /// - [`ServiceError::DatabaseOperationFailed`] for any other store failure.
    pub fn create_record_template(
        &self,
        template: &NewRecordTemplate,
        rules: &ValidationRules,
    ) -> ServiceResult<CreatedTemplate> {
        rules.validate_template(template)?;

        let name = text(&template.name)?;
        let raw_doctor_id = template.doctor_id.trim();

        let mut existing = Filter::new().eq(TEMPLATE_NAME, name.as_str());
        if self.cfg.template_name_scope() == TemplateNameScope::PerDoctor {
            existing = existing.eq(TEMPLATE_DOCTOR, raw_doctor_id);
        }
        if self
            .store
            .find_one(Collection::PatientTemplate, &existing)?
            .is_some()
        {
            tracing::debug!(template_name = %name, "template name already taken");
            return Err(ServiceError::ResourceAlreadyExists);
        }

        let doctor_id = self.resolve_doctor(raw_doctor_id)?;

        let fields = template
            .fields
            .iter()
            .map(|field| -> ServiceResult<FieldDocument> {
                Ok(FieldDocument {
                    name: text(&field.name)?,
                    field_type: field.field_type,
                    options: field.options.clone(),
                    description: field.description.clone(),
                })
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        let document = RecordTemplateDocument {
            doctor: doctor_id,
            name,
            categories: NonEmptyList::from_texts(&template.categories)
                .map_err(|e| ServiceError::MissingFields(format!("categories: {e}")))?,
            last_update: Utc::now(),
            fields: NonEmptyList::new(fields)
                .map_err(|e| ServiceError::MissingFields(format!("fields: {e}")))?,
        };

        let template_id = self
            .store
            .insert_one(Collection::PatientTemplate, to_document(&document)?)?;
        tracing::info!(%doctor_id, %template_id, "record template created");

        Ok(CreatedTemplate {
            doctor_id,
            template_id,
        })
    }

    fn resolve_doctor(&self, raw: &str) -> ServiceResult<DocumentId> {
        let doctor_id = DocumentId::parse(raw).map_err(|_| ServiceError::DoctorNotFound)?;

        if self.cfg.doctor_reference_check() == DoctorReferenceCheck::Existing
            && self
                .store
                .find_one(Collection::Doctor, &Filter::by_id(&doctor_id))?
                .is_none()
        {
            return Err(ServiceError::DoctorNotFound);
        }

        Ok(doctor_id)
    }

    pub fn get_record_template(
        &self,
        template_id: &DocumentId,
    ) -> ServiceResult<Stored<RecordTemplateDocument>> {
        let document = self
            .store
            .find_one(Collection::PatientTemplate, &Filter::by_id(template_id))?
            .ok_or(ServiceError::TemplateNotFound)?;
        from_document(document)
    }

    /// Templates owned by `doctor_id`, in store order.
    pub fn list_record_templates(
        &self,
        doctor_id: &DocumentId,
    ) -> ServiceResult<Vec<Stored<RecordTemplateDocument>>> {
        self.store
            .find_many(
                Collection::PatientTemplate,
                &Filter::new().eq(TEMPLATE_DOCTOR, doctor_id.to_string()),
            )?
            .into_iter()
            .map(from_document)
            .collect()
    }
}

fn text(raw: &str) -> ServiceResult<NonEmptyText> {
    NonEmptyText::new(raw).map_err(|e| ServiceError::MissingFields(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldType, NewField, NewUser, RoleDetails};
    use crate::store::faulty::{FaultyStore, Op};
    use crate::store::MemoryStore;
    use crate::UserService;

    fn field(name: &str, field_type: FieldType, options: &[&str]) -> NewField {
        NewField {
            name: name.into(),
            field_type,
            options: options.iter().map(|s| s.to_string()).collect(),
            description: None,
        }
    }

    fn template(doctor_id: &str, name: &str, fields: Vec<NewField>) -> NewRecordTemplate {
        NewRecordTemplate {
            doctor_id: doctor_id.into(),
            name: name.into(),
            categories: vec!["general".into()],
            fields,
        }
    }

    fn basic_fields() -> Vec<NewField> {
        vec![
            field("age", FieldType::Number, &[]),
            field("sex", FieldType::Choice, &["F", "M"]),
        ]
    }

    fn service(store: Arc<dyn DocumentStore>, cfg: CoreConfig) -> RecordTemplateService {
        RecordTemplateService::new(store, Arc::new(cfg))
    }

    #[test]
    fn creates_template_with_embedded_fields() {
        let store = Arc::new(MemoryStore::new());
        let templates = service(store.clone(), CoreConfig::default());
        let doctor = DocumentId::new();

        let created = templates
            .create_record_template(
                &template(&doctor.to_string(), "Intake", basic_fields()),
                &ValidationRules::default(),
            )
            .expect("template should be created");
        assert_eq!(created.doctor_id, doctor);

        let stored = templates.get_record_template(&created.template_id).unwrap();
        assert_eq!(stored.document.doctor, doctor);
        assert_eq!(stored.document.name.as_str(), "Intake");
        assert_eq!(stored.document.fields.len(), 2);
        assert_eq!(stored.document.fields.as_slice()[1].options, vec!["F", "M"]);
        assert!(stored.document.last_update <= Utc::now());
    }

    #[test]
    fn choice_without_options_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let templates = service(store.clone(), CoreConfig::default());

        let err = templates
            .create_record_template(
                &template(
                    &DocumentId::new().to_string(),
                    "Intake",
                    vec![field("age", FieldType::Choice, &[])],
                ),
                &ValidationRules::default(),
            )
            .expect_err("choice needs options");

        assert!(matches!(err, ServiceError::MissingFields(_)));
        assert_eq!(store.count(Collection::PatientTemplate).unwrap(), 0);
    }

    #[test]
    fn duplicate_and_reserved_names_write_nothing() {
        let store = Arc::new(MemoryStore::new());
        let templates = service(store.clone(), CoreConfig::default());
        let doctor = DocumentId::new().to_string();
        let rules = ValidationRules::default();

        let err = templates
            .create_record_template(
                &template(
                    &doctor,
                    "Intake",
                    vec![
                        field("age", FieldType::Number, &[]),
                        field("age", FieldType::Text, &[]),
                    ],
                ),
                &rules,
            )
            .expect_err("duplicate field");
        assert!(matches!(err, ServiceError::DuplicateFieldNames));

        let err = templates
            .create_record_template(
                &template(&doctor, "Intake", vec![field("id", FieldType::Text, &[])]),
                &rules,
            )
            .expect_err("reserved field");
        assert!(matches!(err, ServiceError::ReservedFieldNames));

        assert_eq!(store.count(Collection::PatientTemplate).unwrap(), 0);
    }

    #[test]
    fn padded_field_names_cannot_slip_past_the_checks() {
        let store = Arc::new(MemoryStore::new());
        let templates = service(store.clone(), CoreConfig::default());
        let doctor = DocumentId::new().to_string();
        let rules = ValidationRules::default();

        let err = templates
            .create_record_template(
                &template(
                    &doctor,
                    "Intake",
                    vec![
                        field("age", FieldType::Number, &[]),
                        field("age ", FieldType::Text, &[]),
                    ],
                ),
                &rules,
            )
            .expect_err("duplicate once trimmed");
        assert!(matches!(err, ServiceError::DuplicateFieldNames));

        let err = templates
            .create_record_template(
                &template(&doctor, "Intake", vec![field(" id", FieldType::Text, &[])]),
                &rules,
            )
            .expect_err("reserved once trimmed");
        assert!(matches!(err, ServiceError::ReservedFieldNames));

        assert_eq!(store.count(Collection::PatientTemplate).unwrap(), 0);
    }

    #[test]
    fn global_scope_rejects_same_name_from_any_doctor() {
        let templates = service(Arc::new(MemoryStore::new()), CoreConfig::default());
        let rules = ValidationRules::default();

        templates
            .create_record_template(
                &template(&DocumentId::new().to_string(), "Intake", basic_fields()),
                &rules,
            )
            .unwrap();
        let err = templates
            .create_record_template(
                &template(&DocumentId::new().to_string(), "Intake", basic_fields()),
                &rules,
            )
            .expect_err("name taken globally");
        assert!(matches!(err, ServiceError::ResourceAlreadyExists));
    }

    #[test]
    fn per_doctor_scope_only_rejects_same_owner() {
        let cfg = CoreConfig::default().with_template_name_scope(TemplateNameScope::PerDoctor);
        let templates = service(Arc::new(MemoryStore::new()), cfg);
        let rules = ValidationRules::default();
        let first = DocumentId::new().to_string();

        templates
            .create_record_template(&template(&first, "Intake", basic_fields()), &rules)
            .unwrap();
        templates
            .create_record_template(
                &template(&DocumentId::new().to_string(), "Intake", basic_fields()),
                &rules,
            )
            .expect("other doctor may reuse the name");
        let err = templates
            .create_record_template(&template(&first, "Intake", basic_fields()), &rules)
            .expect_err("same doctor, same name");
        assert!(matches!(err, ServiceError::ResourceAlreadyExists));
    }

    #[test]
    fn malformed_doctor_id_is_doctor_not_found() {
        let templates = service(Arc::new(MemoryStore::new()), CoreConfig::default());
        let err = templates
            .create_record_template(
                &template("not-an-id", "Intake", basic_fields()),
                &ValidationRules::default(),
            )
            .expect_err("malformed id");
        assert!(matches!(err, ServiceError::DoctorNotFound));
    }

    #[test]
    fn existing_check_requires_a_doctor_record() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let cfg = Arc::new(
            CoreConfig::default().with_doctor_reference_check(DoctorReferenceCheck::Existing),
        );
        let templates = RecordTemplateService::new(store.clone(), cfg.clone());
        let users = UserService::new(store, cfg);
        let rules = ValidationRules::default();

        let err = templates
            .create_record_template(
                &template(&DocumentId::new().to_string(), "Intake", basic_fields()),
                &rules,
            )
            .expect_err("no such doctor");
        assert!(matches!(err, ServiceError::DoctorNotFound));

        let doctor = users
            .create_user(
                &NewUser {
                    names: "Ana".into(),
                    last_names: "López".into(),
                    phones: vec!["1".into()],
                    mails: vec!["ana@example.com".into()],
                    details: RoleDetails::Doctor {
                        collegiate_number: "123".into(),
                        specialty: "Cardiology".into(),
                    },
                },
                &rules,
            )
            .unwrap();
        let role_id = doctor.role_id.unwrap();

        templates
            .create_record_template(
                &template(&role_id.to_string(), "Intake", basic_fields()),
                &rules,
            )
            .expect("doctor exists");
    }

    #[test]
    fn insert_failure_is_database_error() {
        let store = Arc::new(FaultyStore::new().fail_on(Op::Insert, Collection::PatientTemplate, 1));
        let templates = service(store, CoreConfig::default());
        let err = templates
            .create_record_template(
                &template(&DocumentId::new().to_string(), "Intake", basic_fields()),
                &ValidationRules::default(),
            )
            .expect_err("injected failure");
        assert!(matches!(err, ServiceError::DatabaseOperationFailed(_)));
    }

    #[test]
    fn lookup_and_listing() {
        let templates = service(Arc::new(MemoryStore::new()), CoreConfig::default());
        let rules = ValidationRules::default();
        let doctor = DocumentId::new();
        let other = DocumentId::new();

        for (owner, name) in [(doctor, "Intake"), (doctor, "Follow-up"), (other, "Triage")] {
            templates
                .create_record_template(&template(&owner.to_string(), name, basic_fields()), &rules)
                .unwrap();
        }

        let listed = templates.list_record_templates(&doctor).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|t| t.document.doctor == doctor));

        let err = templates
            .get_record_template(&DocumentId::new())
            .expect_err("unknown template");
        assert!(matches!(err, ServiceError::TemplateNotFound));
    }
}
