//! User provisioning.
//!
//! Creating a Doctor or Assistant touches two collections: the User document, then its
//! Role-Detail, then a back-fill of the User's `roleDependentInfo`. The store only guarantees
//! single-document atomicity, so creation runs as a saga. Once the User exists, any failure is
//! handled according to the configured [`CompensationPolicy`]:
//!
//! - `Compensate` deletes whatever was written, newest first, and reports the step error.
//! - `LeaveForReconciliation` leaves the partial state in place; [`UserService::reconcile_orphans`]
//!   later back-fills or removes it.
//!
//! All validation happens before the User insert, so invalid input never writes anything.

use crate::config::{CompensationPolicy, CoreConfig};
use crate::constants::{DETAIL_USER, USER_IS_ACTIVE, USER_ROLE, USER_ROLE_DEPENDENT_INFO};
use crate::models::{
    from_document, to_document, AssistantDocument, CreatedUser, DoctorDocument, NewUser, Role,
    Stored, UserDocument,
};
use crate::store::{document_id, Collection, DocumentStore, Filter, StoreResult, Update};
use crate::validation::{ValidatedDetails, ValidationRules};
use crate::{ServiceError, ServiceResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tt_uuid::DocumentId;

/// Collection holding the Role-Detail for `role`, if the role has one.
fn detail_collection(role: Role) -> Option<Collection> {
    match role {
        Role::Doctor => Some(Collection::Doctor),
        Role::Assistant => Some(Collection::Assistant),
        Role::Admin => None,
    }
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Users whose missing reference was restored from an existing Role-Detail.
    pub backfilled: Vec<DocumentId>,
    /// Users removed because no Role-Detail was ever written for them.
    pub removed: Vec<DocumentId>,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    cfg: Arc<CoreConfig>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, cfg: Arc<CoreConfig>) -> Self {
        Self { store, cfg }
    }

    /// Provisions a user and, for Doctors and Assistants, its Role-Detail.
    ///
    /// # Returns
    ///
    /// The new user id and the Role-Detail id (`None` for admins). On success the user's
    /// `roleDependentInfo` points at a Role-Detail that exists.
    ///
    /// # Errors
    ///
    /// - Validation failures ([`ServiceError::MissingFields`], [`ServiceError::InvalidDateOrder`])
    ///   are returned before any write.
    /// - A duplicate indexed value (e.g. a mail already in use) yields
    ///   [`ServiceError::ResourceAlreadyExists`].
    /// - Any other store failure yields [`ServiceError::DatabaseOperationFailed`].
    /// - If compensation runs and itself fails, [`ServiceError::CompensationFailed`] carries both
    ///   errors.
    pub fn create_user(
        &self,
        user: &NewUser,
        rules: &ValidationRules,
    ) -> ServiceResult<CreatedUser> {
        let validated = rules.validate_user(user)?;
        let role = user.role();

        let user_document = to_document(&UserDocument {
            names: validated.names,
            last_names: validated.last_names,
            phones: validated.phones,
            mails: validated.mails,
            role,
            is_active: true,
            role_dependent_info: None,
            created_at: Utc::now(),
        })?;
        let user_id = self.store.insert_one(Collection::User, user_document)?;
        tracing::info!(%user_id, %role, "user inserted");

        if matches!(validated.details, ValidatedDetails::Admin) {
            return Ok(CreatedUser {
                user_id,
                role_id: None,
            });
        }

        let mut written: Option<(Collection, DocumentId)> = None;
        match self.attach_role_detail(user_id, validated.details, &mut written) {
            Ok(role_id) => {
                tracing::info!(%user_id, %role_id, "user provisioned");
                Ok(CreatedUser {
                    user_id,
                    role_id: Some(role_id),
                })
            }
            Err(step_error) => Err(self.handle_step_failure(user_id, written, step_error)),
        }
    }

    /// Inserts the Role-Detail and back-fills the user's reference to it.
    ///
    /// `written` records the Role-Detail as soon as it exists so the caller can undo it.
    fn attach_role_detail(
        &self,
        user_id: DocumentId,
        details: ValidatedDetails,
        written: &mut Option<(Collection, DocumentId)>,
    ) -> ServiceResult<DocumentId> {
        let (collection, document) = match details {
            ValidatedDetails::Doctor {
                collegiate_number,
                specialty,
            } => (
                Collection::Doctor,
                to_document(&DoctorDocument {
                    user: user_id,
                    collegiate_number,
                    specialty,
                })?,
            ),
            ValidatedDetails::Assistant {
                start_date,
                end_date,
                dpi,
            } => (
                Collection::Assistant,
                to_document(&AssistantDocument {
                    user: user_id,
                    start_date,
                    end_date,
                    dpi,
                })?,
            ),
            ValidatedDetails::Admin => {
                return Err(ServiceError::MissingFields(
                    "admins have no role details".into(),
                ))
            }
        };

        let role_id = self.store.insert_one(collection, document)?;
        *written = Some((collection, role_id));
        tracing::debug!(%user_id, %role_id, %collection, "role detail inserted");

        let matched = self.store.update_one(
            Collection::User,
            &Filter::by_id(&user_id),
            &Update::new().set(USER_ROLE_DEPENDENT_INFO, role_id.to_string()),
        )?;
        if matched == 0 {
            return Err(ServiceError::UserNotFound);
        }

        Ok(role_id)
    }

    fn handle_step_failure(
        &self,
        user_id: DocumentId,
        written: Option<(Collection, DocumentId)>,
        step_error: ServiceError,
    ) -> ServiceError {
        match self.cfg.compensation_policy() {
            CompensationPolicy::Compensate => match self.compensate(user_id, written) {
                Ok(()) => {
                    tracing::warn!(%user_id, error = %step_error, "user creation rolled back");
                    step_error
                }
                Err(cleanup_error) => {
                    tracing::error!(
                        %user_id,
                        error = %step_error,
                        cleanup_error = %cleanup_error,
                        "user creation failed and rollback failed"
                    );
                    ServiceError::CompensationFailed {
                        source: Box::new(step_error),
                        cleanup_error,
                    }
                }
            },
            CompensationPolicy::LeaveForReconciliation => {
                tracing::warn!(
                    %user_id,
                    error = %step_error,
                    "user creation incomplete; left for reconciliation"
                );
                step_error
            }
        }
    }

    /// Deletes the Role-Detail (if written) and then the user.
    fn compensate(
        &self,
        user_id: DocumentId,
        written: Option<(Collection, DocumentId)>,
    ) -> StoreResult<()> {
        if let Some((collection, role_id)) = written {
            self.store.delete_one(collection, &Filter::by_id(&role_id))?;
        }
        self.store.delete_one(Collection::User, &Filter::by_id(&user_id))?;
        Ok(())
    }

    /// Soft-deletes a user by clearing `isActive`. The Role-Detail is left untouched.
    ///
    /// # Errors
    ///
    /// [`ServiceError::UserNotFound`] if no user has this id; store failures as
    /// [`ServiceError::DatabaseOperationFailed`].
    pub fn delete_user(&self, user_id: &DocumentId) -> ServiceResult<()> {
        let matched = self
            .store
            .update_one(
                Collection::User,
                &Filter::by_id(user_id),
                &Update::new().set(USER_IS_ACTIVE, false),
            )
            .map_err(ServiceError::DatabaseOperationFailed)?;
        if matched == 0 {
            return Err(ServiceError::UserNotFound);
        }
        tracing::info!(%user_id, "user deactivated");
        Ok(())
    }

    pub fn get_user(&self, user_id: &DocumentId) -> ServiceResult<Stored<UserDocument>> {
        let document = self
            .store
            .find_one(Collection::User, &Filter::by_id(user_id))?
            .ok_or(ServiceError::UserNotFound)?;
        from_document(document)
    }

    /// Users with a role that needs a Role-Detail but no `roleDependentInfo`, created at least
    /// one grace period before `now`.
    ///
    /// Younger users are skipped because their saga may still be running.
    pub fn find_orphaned_users(
        &self,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Stored<UserDocument>>> {
        let cutoff = now - self.cfg.orphan_grace_period();
        let filter = Filter::new()
            .ne(USER_ROLE, Role::Admin.as_str())
            .exists(USER_ROLE_DEPENDENT_INFO, false);

        let mut orphans = Vec::new();
        for document in self.store.find_many(Collection::User, &filter)? {
            match from_document::<UserDocument>(document) {
                Ok(user) if user.document.created_at <= cutoff => orphans.push(user),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "skipping undecodable user document"),
            }
        }
        Ok(orphans)
    }

    /// Repairs orphaned users.
    ///
    /// An orphan whose Role-Detail was written gets its reference back-filled; one without a
    /// Role-Detail is removed.
    pub fn reconcile_orphans(&self, now: DateTime<Utc>) -> ServiceResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for orphan in self.find_orphaned_users(now)? {
            let user_id = orphan.id;
            let Some(collection) = detail_collection(orphan.document.role) else {
                continue;
            };

            let detail = self.store.find_one(
                collection,
                &Filter::new().eq(DETAIL_USER, user_id.to_string()),
            )?;

            match detail {
                Some(detail) => {
                    let role_id = document_id(&detail)?;
                    let matched = self.store.update_one(
                        Collection::User,
                        &Filter::by_id(&user_id),
                        &Update::new().set(USER_ROLE_DEPENDENT_INFO, role_id.to_string()),
                    )?;
                    if matched == 0 {
                        tracing::debug!(%user_id, "orphaned user gone before back-fill");
                        continue;
                    }
                    tracing::info!(%user_id, %role_id, "orphaned user back-filled");
                    report.backfilled.push(user_id);
                }
                None => {
                    let deleted = self
                        .store
                        .delete_one(Collection::User, &Filter::by_id(&user_id))?;
                    if deleted == 0 {
                        tracing::debug!(%user_id, "orphaned user gone before removal");
                        continue;
                    }
                    tracing::info!(%user_id, "orphaned user removed");
                    report.removed.push(user_id);
                }
            }
        }

        Ok(report)
    }
}
