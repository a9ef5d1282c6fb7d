//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into the services as
//! `Arc<CoreConfig>`. Request handling never reads process-wide environment variables, which keeps
//! behaviour consistent across worker threads and test harnesses.
//!
//! The `*_from_env_value` helpers take the raw value (`None` when unset) so runners can feed them
//! from `std::env::var(..).ok()` and tests can feed them directly.

use crate::constants::DEFAULT_ORPHAN_GRACE_SECONDS;
use crate::{ServiceError, ServiceResult};
use chrono::Duration;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_COMPENSATION_POLICY: &str = "TT_COMPENSATION_POLICY";
pub const ENV_TEMPLATE_NAME_SCOPE: &str = "TT_TEMPLATE_NAME_SCOPE";
pub const ENV_DOCTOR_REFERENCE_CHECK: &str = "TT_DOCTOR_REFERENCE_CHECK";
pub const ENV_ORPHAN_GRACE_SECONDS: &str = "TT_ORPHAN_GRACE_SECONDS";
pub const ENV_DATA_DIR: &str = "TT_DATA_DIR";

/// What the provisioning saga does when a step after the first User write fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompensationPolicy {
    /// Undo written documents in reverse order before reporting the failure.
    #[default]
    Compensate,
    /// Leave the partial state for [`UserService::reconcile_orphans`](crate::UserService::reconcile_orphans).
    LeaveForReconciliation,
}

/// Which templates a new template name is compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemplateNameScope {
    /// Every template in the store.
    #[default]
    Global,
    /// Only templates owned by the same doctor.
    PerDoctor,
}

/// How a template's doctor reference is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DoctorReferenceCheck {
    /// The reference only has to be a well-formed identifier.
    #[default]
    IdentifierFormat,
    /// The referenced Doctor record must exist.
    Existing,
}

impl FromStr for CompensationPolicy {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compensate" => Ok(Self::Compensate),
            "leave" | "leave_for_reconciliation" | "reconcile" => Ok(Self::LeaveForReconciliation),
            other => Err(ServiceError::InvalidConfig(format!(
                "unknown compensation policy '{other}' (expected compensate or leave_for_reconciliation)"
            ))),
        }
    }
}

impl FromStr for TemplateNameScope {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "per_doctor" | "doctor" => Ok(Self::PerDoctor),
            other => Err(ServiceError::InvalidConfig(format!(
                "unknown template name scope '{other}' (expected global or per_doctor)"
            ))),
        }
    }
}

impl FromStr for DoctorReferenceCheck {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "format" | "identifier_format" => Ok(Self::IdentifierFormat),
            "existing" | "exists" => Ok(Self::Existing),
            other => Err(ServiceError::InvalidConfig(format!(
                "unknown doctor reference check '{other}' (expected identifier_format or existing)"
            ))),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    compensation_policy: CompensationPolicy,
    template_name_scope: TemplateNameScope,
    doctor_reference_check: DoctorReferenceCheck,
    orphan_grace_period: Duration,
    data_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            compensation_policy: CompensationPolicy::default(),
            template_name_scope: TemplateNameScope::default(),
            doctor_reference_check: DoctorReferenceCheck::default(),
            orphan_grace_period: Duration::seconds(DEFAULT_ORPHAN_GRACE_SECONDS),
            data_dir: None,
        }
    }
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidConfig`] if `orphan_grace_period` is negative.
    pub fn new(
        compensation_policy: CompensationPolicy,
        template_name_scope: TemplateNameScope,
        doctor_reference_check: DoctorReferenceCheck,
        orphan_grace_period: Duration,
        data_dir: Option<PathBuf>,
    ) -> ServiceResult<Self> {
        if orphan_grace_period < Duration::zero() {
            return Err(ServiceError::InvalidConfig(
                "orphan grace period cannot be negative".into(),
            ));
        }

        Ok(Self {
            compensation_policy,
            template_name_scope,
            doctor_reference_check,
            orphan_grace_period,
            data_dir,
        })
    }

    /// Resolves every engine setting through the `*_from_env_value` helpers.
    ///
    /// `var` returns the raw value of an environment variable, `None` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidConfig`] for any value that does not parse.
    pub fn from_env_values(var: impl Fn(&str) -> Option<String>) -> ServiceResult<Self> {
        Self::new(
            compensation_policy_from_env_value(var(ENV_COMPENSATION_POLICY))?,
            template_name_scope_from_env_value(var(ENV_TEMPLATE_NAME_SCOPE))?,
            doctor_reference_check_from_env_value(var(ENV_DOCTOR_REFERENCE_CHECK))?,
            grace_period_from_env_value(var(ENV_ORPHAN_GRACE_SECONDS))?,
            trimmed(var(ENV_DATA_DIR)).map(PathBuf::from),
        )
    }

    pub fn compensation_policy(&self) -> CompensationPolicy {
        self.compensation_policy
    }

    pub fn template_name_scope(&self) -> TemplateNameScope {
        self.template_name_scope
    }

    pub fn doctor_reference_check(&self) -> DoctorReferenceCheck {
        self.doctor_reference_check
    }

    pub fn orphan_grace_period(&self) -> Duration {
        self.orphan_grace_period
    }

    /// Root of the file-backed store; `None` means the process keeps data in memory.
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn with_compensation_policy(mut self, policy: CompensationPolicy) -> Self {
        self.compensation_policy = policy;
        self
    }

    pub fn with_template_name_scope(mut self, scope: TemplateNameScope) -> Self {
        self.template_name_scope = scope;
        self
    }

    pub fn with_doctor_reference_check(mut self, check: DoctorReferenceCheck) -> Self {
        self.doctor_reference_check = check;
        self
    }

    pub fn with_orphan_grace_period(mut self, period: Duration) -> Self {
        self.orphan_grace_period = period;
        self
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the compensation policy from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`CompensationPolicy::Compensate`].
pub fn compensation_policy_from_env_value(
    value: Option<String>,
) -> ServiceResult<CompensationPolicy> {
    Ok(trimmed(value)
        .map(|v| v.parse())
        .transpose()?
        .unwrap_or_default())
}

/// Parse the template name scope from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`TemplateNameScope::Global`].
pub fn template_name_scope_from_env_value(
    value: Option<String>,
) -> ServiceResult<TemplateNameScope> {
    Ok(trimmed(value)
        .map(|v| v.parse())
        .transpose()?
        .unwrap_or_default())
}

/// Parse the doctor reference check from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DoctorReferenceCheck::IdentifierFormat`].
pub fn doctor_reference_check_from_env_value(
    value: Option<String>,
) -> ServiceResult<DoctorReferenceCheck> {
    Ok(trimmed(value)
        .map(|v| v.parse())
        .transpose()?
        .unwrap_or_default())
}

/// Parse the orphan grace period (whole seconds) from an optional string value.
pub fn grace_period_from_env_value(value: Option<String>) -> ServiceResult<Duration> {
    let Some(raw) = trimmed(value) else {
        return Ok(Duration::seconds(DEFAULT_ORPHAN_GRACE_SECONDS));
    };
    let seconds: i64 = raw.parse().map_err(|_| {
        ServiceError::InvalidConfig(format!("orphan grace period '{raw}' is not a whole number"))
    })?;
    if seconds < 0 {
        return Err(ServiceError::InvalidConfig(
            "orphan grace period cannot be negative".into(),
        ));
    }
    Ok(Duration::seconds(seconds))
}
