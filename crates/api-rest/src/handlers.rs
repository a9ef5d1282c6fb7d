//! HTTP handlers.
//!
//! Engine calls block on the store, so each one runs on tokio's blocking pool. The spawned task
//! owns everything it needs; if the client disconnects the task still runs to completion, and a
//! provisioning saga always finishes or compensates.

use axum::extract::{FromRequest, Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::Json;
use tt_core::{NewRecordTemplate, NewUser, ServiceError, ServiceResult};
use tt_uuid::DocumentId;

use crate::dto::{
    CreateRecordTemplateReq, CreateRecordTemplateRes, CreateUserReq, CreateUserRes,
    DeleteUserReq, HealthRes, ListRecordTemplatesRes, MessageRes, RecordTemplateRes, UserRes,
    REQUEST_SUCCESS,
};
use crate::error::ApiError;
use crate::AppState;

/// JSON body extractor whose rejection is a `400 {"message"}` like every other client error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Runs a store-bound closure on the blocking pool.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "blocking task failed");
            ApiError::internal("Failed to execute DB operations.")
        })?
        .map_err(ApiError::from)
}

fn parse_id(raw: &str) -> Result<DocumentId, ApiError> {
    DocumentId::parse(raw.trim()).map_err(|e| ServiceError::from(e).into())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
pub async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "The API is running smoothly.".into(),
    })
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created", body = CreateUserRes),
        (status = 400, description = "Missing fields, invalid data or invalid date order", body = MessageRes),
        (status = 406, description = "A user with one of these mails already exists", body = MessageRes),
        (status = 500, description = "Store failure", body = MessageRes)
    )
)]
/// Provision a user
///
/// Doctors and assistants get a role detail record linked from the user. Admins do not.
#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserReq>,
) -> Result<(StatusCode, Json<CreateUserRes>), ApiError> {
    let user = NewUser::try_from(req)?;
    let users = state.users.clone();
    let rules = state.rules.clone();

    let created = run_blocking(move || users.create_user(&user, &rules)).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserRes {
            message: REQUEST_SUCCESS.into(),
            user_id: created.user_id.to_string(),
            role_id: created
                .role_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/users",
    request_body = DeleteUserReq,
    responses(
        (status = 200, description = "User deactivated", body = MessageRes),
        (status = 400, description = "Missing or malformed id", body = MessageRes),
        (status = 404, description = "User not found", body = MessageRes),
        (status = 500, description = "Store failure", body = MessageRes)
    )
)]
/// Soft-delete a user
#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<DeleteUserReq>,
) -> Result<Json<MessageRes>, ApiError> {
    let user_id = parse_id(&req.id)?;
    let users = state.users.clone();
    run_blocking(move || users.delete_user(&user_id)).await?;
    Ok(Json(MessageRes::success()))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User id (32 hex characters)")),
    responses(
        (status = 200, description = "User", body = UserRes),
        (status = 400, description = "Malformed id", body = MessageRes),
        (status = 404, description = "User not found", body = MessageRes)
    )
)]
#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<UserRes>, ApiError> {
    let user_id = parse_id(&id)?;
    let users = state.users.clone();
    let user = run_blocking(move || users.get_user(&user_id)).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    post,
    path = "/record-templates",
    request_body = CreateRecordTemplateReq,
    responses(
        (status = 201, description = "Template created", body = CreateRecordTemplateRes),
        (status = 400, description = "Missing fields, duplicate or reserved field names", body = MessageRes),
        (status = 404, description = "Doctor not found", body = MessageRes),
        (status = 405, description = "Unknown field type", body = MessageRes),
        (status = 406, description = "Template name already taken", body = MessageRes),
        (status = 500, description = "Store failure", body = MessageRes)
    )
)]
/// Create a record template for a doctor
#[axum::debug_handler]
pub async fn create_record_template(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateRecordTemplateReq>,
) -> Result<(StatusCode, Json<CreateRecordTemplateRes>), ApiError> {
    state.rules.check(&state.rules.template, &req)?;
    let template = NewRecordTemplate::try_from(req)?;
    let templates = state.templates.clone();
    let rules = state.rules.clone();

    let created =
        run_blocking(move || templates.create_record_template(&template, &rules)).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateRecordTemplateRes {
            message: REQUEST_SUCCESS.into(),
            doctor_id: created.doctor_id.to_string(),
            patient_template_id: created.template_id.to_string(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/record-templates/{id}",
    params(("id" = String, Path, description = "Template id (32 hex characters)")),
    responses(
        (status = 200, description = "Template", body = RecordTemplateRes),
        (status = 400, description = "Malformed id", body = MessageRes),
        (status = 404, description = "Template not found", body = MessageRes)
    )
)]
#[axum::debug_handler]
pub async fn get_record_template(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<RecordTemplateRes>, ApiError> {
    let template_id = parse_id(&id)?;
    let templates = state.templates.clone();
    let template = run_blocking(move || templates.get_record_template(&template_id)).await?;
    Ok(Json(template.into()))
}

#[utoipa::path(
    get,
    path = "/doctors/{id}/record-templates",
    params(("id" = String, Path, description = "Doctor id (32 hex characters)")),
    responses(
        (status = 200, description = "Templates owned by the doctor", body = ListRecordTemplatesRes),
        (status = 400, description = "Malformed id", body = MessageRes)
    )
)]
#[axum::debug_handler]
pub async fn list_doctor_record_templates(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<ListRecordTemplatesRes>, ApiError> {
    let doctor_id = parse_id(&id)?;
    let templates = state.templates.clone();
    let listed = run_blocking(move || templates.list_record_templates(&doctor_id)).await?;
    Ok(Json(ListRecordTemplatesRes {
        templates: listed.into_iter().map(RecordTemplateRes::from).collect(),
    }))
}
