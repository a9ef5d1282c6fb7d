//! # API REST
//!
//! REST API for TherapistTrack.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON decoding, status codes, CORS, request tracing)
//!
//! Business rules live in `tt-core`; this crate only maps requests onto its engines.

#![warn(rust_2018_idioms)]

pub mod dto;
pub mod error;
pub mod handlers;
pub mod settings;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tt_core::{CoreConfig, DocumentStore, RecordTemplateService, UserService, ValidationRules};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub templates: RecordTemplateService,
    pub rules: Arc<ValidationRules>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cfg: Arc<CoreConfig>,
        rules: Arc<ValidationRules>,
    ) -> Self {
        Self {
            users: UserService::new(store.clone(), cfg.clone()),
            templates: RecordTemplateService::new(store, cfg),
            rules,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::create_user,
        handlers::delete_user,
        handlers::get_user,
        handlers::create_record_template,
        handlers::get_record_template,
        handlers::list_doctor_record_templates,
    ),
    components(schemas(
        dto::HealthRes,
        dto::MessageRes,
        dto::RoleDependentInfoReq,
        dto::CreateUserReq,
        dto::CreateUserRes,
        dto::DeleteUserReq,
        dto::UserRes,
        dto::FieldReq,
        dto::CreateRecordTemplateReq,
        dto::CreateRecordTemplateRes,
        dto::RecordTemplateRes,
        dto::ListRecordTemplatesRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI, request tracing and the given CORS layer.
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/users",
            post(handlers::create_user).delete(handlers::delete_user),
        )
        .route("/users/:id", get(handlers::get_user))
        .route("/record-templates", post(handlers::create_record_template))
        .route("/record-templates/:id", get(handlers::get_record_template))
        .route(
            "/doctors/:id/record-templates",
            get(handlers::list_doctor_record_templates),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use tt_core::MemoryStore;
    use tt_uuid::DocumentId;

    fn app() -> Router {
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(CoreConfig::default()),
            Arc::new(ValidationRules::default()),
        );
        router(state, CorsLayer::permissive())
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn doctor_body(mail: &str) -> Value {
        json!({
            "names": "Ana",
            "lastNames": "Lopez",
            "phones": ["55550000"],
            "mails": [mail],
            "role": "Doctor",
            "roleDependentInfo": {
                "collegiateNumber": "12345",
                "specialty": "Psychology"
            }
        })
    }

    fn template_body(doctor_id: &str, name: &str) -> Value {
        json!({
            "doctorId": doctor_id,
            "name": name,
            "categories": ["intake"],
            "fields": [
                {"name": "mood", "type": "CHOICE", "options": ["good", "bad"], "description": "Current mood"},
                {"name": "notes", "type": "TEXT"}
            ]
        })
    }

    #[tokio::test]
    async fn health_reports_running() {
        let app = app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["message"], "The API is running smoothly.");
    }

    #[tokio::test]
    async fn doctor_is_created_with_role_id() {
        let app = app();
        let (status, body) = send(&app, "POST", "/users", Some(doctor_body("ana@test.com"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Request successful.");
        assert_eq!(body["userId"].as_str().unwrap().len(), 32);
        assert_eq!(body["roleId"].as_str().unwrap().len(), 32);

        let uri = format!("/users/{}", body["userId"].as_str().unwrap());
        let (status, user) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["roleDependentInfo"], body["roleId"]);
        assert_eq!(user["isActive"], true);
    }

    #[tokio::test]
    async fn admin_gets_empty_role_id() {
        let app = app();
        let body = json!({
            "names": "Root",
            "lastNames": "Admin",
            "phones": ["1"],
            "mails": ["root@test.com"],
            "role": "Admin"
        });
        let (status, body) = send(&app, "POST", "/users", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["roleId"], "");
    }

    #[tokio::test]
    async fn assistant_with_reversed_dates_is_rejected() {
        let app = app();
        let body = json!({
            "names": "Luis",
            "lastNames": "Perez",
            "phones": ["1"],
            "mails": ["luis@test.com"],
            "role": "Assistant",
            "roleDependentInfo": {
                "startDate": "2024-06-01",
                "endDate": "2024-01-01",
                "DPI": "1234567890123"
            }
        });
        let (status, body) = send(&app, "POST", "/users", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "startDate should occur before endDate");
    }

    #[tokio::test]
    async fn duplicate_mail_is_not_acceptable() {
        let app = app();
        let (status, _) = send(&app, "POST", "/users", Some(doctor_body("dup@test.com"))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(&app, "POST", "/users", Some(doctor_body("dup@test.com"))).await;
        assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
        assert_eq!(body["message"], "Item with that id/name already exists.");
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/users")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Missing Fields or invalid data.");
    }

    #[tokio::test]
    async fn delete_user_paths() {
        let app = app();
        let (status, _) = send(&app, "DELETE", "/users", Some(json!({"id": "nope"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown = DocumentId::new().to_string();
        let (status, body) = send(&app, "DELETE", "/users", Some(json!({"id": unknown}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found.");

        let (_, created) = send(&app, "POST", "/users", Some(doctor_body("del@test.com"))).await;
        let id = created["userId"].as_str().unwrap().to_string();
        let (status, body) = send(&app, "DELETE", "/users", Some(json!({"id": id}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Request successful.");

        let (_, user) = send(&app, "GET", &format!("/users/{id}"), None).await;
        assert_eq!(user["isActive"], false);
    }

    #[tokio::test]
    async fn template_is_created_and_listed() {
        let app = app();
        let doctor_id = DocumentId::new().to_string();
        let (status, body) = send(
            &app,
            "POST",
            "/record-templates",
            Some(template_body(&doctor_id, "Intake")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["doctorId"], doctor_id.as_str());
        let template_id = body["patientTemplateId"].as_str().unwrap().to_string();

        let (status, template) =
            send(&app, "GET", &format!("/record-templates/{template_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(template["name"], "Intake");
        assert_eq!(template["fields"][0]["type"], "CHOICE");

        let (status, listed) = send(
            &app,
            "GET",
            &format!("/doctors/{doctor_id}/record-templates"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["templates"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn choice_without_options_is_rejected() {
        let app = app();
        let mut body = template_body(&DocumentId::new().to_string(), "Intake");
        body["fields"][0]["options"] = json!([]);
        let (status, _) = send(&app, "POST", "/record-templates", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_field_type_is_method_not_allowed() {
        let app = app();
        let mut body = template_body(&DocumentId::new().to_string(), "Intake");
        body["fields"][1]["type"] = json!("BLOB");
        let (status, body) = send(&app, "POST", "/record-templates", Some(body)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["message"], "Specified type does not exist.");
    }

    #[tokio::test]
    async fn incomplete_template_is_reported_before_unknown_type() {
        let app = app();
        let mut body = template_body("", "Intake");
        body["fields"][1]["type"] = json!("BLOB");
        let (status, body) = send(&app, "POST", "/record-templates", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing Fields or invalid data.");
    }

    #[tokio::test]
    async fn template_name_collision_is_not_acceptable() {
        let app = app();
        let first = template_body(&DocumentId::new().to_string(), "Shared");
        let second = template_body(&DocumentId::new().to_string(), "Shared");
        let (status, _) = send(&app, "POST", "/record-templates", Some(first)).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(&app, "POST", "/record-templates", Some(second)).await;
        assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn unknown_template_is_not_found() {
        let app = app();
        let uri = format!("/record-templates/{}", DocumentId::new());
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Template not found.");
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/users",
            "/users/{id}",
            "/record-templates",
            "/record-templates/{id}",
            "/doctors/{id}/record-templates",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
