mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

pub use self::error::AppError;
pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::recognize_handler,
        api::list_labels_handler,
        api::save_label_handler,
        api::delete_label_handler,
        api::track_handler,
        api::reset_session_handler,
        api::metrics_handler,
    ),
    components(schemas(
        types::RecognizeForm,
        types::RecognizeResponse,
        types::SaveLabelForm,
        types::LabelItem,
        types::TrackResponse,
    )),
    modifiers(&TokenAuth)
)]
pub struct ApiDoc;

struct TokenAuth;

impl Modify for TokenAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/recognize", post(api::recognize_handler))
        .route("/labels", get(api::list_labels_handler).post(api::save_label_handler))
        .route("/labels/{id}", delete(api::delete_label_handler))
        .route("/tracks/{tracking_id}", get(api::track_handler))
        .route("/session/reset", post(api::reset_session_handler))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}
