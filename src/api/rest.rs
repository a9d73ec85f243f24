// REST API endpoints

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::HealthResponse;
use crate::error::{ACCESS_DENIED_CODE, CustomerError, INVALID_PARAMETER_CODE};
use crate::rule::event::ConfigRuleEvent;
use crate::rule::handler::RuleContext;
use crate::rule::{ComplianceVerdict, RULE_NAME};

#[derive(Clone)]
pub struct AppState {
    pub rule: RuleContext,
}

impl AppState {
    pub fn new(rule: RuleContext) -> Self {
        AppState { rule }
    }
}

pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/evaluate", post(evaluate_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let settings = &state.rule.settings;
    Json(HealthResponse {
        status: "ok".to_string(),
        rule: RULE_NAME.to_string(),
        watched_cidrs: settings
            .default_watched
            .blocks()
            .iter()
            .map(|b| b.to_string())
            .collect(),
        assume_role_mode: settings.assume_role_mode,
    })
}

async fn evaluate_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ConfigRuleEvent>,
) -> Result<Json<Vec<ComplianceVerdict>>, (StatusCode, Json<CustomerError>)> {
    match state.rule.handle(&event).await {
        Ok(verdicts) => Ok(Json(verdicts)),
        Err(error) => Err((status_for(&error), Json(error))),
    }
}

fn status_for(error: &CustomerError) -> StatusCode {
    match error.customer_error_code.as_str() {
        ACCESS_DENIED_CODE => StatusCode::FORBIDDEN,
        INVALID_PARAMETER_CODE => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
