use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::error::{ExplainError, ExplainResult};
use crate::models::Backends;
use crate::pipeline::{ExplainSettings, Explainer};
use crate::sources::{MockNewsSource, StaticPriceSource};
use crate::views::ExplainReport;

#[derive(Clone)]
pub struct AppState {
    pub explainer: Arc<Explainer>,
}

pub fn create_router(explainer: Arc<Explainer>) -> Router {
    let state = AppState { explainer };

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/explain", get(explain))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Offline router: mock news, rules backend, no price data loaded.
pub fn router() -> ExplainResult<Router> {
    Ok(create_router(Arc::new(Explainer::new(
        Arc::new(StaticPriceSource::new()),
        Arc::new(MockNewsSource::new()),
        Backends::rules()?,
        ExplainSettings::default(),
    ))))
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    date: Option<String>,
    /// Attach market/news views to the response.
    #[serde(default)]
    views: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ExplainError {
    pub fn status(&self) -> StatusCode {
        match self {
            ExplainError::InvalidPriceData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ExplainError::PriceNotFound { .. } => StatusCode::NOT_FOUND,
            ExplainError::UpstreamFetchFailure { .. } => StatusCode::BAD_GATEWAY,
            ExplainError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ExplainError::ClassificationUnavailable(_) | ExplainError::ScoringUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ExplainError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ExplainError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

async fn explain(
    State(state): State<AppState>,
    Query(q): Query<ExplainQuery>,
) -> Result<Json<ExplainReport>, ExplainError> {
    let ticker = q
        .ticker
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ExplainError::InvalidRequest("missing `ticker`".into()))?;
    let raw_date = q
        .date
        .ok_or_else(|| ExplainError::InvalidRequest("missing `date`".into()))?;
    let date = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d").map_err(|_| {
        ExplainError::InvalidRequest(format!("`date` must be YYYY-MM-DD, got `{raw_date}`"))
    })?;

    let report = state.explainer.explain_report(&ticker, date).await?;
    Ok(Json(if q.views {
        report
    } else {
        report.without_views()
    }))
}
