use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::db::{NewReview, Review, ReviewStore, StoreError};
use crate::key_points::KeyPointExtractor;
use crate::sentiment::SentimentClassifier;

/// Preflight responses may be cached for a day.
const CORS_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

pub struct AppState {
    pub store: Arc<dyn ReviewStore>,
    pub classifier: SentimentClassifier,
    pub extractor: KeyPointExtractor,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeReviewRequest {
    pub product_name: String,
    pub review_text: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeReviewResponse {
    pub id: i32,
    pub product_name: String,
    pub sentiment: String,
    pub confidence: f64,
    pub key_points: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl AnalyzeReviewRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.product_name.trim().is_empty() {
            return Err(AppError::BadRequest("product_name cannot be empty".to_string()));
        }
        if self.review_text.trim().is_empty() {
            return Err(AppError::BadRequest("review_text cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{}", .0.body_text())]
    InvalidBody(JsonRejection),
    #[error("{0}")]
    Persist(StoreError),
    #[error("Database error")]
    Query(StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidBody(rejection) => {
                error!("Unreadable request body: {}", rejection.body_text());
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Persist(e) => {
                error!("Failed to save review: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Query(e) => {
                error!("Failed to load reviews: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

/// Classify and summarize a review, then store it.
#[utoipa::path(
    post,
    path = "/api/analyze-review",
    request_body = AnalyzeReviewRequest,
    responses(
        (status = 200, description = "Review analyzed and stored", body = AnalyzeReviewResponse),
        (status = 400, description = "Empty product name or review text", body = ErrorResponse),
        (status = 500, description = "Unreadable request body or review could not be stored", body = ErrorResponse)
    ),
    tag = "reviews"
)]
pub async fn analyze_review(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeReviewRequest>, JsonRejection>,
) -> Result<Json<AnalyzeReviewResponse>, AppError> {
    let Json(payload) = payload.map_err(AppError::InvalidBody)?;
    payload.validate()?;
    info!(product = %payload.product_name, "Analyzing review");

    let sentiment = state.classifier.classify(&payload.review_text).await;
    let key_points = state.extractor.extract(&payload.review_text).await;

    let review = state
        .store
        .insert(NewReview {
            product_name: payload.product_name,
            review_text: payload.review_text,
            sentiment: sentiment.label().to_string(),
            confidence: sentiment.score(),
            key_points,
        })
        .await
        .map_err(AppError::Persist)?;

    info!(id = review.id, sentiment = %review.sentiment, "Review stored");

    Ok(Json(AnalyzeReviewResponse {
        id: review.id,
        product_name: review.product_name,
        sentiment: review.sentiment,
        confidence: review.confidence,
        key_points: review.key_points,
    }))
}

/// List every stored review, newest first.
#[utoipa::path(
    get,
    path = "/api/reviews",
    responses(
        (status = 200, description = "All reviews, newest first", body = [Review]),
        (status = 500, description = "Reviews could not be loaded", body = ErrorResponse)
    ),
    tag = "reviews"
)]
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Review>>, AppError> {
    let reviews = state.store.list().await.map_err(AppError::Query)?;
    Ok(Json(reviews))
}

#[derive(OpenApi)]
#[openapi(
    paths(analyze_review, list_reviews),
    components(schemas(AnalyzeReviewRequest, AnalyzeReviewResponse, ErrorResponse, Review)),
    tags((name = "reviews", description = "Review analysis API"))
)]
pub struct ApiDoc;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(CORS_MAX_AGE);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/analyze-review", post(analyze_review))
        .route("/api/reviews", get(list_reviews))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
