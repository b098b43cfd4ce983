use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use crate::core::{CancelToken, Pipeline, PipelineError};
use crate::models::{
    ErrorResponse, HealthResponse, OptimiseRequest, OptimiseResponse, ReviewRequest, ReviewResponse,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Abandon an optimise request after this long
    pub request_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Configure all pairing routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/pairings/review", web::post().to(review))
        .route("/pairings/optimise", web::post().to(optimise));
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Review names before optimising
///
/// POST /api/v1/pairings/review
///
/// Request body:
/// ```json
/// {
///   "rows": [{"Your First Name": "Ann", "Your Surname": "Lee", "Choice 1 (First and Surname)": "Bo Ng"}],
///   "notAttending": ["string"]
/// }
/// ```
async fn review(state: web::Data<AppState>, req: web::Json<ReviewRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    let ReviewRequest { rows, not_attending } = req.into_inner();
    let pipeline = Arc::clone(&state.pipeline);

    let prepared = match web::block(move || pipeline.prepare(&rows, &not_attending)).await {
        Ok(Ok(prepared)) => prepared,
        Ok(Err(e)) => return pipeline_failed(e),
        Err(e) => return worker_failed(e),
    };

    HttpResponse::Ok().json(ReviewResponse {
        roster_size: prepared.roster.len(),
        only_in_preferences: prepared.only_in_preferences.into_iter().collect(),
        review: prepared.review,
    })
}

/// Compute pairs
///
/// POST /api/v1/pairings/optimise
///
/// Request body:
/// ```json
/// {
///   "rows": [{"Your First Name": "Ann", "Your Surname": "Lee", "Choice 1 (First and Surname)": "Bo Ng"}],
///   "notAttending": ["string"],
///   "excludeMissing": true
/// }
/// ```
async fn optimise(state: web::Data<AppState>, req: web::Json<OptimiseRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    let OptimiseRequest {
        rows,
        not_attending,
        exclude_missing,
    } = req.into_inner();
    let run_id = uuid::Uuid::new_v4();
    let pipeline = Arc::clone(&state.pipeline);

    tracing::info!(
        "Run {}: optimising {} rows, exclude_missing={}",
        run_id,
        rows.len(),
        exclude_missing
    );

    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let task = web::block(move || {
        let prepared = pipeline.prepare(&rows, &not_attending)?;
        pipeline.optimise_with_cancel(&prepared, exclude_missing, &worker_cancel)
    });

    let result = match state.request_timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(result) => result,
            Err(_) => {
                // Stops the blocking worker at its next stage boundary
                cancel.cancel();
                tracing::warn!("Run {}: abandoned after {:?}", run_id, limit);
                return HttpResponse::ServiceUnavailable().json(ErrorResponse {
                    error: "Optimisation timed out".to_string(),
                    message: format!("No result within {:?}", limit),
                    status_code: 503,
                });
            }
        },
        None => task.await,
    };

    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => return pipeline_failed(e),
        Err(e) => return worker_failed(e),
    };

    tracing::info!(
        "Run {}: {} pairs, {} unpaired, total weight {}",
        run_id,
        outcome.pairs.len(),
        outcome.unpaired.len(),
        outcome.total_weight
    );

    HttpResponse::Ok().json(OptimiseResponse {
        run_id,
        pairs: outcome.pairs,
        unpaired: outcome.unpaired,
        only_in_preferences: outcome.only_in_preferences,
        total_weight: outcome.total_weight,
        status: outcome.status,
    })
}

fn validation_failed(errors: validator::ValidationErrors) -> HttpResponse {
    tracing::info!("Validation failed: field_errors={:?}", errors);
    HttpResponse::UnprocessableEntity().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message: errors.to_string(),
        status_code: 422,
    })
}

/// Bad survey input is the caller's fault; solver failures are ours
fn pipeline_failed(err: PipelineError) -> HttpResponse {
    match err {
        PipelineError::Extract(e) => {
            tracing::info!("Rejected survey rows: {}", e);
            HttpResponse::UnprocessableEntity().json(ErrorResponse {
                error: "Invalid survey rows".to_string(),
                message: e.to_string(),
                status_code: 422,
            })
        }
        PipelineError::Solve(e) => {
            tracing::error!("Solver failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Optimisation failed".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}

fn worker_failed(err: actix_web::error::BlockingError) -> HttpResponse {
    tracing::error!("Blocking worker failed: {}", err);
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: "Worker failed".to_string(),
        message: err.to_string(),
        status_code: 500,
    })
}
