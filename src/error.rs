use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// JSON body carried by every non-2xx response.
#[derive(Debug, Serialize)]
pub struct HttpErrorResponse {
    detail: String,
}

impl From<String> for HttpErrorResponse {
    fn from(detail: String) -> Self {
        HttpErrorResponse { detail }
    }
}

impl From<&str> for HttpErrorResponse {
    fn from(detail: &str) -> Self {
        HttpErrorResponse {
            detail: detail.to_string(),
        }
    }
}

/// Artifact failures detected while loading the model at startup. The
/// process must exit before binding the listener when one of these occurs.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to read model artifact {path}: {source}")]
    Read {
        path: String,
        source: candle_core::Error,
    },

    #[error("Model artifact has no layers.0.weight tensor")]
    Empty,

    #[error("Tensor {name} is missing from the model artifact")]
    MissingTensor { name: String },

    #[error("Tensor {name} has shape {shape:?}, expected {expected}")]
    BadShape {
        name: String,
        shape: Vec<usize>,
        expected: String,
    },

    #[error("Tensor {name} could not be converted to f32: {source}")]
    Convert {
        name: String,
        source: candle_core::Error,
    },

    #[error("Layer {index} takes {actual} inputs, but the previous layer produces {expected}")]
    BrokenChain {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Output layer produces {outputs} values, expected a single scalar")]
    MultiOutput { outputs: usize },
}

/// Runtime failure inside the forward pass. Reported to the caller, never
/// process-fatal, never retried.
#[derive(Debug, Error)]
#[error("Inference failed: {0}")]
pub struct InferenceError(#[from] candle_core::Error);

/// Request-handling failures, each mapped to a fixed HTTP status code.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("{0}")]
    MalformedRequest(String),

    #[error("Expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl PredictError {
    fn status(&self) -> StatusCode {
        match self {
            PredictError::MalformedRequest(_) | PredictError::ShapeMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            PredictError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut res = Json(HttpErrorResponse::from(self.to_string())).into_response();
        *res.status_mut() = status;
        res
    }
}

pub type ServerResult<T, E = PredictError> = Result<T, E>;
