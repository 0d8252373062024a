use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::{PredictError, ServerResult};
use crate::inference::regressor::MlpRegressor;

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<MlpRegressor>,
}

#[derive(Deserialize)]
pub struct PredictRequest {
    features: Vec<f32>,
}

#[derive(Serialize)]
pub struct PredictResponse {
    prediction: f32,
}

#[derive(Serialize)]
pub struct HomeResponse {
    message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_home))
        .route("/predict", post(handle_predict))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wildcard CORS on every response. Credentials stay disabled: the Fetch
/// spec forbids pairing them with `*` and CorsLayer rejects the combination.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[axum_macros::debug_handler]
async fn handle_home() -> (StatusCode, Json<HomeResponse>) {
    (
        StatusCode::OK,
        Json(HomeResponse {
            message: format!("{} is running!", env!("CARGO_PKG_NAME")),
        }),
    )
}

#[axum_macros::debug_handler]
async fn handle_predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> ServerResult<(StatusCode, Json<PredictResponse>)> {
    let Json(request) =
        payload.map_err(|rejection| PredictError::MalformedRequest(rejection.body_text()))?;

    let expected = state.model.input_dimension();
    let actual = request.features.len();
    if actual != expected {
        return Err(PredictError::ShapeMismatch { expected, actual });
    }

    let prediction = state.model.predict(&request.features)?;
    debug!(prediction, "Inference complete");

    Ok((StatusCode::OK, Json(PredictResponse { prediction })))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::response::Response;
    use candle_core::{Device, Tensor};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    /// Single linear layer over 4 features: prediction = 0.5 * sum + 0.25.
    fn test_state() -> AppState {
        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        tensors.insert(
            "layers.0.weight".to_string(),
            Tensor::from_slice(&[0.5f32; 4], (1, 4), &device).unwrap(),
        );
        tensors.insert(
            "layers.0.bias".to_string(),
            Tensor::from_slice(&[0.25f32], (1,), &device).unwrap(),
        );
        AppState {
            model: Arc::new(MlpRegressor::from_tensors(tensors).unwrap()),
        }
    }

    async fn post_predict(body: &str) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::from(body.to_string()))
            .unwrap();
        router(test_state()).oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn home_reports_running() {
        let request = Request::builder()
            .uri("/")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = router(test_state()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "predict_server is running!");
    }

    #[tokio::test]
    async fn predict_returns_a_scalar() {
        let response = post_predict(r#"{"features":[0.0093,0.6553,0.5772,0.6876]}"#).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let prediction = body["prediction"].as_f64().unwrap();
        let expected = 0.5 * (0.0093 + 0.6553 + 0.5772 + 0.6876) + 0.25;
        assert!((prediction - expected).abs() < 1e-5);
    }

    #[tokio::test]
    async fn wrong_length_names_both_counts() {
        let response = post_predict(r#"{"features":[1,2,3]}"#).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.contains('4') && detail.contains('3'));
    }

    #[tokio::test]
    async fn missing_features_field_is_rejected() {
        let response = post_predict(r#"{"inputs":[1,2,3,4]}"#).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn non_numeric_feature_is_rejected() {
        let response = post_predict(r#"{"features":[1.0,"oops",3.0,4.0]}"#).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn invalid_json_body_is_rejected() {
        let response = post_predict("not json").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn every_response_allows_any_origin() {
        let ok = post_predict(r#"{"features":[1,2,3,4]}"#).await;
        assert_eq!(
            ok.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );

        let bad = post_predict(r#"{"features":[1,2,3]}"#).await;
        assert_eq!(
            bad.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }
}
