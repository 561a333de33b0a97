//! API client for communicating with the Prediction Service

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Non-success response from the service
#[derive(Debug, Error)]
#[error("API error ({status}): {detail}")]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    /// Whether the service rejected the request as invalid
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }
}

/// API client for the Prediction Service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Service greeting from `GET /`
    pub async fn info(&self) -> Result<MessageResponse> {
        self.get("").await
    }

    /// Predict outputs for one feature vector
    pub async fn predict(&self, data: Vec<f64>) -> Result<PredictResponse> {
        self.post("predict", &PredictRequest { data }).await
    }

    /// Retrain the served model on labelled rows
    pub async fn retrain(&self, data: Vec<Vec<f64>>, labels: Vec<f64>) -> Result<MessageResponse> {
        self.post("retrain", &RetrainRequest { data, labels }).await
    }

    /// Make a GET request
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    /// Make a POST request with JSON body
    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status, &body).into());
        }

        response.json().await.context("Failed to parse response")
    }
}

/// Pull `detail` out of an error body, falling back to the raw text
fn error_from_body(status: StatusCode, body: &str) -> ApiError {
    let detail = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => parsed.detail,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        Err(_) => body.trim().to_string(),
    };
    ApiError { status, detail }
}

// API request/response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainRequest {
    pub data: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_error_from_body() {
        let err = error_from_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": "Invalid input: expected 3 features, got 2"}"#,
        );
        assert!(err.is_client_error());
        assert_eq!(err.detail, "Invalid input: expected 3 features, got 2");

        let err = error_from_body(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(err.detail, "upstream down");

        let err = error_from_body(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(err.detail, "Internal Server Error");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(ApiClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_info() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": "Welcome"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let info = client.info().await.unwrap();

        assert_eq!(info.message, "Welcome");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_predict_sends_data() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .match_body(Matcher::Json(json!({"data": [1.0, 2.0, 3.0]})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"predictions": [0.42]}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result = client.predict(vec![1.0, 2.0, 3.0]).await.unwrap();

        assert_eq!(result.predictions, vec![0.42]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retrain_surfaces_detail() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/retrain")
            .match_body(Matcher::Json(
                json!({"data": [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]], "labels": [0.0]}),
            ))
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "Invalid training data: labels length 1 does not match rows length 2"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .retrain(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]], vec![0.0])
            .await
            .unwrap_err();

        let api_error = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api_error.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            api_error.detail,
            "Invalid training data: labels length 1 does not match rows length 2"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retrain_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/retrain")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": "Model retrained successfully"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result = client
            .retrain(vec![vec![1.0, 2.0, 3.0]], vec![1.0])
            .await
            .unwrap();

        assert_eq!(result.message, "Model retrained successfully");
        mock.assert_async().await;
    }
}
