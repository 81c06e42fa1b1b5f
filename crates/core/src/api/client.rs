use std::{sync::Arc, time::Duration};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    api::{
        retry::{RetryPolicy, execute},
        transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport},
    },
    config::ClientConfig,
    error::ApiError,
    types::{
        ActiveRequests, CancelRequest, CreateOrderRequest, CreateOrderResponse,
        GenerateVideoRequest, GenerateVideoResponse, Health, Pricing, RequestStatusResponse,
        ServerStatus, VerifyPaymentRequest, VerifyPaymentResponse, VideoAvailability,
    },
};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Typed access to the backend's `/api` endpoints.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: String, body: Option<serde_json::Value>) -> ApiRequest {
        ApiRequest {
            method,
            url: format!("{}{}", self.config.api_base(), path),
            path,
            body,
        }
    }

    async fn send(
        &self,
        method: Method,
        path: String,
        body: Option<serde_json::Value>,
        policy: &RetryPolicy,
    ) -> Result<ApiResponse, ApiError> {
        let request = self.request(method, path, body);
        execute(self.transport.as_ref(), policy, request).await
    }

    async fn get<T: DeserializeOwned>(&self, path: String, policy: &RetryPolicy) -> Result<T, ApiError> {
        self.send(Method::Get, path, None, policy).await?.json()
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: String,
        body: &B,
        policy: &RetryPolicy,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        self.send(Method::Post, path, Some(body), policy)
            .await?
            .json()
    }

    pub async fn generate_video(
        &self,
        text: &str,
        request_id: &str,
    ) -> Result<GenerateVideoResponse, ApiError> {
        let body = GenerateVideoRequest { text, request_id };
        self.post("/generate-video".into(), &body, &self.config.retry)
            .await
    }

    /// Completion poll; one attempt, the poll interval is the retry.
    pub async fn request_status(&self, request_id: &str) -> Result<RequestStatusResponse, ApiError> {
        self.get(
            format!("/request-status/{}", request_id),
            &self.config.retry.single_attempt(),
        )
        .await
    }

    /// Existing-request lookup with the full retry policy.
    pub async fn lookup_request(&self, request_id: &str) -> Result<RequestStatusResponse, ApiError> {
        self.get(format!("/request-status/{}", request_id), &self.config.retry)
            .await
    }

    pub async fn video_status(&self, request_id: &str) -> Result<VideoAvailability, ApiError> {
        self.get(
            format!("/video-status/{}", request_id),
            &self.config.retry.single_attempt(),
        )
        .await
    }

    pub async fn cancel_generation(&self, request_id: &str, immediate: bool) -> Result<(), ApiError> {
        let body = CancelRequest {
            request_id,
            immediate,
        };
        let _: serde_json::Value = self
            .post("/cancel-generation".into(), &body, &self.config.retry)
            .await?;
        Ok(())
    }

    pub async fn get_pricing(&self) -> Result<Pricing, ApiError> {
        self.get("/get-pricing".into(), &self.config.retry).await
    }

    /// Single attempt; a retried order would be a second order.
    pub async fn create_order(
        &self,
        request_id: &str,
        amount: u64,
        currency: &str,
    ) -> Result<CreateOrderResponse, ApiError> {
        let body = CreateOrderRequest {
            request_id,
            amount,
            currency,
        };
        self.post(
            "/create-order".into(),
            &body,
            &self.config.retry.single_attempt(),
        )
        .await
    }

    /// Single attempt; a rejected signature or provider error is final.
    pub async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ApiError> {
        self.post(
            "/verify-payment".into(),
            request,
            &self.config.retry.single_attempt(),
        )
        .await
    }

    pub async fn track_download(&self, request_id: &str) -> Result<(), ApiError> {
        self.send(
            Method::Post,
            format!("/track-download/{}", request_id),
            None,
            &self.config.retry,
        )
        .await?;
        Ok(())
    }

    pub async fn server_status(&self) -> Result<ServerStatus, ApiError> {
        self.get("/server-status".into(), &self.config.retry.single_attempt())
            .await
    }

    pub async fn active_requests(&self) -> Result<ActiveRequests, ApiError> {
        self.get("/active-requests".into(), &self.config.retry.single_attempt())
            .await
    }

    pub async fn health(&self) -> Result<Health, ApiError> {
        let policy = self.config.retry.single_attempt().with_timeout(HEALTH_TIMEOUT);
        self.get("/health".into(), &policy).await
    }

    /// Raw artifact bytes from `serve-video`.
    pub async fn fetch_video(&self, request_id: &str, watermarked: bool) -> Result<Vec<u8>, ApiError> {
        let path = format!("/serve-video/{}?watermarked={}", request_id, watermarked);
        let policy = self.config.retry.with_timeout(Duration::from_secs(120));
        Ok(self.send(Method::Get, path, None, &policy).await?.body)
    }
}
