use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    error::{Result, ShortreelsError},
    events::{Notice, NoticeLevel, SessionEvent},
    lifecycle::{GenerationRequest, RequestStatus},
    paths::get_download_path,
    payment::{
        CheckoutOptions, PaymentError, PaymentOutcome, PaymentReceipt, PaymentWidget,
        WidgetOutcome, check_order_matches, validate_pricing,
    },
    session::Session,
    types::{PricingSnapshot, VerifyPaymentRequest},
};

impl Session {
    pub async fn fetch_pricing(&self) -> Result<PricingSnapshot> {
        let pricing = self.inner.api.get_pricing().await?;
        let snapshot = validate_pricing(pricing)?;
        debug!(
            price = snapshot.price,
            currency = %snapshot.currency,
            amount = snapshot.amount_in_smallest_unit,
            "pricing fetched"
        );
        self.state().pricing = Some(snapshot.clone());
        Ok(snapshot)
    }

    pub fn pricing(&self) -> Option<PricingSnapshot> {
        self.state().pricing.clone()
    }

    async fn refresh_pricing(&self) {
        if let Err(e) = self.fetch_pricing().await {
            warn!(error = %e, "pricing refresh failed");
        }
    }

    /// Unlock the watermark-free copy of `request_id` through `widget`.
    pub async fn pay(&self, request_id: &str, widget: &dyn PaymentWidget) -> Result<PaymentOutcome> {
        let result = self.checkout(request_id, widget).await;
        if let Err(e) = &result {
            warn!(request_id, error = %e, "payment attempt failed");
            self.refresh_pricing().await;
            self.surface_error(e);
        }
        result
    }

    async fn checkout(&self, request_id: &str, widget: &dyn PaymentWidget) -> Result<PaymentOutcome> {
        let pricing = self.fetch_pricing().await?;
        let order = self
            .inner
            .api
            .create_order(request_id, pricing.amount_in_smallest_unit, &pricing.currency)
            .await?;
        check_order_matches(&pricing, &order)?;

        info!(request_id, order_id = %order.order_id, "opening checkout");
        match widget.open(CheckoutOptions::new(&order, &pricing)).await {
            WidgetOutcome::Completed(receipt) => {
                let paid_video_url = self.verify_receipt(&receipt, request_id).await?;
                Ok(PaymentOutcome::Unlocked { paid_video_url })
            }
            WidgetOutcome::Dismissed => {
                self.refresh_pricing().await;
                self.emit(SessionEvent::Toast(Notice::new(
                    NoticeLevel::Warning,
                    "Payment cancelled",
                )));
                Ok(PaymentOutcome::Dismissed)
            }
            WidgetOutcome::Failed { description } => {
                self.refresh_pricing().await;
                self.emit(SessionEvent::Toast(Notice::new(
                    NoticeLevel::Error,
                    format!("Payment failed: {}", description),
                )));
                Ok(PaymentOutcome::Failed { description })
            }
        }
    }

    /// Confirm a completed payment with the backend and unlock the paid copy.
    pub async fn verify(&self, receipt: &PaymentReceipt, request_id: &str) -> Result<String> {
        let result = self.verify_receipt(receipt, request_id).await;
        if let Err(e) = &result {
            self.surface_error(e);
        }
        result
    }

    async fn verify_receipt(&self, receipt: &PaymentReceipt, request_id: &str) -> Result<String> {
        let currency = self.state().pricing.as_ref().map(|p| p.currency.clone());
        let request = VerifyPaymentRequest {
            razorpay_payment_id: receipt.payment_id.clone(),
            razorpay_order_id: receipt.order_id.clone(),
            razorpay_signature: receipt.signature.clone(),
            request_id: request_id.to_string(),
            currency,
        };
        let resp = self.inner.api.verify_payment(&request).await?;

        match resp.paid_video_url {
            Some(url) if resp.success => {
                let url = self.unlock(request_id, &url).await;
                self.emit(SessionEvent::Toast(Notice::new(
                    NoticeLevel::Success,
                    "Payment successful! Video unlocked",
                )));
                Ok(url)
            }
            _ => Err(PaymentError::VerificationFailed(
                resp.error
                    .unwrap_or_else(|| "Verification failed".to_string()),
            )
            .into()),
        }
    }

    async fn unlock(&self, request_id: &str, paid_video_url: &str) -> String {
        let url = self.inner.api.config().resolve(paid_video_url);
        {
            let mut state = self.state();
            let request = state
                .requests
                .entry(request_id.to_string())
                .or_insert_with(|| {
                    GenerationRequest::from_backend(request_id, RequestStatus::Completed)
                });
            request.paid_video_url = Some(url.clone());
            state.current = Some(request_id.to_string());
            let record = state.availability.entry(request_id.to_string()).or_default();
            record.is_paid = true;
            record.non_watermarked_available = true;
        }
        info!(request_id, "paid video unlocked");
        self.emit(SessionEvent::BannerCleared);
        self.emit(SessionEvent::PaidVideoReady {
            request_id: request_id.to_string(),
            url: url.clone(),
        });

        if let Err(e) = self.inner.api.track_download(request_id).await {
            warn!(request_id, error = %e, "download tracking failed");
        }
        self.persist().await;
        self.start_availability(request_id);
        url
    }

    /// Save an artifact to `dir`. Paid downloads are tracked.
    pub async fn download(&self, request_id: &str, watermarked: bool, dir: &Path) -> Result<PathBuf> {
        let result = self.save_artifact(request_id, watermarked, dir).await;
        if let Err(e) = &result {
            self.surface_error(e);
        }
        result
    }

    async fn save_artifact(&self, request_id: &str, watermarked: bool, dir: &Path) -> Result<PathBuf> {
        let bytes = self.inner.api.fetch_video(request_id, watermarked).await?;
        if bytes.is_empty() {
            return Err(ShortreelsError::InvalidResponse {
                reason: "empty video".to_string(),
            });
        }
        let path = get_download_path(dir, request_id, watermarked);
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, &bytes).await?;
        info!(request_id, path = %path.display(), bytes = bytes.len(), "video saved");

        let message = if watermarked {
            "Preview downloaded."
        } else {
            if let Err(e) = self.inner.api.track_download(request_id).await {
                warn!(request_id, error = %e, "download tracking failed");
            }
            "Download started! Your video will be available for 7 days."
        };
        self.emit(SessionEvent::Toast(Notice::new(NoticeLevel::Success, message)));
        Ok(path)
    }
}
