use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::types::{CreateOrderResponse, Pricing, PricingSnapshot};

const CHECKOUT_NAME: &str = "ShortReels AI";
const REFUND_TERMS: &str = "By paying, you agree to our no-refund policy once processing begins";

#[derive(Error, Debug, PartialEq)]
pub enum PaymentError {
    #[error(
        "Price mismatch: expected {expected_amount} {expected_currency}, order has {got_amount} {got_currency}"
    )]
    PriceMismatch {
        expected_amount: u64,
        expected_currency: String,
        got_amount: u64,
        got_currency: String,
    },

    #[error("Invalid pricing information: {0}")]
    InvalidPricing(String),

    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),
}

impl PaymentError {
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::PriceMismatch { .. } => {
                "Payment error: Price mismatch detected. Please try again.".to_string()
            }
            PaymentError::InvalidPricing(_) => {
                "Unable to fetch pricing information. Please try again.".to_string()
            }
            PaymentError::VerificationFailed(reason) => {
                format!("Payment verification failed: {}", reason)
            }
        }
    }
}

/// Public configuration handed to the checkout widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutOptions {
    pub key: String,
    pub amount: u64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub order_id: String,
    pub notes: BTreeMap<String, String>,
}

impl CheckoutOptions {
    pub fn new(order: &CreateOrderResponse, pricing: &PricingSnapshot) -> Self {
        let mut notes = BTreeMap::new();
        notes.insert("terms".to_string(), REFUND_TERMS.to_string());
        Self {
            key: order.razorpay_key.clone(),
            amount: pricing.amount_in_smallest_unit,
            currency: pricing.currency.clone(),
            name: CHECKOUT_NAME.to_string(),
            description: format!("Watermark Removal ({})", pricing.formatted_price),
            order_id: order.order_id.clone(),
            notes,
        }
    }
}

/// Fields returned by the payment provider after a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub payment_id: String,
    pub order_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetOutcome {
    Completed(PaymentReceipt),
    Dismissed,
    Failed { description: String },
}

/// How a payment attempt ended, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Unlocked { paid_video_url: String },
    Dismissed,
    Failed { description: String },
}

/// The provider's checkout widget. Opaque: it receives the options and
/// reports how the user left it.
#[async_trait]
pub trait PaymentWidget: Send + Sync {
    async fn open(&self, options: CheckoutOptions) -> WidgetOutcome;
}

/// Reject pricing the checkout cannot use.
pub fn validate_pricing(pricing: Pricing) -> Result<PricingSnapshot, PaymentError> {
    if pricing.price.is_nan() || pricing.price <= 0.0 {
        return Err(PaymentError::InvalidPricing(format!(
            "price must be positive, got {}",
            pricing.price
        )));
    }
    if pricing.currency.trim().is_empty() {
        return Err(PaymentError::InvalidPricing("missing currency".into()));
    }
    if pricing.formatted_price.trim().is_empty() {
        return Err(PaymentError::InvalidPricing("missing formatted price".into()));
    }
    Ok(PricingSnapshot::from_pricing(pricing))
}

/// The order must charge exactly what the user was shown.
pub fn check_order_matches(
    pricing: &PricingSnapshot,
    order: &CreateOrderResponse,
) -> Result<(), PaymentError> {
    if order.amount != pricing.amount_in_smallest_unit || order.currency != pricing.currency {
        return Err(PaymentError::PriceMismatch {
            expected_amount: pricing.amount_in_smallest_unit,
            expected_currency: pricing.currency.clone(),
            got_amount: order.amount,
            got_currency: order.currency.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing(price: f64, currency: &str) -> Pricing {
        Pricing {
            price,
            currency: currency.into(),
            formatted_price: format!("{} {}", currency, price),
            country_code: None,
        }
    }

    fn order(amount: u64, currency: &str) -> CreateOrderResponse {
        CreateOrderResponse {
            order_id: "order_1".into(),
            razorpay_key: "rzp_test".into(),
            amount,
            currency: currency.into(),
            formatted_price: None,
        }
    }

    #[test]
    fn rejects_unusable_pricing() {
        assert!(validate_pricing(pricing(0.0, "INR")).is_err());
        assert!(validate_pricing(pricing(49.0, "")).is_err());
        let snapshot = validate_pricing(pricing(0.99, "USD")).unwrap();
        assert_eq!(snapshot.amount_in_smallest_unit, 99);
    }

    #[test]
    fn order_must_match_snapshot() {
        let snapshot = validate_pricing(pricing(49.0, "INR")).unwrap();
        assert!(check_order_matches(&snapshot, &order(4900, "INR")).is_ok());
        assert_eq!(
            check_order_matches(&snapshot, &order(4900, "USD")),
            Err(PaymentError::PriceMismatch {
                expected_amount: 4900,
                expected_currency: "INR".into(),
                got_amount: 4900,
                got_currency: "USD".into(),
            })
        );
    }

    #[test]
    fn checkout_options_describe_the_unlock() {
        let snapshot = PricingSnapshot {
            price: 49.0,
            currency: "INR".into(),
            formatted_price: "₹49".into(),
            amount_in_smallest_unit: 4900,
        };
        let options = CheckoutOptions::new(&order(4900, "INR"), &snapshot);
        assert_eq!(options.name, "ShortReels AI");
        assert_eq!(options.description, "Watermark Removal (₹49)");
        assert_eq!(options.order_id, "order_1");
        assert!(options.notes["terms"].contains("no-refund"));
    }
}
