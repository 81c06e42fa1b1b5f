use url::Url;

use crate::payment::PaymentReceipt;

/// Query parameters of a landing URL, e.g. after the provider's redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectParams {
    pub request_id: String,
    /// Present only when all three payment fields are
    pub payment: Option<PaymentReceipt>,
}

impl RedirectParams {
    /// `None` when the URL carries no `request_id`.
    pub fn parse(url: &Url) -> Option<Self> {
        let mut request_id = None;
        let mut payment_id = None;
        let mut order_id = None;
        let mut signature = None;

        for (key, value) in url.query_pairs() {
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "request_id" => request_id = Some(value),
                "payment_id" => payment_id = Some(value),
                "order_id" => order_id = Some(value),
                "razorpay_signature" => signature = Some(value),
                _ => {}
            }
        }

        let payment = match (payment_id, order_id, signature) {
            (Some(payment_id), Some(order_id), Some(signature)) => Some(PaymentReceipt {
                payment_id,
                order_id,
                signature,
            }),
            _ => None,
        };

        Some(Self {
            request_id: request_id?,
            payment,
        })
    }
}

/// The landing URL with its parameters removed.
pub fn strip_query(url: &Url) -> Url {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.set_fragment(None);
    clean
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_redirect() {
        let url = Url::parse(
            "https://www.shortreels.app/?request_id=abc&payment_id=pay_1&order_id=order_1&razorpay_signature=sig",
        )
        .unwrap();
        let params = RedirectParams::parse(&url).unwrap();
        assert_eq!(params.request_id, "abc");
        assert_eq!(
            params.payment,
            Some(PaymentReceipt {
                payment_id: "pay_1".into(),
                order_id: "order_1".into(),
                signature: "sig".into(),
            })
        );
        assert_eq!(strip_query(&url).as_str(), "https://www.shortreels.app/");
    }

    #[test]
    fn partial_payment_fields_are_an_existing_request_check() {
        let url = Url::parse("https://www.shortreels.app/?request_id=abc&payment_id=pay_1").unwrap();
        let params = RedirectParams::parse(&url).unwrap();
        assert_eq!(params.payment, None);
    }

    #[test]
    fn no_request_id() {
        let url = Url::parse("https://www.shortreels.app/?payment_id=pay_1").unwrap();
        assert_eq!(RedirectParams::parse(&url), None);
    }
}
