// src/services/payment.rs
// DOCUMENTATION: Stripe API client
// PURPOSE: Create hosted checkout sessions and authenticate webhook events

use crate::errors::AppError;
use crate::models::{Tour, User};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook event, in seconds
const WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Stripe API client
/// DOCUMENTATION: Form-encoded requests authenticated with the secret key
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: String,
    base_url: String,
}

/// Subset of the Checkout Session object we read back
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub client_reference_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    /// Total in cents
    pub amount_total: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

impl CheckoutSession {
    pub fn tour_id(&self) -> Option<Uuid> {
        self.client_reference_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
    }

    pub fn email(&self) -> Option<&str> {
        self.customer_email.as_deref().or_else(|| {
            self.customer_details
                .as_ref()
                .and_then(|d| d.email.as_deref())
        })
    }

    pub fn price(&self) -> Option<f64> {
        self.amount_total.map(|cents| cents as f64 / 100.0)
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            client: Client::new(),
            secret_key,
            webhook_secret,
            base_url: "https://api.stripe.com/v1".to_string(),
        }
    }

    /// Form fields of a one-item card checkout for `tour`
    /// DOCUMENTATION: `site_url` is the public origin of this server
    pub fn checkout_form(tour: &Tour, user: &User, site_url: &str) -> Vec<(String, String)> {
        let unit_amount = (tour.price * 100.0).round() as i64;
        let item = "line_items[0]";

        vec![
            ("mode".into(), "payment".into()),
            ("payment_method_types[0]".into(), "card".into()),
            (
                "success_url".into(),
                format!("{}/my-tours?alert=booking", site_url),
            ),
            ("cancel_url".into(), format!("{}/tour/{}", site_url, tour.slug)),
            ("customer_email".into(), user.email.clone()),
            ("client_reference_id".into(), tour.id.to_string()),
            (format!("{}[quantity]", item), "1".into()),
            (format!("{}[price_data][currency]", item), "usd".into()),
            (
                format!("{}[price_data][unit_amount]", item),
                unit_amount.to_string(),
            ),
            (
                format!("{}[price_data][product_data][name]", item),
                format!("{} Tour", tour.name),
            ),
            (
                format!("{}[price_data][product_data][description]", item),
                tour.summary.clone(),
            ),
            (
                format!("{}[price_data][product_data][images][0]", item),
                format!("{}/img/tours/{}", site_url, tour.image_cover),
            ),
        ]
    }

    /// Create a Checkout Session for the current user and tour
    pub async fn create_checkout_session(
        &self,
        tour: &Tour,
        user: &User,
        site_url: &str,
    ) -> Result<CheckoutSession, AppError> {
        if self.secret_key.is_empty() {
            return Err(AppError::ServiceFailure(
                "Payments are not configured on this server.".to_string(),
            ));
        }

        let url = format!("{}/checkout/sessions", self.base_url);
        let form = Self::checkout_form(tour, user, site_url);

        log::debug!("Creating checkout session: tour={}, user={}", tour.id, user.id);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                log::error!("Stripe request failed: {}", e);
                AppError::ExternalApiError(format!("Request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            log::error!("Stripe API error {}: {}", status, message);
            return Err(AppError::ExternalApiError(format!(
                "API error {}: {}",
                status, message
            )));
        }

        let session: CheckoutSession = response.json().await.map_err(|e| {
            log::error!("Failed to parse Stripe checkout session: {}", e);
            AppError::ExternalApiError(format!("Parse error: {}", e))
        })?;

        log::info!("Created checkout session {} for tour {}", session.id, tour.id);
        Ok(session)
    }

    /// Authenticate a webhook body against its `Stripe-Signature` header
    /// DOCUMENTATION: Header format is `t=<unix>,v1=<hex>[,v1=<hex>...]`; the
    /// signed content is `<t>.<raw body>`
    pub fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<WebhookEvent, AppError> {
        if self.webhook_secret.is_empty() {
            log::error!("Rejected webhook: STRIPE_WEBHOOK_SECRET is not configured");
            return Err(AppError::ServiceFailure(
                "Webhook signing secret is not configured".to_string(),
            ));
        }

        let mut timestamp: Option<i64> = None;
        let mut signatures: Vec<Vec<u8>> = Vec::new();

        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => {
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| webhook_error("Unable to extract timestamp"))?;
        if signatures.is_empty() {
            return Err(webhook_error("No v1 signatures found"));
        }
        let within_tolerance = now
            .checked_sub(timestamp)
            .map(i64::unsigned_abs)
            .is_some_and(|age| age <= WEBHOOK_TOLERANCE_SECS);
        if !within_tolerance {
            return Err(webhook_error("Timestamp outside the tolerance zone"));
        }

        let valid = signatures.iter().any(|sig| {
            let mut mac = match HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) {
                Ok(mac) => mac,
                Err(_) => return false,
            };
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(payload);
            mac.verify_slice(sig).is_ok()
        });

        if !valid {
            return Err(webhook_error(
                "No signatures found matching the expected signature for payload",
            ));
        }

        serde_json::from_slice(payload).map_err(|e| webhook_error(&e.to_string()))
    }
}

fn webhook_error(message: &str) -> AppError {
    AppError::BadRequest(format!("Webhook error: {}", message))
}

#[cfg(test)]
pub(crate) fn sign_webhook(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
