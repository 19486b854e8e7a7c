// Payment submission adapter: validates card input, computes the
// authoritative charge amount, and performs the single charge attempt
// against the external processor.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{info, warn};

use crate::booking::{BookingDraft, PaymentOutcome, PaymentStatus};
use crate::pricing::{self, PricingConfig};

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Payment validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Payment failed: {0}")]
    Processing(String),

    #[error("A payment submission is already in flight for this booking")]
    SubmissionInFlight,
}

// Raw card form as entered by the guest. Input masking (spaces, slashes)
// belongs to the UI; this layer only normalizes and validates.
#[derive(Debug, Clone, Default)]
pub struct CardForm {
    pub card_number: String,
    pub expiry: String,
    pub cvv: String,
    pub cardholder_name: String,
    pub billing: BillingAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

impl Default for BillingAddress {
    fn default() -> Self {
        Self {
            street: String::new(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
            country: "US".to_string(),
        }
    }
}

// Wire types for the processor call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub card: CardPayload,
    pub billing_details: BillingDetails,
    pub metadata: ChargeMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardPayload {
    pub number: String,
    pub exp_month: u32,
    pub exp_year: i32,
    pub cvc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingDetails {
    pub name: String,
    pub email: String,
    pub address: WireAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireAddress {
    pub line1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeMetadata {
    pub booking_id: String,
    pub guest_email: String,
    pub room_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeResponse {
    pub success: bool,
    #[serde(default)]
    pub payment_intent: Option<PaymentIntentRef>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentRef {
    pub id: String,
}

// Seam to the external card processor. One call, one charge attempt.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeResponse, PaymentError>;
}

// Strips the separators a guest may type into a card number field.
pub fn normalize_card_number(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect()
}

// Keeps only the digits of a CVV entry.
pub fn normalize_cvv(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

// Parses "MM/YY" into (month, four-digit year). None when malformed.
pub fn parse_expiry(raw: &str) -> Option<(u32, i32)> {
    let (month, year) = raw.trim().split_once('/')?;
    let month: u32 = month.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    if !(1..=12).contains(&month) || !(0..100).contains(&year) {
        return None;
    }
    Some((month, 2000 + year))
}

// Collects every violation so the guest can fix the whole form at once.
pub fn validate_card_form(form: &CardForm, today: NaiveDate) -> Vec<String> {
    let mut errors = Vec::new();

    let number = normalize_card_number(&form.card_number);
    if number.len() < 13 || number.len() > 19 || !number.chars().all(|c| c.is_ascii_digit()) {
        errors.push("Please enter a valid card number".to_string());
    }

    match parse_expiry(&form.expiry) {
        None => errors.push("Please enter a valid expiry date (MM/YY)".to_string()),
        Some((month, year)) => {
            // Expiry must be a calendar month strictly after the current one.
            if (year, month) <= (today.year(), today.month()) {
                errors.push("Card has expired".to_string());
            }
        }
    }

    let cvv = normalize_cvv(&form.cvv);
    if cvv.len() < 3 || cvv.len() > 4 {
        errors.push("Please enter a valid CVV".to_string());
    }

    if form.cardholder_name.trim().is_empty() {
        errors.push("Please enter the cardholder name".to_string());
    }
    if form.billing.street.trim().is_empty() {
        errors.push("Please enter billing street address".to_string());
    }
    if form.billing.city.trim().is_empty() {
        errors.push("Please enter billing city".to_string());
    }
    if form.billing.state.trim().is_empty() {
        errors.push("Please enter billing state".to_string());
    }
    if form.billing.zip_code.trim().is_empty() {
        errors.push("Please enter billing zip code".to_string());
    }

    errors
}

// Releases the in-flight flag on every exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct PaymentSubmissionAdapter<P: PaymentProcessor> {
    processor: P,
    config: PricingConfig,
    in_flight: AtomicBool,
}

impl<P: PaymentProcessor> PaymentSubmissionAdapter<P> {
    pub fn new(processor: P, config: PricingConfig) -> Self {
        Self {
            processor,
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    // Validates, recomputes the charge amount from the draft's stay total,
    // and performs exactly one charge attempt. A second call while one is
    // outstanding is rejected, not queued; a failed attempt may be
    // re-invoked by the guest.
    pub async fn submit_charge(
        &self,
        draft: &BookingDraft,
        card: &CardForm,
    ) -> Result<PaymentOutcome, PaymentError> {
        let errors = validate_card_form(card, Utc::now().date_naive());
        if !errors.is_empty() {
            return Err(PaymentError::Validation(errors));
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(booking_id = %draft.id, "duplicate payment submission suppressed");
            return Err(PaymentError::SubmissionInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        // The charge amount derives from the fixed fee rate, never from a
        // total the UI computed.
        let processing_fee =
            pricing::compute_processing_fee(draft.total_amount, self.config.fee_rate_percent);
        let grand_total = draft.total_amount + processing_fee;
        let amount_minor = (grand_total * 100.0).round() as i64;

        // Validation passed, so the expiry is parseable.
        let (exp_month, exp_year) =
            parse_expiry(&card.expiry).ok_or_else(|| PaymentError::Processing(
                "Card expiry became unreadable".to_string(),
            ))?;

        let request = ChargeRequest {
            amount: amount_minor,
            currency: self.config.currency.clone(),
            description: format!(
                "Hotel booking - {} Room {}",
                draft.room.room_type, draft.room.number
            ),
            card: CardPayload {
                number: normalize_card_number(&card.card_number),
                exp_month,
                exp_year,
                cvc: normalize_cvv(&card.cvv),
            },
            billing_details: BillingDetails {
                name: card.cardholder_name.clone(),
                email: draft.guest.email.clone(),
                address: WireAddress {
                    line1: card.billing.street.clone(),
                    city: card.billing.city.clone(),
                    state: card.billing.state.clone(),
                    postal_code: card.billing.zip_code.clone(),
                    country: card.billing.country.clone(),
                },
            },
            metadata: ChargeMetadata {
                booking_id: draft.id.clone(),
                guest_email: draft.guest.email.clone(),
                room_number: draft.room.number.to_string(),
            },
        };

        info!(booking_id = %draft.id, amount_minor, "submitting charge");
        let response = self.processor.charge(request).await?;

        match (response.success, response.payment_intent) {
            (true, Some(intent)) => {
                info!(booking_id = %draft.id, payment_id = %intent.id, "charge succeeded");
                Ok(PaymentOutcome {
                    payment_id: intent.id,
                    amount: grand_total,
                    processing_fee,
                    payment_method: "stripe".to_string(),
                    status: PaymentStatus::Completed,
                })
            }
            (_, _) => {
                let message = response
                    .error
                    .unwrap_or_else(|| "Payment was not successful".to_string());
                warn!(booking_id = %draft.id, %message, "charge rejected");
                Err(PaymentError::Processing(message))
            }
        }
    }
}

// reqwest-backed processor posting the charge to a hosted payment endpoint.
pub struct HttpPaymentProcessor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPaymentProcessor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl PaymentProcessor for HttpPaymentProcessor {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeResponse, PaymentError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| PaymentError::Processing(format!("Payment processor unreachable: {e}")))?;

        let status = response.status();
        let body: ChargeResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Processing(format!("Unreadable processor response: {e}")))?;

        if !status.is_success() {
            let message = body
                .error
                .unwrap_or_else(|| format!("Payment processing failed ({status})"));
            return Err(PaymentError::Processing(message));
        }

        Ok(body)
    }
}
