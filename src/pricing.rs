// Stay pricing: nights, totals, and the card processing surcharge.
// Pure functions only; the display layer owns formatting.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("Invalid date range: check-out {check_out} must be after check-in {check_in}")]
    InvalidDateRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
}

// Fee rate and currency are fixed deployment configuration, not guest
// choices: there is exactly one payment provider.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub fee_rate_percent: f64,
    pub currency: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            fee_rate_percent: 2.9,
            currency: "usd".to_string(),
        }
    }
}

// Number of nights in a stay, as the calendar-day difference.
// A same-day or reversed range is not a bookable stay.
pub fn compute_stay(check_in: NaiveDate, check_out: NaiveDate) -> Result<u32, PricingError> {
    let days = (check_out - check_in).num_days();
    if days < 1 {
        return Err(PricingError::InvalidDateRange {
            check_in,
            check_out,
        });
    }
    Ok(days as u32)
}

pub fn compute_total(price_per_night: f64, nights: u32) -> f64 {
    price_per_night * nights as f64
}

// Surcharge rounded to the nearest whole unit, matching what the guest is
// shown in the booking summary.
pub fn compute_processing_fee(amount: f64, fee_rate_percent: f64) -> f64 {
    (amount * fee_rate_percent / 100.0).round()
}

// The amount actually charged: stay total plus processing fee.
pub fn grand_total(amount: f64, fee_rate_percent: f64) -> f64 {
    amount + compute_processing_fee(amount, fee_rate_percent)
}
