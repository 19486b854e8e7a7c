// Booking data model: the records that move through the guest booking flow.

use chrono::{DateTime, NaiveDate, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

// Guest contact details collected in step 1 of the booking wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub special_requests: String,
}

impl GuestInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// The room the guest picked before entering the wizard. Read-only afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSelection {
    pub room_id: String,
    pub room_type: String,
    pub number: u32,
    pub capacity: u32,
    pub price_per_night: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    #[serde(rename = "Pending Payment")]
    PendingPayment,
    Confirmed,
}

// In-progress booking, created when the guest submits their details.
// The id is fixed at creation and survives even if persistence later fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDraft {
    pub id: String,
    pub guest: GuestInfo,
    pub room: RoomSelection,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: u32,
    pub total_amount: f64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
    Failed,
}

// Result of a charge attempt, produced by the payment adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub payment_id: String,
    pub amount: f64,
    pub processing_fee: f64,
    pub payment_method: String,
    pub status: PaymentStatus,
}

// A draft merged with a successful payment outcome. Constructing this is the
// only way a booking becomes Confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmedBooking {
    pub id: String,
    pub guest: GuestInfo,
    pub room: RoomSelection,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: u32,
    pub total_amount: f64,
    pub payment_id: String,
    pub payment_method: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: DateTime<Utc>,
}

impl ConfirmedBooking {
    pub fn from_draft(draft: BookingDraft, outcome: &PaymentOutcome) -> Self {
        Self {
            id: draft.id,
            guest: draft.guest,
            room: draft.room,
            check_in: draft.check_in,
            check_out: draft.check_out,
            nights: draft.nights,
            total_amount: draft.total_amount,
            payment_id: outcome.payment_id.clone(),
            payment_method: outcome.payment_method.clone(),
            status: BookingStatus::Confirmed,
            created_at: draft.created_at,
            paid_at: Utc::now(),
        }
    }
}

// Flattened shape submitted to the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub room_id: String,
    pub room_type: String,
    pub room_number: u32,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: u32,
    pub total_amount: f64,
    pub payment_id: String,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub special_requests: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: DateTime<Utc>,
}

impl From<&ConfirmedBooking> for BookingRecord {
    fn from(booking: &ConfirmedBooking) -> Self {
        Self {
            guest_name: booking.guest.full_name(),
            guest_email: booking.guest.email.clone(),
            guest_phone: booking.guest.phone.clone(),
            room_id: booking.room.room_id.clone(),
            room_type: booking.room.room_type.clone(),
            room_number: booking.room.number,
            check_in: booking.check_in,
            check_out: booking.check_out,
            nights: booking.nights,
            total_amount: booking.total_amount,
            payment_id: booking.payment_id.clone(),
            payment_method: booking.payment_method.clone(),
            payment_status: PaymentStatus::Completed,
            status: booking.status,
            special_requests: booking.guest.special_requests.clone(),
            created_at: booking.created_at,
            paid_at: booking.paid_at,
        }
    }
}

// Client-side booking id: 9 uppercase alphanumerics. Random rather than
// sequential so two drafts created in the same millisecond cannot collide.
pub fn generate_booking_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}
