// Guest booking and payment core for the HotelHub application.

// One module per component of the booking flow
pub mod booking;
pub mod payment;
pub mod persistence;
pub mod pricing;
pub mod rooms;
pub mod workflow;

// Re-export key types for convenience
pub use booking::{
    BookingDraft, BookingRecord, BookingStatus, ConfirmedBooking, GuestInfo, PaymentOutcome,
    PaymentStatus, RoomSelection,
};
pub use payment::{
    BillingAddress, CardForm, ChargeRequest, ChargeResponse, HttpPaymentProcessor, PaymentError,
    PaymentProcessor, PaymentSubmissionAdapter,
};
pub use persistence::{
    BookingConfirmation, BookingStore, InMemoryBookingStore, PersistenceClient, StoreError,
};
pub use pricing::{PricingConfig, PricingError};
pub use rooms::{
    filter_available, BookedSpan, InMemoryRoomSource, Room, RoomDataSource, RoomSourceError,
    RoomStatus, StayRange,
};
pub use workflow::{BookingWorkflow, Consent, FieldError, WorkflowError, WorkflowStep};
