// Guest booking wizard: a three-step state machine from guest details
// through consent to payment, ending in a confirmed booking. Every
// transition is caller-initiated and guarded; nothing auto-advances.

use chrono::{NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::booking::{
    generate_booking_id, BookingDraft, BookingStatus, ConfirmedBooking, GuestInfo, RoomSelection,
};
use crate::payment::{CardForm, PaymentError, PaymentProcessor, PaymentSubmissionAdapter};
use crate::persistence::{BookingConfirmation, BookingStore, PersistenceClient};
use crate::pricing::{self, PricingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    GuestInfo,
    PaymentMethodAndTerms,
    PaymentProcessing,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Validation failed for: {}", .0.iter().map(|e| e.field.as_str()).collect::<Vec<_>>().join(", "))]
    Validation(Vec<FieldError>),

    #[error("Consent required: {}", .0.join(", "))]
    ConsentRequired(Vec<String>),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Operation not valid in step {0:?}")]
    WrongStep(WorkflowStep),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Consent {
    pub terms_accepted: bool,
    pub cancellation_policy_accepted: bool,
}

static EMAIL_SHAPE: OnceLock<Regex> = OnceLock::new();

fn email_shape() -> &'static Regex {
    EMAIL_SHAPE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
    })
}

// One booking wizard per guest session. Holds the current step, the
// in-progress form, and at most one draft at a time.
pub struct BookingWorkflow {
    step: WorkflowStep,
    room: RoomSelection,
    check_in: NaiveDate,
    check_out: NaiveDate,
    pub guest_form: GuestInfo,
    consent: Consent,
    payment_method: Option<String>,
    draft: Option<BookingDraft>,
    confirmed: Option<ConfirmedBooking>,
}

impl BookingWorkflow {
    pub fn new(room: RoomSelection, check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self {
            step: WorkflowStep::GuestInfo,
            room,
            check_in,
            check_out,
            guest_form: GuestInfo::default(),
            consent: Consent::default(),
            payment_method: None,
            draft: None,
            confirmed: None,
        }
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn consent(&self) -> Consent {
        self.consent
    }

    pub fn draft(&self) -> Option<&BookingDraft> {
        self.draft.as_ref()
    }

    pub fn confirmed(&self) -> Option<&ConfirmedBooking> {
        self.confirmed.as_ref()
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    // Step 1 submission. Validates the form, prices the stay once, and
    // builds the draft. On any failure the step does not move and the form
    // keeps whatever the guest typed.
    pub fn submit_guest_info(&mut self) -> Result<&BookingDraft, WorkflowError> {
        if self.step != WorkflowStep::GuestInfo {
            return Err(WorkflowError::WrongStep(self.step));
        }

        let mut errors = Vec::new();
        let first_name = self.guest_form.first_name.trim();
        let last_name = self.guest_form.last_name.trim();
        let email = self.guest_form.email.trim();
        let phone = self.guest_form.phone.trim();

        if first_name.is_empty() {
            errors.push(FieldError::new("firstName", "First name is required"));
        }
        if last_name.is_empty() {
            errors.push(FieldError::new("lastName", "Last name is required"));
        }
        if email.is_empty() {
            errors.push(FieldError::new("email", "Email address is required"));
        } else if !email_shape().is_match(email) {
            errors.push(FieldError::new("email", "Please enter a valid email address"));
        }
        if phone.is_empty() {
            errors.push(FieldError::new("phone", "Phone number is required"));
        }
        if !errors.is_empty() {
            return Err(WorkflowError::Validation(errors));
        }

        let nights = pricing::compute_stay(self.check_in, self.check_out)?;
        let total_amount = pricing::compute_total(self.room.price_per_night, nights);

        let guest = GuestInfo {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            special_requests: self.guest_form.special_requests.trim().to_string(),
        };

        let draft = BookingDraft {
            id: generate_booking_id(),
            guest,
            room: self.room.clone(),
            check_in: self.check_in,
            check_out: self.check_out,
            nights,
            total_amount,
            status: BookingStatus::PendingPayment,
            created_at: Utc::now(),
        };
        self.step = WorkflowStep::PaymentMethodAndTerms;
        Ok(&*self.draft.insert(draft))
    }

    // Records the two consent checkboxes shown in step 2.
    pub fn accept_terms(
        &mut self,
        terms_accepted: bool,
        cancellation_policy_accepted: bool,
    ) -> Result<(), WorkflowError> {
        if self.step != WorkflowStep::PaymentMethodAndTerms {
            return Err(WorkflowError::WrongStep(self.step));
        }
        self.consent = Consent {
            terms_accepted,
            cancellation_policy_accepted,
        };
        Ok(())
    }

    // Step 2 submission. Both consents must be in place before the card
    // form is ever shown. The payment method is fixed here: there is
    // exactly one provider.
    pub fn proceed_to_payment(&mut self) -> Result<(), WorkflowError> {
        if self.step != WorkflowStep::PaymentMethodAndTerms {
            return Err(WorkflowError::WrongStep(self.step));
        }

        let mut missing = Vec::new();
        if !self.consent.terms_accepted {
            missing.push("terms and conditions".to_string());
        }
        if !self.consent.cancellation_policy_accepted {
            missing.push("cancellation policy".to_string());
        }
        if !missing.is_empty() {
            return Err(WorkflowError::ConsentRequired(missing));
        }

        self.payment_method = Some("stripe".to_string());
        self.step = WorkflowStep::PaymentProcessing;
        Ok(())
    }

    // Guest-initiated "Back". Entered data survives in both directions.
    pub fn back(&mut self) -> Result<(), WorkflowError> {
        self.step = match self.step {
            WorkflowStep::PaymentMethodAndTerms => WorkflowStep::GuestInfo,
            WorkflowStep::PaymentProcessing => WorkflowStep::PaymentMethodAndTerms,
            other => return Err(WorkflowError::WrongStep(other)),
        };
        Ok(())
    }

    // Step 3 submission: one charge attempt, then persistence. A failed
    // charge leaves the machine in PaymentProcessing with the draft still
    // pending, so the guest can retry or go back. A successful charge is
    // final; the storage write happens at most once and its failure never
    // reverses the confirmation.
    pub async fn submit_payment<P, S>(
        &mut self,
        adapter: &PaymentSubmissionAdapter<P>,
        persistence: &PersistenceClient<S>,
        card: &CardForm,
    ) -> Result<BookingConfirmation, WorkflowError>
    where
        P: PaymentProcessor,
        S: BookingStore,
    {
        if self.step != WorkflowStep::PaymentProcessing {
            return Err(WorkflowError::WrongStep(self.step));
        }
        let draft = self
            .draft
            .as_ref()
            .ok_or(WorkflowError::WrongStep(self.step))?;

        let outcome = adapter.submit_charge(draft, card).await?;

        let draft = self
            .draft
            .take()
            .ok_or(WorkflowError::WrongStep(self.step))?;
        let confirmed = ConfirmedBooking::from_draft(draft, &outcome);
        let confirmation = persistence.finalize(&confirmed).await;
        self.confirmed = Some(confirmed);
        self.step = WorkflowStep::Completed;
        Ok(confirmation)
    }

    // Explicit re-initialization for the next booking. Also models the
    // guest abandoning the wizard: before a successful charge nothing has
    // happened that needs undoing.
    pub fn reset(&mut self, room: RoomSelection, check_in: NaiveDate, check_out: NaiveDate) {
        *self = Self::new(room, check_in, check_out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::mock_processor::MockProcessor;
    use crate::payment::{BillingAddress, PaymentSubmissionAdapter};
    use crate::persistence::{InMemoryBookingStore, PersistenceClient};
    use crate::pricing::PricingConfig;
    use test_case::test_case;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn room() -> RoomSelection {
        RoomSelection {
            room_id: "7".to_string(),
            room_type: "Deluxe".to_string(),
            number: 204,
            capacity: 2,
            price_per_night: 100.0,
        }
    }

    fn workflow() -> BookingWorkflow {
        BookingWorkflow::new(room(), date(2024, 6, 1), date(2024, 6, 4))
    }

    fn fill_guest_form(workflow: &mut BookingWorkflow) {
        workflow.guest_form = GuestInfo {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: "555-0100".to_string(),
            special_requests: String::new(),
        };
    }

    fn valid_card() -> CardForm {
        CardForm {
            card_number: "4242424242424242".to_string(),
            expiry: "12/99".to_string(),
            cvv: "123".to_string(),
            cardholder_name: "Jane Doe".to_string(),
            billing: BillingAddress {
                street: "123 Main Street".to_string(),
                city: "New York".to_string(),
                state: "NY".to_string(),
                zip_code: "10001".to_string(),
                country: "US".to_string(),
            },
        }
    }

    fn approving_adapter() -> PaymentSubmissionAdapter<MockProcessor> {
        PaymentSubmissionAdapter::new(
            MockProcessor::approving("pi_test_1"),
            PricingConfig::default(),
        )
    }

    #[test]
    fn test_guest_info_builds_draft_and_advances() {
        let mut wf = workflow();
        fill_guest_form(&mut wf);

        let draft = wf.submit_guest_info().unwrap();
        assert_eq!(draft.nights, 3);
        assert_eq!(draft.total_amount, 300.0);
        assert_eq!(draft.status, BookingStatus::PendingPayment);
        assert_eq!(draft.id.len(), 9);
        assert_eq!(wf.step(), WorkflowStep::PaymentMethodAndTerms);
    }

    #[test]
    fn test_empty_phone_lists_field_and_stays_put() {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.guest_form.phone = String::new();

        let err = wf.submit_guest_info().unwrap_err();
        match err {
            WorkflowError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "phone");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
        assert_eq!(wf.step(), WorkflowStep::GuestInfo);
        assert!(wf.draft().is_none());
    }

    #[test]
    fn test_whitespace_only_fields_rejected() {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.guest_form.first_name = "   ".to_string();
        wf.guest_form.phone = "\t".to_string();

        let err = wf.submit_guest_info().unwrap_err();
        match err {
            WorkflowError::Validation(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["firstName", "phone"]);
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test_case("plainaddress"; "no at sign")]
    #[test_case("a@b"; "no tld dot")]
    #[test_case("a b@example.com"; "space in local part")]
    #[test_case("a@ex ample.com"; "space in domain")]
    fn test_malformed_email_rejected(email: &str) {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.guest_form.email = email.to_string();

        let err = wf.submit_guest_info().unwrap_err();
        match err {
            WorkflowError::Validation(errors) => assert_eq!(errors[0].field, "email"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_night_stay_rejected_before_payment() {
        let mut wf = BookingWorkflow::new(room(), date(2024, 6, 1), date(2024, 6, 1));
        fill_guest_form(&mut wf);

        let err = wf.submit_guest_info().unwrap_err();
        assert!(matches!(err, WorkflowError::Pricing(_)));
        assert_eq!(wf.step(), WorkflowStep::GuestInfo);
    }

    #[test_case(false, false)]
    #[test_case(true, false)]
    #[test_case(false, true)]
    fn test_payment_unreachable_without_both_consents(terms: bool, cancellation: bool) {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.submit_guest_info().unwrap();
        wf.accept_terms(terms, cancellation).unwrap();

        let err = wf.proceed_to_payment().unwrap_err();
        assert!(matches!(err, WorkflowError::ConsentRequired(_)));
        assert_eq!(wf.step(), WorkflowStep::PaymentMethodAndTerms);
    }

    #[test]
    fn test_consent_error_names_missing_consents() {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.submit_guest_info().unwrap();
        wf.accept_terms(true, false).unwrap();

        match wf.proceed_to_payment().unwrap_err() {
            WorkflowError::ConsentRequired(missing) => {
                assert_eq!(missing, vec!["cancellation policy".to_string()]);
            }
            other => panic!("expected ConsentRequired, got {other:?}"),
        }
    }

    #[test]
    fn test_proceed_fixes_single_payment_method() {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.submit_guest_info().unwrap();
        wf.accept_terms(true, true).unwrap();
        wf.proceed_to_payment().unwrap();

        assert_eq!(wf.step(), WorkflowStep::PaymentProcessing);
        assert_eq!(wf.payment_method(), Some("stripe"));
    }

    #[test]
    fn test_back_navigation_preserves_entered_data() {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.submit_guest_info().unwrap();
        wf.accept_terms(true, true).unwrap();
        wf.proceed_to_payment().unwrap();

        wf.back().unwrap();
        assert_eq!(wf.step(), WorkflowStep::PaymentMethodAndTerms);
        assert!(wf.consent().terms_accepted);

        wf.back().unwrap();
        assert_eq!(wf.step(), WorkflowStep::GuestInfo);
        assert_eq!(wf.guest_form.first_name, "Jane");
        assert_eq!(wf.guest_form.email, "jane@example.com");

        // Forward again works with the preserved data.
        wf.submit_guest_info().unwrap();
        wf.proceed_to_payment().unwrap();
        assert_eq!(wf.step(), WorkflowStep::PaymentProcessing);
    }

    #[test]
    fn test_back_rejected_in_initial_step() {
        let mut wf = workflow();
        assert!(matches!(wf.back(), Err(WorkflowError::WrongStep(_))));
    }

    #[test]
    fn test_operations_guarded_by_step() {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.submit_guest_info().unwrap();

        // Step 1 submission again while in step 2.
        assert!(matches!(
            wf.submit_guest_info(),
            Err(WorkflowError::WrongStep(WorkflowStep::PaymentMethodAndTerms))
        ));
        // Consent checkboxes do not exist in step 1.
        let mut fresh = workflow();
        assert!(matches!(
            fresh.accept_terms(true, true),
            Err(WorkflowError::WrongStep(WorkflowStep::GuestInfo))
        ));
    }

    #[tokio::test]
    async fn test_happy_path_completes_and_persists() {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.submit_guest_info().unwrap();
        wf.accept_terms(true, true).unwrap();
        wf.proceed_to_payment().unwrap();

        let adapter = approving_adapter();
        let persistence = PersistenceClient::new(InMemoryBookingStore::new());
        let confirmation = wf
            .submit_payment(&adapter, &persistence, &valid_card())
            .await
            .unwrap();

        assert_eq!(wf.step(), WorkflowStep::Completed);
        assert_eq!(confirmation.durable_id, Some(1));
        let confirmed = wf.confirmed().unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment_id, "pi_test_1");
        assert_eq!(confirmed.id, confirmation.booking_id);
        assert_eq!(persistence.store().len(), 1);
    }

    #[tokio::test]
    async fn test_declined_payment_keeps_draft_pending_and_allows_retry() {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.submit_guest_info().unwrap();
        let draft_id = wf.draft().unwrap().id.clone();
        wf.accept_terms(true, true).unwrap();
        wf.proceed_to_payment().unwrap();

        let declining = PaymentSubmissionAdapter::new(
            MockProcessor::declining("card_declined"),
            PricingConfig::default(),
        );
        let persistence = PersistenceClient::new(InMemoryBookingStore::new());

        let err = wf
            .submit_payment(&declining, &persistence, &valid_card())
            .await
            .unwrap_err();
        match err {
            WorkflowError::Payment(PaymentError::Processing(message)) => {
                assert_eq!(message, "card_declined");
            }
            other => panic!("expected Processing, got {other:?}"),
        }
        assert_eq!(wf.step(), WorkflowStep::PaymentProcessing);
        let draft = wf.draft().unwrap();
        assert_eq!(draft.status, BookingStatus::PendingPayment);
        assert_eq!(draft.id, draft_id);
        assert!(persistence.store().is_empty());

        // The guest resubmits the same card form and succeeds.
        let confirmation = wf
            .submit_payment(&approving_adapter(), &persistence, &valid_card())
            .await
            .unwrap();
        assert_eq!(confirmation.booking_id, draft_id);
        assert_eq!(wf.step(), WorkflowStep::Completed);
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_block_confirmation() {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.submit_guest_info().unwrap();
        let draft_id = wf.draft().unwrap().id.clone();
        wf.accept_terms(true, true).unwrap();
        wf.proceed_to_payment().unwrap();

        let store = InMemoryBookingStore::new();
        store.fail_next_requests(1);
        let persistence = PersistenceClient::new(store);

        let confirmation = wf
            .submit_payment(&approving_adapter(), &persistence, &valid_card())
            .await
            .unwrap();

        // The guest still sees a confirmed booking under the client id.
        assert_eq!(confirmation.booking_id, draft_id);
        assert_eq!(confirmation.durable_id, None);
        assert_eq!(wf.step(), WorkflowStep::Completed);
        assert_eq!(wf.confirmed().unwrap().status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_invalid_card_keeps_workflow_in_place() {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.submit_guest_info().unwrap();
        wf.accept_terms(true, true).unwrap();
        wf.proceed_to_payment().unwrap();

        let persistence = PersistenceClient::new(InMemoryBookingStore::new());
        let err = wf
            .submit_payment(&approving_adapter(), &persistence, &CardForm::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Payment(PaymentError::Validation(_))
        ));
        assert_eq!(wf.step(), WorkflowStep::PaymentProcessing);
    }

    #[tokio::test]
    async fn test_reset_starts_a_fresh_booking() {
        let mut wf = workflow();
        fill_guest_form(&mut wf);
        wf.submit_guest_info().unwrap();
        wf.accept_terms(true, true).unwrap();
        wf.proceed_to_payment().unwrap();

        let persistence = PersistenceClient::new(InMemoryBookingStore::new());
        wf.submit_payment(&approving_adapter(), &persistence, &valid_card())
            .await
            .unwrap();
        assert_eq!(wf.step(), WorkflowStep::Completed);

        wf.reset(room(), date(2024, 7, 1), date(2024, 7, 2));
        assert_eq!(wf.step(), WorkflowStep::GuestInfo);
        assert_eq!(wf.guest_form, GuestInfo::default());
        assert!(wf.draft().is_none());
        assert!(wf.confirmed().is_none());
        assert_eq!(wf.consent(), Consent::default());
    }
}
