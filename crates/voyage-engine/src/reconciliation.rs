//! # Booking Service
//!
//! The transaction boundary for booking writes, and the post-commit
//! commission call that follows a status change.
//!
//! ## Update Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    update_booking(id, patch)                            │
//! │                                                                         │
//! │  ┌─────────────────────── TRANSACTION ───────────────────────────┐     │
//! │  │  1. load booking (NotFound)                                    │     │
//! │  │  2. validate patch + references + companions  (Validation)     │     │
//! │  │  3. apply fields, append tranches               (State)        │     │
//! │  │  4. resolve new status (caller / derived), policy check (State)│     │
//! │  │  5. UPDATE bookings, INSERT payments                           │     │
//! │  │  6. status changed by value?                                   │     │
//! │  │       ├─ sync every lead of the customer  (error → rollback)   │     │
//! │  │       └─ INSERT reconciliation marker                          │     │
//! │  └────────────────────────────┬───────────────────────────────────┘     │
//! │                               ▼ COMMIT                                  │
//! │  7. status changed?                                                     │
//! │       ├─ to FULLY_PAID from elsewhere → reconcile_on_fully_paid         │
//! │       └─ any other change             → reconcile_on_status_change      │
//! │     bounded by post_commit_timeout                                      │
//! │       ├─ ok     → marker processed, CommissionOutcome::Reconciled       │
//! │       └─ failed → marker attempt recorded, CommissionOutcome::Deferred  │
//! │                   (the update itself still succeeds)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use voyage_core::validation::{
    validate_companions, validate_new_booking, validate_optional_charge, validate_optional_id,
    validate_required_id, validate_tranche_amount,
};
use voyage_core::{
    Booking, BookingPatch, Commission, CoreError, Money, NewBooking, Payment, PaymentSummary,
    ReconciliationMarker, StatusChange, StatusSource, TrancheSlot, TransitionPolicy, Trip,
    ValidationError,
};
use voyage_db::repository::{booking, customer, outbox, sales_user, trip};
use voyage_db::Database;

use crate::commission::CommissionEngine;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::lead_sync::LeadStatusSync;

const DEFAULT_POST_COMMIT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Results
// =============================================================================

/// A freshly created booking.
#[derive(Debug, Clone)]
pub struct BookingCreated {
    pub booking: Booking,
    pub summary: PaymentSummary,
    /// First tranche minus the expected first payment, when they differ.
    pub first_payment_deviation: Option<Money>,
}

/// What happened to the commission after a committed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommissionOutcome {
    /// The status did not change.
    NotTriggered,
    /// Reconciliation ran; the booking's commission, if it has one.
    Reconciled(Option<Commission>),
    /// Reconciliation failed or timed out and was left for the sweep.
    Deferred { reason: String },
}

/// A committed booking update.
#[derive(Debug, Clone)]
pub struct BookingUpdate {
    pub booking: Booking,
    pub summary: PaymentSummary,
    pub status_change: Option<StatusChange>,
    pub leads_synced: usize,
    pub commission: CommissionOutcome,
}

// =============================================================================
// Booking Service
// =============================================================================

/// Creates and updates bookings.
#[derive(Clone)]
pub struct BookingService {
    db: Arc<Database>,
    lead_sync: Arc<dyn LeadStatusSync>,
    commissions: CommissionEngine,
    policy: TransitionPolicy,
    status_source: StatusSource,
    post_commit_timeout: Duration,
}

impl BookingService {
    /// A service with permissive transitions and caller-supplied status.
    pub fn new(db: Arc<Database>, lead_sync: Arc<dyn LeadStatusSync>) -> Self {
        BookingService {
            commissions: CommissionEngine::new(db.clone()),
            db,
            lead_sync,
            policy: TransitionPolicy::default(),
            status_source: StatusSource::default(),
            post_commit_timeout: DEFAULT_POST_COMMIT_TIMEOUT,
        }
    }

    pub fn from_config(
        db: Arc<Database>,
        lead_sync: Arc<dyn LeadStatusSync>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(db, lead_sync)
            .with_policy(config.transition_policy())
            .with_status_source(config.status_source())
            .with_post_commit_timeout(config.post_commit_timeout())
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_status_source(mut self, source: StatusSource) -> Self {
        self.status_source = source;
        self
    }

    pub fn with_post_commit_timeout(mut self, timeout: Duration) -> Self {
        self.post_commit_timeout = timeout;
        self
    }

    pub fn commissions(&self) -> &CommissionEngine {
        &self.commissions
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates a booking with its first tranche.
    ///
    /// A first tranche that differs from the expected first payment is
    /// accepted and reported in `first_payment_deviation`.
    pub async fn create_booking(&self, request: NewBooking) -> EngineResult<BookingCreated> {
        validate_new_booking(&request)?;

        let mut tx = self.db.begin().await?;

        if customer::get_customer(&mut tx, &request.customer_id).await?.is_none() {
            return Err(unknown_reference("Customer", &request.customer_id));
        }
        let trip = trip::get_trip(&mut tx, &request.trip_id)
            .await?
            .ok_or_else(|| unknown_reference("Trip", &request.trip_id))?;
        require_sales_user(&mut tx, &request.sales_user_id).await?;
        if let Some(agent_id) = request.referring_agent_id.as_deref() {
            require_sales_user(&mut tx, agent_id).await?;
        }
        if let Some(lead_id) = request.lead_id.as_deref() {
            require_lead(&mut tx, lead_id).await?;
        }
        require_companions_on_trip(&mut tx, &request.companion_customer_ids, &trip.id).await?;

        let now = Utc::now();
        let mut created = Booking {
            id: Uuid::new_v4().to_string(),
            customer_id: request.customer_id,
            trip_id: request.trip_id,
            sales_user_id: request.sales_user_id,
            referring_agent_id: request.referring_agent_id,
            lead_id: request.lead_id,
            companion_customer_ids: request.companion_customer_ids,
            extra_single_cents: request.extra_single.map(|m| m.cents()),
            extra_bed_cents: request.extra_bed.map(|m| m.cents()),
            extra_seat_cents: request.extra_seat.map(|m| m.cents()),
            extra_bag_cents: request.extra_bag.map(|m| m.cents()),
            discount_cents: request.discount.map(|m| m.cents()),
            first_payment_ratio: request.first_payment_ratio,
            payment_status: request.payment_status,
            first_payment: None,
            second_payment: None,
            third_payment: None,
            created_at: now,
            updated_at: now,
        };
        let first_amount = created
            .add_tranche(TrancheSlot::First, request.first_payment)?
            .amount();

        let summary = PaymentSummary::for_booking(&created, &trip)?;
        let deviation = first_amount.checked_sub(summary.expected_first).ok_or_else(|| {
            ValidationError::AmountOverflow {
                field: "first_payment".to_string(),
            }
        })?;
        let first_payment_deviation = (!deviation.is_zero()).then_some(deviation);

        booking::insert_booking(&mut tx, &created).await?;
        tx.commit().await?;

        if let Some(deviation) = first_payment_deviation {
            warn!(
                booking_id = %created.id,
                first_payment = %first_amount,
                expected = %summary.expected_first,
                deviation = %deviation,
                "First payment differs from the expected deposit"
            );
        }

        info!(
            booking_id = %created.id,
            trip_id = %created.trip_id,
            total = %summary.total,
            status = %created.payment_status,
            "Booking created"
        );

        Ok(BookingCreated {
            booking: created,
            summary,
            first_payment_deviation,
        })
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Applies a partial update.
    ///
    /// ## Errors
    /// Validation, NotFound and State errors are raised before anything is
    /// written. A lead sync failure rolls the whole update back. A failing
    /// commission call after commit is not an error; see
    /// [`CommissionOutcome::Deferred`].
    pub async fn update_booking(
        &self,
        booking_id: &str,
        patch: BookingPatch,
    ) -> EngineResult<BookingUpdate> {
        let mut tx = self.db.begin().await?;

        let mut current = booking::get_booking(&mut tx, booking_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Booking", booking_id))?;
        let previous = current.payment_status;

        check_patch(&current, &patch)?;
        check_patch_references(&mut tx, &current, &patch).await?;

        let requested = patch.payment_status;
        let new_payments = apply_patch(&mut current, patch)?;

        let trip = trip::get_trip(&mut tx, &current.trip_id)
            .await?
            .ok_or_else(|| unknown_reference("Trip", &current.trip_id))?;
        let summary = PaymentSummary::for_booking(&current, &trip)?;

        let next = self.status_source.resolve(
            previous,
            requested,
            summary.paid,
            summary.total,
            summary.expected_first,
        );
        self.policy.check(previous, next)?;

        current.payment_status = next;
        current.updated_at = Utc::now();

        booking::update_booking(&mut tx, &current).await?;
        for payment in &new_payments {
            insert_tranche(&mut tx, payment).await?;
        }

        let status_change = StatusChange::detect(previous, Some(next));
        let mut leads_synced = 0;
        let mut marker = None;

        if let Some(change) = status_change {
            leads_synced = self.sync_customer_leads(&mut tx, &current).await?;
            marker = Some(outbox::enqueue(&mut tx, &current.id, &change).await?);
        }

        tx.commit().await?;

        info!(
            booking_id = %current.id,
            status = %current.payment_status,
            status_changed = status_change.is_some(),
            tranches_added = new_payments.len(),
            leads_synced,
            "Booking updated"
        );

        let commission = match (status_change, marker) {
            (Some(change), Some(marker)) => self.reconcile_after_commit(change, &marker).await,
            _ => CommissionOutcome::NotTriggered,
        };

        Ok(BookingUpdate {
            booking: current,
            summary,
            status_change,
            leads_synced,
            commission,
        })
    }

    /// Resyncs every lead of the booking's customer on the caller's connection.
    async fn sync_customer_leads(
        &self,
        conn: &mut SqliteConnection,
        booking: &Booking,
    ) -> EngineResult<usize> {
        let leads = customer::leads_for_customer(conn, &booking.customer_id).await?;

        for lead in &leads {
            if let Err(e) = self.lead_sync.sync_lead_status(conn, &lead.id).await {
                error!(
                    booking_id = %booking.id,
                    lead_id = %lead.id,
                    error = %e,
                    "Lead sync failed, rolling back booking update"
                );
                return Err(e.into());
            }
        }

        debug!(booking_id = %booking.id, count = leads.len(), "Customer leads resynced");
        Ok(leads.len())
    }

    /// Runs the commission call a committed status change asked for.
    async fn reconcile_after_commit(
        &self,
        change: StatusChange,
        marker: &ReconciliationMarker,
    ) -> CommissionOutcome {
        let kind = change.reconcile_kind();
        let call = self.commissions.reconcile(kind, &marker.booking_id);

        let result = match tokio::time::timeout(self.post_commit_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                operation: format!("commission reconciliation ({kind})"),
                timeout_ms: self.post_commit_timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(commission) => {
                if let Err(e) = self.db.outbox().mark_processed(&marker.id).await {
                    warn!(?e, marker_id = %marker.id, "Failed to mark reconciliation marker processed");
                }
                CommissionOutcome::Reconciled(commission)
            }
            Err(e) => {
                error!(
                    booking_id = %marker.booking_id,
                    marker_id = %marker.id,
                    kind = %kind,
                    error = %e,
                    "Commission reconciliation failed, deferring to sweep"
                );
                if let Err(mark_err) = self.db.outbox().mark_failed(&marker.id, &e.to_string()).await {
                    error!(?mark_err, marker_id = %marker.id, "Failed to record reconciliation attempt");
                }
                CommissionOutcome::Deferred {
                    reason: e.to_string(),
                }
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_booking(&self, booking_id: &str) -> EngineResult<Booking> {
        self.db
            .bookings()
            .get_by_id(booking_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Booking", booking_id))
    }

    /// Total, paid, outstanding and expected first payment, computed now.
    pub async fn payment_summary(&self, booking_id: &str) -> EngineResult<PaymentSummary> {
        let current = self.get_booking(booking_id).await?;
        let trip: Trip = self
            .db
            .trips()
            .get_by_id(&current.trip_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Trip", &current.trip_id))?;

        Ok(PaymentSummary::for_booking(&current, &trip)?)
    }
}

// =============================================================================
// Patch Handling
// =============================================================================

/// Storage-free checks on a patch.
fn check_patch(current: &Booking, patch: &BookingPatch) -> EngineResult<()> {
    if let Some(trip_id) = &patch.trip_id {
        validate_required_id("trip_id", trip_id)?;
    }
    if let Some(agent_id) = &patch.sales_user_id {
        validate_required_id("sales_user_id", agent_id)?;
    }
    if let Some(referring) = &patch.referring_agent_id {
        validate_optional_id("referring_agent_id", referring.as_deref())?;
    }
    if let Some(lead) = &patch.lead_id {
        validate_optional_id("lead_id", lead.as_deref())?;
    }

    for (field, charge) in [
        ("extra_single", patch.extra_single),
        ("extra_bed", patch.extra_bed),
        ("extra_seat", patch.extra_seat),
        ("extra_bag", patch.extra_bag),
        ("discount", patch.discount),
    ] {
        if let Some(amount) = charge {
            validate_optional_charge(field, amount)?;
        }
    }

    for tranche in [&patch.second_payment, &patch.third_payment].into_iter().flatten() {
        validate_tranche_amount(tranche.amount)?;
    }

    if let Some(companions) = &patch.companion_customer_ids {
        validate_companions(&current.customer_id, companions)?;
    }

    Ok(())
}

/// Checks that everything the patch points at exists.
async fn check_patch_references(
    conn: &mut SqliteConnection,
    current: &Booking,
    patch: &BookingPatch,
) -> EngineResult<()> {
    if let Some(trip_id) = &patch.trip_id {
        if trip::get_trip(conn, trip_id).await?.is_none() {
            return Err(unknown_reference("Trip", trip_id));
        }
    }
    if let Some(agent_id) = &patch.sales_user_id {
        require_sales_user(conn, agent_id).await?;
    }
    if let Some(Some(agent_id)) = &patch.referring_agent_id {
        require_sales_user(conn, agent_id).await?;
    }
    if let Some(Some(lead_id)) = &patch.lead_id {
        require_lead(conn, lead_id).await?;
    }
    if let Some(companions) = &patch.companion_customer_ids {
        let trip_id = patch.trip_id.as_deref().unwrap_or(&current.trip_id);
        require_companions_on_trip(conn, companions, trip_id).await?;
    }
    Ok(())
}

/// Writes the patch onto `booking` and returns the tranches it added.
///
/// The status is resolved separately.
fn apply_patch(booking: &mut Booking, patch: BookingPatch) -> EngineResult<Vec<Payment>> {
    if let Some(trip_id) = patch.trip_id {
        booking.trip_id = trip_id;
    }
    if let Some(agent_id) = patch.sales_user_id {
        booking.sales_user_id = agent_id;
    }
    if let Some(referring) = patch.referring_agent_id {
        booking.referring_agent_id = referring;
    }
    if let Some(lead) = patch.lead_id {
        booking.lead_id = lead;
    }
    if let Some(companions) = patch.companion_customer_ids {
        booking.companion_customer_ids = companions;
    }
    if let Some(amount) = patch.extra_single {
        booking.extra_single_cents = amount.map(|m| m.cents());
    }
    if let Some(amount) = patch.extra_bed {
        booking.extra_bed_cents = amount.map(|m| m.cents());
    }
    if let Some(amount) = patch.extra_seat {
        booking.extra_seat_cents = amount.map(|m| m.cents());
    }
    if let Some(amount) = patch.extra_bag {
        booking.extra_bag_cents = amount.map(|m| m.cents());
    }
    if let Some(amount) = patch.discount {
        booking.discount_cents = amount.map(|m| m.cents());
    }
    if let Some(ratio) = patch.first_payment_ratio {
        booking.first_payment_ratio = ratio;
    }

    let tranches = [
        (TrancheSlot::Second, patch.second_payment),
        (TrancheSlot::Third, patch.third_payment),
    ]
    .into_iter()
    .filter_map(|(slot, tranche)| tranche.map(|t| (slot, t)));

    Ok(booking.add_tranches(tranches)?)
}

/// Inserts a tranche row, mapping a storage-level duplicate back to the rule.
async fn insert_tranche(conn: &mut SqliteConnection, payment: &Payment) -> EngineResult<()> {
    match booking::insert_payment(conn, payment).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_unique_violation_on("payments") => {
            Err(CoreError::TrancheAlreadyExists { slot: payment.slot }.into())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Reference Checks
// =============================================================================

fn unknown_reference(entity: &str, id: &str) -> EngineError {
    ValidationError::UnknownReference {
        entity: entity.to_string(),
        id: id.to_string(),
    }
    .into()
}

async fn require_sales_user(conn: &mut SqliteConnection, id: &str) -> EngineResult<()> {
    match sales_user::get_sales_user(conn, id).await? {
        Some(_) => Ok(()),
        None => Err(unknown_reference("SalesUser", id)),
    }
}

async fn require_lead(conn: &mut SqliteConnection, id: &str) -> EngineResult<()> {
    match customer::get_lead(conn, id).await? {
        Some(_) => Ok(()),
        None => Err(unknown_reference("Lead", id)),
    }
}

/// Every companion must already hold a booking on the trip.
async fn require_companions_on_trip(
    conn: &mut SqliteConnection,
    companions: &[String],
    trip_id: &str,
) -> EngineResult<()> {
    for companion in companions {
        if !booking::customer_has_booking_on_trip(conn, companion, trip_id).await? {
            return Err(ValidationError::CompanionNotOnTrip {
                customer_id: companion.clone(),
                trip_id: trip_id.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lead_sync::StampLeadSync;
    use crate::test_support::{
        insert_booking, new_booking, orphan_sales_user, service, setup, CountingLeadSync,
        FailingLeadSync,
    };
    use voyage_core::{CommissionStatus, FirstPaymentRatio, NewTranche, PaymentStatus};

    fn tranche(cents: i64) -> NewTranche {
        NewTranche::new(Money::from_cents(cents), Utc::now())
    }

    // -------------------------------------------------------------------------
    // Create
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_booking_reports_expected_deposit() {
        let db = Arc::new(setup().await);
        let svc = service(&db);

        let created = svc.create_booking(new_booking("cust-1", 500_000)).await.unwrap();
        assert_eq!(created.summary.total, Money::from_cents(1_000_000));
        assert_eq!(created.summary.expected_first, Money::from_cents(500_000));
        assert_eq!(created.summary.paid, Money::from_cents(500_000));
        assert!(created.first_payment_deviation.is_none());

        let stored = db.bookings().get_by_id(&created.booking.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::DepositPending);
        assert_eq!(stored.first_payment.unwrap().amount_cents, 500_000);
    }

    #[tokio::test]
    async fn test_create_booking_flags_but_accepts_deviation() {
        let db = Arc::new(setup().await);
        let created = service(&db)
            .create_booking(new_booking("cust-1", 200_000))
            .await
            .unwrap();

        assert_eq!(created.first_payment_deviation, Some(Money::from_cents(-300_000)));
        assert!(db.bookings().get_by_id(&created.booking.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_booking_rejects_unknown_references() {
        let db = Arc::new(setup().await);
        let svc = service(&db);

        let mut request = new_booking("cust-1", 500_000);
        request.sales_user_id = "ghost".to_string();
        let err = svc.create_booking(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut request = new_booking("cust-1", 500_000);
        request.lead_id = Some("lead-404".to_string());
        assert!(matches!(
            svc.create_booking(request).await.unwrap_err(),
            EngineError::Validation(ValidationError::UnknownReference { .. })
        ));

        let request = new_booking("cust-404", 500_000);
        assert_eq!(svc.create_booking(request).await.unwrap_err().kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_create_booking_rejects_bad_initial_state() {
        let db = Arc::new(setup().await);
        let svc = service(&db);

        let mut request = new_booking("cust-1", 500_000);
        request.payment_status = PaymentStatus::FullyPaid;
        assert_eq!(svc.create_booking(request).await.unwrap_err().kind(), ErrorKind::Validation);

        let request = new_booking("cust-1", 0);
        assert_eq!(svc.create_booking(request).await.unwrap_err().kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_companions_must_already_be_on_trip() {
        let db = Arc::new(setup().await);
        let svc = service(&db);

        let mut request = new_booking("cust-1", 500_000);
        request.companion_customer_ids = vec!["cust-2".to_string()];
        let err = svc.create_booking(request.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::CompanionNotOnTrip { .. })
        ));

        insert_booking(&db, "booking-2", "cust-2", PaymentStatus::DepositPaid).await;
        let created = svc.create_booking(request).await.unwrap();
        assert_eq!(created.booking.companion_customer_ids, vec!["cust-2".to_string()]);
    }

    // -------------------------------------------------------------------------
    // Update
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_lifecycle_example() {
        let db = Arc::new(setup().await);
        let svc = service(&db);

        let created = svc.create_booking(new_booking("cust-1", 500_000)).await.unwrap();
        let id = created.booking.id.clone();
        assert_eq!(created.summary.expected_first, Money::from_cents(500_000));

        let paid = svc
            .update_booking(&id, BookingPatch::status(PaymentStatus::FullyPaid))
            .await
            .unwrap();
        let commission = match paid.commission {
            CommissionOutcome::Reconciled(Some(c)) => c,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(commission.status, CommissionStatus::Approved);
        assert_eq!(commission.amount(), Money::from_cents(50_000));

        let cancelled = svc
            .update_booking(&id, BookingPatch::status(PaymentStatus::Cancelled))
            .await
            .unwrap();
        match cancelled.commission {
            CommissionOutcome::Reconciled(Some(c)) => assert_eq!(c.status, CommissionStatus::Pending),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let rerun = svc.commissions().reconcile_on_fully_paid(&id).await.unwrap().unwrap();
        assert_eq!(rerun.id, commission.id);
        assert_eq!(rerun.status, CommissionStatus::Pending);
        assert_eq!(db.commissions().count_for_booking(&id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_status_change_resyncs_every_lead() {
        let db = Arc::new(setup().await);
        let counter = Arc::new(CountingLeadSync::default());
        let svc = BookingService::new(db.clone(), counter.clone());
        insert_booking(&db, "booking-1", "cust-1", PaymentStatus::DepositPending).await;

        let update = svc
            .update_booking("booking-1", BookingPatch::status(PaymentStatus::DepositPaid))
            .await
            .unwrap();

        assert_eq!(update.leads_synced, 2);
        assert_eq!(counter.calls(), 2);
        assert_eq!(
            update.status_change,
            Some(StatusChange {
                from: PaymentStatus::DepositPending,
                to: PaymentStatus::DepositPaid
            })
        );
        assert_eq!(update.commission, CommissionOutcome::Reconciled(None));
    }

    #[tokio::test]
    async fn test_same_status_fires_nothing() {
        let db = Arc::new(setup().await);
        let counter = Arc::new(CountingLeadSync::default());
        let svc = BookingService::new(db.clone(), counter.clone());
        insert_booking(&db, "booking-1", "cust-1", PaymentStatus::FullyPaid).await;

        let update = svc
            .update_booking("booking-1", BookingPatch::status(PaymentStatus::FullyPaid))
            .await
            .unwrap();

        assert!(update.status_change.is_none());
        assert_eq!(update.leads_synced, 0);
        assert_eq!(counter.calls(), 0);
        assert_eq!(update.commission, CommissionOutcome::NotTriggered);
        assert_eq!(db.commissions().count_for_booking("booking-1").await.unwrap(), 0);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lead_sync_failure_rolls_back() {
        let db = Arc::new(setup().await);
        let svc = BookingService::new(db.clone(), Arc::new(FailingLeadSync));
        insert_booking(&db, "booking-1", "cust-1", PaymentStatus::DepositPending).await;

        let patch = BookingPatch {
            payment_status: Some(PaymentStatus::FullyPaid),
            second_payment: Some(tranche(500_000)),
            ..Default::default()
        };
        let err = svc.update_booking("booking-1", patch).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SideEffect);

        let stored = db.bookings().get_by_id("booking-1").await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::DepositPending);
        assert!(stored.second_payment.is_none());
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
        assert_eq!(db.commissions().count_for_booking("booking-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tranches_append_in_order() {
        let db = Arc::new(setup().await);
        let svc = service(&db);
        insert_booking(&db, "booking-1", "cust-1", PaymentStatus::DepositPaid).await;

        let patch = BookingPatch {
            third_payment: Some(tranche(100_000)),
            ..Default::default()
        };
        let err = svc.update_booking("booking-1", patch).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::State(CoreError::InvalidTrancheOrder {
                slot: TrancheSlot::Third,
                missing: TrancheSlot::Second
            })
        ));

        let patch = BookingPatch {
            second_payment: Some(tranche(300_000)),
            third_payment: Some(tranche(200_000)),
            ..Default::default()
        };
        let update = svc.update_booking("booking-1", patch).await.unwrap();
        assert_eq!(update.summary.paid, Money::from_cents(1_000_000));
        assert!(update.summary.is_settled());
        // caller-supplied status: money alone does not move it
        assert_eq!(update.booking.payment_status, PaymentStatus::DepositPaid);

        let patch = BookingPatch {
            second_payment: Some(tranche(1_000)),
            ..Default::default()
        };
        let err = svc.update_booking("booking-1", patch).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::State(CoreError::TrancheAlreadyExists {
                slot: TrancheSlot::Second
            })
        ));
    }

    #[tokio::test]
    async fn test_pricing_patch_changes_total_not_paid() {
        let db = Arc::new(setup().await);
        let svc = service(&db);
        insert_booking(&db, "booking-1", "cust-1", PaymentStatus::DepositPaid).await;

        let patch = BookingPatch {
            extra_bag: Some(Some(Money::from_cents(25_000))),
            discount: Some(Some(Money::from_cents(5_000))),
            first_payment_ratio: Some(FirstPaymentRatio::Thirty),
            ..Default::default()
        };
        assert!(patch.changes_pricing());
        let update = svc.update_booking("booking-1", patch).await.unwrap();

        assert_eq!(update.summary.total, Money::from_cents(1_020_000));
        assert_eq!(update.summary.paid, Money::from_cents(500_000));
        assert_eq!(update.summary.expected_first, Money::from_cents(306_000));

        let summary = svc.payment_summary("booking-1").await.unwrap();
        assert_eq!(summary, update.summary);

        let patch = BookingPatch {
            discount: Some(Some(Money::from_cents(-1))),
            ..Default::default()
        };
        let err = svc.update_booking("booking-1", patch).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_overflowing_amounts_are_rejected_before_write() {
        let db = Arc::new(setup().await);
        let svc = service(&db);
        insert_booking(&db, "booking-1", "cust-1", PaymentStatus::DepositPaid).await;

        let patch = BookingPatch {
            second_payment: Some(tranche(i64::MAX)),
            ..Default::default()
        };
        let err = svc.update_booking("booking-1", patch).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::AmountOverflow { .. })
        ));

        let patch = BookingPatch {
            extra_bed: Some(Some(Money::from_cents(i64::MAX))),
            ..Default::default()
        };
        assert_eq!(
            svc.update_booking("booking-1", patch).await.unwrap_err().kind(),
            ErrorKind::Validation
        );

        let stored = db.bookings().get_by_id("booking-1").await.unwrap().unwrap();
        assert!(stored.second_payment.is_none());
        assert_eq!(stored.extra_bed_cents, None);
        assert_eq!(svc.payment_summary("booking-1").await.unwrap().paid, Money::from_cents(500_000));

        let mut request = new_booking("cust-2", 500_000);
        request.extra_single = Some(Money::from_cents(i64::MAX));
        assert_eq!(svc.create_booking(request).await.unwrap_err().kind(), ErrorKind::Validation);
        assert!(db.bookings().ids_with_status(PaymentStatus::DepositPending).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_booking() {
        let db = Arc::new(setup().await);
        let err = service(&db)
            .update_booking("nope", BookingPatch::status(PaymentStatus::Cancelled))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_before_write() {
        let db = Arc::new(setup().await);
        let svc = service(&db).with_policy(TransitionPolicy::Strict);
        insert_booking(&db, "booking-1", "cust-1", PaymentStatus::Cancelled).await;

        let err = svc
            .update_booking("booking-1", BookingPatch::status(PaymentStatus::FullyPaid))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::State(CoreError::InvalidStatusTransition { .. })
        ));

        let stored = db.bookings().get_by_id("booking-1").await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Cancelled);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_derived_status_follows_tranches() {
        let db = Arc::new(setup().await);
        let svc = service(&db).with_status_source(StatusSource::Derived);
        insert_booking(&db, "booking-1", "cust-1", PaymentStatus::DepositPending).await;

        // 5,000.00 of 10,000.00 meets the 50% deposit
        let update = svc
            .update_booking("booking-1", BookingPatch::default())
            .await
            .unwrap();
        assert_eq!(update.booking.payment_status, PaymentStatus::DepositPaid);

        let patch = BookingPatch {
            second_payment: Some(tranche(500_000)),
            // ignored in derived mode
            payment_status: Some(PaymentStatus::DepositPending),
            ..Default::default()
        };
        let update = svc.update_booking("booking-1", patch).await.unwrap();
        assert_eq!(update.booking.payment_status, PaymentStatus::FullyPaid);
        assert!(matches!(update.commission, CommissionOutcome::Reconciled(Some(_))));

        let update = svc
            .update_booking("booking-1", BookingPatch::status(PaymentStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(update.booking.payment_status, PaymentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_post_commit_failure_is_deferred_not_raised() {
        let db = Arc::new(setup().await);
        let svc = BookingService::new(db.clone(), Arc::new(StampLeadSync));
        insert_booking(&db, "booking-1", "cust-1", PaymentStatus::DepositPaid).await;
        orphan_sales_user(&db, "agent-1").await;

        let update = svc
            .update_booking("booking-1", BookingPatch::status(PaymentStatus::FullyPaid))
            .await
            .unwrap();
        assert!(matches!(update.commission, CommissionOutcome::Deferred { .. }));

        let stored = db.bookings().get_by_id("booking-1").await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::FullyPaid);

        let pending = db.outbox().get_pending(10, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
        assert!(pending[0].last_error.as_deref().unwrap().contains("agent-1"));
    }

    #[tokio::test]
    async fn test_successful_reconciliation_clears_marker() {
        let db = Arc::new(setup().await);
        let svc = service(&db);
        insert_booking(&db, "booking-1", "cust-1", PaymentStatus::DepositPaid).await;

        svc.update_booking("booking-1", BookingPatch::status(PaymentStatus::FullyPaid))
            .await
            .unwrap();
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
    }
}
