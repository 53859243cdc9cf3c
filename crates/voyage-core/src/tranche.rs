//! # Payment Tranches
//!
//! A booking is paid in up to three ordered, append-only tranches.
//!
//! ```text
//!   first ──► second ──► third
//!     │          │          │
//!     └ required └ needs    └ needs
//!       at create  first      second
//!
//!   A filled slot is never overwritten.
//!   No cap against the booking total (overpayment is allowed).
//! ```

use chrono::Utc;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::{Booking, NewTranche, Payment, TrancheSlot};
use crate::validation::validate_tranche_amount;

/// Checks whether `slot` may be filled on `booking` without changing it.
///
/// ## Errors
/// - [`CoreError::TrancheAlreadyExists`] if the slot is already filled
/// - [`CoreError::InvalidTrancheOrder`] if the preceding slot is empty
pub fn check_tranche_slot(booking: &Booking, slot: TrancheSlot) -> CoreResult<()> {
    if booking.tranche(slot).is_some() {
        return Err(CoreError::TrancheAlreadyExists { slot });
    }
    if let Some(missing) = slot.predecessor() {
        if booking.tranche(missing).is_none() {
            return Err(CoreError::InvalidTrancheOrder { slot, missing });
        }
    }
    Ok(())
}

impl Booking {
    /// Records a tranche in `slot`.
    ///
    /// ## Rules
    /// - amount must be strictly positive
    /// - second requires first, third requires second
    /// - a filled slot cannot be replaced
    ///
    /// ## Example
    /// ```rust,ignore
    /// booking.add_tranche(TrancheSlot::Second, NewTranche::new(amount, paid_at))?;
    /// ```
    pub fn add_tranche(&mut self, slot: TrancheSlot, tranche: NewTranche) -> CoreResult<&Payment> {
        validate_tranche_amount(tranche.amount)?;
        check_tranche_slot(self, slot)?;

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            booking_id: self.id.clone(),
            slot,
            amount_cents: tranche.amount.cents(),
            paid_at: tranche.paid_at,
            proof_uri: tranche.proof_uri,
            created_at: Utc::now(),
        };

        let target = self.tranche_mut(slot);
        Ok(&*target.insert(payment))
    }

    /// Records several tranches in slot order, all or nothing.
    ///
    /// Supplying second and third together is fine because second lands
    /// first. On error `self` is left untouched.
    pub fn add_tranches(
        &mut self,
        tranches: impl IntoIterator<Item = (TrancheSlot, NewTranche)>,
    ) -> CoreResult<Vec<Payment>> {
        let mut ordered: Vec<_> = tranches.into_iter().collect();
        ordered.sort_by_key(|(slot, _)| *slot);

        let mut staged = self.clone();
        let mut added = Vec::with_capacity(ordered.len());
        for (slot, tranche) in ordered {
            added.push(staged.add_tranche(slot, tranche)?.clone());
        }

        *self = staged;
        Ok(added)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::pricing::tests::booking;
    use crate::types::FirstPaymentRatio;

    fn tranche(cents: i64) -> NewTranche {
        NewTranche::new(Money::from_cents(cents), Utc::now())
    }

    #[test]
    fn test_slots_fill_in_order() {
        let mut b = booking(FirstPaymentRatio::Half);
        b.add_tranche(TrancheSlot::First, tranche(500)).unwrap();
        b.add_tranche(TrancheSlot::Second, tranche(300)).unwrap();
        let third = b
            .add_tranche(TrancheSlot::Third, tranche(200).with_proof("s3://proofs/3.pdf"))
            .unwrap();

        assert_eq!(third.slot, TrancheSlot::Third);
        assert_eq!(third.booking_id, "booking-1");
        assert_eq!(third.proof_uri.as_deref(), Some("s3://proofs/3.pdf"));
        assert_eq!(b.tranches().count(), 3);
    }

    #[test]
    fn test_second_without_first_is_rejected() {
        let mut b = booking(FirstPaymentRatio::Half);
        let err = b.add_tranche(TrancheSlot::Second, tranche(300)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTrancheOrder {
                slot: TrancheSlot::Second,
                missing: TrancheSlot::First
            }
        ));
        assert!(b.second_payment.is_none());
    }

    #[test]
    fn test_third_without_second_is_rejected() {
        let mut b = booking(FirstPaymentRatio::Half);
        b.add_tranche(TrancheSlot::First, tranche(500)).unwrap();
        let err = b.add_tranche(TrancheSlot::Third, tranche(300)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTrancheOrder {
                missing: TrancheSlot::Second,
                ..
            }
        ));
    }

    #[test]
    fn test_overwrite_is_rejected() {
        let mut b = booking(FirstPaymentRatio::Half);
        b.add_tranche(TrancheSlot::First, tranche(500)).unwrap();
        let err = b.add_tranche(TrancheSlot::First, tranche(900)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::TrancheAlreadyExists {
                slot: TrancheSlot::First
            }
        ));
        assert_eq!(b.first_payment.as_ref().unwrap().amount_cents, 500);
    }

    #[test]
    fn test_non_positive_amount_is_rejected() {
        let mut b = booking(FirstPaymentRatio::Half);
        assert!(matches!(
            b.add_tranche(TrancheSlot::First, tranche(0)),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_no_cap_against_total() {
        let mut b = booking(FirstPaymentRatio::Half);
        assert!(b.add_tranche(TrancheSlot::First, tranche(i64::MAX / 4)).is_ok());
    }

    #[test]
    fn test_add_tranches_sorts_and_is_atomic() {
        let mut b = booking(FirstPaymentRatio::Half);
        b.add_tranche(TrancheSlot::First, tranche(500)).unwrap();

        let added = b
            .add_tranches([(TrancheSlot::Third, tranche(100)), (TrancheSlot::Second, tranche(200))])
            .unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].slot, TrancheSlot::Second);

        let mut fresh = booking(FirstPaymentRatio::Half);
        fresh.add_tranche(TrancheSlot::First, tranche(500)).unwrap();
        let before = fresh.clone();
        // the repeated first slot fails, so second is not kept either
        let result =
            fresh.add_tranches([(TrancheSlot::Second, tranche(200)), (TrancheSlot::First, tranche(1))]);
        assert!(result.is_err());
        assert_eq!(fresh, before);
    }
}
