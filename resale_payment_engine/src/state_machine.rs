//! # Order and payment status rules
//!
//! Orders move forward along a single fulfilment path, and can be cancelled until they reach a terminal state:
//!
//! ```text
//!   created -> paid -> ktown_ordered -> ktown_confirmed -> shipped -> delivered
//!      \         \           \                \              \
//!       +---------+-----------+----------------+--------------+--> cancelled
//! ```
//!
//! `delivered` and `cancelled` are terminal.
//!
//! Payment notifications are reconciled into order status with narrower rules (see
//! [`OrderStatusType::reconcile_with`]). The gateway only knows about money, so it may confirm or void an order that
//! is waiting for payment, but it never touches an order that has moved on into fulfilment, or one that is terminal.
//! Every move reconciliation makes is also a move in the transition table.
use log::*;

use crate::db_types::{OrderStatusType, PaymentStatus};

/// The outcome of asking whether a payment should change an order's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDecision {
    /// The order already has the target status.
    Unchanged,
    /// Move the order to the given status.
    Apply(OrderStatusType),
    /// The target is not reachable from the current status. The order is left alone.
    Skip,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Delivered | OrderStatusType::Cancelled)
    }

    /// The transition table for order status. Transitions to the current status are not transitions, and return
    /// `false`.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        match (self, next) {
            (Created, Paid) |
            (Paid, KtownOrdered) |
            (KtownOrdered, KtownConfirmed) |
            (KtownConfirmed, Shipped) |
            (Shipped, Delivered) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Decides whether the status implied by a payment notification should be applied to an order in this state.
    ///
    /// Only orders waiting for payment (`created`) are moved, and only along the transition table.
    ///
    /// * `paid` and `cancelled` apply to `created` orders.
    /// * Once an order is paid, a failed or rejected attempt (possibly delivered late, out of order) does not void it.
    /// * A `cancelled` order stays cancelled even if a payment for it is approved later. That payment is recorded, and
    ///   needs an admin to decide what happens to the order.
    pub fn reconcile_with(&self, target: OrderStatusType) -> StatusDecision {
        if *self == target {
            return StatusDecision::Unchanged;
        }
        if *self == OrderStatusType::Created && self.can_transition_to(target) {
            StatusDecision::Apply(target)
        } else {
            StatusDecision::Skip
        }
    }
}

impl PaymentStatus {
    /// Maps the gateway's payment status onto ours. Unknown values are treated as failures.
    pub fn from_gateway_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "approved" => PaymentStatus::Approved,
            "rejected" | "cancelled" | "expired" => PaymentStatus::Cancelled,
            "in_process" | "pending" => PaymentStatus::Pending,
            other => {
                debug!("🔄️ Unrecognised gateway payment status '{other}'. Treating it as failed.");
                PaymentStatus::Failed
            },
        }
    }

    /// The order status implied by a payment in this state, if any.
    pub fn order_status_target(&self) -> Option<OrderStatusType> {
        match self {
            PaymentStatus::Approved => Some(OrderStatusType::Paid),
            PaymentStatus::Cancelled | PaymentStatus::Failed => Some(OrderStatusType::Cancelled),
            PaymentStatus::Pending => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::OrderStatusType::*;

    const ALL: [OrderStatusType; 7] = [Created, Paid, KtownOrdered, KtownConfirmed, Shipped, Delivered, Cancelled];

    #[test]
    fn forward_path() {
        assert!(Created.can_transition_to(Paid));
        assert!(Paid.can_transition_to(KtownOrdered));
        assert!(KtownOrdered.can_transition_to(KtownConfirmed));
        assert!(KtownConfirmed.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!Created.can_transition_to(Shipped));
        assert!(!Paid.can_transition_to(Created));
        assert!(!Delivered.can_transition_to(Shipped));
    }

    #[test]
    fn cancellation() {
        for s in ALL {
            assert_eq!(s.can_transition_to(Cancelled), !s.is_terminal(), "{s} -> cancelled");
        }
        for s in ALL {
            assert!(!Cancelled.can_transition_to(s));
            assert!(!Delivered.can_transition_to(s));
        }
    }

    #[test]
    fn no_self_transitions() {
        for s in ALL {
            assert!(!s.can_transition_to(s));
        }
    }

    #[test]
    fn gateway_status_mapping() {
        assert_eq!(PaymentStatus::from_gateway_status("approved"), PaymentStatus::Approved);
        assert_eq!(PaymentStatus::from_gateway_status("APPROVED"), PaymentStatus::Approved);
        assert_eq!(PaymentStatus::from_gateway_status("rejected"), PaymentStatus::Cancelled);
        assert_eq!(PaymentStatus::from_gateway_status("cancelled"), PaymentStatus::Cancelled);
        assert_eq!(PaymentStatus::from_gateway_status("expired"), PaymentStatus::Cancelled);
        assert_eq!(PaymentStatus::from_gateway_status("in_process"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_gateway_status("pending"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_gateway_status("charged_back"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_gateway_status(""), PaymentStatus::Failed);
    }

    #[test]
    fn payment_to_order_mapping() {
        assert_eq!(PaymentStatus::Approved.order_status_target(), Some(Paid));
        assert_eq!(PaymentStatus::Cancelled.order_status_target(), Some(Cancelled));
        assert_eq!(PaymentStatus::Failed.order_status_target(), Some(Cancelled));
        assert_eq!(PaymentStatus::Pending.order_status_target(), None);
    }

    #[test]
    fn reconciliation_rules() {
        assert_eq!(Created.reconcile_with(Paid), StatusDecision::Apply(Paid));
        assert_eq!(Created.reconcile_with(Cancelled), StatusDecision::Apply(Cancelled));
        assert_eq!(Cancelled.reconcile_with(Paid), StatusDecision::Skip);
        assert_eq!(Paid.reconcile_with(Paid), StatusDecision::Unchanged);
        assert_eq!(Cancelled.reconcile_with(Cancelled), StatusDecision::Unchanged);
        assert_eq!(Paid.reconcile_with(Cancelled), StatusDecision::Skip);
        assert_eq!(Shipped.reconcile_with(Paid), StatusDecision::Skip);
        assert_eq!(Delivered.reconcile_with(Cancelled), StatusDecision::Skip);
        assert_eq!(KtownOrdered.reconcile_with(Cancelled), StatusDecision::Skip);
    }

    #[test]
    fn reconciliation_follows_the_transition_table() {
        for from in ALL {
            for to in [Paid, Cancelled] {
                match from.reconcile_with(to) {
                    StatusDecision::Apply(next) => {
                        assert_eq!(next, to);
                        assert!(from.can_transition_to(to), "{from} -> {to}");
                    },
                    StatusDecision::Unchanged => assert_eq!(from, to),
                    StatusDecision::Skip => assert_ne!(from, to),
                }
                if from.is_terminal() {
                    assert_ne!(from.reconcile_with(to), StatusDecision::Apply(to), "{from} is terminal");
                }
            }
        }
    }
}
