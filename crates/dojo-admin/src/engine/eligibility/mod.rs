pub mod clock;
mod config;

pub use config::EligibilityWindows;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{PaymentRecord, PlanKind};

/// Why a subject is (or is not) currently entitled to attend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    Trial,
    PaidMonthly,
    PaidYearly,
    Expired,
}

/// Derived payment-eligibility status. Recomputed on every query; the
/// payment history is the source of truth, so nothing here is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityStatus {
    pub eligible: bool,
    pub reason: EligibilityReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_kind: Option<PlanKind>,
}

impl EligibilityStatus {
    fn trial() -> Self {
        Self {
            eligible: true,
            reason: EligibilityReason::Trial,
            last_payment_date: None,
            plan_kind: None,
        }
    }
}

/// Stateless evaluator deriving a trial/active/expired status from a
/// subject's successful-payment history.
#[derive(Debug, Clone)]
pub struct PaymentEligibilityEvaluator {
    windows: EligibilityWindows,
}

impl PaymentEligibilityEvaluator {
    pub fn new(windows: EligibilityWindows) -> Self {
        Self { windows }
    }

    /// Evaluate against a history ordered most recent first. Payments that
    /// did not succeed or belong to non-qualifying plan kinds are ignored
    /// entirely; a subject left with no qualifying payment is in the
    /// introductory trial period by policy.
    pub fn evaluate(&self, history: &[PaymentRecord], today: NaiveDate) -> EligibilityStatus {
        let Some(payment) = history
            .iter()
            .find(|payment| payment.succeeded && payment.plan_kind.qualifies())
        else {
            return EligibilityStatus::trial();
        };

        let Some(validity_days) = self.windows.validity_for(payment.plan_kind) else {
            return EligibilityStatus::trial();
        };

        let elapsed = clock::elapsed_days(payment.occurred_at, today);
        // A payment exactly `validity_days` old still counts.
        if elapsed <= validity_days {
            let reason = match payment.plan_kind {
                PlanKind::Monthly => EligibilityReason::PaidMonthly,
                PlanKind::Yearly | PlanKind::Other => EligibilityReason::PaidYearly,
            };
            EligibilityStatus {
                eligible: true,
                reason,
                last_payment_date: Some(payment.occurred_at),
                plan_kind: Some(payment.plan_kind),
            }
        } else {
            EligibilityStatus {
                eligible: false,
                reason: EligibilityReason::Expired,
                last_payment_date: Some(payment.occurred_at),
                plan_kind: Some(payment.plan_kind),
            }
        }
    }
}
