use serde::{Deserialize, Serialize};

use super::super::domain::PlanKind;

/// Validity windows per billing plan kind. The windows are configuration
/// data so that plan kinds never turn into hardcoded branches in the
/// evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityWindows {
    pub monthly_validity_days: i64,
    pub yearly_validity_days: i64,
}

impl EligibilityWindows {
    /// Days a qualifying payment keeps a subject eligible; `None` for plan
    /// kinds excluded from the computation.
    pub fn validity_for(&self, plan: PlanKind) -> Option<i64> {
        match plan {
            PlanKind::Monthly => Some(self.monthly_validity_days),
            PlanKind::Yearly => Some(self.yearly_validity_days),
            PlanKind::Other => None,
        }
    }
}

impl Default for EligibilityWindows {
    fn default() -> Self {
        Self {
            monthly_validity_days: 35,
            yearly_validity_days: 370,
        }
    }
}
