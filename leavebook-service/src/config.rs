//! Service configuration

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Monthly accrual policy for the simple leave ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditPolicy {
    /// Vacation leave credited per month when a credit entry leaves the
    /// amount unspecified
    pub monthly_vl_credit: Decimal,
    /// Sick leave credited per month when a credit entry leaves the
    /// amount unspecified
    pub monthly_sl_credit: Decimal,
}

impl Default for CreditPolicy {
    fn default() -> Self {
        Self {
            monthly_vl_credit: Decimal::new(125, 2),
            monthly_sl_credit: Decimal::new(125, 2),
        }
    }
}

impl CreditPolicy {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let monthly_vl_credit = std::env::var("LEAVEBOOK_MONTHLY_VL_CREDIT")
            .unwrap_or_else(|_| "1.25".to_string())
            .parse()
            .unwrap_or(Decimal::new(125, 2));

        let monthly_sl_credit = std::env::var("LEAVEBOOK_MONTHLY_SL_CREDIT")
            .unwrap_or_else(|_| "1.25".to_string())
            .parse()
            .unwrap_or(Decimal::new(125, 2));

        Self {
            monthly_vl_credit,
            monthly_sl_credit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_credits_one_and_a_quarter() {
        let policy = CreditPolicy::default();
        assert_eq!(policy.monthly_vl_credit, Decimal::new(125, 2));
        assert_eq!(policy.monthly_sl_credit, Decimal::new(125, 2));
    }
}
