//! The closed vocabulary of broker topics the sagas react to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// A named saga step. Each variant is one broker topic.
///
/// Forward checkout steps run in declaration order, from `UpdateQuantities`
/// to `NotifyAdmins`. A `*Failed` step is emitted when its forward step runs
/// out of retries; its handler undoes the previous forward step and emits
/// that step's failure in turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    UpdateQuantities,
    UpdateFinancialInfos,
    UpdateFinancialInfosFailed,
    ClearCart,
    ClearCartFailed,
    CreateOrder,
    CreateOrderFailed,
    UpdatePurchasesAndSalesCounts,
    UpdatePurchasesAndSalesCountsFailed,
    NotifyBuyer,
    NotifyAdmins,
    RemoveProductsCartItems,
    RemoveOrAnonymizeProducts,
    RemoveUser,
    RemoveOrphanedProducts,
}

impl Step {
    /// Every step, in topic order.
    pub const ALL: [Step; 15] = [
        Step::UpdateQuantities,
        Step::UpdateFinancialInfos,
        Step::UpdateFinancialInfosFailed,
        Step::ClearCart,
        Step::ClearCartFailed,
        Step::CreateOrder,
        Step::CreateOrderFailed,
        Step::UpdatePurchasesAndSalesCounts,
        Step::UpdatePurchasesAndSalesCountsFailed,
        Step::NotifyBuyer,
        Step::NotifyAdmins,
        Step::RemoveProductsCartItems,
        Step::RemoveOrAnonymizeProducts,
        Step::RemoveUser,
        Step::RemoveOrphanedProducts,
    ];

    /// Returns the broker topic name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::UpdateQuantities => "update-quantities",
            Step::UpdateFinancialInfos => "update-financial-infos",
            Step::UpdateFinancialInfosFailed => "update-financial-infos-failed",
            Step::ClearCart => "clear-cart",
            Step::ClearCartFailed => "clear-cart-failed",
            Step::CreateOrder => "create-order",
            Step::CreateOrderFailed => "create-order-failed",
            Step::UpdatePurchasesAndSalesCounts => "update-purchases-and-sales-counts",
            Step::UpdatePurchasesAndSalesCountsFailed => "update-purchases-and-sales-counts-failed",
            Step::NotifyBuyer => "notify-buyer",
            Step::NotifyAdmins => "notify-admins",
            Step::RemoveProductsCartItems => "remove-products-cart-items",
            Step::RemoveOrAnonymizeProducts => "remove-or-anonymize-products",
            Step::RemoveUser => "remove-user",
            Step::RemoveOrphanedProducts => "remove-orphaned-products",
        }
    }

    /// Returns the failure topic emitted when this step exhausts its retries.
    ///
    /// `None` for steps whose exhaustion does not compensate: the first
    /// checkout step, the notifications, the compensations themselves and
    /// the deletion flow.
    pub fn failed(&self) -> Option<Step> {
        match self {
            Step::UpdateFinancialInfos => Some(Step::UpdateFinancialInfosFailed),
            Step::ClearCart => Some(Step::ClearCartFailed),
            Step::CreateOrder => Some(Step::CreateOrderFailed),
            Step::UpdatePurchasesAndSalesCounts => Some(Step::UpdatePurchasesAndSalesCountsFailed),
            _ => None,
        }
    }

    /// Returns the forward step whose effect a compensation undoes.
    ///
    /// `X-failed` undoes the step before `X`.
    pub fn compensates(&self) -> Option<Step> {
        match self {
            Step::UpdateFinancialInfosFailed => Some(Step::UpdateQuantities),
            Step::ClearCartFailed => Some(Step::UpdateFinancialInfos),
            Step::CreateOrderFailed => Some(Step::ClearCart),
            Step::UpdatePurchasesAndSalesCountsFailed => Some(Step::CreateOrder),
            _ => None,
        }
    }

    /// Returns true for the `*-failed` topics.
    pub fn is_compensation(&self) -> bool {
        self.compensates().is_some()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = SagaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| SagaError::UnknownStep(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names_round_trip() {
        for step in Step::ALL {
            assert_eq!(step.as_str().parse::<Step>().unwrap(), step);
        }
    }

    #[test]
    fn test_serde_uses_topic_names() {
        for step in Step::ALL {
            let json = serde_json::to_value(step).unwrap();
            assert_eq!(json, step.as_str());
        }
    }

    #[test]
    fn test_unknown_topic() {
        assert!(matches!(
            "update-balances".parse::<Step>(),
            Err(SagaError::UnknownStep(_))
        ));
    }

    #[test]
    fn test_failure_cascade_walks_back_to_first_step() {
        // Each compensation undoes the step before the one that failed.
        let mut hops = 0;
        let mut current = Step::UpdatePurchasesAndSalesCountsFailed;
        loop {
            hops += 1;
            let undone = current.compensates().unwrap();
            match undone.failed() {
                Some(next) => current = next,
                None => {
                    assert_eq!(undone, Step::UpdateQuantities);
                    break;
                }
            }
        }
        assert_eq!(hops, 4);
    }

    #[test]
    fn test_steps_without_compensation() {
        for step in [
            Step::UpdateQuantities,
            Step::NotifyBuyer,
            Step::NotifyAdmins,
            Step::RemoveUser,
            Step::RemoveOrphanedProducts,
        ] {
            assert_eq!(step.failed(), None);
        }
        assert!(Step::ClearCartFailed.is_compensation());
        assert!(!Step::ClearCart.is_compensation());
    }
}
