//! Engine error taxonomy
//!
//! Every failure aborts the whole operation with no state change, so a single
//! flat enum is enough; `category()` groups variants for transport mapping.

use thiserror::Error;

use crate::types::{Amount, Timestamp};

/// Broad error families, used by the HTTP layer to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authorization,
    Validation,
    QuestState,
    Supply,
    Reward,
    Booster,
    Referral,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewardError {
    // Authorization
    #[error("caller is not authorized for this account")]
    Unauthorized,
    #[error("caller is not the owner")]
    NotOwner,
    #[error("caller is not a registered minter")]
    NotMinter,
    #[error("caller is not the linked quest engine")]
    NotQuestHub,

    // Validation
    #[error("null address is not allowed")]
    ZeroAddress,
    #[error("malformed address: {0}")]
    InvalidAddress(String),
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("unknown quest type: {0}")]
    InvalidQuestType(String),
    #[error("invalid booster tier: {0}")]
    InvalidBoosterTier(String),
    #[error("array length mismatch: {left} vs {right}")]
    ArrayLengthMismatch { left: usize, right: usize },
    #[error("value out of range: {0}")]
    ValueOutOfRange(String),

    // Quest state
    #[error("quest {0} already completed in the current window")]
    QuestAlreadyCompleted(String),
    #[error("quest completions are on cooldown until {retry_at}")]
    QuestOnCooldown { retry_at: Timestamp },
    #[error("quest requirements not met: {0} must be completed first")]
    QuestRequirementsNotMet(String),
    #[error("bonus quest {0} requires every sibling quest in the current window")]
    AllQuestsNotCompleted(String),

    // Supply
    #[error("mint of {requested} exceeds remaining supply {remaining}")]
    MaxSupplyExceeded { requested: Amount, remaining: Amount },
    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: Amount, required: Amount },
    #[error("transfer failed: allowance too low")]
    TransferFailed,

    // Reward
    #[error("no rewards to claim")]
    NoRewardsToClaim,
    #[error("claim cooldown active until {retry_at}")]
    ClaimCooldownActive { retry_at: Timestamp },
    #[error("reward calculation overflow")]
    RewardCalculationOverflow,

    // Booster
    #[error("booster tier already active")]
    BoosterAlreadyActive,
    #[error("cannot downgrade an active booster")]
    CannotDowngradeBooster,

    // Referral
    #[error("referrer already set")]
    ReferrerAlreadySet,
    #[error("cannot refer yourself")]
    CannotReferSelf,
    #[error("referral would create a cycle")]
    ReferralCycleDetected,

    // System
    #[error("contract is paused")]
    ContractPaused,
    #[error("contract is not paused")]
    ContractNotPaused,
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("reentrant call detected")]
    ReentrancyDetected,
}

impl RewardError {
    pub fn category(&self) -> ErrorCategory {
        use RewardError::*;
        match self {
            Unauthorized | NotOwner | NotMinter | NotQuestHub => ErrorCategory::Authorization,
            ZeroAddress
            | InvalidAddress(_)
            | ZeroAmount
            | InvalidQuestType(_)
            | InvalidBoosterTier(_)
            | ArrayLengthMismatch { .. }
            | ValueOutOfRange(_) => ErrorCategory::Validation,
            QuestAlreadyCompleted(_)
            | QuestOnCooldown { .. }
            | QuestRequirementsNotMet(_)
            | AllQuestsNotCompleted(_) => ErrorCategory::QuestState,
            MaxSupplyExceeded { .. } | InsufficientBalance { .. } | TransferFailed => {
                ErrorCategory::Supply
            }
            NoRewardsToClaim | ClaimCooldownActive { .. } | RewardCalculationOverflow => {
                ErrorCategory::Reward
            }
            BoosterAlreadyActive | CannotDowngradeBooster => ErrorCategory::Booster,
            ReferrerAlreadySet | CannotReferSelf | ReferralCycleDetected => {
                ErrorCategory::Referral
            }
            ContractPaused | ContractNotPaused | InvalidConfiguration(_) | ReentrancyDetected => {
                ErrorCategory::System
            }
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        use RewardError::*;
        match self {
            Unauthorized => "Unauthorized",
            NotOwner => "NotOwner",
            NotMinter => "NotMinter",
            NotQuestHub => "NotQuestHub",
            ZeroAddress => "ZeroAddress",
            InvalidAddress(_) => "InvalidAddress",
            ZeroAmount => "ZeroAmount",
            InvalidQuestType(_) => "InvalidQuestType",
            InvalidBoosterTier(_) => "InvalidBoosterTier",
            ArrayLengthMismatch { .. } => "ArrayLengthMismatch",
            ValueOutOfRange(_) => "ValueOutOfRange",
            QuestAlreadyCompleted(_) => "QuestAlreadyCompleted",
            QuestOnCooldown { .. } => "QuestOnCooldown",
            QuestRequirementsNotMet(_) => "QuestRequirementsNotMet",
            AllQuestsNotCompleted(_) => "AllQuestsNotCompleted",
            MaxSupplyExceeded { .. } => "MaxSupplyExceeded",
            InsufficientBalance { .. } => "InsufficientBalance",
            TransferFailed => "TransferFailed",
            NoRewardsToClaim => "NoRewardsToClaim",
            ClaimCooldownActive { .. } => "ClaimCooldownActive",
            RewardCalculationOverflow => "RewardCalculationOverflow",
            BoosterAlreadyActive => "BoosterAlreadyActive",
            CannotDowngradeBooster => "CannotDowngradeBooster",
            ReferrerAlreadySet => "ReferrerAlreadySet",
            CannotReferSelf => "CannotReferSelf",
            ReferralCycleDetected => "ReferralCycleDetected",
            ContractPaused => "ContractPaused",
            ContractNotPaused => "ContractNotPaused",
            InvalidConfiguration(_) => "InvalidConfiguration",
            ReentrancyDetected => "ReentrancyDetected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(RewardError::NotMinter.category(), ErrorCategory::Authorization);
        assert_eq!(RewardError::ZeroAmount.category(), ErrorCategory::Validation);
        assert_eq!(
            RewardError::QuestAlreadyCompleted("daily_check_in".into()).category(),
            ErrorCategory::QuestState
        );
        assert_eq!(
            RewardError::MaxSupplyExceeded { requested: 2, remaining: 1 }.category(),
            ErrorCategory::Supply
        );
        assert_eq!(RewardError::ContractPaused.category(), ErrorCategory::System);
    }

    #[test]
    fn test_display_and_code() {
        let err = RewardError::InvalidQuestType("dance".into());
        assert_eq!(err.to_string(), "unknown quest type: dance");
        assert_eq!(err.code(), "InvalidQuestType");
    }
}
