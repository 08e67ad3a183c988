//! Booster Module
//!
//! Time-limited multiplier tiers and the write-once referral graph. Together
//! they produce the composed boost multiplier the quest engine applies.

pub mod registry;
pub mod tier;

pub use registry::{BoosterRecord, BoosterRegistry, ReferralRecord};
pub use tier::BoosterTier;
