pub mod accrual;
pub mod auth_service;
pub mod billing_events;
pub mod payout;
pub mod receipt;
pub mod referral_code;
pub mod referral_ledger;
