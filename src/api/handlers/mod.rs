pub mod admin;
pub mod ambassador;
pub mod auth;
pub mod billing;
pub mod health;
pub mod referral;
pub mod waitlist;
