pub mod ambassador;
pub mod auth;
pub mod payout;
pub mod subscription;
pub mod waitlist;
