pub mod sqlite_ambassador_repo;
pub mod sqlite_waitlist_repo;
pub mod sqlite_commission_repo;
pub mod sqlite_referral_repo;
pub mod sqlite_student_repo;
pub mod sqlite_receipt_repo;

pub mod postgres_ambassador_repo;
pub mod postgres_waitlist_repo;
pub mod postgres_commission_repo;
pub mod postgres_referral_repo;
pub mod postgres_student_repo;
pub mod postgres_receipt_repo;
