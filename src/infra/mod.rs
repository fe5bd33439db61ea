pub mod billing;
pub mod email;
pub mod factory;
pub mod marketing;
pub mod repositories;
