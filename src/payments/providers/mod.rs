//! Payment gateway implementations

pub mod paystack;

pub use paystack::{PaystackConfig, PaystackProvider};
