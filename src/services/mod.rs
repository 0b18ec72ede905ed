pub mod cart_validation;
pub mod checkout;
pub mod notifications;
pub mod orders;
pub mod reconciliation;
