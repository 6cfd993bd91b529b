pub mod checkout;
pub mod coupons;
pub mod notifications;
pub mod orders;
pub mod pricing;
pub mod reconciler;
pub mod subscriptions;
pub mod sweeper;
