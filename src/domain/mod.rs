pub mod actor;
pub mod catalog;
pub mod coupon;
pub mod error;
pub mod event_order;
pub mod gear_order;
pub mod id;
pub mod lifecycle;
pub mod money;
pub mod notify;
pub mod payment;
pub mod pricing;
pub mod provider;
pub mod store;
pub mod subscription;
pub mod workshop;
