pub mod calendar;
pub mod capacity;
pub mod error;
pub mod events;
pub mod ledger;
pub mod lifecycle;
pub mod notification;
pub mod ports;
pub mod repo;
pub mod service;
