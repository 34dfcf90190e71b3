//! Referral attribution and reward accrual engine.
//!
//! Powers an early-access growth program: every registrant receives a unique
//! referral code; when a new registrant supplies someone else's code, the
//! referrer's referral count and bonus balance are credited exactly once,
//! atomically, even under concurrent registrations. A derived leaderboard
//! ranks registrants by referral count with deterministic tie-breaking.
//!
//! All race prevention is delegated to the transactional store: inserts carry
//! their uniqueness checks, and counter updates are single atomic statements.
//! The engine holds no locks and no in-process mutable state.

pub mod attribution;
pub mod codegen;
pub mod config;
pub mod dashboard;
pub mod facade;
pub mod interfaces;
pub mod leaderboard;
pub mod logging;
pub mod model;
pub mod registration;
pub mod stats;
pub mod storage;

pub use facade::EarlyAccess;
