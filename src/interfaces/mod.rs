//! Abstract interfaces for external collaborators.
//!
//! These traits define the contracts for:
//! - Registrant persistence (the transactional relational store)
//! - Outbound email (fire-and-forget welcome mail)

pub mod email;
pub mod registrant_store;

pub use email::{EmailError, EmailSender, NoopEmailSender, OutboundEmail};
pub use registrant_store::{ConflictField, CreditOutcome, RegistrantStore, StoreError};
