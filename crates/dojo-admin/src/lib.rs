//! Back-office engine for a martial arts school: payment-based eligibility,
//! event-registration constraints, and automated discount issuance driven by
//! domain events. Storage, notification delivery, and the surrounding CRUD
//! screens are external collaborators reached through traits.

pub mod config;
pub mod engine;
pub mod error;
pub mod telemetry;
