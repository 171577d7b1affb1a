//! Domain models for the staff directory.
//!
//! This module contains the core domain types: staff identifiers, the
//! manager reference, staff records, the input field set, and configuration.

/// Staff records and their identifiers.
pub mod staff;
pub use staff::{Parent, Profile, StaffId, StaffRecord};

/// The partially-specified field set accepted by create and update.
pub mod fields;
pub use fields::StaffFields;

mod config;
pub use config::Config;
