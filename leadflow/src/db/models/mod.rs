//! Store entity models and create/update request types.

pub mod analytics;
pub mod clients;
pub mod leads;
pub mod payments;
pub mod suppressions;
