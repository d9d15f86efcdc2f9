//! Lead transformation stages: validate, qualify, enrich.
//!
//! Each stage degrades bad input instead of failing: one malformed lead
//! never halts a batch.

pub mod enricher;
pub mod qualifier;
pub mod validator;

pub use enricher::Enricher;
pub use qualifier::{qualify, QualifierConfig};
pub use validator::{validate, ValidatedLead};
