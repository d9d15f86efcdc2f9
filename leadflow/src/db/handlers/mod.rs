//! Typed repositories over the store schema.

pub mod analytics;
pub mod clients;
pub mod deliveries;
pub mod industry_rules;
pub mod lead_sources;
pub mod payments;
pub mod qualified_leads;
pub mod raw_leads;
pub mod repository;
pub mod suppressions;

pub use clients::Clients;
pub use deliveries::Deliveries;
pub use industry_rules::IndustryRules;
pub use lead_sources::LeadSources;
pub use payments::Payments;
pub use qualified_leads::QualifiedLeads;
pub use raw_leads::RawLeads;
pub use repository::Repository;
pub use suppressions::Suppressions;
