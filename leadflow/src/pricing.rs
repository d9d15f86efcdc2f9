//! Static pricing and plan tables.
//!
//! These tables are configuration, not state: they are consulted by the
//! delivery engine and the billing lifecycle but never mutated at runtime.

use crate::types::Tier;

/// A base subscription plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plan {
    pub name: &'static str,
    /// Monthly subscription price.
    pub price: f64,
    /// Fraction taken off the per-lead base price, in [0, 1].
    pub discount: f64,
    /// Maximum leads delivered per calendar month, all channels combined.
    pub lead_cap: i64,
    pub period_days: i64,
}

pub static BASE_PLANS: [Plan; 3] = [
    Plan {
        name: "starter",
        price: 499.0,
        discount: 0.4,
        lead_cap: 50,
        period_days: 30,
    },
    Plan {
        name: "pro",
        price: 999.0,
        discount: 0.6,
        lead_cap: 150,
        period_days: 30,
    },
    Plan {
        name: "elite",
        price: 1999.0,
        discount: 0.7,
        lead_cap: 500,
        period_days: 30,
    },
];

/// Trial pack parameters.
#[derive(Debug, Clone, Copy)]
pub struct TrialConfig {
    pub price: f64,
    /// Leads included in the trial pack.
    pub leads: i64,
    /// Days the trial stays valid after the trial payment.
    pub days_valid: i64,
}

pub const TRIAL_CONFIG: TrialConfig = TrialConfig {
    price: 49.0,
    leads: 10,
    days_valid: 7,
};

pub const GRACE_PERIOD_DAYS: i64 = 5;
pub const AUTO_DOWNGRADE: bool = true;

/// Look up a subscription plan by name.
pub fn plan(name: &str) -> Option<&'static Plan> {
    BASE_PLANS.iter().find(|p| p.name == name)
}

/// Per-lead base price for a tier.
pub fn lead_price(tier: Tier) -> f64 {
    match tier {
        Tier::Basic => 15.0,
        Tier::Mid => 45.0,
        Tier::High => 150.0,
    }
}

/// Monthly per-industry cap for pay-per-lead clients.
pub fn pay_per_lead_cap(tier: Tier) -> i64 {
    match tier {
        Tier::Basic => 50,
        Tier::Mid => 100,
        Tier::High => 200,
    }
}

/// Map an industry to its pricing tier. Unknown industries price as `basic`.
pub fn tier_for(industry: &str) -> Tier {
    match industry.trim().to_lowercase().replace(' ', "_").as_str() {
        "restaurants" | "salons" | "cleaning" | "plumbing" | "electricians" => Tier::Basic,
        "fitness" | "real_estate" | "insurance" | "saas" => Tier::Mid,
        "law" | "consulting" => Tier::High,
        _ => Tier::Basic,
    }
}

/// Round money to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Price of one lead for a subscribed client: the tier base price with the
/// plan discount applied, clamped to be non-negative.
pub fn discounted_lead_price(tier: Tier, plan: &Plan) -> f64 {
    round2(lead_price(tier) * (1.0 - plan.discount)).max(0.0)
}
