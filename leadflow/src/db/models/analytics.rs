//! Result types for the on-demand analytics aggregates.

use serde::Serialize;

/// raw -> qualified conversion for one platform.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlatformConversion {
    pub raw: i64,
    pub qualified: i64,
    pub rate: f64,
}

/// qualified -> delivered conversion for one (client, platform) pair.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeliveryConversion {
    pub qualified: i64,
    pub delivered: i64,
    pub rate: f64,
}

/// delivered -> opened / bounced engagement for one
/// (client, platform, method) group.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EngagementStats {
    pub delivered: i64,
    pub opened: i64,
    pub bounced: i64,
    pub open_rate: f64,
    pub bounce_rate: f64,
}
