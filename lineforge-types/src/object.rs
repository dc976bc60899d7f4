use serde::{Deserialize, Serialize};
use std::fmt;

/// The remote object types this system reconciles.
///
/// AdUnit, Placement, Network, and User are read-only lookups; LineItem and
/// Lica are create-only; the rest are fetch-or-create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Advertiser,
    Order,
    Creative,
    LineItem,
    Lica,
    TargetingKey,
    TargetingValue,
    AdUnit,
    Placement,
    Network,
    User,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Advertiser => "Advertiser",
            Self::Order => "Order",
            Self::Creative => "Creative",
            Self::LineItem => "LineItem",
            Self::Lica => "LineItemCreativeAssociation",
            Self::TargetingKey => "CustomTargetingKey",
            Self::TargetingValue => "CustomTargetingValue",
            Self::AdUnit => "AdUnit",
            Self::Placement => "Placement",
            Self::Network => "Network",
            Self::User => "User",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
