use serde::{Deserialize, Serialize};

/// A single named limit: how many tokens `id` may spend per interval.
///
/// Wire names are camelCase (`intervalSeconds`, `tokensPerInterval`) to
/// match the JSON configuration format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitDefinition {
    /// Identifier the limit applies to. Unique within a configuration;
    /// on duplicates the last definition wins.
    pub id: String,
    /// Refill interval in seconds. Must be positive.
    pub interval_seconds: u64,
    /// Token budget granted at the start of each interval.
    pub tokens_per_interval: u64,
}
