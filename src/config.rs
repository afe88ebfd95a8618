use serde::{Deserialize, Serialize};

/// Engine tuning knobs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// A sequence clause is evaluated against the forward index (via NFA)
    /// when its reverse-matching cost exceeds the anchor clause's cost by
    /// this factor.
    pub forward_match_factor: u64,
    /// Maximum number of hits a single collect call will materialize.
    pub max_hits_to_collect: usize,
    /// How often (in iterator calls) the hit-collection loop polls the
    /// cancellation token.
    pub cancel_poll_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            forward_match_factor: 5,
            max_hits_to_collect: 10_000_000,
            cancel_poll_interval: 1024,
        }
    }
}
