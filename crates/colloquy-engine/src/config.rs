/// Loop controller configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on model/tool iterations within one turn. Reaching it
    /// without a terminal response fails the turn.
    pub max_iterations: usize,

    /// Capacity of the per-turn event channel.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            channel_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}
