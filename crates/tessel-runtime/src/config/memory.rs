/// Configuration of the simulated off-chip memory.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of bytes that can be allocated at once.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    // 4 GiB
    4 << 30
}
