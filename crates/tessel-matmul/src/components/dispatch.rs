use core::fmt::Display;

use serde::{Deserialize, Serialize};

use super::{FormattedConfigError, MatmulSetupError};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// How the block mmad overlaps operand loads with compute.
///
/// Policies only change when copies are issued; every policy accumulates in the same order and
/// produces bit-identical results.
pub enum DispatchPolicy {
    /// One L1 stage per operand, each load waits for the previous compute.
    Plain,
    /// A ring of L1 stages inside a block, drained at block boundaries.
    #[default]
    Pingpong,
    /// Loads of the next block start while the current block computes.
    Preload,
    /// Like [DispatchPolicy::Preload] with a configurable preload depth, accumulators are
    /// handed off up to `l0c_stages - 1` blocks late.
    PreloadAsync,
    /// Like [DispatchPolicy::PreloadAsync], and notifies the consumer once a block was handed
    /// off.
    PreloadAsyncWithCallback,
}

impl DispatchPolicy {
    fn is_async(&self) -> bool {
        matches!(
            self,
            DispatchPolicy::PreloadAsync | DispatchPolicy::PreloadAsyncWithCallback
        )
    }
}

impl Display for DispatchPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            DispatchPolicy::Plain => "plain",
            DispatchPolicy::Pingpong => "pingpong",
            DispatchPolicy::Preload => "preload",
            DispatchPolicy::PreloadAsync => "preload-async",
            DispatchPolicy::PreloadAsyncWithCallback => "preload-async-callback",
        };
        f.write_str(name)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Requested dispatch policy and stage counts, resolved into an [MmadConfig] at setup.
///
/// Stage counts left to `None` take the default of the policy.
pub struct MmadSelection {
    pub policy: DispatchPolicy,
    pub l1_stages: Option<usize>,
    pub l0a_stages: Option<usize>,
    pub l0b_stages: Option<usize>,
    pub l0c_stages: Option<usize>,
    pub preload_stages: Option<usize>,
    pub unit_flag: bool,
    pub shuffle_k: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Resolved block mmad pipeline.
pub struct MmadConfig {
    pub policy: DispatchPolicy,
    /// Slots of the L1 ring of each operand.
    pub l1_stages: usize,
    /// Slots of the L0A ring.
    pub l0a_stages: usize,
    /// Slots of the L0B ring.
    pub l0b_stages: usize,
    /// Accumulators that can be resident at once.
    pub l0c_stages: usize,
    /// Blocks the copy engine may run ahead of the matrix unit.
    pub preload_stages: usize,
    /// Initialize accumulators with the first partial product instead of clearing them.
    pub unit_flag: bool,
    /// Rotate the order K chunks are loaded in by core index.
    pub shuffle_k: bool,
}

impl MmadSelection {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn l1_stages(mut self, stages: usize) -> Self {
        self.l1_stages = Some(stages);
        self
    }

    pub fn l0_stages(mut self, stages: usize) -> Self {
        self.l0a_stages = Some(stages);
        self.l0b_stages = Some(stages);
        self
    }

    pub fn l0c_stages(mut self, stages: usize) -> Self {
        self.l0c_stages = Some(stages);
        self
    }

    pub fn preload_stages(mut self, stages: usize) -> Self {
        self.preload_stages = Some(stages);
        self
    }

    pub fn unit_flag(mut self, enabled: bool) -> Self {
        self.unit_flag = enabled;
        self
    }

    pub fn shuffle_k(mut self, enabled: bool) -> Self {
        self.shuffle_k = enabled;
        self
    }

    /// Fills in the defaults of the policy and validates the stage counts.
    ///
    /// `Plain` always uses single stages; synchronous policies never defer accumulators.
    pub fn resolve(&self) -> Result<MmadConfig, MatmulSetupError> {
        let policy = self.policy;
        let (l1, l0, l0c, preload) = match policy {
            DispatchPolicy::Plain => (1, 1, 1, 0),
            DispatchPolicy::Pingpong => (2, 2, 1, 0),
            DispatchPolicy::Preload => (2, 2, 1, 1),
            DispatchPolicy::PreloadAsync | DispatchPolicy::PreloadAsyncWithCallback => {
                (2, 2, 1, 1)
            }
        };

        let config = match policy {
            DispatchPolicy::Plain => MmadConfig {
                policy,
                l1_stages: l1,
                l0a_stages: l0,
                l0b_stages: l0,
                l0c_stages: l0c,
                preload_stages: preload,
                unit_flag: self.unit_flag,
                shuffle_k: self.shuffle_k,
            },
            DispatchPolicy::Pingpong | DispatchPolicy::Preload => MmadConfig {
                policy,
                l1_stages: self.l1_stages.unwrap_or(l1),
                l0a_stages: self.l0a_stages.unwrap_or(l0),
                l0b_stages: self.l0b_stages.unwrap_or(l0),
                l0c_stages: self.l0c_stages.unwrap_or(l0c),
                preload_stages: preload,
                unit_flag: self.unit_flag,
                shuffle_k: self.shuffle_k,
            },
            DispatchPolicy::PreloadAsync | DispatchPolicy::PreloadAsyncWithCallback => {
                MmadConfig {
                    policy,
                    l1_stages: self.l1_stages.unwrap_or(l1),
                    l0a_stages: self.l0a_stages.unwrap_or(l0),
                    l0b_stages: self.l0b_stages.unwrap_or(l0),
                    l0c_stages: self.l0c_stages.unwrap_or(l0c),
                    preload_stages: self.preload_stages.unwrap_or(preload),
                    unit_flag: self.unit_flag,
                    shuffle_k: self.shuffle_k,
                }
            }
        };

        config.validate()?;
        log::debug!("Resolved dispatch policy {policy} into {config:?}");

        Ok(config)
    }
}

impl MmadConfig {
    fn validate(&self) -> Result<(), MatmulSetupError> {
        let stages = [
            ("l1", self.l1_stages),
            ("l0a", self.l0a_stages),
            ("l0b", self.l0b_stages),
            ("l0c", self.l0c_stages),
        ];

        for (name, count) in stages {
            if count == 0 {
                return Err(FormattedConfigError::new(move || {
                    format!("The {name} ring needs at least one stage")
                })
                .into());
            }
        }

        if self.policy.is_async() && self.preload_stages == 0 {
            let policy = self.policy;
            return Err(FormattedConfigError::new(move || {
                format!("Policy {policy} needs a preload depth of at least one block")
            })
            .into());
        }

        Ok(())
    }

    /// Accumulators kept by the matrix unit before being handed off.
    pub fn deferred_blocks(&self) -> usize {
        match self.policy.is_async() {
            true => self.l0c_stages - 1,
            false => 0,
        }
    }

    /// Whether the consumer is notified after each hand-off.
    pub fn notifies_completion(&self) -> bool {
        self.policy == DispatchPolicy::PreloadAsyncWithCallback
    }
}

impl Default for MmadConfig {
    fn default() -> Self {
        Self {
            policy: DispatchPolicy::Pingpong,
            l1_stages: 2,
            l0a_stages: 2,
            l0b_stages: 2,
            l0c_stages: 1,
            preload_stages: 0,
            unit_flag: false,
            shuffle_k: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn plain_ignores_overrides() {
        let config = MmadSelection::new(DispatchPolicy::Plain)
            .l1_stages(4)
            .resolve()
            .unwrap();

        assert_eq!(config.l1_stages, 1);
        assert_eq!(config.preload_stages, 0);
    }

    #[test_log::test]
    fn async_policies_defer_by_accumulator_stages() {
        let config = MmadSelection::new(DispatchPolicy::PreloadAsync)
            .l0c_stages(3)
            .preload_stages(2)
            .resolve()
            .unwrap();

        assert_eq!(config.deferred_blocks(), 2);
        assert_eq!(config.preload_stages, 2);
        assert!(!config.notifies_completion());

        let sync = MmadSelection::new(DispatchPolicy::Preload)
            .l0c_stages(3)
            .resolve()
            .unwrap();
        assert_eq!(sync.deferred_blocks(), 0);
    }

    #[test_log::test]
    fn rejects_empty_rings() {
        assert!(
            MmadSelection::new(DispatchPolicy::Pingpong)
                .l0_stages(0)
                .resolve()
                .is_err()
        );
        assert!(
            MmadSelection::new(DispatchPolicy::PreloadAsyncWithCallback)
                .preload_stages(0)
                .resolve()
                .is_err()
        );
    }
}
