use core::fmt::Display;

use tessel_common::Element;
use tessel_runtime::HardwareProperties;

use super::{AccOf, FormattedConfigError, InputOf, MatmulPrecision, MatmulSetupError, MmadConfig, TilingScheme};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
/// On-chip memory tiers of a core.
pub enum MemoryTier {
    L1,
    L0A,
    L0B,
    L0C,
    UB,
}

impl MemoryTier {
    /// Capacity of the tier in bytes.
    pub fn capacity(&self, properties: &HardwareProperties) -> usize {
        match self {
            MemoryTier::L1 => properties.l1_size,
            MemoryTier::L0A => properties.l0a_size,
            MemoryTier::L0B => properties.l0b_size,
            MemoryTier::L0C => properties.l0c_size,
            MemoryTier::UB => properties.ub_size,
        }
    }
}

impl Display for MemoryTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            MemoryTier::L1 => "L1",
            MemoryTier::L0A => "L0A",
            MemoryTier::L0B => "L0B",
            MemoryTier::L0C => "L0C",
            MemoryTier::UB => "UB",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Bytes a configuration statically reserves in each on-chip tier.
pub struct OnChipFootprint {
    requested: Vec<(MemoryTier, usize)>,
}

impl OnChipFootprint {
    /// Footprint of the block mmad rings.
    ///
    /// - L1: `(l1.m·l1.k + l1.k·l1.n)·S(In)·l1_stages`
    /// - L0A: `l0.m·l0.k·S(In)·l0a_stages`, L0B: `l0.k·l0.n·S(In)·l0b_stages`
    /// - L0C: `l0.m·l0.n·S(Acc)·l0c_stages`
    pub fn mmad<MP: MatmulPrecision>(tiling: &TilingScheme, config: &MmadConfig) -> Self {
        let input = InputOf::<MP>::size();
        let acc = AccOf::<MP>::size();
        let TilingScheme { l1, l0 } = *tiling;

        Self::default()
            .with(
                MemoryTier::L1,
                (l1.m * l1.k + l1.k * l1.n) * input * config.l1_stages,
            )
            .with(MemoryTier::L0A, l0.m * l0.k * input * config.l0a_stages)
            .with(MemoryTier::L0B, l0.k * l0.n * input * config.l0b_stages)
            .with(MemoryTier::L0C, l0.m * l0.n * acc * config.l0c_stages)
    }

    /// Adds `bytes` to the footprint of `tier`.
    pub fn with(mut self, tier: MemoryTier, bytes: usize) -> Self {
        match self.requested.iter_mut().find(|(known, _)| *known == tier) {
            Some((_, total)) => *total += bytes,
            None => self.requested.push((tier, bytes)),
        }
        self
    }

    /// Bytes reserved in `tier`.
    pub fn bytes(&self, tier: MemoryTier) -> usize {
        self.requested
            .iter()
            .find(|(known, _)| *known == tier)
            .map(|(_, bytes)| *bytes)
            .unwrap_or(0)
    }

    /// Fails when a tier is over capacity.
    pub fn check(&self, properties: &HardwareProperties) -> Result<(), MatmulSetupError> {
        for (tier, requested) in self.requested.iter().copied() {
            let available = tier.capacity(properties);
            if requested > available {
                return Err(FormattedConfigError::new(move || {
                    format!(
                        "{tier} footprint of {requested} bytes exceeds its capacity of {available} bytes"
                    )
                })
                .into());
            }
        }

        Ok(())
    }
}
