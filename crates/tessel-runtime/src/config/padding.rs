/// When an operand gets repacked into an aligned workspace before the matmul runs.
///
/// An operand whose leading stride is below `max_stride` needs padding when the stride is not
/// a multiple of `align`. Strides at or above `max_stride` can't be expressed by the copy
/// engine and always need padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PaddingConfig {
    /// Alignment, in elements, of an operand leading stride.
    #[serde(default = "default_align")]
    pub align: usize,
    /// Largest stride the copy engine accepts without repacking.
    #[serde(default = "default_max_stride")]
    pub max_stride: usize,
}

impl Default for PaddingConfig {
    fn default() -> Self {
        Self {
            align: default_align(),
            max_stride: default_max_stride(),
        }
    }
}

impl PaddingConfig {
    /// Whether an operand with the given leading stride must be repacked.
    ///
    /// A zero alignment can't be met, so every stride needs padding.
    pub fn needs_padding(&self, stride: usize) -> bool {
        if stride < self.max_stride {
            stride.checked_rem(self.align).is_none_or(|rem| rem != 0)
        } else {
            true
        }
    }

    /// Whether the policy can be applied: the alignment must be positive.
    pub fn is_valid(&self) -> bool {
        self.align > 0
    }
}

fn default_align() -> usize {
    256
}

fn default_max_stride() -> usize {
    65536
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn aligned_strides_skip_padding() {
        let config = PaddingConfig::default();

        assert!(!config.needs_padding(512));
        assert!(config.needs_padding(300));
        assert!(config.needs_padding(65536));
    }

    #[test_log::test]
    fn zero_alignment_is_invalid() {
        let config = PaddingConfig {
            align: 0,
            ..Default::default()
        };

        assert!(!config.is_valid());
        assert!(config.needs_padding(300));
        assert!(PaddingConfig::default().is_valid());
    }
}
