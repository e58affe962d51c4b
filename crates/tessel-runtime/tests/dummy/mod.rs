mod kernels;

pub use kernels::*;

use std::sync::Arc;

use tessel_runtime::{ComputeClient, HardwareProperties, config::GlobalConfig};

/// A client on a small device with a private configuration.
pub fn test_client(core_count: u32) -> ComputeClient {
    ComputeClient::with_config(
        HardwareProperties::atlas_a2(core_count),
        Arc::new(GlobalConfig::default()),
    )
}
