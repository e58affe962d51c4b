mod dummy;

use dummy::*;
use tessel_runtime::{LaunchError, sync::PipelineError};

#[test_log::test]
fn created_resource_is_the_same_when_read() {
    let client = test_client(2);
    let resource = Vec::from([0u8, 1, 2]);
    let handle = client.create(&resource).unwrap();

    let obtained_resource = client.read_one(&handle);

    assert_eq!(resource, obtained_resource)
}

#[test_log::test]
fn empty_allocates_zeroed_memory() {
    let client = test_client(2);
    let handle = client.empty(4).unwrap();

    assert_eq!(client.read_one(&handle), vec![0u8; 4]);
    assert_eq!(client.memory_usage().bytes_in_use, 4);
}

#[test_log::test]
fn execute_elementwise_addition_on_all_cores() {
    let client = test_client(4);
    let lhs = client.create_from_slice(&[0i32, 1, 2, 3, 4, 5, 6]).unwrap();
    let rhs = client.create_from_slice(&[4i32; 7]).unwrap();
    let out = client.empty(7 * 4).unwrap();

    let cores = client
        .launch("addition", 16, |core| {
            elementwise_addition(core, &lhs, &rhs, &out)
        })
        .unwrap();

    assert_eq!(cores, 4);
    assert_eq!(
        client.read_elems::<i32>(&out),
        Vec::from([4, 5, 6, 7, 8, 9, 10])
    );
}

#[test_log::test]
fn sync_all_orders_the_two_phases() {
    let client = test_client(6);
    let slots = client.empty(6 * 4).unwrap();

    for _ in 0..10 {
        client
            .launch("publish", 6, |core| publish_then_check(core, &slots))
            .unwrap();
    }
}

#[test_log::test]
fn failing_core_releases_the_barrier() {
    let client = test_client(4);

    let result = client.launch("failing", 4, |core| {
        if core.block_idx() == 2 {
            return Err(LaunchError::unknown("core 2 failed"));
        }
        core.sync_all()?;
        Ok(())
    });

    match result {
        Err(LaunchError::Unknown { reason, .. }) => assert_eq!(reason, "core 2 failed"),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test_log::test]
fn out_of_memory_is_reported() {
    let mut config = tessel_runtime::config::GlobalConfig::default();
    config.memory.capacity = 1024;
    let client = tessel_runtime::ComputeClient::with_config(
        tessel_runtime::HardwareProperties::atlas_a2(1),
        std::sync::Arc::new(config),
    );

    let _held = client.empty(1000).unwrap();
    let err = client.empty(100).unwrap_err();

    assert!(matches!(err, LaunchError::OutOfMemory { .. }));
    assert!(!matches!(
        err,
        LaunchError::Pipeline(PipelineError::Aborted)
    ));
}
