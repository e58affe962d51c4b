use tessel_common::Element;
use tessel_runtime::{CoreContext, Handle, LaunchError};

/// Adds two `i32` buffers, each core taking every `block_num`-th element.
pub fn elementwise_addition(
    core: &CoreContext<'_>,
    lhs: &Handle,
    rhs: &Handle,
    out: &Handle,
) -> Result<(), LaunchError> {
    let len = lhs.len::<i32>();
    let lhs = lhs.read(i32::from_bytes);
    let rhs = rhs.read(i32::from_bytes);

    for index in (core.block_idx() as usize..len).step_by(core.block_num() as usize) {
        let value = lhs[index] + rhs[index];
        out.write(|bytes| value.write(&mut bytes[index * 4..]));
    }

    Ok(())
}

/// Every core writes its index, waits for all cores, then checks every slot was written.
pub fn publish_then_check(core: &CoreContext<'_>, slots: &Handle) -> Result<(), LaunchError> {
    let index = core.block_idx() as usize;
    slots.write(|bytes| (index as i32 + 1).write(&mut bytes[index * 4..]));

    core.sync_all()?;

    let values = slots.read(i32::from_bytes);
    if values.iter().all(|value| *value != 0) {
        Ok(())
    } else {
        Err(LaunchError::unknown(format!(
            "core {index} saw an incomplete buffer {values:?}"
        )))
    }
}
