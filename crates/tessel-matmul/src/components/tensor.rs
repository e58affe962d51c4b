use core::marker::PhantomData;

use derive_new::new;
use tessel_common::Element;
use tessel_runtime::Handle;

use super::{Layout, MatmulSetupError, MatrixLayout};

#[derive(new, Clone, Copy, Debug)]
/// A caller-owned buffer and the layout of the matrix it holds.
pub struct TensorArg<'a> {
    pub handle: &'a Handle,
    pub layout: MatrixLayout,
}

impl TensorArg<'_> {
    /// Checks the layout has the expected extents and fits `count` copies `stride` elements
    /// apart in the buffer.
    pub(crate) fn validate<E: Element>(
        &self,
        name: &str,
        rows: usize,
        columns: usize,
        count: usize,
        stride: usize,
    ) -> Result<(), MatmulSetupError> {
        if self.layout.rows() != rows || self.layout.columns() != columns {
            return Err(MatmulSetupError::invalid_problem(format!(
                "Operand {name} has shape {}x{}, expected {rows}x{columns}",
                self.layout.rows(),
                self.layout.columns()
            )));
        }

        validate_len::<E>(name, self.handle, self.layout.required_len(), count, stride)
    }
}

/// Checks `handle` holds `count` regions of `len` elements `stride` elements apart.
pub(crate) fn validate_len<E: Element>(
    name: &str,
    handle: &Handle,
    len: usize,
    count: usize,
    stride: usize,
) -> Result<(), MatmulSetupError> {
    let required = match count {
        0 => 0,
        count => (count - 1)
            .checked_mul(stride)
            .and_then(|span| span.checked_add(len))
            .ok_or_else(|| {
                MatmulSetupError::invalid_problem(format!("Operand {name} overflows"))
            })?,
    };
    let available = handle.len::<E>();

    if available < required {
        return Err(MatmulSetupError::invalid_problem(format!(
            "Operand {name} holds {available} elements of {}, needs {required}",
            E::KIND
        )));
    }

    Ok(())
}

#[derive(Clone, Debug)]
/// Typed view of an off-chip buffer, as seen by the units of a core.
pub struct GlobalTensor<E: Element> {
    handle: Handle,
    _elem: PhantomData<E>,
}

impl<E: Element> GlobalTensor<E> {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            _elem: PhantomData,
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.handle.len::<E>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `func` with read access to the elements.
    pub fn read<R>(&self, func: impl FnOnce(&GlobalView<'_, E>) -> R) -> R {
        self.handle.read(|bytes| {
            func(&GlobalView {
                bytes,
                _elem: PhantomData,
            })
        })
    }

    /// Runs `func` with write access to the elements.
    pub fn write<R>(&self, func: impl FnOnce(&mut GlobalViewMut<'_, E>) -> R) -> R {
        self.handle.write(|bytes| {
            func(&mut GlobalViewMut {
                bytes,
                _elem: PhantomData,
            })
        })
    }
}

/// Read access to a [GlobalTensor].
pub struct GlobalView<'a, E> {
    bytes: &'a [u8],
    _elem: PhantomData<E>,
}

impl<E: Element> GlobalView<'_, E> {
    pub fn get(&self, index: usize) -> E {
        E::read(&self.bytes[index * E::size()..])
    }

    /// Copies `dst.len()` contiguous elements starting at `index`.
    pub fn copy_to(&self, index: usize, dst: &mut [E]) {
        let start = index * E::size();
        let bytes = &self.bytes[start..start + dst.len() * E::size()];
        for (value, chunk) in dst.iter_mut().zip(bytes.chunks_exact(E::size())) {
            *value = E::read(chunk);
        }
    }
}

/// Write access to a [GlobalTensor].
pub struct GlobalViewMut<'a, E> {
    bytes: &'a mut [u8],
    _elem: PhantomData<E>,
}

impl<E: Element> GlobalViewMut<'_, E> {
    pub fn get(&self, index: usize) -> E {
        E::read(&self.bytes[index * E::size()..])
    }

    pub fn set(&mut self, index: usize, value: E) {
        value.write(&mut self.bytes[index * E::size()..]);
    }

    /// Writes `src` to contiguous elements starting at `index`.
    pub fn copy_from(&mut self, index: usize, src: &[E]) {
        let start = index * E::size();
        let bytes = &mut self.bytes[start..start + src.len() * E::size()];
        bytes.copy_from_slice(E::as_bytes(src));
    }
}
