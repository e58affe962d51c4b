use tessel_common::Element;
use tessel_runtime::{ComputeClient, Handle, config::padding::PaddingConfig};

use crate::components::{
    GlobalTensor, Layout, MatmulSetupError, MatrixCoord, MatrixLayout, MatrixOrder,
    PaddingColumnMajor, PaddingRowMajor,
};

/// Whether `layout` must be repacked before the copy engine can stream it.
pub fn needs_padding(config: &PaddingConfig, layout: &MatrixLayout) -> bool {
    !layout.is_padded() && config.needs_padding(layout.leading_stride())
}

/// An operand as the matmul reads it: the caller's buffer, or a padded copy owned by the kernel.
pub enum PaddedOperand {
    Direct {
        handle: Handle,
        layout: MatrixLayout,
    },
    Padded {
        source: Handle,
        source_layout: MatrixLayout,
        workspace: Handle,
        layout: MatrixLayout,
    },
}

impl PaddedOperand {
    /// Decides whether the operand needs padding and allocates its workspace if so.
    ///
    /// Padded operands are blocked into `block` tiles, the L1 tile of the operand.
    pub fn prepare<E: Element>(
        client: &ComputeClient,
        handle: &Handle,
        layout: MatrixLayout,
        block: MatrixCoord,
    ) -> Result<Self, MatmulSetupError> {
        let config = &client.config().padding;
        if !config.is_valid() {
            return Err(MatmulSetupError::invalid_config(format!(
                "Padding alignment must be positive, got {}",
                config.align
            )));
        }

        if !needs_padding(config, &layout) {
            return Ok(PaddedOperand::Direct {
                handle: handle.clone(),
                layout,
            });
        }

        let (rows, columns) = (layout.rows(), layout.columns());
        let padded: MatrixLayout = match layout.order() {
            MatrixOrder::RowMajor => {
                PaddingRowMajor::new(rows, columns, block.row, block.column).map(Into::into)
            }
            MatrixOrder::ColumnMajor => {
                PaddingColumnMajor::new(rows, columns, block.row, block.column).map(Into::into)
            }
        }
        .map_err(|err| MatmulSetupError::invalid_problem(format!("{err}")))?;

        let workspace = client.empty(padded.required_len() * E::size())?;
        log::debug!(
            "Padding operand {rows}x{columns} with stride {} into {} blocks of {}x{}",
            layout.leading_stride(),
            padded.required_len() / block.count().max(1),
            block.row,
            block.column
        );

        Ok(PaddedOperand::Padded {
            source: handle.clone(),
            source_layout: layout,
            workspace,
            layout: padded,
        })
    }

    pub fn is_padded(&self) -> bool {
        matches!(self, PaddedOperand::Padded { .. })
    }

    /// Buffer and layout the matmul reads.
    pub fn operand(&self) -> (&Handle, MatrixLayout) {
        match self {
            PaddedOperand::Direct { handle, layout } => (handle, *layout),
            PaddedOperand::Padded {
                workspace, layout, ..
            } => (workspace, *layout),
        }
    }

    /// Repacks the blocks of core `core_idx` out of `core_num` into the workspace.
    ///
    /// Blocks are spread over cores with the same grid-stride rule as output blocks. Padding
    /// elements keep the zeros the workspace was allocated with.
    pub fn repack<E: Element>(&self, core_idx: usize, core_num: usize) {
        let PaddedOperand::Padded {
            source,
            source_layout,
            workspace,
            layout,
        } = self
        else {
            return;
        };

        let block = match layout {
            MatrixLayout::PaddingRowMajor(padded) => padded.block(),
            MatrixLayout::PaddingColumnMajor(padded) => padded.block(),
            _ => return,
        };
        let loops = MatrixCoord::new(
            layout.rows().div_ceil(block.row),
            layout.columns().div_ceil(block.column),
        );
        let source = GlobalTensor::<E>::new(source.clone());
        let workspace = GlobalTensor::<E>::new(workspace.clone());
        let mut tile = Vec::with_capacity(block.count());

        for index in (core_idx..loops.count()).step_by(core_num.max(1)) {
            let origin = MatrixCoord::new(
                index / loops.column * block.row,
                index % loops.column * block.column,
            );
            let shape = MatrixCoord::new(
                block.row.min(layout.rows() - origin.row),
                block.column.min(layout.columns() - origin.column),
            );

            tile.clear();
            source.read(|view| {
                for row in 0..shape.row {
                    for column in 0..shape.column {
                        let coord = origin + MatrixCoord::new(row, column);
                        tile.push(view.get(source_layout.offset(coord)));
                    }
                }
            });
            workspace.write(|view| {
                for (index, value) in tile.iter().enumerate() {
                    let coord = origin + MatrixCoord::new(index / shape.column, index % shape.column);
                    view.set(layout.offset(coord), *value);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tessel_runtime::{HardwareProperties, config::GlobalConfig};

    use super::*;
    use crate::components::RowMajor;

    #[test_log::test]
    fn aligned_operands_are_read_in_place() {
        let client = ComputeClient::new(HardwareProperties::atlas_a2(1));
        let layout = MatrixLayout::row_major(4, 512).unwrap();
        let handle = client.empty(layout.required_len()).unwrap();

        let operand = PaddedOperand::prepare::<i8>(&client, &handle, layout, MatrixCoord::new(16, 64))
            .unwrap();

        assert!(!operand.is_padded());
        assert_eq!(operand.operand().1, layout);
    }

    #[test_log::test]
    fn zero_alignment_is_an_invalid_config() {
        let mut config = GlobalConfig::default();
        config.padding.align = 0;
        let client = ComputeClient::with_config(HardwareProperties::atlas_a2(1), Arc::new(config));
        let layout = MatrixLayout::row_major(4, 300).unwrap();
        let handle = client.empty(layout.required_len()).unwrap();

        let result =
            PaddedOperand::prepare::<i8>(&client, &handle, layout, MatrixCoord::new(16, 64));

        assert!(matches!(result, Err(MatmulSetupError::InvalidConfig(_))));
    }

    #[test_log::test]
    fn repack_preserves_every_element() {
        let client = ComputeClient::new(HardwareProperties::atlas_a2(1));
        let (rows, columns) = (37, 300);
        let layout: MatrixLayout = RowMajor::with_stride(rows, columns, 301).unwrap().into();
        let data = (0..layout.required_len())
            .map(|index| (index % 251) as i32)
            .collect::<Vec<_>>();
        let handle = client.create_from_slice(&data).unwrap();

        let operand =
            PaddedOperand::prepare::<i32>(&client, &handle, layout, MatrixCoord::new(16, 64))
                .unwrap();
        for core in 0..3 {
            operand.repack::<i32>(core, 3);
        }

        let (workspace, padded) = operand.operand();
        let packed = client.read_elems::<i32>(workspace);
        assert!(padded.is_padded());
        assert_eq!(packed.len(), 48 * 320);
        for row in 0..rows {
            for column in 0..columns {
                let coord = MatrixCoord::new(row, column);
                assert_eq!(packed[padded.offset(coord)], data[layout.offset(coord)]);
            }
        }
        for row in rows..48 {
            for column in 0..320 {
                assert_eq!(packed[padded.offset(MatrixCoord::new(row, column))], 0);
            }
        }
    }
}
