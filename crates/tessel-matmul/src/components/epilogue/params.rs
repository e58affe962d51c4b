use core::fmt::Display;

use tessel_common::Element;

use crate::components::{GlobalTensor, MatmulSetupError};

/// Dequantization scales applied by the epilogue.
///
/// Absent scales count as one. The scalar scale is exclusive with the scale vectors.
pub struct DequantParams<'a, ES: Element> {
    /// One scale per output row.
    pub per_token: Option<&'a GlobalTensor<ES>>,
    /// One scale per output column.
    pub per_column: Option<&'a GlobalTensor<ES>>,
    /// One scale for the whole output.
    pub scalar: Option<f32>,
}

impl<ES: Element> Clone for DequantParams<'_, ES> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<ES: Element> Copy for DequantParams<'_, ES> {}

impl<'a, ES: Element> DequantParams<'a, ES> {
    pub fn none() -> Self {
        Self {
            per_token: None,
            per_column: None,
            scalar: None,
        }
    }

    pub fn with_per_token(mut self, scales: &'a GlobalTensor<ES>) -> Self {
        self.per_token = Some(scales);
        self
    }

    pub fn with_per_column(mut self, scales: &'a GlobalTensor<ES>) -> Self {
        self.per_column = Some(scales);
        self
    }

    pub fn with_scalar(mut self, scale: f32) -> Self {
        self.scalar = Some(scale);
        self
    }

    /// Fast path matching the present scales.
    pub fn path(&self) -> Result<EpiloguePath, MatmulSetupError> {
        let path = match (self.per_token.is_some(), self.per_column.is_some(), self.scalar) {
            (false, false, None) => EpiloguePath::Identity,
            (false, false, Some(_)) => EpiloguePath::Scalar,
            (true, false, None) => EpiloguePath::PerToken,
            (false, true, None) => EpiloguePath::PerColumn,
            (true, true, None) => EpiloguePath::PerTokenPerColumn,
            (_, _, Some(_)) => {
                return Err(MatmulSetupError::invalid_config(
                    "A scalar scale can't be combined with scale vectors",
                ));
            }
        };

        Ok(path)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
/// Tile operations the epilogue runs, picked once from the present scales.
pub enum EpiloguePath {
    /// Cast only.
    Identity,
    /// Scalar multiply, then cast.
    Scalar,
    /// Per-token one-block broadcast multiply, then cast.
    PerToken,
    /// Per-column row broadcast multiply, then cast.
    PerColumn,
    /// Per-token multiply, per-column multiply, then cast.
    PerTokenPerColumn,
}

impl EpiloguePath {
    pub fn per_token(&self) -> bool {
        matches!(self, EpiloguePath::PerToken | EpiloguePath::PerTokenPerColumn)
    }

    pub fn per_column(&self) -> bool {
        matches!(self, EpiloguePath::PerColumn | EpiloguePath::PerTokenPerColumn)
    }
}

impl Display for EpiloguePath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            EpiloguePath::Identity => "identity",
            EpiloguePath::Scalar => "scalar",
            EpiloguePath::PerToken => "per-token",
            EpiloguePath::PerColumn => "per-column",
            EpiloguePath::PerTokenPerColumn => "per-token-per-column",
        };
        f.write_str(name)
    }
}
