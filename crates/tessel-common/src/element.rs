use core::fmt::Debug;

use derive_more::Display;
use half::{bf16, f16};

/// Runtime tag of an [Element] type.
#[derive(Display, Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ElemKind {
    /// 8-bit signed integer.
    #[display("i8")]
    I8,
    /// 32-bit signed integer.
    #[display("i32")]
    I32,
    /// 64-bit signed integer.
    #[display("i64")]
    I64,
    /// IEEE half precision float.
    #[display("f16")]
    F16,
    /// Brain float.
    #[display("bf16")]
    BF16,
    /// IEEE single precision float.
    #[display("f32")]
    F32,
}

impl ElemKind {
    /// Size of one element in bytes.
    pub const fn size(&self) -> usize {
        match self {
            ElemKind::I8 => 1,
            ElemKind::F16 | ElemKind::BF16 => 2,
            ElemKind::I32 | ElemKind::F32 => 4,
            ElemKind::I64 => 8,
        }
    }

    /// Whether the element is a floating point type.
    pub const fn is_float(&self) -> bool {
        matches!(self, ElemKind::F16 | ElemKind::BF16 | ElemKind::F32)
    }
}

/// A plain scalar stored in device buffers.
///
/// Buffers are untyped bytes, so every element must be [bytemuck::Pod]. Reads go through
/// [Element::from_bytes], which does not require the byte slice to be aligned.
pub trait Element:
    bytemuck::Pod + Copy + Send + Sync + Debug + PartialEq + Default + 'static
{
    /// The runtime tag of this type.
    const KIND: ElemKind;

    /// Converts from `f32`, rounding to nearest (saturating for integers).
    fn from_f32(value: f32) -> Self;

    /// Converts to `f32`.
    fn to_f32(self) -> f32;

    /// Size of one element in bytes.
    fn size() -> usize {
        core::mem::size_of::<Self>()
    }

    /// Reads one element at the start of `bytes`.
    fn read(bytes: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(&bytes[..Self::size()])
    }

    /// Writes one element at the start of `bytes`.
    fn write(self, bytes: &mut [u8]) {
        bytes[..Self::size()].copy_from_slice(bytemuck::bytes_of(&self));
    }

    /// Decodes a whole byte buffer.
    fn from_bytes(bytes: &[u8]) -> Vec<Self> {
        bytes
            .chunks_exact(Self::size())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    /// Views a slice of elements as bytes.
    fn as_bytes(values: &[Self]) -> &[u8] {
        bytemuck::cast_slice(values)
    }
}

impl Element for i8 {
    const KIND: ElemKind = ElemKind::I8;

    fn from_f32(value: f32) -> Self {
        value.round().clamp(i8::MIN as f32, i8::MAX as f32) as i8
    }

    fn to_f32(self) -> f32 {
        self as f32
    }
}

impl Element for i32 {
    const KIND: ElemKind = ElemKind::I32;

    fn from_f32(value: f32) -> Self {
        value.round() as i32
    }

    fn to_f32(self) -> f32 {
        self as f32
    }
}

impl Element for i64 {
    const KIND: ElemKind = ElemKind::I64;

    fn from_f32(value: f32) -> Self {
        value.round() as i64
    }

    fn to_f32(self) -> f32 {
        self as f32
    }
}

impl Element for f16 {
    const KIND: ElemKind = ElemKind::F16;

    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }

    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }
}

impl Element for bf16 {
    const KIND: ElemKind = ElemKind::BF16;

    fn from_f32(value: f32) -> Self {
        bf16::from_f32(value)
    }

    fn to_f32(self) -> f32 {
        bf16::to_f32(self)
    }
}

impl Element for f32 {
    const KIND: ElemKind = ElemKind::F32;

    fn from_f32(value: f32) -> Self {
        value
    }

    fn to_f32(self) -> f32 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn int8_conversion_saturates() {
        assert_eq!(i8::from_f32(300.0), 127);
        assert_eq!(i8::from_f32(-300.0), -128);
        assert_eq!(i8::from_f32(2.5), 3);
    }

    #[test_log::test]
    fn unaligned_reads_round_trip() {
        let values = [1.5f32, -2.0, 8.25];
        let mut bytes = vec![0u8; 1];
        bytes.extend_from_slice(f32::as_bytes(&values));

        let decoded = f32::from_bytes(&bytes[1..]);

        pretty_assertions::assert_eq!(decoded, values.to_vec());
        assert_eq!(f32::read(&bytes[5..]), -2.0);
    }

    #[test_log::test]
    fn half_types_report_their_kind() {
        assert_eq!(f16::KIND.size(), 2);
        assert_eq!(bf16::KIND.to_string(), "bf16");
        assert!(!i32::KIND.is_float());
    }
}
