use bytemuck::{Pod, Zeroable};

use crate::error::ProtocolError;

pub const COMMAND_CODE_SIZE: usize = std::mem::size_of::<u16>();
pub const U32_SIZE: usize = std::mem::size_of::<u32>();
pub const F32_SIZE: usize = std::mem::size_of::<f32>();
pub const F64_SIZE: usize = std::mem::size_of::<f64>();
pub const COLOR_SIZE: usize = 3 * F32_SIZE;
pub const TRANSFORM_SIZE: usize = 16 * F32_SIZE;

/// Position floats carried by every vertex (x, y, z).
pub const POSITION_FLOATS: usize = 3;

/// Bytes per RGBA pixel with one 32-bit float per channel.
pub const RGBA_F32_PIXEL_SIZE: usize = 4 * F32_SIZE;

/// Identifies the operation that follows on the wire.
///
/// The codec attaches no meaning to the value; the dispatcher decides what
/// payload comes next.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CommandCode(pub u16);

/// RGB color as three packed 32-bit floats. No alpha on the wire.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// 4×4 float matrix stored as four columns.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Transform {
    pub columns: [[f32; 4]; 4],
}

impl Transform {
    pub const IDENTITY: Self = Self {
        columns: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Builds a matrix from 16 floats in wire order (column after column).
    pub fn from_column_major(values: [f32; 16]) -> Self {
        let mut columns = [[0.0f32; 4]; 4];
        for (c, column) in columns.iter_mut().enumerate() {
            column.copy_from_slice(&values[c * 4..c * 4 + 4]);
        }
        Self { columns }
    }

    pub fn to_column_major(&self) -> [f32; 16] {
        bytemuck::cast(self.columns)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Header of a vertex array message: count plus the per-vertex float layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexArrayHeader {
    pub vertex_count: u32,
    /// Floats per vertex beyond the three position components.
    pub extra_floats: u32,
}

impl VertexArrayHeader {
    #[inline]
    pub fn floats_per_vertex(&self) -> usize {
        POSITION_FLOATS + self.extra_floats as usize
    }

    #[inline]
    pub fn stride_bytes(&self) -> usize {
        self.floats_per_vertex() * F32_SIZE
    }

    /// Payload bytes following the count: `count × (3 + extra) × 4`.
    pub fn byte_len(&self) -> Result<usize, ProtocolError> {
        (self.vertex_count as usize)
            .checked_mul(self.floats_per_vertex())
            .and_then(|floats| floats.checked_mul(F32_SIZE))
            .ok_or_else(|| ProtocolError::PayloadOverflow {
                what: "vertex array",
                detail: format!(
                    "{} vertices x {} floats",
                    self.vertex_count,
                    self.floats_per_vertex()
                ),
            })
    }
}

/// Header of an RGBA float image message.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
}

impl ImageHeader {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bytes in one row on the wire (no padding): `width × 16`.
    pub fn row_bytes(&self) -> Result<usize, ProtocolError> {
        (self.width as usize)
            .checked_mul(RGBA_F32_PIXEL_SIZE)
            .ok_or_else(|| ProtocolError::PayloadOverflow {
                what: "image row",
                detail: format!("width {}", self.width),
            })
    }

    /// Bytes in all rows on the wire.
    pub fn byte_len(&self) -> Result<usize, ProtocolError> {
        self.row_bytes()?
            .checked_mul(self.height as usize)
            .ok_or_else(|| ProtocolError::PayloadOverflow {
                what: "image",
                detail: format!("{} x {}", self.width, self.height),
            })
    }

    /// Minimum destination length when rows are placed `row_stride` apart.
    pub fn strided_len(&self, row_stride: usize) -> Result<usize, ProtocolError> {
        if self.height == 0 {
            return Ok(0);
        }
        let overflow = || ProtocolError::PayloadOverflow {
            what: "image",
            detail: format!("{} rows at stride {row_stride}", self.height),
        };
        (self.height as usize - 1)
            .checked_mul(row_stride)
            .and_then(|n| n.checked_add(self.row_bytes().ok()?))
            .ok_or_else(overflow)
    }
}

/// Vertex array decoded into host memory.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexArray {
    pub header: VertexArrayHeader,
    pub data: Vec<f32>,
}

impl VertexArray {
    /// Floats belonging to vertex `index`.
    pub fn vertex(&self, index: usize) -> &[f32] {
        let n = self.header.floats_per_vertex();
        &self.data[index * n..(index + 1) * n]
    }
}

/// RGBA float image in host memory, rows tightly packed.
#[derive(Debug, Clone, PartialEq)]
pub struct HostImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_byte_len() {
        let h = VertexArrayHeader { vertex_count: 3, extra_floats: 0 };
        assert_eq!(h.byte_len().unwrap(), 36);
        let h = VertexArrayHeader { vertex_count: 2, extra_floats: 8 };
        assert_eq!(h.byte_len().unwrap(), 2 * 11 * 4);
        assert_eq!(h.stride_bytes(), 44);
    }

    #[test]
    fn image_sizes() {
        let h = ImageHeader { width: 2, height: 3 };
        assert_eq!(h.row_bytes().unwrap(), 32);
        assert_eq!(h.byte_len().unwrap(), 96);
        assert_eq!(h.strided_len(256).unwrap(), 2 * 256 + 32);
        assert_eq!(ImageHeader { width: 5, height: 0 }.strided_len(256).unwrap(), 0);
    }

    #[test]
    fn transform_columns_follow_wire_order() {
        let values: [f32; 16] = std::array::from_fn(|i| i as f32);
        let t = Transform::from_column_major(values);
        assert_eq!(t.columns[0], [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(t.columns[3], [12.0, 13.0, 14.0, 15.0]);
        assert_eq!(t.to_column_major(), values);
    }
}
