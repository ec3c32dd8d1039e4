use std::ops::Range;

use anyhow::Result;

/// Rounds `nominal` up to the next multiple of `alignment`.
///
/// `alignment` of 0 or 1 means "no constraint".
#[inline]
pub fn aligned_row_bytes(nominal: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return nominal;
    }
    nominal.div_ceil(alignment) * alignment
}

/// Host view of an allocation whose contents the CPU fills before upload.
pub trait HostVisible {
    /// Writable bytes, exactly the size that was requested at allocation.
    fn contents_mut(&mut self) -> &mut [u8];

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Allocator contract between the resource builder and a GPU backend.
///
/// Buffers are "managed": the CPU writes through [`HostVisible::contents_mut`]
/// and then calls [`mark_modified`](Self::mark_modified) so the GPU copy is
/// refreshed before any draw reads it. Backends with coherent memory may make
/// that call a no-op.
pub trait GpuArena {
    type Buffer: HostVisible;
    type Image;

    /// Allocates `size` bytes. Failure is fatal for the resource being built.
    fn allocate(&mut self, size: usize, label: &'static str) -> Result<Self::Buffer>;

    /// Copies `bytes` into `buffer` at `offset`.
    fn write(&mut self, buffer: &mut Self::Buffer, offset: usize, bytes: &[u8]) -> Result<()> {
        let contents = buffer.contents_mut();
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= contents.len());
        let Some(end) = end else {
            anyhow::bail!(
                "write of {} bytes at offset {offset} overruns a {}-byte buffer",
                bytes.len(),
                contents.len()
            );
        };
        contents[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Publishes CPU writes in `range` to the GPU.
    fn mark_modified(&mut self, buffer: &Self::Buffer, range: Range<usize>);

    /// Required byte alignment of each image row in linear memory.
    fn minimum_row_alignment(&self, format: wgpu::TextureFormat) -> usize;

    /// Views `buffer` as a 2-D image whose rows start every `row_stride` bytes.
    fn wrap_as_image(
        &mut self,
        buffer: Self::Buffer,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        row_stride: usize,
    ) -> Result<Self::Image>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_aligned_is_unchanged() {
        assert_eq!(aligned_row_bytes(256, 256), 256);
        assert_eq!(aligned_row_bytes(0, 256), 0);
    }

    #[test]
    fn rounds_up_to_next_multiple() {
        assert_eq!(aligned_row_bytes(16, 256), 256);
        assert_eq!(aligned_row_bytes(257, 256), 512);
        assert_eq!(aligned_row_bytes(48, 16), 48);
        assert_eq!(aligned_row_bytes(50, 16), 64);
    }

    #[test]
    fn no_alignment_constraint() {
        assert_eq!(aligned_row_bytes(123, 0), 123);
        assert_eq!(aligned_row_bytes(123, 1), 123);
    }

    #[test]
    fn aligned_is_multiple_and_not_smaller() {
        for alignment in [2usize, 4, 16, 64, 100, 256, 512] {
            for nominal in (0..2048).step_by(7) {
                let aligned = aligned_row_bytes(nominal, alignment);
                assert_eq!(aligned % alignment, 0, "{nominal} @ {alignment}");
                assert!(aligned >= nominal);
                assert!(aligned - nominal < alignment);
            }
        }
    }
}
