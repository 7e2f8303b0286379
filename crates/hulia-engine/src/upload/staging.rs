use thiserror::Error;

use crate::backend::{align_up, CopyAlignment};

use super::image::ImageData;

/// Caller-chosen identity of an upload destination.
///
/// Regions sharing a key target the same resource; that decides the cycle
/// flag of each upload.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct DestinationKey(pub usize);

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StagingError {
    #[error("region {index} is empty")]
    EmptyRegion { index: usize },

    #[error("buffer regions {first} and {second} overlap in their destination")]
    OverlappingRegions { first: usize, second: usize },

    #[error("region {index} starts at destination offset {offset}, not a multiple of {alignment}")]
    MisalignedOffset { index: usize, offset: u64, alignment: u64 },

    #[error("destination {0:?} mixes buffer and texture regions")]
    MixedDestination(DestinationKey),

    #[error("texture destination {0:?} receives more than one upload")]
    RepeatedTexture(DestinationKey),
}

/// Where a region's bytes go.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegionTarget {
    Buffer {
        destination_offset: u64,
        /// Bytes copied; the source length rounded up to the copy alignment.
        copy_size: u64,
    },
    Texture {
        width: u32,
        height: u32,
        row_pitch: u32,
    },
}

/// One region laid out inside the staging allocation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StagedRegion {
    pub destination: DestinationKey,
    /// Byte offset inside the transfer buffer.
    pub offset: u64,
    /// Bytes the region occupies inside the transfer buffer.
    pub staged_size: u64,
    /// Source bytes provided by the caller.
    pub data_len: u64,
    pub target: RegionTarget,
}

enum Source<'d> {
    Bytes(&'d [u8]),
    Image(&'d ImageData),
}

/// Packs upload regions into a single transfer buffer.
///
/// Regions are placed in push order at disjoint offsets, each aligned to
/// the backend's copy alignment. Texture rows are spaced by the row pitch
/// the backend requires.
pub struct StagingPlan<'d> {
    alignment: CopyAlignment,
    regions: Vec<StagedRegion>,
    sources: Vec<Source<'d>>,
    total_size: u64,
}

impl<'d> StagingPlan<'d> {
    pub fn new(alignment: CopyAlignment) -> Self {
        Self {
            alignment,
            regions: Vec::new(),
            sources: Vec::new(),
            total_size: 0,
        }
    }

    fn region_alignment(&self) -> u64 {
        // Texture copies also need texel-aligned offsets.
        self.alignment.buffer_offset.max(4)
    }

    fn place(&mut self, region: StagedRegion, source: Source<'d>) -> usize {
        self.total_size = region.offset + region.staged_size;
        self.regions.push(region);
        self.sources.push(source);
        self.regions.len() - 1
    }

    /// Stages `bytes` for `destination` at `destination_offset`.
    pub fn push_buffer(
        &mut self,
        destination: DestinationKey,
        destination_offset: u64,
        bytes: &'d [u8],
    ) -> usize {
        let offset = align_up(self.total_size, self.region_alignment());
        let copy_size = align_up(bytes.len() as u64, self.alignment.buffer_offset.max(1));
        self.place(
            StagedRegion {
                destination,
                offset,
                staged_size: copy_size,
                data_len: bytes.len() as u64,
                target: RegionTarget::Buffer {
                    destination_offset,
                    copy_size,
                },
            },
            Source::Bytes(bytes),
        )
    }

    /// Stages a whole RGBA8 image for a texture destination.
    pub fn push_texture(&mut self, destination: DestinationKey, image: &'d ImageData) -> usize {
        let offset = align_up(self.total_size, self.region_alignment());
        let row_bytes = image.row_bytes();
        let row_pitch = align_up(
            row_bytes as u64,
            self.alignment.texture_row_pitch.max(1) as u64,
        ) as u32;
        self.place(
            StagedRegion {
                destination,
                offset,
                staged_size: row_pitch as u64 * image.height() as u64,
                data_len: image.pixels().len() as u64,
                target: RegionTarget::Texture {
                    width: image.width(),
                    height: image.height(),
                    row_pitch,
                },
            },
            Source::Image(image),
        )
    }

    pub fn regions(&self) -> &[StagedRegion] {
        &self.regions
    }

    /// Size the transfer buffer must have.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Sum of the caller's source bytes over all regions.
    pub fn data_len(&self) -> u64 {
        self.regions.iter().map(|r| r.data_len).sum()
    }

    /// Whether the upload of region `index` may discard the destination's
    /// prior contents. Only a destination written exactly once in the batch
    /// is cycled; multiple disjoint writes must preserve each other.
    pub fn cycle(&self, index: usize) -> bool {
        let key = self.regions[index].destination;
        self.regions.iter().filter(|r| r.destination == key).count() == 1
    }

    /// Checks that the batch is well formed.
    ///
    /// Buffer destination offsets must sit on the copy alignment. Regions of
    /// one destination must not share a byte of data; with aligned offsets
    /// the padded tail of a copy then never reaches a sibling either.
    pub fn validate(&self) -> Result<(), StagingError> {
        let alignment = self.alignment.buffer_offset.max(1);
        for (i, r) in self.regions.iter().enumerate() {
            if r.data_len == 0 {
                return Err(StagingError::EmptyRegion { index: i });
            }
            if let RegionTarget::Buffer {
                destination_offset, ..
            } = r.target
            {
                if destination_offset % alignment != 0 {
                    return Err(StagingError::MisalignedOffset {
                        index: i,
                        offset: destination_offset,
                        alignment,
                    });
                }
            }
        }

        for (i, a) in self.regions.iter().enumerate() {
            for (j, b) in self.regions.iter().enumerate().skip(i + 1) {
                if a.destination != b.destination {
                    continue;
                }
                match (a.target, b.target) {
                    (
                        RegionTarget::Buffer {
                            destination_offset: ao,
                            ..
                        },
                        RegionTarget::Buffer {
                            destination_offset: bo,
                            ..
                        },
                    ) => {
                        if ao < bo.saturating_add(b.data_len) && bo < ao.saturating_add(a.data_len) {
                            return Err(StagingError::OverlappingRegions { first: i, second: j });
                        }
                    }
                    (RegionTarget::Texture { .. }, RegionTarget::Texture { .. }) => {
                        return Err(StagingError::RepeatedTexture(a.destination));
                    }
                    _ => return Err(StagingError::MixedDestination(a.destination)),
                }
            }
        }

        Ok(())
    }

    /// Writes every region into `out` (the mapped transfer buffer) in one pass.
    /// Padding bytes are zeroed.
    pub fn write_into(&self, out: &mut [u8]) {
        debug_assert!(out.len() as u64 >= self.total_size);
        out[..self.total_size as usize].fill(0);

        for (region, source) in self.regions.iter().zip(&self.sources) {
            let start = region.offset as usize;
            match (source, region.target) {
                (Source::Bytes(bytes), _) => {
                    out[start..start + bytes.len()].copy_from_slice(bytes);
                }
                (Source::Image(image), RegionTarget::Texture { row_pitch, .. }) => {
                    let row_bytes = image.row_bytes() as usize;
                    for (row, texels) in image.pixels().chunks_exact(row_bytes).enumerate() {
                        let at = start + row * row_pitch as usize;
                        out[at..at + row_bytes].copy_from_slice(texels);
                    }
                }
                (Source::Image(_), RegionTarget::Buffer { .. }) => {
                    unreachable!("image sources are always placed as texture regions")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VB: DestinationKey = DestinationKey(0);
    const IB: DestinationKey = DestinationKey(1);
    const TEX: DestinationKey = DestinationKey(2);

    fn tight() -> CopyAlignment {
        CopyAlignment {
            buffer_offset: 1,
            texture_row_pitch: 1,
        }
    }

    #[test]
    fn vertices_then_indices_are_contiguous() {
        let vertices = [7u8; 80];
        let indices = [1u8; 12];
        let mut plan = StagingPlan::new(tight());
        plan.push_buffer(VB, 0, &vertices);
        plan.push_buffer(IB, 0, &indices);

        assert_eq!(plan.regions()[0].offset, 0);
        assert_eq!(plan.regions()[1].offset, 80);
        assert_eq!(plan.total_size(), 92);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn offsets_follow_copy_alignment() {
        let a = [1u8; 6];
        let b = [2u8; 6];
        let mut plan = StagingPlan::new(CopyAlignment::default());
        plan.push_buffer(VB, 0, &a);
        plan.push_buffer(IB, 0, &b);

        let r = plan.regions();
        assert_eq!(r[0].staged_size, 8);
        assert_eq!(r[1].offset, 8);
        assert_eq!(plan.total_size(), 16);
        assert_eq!(plan.data_len(), 12);

        let mut out = vec![0xAA; 16];
        plan.write_into(&mut out);
        assert_eq!(out, [1, 1, 1, 1, 1, 1, 0, 0, 2, 2, 2, 2, 2, 2, 0, 0]);
    }

    #[test]
    fn texture_rows_are_padded_to_pitch() {
        // 3x2 RGBA texture, 12 bytes per row, pitch aligned to 256.
        let pixels: Vec<u8> = (0..24).collect();
        let image = ImageData::from_rgba8(3, 2, pixels).unwrap();
        let mut plan = StagingPlan::new(CopyAlignment {
            buffer_offset: 4,
            texture_row_pitch: 256,
        });
        plan.push_texture(TEX, &image);

        let region = &plan.regions()[0];
        assert_eq!(
            region.target,
            RegionTarget::Texture {
                width: 3,
                height: 2,
                row_pitch: 256
            }
        );
        assert_eq!(region.data_len, 24);
        assert_eq!(plan.total_size(), 512);

        let mut out = vec![0; 512];
        plan.write_into(&mut out);
        assert_eq!(&out[0..12], &(0..12).collect::<Vec<u8>>()[..]);
        assert_eq!(&out[256..268], &(12..24).collect::<Vec<u8>>()[..]);
        assert!(out[12..256].iter().all(|b| *b == 0));
    }

    #[test]
    fn tight_texture_stages_width_height_times_four() {
        let image = ImageData::from_rgba8(5, 3, vec![9; 60]).unwrap();
        let mut plan = StagingPlan::new(tight());
        plan.push_buffer(VB, 0, &[1, 2, 3]);
        plan.push_texture(TEX, &image);

        let region = &plan.regions()[1];
        assert_eq!(region.staged_size, 5 * 3 * 4);
        // Texture offsets stay texel aligned even with a tight buffer alignment.
        assert_eq!(region.offset, 4);
    }

    #[test]
    fn cycle_only_for_single_upload_destinations() {
        let first = [1u8; 8];
        let second = [2u8; 8];
        let indices = [0u8; 4];
        let mut plan = StagingPlan::new(tight());
        let a = plan.push_buffer(VB, 0, &first);
        let b = plan.push_buffer(VB, 8, &second);
        let c = plan.push_buffer(IB, 0, &indices);

        assert!(!plan.cycle(a));
        assert!(!plan.cycle(b));
        assert!(plan.cycle(c));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn overlapping_destination_ranges_are_rejected() {
        let bytes = [0u8; 8];
        let mut plan = StagingPlan::new(tight());
        plan.push_buffer(VB, 0, &bytes);
        plan.push_buffer(VB, 4, &bytes);
        assert_eq!(
            plan.validate(),
            Err(StagingError::OverlappingRegions { first: 0, second: 1 })
        );
    }

    #[test]
    fn adjacent_data_ranges_do_not_overlap() {
        let six = [1u8; 6];
        let two = [2u8; 2];
        let mut plan = StagingPlan::new(tight());
        plan.push_buffer(VB, 0, &six);
        plan.push_buffer(VB, 6, &two);
        assert_eq!(plan.validate(), Ok(()));
    }

    #[test]
    fn padded_copies_of_disjoint_regions_stay_disjoint() {
        // 6 bytes pad to an 8 byte copy; the sibling starts at the next
        // aligned offset.
        let six = [1u8; 6];
        let four = [2u8; 4];
        let mut plan = StagingPlan::new(CopyAlignment::default());
        plan.push_buffer(VB, 0, &six);
        plan.push_buffer(VB, 8, &four);
        assert_eq!(plan.validate(), Ok(()));
        assert_eq!(
            plan.regions()[0].target,
            RegionTarget::Buffer {
                destination_offset: 0,
                copy_size: 8
            }
        );
    }

    #[test]
    fn unaligned_destination_offset_is_rejected() {
        let six = [1u8; 6];
        let two = [2u8; 2];
        let mut plan = StagingPlan::new(CopyAlignment::default());
        plan.push_buffer(VB, 0, &six);
        plan.push_buffer(VB, 6, &two);
        assert_eq!(
            plan.validate(),
            Err(StagingError::MisalignedOffset {
                index: 1,
                offset: 6,
                alignment: 4
            })
        );

        let mut plan = StagingPlan::new(CopyAlignment::default());
        plan.push_buffer(IB, 3, &two);
        assert!(matches!(
            plan.validate(),
            Err(StagingError::MisalignedOffset { index: 0, offset: 3, .. })
        ));
    }

    #[test]
    fn empty_and_mixed_regions_are_rejected() {
        let mut plan = StagingPlan::new(tight());
        plan.push_buffer(VB, 0, &[]);
        assert_eq!(plan.validate(), Err(StagingError::EmptyRegion { index: 0 }));

        let image = ImageData::from_rgba8(1, 1, vec![0; 4]).unwrap();
        let mut plan = StagingPlan::new(tight());
        plan.push_buffer(TEX, 0, &[1, 2, 3, 4]);
        plan.push_texture(TEX, &image);
        assert_eq!(plan.validate(), Err(StagingError::MixedDestination(TEX)));
    }
}
