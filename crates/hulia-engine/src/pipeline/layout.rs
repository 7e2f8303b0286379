use std::collections::HashSet;

use thiserror::Error;

/// Element format of one vertex attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x2,
    Uint32x3,
    Uint32x4,
    Sint32,
    Unorm8x4,
    Uint8x4,
    Unorm16x2,
    Unorm16x4,
}

impl VertexFormat {
    /// Size of one element in bytes.
    pub const fn size(self) -> u64 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Sint32 => 4,
            VertexFormat::Unorm8x4 | VertexFormat::Uint8x4 | VertexFormat::Unorm16x2 => 4,
            VertexFormat::Float32x2 | VertexFormat::Uint32x2 | VertexFormat::Unorm16x4 => 8,
            VertexFormat::Float32x3 | VertexFormat::Uint32x3 => 12,
            VertexFormat::Float32x4 | VertexFormat::Uint32x4 => 16,
        }
    }
}

/// Whether a buffer slot advances per vertex or per instance.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum VertexStepMode {
    #[default]
    Vertex,
    Instance,
}

/// One vertex buffer slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexBufferSlot {
    pub slot: u32,
    pub stride: u64,
    pub step_mode: VertexStepMode,
}

/// One shader input read from a buffer slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttribute {
    pub location: u32,
    pub slot: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum LayoutError {
    #[error("vertex layout declares no buffer slots")]
    NoSlots,

    #[error("buffer slot {0} is declared more than once")]
    DuplicateSlot(u32),

    #[error("buffer slot {slot} has zero stride")]
    ZeroStride { slot: u32 },

    #[error("attribute at location {location} references undeclared slot {slot}")]
    UnknownSlot { location: u32, slot: u32 },

    #[error("attribute location {0} is used more than once")]
    DuplicateLocation(u32),

    #[error(
        "attribute at location {location} ends at byte {end}, past the stride {stride} of slot {slot}"
    )]
    AttributeOutOfBounds {
        location: u32,
        slot: u32,
        end: u64,
        stride: u64,
    },
}

/// Vertex-input description handed to pipeline creation.
///
/// Build it with [`VertexLayout::slot`] and [`VertexLayout::attribute`]; the
/// layout is checked by [`VertexLayout::validate`] before any pipeline is
/// created from it.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct VertexLayout {
    slots: Vec<VertexBufferSlot>,
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(mut self, slot: u32, stride: u64, step_mode: VertexStepMode) -> Self {
        self.slots.push(VertexBufferSlot {
            slot,
            stride,
            step_mode,
        });
        self
    }

    pub fn attribute(mut self, location: u32, slot: u32, format: VertexFormat, offset: u64) -> Self {
        self.attributes.push(VertexAttribute {
            location,
            slot,
            format,
            offset,
        });
        self
    }

    /// Appends attributes for `formats` on `slot`, packed back to back from
    /// offset 0, with consecutive locations starting at `first_location`.
    pub fn packed(mut self, slot: u32, first_location: u32, formats: &[VertexFormat]) -> Self {
        let mut offset = 0;
        for (i, format) in formats.iter().enumerate() {
            self = self.attribute(first_location + i as u32, slot, *format, offset);
            offset += format.size();
        }
        self
    }

    pub fn slots(&self) -> &[VertexBufferSlot] {
        &self.slots
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Attributes read from `slot`, in declaration order.
    pub fn attributes_for(&self, slot: u32) -> impl Iterator<Item = &VertexAttribute> + '_ {
        self.attributes.iter().filter(move |a| a.slot == slot)
    }

    pub fn stride(&self, slot: u32) -> Option<u64> {
        self.slots.iter().find(|s| s.slot == slot).map(|s| s.stride)
    }

    /// Checks that every attribute lies inside the stride of its slot.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.slots.is_empty() {
            return Err(LayoutError::NoSlots);
        }

        let mut seen_slots = HashSet::new();
        for s in &self.slots {
            if !seen_slots.insert(s.slot) {
                return Err(LayoutError::DuplicateSlot(s.slot));
            }
            if s.stride == 0 {
                return Err(LayoutError::ZeroStride { slot: s.slot });
            }
        }

        let mut seen_locations = HashSet::new();
        for a in &self.attributes {
            if !seen_locations.insert(a.location) {
                return Err(LayoutError::DuplicateLocation(a.location));
            }

            let Some(stride) = self.stride(a.slot) else {
                return Err(LayoutError::UnknownSlot {
                    location: a.location,
                    slot: a.slot,
                });
            };

            let end = a.offset.saturating_add(a.format.size());
            if end > stride {
                return Err(LayoutError::AttributeOutOfBounds {
                    location: a.location,
                    slot: a.slot,
                    end,
                    stride,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // position (xyz) + uv, 20 bytes per vertex
    fn textured() -> VertexLayout {
        VertexLayout::new()
            .slot(0, 20, VertexStepMode::Vertex)
            .attribute(0, 0, VertexFormat::Float32x3, 0)
            .attribute(1, 0, VertexFormat::Float32x2, 12)
    }

    #[test]
    fn textured_layout_is_valid() {
        assert_eq!(textured().validate(), Ok(()));
    }

    #[test]
    fn attribute_ending_exactly_at_stride_is_valid() {
        let layout = VertexLayout::new()
            .slot(0, 16, VertexStepMode::Vertex)
            .attribute(0, 0, VertexFormat::Float32x4, 0);
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn attribute_past_stride_is_rejected() {
        let layout = VertexLayout::new()
            .slot(0, 16, VertexStepMode::Vertex)
            .attribute(0, 0, VertexFormat::Float32x3, 8);
        assert_eq!(
            layout.validate(),
            Err(LayoutError::AttributeOutOfBounds {
                location: 0,
                slot: 0,
                end: 20,
                stride: 16,
            })
        );
    }

    #[test]
    fn offset_beyond_stride_is_rejected() {
        let layout = VertexLayout::new()
            .slot(0, 12, VertexStepMode::Vertex)
            .attribute(0, 0, VertexFormat::Float32, 64);
        assert!(matches!(
            layout.validate(),
            Err(LayoutError::AttributeOutOfBounds { .. })
        ));
    }

    #[test]
    fn huge_offset_does_not_overflow() {
        let layout = VertexLayout::new()
            .slot(0, 12, VertexStepMode::Vertex)
            .attribute(0, 0, VertexFormat::Float32, u64::MAX);
        assert!(layout.validate().is_err());
    }

    #[test]
    fn unknown_slot_is_rejected() {
        let layout = VertexLayout::new()
            .slot(0, 12, VertexStepMode::Vertex)
            .attribute(0, 1, VertexFormat::Float32, 0);
        assert_eq!(
            layout.validate(),
            Err(LayoutError::UnknownSlot { location: 0, slot: 1 })
        );
    }

    #[test]
    fn duplicate_location_and_slot_are_rejected() {
        let dup_loc = textured().attribute(1, 0, VertexFormat::Float32, 0);
        assert_eq!(dup_loc.validate(), Err(LayoutError::DuplicateLocation(1)));

        let dup_slot = textured().slot(0, 20, VertexStepMode::Instance);
        assert_eq!(dup_slot.validate(), Err(LayoutError::DuplicateSlot(0)));
    }

    #[test]
    fn empty_and_zero_stride_layouts_are_rejected() {
        assert_eq!(VertexLayout::new().validate(), Err(LayoutError::NoSlots));
        let zero = VertexLayout::new().slot(3, 0, VertexStepMode::Vertex);
        assert_eq!(zero.validate(), Err(LayoutError::ZeroStride { slot: 3 }));
    }

    #[test]
    fn packed_sums_offsets_within_stride() {
        // Every packed layout satisfies offset + size <= stride when stride
        // equals the packed size.
        let sets: [&[VertexFormat]; 3] = [
            &[VertexFormat::Float32x3],
            &[VertexFormat::Float32x3, VertexFormat::Float32x2],
            &[
                VertexFormat::Float32x2,
                VertexFormat::Unorm8x4,
                VertexFormat::Float32x4,
                VertexFormat::Uint32,
            ],
        ];
        for formats in sets {
            let stride: u64 = formats.iter().map(|f| f.size()).sum();
            let layout = VertexLayout::new()
                .slot(0, stride, VertexStepMode::Vertex)
                .packed(0, 0, formats);
            assert!(layout.validate().is_ok());
            for a in layout.attributes_for(0) {
                assert!(a.offset + a.format.size() <= stride);
            }
        }
    }

    #[test]
    fn instance_slot_is_independent() {
        let layout = VertexLayout::new()
            .slot(0, 8, VertexStepMode::Vertex)
            .slot(1, 32, VertexStepMode::Instance)
            .attribute(0, 0, VertexFormat::Float32x2, 0)
            .attribute(1, 1, VertexFormat::Float32x4, 0)
            .attribute(2, 1, VertexFormat::Float32x4, 16);
        assert!(layout.validate().is_ok());
        assert_eq!(layout.attributes_for(1).count(), 2);
    }
}
