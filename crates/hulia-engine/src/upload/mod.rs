//! Static resource upload.
//!
//! Data reaches device-local memory in one batch:
//! 1. lay every region out in a [`StagingPlan`]
//! 2. write all regions into one transfer buffer in a single mapped pass
//! 3. open one copy pass, issue one upload per region, close it
//! 4. submit, then drop the transfer buffer
//!
//! Completion is not awaited; the backend orders the copies before any
//! later submission that reads the destinations.

mod image;
mod staging;

pub use image::{ImageData, ImageError, PixelFormat};
pub use staging::{DestinationKey, RegionTarget, StagedRegion, StagingError, StagingPlan};

use anyhow::{Context, Result};

use crate::backend::{self, Buffer, GpuBackend, Texture, TransferBuffer};

/// Resource a staged region is copied into, indexed by [`DestinationKey`].
pub enum Destination<'a, B: GpuBackend> {
    Buffer(&'a Buffer<B>),
    Texture(&'a Texture<B>),
}

/// Summary of a finished upload batch.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UploadReport {
    /// Size of the transfer buffer that was allocated.
    pub transfer_size: u64,
    /// Caller bytes staged, before padding.
    pub data_len: u64,
    pub uploads: Vec<UploadRecord>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UploadRecord {
    pub destination: DestinationKey,
    pub staging_offset: u64,
    pub staged_size: u64,
    pub cycle: bool,
}

/// Stages `plan` and copies every region into `destinations[key]`.
pub fn upload<B: GpuBackend>(
    backend: &mut B,
    plan: &StagingPlan<'_>,
    destinations: &[Destination<'_, B>],
) -> Result<UploadReport> {
    plan.validate().context("invalid upload batch")?;
    anyhow::ensure!(!plan.regions().is_empty(), "upload batch has no regions");

    let mut transfer = TransferBuffer::create(backend, plan.total_size())
        .context("failed to create transfer buffer")?;
    transfer
        .write(backend, &mut |mapped: &mut [u8]| plan.write_into(mapped))
        .context("failed to write transfer buffer")?;

    let mut uploads = Vec::with_capacity(plan.regions().len());
    let mut recording = backend
        .begin_recording()
        .context("failed to begin upload recording")?;

    // Any failure below still submits what was recorded.
    let recorded = record_copy_pass(&mut recording, plan, &transfer, destinations, &mut uploads);
    let submitted = backend::submit(&mut *backend, recording);
    recorded?;
    submitted.context("failed to submit upload")?;

    log::debug!(
        "uploaded {} region(s): {} bytes staged in a {} byte transfer buffer",
        uploads.len(),
        plan.data_len(),
        plan.total_size()
    );

    // Released once the copy is submitted; the backend keeps it alive until
    // the copy has executed.
    drop(transfer);

    Ok(UploadReport {
        transfer_size: plan.total_size(),
        data_len: plan.data_len(),
        uploads,
    })
}

fn record_copy_pass<'a, B: GpuBackend>(
    recording: &mut backend::CommandRecording<'a, B>,
    plan: &StagingPlan<'_>,
    transfer: &'a TransferBuffer<B>,
    destinations: &[Destination<'a, B>],
    uploads: &mut Vec<UploadRecord>,
) -> Result<()> {
    recording.begin_copy_pass()?;

    for (index, region) in plan.regions().iter().enumerate() {
        let cycle = plan.cycle(index);
        let destination = destinations
            .get(region.destination.0)
            .with_context(|| format!("no destination for {:?}", region.destination))?;

        match (region.target, destination) {
            (
                RegionTarget::Buffer {
                    destination_offset,
                    copy_size,
                },
                Destination::Buffer(buffer),
            ) => {
                recording
                    .upload_to_buffer(transfer, region.offset, buffer, destination_offset, copy_size, cycle)
                    .with_context(|| format!("upload of region {index} rejected"))?;
            }
            (RegionTarget::Texture { row_pitch, .. }, Destination::Texture(texture)) => {
                recording
                    .upload_to_texture(transfer, region.offset, row_pitch, texture, cycle)
                    .with_context(|| format!("upload of region {index} rejected"))?;
            }
            _ => anyhow::bail!(
                "region {index} and destination {:?} disagree on resource kind",
                region.destination
            ),
        }

        uploads.push(UploadRecord {
            destination: region.destination,
            staging_offset: region.offset,
            staged_size: region.staged_size,
            cycle,
        });
    }

    recording.end_copy_pass()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BufferUsage, Event, HeadlessBackend};

    #[test]
    fn regions_land_in_one_copy_pass() {
        let mut backend = HeadlessBackend::new();
        let journal = backend.journal();
        let vertices = [3u8; 36];
        let indices = [1u8, 0, 2, 0];

        let vb = Buffer::create(&mut backend, None, BufferUsage::Vertex, 36).unwrap();
        let ib = Buffer::create(&mut backend, None, BufferUsage::Index, 4).unwrap();

        let mut plan = StagingPlan::new(backend.copy_alignment());
        plan.push_buffer(DestinationKey(0), 0, &vertices);
        plan.push_buffer(DestinationKey(1), 0, &indices);

        journal.clear();
        let report = upload(
            &mut backend,
            &plan,
            &[Destination::Buffer(&vb), Destination::Buffer(&ib)],
        )
        .unwrap();

        assert_eq!(report.transfer_size, 40);
        assert_eq!(
            journal.names(),
            vec![
                "create_transfer_buffer",
                "write_transfer_buffer",
                "begin_recording",
                "begin_copy_pass",
                "upload_to_buffer",
                "upload_to_buffer",
                "end_copy_pass",
                "submit",
                "release",
            ]
        );
        assert!(matches!(
            journal.events().last(),
            Some(Event::Release { kind: "transfer_buffer", .. })
        ));
    }

    #[test]
    fn kind_mismatch_still_submits() {
        let mut backend = HeadlessBackend::new();
        let journal = backend.journal();
        let image = ImageData::from_rgba8(1, 1, vec![0; 4]).unwrap();
        let vb = Buffer::create(&mut backend, None, BufferUsage::Vertex, 4).unwrap();

        let mut plan = StagingPlan::new(backend.copy_alignment());
        plan.push_texture(DestinationKey(0), &image);

        let err = upload(&mut backend, &plan, &[Destination::Buffer(&vb)]).unwrap_err();
        assert!(err.to_string().contains("disagree"));
        assert_eq!(journal.count("submit"), 1);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let mut backend = HeadlessBackend::new();
        let plan = StagingPlan::new(backend.copy_alignment());
        assert!(upload::<HeadlessBackend>(&mut backend, &plan, &[]).is_err());
    }
}
