//! wgpu device + window surface.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - creating & configuring the Surface (swapchain)
//! - executing command recordings and presenting swapchain images

mod convert;
mod encode;
mod error;
mod gpu;
mod init;
mod resources;
mod surface;

pub use error::SurfaceErrorAction;
pub use gpu::Gpu;
pub use init::GpuInit;
pub use resources::{SwapchainImage, WgpuPipeline, WgpuShader, WgpuTexture, WgpuTransferBuffer};
