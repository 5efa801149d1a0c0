//! Depth and multisampled color attachment images.
//!
//! [`DepthImage`] and [`MultisampleImage`] are GPU-only images plus views
//! sized to the current swapchain extent. They are shared by every frame in
//! flight and rebuilt with the swapchain.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Depth formats in order of preference.
const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Picks the first candidate depth format usable as an optimal-tiling
/// depth/stencil attachment on the device.
pub fn find_depth_format(instance: &Instance, device: &Device) -> RhiResult<vk::Format> {
    DEPTH_FORMAT_CANDIDATES
        .into_iter()
        .find(|&format| {
            let properties = unsafe {
                instance
                    .handle()
                    .get_physical_device_format_properties(device.physical_device(), format)
            };
            properties
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| RhiError::InvalidArgument("No supported depth format".to_string()))
}

/// Whether `format` carries a stencil aspect.
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT
    )
}

/// Sample counts from highest to lowest.
const SAMPLE_COUNTS: [(u32, vk::SampleCountFlags); 7] = [
    (64, vk::SampleCountFlags::TYPE_64),
    (32, vk::SampleCountFlags::TYPE_32),
    (16, vk::SampleCountFlags::TYPE_16),
    (8, vk::SampleCountFlags::TYPE_8),
    (4, vk::SampleCountFlags::TYPE_4),
    (2, vk::SampleCountFlags::TYPE_2),
    (1, vk::SampleCountFlags::TYPE_1),
];

/// Highest sample count in `supported` that does not exceed `requested`.
///
/// Falls back to a single sample when nothing else fits.
pub fn highest_sample_count(
    supported: vk::SampleCountFlags,
    requested: u32,
) -> vk::SampleCountFlags {
    SAMPLE_COUNTS
        .into_iter()
        .find(|&(count, flag)| count <= requested && supported.contains(flag))
        .map_or(vk::SampleCountFlags::TYPE_1, |(_, flag)| flag)
}

/// Sample count to render with: `requested` clamped to what the device can
/// use for both color and depth framebuffer attachments.
pub fn usable_sample_count(
    instance: &Instance,
    device: &Device,
    requested: u32,
) -> vk::SampleCountFlags {
    let properties = unsafe {
        instance
            .handle()
            .get_physical_device_properties(device.physical_device())
    };
    let limits = properties.limits;
    let supported = limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;
    highest_sample_count(supported, requested)
}

/// GPU-only image plus the allocation backing it.
///
/// The image is destroyed if allocation or binding fails.
fn create_image(
    device: &Device,
    info: &vk::ImageCreateInfo<'_>,
    name: &str,
) -> RhiResult<(vk::Image, Allocation)> {
    let image = unsafe { device.handle().create_image(info, None)? };
    let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

    let allocation = match device.allocator().allocate(&AllocationCreateDesc {
        name,
        requirements,
        location: MemoryLocation::GpuOnly,
        linear: false,
        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
    }) {
        Ok(allocation) => allocation,
        Err(e) => {
            unsafe { device.handle().destroy_image(image, None) };
            return Err(e.into());
        }
    };

    let bound = unsafe {
        device
            .handle()
            .bind_image_memory(image, allocation.memory(), allocation.offset())
    };
    if let Err(e) = bound {
        unsafe { device.handle().destroy_image(image, None) };
        if let Err(free) = device.allocator().free(allocation) {
            error!("Failed to free {} allocation: {:?}", name, free);
        }
        return Err(e.into());
    }

    Ok((image, allocation))
}

fn attachment_info(
    extent: vk::Extent2D,
    format: vk::Format,
    samples: vk::SampleCountFlags,
    usage: vk::ImageUsageFlags,
) -> vk::ImageCreateInfo<'static> {
    vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(samples)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
}

fn create_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> RhiResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect_mask)
                .level_count(1)
                .layer_count(1),
        );
    Ok(unsafe { device.handle().create_image_view(&view_info, None)? })
}

fn check_extent(extent: vk::Extent2D, what: &str) -> RhiResult<()> {
    if extent.width == 0 || extent.height == 0 {
        return Err(RhiError::InvalidArgument(format!(
            "{} dimensions must be greater than 0",
            what
        )));
    }
    Ok(())
}

/// Image, view and allocation of one attachment. Dropping it frees all three.
struct AttachmentImage {
    device: Arc<Device>,
    image: vk::Image,
    image_view: vk::ImageView,
    allocation: Option<Allocation>,
    name: &'static str,
}

impl AttachmentImage {
    fn new(
        device: Arc<Device>,
        info: &vk::ImageCreateInfo<'_>,
        aspect_mask: vk::ImageAspectFlags,
        name: &'static str,
    ) -> RhiResult<Self> {
        let (image, allocation) = create_image(&device, info, name)?;
        // From here on `Drop` cleans up after a partial failure.
        let mut attachment = Self {
            device,
            image,
            image_view: vk::ImageView::null(),
            allocation: Some(allocation),
            name,
        };
        attachment.image_view = create_view(&attachment.device, image, info.format, aspect_mask)?;
        Ok(attachment)
    }
}

impl Drop for AttachmentImage {
    fn drop(&mut self) {
        unsafe {
            if self.image_view != vk::ImageView::null() {
                self.device.handle().destroy_image_view(self.image_view, None);
            }
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take()
            && let Err(e) = self.device.allocator().free(allocation)
        {
            error!("Failed to free {} allocation: {:?}", self.name, e);
        }
    }
}

pub struct DepthImage {
    inner: AttachmentImage,
    format: vk::Format,
    samples: vk::SampleCountFlags,
    extent: vk::Extent2D,
}

impl DepthImage {
    /// Creates a depth image of `extent` in `format`, with `samples` samples
    /// per pixel (matching the color attachment it is rendered with).
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidArgument`] for an empty extent, or the
    /// Vulkan / allocator error if creation fails.
    pub fn new(
        device: Arc<Device>,
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RhiResult<Self> {
        check_extent(extent, "Depth image")?;

        let info = attachment_info(
            extent,
            format,
            samples,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        );
        let aspect_mask = if has_stencil_component(format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        };
        let inner = AttachmentImage::new(device, &info, aspect_mask, "depth_image")?;

        info!(
            "Created depth image: {}x{} ({:?}, {:?})",
            extent.width, extent.height, format, samples
        );

        Ok(Self {
            inner,
            format,
            samples,
            extent,
        })
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.inner.image
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.inner.image_view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for DepthImage {
    fn drop(&mut self) {
        debug!(
            "Destroyed depth image {}x{}",
            self.extent.width, self.extent.height
        );
    }
}

/// Multisampled color target. Rendering happens here and is resolved into
/// the presentable image at the end of the pass, so its contents are never
/// stored.
pub struct MultisampleImage {
    inner: AttachmentImage,
    samples: vk::SampleCountFlags,
    extent: vk::Extent2D,
}

impl MultisampleImage {
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidArgument`] for an empty extent or a single
    /// sample, or the Vulkan / allocator error if creation fails.
    pub fn new(
        device: Arc<Device>,
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RhiResult<Self> {
        check_extent(extent, "Multisample image")?;
        if samples == vk::SampleCountFlags::TYPE_1 {
            return Err(RhiError::InvalidArgument(
                "Multisample image needs more than one sample".to_string(),
            ));
        }

        let info = attachment_info(
            extent,
            format,
            samples,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
        );
        let inner = AttachmentImage::new(device, &info, vk::ImageAspectFlags::COLOR, "msaa_image")?;

        info!(
            "Created multisample color image: {}x{} ({:?}, {:?})",
            extent.width, extent.height, format, samples
        );

        Ok(Self {
            inner,
            samples,
            extent,
        })
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.inner.image
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.inner.image_view
    }

    #[inline]
    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stencil_detection() {
        assert!(!has_stencil_component(vk::Format::D32_SFLOAT));
        assert!(has_stencil_component(vk::Format::D32_SFLOAT_S8_UINT));
        assert!(has_stencil_component(vk::Format::D24_UNORM_S8_UINT));
    }

    #[test]
    fn test_plain_depth_format_preferred() {
        assert_eq!(DEPTH_FORMAT_CANDIDATES[0], vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_sample_count_clamped_to_request() {
        let supported = vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_2
            | vk::SampleCountFlags::TYPE_4
            | vk::SampleCountFlags::TYPE_8;
        assert_eq!(highest_sample_count(supported, 4), vk::SampleCountFlags::TYPE_4);
        assert_eq!(highest_sample_count(supported, 6), vk::SampleCountFlags::TYPE_4);
        assert_eq!(highest_sample_count(supported, 64), vk::SampleCountFlags::TYPE_8);
    }

    #[test]
    fn test_sample_count_falls_back_to_one() {
        let supported = vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_4;
        assert_eq!(highest_sample_count(supported, 1), vk::SampleCountFlags::TYPE_1);
        assert_eq!(highest_sample_count(supported, 2), vk::SampleCountFlags::TYPE_1);
        assert_eq!(
            highest_sample_count(vk::SampleCountFlags::empty(), 8),
            vk::SampleCountFlags::TYPE_1
        );
    }

    #[test]
    fn test_attachment_images_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DepthImage>();
        assert_send_sync::<MultisampleImage>();
    }
}
