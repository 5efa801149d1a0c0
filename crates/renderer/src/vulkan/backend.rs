//! [`RenderBackend`] on top of the RHI crate.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use frameloop_core::{PresentModePreference, RendererConfig, SurfaceExtent};
use frameloop_platform::Surface;
use frameloop_rhi::buffer::{Buffer, BufferUsage};
use frameloop_rhi::command::{CommandBuffer, CommandPool};
use frameloop_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, write_uniform_buffer,
};
use frameloop_rhi::device::Device;
use frameloop_rhi::image::{DepthImage, MultisampleImage, find_depth_format, usable_sample_count};
use frameloop_rhi::instance::Instance;
use frameloop_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use frameloop_rhi::shader::{Shader, ShaderStage};
use frameloop_rhi::swapchain::{Swapchain, SwapchainStatus, choose_surface_format};
use frameloop_rhi::sync::{Fence, Semaphore};
use frameloop_rhi::vertex::Vertex;
use frameloop_rhi::{RhiError, RhiResult};

use crate::backend::{Acquired, PresentTargets, RenderBackend, SurfaceStatus};
use crate::error::ErrorKind;

const VERTEX_SHADER: &str = "scene.vert.spv";
const FRAGMENT_SHADER: &str = "scene.frag.spv";

/// Push constant block: index into the uniform model array.
pub const MODEL_INDEX_PUSH_SIZE: u32 = std::mem::size_of::<u32>() as u32;

impl PresentTargets for Swapchain {
    fn len(&self) -> usize {
        self.image_count()
    }

    fn extent(&self) -> SurfaceExtent {
        let extent = Swapchain::extent(self);
        SurfaceExtent::new(extent.width, extent.height)
    }
}

/// Formats and sample count a pipeline was built for. Viewport and scissor
/// are dynamic, so the extent is not part of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineFormats {
    pub color: vk::Format,
    pub depth: vk::Format,
    pub samples: vk::SampleCountFlags,
}

/// Images shared by every target of one generation.
pub struct RenderAttachments {
    pub depth: DepthImage,
    /// Present when rendering with more than one sample per pixel.
    pub multisample: Option<MultisampleImage>,
}

/// Multisampled color image that a pass renders into before resolving.
#[derive(Clone, Copy, Debug)]
pub struct ResolveSource {
    pub image: vk::Image,
    pub view: vk::ImageView,
}

/// Attachment bindings for one target: its color image plus the shared depth
/// and, with MSAA, the shared multisampled color image.
#[derive(Clone, Copy, Debug)]
pub struct Framebuffer {
    pub color_image: vk::Image,
    pub color_view: vk::ImageView,
    pub depth_image: vk::Image,
    pub depth_view: vk::ImageView,
    pub depth_format: vk::Format,
    pub multisample: Option<ResolveSource>,
    pub extent: vk::Extent2D,
}

/// Descriptor pool and one uniform-buffer set per target.
pub struct UniformDescriptors {
    sets: Vec<vk::DescriptorSet>,
    pool: DescriptorPool,
}

impl UniformDescriptors {
    #[inline]
    pub fn set(&self, index: usize) -> Option<vk::DescriptorSet> {
        self.sets.get(index).copied()
    }

    #[inline]
    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }
}

fn present_mode(preference: PresentModePreference) -> vk::PresentModeKHR {
    match preference {
        PresentModePreference::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentModePreference::Fifo => vk::PresentModeKHR::FIFO,
        PresentModePreference::Immediate => vk::PresentModeKHR::IMMEDIATE,
    }
}

pub struct VulkanBackend {
    vertex_shader: Shader,
    fragment_shader: Shader,
    pipeline_layout: PipelineLayout,
    set_layout: DescriptorSetLayout,
    command_pool: Arc<CommandPool>,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
    present_mode: vk::PresentModeKHR,
    device: Arc<Device>,
    instance: Arc<Instance>,
}

impl VulkanBackend {
    /// Creates the generation-independent objects: command pool, layouts and
    /// shader modules.
    ///
    /// `surface` must outlive the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the shaders cannot be loaded or any Vulkan object
    /// cannot be created.
    pub fn new(
        instance: Arc<Instance>,
        device: Arc<Device>,
        surface: &Surface,
        config: &RendererConfig,
    ) -> RhiResult<Self> {
        let graphics_family = device.queue_families().graphics_family.ok_or_else(|| {
            RhiError::InvalidArgument("Device has no graphics queue family".to_string())
        })?;
        let command_pool = Arc::new(CommandPool::new(device.clone(), graphics_family)?);

        let bindings = [DescriptorBindingBuilder::uniform_buffer(
            0,
            vk::ShaderStageFlags::VERTEX,
        )];
        let set_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;

        let push_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: MODEL_INDEX_PUSH_SIZE,
        }];
        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[set_layout.handle()], &push_ranges)?;

        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &config.shader_dir.join(VERTEX_SHADER),
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &config.shader_dir.join(FRAGMENT_SHADER),
            ShaderStage::Fragment,
            "main",
        )?;

        let depth_format = find_depth_format(&instance, &device)?;
        debug!("Depth format: {:?}", depth_format);
        let samples = usable_sample_count(&instance, &device, config.msaa_samples);
        info!("MSAA: {:?} ({} requested)", samples, config.msaa_samples);

        info!("Vulkan backend ready");
        Ok(Self {
            vertex_shader,
            fragment_shader,
            pipeline_layout,
            set_layout,
            command_pool,
            surface: surface.handle(),
            surface_loader: surface.loader().clone(),
            depth_format,
            samples,
            present_mode: present_mode(config.present_mode),
            device,
            instance,
        })
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    #[inline]
    pub fn command_pool(&self) -> &Arc<CommandPool> {
        &self.command_pool
    }

    #[inline]
    pub fn pipeline_layout(&self) -> &PipelineLayout {
        &self.pipeline_layout
    }

    #[inline]
    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }
}

fn map_status(status: SwapchainStatus) -> SurfaceStatus {
    match status {
        SwapchainStatus::Optimal => SurfaceStatus::Optimal,
        SwapchainStatus::Suboptimal => SurfaceStatus::Suboptimal,
        SwapchainStatus::OutOfDate => SurfaceStatus::OutOfDate,
    }
}

impl RenderBackend for VulkanBackend {
    type Error = RhiError;

    type Semaphore = Semaphore;
    type Fence = Fence;
    type Targets = Swapchain;
    type Attachments = RenderAttachments;
    type PipelineKey = PipelineFormats;
    type Pipeline = Pipeline;
    type Framebuffers = Vec<Framebuffer>;
    type UniformBuffers = Vec<Buffer>;
    type Descriptors = UniformDescriptors;
    type CommandBuffer = CommandBuffer;

    fn error_kind(error: &RhiError) -> ErrorKind {
        if error.is_out_of_memory() {
            return ErrorKind::ResourceExhaustion;
        }
        match error {
            RhiError::InvalidArgument(_) | RhiError::PipelineError(_) | RhiError::ShaderError(_) => {
                ErrorKind::ContractViolation
            }
            _ => ErrorKind::Device,
        }
    }

    fn create_semaphore(&self) -> RhiResult<Semaphore> {
        Semaphore::new(self.device.clone())
    }

    fn create_fence(&self, signaled: bool) -> RhiResult<Fence> {
        Fence::new(self.device.clone(), signaled)
    }

    fn wait_for_fence(&self, fence: &Fence, timeout_ns: u64) -> RhiResult<()> {
        fence.wait(timeout_ns)
    }

    fn reset_fence(&self, fence: &Fence) -> RhiResult<()> {
        fence.reset()
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }

    fn create_targets(&self, extent: SurfaceExtent) -> RhiResult<Swapchain> {
        Swapchain::new(
            &self.instance,
            self.device.clone(),
            self.surface,
            extent.width,
            extent.height,
            self.present_mode,
        )
    }

    fn acquire_next(
        &self,
        targets: &Swapchain,
        ready: &Semaphore,
        timeout_ns: u64,
    ) -> RhiResult<Acquired> {
        let (index, status) = targets.acquire_next_image(ready.handle(), timeout_ns)?;
        Ok(Acquired {
            index,
            status: map_status(status),
        })
    }

    fn submit(
        &self,
        commands: &CommandBuffer,
        wait: &Semaphore,
        signal: &Semaphore,
        fence: &Fence,
    ) -> RhiResult<()> {
        let wait_semaphores = [wait.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [signal.handle()];
        let command_buffers = [commands.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: every handle is owned by a live wrapper borrowed for this
        // call, and the orchestrator resets the fence right before submitting.
        unsafe { self.device.submit_graphics(&[submit_info], fence.handle()) }
    }

    fn present(&self, targets: &Swapchain, index: u32, wait: &Semaphore) -> RhiResult<SurfaceStatus> {
        targets
            .present(self.device.present_queue(), index, wait.handle())
            .map(map_status)
    }

    fn pipeline_requirements(&self) -> RhiResult<PipelineFormats> {
        // SAFETY: the surface outlives the backend and belongs to the same
        // instance as the loader.
        let formats = unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(self.device.physical_device(), self.surface)?
        };
        let surface_format = choose_surface_format(&formats)?;
        Ok(PipelineFormats {
            color: surface_format.format,
            depth: self.depth_format,
            samples: self.samples,
        })
    }

    fn create_attachments(&self, targets: &Swapchain) -> RhiResult<RenderAttachments> {
        let extent = targets.extent();
        let multisample = if self.samples == vk::SampleCountFlags::TYPE_1 {
            None
        } else {
            Some(MultisampleImage::new(
                self.device.clone(),
                extent,
                targets.format(),
                self.samples,
            )?)
        };
        let depth = DepthImage::new(self.device.clone(), extent, self.depth_format, self.samples)?;
        Ok(RenderAttachments { depth, multisample })
    }

    fn create_pipeline(&self, key: &PipelineFormats) -> RhiResult<Pipeline> {
        let attributes = Vertex::attribute_descriptions();
        GraphicsPipelineBuilder::new()
            .vertex_shader(&self.vertex_shader)
            .fragment_shader(&self.fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&attributes)
            // The projection flips Y, which mirrors winding in framebuffer space.
            .cull_mode(CullMode::None)
            .depth_test_enable(true)
            .depth_write_enable(true)
            .color_attachment_format(key.color)
            .depth_attachment_format(key.depth)
            .samples(key.samples)
            .build(self.device.clone(), &self.pipeline_layout)
    }

    fn create_framebuffers(
        &self,
        targets: &Swapchain,
        attachments: &RenderAttachments,
    ) -> RhiResult<Vec<Framebuffer>> {
        let depth = &attachments.depth;
        let multisample = attachments.multisample.as_ref().map(|image| ResolveSource {
            image: image.image(),
            view: image.image_view(),
        });
        let framebuffers = targets
            .images()
            .iter()
            .zip(targets.image_views())
            .map(|(&color_image, &color_view)| Framebuffer {
                color_image,
                color_view,
                depth_image: depth.image(),
                depth_view: depth.image_view(),
                depth_format: depth.format(),
                multisample,
                extent: targets.extent(),
            })
            .collect::<Vec<_>>();
        debug!("Bound {} framebuffers", framebuffers.len());
        Ok(framebuffers)
    }

    fn create_uniform_buffers(&self, count: usize, size: u64) -> RhiResult<Vec<Buffer>> {
        (0..count)
            .map(|_| Buffer::new(self.device.clone(), BufferUsage::Uniform, size))
            .collect()
    }

    fn create_descriptors(&self, uniforms: &Vec<Buffer>) -> RhiResult<UniformDescriptors> {
        let pool = DescriptorPool::for_uniform_sets(self.device.clone(), uniforms.len() as u32)?;
        let layouts = vec![self.set_layout.handle(); uniforms.len()];
        let sets = pool.allocate(&layouts)?;

        for (&set, buffer) in sets.iter().zip(uniforms) {
            write_uniform_buffer(&self.device, set, 0, buffer.handle(), buffer.size());
        }

        Ok(UniformDescriptors { sets, pool })
    }

    fn write_uniforms(&self, uniforms: &Vec<Buffer>, index: usize, bytes: &[u8]) -> RhiResult<()> {
        let buffer = uniforms.get(index).ok_or_else(|| {
            RhiError::InvalidArgument(format!(
                "Uniform buffer {} out of range ({} buffers)",
                index,
                uniforms.len()
            ))
        })?;
        buffer.write_data(0, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_mode_mapping() {
        assert_eq!(
            present_mode(PresentModePreference::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            present_mode(PresentModePreference::Fifo),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status(SwapchainStatus::OutOfDate), SurfaceStatus::OutOfDate);
        assert_eq!(map_status(SwapchainStatus::Suboptimal), SurfaceStatus::Suboptimal);
        assert_eq!(map_status(SwapchainStatus::Optimal), SurfaceStatus::Optimal);
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(
            VulkanBackend::error_kind(&RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)),
            ErrorKind::ResourceExhaustion
        );
        assert_eq!(
            VulkanBackend::error_kind(&RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST)),
            ErrorKind::Device
        );
        assert_eq!(
            VulkanBackend::error_kind(&RhiError::InvalidArgument("bad".to_string())),
            ErrorKind::ContractViolation
        );
    }
}
