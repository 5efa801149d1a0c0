//! Records the scene draw for one target.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use frameloop_rhi::buffer::{Buffer, BufferUsage};
use frameloop_rhi::command::CommandBuffer;
use frameloop_rhi::device::Device;
use frameloop_rhi::image::has_stencil_component;
use frameloop_rhi::{RhiError, RhiResult};
use frameloop_scene::Mesh;

use crate::recorder::{CommandRecorder, RecordContext};
use crate::vulkan::backend::VulkanBackend;

/// Owns the mesh buffers and records, per target:
///
/// ```text
/// target UNDEFINED -> COLOR_ATTACHMENT, depth UNDEFINED -> DEPTH_ATTACHMENT
/// (MSAA: multisample image UNDEFINED -> COLOR_ATTACHMENT)
/// begin rendering (clear color, clear depth; MSAA resolves into the target)
///   bind pipeline, viewport, descriptor set, mesh
///   for each model: push model index, draw
/// end rendering
/// target COLOR_ATTACHMENT -> PRESENT_SRC
/// ```
pub struct SceneRecorder {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    model_count: u32,
    clear_color: [f32; 4],
}

impl SceneRecorder {
    /// Uploads `mesh` and prepares to draw it `model_count` times.
    pub fn new(
        device: &Arc<Device>,
        mesh: &Mesh,
        model_count: usize,
        clear_color: [f32; 4],
    ) -> RhiResult<Self> {
        if mesh.indices.is_empty() {
            return Err(RhiError::InvalidArgument("Mesh has no indices".to_string()));
        }
        let vertex_buffer =
            Buffer::new_with_data(device.clone(), BufferUsage::Vertex, mesh.vertex_bytes())?;
        let index_buffer =
            Buffer::new_with_data(device.clone(), BufferUsage::Index, mesh.index_bytes())?;

        debug!(
            "Scene recorder: {} vertices, {} indices, {} models",
            mesh.vertices.len(),
            mesh.index_count(),
            model_count
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
            model_count: model_count as u32,
            clear_color,
        })
    }
}

impl CommandRecorder<VulkanBackend> for SceneRecorder {
    fn record(
        &mut self,
        backend: &VulkanBackend,
        ctx: &RecordContext<'_, VulkanBackend>,
    ) -> RhiResult<CommandBuffer> {
        let index = ctx.index();
        let framebuffer = ctx.framebuffers.get(index).ok_or_else(|| {
            RhiError::InvalidArgument(format!("No framebuffer for target {}", index))
        })?;
        let descriptor_set = ctx.descriptors.set(index).ok_or_else(|| {
            RhiError::InvalidArgument(format!("No descriptor set for target {}", index))
        })?;
        let layout = backend.pipeline_layout().handle();

        let cmd = CommandBuffer::new(backend.command_pool().clone())?;
        cmd.begin_reusable()?;

        let depth_aspect = if has_stencil_component(framebuffer.depth_format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        };
        cmd.transition_image_layout(
            framebuffer.color_image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        );
        cmd.transition_image_layout(
            framebuffer.depth_image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            depth_aspect,
        );
        if let Some(multisample) = framebuffer.multisample {
            cmd.transition_image_layout(
                multisample.image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageAspectFlags::COLOR,
            );
        }

        let clear_color = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        };
        let color_attachment = match framebuffer.multisample {
            // Samples are averaged into the target; the multisampled
            // contents are dropped at the end of the pass.
            Some(multisample) => vk::RenderingAttachmentInfo::default()
                .image_view(multisample.view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .resolve_mode(vk::ResolveModeFlags::AVERAGE)
                .resolve_image_view(framebuffer.color_view)
                .resolve_image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .clear_value(clear_color),
            None => vk::RenderingAttachmentInfo::default()
                .image_view(framebuffer.color_view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(clear_color),
        };
        let color_attachments = [color_attachment];
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(framebuffer.depth_view)
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: framebuffer.extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);

        cmd.begin_rendering(&rendering_info);
        cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, ctx.pipeline.handle());
        cmd.set_full_viewport(framebuffer.extent);
        cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, layout, 0, &[descriptor_set]);
        cmd.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        cmd.bind_index_buffer(self.index_buffer.handle(), 0, vk::IndexType::UINT32);

        for model in 0..self.model_count {
            cmd.push_constants(layout, vk::ShaderStageFlags::VERTEX, 0, &model);
            cmd.draw_indexed(self.index_count, 1);
        }

        cmd.end_rendering();
        cmd.transition_image_layout(
            framebuffer.color_image,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageAspectFlags::COLOR,
        );
        cmd.end()?;

        Ok(cmd)
    }
}
