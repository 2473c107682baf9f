// Command pool and per-frame command buffers

use anyhow::{Context, Result};
use ash::vk;

use super::buffer::VertexBuffer;
use super::pipeline::GraphicsPipeline;

/// Everything one recording of the triangle pass needs
pub struct PassTarget {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

pub struct CommandContext {
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandContext {
    /// One resettable primary buffer per frame in flight
    pub fn new(device: &ash::Device, queue_family: u32, frames: usize) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);

        let pool = unsafe {
            device.create_command_pool(&pool_info, None)
                .context("Failed to create command pool")?
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(frames as u32);

        match unsafe { device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => Ok(Self { pool, buffers }),
            Err(e) => {
                unsafe { device.destroy_command_pool(pool, None) };
                Err(e).context("Failed to allocate command buffers")
            }
        }
    }

    pub fn buffer(&self, frame: usize) -> vk::CommandBuffer {
        self.buffers[frame]
    }

    /// Reset and re-record the buffer for `frame`
    pub fn record(
        &self,
        device: &ash::Device,
        frame: usize,
        target: &PassTarget,
        pipeline: &GraphicsPipeline,
        vertices: &VertexBuffer,
    ) -> Result<vk::CommandBuffer> {
        let cmd = self.buffer(frame);

        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .context("Failed to reset command buffer")?;

            let begin_info = vk::CommandBufferBeginInfo::builder();
            device.begin_command_buffer(cmd, &begin_info)
                .context("Failed to begin command buffer")?;

            let clear_values = [vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: target.clear_color,
                },
            }];

            let render_area = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: target.extent,
            };

            let render_pass_info = vk::RenderPassBeginInfo::builder()
                .render_pass(target.render_pass)
                .framebuffer(target.framebuffer)
                .render_area(render_area)
                .clear_values(&clear_values);

            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: target.extent.width as f32,
                height: target.extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[render_area]);

            device.cmd_bind_vertex_buffers(cmd, 0, &[vertices.buffer], &[0]);
            device.cmd_draw(cmd, vertices.vertex_count(), 1, 0, 0);

            device.cmd_end_render_pass(cmd);

            device.end_command_buffer(cmd)
                .context("Failed to end command buffer")?;
        }

        Ok(cmd)
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            if !self.buffers.is_empty() {
                device.free_command_buffers(self.pool, &self.buffers);
            }
            device.destroy_command_pool(self.pool, None);
        }
        self.buffers.clear();
        self.pool = vk::CommandPool::null();
    }
}
