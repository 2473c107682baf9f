// Application - one rendering context bound to one host window
//
// Owns the device and everything built on top of it. The C boundary keeps
// these in the registry and only ever talks to them through `draw_frame`,
// `resize`, `refresh` and drop.

use anyhow::{Context, Result};
use ash::vk;
use std::path::Path;
use std::sync::Arc;

use crate::backend::buffer::VertexBuffer;
use crate::backend::command::{CommandContext, PassTarget};
use crate::backend::pipeline::{self, GraphicsPipeline, TRIANGLE};
use crate::backend::swapchain::SwapchainRequest;
use crate::backend::sync::{self, FrameCursor, FrameSync};
use crate::backend::{NativeWindow, Swapchain, VulkanDevice};
use crate::config::Config;
use crate::error::BridgeError;

/// What happened to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The swapchain no longer matches the surface; call [`Application::refresh`]
    NeedsRefresh,
    /// Window is minimised
    Skipped,
}

/// A context can only be created for a window with area
pub fn check_extent(width: u32, height: u32) -> Result<(), BridgeError> {
    if width == 0 || height == 0 {
        return Err(BridgeError::ZeroExtent { width, height });
    }
    Ok(())
}

/// What `draw_frame` must do before it can render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePlan {
    Skip,
    RefreshThenDraw,
    Draw,
}

/// Window size as last reported by the host, and whether the swapchain
/// still has to catch up with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    width: u32,
    height: u32,
    resize_pending: bool,
}

impl WindowState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            resize_pending: false,
        }
    }

    pub fn is_minimised(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn is_resize_pending(&self) -> bool {
        self.resize_pending
    }

    /// Same-size reports are ignored
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        log::debug!("Resize {}x{} -> {}x{}", self.width, self.height, width, height);
        self.width = width;
        self.height = height;
        self.resize_pending = true;
    }

    pub fn plan(&self) -> FramePlan {
        if self.is_minimised() {
            FramePlan::Skip
        } else if self.resize_pending {
            FramePlan::RefreshThenDraw
        } else {
            FramePlan::Draw
        }
    }

    /// A refresh was asked for while minimised; retry once the window is back
    pub fn defer_refresh(&mut self) {
        self.resize_pending = true;
    }

    pub fn refreshed(&mut self) {
        self.resize_pending = false;
    }
}

pub struct Application {
    frame_sync: Vec<FrameSync>,
    /// One per swapchain image
    render_finished: Vec<vk::Semaphore>,
    commands: Option<CommandContext>,
    vertex_buffer: Option<VertexBuffer>,
    pipeline: Option<GraphicsPipeline>,
    render_pass: vk::RenderPass,
    swapchain: Option<Swapchain>,
    cursor: FrameCursor,

    window: WindowState,
    present_mode: vk::PresentModeKHR,
    extra_images: u32,
    clear_color: [f32; 4],

    device: Arc<VulkanDevice>,
}

impl Application {
    pub fn new(
        window: &NativeWindow,
        width: u32,
        height: u32,
        config: &Config,
        vulkan_path: Option<&Path>,
    ) -> Result<Self> {
        check_extent(width, height)?;

        log::info!("Creating Vulkan application ({}x{})", width, height);

        let device = VulkanDevice::new(config, vulkan_path, window)?;
        let frames = config.graphics.max_frames_in_flight;

        let mut app = Self {
            frame_sync: Vec::new(),
            render_finished: Vec::new(),
            commands: None,
            vertex_buffer: None,
            pipeline: None,
            render_pass: vk::RenderPass::null(),
            swapchain: None,
            cursor: FrameCursor::new(frames),
            window: WindowState::new(width, height),
            present_mode: config.present_mode(),
            extra_images: config.graphics.extra_swapchain_images,
            clear_color: config.graphics.clear_color,
            device,
        };

        // From here on, Drop releases whatever was built if a step fails
        let mut swapchain = Swapchain::new(app.device.clone(), app.swapchain_request(), None)?;
        app.rebuild_render_pass(swapchain.format)?;
        swapchain.create_framebuffers(app.render_pass)?;
        app.render_finished = sync::create_semaphores(&app.device.device, swapchain.image_count())?;
        app.swapchain = Some(swapchain);

        app.vertex_buffer = Some(VertexBuffer::new(&app.device, &TRIANGLE)?);
        app.commands = Some(CommandContext::new(
            &app.device.device,
            app.device.queues.graphics_family,
            frames,
        )?);
        app.frame_sync = FrameSync::create_all(&app.device.device, frames)?;

        log::info!("Vulkan application ready");
        Ok(app)
    }

    pub fn is_minimised(&self) -> bool {
        self.window.is_minimised()
    }

    /// Record a new window size; the swapchain follows at the next draw
    pub fn resize(&mut self, width: u32, height: u32) {
        self.window.resize(width, height);
    }

    /// Render one frame.
    ///
    /// An error leaves the context unusable (a frame fence may never
    /// signal again); drop the application after any failure.
    pub fn draw_frame(&mut self) -> Result<FrameOutcome> {
        match self.window.plan() {
            FramePlan::Skip => return Ok(FrameOutcome::Skipped),
            FramePlan::RefreshThenDraw => self.refresh()?,
            FramePlan::Draw => {}
        }

        let frame = self.cursor.current();
        let device = &self.device.device;
        let sync = &self.frame_sync[frame];
        let swapchain = self.swapchain.as_ref().context("Swapchain missing")?;
        let commands = self.commands.as_ref().context("Command buffers missing")?;
        let pipeline = self.pipeline.as_ref().context("Pipeline missing")?;
        let vertex_buffer = self.vertex_buffer.as_ref().context("Vertex buffer missing")?;

        unsafe {
            device.wait_for_fences(&[sync.in_flight_fence], true, u64::MAX)
                .context("Failed to wait for frame fence")?;
        }

        // Out of date: leave the fence signaled so the next wait returns
        let Some((image_index, suboptimal)) =
            swapchain.acquire_next_image(u64::MAX, sync.image_available)?
        else {
            return Ok(FrameOutcome::NeedsRefresh);
        };

        let target = PassTarget {
            render_pass: self.render_pass,
            framebuffer: swapchain.framebuffers[image_index as usize],
            extent: swapchain.extent,
            clear_color: self.clear_color,
        };
        let cmd = commands.record(device, frame, &target, pipeline, vertex_buffer)?;

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cmd];
        let signal_semaphores = [self.render_finished[image_index as usize]];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        // Reset only once nothing can fail before the submit that signals it
        unsafe {
            device.reset_fences(&[sync.in_flight_fence])
                .context("Failed to reset frame fence")?;
            device.queue_submit(self.device.queues.graphics, &[submit_info], sync.in_flight_fence)
                .context("Failed to submit draw command buffer")?;
        }

        let present_refresh =
            swapchain.present(self.device.queues.present, image_index, &signal_semaphores)?;

        self.cursor.advance();

        if suboptimal || present_refresh {
            Ok(FrameOutcome::NeedsRefresh)
        } else {
            Ok(FrameOutcome::Presented)
        }
    }

    /// Rebuild the swapchain and whatever depends on its format or image count
    pub fn refresh(&mut self) -> Result<()> {
        if self.window.is_minimised() {
            self.window.defer_refresh();
            return Ok(());
        }

        self.device.wait_idle()?;

        let mut swapchain = Swapchain::new(
            self.device.clone(),
            self.swapchain_request(),
            self.swapchain.as_ref(),
        )?;

        let format_changed = self
            .swapchain
            .as_ref()
            .map_or(true, |old| old.format != swapchain.format);
        if format_changed {
            log::info!("Surface format changed to {:?}", swapchain.format);
            self.rebuild_render_pass(swapchain.format)?;
        }

        swapchain.create_framebuffers(self.render_pass)?;

        if swapchain.image_count() != self.render_finished.len() {
            sync::destroy_semaphores(&self.device.device, &mut self.render_finished);
            self.render_finished =
                sync::create_semaphores(&self.device.device, swapchain.image_count())?;
        }

        // Old swapchain is retired by the new one and released here
        self.swapchain = Some(swapchain);
        self.window.refreshed();

        Ok(())
    }

    fn swapchain_request(&self) -> SwapchainRequest {
        SwapchainRequest {
            width: self.window.width,
            height: self.window.height,
            present_mode: self.present_mode,
            extra_images: self.extra_images,
        }
    }

    fn rebuild_render_pass(&mut self, format: vk::Format) -> Result<()> {
        let device = &self.device.device;

        if let Some(pipeline) = self.pipeline.take() {
            pipeline.destroy(device);
        }
        unsafe { device.destroy_render_pass(self.render_pass, None) };
        self.render_pass = vk::RenderPass::null();

        self.render_pass = pipeline::create_render_pass(device, format)?;
        self.pipeline = Some(GraphicsPipeline::new(device, self.render_pass)?);

        Ok(())
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan application...");

        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle: {:#}", e);
        }

        let device = &self.device.device;

        for sync in self.frame_sync.drain(..) {
            sync.destroy(device);
        }
        sync::destroy_semaphores(device, &mut self.render_finished);

        if let Some(mut commands) = self.commands.take() {
            commands.destroy(device);
        }
        if let Some(mut vertex_buffer) = self.vertex_buffer.take() {
            vertex_buffer.destroy(&self.device);
        }
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.destroy(device);
        }
        unsafe { device.destroy_render_pass(self.render_pass, None) };

        // Swapchain next; the device goes when the last Arc is dropped
        self.swapchain = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_without_area_are_rejected() {
        assert!(check_extent(1, 1).is_ok());
        assert_eq!(
            check_extent(0, 600),
            Err(BridgeError::ZeroExtent { width: 0, height: 600 })
        );
        assert!(check_extent(800, 0).is_err());
    }

    #[test]
    fn fresh_window_draws_directly() {
        let window = WindowState::new(800, 600);
        assert_eq!(window.plan(), FramePlan::Draw);
        assert!(!window.is_resize_pending());
    }

    #[test]
    fn same_size_resize_changes_nothing() {
        let mut window = WindowState::new(800, 600);
        window.resize(800, 600);
        assert_eq!(window, WindowState::new(800, 600));
        assert_eq!(window.plan(), FramePlan::Draw);
    }

    #[test]
    fn zero_size_skips_until_next_real_resize() {
        let mut window = WindowState::new(800, 600);

        for (width, height) in [(0, 0), (0, 600), (800, 0)] {
            window.resize(width, height);
            assert!(window.is_minimised());
            assert_eq!(window.plan(), FramePlan::Skip);
        }

        // Back to the size the swapchain was built for still needs a refresh
        window.resize(800, 600);
        assert!(!window.is_minimised());
        assert_eq!(window.plan(), FramePlan::RefreshThenDraw);

        window.refreshed();
        assert_eq!(window.plan(), FramePlan::Draw);
    }

    #[test]
    fn refresh_while_minimised_is_retried_later() {
        let mut window = WindowState::new(800, 600);
        window.resize(0, 0);
        window.refreshed();

        // Mirrors Application::refresh on a minimised window
        window.defer_refresh();
        assert_eq!(window.plan(), FramePlan::Skip);

        window.resize(1024, 768);
        assert_eq!(window.plan(), FramePlan::RefreshThenDraw);
    }

    #[test]
    fn resize_during_pending_refresh_keeps_it_pending() {
        let mut window = WindowState::new(800, 600);
        window.resize(640, 480);
        window.resize(640, 480);
        assert!(window.is_resize_pending());
    }
}
