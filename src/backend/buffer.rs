// Vertex buffer backed by gpu-allocator
//
// The triangle is tiny and never changes, so the buffer lives in
// host-visible memory and is written once through the persistent mapping.

use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use super::pipeline::Vertex;
use super::VulkanDevice;

pub struct VertexBuffer {
    pub buffer: vk::Buffer,
    allocation: Option<Allocation>,
    vertex_count: u32,
}

impl VertexBuffer {
    pub fn new(device: &VulkanDevice, vertices: &[Vertex]) -> Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(bytes.len() as vk::DeviceSize)
            .usage(vk::BufferUsageFlags::VERTEX_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device.device.create_buffer(&buffer_info, None)
                .context("Failed to create vertex buffer")?
        };

        let requirements = unsafe { device.device.get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator().lock().allocate(&AllocationCreateDesc {
            name: "triangle vertices",
            requirements,
            location: MemoryLocation::CpuToGpu,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });

        let mut allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.device.destroy_buffer(buffer, None) };
                return Err(e).context("Failed to allocate vertex buffer memory");
            }
        };

        let upload = Self::upload(device, buffer, &mut allocation, bytes);
        let mut this = Self {
            buffer,
            allocation: Some(allocation),
            vertex_count: vertices.len() as u32,
        };

        if let Err(e) = upload {
            this.destroy(device);
            return Err(e);
        }

        log::debug!("Uploaded {} vertices ({} bytes)", this.vertex_count, bytes.len());
        Ok(this)
    }

    fn upload(
        device: &VulkanDevice,
        buffer: vk::Buffer,
        allocation: &mut Allocation,
        bytes: &[u8],
    ) -> Result<()> {
        unsafe {
            device.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .context("Failed to bind vertex buffer memory")?;
        }

        let mapped = allocation
            .mapped_slice_mut()
            .context("Vertex buffer memory is not host visible")?;
        mapped[..bytes.len()].copy_from_slice(bytes);

        Ok(())
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Free the buffer and its memory. Safe to call twice.
    pub fn destroy(&mut self, device: &VulkanDevice) {
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = device.allocator().lock().free(allocation) {
                log::error!("Failed to free vertex buffer memory: {}", e);
            }
            unsafe { device.device.destroy_buffer(self.buffer, None) };
            self.buffer = vk::Buffer::null();
        }
    }
}
