// Synchronization primitives
//
// Fences and image-available semaphores belong to a frame in flight.
// Render-finished semaphores belong to a swapchain image, because the
// presentation engine may still be waiting on one after its frame's fence
// has signaled.

use anyhow::{Context, Result};
use ash::vk;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &ash::Device) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED); // Start signaled

        unsafe {
            let image_available = device.create_semaphore(&semaphore_info, None)
                .context("Failed to create semaphore")?;
            let in_flight_fence = match device.create_fence(&fence_info, None) {
                Ok(fence) => fence,
                Err(e) => {
                    device.destroy_semaphore(image_available, None);
                    return Err(e).context("Failed to create fence");
                }
            };

            Ok(Self {
                image_available,
                in_flight_fence,
            })
        }
    }

    /// One `FrameSync` per frame in flight; partial results are destroyed on failure
    pub fn create_all(device: &ash::Device, frames: usize) -> Result<Vec<Self>> {
        let mut all = Vec::with_capacity(frames);
        for _ in 0..frames {
            match Self::new(device) {
                Ok(sync) => all.push(sync),
                Err(e) => {
                    all.iter().for_each(|sync: &FrameSync| sync.destroy(device));
                    return Err(e);
                }
            }
        }
        Ok(all)
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}

/// Create `count` binary semaphores
pub fn create_semaphores(device: &ash::Device, count: usize) -> Result<Vec<vk::Semaphore>> {
    let semaphore_info = vk::SemaphoreCreateInfo::builder();
    let mut semaphores = Vec::with_capacity(count);

    for _ in 0..count {
        match unsafe { device.create_semaphore(&semaphore_info, None) } {
            Ok(semaphore) => semaphores.push(semaphore),
            Err(e) => {
                destroy_semaphores(device, &mut semaphores);
                return Err(e).context("Failed to create semaphore");
            }
        }
    }

    Ok(semaphores)
}

pub fn destroy_semaphores(device: &ash::Device, semaphores: &mut Vec<vk::Semaphore>) {
    for semaphore in semaphores.drain(..) {
        unsafe { device.destroy_semaphore(semaphore, None) };
    }
}

/// Round-robin index over the frames in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    current: usize,
    frames: usize,
}

impl FrameCursor {
    pub fn new(frames: usize) -> Self {
        Self {
            current: 0,
            frames: frames.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.frames;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_wraps_after_last_frame() {
        let mut cursor = FrameCursor::new(2);
        let seen: Vec<usize> = (0..5)
            .map(|_| {
                let index = cursor.current();
                cursor.advance();
                index
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn single_frame_cursor_stays_put() {
        let mut cursor = FrameCursor::new(0);
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.current(), 0);
    }
}
