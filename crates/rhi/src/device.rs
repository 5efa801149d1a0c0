//! Vulkan logical device and queue management.
//!
//! Creates the `VkDevice` with swapchain + dynamic rendering enabled, fetches
//! the graphics and present queues and owns the gpu-allocator instance used by
//! buffers and images.

use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, error, info};

use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices};

const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Logical device wrapper.
///
/// Shared as `Arc<Device>` by every RAII wrapper in this crate so the device
/// outlives the objects created from it.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    allocator: Mutex<Allocator>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    queue_families: QueueFamilyIndices,
}

impl Device {
    /// Creates the logical device for the selected GPU.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue families are incomplete, device creation
    /// fails, or the allocator cannot be initialized.
    pub fn new(instance: &Instance, info: &PhysicalDeviceInfo) -> Result<Arc<Self>, RhiError> {
        let families = info.queue_families;
        let (Some(graphics_family), Some(present_family)) =
            (families.graphics_family, families.present_family)
        else {
            return Err(RhiError::NoSuitableGpu);
        };

        let priorities = [1.0f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .push_next(&mut features_1_3);

        let device = unsafe {
            instance
                .handle()
                .create_device(info.device, &create_info, None)?
        };
        info!("Logical device created on '{}'", info.device_name());

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        debug!(
            "Queues retrieved: graphics family {}, present family {}",
            graphics_family, present_family
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        Ok(Arc::new(Self {
            device,
            physical_device: info.device,
            allocator: Mutex::new(allocator),
            graphics_queue,
            present_queue,
            queue_families: families,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Queue used for presentation. Identical to the graphics queue on most GPUs.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Locks the memory allocator.
    ///
    /// A poisoned lock only means another thread panicked mid-allocation; the
    /// allocator state itself is still usable, so the guard is recovered.
    pub fn allocator(&self) -> MutexGuard<'_, Allocator> {
        self.allocator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Blocks until every queue on the device is idle.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits work to the graphics queue.
    ///
    /// # Safety
    ///
    /// Every handle referenced by `submit_infos` and `fence` must be valid and
    /// the fence must be unsignaled.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> Result<(), RhiError> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}
