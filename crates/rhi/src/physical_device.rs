//! Physical device (GPU) selection.
//!
//! Enumerates GPUs, keeps those that can draw to the given surface with
//! Vulkan 1.3 (dynamic rendering), and picks the highest scoring one.

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Queue family indices needed by the frame loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family used for rendering submissions.
    pub graphics_family: Option<u32>,
    /// Family able to present to the surface. May equal the graphics family.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Returns true if both graphics and present families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Distinct family indices, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }
        families
    }

    /// Whether graphics and presentation share one queue family.
    pub fn shares_present_queue(&self) -> bool {
        self.is_complete() && self.graphics_family == self.present_family
    }
}

/// Information about the selected GPU.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the most suitable GPU for rendering to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no device has graphics and present
/// support plus Vulkan 1.3.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    info!("Found {} GPU(s)", devices.len());

    let best = devices
        .into_iter()
        .filter_map(|device| check_device(instance, device, surface, surface_loader))
        .map(|info| {
            let score = rate_device_type(info.properties.device_type);
            debug!("GPU '{}' ({}) - score {}", info.device_name(), info.device_type_name(), score);
            (info, score)
        })
        .max_by_key(|(_, score)| *score);

    match best {
        Some((info, _)) => {
            info!("Selected GPU: '{}' ({})", info.device_name(), info.device_type_name());
            Ok(info)
        }
        None => {
            warn!("No suitable GPU found");
            Err(RhiError::NoSuitableGpu)
        }
    }
}

fn check_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = properties
        .device_name_as_c_str()
        .unwrap_or(c"Unknown")
        .to_string_lossy()
        .into_owned();

    if !supports_vulkan_1_3(properties.api_version) {
        debug!("GPU '{}' skipped: Vulkan 1.3 not supported", name);
        return None;
    }

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        debug!("GPU '{}' skipped: missing graphics or present queue", name);
        return None;
    }

    let extensions = unsafe { instance.enumerate_device_extension_properties(device).ok()? };
    let has_swapchain = extensions.iter().any(|ext| {
        ext.extension_name_as_c_str()
            .is_ok_and(|ext_name| ext_name == ash::khr::swapchain::NAME)
    });
    if !has_swapchain {
        debug!("GPU '{}' skipped: no swapchain extension", name);
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        queue_families,
    })
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        let graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let present = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, i, surface)
                .unwrap_or(false)
        };

        // A family doing both avoids cross-queue ownership transfers.
        if graphics && present {
            indices.graphics_family = Some(i);
            indices.present_family = Some(i);
            break;
        }
        if graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
        }
        if present && indices.present_family.is_none() {
            indices.present_family = Some(i);
        }
    }

    indices
}

fn supports_vulkan_1_3(api_version: u32) -> bool {
    let major = vk::api_version_major(api_version);
    let minor = vk::api_version_minor(api_version);
    major > 1 || (major == 1 && minor >= 3)
}

fn rate_device_type(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 500,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    }
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_family_completeness() {
        let mut indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());

        indices.graphics_family = Some(0);
        assert!(!indices.is_complete());

        indices.present_family = Some(0);
        assert!(indices.is_complete());
        assert!(indices.shares_present_queue());
    }

    #[test]
    fn test_unique_families_dedups_shared_family() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(split.unique_families(), vec![0, 2]);
        assert!(!split.shares_present_queue());
    }

    #[test]
    fn test_vulkan_version_gate() {
        assert!(supports_vulkan_1_3(vk::API_VERSION_1_3));
        assert!(!supports_vulkan_1_3(vk::API_VERSION_1_2));
    }

    #[test]
    fn test_discrete_preferred_over_integrated() {
        assert!(
            rate_device_type(vk::PhysicalDeviceType::DISCRETE_GPU)
                > rate_device_type(vk::PhysicalDeviceType::INTEGRATED_GPU)
        );
    }
}
