//! Vulkan instance and device bring-up
//!
//! Headless initialization: no surface, no swapchain. The replay needs one
//! queue family capable of graphics or compute so the driver accepts pipeline
//! creation, and optionally the ray-tracing extension chain.

use std::ffi::{CStr, CString};

use ash::extensions::khr;
use ash::vk;
use log::{debug, info, warn};

use super::{VulkanError, VulkanResult};
use crate::parse::ApplicationInfo;

/// Instance and device selection options.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Enable the Khronos validation layer.
    pub enable_validation: bool,
    /// Physical device index to replay on.
    pub device_index: usize,
}

/// An initialized Vulkan instance plus logical device.
pub struct VulkanContext {
    entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    supports_raytracing: bool,
}

fn cstring_lossy(text: &str) -> CString {
    CString::new(text.replace('\0', "")).unwrap_or_default()
}

fn ray_tracing_extensions() -> [&'static CStr; 3] {
    [
        khr::RayTracingPipeline::name(),
        khr::AccelerationStructure::name(),
        khr::DeferredHostOperations::name(),
    ]
}

impl VulkanContext {
    /// Create the instance, select a physical device, and create the logical
    /// device used for replay.
    pub fn new(options: &ContextOptions, app: Option<&ApplicationInfo>) -> VulkanResult<Self> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|err| VulkanError::EntryLoad(format!("{err:?}")))?;

        let app_name = cstring_lossy(
            app.map_or("glacier-replay", |info| info.application_name.as_str()),
        );
        let engine_name = cstring_lossy(app.map_or("glacier", |info| info.engine_name.as_str()));
        let api_version = app
            .map(|info| info.api_version)
            .filter(|&version| version != 0)
            .unwrap_or(vk::API_VERSION_1_1);
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(app.map_or(0, |info| info.application_version))
            .engine_name(&engine_name)
            .engine_version(app.map_or(0, |info| info.engine_version))
            .api_version(api_version);

        let layer_names = if options.enable_validation {
            vec![cstring_lossy("VK_LAYER_KHRONOS_validation")]
        } else {
            Vec::new()
        };
        let layer_pointers: Vec<*const i8> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let instance_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layer_pointers);
        let instance = unsafe { entry.create_instance(&instance_info, None) }
            .map_err(VulkanError::Api)?;

        let physical_devices =
            unsafe { instance.enumerate_physical_devices() }.map_err(VulkanError::Api)?;
        let physical_device = physical_devices
            .get(options.device_index)
            .copied()
            .ok_or(VulkanError::NoSuchDevice {
                index: options.device_index,
                available: physical_devices.len(),
            })?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        info!(
            "replaying on device {} ({})",
            device_name.to_string_lossy(),
            options.device_index
        );

        let queue_family = Self::find_queue_family(&instance, physical_device)?;
        let supports_raytracing = Self::detect_raytracing_support(&instance, physical_device);
        if !supports_raytracing {
            debug!("ray tracing extensions unavailable, ray-tracing pipelines will fail");
        }

        let queue_priorities = [1.0f32];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities)
            .build()];

        let extension_pointers: Vec<*const i8> = if supports_raytracing {
            ray_tracing_extensions()
                .iter()
                .map(|name| name.as_ptr())
                .collect()
        } else {
            Vec::new()
        };

        let mut buffer_device_address =
            vk::PhysicalDeviceBufferDeviceAddressFeatures::builder().buffer_device_address(true);
        let mut acceleration_structure =
            vk::PhysicalDeviceAccelerationStructureFeaturesKHR::builder()
                .acceleration_structure(true);
        let mut ray_tracing_pipeline = vk::PhysicalDeviceRayTracingPipelineFeaturesKHR::builder()
            .ray_tracing_pipeline(true);

        let mut device_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_pointers);
        if supports_raytracing {
            device_info = device_info
                .push_next(&mut buffer_device_address)
                .push_next(&mut acceleration_structure)
                .push_next(&mut ray_tracing_pipeline);
        }

        let device = unsafe { instance.create_device(physical_device, &device_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(Self {
            entry,
            instance,
            physical_device,
            device,
            supports_raytracing,
        })
    }

    fn find_queue_family(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> VulkanResult<u32> {
        let families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        families
            .iter()
            .position(|family| {
                family
                    .queue_flags
                    .intersects(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
            })
            .map(|index| index as u32)
            .ok_or(VulkanError::NoQueueFamily)
    }

    fn detect_raytracing_support(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> bool {
        let extensions =
            match unsafe { instance.enumerate_device_extension_properties(physical_device) } {
                Ok(extensions) => extensions,
                Err(err) => {
                    warn!("could not enumerate device extensions: {err:?}");
                    return false;
                }
            };
        ray_tracing_extensions().iter().all(|wanted| {
            extensions.iter().any(|ext| {
                let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
                name == *wanted
            })
        })
    }

    /// Loader entry points.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// The instance.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// The selected physical device.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The logical device used for all create and destroy calls.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// True when the ray-tracing extension chain was enabled.
    pub fn supports_raytracing(&self) -> bool {
        self.supports_raytracing
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
