//! Driver create/destroy dispatch
//!
//! [`ReplayDevice`] is the seam between the walker and the driver: one create
//! per resource-producing tag, one destroy. [`AshDevice`] is the real
//! implementation; tests plug in a recording stand-in.

use std::ffi::CString;
use std::sync::Arc;

use ash::extensions::khr;
use ash::vk;
use ash::vk::Handle as _;
use log::debug;

use super::instance::VulkanContext;
use super::{Handle, VulkanError, VulkanResult};
use crate::database::format::{Hash, ResourceTag};
use crate::parse::types::{
    ComputePipelineInfo, CreateInfo, DescriptorSetLayoutInfo, GraphicsPipelineInfo,
    PipelineLayoutInfo, RaytracingPipelineInfo, RenderPassInfo, SamplerInfo, ShaderModuleInfo,
    ShaderStage, SpecializationInfo,
};

/// Driver abstraction the walker drives.
///
/// `hash` identifies the entry being replayed; implementations use it for
/// diagnostics only.
pub trait ReplayDevice: Send + Sync {
    /// Create the driver object described by `info`.
    fn create(&self, tag: ResourceTag, hash: Hash, info: &CreateInfo) -> VulkanResult<Handle>;

    /// Destroy a handle previously returned by [`Self::create`].
    fn destroy(&self, tag: ResourceTag, handle: Handle);
}

/// Real driver implementation over an [`ash::Device`].
pub struct AshDevice {
    context: Arc<VulkanContext>,
    raytracing: Option<khr::RayTracingPipeline>,
}

impl AshDevice {
    /// Wrap an initialized context.
    pub fn new(context: Arc<VulkanContext>) -> Self {
        let raytracing = context.supports_raytracing().then(|| {
            khr::RayTracingPipeline::new(context.instance(), context.device())
        });
        Self {
            context,
            raytracing,
        }
    }

    fn device(&self) -> &ash::Device {
        self.context.device()
    }

    fn create_sampler(&self, info: &SamplerInfo) -> VulkanResult<Handle> {
        let create_info = vk::SamplerCreateInfo::builder()
            .flags(vk::SamplerCreateFlags::from_raw(info.flags))
            .mag_filter(vk::Filter::from_raw(info.mag_filter as i32))
            .min_filter(vk::Filter::from_raw(info.min_filter as i32))
            .mipmap_mode(vk::SamplerMipmapMode::from_raw(info.mipmap_mode as i32))
            .address_mode_u(vk::SamplerAddressMode::from_raw(info.address_mode_u as i32))
            .address_mode_v(vk::SamplerAddressMode::from_raw(info.address_mode_v as i32))
            .address_mode_w(vk::SamplerAddressMode::from_raw(info.address_mode_w as i32))
            .mip_lod_bias(info.mip_lod_bias)
            .anisotropy_enable(info.anisotropy_enable)
            .max_anisotropy(info.max_anisotropy)
            .compare_enable(info.compare_enable)
            .compare_op(vk::CompareOp::from_raw(info.compare_op as i32))
            .min_lod(info.min_lod)
            .max_lod(info.max_lod)
            .border_color(vk::BorderColor::from_raw(info.border_color as i32))
            .unnormalized_coordinates(info.unnormalized_coordinates);
        let sampler = unsafe { self.device().create_sampler(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Handle::from_raw(sampler.as_raw()))
    }

    fn create_descriptor_set_layout(
        &self,
        info: &DescriptorSetLayoutInfo,
    ) -> VulkanResult<Handle> {
        let immutable_samplers: Vec<Vec<vk::Sampler>> = info
            .bindings
            .iter()
            .map(|binding| {
                binding
                    .immutable_sampler_handles
                    .iter()
                    .map(|handle| vk::Sampler::from_raw(handle.map_or(0, Handle::raw)))
                    .collect()
            })
            .collect();
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = info
            .bindings
            .iter()
            .zip(&immutable_samplers)
            .map(|(binding, samplers)| {
                let mut builder = vk::DescriptorSetLayoutBinding::builder()
                    .binding(binding.binding)
                    .descriptor_type(vk::DescriptorType::from_raw(binding.descriptor_type as i32))
                    .descriptor_count(binding.descriptor_count)
                    .stage_flags(vk::ShaderStageFlags::from_raw(binding.stage_flags));
                if !samplers.is_empty() {
                    builder = builder.immutable_samplers(samplers);
                }
                builder.build()
            })
            .collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder()
            .flags(vk::DescriptorSetLayoutCreateFlags::from_raw(info.flags))
            .bindings(&bindings);
        let layout = unsafe {
            self.device()
                .create_descriptor_set_layout(&create_info, None)
        }
        .map_err(VulkanError::Api)?;
        Ok(Handle::from_raw(layout.as_raw()))
    }

    fn create_pipeline_layout(&self, info: &PipelineLayoutInfo) -> VulkanResult<Handle> {
        let set_layouts: Vec<vk::DescriptorSetLayout> = info
            .set_layout_handles
            .iter()
            .map(|handle| vk::DescriptorSetLayout::from_raw(handle.map_or(0, Handle::raw)))
            .collect();
        let ranges: Vec<vk::PushConstantRange> = info
            .push_constant_ranges
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::from_raw(range.stage_flags),
                offset: range.offset,
                size: range.size,
            })
            .collect();
        let create_info = vk::PipelineLayoutCreateInfo::builder()
            .flags(vk::PipelineLayoutCreateFlags::from_raw(info.flags))
            .set_layouts(&set_layouts)
            .push_constant_ranges(&ranges);
        let layout = unsafe { self.device().create_pipeline_layout(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Handle::from_raw(layout.as_raw()))
    }

    fn create_shader_module(&self, info: &ShaderModuleInfo) -> VulkanResult<Handle> {
        if info.code.len() % 4 != 0 {
            return Err(VulkanError::MisalignedShaderCode);
        }
        let words: Vec<u32> = info
            .code
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        let create_info = vk::ShaderModuleCreateInfo::builder()
            .flags(vk::ShaderModuleCreateFlags::from_raw(info.flags))
            .code(&words);
        let module = unsafe { self.device().create_shader_module(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Handle::from_raw(module.as_raw()))
    }

    fn create_render_pass(&self, info: &RenderPassInfo) -> VulkanResult<Handle> {
        fn reference(reference: &crate::parse::types::AttachmentReference) -> vk::AttachmentReference {
            vk::AttachmentReference {
                attachment: reference.attachment,
                layout: vk::ImageLayout::from_raw(reference.layout as i32),
            }
        }

        let attachments: Vec<vk::AttachmentDescription> = info
            .attachments
            .iter()
            .map(|attachment| vk::AttachmentDescription {
                flags: vk::AttachmentDescriptionFlags::from_raw(attachment.flags),
                format: vk::Format::from_raw(attachment.format as i32),
                samples: vk::SampleCountFlags::from_raw(attachment.samples),
                load_op: vk::AttachmentLoadOp::from_raw(attachment.load_op as i32),
                store_op: vk::AttachmentStoreOp::from_raw(attachment.store_op as i32),
                stencil_load_op: vk::AttachmentLoadOp::from_raw(attachment.stencil_load_op as i32),
                stencil_store_op: vk::AttachmentStoreOp::from_raw(
                    attachment.stencil_store_op as i32,
                ),
                initial_layout: vk::ImageLayout::from_raw(attachment.initial_layout as i32),
                final_layout: vk::ImageLayout::from_raw(attachment.final_layout as i32),
            })
            .collect();

        let input_refs: Vec<Vec<vk::AttachmentReference>> = info
            .subpasses
            .iter()
            .map(|subpass| subpass.input_attachments.iter().map(reference).collect())
            .collect();
        let color_refs: Vec<Vec<vk::AttachmentReference>> = info
            .subpasses
            .iter()
            .map(|subpass| subpass.color_attachments.iter().map(reference).collect())
            .collect();
        let resolve_refs: Vec<Vec<vk::AttachmentReference>> = info
            .subpasses
            .iter()
            .map(|subpass| subpass.resolve_attachments.iter().map(reference).collect())
            .collect();
        let depth_refs: Vec<Option<vk::AttachmentReference>> = info
            .subpasses
            .iter()
            .map(|subpass| subpass.depth_stencil_attachment.as_ref().map(reference))
            .collect();

        let subpasses: Vec<vk::SubpassDescription> = info
            .subpasses
            .iter()
            .enumerate()
            .map(|(index, subpass)| {
                let mut builder = vk::SubpassDescription::builder()
                    .flags(vk::SubpassDescriptionFlags::from_raw(subpass.flags))
                    .pipeline_bind_point(vk::PipelineBindPoint::from_raw(
                        subpass.pipeline_bind_point as i32,
                    ))
                    .input_attachments(&input_refs[index])
                    .color_attachments(&color_refs[index])
                    .preserve_attachments(&subpass.preserve_attachments);
                if !resolve_refs[index].is_empty() {
                    builder = builder.resolve_attachments(&resolve_refs[index]);
                }
                if let Some(depth) = &depth_refs[index] {
                    builder = builder.depth_stencil_attachment(depth);
                }
                builder.build()
            })
            .collect();

        let dependencies: Vec<vk::SubpassDependency> = info
            .dependencies
            .iter()
            .map(|dependency| vk::SubpassDependency {
                src_subpass: dependency.src_subpass,
                dst_subpass: dependency.dst_subpass,
                src_stage_mask: vk::PipelineStageFlags::from_raw(dependency.src_stage_mask),
                dst_stage_mask: vk::PipelineStageFlags::from_raw(dependency.dst_stage_mask),
                src_access_mask: vk::AccessFlags::from_raw(dependency.src_access_mask),
                dst_access_mask: vk::AccessFlags::from_raw(dependency.dst_access_mask),
                dependency_flags: vk::DependencyFlags::from_raw(dependency.dependency_flags),
            })
            .collect();

        let create_info = vk::RenderPassCreateInfo::builder()
            .flags(vk::RenderPassCreateFlags::from_raw(info.flags))
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);
        let render_pass = unsafe { self.device().create_render_pass(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Handle::from_raw(render_pass.as_raw()))
    }

    fn create_graphics_pipeline(&self, info: &GraphicsPipelineInfo) -> VulkanResult<Handle> {
        let stage_storage = StageStorage::new(&info.stages);
        let stages = stage_storage.stage_infos();

        let empty_bindings = Vec::new();
        let empty_attributes = Vec::new();
        let (vertex_bindings, vertex_attributes) = info.vertex_input.as_ref().map_or(
            (&empty_bindings, &empty_attributes),
            |state| (&state.bindings, &state.attributes),
        );
        let binding_descriptions: Vec<vk::VertexInputBindingDescription> = vertex_bindings
            .iter()
            .map(|binding| vk::VertexInputBindingDescription {
                binding: binding.binding,
                stride: binding.stride,
                input_rate: vk::VertexInputRate::from_raw(binding.input_rate as i32),
            })
            .collect();
        let attribute_descriptions: Vec<vk::VertexInputAttributeDescription> = vertex_attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: attribute.binding,
                format: vk::Format::from_raw(attribute.format as i32),
                offset: attribute.offset,
            })
            .collect();
        let vertex_input_state = info.vertex_input.as_ref().map(|state| {
            vk::PipelineVertexInputStateCreateInfo::builder()
                .flags(vk::PipelineVertexInputStateCreateFlags::from_raw(state.flags))
                .vertex_binding_descriptions(&binding_descriptions)
                .vertex_attribute_descriptions(&attribute_descriptions)
                .build()
        });

        let input_assembly_state = info.input_assembly.as_ref().map(|state| {
            vk::PipelineInputAssemblyStateCreateInfo::builder()
                .topology(vk::PrimitiveTopology::from_raw(state.topology as i32))
                .primitive_restart_enable(state.primitive_restart_enable)
                .build()
        });

        let tessellation_state = info.tessellation.as_ref().map(|state| {
            vk::PipelineTessellationStateCreateInfo::builder()
                .patch_control_points(state.patch_control_points)
                .build()
        });

        let viewport_state = info.viewport.as_ref().map(|state| {
            let mut viewport = vk::PipelineViewportStateCreateInfo::builder().build();
            // Viewports and scissors are expected to be dynamic; only the
            // counts are recorded.
            viewport.viewport_count = state.viewport_count;
            viewport.scissor_count = state.scissor_count;
            viewport
        });

        let rasterization_state = info.rasterization.as_ref().map(|state| {
            vk::PipelineRasterizationStateCreateInfo::builder()
                .depth_clamp_enable(state.depth_clamp_enable)
                .rasterizer_discard_enable(state.rasterizer_discard_enable)
                .polygon_mode(vk::PolygonMode::from_raw(state.polygon_mode as i32))
                .cull_mode(vk::CullModeFlags::from_raw(state.cull_mode))
                .front_face(vk::FrontFace::from_raw(state.front_face as i32))
                .depth_bias_enable(state.depth_bias_enable)
                .depth_bias_constant_factor(state.depth_bias_constant_factor)
                .depth_bias_clamp(state.depth_bias_clamp)
                .depth_bias_slope_factor(state.depth_bias_slope_factor)
                .line_width(state.line_width)
                .build()
        });

        let multisample_state = info.multisample.as_ref().map(|state| {
            let mut builder = vk::PipelineMultisampleStateCreateInfo::builder()
                .rasterization_samples(vk::SampleCountFlags::from_raw(
                    state.rasterization_samples,
                ))
                .sample_shading_enable(state.sample_shading_enable)
                .min_sample_shading(state.min_sample_shading)
                .alpha_to_coverage_enable(state.alpha_to_coverage_enable)
                .alpha_to_one_enable(state.alpha_to_one_enable);
            if !state.sample_mask.is_empty() {
                builder = builder.sample_mask(&state.sample_mask);
            }
            builder.build()
        });

        fn stencil_op(state: &crate::parse::types::StencilOpState) -> vk::StencilOpState {
            vk::StencilOpState {
                fail_op: vk::StencilOp::from_raw(state.fail_op as i32),
                pass_op: vk::StencilOp::from_raw(state.pass_op as i32),
                depth_fail_op: vk::StencilOp::from_raw(state.depth_fail_op as i32),
                compare_op: vk::CompareOp::from_raw(state.compare_op as i32),
                compare_mask: state.compare_mask,
                write_mask: state.write_mask,
                reference: state.reference,
            }
        }

        let depth_stencil_state = info.depth_stencil.as_ref().map(|state| {
            vk::PipelineDepthStencilStateCreateInfo::builder()
                .depth_test_enable(state.depth_test_enable)
                .depth_write_enable(state.depth_write_enable)
                .depth_compare_op(vk::CompareOp::from_raw(state.depth_compare_op as i32))
                .depth_bounds_test_enable(state.depth_bounds_test_enable)
                .stencil_test_enable(state.stencil_test_enable)
                .front(stencil_op(&state.front))
                .back(stencil_op(&state.back))
                .min_depth_bounds(state.min_depth_bounds)
                .max_depth_bounds(state.max_depth_bounds)
                .build()
        });

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = info
            .color_blend
            .as_ref()
            .map(|state| {
                state
                    .attachments
                    .iter()
                    .map(|attachment| vk::PipelineColorBlendAttachmentState {
                        blend_enable: attachment.blend_enable.into(),
                        src_color_blend_factor: vk::BlendFactor::from_raw(
                            attachment.src_color_blend_factor as i32,
                        ),
                        dst_color_blend_factor: vk::BlendFactor::from_raw(
                            attachment.dst_color_blend_factor as i32,
                        ),
                        color_blend_op: vk::BlendOp::from_raw(attachment.color_blend_op as i32),
                        src_alpha_blend_factor: vk::BlendFactor::from_raw(
                            attachment.src_alpha_blend_factor as i32,
                        ),
                        dst_alpha_blend_factor: vk::BlendFactor::from_raw(
                            attachment.dst_alpha_blend_factor as i32,
                        ),
                        alpha_blend_op: vk::BlendOp::from_raw(attachment.alpha_blend_op as i32),
                        color_write_mask: vk::ColorComponentFlags::from_raw(
                            attachment.color_write_mask,
                        ),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let color_blend_state = info.color_blend.as_ref().map(|state| {
            vk::PipelineColorBlendStateCreateInfo::builder()
                .flags(vk::PipelineColorBlendStateCreateFlags::from_raw(state.flags))
                .logic_op_enable(state.logic_op_enable)
                .logic_op(vk::LogicOp::from_raw(state.logic_op as i32))
                .attachments(&blend_attachments)
                .blend_constants(state.blend_constants)
                .build()
        });

        let dynamic_states: Vec<vk::DynamicState> = info
            .dynamic_state
            .iter()
            .map(|&state| vk::DynamicState::from_raw(state as i32))
            .collect();
        let dynamic_state = (!dynamic_states.is_empty()).then(|| {
            vk::PipelineDynamicStateCreateInfo::builder()
                .dynamic_states(&dynamic_states)
                .build()
        });

        let mut create_info = vk::GraphicsPipelineCreateInfo::builder()
            .flags(vk::PipelineCreateFlags::from_raw(info.flags))
            .stages(&stages)
            .layout(vk::PipelineLayout::from_raw(
                info.layout_handle.map_or(0, Handle::raw),
            ))
            .render_pass(vk::RenderPass::from_raw(
                info.render_pass_handle.map_or(0, Handle::raw),
            ))
            .subpass(info.subpass)
            .build();
        if let Some(state) = &vertex_input_state {
            create_info.p_vertex_input_state = state;
        }
        if let Some(state) = &input_assembly_state {
            create_info.p_input_assembly_state = state;
        }
        if let Some(state) = &tessellation_state {
            create_info.p_tessellation_state = state;
        }
        if let Some(state) = &viewport_state {
            create_info.p_viewport_state = state;
        }
        if let Some(state) = &rasterization_state {
            create_info.p_rasterization_state = state;
        }
        if let Some(state) = &multisample_state {
            create_info.p_multisample_state = state;
        }
        if let Some(state) = &depth_stencil_state {
            create_info.p_depth_stencil_state = state;
        }
        if let Some(state) = &color_blend_state {
            create_info.p_color_blend_state = state;
        }
        if let Some(state) = &dynamic_state {
            create_info.p_dynamic_state = state;
        }
        create_info.base_pipeline_handle =
            vk::Pipeline::from_raw(info.base_pipeline_handle.map_or(0, Handle::raw));
        create_info.base_pipeline_index = -1;

        let pipelines = unsafe {
            self.device().create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[create_info],
                None,
            )
        }
        .map_err(|(_, err)| VulkanError::Api(err))?;
        Ok(Handle::from_raw(pipelines[0].as_raw()))
    }

    fn create_compute_pipeline(&self, info: &ComputePipelineInfo) -> VulkanResult<Handle> {
        let stages = [info.stage.clone()];
        let stage_storage = StageStorage::new(&stages);
        let stage_infos = stage_storage.stage_infos();

        let mut create_info = vk::ComputePipelineCreateInfo::builder()
            .flags(vk::PipelineCreateFlags::from_raw(info.flags))
            .stage(stage_infos[0])
            .layout(vk::PipelineLayout::from_raw(
                info.layout_handle.map_or(0, Handle::raw),
            ))
            .build();
        create_info.base_pipeline_handle =
            vk::Pipeline::from_raw(info.base_pipeline_handle.map_or(0, Handle::raw));
        create_info.base_pipeline_index = -1;

        let pipelines = unsafe {
            self.device().create_compute_pipelines(
                vk::PipelineCache::null(),
                &[create_info],
                None,
            )
        }
        .map_err(|(_, err)| VulkanError::Api(err))?;
        Ok(Handle::from_raw(pipelines[0].as_raw()))
    }

    fn create_raytracing_pipeline(&self, info: &RaytracingPipelineInfo) -> VulkanResult<Handle> {
        let loader = self
            .raytracing
            .as_ref()
            .ok_or(VulkanError::RayTracingUnsupported)?;

        let stage_storage = StageStorage::new(&info.stages);
        let stages = stage_storage.stage_infos();

        let groups: Vec<vk::RayTracingShaderGroupCreateInfoKHR> = info
            .groups
            .iter()
            .map(|group| {
                vk::RayTracingShaderGroupCreateInfoKHR::builder()
                    .ty(vk::RayTracingShaderGroupTypeKHR::from_raw(
                        group.group_type as i32,
                    ))
                    .general_shader(group.general_shader)
                    .closest_hit_shader(group.closest_hit_shader)
                    .any_hit_shader(group.any_hit_shader)
                    .intersection_shader(group.intersection_shader)
                    .build()
            })
            .collect();

        let mut create_info = vk::RayTracingPipelineCreateInfoKHR::builder()
            .flags(vk::PipelineCreateFlags::from_raw(info.flags))
            .stages(&stages)
            .groups(&groups)
            .max_pipeline_ray_recursion_depth(info.max_pipeline_ray_recursion_depth)
            .layout(vk::PipelineLayout::from_raw(
                info.layout_handle.map_or(0, Handle::raw),
            ))
            .build();
        create_info.base_pipeline_handle =
            vk::Pipeline::from_raw(info.base_pipeline_handle.map_or(0, Handle::raw));
        create_info.base_pipeline_index = -1;

        let pipelines = unsafe {
            loader.create_ray_tracing_pipelines(
                vk::DeferredOperationKHR::null(),
                vk::PipelineCache::null(),
                &[create_info],
                None,
            )
        }
        .map_err(VulkanError::Api)?;
        Ok(Handle::from_raw(pipelines[0].as_raw()))
    }
}

/// Keeps entry-point names and specialization data alive while the borrowed
/// `vk::PipelineShaderStageCreateInfo` structs are in flight.
struct StageStorage {
    names: Vec<CString>,
    modules: Vec<vk::ShaderModule>,
    stage_flags: Vec<vk::ShaderStageFlags>,
    // Referenced by pointers inside spec_infos; must outlive the driver call.
    _spec_entries: Vec<Vec<vk::SpecializationMapEntry>>,
    _spec_data: Vec<Vec<u8>>,
    spec_infos: Vec<Option<vk::SpecializationInfo>>,
}

impl StageStorage {
    fn new(stages: &[ShaderStage]) -> Self {
        let names: Vec<CString> = stages
            .iter()
            .map(|stage| {
                CString::new(stage.name.replace('\0', "")).unwrap_or_default()
            })
            .collect();
        let modules: Vec<vk::ShaderModule> = stages
            .iter()
            .map(|stage| vk::ShaderModule::from_raw(stage.module_handle.map_or(0, Handle::raw)))
            .collect();
        let stage_flags: Vec<vk::ShaderStageFlags> = stages
            .iter()
            .map(|stage| vk::ShaderStageFlags::from_raw(stage.stage))
            .collect();
        let spec_entries: Vec<Vec<vk::SpecializationMapEntry>> = stages
            .iter()
            .map(|stage| {
                stage.specialization.as_ref().map_or_else(Vec::new, |spec| {
                    spec.map_entries
                        .iter()
                        .map(|entry| vk::SpecializationMapEntry {
                            constant_id: entry.constant_id,
                            offset: entry.offset,
                            size: entry.size as usize,
                        })
                        .collect()
                })
            })
            .collect();
        let spec_data: Vec<Vec<u8>> = stages
            .iter()
            .map(|stage| {
                stage
                    .specialization
                    .as_ref()
                    .map_or_else(Vec::new, |spec: &SpecializationInfo| spec.data.clone())
            })
            .collect();
        let spec_infos: Vec<Option<vk::SpecializationInfo>> = stages
            .iter()
            .enumerate()
            .map(|(index, stage)| {
                stage.specialization.as_ref().map(|_| {
                    vk::SpecializationInfo::builder()
                        .map_entries(&spec_entries[index])
                        .data(&spec_data[index])
                        .build()
                })
            })
            .collect();
        Self {
            names,
            modules,
            stage_flags,
            _spec_entries: spec_entries,
            _spec_data: spec_data,
            spec_infos,
        }
    }

    fn stage_infos(&self) -> Vec<vk::PipelineShaderStageCreateInfo> {
        (0..self.names.len())
            .map(|index| {
                let mut builder = vk::PipelineShaderStageCreateInfo::builder()
                    .stage(self.stage_flags[index])
                    .module(self.modules[index])
                    .name(&self.names[index]);
                if let Some(spec) = &self.spec_infos[index] {
                    builder = builder.specialization_info(spec);
                }
                builder.build()
            })
            .collect()
    }
}

impl ReplayDevice for AshDevice {
    fn create(&self, tag: ResourceTag, hash: Hash, info: &CreateInfo) -> VulkanResult<Handle> {
        debug_assert!(tag.produces_handle(), "create called for {tag:?}");
        let result = match info {
            CreateInfo::Sampler(info) => self.create_sampler(info),
            CreateInfo::DescriptorSetLayout(info) => self.create_descriptor_set_layout(info),
            CreateInfo::PipelineLayout(info) => self.create_pipeline_layout(info),
            CreateInfo::ShaderModule(info) => self.create_shader_module(info),
            CreateInfo::RenderPass(info) => self.create_render_pass(info),
            CreateInfo::GraphicsPipeline(info) => self.create_graphics_pipeline(info),
            CreateInfo::ComputePipeline(info) => self.create_compute_pipeline(info),
            CreateInfo::RaytracingPipeline(info) => self.create_raytracing_pipeline(info),
            CreateInfo::ApplicationInfo(_) => {
                Err(VulkanError::Api(vk::Result::ERROR_INITIALIZATION_FAILED))
            }
        };
        if let Err(err) = &result {
            debug!("driver rejected {tag:?} {hash}: {err}");
        }
        result
    }

    fn destroy(&self, tag: ResourceTag, handle: Handle) {
        let device = self.device();
        unsafe {
            match tag {
                ResourceTag::Sampler => {
                    device.destroy_sampler(vk::Sampler::from_raw(handle.raw()), None);
                }
                ResourceTag::DescriptorSetLayout => {
                    device.destroy_descriptor_set_layout(
                        vk::DescriptorSetLayout::from_raw(handle.raw()),
                        None,
                    );
                }
                ResourceTag::PipelineLayout => {
                    device
                        .destroy_pipeline_layout(vk::PipelineLayout::from_raw(handle.raw()), None);
                }
                ResourceTag::ShaderModule => {
                    device.destroy_shader_module(vk::ShaderModule::from_raw(handle.raw()), None);
                }
                ResourceTag::RenderPass => {
                    device.destroy_render_pass(vk::RenderPass::from_raw(handle.raw()), None);
                }
                ResourceTag::GraphicsPipeline
                | ResourceTag::ComputePipeline
                | ResourceTag::RaytracingPipeline => {
                    device.destroy_pipeline(vk::Pipeline::from_raw(handle.raw()), None);
                }
                ResourceTag::ApplicationInfo | ResourceTag::ApplicationBlobLink => {}
            }
        }
    }
}
