//! Owned create-info descriptions decoded from payloads
//!
//! Vulkan enums and flag sets are carried as their raw numeric values; the
//! driver layer converts them when it builds the real `vk` structs. Fields
//! named `*_handle` are never part of the payload: they are patched in by the
//! walker once the referenced dependency has been created.

// Field names mirror the Vulkan structs they describe.
#![allow(missing_docs)]

use serde::{Deserialize, Deserializer};

use crate::database::format::{Hash, ResourceTag};
use crate::vulkan::Handle;

/// A parsed create-info, discriminated by entry tag.
#[derive(Debug, Clone)]
pub enum CreateInfo {
    /// Recording application identity.
    ApplicationInfo(ApplicationInfo),
    /// `VkSamplerCreateInfo` contents.
    Sampler(SamplerInfo),
    /// `VkDescriptorSetLayoutCreateInfo` contents.
    DescriptorSetLayout(DescriptorSetLayoutInfo),
    /// `VkPipelineLayoutCreateInfo` contents.
    PipelineLayout(PipelineLayoutInfo),
    /// `VkShaderModuleCreateInfo` contents.
    ShaderModule(ShaderModuleInfo),
    /// `VkRenderPassCreateInfo` contents.
    RenderPass(RenderPassInfo),
    /// `VkGraphicsPipelineCreateInfo` contents.
    GraphicsPipeline(GraphicsPipelineInfo),
    /// `VkComputePipelineCreateInfo` contents.
    ComputePipeline(ComputePipelineInfo),
    /// `VkRayTracingPipelineCreateInfoKHR` contents.
    RaytracingPipeline(RaytracingPipelineInfo),
}

/// A location inside a parent create-info that receives a dependency handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleSlot {
    /// The pipeline layout of a pipeline.
    PipelineLayout,
    /// The render pass of a graphics pipeline.
    RenderPass,
    /// The parent of a derived pipeline.
    BasePipeline,
    /// The module of shader stage `0`-indexed `usize`.
    ShaderStage(usize),
    /// Set layout at this index of a pipeline layout.
    SetLayout(usize),
    /// Immutable sampler at (binding index, sampler index) of a set layout.
    ImmutableSampler {
        /// Index into the layout's binding list.
        binding: usize,
        /// Index into that binding's sampler list.
        sampler: usize,
    },
}

/// A dependency edge recorded at parse time.
#[derive(Debug, Clone, Copy)]
pub struct DepRef {
    /// Tag of the referenced entry.
    pub tag: ResourceTag,
    /// Hash of the referenced entry.
    pub hash: Hash,
    /// Where the dependency's handle gets patched into the parent.
    pub slot: HandleSlot,
}

impl CreateInfo {
    /// Tag this create-info belongs to.
    pub fn tag(&self) -> ResourceTag {
        match self {
            Self::ApplicationInfo(_) => ResourceTag::ApplicationInfo,
            Self::Sampler(_) => ResourceTag::Sampler,
            Self::DescriptorSetLayout(_) => ResourceTag::DescriptorSetLayout,
            Self::PipelineLayout(_) => ResourceTag::PipelineLayout,
            Self::ShaderModule(_) => ResourceTag::ShaderModule,
            Self::RenderPass(_) => ResourceTag::RenderPass,
            Self::GraphicsPipeline(_) => ResourceTag::GraphicsPipeline,
            Self::ComputePipeline(_) => ResourceTag::ComputePipeline,
            Self::RaytracingPipeline(_) => ResourceTag::RaytracingPipeline,
        }
    }

    /// Write a dependency handle into `slot`. Returns false when the slot
    /// does not exist in this create-info kind.
    pub fn patch_handle(&mut self, slot: HandleSlot, handle: Handle) -> bool {
        match (self, slot) {
            (Self::DescriptorSetLayout(info), HandleSlot::ImmutableSampler { binding, sampler }) => {
                match info
                    .bindings
                    .get_mut(binding)
                    .and_then(|b| b.immutable_sampler_handles.get_mut(sampler))
                {
                    Some(slot) => {
                        *slot = Some(handle);
                        true
                    }
                    None => false,
                }
            }
            (Self::PipelineLayout(info), HandleSlot::SetLayout(index)) => {
                match info.set_layout_handles.get_mut(index) {
                    Some(slot) => {
                        *slot = Some(handle);
                        true
                    }
                    None => false,
                }
            }
            (Self::GraphicsPipeline(info), HandleSlot::PipelineLayout) => {
                info.layout_handle = Some(handle);
                true
            }
            (Self::GraphicsPipeline(info), HandleSlot::RenderPass) => {
                info.render_pass_handle = Some(handle);
                true
            }
            (Self::GraphicsPipeline(info), HandleSlot::BasePipeline) => {
                info.base_pipeline_handle = Some(handle);
                true
            }
            (Self::GraphicsPipeline(info), HandleSlot::ShaderStage(index)) => {
                match info.stages.get_mut(index) {
                    Some(stage) => {
                        stage.module_handle = Some(handle);
                        true
                    }
                    None => false,
                }
            }
            (Self::ComputePipeline(info), HandleSlot::PipelineLayout) => {
                info.layout_handle = Some(handle);
                true
            }
            (Self::ComputePipeline(info), HandleSlot::BasePipeline) => {
                info.base_pipeline_handle = Some(handle);
                true
            }
            (Self::ComputePipeline(info), HandleSlot::ShaderStage(0)) => {
                info.stage.module_handle = Some(handle);
                true
            }
            (Self::RaytracingPipeline(info), HandleSlot::PipelineLayout) => {
                info.layout_handle = Some(handle);
                true
            }
            (Self::RaytracingPipeline(info), HandleSlot::BasePipeline) => {
                info.base_pipeline_handle = Some(handle);
                true
            }
            (Self::RaytracingPipeline(info), HandleSlot::ShaderStage(index)) => {
                match info.stages.get_mut(index) {
                    Some(stage) => {
                        stage.module_handle = Some(handle);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }
}

fn deserialize_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    use base64::Engine as _;
    let text = String::deserialize(deserializer)?;
    base64::engine::general_purpose::STANDARD
        .decode(text.as_bytes())
        .map_err(serde::de::Error::custom)
}

/// Identity of the application that recorded the database.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationInfo {
    /// `VkApplicationInfo::pApplicationName`.
    pub application_name: String,
    /// `VkApplicationInfo::pEngineName`.
    pub engine_name: String,
    /// `VkApplicationInfo::applicationVersion`.
    pub application_version: u32,
    /// `VkApplicationInfo::engineVersion`.
    pub engine_version: u32,
    /// `VkApplicationInfo::apiVersion`.
    pub api_version: u32,
}

/// `VkSamplerCreateInfo` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplerInfo {
    pub flags: u32,
    pub mag_filter: u32,
    pub min_filter: u32,
    pub mipmap_mode: u32,
    pub address_mode_u: u32,
    pub address_mode_v: u32,
    pub address_mode_w: u32,
    pub mip_lod_bias: f32,
    pub anisotropy_enable: bool,
    pub max_anisotropy: f32,
    pub compare_enable: bool,
    pub compare_op: u32,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: u32,
    pub unnormalized_coordinates: bool,
}

/// One binding of a descriptor set layout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: u32,
    pub descriptor_count: u32,
    pub stage_flags: u32,
    /// Sampler entry hashes; `0` marks an externally provided sampler.
    pub immutable_samplers: Vec<Hash>,
    /// Patched sampler handles, index-aligned with `immutable_samplers`.
    #[serde(skip)]
    pub immutable_sampler_handles: Vec<Option<Handle>>,
}

/// `VkDescriptorSetLayoutCreateInfo` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DescriptorSetLayoutInfo {
    pub flags: u32,
    pub bindings: Vec<DescriptorSetLayoutBinding>,
}

/// `VkPushConstantRange` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushConstantRange {
    pub stage_flags: u32,
    pub offset: u32,
    pub size: u32,
}

/// `VkPipelineLayoutCreateInfo` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineLayoutInfo {
    pub flags: u32,
    /// Set layout hashes; `0` produces a null set layout.
    pub set_layouts: Vec<Hash>,
    pub push_constant_ranges: Vec<PushConstantRange>,
    /// Patched set layout handles, index-aligned with `set_layouts`.
    #[serde(skip)]
    pub set_layout_handles: Vec<Option<Handle>>,
}

/// `VkShaderModuleCreateInfo` fields; SPIR-V code travels as base64.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShaderModuleInfo {
    pub flags: u32,
    #[serde(deserialize_with = "deserialize_base64")]
    pub code: Vec<u8>,
}

/// `VkAttachmentDescription` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachmentDescription {
    pub flags: u32,
    pub format: u32,
    pub samples: u32,
    pub load_op: u32,
    pub store_op: u32,
    pub stencil_load_op: u32,
    pub stencil_store_op: u32,
    pub initial_layout: u32,
    pub final_layout: u32,
}

/// `VkAttachmentReference` fields; `attachment` may be `0xffffffff` (unused).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachmentReference {
    pub attachment: u32,
    pub layout: u32,
}

/// `VkSubpassDescription` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubpassDescription {
    pub flags: u32,
    pub pipeline_bind_point: u32,
    pub input_attachments: Vec<AttachmentReference>,
    pub color_attachments: Vec<AttachmentReference>,
    pub resolve_attachments: Vec<AttachmentReference>,
    pub depth_stencil_attachment: Option<AttachmentReference>,
    pub preserve_attachments: Vec<u32>,
}

/// `VkSubpassDependency` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubpassDependency {
    pub src_subpass: u32,
    pub dst_subpass: u32,
    pub src_stage_mask: u32,
    pub dst_stage_mask: u32,
    pub src_access_mask: u32,
    pub dst_access_mask: u32,
    pub dependency_flags: u32,
}

/// `VkRenderPassCreateInfo` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderPassInfo {
    pub flags: u32,
    pub attachments: Vec<AttachmentDescription>,
    pub subpasses: Vec<SubpassDescription>,
    pub dependencies: Vec<SubpassDependency>,
}

/// One `VkSpecializationMapEntry`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecializationMapEntry {
    pub constant_id: u32,
    pub offset: u32,
    pub size: u32,
}

/// `VkSpecializationInfo` fields; data travels as base64.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecializationInfo {
    pub map_entries: Vec<SpecializationMapEntry>,
    #[serde(deserialize_with = "deserialize_base64")]
    pub data: Vec<u8>,
}

/// `VkPipelineShaderStageCreateInfo` fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderStage {
    /// `VkShaderStageFlagBits` of this stage.
    #[serde(default)]
    pub stage: u32,
    /// Shader module entry hash.
    pub module: Hash,
    /// Entry point name.
    #[serde(default = "ShaderStage::default_name")]
    pub name: String,
    /// Optional specialization constants.
    #[serde(default)]
    pub specialization: Option<SpecializationInfo>,
    /// Patched module handle.
    #[serde(skip)]
    pub module_handle: Option<Handle>,
}

impl ShaderStage {
    fn default_name() -> String {
        "main".to_owned()
    }
}

/// `VkPipelineVertexInputStateCreateInfo` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VertexInputState {
    pub flags: u32,
    pub bindings: Vec<VertexInputBinding>,
    pub attributes: Vec<VertexInputAttribute>,
}

/// One `VkVertexInputBindingDescription`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VertexInputBinding {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: u32,
}

/// One `VkVertexInputAttributeDescription`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VertexInputAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: u32,
    pub offset: u32,
}

/// `VkPipelineInputAssemblyStateCreateInfo` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputAssemblyState {
    pub flags: u32,
    pub topology: u32,
    pub primitive_restart_enable: bool,
}

/// `VkPipelineTessellationStateCreateInfo` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TessellationState {
    pub patch_control_points: u32,
}

/// `VkPipelineViewportStateCreateInfo` counts; the viewports themselves are
/// dynamic state in practice.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewportState {
    pub viewport_count: u32,
    pub scissor_count: u32,
}

/// `VkPipelineRasterizationStateCreateInfo` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RasterizationState {
    pub depth_clamp_enable: bool,
    pub rasterizer_discard_enable: bool,
    pub polygon_mode: u32,
    pub cull_mode: u32,
    pub front_face: u32,
    pub depth_bias_enable: bool,
    pub depth_bias_constant_factor: f32,
    pub depth_bias_clamp: f32,
    pub depth_bias_slope_factor: f32,
    pub line_width: f32,
}

/// `VkPipelineMultisampleStateCreateInfo` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MultisampleState {
    pub rasterization_samples: u32,
    pub sample_shading_enable: bool,
    pub min_sample_shading: f32,
    pub sample_mask: Vec<u32>,
    pub alpha_to_coverage_enable: bool,
    pub alpha_to_one_enable: bool,
}

/// `VkStencilOpState` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StencilOpState {
    pub fail_op: u32,
    pub pass_op: u32,
    pub depth_fail_op: u32,
    pub compare_op: u32,
    pub compare_mask: u32,
    pub write_mask: u32,
    pub reference: u32,
}

/// `VkPipelineDepthStencilStateCreateInfo` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: u32,
    pub depth_bounds_test_enable: bool,
    pub stencil_test_enable: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
    pub min_depth_bounds: f32,
    pub max_depth_bounds: f32,
}

/// One `VkPipelineColorBlendAttachmentState`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorBlendAttachment {
    pub blend_enable: bool,
    pub src_color_blend_factor: u32,
    pub dst_color_blend_factor: u32,
    pub color_blend_op: u32,
    pub src_alpha_blend_factor: u32,
    pub dst_alpha_blend_factor: u32,
    pub alpha_blend_op: u32,
    pub color_write_mask: u32,
}

/// `VkPipelineColorBlendStateCreateInfo` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorBlendState {
    pub flags: u32,
    pub logic_op_enable: bool,
    pub logic_op: u32,
    pub attachments: Vec<ColorBlendAttachment>,
    pub blend_constants: [f32; 4],
}

/// `VkGraphicsPipelineCreateInfo` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphicsPipelineInfo {
    pub flags: u32,
    /// Pipeline layout entry hash.
    pub layout: Hash,
    /// Render pass entry hash; `0` means none (dynamic rendering).
    pub render_pass: Hash,
    pub subpass: u32,
    /// Parent pipeline entry hash for derived pipelines; `0` means none.
    pub base_pipeline: Hash,
    pub stages: Vec<ShaderStage>,
    pub vertex_input: Option<VertexInputState>,
    pub input_assembly: Option<InputAssemblyState>,
    pub tessellation: Option<TessellationState>,
    pub viewport: Option<ViewportState>,
    pub rasterization: Option<RasterizationState>,
    pub multisample: Option<MultisampleState>,
    pub depth_stencil: Option<DepthStencilState>,
    pub color_blend: Option<ColorBlendState>,
    pub dynamic_state: Vec<u32>,
    #[serde(skip)]
    pub layout_handle: Option<Handle>,
    #[serde(skip)]
    pub render_pass_handle: Option<Handle>,
    #[serde(skip)]
    pub base_pipeline_handle: Option<Handle>,
}

/// `VkComputePipelineCreateInfo` fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputePipelineInfo {
    #[serde(default)]
    pub flags: u32,
    /// Pipeline layout entry hash.
    #[serde(default)]
    pub layout: Hash,
    /// The single compute stage.
    pub stage: ShaderStage,
    /// Parent pipeline entry hash for derived pipelines; `0` means none.
    #[serde(default)]
    pub base_pipeline: Hash,
    #[serde(skip)]
    pub layout_handle: Option<Handle>,
    #[serde(skip)]
    pub base_pipeline_handle: Option<Handle>,
}

fn shader_unused() -> u32 {
    u32::MAX
}

/// One `VkRayTracingShaderGroupCreateInfoKHR`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RayTracingShaderGroup {
    #[serde(rename = "type", default)]
    pub group_type: u32,
    #[serde(default = "shader_unused")]
    pub general_shader: u32,
    #[serde(default = "shader_unused")]
    pub closest_hit_shader: u32,
    #[serde(default = "shader_unused")]
    pub any_hit_shader: u32,
    #[serde(default = "shader_unused")]
    pub intersection_shader: u32,
}

/// `VkRayTracingPipelineCreateInfoKHR` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RaytracingPipelineInfo {
    pub flags: u32,
    /// Pipeline layout entry hash.
    pub layout: Hash,
    pub stages: Vec<ShaderStage>,
    pub groups: Vec<RayTracingShaderGroup>,
    pub max_pipeline_ray_recursion_depth: u32,
    /// Parent pipeline entry hash for derived pipelines; `0` means none.
    pub base_pipeline: Hash,
    #[serde(skip)]
    pub layout_handle: Option<Handle>,
    #[serde(skip)]
    pub base_pipeline_handle: Option<Handle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_graphics_slots() {
        let mut info = CreateInfo::GraphicsPipeline(GraphicsPipelineInfo {
            stages: vec![
                ShaderStage {
                    stage: 1,
                    module: Hash(10),
                    name: "main".to_owned(),
                    specialization: None,
                    module_handle: None,
                },
                ShaderStage {
                    stage: 16,
                    module: Hash(11),
                    name: "main".to_owned(),
                    specialization: None,
                    module_handle: None,
                },
            ],
            ..GraphicsPipelineInfo::default()
        });

        assert!(info.patch_handle(HandleSlot::PipelineLayout, Handle::from_raw(1)));
        assert!(info.patch_handle(HandleSlot::RenderPass, Handle::from_raw(2)));
        assert!(info.patch_handle(HandleSlot::ShaderStage(1), Handle::from_raw(3)));
        assert!(!info.patch_handle(HandleSlot::ShaderStage(2), Handle::from_raw(4)));
        assert!(!info.patch_handle(HandleSlot::SetLayout(0), Handle::from_raw(5)));

        let CreateInfo::GraphicsPipeline(info) = info else {
            unreachable!()
        };
        assert_eq!(info.layout_handle, Some(Handle::from_raw(1)));
        assert_eq!(info.render_pass_handle, Some(Handle::from_raw(2)));
        assert_eq!(info.stages[0].module_handle, None);
        assert_eq!(info.stages[1].module_handle, Some(Handle::from_raw(3)));
    }

    #[test]
    fn test_patch_set_layout_slots() {
        let mut info = CreateInfo::PipelineLayout(PipelineLayoutInfo {
            set_layouts: vec![Hash(1), Hash(2)],
            set_layout_handles: vec![None, None],
            ..PipelineLayoutInfo::default()
        });
        assert!(info.patch_handle(HandleSlot::SetLayout(1), Handle::from_raw(9)));
        assert!(!info.patch_handle(HandleSlot::SetLayout(2), Handle::from_raw(9)));
        let CreateInfo::PipelineLayout(info) = info else {
            unreachable!()
        };
        assert_eq!(info.set_layout_handles, vec![None, Some(Handle::from_raw(9))]);
    }
}
