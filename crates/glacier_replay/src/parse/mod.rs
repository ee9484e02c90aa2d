//! Payload decoding
//!
//! Every payload is a JSON object with a `version`/`hash` envelope followed
//! by the tag-specific body. Decoding yields the owned create-info plus the
//! dependency edges the walker needs to replay the entry.

pub mod types;

use serde_json::Value;
use thiserror::Error;

use crate::database::format::{Hash, ResourceTag};

pub use types::{
    ApplicationInfo, ComputePipelineInfo, CreateInfo, DepRef, DescriptorSetLayoutInfo,
    GraphicsPipelineInfo, HandleSlot, PipelineLayoutInfo, RaytracingPipelineInfo, RenderPassInfo,
    SamplerInfo, ShaderModuleInfo, ShaderStage,
};

/// Envelope version every payload must carry.
pub const PAYLOAD_VERSION: u64 = 6;

/// Errors raised while decoding a payload.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The payload is not valid JSON or does not match the schema.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The envelope version is not supported.
    #[error("unsupported payload version {0}")]
    InvalidVersion(u64),

    /// The envelope hash does not match the entry key.
    #[error("payload hash {actual} does not match entry hash {expected}")]
    InvalidHash {
        /// Hash from the entry record.
        expected: Hash,
        /// Hash found in the payload envelope.
        actual: Hash,
    },

    /// The tag has no payload schema (blob links).
    #[error("tag {0:?} has no parseable payload")]
    UnparseableTag(ResourceTag),
}

/// Result type for payload decoding.
pub type ParseResult<T> = Result<T, ParseError>;

fn envelope_hash(value: &Value) -> ParseResult<Hash> {
    match value.get("hash") {
        Some(raw) => Ok(serde_json::from_value(raw.clone())?),
        None => Ok(Hash::NULL),
    }
}

fn stage_deps(stages: &[ShaderStage], deps: &mut Vec<DepRef>) {
    for (index, stage) in stages.iter().enumerate() {
        if !stage.module.is_null() {
            deps.push(DepRef {
                tag: ResourceTag::ShaderModule,
                hash: stage.module,
                slot: HandleSlot::ShaderStage(index),
            });
        }
    }
}

fn pipeline_dep(tag: ResourceTag, hash: Hash, slot: HandleSlot, deps: &mut Vec<DepRef>) {
    if !hash.is_null() {
        deps.push(DepRef { tag, hash, slot });
    }
}

/// Decode one payload.
///
/// Checks the envelope (`version` must be [`PAYLOAD_VERSION`], `hash` must
/// match the entry key), then decodes the tag-specific body and collects the
/// dependency edges in payload order.
pub fn parse_payload(
    tag: ResourceTag,
    expected_hash: Hash,
    bytes: &[u8],
) -> ParseResult<(CreateInfo, Vec<DepRef>)> {
    let value: Value = serde_json::from_slice(bytes)?;

    let version = value.get("version").and_then(Value::as_u64).unwrap_or(0);
    if version != PAYLOAD_VERSION {
        return Err(ParseError::InvalidVersion(version));
    }
    let hash = envelope_hash(&value)?;
    if hash != expected_hash {
        return Err(ParseError::InvalidHash {
            expected: expected_hash,
            actual: hash,
        });
    }

    match tag {
        ResourceTag::ApplicationInfo => {
            let info: ApplicationInfo = serde_json::from_value(value)?;
            Ok((CreateInfo::ApplicationInfo(info), Vec::new()))
        }
        ResourceTag::Sampler => {
            let info: SamplerInfo = serde_json::from_value(value)?;
            Ok((CreateInfo::Sampler(info), Vec::new()))
        }
        ResourceTag::DescriptorSetLayout => {
            let mut info: DescriptorSetLayoutInfo = serde_json::from_value(value)?;
            let mut deps = Vec::new();
            for (binding_index, binding) in info.bindings.iter_mut().enumerate() {
                binding.immutable_sampler_handles = vec![None; binding.immutable_samplers.len()];
                for (sampler_index, &sampler) in binding.immutable_samplers.iter().enumerate() {
                    if !sampler.is_null() {
                        deps.push(DepRef {
                            tag: ResourceTag::Sampler,
                            hash: sampler,
                            slot: HandleSlot::ImmutableSampler {
                                binding: binding_index,
                                sampler: sampler_index,
                            },
                        });
                    }
                }
            }
            Ok((CreateInfo::DescriptorSetLayout(info), deps))
        }
        ResourceTag::PipelineLayout => {
            let mut info: PipelineLayoutInfo = serde_json::from_value(value)?;
            info.set_layout_handles = vec![None; info.set_layouts.len()];
            let mut deps = Vec::new();
            for (index, &layout) in info.set_layouts.iter().enumerate() {
                if !layout.is_null() {
                    deps.push(DepRef {
                        tag: ResourceTag::DescriptorSetLayout,
                        hash: layout,
                        slot: HandleSlot::SetLayout(index),
                    });
                }
            }
            Ok((CreateInfo::PipelineLayout(info), deps))
        }
        ResourceTag::ShaderModule => {
            let info: ShaderModuleInfo = serde_json::from_value(value)?;
            Ok((CreateInfo::ShaderModule(info), Vec::new()))
        }
        ResourceTag::RenderPass => {
            let info: RenderPassInfo = serde_json::from_value(value)?;
            Ok((CreateInfo::RenderPass(info), Vec::new()))
        }
        ResourceTag::GraphicsPipeline => {
            let info: GraphicsPipelineInfo = serde_json::from_value(value)?;
            let mut deps = Vec::new();
            pipeline_dep(
                ResourceTag::PipelineLayout,
                info.layout,
                HandleSlot::PipelineLayout,
                &mut deps,
            );
            pipeline_dep(
                ResourceTag::RenderPass,
                info.render_pass,
                HandleSlot::RenderPass,
                &mut deps,
            );
            stage_deps(&info.stages, &mut deps);
            pipeline_dep(
                ResourceTag::GraphicsPipeline,
                info.base_pipeline,
                HandleSlot::BasePipeline,
                &mut deps,
            );
            Ok((CreateInfo::GraphicsPipeline(info), deps))
        }
        ResourceTag::ComputePipeline => {
            let info: ComputePipelineInfo = serde_json::from_value(value)?;
            let mut deps = Vec::new();
            pipeline_dep(
                ResourceTag::PipelineLayout,
                info.layout,
                HandleSlot::PipelineLayout,
                &mut deps,
            );
            if !info.stage.module.is_null() {
                deps.push(DepRef {
                    tag: ResourceTag::ShaderModule,
                    hash: info.stage.module,
                    slot: HandleSlot::ShaderStage(0),
                });
            }
            pipeline_dep(
                ResourceTag::ComputePipeline,
                info.base_pipeline,
                HandleSlot::BasePipeline,
                &mut deps,
            );
            Ok((CreateInfo::ComputePipeline(info), deps))
        }
        ResourceTag::RaytracingPipeline => {
            let info: RaytracingPipelineInfo = serde_json::from_value(value)?;
            let mut deps = Vec::new();
            pipeline_dep(
                ResourceTag::PipelineLayout,
                info.layout,
                HandleSlot::PipelineLayout,
                &mut deps,
            );
            stage_deps(&info.stages, &mut deps);
            pipeline_dep(
                ResourceTag::RaytracingPipeline,
                info.base_pipeline,
                HandleSlot::BasePipeline,
                &mut deps,
            );
            Ok((CreateInfo::RaytracingPipeline(info), deps))
        }
        ResourceTag::ApplicationBlobLink => Err(ParseError::UnparseableTag(tag)),
    }
}
