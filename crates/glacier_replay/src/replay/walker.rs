//! Dependency graph walker
//!
//! Each root pipeline is replayed by an iterative depth-first walk over its
//! dependency closure, once per phase. The walk drives the per-entry state
//! machine; entries shared between roots are parsed and created exactly once
//! and the later walks simply observe the cached result.
//!
//! Failure of any entry invalidates the entry and every ancestor frame still
//! on the walk stack, releases the subtree's dependency references, and is
//! charged to the root's tag. Other roots keep replaying.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::thread;

use log::{debug, error, warn};

use super::control::ControlBlock;
use crate::database::entry::{Claim, Entry, EntryStatus};
use crate::database::format::{Hash, ResourceTag};
use crate::database::{Database, EntryStore};
use crate::foundation::scratch::PayloadScratch;
use crate::parse::parse_payload;
use crate::vulkan::device::ReplayDevice;

/// Replay phase the walker is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Parse,
    Create,
}

/// Result of stepping one entry.
enum Step {
    /// The stage completed here or earlier; descend into dependencies.
    Ready,
    /// Another thread is inside this entry's stage body; retry shortly.
    Pending,
    /// Dependencies must reach `created` first; descend into them.
    NeedsDeps,
    /// The entry failed; propagate to the subtree.
    Invalid,
}

/// Outcome of replaying one root in the create phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootOutcome {
    /// The root and its closure were created (and promptly destroyed).
    Created,
    /// The root failed during the create phase.
    Failed,
    /// The root was already invalid from the parse phase; nothing counted.
    Skipped,
}

/// Drives parse and create walks for root pipelines.
pub struct Replayer<'a> {
    db: &'a Database,
    device: &'a dyn ReplayDevice,
    control: &'a ControlBlock,
}

impl<'a> Replayer<'a> {
    /// Bundle the replay collaborators.
    pub fn new(db: &'a Database, device: &'a dyn ReplayDevice, control: &'a ControlBlock) -> Self {
        Self {
            db,
            device,
            control,
        }
    }

    fn store(&self) -> &EntryStore {
        self.db.store()
    }

    /// Parse the root's dependency closure. True when every entry parsed.
    pub fn parse_root(&self, root: &Arc<Entry>, scratch: &mut PayloadScratch) -> bool {
        let ok = self.walk(root, Phase::Parse, scratch);
        if ok {
            self.control.increment_parsed(root.tag);
        } else {
            self.control.increment_failure(root.tag);
        }
        ok
    }

    /// Create the root's closure leaf-first, then destroy the root handle and
    /// release the closure's dependency references.
    pub fn create_root(&self, root: &Arc<Entry>, scratch: &mut PayloadScratch) -> RootOutcome {
        if root.status() == EntryStatus::Invalid {
            // Already failed and charged during the parse phase.
            return RootOutcome::Skipped;
        }
        if self.walk(root, Phase::Create, scratch) {
            self.retire_root(root);
            self.control.increment_successful(root.tag);
            RootOutcome::Created
        } else {
            self.control.increment_failure(root.tag);
            RootOutcome::Failed
        }
    }

    /// The iterative depth-first walk shared by both phases.
    fn walk(&self, root: &Arc<Entry>, phase: Phase, scratch: &mut PayloadScratch) -> bool {
        let mut stack: Vec<(Arc<Entry>, usize)> = vec![(root.clone(), 0)];
        let mut on_stack: HashSet<(ResourceTag, Hash)> = HashSet::new();
        on_stack.insert((root.tag, root.hash));

        while let Some(frame) = stack.last_mut() {
            let entry = frame.0.clone();
            let next_dep = frame.1;

            let step = match phase {
                Phase::Parse => self.parse_step(&entry, scratch),
                Phase::Create => self.create_step(&entry),
            };

            match step {
                Step::Ready | Step::NeedsDeps => {
                    let deps = entry.dependencies();
                    if let Some(dep) = deps.get(next_dep).copied() {
                        frame.1 = next_dep + 1;
                        let Some(child) = self.store().get(dep.tag, dep.hash) else {
                            debug_assert!(
                                false,
                                "dependency {:?} {} of {:?} {} is not in the store",
                                dep.tag, dep.hash, entry.tag, entry.hash
                            );
                            warn!(
                                "dependency {:?} {} of {:?} {} vanished from the store",
                                dep.tag, dep.hash, entry.tag, entry.hash
                            );
                            self.fail_subtree(&entry, &mut stack);
                            return false;
                        };
                        if on_stack.contains(&(child.tag, child.hash)) {
                            error!(
                                "database is cyclic: {:?} {} depends on itself through {:?} {}",
                                child.tag, child.hash, entry.tag, entry.hash
                            );
                            self.fail_subtree(&entry, &mut stack);
                            return false;
                        }
                        on_stack.insert((child.tag, child.hash));
                        stack.push((child.clone(), 0));
                    } else if matches!(step, Step::Ready) {
                        on_stack.remove(&(entry.tag, entry.hash));
                        stack.pop();
                    }
                    // NeedsDeps with every dependency visited: a dependency
                    // finished on another thread between the scan and now;
                    // re-step and claim the create.
                }
                Step::Pending => thread::yield_now(),
                Step::Invalid => {
                    self.fail_subtree(&entry, &mut stack);
                    return false;
                }
            }
        }
        true
    }

    /// Parse-phase step: claim the entry and decode its payload.
    fn parse_step(&self, entry: &Entry, scratch: &mut PayloadScratch) -> Step {
        match entry.try_begin_parse() {
            Claim::Done => return Step::Ready,
            Claim::Busy => return Step::Pending,
            Claim::Invalid => return Step::Invalid,
            Claim::Won => {}
        }
        match self.run_parse_body(entry, scratch) {
            Ok(()) => {
                entry.finish_parse();
                Step::Ready
            }
            Err(reason) => {
                debug!("parse of {:?} {} failed: {}", entry.tag, entry.hash, reason);
                if entry.tag == ResourceTag::ShaderModule {
                    self.control.increment_module_parse_failure();
                }
                entry.mark_invalid();
                Step::Invalid
            }
        }
    }

    fn run_parse_body(&self, entry: &Entry, scratch: &mut PayloadScratch) -> Result<(), String> {
        let payload = self
            .db
            .read_payload(entry, scratch)
            .map_err(|err| err.to_string())?;
        let (info, deps) = parse_payload(entry.tag, entry.hash, payload)
            .map_err(|err| err.to_string())?;

        // Resolve every dependency before taking any reference on them, so a
        // failed parse leaves no stray refcounts behind.
        let mut children = Vec::with_capacity(deps.len());
        for dep in &deps {
            match self.store().get(dep.tag, dep.hash) {
                Some(child) => children.push(child.clone()),
                None => {
                    debug_assert!(
                        false,
                        "create info references missing {:?} {}",
                        dep.tag, dep.hash
                    );
                    return Err(format!(
                        "references {:?} {} which is not in the database",
                        dep.tag, dep.hash
                    ));
                }
            }
        }
        for child in &children {
            child.retain_dependent();
        }
        entry.publish_create_info(info);
        entry.publish_dependencies(deps);
        Ok(())
    }

    /// Create-phase step: once every dependency is created, claim the entry,
    /// patch dependency handles, and call the driver.
    fn create_step(&self, entry: &Entry) -> Step {
        match entry.status() {
            EntryStatus::Created => return Step::Ready,
            EntryStatus::Invalid => return Step::Invalid,
            EntryStatus::Creating => return Step::Pending,
            EntryStatus::NotParsed | EntryStatus::Parsing => {
                // The parse phase finished before the barrier; an unparsed
                // entry here means the phases ran out of order.
                debug_assert!(
                    false,
                    "create phase reached unparsed {:?} {}",
                    entry.tag,
                    entry.hash
                );
                entry.mark_invalid();
                return Step::Invalid;
            }
            EntryStatus::Parsed => {}
        }

        let deps = entry.dependencies();
        let mut all_created = true;
        for dep in deps {
            let Some(child) = self.store().get(dep.tag, dep.hash) else {
                continue;
            };
            match child.status() {
                EntryStatus::Created => {}
                EntryStatus::Invalid => return Step::Invalid,
                _ => all_created = false,
            }
        }
        if !all_created {
            return Step::NeedsDeps;
        }

        match entry.try_begin_create() {
            Claim::Done => return Step::Ready,
            Claim::Busy => return Step::Pending,
            Claim::Invalid => return Step::Invalid,
            Claim::Won => {}
        }
        match self.run_create_body(entry) {
            Ok(()) => {
                entry.finish_create();
                if entry.tag == ResourceTag::ShaderModule {
                    self.control.increment_successful_module();
                }
                Step::Ready
            }
            Err(reason) => {
                debug!("create of {:?} {} failed: {}", entry.tag, entry.hash, reason);
                entry.mark_invalid();
                Step::Invalid
            }
        }
    }

    fn run_create_body(&self, entry: &Entry) -> Result<(), String> {
        if !entry.tag.produces_handle() {
            return Ok(());
        }
        let handle = entry.with_create_info_mut(|info| {
            let Some(info) = info else {
                debug_assert!(false, "create body without create info");
                return Err("create info was released early".to_owned());
            };
            for dep in entry.dependencies() {
                let Some(child) = self.store().get(dep.tag, dep.hash) else {
                    continue;
                };
                let Some(dep_handle) = child.handle() else {
                    debug_assert!(
                        false,
                        "created dependency {:?} {} has no handle",
                        dep.tag,
                        dep.hash
                    );
                    return Err(format!(
                        "dependency {:?} {} lost its handle",
                        dep.tag, dep.hash
                    ));
                };
                let _patched = info.patch_handle(dep.slot, dep_handle);
                debug_assert!(_patched, "no slot {:?} in {:?}", dep.slot, entry.tag);
            }
            self.device
                .create(entry.tag, entry.hash, info)
                .map_err(|err| err.to_string())
        })?;
        entry.store_handle(handle);
        Ok(())
    }

    /// A root retired: destroy its handle (unless another root still derives
    /// from it) and release its dependency references.
    fn retire_root(&self, root: &Arc<Entry>) {
        if root.dependent_count() == 0 {
            if let Some(handle) = root.take_handle() {
                self.device.destroy(root.tag, handle);
            }
            root.release_create_info();
        }
        self.destroy_dependencies(root);
    }

    /// Invalidate the failed entry and every ancestor still on the stack,
    /// releasing each one's dependency references exactly once.
    fn fail_subtree(&self, failed: &Arc<Entry>, stack: &mut Vec<(Arc<Entry>, usize)>) {
        failed.mark_invalid();
        for (ancestor, _) in stack.drain(..).rev() {
            ancestor.mark_invalid();
            self.destroy_dependencies(&ancestor);
        }
    }

    /// Release the entry's references on its dependencies. A dependency whose
    /// count reaches zero is torn down (handle destroyed, create-info freed)
    /// and its own references released in turn.
    fn destroy_dependencies(&self, entry: &Entry) {
        let mut zeroed: VecDeque<Arc<Entry>> = VecDeque::new();
        if entry.try_claim_destroy_dependencies() {
            self.release_children(entry, &mut zeroed);
        }
        while let Some(child) = zeroed.pop_front() {
            if let Some(handle) = child.take_handle() {
                self.device.destroy(child.tag, handle);
            }
            child.release_create_info();
            if child.try_claim_destroy_dependencies() {
                self.release_children(&child, &mut zeroed);
            }
        }
    }

    fn release_children(&self, entry: &Entry, zeroed: &mut VecDeque<Arc<Entry>>) {
        for dep in entry.dependencies() {
            let Some(child) = self.store().get(dep.tag, dep.hash) else {
                continue;
            };
            if child.release_dependent() {
                zeroed.push_back(child.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::fixtures::DbBuilder;
    use crate::vulkan::testing::RecordingDevice;
    use serde_json::{json, Value};

    const LAYOUT: ResourceTag = ResourceTag::PipelineLayout;
    const MODULE: ResourceTag = ResourceTag::ShaderModule;
    const GRAPHICS: ResourceTag = ResourceTag::GraphicsPipeline;
    const COMPUTE: ResourceTag = ResourceTag::ComputePipeline;

    fn payload(hash: u64, mut body: Value) -> Vec<u8> {
        let object = body.as_object_mut().expect("body object");
        object.insert("version".into(), json!(6));
        object.insert("hash".into(), json!(format!("{:016x}", hash)));
        serde_json::to_vec(&body).expect("serialize payload")
    }

    fn layout_payload(hash: u64) -> Vec<u8> {
        payload(hash, json!({"setLayouts": [], "pushConstantRanges": []}))
    }

    fn module_payload(hash: u64) -> Vec<u8> {
        use base64::Engine as _;
        let code = base64::engine::general_purpose::STANDARD.encode([0u8; 8]);
        payload(hash, json!({"code": code}))
    }

    fn compute_payload(hash: u64, layout: u64, module: u64) -> Vec<u8> {
        payload(
            hash,
            json!({
                "layout": format!("{:016x}", layout),
                "stage": {"stage": 32, "module": format!("{:016x}", module)},
            }),
        )
    }

    struct Fixture {
        db: Database,
        device: RecordingDevice,
        control: ControlBlock,
    }

    impl Fixture {
        fn new(builder: DbBuilder) -> Self {
            let file = builder.write();
            let db = Database::open(file.path()).expect("load test db");
            Self {
                db,
                device: RecordingDevice::new(),
                control: ControlBlock::disabled(),
            }
        }

        fn replayer(&self) -> Replayer<'_> {
            Replayer::new(&self.db, &self.device, &self.control)
        }

        fn root(&self, tag: ResourceTag, hash: u64) -> Arc<Entry> {
            self.db.store().get(tag, Hash(hash)).expect("root").clone()
        }

        fn status(&self, tag: ResourceTag, hash: u64) -> EntryStatus {
            self.db.store().get(tag, Hash(hash)).expect("entry").status()
        }

        fn dependent_count(&self, tag: ResourceTag, hash: u64) -> u32 {
            self.db
                .store()
                .get(tag, Hash(hash))
                .expect("entry")
                .dependent_count()
        }

        fn replay_one(&self, tag: ResourceTag, hash: u64) -> RootOutcome {
            let replayer = self.replayer();
            let root = self.root(tag, hash);
            let mut scratch = PayloadScratch::new();
            if !replayer.parse_root(&root, &mut scratch) {
                return RootOutcome::Failed;
            }
            replayer.create_root(&root, &mut scratch)
        }
    }

    // A root with two dependencies replays the whole closure and zeroes the
    // dependency counts.
    #[test]
    fn test_simple_root_with_two_deps() {
        let fixture = Fixture::new(
            DbBuilder::new()
                .entry(LAYOUT, Hash(1), &layout_payload(1))
                .entry(MODULE, Hash(2), &module_payload(2))
                .entry(COMPUTE, Hash(0), &compute_payload(0, 1, 2)),
        );
        let outcome = fixture.replay_one(COMPUTE, 0);
        assert_eq!(outcome, RootOutcome::Created);
        assert_eq!(fixture.status(LAYOUT, 1), EntryStatus::Created);
        assert_eq!(fixture.status(MODULE, 2), EntryStatus::Created);
        assert_eq!(fixture.status(COMPUTE, 0), EntryStatus::Created);
        assert_eq!(fixture.dependent_count(LAYOUT, 1), 0);
        assert_eq!(fixture.dependent_count(MODULE, 2), 0);
    }

    // One bad dependency fails the root but leaves the good sibling parsed
    // and untouched by the driver.
    #[test]
    fn test_invalid_dep_contained() {
        let fixture = Fixture::new(
            DbBuilder::new()
                .entry(LAYOUT, Hash(1), &layout_payload(1))
                // Wrong envelope hash: parser rejects it.
                .entry(MODULE, Hash(2), &module_payload(3))
                .entry(COMPUTE, Hash(0), &compute_payload(0, 1, 2)),
        );
        let outcome = fixture.replay_one(COMPUTE, 0);
        assert_eq!(outcome, RootOutcome::Failed);
        assert_eq!(fixture.status(LAYOUT, 1), EntryStatus::Parsed);
        assert_eq!(fixture.status(MODULE, 2), EntryStatus::Invalid);
        assert_eq!(fixture.status(COMPUTE, 0), EntryStatus::Invalid);
        // The sibling never met the driver.
        assert!(fixture.device.events().is_empty());
        assert_eq!(fixture.dependent_count(LAYOUT, 1), 0);
    }

    // Dependencies are created before the root; destruction starts at the
    // root and releases dependencies in listed order.
    #[test]
    fn test_create_and_destroy_order() {
        let fixture = Fixture::new(
            DbBuilder::new()
                .entry(LAYOUT, Hash(0xB), &layout_payload(0xB))
                .entry(MODULE, Hash(0xC), &module_payload(0xC))
                .entry(COMPUTE, Hash(0xA), &compute_payload(0xA, 0xB, 0xC)),
        );
        assert_eq!(fixture.replay_one(COMPUTE, 0xA), RootOutcome::Created);
        assert_eq!(
            fixture.device.create_order(),
            vec![(LAYOUT, Hash(0xB)), (MODULE, Hash(0xC)), (COMPUTE, Hash(0xA))]
        );
        assert_eq!(
            fixture.device.destroy_order(),
            vec![(COMPUTE, Hash(0xA)), (LAYOUT, Hash(0xB)), (MODULE, Hash(0xC))]
        );
    }

    // A driver rejection mid-closure destroys the already-created sibling
    // exactly once and never touches the root.
    #[test]
    fn test_create_failure_mid_dependency() {
        let fixture = Fixture::new(
            DbBuilder::new()
                .entry(LAYOUT, Hash(0xB), &layout_payload(0xB))
                .entry(MODULE, Hash(0xC), &module_payload(0xC))
                .entry(COMPUTE, Hash(0xA), &compute_payload(0xA, 0xB, 0xC)),
        );
        fixture.device.fail_create(MODULE, Hash(0xC));
        assert_eq!(fixture.replay_one(COMPUTE, 0xA), RootOutcome::Failed);
        assert_eq!(fixture.status(LAYOUT, 0xB), EntryStatus::Created);
        assert_eq!(fixture.status(MODULE, 0xC), EntryStatus::Invalid);
        assert_eq!(fixture.status(COMPUTE, 0xA), EntryStatus::Invalid);
        assert_eq!(fixture.device.destroy_count(LAYOUT, Hash(0xB)), 1);
        // Only the layout create reached the driver; the module create was
        // rejected and the root never claimed its create body.
        assert_eq!(fixture.device.create_order(), vec![(LAYOUT, Hash(0xB))]);
    }

    // A dependency shared by two roots survives the first root and is
    // destroyed exactly once when the second finishes.
    #[test]
    fn test_shared_dep_destroyed_after_last_root() {
        let fixture = Fixture::new(
            DbBuilder::new()
                .entry(LAYOUT, Hash(0xD), &layout_payload(0xD))
                .entry(MODULE, Hash(1), &module_payload(1))
                .entry(MODULE, Hash(2), &module_payload(2))
                .entry(COMPUTE, Hash(0x10), &compute_payload(0x10, 0xD, 1))
                .entry(COMPUTE, Hash(0x20), &compute_payload(0x20, 0xD, 2)),
        );
        let replayer = fixture.replayer();
        let mut scratch = PayloadScratch::new();
        let first = fixture.root(COMPUTE, 0x10);
        let second = fixture.root(COMPUTE, 0x20);

        assert!(replayer.parse_root(&first, &mut scratch));
        assert!(replayer.parse_root(&second, &mut scratch));
        assert_eq!(fixture.dependent_count(LAYOUT, 0xD), 2);

        assert_eq!(
            replayer.create_root(&first, &mut scratch),
            RootOutcome::Created
        );
        assert_eq!(fixture.dependent_count(LAYOUT, 0xD), 1);
        assert_eq!(fixture.device.destroy_count(LAYOUT, Hash(0xD)), 0);

        assert_eq!(
            replayer.create_root(&second, &mut scratch),
            RootOutcome::Created
        );
        assert_eq!(fixture.dependent_count(LAYOUT, 0xD), 0);
        assert_eq!(fixture.device.destroy_count(LAYOUT, Hash(0xD)), 1);
    }

    // A derived pipeline keeps its base alive until the derived root retires.
    #[test]
    fn test_base_pipeline_chain() {
        let base = payload(
            0x30,
            json!({
                "layout": "000000000000000d",
                "stage": {"stage": 32, "module": "0000000000000001"},
            }),
        );
        let derived = payload(
            0x40,
            json!({
                "layout": "000000000000000d",
                "stage": {"stage": 32, "module": "0000000000000001"},
                "basePipeline": "0000000000000030",
            }),
        );
        let fixture = Fixture::new(
            DbBuilder::new()
                .entry(LAYOUT, Hash(0xD), &layout_payload(0xD))
                .entry(MODULE, Hash(1), &module_payload(1))
                .entry(COMPUTE, Hash(0x30), &base)
                .entry(COMPUTE, Hash(0x40), &derived),
        );
        let replayer = fixture.replayer();
        let mut scratch = PayloadScratch::new();
        let roots = fixture.db.store().root_pipelines();
        assert_eq!(roots.len(), 2);
        for root in &roots {
            assert!(replayer.parse_root(root, &mut scratch));
        }
        for root in &roots {
            assert_eq!(replayer.create_root(root, &mut scratch), RootOutcome::Created);
        }
        // Base destroyed exactly once, after the derived root released it.
        assert_eq!(fixture.device.destroy_count(COMPUTE, Hash(0x30)), 1);
        assert_eq!(fixture.device.destroy_count(COMPUTE, Hash(0x40)), 1);
        assert_eq!(fixture.dependent_count(COMPUTE, 0x30), 0);
    }

    // A graphics pipeline pulls in its layout, render pass, and both stage
    // modules, leaf-first.
    #[test]
    fn test_graphics_pipeline_full_closure() {
        let render_pass = payload(
            0x70,
            json!({
                "attachments": [{"format": 44, "samples": 1, "loadOp": 1, "storeOp": 0}],
                "subpasses": [{
                    "pipelineBindPoint": 0,
                    "colorAttachments": [{"attachment": 0, "layout": 2}],
                }],
            }),
        );
        let pipeline = payload(
            0x71,
            json!({
                "layout": "000000000000000d",
                "renderPass": "0000000000000070",
                "subpass": 0,
                "stages": [
                    {"stage": 1, "module": "0000000000000001"},
                    {"stage": 16, "module": "0000000000000002"},
                ],
                "rasterization": {"polygonMode": 0, "cullMode": 2, "lineWidth": 1.0},
                "dynamicState": [0, 1],
            }),
        );
        let fixture = Fixture::new(
            DbBuilder::new()
                .entry(LAYOUT, Hash(0xD), &layout_payload(0xD))
                .entry(ResourceTag::RenderPass, Hash(0x70), &render_pass)
                .entry(MODULE, Hash(1), &module_payload(1))
                .entry(MODULE, Hash(2), &module_payload(2))
                .entry(GRAPHICS, Hash(0x71), &pipeline),
        );
        assert_eq!(fixture.replay_one(GRAPHICS, 0x71), RootOutcome::Created);
        assert_eq!(
            fixture.device.create_order(),
            vec![
                (LAYOUT, Hash(0xD)),
                (ResourceTag::RenderPass, Hash(0x70)),
                (MODULE, Hash(1)),
                (MODULE, Hash(2)),
                (GRAPHICS, Hash(0x71)),
            ]
        );
        // Root first, then dependencies in listed order.
        assert_eq!(
            fixture.device.destroy_order()[0],
            (GRAPHICS, Hash(0x71))
        );
        assert_eq!(fixture.device.destroy_order().len(), 5);
    }

    // Payload CRC corruption is a per-entry failure, not a load failure.
    #[test]
    fn test_crc_failure_is_contained() {
        let fixture = Fixture::new(
            DbBuilder::new()
                .entry(LAYOUT, Hash(1), &layout_payload(1))
                .entry_bad_crc(MODULE, Hash(2), &module_payload(2))
                .entry(COMPUTE, Hash(0), &compute_payload(0, 1, 2)),
        );
        assert_eq!(fixture.replay_one(COMPUTE, 0), RootOutcome::Failed);
        assert_eq!(fixture.status(MODULE, 2), EntryStatus::Invalid);
    }

    // A cyclic database fails the root instead of hanging the walker.
    #[test]
    fn test_cycle_rejected() {
        let first = payload(
            0x50,
            json!({
                "stage": {"stage": 32, "module": "0000000000000001"},
                "basePipeline": "0000000000000060",
            }),
        );
        let second = payload(
            0x60,
            json!({
                "stage": {"stage": 32, "module": "0000000000000001"},
                "basePipeline": "0000000000000050",
            }),
        );
        let fixture = Fixture::new(
            DbBuilder::new()
                .entry(MODULE, Hash(1), &module_payload(1))
                .entry(COMPUTE, Hash(0x50), &first)
                .entry(COMPUTE, Hash(0x60), &second),
        );
        let replayer = fixture.replayer();
        let mut scratch = PayloadScratch::new();
        let root = fixture.root(COMPUTE, 0x50);
        assert!(!replayer.parse_root(&root, &mut scratch));
        assert_eq!(fixture.status(COMPUTE, 0x50), EntryStatus::Invalid);
    }
}
