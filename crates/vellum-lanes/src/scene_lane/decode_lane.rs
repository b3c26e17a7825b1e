// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The graph decoder: a resumable, phased rebuild of a live scene from a [`LevelData`].
//!
//! The phases run strictly in order:
//!
//! 1. **Reconcile**: destroy tagged entities the snapshot does not mention
//!    (only when unmatched entities are deleted).
//! 2. **Materialize**: instantiate every missing entity from its template and
//!    hand out the stored ids to the new subtree.
//! 3. **ReconcileComponents**: drop components whose types the snapshot does
//!    not list, restore the active flag.
//! 4. **Reparent**: restore the hierarchy.
//! 5. **Settle**: yield to the host for a few frames so it can finish
//!    initializing the new entities.
//! 6. **Deserialize**: decode component records into live components.
//! 7. **Fixup**: drain the deferred reference queue.
//! 8. **Finalize**: clear per-decode state and broadcast `OnDeserialized`.
//!
//! Failures are logged and skipped; nothing short of a panic keeps a decode
//! from reaching **Finalize**.

use std::collections::{HashMap, HashSet};

use vellum_core::{
    lane::{Lane, LaneKind},
    progress::{PhaseProgress, ProgressSink},
    scene::{ComponentId, EntityHandle, SceneBackend},
};
use vellum_data::{AssetStore, IdentityRegistry, LevelData, StoredItem};

use super::{store_capable_descendants, tagged_descendants, ON_DESERIALIZED};
use crate::{
    fixup_lane::{DeferredGroup, DeferredRef, Fixup, FixupQueue, FixupTarget, LiveIndex, ResolverTable},
    serializer_lane::{DecodeContext, SerializerPlugin, SerializerRegistry},
};

const INITIALIZING: &str = "Initializing";

/// The live state a decode works against, borrowed for the duration of one poll.
pub struct DecodeEnv<'a> {
    /// The host scene.
    pub scene: &'a mut dyn SceneBackend,
    /// The identity registry, rebound as entities are materialized.
    pub identity: &'a mut IdentityRegistry,
    /// Resolves the plugin of every stored type.
    pub serializers: &'a SerializerRegistry,
    /// Resolves asset references.
    pub assets: &'a AssetStore,
    /// Receives `Initializing` and `Loading` progress.
    pub progress: &'a dyn ProgressSink,
}

/// Host hooks consulted during a decode. Returning `false` from an `on_*`
/// predicate cancels that single action.
pub trait DecodeHooks {
    /// Called before an unmatched entity is destroyed.
    fn on_destroy_entity(&mut self, _id: &str, _entity: EntityHandle) -> bool {
        true
    }

    /// Called before a missing entity is instantiated.
    fn on_create_entity(&mut self, _item: &StoredItem) -> bool {
        true
    }

    /// Called before the records of one component type are decoded.
    fn on_load_component(&mut self, _id: &str, _type_name: &str) -> bool {
        true
    }

    /// Called after a component was decoded successfully.
    fn on_loaded_component(&mut self, _id: &str, _component: ComponentId) {}
}

/// Hooks that allow everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl DecodeHooks for NoHooks {}

/// The phase a decoder is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePhase {
    /// Destroying unmatched entities.
    Reconcile,
    /// Instantiating missing entities.
    Materialize,
    /// Trimming components and restoring active flags.
    ReconcileComponents,
    /// Restoring the hierarchy.
    Reparent,
    /// Yielding to the host.
    Settle {
        /// Frames left to wait.
        remaining: u32,
    },
    /// Decoding component records.
    Deserialize,
    /// Draining the deferred reference queue.
    Fixup,
    /// Clearing state and notifying entities.
    Finalize,
    /// Done.
    Complete,
}

/// What a finished decode did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodeReport {
    /// Entities destroyed because the snapshot did not mention them.
    pub destroyed: usize,
    /// Entities instantiated from templates.
    pub materialized: usize,
    /// Ids of manifest entries that could not be instantiated.
    pub skipped_entities: Vec<String>,
    /// Ids of the manifest entries found live after materialization.
    pub loaded_entities: Vec<String>,
    /// Components removed because the snapshot did not list their type.
    pub removed_components: usize,
    /// Components decoded successfully.
    pub restored_components: usize,
    /// Components whose plugin failed.
    pub failed_components: usize,
    /// Stored types with neither a descriptor nor a plugin.
    pub skipped_types: Vec<String>,
    /// Fixup queue entries processed.
    pub fixups_run: usize,
}

/// The outcome of one [`GraphDecoder::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The decoder yielded; poll again on a later frame.
    Pending,
    /// The decode finished.
    Complete(DecodeReport),
}

struct DecodeState {
    fixups: FixupQueue,
    resolvers: ResolverTable,
    hooks: Box<dyn DecodeHooks>,
    report: DecodeReport,
}

/// The number of manifest ancestors of an entry.
fn manifest_depth(parents: &HashMap<&str, Option<&str>>, item: &StoredItem) -> usize {
    let mut depth = 0;
    let mut cursor = item.parent_name.as_deref();
    while let Some(parent) = cursor {
        depth += 1;
        if depth > parents.len() {
            break;
        }
        cursor = parents.get(parent).copied().flatten();
    }
    depth
}

/// Rebuilds a live scene from a [`LevelData`], one phase at a time.
pub struct GraphDecoder {
    data: LevelData,
    delete_unmatched: bool,
    settle_frames: u32,
    phase: DecodePhase,
    state: DecodeState,
}

impl Lane for GraphDecoder {
    fn strategy_name(&self) -> &'static str {
        "VL_GRAPH_DECODE_V1"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Decode
    }
}

impl GraphDecoder {
    /// Creates a decoder. With `delete_unmatched`, tagged entities absent from
    /// the snapshot are destroyed first.
    pub fn new(data: LevelData, delete_unmatched: bool) -> Self {
        Self {
            data,
            delete_unmatched,
            settle_frames: 2,
            phase: DecodePhase::Reconcile,
            state: DecodeState {
                fixups: FixupQueue::new(),
                resolvers: ResolverTable::new(),
                hooks: Box::new(NoHooks),
                report: DecodeReport::default(),
            },
        }
    }

    /// Sets how many polls the settle phase yields for.
    pub fn with_settle_frames(mut self, frames: u32) -> Self {
        self.settle_frames = frames;
        self
    }

    /// Installs host hooks.
    pub fn with_hooks(mut self, hooks: Box<dyn DecodeHooks>) -> Self {
        self.state.hooks = hooks;
        self
    }

    /// Replaces the resolver table.
    pub fn with_resolvers(mut self, resolvers: ResolverTable) -> Self {
        self.state.resolvers = resolvers;
        self
    }

    /// The current phase.
    pub fn phase(&self) -> DecodePhase {
        self.phase
    }

    /// Returns `true` until the decode has completed.
    pub fn is_decoding(&self) -> bool {
        self.phase != DecodePhase::Complete
    }

    /// The level the snapshot was taken in.
    pub fn level(&self) -> &str {
        &self.data.name
    }

    /// Runs phases until the decoder has to yield or finishes.
    pub fn poll(&mut self, env: &mut DecodeEnv<'_>) -> DecodeStatus {
        loop {
            match self.phase {
                DecodePhase::Reconcile => {
                    env.progress.report(INITIALIZING, 0.0);
                    self.reconcile(env);
                    env.progress.report(INITIALIZING, 0.25);
                    self.phase = DecodePhase::Materialize;
                }
                DecodePhase::Materialize => {
                    self.materialize(env);
                    env.progress.report(INITIALIZING, 0.75);
                    self.phase = DecodePhase::ReconcileComponents;
                }
                DecodePhase::ReconcileComponents => {
                    self.reconcile_components(env);
                    env.progress.report(INITIALIZING, 0.85);
                    self.phase = DecodePhase::Reparent;
                }
                DecodePhase::Reparent => {
                    self.reparent(env);
                    self.phase = DecodePhase::Settle {
                        remaining: self.settle_frames,
                    };
                }
                DecodePhase::Settle { remaining } => {
                    if remaining > 0 {
                        self.phase = DecodePhase::Settle {
                            remaining: remaining - 1,
                        };
                        return DecodeStatus::Pending;
                    }
                    env.progress.report(INITIALIZING, 1.0);
                    self.phase = DecodePhase::Deserialize;
                }
                DecodePhase::Deserialize => {
                    self.deserialize(env);
                    self.phase = DecodePhase::Fixup;
                }
                DecodePhase::Fixup => {
                    self.run_fixups(env);
                    self.phase = DecodePhase::Finalize;
                }
                DecodePhase::Finalize => {
                    self.finalize(env);
                    self.phase = DecodePhase::Complete;
                }
                DecodePhase::Complete => return DecodeStatus::Complete(self.state.report.clone()),
            }
        }
    }

    /// Polls until the decode completes, ignoring the settle yields.
    pub fn run_to_completion(&mut self, env: &mut DecodeEnv<'_>) -> DecodeReport {
        loop {
            if let DecodeStatus::Complete(report) = self.poll(env) {
                return report;
            }
        }
    }

    fn reconcile(&mut self, env: &mut DecodeEnv<'_>) {
        if !self.delete_unmatched {
            return;
        }
        let keep: HashSet<&str> = self
            .data
            .stored_object_names
            .iter()
            .map(|item| item.name.as_str())
            .collect();
        for (entity, id, _tag) in env.identity.tagged_entities(&*env.scene) {
            if keep.contains(id.as_str()) || !env.scene.is_alive(entity) {
                continue;
            }
            if !self.state.hooks.on_destroy_entity(&id, entity) {
                continue;
            }
            env.scene.destroy(entity);
            self.state.report.destroyed += 1;
        }
        env.identity.prune(&*env.scene);
    }

    fn materialize(&mut self, env: &mut DecodeEnv<'_>) {
        // Template roots first, outermost first, so their subtrees claim the
        // child ids before nested instances or bare entities are created for them.
        let (mut roots, plain): (Vec<&StoredItem>, Vec<&StoredItem>) =
            self.data.stored_object_names.iter().partition(|item| item.is_template());
        let parents: HashMap<&str, Option<&str>> = self
            .data
            .stored_object_names
            .iter()
            .map(|item| (item.name.as_str(), item.parent_name.as_deref()))
            .collect();
        roots.sort_by_key(|item| manifest_depth(&parents, item));

        for item in roots.into_iter().chain(plain) {
            if env.identity.resolve(&*env.scene, &item.name).is_some() {
                continue;
            }
            if !self.state.hooks.on_create_entity(item) {
                continue;
            }
            let Some(root) = env.scene.instantiate(&item.class_id) else {
                log::warn!(
                    "Could not instantiate '{}' (class '{}') for '{}'",
                    item.game_object_name,
                    item.class_id,
                    item.name
                );
                self.state.report.skipped_entities.push(item.name.clone());
                continue;
            };
            env.identity.set_id(root, item.name.clone());

            if !item.child_ids.is_empty() {
                for (child, id) in tagged_descendants(&*env.scene, root).into_iter().zip(&item.child_ids) {
                    env.identity.set_id(child, id.clone());
                }
            } else if !item.children.is_empty() {
                let mut cursors: HashMap<String, usize> = HashMap::new();
                for child in store_capable_descendants(&*env.scene, root) {
                    let class_id = env
                        .scene
                        .identity_tag(child)
                        .map(|t| t.class_id)
                        .unwrap_or_default();
                    let Some(ids) = item.child_group(&class_id) else {
                        continue;
                    };
                    let cursor = cursors.entry(class_id).or_insert(0);
                    if let Some(id) = ids.get(*cursor) {
                        env.identity.set_id(child, id.clone());
                    }
                    *cursor += 1;
                }
            }
            self.state.report.materialized += 1;
        }
    }

    fn reconcile_components(&mut self, env: &mut DecodeEnv<'_>) {
        for item in &self.data.stored_object_names {
            let Some(entity) = env.identity.resolve(&*env.scene, &item.name) else {
                log::warn!("Could not find '{}' ({}) after materialization", item.name, item.game_object_name);
                continue;
            };
            self.state.report.loaded_entities.push(item.name.clone());

            // An empty set means the entry predates component tracking; keep everything.
            if !item.components.is_empty() {
                for cid in env.scene.components(entity) {
                    let Some(type_name) = env.scene.component(cid).map(|c| c.type_name()) else {
                        continue;
                    };
                    if !item.components.contains(type_name) {
                        env.scene.remove_component(cid);
                        self.state.report.removed_components += 1;
                    }
                }
            }
            env.scene.set_active(entity, item.active);
        }
    }

    fn reparent(&mut self, env: &mut DecodeEnv<'_>) {
        for item in &self.data.stored_object_names {
            let Some(parent_id) = item.parent_name.as_deref() else {
                continue;
            };
            let Some(child) = env.identity.resolve(&*env.scene, &item.name) else {
                continue;
            };
            let Some(parent) = env.identity.resolve(&*env.scene, parent_id) else {
                log::warn!("Parent '{}' of '{}' does not exist", parent_id, item.name);
                continue;
            };
            if env.scene.parent(child) != Some(parent) {
                env.scene.set_parent(child, Some(parent));
            }
        }
    }

    fn deserialize(&mut self, env: &mut DecodeEnv<'_>) {
        let total = self.data.stored_items.len();
        let mut loading = PhaseProgress::new(env.progress, "Loading");
        let mut done = 0;

        for group in self.data.grouped_records() {
            let Some(entity) = env.identity.resolve(&*env.scene, group.name) else {
                log::warn!("Entity '{}' was null; its component records are skipped", group.name);
                done += group.types.iter().map(|t| t.records.len()).sum::<usize>();
                loading.advance(done, total);
                continue;
            };

            for types in group.types {
                done += types.records.len();
                loading.advance(done, total);
                let type_name = types.type_name;

                let known = env.serializers.types().contains(type_name)
                    || env.serializers.resolve_custom(type_name).is_some();
                if !known {
                    log::warn!("Stored type '{}' is unknown; its records are skipped", type_name);
                    self.state.report.skipped_types.push(type_name.to_string());
                    continue;
                }
                if !self.state.hooks.on_load_component(group.name, type_name) {
                    continue;
                }
                let Some(plugin) = env.serializers.resolve(type_name) else {
                    log::debug!("'{}' is not serializable; its records are skipped", type_name);
                    continue;
                };

                if plugin.defers_mutation() {
                    self.state.fixups.push_group(DeferredGroup {
                        entity_id: group.name.to_string(),
                        type_name: type_name.to_string(),
                        records: types.records.iter().map(|r| r.data.clone()).collect(),
                    });
                    continue;
                }
                let records: Vec<&[u8]> = types.records.iter().map(|r| r.data.as_slice()).collect();
                self.state
                    .restore(env, entity, group.name, type_name, &records, plugin.as_ref());
            }
        }
        if total == 0 {
            loading.set(1.0);
        }
    }

    fn run_fixups(&mut self, env: &mut DecodeEnv<'_>) {
        while let Some(fixup) = self.state.fixups.pop() {
            self.state.report.fixups_run += 1;
            match fixup {
                Fixup::Resolve(reference) => self.state.apply(env, reference),
                Fixup::Deserialize(group) => {
                    let Some(entity) = env.identity.resolve(&*env.scene, &group.entity_id) else {
                        log::warn!("Entity '{}' vanished before its deferred records", group.entity_id);
                        continue;
                    };
                    let Some(plugin) = env.serializers.resolve(&group.type_name) else {
                        continue;
                    };
                    let records: Vec<&[u8]> = group.records.iter().map(Vec::as_slice).collect();
                    self.state.restore(
                        env,
                        entity,
                        &group.entity_id,
                        &group.type_name,
                        &records,
                        plugin.as_ref(),
                    );
                }
            }
        }
    }

    fn finalize(&mut self, env: &mut DecodeEnv<'_>) {
        self.state.fixups.clear();
        for entity in env.scene.entities() {
            env.scene.send_message(entity, ON_DESERIALIZED);
        }
        let report = &self.state.report;
        log::info!(
            "Restored level '{}': {} entities, {} components ({} failed), {} fixups",
            self.data.name,
            report.loaded_entities.len(),
            report.restored_components,
            report.failed_components,
            report.fixups_run
        );
    }
}

impl DecodeState {
    /// Matches live components of one type to its records, adding or removing
    /// instances as needed, then decodes each record into its instance.
    fn restore(
        &mut self,
        env: &mut DecodeEnv<'_>,
        entity: EntityHandle,
        entity_id: &str,
        type_name: &str,
        records: &[&[u8]],
        plugin: &dyn SerializerPlugin,
    ) {
        let mut live: Vec<ComponentId> = env
            .scene
            .components(entity)
            .into_iter()
            .filter(|cid| env.scene.component(*cid).is_some_and(|c| c.type_name() == type_name))
            .collect();

        while live.len() > records.len() {
            if let Some(extra) = live.pop() {
                env.scene.remove_component(extra);
            }
        }
        while live.len() < records.len() {
            match env.scene.add_component(entity, type_name) {
                Some(cid) => live.push(cid),
                None => {
                    log::warn!("The host refused to add '{}' to '{}'", type_name, entity_id);
                    break;
                }
            }
        }

        for (record, cid) in records.iter().zip(live) {
            let Some(component) = env.scene.component_mut(cid) else {
                continue;
            };
            let mut cx = DecodeContext {
                identity: &*env.identity,
                assets: env.assets,
                types: env.serializers.types(),
                fixups: &mut self.fixups,
                component: cid,
                entity_id,
            };
            match plugin.deserialize(record, component, &mut cx) {
                Ok(()) => {
                    self.report.restored_components += 1;
                    self.hooks.on_loaded_component(entity_id, cid);
                }
                Err(e) => {
                    log::warn!(
                        "Failed to restore '{}' on '{}' with {}: {:#}",
                        type_name,
                        entity_id,
                        plugin.name(),
                        e
                    );
                    self.report.failed_components += 1;
                }
            }
        }
    }

    fn apply(&mut self, env: &mut DecodeEnv<'_>, reference: DeferredRef) {
        let value = {
            let live = LiveIndex {
                scene: &*env.scene,
                identity: &*env.identity,
                assets: env.assets,
            };
            self.resolvers.resolve(&reference, &live)
        };
        let Some(value) = value else {
            log::warn!("Deferred {:?} reference could not be resolved", reference.kind);
            return;
        };

        match reference.target {
            FixupTarget::Discard => {}
            FixupTarget::Field { component, field } => {
                let types = env.serializers.types();
                let Some(instance) = env.scene.component_mut(component) else {
                    log::warn!("Component for deferred field '{}' no longer exists", field);
                    return;
                };
                let Some(descriptor) = types.get(instance.type_name()).and_then(|info| info.field_named(&field))
                else {
                    log::warn!("'{}' has no field '{}'", instance.type_name(), field);
                    return;
                };
                if !descriptor.set(instance, value) {
                    log::warn!("Field '{}' of '{}' rejected its resolved value", field, instance.type_name());
                }
            }
        }
    }
}
