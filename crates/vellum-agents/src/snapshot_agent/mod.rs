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

//! The agent responsible for taking, storing and restoring snapshots.
//!
//! The [`SnapshotAgent`] owns the identity and serializer registries, the save
//! slot book and the suspension gate. Saving runs the graph encoder and seals
//! the result through the envelope lane; loading opens a sealed snapshot and
//! starts a [`GraphDecoder`], which the host then drives with [`SnapshotAgent::tick`].

mod config;
mod error;
mod slots;

pub use config::{SerializationMode, SnapshotConfig};
pub use error::AgentError;
pub use slots::SaveSlots;

use std::{collections::HashSet, sync::Arc};

use vellum_core::{
    codec::CompressionCodec,
    event::{EventBus, SnapshotEvent},
    lane::{Lane, LaneKind},
    progress::{NullProgress, ProgressSink},
    scene::SceneBackend,
    storage::KeyValueStore,
};
use vellum_data::{AssetStore, IdentityRegistry, LevelData, SaveEntry, TypeRegistry};
use vellum_lanes::{
    envelope_lane, DecodeEnv, DecodeHooks, DecodeReport, DecodeStatus, DeflateCodec, EncodeOptions, GraphDecoder,
    GraphEncoder, NoHooks, SerializerRegistry, StoreFilter,
};

/// The store key of the serialized save-slot book.
pub const SAVE_GAME_DATA_KEY: &str = "_Save_Game_Data_";
/// The save name used for checkpoints and suspension caches.
pub const RESUME_SAVE_NAME: &str = "Resume";
/// Undrained events kept on the agent's bus; older ones are dropped.
pub const EVENT_CAPACITY: usize = 64;

/// The result of a save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The save was taken and stored.
    Saved(SaveEntry),
    /// Serialization is suspended; the save runs once it resumes.
    Queued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveKind {
    Slot,
    Checkpoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingSave {
    name: String,
    kind: SaveKind,
}

/// The coordinator of every snapshot operation.
pub struct SnapshotAgent {
    config: SnapshotConfig,
    serializers: SerializerRegistry,
    identity: IdentityRegistry,
    assets: AssetStore,
    codec: Box<dyn CompressionCodec>,
    store: Box<dyn KeyValueStore>,
    slots: SaveSlots,
    suspension_count: u32,
    cached_state: Option<SaveEntry>,
    pending_save: Option<PendingSave>,
    ignore_types: HashSet<String>,
    store_filter: Option<Box<StoreFilter>>,
    active_decode: Option<GraphDecoder>,
    events: EventBus<SnapshotEvent>,
    progress: Box<dyn ProgressSink>,
}

impl SnapshotAgent {
    /// Creates an agent and restores the save-slot book from `store`.
    ///
    /// Plugins declared with `inventory` are registered automatically; a
    /// corrupt slot book is logged and replaced by an empty one.
    pub fn new(config: SnapshotConfig, types: Arc<TypeRegistry>, store: Box<dyn KeyValueStore>) -> Self {
        let slots = match store.get_string(SAVE_GAME_DATA_KEY) {
            Some(text) => SaveSlots::from_encoded_string(&text).unwrap_or_else(|e| {
                log::warn!("Discarding unreadable save-slot book: {}", e);
                SaveSlots::new()
            }),
            None => SaveSlots::new(),
        };
        let codec = Box::new(DeflateCodec::new(config.compression_level));
        Self {
            config,
            serializers: SerializerRegistry::with_declarations(types),
            identity: IdentityRegistry::new(),
            assets: AssetStore::new(),
            codec,
            store,
            slots,
            suspension_count: 0,
            cached_state: None,
            pending_save: None,
            ignore_types: HashSet::new(),
            store_filter: None,
            active_decode: None,
            events: EventBus::bounded(EVENT_CAPACITY),
            progress: Box::new(NullProgress),
        }
    }

    /// Replaces the compression codec. A codec that is not an envelope lane
    /// is refused and the current one kept.
    pub fn with_codec(mut self, codec: Box<dyn CompressionCodec>) -> Self {
        if codec.lane_kind() != LaneKind::Envelope {
            log::warn!(
                "'{}' is a {} lane, not an envelope lane; keeping '{}'",
                codec.strategy_name(),
                codec.lane_kind(),
                self.codec.strategy_name()
            );
            return self;
        }
        log::debug!("Sealing snapshots with '{}'", codec.strategy_name());
        self.codec = codec;
        self
    }

    /// Installs a progress sink for every subsequent operation.
    pub fn set_progress_sink(&mut self, progress: Box<dyn ProgressSink>) {
        self.progress = progress;
    }

    /// The configuration.
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// The identity registry.
    pub fn identity(&self) -> &IdentityRegistry {
        &self.identity
    }

    /// Mutable access to the identity registry.
    pub fn identity_mut(&mut self) -> &mut IdentityRegistry {
        &mut self.identity
    }

    /// The serializer registry.
    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    /// Mutable access to the serializer registry, to register plugins.
    pub fn serializers_mut(&mut self) -> &mut SerializerRegistry {
        &mut self.serializers
    }

    /// The asset store.
    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Mutable access to the asset store, to register shared assets.
    pub fn assets_mut(&mut self) -> &mut AssetStore {
        &mut self.assets
    }

    /// The bus on which snapshot events are published. It keeps the newest
    /// [`EVENT_CAPACITY`] undrained events, so hosts should drain it every frame.
    pub fn events(&self) -> &EventBus<SnapshotEvent> {
        &self.events
    }

    /// The persistent store.
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// The save-slot book.
    pub fn slots(&self) -> &SaveSlots {
        &self.slots
    }

    /// The configured player's saves, most recent first.
    pub fn saved_games(&self) -> &[SaveEntry] {
        self.slots.entries(&self.config.player_name)
    }

    /// Never store components of this type.
    pub fn ignore_type(&mut self, type_name: impl Into<String>) {
        self.ignore_types.insert(type_name.into());
    }

    /// Undoes [`SnapshotAgent::ignore_type`].
    pub fn unignore_type(&mut self, type_name: &str) {
        self.ignore_types.remove(type_name);
    }

    /// Installs a host veto over which entities are stored.
    pub fn set_store_filter(&mut self, filter: Box<StoreFilter>) {
        self.store_filter = Some(filter);
    }

    /// Removes the store filter.
    pub fn clear_store_filter(&mut self) {
        self.store_filter = None;
    }

    // --- Suspension ---

    /// Returns `true` while at least one suspension is active.
    pub fn is_suspended(&self) -> bool {
        self.suspension_count > 0
    }

    /// The number of active suspensions.
    pub fn suspension_count(&self) -> u32 {
        self.suspension_count
    }

    /// Suspends serialization. Nestable; each call must be matched by one
    /// [`SnapshotAgent::resume_serialization`].
    ///
    /// The first suspension publishes `SuspendingSerialization` and, in cache
    /// mode, captures the state that non-urgent requests receive meanwhile.
    pub fn suspend(&mut self, scene: &mut dyn SceneBackend) {
        if self.suspension_count == 0 {
            self.events.publish(SnapshotEvent::SuspendingSerialization);
            if self.config.serialization_mode == SerializationMode::CacheSerialization {
                match self.create_save_entry(scene, RESUME_SAVE_NAME, true) {
                    Ok(entry) => {
                        if self.config.save_resume_information {
                            self.write_resume_point(&entry);
                        }
                        self.cached_state = Some(entry);
                    }
                    Err(e) => log::warn!("Could not cache the state at suspension: {}", e),
                }
            }
        }
        self.suspension_count += 1;
        log::debug!("Serialization suspended ({} deep)", self.suspension_count);
    }

    /// Releases one suspension. When the last one is released,
    /// `ResumingSerialization` is published and a queued save runs; its
    /// outcome is returned.
    pub fn resume_serialization(&mut self, scene: &mut dyn SceneBackend) -> Result<Option<SaveOutcome>, AgentError> {
        if self.suspension_count == 0 {
            log::warn!("Unbalanced resume: serialization was not suspended");
            return Ok(None);
        }
        self.suspension_count -= 1;
        if self.suspension_count > 0 {
            return Ok(None);
        }

        self.cached_state = None;
        self.events.publish(SnapshotEvent::ResumingSerialization);
        match self.pending_save.take() {
            Some(pending) => self.perform_save(scene, &pending.name, false, pending.kind).map(Some),
            None => Ok(None),
        }
    }

    // --- Saving ---

    /// Encodes the scene, or the subtree rooted at `scope`, without sealing it.
    pub fn encode_level(&mut self, scene: &mut dyn SceneBackend, scope: Option<&str>) -> Result<LevelData, AgentError> {
        let options = EncodeOptions {
            scope,
            ignore_types: Some(&self.ignore_types),
            filter: self.store_filter.as_deref(),
        };
        let encoder = GraphEncoder::new(&self.serializers, &self.assets);
        log::trace!("Running {} lane '{}'", encoder.lane_kind(), encoder.strategy_name());
        let data = encoder.encode(
            scene,
            &mut self.identity,
            options,
            self.progress.as_ref(),
        )?;
        Ok(data)
    }

    /// Produces the sealed snapshot text of the whole scene.
    ///
    /// While suspended, a non-urgent request gets the cached state in cache
    /// mode and fails with [`AgentError::Suspended`] otherwise.
    pub fn serialize_level(&mut self, scene: &mut dyn SceneBackend, urgent: bool) -> Result<String, AgentError> {
        if self.is_deserializing() {
            return Err(AgentError::DecodeInProgress);
        }
        if self.is_suspended() && !urgent {
            match self.config.serialization_mode {
                SerializationMode::CacheSerialization => match &self.cached_state {
                    Some(cached) => return Ok(cached.data.clone()),
                    None => log::warn!("Suspended without a cached state; encoding the live scene"),
                },
                SerializationMode::SerializeWhenFree => {
                    return Err(AgentError::Suspended {
                        count: self.suspension_count,
                    })
                }
            }
        }

        let data = self.encode_level(scene, None)?;
        let bytes = data.to_bytes()?;
        let codec = self.config.use_compression.then_some(self.codec.as_ref());
        Ok(envelope_lane::seal(&bytes, codec, self.progress.as_ref())?)
    }

    /// Produces the raw snapshot bytes of the subtree rooted at the entity
    /// with id `root`, for [`SnapshotAgent::load_now`].
    pub fn serialize_scope(&mut self, scene: &mut dyn SceneBackend, root: &str, urgent: bool) -> Result<Vec<u8>, AgentError> {
        if self.is_deserializing() {
            return Err(AgentError::DecodeInProgress);
        }
        if self.is_suspended() && !urgent {
            return Err(AgentError::Suspended {
                count: self.suspension_count,
            });
        }
        Ok(self.encode_level(scene, Some(root))?.to_bytes()?)
    }

    /// Builds a save entry for the current level.
    pub fn create_save_entry(
        &mut self,
        scene: &mut dyn SceneBackend,
        name: &str,
        urgent: bool,
    ) -> Result<SaveEntry, AgentError> {
        let data = self.serialize_level(scene, urgent)?;
        Ok(SaveEntry::new(name, scene.loaded_level(), data))
    }

    /// Saves the game into the configured player's slots.
    pub fn save_game(&mut self, scene: &mut dyn SceneBackend, name: &str, urgent: bool) -> Result<SaveOutcome, AgentError> {
        self.request_save(scene, name, urgent, SaveKind::Slot)
    }

    /// Overwrites the player's resume point.
    pub fn checkpoint(&mut self, scene: &mut dyn SceneBackend, urgent: bool) -> Result<SaveOutcome, AgentError> {
        self.request_save(scene, RESUME_SAVE_NAME, urgent, SaveKind::Checkpoint)
    }

    /// Deletes one of the configured player's saves.
    pub fn delete_saved_game(&mut self, index: usize) -> Option<SaveEntry> {
        let removed = self.slots.remove(&self.config.player_name, index);
        if removed.is_some() {
            self.persist_slots();
        }
        removed
    }

    // --- Loading ---

    /// Returns `true` while a decode is running.
    pub fn is_deserializing(&self) -> bool {
        self.active_decode.is_some()
    }

    /// Returns `true` if the player has a resume point.
    pub fn can_resume(&self) -> bool {
        self.store
            .get_string(&self.config.resume_key())
            .is_some_and(|text| !text.is_empty())
    }

    /// Starts loading the player's resume point. Returns `false` when there is none.
    pub fn resume(&mut self, scene: &mut dyn SceneBackend) -> Result<bool, AgentError> {
        let Some(text) = self.store.get_string(&self.config.resume_key()).filter(|t| !t.is_empty()) else {
            return Ok(false);
        };
        let entry = SaveEntry::from_encoded_string(&text)?;
        self.load(scene, &entry)?;
        Ok(true)
    }

    /// Starts loading one of the configured player's saves.
    pub fn load_saved_game(&mut self, scene: &mut dyn SceneBackend, index: usize) -> Result<bool, AgentError> {
        let Some(entry) = self.saved_games().get(index).cloned() else {
            return Ok(false);
        };
        self.load(scene, &entry)?;
        Ok(true)
    }

    /// Starts loading a save entry: asks the host for the entry's level, then
    /// starts a decode that replaces every unmatched tagged entity.
    pub fn load(&mut self, scene: &mut dyn SceneBackend, entry: &SaveEntry) -> Result<(), AgentError> {
        self.load_with_hooks(scene, entry, Box::new(NoHooks))
    }

    /// [`SnapshotAgent::load`] with host decode hooks.
    pub fn load_with_hooks(
        &mut self,
        scene: &mut dyn SceneBackend,
        entry: &SaveEntry,
        hooks: Box<dyn DecodeHooks>,
    ) -> Result<(), AgentError> {
        if self.is_deserializing() {
            return Err(AgentError::DecodeInProgress);
        }
        let bytes = envelope_lane::open(&entry.data, self.codec.as_ref(), self.progress.as_ref())?;
        let data = LevelData::from_bytes(&bytes)?;
        log::info!("Loading save '{}' of level '{}'", entry.name, data.name);
        scene.load_level(&data.name);
        self.start_decode(data, true, hooks);
        Ok(())
    }

    /// Starts decoding raw snapshot bytes into the current scene, without
    /// reloading the level.
    pub fn load_now(&mut self, data: &[u8], delete_unmatched: bool) -> Result<(), AgentError> {
        self.load_now_with_hooks(data, delete_unmatched, Box::new(NoHooks))
    }

    /// [`SnapshotAgent::load_now`] with host decode hooks.
    pub fn load_now_with_hooks(
        &mut self,
        data: &[u8],
        delete_unmatched: bool,
        hooks: Box<dyn DecodeHooks>,
    ) -> Result<(), AgentError> {
        if self.is_deserializing() {
            return Err(AgentError::DecodeInProgress);
        }
        let data = LevelData::from_bytes(data)?;
        self.start_decode(data, delete_unmatched, hooks);
        Ok(())
    }

    /// Advances the running decode by one host frame. Returns the report when
    /// the decode completes on this tick.
    pub fn tick(&mut self, scene: &mut dyn SceneBackend) -> Option<DecodeReport> {
        let decoder = self.active_decode.as_mut()?;
        let mut env = DecodeEnv {
            scene,
            identity: &mut self.identity,
            serializers: &self.serializers,
            assets: &self.assets,
            progress: self.progress.as_ref(),
        };
        match decoder.poll(&mut env) {
            DecodeStatus::Pending => None,
            DecodeStatus::Complete(report) => {
                self.active_decode = None;
                self.events.publish(SnapshotEvent::Deserialized);
                Some(report)
            }
        }
    }

    /// Ticks until the running decode completes.
    pub fn finish_loading(&mut self, scene: &mut dyn SceneBackend) -> Option<DecodeReport> {
        while self.is_deserializing() {
            if let Some(report) = self.tick(scene) {
                return Some(report);
            }
        }
        None
    }

    // --- Internals ---

    fn request_save(
        &mut self,
        scene: &mut dyn SceneBackend,
        name: &str,
        urgent: bool,
        kind: SaveKind,
    ) -> Result<SaveOutcome, AgentError> {
        if self.is_deserializing() {
            return Err(AgentError::DecodeInProgress);
        }
        if self.is_suspended() && !urgent && self.config.serialization_mode == SerializationMode::SerializeWhenFree {
            match &self.pending_save {
                Some(pending) => log::debug!("A save ('{}') is already queued; ignoring '{}'", pending.name, name),
                None => {
                    self.pending_save = Some(PendingSave {
                        name: name.to_string(),
                        kind,
                    })
                }
            }
            return Ok(SaveOutcome::Queued);
        }
        self.perform_save(scene, name, urgent, kind)
    }

    fn perform_save(
        &mut self,
        scene: &mut dyn SceneBackend,
        name: &str,
        urgent: bool,
        kind: SaveKind,
    ) -> Result<SaveOutcome, AgentError> {
        let entry = self.create_save_entry(scene, name, urgent)?;
        match kind {
            SaveKind::Slot => {
                let evicted = self
                    .slots
                    .insert(&self.config.player_name, entry.clone(), self.config.max_games);
                for old in evicted {
                    log::debug!("Evicted save '{}'", old.caption());
                }
                self.persist_slots();
                if self.config.save_resume_information {
                    self.write_resume_point(&entry);
                }
                self.events.publish(SnapshotEvent::GameSaved {
                    name: entry.name.clone(),
                });
            }
            SaveKind::Checkpoint => self.write_resume_point(&entry),
        }
        Ok(SaveOutcome::Saved(entry))
    }

    fn start_decode(&mut self, data: LevelData, delete_unmatched: bool, hooks: Box<dyn DecodeHooks>) {
        let decoder = GraphDecoder::new(data, delete_unmatched)
            .with_settle_frames(self.config.settle_frames)
            .with_hooks(hooks);
        log::debug!(
            "Starting {} lane '{}' for level '{}'",
            decoder.lane_kind(),
            decoder.strategy_name(),
            decoder.level()
        );
        self.active_decode = Some(decoder);
    }

    fn persist_slots(&mut self) {
        match self.slots.to_encoded_string() {
            Ok(text) => self.store.set_string(SAVE_GAME_DATA_KEY, text),
            Err(e) => log::error!("Could not persist the save-slot book: {}", e),
        }
    }

    fn write_resume_point(&mut self, entry: &SaveEntry) {
        match entry.to_encoded_string() {
            Ok(text) => {
                let key = self.config.resume_key();
                self.store.set_string(&key, text);
            }
            Err(e) => log::error!("Could not write the resume point: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use vellum_core::storage::MemoryStore;
    use vellum_data::SceneWorld;

    use super::*;

    fn agent() -> (SnapshotAgent, SceneWorld) {
        let types = Arc::new(TypeRegistry::new());
        let scene = SceneWorld::new("level", types.clone());
        let agent = SnapshotAgent::new(SnapshotConfig::default(), types, Box::new(MemoryStore::new()));
        (agent, scene)
    }

    #[test]
    fn unbalanced_resume_is_ignored() {
        let (mut agent, mut scene) = agent();
        assert_eq!(agent.resume_serialization(&mut scene).unwrap(), None);
        assert_eq!(agent.suspension_count(), 0);
    }

    #[test]
    fn nested_suspensions_publish_once_each_way() {
        let (mut agent, mut scene) = agent();

        agent.suspend(&mut scene);
        agent.suspend(&mut scene);
        agent.resume_serialization(&mut scene).unwrap();
        assert!(agent.is_suspended());
        agent.resume_serialization(&mut scene).unwrap();

        assert!(!agent.is_suspended());
        assert_eq!(
            agent.events().drain(),
            vec![SnapshotEvent::SuspendingSerialization, SnapshotEvent::ResumingSerialization]
        );
    }

    #[test]
    fn undrained_events_are_capped() {
        let (mut agent, mut scene) = agent();

        for _ in 0..EVENT_CAPACITY {
            agent.suspend(&mut scene);
            agent.resume_serialization(&mut scene).unwrap();
        }

        let events = agent.events().drain();
        assert_eq!(events.len(), EVENT_CAPACITY);
        assert_eq!(events.last(), Some(&SnapshotEvent::ResumingSerialization));
    }

    struct MisfiledCodec;

    impl Lane for MisfiledCodec {
        fn strategy_name(&self) -> &'static str {
            "MISFILED"
        }

        fn lane_kind(&self) -> LaneKind {
            LaneKind::Encode
        }
    }

    impl CompressionCodec for MisfiledCodec {
        fn properties(&self) -> [u8; vellum_core::scene::CODEC_PROPERTIES_LEN] {
            [0; vellum_core::scene::CODEC_PROPERTIES_LEN]
        }

        fn compress(&self, input: &[u8], _progress: &dyn ProgressSink) -> Result<Vec<u8>, vellum_core::codec::CodecError> {
            Ok(input.to_vec())
        }

        fn decompress(
            &self,
            _properties: [u8; vellum_core::scene::CODEC_PROPERTIES_LEN],
            payload: &[u8],
            _limit: u64,
            _progress: &dyn ProgressSink,
        ) -> Result<Vec<u8>, vellum_core::codec::CodecError> {
            Ok(payload.to_vec())
        }
    }

    #[test]
    fn codecs_of_another_lane_kind_are_refused() {
        let (agent, _scene) = agent();

        let agent = agent.with_codec(Box::new(MisfiledCodec));

        assert_eq!(agent.codec.strategy_name(), "VL_DEFLATE_V1");
        assert_eq!(agent.codec.lane_kind(), LaneKind::Envelope);
    }

    #[test]
    fn corrupt_slot_book_starts_empty() {
        let mut store = MemoryStore::new();
        store.set_string(SAVE_GAME_DATA_KEY, "not a book".into());
        let agent = SnapshotAgent::new(
            SnapshotConfig::default(),
            Arc::new(TypeRegistry::new()),
            Box::new(store),
        );
        assert!(agent.saved_games().is_empty());
    }
}
