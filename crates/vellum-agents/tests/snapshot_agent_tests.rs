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

use std::{
    any::Any,
    sync::{Arc, Mutex},
};

use vellum_agents::{AgentError, SaveOutcome, SerializationMode, SnapshotAgent, SnapshotConfig};
use vellum_core::{
    event::SnapshotEvent,
    scene::{EntityHandle, IdentityTag, SceneBackend},
    storage::{KeyValueStore, MemoryStore},
    Component,
};
use vellum_data::{SceneWorld, TypeInfo, TypeRegistry, Value};

#[derive(Debug, Default, Clone, PartialEq)]
struct Health {
    points: i64,
}

impl Component for Health {
    fn type_name(&self) -> &'static str {
        "game::Health"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A store that outlives the agent owning it.
#[derive(Clone, Default)]
struct SharedStore(Arc<Mutex<MemoryStore>>);

impl KeyValueStore for SharedStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.0.lock().ok()?.get_string(key)
    }

    fn set_string(&mut self, key: &str, value: String) {
        if let Ok(mut store) = self.0.lock() {
            store.set_string(key, value);
        }
    }
}

fn types() -> Arc<TypeRegistry> {
    Arc::new(TypeRegistry::new().with(TypeInfo::component::<Health>("game::Health").field::<Health>(
        "points",
        |h| Value::Int(h.points),
        |h, v| v.as_int().map(|p| h.points = p).is_some(),
    )))
}

fn config(mode: SerializationMode) -> SnapshotConfig {
    SnapshotConfig {
        player_name: "ada".into(),
        serialization_mode: mode,
        ..SnapshotConfig::default()
    }
}

/// A scene with one stored entity, `hero`, at 10 health.
fn arena(types: &Arc<TypeRegistry>) -> (SceneWorld, EntityHandle) {
    let mut scene = SceneWorld::new("arena", types.clone());
    let hero = scene.spawn("Hero", Some(IdentityTag::store().with_id("hero")));
    scene.attach(hero, Health { points: 10 });
    (scene, hero)
}

fn set_health(scene: &mut SceneWorld, hero: EntityHandle, points: i64) {
    if let Some(health) = scene.get_mut::<Health>(hero) {
        health.points = points;
    }
}

fn health(scene: &SceneWorld, hero: EntityHandle) -> Option<i64> {
    scene.get::<Health>(hero).map(|h| h.points)
}

#[test]
fn test_cache_mode_answers_with_state_captured_at_suspension() {
    // --- 1. ARRANGE ---
    let types = types();
    let (mut scene, hero) = arena(&types);
    let mut agent = SnapshotAgent::new(
        config(SerializationMode::CacheSerialization),
        types,
        Box::new(MemoryStore::new()),
    );

    // --- 2. ACT ---
    agent.suspend(&mut scene);
    set_health(&mut scene, hero, 99);
    let cached = agent.serialize_level(&mut scene, false).unwrap();
    let cached_again = agent.serialize_level(&mut scene, false).unwrap();
    let urgent = agent.serialize_level(&mut scene, true).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(cached, cached_again);
    assert_ne!(cached, urgent, "Urgent requests must encode the live scene");
    assert!(agent.can_resume(), "Suspension should record a resume point");
}

#[test]
fn test_cache_is_dropped_once_serialization_resumes() {
    // --- 1. ARRANGE ---
    let types = types();
    let (mut scene, hero) = arena(&types);
    let mut agent = SnapshotAgent::new(
        config(SerializationMode::CacheSerialization),
        types,
        Box::new(MemoryStore::new()),
    );
    agent.suspend(&mut scene);
    let cached = agent.serialize_level(&mut scene, false).unwrap();
    set_health(&mut scene, hero, 99);

    // --- 2. ACT ---
    agent.resume_serialization(&mut scene).unwrap();
    let fresh = agent.serialize_level(&mut scene, false).unwrap();

    // --- 3. ASSERT ---
    assert_ne!(cached, fresh);
}

#[test]
fn test_when_free_mode_refuses_and_queues_one_save() {
    // --- 1. ARRANGE ---
    let types = types();
    let (mut scene, _) = arena(&types);
    let mut agent = SnapshotAgent::new(
        config(SerializationMode::SerializeWhenFree),
        types,
        Box::new(MemoryStore::new()),
    );
    agent.suspend(&mut scene);

    // --- 2. ACT ---
    let direct = agent.serialize_level(&mut scene, false);
    let first = agent.save_game(&mut scene, "first", false).unwrap();
    let second = agent.save_game(&mut scene, "second", false).unwrap();
    let saved_while_suspended = agent.saved_games().len();
    let resumed = agent.resume_serialization(&mut scene).unwrap();

    // --- 3. ASSERT ---
    assert!(matches!(direct, Err(AgentError::Suspended { count: 1 })));
    assert_eq!(first, SaveOutcome::Queued);
    assert_eq!(second, SaveOutcome::Queued);
    assert_eq!(saved_while_suspended, 0);
    assert!(matches!(resumed, Some(SaveOutcome::Saved(ref entry)) if entry.name == "first"));
    assert_eq!(agent.saved_games().len(), 1);
}

#[test]
fn test_urgent_save_ignores_suspension() {
    // --- 1. ARRANGE ---
    let types = types();
    let (mut scene, _) = arena(&types);
    let mut agent = SnapshotAgent::new(
        config(SerializationMode::SerializeWhenFree),
        types,
        Box::new(MemoryStore::new()),
    );
    agent.suspend(&mut scene);

    // --- 2. ACT ---
    let outcome = agent.save_game(&mut scene, "quit", true).unwrap();

    // --- 3. ASSERT ---
    assert!(matches!(outcome, SaveOutcome::Saved(_)));
    assert_eq!(agent.saved_games()[0].name, "quit");
}

#[test]
fn test_slots_keep_the_most_recent_max_games() {
    // --- 1. ARRANGE ---
    let types = types();
    let (mut scene, _) = arena(&types);
    let mut agent = SnapshotAgent::new(
        SnapshotConfig {
            max_games: 3,
            ..config(SerializationMode::CacheSerialization)
        },
        types,
        Box::new(MemoryStore::new()),
    );

    // --- 2. ACT ---
    for i in 0..6 {
        agent.save_game(&mut scene, &format!("save{i}"), false).unwrap();
    }

    // --- 3. ASSERT ---
    let names: Vec<&str> = agent.saved_games().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["save5", "save4", "save3"]);
    assert!(agent
        .events()
        .drain()
        .contains(&SnapshotEvent::GameSaved { name: "save5".into() }));
}

#[test]
fn test_slots_survive_agent_reconstruction() {
    // --- 1. ARRANGE ---
    let types = types();
    let (mut scene, _) = arena(&types);
    let store = SharedStore::default();
    let mut agent = SnapshotAgent::new(
        config(SerializationMode::CacheSerialization),
        types.clone(),
        Box::new(store.clone()),
    );
    agent.save_game(&mut scene, "kept", false).unwrap();
    agent.save_game(&mut scene, "dropped", false).unwrap();
    agent.delete_saved_game(0);

    // --- 2. ACT ---
    let reopened = SnapshotAgent::new(config(SerializationMode::CacheSerialization), types, Box::new(store));

    // --- 3. ASSERT ---
    let names: Vec<&str> = reopened.saved_games().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["kept"]);
    assert!(reopened.can_resume());
}

#[test]
fn test_checkpoint_then_resume_restores_the_scene() {
    // --- 1. ARRANGE ---
    let types = types();
    let (mut scene, hero) = arena(&types);
    let mut agent = SnapshotAgent::new(
        config(SerializationMode::CacheSerialization),
        types,
        Box::new(MemoryStore::new()),
    );
    assert!(!agent.can_resume());
    agent.checkpoint(&mut scene, false).unwrap();
    set_health(&mut scene, hero, 1);

    // --- 2. ACT ---
    let started = agent.resume(&mut scene).unwrap();
    let report = agent.finish_loading(&mut scene);

    // --- 3. ASSERT ---
    assert!(started);
    assert!(report.is_some());
    assert!(!agent.is_deserializing());
    assert_eq!(scene.level_requests(), ["arena".to_string()]);
    assert_eq!(health(&scene, hero), Some(10));
    assert!(agent.events().drain().contains(&SnapshotEvent::Deserialized));
}

#[test]
fn test_requests_are_refused_while_decoding() {
    // --- 1. ARRANGE ---
    let types = types();
    let (mut scene, _) = arena(&types);
    let mut agent = SnapshotAgent::new(
        config(SerializationMode::CacheSerialization),
        types,
        Box::new(MemoryStore::new()),
    );
    agent.save_game(&mut scene, "one", false).unwrap();
    agent.load_saved_game(&mut scene, 0).unwrap();

    // --- 2. ACT ---
    let serialized = agent.serialize_level(&mut scene, true);
    let saved = agent.save_game(&mut scene, "two", true);
    let loaded = agent.load_saved_game(&mut scene, 0);

    // --- 3. ASSERT ---
    assert!(matches!(serialized, Err(AgentError::DecodeInProgress)));
    assert!(matches!(saved, Err(AgentError::DecodeInProgress)));
    assert!(matches!(loaded, Err(AgentError::DecodeInProgress)));
}

#[test]
fn test_ticks_complete_the_decode_exactly_once() {
    // --- 1. ARRANGE ---
    let types = types();
    let (mut scene, _) = arena(&types);
    let mut agent = SnapshotAgent::new(
        config(SerializationMode::CacheSerialization),
        types,
        Box::new(MemoryStore::new()),
    );
    agent.save_game(&mut scene, "one", false).unwrap();
    agent.load_saved_game(&mut scene, 0).unwrap();

    // --- 2. ACT ---
    let mut reports = 0;
    for _ in 0..32 {
        if agent.tick(&mut scene).is_some() {
            reports += 1;
        }
    }

    // --- 3. ASSERT ---
    assert_eq!(reports, 1);
    assert!(!agent.is_deserializing());
}

#[test]
fn test_uncompressed_saves_are_tagged_text_and_load_back() {
    // --- 1. ARRANGE ---
    let types = types();
    let (mut scene, hero) = arena(&types);
    let mut agent = SnapshotAgent::new(
        SnapshotConfig {
            use_compression: false,
            ..config(SerializationMode::CacheSerialization)
        },
        types,
        Box::new(MemoryStore::new()),
    );

    // --- 2. ACT ---
    agent.save_game(&mut scene, "plain", false).unwrap();
    set_health(&mut scene, hero, 3);
    agent.load_saved_game(&mut scene, 0).unwrap();
    agent.finish_loading(&mut scene);

    // --- 3. ASSERT ---
    assert!(agent.saved_games()[0].data.starts_with("NOCOMPRESSION"));
    assert_eq!(health(&scene, hero), Some(10));
}

#[test]
fn test_scoped_bytes_rebuild_a_destroyed_entity() {
    // --- 1. ARRANGE ---
    let types = types();
    let (mut scene, hero) = arena(&types);
    let mut agent = SnapshotAgent::new(
        config(SerializationMode::CacheSerialization),
        types,
        Box::new(MemoryStore::new()),
    );
    let bytes = agent.serialize_scope(&mut scene, "hero", false).unwrap();
    scene.destroy(hero);

    // --- 2. ACT ---
    agent.load_now(&bytes, false).unwrap();
    agent.finish_loading(&mut scene);

    // --- 3. ASSERT ---
    let rebuilt = agent.identity().lookup("hero").expect("hero should be rebuilt");
    assert_ne!(rebuilt, hero);
    assert_eq!(health(&scene, rebuilt), Some(10));
}

#[test]
fn test_ignored_types_are_left_out_of_snapshots() {
    // --- 1. ARRANGE ---
    let types = types();
    let (mut scene, hero) = arena(&types);
    let mut agent = SnapshotAgent::new(
        config(SerializationMode::CacheSerialization),
        types,
        Box::new(MemoryStore::new()),
    );
    agent.ignore_type("game::Health");

    // --- 2. ACT ---
    let data = agent.encode_level(&mut scene, None).unwrap();
    agent.unignore_type("game::Health");
    let restored = agent.encode_level(&mut scene, None).unwrap();

    // --- 3. ASSERT ---
    assert!(data.stored_items.iter().all(|r| r.type_name != "game::Health"));
    assert!(restored.stored_items.iter().any(|r| r.type_name == "game::Health"));
    assert!(scene.is_alive(hero));
}
