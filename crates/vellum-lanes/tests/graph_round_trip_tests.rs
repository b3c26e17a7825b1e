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

//! Integration tests: encode a live scene, decode it into another one.

mod common;

use std::{collections::HashSet, sync::Arc};

use common::{live, Boss, Fragile, Follower, Harness, Route, Score, Skin, Transform};
use vellum_core::scene::{EntityHandle, IdentityTag, SceneBackend};
use vellum_data::{Asset, IdentityRegistry, LevelData, StoredAsset, StoredValue};
use vellum_lanes::{serializer_lane::StoredField, EncodeOptions};

fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn ids(data: &LevelData) -> HashSet<String> {
    data.stored_object_names.iter().map(|i| i.name.clone()).collect()
}

fn fields(data: &LevelData, entity: &str, type_name: &str) -> Vec<StoredField> {
    let record = data
        .stored_items
        .iter()
        .find(|r| r.name == entity && r.type_name == type_name)
        .expect("record exists");
    bincode::serde::decode_from_slice(&record.data, bincode::config::standard())
        .map(|(f, _)| f)
        .expect("reflective record")
}

#[test]
fn decode_into_empty_scene_reproduces_ids_hierarchy_and_state() {
    // --- 1. ARRANGE ---
    let harness = Harness::new();
    let mut source = harness.world("keep");
    let tower = source.spawn("Tower", Some(IdentityTag::store().with_id("tower")));
    source.attach(tower, Transform { position: [1.0, 2.0, 3.0], label: "north".into() });
    let guard = source.spawn_child(tower, "Guard", Some(IdentityTag::store().with_id("guard")));
    source.attach(guard, Score { points: 41 });
    source.attach(guard, Boss { rage: 9 });
    let lamp = source.spawn_child(tower, "Lamp", Some(IdentityTag::persistent("lamp")));
    source.set_active(lamp, false);
    let mut source_ids = IdentityRegistry::new();

    // --- 2. ACT ---
    let snapshot = harness.encode(&mut source, &mut source_ids);
    let bytes = snapshot.to_bytes().unwrap();
    let restored = LevelData::from_bytes(&bytes).unwrap();
    let mut target = harness.world("keep");
    let mut target_ids = IdentityRegistry::new();
    let report = harness.decode(restored, &mut target, &mut target_ids, true);

    // --- 3. ASSERT ---
    assert_eq!(ids(&snapshot), set(&["tower", "guard", "lamp"]));
    assert_eq!(report.materialized, 3);
    let tower = live(&target, &target_ids, "tower");
    let guard = live(&target, &target_ids, "guard");
    let lamp = live(&target, &target_ids, "lamp");
    assert_eq!(target.parent(guard), Some(tower));
    assert_eq!(target.parent(lamp), Some(tower));
    assert!(!target.is_active(lamp));
    assert_eq!(
        target.get::<Transform>(tower),
        Some(&Transform { position: [1.0, 2.0, 3.0], label: "north".into() })
    );
    assert_eq!(target.get::<Score>(guard), Some(&Score { points: 41 }));
    assert_eq!(target.get::<Boss>(guard), Some(&Boss { rage: 9 }));
}

#[test]
fn forward_entity_references_point_at_the_rebuilt_entities() {
    let harness = Harness::new();
    let mut source = harness.world("arena");
    // The follower is discovered before the entities it refers to.
    let follower = source.spawn("Follower", Some(IdentityTag::store().with_id("follower")));
    let leader = source.spawn("Leader", Some(IdentityTag::store().with_id("leader")));
    let wing = source.spawn("Wing", Some(IdentityTag::store().with_id("wing")));
    source.attach(
        follower,
        Follower { target: Some(leader), allies: vec![Some(wing), None, Some(leader)] },
    );
    let mut source_ids = IdentityRegistry::new();
    let snapshot = harness.encode(&mut source, &mut source_ids);

    let mut target = harness.world("arena");
    // Pre-existing entities so that new handles differ from the source ones.
    target.spawn("Noise", None);
    target.spawn("Noise", None);
    let mut target_ids = IdentityRegistry::new();
    let report = harness.decode(snapshot, &mut target, &mut target_ids, true);

    let follower = live(&target, &target_ids, "follower");
    let leader = live(&target, &target_ids, "leader");
    let wing = live(&target, &target_ids, "wing");
    let restored = target.get::<Follower>(follower).unwrap();
    assert_eq!(restored.target, Some(leader));
    assert_eq!(restored.allies, vec![Some(wing), None, Some(leader)]);
    assert_eq!(report.fixups_run, 2);
}

#[test]
fn references_to_missing_entities_become_null() {
    let harness = Harness::new();
    let mut source = harness.world("arena");
    let follower = source.spawn("Follower", Some(IdentityTag::store().with_id("follower")));
    let ghost = source.spawn("Ghost", Some(IdentityTag::persistent("ghost")));
    source.attach(follower, Follower { target: Some(ghost), allies: vec![] });
    let mut source_ids = IdentityRegistry::new();
    let mut snapshot = harness.encode(&mut source, &mut source_ids);
    snapshot.stored_object_names.retain(|i| i.name != "ghost");

    let mut target = harness.world("arena");
    let mut target_ids = IdentityRegistry::new();
    harness.decode(snapshot, &mut target, &mut target_ids, true);

    let follower = live(&target, &target_ids, "follower");
    assert_eq!(target.get::<Follower>(follower).unwrap().target, None);
}

#[test]
fn same_type_components_align_by_position_and_extras_are_removed() {
    let harness = Harness::new();
    let mut source = harness.world("camp");
    let chest = source.spawn("Chest", Some(IdentityTag::store().with_id("chest")));
    source.attach(chest, Score { points: 1 });
    source.attach(chest, Score { points: 2 });
    let mut source_ids = IdentityRegistry::new();
    let snapshot = harness.encode(&mut source, &mut source_ids);

    // The target already holds the chest, with three scores.
    let mut target = harness.world("camp");
    let existing = target.spawn("Chest", Some(IdentityTag::store().with_id("chest")));
    for points in [7, 8, 9] {
        target.attach(existing, Score { points });
    }
    let mut target_ids = IdentityRegistry::new();
    let report = harness.decode(snapshot, &mut target, &mut target_ids, true);

    let scores: Vec<i64> = target.components_of::<Score>(existing).iter().map(|s| s.points).collect();
    assert_eq!(scores, vec![1, 2]);
    assert_eq!(report.materialized, 0);
}

#[test]
fn components_missing_from_the_snapshot_are_removed() {
    let harness = Harness::new();
    let mut source = harness.world("camp");
    let chest = source.spawn("Chest", Some(IdentityTag::store().with_id("chest")));
    source.attach(chest, Score { points: 5 });
    let mut source_ids = IdentityRegistry::new();
    let snapshot = harness.encode(&mut source, &mut source_ids);

    source.attach(chest, Transform::default());
    let report = harness.decode(snapshot, &mut source, &mut source_ids, true);

    assert!(source.get::<Transform>(chest).is_none());
    assert_eq!(report.removed_components, 1);
    assert_eq!(source.get::<Score>(chest), Some(&Score { points: 5 }));
}

#[test]
fn unknown_stored_types_are_skipped_and_the_rest_loads() {
    let harness = Harness::new();
    let mut source = harness.world("camp");
    let chest = source.spawn("Chest", Some(IdentityTag::store().with_id("chest")));
    source.attach(chest, Score { points: 3 });
    let mut source_ids = IdentityRegistry::new();
    let mut snapshot = harness.encode(&mut source, &mut source_ids);
    let mut foreign = snapshot.stored_items[0].clone();
    foreign.type_name = "mod::Removed".into();
    foreign.data = vec![0xde, 0xad];
    snapshot.stored_items.insert(0, foreign);
    snapshot.stored_object_names[0].components.insert("mod::Removed".into());

    let mut target = harness.world("camp");
    let mut target_ids = IdentityRegistry::new();
    let report = harness.decode(snapshot, &mut target, &mut target_ids, true);

    let chest = live(&target, &target_ids, "chest");
    assert_eq!(target.get::<Score>(chest), Some(&Score { points: 3 }));
    assert_eq!(report.skipped_types, vec!["mod::Removed".to_string()]);
}

#[test]
fn a_failing_plugin_only_loses_its_own_component() {
    let harness = Harness::new();
    let mut source = harness.world("camp");
    let chest = source.spawn("Chest", Some(IdentityTag::store().with_id("chest")));
    source.attach(chest, Fragile { value: 4 });
    source.attach(chest, Score { points: 6 });
    let mut source_ids = IdentityRegistry::new();
    let snapshot = harness.encode(&mut source, &mut source_ids);

    let mut target = harness.world("camp");
    let mut target_ids = IdentityRegistry::new();
    let report = harness.decode(snapshot, &mut target, &mut target_ids, true);

    let chest = live(&target, &target_ids, "chest");
    assert_eq!(report.failed_components, 1);
    assert_eq!(target.get::<Fragile>(chest), Some(&Fragile::default()));
    assert_eq!(target.get::<Score>(chest), Some(&Score { points: 6 }));
}

#[test]
fn deferred_plugins_decode_after_every_entity_exists() {
    let harness = Harness::new();
    let mut source = harness.world("road");
    let walker = source.spawn("Walker", Some(IdentityTag::store().with_id("walker")));
    let a = source.spawn("A", Some(IdentityTag::persistent("wp-a")));
    let b = source.spawn("B", Some(IdentityTag::persistent("wp-b")));
    source.attach(walker, Route { waypoints: vec![b, a] });
    let mut source_ids = IdentityRegistry::new();
    let snapshot = harness.encode(&mut source, &mut source_ids);

    let mut target = harness.world("road");
    let mut target_ids = IdentityRegistry::new();
    let report = harness.decode(snapshot, &mut target, &mut target_ids, true);

    let walker = live(&target, &target_ids, "walker");
    let a = live(&target, &target_ids, "wp-a");
    let b = live(&target, &target_ids, "wp-b");
    assert_eq!(target.get::<Route>(walker).unwrap().waypoints, vec![b, a]);
    assert_eq!(report.failed_components, 0);
}

#[test]
fn unmatched_entities_are_destroyed_only_when_asked() {
    let harness = Harness::new();
    let mut source = harness.world("camp");
    source.spawn("Kept", Some(IdentityTag::persistent("kept")));
    let mut source_ids = IdentityRegistry::new();
    let snapshot = harness.encode(&mut source, &mut source_ids);

    let mut target = harness.world("camp");
    target.spawn("Kept", Some(IdentityTag::persistent("kept")));
    let stray = target.spawn("Stray", Some(IdentityTag::persistent("stray")));
    let untagged = target.spawn("Scenery", None);
    let mut target_ids = IdentityRegistry::new();

    let report = harness.decode(snapshot.clone(), &mut target, &mut target_ids, false);
    assert_eq!(report.destroyed, 0);
    assert!(target.is_alive(stray));

    let report = harness.decode(snapshot, &mut target, &mut target_ids, true);
    assert_eq!(report.destroyed, 1);
    assert!(!target.is_alive(stray));
    assert!(target.is_alive(untagged));
}

#[test]
fn scoped_encode_keeps_only_the_subtree() {
    let harness = Harness::new();
    let mut source = harness.world("town");
    let house = source.spawn("House", Some(IdentityTag::persistent("house")));
    source.spawn_child(house, "Door", Some(IdentityTag::persistent("door")));
    source.spawn("Well", Some(IdentityTag::persistent("well")));
    let mut identity = IdentityRegistry::new();

    let snapshot = harness.encode_with(
        &mut source,
        &mut identity,
        EncodeOptions { scope: Some("house"), ..EncodeOptions::default() },
    );

    assert_eq!(ids(&snapshot), set(&["house", "door"]));
}

#[test]
fn ignored_and_opted_out_data_is_not_stored() {
    let harness = Harness::new();
    let mut source = harness.world("town");
    let shop = source.spawn("Shop", Some(IdentityTag::store().with_id("shop")));
    source.attach(shop, Score { points: 1 });
    source.attach(shop, Transform::default());
    source.attach(shop, common::Cache { scratch: 3 });
    let narrow = source.spawn("Narrow", Some(IdentityTag::store().with_id("narrow").storing_only(&["test::Score"])));
    source.attach(narrow, Score { points: 2 });
    source.attach(narrow, Transform::default());
    let hidden = source.spawn("Hidden", Some(IdentityTag::store().with_id("hidden")));
    let ignore = set(&["test::Transform"]);
    let filter = move |_: &dyn SceneBackend, entity: EntityHandle| entity != hidden;
    let mut identity = IdentityRegistry::new();

    let snapshot = harness.encode_with(
        &mut source,
        &mut identity,
        EncodeOptions { ignore_types: Some(&ignore), filter: Some(&filter), ..EncodeOptions::default() },
    );

    let stored: Vec<(&str, &str)> = snapshot
        .stored_items
        .iter()
        .map(|r| (r.name.as_str(), r.type_name.as_str()))
        .collect();
    assert_eq!(stored, vec![("narrow", "test::Score"), ("shop", "test::Score")]);
    assert!(snapshot.item("hidden").is_none());
    // The manifest still lists every attached type.
    assert!(snapshot.item("shop").unwrap().components.contains("test::Cache"));
}

#[test]
fn builtin_assets_are_referenced_and_never_inlined() {
    let mut harness = Harness::new();
    let shared = Arc::new(Asset::new("test::Mesh", "rock", vec![1, 2]).builtin());
    let reference = harness.assets.register(shared.clone());
    let mut source = harness.world("quarry");
    let a = source.spawn("A", Some(IdentityTag::store().with_id("a")));
    source.attach(a, Skin { mesh: Some(shared.clone()) });
    let b = source.spawn("B", Some(IdentityTag::store().with_id("b")));
    source.attach(b, Skin { mesh: Some(Arc::new(Asset::new("test::Mesh", "custom", vec![9]))) });
    let c = source.spawn("C", Some(IdentityTag::store().with_id("c")));
    source.attach(c, Skin { mesh: Some(Arc::new(Asset::new("test::Mesh", "cube", vec![]).builtin())) });
    let mut identity = IdentityRegistry::new();

    let snapshot = harness.encode(&mut source, &mut identity);

    assert_eq!(
        fields(&snapshot, "a", "test::Skin")[0].value,
        StoredValue::Asset(StoredAsset::Reference(reference))
    );
    assert!(matches!(
        fields(&snapshot, "b", "test::Skin")[0].value,
        StoredValue::Asset(StoredAsset::Inline { .. })
    ));
    assert_eq!(fields(&snapshot, "c", "test::Skin")[0].value, StoredValue::Asset(StoredAsset::Missing));

    let mut target = harness.world("quarry");
    let mut target_ids = IdentityRegistry::new();
    harness.decode(snapshot, &mut target, &mut target_ids, true);
    let a = live(&target, &target_ids, "a");
    let b = live(&target, &target_ids, "b");
    let restored_a = target.get::<Skin>(a).unwrap().mesh.clone().unwrap();
    assert!(Arc::ptr_eq(&restored_a, &shared));
    assert_eq!(target.get::<Skin>(b).unwrap().mesh.as_ref().unwrap().payload, vec![9]);
}

#[test]
fn encoding_an_unchanged_scene_twice_gives_identical_records() {
    // --- 1. ARRANGE ---
    let harness = Harness::new();
    let mut scene = harness.world("arena");
    let root = scene.spawn("Root", Some(IdentityTag::store()));
    scene.attach(root, Score { points: 3 });
    scene.attach(root, Transform::default());
    for i in 0..4 {
        let child = scene.spawn_child(root, format!("Child{i}"), Some(IdentityTag::store()));
        scene.attach(child, Transform { position: [i as f32, 0.0, 0.0], label: format!("c{i}") });
        scene.attach(child, Score { points: i });
    }
    let mut identity = IdentityRegistry::new();

    // --- 2. ACT ---
    let first = harness.encode(&mut scene, &mut identity);
    let second = harness.encode(&mut scene, &mut identity);

    // --- 3. ASSERT ---
    let order = |data: &LevelData| -> Vec<(String, String)> {
        data.stored_items.iter().map(|r| (r.name.clone(), r.type_name.clone())).collect()
    };
    assert_eq!(order(&first).len(), 10);
    assert_eq!(order(&first), order(&second));
    let mut sorted = order(&first);
    sorted.sort();
    assert_eq!(order(&first), sorted);
    assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
}
