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

//! Component fixtures shared by the lane integration tests.

#![allow(dead_code)]

use std::{any::Any, sync::Arc};

use anyhow::{bail, Context};
use vellum_core::{
    progress::NullProgress,
    scene::{EntityHandle, SceneBackend},
    Component,
};
use vellum_data::{AssetHandle, AssetStore, IdentityRegistry, LevelData, SceneWorld, TypeInfo, TypeRegistry, Value};
use vellum_lanes::{
    DecodeContext, DecodeEnv, DecodeReport, EncodeContext, EncodeOptions, GraphDecoder, GraphEncoder, SerializerPlugin,
    SerializerRegistry,
};

macro_rules! component {
    ($ty:ty, $name:literal) => {
        impl Component for $ty {
            fn type_name(&self) -> &'static str {
                $name
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }
    };
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Transform {
    pub position: [f32; 3],
    pub label: String,
}
component!(Transform, "test::Transform");

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Follower {
    pub target: Option<EntityHandle>,
    pub allies: Vec<Option<EntityHandle>>,
}
component!(Follower, "test::Follower");

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Skin {
    pub mesh: Option<AssetHandle>,
}
component!(Skin, "test::Skin");

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Score {
    pub points: i64,
}
component!(Score, "test::Score");

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Boss {
    pub rage: i64,
}
component!(Boss, "test::Boss");

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Cache {
    pub scratch: i64,
}
component!(Cache, "test::Cache");

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Route {
    pub waypoints: Vec<EntityHandle>,
}
component!(Route, "test::Route");

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Fragile {
    pub value: i64,
}
component!(Fragile, "test::Fragile");

pub fn types() -> Arc<TypeRegistry> {
    let registry = TypeRegistry::new()
        .with(
            TypeInfo::component::<Transform>("test::Transform")
                .field::<Transform>("position", |t| Value::Vec3(t.position), |t, v| {
                    v.as_vec3().map(|p| t.position = p).is_some()
                })
                .field::<Transform>("label", |t| Value::Text(t.label.clone()), |t, v| {
                    v.as_text().map(|s| t.label = s.to_string()).is_some()
                }),
        )
        .with(
            TypeInfo::component::<Follower>("test::Follower")
                .field::<Follower>("target", |f| Value::Entity(f.target), |f, v| {
                    v.as_entity().map(|e| f.target = e).is_some()
                })
                .field::<Follower>(
                    "allies",
                    |f| Value::List(f.allies.iter().map(|a| Value::Entity(*a)).collect()),
                    |f, v| match v.as_list() {
                        Some(items) => {
                            f.allies = items.iter().filter_map(Value::as_entity).collect();
                            true
                        }
                        None => false,
                    },
                ),
        )
        .with(
            TypeInfo::component::<Skin>("test::Skin").field::<Skin>("mesh", |s| Value::Asset(s.mesh.clone()), |s, v| {
                v.as_asset().map(|a| s.mesh = a).is_some()
            }),
        )
        .with(TypeInfo::component::<Score>("test::Score"))
        .with(TypeInfo::component::<Boss>("test::Boss").extends("test::Enemy"))
        .with(TypeInfo::named("test::Enemy"))
        .with(TypeInfo::component::<Cache>("test::Cache").do_not_serialize())
        .with(TypeInfo::component::<Route>("test::Route").implements("test::Pathing"))
        .with(TypeInfo::component::<Fragile>("test::Fragile"))
        .with(TypeInfo::named("test::Mesh").implements(vellum_lanes::ASSET_CAPABILITY));
    Arc::new(registry)
}

/// Stores `Score.points` as little-endian bytes.
pub struct ScorePlugin;

impl SerializerPlugin for ScorePlugin {
    fn name(&self) -> &'static str {
        "ScorePlugin"
    }

    fn serialize(&self, component: &dyn Component, _cx: &EncodeContext<'_>) -> anyhow::Result<Vec<u8>> {
        let score = component.as_any().downcast_ref::<Score>().context("not a score")?;
        Ok(score.points.to_le_bytes().to_vec())
    }

    fn deserialize(&self, data: &[u8], component: &mut dyn Component, _cx: &mut DecodeContext<'_>) -> anyhow::Result<()> {
        let score = component.as_any_mut().downcast_mut::<Score>().context("not a score")?;
        score.points = i64::from_le_bytes(data.try_into()?);
        Ok(())
    }
}

/// Serves the `test::Enemy` family: writes a fixed marker and a value.
pub struct EnemyPlugin;

impl SerializerPlugin for EnemyPlugin {
    fn name(&self) -> &'static str {
        "EnemyPlugin"
    }

    fn serialize(&self, component: &dyn Component, _cx: &EncodeContext<'_>) -> anyhow::Result<Vec<u8>> {
        let boss = component.as_any().downcast_ref::<Boss>().context("not a boss")?;
        let mut out = vec![0xE0];
        out.extend_from_slice(&boss.rage.to_le_bytes());
        Ok(out)
    }

    fn deserialize(&self, data: &[u8], component: &mut dyn Component, _cx: &mut DecodeContext<'_>) -> anyhow::Result<()> {
        let boss = component.as_any_mut().downcast_mut::<Boss>().context("not a boss")?;
        if data.first() != Some(&0xE0) {
            bail!("missing enemy marker");
        }
        boss.rage = i64::from_le_bytes(data[1..].try_into()?);
        Ok(())
    }
}

/// Writes waypoint ids and resolves them directly, relying on being decoded
/// only once every entity exists.
pub struct RoutePlugin;

impl SerializerPlugin for RoutePlugin {
    fn name(&self) -> &'static str {
        "RoutePlugin"
    }

    fn serialize(&self, component: &dyn Component, cx: &EncodeContext<'_>) -> anyhow::Result<Vec<u8>> {
        let route = component.as_any().downcast_ref::<Route>().context("not a route")?;
        let ids: Vec<String> = route
            .waypoints
            .iter()
            .filter_map(|w| cx.identity.id_of(*w).map(str::to_string))
            .collect();
        Ok(ids.join(",").into_bytes())
    }

    fn deserialize(&self, data: &[u8], component: &mut dyn Component, cx: &mut DecodeContext<'_>) -> anyhow::Result<()> {
        let route = component.as_any_mut().downcast_mut::<Route>().context("not a route")?;
        let text = std::str::from_utf8(data)?;
        route.waypoints = text
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|id| cx.identity.lookup(id).with_context(|| format!("waypoint '{id}' missing")))
            .collect::<anyhow::Result<_>>()?;
        Ok(())
    }

    fn defers_mutation(&self) -> bool {
        true
    }
}

/// Always fails to decode.
pub struct FragilePlugin;

impl SerializerPlugin for FragilePlugin {
    fn name(&self) -> &'static str {
        "FragilePlugin"
    }

    fn serialize(&self, _component: &dyn Component, _cx: &EncodeContext<'_>) -> anyhow::Result<Vec<u8>> {
        Ok(vec![1])
    }

    fn deserialize(&self, _data: &[u8], _component: &mut dyn Component, _cx: &mut DecodeContext<'_>) -> anyhow::Result<()> {
        bail!("corrupt record")
    }
}

pub fn serializers(types: Arc<TypeRegistry>) -> SerializerRegistry {
    let mut registry = SerializerRegistry::with_declarations(types);
    registry.register("test::Score", ScorePlugin);
    registry.register("test::Enemy", EnemyPlugin);
    registry.register("test::Pathing", RoutePlugin);
    registry.register("test::Fragile", FragilePlugin);
    registry
}

/// Bundles everything an encode/decode round trip needs.
pub struct Harness {
    pub types: Arc<TypeRegistry>,
    pub serializers: SerializerRegistry,
    pub assets: AssetStore,
}

impl Harness {
    pub fn new() -> Self {
        let types = types();
        Self {
            serializers: serializers(types.clone()),
            types,
            assets: AssetStore::new(),
        }
    }

    pub fn world(&self, level: &str) -> SceneWorld {
        SceneWorld::new(level, self.types.clone())
    }

    pub fn encode(&self, scene: &mut SceneWorld, identity: &mut IdentityRegistry) -> LevelData {
        self.encode_with(scene, identity, EncodeOptions::default())
    }

    pub fn encode_with(
        &self,
        scene: &mut SceneWorld,
        identity: &mut IdentityRegistry,
        options: EncodeOptions<'_>,
    ) -> LevelData {
        GraphEncoder::new(&self.serializers, &self.assets)
            .encode(scene, identity, options, &NullProgress)
            .expect("encode succeeds")
    }

    pub fn decode(
        &self,
        data: LevelData,
        scene: &mut SceneWorld,
        identity: &mut IdentityRegistry,
        delete_unmatched: bool,
    ) -> DecodeReport {
        let mut decoder = GraphDecoder::new(data, delete_unmatched);
        self.run(&mut decoder, scene, identity)
    }

    pub fn run(&self, decoder: &mut GraphDecoder, scene: &mut SceneWorld, identity: &mut IdentityRegistry) -> DecodeReport {
        let mut env = DecodeEnv {
            scene,
            identity,
            serializers: &self.serializers,
            assets: &self.assets,
            progress: &NullProgress,
        };
        decoder.run_to_completion(&mut env)
    }
}

/// The entity bound to an id, asserting that it is alive.
pub fn live(scene: &SceneWorld, identity: &IdentityRegistry, id: &str) -> EntityHandle {
    let entity = identity.lookup(id).unwrap_or_else(|| panic!("'{id}' is not bound"));
    assert!(scene.is_alive(entity), "'{id}' is dead");
    entity
}
