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

use std::sync::Arc;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use vellum_core::{scene::EntityHandle, Component};
use vellum_data::{Asset, AssetStore, StoredAsset, StoredValue, Value};

use super::{DecodeContext, EncodeContext, SerializerPlugin};
use crate::fixup_lane::{DeferredRef, FixupTarget, ResolverKind};

/// One stored field of a reflectively serialized component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredField {
    /// The field name.
    pub name: String,
    /// The stored value.
    pub value: StoredValue,
}

/// The default plugin: stores every field declared in the component's
/// [`TypeInfo`](vellum_data::TypeInfo).
///
/// Fields missing from the descriptor at load time are skipped, so adding or
/// removing fields does not invalidate older snapshots.
pub struct ReflectiveSerializer;

impl SerializerPlugin for ReflectiveSerializer {
    fn name(&self) -> &'static str {
        "ReflectiveSerializer"
    }

    fn serialize(&self, component: &dyn Component, cx: &EncodeContext<'_>) -> anyhow::Result<Vec<u8>> {
        let info = cx
            .types
            .get(component.type_name())
            .ok_or_else(|| anyhow!("no type descriptor for '{}'", component.type_name()))?;

        let mut fields = Vec::with_capacity(info.fields().len());
        for field in info.fields() {
            let value = field
                .get(component)
                .ok_or_else(|| anyhow!("field '{}' could not be read", field.name()))?;
            fields.push(StoredField {
                name: field.name().to_string(),
                value: stored_value(&value, cx),
            });
        }

        bincode::serde::encode_to_vec(&fields, bincode::config::standard())
            .with_context(|| format!("encoding fields of '{}'", info.name()))
    }

    fn deserialize(
        &self,
        data: &[u8],
        component: &mut dyn Component,
        cx: &mut DecodeContext<'_>,
    ) -> anyhow::Result<()> {
        let info = cx
            .types
            .get(component.type_name())
            .ok_or_else(|| anyhow!("no type descriptor for '{}'", component.type_name()))?;
        let (fields, _len): (Vec<StoredField>, usize) =
            bincode::serde::decode_from_slice(data, bincode::config::standard())
                .with_context(|| format!("decoding fields of '{}'", info.name()))?;

        for StoredField { name, value } in fields {
            let Some(field) = info.field_named(&name) else {
                log::debug!("Skipping stored field '{}' unknown to '{}'", name, info.name());
                continue;
            };
            if value.refers_to_entities() {
                let kind = match value {
                    StoredValue::Entity(_) => ResolverKind::Entity,
                    _ => ResolverKind::Graph,
                };
                cx.fixups.push_ref(DeferredRef {
                    kind,
                    args: value,
                    target: FixupTarget::Field {
                        component: cx.component,
                        field: name,
                    },
                });
                continue;
            }
            let live = live_value(&value, cx.assets, &mut |_| None);
            if !field.set(component, live) {
                log::warn!("Field '{}' of '{}' rejected its stored value", name, info.name());
            }
        }
        Ok(())
    }
}

/// Converts a live value into its stored form.
///
/// Assets are inlined unless their plugin refuses, in which case a registered
/// asset is stored by reference. Entities without an identity and assets that
/// can be neither inlined nor referenced are stored as null references.
pub fn stored_value(value: &Value, cx: &EncodeContext<'_>) -> StoredValue {
    match value {
        Value::Null => StoredValue::Null,
        Value::Bool(b) => StoredValue::Bool(*b),
        Value::Int(i) => StoredValue::Int(*i),
        Value::Float(f) => StoredValue::Float(*f),
        Value::Text(s) => StoredValue::Text(s.clone()),
        Value::Vec3(v) => StoredValue::Vec3(*v),
        Value::Quat(q) => StoredValue::Quat(*q),
        Value::Bytes(b) => StoredValue::Bytes(b.clone()),
        Value::List(items) => StoredValue::List(items.iter().map(|item| stored_value(item, cx)).collect()),
        Value::Entity(None) => StoredValue::Entity(None),
        Value::Entity(Some(entity)) => {
            let id = cx.identity.id_of(*entity).map(str::to_string);
            if id.is_none() {
                log::debug!(
                    "Entity referenced from '{}' has no identity; storing a null reference",
                    cx.entity_id
                );
            }
            StoredValue::Entity(id)
        }
        Value::Asset(None) => StoredValue::Asset(StoredAsset::Missing),
        Value::Asset(Some(asset)) => {
            if cx.serializers.allows_inline(asset) {
                StoredValue::Asset(StoredAsset::Inline {
                    type_name: asset.type_name.clone(),
                    name: asset.name.clone(),
                    payload: asset.payload.clone(),
                })
            } else if let Some(reference) = cx.assets.reference_of(asset) {
                StoredValue::Asset(StoredAsset::Reference(reference))
            } else {
                log::warn!(
                    "Asset '{}' of type '{}' can be neither inlined nor referenced",
                    asset.name,
                    asset.type_name
                );
                StoredValue::Asset(StoredAsset::Missing)
            }
        }
    }
}

/// Converts a stored value back into its live form.
///
/// `entity` maps a persistent id to a live entity; ids it cannot map become
/// null references.
pub fn live_value(
    value: &StoredValue,
    assets: &AssetStore,
    entity: &mut dyn FnMut(&str) -> Option<EntityHandle>,
) -> Value {
    match value {
        StoredValue::Null => Value::Null,
        StoredValue::Bool(b) => Value::Bool(*b),
        StoredValue::Int(i) => Value::Int(*i),
        StoredValue::Float(f) => Value::Float(*f),
        StoredValue::Text(s) => Value::Text(s.clone()),
        StoredValue::Vec3(v) => Value::Vec3(*v),
        StoredValue::Quat(q) => Value::Quat(*q),
        StoredValue::Bytes(b) => Value::Bytes(b.clone()),
        StoredValue::List(items) => Value::List(items.iter().map(|item| live_value(item, assets, entity)).collect()),
        StoredValue::Entity(None) => Value::Entity(None),
        StoredValue::Entity(Some(id)) => {
            let found = entity(id);
            if found.is_none() {
                log::warn!("Referenced entity '{}' does not exist; leaving the reference null", id);
            }
            Value::Entity(found)
        }
        StoredValue::Asset(StoredAsset::Missing) => Value::Asset(None),
        StoredValue::Asset(StoredAsset::Inline {
            type_name,
            name,
            payload,
        }) => Value::Asset(Some(Arc::new(Asset::new(type_name.clone(), name.clone(), payload.clone())))),
        StoredValue::Asset(StoredAsset::Reference(reference)) => {
            let found = assets.get(reference);
            if found.is_none() {
                log::warn!(
                    "Asset '{}' #{} of type '{}' is not registered",
                    reference.name,
                    reference.index,
                    reference.type_name
                );
            }
            Value::Asset(found)
        }
    }
}
