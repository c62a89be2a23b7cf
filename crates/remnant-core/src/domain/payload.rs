//! Delete payload: the JSON a deletion job carries.
//!
//! ```json
//! { "targets": [ { "id": 12, "container": 3, "kind": 5, "instance": 40, "placement": 8 } ],
//!   "actor_id": 2, "real_actor_id": 2 }
//! ```
//!
//! `targets` は配列でも、id をキーにしたオブジェクトでも受け付けます（古いジョブは後者）。
//! どちらの場合も記述順を保ちます。

use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use super::errors::RemnantError;
use super::ids::{ActorId, ContainerId, InstanceId, KindId, PlacementId, TargetId, TaskId};

/// One target as written in the payload. Everything but `id` may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<TargetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<KindId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementId>,
    /// Set by the split protocol on live records.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deletion_in_progress: bool,
}

impl TargetEntry {
    pub fn with_id(id: TargetId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}

/// The `targets` field. Always serialised back as an array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TargetList(Vec<TargetEntry>);

impl TargetList {
    pub fn new(entries: Vec<TargetEntry>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[TargetEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for TargetList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TargetListVisitor;

        impl<'de> Visitor<'de> for TargetListVisitor {
            type Value = TargetList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array of targets or an object of targets keyed by id")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<TargetList, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = seq.next_element::<TargetEntry>()? {
                    entries.push(entry);
                }
                Ok(TargetList(entries))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<TargetList, A::Error> {
                let mut entries = Vec::new();
                while let Some((key, mut entry)) = map.next_entry::<String, TargetEntry>()? {
                    if entry.id.is_none() {
                        let id = key.trim().parse::<u64>().map_err(|_| {
                            de::Error::custom(format!("target key `{key}` is not an id"))
                        })?;
                        entry.id = Some(TargetId::new(id));
                    }
                    entries.push(entry);
                }
                Ok(TargetList(entries))
            }
        }

        deserializer.deserialize_any(TargetListVisitor)
    }
}

/// Full payload of a deletion job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePayload {
    #[serde(default)]
    pub targets: TargetList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<ActorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_actor_id: Option<ActorId>,
}

impl DeletePayload {
    /// Payload for one target, run as `actor`.
    pub fn single(entry: TargetEntry, actor: ActorId) -> Self {
        Self {
            targets: TargetList::new(vec![entry]),
            actor_id: Some(actor),
            real_actor_id: Some(actor),
        }
    }

    /// Entries without an id are kept; the catalog carries them on the task.
    pub fn decode(task_id: TaskId, raw: &serde_json::Value) -> Result<Self, RemnantError> {
        serde_json::from_value(raw.clone()).map_err(|e| RemnantError::Decode {
            task_id,
            message: e.to_string(),
        })
    }

    pub fn to_value(&self) -> serde_json::Value {
        // 自前の型だけなので失敗しない
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
