//! RepairConfig - 診断・修復の設定値
//!
//! すべてのフィールドに既定値があり、JSON では必要なものだけ上書きできます。

use serde::{Deserialize, Serialize};

use crate::domain::{ActorId, RemnantError};

/// Tunables shared by the catalog, the diagnoser and the surgeon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepairConfig {
    /// Job class name of deletion tasks in the queue.
    pub task_kind: String,

    /// Scope level of a target's own scope record.
    pub scope_level: u64,

    /// Scope level of a container's scope record.
    pub container_scope_level: u64,

    /// Completion criteria type that references activities.
    pub activity_criteria_type: u64,

    /// Actor the split protocol runs new tasks as.
    pub system_actor_id: ActorId,

    /// Seconds; used when the caller does not pass a minimum fail delay.
    pub default_minimum_fail_delay: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            task_kind: "course_delete_modules".to_string(),
            scope_level: 70,
            container_scope_level: 50,
            activity_criteria_type: 4,
            system_actor_id: ActorId::new(2),
            default_minimum_fail_delay: 60,
        }
    }
}

impl RepairConfig {
    pub fn from_json(text: &str) -> Result<Self, RemnantError> {
        let config: RepairConfig =
            serde_json::from_str(text).map_err(|e| RemnantError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RemnantError> {
        if self.task_kind.trim().is_empty() {
            return Err(RemnantError::Config("task_kind must not be empty".to_string()));
        }
        if self.scope_level == self.container_scope_level {
            return Err(RemnantError::Config(
                "scope_level and container_scope_level must differ".to_string(),
            ));
        }
        Ok(())
    }
}
