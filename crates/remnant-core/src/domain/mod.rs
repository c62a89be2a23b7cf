//! Domain model (ids, tasks, symptoms, diagnoses, outcomes, ...).
//!
//! ここは純粋な値オブジェクトだけを置きます（ストアやキューには触れない）。

pub mod diagnosis;
pub mod errors;
pub mod events;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod payload;
pub mod symptom;
pub mod task;

pub use diagnosis::Diagnosis;
pub use errors::{ErrorKind, QueueError, RemnantError, StoreError};
pub use events::DomainEvent;
pub use ids::{
    ActorId, ContainerId, InstanceId, KindId, PlacementId, RunId, ScopeId, TargetId, TaskId,
};
pub use job::JobRecord;
pub use outcome::{CleanupStep, Outcome, OutcomeKind, OutcomeMessage};
pub use payload::{DeletePayload, TargetEntry, TargetList};
pub use symptom::{SymptomKey, SymptomKind, SymptomSet};
pub use task::{DeleteTask, TargetDescriptor};
