pub mod arena;
pub mod scheduler;

use serde::{Deserialize, Serialize};

use crate::recipe::StepType;

pub use arena::{StepArena, StepId, StepNode};
pub use scheduler::{plan_production, plan_selected};

/// Labour and heat available for a cooking session.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Kitchen {
    pub cooks: u32,
    pub burners: u32,
}

impl Kitchen {
    pub fn new(cooks: u32, burners: u32) -> Self {
        Self { cooks, burners }
    }
}

/// A pre-start step, to be finished before the timed schedule begins.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Prerequisite {
    pub dish_name: String,
    pub instruction: String,
    pub duration_minutes: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    /// Minutes from the start of the schedule.
    pub time_offset_minutes: u64,
    pub duration_minutes: u32,
    pub action: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub involved_recipe_names: Vec<String>,
    /// Cook and, for cooking steps, burner working on this entry.
    pub assignees: Vec<String>,
    /// Index of the recipe in the selection.
    pub recipe_index: usize,
    /// Index of the step in its recipe's own step list.
    pub step_index: usize,
}

impl ScheduleEntry {
    pub fn end_minutes(&self) -> u64 {
        self.time_offset_minutes + u64::from(self.duration_minutes)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductionPlan {
    pub prerequisites: Vec<Prerequisite>,
    pub entries: Vec<ScheduleEntry>,
    /// When the last entry finishes.
    pub total_minutes: u64,
}
