//! Timed steps of a selection of recipes, flattened into one arena.
//!
//! Every recipe contributes a linear chain: each step except the first points at the
//! step before it through `previous`. Pre-start steps are not part of any chain; they
//! are collected as prerequisites instead.

use crate::error::ScheduleError;
use crate::production::Prerequisite;
use crate::recipe::{Recipe, StepType};

pub type StepId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepNode {
    pub recipe: usize,
    /// Position in the recipe's own step list, pre-start steps included.
    pub position: usize,
    pub instruction: String,
    pub duration_minutes: u32,
    pub step_type: StepType,
    pub previous: Option<StepId>,
    /// This step's duration plus every later step of the same recipe.
    pub remaining_work: u64,
}

#[derive(Debug, Clone, Default)]
pub struct StepArena {
    pub nodes: Vec<StepNode>,
    pub dish_names: Vec<String>,
    pub prerequisites: Vec<Prerequisite>,
}

impl StepArena {
    pub fn from_recipes(recipes: &[Recipe]) -> Self {
        let mut arena = StepArena::default();

        for (recipe_idx, recipe) in recipes.iter().enumerate() {
            arena.dish_names.push(recipe.dish_name.clone());
            let chain_start = arena.nodes.len();
            let mut previous = None;

            for (position, step) in recipe.steps.iter().enumerate() {
                if step.step_type == StepType::PreStart {
                    arena.prerequisites.push(Prerequisite {
                        dish_name: recipe.dish_name.clone(),
                        instruction: step.instruction.clone(),
                        duration_minutes: step.duration_minutes,
                    });
                    continue;
                }
                let id = arena.nodes.len();
                arena.nodes.push(StepNode {
                    recipe: recipe_idx,
                    position,
                    instruction: step.instruction.clone(),
                    duration_minutes: step.duration_minutes,
                    step_type: step.step_type,
                    previous,
                    remaining_work: 0,
                });
                previous = Some(id);
            }

            let mut tail = 0u64;
            for node in arena.nodes[chain_start..].iter_mut().rev() {
                tail += u64::from(node.duration_minutes);
                node.remaining_work = tail;
            }
        }

        arena
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that every chain can be walked from its head: `previous` must name an
    /// earlier step of the same recipe. Anything else is a cycle or a dangling link
    /// and would leave a step waiting forever.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        for (id, node) in self.nodes.iter().enumerate() {
            let Some(prev) = node.previous else {
                continue;
            };
            let reason = match self.nodes.get(prev) {
                None => Some(format!("it waits on step #{} which does not exist", prev)),
                Some(_) if prev >= id => Some("it waits on a step that comes after it".to_string()),
                Some(p) if p.recipe != node.recipe => {
                    Some("it waits on a step of another recipe".to_string())
                }
                Some(_) => None,
            };
            if let Some(reason) = reason {
                return Err(ScheduleError::UnreachableStep {
                    dish_name: self.dish_names.get(node.recipe).cloned().unwrap_or_default(),
                    position: node.position + 1,
                    reason,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{OwnerId, RecipeDraft, RecipeId, RecipeStep};
    use chrono::Utc;

    fn recipe(dish: &str, steps: Vec<RecipeStep>) -> Recipe {
        Recipe::from_draft(
            RecipeId::new(),
            OwnerId::new("alice"),
            RecipeDraft {
                dish_name: dish.to_string(),
                steps,
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_chains_link_within_recipe_and_skip_pre_start() {
        let recipes = vec![
            recipe(
                "Ribs",
                vec![
                    RecipeStep::new("Marinate overnight", 720, StepType::PreStart),
                    RecipeStep::new("Trim", 10, StepType::Prep),
                    RecipeStep::new("Grill", 40, StepType::Cooking),
                ],
            ),
            recipe("Slaw", vec![RecipeStep::new("Shred", 15, StepType::Prep)]),
        ];
        let arena = StepArena::from_recipes(&recipes);

        assert_eq!(arena.len(), 3);
        assert_eq!(arena.prerequisites.len(), 1);
        assert_eq!(arena.prerequisites[0].dish_name, "Ribs");

        assert_eq!(arena.nodes[0].previous, None);
        assert_eq!(arena.nodes[0].position, 1);
        assert_eq!(arena.nodes[1].previous, Some(0));
        assert_eq!(arena.nodes[2].previous, None);
        assert_eq!(arena.nodes[2].recipe, 1);

        assert_eq!(arena.nodes[0].remaining_work, 50);
        assert_eq!(arena.nodes[1].remaining_work, 40);
        assert_eq!(arena.nodes[2].remaining_work, 15);
        assert!(arena.validate().is_ok());
    }

    #[test]
    fn test_forward_link_is_rejected() {
        let recipes = vec![recipe(
            "Loop",
            vec![
                RecipeStep::new("One", 1, StepType::Prep),
                RecipeStep::new("Two", 1, StepType::Prep),
            ],
        )];
        let mut arena = StepArena::from_recipes(&recipes);
        arena.nodes[0].previous = Some(1);

        let err = arena.validate().unwrap_err();
        assert!(matches!(err, ScheduleError::UnreachableStep { position: 1, .. }));
        assert!(err.to_string().contains("Loop"));
    }

    #[test]
    fn test_cross_recipe_link_is_rejected() {
        let recipes = vec![
            recipe("A", vec![RecipeStep::new("a", 1, StepType::Prep)]),
            recipe("B", vec![RecipeStep::new("b", 1, StepType::Prep)]),
        ];
        let mut arena = StepArena::from_recipes(&recipes);
        arena.nodes[1].previous = Some(0);
        assert!(arena.validate().is_err());
    }
}
