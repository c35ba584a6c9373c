//! Interleaves the timed steps of several recipes into one kitchen schedule.
//!
//! Resource model: every step needs a cook for its whole duration; a cooking step
//! additionally holds a burner for its whole duration. Cooks are never released
//! while something they started is on the heat, so at any instant the number of
//! running steps is at most `cooks` and the number of running cooking steps is at
//! most `burners`.
//!
//! The simulation advances from one decision point (time 0, then every step
//! completion) to the next. At each point eligible steps are ranked by the work
//! they unblock (their own duration plus everything after them in the recipe),
//! longest first, then by recipe order in the selection. Steps are started in that
//! order while a cook is free; a cooking step that finds no free burner is passed
//! over so lower-ranked prep can still use the idle cook.

use std::cmp::Reverse;

use crate::error::ScheduleError;
use crate::production::arena::{StepArena, StepId};
use crate::production::{Kitchen, ProductionPlan, ScheduleEntry};
use crate::recipe::{Recipe, RecipeId, StepType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepState {
    Pending,
    Eligible,
    Scheduled { end: u64 },
    Complete,
}

/// A pool of identical resources (cooks or burners), each either idle or busy with a step.
struct Stations {
    label: &'static str,
    busy_with: Vec<Option<StepId>>,
}

impl Stations {
    /// `steps` bounds how many stations can ever be busy at once, so a larger
    /// `count` is trimmed to it.
    fn new(label: &'static str, count: u32, steps: usize) -> Self {
        let usable = usize::try_from(count).unwrap_or(usize::MAX).min(steps.max(1));
        Self {
            label,
            busy_with: vec![None; usable],
        }
    }

    fn first_free(&self) -> Option<usize> {
        self.busy_with.iter().position(Option::is_none)
    }

    fn take(&mut self, slot: usize, step: StepId) -> String {
        self.busy_with[slot] = Some(step);
        format!("{} {}", self.label, slot + 1)
    }

    fn release(&mut self, step: StepId) {
        for slot in self.busy_with.iter_mut() {
            if *slot == Some(step) {
                *slot = None;
            }
        }
    }
}

fn check_input(recipes: &[Recipe], kitchen: Kitchen) -> Result<(), ScheduleError> {
    if kitchen.cooks < 1 {
        return Err(ScheduleError::NoCooks(kitchen.cooks));
    }
    if kitchen.burners < 1 {
        return Err(ScheduleError::NoBurners(kitchen.burners));
    }
    if recipes.is_empty() {
        return Err(ScheduleError::NoRecipes);
    }
    Ok(())
}

/// Build a schedule for `recipes` in `kitchen`.
///
/// Either the whole schedule is returned or an error explaining which input was
/// unacceptable. Output depends only on the arguments.
pub fn plan_production(recipes: &[Recipe], kitchen: Kitchen) -> Result<ProductionPlan, ScheduleError> {
    check_input(recipes, kitchen)?;

    let arena = StepArena::from_recipes(recipes);
    arena.validate()?;

    let mut states = vec![StepState::Pending; arena.len()];
    let mut cooks = Stations::new("Cook", kitchen.cooks, arena.len());
    let mut burners = Stations::new("Burner", kitchen.burners, arena.len());
    let mut entries: Vec<ScheduleEntry> = Vec::with_capacity(arena.len());
    let mut completed = 0usize;
    let mut now = 0u64;

    while completed < arena.len() {
        for (id, state) in states.iter_mut().enumerate() {
            if let StepState::Scheduled { end } = *state {
                if end <= now {
                    *state = StepState::Complete;
                    completed += 1;
                    cooks.release(id);
                    burners.release(id);
                }
            }
        }

        for id in 0..states.len() {
            if states[id] != StepState::Pending {
                continue;
            }
            let ready = match arena.nodes[id].previous {
                None => true,
                Some(prev) => states[prev] == StepState::Complete,
            };
            if ready {
                states[id] = StepState::Eligible;
            }
        }

        let mut eligible: Vec<StepId> = (0..states.len())
            .filter(|&id| states[id] == StepState::Eligible)
            .collect();
        eligible.sort_by_key(|&id| {
            let node = &arena.nodes[id];
            (Reverse(node.remaining_work), node.recipe, node.position)
        });

        for id in eligible {
            let Some(cook_slot) = cooks.first_free() else {
                break;
            };
            let node = &arena.nodes[id];
            let burner_slot = if node.step_type == StepType::Cooking {
                match burners.first_free() {
                    Some(slot) => Some(slot),
                    None => continue,
                }
            } else {
                None
            };

            let mut assignees = vec![cooks.take(cook_slot, id)];
            if let Some(slot) = burner_slot {
                assignees.push(burners.take(slot, id));
            }
            let end = now + u64::from(node.duration_minutes);
            states[id] = StepState::Scheduled { end };
            tracing::debug!(
                at = now,
                dish = %arena.dish_names[node.recipe],
                step = node.position + 1,
                assignees = ?assignees,
                "Scheduled step"
            );
            entries.push(ScheduleEntry {
                time_offset_minutes: now,
                duration_minutes: node.duration_minutes,
                action: node.instruction.clone(),
                step_type: node.step_type,
                involved_recipe_names: vec![arena.dish_names[node.recipe].clone()],
                assignees,
                recipe_index: node.recipe,
                step_index: node.position,
            });
        }

        if completed == arena.len() {
            break;
        }

        let next_event = states
            .iter()
            .filter_map(|state| match state {
                StepState::Scheduled { end } => Some(*end),
                _ => None,
            })
            .min();
        match next_event {
            Some(t) => now = t,
            None => {
                // Nothing running and nothing could start: a waiting step can never run.
                let stuck = states
                    .iter()
                    .position(|s| matches!(s, StepState::Pending | StepState::Eligible))
                    .unwrap_or(0);
                let node = &arena.nodes[stuck];
                return Err(ScheduleError::UnreachableStep {
                    dish_name: arena.dish_names[node.recipe].clone(),
                    position: node.position + 1,
                    reason: "no resource or predecessor will ever free up for it".to_string(),
                });
            }
        }
    }

    let total_minutes = entries.iter().map(ScheduleEntry::end_minutes).max().unwrap_or(0);
    tracing::info!(
        recipes = recipes.len(),
        steps = entries.len(),
        prerequisites = arena.prerequisites.len(),
        total_minutes,
        "Built production schedule"
    );

    Ok(ProductionPlan {
        prerequisites: arena.prerequisites,
        entries,
        total_minutes,
    })
}

/// Resolve `selected` against a snapshot and schedule them in selection order.
pub fn plan_selected(
    selected: &[RecipeId],
    all_recipes: &[Recipe],
    kitchen: Kitchen,
) -> Result<ProductionPlan, ScheduleError> {
    let mut recipes = Vec::with_capacity(selected.len());
    for id in selected {
        let recipe = all_recipes
            .iter()
            .find(|r| r.id == *id)
            .ok_or(ScheduleError::UnknownRecipe(*id))?;
        recipes.push(recipe.clone());
    }
    plan_production(&recipes, kitchen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{OwnerId, RecipeDraft, RecipeStep};
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

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

    fn prep_then_cook(dish: &str) -> Recipe {
        recipe(
            dish,
            vec![
                RecipeStep::new(format!("Chop for {}", dish), 5, StepType::Prep),
                RecipeStep::new(format!("Simmer {}", dish), 10, StepType::Cooking),
            ],
        )
    }

    fn starts_of(plan: &ProductionPlan, step_type: StepType) -> Vec<u64> {
        plan.entries
            .iter()
            .filter(|e| e.step_type == step_type)
            .map(|e| e.time_offset_minutes)
            .collect()
    }

    /// Largest number of positive-length entries matching `keep` running at the same instant.
    fn peak_overlap(plan: &ProductionPlan, keep: impl Fn(&ScheduleEntry) -> bool) -> usize {
        let spans: Vec<(u64, u64)> = plan
            .entries
            .iter()
            .filter(|e| e.duration_minutes > 0 && keep(e))
            .map(|e| (e.time_offset_minutes, e.end_minutes()))
            .collect();
        spans
            .iter()
            .map(|&(t, _)| spans.iter().filter(|&&(s, e)| s <= t && t < e).count())
            .max()
            .unwrap_or(0)
    }

    fn assert_valid(plan: &ProductionPlan, recipes: &[Recipe], kitchen: Kitchen) {
        // Offsets never go backwards.
        for pair in plan.entries.windows(2) {
            assert!(pair[0].time_offset_minutes <= pair[1].time_offset_minutes);
        }

        // No assignee works on two things at once.
        let mut by_assignee: HashMap<&str, Vec<(u64, u64)>> = HashMap::new();
        for entry in plan.entries.iter().filter(|e| e.duration_minutes > 0) {
            for who in &entry.assignees {
                by_assignee
                    .entry(who.as_str())
                    .or_default()
                    .push((entry.time_offset_minutes, entry.end_minutes()));
            }
        }
        for (who, mut spans) in by_assignee {
            spans.sort();
            for pair in spans.windows(2) {
                assert!(pair[0].1 <= pair[1].0, "{} double-booked: {:?}", who, pair);
            }
        }

        assert!(peak_overlap(plan, |e| e.step_type == StepType::Cooking) <= kitchen.burners as usize);
        assert!(peak_overlap(plan, |_| true) <= kitchen.cooks as usize);

        // Every timed step appears once, after its predecessor has finished.
        for (idx, recipe) in recipes.iter().enumerate() {
            let mut own: Vec<&ScheduleEntry> = plan.entries.iter().filter(|e| e.recipe_index == idx).collect();
            own.sort_by_key(|e| e.step_index);
            let timed = recipe.steps.iter().filter(|s| s.step_type != StepType::PreStart).count();
            assert_eq!(own.len(), timed, "{} lost steps", recipe.dish_name);
            for pair in own.windows(2) {
                assert!(pair[1].time_offset_minutes >= pair[0].end_minutes());
            }
        }

        let expected_prereqs: usize = recipes.iter().map(|r| r.pre_start_steps().count()).sum();
        assert_eq!(plan.prerequisites.len(), expected_prereqs);
    }

    #[test]
    fn test_two_burners_run_both_dishes_in_parallel() {
        let recipes = vec![prep_then_cook("Soup"), prep_then_cook("Stew")];
        let kitchen = Kitchen::new(2, 2);
        let plan = plan_production(&recipes, kitchen).unwrap();

        assert_eq!(starts_of(&plan, StepType::Prep), vec![0, 0]);
        assert_eq!(starts_of(&plan, StepType::Cooking), vec![5, 5]);
        assert_eq!(plan.total_minutes, 15);
        assert_valid(&plan, &recipes, kitchen);
    }

    #[test]
    fn test_single_burner_serializes_cooking() {
        let recipes = vec![prep_then_cook("Soup"), prep_then_cook("Stew")];
        let kitchen = Kitchen::new(2, 1);
        let plan = plan_production(&recipes, kitchen).unwrap();

        let cooking = starts_of(&plan, StepType::Cooking);
        assert_eq!(cooking.len(), 2);
        assert_eq!(cooking[0], 5);
        assert!(cooking[1] >= 15);
        assert_eq!(plan.total_minutes, 25);
        assert_valid(&plan, &recipes, kitchen);
    }

    #[test]
    fn test_single_cook_does_one_thing_at_a_time() {
        let recipes = vec![prep_then_cook("Soup"), prep_then_cook("Stew")];
        let kitchen = Kitchen::new(1, 4);
        let plan = plan_production(&recipes, kitchen).unwrap();

        assert_eq!(plan.total_minutes, 30);
        assert!(plan.entries.iter().all(|e| e.assignees[0] == "Cook 1"));
        assert_valid(&plan, &recipes, kitchen);
    }

    #[test]
    fn test_longest_remaining_chain_starts_first() {
        let recipes = vec![
            recipe("Toast", vec![RecipeStep::new("Toast bread", 3, StepType::Cooking)]),
            recipe(
                "Braise",
                vec![
                    RecipeStep::new("Sear", 10, StepType::Cooking),
                    RecipeStep::new("Braise", 90, StepType::Cooking),
                ],
            ),
        ];
        let plan = plan_production(&recipes, Kitchen::new(1, 1)).unwrap();
        assert_eq!(plan.entries[0].involved_recipe_names, vec!["Braise".to_string()]);
        assert_eq!(plan.entries[0].time_offset_minutes, 0);
    }

    #[test]
    fn test_ties_go_to_selection_order() {
        let recipes = vec![prep_then_cook("First"), prep_then_cook("Second")];
        let plan = plan_production(&recipes, Kitchen::new(1, 1)).unwrap();
        assert_eq!(plan.entries[0].involved_recipe_names, vec!["First".to_string()]);
    }

    #[test]
    fn test_prep_fills_cook_while_burner_is_busy() {
        let recipes = vec![
            recipe(
                "Rice",
                vec![
                    RecipeStep::new("Boil rice", 20, StepType::Cooking),
                    RecipeStep::new("Steam rice", 20, StepType::Cooking),
                ],
            ),
            recipe("Curry", vec![RecipeStep::new("Fry paste", 5, StepType::Cooking)]),
            recipe("Salad", vec![RecipeStep::new("Chop salad", 5, StepType::Prep)]),
        ];
        let kitchen = Kitchen::new(2, 1);
        let plan = plan_production(&recipes, kitchen).unwrap();

        let salad = plan.entries.iter().find(|e| e.action == "Chop salad").unwrap();
        assert_eq!(salad.time_offset_minutes, 0);
        assert_eq!(salad.assignees, vec!["Cook 2".to_string()]);
        assert_valid(&plan, &recipes, kitchen);
    }

    #[test]
    fn test_pre_start_steps_become_prerequisites() {
        let recipes = vec![recipe(
            "Ribs",
            vec![
                RecipeStep::new("Marinate overnight", 720, StepType::PreStart),
                RecipeStep::new("Grill", 30, StepType::Cooking),
            ],
        )];
        let plan = plan_production(&recipes, Kitchen::new(1, 1)).unwrap();
        assert_eq!(plan.prerequisites.len(), 1);
        assert_eq!(plan.prerequisites[0].instruction, "Marinate overnight");
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].time_offset_minutes, 0);
        assert_eq!(plan.entries[0].step_index, 1);
        assert_eq!(plan.total_minutes, 30);
    }

    #[test]
    fn test_zero_minute_steps_do_not_stall() {
        let recipes = vec![recipe(
            "Garnish",
            vec![
                RecipeStep::new("Plate", 0, StepType::Prep),
                RecipeStep::new("Sprinkle", 0, StepType::Prep),
                RecipeStep::new("Warm", 2, StepType::Cooking),
            ],
        )];
        let plan = plan_production(&recipes, Kitchen::new(1, 1)).unwrap();
        assert_eq!(plan.entries.len(), 3);
        assert!(plan.entries.iter().all(|e| e.time_offset_minutes == 0));
        assert_eq!(plan.total_minutes, 2);
    }

    #[test]
    fn test_recipe_without_timed_steps() {
        let recipes = vec![recipe("Overnight oats", vec![RecipeStep::new("Soak", 480, StepType::PreStart)])];
        let plan = plan_production(&recipes, Kitchen::new(1, 1)).unwrap();
        assert!(plan.entries.is_empty());
        assert_eq!(plan.total_minutes, 0);
        assert_eq!(plan.prerequisites.len(), 1);
    }

    #[test]
    fn test_rejects_bad_input_before_scheduling() {
        let recipes = vec![prep_then_cook("Soup")];
        assert_eq!(plan_production(&recipes, Kitchen::new(0, 1)), Err(ScheduleError::NoCooks(0)));
        assert_eq!(plan_production(&recipes, Kitchen::new(1, 0)), Err(ScheduleError::NoBurners(0)));
        assert_eq!(plan_production(&[], Kitchen::new(1, 1)), Err(ScheduleError::NoRecipes));

        let msg = ScheduleError::NoBurners(0).to_string();
        assert!(msg.contains("burner"), "{}", msg);
    }

    #[test]
    fn test_plan_selected_resolves_ids() {
        let soup = prep_then_cook("Soup");
        let stew = prep_then_cook("Stew");
        let all = vec![soup.clone(), stew.clone()];

        let plan = plan_selected(&[stew.id], &all, Kitchen::new(1, 1)).unwrap();
        assert!(plan.entries.iter().all(|e| e.involved_recipe_names == vec!["Stew".to_string()]));

        let missing = RecipeId::new();
        assert_eq!(
            plan_selected(&[soup.id, missing], &all, Kitchen::new(1, 1)),
            Err(ScheduleError::UnknownRecipe(missing))
        );
    }

    #[test]
    fn test_huge_kitchen_behaves_like_one_with_a_station_per_step() {
        let recipes = vec![prep_then_cook("Soup"), prep_then_cook("Stew")];
        let huge = plan_production(&recipes, Kitchen::new(u32::MAX, u32::MAX)).unwrap();
        let roomy = plan_production(&recipes, Kitchen::new(4, 4)).unwrap();
        assert_eq!(huge, roomy);
        assert_eq!(huge.total_minutes, 15);
    }

    #[test]
    fn test_same_input_same_schedule() {
        let recipes = vec![prep_then_cook("Soup"), prep_then_cook("Stew"), prep_then_cook("Sauce")];
        let first = plan_production(&recipes, Kitchen::new(2, 1)).unwrap();
        let second = plan_production(&recipes, Kitchen::new(2, 1)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_random_selections_produce_valid_schedules() {
        let mut rng = StdRng::seed_from_u64(42);
        for round in 0..200 {
            let recipe_count = rng.gen_range(1..=5);
            let recipes: Vec<Recipe> = (0..recipe_count)
                .map(|r| {
                    let step_count = rng.gen_range(0..=6);
                    let steps = (0..step_count)
                        .map(|s| {
                            let step_type = match rng.gen_range(0..10) {
                                0 => StepType::PreStart,
                                1..=5 => StepType::Prep,
                                _ => StepType::Cooking,
                            };
                            RecipeStep::new(format!("r{} s{}", r, s), rng.gen_range(0..=30), step_type)
                        })
                        .collect();
                    recipe(&format!("Dish {}", r), steps)
                })
                .collect();
            let kitchen = Kitchen::new(rng.gen_range(1..=3), rng.gen_range(1..=3));

            let plan = plan_production(&recipes, kitchen)
                .unwrap_or_else(|e| panic!("round {} failed: {}", round, e));
            assert_valid(&plan, &recipes, kitchen);
        }
    }
}
