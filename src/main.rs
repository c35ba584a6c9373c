use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use recipe_planner::api_connection::endpoints::Provider;
use recipe_planner::cli::{parse_args, AddArgs, Cli, Commands, ScheduleArgs};
use recipe_planner::config::AppConfig;
use recipe_planner::pantry::PantryIndex;
use recipe_planner::production::{plan_selected, Kitchen, ProductionPlan};
use recipe_planner::recipe::{find_by_alias, OwnerId, Recipe, RecipeId};
use recipe_planner::recipe_aggregator::{aggregate_shopping_list, ShoppingList};
use recipe_planner::recipe_parser::{ExtractionGate, OpenRouterExtractor, RecipeExtractor, RecipeSource};
use recipe_planner::store::{pair_recipes, unpair_recipes, LocalRecipeStore, RecipeStore};

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("recipe_planner=debug")
        } else {
            EnvFilter::new("recipe_planner=warn")
        }
    });
    fmt().with_env_filter(filter).with_target(false).init();
}

/// Accept a full id, or a dish name / variation, from the owner's current snapshot.
fn resolve_recipe(recipes: &[Recipe], reference: &str) -> Result<RecipeId> {
    let found = match reference.parse::<RecipeId>() {
        Ok(id) => recipes.iter().find(|r| r.id == id),
        Err(_) => find_by_alias(recipes, reference),
    };
    found
        .map(|r| r.id)
        .ok_or_else(|| anyhow!("No recipe with id or name '{}'", reference))
}

fn resolve_all(recipes: &[Recipe], references: &[String]) -> Result<Vec<RecipeId>> {
    references.iter().map(|r| resolve_recipe(recipes, r)).collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

async fn add_recipe(
    args: AddArgs,
    store: &LocalRecipeStore,
    owner: &OwnerId,
    config: &AppConfig,
    json: bool,
) -> Result<()> {
    let source = match (args.file, args.url, args.text) {
        (Some(path), _, _) => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read recipe file '{}'", path.display()))?;
            RecipeSource::Text(text)
        }
        (None, Some(url), _) => RecipeSource::Url(url),
        (None, None, Some(text)) => RecipeSource::from_input(&text),
        (None, None, None) => bail!("Give a recipe with --file, --url or --text"),
    };

    let existing_names = PantryIndex::build(&store.snapshot(owner)).canonical_names();
    let provider = Provider::openrouter(&config.api_key_env_var).with_upstreams(config.upstreams.clone());
    let extractor: Arc<dyn RecipeExtractor> = Arc::new(OpenRouterExtractor::new(provider, config.model.clone()));

    println!("Extracting recipe with {}...", config.model);
    let gate = ExtractionGate::new();
    let pending = gate.begin(extractor, source, existing_names)?;
    let draft = pending.outcome().await.context("Recipe extraction failed")?;

    let dish_name = draft.dish_name.clone();
    let id = store.create(owner, draft).await.context("Failed to save recipe")?;
    if json {
        print_json(&serde_json::json!({ "id": id, "dishName": dish_name }))
    } else {
        println!("Saved '{}' as {}", dish_name, id);
        Ok(())
    }
}

fn print_recipe_list(recipes: &[Recipe]) {
    if recipes.is_empty() {
        println!("No recipes yet. Add one with `recipe_planner add`.");
        return;
    }
    for recipe in recipes {
        let aliases = if recipe.variations.is_empty() {
            String::new()
        } else {
            format!(" (also: {})", recipe.variations.join(", "))
        };
        println!(
            "{}  {}{}  [{} min, serves {}]",
            recipe.id, recipe.dish_name, aliases, recipe.total_time_minutes, recipe.servings
        );
    }
}

fn print_pantry(index: &PantryIndex) {
    if index.is_empty() {
        println!("Pantry is empty.");
        return;
    }
    for ingredient in index.ingredients() {
        println!("{}: {}", ingredient.name, ingredient.recipes_using.join(", "));
    }
}

fn print_shopping_list(list: &ShoppingList) {
    for item in &list.items {
        println!("- {} {} {}", item.display_name, format_amount(item.value), item.unit);
    }
    for id in &list.unknown_recipes {
        println!("! recipe {} was not found and is not included", id);
    }
}

fn format_amount(value: f64) -> String {
    let text = format!("{:.1}", value);
    if let Some(whole) = text.strip_suffix(".0") {
        return whole.to_string();
    }
    text
}

fn print_schedule(plan: &ProductionPlan) {
    if !plan.prerequisites.is_empty() {
        println!("Before you start:");
        for prereq in &plan.prerequisites {
            println!(
                "  [{}] {} ({} min)",
                prereq.dish_name, prereq.instruction, prereq.duration_minutes
            );
        }
        println!();
    }
    for entry in &plan.entries {
        println!(
            "{:>4} min  +{:<3} {:<8} [{}] {}  <{}>",
            entry.time_offset_minutes,
            entry.duration_minutes,
            entry.step_type.to_string(),
            entry.involved_recipe_names.join(", "),
            entry.action,
            entry.assignees.join(", ")
        );
    }
    println!("\nEverything is ready after {} min.", plan.total_minutes);
}

fn schedule(args: ScheduleArgs, recipes: &[Recipe], json: bool) -> Result<()> {
    let ids = resolve_all(recipes, &args.ids)?;
    let plan = plan_selected(&ids, recipes, Kitchen::new(args.cooks, args.burners))
        .context("Could not build a schedule")?;
    if json {
        print_json(&plan)
    } else {
        print_schedule(&plan);
        Ok(())
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::from_env();
    if let Some(path) = cli.store {
        config.store_path = path;
    }
    if let Some(owner) = cli.owner {
        config.owner = OwnerId::new(owner);
    }

    let store = LocalRecipeStore::open(&config.store_path)
        .await
        .with_context(|| format!("Failed to open recipe store '{}'", config.store_path.display()))?;
    let owner = config.owner.clone();
    let mut subscription = store.subscribe(&owner);
    let recipes = subscription
        .next()
        .await
        .ok_or_else(|| anyhow!("Recipe store closed before delivering a snapshot"))?;

    match cli.command {
        Commands::Add(args) => add_recipe(args, &store, &owner, &config, cli.json).await,
        Commands::List => {
            if cli.json {
                print_json(&recipes)
            } else {
                print_recipe_list(&recipes);
                Ok(())
            }
        }
        Commands::Show { id } => {
            let id = resolve_recipe(&recipes, &id)?;
            let recipe = recipes
                .iter()
                .find(|r| r.id == id)
                .ok_or_else(|| anyhow!("No recipe {}", id))?;
            print_json(recipe)
        }
        Commands::Delete { id } => {
            let id = resolve_recipe(&recipes, &id)?;
            store.delete(&owner, id).await.context("Failed to delete recipe")?;
            println!("Deleted {}", id);
            Ok(())
        }
        Commands::Pair { first, second } => {
            let (a, b) = (resolve_recipe(&recipes, &first)?, resolve_recipe(&recipes, &second)?);
            pair_recipes(&store, &owner, a, b).await.context("Failed to pair recipes")?;
            println!("Paired {} with {}", a, b);
            Ok(())
        }
        Commands::Unpair { first, second } => {
            let (a, b) = (resolve_recipe(&recipes, &first)?, resolve_recipe(&recipes, &second)?);
            unpair_recipes(&store, &owner, a, b).await.context("Failed to unpair recipes")?;
            println!("Unpaired {} and {}", a, b);
            Ok(())
        }
        Commands::Pantry => {
            let index = PantryIndex::build(&recipes);
            if cli.json {
                print_json(&index.ingredients())
            } else {
                print_pantry(&index);
                Ok(())
            }
        }
        Commands::Shopping { ids } => {
            let ids = resolve_all(&recipes, &ids)?;
            let list = aggregate_shopping_list(&ids, &recipes);
            if cli.json {
                print_json(&list)
            } else {
                print_shopping_list(&list);
                Ok(())
            }
        }
        Commands::Schedule(args) => schedule(args, &recipes, cli.json),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = parse_args();
    init_tracing(cli.verbose);
    run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipe_planner::recipe::RecipeDraft;

    fn recipe(owner: &str, dish: &str) -> Recipe {
        Recipe::from_draft(
            RecipeId::new(),
            OwnerId::new(owner),
            RecipeDraft {
                dish_name: dish.to_string(),
                variations: vec!["Potage".to_string()],
                ..Default::default()
            },
            chrono::Utc::now(),
        )
    }

    #[test]
    fn test_resolve_only_finds_recipes_in_the_snapshot() {
        let soup = recipe("alice", "Soup");
        let elsewhere = recipe("bob", "Stew");
        let snapshot = vec![soup.clone()];

        assert_eq!(resolve_recipe(&snapshot, &soup.id.to_string()).unwrap(), soup.id);
        assert_eq!(resolve_recipe(&snapshot, "potage").unwrap(), soup.id);
        assert!(resolve_recipe(&snapshot, &elsewhere.id.to_string()).is_err());
        assert!(resolve_recipe(&snapshot, "Stew").is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(30.0), "30");
        assert_eq!(format_amount(2.5), "2.5");
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(1e20), "100000000000000000000");
    }
}
