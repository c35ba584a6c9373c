use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Keep a recipe box, build a pantry index, shopping lists and cooking schedules", long_about = None)]
pub struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Recipe store file (defaults to RECIPE_STORE_PATH or recipes.json)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Owner whose recipes are used (defaults to RECIPE_OWNER or "local")
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract a recipe with the model and save it
    Add(AddArgs),
    /// List saved recipes
    List,
    /// Print one recipe
    Show { id: String },
    /// Delete a recipe
    Delete { id: String },
    /// Mark two recipes as going well together
    Pair { first: String, second: String },
    /// Remove a pairing
    Unpair { first: String, second: String },
    /// Show every ingredient and the dishes using it
    Pantry,
    /// Combined shopping list for some recipes
    Shopping {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Interleave the steps of some recipes into one schedule
    Schedule(ScheduleArgs),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct AddArgs {
    /// Path to a file with the recipe text
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Recipe web page
    #[arg(short, long)]
    pub url: Option<String>,

    /// Recipe text given inline
    #[arg(short, long)]
    pub text: Option<String>,
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// People cooking
    #[arg(long, default_value_t = 1)]
    pub cooks: u32,

    /// Burners (or other heat stations) available
    #[arg(long, default_value_t = 2)]
    pub burners: u32,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
