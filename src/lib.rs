pub mod api_connection;
pub mod canonical;
pub mod cli;
pub mod config;
pub mod error;
pub mod pantry;
pub mod production;
pub mod recipe;
pub mod recipe_aggregator;
pub mod recipe_parser;
pub mod store;
