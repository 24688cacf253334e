// Command-line interface

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ingreedy")]
#[command(about = "Ingreedy - find recipes by the ingredients you have", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the corpus and start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long, env = "HOST")]
        host: Option<String>,
    },

    /// Run database migrations
    Migrate,

    /// Import raw recipes from a JSON file into the database
    Import {
        /// JSON file holding a list of recipe records
        path: PathBuf,
    },

    /// Rebuild the corpus and store the processed recipes
    Rebuild {
        /// Also write the processed recipes to this JSON file
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Search a running server by ingredients
    Search {
        /// Ingredient names
        #[arg(required = true)]
        ingredients: Vec<String>,

        /// Maximum number of results
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let cli =
            Cli::try_parse_from(["ingreedy", "search", "garlic", "olive oil", "-n", "3"])
                .unwrap();
        match cli.command {
            Commands::Search {
                ingredients,
                max_results,
            } => {
                assert_eq!(ingredients, vec!["garlic", "olive oil"]);
                assert_eq!(max_results, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["ingreedy", "search"]).is_err());
    }

    #[test]
    fn test_parse_rebuild() {
        let cli = Cli::try_parse_from(["ingreedy", "rebuild", "--export", "out.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Rebuild { export: Some(ref p) } if p == &PathBuf::from("out.json")
        ));
    }
}
