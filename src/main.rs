mod catalog;
mod common;
mod executors;
mod index;
mod planner;
mod storage;
mod tuple;

use std::path::Path;

use anyhow::{Context, Error, Result};
use clap::{Parser, Subcommand};

use catalog::Catalog;
use executors::{Executor, ExecutorFactory};
use index::builder::build_index;
use planner::physical_plan::PhysicalPlan;
use storage::file_manager::FileManager;

#[derive(Parser)]
struct Config {
    #[arg(long, help = "Directory where relation and index files are stored")]
    data: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the tables known to the catalog.
    Tables,
    /// Print every tuple of a relation.
    Dump { relation: String },
    /// Bulk-build a B+-tree index over one attribute of a relation.
    Index {
        relation: String,
        attribute: String,

        #[arg(long, help = "Rewrite the relation in key order first")]
        clustered: bool,

        #[arg(long, default_value_t = 15, help = "Tree order (half fanout)")]
        order: usize,
    },
}

fn main() -> Result<()> {
    let config = Config::parse();

    let file_manager = FileManager::new(&config.data)?;
    let catalog = Catalog::load(Path::new(&config.data))
        .with_context(|| "Failed to load catalog".to_string())?;

    match config.command {
        Command::Tables => {
            println!("{}", catalog.list_tables().join(" "));
        }
        Command::Dump { relation } => {
            let schema = catalog
                .get_schema(&relation)
                .ok_or_else(|| Error::msg(format!("Unknown table {}", relation)))?;
            let factory = ExecutorFactory::new(&file_manager);
            let mut executor = factory.create_executor(PhysicalPlan::SequentialScan {
                table: relation,
                output_schema: schema,
            })?;
            while let Some(tuple) = executor.next() {
                println!("{}", tuple?);
            }
        }
        Command::Index {
            relation,
            attribute,
            clustered,
            order,
        } => {
            let schema = catalog
                .get_schema(&relation)
                .ok_or_else(|| Error::msg(format!("Unknown table {}", relation)))?;
            build_index(
                &file_manager,
                &relation,
                &schema,
                &attribute,
                clustered,
                order,
            )?;
            println!("Built index {}", index::index_file_name(&relation, &attribute));
        }
    }

    Ok(())
}
