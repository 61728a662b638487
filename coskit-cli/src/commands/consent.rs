//! Remembered consent decisions.

use clap::Subcommand;
use coskit_core::Origin;

use crate::context::Context;
use crate::{parse_origin, GlobalArgs};

#[derive(Subcommand)]
pub enum ConsentCommand {
    /// List remembered decisions
    List {
        /// Print the ledger snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Forget remembered decisions
    Clear {
        /// Only forget decisions of this origin
        #[arg(long, value_parser = parse_origin)]
        origin: Option<Origin>,
    },
}

pub fn run(global: &GlobalArgs, command: ConsentCommand) -> eyre::Result<()> {
    let context = Context::open(global)?;
    let ledger = context.broker().ledger();

    match command {
        ConsentCommand::List { json: true } => {
            println!("{}", serde_json::to_string_pretty(&ledger.snapshot())?);
        }
        ConsentCommand::List { json: false } => {
            for record in ledger.records() {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.origin, record.hash, record.decision, record.operation, record.timestamp
                );
            }
        }
        ConsentCommand::Clear { origin: Some(origin) } => {
            let removed = context.broker().clear_site_data(&origin);
            context.save_ledger()?;
            println!("forgot {removed} decisions for {origin}");
        }
        ConsentCommand::Clear { origin: None } => {
            let removed = ledger.clear();
            context.save_ledger()?;
            println!("forgot {removed} decisions");
        }
    }
    Ok(())
}
