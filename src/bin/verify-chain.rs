use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use std::collections::HashSet;
use std::path::Path;
use tracing::{error, info};

use log_ledger::ledger::block::Block;
use log_ledger::ledger::store::parse_chain_document;
use log_ledger::ledger::{verify_chain, DEFAULT_DIFFICULTY};

fn main() -> Result<()> {
    let matches = Command::new("verify-chain")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Verify the integrity of a persisted log ledger")
        .arg(
            Arg::new("chain-path")
                .short('c')
                .long("chain-path")
                .value_name("PATH")
                .help("Path to the chain document")
                .required(true),
        )
        .arg(
            Arg::new("entry")
                .short('e')
                .long("entry")
                .value_name("ID")
                .help("Report which block seals this entry"),
        )
        .arg(
            Arg::new("difficulty")
                .short('d')
                .long("difficulty")
                .value_name("ZEROS")
                .value_parser(clap::value_parser!(usize))
                .help("Leading zero hex digits every block hash must carry"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppress output except errors"),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");

    let level = if quiet {
        tracing::Level::ERROR
    } else if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let chain_path = matches
        .get_one::<String>("chain-path")
        .ok_or_else(|| anyhow!("--chain-path is required"))?;
    let entry_id = matches.get_one::<String>("entry");
    let difficulty = matches
        .get_one::<usize>("difficulty")
        .copied()
        .unwrap_or(DEFAULT_DIFFICULTY);

    if let Err(e) = verify_chain_file(chain_path, entry_id.map(String::as_str), difficulty, verbose, quiet) {
        error!("Chain verification failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn verify_chain_file(
    path: &str,
    entry_id: Option<&str>,
    difficulty: usize,
    verbose: bool,
    quiet: bool,
) -> Result<()> {
    info!("Verifying chain: {} (difficulty {})", path, difficulty);

    if !Path::new(path).exists() {
        return Err(anyhow!("Chain file not found: {}", path));
    }

    let contents = std::fs::read_to_string(path)?;
    let chain = parse_chain_document(&contents)?;
    if chain.is_empty() {
        return Err(anyhow!("Chain is empty"));
    }

    let result = verify_chain(&chain, difficulty);

    if verbose {
        println!("{}", result.detailed_status());
        print_summary(&chain);
    }

    check_duplicate_entries(&chain)?;

    if let Some(entry_id) = entry_id {
        match chain.iter().find(|block| block.contains_entry(entry_id)) {
            Some(block) => {
                let intact = if block.has_valid_hash() { "intact" } else { "TAMPERED" };
                println!("Entry {} is sealed in block {} ({})", entry_id, block.index, intact);
            }
            None => println!("Entry {} is not in the chain", entry_id),
        }
    }

    if !result.is_valid {
        return Err(anyhow!(result.summary()));
    }

    if !quiet {
        println!("{}", result.summary());
    }
    Ok(())
}

fn print_summary(chain: &[Block]) {
    println!("\nChain Summary:");
    println!("  Blocks: {}", chain.len());
    if let (Some(first), Some(last)) = (chain.first(), chain.last()) {
        println!("  Genesis hash: {}", first.hash);
        println!("  Head hash: {}", last.hash);
        println!("  Head index: {}", last.index);
    }
    for block in chain.iter().skip(1) {
        println!("  {}", block.summary());
    }
}

fn check_duplicate_entries(chain: &[Block]) -> Result<()> {
    let mut seen = HashSet::new();
    for block in chain {
        for entry in block.entries() {
            if !seen.insert(entry.id.as_str()) {
                return Err(anyhow!("Entry {} is sealed more than once", entry.id));
            }
        }
    }
    Ok(())
}
