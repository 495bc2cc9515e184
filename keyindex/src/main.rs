// Forbid unwrap() in production code to prevent panics from corrupt data.
// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use clap::{Parser, Subcommand};
use keyindex::config::IndexConfig;
use keyindex::storage::{Index, Key, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "keyindex",
    version,
    about = "Integer key index stored in a single file",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Insert a key, or overwrite its value.
    Insert {
        #[arg(allow_negative_numbers = true)]
        key: Key,
        #[arg(allow_negative_numbers = true)]
        value: Value,
    },
    /// Print the value stored for a key.
    Get {
        #[arg(allow_negative_numbers = true)]
        key: Key,
    },
    /// Remove a key.
    Remove {
        #[arg(allow_negative_numbers = true)]
        key: Key,
    },
    /// Print every entry in key order.
    Dump,
    /// Print slot usage.
    Stats,
    /// Check the structure of the index file.
    Verify,
}

/// Run `command` against the index, returning the lines to print.
fn execute(index: &mut Index, command: &Command) -> Result<Vec<String>, String> {
    let lines = match *command {
        Command::Insert { key, value } => match index.insert(key, value) {
            Ok(Some(old)) => vec![format!("updated {key}: {old} -> {value}")],
            Ok(None) => vec![format!("inserted {key}")],
            Err(e) => return Err(e.to_string()),
        },
        Command::Get { key } => match index.lookup(key) {
            Ok(Some(value)) => vec![value.to_string()],
            Ok(None) => return Err(format!("key {key} not found")),
            Err(e) => return Err(e.to_string()),
        },
        Command::Remove { key } => {
            let value = index.remove(key).map_err(|e| e.to_string())?;
            vec![format!("removed {key} (was {value})")]
        }
        Command::Dump => index
            .entries()
            .map_err(|e| e.to_string())?
            .into_iter()
            .map(|(key, value)| format!("{key} {value}"))
            .collect(),
        Command::Stats => {
            let stats = index.stats().map_err(|e| e.to_string())?;
            vec![
                format!("total_slots {}", stats.total_slots),
                format!("live_nodes {}", stats.live_nodes),
                format!("free_slots {}", stats.free_slots),
            ]
        }
        Command::Verify => {
            let report = index.verify().map_err(|e| e.to_string())?;
            if !report.is_ok() {
                return Err(format!(
                    "verification found {} problem(s)",
                    report.violations.len()
                ));
            }
            vec![format!(
                "ok: {} nodes, {} free, {} slots",
                report.tree_nodes, report.free_slots, report.total_slots
            )]
        }
    };
    Ok(lines)
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyindex=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration from environment variables
    let config = match IndexConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    tracing::debug!(
        "Loaded configuration: path={}, sync_writes={}",
        config.path.display(),
        config.sync_writes
    );

    let mut index = match Index::open_with_config(&config) {
        Ok(index) => index,
        Err(e) => {
            tracing::error!("Failed to open index {}: {e}", config.path.display());
            std::process::exit(1);
        }
    };

    let result = execute(&mut index, &cli.command);

    if let Err(e) = index.close() {
        tracing::error!("Failed to close index: {e}");
        std::process::exit(1);
    }

    match result {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        let argv = std::iter::once("keyindex").chain(args.iter().copied());
        Cli::try_parse_from(argv).map(|cli| cli.command)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse(&["insert", "3", "-1"]).unwrap(),
            Command::Insert { key: 3, value: -1 }
        );
        assert_eq!(parse(&["get", "7"]).unwrap(), Command::Get { key: 7 });
        assert_eq!(parse(&["remove", "-9"]).unwrap(), Command::Remove { key: -9 });
        assert_eq!(parse(&["dump"]).unwrap(), Command::Dump);
        assert_eq!(parse(&["stats"]).unwrap(), Command::Stats);
        assert_eq!(parse(&["verify"]).unwrap(), Command::Verify);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        use clap::error::ErrorKind;

        assert!(parse(&[]).is_err());
        assert_eq!(
            parse(&["get"]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert_eq!(
            parse(&["get", "abc"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
        assert_eq!(
            parse(&["compact"]).unwrap_err().kind(),
            ErrorKind::InvalidSubcommand
        );
    }

    #[test]
    fn test_execute_against_index() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut index = Index::open(&dir.path().join("cli.idx")).expect("open");

        let run = |index: &mut Index, list: &[&str]| {
            let command = parse(list).expect("parse");
            execute(index, &command)
        };
        assert_eq!(run(&mut index, &["insert", "2", "20"]), Ok(vec!["inserted 2".to_string()]));
        assert_eq!(
            run(&mut index, &["insert", "2", "21"]),
            Ok(vec!["updated 2: 20 -> 21".to_string()])
        );
        run(&mut index, &["insert", "1", "10"]).expect("insert");
        assert_eq!(
            run(&mut index, &["dump"]),
            Ok(vec!["1 10".to_string(), "2 21".to_string()])
        );
        assert_eq!(run(&mut index, &["get", "1"]), Ok(vec!["10".to_string()]));
        assert!(run(&mut index, &["get", "5"]).is_err());
        assert!(run(&mut index, &["remove", "5"]).is_err());
        assert_eq!(
            run(&mut index, &["remove", "2"]),
            Ok(vec!["removed 2 (was 21)".to_string()])
        );
        assert_eq!(
            run(&mut index, &["stats"]),
            Ok(vec![
                "total_slots 3".to_string(),
                "live_nodes 1".to_string(),
                "free_slots 1".to_string(),
            ])
        );
        assert!(run(&mut index, &["verify"]).is_ok());
    }
}
