//! Line-based operator console on stdin.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::definition::HandlerKind;
use crate::reconcile::ReconcileScope;
use crate::Data;

const HELP: &str = "\
Commands:
  reload [--force|-f] [name,...]     reload everything, or only the named definitions
  reload --exclude|-x name,...       reload everything except the named definitions
  status                             show loaded definitions
  help                               show this message";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Reload(ReconcileScope),
    Status,
    Help,
}

/// Parses one console line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };

    match command.to_ascii_lowercase().as_str() {
        "reload" => {
            let mut force = false;
            let mut exclude = false;
            let mut names = HashSet::new();
            for word in words {
                match word {
                    "--force" | "-f" => force = true,
                    "--exclude" | "-x" => exclude = true,
                    flag if flag.starts_with('-') => return Err(format!("unknown flag '{flag}'")),
                    list => names.extend(
                        list.split(',')
                            .map(str::trim)
                            .filter(|n| !n.is_empty())
                            .map(String::from),
                    ),
                }
            }
            if names.is_empty() {
                if exclude {
                    return Err("--exclude needs at least one name".to_string());
                }
                return Ok(Some(ConsoleCommand::Reload(ReconcileScope::All { force })));
            }
            if force {
                return Err("--force only applies to a full reload".to_string());
            }
            Ok(Some(ConsoleCommand::Reload(ReconcileScope::Selected { names, exclude })))
        }
        "status" => Ok(Some(ConsoleCommand::Status)),
        "help" | "?" => Ok(Some(ConsoleCommand::Help)),
        other => Err(format!("unknown command '{other}', try 'help'")),
    }
}

fn status(data: &Data) -> String {
    let registry = data.registry.read();
    let mut out = format!("{} definitions loaded", registry.total());
    for kind in HandlerKind::ALL {
        out.push_str(&format!("\n  {:<16} {}", kind.as_str(), registry.len(kind)));
    }
    out.push_str(&format!("\n  handlers: {}", data.handlers.ids().join(", ")));
    out.push_str(&format!(
        "\n  remote sync: {}",
        if data.reconciler.has_remote() { "attached" } else { "waiting for gateway" }
    ));
    out
}

/// Reads commands until stdin closes.
pub async fn run(data: Arc<Data>) {
    info!("Console ready, type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Console input failed: {}", e);
                break;
            }
        };

        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Help)) => println!("{HELP}"),
            Ok(Some(ConsoleCommand::Status)) => println!("{}", status(&data)),
            Ok(Some(ConsoleCommand::Reload(scope))) => match data.reconciler.reconcile(&scope).await {
                Ok(report) => println!("Reloaded: {report}"),
                Err(e) => println!("Reload failed: {e}"),
            },
            Err(e) => println!("{e}"),
        }
    }
    info!("Console closed");
}
