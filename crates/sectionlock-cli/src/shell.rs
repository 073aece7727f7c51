//! Interactive shell
//!
//! Each `connect` opens a simulated push connection on the shell's resource
//! and prints the lock changes it receives. `disconnect` closes it, which
//! releases that account's locks.

use std::collections::HashMap;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use sectionlock_core::api::LockApi;
use sectionlock_core::domain::identity::Principal;
use sectionlock_core::domain::locking::Section;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{OutputFormat, print_error, print_locks, spawn_listener};

const HELP: &str = "\
Commands:
  connect <account> [--admin]   Open a connection and follow lock changes
  lock <account> <section>      Lock a section
  unlock <account> <section>    Release a section
  unlock-all <account>          Release every lock (admin connections only)
  list                          Show current locks
  disconnect <account>          Close a connection, releasing its locks
  sections                      Show lockable sections
  help                          Show this help
  quit                          Close all connections and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ShellCommand {
    Connect { account: String, admin: bool },
    Lock { account: String, section: String },
    Unlock { account: String, section: String },
    UnlockAll { account: String },
    List,
    Disconnect { account: String },
    Sections,
    Help,
    Quit,
}

/// Parse one line of shell input
///
/// Returns `Ok(None)` for blank lines.
pub(crate) fn parse_command(line: &str) -> Result<Option<ShellCommand>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(None);
    };

    let command = match (verb.to_ascii_lowercase().as_str(), args) {
        ("connect", [account]) => ShellCommand::Connect {
            account: account.to_string(),
            admin: false,
        },
        ("connect", [account, "--admin"]) => ShellCommand::Connect {
            account: account.to_string(),
            admin: true,
        },
        ("lock", [account, section]) => ShellCommand::Lock {
            account: account.to_string(),
            section: section.to_string(),
        },
        ("unlock", [account, section]) => ShellCommand::Unlock {
            account: account.to_string(),
            section: section.to_string(),
        },
        ("unlock-all", [account]) => ShellCommand::UnlockAll {
            account: account.to_string(),
        },
        ("list", []) => ShellCommand::List,
        ("disconnect", [account]) => ShellCommand::Disconnect {
            account: account.to_string(),
        },
        ("sections", []) => ShellCommand::Sections,
        ("help" | "?", []) => ShellCommand::Help,
        ("quit" | "exit", []) => ShellCommand::Quit,
        (
            "connect" | "lock" | "unlock" | "unlock-all" | "list" | "disconnect" | "sections"
            | "help" | "quit",
            _,
        ) => return Err(format!("Wrong arguments for `{}`. Type `help` for usage.", verb)),
        _ => return Err(format!("Unknown command: {}. Type `help` for usage.", verb)),
    };
    Ok(Some(command))
}

struct Connection {
    principal: Principal,
    disconnect: CancellationToken,
    listener: JoinHandle<()>,
}

struct Session {
    api: LockApi,
    resource_id: String,
    format: OutputFormat,
    connections: HashMap<String, Connection>,
}

impl Session {
    /// The connected principal for `account`, or a plain editor
    fn principal(&self, account: &str) -> Principal {
        self.connections
            .get(account)
            .map_or_else(|| Principal::user(account), |c| c.principal.clone())
    }

    async fn execute(&mut self, command: ShellCommand) -> anyhow::Result<bool> {
        match command {
            ShellCommand::Connect { account, admin } => {
                if self.connections.contains_key(&account) {
                    println!("  {} is already connected", account);
                    return Ok(true);
                }
                let principal = if admin {
                    Principal::admin(account.as_str())
                } else {
                    Principal::user(account.as_str())
                };
                let disconnect = CancellationToken::new();
                match self
                    .api
                    .on_lock_changed(&principal, &self.resource_id, disconnect.clone())
                    .await
                {
                    Ok(subscription) => {
                        let listener = spawn_listener(account.clone(), subscription, self.format);
                        self.connections.insert(
                            account.clone(),
                            Connection {
                                principal,
                                disconnect,
                                listener,
                            },
                        );
                        println!("  {} connected", account);
                    }
                    Err(e) => print_error(&e, self.format),
                }
            }
            ShellCommand::Lock { account, section } => {
                let principal = self.principal(&account);
                match self.api.lock(&principal, &self.resource_id, &section).await {
                    Ok(_) => println!("  {} locked {}", account, section.to_uppercase()),
                    Err(e) => print_error(&e, self.format),
                }
            }
            ShellCommand::Unlock { account, section } => {
                let principal = self.principal(&account);
                match self.api.unlock(&principal, &self.resource_id, &section).await {
                    Ok(true) => println!("  {} unlocked {}", account, section.to_uppercase()),
                    Ok(false) => println!("  {} was not locked", section.to_uppercase()),
                    Err(e) => print_error(&e, self.format),
                }
            }
            ShellCommand::UnlockAll { account } => {
                let principal = self.principal(&account);
                match self.api.unlock_all(&principal, &self.resource_id).await {
                    Ok(removed) => println!("  Released {} lock(s)", removed.len()),
                    Err(e) => print_error(&e, self.format),
                }
            }
            ShellCommand::List => {
                let viewer = Principal::user("shell");
                match self.api.get_locks(&viewer, &self.resource_id).await {
                    Ok(locks) => print_locks(&locks, self.format)?,
                    Err(e) => print_error(&e, self.format),
                }
            }
            ShellCommand::Disconnect { account } => match self.connections.remove(&account) {
                Some(connection) => {
                    connection.disconnect.cancel();
                    connection.listener.await?;
                }
                None => println!("  {} is not connected", account),
            },
            ShellCommand::Sections => {
                for section in Section::ALL {
                    println!("  {}", section);
                }
            }
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        for (account, connection) in self.connections.drain() {
            debug!(account = %account, "Closing connection");
            connection.disconnect.cancel();
            connection.listener.await?;
        }
        Ok(())
    }
}

/// Run the shell until `quit` or end of input
pub(crate) async fn run(
    api: LockApi,
    resource_id: String,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut session = Session {
        api,
        resource_id,
        format,
        connections: HashMap::new(),
    };

    println!("Resource {}", session.resource_id);
    println!("Type `help` for commands.");

    loop {
        let line = match editor.readline("sectionlock> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let _ = editor.add_history_entry(line.as_str());

        match parse_command(&line) {
            Ok(Some(command)) => {
                if !session.execute(command).await? {
                    break;
                }
            }
            Ok(None) => {}
            Err(message) => println!("  {}", message),
        }
    }

    session.close().await
}
