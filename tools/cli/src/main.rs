//! Sklad CLI - Command line interface for the snippet vault.
//!
//! Every invocation opens a session over the data directory, applies one
//! command and exits. The vault key only lives for the duration of the
//! process, so commands that touch secret content ask for the master
//! password.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sklad_app::Session;
use sklad_common::{NodeId, SensitiveString};
use sklad_storage::{Desktop, LocalBackend};
use sklad_vault::{Node, NodeKind, VaultState};

#[derive(Parser)]
#[command(name = "sklad")]
#[command(about = "Sklad - Snippet warehouse with a locked vault for secrets")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Data directory (default: the platform data dir + "sklad").
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the snippet tree.
    Tree,

    /// Add a folder.
    AddFolder {
        /// Parent folder id (default: root).
        #[arg(short, long)]
        parent: Option<String>,

        /// Folder label.
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Add a snippet.
    AddSnippet {
        /// Parent folder id (default: root).
        #[arg(short, long)]
        parent: Option<String>,

        /// Snippet label.
        #[arg(short, long)]
        label: Option<String>,

        /// Snippet value.
        #[arg(long)]
        value: Option<String>,

        /// Store the value in the vault.
        #[arg(long)]
        secret: bool,
    },

    /// Rename a node.
    Rename { id: String, label: String },

    /// Remove a node and everything below it.
    Rm { id: String },

    /// Move a node.
    Mv {
        id: String,

        /// New parent folder id (default: root).
        #[arg(short, long)]
        parent: Option<String>,

        /// Sibling to insert before (default: append).
        #[arg(short, long)]
        before: Option<String>,
    },

    /// Print a snippet's value.
    Show { id: String },

    /// Copy a snippet's value to the clipboard.
    Copy { id: String },

    /// Set up the master password.
    Init,

    /// Show vault status.
    Status,

    /// Destroy all secrets and the master password.
    Reset {
        /// Confirm the reset.
        #[arg(long)]
        yes: bool,
    },

    /// Show or change settings.
    Settings {
        /// Auto-lock timeout in seconds.
        #[arg(long)]
        lock_timeout: Option<u64>,

        /// Enable or disable copy notifications.
        #[arg(long)]
        notifications: Option<bool>,
    },
}

/// Clipboard stand-in for a terminal: copied text goes to stdout.
struct TerminalDesktop;

impl Desktop for TerminalDesktop {
    fn write_clipboard(&self, text: &str) -> sklad_common::Result<()> {
        println!("{}", text);
        Ok(())
    }

    fn hide_window(&self) -> sklad_common::Result<()> {
        Ok(())
    }

    fn notify(&self, title: &str, body: &str) -> sklad_common::Result<()> {
        info!("{}: {}", title, body);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .context("Could not determine the data directory, pass --data-dir")?
            .join("sklad"),
    };
    debug!("Data directory: {}", data_dir.display());

    let backend = LocalBackend::new(&data_dir, Arc::new(TerminalDesktop))
        .context("Failed to open data directory")?;
    let mut session = Session::open(Arc::new(backend))
        .await
        .context("Failed to open session")?;

    match cli.command {
        Commands::Tree => cmd_tree(&session),

        Commands::AddFolder { parent, label } => {
            cmd_add(&mut session, NodeKind::Folder, parent, label, None, false).await
        }

        Commands::AddSnippet {
            parent,
            label,
            value,
            secret,
        } => cmd_add(&mut session, NodeKind::Snippet, parent, label, value, secret).await,

        Commands::Rename { id, label } => {
            let id = node_id(&id)?;
            session.rename_node(&id, &label).await;
            Ok(())
        }

        Commands::Rm { id } => {
            let id = node_id(&id)?;
            session.delete_node(&id).await;
            Ok(())
        }

        Commands::Mv { id, parent, before } => cmd_move(&mut session, id, parent, before).await,

        Commands::Show { id } => cmd_show(&mut session, &id).await,

        Commands::Copy { id } => cmd_copy(&mut session, &id).await,

        Commands::Init => cmd_init(&mut session).await,

        Commands::Status => cmd_status(&session, &data_dir),

        Commands::Reset { yes } => cmd_reset(&mut session, yes).await,

        Commands::Settings {
            lock_timeout,
            notifications,
        } => cmd_settings(&mut session, lock_timeout, notifications).await,
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    if std::env::var_os("RUST_LOG").is_some() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
        return Ok(());
    }

    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn node_id(raw: &str) -> Result<NodeId> {
    NodeId::new(raw).context("Invalid node id")
}

fn optional_id(raw: Option<String>) -> Result<Option<NodeId>> {
    raw.as_deref().map(node_id).transpose()
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<SensitiveString> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(SensitiveString::from(password))
}

/// Unlock if needed, retrying on a wrong password.
async fn ensure_unlocked(session: &mut Session) -> Result<()> {
    match session.vault_state() {
        VaultState::Unlocked => return Ok(()),
        VaultState::Uninitialized => bail!("No master password set. Run `sklad init` first."),
        VaultState::Locked => {}
    }

    for _ in 0..3 {
        let password = prompt_password("Master password: ")?;
        match session.unlock(&password).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() => eprintln!("{}", e),
            Err(e) => return Err(e).context("Failed to unlock vault"),
        }
    }
    bail!("Too many failed attempts")
}

fn cmd_tree(session: &Session) -> Result<()> {
    if session.forest().is_empty() {
        println!("No snippets.");
        return Ok(());
    }
    for node in session.forest().nodes() {
        print_node(node, 0);
    }
    Ok(())
}

fn print_node(node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        Node::Folder(folder) => {
            println!("{}{}/  [{}]", indent, folder.label, folder.id);
            for child in &folder.children {
                print_node(child, depth + 1);
            }
        }
        Node::Snippet(snippet) => {
            let marker = if snippet.is_secret { " (secret)" } else { "" };
            println!("{}{}{}  [{}]", indent, snippet.label, marker, snippet.id);
        }
    }
}

async fn cmd_add(
    session: &mut Session,
    kind: NodeKind,
    parent: Option<String>,
    label: Option<String>,
    value: Option<String>,
    secret: bool,
) -> Result<()> {
    let parent = optional_id(parent)?;
    if secret {
        ensure_unlocked(session).await?;
    }

    let Some(id) = session.add_node(parent.as_ref(), kind).await else {
        bail!("Parent must be an existing folder");
    };
    if let Some(label) = label {
        session.rename_node(&id, &label).await;
    }

    if value.is_some() || secret {
        let mut node = session
            .forest()
            .find_by_id(&id)
            .cloned()
            .context("Created node disappeared")?;
        if let Node::Snippet(snippet) = &mut node {
            snippet.value = value.unwrap_or_default();
            snippet.is_secret = secret;
        }
        session.save_node(node).await.context("Failed to save snippet")?;
    }

    println!("{}", id);
    Ok(())
}

async fn cmd_move(
    session: &mut Session,
    id: String,
    parent: Option<String>,
    before: Option<String>,
) -> Result<()> {
    let id = node_id(&id)?;
    let parent = optional_id(parent)?;
    let before = optional_id(before)?;

    let original = session.forest().clone();
    session.move_node(&id, parent.as_ref(), before.as_ref()).await;
    if session.forest() == &original {
        bail!("Move rejected: target must be an existing folder outside the moved node");
    }
    Ok(())
}

async fn cmd_show(session: &mut Session, raw: &str) -> Result<()> {
    let id = node_id(raw)?;
    let node = session.forest().find_by_id(&id).context("No such node")?;
    if node.is_secret() {
        ensure_unlocked(session).await?;
    }
    println!("{}", session.snippet_value(&id)?);
    Ok(())
}

async fn cmd_copy(session: &mut Session, raw: &str) -> Result<()> {
    let id = node_id(raw)?;
    let node = session.forest().find_by_id(&id).context("No such node")?;
    if node.is_secret() {
        ensure_unlocked(session).await?;
    }
    session.copy_snippet(&id).await.context("Copy failed")?;
    Ok(())
}

async fn cmd_init(session: &mut Session) -> Result<()> {
    if session.vault_state() != VaultState::Uninitialized {
        bail!("A master password is already set");
    }

    let password = prompt_password("New master password: ")?;
    let confirm = prompt_password("Confirm master password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    session
        .initialize_vault(&password)
        .await
        .context("Failed to initialize vault")?;
    println!("Vault initialized.");
    Ok(())
}

fn cmd_status(session: &Session, data_dir: &std::path::Path) -> Result<()> {
    let settings = session.settings();
    let secrets = session.forest().iter().filter(|node| node.is_secret()).count();

    println!("Sklad status:");
    println!("  Data directory: {}", data_dir.display());
    println!("  Vault: {}", session.vault_state());
    println!("  Nodes: {} ({} secret)", session.forest().len(), secrets);
    println!("  Auto-lock: {} s", settings.lock_timeout().as_secs());
    println!("  Notifications: {}", settings.notifications_enabled);
    Ok(())
}

async fn cmd_reset(session: &mut Session, yes: bool) -> Result<()> {
    session.request_reset();
    if !yes {
        session.cancel_reset();
        bail!("This deletes every secret snippet and the master password. Re-run with --yes.");
    }

    session.confirm_reset().await.context("Reset failed")?;
    println!("Vault reset.");
    Ok(())
}

async fn cmd_settings(
    session: &mut Session,
    lock_timeout: Option<u64>,
    notifications: Option<bool>,
) -> Result<()> {
    let mut settings = session.settings().clone();
    if let Some(secs) = lock_timeout {
        settings.security.lock_timeout = secs;
    }
    if let Some(enabled) = notifications {
        settings.notifications_enabled = enabled;
    }
    if &settings != session.settings() {
        session.update_settings(settings).await;
    }

    println!("{}", session.settings().to_json()?);
    Ok(())
}
