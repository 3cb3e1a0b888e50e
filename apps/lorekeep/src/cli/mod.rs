//! # Lorekeep CLI Module
//!
//! This module implements the CLI interface for Lorekeep.
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new registry file
//! - `status` - Show registry counts and history
//! - `note`, `child` - Create notes, free-standing or inside a container
//! - `link`, `promote`, `join`, `leave` - Links and hubs
//! - `reparent`, `delete`, `mass` - Containment edits
//! - `reify` - Reify a link, or collapse a bridging node into a hub
//! - `snapshot`, `stack`, `infer`, `seek` - Temporal snapshots and eras
//! - `context`, `influence`, `intersect`, `filter` - Composite searches
//! - `check`, `integrity` - Audits
//! - `undo`, `redo`, `history` - Edit history
//! - `export`, `hash` - Output

mod commands;

use crate::config::Config;
use crate::sync::HttpSink;
use clap::{Parser, Subcommand};
use lorekeep_core::{Category, HierarchyType, LoreError, OperationSink, TemporalDate};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Lorekeep - worldbuilding knowledge graph
///
/// Typed notes, links, hubs and temporal eras, with undoable edits.
#[derive(Parser, Debug)]
#[command(name = "lorekeep")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file (default: ./lorekeep.toml if present)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the registry file (overrides config)
    #[arg(short = 'R', long, global = true)]
    pub registry: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty registry
    Init {
        /// Overwrite an existing registry
        #[arg(short, long)]
        force: bool,
    },

    /// Show registry status
    Status,

    /// Create a free-standing note
    Note {
        title: String,

        #[arg(short, long, default_value = "CONCEPT")]
        category: Category,

        /// Short summary
        #[arg(short, long, default_value = "")]
        gist: String,

        /// Comma-separated alternative names
        #[arg(short, long, value_delimiter = ',')]
        aliases: Vec<String>,

        /// Create a container note
        #[arg(long)]
        container: bool,
    },

    /// Create a note inside a container
    Child {
        parent: String,
        title: String,

        #[arg(short, long, default_value = "CONCEPT")]
        category: Category,

        /// Create a container note
        #[arg(long)]
        container: bool,
    },

    /// Link two objects
    Link {
        source: String,
        target: String,

        /// Relationship verb; empty makes a simple link
        #[arg(default_value = "")]
        verb: String,

        /// Verb read from the target's side
        #[arg(short, long, default_value = "")]
        inverse: String,

        /// Make a hierarchical link (PARENT_OF, PART_OF, LOCATED_IN, MEMBER_OF)
        #[arg(short = 'H', long)]
        hierarchy: Option<HierarchyType>,
    },

    /// Move an object into another container
    Reparent {
        child: String,
        parent: String,
    },

    /// Delete an object and everything that depends on it
    Delete { id: String },

    /// Promote a binary link to a hub
    Promote { link: String },

    /// Add a participant to a hub
    Join {
        hub: String,
        node: String,

        #[arg(short, long, default_value = "MEMBER")]
        role: String,

        #[arg(long, default_value = "")]
        verb: String,
    },

    /// Remove a participant from a hub
    Leave { hub: String, node: String },

    /// Reify a link, or collapse a bridging node into a hub
    Reify { id: String },

    /// Recompute subtree mass under a root
    Mass { root: String },

    /// Create a historical snapshot
    Snapshot {
        base: String,
        title: String,

        /// YYYY, YYYY-MM or YYYY-MM-DD
        #[arg(short, long)]
        start: TemporalDate,

        /// Omit for an open-ended range
        #[arg(short, long)]
        end: Option<TemporalDate>,
    },

    /// Import a flat year stack as consecutive snapshots
    Stack {
        base: String,

        /// Entries as YEAR=TITLE
        #[arg(required = true)]
        entries: Vec<String>,
    },

    /// Rebuild the era tree of a base identity
    Infer { base: String },

    /// Find the snapshot of a base covering a date
    Seek { base: String, at: TemporalDate },

    /// Show the one-hop context of an object
    Context { id: String },

    /// List agents acting on an object through hubs
    Influence { id: String },

    /// Find where two objects meet
    Intersect { a: String, b: String },

    /// Filter notes by mass, time, verb and proximity
    Filter {
        #[arg(long)]
        min_mass: Option<f64>,

        #[arg(long, requires = "to")]
        from: Option<TemporalDate>,

        #[arg(long, requires = "from")]
        to: Option<TemporalDate>,

        #[arg(long)]
        verb: Option<String>,

        /// Comma-separated ids; keep only their neighbourhood
        #[arg(long, value_delimiter = ',')]
        near: Vec<String>,
    },

    /// Audit every registry invariant
    Check,

    /// Show link integrity annotations
    Integrity,

    /// Revert the last edit
    Undo,

    /// Re-apply the last undone edit
    Redo,

    /// List the undo history
    History,

    /// Export the registry as JSON
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Compute BLAKE3 cryptographic hash of the registry
    Hash,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and loaded configuration.
pub async fn execute(cli: Cli, config: Config) -> Result<(), LoreError> {
    let sink = HttpSink::from_config(&config.sync)?.map(Arc::new);
    let drain_budget = Duration::from_millis(config.sync.timeout_ms);

    let mut ctx = Context::new(
        cli.registry.unwrap_or(config.registry.path),
        config.history.limit,
        cli.json_mode,
    );
    if let Some(sink) = &sink {
        ctx = ctx.with_sink(sink.clone() as Arc<dyn OperationSink>);
    }

    let result = dispatch(&ctx, cli.command);

    if let Some(sink) = &sink {
        let abandoned = sink.drain(drain_budget).await;
        if abandoned > 0 {
            tracing::warn!(abandoned, endpoint = sink.endpoint(), "sync batches not delivered");
        }
    }
    result
}

fn dispatch(ctx: &Context, command: Option<Commands>) -> Result<(), LoreError> {
    match command {
        Some(Commands::Init { force }) => cmd_init(ctx, force),
        Some(Commands::Status) | None => cmd_status(ctx),
        Some(Commands::Note {
            title,
            category,
            gist,
            aliases,
            container,
        }) => cmd_note(ctx, &title, category, &gist, &aliases, container),
        Some(Commands::Child {
            parent,
            title,
            category,
            container,
        }) => cmd_child(ctx, &parent, &title, category, container),
        Some(Commands::Link {
            source,
            target,
            verb,
            inverse,
            hierarchy,
        }) => cmd_link(ctx, &source, &target, &verb, &inverse, hierarchy),
        Some(Commands::Reparent { child, parent }) => cmd_reparent(ctx, &child, &parent),
        Some(Commands::Delete { id }) => cmd_delete(ctx, &id),
        Some(Commands::Promote { link }) => cmd_promote(ctx, &link),
        Some(Commands::Join {
            hub,
            node,
            role,
            verb,
        }) => cmd_join(ctx, &hub, &node, &role, &verb),
        Some(Commands::Leave { hub, node }) => cmd_leave(ctx, &hub, &node),
        Some(Commands::Reify { id }) => cmd_reify(ctx, &id),
        Some(Commands::Mass { root }) => cmd_mass(ctx, &root),
        Some(Commands::Snapshot {
            base,
            title,
            start,
            end,
        }) => cmd_snapshot(ctx, &base, &title, start, end),
        Some(Commands::Stack { base, entries }) => cmd_stack(ctx, &base, &entries),
        Some(Commands::Infer { base }) => cmd_infer(ctx, &base),
        Some(Commands::Seek { base, at }) => cmd_seek(ctx, &base, at),
        Some(Commands::Context { id }) => cmd_context(ctx, &id),
        Some(Commands::Influence { id }) => cmd_influence(ctx, &id),
        Some(Commands::Intersect { a, b }) => cmd_intersect(ctx, &a, &b),
        Some(Commands::Filter {
            min_mass,
            from,
            to,
            verb,
            near,
        }) => cmd_filter(ctx, min_mass, from.zip(to), verb, &near),
        Some(Commands::Check) => cmd_check(ctx),
        Some(Commands::Integrity) => cmd_integrity(ctx),
        Some(Commands::Undo) => cmd_undo(ctx),
        Some(Commands::Redo) => cmd_redo(ctx),
        Some(Commands::History) => cmd_history(ctx),
        Some(Commands::Export { output }) => cmd_export(ctx, &output),
        Some(Commands::Hash) => cmd_hash(ctx),
    }
}
