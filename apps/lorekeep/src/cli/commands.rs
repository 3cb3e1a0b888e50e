//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every edit command loads the registry file, runs one session edit and
//! writes the file back, history included, so `undo` works across runs.

use lorekeep_core::{
    Category, Cortex, FilterCriteria, HierarchyType, LinkStatus, LoreError, ObjectId, ObjectKind,
    OperationSink, Registry, RegistryMetrics, Session, TemporalDate, Traversal, registry_checksum,
    registry_hash, state_from_bytes, state_to_bytes, validate_registry,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum registry file size (500 MB).
///
/// This prevents memory exhaustion from malicious or accidental large files.
const MAX_REGISTRY_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), LoreError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| LoreError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(LoreError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate output path.
///
/// The parent directory must exist; the returned path has it canonicalized.
fn validate_output_path(path: &Path) -> Result<PathBuf, LoreError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        LoreError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(LoreError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| LoreError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Where the registry lives and how sessions over it are configured.
pub struct Context {
    path: PathBuf,
    history_limit: usize,
    json_mode: bool,
    sink: Option<Arc<dyn OperationSink>>,
}

impl Context {
    pub fn new(path: impl Into<PathBuf>, history_limit: usize, json_mode: bool) -> Self {
        Self {
            path: path.into(),
            history_limit,
            json_mode,
            sink: None,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn OperationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the registry file, or start empty if it does not exist.
    pub fn open(&self) -> Result<Session, LoreError> {
        let session = if self.path.exists() {
            validate_file_size(&self.path, MAX_REGISTRY_FILE_SIZE)?;
            let data = std::fs::read(&self.path)
                .map_err(|e| LoreError::Io(format!("Read registry: {}", e)))?;
            Session::from_state(state_from_bytes(&data)?)
        } else {
            Session::new()
        };

        let session = session.with_history_limit(self.history_limit);
        Ok(match &self.sink {
            Some(sink) => session.with_sink(sink.clone()),
            None => session,
        })
    }

    /// Write the registry and its history back to the file.
    pub fn save(&self, session: &Session) -> Result<(), LoreError> {
        let data = state_to_bytes(&session.to_state())?;
        std::fs::write(&self.path, &data)
            .map_err(|e| LoreError::Io(format!("Write registry: {}", e)))
    }

    /// Run one edit against the file.
    fn edit<T>(&self, apply: impl FnOnce(&mut Session) -> Result<T, LoreError>) -> Result<T, LoreError> {
        let mut session = self.open()?;
        let result = apply(&mut session)?;
        self.save(&session)?;
        Ok(result)
    }
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Print `"{action} {id}"`, or a JSON object in json mode.
fn report(ctx: &Context, action: &str, id: &ObjectId) {
    if ctx.json_mode {
        print_json(&json!({ "action": action, "id": id }));
    } else {
        println!("{} {}", action, id);
    }
}

fn describe(registry: &Registry, id: &ObjectId) -> String {
    match registry.get(id) {
        Some(object) => format!("{} ({}, {})", id, object.title(), object.kind),
        None => format!("{} (missing)", id),
    }
}

fn list(ctx: &Context, registry: &Registry, heading: &str, ids: &[ObjectId]) {
    if ctx.json_mode {
        print_json(&json!({ "ids": ids }));
        return;
    }
    println!("{}", heading);
    if ids.is_empty() {
        println!("  (none)");
    }
    for id in ids {
        println!("  {}", describe(registry, id));
    }
}

fn note_kind(container: bool) -> ObjectKind {
    if container {
        ObjectKind::ContainerNote
    } else {
        ObjectKind::SimpleNote
    }
}

// =============================================================================
// INIT / STATUS
// =============================================================================

/// Initialize a new registry file.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), LoreError> {
    if ctx.path.exists() && !force {
        return Err(LoreError::Rejected(
            "Registry already exists. Use --force to overwrite.".to_string(),
        ));
    }
    ctx.save(&Session::new())?;
    println!("Initialized new registry at {:?}", ctx.path);
    Ok(())
}

/// Show registry status.
pub fn cmd_status(ctx: &Context) -> Result<(), LoreError> {
    let session = ctx.open()?;
    let metrics = RegistryMetrics::from_registry(session.registry());
    let checksum = registry_checksum(session.registry())?;
    let undo_depth = session.history().count();

    if ctx.json_mode {
        print_json(&json!({
            "registry": ctx.path.to_string_lossy(),
            "metrics": metrics,
            "checksum": format!("{:#018x}", checksum),
            "undo_depth": undo_depth,
            "can_redo": session.can_redo(),
        }));
        return Ok(());
    }

    println!("Lorekeep Registry Status");
    println!("========================");
    println!("Registry: {:?}", ctx.path);
    println!();
    println!("Objects:            {}", metrics.objects);
    println!("Notes:              {}", metrics.notes);
    println!("Containers:         {}", metrics.containers);
    println!("Links:              {}", metrics.links);
    println!("Hierarchical Links: {}", metrics.hierarchical_links);
    println!("Reified Links:      {}", metrics.reified_links);
    println!("Hubs:               {}", metrics.hubs);
    println!("Snapshots:          {}", metrics.snapshots);
    println!("Max Depth:          {}", metrics.max_depth);
    println!("Violations:         {}", metrics.violations);
    println!();
    println!("Undo Depth: {}", undo_depth);
    println!("Can Redo:   {}", session.can_redo());
    println!("Checksum:   {:#018x}", checksum);

    Ok(())
}

// =============================================================================
// NODE COMMANDS
// =============================================================================

/// Create a free-standing note.
pub fn cmd_note(
    ctx: &Context,
    title: &str,
    category: Category,
    gist: &str,
    aliases: &[String],
    container: bool,
) -> Result<(), LoreError> {
    let aliases: Vec<&str> = aliases.iter().map(String::as_str).collect();
    let id = ctx.edit(|s| s.create_note(note_kind(container), title, category, gist, &aliases))?;
    report(ctx, "created", &id);
    Ok(())
}

/// Create a note inside a container.
pub fn cmd_child(
    ctx: &Context,
    parent: &str,
    title: &str,
    category: Category,
    container: bool,
) -> Result<(), LoreError> {
    let parent = ObjectId::new(parent);
    let id = ctx.edit(|s| s.add_child(&parent, note_kind(container), title, category))?;
    report(ctx, "created", &id);
    Ok(())
}

/// Move an object into another container.
pub fn cmd_reparent(ctx: &Context, child: &str, parent: &str) -> Result<(), LoreError> {
    let (child, parent) = (ObjectId::new(child), ObjectId::new(parent));
    ctx.edit(|s| s.reparent(&child, &parent, None))?;
    report(ctx, "moved", &child);
    Ok(())
}

/// Cascade-delete an object.
pub fn cmd_delete(ctx: &Context, id: &str) -> Result<(), LoreError> {
    let id = ObjectId::new(id);
    ctx.edit(|s| s.delete(&id))?;
    report(ctx, "deleted", &id);
    Ok(())
}

/// Recompute subtree mass under a root.
pub fn cmd_mass(ctx: &Context, root: &str) -> Result<(), LoreError> {
    let root = ObjectId::new(root);
    let mass = ctx.edit(|s| s.recompute_mass(&root))?;
    if ctx.json_mode {
        print_json(&json!({ "id": root, "total_subtree_mass": mass }));
    } else {
        println!("{} total subtree mass: {}", root, mass);
    }
    Ok(())
}

// =============================================================================
// LINK COMMANDS
// =============================================================================

/// Create a binary or hierarchical link.
pub fn cmd_link(
    ctx: &Context,
    source: &str,
    target: &str,
    verb: &str,
    inverse: &str,
    hierarchy: Option<HierarchyType>,
) -> Result<(), LoreError> {
    let (source, target) = (ObjectId::new(source), ObjectId::new(target));
    let id = ctx.edit(|s| match hierarchy {
        Some(h) => s.link_hierarchical(&source, &target, h, verb, inverse),
        None => s.link(&source, &target, verb, inverse),
    })?;
    report(ctx, "linked", &id);
    Ok(())
}

/// Promote a binary link to a hub.
pub fn cmd_promote(ctx: &Context, link: &str) -> Result<(), LoreError> {
    let link = ObjectId::new(link);
    let hub = ctx.edit(|s| s.promote_to_hub(&link))?;
    report(ctx, "promoted", &hub);
    Ok(())
}

/// Add a participant to a hub.
pub fn cmd_join(ctx: &Context, hub: &str, node: &str, role: &str, verb: &str) -> Result<(), LoreError> {
    let (hub, node) = (ObjectId::new(hub), ObjectId::new(node));
    ctx.edit(|s| s.add_participant(&hub, &node, role, verb))?;
    report(ctx, "joined", &hub);
    Ok(())
}

/// Remove a participant from a hub.
pub fn cmd_leave(ctx: &Context, hub: &str, node: &str) -> Result<(), LoreError> {
    let (hub, node) = (ObjectId::new(hub), ObjectId::new(node));
    ctx.edit(|s| s.remove_participant(&hub, &node))?;
    report(ctx, "left", &hub);
    Ok(())
}

/// Reify a plain link, or collapse a bridging node into a hub.
pub fn cmd_reify(ctx: &Context, id: &str) -> Result<(), LoreError> {
    let id = ObjectId::new(id);
    let reified = ctx.edit(|s| {
        let is_link = s.registry().get(&id).is_some_and(|o| o.is_plain_link());
        if is_link { s.reify_link(&id) } else { s.reify_node(&id) }
    })?;
    report(ctx, "reified", &reified);
    Ok(())
}

// =============================================================================
// TIME COMMANDS
// =============================================================================

/// Create a historical snapshot.
pub fn cmd_snapshot(
    ctx: &Context,
    base: &str,
    title: &str,
    start: TemporalDate,
    end: Option<TemporalDate>,
) -> Result<(), LoreError> {
    let base = ObjectId::new(base);
    let id = ctx.edit(|s| s.create_snapshot(&base, title, start, end))?;
    report(ctx, "snapshot", &id);
    Ok(())
}

/// Parse `YEAR=TITLE` stack entries.
pub fn parse_stack_entries(entries: &[String]) -> Result<Vec<(i32, String)>, LoreError> {
    entries
        .iter()
        .map(|entry| {
            let (year, title) = entry
                .split_once('=')
                .ok_or_else(|| LoreError::Rejected(format!("Expected YEAR=TITLE, got '{}'", entry)))?;
            let year = year
                .trim()
                .parse::<i32>()
                .map_err(|_| LoreError::Rejected(format!("Invalid year in '{}'", entry)))?;
            Ok((year, title.trim().to_string()))
        })
        .collect()
}

/// Import a flat year stack as consecutive snapshots.
pub fn cmd_stack(ctx: &Context, base: &str, entries: &[String]) -> Result<(), LoreError> {
    let base = ObjectId::new(base);
    let entries = parse_stack_entries(entries)?;
    let created = ctx.edit(|s| s.import_flat_stack(&base, &entries))?;

    if ctx.json_mode {
        print_json(&json!({ "base": base, "snapshots": created }));
    } else {
        println!("Imported {} snapshots of {}", created.len(), base);
        for id in &created {
            println!("  {}", id);
        }
    }
    Ok(())
}

/// Rebuild the era tree of a base identity.
pub fn cmd_infer(ctx: &Context, base: &str) -> Result<(), LoreError> {
    let base = ObjectId::new(base);
    let placed = ctx.edit(|s| s.infer_temporal_hierarchy(&base))?;
    if ctx.json_mode {
        print_json(&json!({ "base": base, "placed": placed }));
    } else {
        println!("Placed {} snapshots under {}", placed, base);
    }
    Ok(())
}

/// Find the snapshot of `base` covering `at`.
pub fn cmd_seek(ctx: &Context, base: &str, at: TemporalDate) -> Result<(), LoreError> {
    let session = ctx.open()?;
    let base = ObjectId::new(base);
    let found = Traversal::seek_snapshot(session.registry(), &base, &at);

    if ctx.json_mode {
        print_json(&json!({ "base": base, "at": at.to_string(), "snapshot": found }));
        return Ok(());
    }
    match found {
        Some(id) => println!("{} at {}: {}", base, at, describe(session.registry(), &id)),
        None => println!("{} has no snapshot covering {}", base, at),
    }
    Ok(())
}

// =============================================================================
// SEARCH COMMANDS
// =============================================================================

/// Show the one-hop context of an object.
pub fn cmd_context(ctx: &Context, id: &str) -> Result<(), LoreError> {
    let session = ctx.open()?;
    let id = ObjectId::new(id);
    if !session.registry().contains(&id) {
        return Err(LoreError::NotFound(id));
    }
    let context = Cortex::expand_context(session.registry(), &id);
    list(ctx, session.registry(), &format!("Context of {}:", id), &context);
    Ok(())
}

/// List agents acting on an object through hubs.
pub fn cmd_influence(ctx: &Context, id: &str) -> Result<(), LoreError> {
    let session = ctx.open()?;
    let id = ObjectId::new(id);
    let influences = Cortex::trace_influence(session.registry(), &id);

    if ctx.json_mode {
        print_json(&json!({ "target": id, "influences": influences }));
        return Ok(());
    }
    println!("Influences on {}:", id);
    if influences.is_empty() {
        println!("  (none)");
    }
    for influence in &influences {
        println!(
            "  {} as {} via {} (weight {})",
            describe(session.registry(), &influence.agent_id),
            influence.role,
            influence.hub_id,
            influence.weight
        );
    }
    Ok(())
}

/// Find where two objects meet.
pub fn cmd_intersect(ctx: &Context, a: &str, b: &str) -> Result<(), LoreError> {
    let session = ctx.open()?;
    let (a, b) = (ObjectId::new(a), ObjectId::new(b));
    let meeting = Cortex::find_intersection(session.registry(), &a, &b);

    if ctx.json_mode {
        print_json(&json!({ "a": a, "b": b, "intersection": meeting }));
        return Ok(());
    }
    match meeting {
        Some(id) => println!("{} and {} meet at {}", a, b, describe(session.registry(), &id)),
        None => println!("{} and {} do not meet", a, b),
    }
    Ok(())
}

/// Filter notes by mass, time range, verb and proximity.
pub fn cmd_filter(
    ctx: &Context,
    min_mass: Option<f64>,
    range: Option<(TemporalDate, TemporalDate)>,
    verb: Option<String>,
    near: &[String],
) -> Result<(), LoreError> {
    let session = ctx.open()?;

    let mut criteria = FilterCriteria::new().near(near.iter().map(ObjectId::new));
    if let Some(mass) = min_mass {
        criteria = criteria.with_min_mass(mass);
    }
    if let Some((start, end)) = range {
        criteria = criteria.with_time_range(start, end);
    }
    if let Some(verb) = verb {
        criteria = criteria.with_verb(verb);
    }

    let matches = Cortex::filter_graph(session.registry(), &criteria);
    list(ctx, session.registry(), "Matches:", &matches);
    Ok(())
}

// =============================================================================
// AUDIT COMMANDS
// =============================================================================

/// Audit every invariant. Fails if anything is found.
pub fn cmd_check(ctx: &Context) -> Result<(), LoreError> {
    let session = ctx.open()?;
    let violations = validate_registry(session.registry());

    for (id, violation) in &violations {
        tracing::warn!(%id, %violation, "invariant violated");
    }
    if ctx.json_mode {
        let found: Vec<_> = violations
            .iter()
            .map(|(id, v)| json!({ "id": id, "violation": v.to_string() }))
            .collect();
        print_json(&json!({ "violations": found }));
    } else if violations.is_empty() {
        println!("Registry is consistent");
    } else {
        for (id, violation) in &violations {
            println!("  {}: {}", id, violation);
        }
    }

    match violations.len() {
        0 => Ok(()),
        n => Err(LoreError::Rejected(format!("{} invariant violations", n))),
    }
}

/// Show links the integrity service flags.
pub fn cmd_integrity(ctx: &Context) -> Result<(), LoreError> {
    let session = ctx.open()?;
    let map = session.integrity_map();
    let flagged: Vec<(&ObjectId, &LinkStatus)> =
        map.iter().filter(|(_, s)| **s != LinkStatus::Approved).collect();

    for (id, status) in &flagged {
        tracing::warn!(%id, ?status, "link flagged");
    }
    if ctx.json_mode {
        print_json(&json!({ "links": map }));
        return Ok(());
    }
    println!("{} links checked, {} flagged", map.len(), flagged.len());
    for (id, status) in flagged {
        println!("  {:?}: {}", status, describe(session.registry(), id));
    }
    Ok(())
}

// =============================================================================
// HISTORY COMMANDS
// =============================================================================

/// Revert the last edit.
pub fn cmd_undo(ctx: &Context) -> Result<(), LoreError> {
    let label = ctx.edit(|s| Ok(s.undo()))?;
    match label {
        Some(label) => println!("Undid: {}", label),
        None => println!("Nothing to undo"),
    }
    Ok(())
}

/// Re-apply the last undone edit.
pub fn cmd_redo(ctx: &Context) -> Result<(), LoreError> {
    let label = ctx.edit(|s| Ok(s.redo()))?;
    match label {
        Some(label) => println!("Redid: {}", label),
        None => println!("Nothing to redo"),
    }
    Ok(())
}

/// List the undo history, oldest first.
pub fn cmd_history(ctx: &Context) -> Result<(), LoreError> {
    let session = ctx.open()?;
    let labels: Vec<&str> = session.history().collect();
    if ctx.json_mode {
        print_json(&json!({ "history": labels, "can_redo": session.can_redo() }));
        return Ok(());
    }
    for (i, label) in labels.iter().enumerate() {
        println!("{:>4}  {}", i.saturating_add(1), label);
    }
    Ok(())
}

// =============================================================================
// OUTPUT COMMANDS
// =============================================================================

/// Export every object as pretty JSON.
pub fn cmd_export(ctx: &Context, output: &Path) -> Result<(), LoreError> {
    let validated_output = validate_output_path(output)?;
    let session = ctx.open()?;

    let objects: Vec<_> = session.registry().objects().collect();
    let data = serde_json::to_vec_pretty(&objects)
        .map_err(|e| LoreError::Serialization(e.to_string()))?;
    std::fs::write(&validated_output, &data)
        .map_err(|e| LoreError::Io(format!("Write file: {}", e)))?;

    println!("Exported {} objects ({} bytes) to {:?}", objects.len(), data.len(), validated_output);
    Ok(())
}

/// Compute BLAKE3 hash of the registry.
pub fn cmd_hash(ctx: &Context) -> Result<(), LoreError> {
    let session = ctx.open()?;
    let hash = registry_hash(session.registry())?;

    if ctx.json_mode {
        print_json(&json!({ "algorithm": "blake3", "hash": hash }));
    } else {
        println!("BLAKE3: {}", hash);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
