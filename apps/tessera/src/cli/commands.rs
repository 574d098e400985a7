//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every command opens the redb database, runs through a [`Session`] and
//! prints either human-readable text or, with `--json-mode`, JSON.

use crate::config::Config;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tessera_core::{
    Directive, Directives, Node, NodeId, Outcome, Player, RedbStorage, Session, Subject,
    TesseraError, TypeSchemaProvider, UpdateModel,
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of an update-model file (100 MB).
const MAX_MODEL_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), TesseraError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| TesseraError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(TesseraError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve symlinks and `..` and make sure the path is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, TesseraError> {
    let canonical = path.canonicalize().map_err(|e| {
        TesseraError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(TesseraError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Output switches shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
    pub verbose: bool,
}

fn print_json(value: &impl Serialize) -> Result<(), TesseraError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| TesseraError::Serialization(format!("Encode output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn describe(directive: &Directive) -> String {
    let subject = match directive.subject {
        Subject::Node(id) => format!("node {}", id),
        Subject::Edge(id) => format!("edge {}", id),
    };
    format!("{:?} {}", directive.kind, subject)
}

fn print_directives(directives: &Directives) {
    for directive in directives.iter() {
        println!("  {}", describe(directive));
    }
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create the database and install the configured types. Returns the
/// number of types installed.
pub fn init_database(
    db_path: &Path,
    config: &Config,
    force: bool,
) -> Result<usize, TesseraError> {
    if db_path.exists() {
        if !force {
            return Err(TesseraError::Precondition(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| TesseraError::Io(format!("Remove old database: {}", e)))?;
    }

    let mut session = Session::with_redb(db_path)?;
    let schemas = config.schema.clone().into_ordered_schemas()?;
    let count = schemas.len();
    for schema in schemas {
        let uri = schema.uri.clone();
        session
            .install_type(schema)
            .map_err(|e| e.in_context(&uri, None, None))?;
    }
    tracing::info!(database = %db_path.display(), types = count, "initialized database");
    Ok(count)
}

/// Initialize a new database.
pub fn cmd_init(
    db_path: &Path,
    config: &Config,
    force: bool,
    out: Output,
) -> Result<(), TesseraError> {
    let count = init_database(db_path, config, force)?;
    if out.json {
        return print_json(&serde_json::json!({
            "database": db_path.to_string_lossy(),
            "types_installed": count,
        }));
    }
    if !out.quiet {
        println!(
            "Initialized new database at {:?} with {} types",
            db_path, count
        );
    }
    Ok(())
}

// =============================================================================
// TYPES COMMAND
// =============================================================================

/// Summary of one installed type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    pub uri: String,
    pub name: String,
    pub data_kind: &'static str,
    pub slots: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identity: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub label: Vec<String>,
}

/// Every registered type, by URI.
pub fn type_infos(session: &Session<RedbStorage>) -> Vec<TypeInfo> {
    let schemas = session.schemas();
    schemas
        .uris()
        .iter()
        .filter_map(|uri| schemas.find_type(uri))
        .map(|schema| TypeInfo {
            uri: schema.uri.clone(),
            name: schema.name.clone(),
            data_kind: schema.data_kind.uri(),
            slots: schema
                .assoc_defs
                .iter()
                .map(|def| format!("{} ({})", def.uri(), def.cardinality().uri()))
                .collect(),
            identity: schema.identity_attrs.clone(),
            label: schema.label_config.clone(),
        })
        .collect()
}

/// List installed types.
pub fn cmd_types(db_path: &Path, out: Output) -> Result<(), TesseraError> {
    let session = open_session(db_path)?;
    let types = type_infos(&session);
    if out.json {
        return print_json(&types);
    }

    println!("Installed Types");
    println!("===============");
    for info in &types {
        println!("{} [{}]", info.uri, info.data_kind);
        for slot in &info.slots {
            println!("  - {}", slot);
        }
        if !info.identity.is_empty() {
            println!("  identity: {}", info.identity.join(", "));
        }
    }
    Ok(())
}

// =============================================================================
// INTEGRATE COMMAND
// =============================================================================

/// Parse one update model or a JSON array of them.
pub fn parse_models(text: &str) -> Result<Vec<UpdateModel>, TesseraError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| TesseraError::Serialization(format!("Invalid JSON: {}", e)))?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        single => vec![single],
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|e| {
                TesseraError::Serialization(format!("Update model {}: {}", index, e))
            })
        })
        .collect()
}

/// Integrate every model of a file. Each model runs in its own
/// transaction; models before a failing one stay integrated.
pub fn integrate_file(
    session: &mut Session<RedbStorage>,
    file: &Path,
    reference: Option<u64>,
) -> Result<Vec<Outcome>, TesseraError> {
    let path = validate_file_path(file)?;
    validate_file_size(&path, MAX_MODEL_FILE_SIZE)?;
    let text = std::fs::read_to_string(&path)
        .map_err(|e| TesseraError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;

    let mut outcomes = Vec::new();
    for (index, mut model) in parse_models(&text)?.into_iter().enumerate() {
        let outcome = session
            .integrate(&mut model, reference.map(NodeId))
            .inspect_err(|e| tracing::error!(model = index, error = %e, "integration failed"))?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Integrate update models from a JSON file.
pub fn cmd_integrate(
    db_path: &Path,
    file: &Path,
    reference: Option<u64>,
    out: Output,
) -> Result<(), TesseraError> {
    let mut session = open_session(db_path)?;
    let outcomes = integrate_file(&mut session, file, reference)?;
    if out.json {
        return print_json(&outcomes);
    }

    for outcome in &outcomes {
        match &outcome.value.node {
            Some(node) => println!(
                "node {} ({}) '{}': {} changes",
                node.id,
                node.type_uri,
                node.value,
                outcome.directives.len()
            ),
            None => println!("nothing to integrate"),
        }
        if out.verbose {
            print_directives(&outcome.directives);
        }
    }
    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Render a node and its loaded children as an indented tree.
pub fn render_tree(node: &Node) -> String {
    let mut text = String::new();
    render_node(node, 0, &mut text);
    text
}

fn render_node(node: &Node, indent: usize, text: &mut String) {
    text.push_str(&format!(
        "{:indent$}#{} {}: {}\n",
        "",
        node.id,
        node.type_uri,
        node.value,
        indent = indent
    ));
    for (slot, value) in node.children.iter() {
        for related in value.iter() {
            let edge = &related.edge;
            if edge.value.is_empty() {
                text.push_str(&format!("{:indent$}  {} ->\n", "", slot, indent = indent));
            } else {
                text.push_str(&format!(
                    "{:indent$}  {} [{}] ->\n",
                    "",
                    slot,
                    edge.value,
                    indent = indent
                ));
            }
            render_node(&related.node, indent + 4, text);
        }
    }
}

/// Print a node with its children.
pub fn cmd_show(db_path: &Path, id: u64, depth: usize, out: Output) -> Result<(), TesseraError> {
    let session = open_session(db_path)?;
    let node = session.fetch_tree(NodeId(id), depth)?;
    if out.json {
        return print_json(&node);
    }
    print!("{}", render_tree(&node));
    Ok(())
}

// =============================================================================
// LABEL COMMAND
// =============================================================================

/// Recalculate and print a label.
pub fn cmd_label(db_path: &Path, id: u64, edge: bool, out: Output) -> Result<(), TesseraError> {
    let mut session = open_session(db_path)?;
    let player = if edge {
        Player::Edge(tessera_core::EdgeId(id))
    } else {
        Player::Node(NodeId(id))
    };
    let label = session.label(player)?;
    if out.json {
        return print_json(&serde_json::json!({ "id": id, "label": label }));
    }
    println!("{}", label);
    Ok(())
}

// =============================================================================
// DELETE COMMAND
// =============================================================================

/// Delete a node and the children it owns.
pub fn cmd_delete(db_path: &Path, id: u64, out: Output) -> Result<(), TesseraError> {
    let mut session = open_session(db_path)?;
    let directives = session.delete_node(NodeId(id))?;
    if out.json {
        return print_json(&directives);
    }
    if !out.quiet {
        println!("Deleted node {} ({} changes)", id, directives.len());
    }
    if out.verbose {
        print_directives(&directives);
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub database: String,
    pub node_count: usize,
    pub edge_count: usize,
    /// Instance count per installed type.
    pub instances: BTreeMap<String, usize>,
}

pub fn status_report(
    session: &Session<RedbStorage>,
    db_path: &Path,
) -> Result<StatusReport, TesseraError> {
    use tessera_core::GraphStorage;

    let storage = session.storage();
    let mut instances = BTreeMap::new();
    for uri in session.schemas().uris() {
        let count = storage.fetch_nodes_by_type(&uri)?.len();
        instances.insert(uri, count);
    }
    Ok(StatusReport {
        database: db_path.to_string_lossy().into_owned(),
        node_count: storage.node_count()?,
        edge_count: storage.edge_count()?,
        instances,
    })
}

/// Show graph status.
pub fn cmd_status(db_path: &Path, out: Output) -> Result<(), TesseraError> {
    let session = open_session(db_path)?;
    let report = status_report(&session, db_path)?;
    if out.json {
        return print_json(&report);
    }

    println!("Tessera Graph Status");
    println!("====================");
    println!("Database: {}", report.database);
    println!();
    println!("Nodes: {}", report.node_count);
    println!("Edges: {}", report.edge_count);
    println!();
    for (uri, count) in &report.instances {
        println!("  {:<24} {}", uri, count);
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open an existing database.
pub fn open_session(db_path: &Path) -> Result<Session<RedbStorage>, TesseraError> {
    if !db_path.exists() {
        return Err(TesseraError::NotFound(format!(
            "Database {:?} does not exist. Run `tessera init` first.",
            db_path
        )));
    }
    Session::with_redb(db_path)
}
