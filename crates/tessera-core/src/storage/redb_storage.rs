//! # redb-backed Graph Storage
//!
//! A disk-backed graph store using the redb embedded database.
//!
//! redb gives us:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! ## Transactions
//!
//! While a transaction opened with `begin` is active, every read and write
//! goes through its `WriteTransaction`, so reads observe uncommitted writes.
//! Outside a transaction each write opens, and commits, its own.
//!
//! Records are postcard-encoded. Values use a tagged record enum, since the
//! public `SimpleValue` is untagged for JSON and postcard cannot decode that.

use super::{value_index_key, GraphStorage};
use crate::{Edge, EdgeDraft, EdgeId, Node, NodeDraft, NodeId, Player, Role, SimpleValue, TesseraError};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Nodes: NodeId(u64) -> serialized NodeRecord
const NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("nodes");

/// Edges: EdgeId(u64) -> serialized EdgeRecord
const EDGES: TableDefinition<u64, &[u8]> = TableDefinition::new("edges");

/// Node URI -> NodeId
const URI_INDEX: TableDefinition<&str, u64> = TableDefinition::new("uri_index");

/// "type \x1f value key" -> serialized Vec<u64> of node ids
const VALUE_INDEX: TableDefinition<&str, &[u8]> = TableDefinition::new("value_index");

/// Type URI -> serialized Vec<u64> of node ids
const TYPE_INDEX: TableDefinition<&str, &[u8]> = TableDefinition::new("type_index");

/// Raw player id -> serialized Vec<u64> of incident edge ids
const INCIDENCE: TableDefinition<u64, &[u8]> = TableDefinition::new("incidence");

/// Raw player id -> serialized BTreeMap<String, ValueRecord>
const PROPERTIES: TableDefinition<u64, &[u8]> = TableDefinition::new("properties");

/// Metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const LAST_ID: &str = "last_id";

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
enum ValueRecord {
    Boolean(bool),
    Number(i64),
    Text(String),
}

impl From<&SimpleValue> for ValueRecord {
    fn from(value: &SimpleValue) -> Self {
        match value {
            SimpleValue::Boolean(b) => Self::Boolean(*b),
            SimpleValue::Number(n) => Self::Number(*n),
            SimpleValue::Text(s) => Self::Text(s.clone()),
        }
    }
}

impl From<ValueRecord> for SimpleValue {
    fn from(record: ValueRecord) -> Self {
        match record {
            ValueRecord::Boolean(b) => Self::Boolean(b),
            ValueRecord::Number(n) => Self::Number(n),
            ValueRecord::Text(s) => Self::Text(s),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    uri: String,
    type_uri: String,
    value: ValueRecord,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeRecord {
    uri: String,
    type_uri: String,
    value: ValueRecord,
    role1: Role,
    role2: Role,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            uri: node.uri.clone(),
            type_uri: node.type_uri.clone(),
            value: ValueRecord::from(&node.value),
        }
    }
}

impl From<&Edge> for EdgeRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            uri: edge.uri.clone(),
            type_uri: edge.type_uri.clone(),
            value: ValueRecord::from(&edge.value),
            role1: edge.role1.clone(),
            role2: edge.role2.clone(),
        }
    }
}

impl NodeRecord {
    fn into_node(self, id: NodeId) -> Node {
        Node::new(id, self.uri, self.type_uri, self.value.into())
    }
}

impl EdgeRecord {
    fn into_edge(self, id: EdgeId) -> Edge {
        let mut edge = Edge::new(id, self.type_uri, self.role1, self.role2);
        edge.uri = self.uri;
        edge.value = self.value.into();
        edge
    }
}

fn io_err(e: impl std::fmt::Display) -> TesseraError {
    TesseraError::Io(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TesseraError> {
    postcard::to_allocvec(value).map_err(|e| TesseraError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TesseraError> {
    postcard::from_bytes(bytes).map_err(|e| TesseraError::Serialization(e.to_string()))
}

fn insert_sorted(ids: &mut Vec<u64>, id: u64) {
    if let Err(pos) = ids.binary_search(&id) {
        ids.insert(pos, id);
    }
}

// =============================================================================
// TABLE READERS
// =============================================================================

fn read_node<T: ReadableTable<u64, &'static [u8]>>(
    table: &T,
    id: NodeId,
) -> Result<Option<Node>, TesseraError> {
    match table.get(id.0).map_err(io_err)? {
        Some(data) => {
            let record: NodeRecord = decode(data.value())?;
            Ok(Some(record.into_node(id)))
        }
        None => Ok(None),
    }
}

fn read_edge<T: ReadableTable<u64, &'static [u8]>>(
    table: &T,
    id: EdgeId,
) -> Result<Option<Edge>, TesseraError> {
    match table.get(id.0).map_err(io_err)? {
        Some(data) => {
            let record: EdgeRecord = decode(data.value())?;
            Ok(Some(record.into_edge(id)))
        }
        None => Ok(None),
    }
}

fn read_ids<T: ReadableTable<&'static str, &'static [u8]>>(
    table: &T,
    key: &str,
) -> Result<Vec<u64>, TesseraError> {
    match table.get(key).map_err(io_err)? {
        Some(data) => decode(data.value()),
        None => Ok(Vec::new()),
    }
}

fn read_id_list<T: ReadableTable<u64, &'static [u8]>>(
    table: &T,
    raw: u64,
) -> Result<Vec<u64>, TesseraError> {
    match table.get(raw).map_err(io_err)? {
        Some(data) => decode(data.value()),
        None => Ok(Vec::new()),
    }
}

fn read_properties<T: ReadableTable<u64, &'static [u8]>>(
    table: &T,
    raw: u64,
) -> Result<BTreeMap<String, ValueRecord>, TesseraError> {
    match table.get(raw).map_err(io_err)? {
        Some(data) => decode(data.value()),
        None => Ok(BTreeMap::new()),
    }
}

/// Run `$body` with `$table` opened from the active write transaction, or
/// from a fresh read transaction when none is open.
macro_rules! with_table {
    ($storage:expr, $def:expr, |$table:ident| $body:expr) => {{
        match &$storage.txn {
            Some(txn) => {
                let $table = txn.open_table($def).map_err(io_err)?;
                $body
            }
            None => {
                let read_txn = $storage.db.begin_read().map_err(io_err)?;
                let $table = read_txn.open_table($def).map_err(io_err)?;
                $body
            }
        }
    }};
}

// =============================================================================
// TABLE WRITERS
// =============================================================================

fn update_index(
    txn: &WriteTransaction,
    def: TableDefinition<'static, &'static str, &'static [u8]>,
    key: &str,
    f: impl FnOnce(&mut Vec<u64>),
) -> Result<(), TesseraError> {
    let mut table = txn.open_table(def).map_err(io_err)?;
    let mut ids = read_ids(&table, key)?;
    f(&mut ids);
    if ids.is_empty() {
        table.remove(key).map_err(io_err)?;
    } else {
        let bytes = encode(&ids)?;
        table.insert(key, bytes.as_slice()).map_err(io_err)?;
    }
    Ok(())
}

fn update_incidence(
    txn: &WriteTransaction,
    raw: u64,
    f: impl FnOnce(&mut Vec<u64>),
) -> Result<(), TesseraError> {
    let mut table = txn.open_table(INCIDENCE).map_err(io_err)?;
    let mut ids = read_id_list(&table, raw)?;
    f(&mut ids);
    if ids.is_empty() {
        table.remove(raw).map_err(io_err)?;
    } else {
        let bytes = encode(&ids)?;
        table.insert(raw, bytes.as_slice()).map_err(io_err)?;
    }
    Ok(())
}

/// Remove and return the incidence list of a player.
fn take_incidence(txn: &WriteTransaction, raw: u64) -> Result<Vec<u64>, TesseraError> {
    let mut table = txn.open_table(INCIDENCE).map_err(io_err)?;
    let ids = match table.remove(raw).map_err(io_err)? {
        Some(data) => decode(data.value())?,
        None => Vec::new(),
    };
    Ok(ids)
}

fn remove_properties(txn: &WriteTransaction, raw: u64) -> Result<(), TesseraError> {
    let mut table = txn.open_table(PROPERTIES).map_err(io_err)?;
    table.remove(raw).map_err(io_err)?;
    Ok(())
}

fn write_node(txn: &WriteTransaction, node: &Node) -> Result<(), TesseraError> {
    let bytes = encode(&NodeRecord::from(node))?;
    let mut table = txn.open_table(NODES).map_err(io_err)?;
    table.insert(node.id.0, bytes.as_slice()).map_err(io_err)?;
    Ok(())
}

fn write_edge(txn: &WriteTransaction, edge: &Edge) -> Result<(), TesseraError> {
    let bytes = encode(&EdgeRecord::from(edge))?;
    let mut table = txn.open_table(EDGES).map_err(io_err)?;
    table.insert(edge.id.0, bytes.as_slice()).map_err(io_err)?;
    Ok(())
}

fn player_exists(txn: &WriteTransaction, player: Player) -> Result<bool, TesseraError> {
    let (def, raw) = match player {
        Player::Node(id) => (NODES, id.0),
        Player::Edge(id) => (EDGES, id.0),
    };
    let table = txn.open_table(def).map_err(io_err)?;
    Ok(table.get(raw).map_err(io_err)?.is_some())
}

/// Delete an edge and, first, every edge it plays a role in.
fn remove_edge(
    txn: &WriteTransaction,
    id: EdgeId,
    removed: &mut Vec<EdgeId>,
) -> Result<(), TesseraError> {
    let edge = {
        let mut table = txn.open_table(EDGES).map_err(io_err)?;
        let edge = read_edge(&table, id)?;
        table.remove(id.0).map_err(io_err)?;
        edge
    };
    let Some(edge) = edge else {
        return Ok(());
    };
    removed.push(id);

    for dependent in take_incidence(txn, id.0)? {
        remove_edge(txn, EdgeId(dependent), removed)?;
    }
    for player in edge.players() {
        update_incidence(txn, player.raw(), |ids| ids.retain(|e| *e != id.0))?;
    }
    remove_properties(txn, id.0)
}

fn read_last_id(db: &Database) -> Result<u64, TesseraError> {
    let read_txn = db.begin_read().map_err(io_err)?;
    let table = read_txn.open_table(METADATA).map_err(io_err)?;
    let last = table
        .get(LAST_ID)
        .map_err(io_err)?
        .map(|v| v.value())
        .unwrap_or(0);
    Ok(last)
}

// =============================================================================
// REDB STORAGE
// =============================================================================

/// A disk-backed graph store using redb.
pub struct RedbStorage {
    db: Database,
    /// The transaction opened by `begin`, if any.
    txn: Option<WriteTransaction>,
    /// Last allocated id. Updated only after a successful write and re-read
    /// from disk after a rollback.
    last_id: u64,
}

impl std::fmt::Debug for RedbStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStorage")
            .field("in_transaction", &self.txn.is_some())
            .field("last_id", &self.last_id)
            .finish_non_exhaustive()
    }
}

impl RedbStorage {
    /// Open or create a graph database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TesseraError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Create every table up front so read transactions can open them.
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            write_txn.open_table(NODES).map_err(io_err)?;
            write_txn.open_table(EDGES).map_err(io_err)?;
            write_txn.open_table(URI_INDEX).map_err(io_err)?;
            write_txn.open_table(VALUE_INDEX).map_err(io_err)?;
            write_txn.open_table(TYPE_INDEX).map_err(io_err)?;
            write_txn.open_table(INCIDENCE).map_err(io_err)?;
            write_txn.open_table(PROPERTIES).map_err(io_err)?;
            write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        let last_id = read_last_id(&db)?;
        tracing::debug!(path = %path.as_ref().display(), last_id, "opened redb storage");
        Ok(Self {
            db,
            txn: None,
            last_id,
        })
    }

    /// Compact the database file. Not allowed inside a transaction.
    pub fn compact(&mut self) -> Result<bool, TesseraError> {
        if self.txn.is_some() {
            return Err(TesseraError::Precondition(
                "cannot compact while a transaction is open".to_string(),
            ));
        }
        self.db.compact().map_err(io_err)
    }

    /// Run `f` inside the active transaction, or inside a new one that is
    /// committed when `f` succeeds.
    fn write<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> Result<T, TesseraError>,
    ) -> Result<T, TesseraError> {
        match &self.txn {
            Some(txn) => f(txn),
            None => {
                let txn = self.db.begin_write().map_err(io_err)?;
                let out = f(&txn)?;
                txn.commit().map_err(io_err)?;
                Ok(out)
            }
        }
    }

    fn load_nodes(&self, ids: &[u64]) -> Result<Vec<Node>, TesseraError> {
        with_table!(self, NODES, |table| {
            let mut nodes = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(node) = read_node(&table, NodeId(*id))? {
                    nodes.push(node);
                }
            }
            Ok(nodes)
        })
    }
}

impl GraphStorage for RedbStorage {
    fn fetch_node(&self, id: NodeId) -> Result<Option<Node>, TesseraError> {
        with_table!(self, NODES, |table| read_node(&table, id))
    }

    fn fetch_edge(&self, id: EdgeId) -> Result<Option<Edge>, TesseraError> {
        with_table!(self, EDGES, |table| read_edge(&table, id))
    }

    fn fetch_node_by_uri(&self, uri: &str) -> Result<Option<Node>, TesseraError> {
        let id = with_table!(self, URI_INDEX, |table| {
            table.get(uri).map_err(io_err)?.map(|v| v.value())
        });
        match id {
            Some(id) => self.fetch_node(NodeId(id)),
            None => Ok(None),
        }
    }

    fn fetch_nodes_by_value(
        &self,
        type_uri: &str,
        value: &SimpleValue,
    ) -> Result<Vec<Node>, TesseraError> {
        let key = value_index_key(type_uri, value);
        let ids = with_table!(self, VALUE_INDEX, |table| read_ids(&table, &key)?);
        self.load_nodes(&ids)
    }

    fn fetch_nodes_by_type(&self, type_uri: &str) -> Result<Vec<Node>, TesseraError> {
        let ids = with_table!(self, TYPE_INDEX, |table| read_ids(&table, type_uri)?);
        self.load_nodes(&ids)
    }

    fn fetch_edges(&self, player: Player) -> Result<Vec<Edge>, TesseraError> {
        let ids = with_table!(self, INCIDENCE, |table| read_id_list(&table, player.raw())?);
        with_table!(self, EDGES, |table| {
            let mut edges = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(edge) = read_edge(&table, EdgeId(*id))? {
                    edges.push(edge);
                }
            }
            Ok(edges)
        })
    }

    fn create_node(&mut self, draft: NodeDraft) -> Result<Node, TesseraError> {
        let id = NodeId(self.last_id.saturating_add(1));
        let node = Node::new(id, draft.uri, draft.type_uri, draft.value);

        self.write(|txn| {
            if !node.uri.is_empty() {
                let mut uris = txn.open_table(URI_INDEX).map_err(io_err)?;
                if uris.get(node.uri.as_str()).map_err(io_err)?.is_some() {
                    return Err(TesseraError::Precondition(format!(
                        "URI '{}' is already in use",
                        node.uri
                    )));
                }
                uris.insert(node.uri.as_str(), id.0).map_err(io_err)?;
            }
            write_node(txn, &node)?;
            update_index(txn, TYPE_INDEX, &node.type_uri, |ids| insert_sorted(ids, id.0))?;
            update_index(
                txn,
                VALUE_INDEX,
                &value_index_key(&node.type_uri, &node.value),
                |ids| insert_sorted(ids, id.0),
            )?;
            let mut meta = txn.open_table(METADATA).map_err(io_err)?;
            meta.insert(LAST_ID, id.0).map_err(io_err)?;
            Ok(())
        })?;

        // Update in-memory state only after the write succeeded.
        self.last_id = id.0;
        Ok(node)
    }

    fn set_node_value(&mut self, id: NodeId, value: SimpleValue) -> Result<(), TesseraError> {
        self.write(|txn| {
            let mut node = {
                let table = txn.open_table(NODES).map_err(io_err)?;
                read_node(&table, id)?
            }
            .ok_or_else(|| TesseraError::NotFound(format!("node {}", id)))?;

            let old_key = value_index_key(&node.type_uri, &node.value);
            update_index(txn, VALUE_INDEX, &old_key, |ids| ids.retain(|n| *n != id.0))?;
            node.value = value;
            let new_key = value_index_key(&node.type_uri, &node.value);
            update_index(txn, VALUE_INDEX, &new_key, |ids| insert_sorted(ids, id.0))?;
            write_node(txn, &node)
        })
    }

    fn delete_node(&mut self, id: NodeId) -> Result<Vec<EdgeId>, TesseraError> {
        self.write(|txn| {
            let node = {
                let mut table = txn.open_table(NODES).map_err(io_err)?;
                let node = read_node(&table, id)?;
                table.remove(id.0).map_err(io_err)?;
                node
            }
            .ok_or_else(|| TesseraError::NotFound(format!("node {}", id)))?;

            let mut removed = Vec::new();
            for edge_id in take_incidence(txn, id.0)? {
                remove_edge(txn, EdgeId(edge_id), &mut removed)?;
            }

            if !node.uri.is_empty() {
                let mut uris = txn.open_table(URI_INDEX).map_err(io_err)?;
                uris.remove(node.uri.as_str()).map_err(io_err)?;
            }
            update_index(txn, TYPE_INDEX, &node.type_uri, |ids| ids.retain(|n| *n != id.0))?;
            update_index(
                txn,
                VALUE_INDEX,
                &value_index_key(&node.type_uri, &node.value),
                |ids| ids.retain(|n| *n != id.0),
            )?;
            remove_properties(txn, id.0)?;
            Ok(removed)
        })
    }

    fn create_edge(&mut self, draft: EdgeDraft) -> Result<Edge, TesseraError> {
        let id = EdgeId(self.last_id.saturating_add(1));
        let mut edge = Edge::new(id, draft.type_uri, draft.role1, draft.role2);
        edge.value = draft.value;

        self.write(|txn| {
            for player in edge.players() {
                if !player_exists(txn, player)? {
                    return Err(TesseraError::NotFound(format!(
                        "{} cannot play a role in a '{}' edge: it does not exist",
                        player, edge.type_uri
                    )));
                }
            }
            write_edge(txn, &edge)?;
            for player in edge.players() {
                update_incidence(txn, player.raw(), |ids| insert_sorted(ids, id.0))?;
            }
            let mut meta = txn.open_table(METADATA).map_err(io_err)?;
            meta.insert(LAST_ID, id.0).map_err(io_err)?;
            Ok(())
        })?;

        self.last_id = id.0;
        Ok(edge)
    }

    fn set_edge_value(&mut self, id: EdgeId, value: SimpleValue) -> Result<(), TesseraError> {
        self.write(|txn| {
            let mut edge = {
                let table = txn.open_table(EDGES).map_err(io_err)?;
                read_edge(&table, id)?
            }
            .ok_or_else(|| TesseraError::NotFound(format!("edge {}", id)))?;
            edge.value = value;
            write_edge(txn, &edge)
        })
    }

    fn delete_edge(&mut self, id: EdgeId) -> Result<Vec<EdgeId>, TesseraError> {
        self.write(|txn| {
            if !player_exists(txn, Player::Edge(id))? {
                return Err(TesseraError::NotFound(format!("edge {}", id)));
            }
            let mut removed = Vec::new();
            remove_edge(txn, id, &mut removed)?;
            Ok(removed)
        })
    }

    fn property(&self, player: Player, key: &str) -> Result<Option<SimpleValue>, TesseraError> {
        let mut props =
            with_table!(self, PROPERTIES, |table| read_properties(&table, player.raw())?);
        Ok(props.remove(key).map(SimpleValue::from))
    }

    fn set_property(
        &mut self,
        player: Player,
        key: &str,
        value: SimpleValue,
    ) -> Result<(), TesseraError> {
        self.write(|txn| {
            if !player_exists(txn, player)? {
                return Err(TesseraError::NotFound(format!("{}", player)));
            }
            let mut table = txn.open_table(PROPERTIES).map_err(io_err)?;
            let mut props = read_properties(&table, player.raw())?;
            props.insert(key.to_string(), ValueRecord::from(&value));
            let bytes = encode(&props)?;
            table.insert(player.raw(), bytes.as_slice()).map_err(io_err)?;
            Ok(())
        })
    }

    fn node_count(&self) -> Result<usize, TesseraError> {
        let count = with_table!(self, NODES, |table| table.len().map_err(io_err)?);
        Ok(count as usize)
    }

    fn edge_count(&self) -> Result<usize, TesseraError> {
        let count = with_table!(self, EDGES, |table| table.len().map_err(io_err)?);
        Ok(count as usize)
    }

    fn begin(&mut self) -> Result<(), TesseraError> {
        if self.txn.is_some() {
            return Err(TesseraError::Precondition(
                "a transaction is already open".to_string(),
            ));
        }
        self.txn = Some(self.db.begin_write().map_err(io_err)?);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TesseraError> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| TesseraError::Precondition("no transaction is open".to_string()))?;
        txn.commit().map_err(io_err)
    }

    fn rollback(&mut self) -> Result<(), TesseraError> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| TesseraError::Precondition("no transaction is open".to_string()))?;
        txn.abort().map_err(io_err)?;
        self.last_id = read_last_id(&self.db)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn text(s: &str) -> SimpleValue {
        SimpleValue::text(s)
    }

    #[test]
    fn persistence_across_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        let (person, email) = {
            let mut storage = RedbStorage::open(&db_path).expect("open db");
            let person = storage
                .create_node(NodeDraft::new("person", text("Ann")).with_uri("ann"))
                .expect("person");
            let email = storage
                .create_node(NodeDraft::new("email", text("ann@x.org")))
                .expect("email");
            storage
                .create_edge(EdgeDraft::new(
                    "composition",
                    Role::new("parent", Player::Node(person.id)),
                    Role::new("child", Player::Node(email.id)),
                ))
                .expect("edge");
            storage
                .set_property(Player::Node(person.id), "note", SimpleValue::Number(7))
                .expect("property");
            (person, email)
        };

        let mut storage = RedbStorage::open(&db_path).expect("reopen db");
        assert_eq!(storage.node_count().expect("count"), 2);
        assert_eq!(storage.edge_count().expect("count"), 1);
        assert_eq!(
            storage.fetch_node_by_uri("ann").expect("uri").map(|n| n.id),
            Some(person.id)
        );
        assert_eq!(
            storage
                .property(Player::Node(person.id), "note")
                .expect("property"),
            Some(SimpleValue::Number(7))
        );
        assert_eq!(
            storage
                .fetch_node_by_value("email", &text("ann@x.org"))
                .expect("value")
                .map(|n| n.id),
            Some(email.id)
        );

        // The id counter survives the reopen.
        let next = storage
            .create_node(NodeDraft::new("name", text("Ann")))
            .expect("node");
        assert_eq!(next.id.0, 4);
    }

    #[test]
    fn reads_inside_transaction_see_uncommitted_writes() {
        let temp = tempdir().expect("temp dir");
        let mut storage = RedbStorage::open(temp.path().join("t.redb")).expect("open");
        storage.begin().expect("begin");
        let node = storage
            .create_node(NodeDraft::new("name", text("Ann")))
            .expect("node");
        assert!(storage.fetch_node(node.id).expect("fetch").is_some());
        storage.commit().expect("commit");
        assert!(storage.fetch_node(node.id).expect("fetch").is_some());
    }

    #[test]
    fn rollback_discards_writes_and_rewinds_ids() {
        let temp = tempdir().expect("temp dir");
        let mut storage = RedbStorage::open(temp.path().join("t.redb")).expect("open");
        let kept = storage
            .create_node(NodeDraft::new("name", text("kept")))
            .expect("node");

        storage.begin().expect("begin");
        storage
            .create_node(NodeDraft::new("name", text("dropped")))
            .expect("node");
        storage.set_node_value(kept.id, text("changed")).expect("update");
        storage.rollback().expect("rollback");

        assert_eq!(storage.node_count().expect("count"), 1);
        assert_eq!(
            storage.fetch_node(kept.id).expect("fetch").map(|n| n.value),
            Some(text("kept"))
        );
        let next = storage
            .create_node(NodeDraft::new("name", text("next")))
            .expect("node");
        assert_eq!(next.id.0, kept.id.0 + 1);
    }

    #[test]
    fn duplicate_uri_is_rejected() {
        let temp = tempdir().expect("temp dir");
        let mut storage = RedbStorage::open(temp.path().join("t.redb")).expect("open");
        storage
            .create_node(NodeDraft::new("t", text("a")).with_uri("same"))
            .expect("first");
        let second = storage.create_node(NodeDraft::new("t", text("b")).with_uri("same"));
        assert!(matches!(second, Err(TesseraError::Precondition(_))));
        assert_eq!(storage.node_count().expect("count"), 1);
    }

    #[test]
    fn edge_on_edge_cascades() {
        let temp = tempdir().expect("temp dir");
        let mut storage = RedbStorage::open(temp.path().join("t.redb")).expect("open");
        let a = storage.create_node(NodeDraft::new("t", text("a"))).expect("a");
        let b = storage.create_node(NodeDraft::new("t", text("b"))).expect("b");
        let ab = storage
            .create_edge(EdgeDraft::new(
                "rel",
                Role::new("from", Player::Node(a.id)),
                Role::new("to", Player::Node(b.id)),
            ))
            .expect("ab");
        let meta = storage
            .create_edge(EdgeDraft::new(
                "about",
                Role::new("subject", Player::Edge(ab.id)),
                Role::new("object", Player::Node(b.id)),
            ))
            .expect("meta");

        let removed = storage.delete_edge(ab.id).expect("delete");
        assert_eq!(removed, vec![ab.id, meta.id]);
        assert_eq!(storage.edge_count().expect("count"), 0);
        assert!(storage.fetch_edges(Player::Node(b.id)).expect("edges").is_empty());
        assert!(matches!(
            storage.delete_edge(ab.id),
            Err(TesseraError::NotFound(_))
        ));
    }
}
