//! Node tree of one file and its persisted form.
//!
//! A persisted image is an 8-byte magic followed by the bincode encoding of
//! [`Image`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{ObjectKind, Shape, TypeClass};

pub(crate) type NodeId = u64;

pub(crate) const ROOT: NodeId = 0;

const MAGIC: &[u8; 8] = b"\x89RH5IMG\n";

/// Largest element count a single dataset payload may hold.
pub(crate) const MAX_ELEMENTS: u64 = 1 << 28;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Image {
    nodes: BTreeMap<NodeId, Node>,
    next_id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Node {
    Group(GroupNode),
    Dataset(DatasetNode),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct GroupNode {
    pub links: Links,
    pub attrs: BTreeMap<String, String>,
}

/// Links of one group, kept sorted by name so that lookup is a binary
/// search and the name at an enumeration index is a direct access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Links(Vec<(String, NodeId)>);

impl Links {
    fn position(&self, name: &str) -> Result<usize, usize> {
        self.0.binary_search_by(|(n, _)| n.as_str().cmp(name))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.position(name).ok().map(|i| self.0[i].1)
    }

    /// Name at `index` in enumeration (name) order.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(|(n, _)| n.as_str())
    }

    /// Returns `false` and leaves the links untouched if `name` is taken.
    pub fn insert(&mut self, name: &str, id: NodeId) -> bool {
        match self.position(name) {
            Ok(_) => false,
            Err(at) => {
                self.0.insert(at, (name.to_string(), id));
                true
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<NodeId> {
        let at = self.position(name).ok()?;
        Some(self.0.remove(at).1)
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.iter().map(|(_, id)| *id)
    }

    fn is_sorted(&self) -> bool {
        self.0.windows(2).all(|w| w[0].0 < w[1].0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DatasetNode {
    pub shape: Shape,
    pub payload: Payload,
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Payload {
    Integer(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
}

impl Payload {
    /// Payload of `count` fill values. Fails instead of aborting when the
    /// allocation cannot be made.
    pub fn filled(class: TypeClass, count: usize) -> EngineResult<Self> {
        match class {
            TypeClass::Integer => Ok(Payload::Integer(fill(0, count)?)),
            TypeClass::Float => Ok(Payload::Float(fill(0.0, count)?)),
            TypeClass::String => Ok(Payload::Text(fill(String::new(), count)?)),
            TypeClass::Other => Err(EngineError::UnsupportedClass(class)),
        }
    }

    pub fn class(&self) -> TypeClass {
        match self {
            Payload::Integer(_) => TypeClass::Integer,
            Payload::Float(_) => TypeClass::Float,
            Payload::Text(_) => TypeClass::String,
        }
    }

    pub fn storage_size(&self) -> u64 {
        match self {
            Payload::Integer(v) => (v.len() * std::mem::size_of::<i64>()) as u64,
            Payload::Float(v) => (v.len() * std::mem::size_of::<f64>()) as u64,
            Payload::Text(v) => v.iter().map(|s| s.len() as u64 + 1).sum(),
        }
    }
}

fn fill<T: Clone>(value: T, count: usize) -> EngineResult<Vec<T>> {
    let mut out = Vec::new();
    out.try_reserve_exact(count).map_err(|e| {
        EngineError::InvalidDataspace(format!("cannot allocate {count} elements: {e}"))
    })?;
    out.resize(count, value);
    Ok(out)
}

impl Node {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Node::Group(_) => ObjectKind::Group,
            Node::Dataset(_) => ObjectKind::Dataset,
        }
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        match self {
            Node::Group(g) => &g.attrs,
            Node::Dataset(d) => &d.attrs,
        }
    }

    pub fn attrs_mut(&mut self) -> &mut BTreeMap<String, String> {
        match self {
            Node::Group(g) => &mut g.attrs,
            Node::Dataset(d) => &mut d.attrs,
        }
    }
}

impl Default for Image {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(ROOT, Node::Group(GroupNode::default()));
        Self {
            nodes,
            next_id: ROOT + 1,
        }
    }
}

impl Image {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn group(&self, id: NodeId) -> Option<&GroupNode> {
        match self.nodes.get(&id) {
            Some(Node::Group(g)) => Some(g),
            _ => None,
        }
    }

    pub fn dataset(&self, id: NodeId) -> Option<&DatasetNode> {
        match self.nodes.get(&id) {
            Some(Node::Dataset(d)) => Some(d),
            _ => None,
        }
    }

    pub fn dataset_mut(&mut self, id: NodeId) -> Option<&mut DatasetNode> {
        match self.nodes.get_mut(&id) {
            Some(Node::Dataset(d)) => Some(d),
            _ => None,
        }
    }

    /// Child of `parent` linked as `name`.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.group(parent)?.links.get(name)
    }

    /// Link a new node under `parent`.
    pub fn insert(&mut self, parent: NodeId, name: &str, node: Node) -> EngineResult<NodeId> {
        if name.is_empty() || name == "." || name.contains('/') {
            return Err(EngineError::InvalidName(name.to_string()));
        }
        let id = self.next_id;
        let group = match self.nodes.get_mut(&parent) {
            Some(Node::Group(g)) => g,
            _ => return Err(EngineError::Corrupt(format!("node {parent} is not a group"))),
        };
        if !group.links.insert(name, id) {
            return Err(EngineError::LinkExists(name.to_string()));
        }
        self.nodes.insert(id, node);
        self.next_id += 1;
        Ok(id)
    }

    /// Remove the link `name` from `parent` and drop the subtree behind it.
    pub fn unlink(&mut self, parent: NodeId, name: &str) -> EngineResult<()> {
        let removed = match self.nodes.get_mut(&parent) {
            Some(Node::Group(g)) => g.links.remove(name),
            _ => None,
        };
        let id = removed.ok_or_else(|| EngineError::LinkNotFound(name.to_string()))?;
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Some(Node::Group(g)) = self.nodes.remove(&id) {
                pending.extend(g.links.ids());
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::decode(&mut reader)
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.encode(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn encode<W: Write>(&self, writer: &mut W) -> EngineResult<()> {
        writer.write_all(MAGIC)?;
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn decode<R: Read>(reader: &mut R) -> EngineResult<Self> {
        let mut magic = [0u8; 8];
        reader
            .read_exact(&mut magic)
            .map_err(|e| EngineError::Corrupt(format!("failed to read magic: {e}")))?;
        if &magic != MAGIC {
            return Err(EngineError::Corrupt("bad magic".into()));
        }
        let image: Image = bincode::deserialize_from(reader)?;
        if image.group(ROOT).is_none() {
            return Err(EngineError::Corrupt("missing root group".into()));
        }
        let unsorted = image.nodes.iter().find_map(|(id, node)| match node {
            Node::Group(g) if !g.links.is_sorted() => Some(*id),
            _ => None,
        });
        if let Some(id) = unsorted {
            return Err(EngineError::Corrupt(format!("links of node {id} are not sorted")));
        }
        Ok(image)
    }
}
