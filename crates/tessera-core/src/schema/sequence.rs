//! Ordered association definitions.
//!
//! Types are extended at runtime, so slots are kept as a linked sequence:
//! a head plus successor links. Inserting at any position touches at most
//! two links and never renumbers the rest. The same shape is persisted as
//! `sequence` edges by the schema store.

use super::AssocDef;
use crate::TesseraError;
use std::collections::BTreeMap;

/// The slots of a type in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssocDefSequence {
    head: Option<String>,
    next: BTreeMap<String, String>,
    defs: BTreeMap<String, AssocDef>,
}

impl AssocDefSequence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    #[must_use]
    pub fn get(&self, uri: &str) -> Option<&AssocDef> {
        self.defs.get(uri)
    }

    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        self.defs.contains_key(uri)
    }

    /// Iterate in sequence order.
    #[must_use]
    pub fn iter(&self) -> SequenceIter<'_> {
        SequenceIter {
            seq: self,
            cursor: self.head.as_deref(),
        }
    }

    /// Slot URIs in sequence order.
    #[must_use]
    pub fn uris(&self) -> Vec<String> {
        self.iter().map(AssocDef::uri).collect()
    }

    fn last(&self) -> Option<&str> {
        let mut cursor = self.head.as_deref()?;
        while let Some(next) = self.next.get(cursor) {
            cursor = next;
        }
        Some(cursor)
    }

    fn check_new(&self, uri: &str) -> Result<(), TesseraError> {
        if self.defs.contains_key(uri) {
            return Err(TesseraError::Precondition(format!(
                "association definition '{}' is already declared",
                uri
            )));
        }
        Ok(())
    }

    /// Append a slot at the end.
    pub fn push_back(&mut self, def: AssocDef) -> Result<(), TesseraError> {
        let uri = def.uri();
        self.check_new(&uri)?;
        match self.last().map(str::to_string) {
            Some(last) => {
                self.next.insert(last, uri.clone());
            }
            None => self.head = Some(uri.clone()),
        }
        self.defs.insert(uri, def);
        Ok(())
    }

    /// Insert a slot before all others.
    pub fn insert_first(&mut self, def: AssocDef) -> Result<(), TesseraError> {
        let uri = def.uri();
        self.check_new(&uri)?;
        if let Some(old_head) = self.head.take() {
            self.next.insert(uri.clone(), old_head);
        }
        self.head = Some(uri.clone());
        self.defs.insert(uri, def);
        Ok(())
    }

    /// Insert a slot directly after `predecessor`.
    pub fn insert_after(&mut self, predecessor: &str, def: AssocDef) -> Result<(), TesseraError> {
        if !self.defs.contains_key(predecessor) {
            return Err(TesseraError::NotFound(format!(
                "association definition '{}' is not declared",
                predecessor
            )));
        }
        let uri = def.uri();
        self.check_new(&uri)?;
        if let Some(successor) = self.next.remove(predecessor) {
            self.next.insert(uri.clone(), successor);
        }
        self.next.insert(predecessor.to_string(), uri.clone());
        self.defs.insert(uri, def);
        Ok(())
    }

    /// Remove a slot, relinking its neighbours.
    pub fn remove(&mut self, uri: &str) -> Option<AssocDef> {
        let def = self.defs.remove(uri)?;
        let successor = self.next.remove(uri);
        if self.head.as_deref() == Some(uri) {
            self.head = successor;
        } else {
            let predecessor = self
                .next
                .iter()
                .find(|(_, next)| next.as_str() == uri)
                .map(|(pred, _)| pred.clone());
            if let Some(pred) = predecessor {
                match successor {
                    Some(succ) => {
                        self.next.insert(pred, succ);
                    }
                    None => {
                        self.next.remove(&pred);
                    }
                }
            }
        }
        Some(def)
    }

    /// Move a slot after `predecessor`, or to the front when `None`.
    pub fn move_after(&mut self, uri: &str, predecessor: Option<&str>) -> Result<(), TesseraError> {
        if predecessor == Some(uri) {
            return Err(TesseraError::Precondition(format!(
                "association definition '{}' cannot follow itself",
                uri
            )));
        }
        if let Some(pred) = predecessor {
            if !self.defs.contains_key(pred) {
                return Err(TesseraError::NotFound(format!(
                    "association definition '{}' is not declared",
                    pred
                )));
            }
        }
        let def = self.remove(uri).ok_or_else(|| {
            TesseraError::NotFound(format!("association definition '{}' is not declared", uri))
        })?;
        match predecessor {
            Some(pred) => self.insert_after(pred, def),
            None => self.insert_first(def),
        }
    }
}

/// Iterator over an [`AssocDefSequence`] in order.
pub struct SequenceIter<'a> {
    seq: &'a AssocDefSequence,
    cursor: Option<&'a str>,
}

impl<'a> Iterator for SequenceIter<'a> {
    type Item = &'a AssocDef;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        self.cursor = self.seq.next.get(current).map(String::as_str);
        self.seq.defs.get(current)
    }
}

impl<'a> IntoIterator for &'a AssocDefSequence {
    type Item = &'a AssocDef;
    type IntoIter = SequenceIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
