//! Two-level cache of materialized list nodes.

use std::fmt;

use crate::node::Node;

/// A (section, row) coordinate into a sectioned list. Orders by section,
/// then row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    pub const fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.section, self.row)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeCacheError {
    #[error("section {section} out of range (cache has {sections} sections)")]
    SectionOutOfRange { section: usize, sections: usize },
    #[error("row {row} out of range in section {section} ({rows} rows)")]
    RowOutOfRange {
        section: usize,
        row: usize,
        rows: usize,
    },
}

/// Sections of row slots, each slot optionally holding a [`Node`].
///
/// Growth operations (`set`, `insert_row`, `insert_section`,
/// `replace_section`) pad missing sections and rows with empty slots.
/// Operations that read or remove existing structure report
/// [`NodeCacheError`] instead of clamping.
#[derive(Clone, Debug, Default)]
pub struct NodeCache {
    sections: Vec<Vec<Option<Node>>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn row_count(&self, section: usize) -> Result<usize, NodeCacheError> {
        self.section(section).map(Vec::len)
    }

    /// Row count of every section, in order.
    pub fn shape(&self) -> Vec<usize> {
        self.sections.iter().map(Vec::len).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, path: IndexPath) -> Result<Option<&Node>, NodeCacheError> {
        let rows = self.section(path.section)?;
        rows.get(path.row)
            .map(Option::as_ref)
            .ok_or(NodeCacheError::RowOutOfRange {
                section: path.section,
                row: path.row,
                rows: rows.len(),
            })
    }

    /// Overwrites the slot at `path`, growing the cache as needed. Returns
    /// the node previously stored there.
    pub fn set(&mut self, path: IndexPath, node: Option<Node>) -> Option<Node> {
        let rows = self.section_padded(path.section);
        while rows.len() <= path.row {
            rows.push(None);
        }
        std::mem::replace(&mut rows[path.row], node)
    }

    /// Inserts a slot at `path`, shifting later rows down. Rows between the
    /// current end of the section and `path.row` are padded with empty slots.
    pub fn insert_row(&mut self, path: IndexPath, node: Option<Node>) {
        let rows = self.section_padded(path.section);
        while rows.len() < path.row {
            rows.push(None);
        }
        rows.insert(path.row, node);
    }

    pub fn remove_row(&mut self, path: IndexPath) -> Result<Option<Node>, NodeCacheError> {
        let rows = self.section_mut(path.section)?;
        if path.row >= rows.len() {
            return Err(NodeCacheError::RowOutOfRange {
                section: path.section,
                row: path.row,
                rows: rows.len(),
            });
        }
        Ok(rows.remove(path.row))
    }

    /// Inserts a section at `section`, padding with empty sections when it
    /// lies past the end.
    pub fn insert_section(&mut self, section: usize, rows: Vec<Option<Node>>) {
        while self.sections.len() < section {
            self.sections.push(Vec::new());
        }
        self.sections.insert(section, rows);
    }

    /// Replaces the contents of `section`, growing the cache as needed.
    pub fn replace_section(&mut self, section: usize, rows: Vec<Option<Node>>) -> Vec<Option<Node>> {
        std::mem::replace(self.section_padded(section), rows)
    }

    pub fn remove_section(&mut self, section: usize) -> Result<Vec<Option<Node>>, NodeCacheError> {
        self.section(section)?;
        Ok(self.sections.remove(section))
    }

    /// Moves the slot at `from` to `to`. `to` addresses the cache as it looks
    /// after the slot has been taken out.
    pub fn move_row(&mut self, from: IndexPath, to: IndexPath) -> Result<(), NodeCacheError> {
        self.get(from)?;
        let destination_rows = self.row_count(to.section)?;
        let available = if from.section == to.section {
            destination_rows - 1
        } else {
            destination_rows
        };
        if to.row > available {
            return Err(NodeCacheError::RowOutOfRange {
                section: to.section,
                row: to.row,
                rows: available,
            });
        }
        let node = self.sections[from.section].remove(from.row);
        self.sections[to.section].insert(to.row, node);
        Ok(())
    }

    pub fn move_section(&mut self, from: usize, to: usize) -> Result<(), NodeCacheError> {
        self.section(from)?;
        let available = self.sections.len() - 1;
        if to > available {
            return Err(NodeCacheError::SectionOutOfRange {
                section: to,
                sections: available,
            });
        }
        let rows = self.sections.remove(from);
        self.sections.insert(to, rows);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// Every cached node with its position, in section/row order.
    pub fn nodes(&self) -> impl Iterator<Item = (IndexPath, &Node)> + '_ {
        self.sections.iter().enumerate().flat_map(|(section, rows)| {
            rows.iter().enumerate().filter_map(move |(row, slot)| {
                slot.as_ref().map(|node| (IndexPath::new(section, row), node))
            })
        })
    }

    fn section(&self, section: usize) -> Result<&Vec<Option<Node>>, NodeCacheError> {
        self.sections
            .get(section)
            .ok_or(NodeCacheError::SectionOutOfRange {
                section,
                sections: self.sections.len(),
            })
    }

    fn section_mut(&mut self, section: usize) -> Result<&mut Vec<Option<Node>>, NodeCacheError> {
        let sections = self.sections.len();
        self.sections
            .get_mut(section)
            .ok_or(NodeCacheError::SectionOutOfRange { section, sections })
    }

    fn section_padded(&mut self, section: usize) -> &mut Vec<Option<Node>> {
        while self.sections.len() <= section {
            self.sections.push(Vec::new());
        }
        &mut self.sections[section]
    }
}

#[cfg(test)]
#[path = "tests/node_cache_tests.rs"]
mod tests;
