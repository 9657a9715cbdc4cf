//! External-page adapter (C10): packs the dataset and the RQALSH hash
//! tables onto fixed-size pages, charging one `QueryContext::io_count`
//! increment per page touched. Built on top of C3 (`page_store`) and C4
//! (`btree`); the index algorithms themselves (C5/C8/C9) run in-memory
//! and use this adapter only when the caller explicitly builds/queries
//! the external layout (`-alg` variants ending in `-ext` at the CLI
//! layer, §6).

use std::path::Path;

use crate::btree::{Leaf, Node, Tree};
use crate::context::QueryContext;
use crate::error::{AfnError, Result};
use crate::page_store::PageStore;

/// Packed dataset: `num_per_page = floor(page_size / (d * 4))` vectors per
/// page; object `id` lives on page `id / num_per_page` at slot
/// `id % num_per_page`.
pub struct ExternalDataset {
    store: PageStore,
    d: usize,
    num_per_page: usize,
    n: usize,
}

impl ExternalDataset {
    pub fn create(path: impl AsRef<Path>, page_size: usize, vectors: &[&[f32]]) -> Result<Self> {
        let n = vectors.len();
        let d = vectors.first().map_or(0, |v| v.len());
        let num_per_page = page_size / (d * 4);
        if num_per_page == 0 {
            return Err(AfnError::Config(format!(
                "page size {page_size} cannot hold even one {d}-dimensional vector"
            )));
        }

        let mut header = Vec::with_capacity(16);
        header.extend_from_slice(&(n as u64).to_le_bytes());
        header.extend_from_slice(&(d as u64).to_le_bytes());
        let mut store = PageStore::create(&path, page_size, &header)?;

        for chunk in vectors.chunks(num_per_page) {
            let mut buf = vec![0u8; page_size];
            for (slot, v) in chunk.iter().enumerate() {
                let base = slot * d * 4;
                for (i, &x) in v.iter().enumerate() {
                    buf[base + i * 4..base + i * 4 + 4].copy_from_slice(&x.to_le_bytes());
                }
            }
            store.append_block(&buf)?;
        }

        Ok(Self {
            store,
            d,
            num_per_page,
            n,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut store = PageStore::open(&path)?;
        let header = store.read_user_header(16)?;
        let n = u64::from_le_bytes(header[0..8].try_into().unwrap()) as usize;
        let d = u64::from_le_bytes(header[8..16].try_into().unwrap()) as usize;
        let num_per_page = store.page_size() / (d * 4);
        Ok(Self {
            store,
            d,
            num_per_page,
            n,
        })
    }

    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn d(&self) -> usize {
        self.d
    }

    /// Reads object `id`'s vector, charging one page read to `ctx`.
    pub fn read_object(&mut self, id: usize, ctx: &mut QueryContext) -> Result<Vec<f32>> {
        if id >= self.n {
            return Err(AfnError::Invariant(format!(
                "read_object: id {id} out of range (n={})",
                self.n
            )));
        }
        let page_id = (id / self.num_per_page) as u64;
        let slot = id % self.num_per_page;
        let mut buf = vec![0u8; self.store.page_size()];
        self.store.read_block(page_id, &mut buf)?;
        ctx.io_count += 1;

        let base = slot * self.d * 4;
        let mut v = Vec::with_capacity(self.d);
        for i in 0..self.d {
            let bytes: [u8; 4] = buf[base + i * 4..base + i * 4 + 4].try_into().unwrap();
            v.push(f32::from_le_bytes(bytes));
        }
        Ok(v)
    }
}

/// A B+-tree (C4) persisted one node per page. Node `i`'s serialized form
/// lives at block `i` (nodes are appended in `Tree::nodes` order at build
/// time, so the mapping is the identity and needs no separate index).
pub struct ExternalTree {
    store: PageStore,
    root: usize,
    increment: usize,
}

impl ExternalTree {
    pub fn create(path: impl AsRef<Path>, page_size: usize, tree: &Tree) -> Result<Self> {
        let mut header = Vec::with_capacity(16);
        header.extend_from_slice(&(tree.root as u64).to_le_bytes());
        header.extend_from_slice(&(tree.increment as u64).to_le_bytes());
        let mut store = PageStore::create(&path, page_size, &header)?;

        for node in &tree.nodes {
            let bytes = bincode::serialize(node)?;
            if bytes.len() + 4 > page_size {
                return Err(AfnError::Config(format!(
                    "page size {page_size} too small to hold one B+-tree node ({} bytes)",
                    bytes.len()
                )));
            }
            let mut buf = vec![0u8; page_size];
            buf[0..4].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf[4..4 + bytes.len()].copy_from_slice(&bytes);
            store.append_block(&buf)?;
        }

        Ok(Self {
            store,
            root: tree.root,
            increment: tree.increment,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut store = PageStore::open(&path)?;
        let header = store.read_user_header(16)?;
        let root = u64::from_le_bytes(header[0..8].try_into().unwrap()) as usize;
        let increment = u64::from_le_bytes(header[8..16].try_into().unwrap()) as usize;
        Ok(Self {
            store,
            root,
            increment,
        })
    }

    fn read_node(&mut self, node_idx: usize, ctx: &mut QueryContext) -> Result<Node> {
        let mut buf = vec![0u8; self.store.page_size()];
        self.store.read_block(node_idx as u64, &mut buf)?;
        ctx.io_count += 1;
        let len = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        Ok(bincode::deserialize(&buf[4..4 + len])?)
    }

    fn read_leaf(&mut self, node_idx: usize, ctx: &mut QueryContext) -> Result<Leaf> {
        match self.read_node(node_idx, ctx)? {
            Node::Leaf(l) => Ok(l),
            Node::Index(_) => Err(AfnError::Invariant(format!(
                "expected leaf at node {node_idx}"
            ))),
        }
    }
}

/// Mirrors `btree::Cursor`, but descends/advances through `ExternalTree`
/// pages, charging every node read to a `QueryContext`.
pub struct ExternalCursor {
    leaf_idx: usize,
    leaf: Leaf,
    pos: usize,
}

impl ExternalCursor {
    pub fn at_leftmost(tree: &mut ExternalTree, ctx: &mut QueryContext) -> Result<Self> {
        let mut cur = tree.root;
        loop {
            match tree.read_node(cur, ctx)? {
                Node::Leaf(l) => {
                    return Ok(Self {
                        leaf_idx: cur,
                        leaf: l,
                        pos: 0,
                    })
                }
                Node::Index(n) => cur = n.children[0],
            }
        }
    }

    pub fn at_rightmost(tree: &mut ExternalTree, ctx: &mut QueryContext) -> Result<Self> {
        let mut cur = tree.root;
        loop {
            match tree.read_node(cur, ctx)? {
                Node::Leaf(l) => {
                    let pos = l.num_entries().saturating_sub(1);
                    return Ok(Self {
                        leaf_idx: cur,
                        leaf: l,
                        pos,
                    });
                }
                Node::Index(n) => cur = *n.children.last().unwrap(),
            }
        }
    }

    #[must_use]
    pub fn key(&self, increment: usize) -> Option<f32> {
        let sample_idx = self.pos / increment.max(1);
        self.leaf.keys.get(sample_idx).copied()
    }

    #[must_use]
    pub fn block_ids(&self, increment: usize) -> &[i32] {
        let inc = increment.max(1);
        let start = (self.pos / inc) * inc;
        let end = (start + inc).min(self.leaf.num_entries());
        &self.leaf.ids[start..end]
    }

    pub fn advance_right(&mut self, tree: &mut ExternalTree, ctx: &mut QueryContext) -> Result<bool> {
        let inc = tree.increment.max(1);
        let next_pos = ((self.pos / inc) + 1) * inc;
        if next_pos < self.leaf.num_entries() {
            self.pos = next_pos;
            Ok(true)
        } else if let Some(right) = self.leaf.right_sibling {
            self.leaf = tree.read_leaf(right, ctx)?;
            self.leaf_idx = right;
            self.pos = 0;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn advance_left(&mut self, tree: &mut ExternalTree, ctx: &mut QueryContext) -> Result<bool> {
        let inc = tree.increment.max(1);
        if self.pos >= inc {
            self.pos -= inc;
            Ok(true)
        } else if let Some(left) = self.leaf.left_sibling {
            self.leaf = tree.read_leaf(left, ctx)?;
            self.leaf_idx = left;
            let n = self.leaf.num_entries();
            self.pos = if n == 0 { 0 } else { ((n - 1) / inc) * inc };
            Ok(true)
        } else {
            Ok(false)
        }
    }

    #[must_use]
    pub fn leaf_index(&self) -> usize {
        self.leaf_idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::FnResult;
    use tempfile::NamedTempFile;

    #[test]
    fn dataset_round_trips_every_object() {
        let data: Vec<Vec<f32>> = (0..37).map(|i| vec![i as f32, (i * 2) as f32]).collect();
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let tmp = NamedTempFile::new().unwrap();
        let mut ds = ExternalDataset::create(tmp.path(), 64, &refs).unwrap();

        let mut ctx = QueryContext::new(1);
        for i in 0..37 {
            let v = ds.read_object(i, &mut ctx).unwrap();
            assert_eq!(v, data[i]);
        }
        assert_eq!(ctx.io_count, 37);
    }

    #[test]
    fn reopened_dataset_preserves_shape() {
        let data: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32; 3]).collect();
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let tmp = NamedTempFile::new().unwrap();
        ExternalDataset::create(tmp.path(), 128, &refs).unwrap();

        let mut reopened = ExternalDataset::open(tmp.path()).unwrap();
        assert_eq!(reopened.n(), 10);
        assert_eq!(reopened.d(), 3);
        let mut ctx = QueryContext::new(1);
        assert_eq!(reopened.read_object(5, &mut ctx).unwrap(), vec![5.0; 3]);
    }

    #[test]
    fn external_cursor_walks_every_row_and_counts_io() {
        let rows: Vec<FnResult> = (0..200).map(|i| FnResult::new(i as f32, i as i32)).collect();
        let tree = Tree::bulkload(&rows, 50, 10).unwrap();
        let tmp = NamedTempFile::new().unwrap();
        let mut ext = ExternalTree::create(tmp.path(), 512, &tree).unwrap();

        let mut ctx = QueryContext::new(1);
        let mut cursor = ExternalCursor::at_leftmost(&mut ext, &mut ctx).unwrap();
        let mut seen = cursor.block_ids(tree.increment).to_vec();
        while cursor.advance_right(&mut ext, &mut ctx).unwrap() {
            seen.extend_from_slice(cursor.block_ids(tree.increment));
        }
        assert_eq!(seen.len(), 200);
        assert!(ctx.io_count > 0);
    }
}
