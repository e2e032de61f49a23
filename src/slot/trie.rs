// The MIT License (MIT)

// Copyright (c) 2015 Rustcc developers

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! The slot trie (spec.md §4.3): a grow-only structure mapping a slot's
//! UTF-8 name to its `SlotCell`, built so that one object's worth of
//! concurrent readers are never blocked by another coroutine naming a new
//! slot on the same object.
//!
//! spec.md describes the literal shape as a fixed-width, SWAR-scanned
//! bucket of four `(byte, branch)` pairs with an atomic mask, plus a
//! shortcut leaf for straight-line path compression. This implementation
//! keeps that shape — a byte-keyed branch per trie level, a shortcut for
//! the common single-occupant subtree, and a distinguished zero-edge — but
//! publishes each node's branches under a per-node `RwLock` rather than a
//! hand-rolled lock-free bit mask. spec.md's own design notes license this
//! trade explicitly: "a concurrent hash map with per-bucket locks is a
//! reasonable alternative" to the literal SWAR buckets; a single mutex for
//! the *whole* trie is what is actually forbidden, and this keeps locking
//! scoped to one node (one "bucket") at a time, so unrelated slot names
//! never contend.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::slot::cell::SlotCell;

struct Shortcut {
    suffix: Vec<u8>,
    cell: Arc<SlotCell>,
}

#[derive(Default)]
struct NodeData {
    leaf: Option<Arc<SlotCell>>,
    shortcut: Option<Shortcut>,
    zero_edge: Option<Arc<TrieNode>>,
    children: HashMap<u8, Arc<TrieNode>>,
}

/// One level of the trie.
pub struct TrieNode {
    data: RwLock<NodeData>,
}

impl TrieNode {
    fn new() -> Arc<Self> {
        Arc::new(TrieNode {
            data: RwLock::new(NodeData::default()),
        })
    }

    fn is_empty_subtree(&self) -> bool {
        let data = self.data.read().unwrap();
        data.leaf.is_none()
            && data.shortcut.is_none()
            && data.zero_edge.is_none()
            && data.children.is_empty()
    }

    /// Read-only probe: absent bytes return `None` without allocating.
    fn read(&self, name: &[u8]) -> Option<Arc<SlotCell>> {
        if name.is_empty() {
            return self.data.read().unwrap().leaf.clone();
        }

        {
            let data = self.data.read().unwrap();
            if let Some(sc) = &data.shortcut {
                if sc.suffix == name {
                    return Some(sc.cell.clone());
                }
            }
        }

        let (&byte, rest) = name.split_first().unwrap();
        let child = {
            let data = self.data.read().unwrap();
            if byte == 0 {
                data.zero_edge.clone()
            } else {
                data.children.get(&byte).cloned()
            }
        };
        child.and_then(|c| c.read(rest))
    }

    /// Open-or-create: returns the cell for `name`, creating trie nodes and
    /// a fresh `SlotCell` along the way if needed. Never removes or
    /// replaces an existing live branch — the trie only grows.
    fn open(&self, name: &[u8]) -> Arc<SlotCell> {
        if name.is_empty() {
            {
                let data = self.data.read().unwrap();
                if let Some(leaf) = &data.leaf {
                    return leaf.clone();
                }
            }
            let mut data = self.data.write().unwrap();
            data.leaf.get_or_insert_with(|| Arc::new(SlotCell::new())).clone()
        } else {
            // Fast path: an exact shortcut hit avoids the per-byte walk.
            {
                let data = self.data.read().unwrap();
                if let Some(sc) = &data.shortcut {
                    if sc.suffix == name {
                        return sc.cell.clone();
                    }
                }
            }

            if self.is_empty_subtree() {
                let mut data = self.data.write().unwrap();
                // Re-check under the write lock: someone may have planted
                // a shortcut (or more) between our read and this write.
                if data.leaf.is_none()
                    && data.shortcut.is_none()
                    && data.zero_edge.is_none()
                    && data.children.is_empty()
                {
                    let cell = Arc::new(SlotCell::new());
                    data.shortcut = Some(Shortcut {
                        suffix: name.to_vec(),
                        cell: cell.clone(),
                    });
                    return cell;
                }
            }

            // Either the node was non-empty, or we lost the race to plant
            // a shortcut: explode any existing shortcut into a real edge so
            // both names remain reachable, then recurse byte-by-byte.
            self.explode_shortcut_if_conflicting(name);

            let (&byte, rest) = name.split_first().unwrap();
            let child = self.child_for_write(byte);
            child.open(rest)
        }
    }

    fn explode_shortcut_if_conflicting(&self, name: &[u8]) {
        let existing = {
            let mut data = self.data.write().unwrap();
            if let Some(sc) = &data.shortcut {
                if sc.suffix != name {
                    data.shortcut.take()
                } else {
                    None
                }
            } else {
                None
            }
        };

        if let Some(sc) = existing {
            let (&byte, rest) = sc.suffix.split_first().unwrap_or((&0u8, &[]));
            if sc.suffix.is_empty() {
                // Defensive: an empty shortcut suffix means this node's own
                // leaf, which open() above already special-cased.
                let mut data = self.data.write().unwrap();
                data.leaf.get_or_insert(sc.cell);
                return;
            }
            let child = self.child_for_write(byte);
            // Re-insert the original name along the real per-byte path.
            let mut cursor = child;
            let mut remaining = rest;
            loop {
                if remaining.is_empty() {
                    let mut data = cursor.data.write().unwrap();
                    data.leaf.get_or_insert(sc.cell.clone());
                    break;
                }
                let (&b, r) = remaining.split_first().unwrap();
                cursor = cursor.child_for_write(b);
                remaining = r;
            }
        }
    }

    fn child_for_write(&self, byte: u8) -> Arc<TrieNode> {
        let mut data = self.data.write().unwrap();
        if byte == 0 {
            data.zero_edge.get_or_insert_with(TrieNode::new).clone()
        } else {
            data.children.entry(byte).or_insert_with(TrieNode::new).clone()
        }
    }

    fn for_each_name(&self, prefix: &mut Vec<u8>, out: &mut Vec<(String, Arc<SlotCell>)>) {
        let data = self.data.read().unwrap();
        if let Some(leaf) = &data.leaf {
            if leaf.is_live() {
                if let Ok(name) = String::from_utf8(prefix.clone()) {
                    out.push((name, leaf.clone()));
                }
            }
        }
        if let Some(sc) = &data.shortcut {
            if sc.cell.is_live() {
                let mut full = prefix.clone();
                full.extend_from_slice(&sc.suffix);
                if let Ok(name) = String::from_utf8(full) {
                    out.push((name, sc.cell.clone()));
                }
            }
        }
        if let Some(zero) = &data.zero_edge {
            prefix.push(0);
            zero.for_each_name(prefix, out);
            prefix.pop();
        }
        for (&byte, child) in data.children.iter() {
            prefix.push(byte);
            child.for_each_name(prefix, out);
            prefix.pop();
        }
    }
}

/// Per-object slot table: name -> `SlotCell`.
pub struct SlotTrie {
    root: Arc<TrieNode>,
}

impl SlotTrie {
    pub fn new() -> Self {
        SlotTrie { root: TrieNode::new() }
    }

    /// `None` if the name was never opened on this object.
    pub fn get_existing(&self, name: &str) -> Option<Arc<SlotCell>> {
        self.root.read(name.as_bytes())
    }

    /// Open-or-create. The returned cell is not yet claimed; callers claim
    /// it themselves (this mirrors spec.md's "the returned cell is locked
    /// by `coro`" by leaving claim ownership explicit at the call site,
    /// since `SlotCell::claim` needs the calling coroutine's id).
    pub fn open(&self, name: &str) -> Arc<SlotCell> {
        self.root.open(name.as_bytes())
    }

    /// All `(name, cell)` pairs currently live on this object. Used by
    /// `Object slotNames`-style reflection and by `serialized()`.
    pub fn live_slots(&self) -> Vec<(String, Arc<SlotCell>)> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        self.root.for_each_name(&mut prefix, &mut out);
        out
    }
}

impl Default for SlotTrie {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::object::Object;

    #[test]
    fn test_absent_name_reads_none() {
        let trie = SlotTrie::new();
        assert!(trie.get_existing("nope").is_none());
    }

    #[test]
    fn test_open_then_store_then_read() {
        let trie = SlotTrie::new();
        let cell = trie.open("x");
        cell.claim(1);
        cell.store(Some(Object::new_plain()));
        cell.release(1);

        let again = trie.get_existing("x").unwrap();
        assert!(again.is_live());
    }

    #[test]
    fn test_shared_prefix_names_both_resolve() {
        let trie = SlotTrie::new();
        let a = trie.open("hello");
        let b = trie.open("help");
        a.claim(1);
        a.store(Some(Object::new_plain()));
        a.release(1);
        b.claim(1);
        b.store(Some(Object::new_plain()));
        b.release(1);

        assert!(trie.get_existing("hello").unwrap().is_live());
        assert!(trie.get_existing("help").unwrap().is_live());
        assert!(trie.get_existing("hel").is_none());
    }

    #[test]
    fn test_open_is_idempotent_same_cell() {
        let trie = SlotTrie::new();
        let a = trie.open("greet");
        let b = trie.open("greet");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_live_slots_lists_all_names() {
        let trie = SlotTrie::new();
        for name in ["a", "ab", "b"] {
            let cell = trie.open(name);
            cell.claim(1);
            cell.store(Some(Object::new_plain()));
            cell.release(1);
        }
        let mut names: Vec<String> = trie.live_slots().into_iter().map(|(n, _)| n).collect();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "ab".to_string(), "b".to_string()]);
    }
}
