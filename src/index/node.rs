use anyhow::{Error, Result};

use crate::common::{PageNo, Rid, PAGE_WORDS};
use crate::storage::page::PageBuffer;

pub const LEAF_FLAG: i32 = 0;
pub const INDEX_FLAG: i32 = 1;

/// A tree node during the batch build. Nodes never point at each other;
/// they live in a creation-ordered arena and refer to children by the
/// page index assigned at creation time, which is also their on-disk
/// page offset.
pub enum TreeNode {
    /// Ordered `(key, rids)` entries; keys are unique within the whole
    /// tree, duplicates of a source key are merged into one entry.
    Leaf { entries: Vec<(i32, Vec<Rid>)> },
    /// `children.len() - 1` separator keys; separator `i` is the first
    /// key of the subtree under `children[i + 1]`.
    Index {
        keys: Vec<i32>,
        children: Vec<PageNo>,
    },
}

/// Serialized page layouts, zero-filled to page capacity:
/// leaf:  `[0][numEntries][key][ridCount][rid.page][rid.slot]...`
/// index: `[1][numKeys][key...][childPage...]`
pub fn serialize(node: &TreeNode, page: &mut PageBuffer) -> Result<()> {
    page.zero();
    match node {
        TreeNode::Leaf { entries } => {
            let words = 2 + entries
                .iter()
                .map(|(_, rids)| 2 + 2 * rids.len())
                .sum::<usize>();
            if words > PAGE_WORDS {
                return Err(Error::msg(format!(
                    "Leaf with {} entries needs {} words, a page holds {}",
                    entries.len(),
                    words,
                    PAGE_WORDS
                )));
            }
            page.write_i32(LEAF_FLAG);
            page.write_i32(entries.len() as i32);
            for (key, rids) in entries {
                page.write_i32(*key);
                page.write_i32(rids.len() as i32);
                for (page_no, slot) in rids {
                    page.write_i32(*page_no as i32);
                    page.write_i32(*slot as i32);
                }
            }
        }
        TreeNode::Index { keys, children } => {
            let words = 2 + keys.len() + children.len();
            if words > PAGE_WORDS {
                return Err(Error::msg(format!(
                    "Index node with {} children needs {} words, a page holds {}",
                    children.len(),
                    words,
                    PAGE_WORDS
                )));
            }
            page.write_i32(INDEX_FLAG);
            page.write_i32(keys.len() as i32);
            for key in keys {
                page.write_i32(*key);
            }
            for child in children {
                page.write_i32(*child as i32);
            }
        }
    }
    Ok(())
}
