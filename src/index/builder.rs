use std::collections::BTreeMap;

use anyhow::{Error, Result};

use super::node::{serialize, TreeNode};
use super::{index_file_name, resolve_key_column};
use crate::catalog::schema::Schema;
use crate::common::{PageNo, Rid};
use crate::executors::external_sort_executor::ExternalSortExecutor;
use crate::executors::seq_scan_executor::SeqScanExecutor;
use crate::executors::Executor;
use crate::storage::file_manager::FileManager;
use crate::storage::page::PageBuffer;
use crate::storage::tuple_file::{TupleReader, TupleWriter};

/// Page budget for the sort that rewrites a relation before a clustered
/// build.
const CLUSTER_SORT_BUFFER_PAGES: usize = 10;

/// Bulk-builds a B+-tree over one attribute of a relation and writes it
/// as `relation.attribute` into the data directory. A clustered build
/// first rewrites the relation file in key order, so the rids collected
/// afterwards point at physically sorted tuples and a clustered range
/// scan degenerates to a sequential read.
///
/// The index file starts with a header page `[rootPage][leafCount][order]`
/// followed by the node pages, leaves first, root last; a node's position
/// in the file is the page index assigned at creation time. The header's
/// order word is informational only, readers never depend on it.
pub fn build_index(
    file_manager: &FileManager,
    relation: &str,
    schema: &Schema,
    attribute: &str,
    clustered: bool,
    order: usize,
) -> Result<()> {
    if order == 0 {
        return Err(Error::msg("Index order must be at least 1"));
    }
    let key_column = resolve_key_column(schema, relation, attribute)?;

    if clustered {
        rewrite_sorted(file_manager, relation, schema, key_column)?;
    }

    let mut reader = TupleReader::open(file_manager, relation, schema.arity())?;
    let mut entries: BTreeMap<i32, Vec<Rid>> = BTreeMap::new();
    while let Some((tuple, rid)) = reader.next_tuple_with_rid()? {
        entries.entry(tuple.value(key_column)).or_default().push(rid);
    }

    let (nodes, root_page, leaf_count) = build_nodes(entries.into_iter().collect(), order);

    let index_file = index_file_name(relation, attribute);
    file_manager.create_or_truncate(&index_file)?;

    let mut page = PageBuffer::new();
    page.zero();
    page.write_i32(root_page as i32);
    page.write_i32(leaf_count as i32);
    page.write_i32(order as i32);
    file_manager.append_page(&index_file, &page)?;

    for node in &nodes {
        serialize(node, &mut page)?;
        file_manager.append_page(&index_file, &page)?;
    }

    Ok(())
}

/// Rewrites the relation file in ascending key order. The sort drains the
/// old layout into its temporary runs before the file is truncated.
fn rewrite_sorted(
    file_manager: &FileManager,
    relation: &str,
    schema: &Schema,
    key_column: usize,
) -> Result<()> {
    let reader = TupleReader::open(file_manager, relation, schema.arity())?;
    let scan = SeqScanExecutor::new(reader, schema.clone());
    let mut sort =
        ExternalSortExecutor::new(Box::new(scan), &[key_column], CLUSTER_SORT_BUFFER_PAGES)?;

    let mut writer = TupleWriter::create(file_manager, relation, schema.arity())?;
    while let Some(tuple) = sort.next().transpose()? {
        writer.write_tuple(&tuple)?;
    }
    writer.close()
}

/// Lays the ordered entries out as tree nodes, leaves first, root last.
/// Returns the arena together with the root page index and the leaf
/// count; page index `n + 1` in the file belongs to arena position `n`,
/// page 0 being the header.
fn build_nodes(entries: Vec<(i32, Vec<Rid>)>, order: usize) -> (Vec<TreeNode>, PageNo, u32) {
    let mut nodes: Vec<TreeNode> = vec![];
    if entries.is_empty() {
        return (nodes, 0, 0);
    }

    let mut children: Vec<(PageNo, i32)> = vec![];
    let sizes = pack_sizes(entries.len(), 2 * order, order);
    let mut entries = entries.into_iter();
    for size in sizes {
        let chunk = entries.by_ref().take(size).collect::<Vec<_>>();
        let first_key = chunk[0].0;
        let page_no = (nodes.len() + 1) as PageNo;
        nodes.push(TreeNode::Leaf { entries: chunk });
        children.push((page_no, first_key));
    }
    let leaf_count = children.len() as u32;

    while children.len() > 2 * order + 1 {
        children = pack_layer(&mut nodes, children, order);
    }

    // The root is created last, over whatever the top layer holds, even
    // if that is a single leaf.
    let root_keys = children.iter().skip(1).map(|(_, key)| *key).collect();
    let root_children = children.iter().map(|(page, _)| *page).collect();
    let root_page = (nodes.len() + 1) as PageNo;
    nodes.push(TreeNode::Index {
        keys: root_keys,
        children: root_children,
    });

    (nodes, root_page, leaf_count)
}

/// Packs one index layer over the given children, returning the new
/// layer's `(page, first subtree key)` pairs.
fn pack_layer(
    nodes: &mut Vec<TreeNode>,
    children: Vec<(PageNo, i32)>,
    order: usize,
) -> Vec<(PageNo, i32)> {
    let sizes = pack_sizes(children.len(), 2 * order + 1, order + 1);
    let mut children = children.into_iter();
    let mut parents = vec![];
    for size in sizes {
        let chunk = children.by_ref().take(size).collect::<Vec<_>>();
        let first_key = chunk[0].1;
        let keys = chunk.iter().skip(1).map(|(_, key)| *key).collect();
        let child_pages = chunk.iter().map(|(page, _)| *page).collect();
        let page_no = (nodes.len() + 1) as PageNo;
        nodes.push(TreeNode::Index {
            keys,
            children: child_pages,
        });
        parents.push((page_no, first_key));
    }
    parents
}

/// Greedy node sizing: take `capacity` at a time, except that a remainder
/// which would leave the trailing node below `minimum` is split evenly
/// across the final two nodes instead.
fn pack_sizes(total: usize, capacity: usize, minimum: usize) -> Vec<usize> {
    let mut sizes = vec![];
    let mut remaining = total;
    while remaining > 0 {
        if remaining > capacity && remaining < capacity + minimum {
            let first = remaining / 2;
            sizes.push(first);
            sizes.push(remaining - first);
            break;
        }
        let take = remaining.min(capacity);
        sizes.push(take);
        remaining -= take;
    }
    sizes
}
