//! Content tree linearization
//!
//! Turns a flat parent-pointer set into breadth-first levels that can be
//! inserted one level at a time (a child is only inserted once its parent
//! id is known). The build pipeline reuses `hierarchy` to walk the tree
//! depth-first.

use std::collections::{HashMap, HashSet};

use crate::error::{ImportError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortedHierarchy {
    /// Levels below the root: children of the root first, then grandchildren
    pub sorted: Vec<Vec<String>>,
    /// Parent id -> child ids, in input order
    pub hierarchy: HashMap<String, Vec<String>>,
}

impl SortedHierarchy {
    pub fn len(&self) -> usize {
        self.sorted.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Pre-order walk from `root` (excluded), siblings ordered by `sort_key`
    pub fn depth_first<F>(&self, root: &str, sort_key: F) -> Vec<String>
    where
        F: Fn(&str) -> i64,
    {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<String> = self.sorted_children(root, &sort_key);
        stack.reverse();
        while let Some(id) = stack.pop() {
            let mut children = self.sorted_children(&id, &sort_key);
            children.reverse();
            stack.extend(children);
            out.push(id);
        }
        out
    }

    fn sorted_children<F>(&self, parent: &str, sort_key: &F) -> Vec<String>
    where
        F: Fn(&str) -> i64,
    {
        let mut children = self.hierarchy.get(parent).cloned().unwrap_or_default();
        // Stable sort keeps input order for equal keys
        children.sort_by_key(|id| sort_key(id));
        children
    }
}

/// Sort `(id, parent_id)` pairs into levels below `root_id`
///
/// # Errors
///
/// `OrphanedContent` listing every node that cannot be reached from the
/// root: nodes without a parent, nodes whose parent never appears, and
/// cycles detached from the root. `InvalidPackage` when a node reuses the
/// root id.
pub fn sort_hierarchy<'a, I>(root_id: &str, nodes: I) -> Result<SortedHierarchy>
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut hierarchy: HashMap<String, Vec<String>> = HashMap::new();
    let mut parentless = Vec::new();
    let mut total = 0usize;

    for (id, parent) in nodes {
        if id == root_id {
            return Err(ImportError::invalid_package(format!(
                "duplicate content id {}: already used by the course",
                id
            )));
        }
        total += 1;
        match parent {
            Some(parent) => hierarchy
                .entry(parent.to_string())
                .or_default()
                .push(id.to_string()),
            None => parentless.push(id.to_string()),
        }
    }

    if !parentless.is_empty() {
        parentless.sort();
        return Err(ImportError::OrphanedContent { ids: parentless });
    }

    let mut worklist: HashSet<&str> = hierarchy.keys().map(String::as_str).collect();
    let mut sorted: Vec<Vec<String>> = Vec::new();
    let mut level: Vec<String> = vec![root_id.to_string()];

    while !worklist.is_empty() {
        let mut next = Vec::new();
        for parent in &level {
            if let Some(children) = hierarchy.get(parent.as_str()) {
                worklist.remove(parent.as_str());
                next.extend(children.iter().cloned());
            }
        }
        if next.is_empty() {
            // Remaining parents were never reached
            let mut ids: Vec<String> = worklist
                .iter()
                .flat_map(|p| hierarchy[*p].iter().cloned())
                .collect();
            ids.sort();
            return Err(ImportError::OrphanedContent { ids });
        }
        sorted.push(next.clone());
        level = next;
    }
    drop(worklist);

    let result = SortedHierarchy { sorted, hierarchy };
    if result.len() != total {
        return Err(ImportError::InvalidCourse(format!(
            "content tree holds {} of {} documents",
            result.len(),
            total
        )));
    }
    Ok(result)
}
