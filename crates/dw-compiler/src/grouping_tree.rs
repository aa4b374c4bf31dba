use std::collections::{BTreeMap, HashMap};

use dw_core::{DictWikiError, Row};

pub type GroupNodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    /// Comma-joined path from the root down to this node.
    pub key: String,
    pub name: String,
    pub parent: Option<GroupNodeId>,
    pub children: Vec<GroupNodeId>,
    pub depth: usize,
}

/// Single-rooted tree of group paths for one resource sheet. Nodes live in
/// an arena and refer to each other by index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupingTree {
    nodes: Vec<GroupNode>,
    by_key: HashMap<String, GroupNodeId>,
}

impl GroupingTree {
    pub fn root(&self) -> Option<&GroupNode> {
        self.nodes.first()
    }

    pub fn node(&self, id: GroupNodeId) -> &GroupNode {
        &self.nodes[id]
    }

    pub fn find(&self, key: &str) -> Option<GroupNodeId> {
        self.by_key.get(key).copied()
    }

    pub fn children(&self, id: GroupNodeId) -> impl Iterator<Item = &GroupNode> {
        self.nodes[id].children.iter().map(|child| &self.nodes[*child])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn insert(&mut self, key: String, name: &str, parent: Option<GroupNodeId>) -> GroupNodeId {
        let id = self.nodes.len();
        let depth = parent.map(|parent| self.nodes[parent].depth + 1).unwrap_or(0);
        self.nodes.push(GroupNode {
            key: key.clone(),
            name: name.to_string(),
            parent,
            children: Vec::new(),
            depth,
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        self.by_key.insert(key, id);
        id
    }
}

/// Builds the group tree of one resource from rows partitioned by group key.
/// Keys are visited in sorted order; child order is creation order.
pub fn build_grouping_tree(
    resource_name: &str,
    rows_by_group: &BTreeMap<String, Vec<Row>>,
) -> Result<GroupingTree, DictWikiError> {
    let mut tree = GroupingTree::default();

    for (group_key, rows) in rows_by_group {
        let Some(first) = rows.first() else {
            continue;
        };
        if first.groups.is_empty() {
            return Err(DictWikiError::new(
                "GROUP_PATH_EMPTY",
                format!(
                    "Resource \"{}\" has {} row(s) without a Groups path.",
                    resource_name,
                    rows.len()
                ),
            ));
        }

        let mut node_key = String::new();
        let mut parent = None;
        for segment in &first.groups {
            if !node_key.is_empty() {
                node_key.push(',');
            }
            node_key.push_str(segment);

            let id = match tree.find(&node_key) {
                Some(id) => id,
                None => {
                    if parent.is_none() && !tree.is_empty() {
                        return Err(DictWikiError::new(
                            "GROUP_MULTIPLE_ROOT",
                            format!(
                                "Group \"{}\" in resource \"{}\" would start a second root next to \"{}\" (row group key \"{}\").",
                                node_key,
                                resource_name,
                                tree.root().map(|root| root.key.as_str()).unwrap_or_default(),
                                group_key
                            ),
                        ));
                    }
                    tree.insert(node_key.clone(), segment, parent)
                }
            };
            parent = Some(id);
        }
    }

    Ok(tree)
}
