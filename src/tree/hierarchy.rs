//! Lazy jurisdiction hierarchy as an explicit state machine.
//!
//! Nothing here performs I/O. Transitions that need data return a
//! [`FetchRequest`]; the caller performs the fetch and hands the outcome back
//! through [`HierarchyTree::finish_fetch`].

use std::collections::HashMap;

use crate::errors::ClientError;
use crate::models::{JurisdictionLevel, JurisdictionNode};

/// Children materialisation state of a node (or of the root list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Children unknown, never requested
    Idle,
    /// Exactly one fetch in flight, identified by `ticket`
    Loading { ticket: u64 },
    /// Children known, possibly none
    Loaded(Vec<String>),
    /// Last fetch failed; children unknown and the next expand retries
    Failed(String),
}

impl LoadState {
    pub fn is_known(&self) -> bool {
        matches!(self, LoadState::Loaded(_))
    }
}

/// A fetch the tree wants performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// `None` fetches the roots
    pub parent_id: Option<String>,
    pub ticket: u64,
}

/// What the expand control of a row should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    /// Children unknown or hidden
    Collapsed,
    Expanded,
    Loading,
    /// Children known to be empty
    Leaf,
}

/// One visible line of the tree, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub id: String,
    pub name: String,
    pub level: JurisdictionLevel,
    pub depth: usize,
    pub affordance: Affordance,
    pub active: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
struct TreeEntry {
    node: JurisdictionNode,
    depth: usize,
    expanded: bool,
    load: LoadState,
}

#[derive(Debug, Clone)]
pub struct HierarchyTree {
    roots: LoadState,
    entries: HashMap<String, TreeEntry>,
    active: Option<String>,
    next_ticket: u64,
}

impl Default for HierarchyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchyTree {
    pub fn new() -> Self {
        Self {
            roots: LoadState::Idle,
            entries: HashMap::new(),
            active: None,
            next_ticket: 0,
        }
    }

    pub fn roots_state(&self) -> &LoadState {
        &self.roots
    }

    pub fn load_state(&self, id: &str) -> Option<&LoadState> {
        self.entries.get(id).map(|e| &e.load)
    }

    pub fn is_expanded(&self, id: &str) -> Option<bool> {
        self.entries.get(id).map(|e| e.expanded)
    }

    pub fn node(&self, id: &str) -> Option<&JurisdictionNode> {
        self.entries.get(id).map(|e| &e.node)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Request the root list unless it is known or already loading.
    pub fn begin_root_load(&mut self) -> Option<FetchRequest> {
        match self.roots {
            LoadState::Idle | LoadState::Failed(_) => {
                let ticket = self.issue_ticket();
                self.roots = LoadState::Loading { ticket };
                Some(FetchRequest {
                    parent_id: None,
                    ticket,
                })
            }
            LoadState::Loading { .. } | LoadState::Loaded(_) => None,
        }
    }

    /// Flip a node between open and closed.
    ///
    /// A node whose children are unknown is shown closed whatever its flag
    /// says, so toggling it always means "open". Opening such a node starts
    /// the one fetch for its children; while that fetch is in flight further
    /// toggles only flip the flag. Known-empty nodes are leaves and ignore
    /// toggles.
    pub fn toggle_expand(&mut self, id: &str) -> Option<FetchRequest> {
        let entry = self.entries.get_mut(id)?;

        let starts_fetch = match &entry.load {
            LoadState::Loaded(children) if children.is_empty() => return None,
            LoadState::Loaded(_) | LoadState::Loading { .. } => false,
            LoadState::Idle | LoadState::Failed(_) => true,
        };

        if !starts_fetch {
            entry.expanded = !entry.expanded;
            return None;
        }

        let ticket = self.next_ticket + 1;
        self.next_ticket = ticket;
        entry.expanded = true;
        entry.load = LoadState::Loading { ticket };
        Some(FetchRequest {
            parent_id: Some(id.to_string()),
            ticket,
        })
    }

    /// Apply the outcome of a fetch. Returns `false` when the outcome no longer
    /// matches what the tree is waiting for and was ignored.
    pub fn finish_fetch(
        &mut self,
        request: &FetchRequest,
        outcome: Result<Vec<JurisdictionNode>, ClientError>,
    ) -> bool {
        let expected = LoadState::Loading {
            ticket: request.ticket,
        };

        let depth = match &request.parent_id {
            None if self.roots == expected => 0,
            Some(parent) => match self.entries.get(parent) {
                Some(entry) if entry.load == expected => entry.depth + 1,
                _ => return false,
            },
            None => return false,
        };

        let next = match outcome {
            Ok(children) => LoadState::Loaded(self.insert_children(children, depth)),
            Err(e) => LoadState::Failed(e.to_string()),
        };

        match &request.parent_id {
            None => self.roots = next,
            Some(parent) => {
                if let Some(entry) = self.entries.get_mut(parent) {
                    entry.load = next;
                }
            }
        }
        true
    }

    /// Mark `id` as the single active node and return its payload.
    pub fn select(&mut self, id: &str) -> Option<JurisdictionNode> {
        let node = self.entries.get(id)?.node.clone();
        self.active = Some(id.to_string());
        Some(node)
    }

    /// Visible rows in display order: roots in server order, children of open nodes beneath them.
    pub fn rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        if let LoadState::Loaded(roots) = &self.roots {
            for id in roots {
                self.collect_rows(id, &mut rows);
            }
        }
        rows
    }

    fn collect_rows(&self, id: &str, rows: &mut Vec<TreeRow>) {
        let Some(entry) = self.entries.get(id) else {
            return;
        };

        let (affordance, open_children) = match &entry.load {
            LoadState::Loading { .. } => (Affordance::Loading, None),
            LoadState::Loaded(children) if children.is_empty() => (Affordance::Leaf, None),
            LoadState::Loaded(children) if entry.expanded => {
                (Affordance::Expanded, Some(children))
            }
            LoadState::Loaded(_) | LoadState::Idle | LoadState::Failed(_) => {
                (Affordance::Collapsed, None)
            }
        };

        rows.push(TreeRow {
            id: entry.node.id.clone(),
            name: entry.node.name.clone(),
            level: entry.node.level.clone(),
            depth: entry.depth,
            affordance,
            active: self.active.as_deref() == Some(id),
            last_error: match &entry.load {
                LoadState::Failed(e) => Some(e.clone()),
                _ => None,
            },
        });

        if let Some(children) = open_children {
            for child in children {
                self.collect_rows(child, rows);
            }
        }
    }

    /// Cache `children` at `depth`, including any pre-supplied grandchildren,
    /// and return their ids in server order.
    fn insert_children(&mut self, children: Vec<JurisdictionNode>, depth: usize) -> Vec<String> {
        let mut ids = Vec::with_capacity(children.len());
        for mut node in children {
            let nested = node.children.take();
            let id = node.id.clone();

            // A node has exactly one place in the tree; a repeated id would
            // create a second parent or a cycle.
            if self.entries.contains_key(&id) {
                tracing::warn!(jurisdiction_id = %id, "Ignoring jurisdiction already present in the tree");
                continue;
            }
            ids.push(id.clone());

            let load = match nested {
                Some(grandchildren) => {
                    LoadState::Loaded(self.insert_children(grandchildren, depth + 1))
                }
                None => LoadState::Idle,
            };
            self.entries.insert(
                id,
                TreeEntry {
                    node,
                    depth,
                    expanded: depth == 0,
                    load,
                },
            );
        }
        ids
    }

    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, name: &str, level: &str) -> JurisdictionNode {
        JurisdictionNode {
            id: id.to_string(),
            name: name.to_string(),
            level: JurisdictionLevel::from(level.to_string()),
            parent_id: None,
            name_bn: None,
            children: None,
        }
    }

    fn loaded_tree(roots: Vec<JurisdictionNode>) -> HierarchyTree {
        let mut tree = HierarchyTree::new();
        let request = tree.begin_root_load().unwrap();
        assert!(tree.finish_fetch(&request, Ok(roots)));
        tree
    }

    #[test]
    fn test_roots_render_expandable_before_children_are_known() {
        let tree = loaded_tree(vec![node("d1", "Dhaka Division", "division")]);
        let rows = tree.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].affordance, Affordance::Collapsed);
        assert_eq!(rows[0].depth, 0);
        assert_eq!(tree.is_expanded("d1"), Some(true));
    }

    #[test]
    fn test_double_toggle_issues_single_fetch() {
        let mut tree = loaded_tree(vec![node("d1", "Dhaka Division", "division")]);

        let first = tree.toggle_expand("d1");
        assert!(first.is_some());
        assert_eq!(tree.toggle_expand("d1"), None);
        assert_eq!(tree.toggle_expand("d1"), None);
        assert_eq!(tree.rows()[0].affordance, Affordance::Loading);
    }

    #[test]
    fn test_empty_children_become_leaf_and_stop_fetching() {
        let mut tree = loaded_tree(vec![node("d1", "Dhaka Division", "division")]);
        let request = tree.toggle_expand("d1").unwrap();
        assert_eq!(request.parent_id.as_deref(), Some("d1"));
        assert!(tree.finish_fetch(&request, Ok(vec![])));

        assert_eq!(tree.rows()[0].affordance, Affordance::Leaf);
        assert_eq!(tree.load_state("d1"), Some(&LoadState::Loaded(vec![])));
        assert_eq!(tree.toggle_expand("d1"), None);
        assert_eq!(tree.toggle_expand("d1"), None);
    }

    #[test]
    fn test_unknown_and_known_empty_render_differently() {
        let mut tree = loaded_tree(vec![
            node("d1", "Dhaka Division", "division"),
            node("d2", "Chattogram Division", "division"),
        ]);
        let request = tree.toggle_expand("d1").unwrap();
        tree.finish_fetch(&request, Ok(vec![]));

        let rows = tree.rows();
        assert_eq!(rows[0].affordance, Affordance::Leaf);
        assert_eq!(rows[1].affordance, Affordance::Collapsed);
    }

    #[test]
    fn test_children_keep_server_order_and_depth() {
        let mut tree = loaded_tree(vec![node("d1", "Dhaka Division", "division")]);
        let request = tree.toggle_expand("d1").unwrap();
        tree.finish_fetch(
            &request,
            Ok(vec![
                node("z", "Tangail", "district"),
                node("a", "Gazipur", "district"),
            ]),
        );

        let rows = tree.rows();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "z", "a"]);
        assert_eq!(rows[0].affordance, Affordance::Expanded);
        assert_eq!(rows[1].depth, 1);
        assert_eq!(tree.is_expanded("z"), Some(false));
    }

    #[test]
    fn test_collapse_hides_children_without_refetch() {
        let mut tree = loaded_tree(vec![node("d1", "Dhaka Division", "division")]);
        let request = tree.toggle_expand("d1").unwrap();
        tree.finish_fetch(&request, Ok(vec![node("g", "Gazipur", "district")]));

        assert_eq!(tree.toggle_expand("d1"), None);
        assert_eq!(tree.rows().len(), 1);
        assert_eq!(tree.toggle_expand("d1"), None);
        assert_eq!(tree.rows().len(), 2);
    }

    #[test]
    fn test_failure_allows_retry_and_records_error() {
        let mut tree = loaded_tree(vec![node("d1", "Dhaka Division", "division")]);
        let request = tree.toggle_expand("d1").unwrap();
        tree.finish_fetch(&request, Err(ClientError::Network("refused".into())));

        let row = &tree.rows()[0];
        assert_eq!(row.affordance, Affordance::Collapsed);
        assert!(row.last_error.as_deref().unwrap().contains("refused"));

        let retry = tree.toggle_expand("d1").unwrap();
        assert!(retry.ticket > request.ticket);
    }

    #[test]
    fn test_outdated_ticket_is_ignored() {
        let mut tree = loaded_tree(vec![node("d1", "Dhaka Division", "division")]);
        let request = tree.toggle_expand("d1").unwrap();
        let stale = FetchRequest {
            parent_id: Some("d1".into()),
            ticket: request.ticket + 100,
        };
        assert!(!tree.finish_fetch(&stale, Ok(vec![])));
        assert!(matches!(
            tree.load_state("d1"),
            Some(LoadState::Loading { .. })
        ));
    }

    #[test]
    fn test_pre_supplied_children_are_known() {
        let mut root = node("c", "Central", "central");
        root.children = Some(vec![node("d1", "Dhaka Division", "division")]);
        let mut tree = loaded_tree(vec![root]);

        let rows = tree.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].affordance, Affordance::Expanded);
        assert_eq!(tree.toggle_expand("c"), None);
    }

    #[test]
    fn test_single_active_node() {
        let mut tree = loaded_tree(vec![
            node("d1", "Dhaka Division", "division"),
            node("d2", "Chattogram Division", "division"),
        ]);

        let selected = tree.select("d1").unwrap();
        assert_eq!(selected.name, "Dhaka Division");
        tree.select("d2");

        let rows = tree.rows();
        let active: Vec<&str> = rows
            .iter()
            .filter(|r| r.active)
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(tree.active_id(), Some("d2"));
        assert_eq!(active, vec!["d2"]);
        assert!(tree.select("missing").is_none());
        assert_eq!(tree.active_id(), Some("d2"));
    }

    #[test]
    fn test_child_repeating_its_parent_is_dropped() {
        let mut tree = loaded_tree(vec![node("d1", "Dhaka Division", "division")]);
        let request = tree.toggle_expand("d1").unwrap();

        assert!(tree.finish_fetch(
            &request,
            Ok(vec![
                node("d1", "Dhaka Division", "division"),
                node("g", "Gazipur", "district"),
            ])
        ));

        assert_eq!(
            tree.load_state("d1"),
            Some(&LoadState::Loaded(vec!["g".to_string()]))
        );
        let ids: Vec<String> = tree.rows().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["d1", "g"]);
    }

    #[test]
    fn test_node_keeps_its_first_parent() {
        let mut tree = loaded_tree(vec![
            node("d1", "Dhaka Division", "division"),
            node("d2", "Chattogram Division", "division"),
        ]);
        let request = tree.toggle_expand("d1").unwrap();
        tree.finish_fetch(&request, Ok(vec![node("g", "Gazipur", "district")]));

        let request = tree.toggle_expand("d2").unwrap();
        tree.finish_fetch(
            &request,
            Ok(vec![
                node("g", "Gazipur", "district"),
                node("g", "Gazipur", "district"),
            ]),
        );

        assert_eq!(tree.load_state("d2"), Some(&LoadState::Loaded(vec![])));
        let rows = tree.rows();
        let placed: Vec<(&str, usize)> = rows.iter().map(|r| (r.id.as_str(), r.depth)).collect();
        assert_eq!(placed, vec![("d1", 0), ("g", 1), ("d2", 0)]);
    }
}
