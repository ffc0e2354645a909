use serde::{Deserialize, Serialize};

use crate::models::Node;

/// Separator used when a root-to-leaf path is flattened into a file name.
pub const BREADCRUMB_SEPARATOR: &str = "~";

/// A crawled node together with its ancestry.
///
/// `lineage` runs from the node itself up to the topmost ancestor the crawl
/// has seen: `[self, parent, grandparent, ...]`. It always holds at least one
/// element and is frozen once the crawl returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    lineage: Vec<Node>,
}

impl Entity {
    /// Build an entity from a self-first lineage chain.
    ///
    /// Panics if `lineage` is empty; the crawler always seeds it with the
    /// node itself.
    pub fn new(lineage: Vec<Node>) -> Self {
        assert!(!lineage.is_empty(), "entity lineage cannot be empty");
        Entity { lineage }
    }

    /// The node this entity wraps (first element of the lineage).
    pub fn node(&self) -> &Node {
        &self.lineage[0]
    }

    pub fn lineage(&self) -> &[Node] {
        &self.lineage
    }

    /// Node ids from the topmost known ancestor down to this node.
    pub fn id_path(&self) -> Vec<String> {
        self.lineage.iter().rev().map(|n| n.id.clone()).collect()
    }

    /// Titles from the topmost known ancestor down to this node.
    pub fn title_path(&self) -> Vec<String> {
        self.lineage.iter().rev().map(|n| n.title.clone()).collect()
    }

    /// Child positions from the topmost known ancestor down to this node.
    /// Lexicographic comparison of these vectors yields depth-first preorder.
    pub fn position_path(&self) -> Vec<i64> {
        self.lineage.iter().rev().map(|n| n.child_position).collect()
    }

    pub fn id_breadcrumb_path(&self) -> String {
        join_breadcrumb(&self.id_path())
    }

    pub fn title_breadcrumb_path(&self) -> String {
        join_breadcrumb(&self.title_path())
    }
}

fn join_breadcrumb(components: &[String]) -> String {
    components
        .iter()
        .map(|c| sanitize_component(c))
        .collect::<Vec<_>>()
        .join(BREADCRUMB_SEPARATOR)
}

/// Make a path component safe to embed in a file name.
fn sanitize_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_control() {
            continue;
        }
        if ch == '/' || ch == '\\' {
            out.push('-');
        } else {
            out.push(ch);
        }
    }
    out.trim().to_string()
}

/// Sort entities into depth-first preorder: `position_path` first, node id
/// as tie-breaker (`childPosition` is not guaranteed unique among siblings).
pub fn sort_entities(entities: &mut [Entity]) {
    entities.sort_by(|a, b| {
        a.position_path()
            .cmp(&b.position_path())
            .then_with(|| a.node().id.cmp(&b.node().id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeType;

    fn node(id: &str, title: &str, parent: Option<&str>, position: i64) -> Node {
        Node {
            id: id.to_string(),
            title: title.to_string(),
            kind: NodeType::Page,
            parent_id: parent.map(|p| p.to_string()),
            child_position: position,
            depth: 0,
        }
    }

    fn entity_chain() -> Entity {
        Entity::new(vec![
            node("3", "Release notes", Some("2"), 1),
            node("2", "Guides", Some("1"), 4),
            node("1", "Docs", None, 0),
        ])
    }

    #[test]
    fn paths_run_root_to_leaf() {
        let entity = entity_chain();
        assert_eq!(entity.node().id, "3");
        assert_eq!(entity.id_path(), ["1", "2", "3"]);
        assert_eq!(entity.title_path(), ["Docs", "Guides", "Release notes"]);
        assert_eq!(entity.position_path(), [0, 4, 1]);
    }

    #[test]
    fn breadcrumbs_join_with_tilde_and_sanitize() {
        let entity = Entity::new(vec![
            node("3", "Ops / Runbooks", Some("1"), 0),
            node("1", "Team\\Home", None, 0),
        ]);
        assert_eq!(entity.id_breadcrumb_path(), "1~3");
        assert_eq!(entity.title_breadcrumb_path(), "Team-Home~Ops - Runbooks");
    }

    #[test]
    fn single_node_lineage_is_its_own_path() {
        let entity = Entity::new(vec![node("7", "Standalone", None, 2)]);
        assert_eq!(entity.id_path(), ["7"]);
        assert_eq!(entity.position_path(), [2]);
    }

    #[test]
    fn sort_is_depth_first_with_id_tiebreak() {
        let root = node("1", "root", None, 0);
        let a = node("10", "a", Some("1"), 0);
        let a_child = node("30", "a-child", Some("10"), 0);
        let b = node("20", "b", Some("1"), 1);
        // same childPosition as `b` on purpose
        let b_twin = node("19", "b-twin", Some("1"), 1);

        let mut entities = vec![
            Entity::new(vec![b.clone(), root.clone()]),
            Entity::new(vec![b_twin.clone(), root.clone()]),
            Entity::new(vec![a_child.clone(), a.clone(), root.clone()]),
            Entity::new(vec![a.clone(), root.clone()]),
            Entity::new(vec![root.clone()]),
        ];
        sort_entities(&mut entities);

        let order: Vec<&str> = entities.iter().map(|e| e.node().id.as_str()).collect();
        assert_eq!(order, ["1", "10", "30", "19", "20"]);
    }
}
