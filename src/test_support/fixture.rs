//! Synthetic Confluence hierarchies served through [`http_server`].
//!
//! Node titles follow `{kind}{seq:02}-L{level}`: a leading `p` is a page,
//! `f` a folder, and the level suffix records the intended depth below the
//! synthetic homepage. Ids are assigned sequentially in first-seen order.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};

/// Depth cap the fixture server honours, matching the real API.
const SERVED_DEPTH: i64 = 5;

/// 77 nodes across 12 levels: one bushy branch with re-root clusters at
/// L4/L8, one single chain under a folder, and one single chain whose top is
/// a folder.
pub const DEEP_HIERARCHY: &[&str] = &[
    // Branch 1: bushy, clustering parents at L4 and L8.
    "p01-L1",
    "p01-L1/p02-L2",
    "p01-L1/p02-L2/p03-L3",
    "p01-L1/p02-L2/p03-L3/f04-L4",
    "p01-L1/p02-L2/p03-L3/f04-L4/p05-L5",
    "p01-L1/p02-L2/p03-L3/f04-L4/p05-L5/p06-L6",
    "p01-L1/p02-L2/p03-L3/f04-L4/p05-L5/p06-L6/p07-L7",
    "p01-L1/p02-L2/p03-L3/f04-L4/p05-L5/p06-L6/p07-L7/f08-L8",
    "p01-L1/p02-L2/p03-L3/f04-L4/p05-L5/p06-L6/p07-L7/f08-L8/p09-L9",
    "p01-L1/p02-L2/p03-L3/f04-L4/p05-L5/p06-L6/p07-L7/f08-L8/p09-L9/p10-L10",
    "p01-L1/p02-L2/p03-L3/f04-L4/p05-L5/p06-L6/p07-L7/f08-L8/p09-L9/p10-L10/p11-L11",
    "p01-L1/p02-L2/p03-L3/f04-L4/p05-L5/p06-L6/p07-L7/f08-L8/p09-L9/p10-L10/p11-L11/p12-L12",
    "p01-L1/p02-L2/p03-L3/f04-L4/p05-L5/p06-L6/p07-L7/f08-L8/p13-L9",
    "p01-L1/p02-L2/p03-L3/f04-L4/p05-L5/p06-L6/p07-L7/f08-L8/f14-L9",
    "p01-L1/p02-L2/p03-L3/f04-L4/p05-L5/p06-L6/p07-L7/f08-L8/f15-L9",
    "p01-L1/p02-L2/p03-L3/f04-L4/p16-L5",
    "p01-L1/p02-L2/p03-L3/f04-L4/f17-L5",
    "p01-L1/p02-L2/p03-L3/f04-L4/p18-L5",
    "p01-L1/p02-L2/p03-L3/f04-L4/f19-L5",
    "p01-L1/p02-L2/p03-L3/f04-L4/p20-L5",
    "p01-L1/p02-L2/p03-L3/f21-L4",
    "p01-L1/p02-L2/p03-L3/f21-L4/p22-L5",
    "p01-L1/p02-L2/p03-L3/f21-L4/p22-L5/f23-L6",
    "p01-L1/p02-L2/p03-L3/f21-L4/p22-L5/f23-L6/p24-L7",
    "p01-L1/p02-L2/p03-L3/f21-L4/p22-L5/f23-L6/p24-L7/f25-L8",
    "p01-L1/p02-L2/p03-L3/f21-L4/p22-L5/f23-L6/p24-L7/f25-L8/p26-L9",
    "p01-L1/p02-L2/p03-L3/f21-L4/p22-L5/f23-L6/p24-L7/f25-L8/p26-L9/f27-L10",
    "p01-L1/p02-L2/p03-L3/f21-L4/p22-L5/f23-L6/p24-L7/f25-L8/p26-L9/f27-L10/p28-L11",
    "p01-L1/p02-L2/p03-L3/f21-L4/p22-L5/f23-L6/p24-L7/f25-L8/p26-L9/f27-L10/p28-L11/f29-L12",
    "p01-L1/p02-L2/p03-L3/f21-L4/p22-L5/f23-L6/p24-L7/f25-L8/f30-L9",
    "p01-L1/p02-L2/p03-L3/f21-L4/p22-L5/f23-L6/p24-L7/f25-L8/p31-L9",
    "p01-L1/p02-L2/p03-L3/f21-L4/p22-L5/f23-L6/p24-L7/f25-L8/f32-L9",
    "p01-L1/p02-L2/p03-L3/f21-L4/f33-L5",
    "p01-L1/p02-L2/p03-L3/f21-L4/p34-L5",
    "p01-L1/p02-L2/p03-L3/f21-L4/f35-L5",
    "p01-L1/p02-L2/p03-L3/f21-L4/p36-L5",
    "p01-L1/p02-L2/f37-L3",
    "p01-L1/p02-L2/f37-L3/p38-L4",
    "p01-L1/p02-L2/f37-L3/p38-L4/p39-L5",
    "p01-L1/p02-L2/f37-L3/p38-L4/p39-L5/f40-L6",
    "p01-L1/p02-L2/f37-L3/p38-L4/p39-L5/f40-L6/p41-L7",
    "p01-L1/p02-L2/f37-L3/p38-L4/p39-L5/f40-L6/p41-L7/p42-L8",
    "p01-L1/p02-L2/f37-L3/p38-L4/p39-L5/f40-L6/p41-L7/p42-L8/f43-L9",
    "p01-L1/p02-L2/f37-L3/p38-L4/p39-L5/f40-L6/p41-L7/p42-L8/f43-L9/p44-L10",
    "p01-L1/p02-L2/f37-L3/p38-L4/p39-L5/f40-L6/p41-L7/p42-L8/f43-L9/p44-L10/f45-L11",
    "p01-L1/p02-L2/f37-L3/p38-L4/p39-L5/f40-L6/p41-L7/p42-L8/f43-L9/p44-L10/f45-L11/p46-L12",
    "p01-L1/p02-L2/f37-L3/p38-L4/p39-L5/f40-L6/p41-L7/p42-L8/p47-L9",
    "p01-L1/p02-L2/f37-L3/p38-L4/p39-L5/f40-L6/p41-L7/p42-L8/f48-L9",
    "p01-L1/p02-L2/f37-L3/p38-L4/p39-L5/f40-L6/p41-L7/p42-L8/p49-L9",
    "p01-L1/p02-L2/f37-L3/p38-L4/f50-L5",
    "p01-L1/p02-L2/f37-L3/p38-L4/p51-L5",
    "p01-L1/p02-L2/f37-L3/p38-L4/f52-L5",
    "p01-L1/p02-L2/f37-L3/p38-L4/p53-L5",
    "p01-L1/p02-L2/f37-L3/p38-L4/f54-L5",
    "p01-L1/f55-L2",
    // Branch 2: single chain to L12 under a folder.
    "p01-L1/f55-L2/p56-L3",
    "p01-L1/f55-L2/p56-L3/f57-L4",
    "p01-L1/f55-L2/p56-L3/f57-L4/p58-L5",
    "p01-L1/f55-L2/p56-L3/f57-L4/p58-L5/f59-L6",
    "p01-L1/f55-L2/p56-L3/f57-L4/p58-L5/f59-L6/p60-L7",
    "p01-L1/f55-L2/p56-L3/f57-L4/p58-L5/f59-L6/p60-L7/f61-L8",
    "p01-L1/f55-L2/p56-L3/f57-L4/p58-L5/f59-L6/p60-L7/f61-L8/p62-L9",
    "p01-L1/f55-L2/p56-L3/f57-L4/p58-L5/f59-L6/p60-L7/f61-L8/p62-L9/f63-L10",
    "p01-L1/f55-L2/p56-L3/f57-L4/p58-L5/f59-L6/p60-L7/f61-L8/p62-L9/f63-L10/p64-L11",
    "p01-L1/f55-L2/p56-L3/f57-L4/p58-L5/f59-L6/p60-L7/f61-L8/p62-L9/f63-L10/p64-L11/f65-L12",
    // Branch 3: single chain to L12 with a folder at the top.
    "f66-L1",
    "f66-L1/p67-L2",
    "f66-L1/p67-L2/f68-L3",
    "f66-L1/p67-L2/f68-L3/p69-L4",
    "f66-L1/p67-L2/f68-L3/p69-L4/f70-L5",
    "f66-L1/p67-L2/f68-L3/p69-L4/f70-L5/p71-L6",
    "f66-L1/p67-L2/f68-L3/p69-L4/f70-L5/p71-L6/f72-L7",
    "f66-L1/p67-L2/f68-L3/p69-L4/f70-L5/p71-L6/f72-L7/p73-L8",
    "f66-L1/p67-L2/f68-L3/p69-L4/f70-L5/p71-L6/f72-L7/p73-L8/f74-L9",
    "f66-L1/p67-L2/f68-L3/p69-L4/f70-L5/p71-L6/f72-L7/p73-L8/f74-L9/p75-L10",
    "f66-L1/p67-L2/f68-L3/p69-L4/f70-L5/p71-L6/f72-L7/p73-L8/f74-L9/p75-L10/f76-L11",
    "f66-L1/p67-L2/f68-L3/p69-L4/f70-L5/p71-L6/f72-L7/p73-L8/f74-L9/p75-L10/f76-L11/p77-L12",
];

/// A chain of six folders between two pages; crawling it requires re-rooting
/// at a folder because no page ancestor sits within reach of the frontier.
pub const FOLDER_SPINE: &[&str] = &[
    "p78-L1",
    "p78-L1/f79-L2",
    "p78-L1/f79-L2/f80-L3",
    "p78-L1/f79-L2/f80-L3/f81-L4",
    "p78-L1/f79-L2/f80-L3/f81-L4/f82-L5",
    "p78-L1/f79-L2/f80-L3/f81-L4/f82-L5/f83-L6",
    "p78-L1/f79-L2/f80-L3/f81-L4/f82-L5/f83-L6/f84-L7",
    "p78-L1/f79-L2/f80-L3/f81-L4/f82-L5/f83-L6/f84-L7/p85-L8",
];

#[derive(Debug, Clone)]
pub struct FixtureNode {
    pub id: String,
    pub title: String,
    pub kind: String,
    pub parent_id: String,
    pub child_position: i64,
}

#[derive(Debug)]
pub struct Fixture {
    homepage_id: String,
    nodes: HashMap<String, FixtureNode>,
    children: HashMap<String, Vec<String>>,
    ids_by_title: HashMap<String, String>,
}

impl Fixture {
    pub fn from_paths(paths: &[&str]) -> Fixture {
        let homepage_id = "1000".to_string();
        let mut fixture = Fixture {
            homepage_id: homepage_id.clone(),
            nodes: HashMap::new(),
            children: HashMap::new(),
            ids_by_title: HashMap::new(),
        };
        let mut next_id = 1001u64;

        for path in paths {
            let mut parent = homepage_id.clone();
            for segment in path.split('/') {
                if let Some(id) = fixture.ids_by_title.get(segment) {
                    parent = id.clone();
                    continue;
                }
                let id = next_id.to_string();
                next_id += 1;
                let kind = if segment.starts_with('f') {
                    "folder"
                } else {
                    "page"
                };
                let siblings = fixture.children.entry(parent.clone()).or_default();
                let node = FixtureNode {
                    id: id.clone(),
                    title: segment.to_string(),
                    kind: kind.to_string(),
                    parent_id: parent.clone(),
                    child_position: siblings.len() as i64,
                };
                siblings.push(id.clone());
                fixture.ids_by_title.insert(segment.to_string(), id.clone());
                fixture.nodes.insert(id.clone(), node);
                parent = id;
            }
        }

        fixture
    }

    pub fn homepage_id(&self) -> &str {
        &self.homepage_id
    }

    pub fn id_of(&self, title: &str) -> String {
        self.ids_by_title
            .get(title)
            .unwrap_or_else(|| panic!("fixture has no node titled {title}"))
            .clone()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn count_by_kind(&self, kind: &str) -> usize {
        self.nodes.values().filter(|n| n.kind == kind).count()
    }

    /// Every node in the subtree rooted at `root_id`, excluding the root.
    pub fn subtree_ids(&self, root_id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<&String> = self
            .children
            .get(root_id)
            .map(|kids| kids.iter().rev().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id.clone());
            if let Some(kids) = self.children.get(id) {
                stack.extend(kids.iter().rev());
            }
        }
        out
    }

    /// The `{results: [...]}` body a descendants request for `root_id` would
    /// return, honouring the depth cap. `None` when the id is unknown.
    pub fn descendants_response(&self, root_id: &str) -> Option<Value> {
        if root_id != self.homepage_id && !self.nodes.contains_key(root_id) {
            return None;
        }
        let mut results = Vec::new();
        let mut stack: Vec<(String, i64)> = self
            .children
            .get(root_id)
            .map(|kids| kids.iter().rev().map(|id| (id.clone(), 1)).collect())
            .unwrap_or_default();
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[&id];
            results.push(json!({
                "id": node.id,
                "title": node.title,
                "type": node.kind,
                "parentId": node.parent_id,
                "childPosition": node.child_position,
                "depth": depth,
            }));
            if depth < SERVED_DEPTH
                && let Some(kids) = self.children.get(&id)
            {
                stack.extend(kids.iter().rev().map(|kid| (kid.clone(), depth + 1)));
            }
        }
        Some(json!({"results": results}))
    }

    /// A `/pages?id=...` record for pipeline tests.
    pub fn page_record_json(&self, id: &str) -> Value {
        let node = &self.nodes[id];
        json!({
            "id": node.id,
            "title": node.title,
            "body": {"view": {"value": format!("<p>{} body</p>", node.title)}},
            "_links": {"webui": format!("/spaces/TEST/pages/{}/{}", node.id, node.title)},
        })
    }
}

/// Extract `("pages" | "folders", id)` from a descendants request target.
pub fn parse_descendants_target(target: &str) -> Option<(String, String)> {
    let path = target.split('?').next()?;
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["wiki", "api", "v2", endpoint, id, "descendants"]
            if *endpoint == "pages" || *endpoint == "folders" =>
        {
            Some((endpoint.to_string(), id.to_string()))
        }
        _ => None,
    }
}

/// Extract the requested ids from a `/pages?id=a,b,c` batch target.
pub fn parse_page_ids_target(target: &str) -> Option<Vec<String>> {
    let (path, query) = target.split_once('?')?;
    if !path.ends_with("/wiki/api/v2/pages") {
        return None;
    }
    for pair in query.split('&') {
        if let Some(ids) = pair.strip_prefix("id=") {
            let decoded = ids.replace("%2C", ",");
            return Some(decoded.split(',').map(|s| s.to_string()).collect());
        }
    }
    None
}

/// Handler serving descendants requests from a fixture, 404 otherwise.
pub fn descendants_handler(
    fixture: Arc<Fixture>,
) -> impl Fn(usize, &str) -> (u16, Vec<(String, String)>, Vec<u8>) + Send + Sync + 'static {
    move |_hit, target| {
        if let Some((_, id)) = parse_descendants_target(target)
            && let Some(body) = fixture.descendants_response(&id)
        {
            return (200, vec![], serde_json::to_vec(&body).unwrap());
        }
        (404, vec![], b"not found".to_vec())
    }
}
