use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Content kind of a crawled node.
///
/// Confluence keeps adding content kinds (whiteboards, databases, embeds, ...),
/// so anything we do not know is preserved verbatim instead of failing
/// deserialization. Only `Page` can serve as a descendants re-root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Page,
    Folder,
    Other(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Page => "page",
            NodeType::Folder => "folder",
            NodeType::Other(kind) => kind,
        }
    }
}

impl From<String> for NodeType {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "page" => NodeType::Page,
            "folder" => NodeType::Folder,
            _ => NodeType::Other(kind),
        }
    }
}

impl From<NodeType> for String {
    fn from(kind: NodeType) -> Self {
        kind.as_str().to_string()
    }
}

/// Kind of node a crawl starts from. Pages and folders use different
/// descendants endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RootKind {
    Page,
    Folder,
}

/// A single descendant record as returned by the descendants endpoints.
///
/// `depth` is relative to the fetch root of the request that returned the
/// node, not absolute within the space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub kind: NodeType,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub child_position: i64,
    #[serde(default)]
    pub depth: i64,
}

/// Space record; `homepage_id` is the natural root for a full-space crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub homepage_id: Option<String>,
}

/// A page with its body, fetched for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<PageBody>,
    #[serde(rename = "_links", default)]
    pub links: Option<PageLinks>,
}

impl PageRecord {
    /// The `view` HTML body, if the record was fetched with one.
    pub fn body_html(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|body| body.view.as_ref())
            .map(|view| view.value.as_str())
    }

    pub fn webui_link(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|links| links.webui.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageBody {
    #[serde(default)]
    pub view: Option<BodyValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyValue {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub webui: Option<String>,
}
