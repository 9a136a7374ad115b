//! Notebook block model.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A block as returned by the Logseq API.
///
/// Only the fields the bridge uses are kept; everything else the API sends is
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block uuid.
    #[serde(default)]
    pub uuid: String,
    /// Raw block text, including property lines.
    #[serde(default)]
    pub content: String,
    /// Task marker (`TODO`, `DOING`, ...), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    /// Child blocks. The API sends `["uuid", "..."]` pairs instead of objects
    /// when children were not requested; those are dropped.
    #[serde(default, deserialize_with = "deserialize_children")]
    pub children: Vec<Block>,
}

impl Block {
    /// Create a childless block.
    pub fn new(uuid: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            content: content.into(),
            marker: None,
            children: Vec::new(),
        }
    }

    /// Add a child block (builder style).
    pub fn with_child(mut self, child: Block) -> Self {
        self.children.push(child);
        self
    }

    /// Render the block and its descendants, one line per block, each level
    /// indented by `tab` more than its parent.
    pub fn to_text(&self, tab: &str) -> String {
        let mut text = String::new();
        self.write_text(tab, "", &mut text);
        text
    }

    fn write_text(&self, tab: &str, indent: &str, out: &mut String) {
        out.push_str(indent);
        out.push_str(&self.content);
        out.push('\n');
        let child_indent = format!("{indent}{tab}");
        for child in &self.children {
            child.write_text(tab, &child_indent, out);
        }
    }

    /// Depth-first search for a block by uuid.
    pub fn find(&self, uuid: &str) -> Option<&Block> {
        if self.uuid == uuid {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(uuid))
    }

    /// Depth-first search for a block by uuid, mutably.
    pub fn find_mut(&mut self, uuid: &str) -> Option<&mut Block> {
        if self.uuid == uuid {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(uuid))
    }

    /// Visit this block and every descendant in document order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Block)) {
        visit(self);
        for child in &self.children {
            child.walk(&mut *visit);
        }
    }
}

fn deserialize_children<'de, D>(deserializer: D) -> Result<Vec<Block>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_full_block() {
        let block: Block = serde_json::from_value(json!({
            "uuid": "a",
            "content": "TODO parent",
            "marker": "TODO",
            "page": {"id": 12},
            "children": [
                {"uuid": "b", "content": "child", "children": []}
            ]
        }))
        .unwrap();

        assert_eq!(block.uuid, "a");
        assert_eq!(block.marker.as_deref(), Some("TODO"));
        assert_eq!(block.children.len(), 1);
        assert_eq!(block.children[0].content, "child");
    }

    #[test]
    fn test_deserialize_collapsed_children() {
        let block: Block = serde_json::from_value(json!({
            "uuid": "a",
            "content": "parent",
            "children": [["uuid", "b"], ["uuid", "c"]]
        }))
        .unwrap();

        assert!(block.children.is_empty());
    }

    #[test]
    fn test_deserialize_null_children() {
        let block: Block =
            serde_json::from_value(json!({"uuid": "a", "content": "x", "children": null})).unwrap();
        assert!(block.children.is_empty());
    }

    #[test]
    fn test_to_text_indents_children() {
        let block = Block::new("a", "root")
            .with_child(Block::new("b", "child").with_child(Block::new("c", "grandchild")))
            .with_child(Block::new("d", "second"));

        assert_eq!(
            block.to_text("\t\t"),
            "root\n\t\tchild\n\t\t\t\tgrandchild\n\t\tsecond\n"
        );
    }

    #[test]
    fn test_find() {
        let mut block = Block::new("a", "root").with_child(Block::new("b", "child"));

        assert_eq!(block.find("b").map(|b| b.content.as_str()), Some("child"));
        assert!(block.find("zzz").is_none());

        block.find_mut("b").unwrap().content = "edited".to_string();
        assert_eq!(block.children[0].content, "edited");
    }

    #[test]
    fn test_walk_order() {
        let block = Block::new("a", "1")
            .with_child(Block::new("b", "2").with_child(Block::new("c", "3")))
            .with_child(Block::new("d", "4"));

        let mut seen = Vec::new();
        block.walk(&mut |b| seen.push(b.content.clone()));
        assert_eq!(seen, vec!["1", "2", "3", "4"]);
    }
}
