//! The notebook host contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::block::Block;
use crate::error::Result;

/// Where a new block goes relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOptions {
    /// Insert before the target (or as its first child) instead of after it.
    pub before: bool,
    /// Insert as a sibling of the target instead of as a child.
    pub sibling: bool,
}

/// Everything the bridge needs from the notebook application.
///
/// All operations are async and may suspend while the host answers; none of
/// them has a timeout of its own.
#[async_trait]
pub trait Notebook: Send + Sync {
    /// Blocks referencing `page` (including namespaced children like `page/x`).
    async fn linked_blocks(&self, page: &str) -> Result<Vec<Block>>;

    /// Run a structured (datascript) query with positional inputs.
    async fn query(&self, query: &str, args: &[Value]) -> Result<Option<Value>>;

    /// Fetch a block, optionally with its whole subtree.
    async fn block(&self, uuid: &str, include_children: bool) -> Result<Option<Block>>;

    /// Top-level blocks of a page, with children.
    async fn page_blocks_tree(&self, page: &str) -> Result<Vec<Block>>;

    /// Insert a block next to or under `target`.
    async fn insert_block(
        &self,
        target: &str,
        content: &str,
        options: InsertOptions,
    ) -> Result<Option<Block>>;

    /// Replace a block's content.
    async fn update_block(&self, uuid: &str, content: &str) -> Result<()>;

    /// Offer `template` to the user under the slash command `label`.
    async fn register_slash_template(&self, label: &str, template: &str) -> Result<()>;
}
