//! In-process notebook.
//!
//! Holds pages as block trees and answers queries from a table of scripted
//! results. Every write bumps a change counter observable through
//! [`MemoryNotebook::changes`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::block::Block;
use crate::error::{NotebookError, Result};
use crate::traits::{InsertOptions, Notebook};

#[derive(Debug, Default)]
struct State {
    /// Lowercased page name -> top-level blocks.
    pages: HashMap<String, Vec<Block>>,
    /// Query text -> result.
    query_results: HashMap<String, Value>,
    query_calls: Vec<(String, Vec<Value>)>,
    templates: Vec<(String, String)>,
    next_id: u64,
    unavailable: bool,
}

/// A [`Notebook`] backed by memory.
#[derive(Debug)]
pub struct MemoryNotebook {
    state: Mutex<State>,
    changes: watch::Sender<u64>,
}

impl Default for MemoryNotebook {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNotebook {
    /// Create an empty notebook.
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: Mutex::new(State::default()),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        self.changes.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Replace a page's top-level blocks.
    pub fn set_page(&self, page: &str, blocks: Vec<Block>) {
        self.lock().pages.insert(page.to_lowercase(), blocks);
        self.touch();
    }

    /// Append a top-level block to a page, creating the page if needed.
    pub fn add_block(&self, page: &str, block: Block) {
        self.lock()
            .pages
            .entry(page.to_lowercase())
            .or_default()
            .push(block);
        self.touch();
    }

    /// Remove every block whose uuid is `uuid`, wherever it is.
    pub fn remove_block(&self, uuid: &str) {
        {
            let mut state = self.lock();
            for blocks in state.pages.values_mut() {
                remove_from(blocks, uuid);
            }
        }
        self.touch();
    }

    /// Current top-level blocks of a page.
    pub fn page(&self, page: &str) -> Vec<Block> {
        self.lock()
            .pages
            .get(&page.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Answer `query` with `result` from now on.
    pub fn set_query_result(&self, query: impl Into<String>, result: Value) {
        self.lock().query_results.insert(query.into(), result);
    }

    /// Every query issued so far, with its inputs.
    pub fn query_calls(&self) -> Vec<(String, Vec<Value>)> {
        self.lock().query_calls.clone()
    }

    /// Slash templates registered so far, as `(label, template)`.
    pub fn templates(&self) -> Vec<(String, String)> {
        self.lock().templates.clone()
    }

    /// Make every operation fail as if the host were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Receiver ticking on every write.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn check_available(state: &State, method: &str) -> Result<()> {
        if state.unavailable {
            return Err(NotebookError::Api {
                method: method.to_string(),
                message: "notebook unavailable".to_string(),
            });
        }
        Ok(())
    }
}

fn references(content: &str, page: &str) -> bool {
    let content = content.to_lowercase();
    let page = page.to_lowercase();
    content.contains(&format!("[[{page}]]")) || content.contains(&format!("[[{page}/"))
}

fn remove_from(blocks: &mut Vec<Block>, uuid: &str) {
    blocks.retain(|b| b.uuid != uuid);
    for block in blocks.iter_mut() {
        remove_from(&mut block.children, uuid);
    }
}

fn insert_into(blocks: &mut Vec<Block>, target: &str, new: &Block, options: InsertOptions) -> bool {
    if let Some(index) = blocks.iter().position(|b| b.uuid == target) {
        if options.sibling {
            let at = if options.before { index } else { index + 1 };
            blocks.insert(at, new.clone());
        } else if options.before {
            blocks[index].children.insert(0, new.clone());
        } else {
            blocks[index].children.push(new.clone());
        }
        return true;
    }
    blocks
        .iter_mut()
        .any(|b| insert_into(&mut b.children, target, new, options))
}

#[async_trait]
impl Notebook for MemoryNotebook {
    async fn linked_blocks(&self, page: &str) -> Result<Vec<Block>> {
        let state = self.lock();
        Self::check_available(&state, "linked_blocks")?;

        let mut names: Vec<&String> = state.pages.keys().collect();
        names.sort();

        let mut linked = Vec::new();
        for name in names {
            for top in &state.pages[name] {
                top.walk(&mut |b| {
                    if references(&b.content, page) {
                        linked.push(b.clone());
                    }
                });
            }
        }
        Ok(linked)
    }

    async fn query(&self, query: &str, args: &[Value]) -> Result<Option<Value>> {
        let mut state = self.lock();
        Self::check_available(&state, "query")?;
        state.query_calls.push((query.to_string(), args.to_vec()));
        Ok(state.query_results.get(query).cloned())
    }

    async fn block(&self, uuid: &str, include_children: bool) -> Result<Option<Block>> {
        let state = self.lock();
        Self::check_available(&state, "block")?;
        let found = state
            .pages
            .values()
            .flatten()
            .find_map(|b| b.find(uuid))
            .cloned();
        Ok(found.map(|mut b| {
            if !include_children {
                b.children.clear();
            }
            b
        }))
    }

    async fn page_blocks_tree(&self, page: &str) -> Result<Vec<Block>> {
        let state = self.lock();
        Self::check_available(&state, "page_blocks_tree")?;
        Ok(state
            .pages
            .get(&page.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_block(
        &self,
        target: &str,
        content: &str,
        options: InsertOptions,
    ) -> Result<Option<Block>> {
        let inserted = {
            let mut state = self.lock();
            Self::check_available(&state, "insert_block")?;
            state.next_id += 1;
            let block = Block::new(format!("block-{}", state.next_id), content);
            let placed = state
                .pages
                .values_mut()
                .any(|blocks| insert_into(blocks, target, &block, options));
            placed.then_some(block)
        };
        if inserted.is_some() {
            self.touch();
        }
        Ok(inserted)
    }

    async fn update_block(&self, uuid: &str, content: &str) -> Result<()> {
        {
            let mut state = self.lock();
            Self::check_available(&state, "update_block")?;
            let block = state
                .pages
                .values_mut()
                .flatten()
                .find_map(|b| b.find_mut(uuid))
                .ok_or_else(|| NotebookError::BlockNotFound(uuid.to_string()))?;
            block.content = content.to_string();
        }
        self.touch();
        Ok(())
    }

    async fn register_slash_template(&self, label: &str, template: &str) -> Result<()> {
        let mut state = self.lock();
        Self::check_available(&state, "register_slash_template")?;
        state
            .templates
            .push((label.to_string(), template.to_string()));
        Ok(())
    }
}
