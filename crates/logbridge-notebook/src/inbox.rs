//! Writing inbound messages into the configured page.

use std::sync::Arc;

use chrono::NaiveDate;
use logbridge_core::{journal_day, Settings};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::error::Result;
use crate::tasks::flatten_pulled;
use crate::traits::{InsertOptions, Notebook};

/// Datascript query for the journal page of `date`.
pub fn journal_page_query(date: NaiveDate) -> String {
    format!(
        "[:find (pull ?p [*])\n :where\n [?b :block/page ?p]\n [?p :block/journal? true]\n [?p :block/journal-day ?d]\n [(= ?d {})]]",
        journal_day(date)
    )
}

#[derive(Debug, Deserialize)]
struct PageRef {
    #[serde(default)]
    name: Option<String>,
}

/// Appends text blocks to a page, optionally under an inbox block.
pub struct InboxWriter {
    notebook: Arc<dyn Notebook>,
    page_name: String,
    use_journal: bool,
    inbox_name: String,
    append_at_bottom: bool,
}

impl InboxWriter {
    /// Writer for a named page. Pass [`logbridge_core::DEFAULT_JOURNAL_PAGE`]
    /// to target today's journal.
    pub fn new(notebook: Arc<dyn Notebook>, page_name: impl Into<String>) -> Self {
        let page_name = page_name.into();
        Self {
            notebook,
            use_journal: page_name == logbridge_core::DEFAULT_JOURNAL_PAGE,
            page_name,
            inbox_name: String::new(),
            append_at_bottom: false,
        }
    }

    /// Writer configured from settings.
    pub fn from_settings(notebook: Arc<dyn Notebook>, settings: &Settings) -> Self {
        Self::new(notebook, settings.page_name.clone())
            .with_inbox(settings.inbox_name.clone())
            .with_append_at_bottom(settings.append_at_bottom)
    }

    /// Group messages under the top-level block whose content is `inbox`.
    pub fn with_inbox(mut self, inbox: impl Into<String>) -> Self {
        self.inbox_name = inbox.into();
        self
    }

    /// Append after existing blocks instead of before them.
    pub fn with_append_at_bottom(mut self, append: bool) -> Self {
        self.append_at_bottom = append;
        self
    }

    /// Top-level blocks of the target page as of `today`.
    pub async fn page_blocks(&self, today: NaiveDate) -> Result<Vec<Block>> {
        if !self.use_journal {
            return self.notebook.page_blocks_tree(&self.page_name).await;
        }

        let Some(rows) = self.notebook.query(&journal_page_query(today), &[]).await? else {
            info!(day = journal_day(today), "today's journal is not available");
            return Ok(Vec::new());
        };
        let pages: Vec<PageRef> = flatten_pulled(rows)?;
        match pages.into_iter().next().and_then(|p| p.name) {
            Some(name) => self.notebook.page_blocks_tree(&name).await,
            None => {
                info!(day = journal_day(today), "today's journal is not available");
                Ok(Vec::new())
            }
        }
    }

    /// Insert `text` into the page. Returns the new block, or `None` when the
    /// page or the inbox could not be resolved.
    pub async fn write(&self, text: &str, today: NaiveDate) -> Result<Option<Block>> {
        let blocks = self.page_blocks(today).await?;
        let (Some(first), Some(last)) = (blocks.first(), blocks.last()) else {
            warn!(page = %self.page_name, "requested page is not available");
            return Ok(None);
        };

        let anchor = if self.inbox_name.is_empty() {
            Some(if self.append_at_bottom { last.clone() } else { first.clone() })
        } else {
            match blocks.iter().find(|b| b.content == self.inbox_name) {
                Some(inbox) => Some(inbox.clone()),
                None => {
                    debug!(inbox = %self.inbox_name, "creating inbox block");
                    self.notebook
                        .insert_block(
                            &last.uuid,
                            &self.inbox_name,
                            InsertOptions { before: false, sibling: true },
                        )
                        .await?
                }
            }
        };

        let Some(anchor) = anchor else {
            warn!(inbox = %self.inbox_name, "unable to find inbox");
            return Ok(None);
        };

        let options = InsertOptions {
            before: !self.append_at_bottom,
            sibling: self.inbox_name.is_empty(),
        };
        self.notebook.insert_block(&anchor.uuid, text, options).await
    }
}
