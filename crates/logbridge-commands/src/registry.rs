//! Registry of customized commands, rebuilt from the catalog page.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use logbridge_notebook::{Block, ChangeWatcher, Notebook, NotebookError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::decode;
use crate::command::{Command, CommandKind, CATALOG_PAGE};

/// Immutable view of the catalog at one point in time.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    commands: HashMap<CommandKind, BTreeMap<String, Command>>,
}

impl Snapshot {
    /// Decode `blocks` in order; later definitions replace earlier ones with
    /// the same kind and name.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut commands: HashMap<CommandKind, BTreeMap<String, Command>> = HashMap::new();
        for block in blocks {
            match decode(&block.content) {
                Ok(command) => {
                    commands
                        .entry(command.kind)
                        .or_default()
                        .insert(command.name.clone(), command);
                }
                Err(e) => debug!(uuid = %block.uuid, error = %e, "skipping block"),
            }
        }
        Self { commands }
    }

    /// Command `name` of `kind`.
    pub fn get(&self, kind: CommandKind, name: &str) -> Option<&Command> {
        self.commands.get(&kind).and_then(|by_name| by_name.get(name))
    }

    /// All commands, query kind first, then by name.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        CommandKind::ALL
            .into_iter()
            .filter_map(|kind| self.commands.get(&kind))
            .flat_map(|by_name| by_name.values())
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.values().map(BTreeMap::len).sum()
    }

    /// True if no commands are known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared, swappable catalog snapshot.
///
/// Readers clone the current `Arc`; a rebuild decodes a fresh snapshot
/// without holding the lock and swaps it in, so a lookup sees either the old
/// catalog or the new one.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    current: RwLock<Arc<Snapshot>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, snapshot: Snapshot) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }

    /// Re-read every block linked to the catalog page. On failure the
    /// previous snapshot stays in place.
    pub async fn rebuild(&self, notebook: &dyn Notebook) -> Result<usize, NotebookError> {
        let blocks = notebook.linked_blocks(CATALOG_PAGE).await?;
        let snapshot = Snapshot::from_blocks(&blocks);
        let count = snapshot.len();
        self.replace(snapshot);
        info!(commands = count, blocks = blocks.len(), "command catalog rebuilt");
        Ok(count)
    }

    /// Look up a command by kind and name.
    pub fn lookup(&self, kind: CommandKind, name: &str) -> Option<Command> {
        self.snapshot().get(kind, name).cloned()
    }

    /// Forget every command.
    pub fn clear(&self) {
        self.replace(Snapshot::default());
    }
}

/// Keeps a [`CommandRegistry`] in step with notebook changes.
pub struct CatalogSync {
    registry: Arc<CommandRegistry>,
    handle: JoinHandle<()>,
    watcher: Option<ChangeWatcher>,
}

impl CatalogSync {
    /// Rebuild once, then again on every tick of `changes`.
    pub async fn start(
        registry: Arc<CommandRegistry>,
        notebook: Arc<dyn Notebook>,
        mut changes: watch::Receiver<u64>,
    ) -> Self {
        if let Err(e) = registry.rebuild(notebook.as_ref()).await {
            warn!(error = %e, "initial command catalog load failed");
        }

        let task_registry = Arc::clone(&registry);
        let handle = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                if let Err(e) = task_registry.rebuild(notebook.as_ref()).await {
                    warn!(error = %e, "command catalog rebuild failed, keeping previous");
                }
            }
            debug!("change feed closed, catalog sync stopped");
        });

        Self {
            registry,
            handle,
            watcher: None,
        }
    }

    /// Like [`CatalogSync::start`], driven by a [`ChangeWatcher`] polling the
    /// catalog page every `every`.
    pub async fn polling(
        registry: Arc<CommandRegistry>,
        notebook: Arc<dyn Notebook>,
        every: Duration,
    ) -> Self {
        let watcher = ChangeWatcher::spawn(Arc::clone(&notebook), CATALOG_PAGE, every);
        let mut sync = Self::start(registry, notebook, watcher.subscribe()).await;
        sync.watcher = Some(watcher);
        sync
    }

    /// Unsubscribe and clear the registry.
    ///
    /// Waits for the sync task to finish, so a rebuild already in flight
    /// cannot repopulate the registry after it is cleared.
    pub async fn stop(mut self) {
        if let Some(watcher) = &self.watcher {
            watcher.stop();
        }
        self.handle.abort();
        if let Err(e) = (&mut self.handle).await {
            if !e.is_cancelled() {
                warn!(error = %e, "catalog sync task failed");
            }
        }
        self.registry.clear();
    }

    /// Whether the sync task has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CatalogSync {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logbridge_notebook::MemoryNotebook;

    fn query_block(uuid: &str, name: &str, script: &str) -> Block {
        Block::new(
            uuid,
            format!("[[local-telegram-bot/query]] {name}\n```clojure\n{script}\n```\ndesc"),
        )
    }

    #[test]
    fn test_last_write_wins() {
        let blocks = vec![
            query_block("1", "todos", "first"),
            query_block("2", "todos", "second"),
            Block::new("3", "[[local-telegram-bot]] just a link"),
        ];
        let snapshot = Snapshot::from_blocks(&blocks);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(CommandKind::Query, "todos").unwrap().script, "second");
    }

    #[test]
    fn test_same_name_different_kinds() {
        let blocks = vec![
            query_block("1", "x", "q"),
            Block::new("2", "[[local-telegram-bot/run]] x\n```js\nreturn 1;\n```"),
        ];
        let snapshot = Snapshot::from_blocks(&blocks);
        assert_eq!(snapshot.len(), 2);
        let kinds: Vec<_> = snapshot.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CommandKind::Query, CommandKind::Run]);
    }

    #[tokio::test]
    async fn test_rebuild_and_clear() {
        let notebook = MemoryNotebook::new();
        notebook.add_block("cmds", query_block("1", "todos", "[:find]"));
        let registry = CommandRegistry::new();

        assert_eq!(registry.rebuild(&notebook).await.unwrap(), 1);
        assert!(registry.lookup(CommandKind::Query, "todos").is_some());
        assert!(registry.lookup(CommandKind::Run, "todos").is_none());

        registry.clear();
        assert!(registry.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_snapshot() {
        let notebook = MemoryNotebook::new();
        notebook.add_block("cmds", query_block("1", "todos", "[:find]"));
        let registry = CommandRegistry::new();
        registry.rebuild(&notebook).await.unwrap();

        notebook.set_unavailable(true);
        assert!(registry.rebuild(&notebook).await.is_err());
        assert!(registry.lookup(CommandKind::Query, "todos").is_some());
    }

    #[tokio::test]
    async fn test_sync_rebuilds_on_change() {
        let notebook = Arc::new(MemoryNotebook::new());
        let registry = Arc::new(CommandRegistry::new());
        let sync = CatalogSync::start(registry.clone(), notebook.clone(), notebook.changes()).await;
        assert!(registry.snapshot().is_empty());

        notebook.add_block("cmds", query_block("1", "todos", "[:find]"));
        for _ in 0..50 {
            if registry.lookup(CommandKind::Query, "todos").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(registry.lookup(CommandKind::Query, "todos").is_some());

        sync.stop().await;
        assert!(registry.snapshot().is_empty());
    }

    /// A notebook whose reads block until released.
    struct SlowNotebook {
        inner: MemoryNotebook,
        gate: tokio::sync::Semaphore,
        reads: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Notebook for SlowNotebook {
        async fn linked_blocks(&self, page: &str) -> logbridge_notebook::Result<Vec<Block>> {
            self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            self.inner.linked_blocks(page).await
        }

        async fn query(&self, query: &str, args: &[serde_json::Value]) -> logbridge_notebook::Result<Option<serde_json::Value>> {
            self.inner.query(query, args).await
        }

        async fn block(&self, uuid: &str, include_children: bool) -> logbridge_notebook::Result<Option<Block>> {
            self.inner.block(uuid, include_children).await
        }

        async fn page_blocks_tree(&self, page: &str) -> logbridge_notebook::Result<Vec<Block>> {
            self.inner.page_blocks_tree(page).await
        }

        async fn insert_block(
            &self,
            target: &str,
            content: &str,
            options: logbridge_notebook::InsertOptions,
        ) -> logbridge_notebook::Result<Option<Block>> {
            self.inner.insert_block(target, content, options).await
        }

        async fn update_block(&self, uuid: &str, content: &str) -> logbridge_notebook::Result<()> {
            self.inner.update_block(uuid, content).await
        }

        async fn register_slash_template(&self, label: &str, template: &str) -> logbridge_notebook::Result<()> {
            self.inner.register_slash_template(label, template).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_wins_over_inflight_rebuild() {
        let notebook = Arc::new(SlowNotebook {
            inner: MemoryNotebook::new(),
            gate: tokio::sync::Semaphore::new(1),
            reads: std::sync::atomic::AtomicUsize::new(0),
        });
        let (tx, rx) = watch::channel(0u64);
        let registry = Arc::new(CommandRegistry::new());
        let sync = CatalogSync::start(registry.clone(), notebook.clone(), rx).await;

        // The next rebuild blocks inside the notebook read.
        notebook.inner.add_block("cmds", query_block("1", "todos", "[:find]"));
        tx.send_modify(|v| *v += 1);
        for _ in 0..100 {
            if notebook.reads.load(std::sync::atomic::Ordering::SeqCst) >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(notebook.reads.load(std::sync::atomic::Ordering::SeqCst), 2);

        sync.stop().await;
        notebook.gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(registry.snapshot().is_empty());
    }
}
