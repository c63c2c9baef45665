//! In-memory stand-ins for the document server, used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::remote::client::{EventFeed, EventSource, TreeSource};
use crate::remote::types::{FilePreview, PageRequest, ProjectSummary, TreeNode, TreePage};

#[derive(Default)]
pub struct FakeTreeSource {
    listings: Mutex<HashMap<String, Vec<TreePage>>>,
    search_hits: Mutex<HashMap<String, Vec<TreeNode>>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    previews: Mutex<HashMap<String, FilePreview>>,
    summary: Mutex<Option<ProjectSummary>>,
    fail_search: AtomicBool,
    /// Parent path of every listing page request, in issue order.
    listing_calls: Mutex<Vec<String>>,
    search_calls: AtomicUsize,
    preview_calls: AtomicUsize,
}

impl FakeTreeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `parent` as the given pages, chained with generated cursors.
    pub fn set_listing(&self, parent: &str, chunks: Vec<Vec<TreeNode>>) {
        let count = chunks.len();
        let pages = chunks
            .into_iter()
            .enumerate()
            .map(|(i, items)| TreePage {
                total: items.len() as u64,
                items,
                next_cursor: (i + 1 < count).then(|| format!("{}#{}", parent, i + 1)),
            })
            .collect();
        self.set_pages(parent, pages);
    }

    /// Serve `parent` as exactly these pages. A request with cursor `c` gets
    /// the page following the first page whose `next_cursor` is `c`.
    pub fn set_pages(&self, parent: &str, pages: Vec<TreePage>) {
        self.listings
            .lock()
            .unwrap()
            .insert(parent.to_string(), pages);
    }

    pub fn set_search(&self, query: &str, hits: Vec<TreeNode>) {
        self.search_hits
            .lock()
            .unwrap()
            .insert(query.to_string(), hits);
    }

    pub fn fail_listing(&self, parent: &str, fail: bool) {
        let mut failing = self.failing.lock().unwrap();
        if fail {
            failing.insert(parent.to_string());
        } else {
            failing.remove(parent);
        }
    }

    pub fn fail_search(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    /// Delay every page of `parent` by `delay` (for out-of-order tests).
    pub fn delay_listing(&self, parent: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(parent.to_string(), delay);
    }

    pub fn set_preview(&self, preview: FilePreview) {
        self.previews
            .lock()
            .unwrap()
            .insert(preview.id.clone(), preview);
    }

    pub fn set_summary(&self, summary: ProjectSummary) {
        *self.summary.lock().unwrap() = Some(summary);
    }

    pub fn listing_calls(&self) -> Vec<String> {
        self.listing_calls.lock().unwrap().clone()
    }

    /// Number of page requests issued for `parent`.
    pub fn listing_calls_for(&self, parent: &str) -> usize {
        self.listing_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == parent)
            .count()
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn preview_calls(&self) -> usize {
        self.preview_calls.load(Ordering::SeqCst)
    }

    fn listing_page(&self, parent: &str, cursor: Option<&str>) -> Result<TreePage> {
        if self.failing.lock().unwrap().contains(parent) {
            return Err(AppError::Stream(format!("listing {} unavailable", parent)));
        }
        let listings = self.listings.lock().unwrap();
        let Some(pages) = listings.get(parent) else {
            return Ok(TreePage::default());
        };
        let index = match cursor {
            None => 0,
            Some(c) => pages
                .iter()
                .position(|p| p.next_cursor.as_deref() == Some(c))
                .map(|i| i + 1)
                .ok_or_else(|| AppError::InvalidPage(format!("unknown cursor {}", c)))?,
        };
        pages
            .get(index)
            .cloned()
            .ok_or_else(|| AppError::InvalidPage(format!("no page {}", index)))
    }
}

#[async_trait]
impl TreeSource for FakeTreeSource {
    async fn fetch_tree_page(&self, _project_id: &str, request: &PageRequest) -> Result<TreePage> {
        if let Some(query) = &request.query {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_search.load(Ordering::SeqCst) {
                return Err(AppError::Stream("search backend down".into()));
            }
            let items = self
                .search_hits
                .lock()
                .unwrap()
                .get(query)
                .cloned()
                .unwrap_or_default();
            return Ok(TreePage {
                total: items.len() as u64,
                items,
                next_cursor: None,
            });
        }

        let parent = request.parent.clone().unwrap_or_default();
        self.listing_calls.lock().unwrap().push(parent.clone());
        let delay = self.delays.lock().unwrap().get(&parent).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.listing_page(&parent, request.cursor.as_deref())
    }

    async fn fetch_file_preview(&self, file_id: &str) -> Result<FilePreview> {
        self.preview_calls.fetch_add(1, Ordering::SeqCst);
        self.previews
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| AppError::InvalidPage(format!("no preview for {}", file_id)))
    }

    async fn fetch_project_summary(&self, _project_id: &str) -> Result<ProjectSummary> {
        self.summary
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::InvalidPage("no summary".into()))
    }
}

type FeedItem = Result<String>;

/// Event source whose feeds are driven by the test.
#[derive(Default)]
pub struct FakeEventSource {
    opens: AtomicUsize,
    fail_open: AtomicBool,
    feeds: Mutex<Vec<mpsc::UnboundedSender<FeedItem>>>,
}

impl FakeEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Push a raw frame into the most recently opened feed.
    pub fn emit(&self, raw: &str) {
        if let Some(tx) = self.feeds.lock().unwrap().last() {
            let _ = tx.send(Ok(raw.to_string()));
        }
    }

    /// Make the most recently opened feed fail.
    pub fn break_feed(&self) {
        if let Some(tx) = self.feeds.lock().unwrap().last() {
            let _ = tx.send(Err(AppError::Stream("connection reset".into())));
        }
    }

    /// Whether the most recently opened feed has been dropped by its reader.
    pub fn feed_closed(&self) -> bool {
        self.feeds
            .lock()
            .unwrap()
            .last()
            .map(|tx| tx.is_closed())
            .unwrap_or(true)
    }
}

#[async_trait]
impl EventSource for FakeEventSource {
    async fn open(&self, _project_id: &str) -> Result<Box<dyn EventFeed>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(AppError::Stream("refused".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().unwrap().push(tx);
        Ok(Box::new(FakeFeed { rx }))
    }
}

struct FakeFeed {
    rx: mpsc::UnboundedReceiver<FeedItem>,
}

#[async_trait]
impl EventFeed for FakeFeed {
    async fn next_message(&mut self) -> Option<Result<String>> {
        self.rx.recv().await
    }
}
