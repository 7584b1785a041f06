//! Debounced search-as-you-type.
//!
//! A [`Debouncer`] runs a fetch only after the input has been quiet for the
//! debounce delay, and publishes a result only if no newer query has been
//! submitted in the meantime.  The published [`SearchState`] therefore
//! always answers the latest query text.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

use hearth_shared::constants::MIN_SEARCH_LEN;
use hearth_shared::UserId;
use hearth_store::DirectoryEntry;

use crate::directory::UserDirectory;
use crate::gif::{Gif, GifError, GifSource};

/// State of a search widget, tagged with the query it answers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchState<T> {
    #[default]
    Idle,
    Loading { query: String },
    Ready { query: String, results: T },
    Failed { query: String, message: String },
}

impl<T> SearchState<T> {
    pub fn query(&self) -> Option<&str> {
        match self {
            SearchState::Idle => None,
            SearchState::Loading { query }
            | SearchState::Ready { query, .. }
            | SearchState::Failed { query, .. } => Some(query),
        }
    }
}

pub struct Debouncer<T> {
    delay: Duration,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<SearchState<T>>>,
    task: Option<JoinHandle<()>>,
}

impl<T: Send + Sync + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        let (state, _) = watch::channel(SearchState::Idle);
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
            task: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState<T>> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SearchState<T>
    where
        T: Clone,
    {
        self.state.borrow().clone()
    }

    /// Schedule `fetch` for `query`, superseding any earlier submission.
    pub fn submit<F, Fut>(&mut self, query: impl Into<String>, fetch: F)
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, String>> + Send + 'static,
    {
        let query = query.into();
        let generation = self.supersede();
        self.state.send_replace(SearchState::Loading {
            query: query.clone(),
        });

        let current = self.generation.clone();
        let state = self.state.clone();
        let delay = self.delay;

        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }

            let next = match fetch(query.clone()).await {
                Ok(results) => SearchState::Ready { query, results },
                Err(message) => SearchState::Failed { query, message },
            };

            let published = state.send_if_modified(|slot| {
                if current.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *slot = next;
                true
            });
            if !published {
                trace!(generation, "Dropped stale search result");
            }
        }));
    }

    /// Cancel any pending search and return to [`SearchState::Idle`].
    pub fn clear(&mut self) {
        self.supersede();
        self.state.send_replace(SearchState::Idle);
    }

    fn supersede(&mut self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        generation
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Username search over the [`UserDirectory`].
pub struct UserSearch {
    directory: Arc<dyn UserDirectory>,
    requester: UserId,
    debouncer: Debouncer<Vec<DirectoryEntry>>,
}

impl UserSearch {
    pub fn new(directory: Arc<dyn UserDirectory>, requester: UserId, delay: Duration) -> Self {
        Self {
            directory,
            requester,
            debouncer: Debouncer::new(delay),
        }
    }

    /// Feed the current input text.  Fewer than two characters clears the
    /// results without searching.
    pub fn input(&mut self, text: &str) {
        let needle = text.trim();
        if needle.chars().count() < MIN_SEARCH_LEN {
            self.debouncer.clear();
            return;
        }

        let directory = self.directory.clone();
        let requester = self.requester.clone();
        self.debouncer.submit(needle, move |needle| async move {
            directory
                .search(&needle, &requester)
                .await
                .map_err(|e| e.notice().text)
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState<Vec<DirectoryEntry>>> {
        self.debouncer.subscribe()
    }

    pub fn state(&self) -> SearchState<Vec<DirectoryEntry>> {
        self.debouncer.state()
    }
}

/// GIF picker state.  An empty query shows trending GIFs.
pub struct GifPicker {
    source: Option<Arc<dyn GifSource>>,
    debouncer: Debouncer<Vec<Gif>>,
}

impl GifPicker {
    /// `source` is `None` when GIF search is not configured; every query
    /// then fails inside the picker.
    pub fn new(source: Option<Arc<dyn GifSource>>, delay: Duration) -> Self {
        Self {
            source,
            debouncer: Debouncer::new(delay),
        }
    }

    pub fn input(&mut self, text: &str) {
        let query = text.trim().to_string();
        let source = self.source.clone();
        self.debouncer.submit(query, move |query| async move {
            let Some(source) = source else {
                return Err(GifError::MissingApiKey.to_string());
            };
            let result = if query.is_empty() {
                source.featured().await
            } else {
                source.search(&query).await
            };
            result.map_err(|e| e.to_string())
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState<Vec<Gif>>> {
        self.debouncer.subscribe()
    }

    pub fn state(&self) -> SearchState<Vec<Gif>> {
        self.debouncer.state()
    }
}
