//! Paginated feed state.
//!
//! A [`TimelinePager`] owns the posts of one feed. `refresh` replaces them with
//! the newest page, `load_more` appends the page older than the last post held.
//! State is published through a `watch` channel so the presentation layer can
//! re-render on every change.
//!
//! Only one `load_more` runs at a time; extra calls while loading do nothing.
//! `refresh` always wins: it cancels whatever is in flight and its result is
//! the one that lands. Dropping an operation's future midway leaves the pager
//! as it was before that operation started.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Notify, watch};

use crate::api::{ApiError, ApiResult, FeedSource, PageRequest};
use crate::models::{Feed, Post};

/// Where the pager is in its load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagerPhase {
    /// Nothing loaded yet
    #[default]
    Empty,
    /// A request is in flight
    Loading,
    /// Last request succeeded
    Loaded,
    /// Last request failed; previously loaded posts are kept
    Error,
}

/// Snapshot of a feed as the presentation layer sees it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineState {
    /// Posts, newest first, in server order
    pub posts: Vec<Post>,
    /// Current phase
    pub phase: PagerPhase,
    /// The server returned an empty older page; no more pagination until refresh
    pub end_reached: bool,
    /// Error from the last request, if it failed
    pub error: Option<ApiError>,
}

impl TimelineState {
    /// Pagination cursor: id of the oldest post held
    pub fn cursor(&self) -> Option<&str> {
        self.posts.last().map(|post| post.id.as_str())
    }

    /// Whether a request is in flight
    pub fn is_loading(&self) -> bool {
        self.phase == PagerPhase::Loading
    }

    /// Whether `load_more` would issue a request right now
    pub fn can_load_more(&self) -> bool {
        !self.is_loading() && !self.end_reached && self.cursor().is_some()
    }
}

/// What a pager operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// `refresh` replaced the list with this many posts
    Replaced(usize),
    /// `load_more` appended this many posts
    Appended(usize),
    /// `load_more` got an empty page; pagination is now disabled
    EndReached,
    /// Nothing to do (already loading, no cursor, or end reached)
    Skipped,
    /// A later `refresh` took over; this result was dropped
    Superseded,
}

/// Pager over one feed
pub struct TimelinePager<S> {
    source: Arc<S>,
    feed: Feed,
    page_size: usize,
    state: watch::Sender<TimelineState>,
    generation: AtomicU64,
    cancel: Notify,
}

impl<S: FeedSource> TimelinePager<S> {
    /// Create an empty pager
    pub fn new(source: Arc<S>, feed: Feed, page_size: usize) -> Self {
        let (state, _) = watch::channel(TimelineState::default());
        Self {
            source,
            feed,
            page_size: page_size.max(1),
            state,
            generation: AtomicU64::new(0),
            cancel: Notify::new(),
        }
    }

    /// The feed this pager serves
    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<TimelineState> {
        self.state.subscribe()
    }

    /// Current state
    pub fn snapshot(&self) -> TimelineState {
        self.state.borrow().clone()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Load the newest page, replacing everything held.
    ///
    /// Cancels an in-flight `load_more` or earlier `refresh`. On failure the
    /// old posts stay and the error is both returned and stored in state.
    pub async fn refresh(&self) -> ApiResult<LoadOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.cancel.notify_waiters();
        let cancelled = self.cancel.notified();

        let mut previous = (PagerPhase::Empty, None);
        self.state.send_modify(|s| {
            previous = (s.phase, s.error.take());
            s.phase = PagerPhase::Loading;
        });
        let _guard = LoadingGuard::new(self, generation, previous);
        tracing::debug!(feed = %self.feed, generation, "refresh started");

        let fetch = self
            .source
            .fetch_page(&self.feed, PageRequest::first(self.page_size));
        let result = tokio::select! {
            biased;
            () = cancelled => {
                tracing::debug!(feed = %self.feed, generation, "refresh superseded");
                return Ok(LoadOutcome::Superseded);
            }
            result = fetch => result,
        };

        match result {
            Ok(page) => {
                let count = page.len();
                let applied = self.state.send_if_modified(|s| {
                    if !self.is_current(generation) {
                        return false;
                    }
                    s.posts = page;
                    s.phase = PagerPhase::Loaded;
                    s.end_reached = false;
                    s.error = None;
                    true
                });
                if !applied {
                    return Ok(LoadOutcome::Superseded);
                }
                tracing::debug!(feed = %self.feed, count, "refresh loaded");
                Ok(LoadOutcome::Replaced(count))
            }
            Err(e) => self.fail(generation, e),
        }
    }

    /// Append the page older than the last post held.
    ///
    /// No-op while a request is in flight, when nothing is loaded, or after
    /// the server returned an empty page.
    pub async fn load_more(&self) -> ApiResult<LoadOutcome> {
        let generation = self.generation.load(Ordering::SeqCst);
        let cancelled = self.cancel.notified();

        let mut cursor = None;
        let mut previous = (PagerPhase::Empty, None);
        self.state.send_if_modified(|s| {
            if !s.can_load_more() {
                return false;
            }
            cursor = s.cursor().map(str::to_string);
            previous = (s.phase, s.error.take());
            s.phase = PagerPhase::Loading;
            true
        });
        let Some(cursor) = cursor else {
            tracing::debug!(feed = %self.feed, "load_more skipped");
            return Ok(LoadOutcome::Skipped);
        };
        let _guard = LoadingGuard::new(self, generation, previous);
        tracing::debug!(feed = %self.feed, %cursor, "load_more started");

        let fetch = self
            .source
            .fetch_page(&self.feed, PageRequest::before(cursor, self.page_size));
        let result = tokio::select! {
            biased;
            () = cancelled => {
                tracing::debug!(feed = %self.feed, "load_more cancelled by refresh");
                return Ok(LoadOutcome::Superseded);
            }
            result = fetch => result,
        };

        match result {
            Ok(page) => {
                let count = page.len();
                let applied = self.state.send_if_modified(|s| {
                    if !self.is_current(generation) {
                        return false;
                    }
                    if page.is_empty() {
                        s.end_reached = true;
                    } else {
                        s.posts.extend(page);
                    }
                    s.phase = PagerPhase::Loaded;
                    true
                });
                if !applied {
                    return Ok(LoadOutcome::Superseded);
                }
                if count == 0 {
                    tracing::debug!(feed = %self.feed, "end of feed reached");
                    Ok(LoadOutcome::EndReached)
                } else {
                    tracing::debug!(feed = %self.feed, count, "load_more appended");
                    Ok(LoadOutcome::Appended(count))
                }
            }
            Err(e) => self.fail(generation, e),
        }
    }

    /// Record a failure, keeping the posts already held
    fn fail(&self, generation: u64, error: ApiError) -> ApiResult<LoadOutcome> {
        let applied = self.state.send_if_modified(|s| {
            if !self.is_current(generation) {
                return false;
            }
            s.phase = PagerPhase::Error;
            s.error = Some(error.clone());
            true
        });
        if !applied {
            return Ok(LoadOutcome::Superseded);
        }
        tracing::warn!(feed = %self.feed, "loading failed: {error}");
        Err(error)
    }
}

/// Puts the pager back where it was if a load is dropped before it lands.
///
/// Only acts while the load's generation is current and the phase is still
/// `Loading`; a completed, failed or superseded load leaves nothing to undo.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<TimelineState>,
    generation: &'a AtomicU64,
    started_at: u64,
    previous: Option<(PagerPhase, Option<ApiError>)>,
}

impl<'a> LoadingGuard<'a> {
    fn new<S>(
        pager: &'a TimelinePager<S>,
        started_at: u64,
        previous: (PagerPhase, Option<ApiError>),
    ) -> Self {
        Self {
            state: &pager.state,
            generation: &pager.generation,
            started_at,
            previous: Some(previous),
        }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let Some((phase, error)) = self.previous.take() else {
            return;
        };
        let restored = self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != self.started_at
                || s.phase != PagerPhase::Loading
            {
                return false;
            }
            // A refresh that replaced another refresh has no settled phase to return to
            s.phase = match phase {
                PagerPhase::Loading if s.posts.is_empty() => PagerPhase::Empty,
                PagerPhase::Loading => PagerPhase::Loaded,
                other => other,
            };
            s.error = error;
            true
        });
        if restored {
            tracing::debug!(phase = ?self.state.borrow().phase, "abandoned load rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    /// One scripted response, optionally held until the gate opens
    struct Step {
        result: ApiResult<Vec<Post>>,
        gate: Option<Arc<Notify>>,
    }

    impl Step {
        fn ok(posts: Vec<Post>) -> Self {
            Self {
                result: Ok(posts),
                gate: None,
            }
        }

        fn err(error: ApiError) -> Self {
            Self {
                result: Err(error),
                gate: None,
            }
        }

        fn gated(posts: Vec<Post>, gate: &Arc<Notify>) -> Self {
            Self {
                result: Ok(posts),
                gate: Some(Arc::clone(gate)),
            }
        }
    }

    #[derive(Default)]
    struct ScriptedFeed {
        steps: Mutex<VecDeque<Step>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl ScriptedFeed {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, index: usize) -> PageRequest {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    impl FeedSource for ScriptedFeed {
        async fn fetch_page(&self, _feed: &Feed, page: PageRequest) -> ApiResult<Vec<Post>> {
            self.requests.lock().unwrap().push(page);
            let step = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected fetch");
            if let Some(gate) = step.gate {
                gate.notified().await;
            }
            step.result
        }
    }

    fn posts(prefix: &str, count: usize) -> Vec<Post> {
        (0..count).map(|i| Post::new(format!("{prefix}{i}"))).collect()
    }

    fn page_ending_in(last: &str, count: usize) -> Vec<Post> {
        let mut page = posts("p", count - 1);
        page.push(Post::new(last));
        page
    }

    fn pager(source: &Arc<ScriptedFeed>) -> Arc<TimelinePager<ScriptedFeed>> {
        Arc::new(TimelinePager::new(Arc::clone(source), Feed::Timeline, 20))
    }

    async fn wait_for_calls(source: &ScriptedFeed, calls: usize) {
        for _ in 0..100 {
            if source.calls() >= calls {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {calls} fetches, saw {}", source.calls());
    }

    #[tokio::test]
    async fn test_starts_empty() {
        let source = ScriptedFeed::new(vec![]);
        let pager = pager(&source);
        let state = pager.snapshot();
        assert_eq!(state.phase, PagerPhase::Empty);
        assert_eq!(state.cursor(), None);
        assert_eq!(assert_ok!(pager.load_more().await), LoadOutcome::Skipped);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_sets_cursor_to_last_post() {
        let source = ScriptedFeed::new(vec![Step::ok(page_ending_in("abc", 20))]);
        let pager = pager(&source);

        assert_eq!(assert_ok!(pager.refresh().await), LoadOutcome::Replaced(20));
        let state = pager.snapshot();
        assert_eq!(state.phase, PagerPhase::Loaded);
        assert_eq!(state.cursor(), Some("abc"));
        assert_eq!(source.request(0), PageRequest::first(20));
    }

    #[tokio::test]
    async fn test_empty_refresh_clears_cursor() {
        let source = ScriptedFeed::new(vec![
            Step::ok(posts("a", 3)),
            Step::ok(Vec::new()),
        ]);
        let pager = pager(&source);

        assert_ok!(pager.refresh().await);
        assert_eq!(assert_ok!(pager.refresh().await), LoadOutcome::Replaced(0));
        let state = pager.snapshot();
        assert!(state.posts.is_empty());
        assert_eq!(state.cursor(), None);
        assert_eq!(assert_ok!(pager.load_more().await), LoadOutcome::Skipped);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_load_more_appends_older_page() {
        let source = ScriptedFeed::new(vec![
            Step::ok(page_ending_in("abc", 20)),
            Step::ok(page_ending_in("xyz", 5)),
        ]);
        let pager = pager(&source);

        assert_ok!(pager.refresh().await);
        assert_eq!(assert_ok!(pager.load_more().await), LoadOutcome::Appended(5));

        let state = pager.snapshot();
        assert_eq!(state.posts.len(), 25);
        assert_eq!(state.cursor(), Some("xyz"));
        assert_eq!(source.request(1), PageRequest::before("abc", 20));
    }

    #[tokio::test]
    async fn test_load_more_is_append_only() {
        let source = ScriptedFeed::new(vec![
            Step::ok(posts("a", 20)),
            Step::ok(posts("b", 20)),
            Step::ok(posts("c", 7)),
            Step::ok(posts("d", 1)),
        ]);
        let pager = pager(&source);
        assert_ok!(pager.refresh().await);

        let mut previous = pager.snapshot().posts;
        for _ in 0..3 {
            assert_ok!(pager.load_more().await);
            let current = pager.snapshot().posts;
            assert!(current.len() >= previous.len());
            assert_eq!(&current[..previous.len()], previous.as_slice());
            assert_eq!(pager.snapshot().cursor(), current.last().map(|p| p.id.as_str()));
            previous = current;
        }
        assert_eq!(previous.len(), 48);
    }

    #[tokio::test]
    async fn test_empty_page_disables_load_more_until_refresh() {
        let source = ScriptedFeed::new(vec![
            Step::ok(posts("a", 20)),
            Step::ok(Vec::new()),
            Step::ok(posts("n", 3)),
            Step::ok(posts("o", 2)),
        ]);
        let pager = pager(&source);
        assert_ok!(pager.refresh().await);

        assert_eq!(assert_ok!(pager.load_more().await), LoadOutcome::EndReached);
        let state = pager.snapshot();
        assert_eq!(state.posts.len(), 20);
        assert!(state.end_reached);
        assert_eq!(state.phase, PagerPhase::Loaded);
        assert_eq!(state.error, None);

        assert_eq!(assert_ok!(pager.load_more().await), LoadOutcome::Skipped);
        assert_eq!(source.calls(), 2);

        assert_eq!(assert_ok!(pager.refresh().await), LoadOutcome::Replaced(3));
        assert!(!pager.snapshot().end_reached);
        assert_eq!(assert_ok!(pager.load_more().await), LoadOutcome::Appended(2));
    }

    #[tokio::test]
    async fn test_load_more_while_loading_is_noop() {
        let gate = Arc::new(Notify::new());
        let source = ScriptedFeed::new(vec![
            Step::ok(posts("a", 20)),
            Step::gated(posts("b", 5), &gate),
        ]);
        let pager = pager(&source);
        assert_ok!(pager.refresh().await);

        let background = Arc::clone(&pager);
        let in_flight = tokio::spawn(async move { background.load_more().await });
        wait_for_calls(&source, 2).await;

        let before = pager.snapshot();
        assert!(before.is_loading());
        assert_eq!(assert_ok!(pager.load_more().await), LoadOutcome::Skipped);
        assert_eq!(source.calls(), 2);
        assert_eq!(pager.snapshot(), before);

        gate.notify_one();
        let outcome = assert_ok!(in_flight.await.unwrap());
        assert_eq!(outcome, LoadOutcome::Appended(5));
        assert_eq!(pager.snapshot().posts.len(), 25);
    }

    #[tokio::test]
    async fn test_refresh_supersedes_load_more() {
        let gate = Arc::new(Notify::new());
        let source = ScriptedFeed::new(vec![
            Step::ok(posts("old", 20)),
            Step::gated(posts("older", 5), &gate),
            Step::ok(posts("fresh", 10)),
        ]);
        let pager = pager(&source);
        assert_ok!(pager.refresh().await);

        let background = Arc::clone(&pager);
        let in_flight = tokio::spawn(async move { background.load_more().await });
        wait_for_calls(&source, 2).await;

        assert_eq!(assert_ok!(pager.refresh().await), LoadOutcome::Replaced(10));
        let outcome = assert_ok!(in_flight.await.unwrap());
        assert_eq!(outcome, LoadOutcome::Superseded);

        let state = pager.snapshot();
        assert_eq!(state.posts, posts("fresh", 10));
        assert_eq!(state.phase, PagerPhase::Loaded);
        assert_eq!(state.cursor(), Some("fresh9"));
    }

    #[tokio::test]
    async fn test_second_refresh_wins() {
        let gate = Arc::new(Notify::new());
        let source = ScriptedFeed::new(vec![
            Step::gated(posts("first", 4), &gate),
            Step::ok(posts("second", 2)),
        ]);
        let pager = pager(&source);

        let background = Arc::clone(&pager);
        let first = tokio::spawn(async move { background.refresh().await });
        wait_for_calls(&source, 1).await;

        assert_eq!(assert_ok!(pager.refresh().await), LoadOutcome::Replaced(2));
        assert_eq!(assert_ok!(first.await.unwrap()), LoadOutcome::Superseded);
        assert_eq!(pager.snapshot().posts, posts("second", 2));
    }

    #[tokio::test]
    async fn test_dropped_load_more_allows_retry() {
        let gate = Arc::new(Notify::new());
        let source = ScriptedFeed::new(vec![
            Step::ok(posts("a", 20)),
            Step::gated(posts("stalled", 5), &gate),
            Step::ok(posts("b", 5)),
        ]);
        let pager = pager(&source);
        assert_ok!(pager.refresh().await);

        let timed_out = tokio::time::timeout(Duration::from_millis(20), pager.load_more()).await;
        assert!(timed_out.is_err());

        let state = pager.snapshot();
        assert_eq!(state.phase, PagerPhase::Loaded);
        assert_eq!(state.posts.len(), 20);
        assert!(state.can_load_more());

        assert_eq!(assert_ok!(pager.load_more().await), LoadOutcome::Appended(5));
        assert_eq!(source.calls(), 3);
        assert_eq!(pager.snapshot().posts.len(), 25);
    }

    #[tokio::test]
    async fn test_dropped_load_more_restores_error() {
        let gate = Arc::new(Notify::new());
        let source = ScriptedFeed::new(vec![
            Step::ok(posts("a", 20)),
            Step::err(ApiError::Network("connection reset".into())),
            Step::gated(posts("stalled", 5), &gate),
        ]);
        let pager = pager(&source);
        assert_ok!(pager.refresh().await);
        assert_err!(pager.load_more().await);

        let timed_out = tokio::time::timeout(Duration::from_millis(20), pager.load_more()).await;
        assert!(timed_out.is_err());

        let state = pager.snapshot();
        assert_eq!(state.phase, PagerPhase::Error);
        assert_eq!(state.error, Some(ApiError::Network("connection reset".into())));
    }

    #[tokio::test]
    async fn test_dropped_first_refresh_returns_to_empty() {
        let gate = Arc::new(Notify::new());
        let source = ScriptedFeed::new(vec![
            Step::gated(posts("stalled", 3), &gate),
            Step::ok(posts("a", 3)),
        ]);
        let pager = pager(&source);

        let timed_out = tokio::time::timeout(Duration::from_millis(20), pager.refresh()).await;
        assert!(timed_out.is_err());
        assert_eq!(pager.snapshot(), TimelineState::default());

        assert_eq!(assert_ok!(pager.refresh().await), LoadOutcome::Replaced(3));
    }

    #[tokio::test]
    async fn test_aborted_refresh_after_superseded_one_settles() {
        let first_gate = Arc::new(Notify::new());
        let second_gate = Arc::new(Notify::new());
        let source = ScriptedFeed::new(vec![
            Step::ok(posts("a", 4)),
            Step::gated(posts("first", 2), &first_gate),
            Step::gated(posts("second", 2), &second_gate),
        ]);
        let pager = pager(&source);
        assert_ok!(pager.refresh().await);

        let background = Arc::clone(&pager);
        let first = tokio::spawn(async move { background.refresh().await });
        wait_for_calls(&source, 2).await;

        let background = Arc::clone(&pager);
        let second = tokio::spawn(async move { background.refresh().await });
        wait_for_calls(&source, 3).await;
        assert_eq!(assert_ok!(first.await.unwrap()), LoadOutcome::Superseded);

        second.abort();
        assert!(second.await.unwrap_err().is_cancelled());

        let state = pager.snapshot();
        assert_eq!(state.phase, PagerPhase::Loaded);
        assert_eq!(state.posts, posts("a", 4));
        assert!(state.can_load_more());
    }

    #[tokio::test]
    async fn test_load_more_error_keeps_posts() {
        let source = ScriptedFeed::new(vec![
            Step::ok(posts("a", 20)),
            Step::err(ApiError::Network("connection reset".into())),
            Step::ok(posts("b", 5)),
        ]);
        let pager = pager(&source);
        assert_ok!(pager.refresh().await);

        let err = assert_err!(pager.load_more().await);
        assert_eq!(err, ApiError::Network("connection reset".into()));

        let state = pager.snapshot();
        assert_eq!(state.phase, PagerPhase::Error);
        assert_eq!(state.posts.len(), 20);
        assert_eq!(state.error, Some(err));

        // Not retried automatically, but the user can try again
        assert_eq!(assert_ok!(pager.load_more().await), LoadOutcome::Appended(5));
        assert_eq!(pager.snapshot().error, None);
    }

    #[tokio::test]
    async fn test_refresh_error_keeps_stale_posts() {
        let source = ScriptedFeed::new(vec![
            Step::ok(posts("a", 20)),
            Step::err(ApiError::Auth("expired".into())),
        ]);
        let pager = pager(&source);
        assert_ok!(pager.refresh().await);

        let err = assert_err!(pager.refresh().await);
        assert!(err.is_auth());
        let state = pager.snapshot();
        assert_eq!(state.phase, PagerPhase::Error);
        assert_eq!(state.posts, posts("a", 20));
        assert_eq!(state.cursor(), Some("a19"));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let source = ScriptedFeed::new(vec![Step::ok(posts("a", 3))]);
        let pager = pager(&source);
        let mut rx = pager.subscribe();

        assert_ok!(pager.refresh().await);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().posts.len(), 3);
    }
}
