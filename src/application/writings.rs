//! Listing and detail lookups for writings, with the listing cached in memory.

use std::{num::NonZeroU32, sync::Arc};

use metrics::histogram;
use tokio::time::Instant;
use tracing::debug;

use crate::application::content::{ContentError, ContentSource};
use crate::cache::{CacheConfig, InFlight, PostsPageKey, TtlStore};
use crate::domain::posts::{Post, PostsPage};

const METRIC_CONTENT_FETCH_MS: &str = "vicky_content_fetch_ms";

/// Memoizes listing pages per (page, page size) for a fixed TTL.
///
/// The store lock is never held across the network call. Without single-flight,
/// concurrent misses for one key may each hit the source; the last writer wins.
pub struct PostsCache {
    source: Arc<dyn ContentSource>,
    store: TtlStore<PostsPageKey, Arc<PostsPage>>,
    in_flight: Option<InFlight<PostsPageKey>>,
}

impl PostsCache {
    pub fn new(source: Arc<dyn ContentSource>, config: &CacheConfig) -> Self {
        Self {
            source,
            store: TtlStore::new("posts", config.ttl),
            in_flight: config.single_flight.then(InFlight::new),
        }
    }

    /// Return a fresh cached page or fetch and store it. Failures are not cached.
    pub async fn fetch(&self, page: u32, per_page: u32) -> Result<Arc<PostsPage>, ContentError> {
        let key = PostsPageKey::new(page, per_page);

        if let Some(hit) = self.store.get(&key) {
            debug!(key = %key, outcome = "hit", "posts cache lookup");
            return Ok(hit);
        }

        let _flight = match &self.in_flight {
            Some(in_flight) => {
                let guard = in_flight.acquire(key).await;
                // The miss was already counted above.
                if let Some(hit) = self.store.peek(&key) {
                    debug!(key = %key, outcome = "hit_after_wait", "posts cache lookup");
                    return Ok(hit);
                }
                Some(guard)
            }
            None => None,
        };

        debug!(key = %key, outcome = "miss", "posts cache lookup");

        let started = Instant::now();
        let result = self.source.list_posts(page, per_page).await;
        histogram!(METRIC_CONTENT_FETCH_MS, "kind" => "list")
            .record(started.elapsed().as_secs_f64() * 1000.0);

        let fetched = Arc::new(result?);
        let expires_at = self.store.insert(key, Arc::clone(&fetched));
        debug!(
            key = %key,
            posts = fetched.posts.len(),
            ttl_secs = expires_at.saturating_duration_since(Instant::now()).as_secs(),
            "posts cache stored"
        );

        Ok(fetched)
    }

    /// Expiration instant of the stored entry for the key, fresh or not.
    pub fn expires_at(&self, page: u32, per_page: u32) -> Option<Instant> {
        self.store.expires_at(&PostsPageKey::new(page, per_page))
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Entry point used by the writings handlers.
pub struct WritingsService {
    source: Arc<dyn ContentSource>,
    cache: PostsCache,
    per_page: NonZeroU32,
}

impl WritingsService {
    pub fn new(source: Arc<dyn ContentSource>, cache: &CacheConfig, per_page: NonZeroU32) -> Self {
        Self {
            cache: PostsCache::new(Arc::clone(&source), cache),
            source,
            per_page,
        }
    }

    pub fn cache(&self) -> &PostsCache {
        &self.cache
    }

    /// One listing page at the configured page size, served from cache when fresh.
    pub async fn list(&self, page: u32) -> Result<Arc<PostsPage>, ContentError> {
        self.cache.fetch(page.max(1), self.per_page.get()).await
    }

    /// Uncached lookup of a single post. An empty slug is absent without a fetch.
    pub async fn post(&self, slug: &str) -> Result<Option<Post>, ContentError> {
        if slug.is_empty() {
            return Ok(None);
        }

        let started = Instant::now();
        let result = self.source.find_post_by_slug(slug).await;
        histogram!(METRIC_CONTENT_FETCH_MS, "kind" => "detail")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
    use tokio::sync::Barrier;

    use super::*;
    use crate::cache::{METRIC_CACHE_HIT, METRIC_CACHE_MISS};

    const TTL: Duration = Duration::from_secs(10 * 60 * 60);

    #[derive(Default)]
    struct CountingSource {
        list_calls: AtomicUsize,
        slug_calls: AtomicUsize,
        fail_lists: AtomicUsize,
        barrier: Option<Barrier>,
        delay: Option<Duration>,
    }

    impl CountingSource {
        fn lists(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentSource for CountingSource {
        async fn list_posts(&self, page: u32, per_page: u32) -> Result<PostsPage, ContentError> {
            let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_lists.load(Ordering::SeqCst) > 0 {
                self.fail_lists.fetch_sub(1, Ordering::SeqCst);
                return Err(ContentError::transport("connection refused"));
            }
            Ok(PostsPage {
                posts: vec![Post {
                    title_html: format!("Post {call}"),
                    slug: format!("post-{page}-{call}"),
                    date: "2024-01-01T00:00:00".to_string(),
                    content_html: "<p>body</p>".to_string(),
                }],
                page,
                per_page,
                total: 120,
                total_pages: 3,
            })
        }

        async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, ContentError> {
            self.slug_calls.fetch_add(1, Ordering::SeqCst);
            Ok((slug == "hello").then(|| Post {
                title_html: "Hello".to_string(),
                slug: slug.to_string(),
                date: "2024-01-01T00:00:00".to_string(),
                content_html: "<p>hi</p>".to_string(),
            }))
        }
    }

    fn config(single_flight: bool) -> CacheConfig {
        CacheConfig {
            ttl: TTL,
            single_flight,
        }
    }

    fn per_page() -> NonZeroU32 {
        NonZeroU32::new(50).expect("non-zero")
    }

    #[tokio::test(start_paused = true)]
    async fn second_fetch_within_ttl_is_served_from_cache() {
        let source = Arc::new(CountingSource::default());
        let cache = PostsCache::new(source.clone(), &config(false));

        let first = cache.fetch(1, 50).await.expect("first fetch");
        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        let second = cache.fetch(1, 50).await.expect("second fetch");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.lists(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_triggers_exactly_one_refetch() {
        let source = Arc::new(CountingSource::default());
        let cache = PostsCache::new(source.clone(), &config(false));

        let first = cache.fetch(2, 50).await.expect("first fetch");
        let first_expiry = cache.expires_at(2, 50).expect("stored");

        tokio::time::advance(TTL).await;
        let refreshed = cache.fetch(2, 50).await.expect("refetch");
        let again = cache.fetch(2, 50).await.expect("cached refetch");

        assert_eq!(source.lists(), 2);
        assert!(!Arc::ptr_eq(&first, &refreshed));
        assert!(Arc::ptr_eq(&refreshed, &again));
        assert!(cache.expires_at(2, 50).expect("stored") > first_expiry);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn keys_are_distinct_per_page_and_size() {
        let source = Arc::new(CountingSource::default());
        let cache = PostsCache::new(source.clone(), &config(false));

        cache.fetch(1, 50).await.expect("page 1");
        cache.fetch(2, 50).await.expect("page 2");
        cache.fetch(1, 10).await.expect("page 1, size 10");
        cache.fetch(1, 50).await.expect("page 1 again");

        assert_eq!(source.lists(), 3);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let source = Arc::new(CountingSource::default());
        source.fail_lists.store(1, Ordering::SeqCst);
        let cache = PostsCache::new(source.clone(), &config(false));

        let err = cache.fetch(1, 50).await.expect_err("first fetch fails");
        assert!(matches!(err, ContentError::Transport(_)));
        assert!(cache.is_empty());

        cache.fetch(1, 50).await.expect("retry succeeds");
        assert_eq!(source.lists(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_may_each_fetch() {
        // Both fetches must be in flight at once to pass the barrier.
        let source = Arc::new(CountingSource {
            barrier: Some(Barrier::new(2)),
            ..Default::default()
        });
        let cache = Arc::new(PostsCache::new(source.clone(), &config(false)));

        let (a, b) = tokio::join!(cache.fetch(1, 50), cache.fetch(1, 50));
        a.expect("first");
        b.expect("second");

        assert_eq!(source.lists(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_flight_collapses_concurrent_misses() {
        let source = Arc::new(CountingSource {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let cache = Arc::new(PostsCache::new(source.clone(), &config(true)));

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move { cache.fetch(1, 50).await }));
        }
        let mut pages = Vec::new();
        for task in tasks {
            pages.push(task.await.expect("join").expect("fetch"));
        }

        assert_eq!(source.lists(), 1);
        assert!(pages.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[tokio::test(start_paused = true)]
    async fn single_flight_waiter_retries_after_failed_leader() {
        let source = Arc::new(CountingSource {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        source.fail_lists.store(1, Ordering::SeqCst);
        let cache = Arc::new(PostsCache::new(source.clone(), &config(true)));

        let leader = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.fetch(1, 50).await })
        };
        tokio::task::yield_now().await;
        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.fetch(1, 50).await })
        };

        let outcomes = [
            leader.await.expect("join leader").is_ok(),
            waiter.await.expect("join waiter").is_ok(),
        ];

        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(source.lists(), 2);
        assert_eq!(cache.len(), 1);
    }

    fn lookup_counts(snapshotter: &Snapshotter) -> (u64, u64) {
        let mut hits = 0;
        let mut misses = 0;
        for (key, _, _, value) in snapshotter.snapshot().into_vec() {
            if let DebugValue::Counter(count) = value {
                match key.key().name() {
                    METRIC_CACHE_HIT => hits += count,
                    METRIC_CACHE_MISS => misses += count,
                    _ => {}
                }
            }
        }
        (hits, misses)
    }

    #[test]
    fn single_flight_counts_each_lookup_once() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .expect("runtime");

        let source = Arc::new(CountingSource {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let cache = Arc::new(PostsCache::new(source.clone(), &config(true)));

        metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                cache.fetch(1, 50).await.expect("leader fetch");
            })
        });
        assert_eq!(lookup_counts(&snapshotter), (0, 1));

        metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                cache.fetch(1, 50).await.expect("cached fetch");
            })
        });
        assert_eq!(lookup_counts(&snapshotter), (1, 0));

        // A waiter that finds the leader's value after the guard is not a second miss.
        metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let (first, second) = tokio::join!(cache.fetch(2, 50), cache.fetch(2, 50));
                first.expect("first");
                second.expect("second");
            })
        });
        assert_eq!(lookup_counts(&snapshotter), (0, 2));
        assert_eq!(source.lists(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mixed_access_stays_consistent() {
        let source = Arc::new(CountingSource::default());
        let cache = Arc::new(PostsCache::new(source.clone(), &config(false)));

        let mut tasks = Vec::new();
        for i in 0..200_u32 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move {
                let page = i % 4 + 1;
                let fetched = cache.fetch(page, 50).await.expect("fetch");
                assert_eq!(fetched.page, page);
                assert_eq!(fetched.per_page, 50);
            }));
        }
        for task in tasks {
            task.await.expect("task should finish");
        }

        assert_eq!(cache.len(), 4);
        assert!(source.lists() >= 4);
    }

    #[tokio::test]
    async fn list_clamps_page_and_uses_configured_size() {
        let source = Arc::new(CountingSource::default());
        let service = WritingsService::new(source.clone(), &config(false), per_page());

        let page = service.list(0).await.expect("list");
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 50);
    }

    #[tokio::test]
    async fn post_lookup_is_uncached() {
        let source = Arc::new(CountingSource::default());
        let service = WritingsService::new(source.clone(), &config(false), per_page());

        assert!(service.post("hello").await.expect("lookup").is_some());
        assert!(service.post("hello").await.expect("lookup").is_some());
        assert!(service.post("nonexistent").await.expect("lookup").is_none());
        assert_eq!(source.slug_calls.load(Ordering::SeqCst), 3);
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn empty_slug_skips_the_source() {
        let source = Arc::new(CountingSource::default());
        let service = WritingsService::new(source.clone(), &config(false), per_page());

        assert!(service.post("").await.expect("lookup").is_none());
        assert_eq!(source.slug_calls.load(Ordering::SeqCst), 0);
    }
}
