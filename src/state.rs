use std::sync::Arc;

use crate::auth::IdentityProvider;
use crate::cache::PageCache;
use crate::clock::Clock;
use crate::config::{AuthConfig, FeedConfig};
use crate::feed::FeedComposer;
use crate::store::Store;
use crate::subscriptions::SubscriptionManager;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub clock: Arc<dyn Clock>,
    pub feeds: FeedComposer,
    pub subscriptions: SubscriptionManager,
    /// Rendered global feed pages.
    pub index_cache: PageCache,
    pub login_url: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        feed: &FeedConfig,
        auth: &AuthConfig,
    ) -> Self {
        let subscriptions = SubscriptionManager::new(store.clone(), clock.clone());
        let feeds = FeedComposer::new(store.clone(), subscriptions.clone(), feed.page_size);
        let index_cache = PageCache::new(feed.index_cache_ttl, clock.clone());

        AppState {
            store,
            identity,
            clock,
            feeds,
            subscriptions,
            index_cache,
            login_url: Arc::from(auth.login_url.as_str()),
        }
    }
}
