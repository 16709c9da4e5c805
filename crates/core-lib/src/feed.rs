// ============================
// crates/core-lib/src/feed.rs
// ============================
//! Feed engine.
//!
//! A viewer's feed holds every micropost that is authored by the viewer,
//! authored by someone the viewer follows, or mentions the viewer's nickname.
//! The three conditions are one predicate, so a post that satisfies several of
//! them still appears once. Mentions compare handles without regard to ASCII
//! case, the same way nickname lookup does.
//!
//! Pages are keyed by the [`FeedCursor`] of the last item already seen, so a
//! post created while a feed is being read never shifts later pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use futures_util::{stream, Stream, TryStreamExt};
use metrics::counter;
use microfeed_common::{Micropost, MicropostId, UserId};
use regex::Regex;
use tracing::debug;

use crate::error::AppError;
use crate::metrics::FEED_COMPUTED;
use crate::storage::Store;

/// Items fetched per round trip when none is configured
pub const DEFAULT_PAGE_SIZE: usize = 30;

// `@handle` at the start of the text or after a non-word character
static MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^A-Za-z0-9_@])@([A-Za-z0-9_]+)").unwrap());

/// Position in a feed: the [`Micropost::recency_key`] of the last item read
pub type FeedCursor = (DateTime<Utc>, MicropostId);

/// Handles mentioned in a micropost body, in order of appearance
pub fn mentions(body: &str) -> impl Iterator<Item = &str> {
    MENTION_REGEX
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

/// Resolved feed membership rule for one viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub viewer_id: UserId,
    pub followed_ids: HashSet<UserId>,
    pub handle: String,
}

impl FeedQuery {
    /// Whether `post` belongs in the viewer's feed
    pub fn matches(&self, post: &Micropost) -> bool {
        post.author_id == self.viewer_id
            || self.followed_ids.contains(&post.author_id)
            || mentions(&post.body).any(|handle| handle.eq_ignore_ascii_case(&self.handle))
    }
}

/// A viewer's feed. Nothing is fetched until a page is requested, and each
/// call queries the store again.
pub struct Feed<'s, S: Store + ?Sized> {
    store: &'s S,
    query: FeedQuery,
    page_size: usize,
}

impl<'s, S: Store + ?Sized> Feed<'s, S> {
    /// The membership rule this feed evaluates
    pub fn query(&self) -> &FeedQuery {
        &self.query
    }

    /// Fetch up to `limit` items older than `after`, newest first.
    /// `None` starts from the newest post.
    pub async fn page(
        &self,
        after: Option<FeedCursor>,
        limit: usize,
    ) -> Result<Vec<Micropost>, AppError> {
        self.store.feed_page(&self.query, after, limit).await
    }

    /// Stream the whole feed lazily, one page per store round trip
    pub fn stream(&self) -> impl Stream<Item = Result<Micropost, AppError>> + 's {
        let store = self.store;
        let query = self.query.clone();
        let page_size = self.page_size;
        stream::try_unfold(PageState::Start, move |state| {
            let query = query.clone();
            async move {
                let after = match state {
                    PageState::Start => None,
                    PageState::After(cursor) => Some(cursor),
                    PageState::Done => return Ok::<_, AppError>(None),
                };
                let page = store.feed_page(&query, after, page_size).await?;
                let Some(last) = page.last() else {
                    return Ok(None);
                };
                let next = if page.len() == page_size {
                    PageState::After(last.recency_key())
                } else {
                    PageState::Done
                };
                Ok(Some((page, next)))
            }
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<Micropost, AppError>)))
        .try_flatten()
    }

    /// Materialize the whole feed
    pub async fn collect(&self) -> Result<Vec<Micropost>, AppError> {
        self.stream().try_collect().await
    }
}

enum PageState {
    Start,
    After(FeedCursor),
    Done,
}

/// Build the feed of `viewer_id`. Unknown viewers are an error, not an empty feed.
pub async fn feed_for<S: Store + ?Sized>(
    store: &S,
    viewer_id: UserId,
) -> Result<Feed<'_, S>, AppError> {
    feed_for_with_page_size(store, viewer_id, DEFAULT_PAGE_SIZE).await
}

/// [`feed_for`] with an explicit page size for [`Feed::stream`]
pub async fn feed_for_with_page_size<S: Store + ?Sized>(
    store: &S,
    viewer_id: UserId,
    page_size: usize,
) -> Result<Feed<'_, S>, AppError> {
    let viewer = store
        .find_user(viewer_id)
        .await?
        .ok_or(AppError::InvalidViewer(viewer_id))?;

    let followed_ids: HashSet<UserId> = store.following_ids(viewer.id).await?.into_iter().collect();
    debug!(
        viewer = %viewer.id,
        following = followed_ids.len(),
        "feed query resolved"
    );
    counter!(FEED_COMPUTED).increment(1);

    Ok(Feed {
        store,
        query: FeedQuery {
            viewer_id: viewer.id,
            followed_ids,
            handle: viewer.nickname,
        },
        page_size: page_size.max(1),
    })
}
