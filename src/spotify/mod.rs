//! # Spotify Integration Module
//!
//! Knowledge about the Spotify Web API lives here: which endpoint serves which
//! collection, how its paging works and how its records map onto the crate's
//! [`ArtistRecord`](crate::types::ArtistRecord) and
//! [`AlbumRecord`](crate::types::AlbumRecord). Nothing in this module performs
//! I/O. Every collection is exposed as a [`PageSource`](crate::sync::PageSource)
//! that the sync engine drives through its worker pool.
//!
//! ## Architecture
//!
//! ```text
//! Sync Orchestrator
//!          ↓
//! Spotify Page Sources
//!     ├── Artist Discovery (followed, saved tracks, saved albums)
//!     └── Releases (artist albums, album details)
//!          ↓
//! Paginator → Worker Pool → Fetch Client → Spotify Web API
//! ```
//!
//! ## Paging
//!
//! Spotify uses two paging schemes:
//!
//! - **Cursor paging** - `GET /me/following` returns `cursors.after`, which is
//!   used verbatim as the next cursor
//! - **Offset paging** - every other list endpoint returns `offset` and a
//!   `next` URL; the next cursor is the offset of the following page
//!
//! In both schemes a missing `next` marks the last page.
//!
//! ## API Coverage
//!
//! - `GET /me/following?type=artist` - followed artists
//! - `GET /me/tracks` - saved tracks, artists derived from their credits
//! - `GET /me/albums` - saved albums, artists derived from their credits
//! - `GET /artists/{id}/albums` - an artist's releases filtered by `include_groups`
//! - `GET /albums?ids=` - album details for up to 20 albums

pub mod artists;
pub mod releases;

use crate::types::OffsetPaging;
use crate::sync::Page;

/// Maximum page size Spotify accepts on list endpoints.
pub const MAX_PAGE_LIMIT: u32 = 50;

/// Offset pages: the cursor is the offset of the next page.
pub(crate) fn offset_page(paging: OffsetPaging) -> Page {
    let next_cursor = match paging.next {
        Some(_) if !paging.items.is_empty() => {
            Some((paging.offset + paging.items.len() as u64).to_string())
        }
        _ => None,
    };

    Page {
        items: paging.items,
        next_cursor,
        total: paging.total,
    }
}
