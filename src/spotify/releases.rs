use std::sync::Arc;

use serde_json::Value;

use crate::{
    spotify::offset_page,
    sync::{Page, PageSource, RequestDescriptor},
    types::{
        AlbumDetails, AlbumExtra, AlbumGroup, AlbumObject, AlbumRecord, OffsetPaging,
        ReleaseKinds, SeveralAlbumsResponse,
    },
};

/// Spotify caps `GET /albums` at 20 ids per request.
pub const ALBUM_BATCH_SIZE: usize = 20;

/// `GET /artists/{id}/albums` restricted to `include_groups`, offset paged.
///
/// # Example
///
/// ```rust,ignore
/// let source = ArtistAlbums::new("4NHQUGzhtTLFvgF5SZesLK", &ReleaseKinds::default(), 50);
/// let request = source.request(None);
/// assert_eq!(request.path(), "/artists/4NHQUGzhtTLFvgF5SZesLK/albums");
/// ```
#[derive(Debug, Clone)]
pub struct ArtistAlbums {
    artist_id: String,
    include_groups: String,
    limit: u32,
}

impl ArtistAlbums {
    pub fn new(artist_id: impl Into<String>, release_types: &ReleaseKinds, limit: u32) -> Self {
        Self {
            artist_id: artist_id.into(),
            include_groups: release_types.to_string(),
            limit,
        }
    }
}

impl PageSource for ArtistAlbums {
    fn request(&self, cursor: Option<&str>) -> RequestDescriptor {
        RequestDescriptor::get(format!("/artists/{}/albums", self.artist_id))
            .query("include_groups", &self.include_groups)
            .query("limit", self.limit)
            .query("offset", cursor.unwrap_or("0"))
    }

    fn decode(&self, payload: Value) -> Result<Page, String> {
        let paging: OffsetPaging = serde_json::from_value(payload).map_err(|e| e.to_string())?;
        Ok(offset_page(paging))
    }
}

/// `GET /albums?ids=` for one batch of album ids. Always a single page.
#[derive(Debug, Clone)]
pub struct AlbumDetailsBatch {
    ids: Vec<String>,
}

impl AlbumDetailsBatch {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }
}

impl PageSource for AlbumDetailsBatch {
    fn request(&self, _cursor: Option<&str>) -> RequestDescriptor {
        RequestDescriptor::get("/albums").query("ids", self.ids.join(","))
    }

    fn decode(&self, payload: Value) -> Result<Page, String> {
        let res: SeveralAlbumsResponse =
            serde_json::from_value(payload).map_err(|e| e.to_string())?;

        // unknown ids come back as null entries
        Ok(Page {
            items: res.albums.into_iter().flatten().collect(),
            next_cursor: None,
            total: None,
        })
    }
}

pub fn artist_albums(
    artist_id: &str,
    release_types: &ReleaseKinds,
    limit: u32,
) -> Arc<dyn PageSource> {
    Arc::new(ArtistAlbums::new(artist_id, release_types, limit))
}

/// One page source per batch of at most [`ALBUM_BATCH_SIZE`] album ids.
pub fn album_details(ids: &[String]) -> Vec<Arc<dyn PageSource>> {
    ids.chunks(ALBUM_BATCH_SIZE)
        .map(|chunk| Arc::new(AlbumDetailsBatch::new(chunk.to_vec())) as Arc<dyn PageSource>)
        .collect()
}

/// Reads one raw artist-albums item as a record listed under `artist_id`.
///
/// `album_group` decides the group; when Spotify omits it, `album_type` is used
/// and unknown values fall back to [`AlbumGroup::Album`].
pub fn album_from_item(artist_id: &str, item: Value) -> Result<AlbumRecord, serde_json::Error> {
    let album: AlbumObject = serde_json::from_value(item)?;

    let album_group = album
        .album_group
        .as_deref()
        .or(album.album_type.as_deref())
        .and_then(|g| g.parse::<AlbumGroup>().ok())
        .unwrap_or(AlbumGroup::Album);

    Ok(AlbumRecord {
        id: album.id,
        artist_id: artist_id.to_string(),
        name: album.name,
        release_date: album.release_date,
        release_date_precision: album.release_date_precision,
        album_group,
        artists: album.artists.into_iter().map(|a| a.name).collect(),
        extra: None,
    })
}

/// Reads the lazily fetched metadata of one album details item.
pub fn album_extra_from_item(item: Value) -> Result<(String, AlbumExtra), serde_json::Error> {
    let details: AlbumDetails = serde_json::from_value(item)?;
    Ok((
        details.id,
        AlbumExtra {
            label: details.label,
            popularity: details.popularity,
        },
    ))
}
