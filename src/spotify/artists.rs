use std::sync::Arc;

use serde_json::Value;

use crate::{
    spotify::offset_page,
    sync::{Page, PageSource, RequestDescriptor},
    types::{
        ArtistOrigins, ArtistRecord, ArtistSource, FollowedArtist, FollowedArtistsResponse,
        OffsetPaging, SavedAlbum, SavedTrack, SimplifiedArtist,
    },
};

/// `GET /me/following?type=artist`, cursor paged on `after`.
#[derive(Debug, Clone)]
pub struct FollowedArtists {
    limit: u32,
}

impl FollowedArtists {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }
}

impl PageSource for FollowedArtists {
    fn request(&self, cursor: Option<&str>) -> RequestDescriptor {
        let request = RequestDescriptor::get("/me/following")
            .query("type", "artist")
            .query("limit", self.limit);
        match cursor {
            Some(after) => request.query("after", after),
            None => request,
        }
    }

    fn decode(&self, payload: Value) -> Result<Page, String> {
        let res: FollowedArtistsResponse =
            serde_json::from_value(payload).map_err(|e| e.to_string())?;
        let paging = res.artists;

        // the last page still carries a cursor, `next` is what tells them apart
        let next_cursor = match paging.next {
            Some(_) => paging.cursors.and_then(|c| c.after),
            None => None,
        };

        Ok(Page {
            items: paging.items,
            next_cursor,
            total: paging.total,
        })
    }
}

/// `GET /me/tracks`, offset paged.
#[derive(Debug, Clone)]
pub struct SavedTracks {
    limit: u32,
}

impl SavedTracks {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }
}

impl PageSource for SavedTracks {
    fn request(&self, cursor: Option<&str>) -> RequestDescriptor {
        RequestDescriptor::get("/me/tracks")
            .query("limit", self.limit)
            .query("offset", cursor.unwrap_or("0"))
    }

    fn decode(&self, payload: Value) -> Result<Page, String> {
        let paging: OffsetPaging = serde_json::from_value(payload).map_err(|e| e.to_string())?;
        Ok(offset_page(paging))
    }
}

/// `GET /me/albums`, offset paged.
#[derive(Debug, Clone)]
pub struct SavedAlbums {
    limit: u32,
}

impl SavedAlbums {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }
}

impl PageSource for SavedAlbums {
    fn request(&self, cursor: Option<&str>) -> RequestDescriptor {
        RequestDescriptor::get("/me/albums")
            .query("limit", self.limit)
            .query("offset", cursor.unwrap_or("0"))
    }

    fn decode(&self, payload: Value) -> Result<Page, String> {
        let paging: OffsetPaging = serde_json::from_value(payload).map_err(|e| e.to_string())?;
        Ok(offset_page(paging))
    }
}

/// Page source listing the artists of `source`.
pub fn page_source(source: ArtistSource, limit: u32) -> Arc<dyn PageSource> {
    match source {
        ArtistSource::Followed => Arc::new(FollowedArtists::new(limit)),
        ArtistSource::SavedTracks => Arc::new(SavedTracks::new(limit)),
        ArtistSource::SavedAlbums => Arc::new(SavedAlbums::new(limit)),
    }
}

/// Reads the artists contained in one raw item of `source`.
///
/// Followed artists yield exactly one record. Saved tracks and albums yield one
/// record per credited artist that has an id (local files have none).
pub fn artists_from_item(
    source: ArtistSource,
    item: Value,
) -> Result<Vec<ArtistRecord>, serde_json::Error> {
    let origins = ArtistOrigins::from_source(source);

    let credited = match source {
        ArtistSource::Followed => {
            let artist: FollowedArtist = serde_json::from_value(item)?;
            return Ok(vec![ArtistRecord {
                id: artist.id,
                name: artist.name,
                origins,
                genres: artist.genres,
            }]);
        }
        ArtistSource::SavedTracks => serde_json::from_value::<SavedTrack>(item)?.track.artists,
        ArtistSource::SavedAlbums => serde_json::from_value::<SavedAlbum>(item)?.album.artists,
    };

    Ok(credited
        .into_iter()
        .filter_map(|SimplifiedArtist { id, name }| {
            id.map(|id| ArtistRecord {
                id,
                name,
                origins,
                genres: Vec::new(),
            })
        })
        .collect())
}
