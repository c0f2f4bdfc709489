use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use tracing::warn;

// Spotify wire types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub scope: String,
    pub expires_in: u64,
    pub obtained_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowedArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifiedArtist {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowedArtistsResponse {
    pub artists: CursorPaging,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CursorPaging {
    pub items: Vec<serde_json::Value>,
    pub next: Option<String>,
    pub cursors: Option<Cursors>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cursors {
    pub after: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OffsetPaging {
    pub items: Vec<serde_json::Value>,
    pub next: Option<String>,
    #[serde(default)]
    pub offset: u64,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavedTrack {
    pub track: TrackObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackObject {
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavedAlbum {
    pub album: AlbumObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumObject {
    pub id: String,
    pub name: String,
    pub release_date: String,
    #[serde(default)]
    pub release_date_precision: String,
    #[serde(default)]
    pub album_type: Option<String>,
    #[serde(default)]
    pub album_group: Option<String>,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeveralAlbumsResponse {
    pub albums: Vec<Option<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumDetails {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

// Domain records

/// Collection an artist is discovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtistSource {
    Followed,
    SavedTracks,
    SavedAlbums,
}

impl fmt::Display for ArtistSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtistSource::Followed => "followed",
            ArtistSource::SavedTracks => "saved-tracks",
            ArtistSource::SavedAlbums => "saved-albums",
        };
        f.write_str(name)
    }
}

impl FromStr for ArtistSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "followed" => Ok(ArtistSource::Followed),
            "saved-tracks" | "tracks" => Ok(ArtistSource::SavedTracks),
            "saved-albums" | "albums" => Ok(ArtistSource::SavedAlbums),
            other => Err(format!(
                "unknown artist source '{}', expected followed, saved-tracks or saved-albums",
                other
            )),
        }
    }
}

/// Which collections an artist was found in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistOrigins {
    pub followed: bool,
    pub saved_tracks: bool,
    pub saved_albums: bool,
}

impl ArtistOrigins {
    pub fn from_source(source: ArtistSource) -> Self {
        let mut origins = Self::default();
        match source {
            ArtistSource::Followed => origins.followed = true,
            ArtistSource::SavedTracks => origins.saved_tracks = true,
            ArtistSource::SavedAlbums => origins.saved_albums = true,
        }
        origins
    }

    pub fn merge(&mut self, other: ArtistOrigins) {
        self.followed |= other.followed;
        self.saved_tracks |= other.saved_tracks;
        self.saved_albums |= other.saved_albums;
    }

    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.followed {
            labels.push("followed");
        }
        if self.saved_tracks {
            labels.push("saved-tracks");
        }
        if self.saved_albums {
            labels.push("saved-albums");
        }
        labels
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub id: String,
    pub name: String,
    pub origins: ArtistOrigins,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl ArtistRecord {
    /// Unions `other` into this record. Names and genres already present win.
    pub fn merge(&mut self, other: ArtistRecord) {
        self.origins.merge(other.origins);
        if self.genres.is_empty() {
            self.genres = other.genres;
        }
        if self.name.is_empty() {
            self.name = other.name;
        }
    }
}

/// Relation of an album to the artist it was listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlbumGroup {
    Album,
    Single,
    Compilation,
    AppearsOn,
}

impl AlbumGroup {
    pub const ALL: [AlbumGroup; 4] = [
        AlbumGroup::Album,
        AlbumGroup::Single,
        AlbumGroup::Compilation,
        AlbumGroup::AppearsOn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumGroup::Album => "album",
            AlbumGroup::Single => "single",
            AlbumGroup::Compilation => "compilation",
            AlbumGroup::AppearsOn => "appears_on",
        }
    }
}

impl fmt::Display for AlbumGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlbumGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "album" => Ok(AlbumGroup::Album),
            "single" => Ok(AlbumGroup::Single),
            "compilation" => Ok(AlbumGroup::Compilation),
            "appears_on" => Ok(AlbumGroup::AppearsOn),
            other => Err(format!("unknown release type '{}'", other)),
        }
    }
}

/// Set of album groups requested from the artist albums endpoint.
///
/// Formats as the comma separated `include_groups` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseKinds(Vec<AlbumGroup>);

impl ReleaseKinds {
    pub fn new(kinds: impl IntoIterator<Item = AlbumGroup>) -> Self {
        let mut kinds: Vec<AlbumGroup> = kinds.into_iter().collect();
        kinds.sort();
        kinds.dedup();
        Self(kinds)
    }

    pub fn all() -> Self {
        Self::new(AlbumGroup::ALL)
    }

    pub fn kinds(&self) -> &[AlbumGroup] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ReleaseKinds {
    fn default() -> Self {
        Self::new([AlbumGroup::Album, AlbumGroup::Single])
    }
}

impl fmt::Display for ReleaseKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(AlbumGroup::as_str)
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

impl FromStr for ReleaseKinds {
    type Err = String;

    /// Parses `album,single` style lists; `all` selects every group.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut kinds = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part.eq_ignore_ascii_case("all") {
                return Ok(Self::all());
            }
            kinds.push(part.parse::<AlbumGroup>()?);
        }
        if kinds.is_empty() {
            return Err("at least one release type is required".to_string());
        }
        Ok(Self::new(kinds))
    }
}

/// Metadata only available from the album details endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumExtra {
    pub label: Option<String>,
    pub popularity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub id: String,
    /// Artist whose release listing produced this record.
    pub artist_id: String,
    pub name: String,
    pub release_date: String,
    pub release_date_precision: String,
    pub album_group: AlbumGroup,
    /// Names of all credited artists, in API order.
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub extra: Option<AlbumExtra>,
}

impl AlbumRecord {
    /// Release date when the API reports it with day precision.
    pub fn release_day(&self) -> Option<NaiveDate> {
        if self.release_date_precision != "day" {
            return None;
        }
        NaiveDate::parse_from_str(&self.release_date, "%Y-%m-%d").ok()
    }
}

/// An artist whose releases could not be fetched completely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistFailure {
    pub artist_id: String,
    pub artist_name: String,
    /// Cursor of the page that failed, `None` for the first page.
    pub cursor: Option<String>,
    pub reason: String,
}

/// Complete result of one synchronization pass.
///
/// A snapshot is only ever built once a pass has finished, so holders can
/// rely on it being consistent: album ids are unique and every album points
/// at an artist contained in the same snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    synced_at: DateTime<Utc>,
    artists: BTreeMap<String, ArtistRecord>,
    albums: BTreeMap<String, AlbumRecord>,
    failures: Vec<ArtistFailure>,
}

impl SyncSnapshot {
    /// Assembles a snapshot, dropping albums whose artist is not part of it.
    pub fn from_parts(
        synced_at: DateTime<Utc>,
        artists: BTreeMap<String, ArtistRecord>,
        mut albums: BTreeMap<String, AlbumRecord>,
        failures: Vec<ArtistFailure>,
    ) -> Self {
        albums.retain(|id, album| {
            let known = artists.contains_key(&album.artist_id);
            if !known {
                warn!(album = %id, artist = %album.artist_id, "dropping album of unknown artist");
            }
            known
        });

        Self {
            synced_at,
            artists,
            albums,
            failures,
        }
    }

    pub fn synced_at(&self) -> DateTime<Utc> {
        self.synced_at
    }

    pub fn artists(&self) -> impl Iterator<Item = &ArtistRecord> {
        self.artists.values()
    }

    pub fn artist(&self, id: &str) -> Option<&ArtistRecord> {
        self.artists.get(id)
    }

    pub fn albums(&self) -> impl Iterator<Item = &AlbumRecord> {
        self.albums.values()
    }

    pub fn album(&self, id: &str) -> Option<&AlbumRecord> {
        self.albums.get(id)
    }

    pub fn albums_of<'a>(&'a self, artist_id: &'a str) -> impl Iterator<Item = &'a AlbumRecord> {
        self.albums.values().filter(move |a| a.artist_id == artist_id)
    }

    pub fn failures(&self) -> &[ArtistFailure] {
        &self.failures
    }

    pub fn artist_count(&self) -> usize {
        self.artists.len()
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }
}

// Table rows

#[derive(Tabled)]
pub struct ArtistTableRow {
    pub name: String,
    pub origins: String,
    pub genres: String,
}

#[derive(Tabled)]
pub struct ReleaseTableRow {
    pub date: String,
    pub name: String,
    pub artists: String,
    pub group: String,
}

#[derive(Tabled)]
pub struct FailureTableRow {
    pub artist: String,
    pub cursor: String,
    pub reason: String,
}

/// Saturday-to-Friday window releases are grouped by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseWeek {
    pub year: i32,
    pub week: u32,
    pub dates: Vec<NaiveDate>,
}
