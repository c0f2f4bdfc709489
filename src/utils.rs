use std::cmp::Ordering;

use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};

use crate::types::{
    AlbumRecord, ArtistTableRow, FailureTableRow, ReleaseTableRow, ReleaseWeek, SyncSnapshot,
};

/// Upper bound for `weeks_before` in [`release_week_range`], about a century.
pub const MAX_WEEKS_BEFORE: u32 = 5200;

fn saturday_on_or_before(date: NaiveDate) -> NaiveDate {
    let weekday = date.weekday().num_days_from_sunday(); // Sunday=0, Saturday=6
    let days_to_subtract = (weekday + 1) % 7;
    date.checked_sub_days(Days::new(days_to_subtract as u64))
        .unwrap_or(date)
}

/// Release weeks run Saturday to Friday; week 1 is the one holding January 1st.
pub fn release_week_number(date: NaiveDate) -> u32 {
    let jan1 = NaiveDate::from_yo_opt(date.year(), 1).unwrap_or(date);
    let first_week_start = saturday_on_or_before(jan1);
    let current_week_start = saturday_on_or_before(date);
    let diff = current_week_start - first_week_start;
    (diff.num_days() / 7 + 1) as u32
}

pub fn build_week(date: NaiveDate) -> ReleaseWeek {
    let saturday = saturday_on_or_before(date);
    let dates = (0..7)
        .filter_map(|i| saturday.checked_add_days(Days::new(i)))
        .collect();

    ReleaseWeek {
        year: saturday.year(),
        week: release_week_number(saturday),
        dates,
    }
}

/// The `weeks_before + 1` most recent complete release weeks up to `date`.
///
/// The week `date` falls in only counts as complete on its Friday.
/// `weeks_before` is capped at [`MAX_WEEKS_BEFORE`] and the range stops early
/// at the lower end of the calendar.
pub fn release_week_range(date: NaiveDate, weeks_before: u32) -> Vec<ReleaseWeek> {
    let start_offset = if date.weekday() == Weekday::Fri { 0 } else { 1 };
    let weeks_before = u64::from(weeks_before.min(MAX_WEEKS_BEFORE));

    (start_offset..=weeks_before + start_offset)
        .map_while(|i| date.checked_sub_days(Days::new(i * 7)))
        .map(build_week)
        .collect()
}

/// Parses `YYYY-MM-DD`, falling back to today.
pub fn parse_date(date: Option<&str>) -> NaiveDate {
    date.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .unwrap_or_else(|| Utc::now().date_naive())
}

/// Albums of `snapshot` released within `week`, newest first, then by first artist.
///
/// Albums without a day precise release date cannot be placed in a week and
/// are left out.
pub fn releases_in_week<'a>(snapshot: &'a SyncSnapshot, week: &ReleaseWeek) -> Vec<&'a AlbumRecord> {
    let mut albums: Vec<&AlbumRecord> = snapshot
        .albums()
        .filter(|album| {
            album
                .release_day()
                .is_some_and(|day| week.dates.contains(&day))
        })
        .collect();

    albums.sort_by(|a, b| match b.release_date.cmp(&a.release_date) {
        Ordering::Equal => a.artists.first().cmp(&b.artists.first()),
        other => other,
    });
    albums
}

pub fn release_row(album: &AlbumRecord) -> ReleaseTableRow {
    ReleaseTableRow {
        date: album.release_date.clone(),
        name: album.name.clone(),
        artists: album.artists.join(", "),
        group: album.album_group.to_string(),
    }
}

pub fn sort_release_table_rows(rows: &mut [ReleaseTableRow]) {
    rows.sort_by(|a, b| match b.date.cmp(&a.date) {
        Ordering::Equal => a.artists.cmp(&b.artists),
        other => other,
    });
}

/// Artists of `snapshot` as table rows sorted by name, optionally filtered by
/// a case-insensitive substring of the name.
pub fn artist_rows(snapshot: &SyncSnapshot, search: Option<&str>) -> Vec<ArtistTableRow> {
    let needle = search.map(str::to_lowercase);
    let mut rows: Vec<ArtistTableRow> = snapshot
        .artists()
        .filter(|artist| match &needle {
            Some(needle) => artist.name.to_lowercase().contains(needle),
            None => true,
        })
        .map(|artist| ArtistTableRow {
            name: artist.name.clone(),
            origins: artist.origins.labels().join(", "),
            genres: artist.genres.join(", "),
        })
        .collect();

    rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    rows
}

pub fn failure_rows(snapshot: &SyncSnapshot) -> Vec<FailureTableRow> {
    snapshot
        .failures()
        .iter()
        .map(|failure| FailureTableRow {
            artist: if failure.artist_name.is_empty() {
                failure.artist_id.clone()
            } else {
                failure.artist_name.clone()
            },
            cursor: failure.cursor.clone().unwrap_or_else(|| "-".to_string()),
            reason: failure.reason.clone(),
        })
        .collect()
}
