use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use relsync::types::{
    AlbumGroup, AlbumRecord, ArtistFailure, ArtistOrigins, ArtistRecord, ArtistSource,
    ReleaseKinds, ReleaseTableRow, SyncSnapshot,
};
use relsync::utils::*;

// Helper function to create a test album
fn create_test_album(id: &str, artist_id: &str, release_date: &str, artist_name: &str) -> AlbumRecord {
    AlbumRecord {
        id: id.to_string(),
        artist_id: artist_id.to_string(),
        name: format!("Album {}", id),
        release_date: release_date.to_string(),
        release_date_precision: "day".to_string(),
        album_group: AlbumGroup::Album,
        artists: vec![artist_name.to_string()],
        extra: None,
    }
}

fn create_test_artist(id: &str, name: &str, source: ArtistSource) -> ArtistRecord {
    ArtistRecord {
        id: id.to_string(),
        name: name.to_string(),
        origins: ArtistOrigins::from_source(source),
        genres: vec!["rock".to_string()],
    }
}

// Helper function to create a test release table row
fn create_test_release_row(date: &str, name: &str, artists: &str) -> ReleaseTableRow {
    ReleaseTableRow {
        date: date.to_string(),
        name: name.to_string(),
        artists: artists.to_string(),
        group: "album".to_string(),
    }
}

fn create_test_snapshot(albums: Vec<AlbumRecord>) -> SyncSnapshot {
    let artists: BTreeMap<String, ArtistRecord> = [
        create_test_artist("a", "Zeta", ArtistSource::Followed),
        create_test_artist("b", "alpha", ArtistSource::SavedTracks),
    ]
    .into_iter()
    .map(|a| (a.id.clone(), a))
    .collect();
    let albums = albums.into_iter().map(|a| (a.id.clone(), a)).collect();

    SyncSnapshot::from_parts(
        Utc::now(),
        artists,
        albums,
        vec![ArtistFailure {
            artist_id: "b".to_string(),
            artist_name: String::new(),
            cursor: Some("50".to_string()),
            reason: "status 403: forbidden".to_string(),
        }],
    )
}

#[test]
fn test_release_week_number() {
    // Test with January 1st (should handle year boundary correctly)
    let jan1 = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(); // Sunday
    assert_eq!(release_week_number(jan1), 1);

    // Test with a date in the middle of the year
    let mid_year = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
    let week_num = release_week_number(mid_year);
    assert!(week_num > 1 && week_num <= 53);

    // Test consistency - same week should have same number
    let same_week_date = NaiveDate::from_ymd_opt(2023, 6, 16).unwrap();
    assert_eq!(week_num, release_week_number(same_week_date));

    // Saturday starts a new week
    let saturday = NaiveDate::from_ymd_opt(2023, 6, 17).unwrap();
    assert_eq!(release_week_number(saturday), week_num + 1);
}

#[test]
fn test_build_week() {
    let test_date = NaiveDate::from_ymd_opt(2023, 10, 17).unwrap(); // Tuesday
    let week = build_week(test_date);

    // Should have 7 dates from Saturday to Friday
    assert_eq!(week.dates.len(), 7);
    assert_eq!(week.dates[0].weekday(), Weekday::Sat);
    assert_eq!(week.dates[6].weekday(), Weekday::Fri);
    assert!(week.dates.contains(&test_date));

    // Dates should be consecutive
    for i in 1..7 {
        assert_eq!(week.dates[i], week.dates[i - 1] + Duration::days(1));
    }

    assert_eq!(week.year, 2023);
    assert_eq!(week.week, release_week_number(test_date));
}

#[test]
fn test_release_week_range() {
    let test_date = NaiveDate::from_ymd_opt(2023, 10, 17).unwrap(); // Tuesday
    let weeks = release_week_range(test_date, 3);

    // Current week is skipped since Tuesday is not Friday
    assert_eq!(weeks.len(), 4);
    assert!(!weeks[0].dates.contains(&test_date));
    for week in &weeks {
        assert_eq!(week.dates.len(), 7);
        assert_eq!(week.dates[0].weekday(), Weekday::Sat);
    }

    // Test with Friday (should include current week)
    let friday = NaiveDate::from_ymd_opt(2023, 10, 20).unwrap();
    let weeks_friday = release_week_range(friday, 2);
    assert_eq!(weeks_friday.len(), 3);
    assert!(weeks_friday[0].dates.contains(&friday));
}

#[test]
fn test_release_week_range_with_huge_previous_weeks() {
    let test_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(); // Monday
    let weeks = release_week_range(test_date, u32::MAX);

    assert_eq!(weeks.len(), MAX_WEEKS_BEFORE as usize + 1);
    for pair in weeks.windows(2) {
        assert!(pair[1].dates[0] < pair[0].dates[0]);
    }
}

#[test]
fn test_release_week_range_at_calendar_start() {
    let weeks = release_week_range(NaiveDate::MIN, 10);
    assert!(weeks.len() <= 1);

    let start = NaiveDate::MIN.checked_add_days(chrono::Days::new(20)).unwrap();
    let weeks = release_week_range(start, 10);
    assert!(weeks.len() < 11);
}

#[test]
fn test_parse_date() {
    let valid_date = parse_date(Some("2023-10-17"));
    assert_eq!(valid_date, NaiveDate::from_ymd_opt(2023, 10, 17).unwrap());

    // None and invalid input fall back to today
    let today = Utc::now().date_naive();
    assert_eq!(parse_date(None), today);
    assert_eq!(parse_date(Some("invalid-date")), today);
}

#[test]
fn test_sort_release_table_rows() {
    let mut rows = vec![
        create_test_release_row("2023-10-01", "Album A", "Artist Z"),
        create_test_release_row("2023-10-03", "Album C", "Artist A"),
        create_test_release_row("2023-10-01", "Album B", "Artist A"), // Same date, different artist
        create_test_release_row("2023-10-02", "Album D", "Artist B"),
    ];

    sort_release_table_rows(&mut rows);

    // Sorted by date descending, then by artist ascending
    assert_eq!(rows[0].date, "2023-10-03");
    assert_eq!(rows[1].date, "2023-10-02");
    assert_eq!(rows[2].artists, "Artist A");
    assert_eq!(rows[3].artists, "Artist Z");
}

#[test]
fn test_releases_in_week() {
    let week = build_week(NaiveDate::from_ymd_opt(2024, 5, 8).unwrap()); // 2024-05-04 .. 2024-05-10
    let mut month_only = create_test_album("m", "a", "2024-05", "Zeta");
    month_only.release_date_precision = "month".to_string();

    let snapshot = create_test_snapshot(vec![
        create_test_album("1", "a", "2024-05-04", "Zeta"),
        create_test_album("2", "b", "2024-05-10", "alpha"),
        create_test_album("3", "a", "2024-05-10", "Beta"),
        create_test_album("4", "a", "2024-05-11", "Zeta"), // next week
        month_only,
    ]);

    let ids: Vec<&str> = releases_in_week(&snapshot, &week)
        .into_iter()
        .map(|a| a.id.as_str())
        .collect();

    assert_eq!(ids, vec!["3", "2", "1"]);
}

#[test]
fn test_snapshot_drops_albums_of_unknown_artists() {
    let snapshot = create_test_snapshot(vec![
        create_test_album("1", "a", "2024-05-04", "Zeta"),
        create_test_album("2", "ghost", "2024-05-04", "Ghost"),
    ]);

    assert_eq!(snapshot.album_count(), 1);
    assert!(snapshot.album("2").is_none());
}

#[test]
fn test_artist_rows_sorted_and_filtered() {
    let snapshot = create_test_snapshot(Vec::new());

    let rows = artist_rows(&snapshot, None);
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "Zeta"]);
    assert_eq!(rows[1].origins, "followed");

    let rows = artist_rows(&snapshot, Some("ZE"));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Zeta");
}

#[test]
fn test_failure_rows_fall_back_to_artist_id() {
    let snapshot = create_test_snapshot(Vec::new());

    let rows = failure_rows(&snapshot);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].artist, "b");
    assert_eq!(rows[0].cursor, "50");
}

#[test]
fn test_release_row() {
    let mut album = create_test_album("1", "a", "2024-05-04", "Zeta");
    album.artists.push("Guest".to_string());
    album.album_group = AlbumGroup::AppearsOn;

    let row = release_row(&album);
    assert_eq!(row.artists, "Zeta, Guest");
    assert_eq!(row.group, "appears_on");
}

#[test]
fn test_release_kinds_parsing() {
    let kinds: ReleaseKinds = "single, album,single".parse().unwrap();
    assert_eq!(kinds.kinds(), &[AlbumGroup::Album, AlbumGroup::Single]);
    assert_eq!(kinds.to_string(), "album,single");

    // hyphens and case are accepted
    let kinds: ReleaseKinds = "Appears-On".parse().unwrap();
    assert_eq!(kinds.kinds(), &[AlbumGroup::AppearsOn]);

    assert_eq!("all".parse::<ReleaseKinds>().unwrap(), ReleaseKinds::all());
    assert!("".parse::<ReleaseKinds>().is_err());
    assert!("album,ep".parse::<ReleaseKinds>().is_err());
    assert_eq!(ReleaseKinds::default().to_string(), "album,single");
}

#[test]
fn test_artist_origins_merge() {
    let mut artist = create_test_artist("a", "Zeta", ArtistSource::Followed);
    artist.merge(ArtistRecord {
        genres: Vec::new(),
        ..create_test_artist("a", "Zeta", ArtistSource::SavedAlbums)
    });

    assert!(artist.origins.followed);
    assert!(artist.origins.saved_albums);
    assert!(!artist.origins.saved_tracks);
    assert_eq!(artist.origins.labels(), vec!["followed", "saved-albums"]);
    assert_eq!(artist.genres, vec!["rock".to_string()]);
}
