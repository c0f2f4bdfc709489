use chrono::Utc;
use tabled::Table;

use crate::{cli::load_snapshot, info, types::ReleaseWeek, utils};

/// Displays snapshot status and release week information.
///
/// # Arguments
///
/// * `release_week` - Show the current release week
/// * `previous_weeks` - Show the last N release weeks
/// * `release_date` - Show the release week a date (YYYY-MM-DD) falls into
///
/// Without any flag the stored snapshot is summarized: when it was taken,
/// how many artists and releases it holds, and which artists failed.
pub async fn info(release_week: bool, previous_weeks: Option<u32>, release_date: Option<String>) {
    if release_week {
        let week = utils::build_week(Utc::now().date_naive());
        info!("Current release week: {}", week.week);
        info!("Current release week dates: {}", week_dates(&week));
        return;
    }

    if let Some(previous_weeks) = previous_weeks {
        for week in utils::release_week_range(Utc::now().date_naive(), previous_weeks) {
            info!("Release week: {}", week.week);
            info!("Release week dates: {}", week_dates(&week));
        }
        return;
    }

    if let Some(release_date) = release_date {
        let date = utils::parse_date(Some(&release_date));
        info!("{} is in release week {}.", date, utils::release_week_number(date));
        return;
    }

    let Some(snapshot) = load_snapshot().await else {
        return;
    };

    info!("Synced at: {}", snapshot.synced_at().format("%Y-%m-%d %H:%M:%S UTC"));
    info!("Artist count: {}", snapshot.artist_count());
    info!("Release count: {}", snapshot.album_count());
    info!("Failed artists: {}", snapshot.failures().len());
    if !snapshot.failures().is_empty() {
        println!("{}", Table::new(utils::failure_rows(&snapshot)));
    }
}

fn week_dates(week: &ReleaseWeek) -> String {
    match (week.dates.first(), week.dates.last()) {
        (Some(first), Some(last)) => format!("{} - {}", first, last),
        _ => String::new(),
    }
}
