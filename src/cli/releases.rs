use tabled::Table;

use crate::{cli::load_snapshot, types::ReleaseTableRow, utils, warning};

/// Lists snapshot releases of the most recent release weeks.
///
/// # Arguments
///
/// * `previous_weeks` - Number of weeks before the current one to include
/// * `release_date` - Reference date (YYYY-MM-DD), defaults to today
///
/// Weeks without releases are reported but not rendered as a table.
pub async fn list_releases(previous_weeks: Option<u32>, release_date: Option<String>) {
    let Some(snapshot) = load_snapshot().await else {
        return;
    };

    let curr_date = utils::parse_date(release_date.as_deref());
    let release_weeks = utils::release_week_range(curr_date, previous_weeks.unwrap_or(0));

    for release_week in release_weeks {
        let mut rows: Vec<ReleaseTableRow> = utils::releases_in_week(&snapshot, &release_week)
            .into_iter()
            .map(utils::release_row)
            .collect();

        if rows.is_empty() {
            warning!(
                "No releases in week {}/{}.",
                release_week.week,
                release_week.year
            );
            continue;
        }

        utils::sort_release_table_rows(&mut rows);
        println!(
            "Week: {week}\tYear: {year}\n{table}\n",
            week = release_week.week,
            year = release_week.year,
            table = Table::new(rows)
        );
    }
}
