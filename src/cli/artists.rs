use tabled::Table;

use crate::{cli::load_snapshot, utils, warning};

/// Lists snapshot artists sorted by name, optionally filtered by `search`.
pub async fn list_artists(search: Option<String>) {
    let Some(snapshot) = load_snapshot().await else {
        return;
    };

    let rows = utils::artist_rows(&snapshot, search.as_deref());
    if rows.is_empty() {
        warning!("No artists found.");
        return;
    }

    println!("{}", Table::new(rows));
}
