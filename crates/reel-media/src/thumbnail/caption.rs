//! Title and subtitle derivation.

use chrono::{Datelike, NaiveDate};

/// Title and subtitle drawn on a thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captions {
    pub title: String,
    pub subtitle: String,
}

/// Words that mark a title as already describing its period.
const PERIOD_KEYWORDS: [&str; 2] = ["week", "top"];

/// Derive captions for `title`.
///
/// Titles that already name a period are kept and get "<Month> <year>" as
/// subtitle. Anything else is replaced by "<brand> - <Month> <year>" with
/// "Week <iso week>" underneath.
pub fn derive_captions(title: &str, brand: &str, today: NaiveDate) -> Captions {
    let month_year = today.format("%B %Y").to_string();
    let lowered = title.to_lowercase();
    let has_period = PERIOD_KEYWORDS.iter().any(|k| lowered.contains(k));

    if has_period && !title.trim().is_empty() {
        Captions {
            title: title.trim().to_string(),
            subtitle: month_year,
        }
    } else {
        Captions {
            title: format!("{} - {}", brand, month_year),
            subtitle: format!("Week {:02}", today.iso_week().week()),
        }
    }
}
