//! Pure aggregation over finished sessions. Everything here is a function of
//! the session list and a reference moment, so the menu can recompute on
//! every refresh without bookkeeping.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Local, Utc};

use crate::{
    storage::entities::SessionEntity,
    utils::time::{day_window, week_window},
};

/// Summed duration for one category inside some window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category: Arc<str>,
    pub duration: Duration,
}

/// Sums durations per category across all given sessions. Longest first,
/// ties broken by name so the output is stable.
pub fn totals_by_category<'a>(
    sessions: impl IntoIterator<Item = &'a SessionEntity>,
) -> Vec<CategoryTotal> {
    let mut map = HashMap::<Arc<str>, Duration>::new();

    for session in sessions {
        *map.entry(session.category.clone())
            .or_insert_with(Duration::zero) += session.duration;
    }

    let mut totals = map
        .into_iter()
        .map(|(category, duration)| CategoryTotal { category, duration })
        .collect::<Vec<_>>();
    totals.sort_by(|a, b| {
        b.duration
            .cmp(&a.duration)
            .then_with(|| a.category.cmp(&b.category))
    });
    totals
}

/// Totals for the local calendar day containing `reference`. A session
/// belongs to the day containing its start, even when it runs past midnight.
pub fn daily_totals<'a>(
    sessions: impl IntoIterator<Item = &'a SessionEntity>,
    reference: DateTime<Local>,
) -> Vec<CategoryTotal> {
    let (start, end) = day_window(reference);
    windowed_totals(sessions, start, end)
}

/// Totals for the Monday-start local week containing `reference`. Same start
/// attribution rule as [daily_totals].
pub fn weekly_totals<'a>(
    sessions: impl IntoIterator<Item = &'a SessionEntity>,
    reference: DateTime<Local>,
) -> Vec<CategoryTotal> {
    let (start, end) = week_window(reference);
    windowed_totals(sessions, start, end)
}

fn windowed_totals<'a>(
    sessions: impl IntoIterator<Item = &'a SessionEntity>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<CategoryTotal> {
    totals_by_category(
        sessions
            .into_iter()
            .filter(|s| s.start >= start && s.start < end),
    )
}
