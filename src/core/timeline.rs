/// A dated chronology of a story's sections, spread across its season.
use chrono::{Datelike, Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::text::first_sentence;
use crate::schema::setting::Season;
use crate::schema::story::Story;

pub const EARLIEST_YEAR: i32 = 1800;
pub const LATEST_YEAR: i32 = 1820;

const SUMMARY_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub date: NaiveDate,
    pub title: String,
    pub summary: String,
}

impl TimelineEntry {
    pub fn regency_date(&self) -> String {
        format_regency_date(self.date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub year: i32,
    pub entries: Vec<TimelineEntry>,
}

impl Timeline {
    /// One entry per section, in section order, on non-decreasing dates
    /// within the story's season of a seeded year.
    pub fn build(story: &Story, seed: u64) -> Timeline {
        let mut rng = StdRng::seed_from_u64(seed);
        let year = rng.gen_range(EARLIEST_YEAR..=LATEST_YEAR);
        let Some((start, span)) = season_span(story.setting.season, year) else {
            return Timeline {
                year,
                entries: Vec::new(),
            };
        };

        let mut offsets: Vec<u64> = story
            .sections
            .iter()
            .map(|_| rng.gen_range(0..span))
            .collect();
        offsets.sort_unstable();

        let entries = story
            .sections
            .iter()
            .zip(offsets)
            .filter_map(|(section, offset)| {
                let date = start.checked_add_days(Days::new(offset))?;
                Some(TimelineEntry {
                    date,
                    title: section.title.clone(),
                    summary: first_sentence(&section.text, SUMMARY_CHARS),
                })
            })
            .collect();

        Timeline { year, entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// First day of the season and its length in days.
fn season_span(season: Season, year: i32) -> Option<(NaiveDate, u64)> {
    let [first, _, last] = season.months();
    let start = NaiveDate::from_ymd_opt(year, first, 1)?;
    // Winter runs December to February, so it ends in the following year.
    let end_year = if last < first { year + 1 } else { year };
    let after = NaiveDate::from_ymd_opt(end_year, last + 1, 1)?;
    let days = (after - start).num_days();
    u64::try_from(days).ok().filter(|d| *d > 0).map(|d| (start, d))
}

/// "the 3rd of April, 1811"
pub fn format_regency_date(date: NaiveDate) -> String {
    let day = date.day();
    format!(
        "the {}{} of {}, {}",
        day,
        ordinal_suffix(day),
        date.format("%B"),
        date.year()
    )
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}
