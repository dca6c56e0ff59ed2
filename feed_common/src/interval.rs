//! History interval labels and their series plans.
//!
//! Every history request names an interval (`1d`, `1w`, ...). Each label maps
//! to a fixed plan: how many points the synthesized series holds and how far
//! apart they sit. Unrecognized labels degrade to a small 20-point/5-minute
//! plan rather than failing, keeping history requests infallible.

use chrono::Duration;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Supported history interval labels.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    EnumIter,
)]
pub enum Interval {
    /// One day of history, hourly points.
    #[strum(serialize = "1d")]
    #[value(name = "1d")]
    OneDay,
    /// One week of history, six-hour points.
    #[strum(serialize = "1w")]
    #[value(name = "1w")]
    OneWeek,
    /// One month of history, daily points.
    #[strum(serialize = "1m")]
    #[value(name = "1m")]
    OneMonth,
    /// Three months of history, two-day points.
    #[strum(serialize = "3m")]
    #[value(name = "3m")]
    ThreeMonths,
    /// Six months of history, three-day points.
    #[strum(serialize = "6m")]
    #[value(name = "6m")]
    SixMonths,
    /// One year of history, weekly points.
    #[strum(serialize = "1y")]
    #[value(name = "1y")]
    OneYear,
    /// Five years of history, monthly points.
    #[strum(serialize = "5y")]
    #[value(name = "5y")]
    FiveYears,
}

impl Interval {
    /// The series plan for this interval.
    pub fn plan(self) -> SeriesPlan {
        match self {
            Interval::OneDay => SeriesPlan::new(24, Duration::hours(1)),
            Interval::OneWeek => SeriesPlan::new(28, Duration::hours(6)),
            Interval::OneMonth => SeriesPlan::new(30, Duration::days(1)),
            Interval::ThreeMonths => SeriesPlan::new(45, Duration::days(2)),
            Interval::SixMonths => SeriesPlan::new(60, Duration::days(3)),
            Interval::OneYear => SeriesPlan::new(52, Duration::weeks(1)),
            Interval::FiveYears => SeriesPlan::new(60, Duration::days(30)),
        }
    }
}

/// Point count and spacing for a synthesized history series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesPlan {
    /// Number of points in the series.
    pub point_count: usize,
    /// Time between consecutive points.
    pub step: Duration,
}

impl SeriesPlan {
    /// Build a plan from its parts.
    pub fn new(point_count: usize, step: Duration) -> Self {
        Self { point_count, step }
    }

    /// Resolve a raw interval label to its plan.
    ///
    /// Unknown labels get the default 20-point/5-minute plan.
    pub fn for_label(label: &str) -> SeriesPlan {
        label
            .parse::<Interval>()
            .map(Interval::plan)
            .unwrap_or_else(|_| SeriesPlan::new(20, Duration::minutes(5)))
    }
}
