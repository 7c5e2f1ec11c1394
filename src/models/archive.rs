//! Archive model
//!
//! Post counts bucketed by calendar month. The database returns one
//! `MonthYearCount` row per month, newest first; `MonthHistogram` folds
//! those rows into a year → month → count structure.

use serde::Serialize;

/// One row of the month/year aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthYearCount {
    pub year: i32,
    pub month: u32,
    pub count: i64,
}

/// Month counts for a single year, months newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearCounts {
    pub year: i32,
    pub months: Vec<(u32, i64)>,
}

impl YearCounts {
    /// Count for `month`, if any post falls in it
    pub fn month(&self, month: u32) -> Option<i64> {
        self.months
            .iter()
            .find(|(m, _)| *m == month)
            .map(|(_, count)| *count)
    }

    pub fn total(&self) -> i64 {
        self.months.iter().map(|(_, count)| count).sum()
    }
}

/// Nested year → month → count lookup, years newest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MonthHistogram {
    years: Vec<YearCounts>,
}

impl MonthHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one aggregation row into the histogram.
    ///
    /// Rows for the same year are grouped as they arrive; a row for a month
    /// already present adds to its count.
    pub fn push(&mut self, row: MonthYearCount) {
        let idx = match self.years.iter().position(|y| y.year == row.year) {
            Some(idx) => idx,
            None => {
                self.years.push(YearCounts {
                    year: row.year,
                    months: Vec::new(),
                });
                self.years.len() - 1
            }
        };

        let year = &mut self.years[idx];
        match year.months.iter_mut().find(|(m, _)| *m == row.month) {
            Some((_, count)) => *count += row.count,
            None => year.months.push((row.month, row.count)),
        }
    }

    /// Counts for one year
    pub fn year(&self, year: i32) -> Option<&YearCounts> {
        self.years.iter().find(|y| y.year == year)
    }

    /// Count for one month; `None` when no post falls in it
    pub fn count(&self, year: i32, month: u32) -> Option<i64> {
        self.year(year).and_then(|y| y.month(month))
    }

    /// Years in arrival order
    pub fn years(&self) -> impl Iterator<Item = &YearCounts> {
        self.years.iter()
    }

    /// Sum over every bucket
    pub fn total(&self) -> i64 {
        self.years.iter().map(YearCounts::total).sum()
    }

    /// True when no post has been bucketed
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

impl FromIterator<MonthYearCount> for MonthHistogram {
    fn from_iter<I: IntoIterator<Item = MonthYearCount>>(iter: I) -> Self {
        let mut histogram = Self::new();
        for row in iter {
            histogram.push(row);
        }
        histogram
    }
}
