//! Per-user daily post counts for the last week.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::db::Store;
use crate::error::{Error, Result};

/// Number of full days shown before today
pub const REPORT_PAST_DAYS: u64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub user: String,
    /// One count per entry of [`WeeklyReport::dates`]
    pub counts: Vec<u32>,
}

/// Users x dates matrix; the first date is today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyReport {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<ReportRow>,
}

impl WeeklyReport {
    /// Count every stored user's posts on `today` and each of the previous days.
    pub fn build<S: Store>(store: &S, today: NaiveDate) -> Result<Self> {
        let dates = (0..=REPORT_PAST_DAYS)
            .map(|offset| {
                today.checked_sub_days(Days::new(offset)).ok_or_else(|| {
                    Error::InvalidInput(format!("{today} is too early for a report"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut rows: Vec<ReportRow> = Vec::new();
        for (column, date) in dates.iter().enumerate() {
            let counts = store.post_counts_for_all(*date)?;
            if column == 0 {
                rows = counts
                    .into_iter()
                    .map(|(user, count)| ReportRow {
                        user,
                        counts: vec![count],
                    })
                    .collect();
                continue;
            }
            // Each query returns every user in the same order
            for (row, (_, count)) in rows.iter_mut().zip(counts) {
                row.counts.push(count);
            }
        }

        Ok(Self { dates, rows })
    }

    /// Column headings: `user`, `today (so far)`, then `Mon 2026-10-12` style dates
    pub fn headers(&self) -> Vec<String> {
        let mut headers = vec!["user".to_string()];
        for (column, date) in self.dates.iter().enumerate() {
            if column == 0 {
                headers.push("today (so far)".to_string());
            } else {
                headers.push(date.format("%a %Y-%m-%d").to_string());
            }
        }
        headers
    }

    /// Plain-text table with every column padded to its widest cell
    pub fn render_table(&self) -> String {
        let headers = self.headers();
        let cells = self
            .rows
            .iter()
            .map(|row| {
                std::iter::once(row.user.clone())
                    .chain(row.counts.iter().map(ToString::to_string))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let widths = headers
            .iter()
            .enumerate()
            .map(|(column, header)| {
                cells
                    .iter()
                    .filter_map(|row| row.get(column))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>();

        let mut lines = vec![render_line(&headers, &widths)];
        lines.push(
            widths
                .iter()
                .map(|width| "-".repeat(*width))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        lines.extend(cells.iter().map(|row| render_line(row, &widths)));
        lines.join("\n")
    }
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(column, (cell, width))| {
            if column == 0 {
                format!("{cell:<width$}")
            } else {
                format!("{cell:>width$}")
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}
