// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Arrival statistics and guest filters over the joined roster/ledger view.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use core_types::JoinedGuest;
use serde::Serialize;
use thiserror::Error;

const SLOT_MINUTES: u32 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("invalid date selection '{value}': expected 'all' or YYYY-MM-DD")]
    InvalidDate { value: String },
    #[error("unknown guest view '{value}': expected entered, not-entered or all")]
    UnknownView { value: String },
}

/// Calendar day the statistics are scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSelection {
    All,
    Day(NaiveDate),
}

impl FromStr for DateSelection {
    type Err = SelectionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") {
            return Ok(DateSelection::All);
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(DateSelection::Day)
            .map_err(|_| SelectionError::InvalidDate {
                value: value.to_string(),
            })
    }
}

impl fmt::Display for DateSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateSelection::All => f.write_str("all"),
            DateSelection::Day(day) => write!(f, "{}", day.format("%Y-%m-%d")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotCount {
    pub slot: String,
    pub guests: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotTotal {
    pub slot: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    pub total_invited: u64,
    /// Admitted on the selected day.
    pub checked_in: u64,
    pub not_checked_in: u64,
    /// Admitted on any day.
    pub total_checked_in: u64,
    /// Whole percent of the roster admitted on any day; 0 for an empty roster.
    pub checkin_percentage: u32,
    pub hourly_arrivals: Vec<SlotCount>,
    pub cumulative_arrivals: Vec<SlotTotal>,
}

/// Floors a minute-of-hour to the start of its half-hour slot.
fn align_to_slot(minute: u32) -> u32 {
    minute - (minute % SLOT_MINUTES)
}

/// `HH:00` or `HH:30` in the zone `tz`.
pub fn slot_label<Tz: TimeZone>(at: &DateTime<Utc>, tz: &Tz) -> String {
    let local = at.with_timezone(tz);
    format!("{:02}:{:02}", local.hour(), align_to_slot(local.minute()))
}

fn on_selected_day<Tz: TimeZone>(at: &DateTime<Utc>, selection: &DateSelection, tz: &Tz) -> bool {
    match selection {
        DateSelection::All => true,
        DateSelection::Day(day) => at.with_timezone(tz).date_naive() == *day,
    }
}

fn percentage(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

/// Summary counts and half-hour arrival series for `selection`, with days taken in `tz`.
///
/// Guests without an admission never count as checked in. Both series are empty
/// when nobody was admitted on the selected day.
pub fn aggregate<Tz: TimeZone>(
    guests: &[JoinedGuest],
    selection: &DateSelection,
    tz: &Tz,
) -> AnalyticsSummary {
    let mut arrivals: Vec<DateTime<Utc>> = guests
        .iter()
        .filter_map(|guest| guest.entered_at)
        .filter(|at| on_selected_day(at, selection, tz))
        .collect();
    arrivals.sort();

    let mut per_slot: BTreeMap<String, u64> = BTreeMap::new();
    for at in &arrivals {
        *per_slot.entry(slot_label(at, tz)).or_default() += 1;
    }

    let mut running = 0u64;
    let mut hourly_arrivals = Vec::with_capacity(per_slot.len());
    let mut cumulative_arrivals = Vec::with_capacity(per_slot.len());
    for (slot, guests) in per_slot {
        running += guests;
        cumulative_arrivals.push(SlotTotal {
            slot: slot.clone(),
            total: running,
        });
        hourly_arrivals.push(SlotCount { slot, guests });
    }

    let total_invited = guests.len() as u64;
    let total_checked_in = guests.iter().filter(|guest| guest.has_entered()).count() as u64;
    let checked_in = arrivals.len() as u64;
    log::debug!(
        "aggregated {checked_in} arrivals of {total_invited} guests for {selection} into {} slots",
        hourly_arrivals.len()
    );
    AnalyticsSummary {
        total_invited,
        checked_in,
        not_checked_in: total_invited.saturating_sub(checked_in),
        total_checked_in,
        checkin_percentage: percentage(total_checked_in, total_invited),
        hourly_arrivals,
        cumulative_arrivals,
    }
}

/// Guest browser tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuestView {
    Entered,
    NotEntered,
    #[default]
    All,
}

impl FromStr for GuestView {
    type Err = SelectionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "entered" => Ok(GuestView::Entered),
            "not-entered" | "not_entered" => Ok(GuestView::NotEntered),
            "all" => Ok(GuestView::All),
            other => Err(SelectionError::UnknownView {
                value: other.to_string(),
            }),
        }
    }
}

fn contains_folded(field: Option<&str>, needle: &str) -> bool {
    field.is_some_and(|value| value.to_lowercase().contains(needle))
}

/// Guests on the `view` tab whose fields match `search`, case-insensitively.
///
/// The entered and not-entered tabs search the display name only; `All` also
/// searches constituency and responsibility. An empty search matches everyone.
pub fn filter_guests<'a>(
    guests: &'a [JoinedGuest],
    view: GuestView,
    search: &str,
) -> Vec<&'a JoinedGuest> {
    let needle = search.trim().to_lowercase();
    guests
        .iter()
        .filter(|guest| match view {
            GuestView::Entered => guest.has_entered(),
            GuestView::NotEntered => !guest.has_entered(),
            GuestView::All => true,
        })
        .filter(|guest| {
            if needle.is_empty() {
                return true;
            }
            let details = &guest.entry.details;
            let by_name = contains_folded(details.display_name.as_deref(), &needle);
            match view {
                GuestView::Entered | GuestView::NotEntered => by_name,
                GuestView::All => {
                    by_name
                        || contains_folded(details.constituency.as_deref(), &needle)
                        || contains_folded(details.responsibility.as_deref(), &needle)
                }
            }
        })
        .collect()
}
