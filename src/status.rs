//! Closed status sets used by the list pages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a participant. Advancing walks `CYCLE` and wraps around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantStatus {
    Pending,
    Confirm,
    StallIssued,
    Cancel,
}

impl ParticipantStatus {
    pub const CYCLE: [ParticipantStatus; 4] = [
        ParticipantStatus::Pending,
        ParticipantStatus::Confirm,
        ParticipantStatus::StallIssued,
        ParticipantStatus::Cancel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantStatus::Pending => "Pending",
            ParticipantStatus::Confirm => "Confirm",
            ParticipantStatus::StallIssued => "Stall Issued",
            ParticipantStatus::Cancel => "Cancel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::CYCLE.into_iter().find(|st| st.as_str() == s)
    }

    /// Values outside the cycle (missing, typos, legacy states) start over at `Pending`.
    pub fn from_wire(s: Option<&str>) -> Self {
        s.and_then(Self::parse).unwrap_or(Self::CYCLE[0])
    }

    fn index(self) -> usize {
        Self::CYCLE
            .iter()
            .position(|st| *st == self)
            .unwrap_or_default()
    }

    pub fn next(self) -> Self {
        Self::CYCLE[(self.index() + 1) % Self::CYCLE.len()]
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status dropdown of a listing. `All` disables the pre-filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ParticipantStatus),
}

impl StatusFilter {
    pub const OPTIONS: [StatusFilter; 5] = [
        StatusFilter::Only(ParticipantStatus::Pending),
        StatusFilter::Only(ParticipantStatus::Confirm),
        StatusFilter::Only(ParticipantStatus::StallIssued),
        StatusFilter::Only(ParticipantStatus::Cancel),
        StatusFilter::All,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Only(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Some(StatusFilter::All);
        }
        ParticipantStatus::CYCLE
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
            .map(StatusFilter::Only)
    }

    pub fn as_value(self) -> Option<&'static str> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Only(s) => Some(s.as_str()),
        }
    }

    /// Next dropdown option, in the order the panel lists them.
    pub fn cycle(self) -> Self {
        let idx = Self::OPTIONS.iter().position(|o| *o == self).unwrap_or(0);
        Self::OPTIONS[(idx + 1) % Self::OPTIONS.len()]
    }
}

/// Per-status counts for the header badges. Values outside the cycle are not counted.
pub fn tally<'a>(
    statuses: impl IntoIterator<Item = &'a str>,
) -> [(ParticipantStatus, usize); 4] {
    let mut counts = ParticipantStatus::CYCLE.map(|s| (s, 0));
    for raw in statuses {
        if let Some(slot) = counts.iter_mut().find(|(s, _)| s.as_str() == raw) {
            slot.1 += 1;
        }
    }
    counts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStatus {
    Printed,
    Unprinted,
}

impl PrintStatus {
    /// Only the literal `"Printed"` counts; blanks and anything else still need a badge.
    pub fn from_wire(s: Option<&str>) -> Self {
        match s {
            Some("Printed") => PrintStatus::Printed,
            _ => PrintStatus::Unprinted,
        }
    }
}
