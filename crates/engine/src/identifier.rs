//! Period-scoped ticket numbers of the form `YYYY-MM-NNNN`.

use std::fmt;
use std::str::FromStr;

use officeflow_storage::WorkflowStorage;
use time::{OffsetDateTime, UtcOffset};

use crate::error::WorkflowError;

/// A calendar month that scopes a ticket sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    year: u16,
    month: u8,
}

impl Period {
    pub fn new(year: u16, month: u8) -> Option<Self> {
        (year <= 9999 && (1..=12).contains(&month)).then_some(Self { year, month })
    }

    /// The period `now` falls in once shifted by `utc_offset_hours`.
    pub fn at(now: OffsetDateTime, utc_offset_hours: i8) -> Self {
        let offset = UtcOffset::from_hms(utc_offset_hours, 0, 0).unwrap_or(UtcOffset::UTC);
        let local = now.to_offset(offset);
        Self {
            year: local.year().clamp(0, 9999) as u16,
            month: u8::from(local.month()),
        }
    }

    /// `"2025-09-"`: what every ticket number in this period starts with.
    pub fn prefix(&self) -> String {
        format!("{self}-")
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || format!("invalid period '{s}', expected YYYY-MM");
        let (year, month) = s.split_once('-').ok_or_else(bad)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(bad());
        }
        let year = year.parse().map_err(|_| bad())?;
        let month = month.parse().map_err(|_| bad())?;
        Period::new(year, month).ok_or_else(bad)
    }
}

/// A ticket number. Sequences pad to four digits and keep counting past 9999.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketNo {
    pub period: Period,
    pub sequence: u32,
}

impl TicketNo {
    /// The number after `max`, or the first of the period.
    pub fn next(period: Period, max: Option<u32>) -> Self {
        Self {
            period,
            sequence: max.map_or(1, |m| m.saturating_add(1)),
        }
    }
}

impl fmt::Display for TicketNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:04}", self.period, self.sequence)
    }
}

impl FromStr for TicketNo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || format!("invalid ticket number '{s}'");
        let (period, seq) = s.rsplit_once('-').ok_or_else(bad)?;
        if seq.len() < 4 || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        Ok(Self {
            period: period.parse()?,
            sequence: seq.parse().map_err(|_| bad())?,
        })
    }
}

/// Compute the next number for `period` inside `snapshot`.
///
/// Two snapshots can compute the same value; the storage uniqueness check at
/// commit decides which one keeps it.
pub async fn allocate<S: WorkflowStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    period: Period,
) -> Result<TicketNo, WorkflowError> {
    let max = storage
        .max_ticket_sequence(snapshot, &period.prefix())
        .await?;
    Ok(TicketNo::next(period, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use officeflow_storage::{MemoryStorage, NewTicket};
    use time::macros::datetime;

    #[test]
    fn period_parses_and_formats() {
        let p: Period = "2025-09".parse().unwrap();
        assert_eq!(p.to_string(), "2025-09");
        assert_eq!(p.prefix(), "2025-09-");
        assert!("2025-13".parse::<Period>().is_err());
        assert!("2025-9".parse::<Period>().is_err());
        assert!("202509".parse::<Period>().is_err());
    }

    #[test]
    fn period_follows_the_configured_offset() {
        let now = datetime!(2025-09-30 20:00:00 UTC);
        assert_eq!(Period::at(now, 0).to_string(), "2025-09");
        assert_eq!(Period::at(now, 8).to_string(), "2025-10");
    }

    #[test]
    fn ticket_numbers_pad_to_four_digits() {
        let p = Period::new(2025, 9).unwrap();
        assert_eq!(TicketNo::next(p, None).to_string(), "2025-09-0001");
        assert_eq!(TicketNo::next(p, Some(41)).to_string(), "2025-09-0042");
        assert_eq!(TicketNo::next(p, Some(9999)).to_string(), "2025-09-10000");
    }

    #[test]
    fn ticket_numbers_parse_back() {
        let n: TicketNo = "2025-09-0042".parse().unwrap();
        assert_eq!(n.sequence, 42);
        assert_eq!(n.period, Period::new(2025, 9).unwrap());
        assert!("2025-09-42".parse::<TicketNo>().is_err());
        assert!("2025-09-00x2".parse::<TicketNo>().is_err());
    }

    async fn commit_ticket(storage: &MemoryStorage, period: Period) -> String {
        let mut snap = storage.begin_snapshot().await.unwrap();
        let no = allocate(storage, &mut snap, period).await.unwrap().to_string();
        storage
            .insert_ticket(
                &mut snap,
                NewTicket {
                    ticket_no: no.clone(),
                    requester_id: 1,
                    category: "Hardware".to_string(),
                    title: "t".to_string(),
                    description: "d".to_string(),
                    status: "Pending Division Chief Approval".to_string(),
                    division_chief_name: "Chief".to_string(),
                    assigned_to: "MIS".to_string(),
                    created_at: "2025-09-01T00:00:00Z".to_string(),
                },
            )
            .await
            .unwrap();
        storage.commit_snapshot(snap).await.unwrap();
        no
    }

    #[tokio::test]
    async fn sequential_allocation_restarts_each_period() {
        let storage = MemoryStorage::new();
        let sept = Period::new(2025, 9).unwrap();
        let oct = Period::new(2025, 10).unwrap();
        assert_eq!(commit_ticket(&storage, sept).await, "2025-09-0001");
        assert_eq!(commit_ticket(&storage, sept).await, "2025-09-0002");
        assert_eq!(commit_ticket(&storage, oct).await, "2025-10-0001");
        assert_eq!(commit_ticket(&storage, sept).await, "2025-09-0003");
    }
}
