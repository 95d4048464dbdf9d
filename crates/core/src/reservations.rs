//! Booking queries and cancellation.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, info, warn};

use crate::{
    error::{BookingError, Result},
    ledger::SeatLedger,
    models::{booking_column, Ticket},
    store::{Table, TableStore},
};

static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*-\s*(\d+)$").expect("failed to compile range regex"));

/// Parse `1`, `1,3` or `2-4` style selections into zero-based indices below `listed`.
///
/// Returns `Ok(None)` for an empty answer or `0`, meaning the user backed out.
/// Numbers past the end of the list are dropped and ranges are clipped to it.
pub fn parse_selection(expression: &str, listed: usize) -> Result<Option<BTreeSet<usize>>> {
    let expression = expression.trim();
    if expression.is_empty() || expression == "0" {
        return Ok(None);
    }

    let invalid = || BookingError::InvalidSelection(expression.to_string());
    let positive = |raw: &str| raw.parse::<u64>().ok().filter(|value| *value > 0);
    let in_list = |number: u64| usize::try_from(number).ok().filter(|n| *n <= listed);

    let mut indices = BTreeSet::new();
    for token in expression.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(caps) = RANGE_RE.captures(token) {
            let start = positive(&caps[1]).ok_or_else(invalid)?;
            let end = positive(&caps[2]).ok_or_else(invalid)?;
            let (low, high) = (start.min(end), start.max(end));
            if let Some(low) = in_list(low) {
                let high = in_list(high).unwrap_or(listed);
                indices.extend((low..=high).map(|n| n - 1));
            }
        } else {
            let single = positive(token).ok_or_else(invalid)?;
            if let Some(single) = in_list(single) {
                indices.insert(single - 1);
            }
        }
    }
    Ok(Some(indices))
}

/// Seats handed back to one train by a cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatRestore {
    /// Train the tickets belonged to.
    pub train_id: String,
    /// One seat per cancelled ticket.
    pub seats: u32,
    /// False when the train is no longer in the catalog or the seat update failed.
    pub applied: bool,
}

/// Result of a cancellation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cancellation {
    /// Tickets removed from the booking store.
    pub tickets: Vec<Ticket>,
    /// Seat restores in train-number order.
    pub restored: Vec<SeatRestore>,
}

impl Cancellation {
    /// True when nothing was cancelled.
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

/// Per-user view of the booking store.
pub struct Reservations {
    bookings: Arc<dyn TableStore>,
    ledger: SeatLedger,
}

impl Reservations {
    /// Reservations over `bookings`, restoring seats through `ledger`.
    pub fn new(bookings: Arc<dyn TableStore>, ledger: SeatLedger) -> Self {
        Self { bookings, ledger }
    }

    /// Tickets owned by `username`, in booking order.
    pub fn list(&self, username: &str) -> Result<Vec<Ticket>> {
        let Some(table) = self.bookings.read_all()? else {
            return Ok(Vec::new());
        };
        Ok(owned_positions(&table, username)
            .into_iter()
            .map(|position| Ticket::from_record(&table.rows[position]))
            .collect())
    }

    /// Cancel the tickets at `indices` of [`Reservations::list`] and restore their seats.
    ///
    /// Out-of-range indices are ignored. Exactly the selected rows are removed. A
    /// failed seat update does not undo the removal; it is reported as not applied.
    pub fn cancel(&self, username: &str, indices: &BTreeSet<usize>) -> Result<Cancellation> {
        let (tickets, per_train) = {
            let _guard = self.bookings.lock()?;
            let Some(table) = self.bookings.read_all()? else {
                return Ok(Cancellation::default());
            };
            let owned = owned_positions(&table, username);

            let mut removed = BTreeSet::new();
            let mut per_train: BTreeMap<String, u32> = BTreeMap::new();
            let mut tickets = Vec::new();
            for &index in indices {
                let Some(&position) = owned.get(index) else {
                    continue;
                };
                let row = &table.rows[position];
                if row.len() <= booking_column::TRAIN_ID {
                    warn!(position, "Skipping malformed booking row");
                    continue;
                }
                removed.insert(position);
                let ticket = Ticket::from_record(row);
                *per_train.entry(ticket.train_id.clone()).or_default() += 1;
                tickets.push(ticket);
            }

            if tickets.is_empty() {
                return Ok(Cancellation::default());
            }

            let kept = table
                .rows
                .iter()
                .enumerate()
                .filter(|(position, _)| !removed.contains(position))
                .map(|(_, row)| row.clone())
                .collect();
            self.bookings
                .rewrite_all(&Table::new(table.header.clone(), kept))?;
            (tickets, per_train)
        };

        let mut restored = Vec::with_capacity(per_train.len());
        for (train_id, seats) in per_train {
            let applied = match self.ledger.restore(&train_id, seats) {
                Ok(applied) => applied,
                Err(err) => {
                    error!(%train_id, seats, ?err, "Failed to restore seats after cancellation");
                    false
                }
            };
            restored.push(SeatRestore {
                train_id,
                seats,
                applied,
            });
        }

        info!(
            username,
            cancelled = tickets.len(),
            "Tickets cancelled"
        );
        Ok(Cancellation { tickets, restored })
    }
}

fn owned_positions(table: &Table, username: &str) -> Vec<usize> {
    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            row.len() > booking_column::USERNAME && row[booking_column::USERNAME] == username
        })
        .map(|(position, _)| position)
        .collect()
}
