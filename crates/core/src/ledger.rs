//! Seat ledger: the only writer of seat counts in the catalog store.
//!
//! Each call takes the store lock, reads the whole catalog, edits the seat cell of
//! the matching rows, and replaces the file. Every other row is written back as read.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    catalog::{parse_seats, CatalogField, FieldMap},
    error::{BookingError, Result},
    store::{Table, TableStore},
};

/// Read-modify-write access to seat counts.
#[derive(Clone)]
pub struct SeatLedger {
    store: Arc<dyn TableStore>,
}

impl SeatLedger {
    /// Ledger writing through `store`.
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Take `count` seats from `train_id`, returning the seats left.
    ///
    /// Fails without touching the store if the train is unknown or any of its rows
    /// has fewer than `count` seats.
    pub fn reserve(&self, train_id: &str, count: u32) -> Result<u32> {
        let _guard = self.store.lock()?;
        let mut table = self
            .store
            .read_all()?
            .ok_or_else(|| BookingError::UnknownTrain(train_id.to_string()))?;
        let (positions, seat_column) = locate(&table, train_id)
            .ok_or_else(|| BookingError::UnknownTrain(train_id.to_string()))?;

        for &position in &positions {
            let available = current_seats(&table.rows[position], seat_column);
            if available < count {
                warn!(train_id, requested = count, available, "Reservation rejected");
                return Err(BookingError::InsufficientSeats {
                    train_id: train_id.to_string(),
                    requested: count,
                    available,
                });
            }
        }

        let remaining = apply(&mut table, &positions, seat_column, |seats| seats - count);
        self.store.rewrite_all(&table)?;
        info!(train_id, reserved = count, remaining, "Seats reserved");
        Ok(remaining)
    }

    /// Give `count` seats back to `train_id`.
    ///
    /// Returns `false` when the catalog or the train is missing; nothing is written then.
    pub fn restore(&self, train_id: &str, count: u32) -> Result<bool> {
        let _guard = self.store.lock()?;
        let Some(mut table) = self.store.read_all()? else {
            warn!(train_id, "Catalog missing; seats not restored");
            return Ok(false);
        };
        let Some((positions, seat_column)) = locate(&table, train_id) else {
            warn!(train_id, "Train not in catalog; seats not restored");
            return Ok(false);
        };

        let remaining = apply(&mut table, &positions, seat_column, |seats| {
            seats.saturating_add(count)
        });
        self.store.rewrite_all(&table)?;
        info!(train_id, restored = count, remaining, "Seats restored");
        Ok(true)
    }
}

fn locate(table: &Table, train_id: &str) -> Option<(Vec<usize>, usize)> {
    let map = FieldMap::detect(&table.header);
    let seat_column = map.column(CatalogField::Seats)?;
    let positions: Vec<usize> = table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| map.value(row, CatalogField::TrainNo) == train_id)
        .map(|(position, _)| position)
        .collect();
    if positions.is_empty() {
        None
    } else {
        Some((positions, seat_column))
    }
}

fn current_seats(row: &[String], seat_column: usize) -> u32 {
    row.get(seat_column)
        .map(|cell| parse_seats(cell))
        .unwrap_or(0)
}

// Returns the seat count of the last touched row, the one the catalog reader exposes.
fn apply(
    table: &mut Table,
    positions: &[usize],
    seat_column: usize,
    update: impl Fn(u32) -> u32,
) -> u32 {
    let width = table.header.len().max(seat_column + 1);
    let mut last = 0;
    for &position in positions {
        let row = &mut table.rows[position];
        if row.len() < width {
            row.resize(width, String::new());
        }
        last = update(parse_seats(&row[seat_column]));
        row[seat_column] = last.to_string();
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{Catalog, CATALOG_HEADER},
        store::{record, CsvFileStore, MemoryStore},
    };
    use anyhow::Result;
    use tempfile::tempdir;

    fn catalog_table() -> Table {
        Table::new(
            record(&CATALOG_HEADER),
            vec![
                record(&["T1", "Rajdhani", "Delhi", "Mumbai", "10"]),
                record(&["T2", "Shatabdi", "Delhi", "Agra", "2"]),
            ],
        )
    }

    fn ledger_with(table: Table) -> (Arc<MemoryStore>, SeatLedger) {
        let store = Arc::new(MemoryStore::with_table(table));
        let ledger = SeatLedger::new(store.clone());
        (store, ledger)
    }

    fn seats(store: &MemoryStore, id: &str) -> Option<u32> {
        let table = store.snapshot()?;
        Catalog::from_table(&table).get(id).map(|train| train.seats)
    }

    #[test]
    fn reserve_within_capacity_decrements() -> Result<()> {
        let (store, ledger) = ledger_with(catalog_table());
        assert_eq!(ledger.reserve("T1", 3)?, 7);
        assert_eq!(seats(&store, "T1"), Some(7));
        assert_eq!(seats(&store, "T2"), Some(2));
        Ok(())
    }

    #[test]
    fn reserve_beyond_capacity_changes_nothing() {
        let (store, ledger) = ledger_with(catalog_table());
        let before = store.snapshot();
        let err = ledger.reserve("T2", 3).unwrap_err();
        assert!(matches!(
            err,
            BookingError::InsufficientSeats {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn reserve_unknown_train_fails() {
        let (store, ledger) = ledger_with(catalog_table());
        let before = store.snapshot();
        assert!(matches!(
            ledger.reserve("T9", 1),
            Err(BookingError::UnknownTrain(_))
        ));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn reserve_then_restore_round_trips() -> Result<()> {
        let (store, ledger) = ledger_with(catalog_table());
        let before = store.snapshot();
        ledger.reserve("T1", 10)?;
        assert_eq!(seats(&store, "T1"), Some(0));
        assert!(ledger.restore("T1", 10)?);
        assert_eq!(store.snapshot(), before);
        Ok(())
    }

    #[test]
    fn restore_unknown_train_is_a_no_op() -> Result<()> {
        let (store, ledger) = ledger_with(catalog_table());
        let before = store.snapshot();
        assert!(!ledger.restore("T9", 4)?);
        assert_eq!(store.snapshot(), before);

        let empty = SeatLedger::new(Arc::new(MemoryStore::new()));
        assert!(!empty.restore("T1", 1)?);
        Ok(())
    }

    #[test]
    fn unparseable_seats_count_as_zero() {
        let table = Table::new(
            record(&CATALOG_HEADER),
            vec![record(&["T3", "Mail", "Pune", "Goa", "n/a"])],
        );
        let (_, ledger) = ledger_with(table);
        assert!(matches!(
            ledger.reserve("T3", 1),
            Err(BookingError::InsufficientSeats { available: 0, .. })
        ));
    }

    #[test]
    fn rewrite_preserves_custom_header_and_other_rows() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("trains.csv");
        std::fs::write(
            &path,
            "Seats,Train No,Name,From,To,Notes\n5,A1,Alpha,X,Y,\"quiet, coach\"\n8,B2,Beta,X,Z,\n",
        )?;
        let store = Arc::new(CsvFileStore::new(&path));
        let ledger = SeatLedger::new(store.clone());

        assert_eq!(ledger.reserve("B2", 3)?, 5);

        let table = store.read_all()?.expect("catalog exists");
        assert_eq!(table.header, record(&["Seats", "Train No", "Name", "From", "To", "Notes"]));
        assert_eq!(table.rows[0], record(&["5", "A1", "Alpha", "X", "Y", "quiet, coach"]));
        assert_eq!(table.rows[1], record(&["5", "B2", "Beta", "X", "Z", ""]));
        Ok(())
    }
}
