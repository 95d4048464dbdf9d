//! Catalog editor used by the administrator menu.

use std::sync::Arc;

use tracing::info;

use crate::{
    catalog::{ensure_catalog, Catalog, CatalogField, FieldMap},
    error::{BookingError, Result},
    models::Train,
    store::{Table, TableStore},
};

/// Check administrator credentials against the configured pair.
pub fn admin_login(expected: (&str, &str), username: &str, password: &str) -> Result<()> {
    if username.trim() == expected.0 && password.trim() == expected.1 {
        Ok(())
    } else {
        Err(BookingError::BadCredentials)
    }
}

/// Adds and lists catalog entries.
pub struct CatalogEditor {
    store: Arc<dyn TableStore>,
}

impl CatalogEditor {
    /// Editor writing to `store`.
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Append a train after validating the raw answers.
    ///
    /// The row follows the existing header layout, so hand-edited catalogs keep
    /// their column order.
    pub fn add_train(
        &self,
        train_no: &str,
        train_name: &str,
        source: &str,
        destination: &str,
        seats: &str,
    ) -> Result<Train> {
        let train_no = train_no.trim();
        let train_name = train_name.trim();
        let seats = seats.trim();
        if train_no.is_empty() || train_name.is_empty() {
            return Err(BookingError::InvalidTrain(
                "train number and name are required".to_string(),
            ));
        }
        if seats.is_empty() || !seats.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(BookingError::InvalidTrain("seats must be a number".to_string()));
        }
        let seat_count = seats
            .parse::<u32>()
            .map_err(|_| BookingError::InvalidTrain("seat count is too large".to_string()))?;

        let _guard = self.store.lock()?;
        ensure_catalog(self.store.as_ref())?;
        let table = self.store.read_all()?.unwrap_or_default();
        if Catalog::from_table(&table).get(train_no).is_some() {
            return Err(BookingError::InvalidTrain(format!(
                "train {train_no} already exists"
            )));
        }

        let train = Train {
            id: train_no.to_string(),
            name: train_name.to_string(),
            origin: source.trim().to_string(),
            destination: destination.trim().to_string(),
            seats: seat_count,
        };
        let row = layout_row(&table.header, &train);
        self.store.append(&table.header, &[row])?;
        info!(train_id = %train.id, seats = train.seats, "Train added");
        Ok(train)
    }

    /// Raw catalog contents for display, creating the store if needed.
    pub fn catalog_rows(&self) -> Result<Table> {
        ensure_catalog(self.store.as_ref())?;
        Ok(self.store.read_all()?.unwrap_or_default())
    }
}

fn layout_row(header: &[String], train: &Train) -> Vec<String> {
    let map = FieldMap::detect(header);
    let mut row = vec![String::new(); header.len()];
    let values = [
        (CatalogField::TrainNo, &train.id),
        (CatalogField::TrainName, &train.name),
        (CatalogField::Source, &train.origin),
        (CatalogField::Destination, &train.destination),
    ];
    for (field, value) in values {
        if let Some(column) = map.column(field) {
            row[column] = value.clone();
        }
    }
    if let Some(column) = map.column(CatalogField::Seats) {
        row[column] = train.seats.to_string();
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::CATALOG_HEADER,
        store::{record, CsvFileStore, MemoryStore},
    };
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn added_trains_are_readable() -> Result<()> {
        let dir = tempdir()?;
        let store = Arc::new(CsvFileStore::new(dir.path().join("trains.csv")));
        let editor = CatalogEditor::new(store.clone());

        editor.add_train("12951", "Rajdhani", "Delhi", "Mumbai", "10")?;
        editor.add_train("12002", "Shatabdi", "Delhi", "Agra", "40")?;

        let table = editor.catalog_rows()?;
        assert_eq!(table.header, record(&CATALOG_HEADER));
        let catalog = Catalog::load(store.as_ref())?;
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("12951").map(|t| t.seats), Some(10));
        Ok(())
    }

    #[test]
    fn rows_follow_existing_header_order() -> Result<()> {
        let store = Arc::new(MemoryStore::with_table(Table::new(
            record(&["Seats", "From", "To", "Train No", "Train Name"]),
            Vec::new(),
        )));
        let editor = CatalogEditor::new(store.clone());
        editor.add_train("7", "Mail", "Pune", "Goa", "3")?;

        let table = store.snapshot().expect("catalog exists");
        assert_eq!(table.rows[0], record(&["3", "Pune", "Goa", "7", "Mail"]));
        Ok(())
    }

    #[test]
    fn invalid_and_duplicate_trains_are_rejected() -> Result<()> {
        let editor = CatalogEditor::new(Arc::new(MemoryStore::new()));
        editor.add_train("1", "Alpha", "A", "B", "5")?;

        for (no, name, seats) in [("", "X", "5"), ("2", "", "5"), ("2", "X", "five"), ("2", "X", "")] {
            assert!(matches!(
                editor.add_train(no, name, "A", "B", seats),
                Err(BookingError::InvalidTrain(_))
            ));
        }
        assert!(matches!(
            editor.add_train("1", "Again", "A", "B", "5"),
            Err(BookingError::InvalidTrain(_))
        ));
        Ok(())
    }

    #[test]
    fn admin_credentials_must_match() {
        assert!(admin_login(("admin", "pw"), "admin", "pw").is_ok());
        assert!(admin_login(("admin", "pw"), "admin", "nope").is_err());
    }
}
