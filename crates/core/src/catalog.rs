//! Train catalog reader with tolerant header detection.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{
    error::Result,
    models::Train,
    store::{Table, TableStore},
};

/// Header written when the catalog store is created.
pub const CATALOG_HEADER: [&str; 5] = ["train_no", "train_name", "source", "destination", "seats"];

/// Canonical catalog columns, in positional fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogField {
    /// Train number.
    TrainNo,
    /// Train display name.
    TrainName,
    /// Departure station.
    Source,
    /// Arrival station.
    Destination,
    /// Remaining seats.
    Seats,
}

impl CatalogField {
    /// All fields in fallback order.
    pub const ALL: [CatalogField; 5] = [
        CatalogField::TrainNo,
        CatalogField::TrainName,
        CatalogField::Source,
        CatalogField::Destination,
        CatalogField::Seats,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

struct HeaderRule {
    field: CatalogField,
    matches: fn(&str) -> bool,
}

// Evaluated in order; the first rule that accepts a header claims it.
const HEADER_RULES: [HeaderRule; 5] = [
    HeaderRule {
        field: CatalogField::TrainNo,
        matches: |h| {
            (h.contains("train") && h.contains("no"))
                || matches!(h, "train_no" | "train no" | "trainno" | "train-number")
        },
    },
    HeaderRule {
        field: CatalogField::TrainName,
        matches: |h| {
            (h.contains("train") && (h.contains("name") || h.contains("nama")))
                || matches!(h, "train_name" | "train name" | "trainname")
        },
    },
    HeaderRule {
        field: CatalogField::Source,
        matches: |h| h.contains("source") || h.contains("from") || h == "src",
    },
    HeaderRule {
        field: CatalogField::Destination,
        matches: |h| h.contains("destination") || h.contains("to") || h == "dest",
    },
    HeaderRule {
        field: CatalogField::Seats,
        matches: |h| {
            (h.contains("seat") && (h.contains("no") || h.contains("count")))
                || matches!(h, "no_of_seats" | "no of seats" | "seats" | "seat")
        },
    },
];

/// Resolved column index for each canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    columns: [Option<usize>; 5],
}

impl FieldMap {
    /// Map arbitrary header names onto the canonical fields.
    ///
    /// Keyword rules run first; a later header matching the same field replaces an
    /// earlier one. Fields left unmatched take the unclaimed headers in order.
    pub fn detect(header: &[String]) -> Self {
        let mut columns = [None; 5];
        for (index, name) in header.iter().enumerate() {
            let lowered = name.trim().to_lowercase();
            if let Some(rule) = HEADER_RULES.iter().find(|rule| (rule.matches)(&lowered)) {
                columns[rule.field.slot()] = Some(index);
            }
        }

        let mut unclaimed = (0..header.len())
            .filter(|index| !columns.contains(&Some(*index)))
            .collect::<Vec<_>>()
            .into_iter();
        for field in CatalogField::ALL {
            if columns[field.slot()].is_none() {
                columns[field.slot()] = unclaimed.next();
            }
        }

        let map = Self { columns };
        debug!(?map, "Catalog header mapped");
        map
    }

    /// Column holding `field`, if the header is wide enough to have one.
    pub fn column(&self, field: CatalogField) -> Option<usize> {
        self.columns[field.slot()]
    }

    /// Trimmed cell for `field`; empty when the row is short or the field is unmapped.
    pub fn value<'a>(&self, row: &'a [String], field: CatalogField) -> &'a str {
        self.column(field)
            .and_then(|index| row.get(index))
            .map(|value| value.trim())
            .unwrap_or("")
    }
}

/// Parse a seat cell, treating anything non-numeric as zero.
pub fn parse_seats(raw: &str) -> u32 {
    raw.trim().parse::<u32>().unwrap_or(0)
}

/// Snapshot of the train catalog keyed by train number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    trains: Vec<Train>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Load the catalog, creating an empty store with the canonical header if absent.
    pub fn load(store: &dyn TableStore) -> Result<Self> {
        let table = match store.read_all()? {
            Some(table) => table,
            None => {
                warn!("Train catalog missing; creating an empty one");
                ensure_catalog(store)?;
                return Ok(Self::default());
            }
        };
        Ok(Self::from_table(&table))
    }

    /// Build a catalog from an already-read table.
    pub fn from_table(table: &Table) -> Self {
        let mut catalog = Self::default();
        if table.is_empty() {
            return catalog;
        }

        let map = FieldMap::detect(&table.header);
        for (line, row) in table.rows.iter().enumerate() {
            let id = map.value(row, CatalogField::TrainNo);
            if id.is_empty() {
                debug!(line = line + 2, "Skipping catalog row without a train number");
                continue;
            }
            catalog.insert(Train {
                id: id.to_string(),
                name: map.value(row, CatalogField::TrainName).to_string(),
                origin: map.value(row, CatalogField::Source).to_string(),
                destination: map.value(row, CatalogField::Destination).to_string(),
                seats: parse_seats(map.value(row, CatalogField::Seats)),
            });
        }
        catalog
    }

    fn insert(&mut self, train: Train) {
        match self.index.get(&train.id) {
            Some(&position) => self.trains[position] = train,
            None => {
                self.index.insert(train.id.clone(), self.trains.len());
                self.trains.push(train);
            }
        }
    }

    /// Trains in first-seen order.
    pub fn trains(&self) -> &[Train] {
        &self.trains
    }

    /// Look up a train by number.
    pub fn get(&self, id: &str) -> Option<&Train> {
        self.index.get(id).map(|&position| &self.trains[position])
    }

    /// Number of distinct trains.
    pub fn len(&self) -> usize {
        self.trains.len()
    }

    /// True when no train was read.
    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }

    /// Trains whose origin and destination match case-insensitively.
    pub fn between(&self, origin: &str, destination: &str) -> Vec<Train> {
        let origin = origin.trim().to_lowercase();
        let destination = destination.trim().to_lowercase();
        self.trains
            .iter()
            .filter(|train| {
                train.origin.to_lowercase() == origin
                    && train.destination.to_lowercase() == destination
            })
            .cloned()
            .collect()
    }
}

/// Create the catalog store with its canonical header if it does not exist.
pub fn ensure_catalog(store: &dyn TableStore) -> Result<()> {
    if store.read_all()?.is_none() {
        let header: Vec<String> = CATALOG_HEADER.iter().map(|h| h.to_string()).collect();
        store.rewrite_all(&Table::new(header, Vec::new()))?;
    }
    Ok(())
}
