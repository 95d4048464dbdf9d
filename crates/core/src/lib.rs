#![warn(clippy::all, missing_docs)]

//! Core domain logic for the railbook reservation console.
//!
//! This crate hosts the train catalog reader, the seat ledger, the booking
//! engine, cancellation and the persistence layer used by the terminal
//! frontend.

pub mod admin;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod picker;
pub mod pnr;
pub mod reservations;
pub mod stations;
pub mod store;
pub mod users;
pub mod validate;

pub use booking::{BookingEngine, BookingReceipt, BookingRequest, BookingSettings, Passenger, Route};
pub use catalog::Catalog;
pub use config::AppConfig;
pub use error::{BookingError, Result};
pub use ledger::SeatLedger;
pub use models::{Ticket, Train};
pub use picker::{PlainPicker, StationPicker};
pub use reservations::{Cancellation, Reservations};
pub use store::{CsvFileStore, MemoryStore, Table, TableStore};
pub use users::UserDirectory;
