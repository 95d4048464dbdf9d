//! Error taxonomy shared by every booking operation.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, BookingError>;

/// Failures surfaced by the catalog, ledger, booking, and user stores.
#[derive(Debug, Error)]
pub enum BookingError {
    /// The catalog holds no trains.
    #[error("no trains available, please contact the administrator")]
    EmptyCatalog,

    /// Trains exist but none carries a station name.
    #[error("no station data available")]
    NoStations,

    /// Nothing departs from the chosen origin.
    #[error("no destinations found departing from {0}")]
    NoRoute(String),

    /// Origin and destination resolved to the same station.
    #[error("source and destination cannot be the same")]
    SameStation,

    /// No train runs between the two stations.
    #[error("no trains found from {origin} to {destination}")]
    NoTrains {
        /// Chosen origin.
        origin: String,
        /// Chosen destination.
        destination: String,
    },

    /// The train identifier is not present in the catalog.
    #[error("train {0} not found in the catalog")]
    UnknownTrain(String),

    /// Not enough seats left to satisfy the request.
    #[error("only {available} seats available on train {train_id}, requested {requested}")]
    InsufficientSeats {
        /// Train being reserved.
        train_id: String,
        /// Seats asked for.
        requested: u32,
        /// Seats currently left.
        available: u32,
    },

    /// Passenger count outside the allowed window.
    #[error("passenger count must be between 1 and {max}, with at most {available} seats available")]
    InvalidPassengerCount {
        /// Upper bound per booking.
        max: u32,
        /// Seats shown for the train.
        available: u32,
    },

    /// Passenger name contains something other than letters and spaces.
    #[error("name should contain only letters and spaces")]
    InvalidName,

    /// Passenger age is not an integer between 1 and 119.
    #[error("age should be a number between 1 and 119")]
    InvalidAge,

    /// Travel date outside the booking window.
    #[error("travel date must fall within the next {0} days")]
    InvalidTravelDate(u32),

    /// A numbered menu choice was not a number in range.
    #[error("choose a number between 1 and {0}")]
    InvalidChoice(usize),

    /// A cancellation selection could not be parsed.
    #[error("invalid selection {0:?}, use numbers like '1', '1,3' or '2-4'")]
    InvalidSelection(String),

    /// Registration with a username already in the user store.
    #[error("username {0} is already taken")]
    UsernameTaken(String),

    /// Registration with a blank username.
    #[error("username cannot be empty")]
    EmptyUsername,

    /// Password without at least one letter and one digit.
    #[error("password must contain both letters and numbers")]
    WeakPassword,

    /// Username and password did not match a stored account.
    #[error("the username or password is incorrect")]
    BadCredentials,

    /// A catalog entry failed editor validation.
    #[error("invalid train record: {0}")]
    InvalidTrain(String),

    /// Another process holds the store lock.
    #[error(
        "timed out waiting for lock {}; if no other railbook session is running, delete that file",
        .0.display()
    )]
    LockTimeout(PathBuf),

    /// Underlying file failure.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Malformed delimited data.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
