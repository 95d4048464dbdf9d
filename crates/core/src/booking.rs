//! Booking engine: route selection and ticket issuance.
//!
//! The engine re-reads the catalog for every step. Seats are reserved before any
//! ticket row is written, and released again if the rows cannot be stored.

use std::{collections::HashSet, sync::Arc};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{error, info};

use crate::{
    catalog::Catalog,
    config::AppConfig,
    error::{BookingError, Result},
    ledger::SeatLedger,
    models::{booking_column, booking_header, Ticket, Train},
    picker::StationPicker,
    pnr::PnrGenerator,
    store::TableStore,
    stations::{destinations_from, unique_stations},
    validate::{self, format_travel_date},
};

/// Format of the creation timestamp stored with each ticket.
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Limits applied to every booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingSettings {
    /// Most passengers per booking.
    pub max_passengers: u32,
    /// Number of bookable days starting today.
    pub window_days: u32,
    /// Prefix of generated PNRs.
    pub pnr_prefix: String,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            max_passengers: 6,
            window_days: 7,
            pnr_prefix: "PNR".to_string(),
        }
    }
}

impl From<&AppConfig> for BookingSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_passengers: config.max_passengers,
            window_days: config.booking_window_days,
            pnr_prefix: config.pnr_prefix.clone(),
        }
    }
}

/// Origin, destination and the trains running between them.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub origin: String,
    pub destination: String,
    /// Trains in catalog order with the seat counts seen at listing time.
    pub trains: Vec<Train>,
}

/// A validated passenger.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passenger {
    pub name: String,
    pub age: u32,
    pub gender: String,
}

impl Passenger {
    /// Validate raw answers into a passenger.
    pub fn new(name: &str, age: &str, gender: &str) -> Result<Self> {
        Ok(Self {
            name: validate::validate_name(name)?,
            age: validate::validate_age(age)?,
            gender: validate::normalize_gender(gender),
        })
    }
}

/// Everything needed to issue tickets for one booking.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub username: String,
    pub origin: String,
    pub destination: String,
    /// Train as listed to the user.
    pub train: Train,
    pub travel_date: NaiveDate,
    pub passengers: Vec<Passenger>,
}

/// Outcome of a committed booking.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct BookingReceipt {
    /// One ticket per passenger, in passenger order.
    pub tickets: Vec<Ticket>,
    /// Seats left on the train after the reservation.
    pub seats_left: u32,
    pub created_at: String,
}

/// Orchestrates a booking against the catalog and booking stores.
pub struct BookingEngine {
    catalog: Arc<dyn TableStore>,
    bookings: Arc<dyn TableStore>,
    ledger: SeatLedger,
    settings: BookingSettings,
}

impl BookingEngine {
    /// Engine over the given stores.
    pub fn new(
        catalog: Arc<dyn TableStore>,
        bookings: Arc<dyn TableStore>,
        settings: BookingSettings,
    ) -> Self {
        let ledger = SeatLedger::new(catalog.clone());
        Self {
            catalog,
            bookings,
            ledger,
            settings,
        }
    }

    /// Active limits.
    pub fn settings(&self) -> &BookingSettings {
        &self.settings
    }

    /// Fresh catalog snapshot; an empty catalog is an error here.
    pub fn load_catalog(&self) -> Result<Catalog> {
        let catalog = Catalog::load(self.catalog.as_ref())?;
        if catalog.is_empty() {
            return Err(BookingError::EmptyCatalog);
        }
        Ok(catalog)
    }

    /// Every station named in the catalog, sorted and title-cased.
    pub fn load_stations(&self) -> Result<Vec<String>> {
        let stations = unique_stations(self.load_catalog()?.trains());
        if stations.is_empty() {
            return Err(BookingError::NoStations);
        }
        Ok(stations)
    }

    /// Destinations reachable from `origin`; empty when nothing departs there.
    pub fn destinations_from_origin(&self, origin: &str) -> Result<Vec<String>> {
        Ok(destinations_from(self.load_catalog()?.trains(), origin))
    }

    /// Pick origin and destination through `picker` and list the trains between them.
    pub fn select_route(&self, picker: &mut dyn StationPicker) -> Result<Route> {
        let stations = self.load_stations()?;
        let origin = picker.pick("Enter Source Station (type to search): ", &stations)?;
        let destinations = self.destinations_from_origin(&origin)?;
        if destinations.is_empty() {
            return Err(BookingError::NoRoute(origin));
        }

        let prompt = format!("Enter Destination Station (from {origin}): ");
        let destination = picker.pick(&prompt, &destinations)?;
        if origin.to_lowercase() == destination.to_lowercase() {
            return Err(BookingError::SameStation);
        }

        let trains = self.load_catalog()?.between(&origin, &destination);
        if trains.is_empty() {
            return Err(BookingError::NoTrains {
                origin,
                destination,
            });
        }
        Ok(Route {
            origin,
            destination,
            trains,
        })
    }

    /// Bookable dates starting at `today`.
    pub fn travel_dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        validate::travel_dates(today, self.settings.window_days)
    }

    /// Validate a passenger count against the limit and the listed seats.
    pub fn passenger_count(&self, input: &str, train: &Train) -> Result<u32> {
        validate::validate_passenger_count(input, self.settings.max_passengers, train)
    }

    /// Reserve seats and write one ticket row per passenger.
    ///
    /// Capacity is checked against the live catalog, not the listing snapshot. If the
    /// ticket rows cannot be written the reserved seats are returned.
    pub fn commit(&self, request: &BookingRequest, now: NaiveDateTime) -> Result<BookingReceipt> {
        let count = request.passengers.len() as u32;
        if count == 0 || count > self.settings.max_passengers {
            return Err(BookingError::InvalidPassengerCount {
                max: self.settings.max_passengers,
                available: request.train.seats,
            });
        }
        let window = self.travel_dates(now.date());
        if !window.contains(&request.travel_date) {
            return Err(BookingError::InvalidTravelDate(self.settings.window_days));
        }

        let seats_left = self.ledger.reserve(&request.train.id, count)?;
        let created_at = now.format(CREATED_AT_FORMAT).to_string();

        match self.issue_tickets(request, &created_at) {
            Ok(tickets) => {
                info!(
                    username = %request.username,
                    train_id = %request.train.id,
                    passengers = count,
                    "Booking committed"
                );
                Ok(BookingReceipt {
                    tickets,
                    seats_left,
                    created_at,
                })
            }
            Err(err) => {
                error!(?err, train_id = %request.train.id, "Ticket write failed; releasing seats");
                if let Err(restore_err) = self.ledger.restore(&request.train.id, count) {
                    error!(
                        ?restore_err,
                        train_id = %request.train.id,
                        seats = count,
                        "Failed to release seats after ticket write failure"
                    );
                }
                Err(err)
            }
        }
    }

    fn issue_tickets(&self, request: &BookingRequest, created_at: &str) -> Result<Vec<Ticket>> {
        let _guard = self.bookings.lock()?;
        let taken: HashSet<String> = self
            .bookings
            .read_all()?
            .map(|table| {
                table
                    .rows
                    .into_iter()
                    .filter_map(|row| row.into_iter().nth(booking_column::TICKET_ID))
                    .collect()
            })
            .unwrap_or_default();
        let mut pnrs = PnrGenerator::new(self.settings.pnr_prefix.clone(), taken);

        let travel_date = format_travel_date(request.travel_date);
        let tickets: Vec<Ticket> = request
            .passengers
            .iter()
            .map(|passenger| Ticket {
                ticket_id: pnrs.next_pnr(),
                username: request.username.clone(),
                passenger_name: passenger.name.clone(),
                age: passenger.age.to_string(),
                gender: passenger.gender.clone(),
                origin: request.origin.clone(),
                destination: request.destination.clone(),
                travel_date: travel_date.clone(),
                train_name: request.train.name.clone(),
                train_id: request.train.id.clone(),
                created_at: created_at.to_string(),
            })
            .collect();

        let rows: Vec<Vec<String>> = tickets.iter().map(Ticket::to_record).collect();
        self.bookings.append(&booking_header(), &rows)?;
        Ok(tickets)
    }
}
