//! Shared domain models.

/// Header written when the booking store is created.
pub const BOOKING_HEADER: [&str; 11] = [
    "PNR",
    "Username",
    "Passenger Name",
    "Age",
    "Gender",
    "Source",
    "Destination",
    "Travel Date",
    "Train Name",
    "Train No",
    "Booking Time",
];

/// Column positions inside a booking row.
pub(crate) mod booking_column {
    pub const TICKET_ID: usize = 0;
    pub const USERNAME: usize = 1;
    pub const TRAIN_ID: usize = 9;
}

/// A train as resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Train {
    /// Unique identifier (train number).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Departure station as written in the catalog.
    pub origin: String,
    /// Arrival station as written in the catalog.
    pub destination: String,
    /// Seats still available.
    pub seats: u32,
}

/// One passenger's booked seat.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    /// Generated PNR.
    pub ticket_id: String,
    /// Owner of the booking.
    pub username: String,
    pub passenger_name: String,
    pub age: String,
    pub gender: String,
    pub origin: String,
    pub destination: String,
    /// `DD-MM-YYYY`.
    pub travel_date: String,
    pub train_name: String,
    pub train_id: String,
    /// `YYYY-MM-DD HH:MM:SS`.
    pub created_at: String,
}

impl Ticket {
    /// Serialize into booking-store column order.
    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.ticket_id.clone(),
            self.username.clone(),
            self.passenger_name.clone(),
            self.age.clone(),
            self.gender.clone(),
            self.origin.clone(),
            self.destination.clone(),
            self.travel_date.clone(),
            self.train_name.clone(),
            self.train_id.clone(),
            self.created_at.clone(),
        ]
    }

    /// Rebuild a ticket from a stored row, filling missing columns with empty strings.
    pub fn from_record(row: &[String]) -> Self {
        let field = |index: usize| row.get(index).cloned().unwrap_or_default();
        Self {
            ticket_id: field(0),
            username: field(1),
            passenger_name: field(2),
            age: field(3),
            gender: field(4),
            origin: field(5),
            destination: field(6),
            travel_date: field(7),
            train_name: field(8),
            train_id: field(9),
            created_at: field(10),
        }
    }

    /// `Origin → Destination` label used in listings.
    pub fn route_label(&self) -> String {
        format!("{} → {}", self.origin, self.destination)
    }
}

/// Header row for a freshly created booking store.
pub fn booking_header() -> Vec<String> {
    BOOKING_HEADER.iter().map(|field| field.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_rows_pad_missing_columns() {
        let row = vec!["PNR123456".to_string(), "asha".to_string()];
        let ticket = Ticket::from_record(&row);
        assert_eq!(ticket.ticket_id, "PNR123456");
        assert_eq!(ticket.username, "asha");
        assert!(ticket.train_id.is_empty());
        assert_eq!(ticket.to_record().len(), BOOKING_HEADER.len());
    }
}
