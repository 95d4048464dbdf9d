use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use railbook_core::{
    admin::{admin_login, CatalogEditor},
    booking::{BookingEngine, BookingRequest, BookingSettings, Passenger},
    reservations::{parse_selection, Reservations},
    validate::{
        format_travel_date, normalize_gender, parse_menu_choice, select_travel_date, validate_age,
        validate_name,
    },
    users::is_valid_password,
    AppConfig, BookingError, SeatLedger, TableStore, Ticket, UserDirectory,
};
use tracing::{error, info};

use crate::picker::ShellPicker;

const BOOKING_COLUMNS: [&str; 6] = [
    "SL No.",
    "PNR",
    "Journey Date",
    "From → To",
    "Train Name",
    "Train No.",
];

/// Stores the shell operates on.
pub struct Stores {
    pub catalog: Arc<dyn TableStore>,
    pub bookings: Arc<dyn TableStore>,
    pub users: Arc<dyn TableStore>,
}

/// Menu-driven console. Owns every retry loop; the core only validates.
pub struct Shell<R, W> {
    input: R,
    output: W,
    rich_input: bool,
    admin: (String, String),
    users: UserDirectory,
    engine: BookingEngine,
    reservations: Reservations,
    editor: CatalogEditor,
    clock: fn() -> NaiveDateTime,
}

impl<R: BufRead, W: Write> Shell<R, W> {
    pub fn new(input: R, output: W, config: &AppConfig, stores: Stores, rich_input: bool) -> Self {
        let ledger = SeatLedger::new(stores.catalog.clone());
        Self {
            input,
            output,
            rich_input,
            admin: (config.admin_username.clone(), config.admin_password.clone()),
            users: UserDirectory::new(stores.users),
            engine: BookingEngine::new(
                stores.catalog.clone(),
                stores.bookings.clone(),
                BookingSettings::from(config),
            ),
            reservations: Reservations::new(stores.bookings, ledger),
            editor: CatalogEditor::new(stores.catalog),
            clock: || Local::now().naive_local(),
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Run the main menu until the user exits or input closes.
    pub fn run(&mut self) -> Result<()> {
        match self.main_menu() {
            Err(err) if is_closed_input(&err) => {
                info!("Input closed, leaving");
                Ok(())
            }
            other => other,
        }
    }

    fn main_menu(&mut self) -> Result<()> {
        self.say("\n=== Railway Reservation System ===")?;
        loop {
            self.say("\n1. Register\n2. Login\n3. Admin\n4. Exit")?;
            let result = match self.ask("Enter your choice: ")?.as_str() {
                "1" => self.register(),
                "2" => self.login(),
                "3" => self.admin(),
                "4" => {
                    self.say("Goodbye!")?;
                    return Ok(());
                }
                _ => self.say("Invalid choice. Try again."),
            };
            self.recover(result)?;
        }
    }

    /// Report a failed operation and stay in the menu; only closed input ends the session.
    fn recover(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(err) if is_closed_input(&err) => Err(err),
            Err(err) => {
                error!(error = %err, "Operation failed");
                self.say(&format!("Error: {err}"))
            }
        }
    }

    fn register(&mut self) -> Result<()> {
        let username = loop {
            let answer = self.ask("Choose a username: ")?;
            if answer.is_empty() {
                self.say(&BookingError::EmptyUsername.to_string())?;
            } else if self.users.username_exists(&answer)? {
                self.say(&BookingError::UsernameTaken(answer).to_string())?;
            } else {
                break answer;
            }
        };
        let password = loop {
            let answer = self.ask("Choose a password (letters and numbers): ")?;
            if is_valid_password(&answer) {
                break answer;
            }
            self.say(&BookingError::WeakPassword.to_string())?;
        };
        match self.users.register(&username, &password) {
            Ok(_) => {
                self.say("Registration successful. Please log in.")?;
                self.login()
            }
            Err(err) => self.say(&format!("Registration failed: {err}")),
        }
    }

    fn login(&mut self) -> Result<()> {
        let username = self.ask("Username: ")?;
        let password = self.ask("Password: ")?;
        match self.users.authenticate(&username, &password) {
            Ok(user) => {
                info!(username = %user, "User logged in");
                self.say(&format!("Welcome, {user}!"))?;
                self.user_menu(&user)
            }
            Err(err) => self.say(&format!("Login failed: {err}")),
        }
    }

    fn user_menu(&mut self, username: &str) -> Result<()> {
        loop {
            self.say("\n1. Book Ticket\n2. View Bookings\n3. Cancel Booking\n4. Logout")?;
            let result = match self.ask("Enter your choice: ")?.as_str() {
                "1" => self.book(username),
                "2" => self.view_bookings(username),
                "3" => self.cancel(username),
                "4" => {
                    self.say("Logged out.")?;
                    return Ok(());
                }
                _ => self.say("Invalid choice. Try again."),
            };
            self.recover(result)?;
        }
    }

    fn book(&mut self, username: &str) -> Result<()> {
        let route = {
            let mut picker = ShellPicker::new(self.rich_input, &mut self.input, &mut self.output);
            self.engine.select_route(&mut picker)
        };
        let route = match route {
            Ok(route) => route,
            Err(BookingError::Io(err)) => return Err(err.into()),
            Err(err) => return self.say(&err.to_string()),
        };

        self.say(&format!(
            "\nAvailable trains from {} to {}:",
            route.origin, route.destination
        ))?;
        for (number, train) in route.trains.iter().enumerate() {
            self.say(&format!(
                "{}. {} ({}) - Seats: {}",
                number + 1,
                train.name,
                train.id,
                train.seats
            ))?;
        }
        let train = loop {
            let answer = self.ask("Select train number: ")?;
            match parse_menu_choice(&answer, route.trains.len()) {
                Ok(index) => break route.trains[index].clone(),
                Err(err) => self.say(&err.to_string())?,
            }
        };

        let count = loop {
            let answer = self.ask(&format!(
                "Number of passengers (max {}): ",
                self.engine.settings().max_passengers
            ))?;
            match self.engine.passenger_count(&answer, &train) {
                Ok(count) => break count,
                Err(err) => self.say(&err.to_string())?,
            }
        };

        let now = (self.clock)();
        let today = now.date();
        let days = self.engine.settings().window_days;
        self.say("\nSelect travel date:")?;
        for (number, date) in self.engine.travel_dates(today).iter().enumerate() {
            self.say(&format!("{}. {}", number + 1, format_travel_date(*date)))?;
        }
        let travel_date = loop {
            let answer = self.ask("Enter choice: ")?;
            match select_travel_date(&answer, today, days) {
                Ok(date) => break date,
                Err(err) => self.say(&err.to_string())?,
            }
        };

        let mut passengers = Vec::with_capacity(count as usize);
        for number in 1..=count {
            self.say(&format!("\nPassenger {number}"))?;
            let name = loop {
                let answer = self.ask("Name: ")?;
                match validate_name(&answer) {
                    Ok(name) => break name,
                    Err(err) => self.say(&err.to_string())?,
                }
            };
            let age = loop {
                let answer = self.ask("Age: ")?;
                match validate_age(&answer) {
                    Ok(age) => break age,
                    Err(err) => self.say(&err.to_string())?,
                }
            };
            let gender = normalize_gender(&self.ask("Gender (M/F/O): ")?);
            passengers.push(Passenger { name, age, gender });
        }

        let request = BookingRequest {
            username: username.to_string(),
            origin: route.origin,
            destination: route.destination,
            train,
            travel_date,
            passengers,
        };
        match self.engine.commit(&request, (self.clock)()) {
            Ok(receipt) => {
                self.say("\nBooking successful!")?;
                for ticket in &receipt.tickets {
                    self.say(&format!("  {}  {}", ticket.ticket_id, ticket.passenger_name))?;
                }
                self.say(&format!("Seats left on {}: {}", request.train.name, receipt.seats_left))
            }
            Err(err) => {
                error!(?err, username, "Booking failed");
                self.say(&format!("Booking failed: {err}"))
            }
        }
    }

    fn view_bookings(&mut self, username: &str) -> Result<()> {
        let tickets = self.reservations.list(username)?;
        if tickets.is_empty() {
            return self.say("No active bookings.");
        }
        self.say(&render_bookings(&tickets))
    }

    fn cancel(&mut self, username: &str) -> Result<()> {
        let tickets = self.reservations.list(username)?;
        if tickets.is_empty() {
            return self.say("No active bookings.");
        }
        self.say(&render_bookings(&tickets))?;

        let answer = self.ask("Enter booking numbers to cancel (e.g. 1,3 or 2-4, 0 to go back): ")?;
        let indices = match parse_selection(&answer, tickets.len()) {
            Ok(Some(indices)) => indices,
            Ok(None) => return Ok(()),
            Err(err) => return self.say(&err.to_string()),
        };

        let outcome = self.reservations.cancel(username, &indices)?;
        if outcome.is_empty() {
            return self.say("No valid bookings selected.");
        }
        for ticket in &outcome.tickets {
            self.say(&format!("Cancelled {}", ticket.ticket_id))?;
        }
        for restore in &outcome.restored {
            if !restore.applied {
                self.say(&format!(
                    "Train {} is no longer listed; {} seat(s) could not be returned.",
                    restore.train_id, restore.seats
                ))?;
            }
        }
        Ok(())
    }

    fn admin(&mut self) -> Result<()> {
        let username = self.ask("Admin username: ")?;
        let password = self.ask("Admin password: ")?;
        let expected = (self.admin.0.as_str(), self.admin.1.as_str());
        if let Err(err) = admin_login(expected, &username, &password) {
            return self.say(&format!("Admin login failed: {err}"));
        }
        info!("Administrator logged in");

        loop {
            self.say("\n1. Add Train\n2. View Trains\n3. Exit")?;
            let result = match self.ask("Enter your choice: ")?.as_str() {
                "1" => self.add_train(),
                "2" => self.view_trains(),
                "3" => return Ok(()),
                _ => self.say("Invalid choice. Try again."),
            };
            self.recover(result)?;
        }
    }

    fn add_train(&mut self) -> Result<()> {
        let train_no = self.ask("Train number: ")?;
        let name = self.ask("Train name: ")?;
        let source = self.ask("Source: ")?;
        let destination = self.ask("Destination: ")?;
        let seats = self.ask("Seats: ")?;
        match self
            .editor
            .add_train(&train_no, &name, &source, &destination, &seats)
        {
            Ok(train) => self.say(&format!("Train {} added.", train.id)),
            Err(err) => self.say(&err.to_string()),
        }
    }

    fn view_trains(&mut self) -> Result<()> {
        let table = self.editor.catalog_rows()?;
        if table.is_empty() {
            return self.say("No trains in the catalog.");
        }
        let header: Vec<&str> = table.header.iter().map(String::as_str).collect();
        self.say(&render_table(&header, &table.rows))
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed").into());
        }
        Ok(line.trim().to_string())
    }

    fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{message}")?;
        Ok(())
    }
}

fn is_closed_input(err: &anyhow::Error) -> bool {
    let closed = |err: &io::Error| {
        matches!(
            err.kind(),
            io::ErrorKind::UnexpectedEof | io::ErrorKind::Interrupted
        )
    };
    err.chain().any(|cause| {
        cause.downcast_ref::<io::Error>().is_some_and(closed)
            || matches!(cause.downcast_ref::<BookingError>(), Some(BookingError::Io(io)) if closed(io))
    })
}

fn render_bookings(tickets: &[Ticket]) -> String {
    let rows: Vec<Vec<String>> = tickets
        .iter()
        .enumerate()
        .map(|(number, ticket)| {
            vec![
                (number + 1).to_string(),
                ticket.ticket_id.clone(),
                ticket.travel_date.clone(),
                ticket.route_label(),
                ticket.train_name.clone(),
                ticket.train_id.clone(),
            ]
        })
        .collect();
    render_table(&BOOKING_COLUMNS, &rows)
}

/// Left-aligned text table sized to the widest cell of each column.
fn render_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|cell| cell.chars().count()).collect();
    for row in rows {
        for (column, cell) in row.iter().enumerate() {
            let width = cell.chars().count();
            match widths.get_mut(column) {
                Some(current) => *current = (*current).max(width),
                None => widths.push(width),
            }
        }
    }

    let mut lines = vec![format_row(header.iter().copied(), &widths)];
    lines.push("-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
    for row in rows {
        lines.push(format_row(row.iter().map(String::as_str), &widths));
    }
    lines.join("\n")
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .enumerate()
        .map(|(column, cell)| format!("{cell:<width$}", width = widths[column]))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}
