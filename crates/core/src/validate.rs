//! Pure validators for booking input. Callers own any retry loop.

use chrono::{Duration, NaiveDate};

use crate::{
    error::{BookingError, Result},
    models::Train,
    stations::title_case,
};

/// Format used for stored travel dates.
pub const TRAVEL_DATE_FORMAT: &str = "%d-%m-%Y";

/// Exclusive upper bound on passenger age.
pub const MAX_AGE: u32 = 120;

/// Title-case a passenger name made of letters and spaces only.
pub fn validate_name(input: &str) -> Result<String> {
    let name = title_case(input.trim());
    let mut letters = name.chars().filter(|ch| *ch != ' ').peekable();
    if letters.peek().is_none() || !letters.all(char::is_alphabetic) {
        return Err(BookingError::InvalidName);
    }
    Ok(name)
}

/// Accept an age written with digits only, strictly between 0 and 120.
pub fn validate_age(input: &str) -> Result<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(BookingError::InvalidAge);
    }
    match trimmed.parse::<u32>() {
        Ok(age) if age > 0 && age < MAX_AGE => Ok(age),
        _ => Err(BookingError::InvalidAge),
    }
}

/// Gender is free text; only whitespace and case are normalised.
pub fn normalize_gender(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Passenger count in `1..=max` that also fits the seats shown for `train`.
pub fn validate_passenger_count(input: &str, max: u32, train: &Train) -> Result<u32> {
    let count = input
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|count| (1..=max).contains(count))
        .ok_or(BookingError::InvalidPassengerCount {
            max,
            available: train.seats,
        })?;
    if count > train.seats {
        return Err(BookingError::InsufficientSeats {
            train_id: train.id.clone(),
            requested: count,
            available: train.seats,
        });
    }
    Ok(count)
}

/// Resolve a 1-based menu answer into a zero-based index below `len`.
pub fn parse_menu_choice(input: &str, len: usize) -> Result<usize> {
    match input.trim().parse::<usize>() {
        Ok(choice) if (1..=len).contains(&choice) => Ok(choice - 1),
        _ => Err(BookingError::InvalidChoice(len)),
    }
}

/// Bookable dates: `today` and the following `days - 1` days.
pub fn travel_dates(today: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..days)
        .map(|offset| today + Duration::days(i64::from(offset)))
        .collect()
}

/// Pick a travel date from the 1-based menu built by [`travel_dates`].
pub fn select_travel_date(input: &str, today: NaiveDate, days: u32) -> Result<NaiveDate> {
    let dates = travel_dates(today, days);
    let index = parse_menu_choice(input, dates.len())?;
    Ok(dates[index])
}

/// `DD-MM-YYYY` rendering of a travel date.
pub fn format_travel_date(date: NaiveDate) -> String {
    date.format(TRAVEL_DATE_FORMAT).to_string()
}
