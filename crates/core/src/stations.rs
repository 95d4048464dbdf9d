//! Station index derived from the catalog on every load.

use std::collections::BTreeSet;

use crate::models::Train;

/// Capitalise the first letter of every word and lowercase the rest.
///
/// A word starts after any non-alphabetic character, so `new-delhi` becomes `New-Delhi`.
pub fn title_case(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut previous_is_letter = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            output.push(ch);
            previous_is_letter = false;
        }
    }
    output
}

/// Sorted, de-duplicated, title-cased origins and destinations.
pub fn unique_stations(trains: &[Train]) -> Vec<String> {
    let stations: BTreeSet<String> = trains
        .iter()
        .flat_map(|train| [train.origin.trim(), train.destination.trim()])
        .filter(|station| !station.is_empty())
        .map(title_case)
        .collect();
    stations.into_iter().collect()
}

/// Destinations reachable directly from `origin`, compared case-insensitively.
///
/// An empty or unknown origin yields an empty list.
pub fn destinations_from(trains: &[Train], origin: &str) -> Vec<String> {
    let needle = origin.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let destinations: BTreeSet<String> = trains
        .iter()
        .filter(|train| train.origin.trim().to_lowercase() == needle)
        .map(|train| train.destination.trim())
        .filter(|destination| !destination.is_empty())
        .map(title_case)
        .collect();
    destinations.into_iter().collect()
}
