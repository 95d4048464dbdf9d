//! Registered users, stored as `username,password` rows.
//!
//! The user file has no header row, so the first stored account is read back as the
//! table header and folded into the account list here.

use std::sync::Arc;

use tracing::info;

use crate::{
    error::{BookingError, Result},
    store::{Table, TableStore},
};

/// Registration and login against the user store.
pub struct UserDirectory {
    store: Arc<dyn TableStore>,
}

impl UserDirectory {
    /// Directory backed by `store`.
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Register a new account. The username is trimmed before it is stored.
    pub fn register(&self, username: &str, password: &str) -> Result<String> {
        let username = username.trim();
        let password = password.trim();
        if username.is_empty() {
            return Err(BookingError::EmptyUsername);
        }
        if !is_valid_password(password) {
            return Err(BookingError::WeakPassword);
        }

        let _guard = self.store.lock()?;
        let existing = self.store.read_all()?;
        if let Some(table) = &existing {
            if accounts(table).any(|row| row.first().map(|name| name.trim()) == Some(username)) {
                return Err(BookingError::UsernameTaken(username.to_string()));
            }
        }

        let row = vec![username.to_string(), password.to_string()];
        match existing {
            None => self.store.append(&row, &[])?,
            Some(_) => self.store.append(&[], &[row])?,
        }
        info!(username, "User registered");
        Ok(username.to_string())
    }

    /// True when an account with this username exists.
    pub fn username_exists(&self, username: &str) -> Result<bool> {
        let username = username.trim();
        Ok(self.store.read_all()?.is_some_and(|table| {
            accounts(&table).any(|row| row.first().map(|name| name.trim()) == Some(username))
        }))
    }

    /// Return the username when both fields match a stored account.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<String> {
        let Some(table) = self.store.read_all()? else {
            return Err(BookingError::BadCredentials);
        };
        let matched = accounts(&table).any(|row| {
            row.first().map(String::as_str) == Some(username)
                && row.get(1).map(String::as_str) == Some(password)
        });
        if matched {
            Ok(username.to_string())
        } else {
            Err(BookingError::BadCredentials)
        }
    }
}

/// Passwords need at least one letter and one digit.
pub fn is_valid_password(password: &str) -> bool {
    password.chars().any(char::is_alphabetic) && password.chars().any(|ch| ch.is_ascii_digit())
}

fn accounts(table: &Table) -> impl Iterator<Item = &Vec<String>> {
    std::iter::once(&table.header)
        .filter(|header| !header.is_empty())
        .chain(table.rows.iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CsvFileStore, MemoryStore};
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn register_then_login() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("users.csv");
        let users = UserDirectory::new(Arc::new(CsvFileStore::new(&path)));

        assert_eq!(users.register("  asha ", "secret1")?, "asha");
        users.register("ravi", "pass2word")?;

        assert_eq!(std::fs::read_to_string(&path)?, "asha,secret1\nravi,pass2word\n");
        assert_eq!(users.authenticate("asha", "secret1")?, "asha");
        assert_eq!(users.authenticate("ravi", "pass2word")?, "ravi");
        assert!(matches!(
            users.authenticate("asha", "wrong1"),
            Err(BookingError::BadCredentials)
        ));
        Ok(())
    }

    #[test]
    fn registration_rules() -> Result<()> {
        let users = UserDirectory::new(Arc::new(MemoryStore::new()));
        users.register("asha", "abc123")?;

        assert!(matches!(
            users.register("asha", "xyz789"),
            Err(BookingError::UsernameTaken(_))
        ));
        assert!(matches!(users.register("   ", "abc123"), Err(BookingError::EmptyUsername)));
        assert!(matches!(users.register("ravi", "letters"), Err(BookingError::WeakPassword)));
        assert!(matches!(users.register("ravi", "123456"), Err(BookingError::WeakPassword)));
        assert!(users.username_exists("asha")?);
        assert!(!users.username_exists("ravi")?);
        Ok(())
    }

    #[test]
    fn missing_store_rejects_login() {
        let users = UserDirectory::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            users.authenticate("asha", "abc123"),
            Err(BookingError::BadCredentials)
        ));
    }
}
