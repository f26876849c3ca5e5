use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::LastSuccessful;

/// Last authentication method that worked, per user.
#[derive(Debug, Default)]
pub struct MethodMemory {
    methods: Mutex<HashMap<String, String>>,
}

impl MethodMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a report. A success remembers the method; a failure of the
    /// remembered method forgets it so the next attempt starts fresh.
    pub fn record(&self, report: &LastSuccessful) {
        let mut methods = self.methods.lock().unwrap_or_else(PoisonError::into_inner);
        if report.error.is_empty() {
            methods.insert(report.username.clone(), report.method.clone());
        } else if methods.get(&report.username) == Some(&report.method) {
            methods.remove(&report.username);
        }
    }

    /// Remembered method for `username`, empty when unknown.
    pub fn get(&self, username: &str) -> String {
        self.methods
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .cloned()
            .unwrap_or_default()
    }
}
