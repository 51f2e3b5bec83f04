//! Reference and account number generation
//!
//! Transaction references are `{prefix}{micros:016}`: the prefix followed by
//! the clock in microseconds since the epoch, zero padded. Each generator
//! hands out strictly increasing values, and every candidate is checked
//! against the store before it is used.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use tracing::warn;

use crate::domain::result::{Error, Result};

/// Default transaction reference prefix
pub const DEFAULT_REFERENCE_PREFIX: &str = "TXN";

/// Account number prefix, followed by 8 random digits
pub const ACCOUNT_NUMBER_PREFIX: &str = "ACC";

/// Attempts before giving up on finding an unused value
const MAX_ATTEMPTS: u32 = 100;

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Generates unique transaction reference numbers
pub struct ReferenceGenerator {
    prefix: String,
    last: AtomicU64,
    clock: Clock,
    pattern: Regex,
}

impl ReferenceGenerator {
    pub fn new(prefix: &str) -> Result<Self> {
        Self::with_clock(prefix, Arc::new(Utc::now))
    }

    /// Generator reading time from `clock` instead of the system clock
    pub fn with_clock(prefix: &str, clock: Clock) -> Result<Self> {
        let valid_prefix = Regex::new(r"^[A-Z]{2,8}$")
            .map_err(|e| Error::Other(e.to_string()))?;
        if !valid_prefix.is_match(prefix) {
            return Err(Error::config(format!(
                "Reference prefix must be 2 to 8 uppercase letters, got '{}'",
                prefix
            )));
        }

        let pattern = Regex::new(&format!(r"^{}\d{{16}}$", regex::escape(prefix)))
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self {
            prefix: prefix.to_string(),
            last: AtomicU64::new(0),
            clock,
            pattern,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Produce a reference for which `exists` returned false
    pub fn generate<F>(&self, mut exists: F) -> Result<String>
    where
        F: FnMut(&str) -> Result<bool>,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let candidate = self.next_candidate();
            if !exists(&candidate)? {
                return Ok(candidate);
            }
            warn!(reference = %candidate, attempt, "reference number collision, retrying");
        }
        Err(Error::database(format!(
            "Could not allocate a unique reference number after {} attempts",
            MAX_ATTEMPTS
        )))
    }

    /// Whether `reference` has this generator's shape
    pub fn is_valid(&self, reference: &str) -> bool {
        self.pattern.is_match(reference)
    }

    fn next_candidate(&self) -> String {
        let now = (self.clock)().timestamp_micros().max(0) as u64;
        let mut current = self.last.load(Ordering::SeqCst);
        let value = loop {
            let next = now.max(current + 1);
            match self
                .last
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break next,
                Err(actual) => current = actual,
            }
        };
        format!("{}{:016}", self.prefix, value)
    }
}

/// Produce an `ACC` + 8 digit account number for which `exists` returned false
pub fn generate_account_number<F>(mut exists: F) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    let mut rng = rand::thread_rng();
    for attempt in 1..=MAX_ATTEMPTS {
        let candidate = format!(
            "{}{:08}",
            ACCOUNT_NUMBER_PREFIX,
            rng.gen_range(0..100_000_000u32)
        );
        if !exists(&candidate)? {
            return Ok(candidate);
        }
        warn!(account_number = %candidate, attempt, "account number collision, retrying");
    }
    Err(Error::database(format!(
        "Could not allocate a unique account number after {} attempts",
        MAX_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::thread;

    fn frozen_clock() -> Clock {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Arc::new(move || at)
    }

    #[test]
    fn test_format() {
        let generator = ReferenceGenerator::new(DEFAULT_REFERENCE_PREFIX).unwrap();
        let reference = generator.generate(|_| Ok(false)).unwrap();

        assert!(reference.starts_with("TXN"));
        assert_eq!(reference.len(), 3 + 16);
        assert!(generator.is_valid(&reference));
        assert!(!generator.is_valid("TXN123"));
        assert!(!generator.is_valid("REF0000000000000001"));
    }

    #[test]
    fn test_rejects_bad_prefix() {
        assert!(ReferenceGenerator::new("txn").is_err());
        assert!(ReferenceGenerator::new("T").is_err());
        assert!(ReferenceGenerator::new("TX-1").is_err());
    }

    #[test]
    fn test_frozen_clock_still_increases() {
        let generator = ReferenceGenerator::with_clock("TXN", frozen_clock()).unwrap();
        let first = generator.generate(|_| Ok(false)).unwrap();
        let second = generator.generate(|_| Ok(false)).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_retries_on_collision() {
        let generator = ReferenceGenerator::with_clock("TXN", frozen_clock()).unwrap();
        let taken = generator.generate(|_| Ok(false)).unwrap();

        // Reset so the next candidate repeats the taken value first
        generator.last.store(0, Ordering::SeqCst);

        let mut checks = 0;
        let fresh = generator
            .generate(|candidate| {
                checks += 1;
                Ok(candidate == taken)
            })
            .unwrap();
        assert_eq!(checks, 2);
        assert_ne!(fresh, taken);
    }

    #[test]
    fn test_gives_up_when_everything_is_taken() {
        let generator = ReferenceGenerator::new("TXN").unwrap();
        assert!(generator.generate(|_| Ok(true)).is_err());
    }

    #[test]
    fn test_concurrent_generation_is_unique() {
        let generator = Arc::new(ReferenceGenerator::with_clock("TXN", frozen_clock()).unwrap());
        let seen = Arc::new(Mutex::new(HashSet::new()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                let seen = seen.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let reference = generator.generate(|_| Ok(false)).unwrap();
                        assert!(seen.lock().unwrap().insert(reference));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(seen.lock().unwrap().len(), 4000);
    }

    #[test]
    fn test_account_number_format() {
        let number = generate_account_number(|_| Ok(false)).unwrap();
        assert!(number.starts_with(ACCOUNT_NUMBER_PREFIX));
        assert_eq!(number.len(), 11);
        assert!(number[3..].chars().all(|c| c.is_ascii_digit()));
    }
}
