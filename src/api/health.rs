//! Shared health state for the /health endpoint.
//! Updated by the fetchers and the orchestrator, read by the API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct HealthState {
    /// Pages fetched successfully.
    pub fetch_ok: AtomicU64,
    /// Pages given up on after the last retry.
    pub fetch_failed: AtomicU64,
    /// Individual retry attempts (not counting first attempts).
    pub fetch_retries: AtomicU64,
    /// Nanosecond timestamp of the last finished scrape run (0 = none).
    pub last_scrape_at_ns: AtomicU64,
    pub scrape_running: AtomicBool,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub fetch_ok: u64,
    pub fetch_failed: u64,
    pub fetch_retries: u64,
    pub last_scrape_at_ns: Option<u64>,
    pub scrape_running: bool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_fetch_ok(&self) {
        self.fetch_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fetch_failed(&self) {
        self.fetch_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fetch_retries(&self) {
        self.fetch_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_scrape_running(&self, v: bool) {
        self.scrape_running.store(v, Ordering::Relaxed);
    }

    pub fn set_last_scrape_at_ns(&self, ns: u64) {
        self.last_scrape_at_ns.store(ns, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let last = self.last_scrape_at_ns.load(Ordering::Relaxed);
        HealthSnapshot {
            fetch_ok: self.fetch_ok.load(Ordering::Relaxed),
            fetch_failed: self.fetch_failed.load(Ordering::Relaxed),
            fetch_retries: self.fetch_retries.load(Ordering::Relaxed),
            last_scrape_at_ns: (last > 0).then_some(last),
            scrape_running: self.scrape_running.load(Ordering::Relaxed),
        }
    }
}
