// src/enrich/killswitch.rs
//! Per-provider failure accounting with a run-scoped kill switch.
//!
//! Once at least `min_calls` calls have completed and the failure rate
//! exceeds `rate`, the guard trips and stays tripped for the rest of the run.
//! Calls that were never made (kill switch, deadline) are counted as skipped
//! and do not move the rate.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::warn;

use crate::article::FallbackReason;
use crate::error::Stage;
use crate::metrics::{
    KILLSWITCH_TRIPS_TOTAL, PROVIDER_CALLS_TOTAL, PROVIDER_FAILURES_TOTAL,
};

/// Snapshot of one provider's activity during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub provider: String,
    pub stage: String,
    /// Calls actually made (success or failure).
    pub calls: u32,
    pub failures: u32,
    /// Calls not made because of the kill switch or the run deadline.
    pub skipped: u32,
    /// Articles that ended up with fallback data.
    pub fallbacks: u32,
    pub tripped: bool,
}

impl ProviderStats {
    pub fn failure_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.failures as f64 / self.calls as f64
        }
    }
}

#[derive(Debug, Default)]
struct GuardState {
    calls: u32,
    failures: u32,
    skipped: u32,
    fallbacks: u32,
    tripped: bool,
}

#[derive(Debug)]
pub struct ProviderGuard {
    provider: String,
    stage: Stage,
    rate: f64,
    min_calls: u32,
    state: Mutex<GuardState>,
}

impl ProviderGuard {
    pub fn new(provider: impl Into<String>, stage: Stage, rate: f64, min_calls: u32) -> Self {
        Self {
            provider: provider.into(),
            stage,
            rate,
            min_calls,
            state: Mutex::new(GuardState::default()),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut GuardState) -> R) -> R {
        let mut g = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut g)
    }

    pub fn is_tripped(&self) -> bool {
        self.with_state(|s| s.tripped)
    }

    /// Ask for permission to call the provider. A tripped guard answers with
    /// the fallback reason and counts the skip.
    pub fn admit(&self) -> Result<(), FallbackReason> {
        self.with_state(|s| {
            if s.tripped {
                s.skipped += 1;
                Err(FallbackReason::KillSwitch)
            } else {
                Ok(())
            }
        })
    }

    /// Count a call that was never made for another reason (deadline).
    pub fn record_skipped(&self) {
        self.with_state(|s| s.skipped += 1);
    }

    pub fn record_success(&self) {
        counter!(PROVIDER_CALLS_TOTAL, "provider" => self.provider.clone(), "stage" => self.stage.as_str())
            .increment(1);
        self.with_state(|s| s.calls += 1);
    }

    /// Count a failed call. Returns `true` when this failure tripped the switch.
    pub fn record_failure(&self) -> bool {
        counter!(PROVIDER_CALLS_TOTAL, "provider" => self.provider.clone(), "stage" => self.stage.as_str())
            .increment(1);
        counter!(PROVIDER_FAILURES_TOTAL, "provider" => self.provider.clone(), "stage" => self.stage.as_str())
            .increment(1);
        let tripped_now = self.with_state(|s| {
            s.calls += 1;
            s.failures += 1;
            if s.tripped || s.calls < self.min_calls {
                return false;
            }
            let rate = s.failures as f64 / s.calls as f64;
            if rate > self.rate {
                s.tripped = true;
                return true;
            }
            false
        });
        if tripped_now {
            counter!(KILLSWITCH_TRIPS_TOTAL, "stage" => self.stage.as_str()).increment(1);
            let st = self.stats();
            warn!(
                target: "enrich",
                provider = %self.provider,
                stage = %self.stage,
                calls = st.calls,
                failures = st.failures,
                rate = st.failure_rate(),
                threshold = self.rate,
                "kill switch tripped; provider disabled for the rest of the run"
            );
        }
        tripped_now
    }

    pub fn record_fallback(&self) {
        self.with_state(|s| s.fallbacks += 1);
    }

    pub fn stats(&self) -> ProviderStats {
        self.with_state(|s| ProviderStats {
            provider: self.provider.clone(),
            stage: self.stage.as_str().to_string(),
            calls: s.calls,
            failures: s.failures,
            skipped: s.skipped,
            fallbacks: s.fallbacks,
            tripped: s.tripped,
        })
    }
}
