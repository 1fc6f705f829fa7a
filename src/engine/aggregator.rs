//! Rolling aggregator: bounded history and running statistics.
//!
//! History is a plain FIFO of the most recent `window_size` opportunities.
//! Counters cover the whole process lifetime, so the windowed average and
//! the total count are computed over different populations; both the
//! windowed and all-time averages are exposed.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::VecDeque;

use crate::types::{Opportunity, SystemStats};

pub struct RollingAggregator {
    window_size: usize,
    history: VecDeque<Opportunity>,
    start_time: DateTime<Utc>,
    total_count: u64,
    profit_sum_all_time: Decimal,
    best_profit: Decimal,
    top_pair: String,
    last_opportunity_time: Option<DateTime<Utc>>,
}

impl RollingAggregator {
    pub fn new(window_size: usize, start_time: DateTime<Utc>) -> Self {
        Self {
            window_size,
            history: VecDeque::with_capacity(window_size),
            start_time,
            total_count: 0,
            profit_sum_all_time: Decimal::ZERO,
            best_profit: Decimal::ZERO,
            top_pair: String::new(),
            last_opportunity_time: None,
        }
    }

    /// Append a batch, evict the oldest entries past the window, and update
    /// the lifetime counters.
    pub fn record(&mut self, batch: Vec<Opportunity>, now: DateTime<Utc>) {
        if batch.is_empty() {
            return;
        }

        self.total_count += batch.len() as u64;
        self.last_opportunity_time = Some(now);

        for opp in batch {
            self.profit_sum_all_time += opp.profit_percentage;
            if opp.profit_percentage > self.best_profit {
                self.best_profit = opp.profit_percentage;
                self.top_pair = opp.pair.clone();
            }
            self.history.push_back(opp);
        }

        while self.history.len() > self.window_size {
            self.history.pop_front();
        }
    }

    /// Current statistics as of `now`.
    pub fn stats(&self, now: DateTime<Utc>) -> SystemStats {
        let uptime_seconds = (now - self.start_time).num_milliseconds().max(0) as f64 / 1000.0;
        let opportunities_per_minute = if uptime_seconds > 0.0 {
            self.total_count as f64 / (uptime_seconds / 60.0)
        } else {
            0.0
        };

        let window_avg = if self.history.is_empty() {
            Decimal::ZERO
        } else {
            let sum: Decimal = self.history.iter().map(|o| o.profit_percentage).sum();
            sum / Decimal::from(self.history.len())
        };
        let all_time_avg = if self.total_count == 0 {
            Decimal::ZERO
        } else {
            self.profit_sum_all_time / Decimal::from(self.total_count)
        };

        SystemStats {
            total_opportunities: self.total_count,
            avg_profit_percentage: window_avg.to_f64().unwrap_or(0.0),
            all_time_avg_profit_percentage: all_time_avg.to_f64().unwrap_or(0.0),
            opportunities_per_minute,
            uptime_seconds,
            last_opportunity_time: self.last_opportunity_time,
            top_pair: self.top_pair.clone(),
            best_profit: self.best_profit.to_f64().unwrap_or(0.0),
            window_len: self.history.len(),
        }
    }

    /// Copy of the history, oldest first.
    pub fn history(&self) -> Vec<Opportunity> {
        self.history.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
