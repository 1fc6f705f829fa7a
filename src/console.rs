//! Console presentation: the terminal variant of the push channel.
//!
//! Subscribes to the publisher like any web client and renders each new
//! opportunity as one coloured line. Whenever the running total crosses a
//! multiple of `summary_every`, an inline stats summary is printed from that
//! cycle's stats. The cadence follows `total_opportunities`, so events
//! skipped by a lagging receiver do not shift it.

use colored::{ColoredString, Colorize};
use rust_decimal::Decimal;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::engine::publisher::MonitorEvent;
use crate::types::{Opportunity, SystemStats};

/// Profit band used to pick a line colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfitTier {
    /// Above 1%.
    High,
    /// Above 0.5%.
    Medium,
    Low,
}

impl ProfitTier {
    pub fn of(profit_percentage: Decimal) -> Self {
        if profit_percentage > Decimal::ONE {
            ProfitTier::High
        } else if profit_percentage > Decimal::new(5, 1) {
            ProfitTier::Medium
        } else {
            ProfitTier::Low
        }
    }

    fn paint(self, line: String) -> ColoredString {
        match self {
            ProfitTier::High => line.green(),
            ProfitTier::Medium => line.yellow(),
            ProfitTier::Low => line.red(),
        }
    }
}

/// One plain-text line for an opportunity.
pub fn format_opportunity(opp: &Opportunity) -> String {
    let spread = opp.spread_percentage.round_dp(2);
    let sign = if spread.is_sign_negative() { "" } else { "+" };
    format!(
        "[{}] {} | {}@{} → {}@{} | spread {}{}% | profit {}% ({}bps) net {}% | amount {}",
        opp.timestamp.format("%H:%M:%S"),
        opp.pair,
        opp.buy_venue,
        opp.buy_price.round_dp(6),
        opp.sell_venue,
        opp.sell_price.round_dp(6),
        sign,
        spread,
        opp.profit_percentage.round_dp(2),
        opp.profit_bps,
        opp.estimated_profit_percentage.round_dp(2),
        opp.profit_amount,
    )
}

/// Inline summary printed every N opportunities.
pub fn format_summary(stats: &SystemStats) -> String {
    format!(
        "📊 Stats: {} opportunities | Avg: {:.2}% | Best: {:.2}% | {:.2}/min",
        stats.total_opportunities,
        stats.avg_profit_percentage,
        stats.best_profit,
        stats.opportunities_per_minute,
    )
}

/// End-of-session block printed on shutdown.
pub fn format_session_summary(stats: &SystemStats) -> String {
    let mut out = String::from("📈 Session Summary:\n");
    out.push_str(&format!("Total opportunities found: {}\n", stats.total_opportunities));
    if stats.total_opportunities > 0 {
        out.push_str(&format!(
            "Average profit: {:.2}% (all-time {:.2}%)\n",
            stats.avg_profit_percentage, stats.all_time_avg_profit_percentage
        ));
        out.push_str(&format!("Best opportunity: {:.2}% on {}\n", stats.best_profit, stats.top_pair));
    }
    out.push_str(&format!("Uptime: {:.0}s", stats.uptime_seconds));
    out
}

pub struct ConsoleReporter {
    summary_every: u64,
    printed: u64,
    /// `total_opportunities` at the last printed summary (or at start).
    summarized_total: u64,
}

impl ConsoleReporter {
    pub fn new(summary_every: u64) -> Self {
        Self {
            summary_every,
            printed: 0,
            summarized_total: 0,
        }
    }

    /// Whether `total` has crossed a multiple of `summary_every` since the
    /// last summary.
    fn summary_due(&self, total: u64) -> bool {
        self.summary_every > 0
            && total / self.summary_every > self.summarized_total / self.summary_every
    }

    /// Lines to print for one event. Handshake messages produce nothing.
    pub fn handle(&mut self, event: &MonitorEvent) -> Vec<ColoredString> {
        match event {
            MonitorEvent::NewOpportunity(opp) => {
                self.printed += 1;
                vec![ProfitTier::of(opp.estimated_profit_percentage).paint(format_opportunity(opp))]
            }
            MonitorEvent::SystemStats(stats) if self.summary_due(stats.total_opportunities) => {
                self.summarized_total = stats.total_opportunities;
                vec![format_summary(stats).bold()]
            }
            _ => Vec::new(),
        }
    }

    pub fn printed(&self) -> u64 {
        self.printed
    }

    /// Print events until `shutdown` fires or the channel closes.
    pub fn spawn(
        mut self,
        mut events: broadcast::Receiver<MonitorEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(evt) => {
                            for line in self.handle(&evt) {
                                println!("{line}");
                            }
                        }
                        Err(RecvError::Lagged(n)) => warn!(skipped = n, "Console lagged, skipped events"),
                        Err(RecvError::Closed) => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
