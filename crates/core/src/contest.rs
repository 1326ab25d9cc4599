//! Time-boxed leaderboard contests scoped to one subscriber.

use crate::trade::TradeEvent;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// One actor's cumulative standing in a contest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Sum of qualifying trade notionals credited to this actor.
    pub total_usd: f64,
    /// Timestamp of the first credited trade; ties on total_usd resolve
    /// in favor of the earlier qualifier.
    pub first_credit_at: i64,
}

/// A buy-volume competition with a fixed end time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    /// Unix timestamp (seconds) when the contest closes.
    pub ends_at: i64,
    /// Trades below this USD notional do not count.
    pub min_entry_usd: f64,
    /// Prize labels for the top ranks, best first.
    #[serde(default)]
    pub prizes: Vec<String>,
    #[serde(default)]
    pub leaderboard: HashMap<String, LeaderboardEntry>,
}

impl Contest {
    pub fn new(ends_at: i64, min_entry_usd: f64) -> Self {
        Self {
            ends_at,
            min_entry_usd,
            prizes: Vec::new(),
            leaderboard: HashMap::new(),
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.ends_at
    }

    /// Whether a trade counts toward the leaderboard: a buy at or above the
    /// entry minimum from a known actor.
    pub fn qualifies(&self, trade: &TradeEvent) -> bool {
        trade.side.is_buy() && trade.usd_amount >= self.min_entry_usd && trade.actor.is_some()
    }

    /// Credit a qualifying trade to an actor. Each trade reaches this at
    /// most once; duplicate suppression happens upstream of delivery.
    pub fn credit(&mut self, actor: &str, usd: f64, at: i64) {
        let entry = self
            .leaderboard
            .entry(actor.to_string())
            .or_insert(LeaderboardEntry {
                total_usd: 0.0,
                first_credit_at: at,
            });
        entry.total_usd += usd;
    }

    /// Standings sorted by cumulative USD descending, earlier first credit
    /// winning ties.
    pub fn standings(&self) -> Vec<(String, LeaderboardEntry)> {
        let mut rows: Vec<(String, LeaderboardEntry)> = self
            .leaderboard
            .iter()
            .map(|(actor, entry)| (actor.clone(), entry.clone()))
            .collect();
        rows.sort_by(|a, b| {
            b.1.total_usd
                .partial_cmp(&a.1.total_usd)
                .unwrap_or(Ordering::Equal)
                .then(a.1.first_credit_at.cmp(&b.1.first_credit_at))
        });
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::TradeSide;
    use pretty_assertions::assert_eq;

    fn trade(side: TradeSide, usd: f64, actor: Option<&str>) -> TradeEvent {
        TradeEvent {
            trade_id: "t1".to_string(),
            tx_hash: "0xdead".to_string(),
            side,
            usd_amount: usd,
            token_amount: 1.0,
            price_usd: Some(1.0),
            actor: actor.map(str::to_string),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_qualification() {
        let contest = Contest::new(2_000_000_000, 100.0);
        assert!(contest.qualifies(&trade(TradeSide::Buy, 100.0, Some("0xa"))));
        assert!(!contest.qualifies(&trade(TradeSide::Buy, 99.9, Some("0xa"))));
        assert!(!contest.qualifies(&trade(TradeSide::Sell, 500.0, Some("0xa"))));
        assert!(!contest.qualifies(&trade(TradeSide::Buy, 500.0, None)));
    }

    #[test]
    fn test_credit_accumulates_per_actor() {
        let mut contest = Contest::new(2_000_000_000, 0.0);
        contest.credit("0xa", 100.0, 10);
        contest.credit("0xa", 50.0, 20);
        contest.credit("0xb", 120.0, 30);

        let entry = &contest.leaderboard["0xa"];
        assert_eq!(entry.total_usd, 150.0);
        assert_eq!(entry.first_credit_at, 10);
        assert_eq!(contest.leaderboard["0xb"].total_usd, 120.0);
    }

    #[test]
    fn test_standings_order_and_tiebreak() {
        let mut contest = Contest::new(2_000_000_000, 0.0);
        contest.credit("late_tied", 100.0, 50);
        contest.credit("leader", 300.0, 40);
        contest.credit("early_tied", 100.0, 10);

        let standings = contest.standings();
        let order: Vec<&str> = standings.iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(order, vec!["leader", "early_tied", "late_tied"]);
    }

    #[test]
    fn test_expiry_boundary() {
        let contest = Contest::new(1_000, 0.0);
        assert!(!contest.is_expired(999));
        assert!(contest.is_expired(1_000));
        assert!(contest.is_expired(1_001));
    }
}
