//! Alert message rendering (HTML).

use chrono::DateTime;
use poolwatch_core::{
    resolve_market_cap, Contest, LeaderboardEntry, PoolId, PoolStats, SubscriberConfig,
    TradeEvent, SELL_MARKER,
};

/// Format a USD value with precision matched to its magnitude.
fn format_price(price: f64) -> String {
    if price == 0.0 {
        return "$0".to_string();
    }
    let abs = price.abs();
    if abs >= 1000.0 {
        format!("${:.2}", price)
    } else if abs >= 1.0 {
        format!("${:.4}", price)
    } else if abs >= 0.01 {
        format!("${:.6}", price)
    } else if abs >= 0.0001 {
        format!("${:.8}", price)
    } else {
        format!("${:.10}", price)
    }
}

/// Compact token amount without a currency sign.
fn format_amount(amount: f64) -> String {
    let abs = amount.abs();
    if abs >= 1e9 {
        format!("{:.2}B", amount / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", amount / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", amount / 1e3)
    } else {
        format!("{:.2}", amount)
    }
}

/// Thousands-separated integer.
fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Shorten a wallet address for display.
fn short_actor(actor: &str) -> String {
    if actor.len() > 12 {
        format!("{}…{}", &actor[..6], &actor[actor.len() - 4..])
    } else {
        actor.to_string()
    }
}

/// Compose the body of a trade alert.
///
/// Buys carry the tier emoji from the subscriber's thresholds; sells always
/// carry the fixed sell marker. Enrichment lines appear only for the stats
/// that are actually known.
pub fn render_trade_alert(
    symbol: &str,
    trade: &TradeEvent,
    config: &SubscriberConfig,
    stats: Option<&PoolStats>,
) -> String {
    let mut msg = if trade.side.is_sell() {
        format!("{SELL_MARKER} <b>{symbol} Sell</b>")
    } else {
        let tier = config.tiers.tier_for(trade.usd_amount);
        let emoji = config.tier_labels.label_for(tier);
        format!("{emoji} <b>{symbol} Buy!</b>")
    };

    msg.push_str(&format!(
        "\n\n💵 <b>{}</b> ({} {symbol})",
        format_price(trade.usd_amount),
        format_amount(trade.token_amount)
    ));

    match trade.price_usd {
        Some(price) if price > 0.0 => {
            msg.push_str(&format!("\n💰 Price: {}", format_price(price)));
        }
        _ => msg.push_str("\n💰 Price: —"),
    }

    if let Some(actor) = &trade.actor {
        msg.push_str(&format!("\n👤 <code>{}</code>", short_actor(actor)));
    }

    if let Some(stats) = stats {
        let mut market_line = Vec::new();
        if let Some(liquidity) = stats.liquidity_usd {
            market_line.push(format!(
                "Liquidity: {}",
                poolwatch_core::format_usd_compact(liquidity)
            ));
        }
        if let Some(volume) = stats.volume_24h_usd {
            market_line.push(format!(
                "24h Vol: {}",
                poolwatch_core::format_usd_compact(volume)
            ));
        }
        if !market_line.is_empty() {
            msg.push_str(&format!("\n📊 {}", market_line.join(" · ")));
        }

        if let Some((value, kind)) = resolve_market_cap(stats) {
            msg.push_str(&format!(
                "\n🏦 {}: {}",
                kind.label(),
                poolwatch_core::format_usd_compact(value)
            ));
        }

        if let Some(holders) = stats.holders {
            msg.push_str(&format!("\n👥 Holders: {}", format_count(holders)));
        }
    }

    if let Some(when) = DateTime::from_timestamp(trade.timestamp, 0) {
        msg.push_str(&format!("\n\n⏰ {}", when.format("%Y-%m-%d %H:%M:%S UTC")));
    }

    msg
}

/// Compose the final standings announcement for a finished contest.
pub fn render_contest_results(
    contest: &Contest,
    standings: &[(String, LeaderboardEntry)],
) -> String {
    let mut msg = "🏁 <b>Buy contest finished!</b>".to_string();

    if standings.is_empty() {
        msg.push_str("\n\nNo qualifying buys this round.");
        return msg;
    }

    const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];
    for (rank, (actor, entry)) in standings.iter().take(10).enumerate() {
        let marker = MEDALS
            .get(rank)
            .map(|m| m.to_string())
            .unwrap_or_else(|| format!("{}.", rank + 1));
        msg.push_str(&format!(
            "\n{marker} <code>{}</code> — {}",
            short_actor(actor),
            format_price(entry.total_usd)
        ));
        if rank < 3 {
            if let Some(prize) = contest.prizes.get(rank) {
                msg.push_str(&format!(" 🎁 {prize}"));
            }
        }
    }

    msg
}

/// Notice sent to watchers when a pool's feed disappears upstream.
pub fn render_feed_gone(symbol: &str, pool: &PoolId) -> String {
    format!(
        "⚠️ The <b>{symbol}</b> feed is no longer available (pool <code>{pool}</code>).\nIt has been removed from your alerts; re-add the token to resume."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolwatch_core::{TradeSide, TierThresholds};
    use pretty_assertions::assert_eq;

    fn trade(side: TradeSide, usd: f64) -> TradeEvent {
        TradeEvent {
            trade_id: "t1".to_string(),
            tx_hash: "0xhash".to_string(),
            side,
            usd_amount: usd,
            token_amount: 1_234_567.0,
            price_usd: Some(0.0012),
            actor: Some("0xwhale12345678".to_string()),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_buy_alert_uses_tier_emoji() {
        let config = SubscriberConfig {
            tiers: TierThresholds {
                small_max_usd: 100.0,
                large_min_usd: 1000.0,
            },
            ..Default::default()
        };

        let small = render_trade_alert("PEPE", &trade(TradeSide::Buy, 50.0), &config, None);
        assert!(small.starts_with("🟢 <b>PEPE Buy!</b>"));

        let large = render_trade_alert("PEPE", &trade(TradeSide::Buy, 5000.0), &config, None);
        assert!(large.starts_with("🐳 <b>PEPE Buy!</b>"));
    }

    #[test]
    fn test_sell_alert_uses_fixed_marker_regardless_of_size() {
        let config = SubscriberConfig::default();
        let rendered = render_trade_alert("PEPE", &trade(TradeSide::Sell, 1_000_000.0), &config, None);
        assert!(rendered.starts_with("🔻 <b>PEPE Sell</b>"));
        assert!(!rendered.contains("🐳"));
    }

    #[test]
    fn test_unknown_price_gets_placeholder() {
        let config = SubscriberConfig::default();
        let mut t = trade(TradeSide::Buy, 50.0);
        t.price_usd = None;
        let rendered = render_trade_alert("PEPE", &t, &config, None);
        assert!(rendered.contains("💰 Price: —"));
    }

    #[test]
    fn test_enrichment_shows_fdv_fallback() {
        let config = SubscriberConfig::default();
        let stats = PoolStats {
            price_usd: Some(2.0),
            fdv_usd: Some(5_000_000.0),
            ..Default::default()
        };
        let rendered =
            render_trade_alert("PEPE", &trade(TradeSide::Buy, 50.0), &config, Some(&stats));
        assert!(rendered.contains("FDV: $5.00M"));
        assert!(!rendered.contains("MC:"));
    }

    #[test]
    fn test_enrichment_lines_omitted_when_unknown() {
        let config = SubscriberConfig::default();
        let rendered = render_trade_alert(
            "PEPE",
            &trade(TradeSide::Buy, 50.0),
            &config,
            Some(&PoolStats::default()),
        );
        assert!(!rendered.contains("Liquidity"));
        assert!(!rendered.contains("Holders"));
        assert!(!rendered.contains("MC:"));
        assert!(!rendered.contains("FDV:"));
    }

    #[test]
    fn test_contest_results_ranks_and_prizes() {
        let mut contest = Contest::new(0, 0.0);
        contest.prizes = vec!["100 USDC".to_string(), "50 USDC".to_string()];
        contest.credit("0xaaaaaaaaaaaaaa", 300.0, 1);
        contest.credit("0xbbbbbbbbbbbbbb", 200.0, 2);
        contest.credit("0xcccccccccccccc", 100.0, 3);

        let standings = contest.standings();
        let rendered = render_contest_results(&contest, &standings);

        let gold = rendered.find("🥇").unwrap();
        let silver = rendered.find("🥈").unwrap();
        let bronze = rendered.find("🥉").unwrap();
        assert!(gold < silver && silver < bronze);
        assert!(rendered.contains("🎁 100 USDC"));
        assert!(rendered.contains("🎁 50 USDC"));
        // Only two prizes configured; the third rank gets none.
        assert_eq!(rendered.matches("🎁").count(), 2);
    }

    #[test]
    fn test_contest_results_empty_board() {
        let contest = Contest::new(0, 0.0);
        let rendered = render_contest_results(&contest, &contest.standings());
        assert!(rendered.contains("No qualifying buys"));
    }

    #[test]
    fn test_helpers() {
        assert_eq!(format_count(1234567), "1,234,567");
        assert_eq!(format_count(42), "42");
        assert_eq!(short_actor("0xwhale12345678"), "0xwhal…5678");
        assert_eq!(short_actor("0xshort"), "0xshort");
        assert_eq!(format_amount(1_234_567.0), "1.23M");
        assert_eq!(format_price(0.0012), "$0.00120000");
        assert_eq!(format_price(1234.5), "$1234.50");
        assert_eq!(format_price(0.0), "$0");
    }
}
