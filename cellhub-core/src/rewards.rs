//! Block reward ledger and staking yield
//!
//! Turns `tx_history` text into per-day reward totals and derives the
//! 7/30-day moving averages and annualized yield from them.
//!
//! # Pipeline
//!
//! 1. [`extract_block_reward_blocks`]: 35-line windows opened by an accepted
//!    transaction that mentions the `block_reward` service
//! 2. [`filter_by_day`]: keep windows whose `tx_created` falls on a day
//! 3. [`filter_reward_collecting`]: ±4 lines around each `reward collecting` source
//! 4. [`sum_recv_coins`]: total of every `recv_coins` value
//!
//! [`RewardLedger::from_history`] dates every block once, then runs steps 2-4
//! for each of the [`LEDGER_DAYS`] days over a single fetched history.

use crate::parse::StakeInfo;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Calendar-day format used for ledger keys and moving-average dates
pub const DAY_FORMAT: &str = "%a, %d %b %Y";

/// Format of the `tx_created` field in transaction history
pub const TX_CREATED_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

/// Lines captured per accepted transaction
pub const BLOCK_WINDOW_LINES: usize = 35;

/// Context lines kept on each side of a `reward collecting` source
pub const COLLECTING_CONTEXT_LINES: usize = 4;

/// Days covered by a reward ledger (today inclusive)
pub const LEDGER_DAYS: usize = 30;

/// Moving-average windows in days
pub const MA_SHORT_DAYS: usize = 7;
pub const MA_LONG_DAYS: usize = 30;

static TX_CREATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tx_created:\s*([\w, :]+)").expect("valid tx_created pattern"));

static RECV_COINS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"recv_coins:\s*([\d.]+)").expect("valid recv_coins pattern"));

/// Capture every accepted transaction that carries a block reward.
///
/// Each `status: ACCEPTED` line whose next 35 lines (itself included)
/// mention `service: block_reward` yields one block. Blocks may overlap.
pub fn extract_block_reward_blocks(history: &str) -> Vec<String> {
    let lines: Vec<&str> = history.lines().collect();
    let mut blocks = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if !line.contains("status: ACCEPTED") {
            continue;
        }
        let window = &lines[i..(i + BLOCK_WINDOW_LINES).min(lines.len())];
        if window.iter().any(|l| l.contains("service: block_reward")) {
            blocks.push(window.join("\n"));
        }
    }

    blocks
}

/// Creation day of a transaction block, if it has a parsable `tx_created`
fn tx_created_day(block: &str) -> Option<NaiveDate> {
    let raw = TX_CREATED.captures(block)?.get(1)?.as_str().trim();
    match NaiveDateTime::parse_from_str(raw, TX_CREATED_FORMAT) {
        Ok(created) => Some(created.date()),
        Err(e) => {
            warn!(tx_created = %raw, error = %e, "Unparsable transaction date, skipping block");
            None
        }
    }
}

/// Pair each block with its creation day, dropping blocks without one.
///
/// Dates are parsed once here so per-day filtering never re-reads them.
pub fn date_blocks(blocks: Vec<String>) -> Vec<(NaiveDate, String)> {
    blocks
        .into_iter()
        .filter_map(|block| Some((tx_created_day(&block)?, block)))
        .collect()
}

/// Keep the blocks created on `day`
pub fn filter_by_day(blocks: &[(NaiveDate, String)], day: NaiveDate) -> Vec<String> {
    blocks
        .iter()
        .filter(|(created, _)| *created == day)
        .map(|(_, block)| block.clone())
        .collect()
}

/// Cut the `reward collecting` sub-records out of each block.
///
/// Every occurrence contributes the window from 4 lines before through
/// 4 lines after it.
pub fn filter_reward_collecting(blocks: &[String]) -> Vec<String> {
    let mut records = Vec::new();

    for block in blocks {
        let lines: Vec<&str> = block.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            if line.contains("source_address: reward collecting") {
                let start = i.saturating_sub(COLLECTING_CONTEXT_LINES);
                let end = (i + COLLECTING_CONTEXT_LINES + 1).min(lines.len());
                records.push(lines[start..end].join("\n"));
            }
        }
    }

    records
}

/// Sum of all `recv_coins` amounts in the given records
pub fn sum_recv_coins(records: &[String]) -> f64 {
    records
        .iter()
        .flat_map(|record| RECV_COINS.captures_iter(record))
        .filter_map(|caps| {
            let raw = caps.get(1)?.as_str();
            match raw.parse::<f64>() {
                Ok(amount) => Some(amount),
                Err(_) => {
                    debug!(recv_coins = %raw, "Ignoring malformed recv_coins value");
                    None
                }
            }
        })
        .sum()
}

/// Reward total for `day` from dated block reward windows
pub fn rewards_for_day(blocks: &[(NaiveDate, String)], day: NaiveDate) -> f64 {
    let daily = filter_by_day(blocks, day);
    sum_recv_coins(&filter_reward_collecting(&daily))
}

/// Per-day reward totals, most recent day first.
///
/// Serialized as a JSON object keyed by [`DAY_FORMAT`] dates in ledger order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardLedger {
    entries: Vec<(NaiveDate, f64)>,
}

impl RewardLedger {
    /// Build the [`LEDGER_DAYS`]-day ledger ending at `today`
    pub fn from_history(history: &str, today: NaiveDate) -> Self {
        let blocks = date_blocks(extract_block_reward_blocks(history));

        let entries = (0..LEDGER_DAYS)
            .map_while(|offset| {
                let day = today.checked_sub_days(chrono::Days::new(offset as u64))?;
                Some((day, rewards_for_day(&blocks, day)))
            })
            .collect();

        Self { entries }
    }

    /// Ledger from explicit entries (expected most recent first)
    pub fn from_entries(entries: Vec<(NaiveDate, f64)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(NaiveDate, f64)] {
        &self.entries
    }

    /// Amounts in ledger order
    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, amount)| *amount).collect()
    }

    pub fn get(&self, day: NaiveDate) -> Option<f64> {
        self.entries
            .iter()
            .find(|(d, _)| *d == day)
            .map(|(_, amount)| *amount)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ledger with every amount grossed up for the sovereign tax
    pub fn grossed_up(&self, tax_percent: f64) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(day, amount)| (*day, gross_up(*amount, tax_percent)))
                .collect(),
        }
    }
}

impl Serialize for RewardLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (day, amount) in &self.entries {
            map.serialize_entry(&day.format(DAY_FORMAT).to_string(), amount)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RewardLedger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LedgerVisitor;

        impl<'de> Visitor<'de> for LedgerVisitor {
            type Value = RewardLedger;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of calendar days to reward amounts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(LEDGER_DAYS));
                while let Some((key, amount)) = access.next_entry::<String, f64>()? {
                    let day = NaiveDate::parse_from_str(&key, DAY_FORMAT)
                        .map_err(serde::de::Error::custom)?;
                    entries.push((day, amount));
                }
                Ok(RewardLedger { entries })
            }
        }

        deserializer.deserialize_map(LedgerVisitor)
    }
}

/// Mean of the first `window` values; 0 when fewer values are available.
///
/// Ordinal, not calendar-checked: the caller keeps values most recent first.
pub fn moving_average(values: &[f64], window: usize) -> f64 {
    if window == 0 || values.len() < window {
        return 0.0;
    }
    values[..window].iter().sum::<f64>() / window as f64
}

/// Gross up a net reward for the sovereign tax withheld from it.
///
/// A tax outside `[0, 100)` leaves the amount unchanged.
pub fn gross_up(amount: f64, tax_percent: f64) -> f64 {
    let tax = tax_percent / 100.0;
    if !(0.0..1.0).contains(&tax) {
        return amount;
    }
    amount / (1.0 - tax)
}

/// Annualized yield in percent for a daily reward average; 0 without stake
pub fn annual_yield(daily_average: f64, stake_value: f64) -> f64 {
    let deposited = stake_value * 1000.0;
    if deposited <= 0.0 {
        return 0.0;
    }
    daily_average * 365.0 / deposited * 100.0
}

/// Lenient decimal parse for CLI values such as `"1500.0"` or `"10 %"`
pub fn parse_decimal(raw: &str) -> f64 {
    raw.split_whitespace()
        .next()
        .map(|token| token.trim_end_matches('%'))
        .and_then(|token| token.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Moving average reported for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverage {
    pub date: String,
    pub value: f64,
    pub apy: f64,
}

/// Reward statistics for a node's fee address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeAddrInfo {
    pub fee_addr: String,
    pub ma7: MovingAverage,
    pub ma30: MovingAverage,
    /// Grossed-up daily rewards, most recent first
    pub rewards: RewardLedger,
}

impl FeeAddrInfo {
    /// Derive moving averages and yield from a net reward ledger.
    ///
    /// Each day is grossed up for the sovereign tax before averaging.
    pub fn compute(fee_addr: &str, net: &RewardLedger, stake: &StakeInfo, today: NaiveDate) -> Self {
        let stake_value = parse_decimal(&stake.stake_value);
        let rewards = net.grossed_up(parse_decimal(&stake.sovereign_tax));
        let values = rewards.values();
        let date = today.format(DAY_FORMAT).to_string();

        let window = |days: usize| {
            let value = moving_average(&values, days);
            MovingAverage {
                date: date.clone(),
                value,
                apy: annual_yield(value, stake_value),
            }
        };

        Self {
            fee_addr: fee_addr.to_string(),
            ma7: window(MA_SHORT_DAYS),
            ma30: window(MA_LONG_DAYS),
            rewards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// One accepted block-reward transaction padded past the capture window
    fn reward_tx(created: NaiveDate, amount: &str) -> String {
        let mut lines = vec![
            "status: ACCEPTED".to_string(),
            "hash: 0xDEADBEEF".to_string(),
            format!("tx_created: {} 10:15:00", created.format(DAY_FORMAT)),
            "service: block_reward".to_string(),
            "data:".to_string(),
            "    tx_type: recv".to_string(),
            format!("    recv_coins: {}", amount),
            "    token: CELL".to_string(),
            "    source_address: reward collecting".to_string(),
            "    destination_address: Rj7J7MiX2bWy8sNy".to_string(),
        ];
        lines.resize(BLOCK_WINDOW_LINES + 1, String::new());
        lines.join("\n")
    }

    #[test]
    fn test_extract_block_reward_blocks() {
        let today = day(2026, 10, 19);
        let history = format!(
            "{}\nstatus: ACCEPTED\nservice: transfer\n{}",
            reward_tx(today, "1.5"),
            "\n".repeat(BLOCK_WINDOW_LINES)
        );
        let blocks = extract_block_reward_blocks(&history);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].starts_with("status: ACCEPTED"));
        assert_eq!(blocks[0].split('\n').count(), BLOCK_WINDOW_LINES);
    }

    #[test]
    fn test_extract_ignores_rejected() {
        let history = "status: DECLINED\nservice: block_reward\nrecv_coins: 5";
        assert!(extract_block_reward_blocks(history).is_empty());
    }

    #[test]
    fn test_overlapping_blocks_emitted_independently() {
        let today = day(2026, 10, 19);
        let tx = |amount: &str| {
            format!(
                "status: ACCEPTED\ntx_created: {} 08:00:00\nservice: block_reward\n    recv_coins: {}\n    source_address: reward collecting",
                today.format(DAY_FORMAT),
                amount
            )
        };
        // Second transaction starts 5 lines after the first
        let history = format!("{}\n{}", tx("1"), tx("2"));

        let blocks = extract_block_reward_blocks(&history);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("recv_coins: 2"));
        assert!(blocks[1].starts_with("status: ACCEPTED"));
        assert!(!blocks[1].contains("recv_coins: 1"));

        // Each block's collecting window reaches both amounts
        let ledger = RewardLedger::from_history(&history, today);
        assert_eq!(ledger.get(today), Some(7.0));
    }

    #[test]
    fn test_filter_by_day() {
        let today = day(2026, 10, 19);
        let yesterday = day(2026, 10, 18);
        let blocks = date_blocks(vec![reward_tx(today, "1"), reward_tx(yesterday, "2")]);

        assert_eq!(filter_by_day(&blocks, today).len(), 1);
        assert_eq!(filter_by_day(&blocks, yesterday).len(), 1);
        assert!(filter_by_day(&blocks, day(2026, 10, 1)).is_empty());
    }

    #[test]
    fn test_date_blocks_drops_unparsable_dates() {
        let today = day(2026, 10, 19);
        let blocks = date_blocks(vec![
            "status: ACCEPTED\ntx_created: yesterday-ish".to_string(),
            "status: ACCEPTED\nno date at all".to_string(),
            reward_tx(today, "1"),
        ]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].0, today);
        assert_eq!(filter_by_day(&blocks, today).len(), 1);
    }

    #[test]
    fn test_filter_reward_collecting_window() {
        let lines: Vec<String> = (0..12).map(|i| format!("line {i}")).collect();
        let mut block = lines.clone();
        block[6] = "source_address: reward collecting".to_string();
        let records = filter_reward_collecting(&[block.join("\n")]);

        assert_eq!(records.len(), 1);
        let kept: Vec<&str> = records[0].lines().collect();
        assert_eq!(kept.first(), Some(&"line 2"));
        assert_eq!(kept.last(), Some(&"line 10"));
        assert_eq!(kept.len(), 9);
    }

    #[test]
    fn test_filter_reward_collecting_near_edges() {
        let block = "source_address: reward collecting\nrecv_coins: 1\nsource_address: reward collecting";
        let records = filter_reward_collecting(&[block.to_string()]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].lines().count(), 3);
    }

    #[test]
    fn test_sum_recv_coins() {
        let records = vec![
            "recv_coins: 1.25\nrecv_coins: 0.75".to_string(),
            "recv_coins: 2".to_string(),
            "nothing here".to_string(),
        ];
        assert!((sum_recv_coins(&records) - 4.0).abs() < 1e-9);
        assert_eq!(sum_recv_coins(&[]), 0.0);
    }

    #[test]
    fn test_ledger_shape() {
        let today = day(2026, 10, 19);
        let ledger = RewardLedger::from_history("", today);

        assert_eq!(ledger.len(), LEDGER_DAYS);
        assert_eq!(ledger.entries()[0].0, today);
        for pair in ledger.entries().windows(2) {
            assert_eq!(pair[0].0.pred_opt().unwrap(), pair[1].0);
        }
        assert!(ledger.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_ledger_totals_per_day() {
        let today = day(2026, 10, 19);
        let history = [
            reward_tx(today, "1.5"),
            reward_tx(today, "0.5"),
            reward_tx(day(2026, 10, 17), "3"),
            reward_tx(day(2026, 8, 1), "100"),
        ]
        .join("\n");

        let ledger = RewardLedger::from_history(&history, today);
        assert_eq!(ledger.get(today), Some(2.0));
        assert_eq!(ledger.get(day(2026, 10, 18)), Some(0.0));
        assert_eq!(ledger.get(day(2026, 10, 17)), Some(3.0));
        assert_eq!(ledger.get(day(2026, 8, 1)), None);
    }

    #[test]
    fn test_moving_average() {
        assert_eq!(moving_average(&[1.0; 6], 7), 0.0);
        let week = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert!((moving_average(&week, 7) - 4.0).abs() < 1e-9);

        let mut month = week.to_vec();
        month.extend([100.0; 23]);
        assert!((moving_average(&month, 7) - 4.0).abs() < 1e-9);
        assert_eq!(moving_average(&week, 0), 0.0);
    }

    #[test]
    fn test_gross_up() {
        assert!((gross_up(9.0, 10.0) - 10.0).abs() < 1e-9);
        assert_eq!(gross_up(9.0, 0.0), 9.0);
        assert_eq!(gross_up(9.0, 100.0), 9.0);
        assert_eq!(gross_up(9.0, -5.0), 9.0);
    }

    #[test]
    fn test_annual_yield_zero_stake() {
        assert_eq!(annual_yield(1_000.0, 0.0), 0.0);
        assert!((annual_yield(10.0, 1.0) - 365.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("1500.0"), 1500.0);
        assert_eq!(parse_decimal(" 10 %"), 10.0);
        assert_eq!(parse_decimal("10%"), 10.0);
        assert_eq!(parse_decimal("N/A"), 0.0);
        assert_eq!(parse_decimal(""), 0.0);
    }

    #[test]
    fn test_fee_addr_info_grosses_up_before_averaging() {
        let today = day(2026, 10, 19);
        let entries = (0..30u64)
            .map(|i| (today.checked_sub_days(chrono::Days::new(i)).unwrap(), 0.9))
            .collect();
        let ledger = RewardLedger::from_entries(entries);
        let stake = StakeInfo {
            stake_value: "10".to_string(),
            sovereign_addr: "N/A".to_string(),
            sovereign_tax: "10".to_string(),
        };

        let info = FeeAddrInfo::compute("fee", &ledger, &stake, today);
        assert!((info.ma7.value - 1.0).abs() < 1e-9);
        assert!((info.ma30.value - 1.0).abs() < 1e-9);
        assert!((info.ma7.apy - 3.65).abs() < 1e-9);
        assert_eq!(info.ma7.date, today.format(DAY_FORMAT).to_string());
        assert!((info.rewards.get(today).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ledger_json_keeps_order() {
        let today = day(2026, 10, 19);
        let ledger = RewardLedger::from_history(&reward_tx(today, "2"), today);
        let json = serde_json::to_string(&ledger).unwrap();

        let first = today.format(DAY_FORMAT).to_string();
        let last = day(2026, 10, 17).format(DAY_FORMAT).to_string();
        assert!(json.find(&first).unwrap() < json.find(&last).unwrap());

        let back: RewardLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ledger);
    }
}
