//! Put-credit-spread strike selection.
//!
//! Turns a put chain plus the structural-safety ceiling for a qualified
//! ticker into ranked spread candidates. Selection is pure: the chain is
//! supplied by the caller and DTE is measured from an explicit `as_of` date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{finite, ordered, positive, ConfigError};

/// Shares per equity option contract.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrikeSelectorConfig {
    pub min_dte: i64,
    pub max_dte: i64,
    /// Distance between the sold and bought strikes, in dollars.
    pub spread_width: f64,
    pub min_delta: f64,
    pub max_delta: f64,
    pub min_volume: u64,
    pub min_open_interest: u64,
    /// Credits at or below this are discarded.
    pub min_credit: f64,
    pub top_n: usize,
}

impl Default for StrikeSelectorConfig {
    fn default() -> Self {
        Self {
            min_dte: 30,
            max_dte: 45,
            spread_width: 5.0,
            min_delta: -0.30,
            max_delta: -0.15,
            min_volume: 10,
            min_open_interest: 50,
            min_credit: 0.10,
            top_n: 5,
        }
    }
}

impl StrikeSelectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_dte < 0 {
            return Err(ConfigError::invalid("strikes.min_dte", "must not be negative"));
        }
        ordered("strikes.dte", self.min_dte, self.max_dte)?;
        positive("strikes.spread_width", self.spread_width)?;
        finite("strikes.min_delta", self.min_delta)?;
        finite("strikes.max_delta", self.max_delta)?;
        ordered("strikes.delta", self.min_delta, self.max_delta)?;
        if self.min_delta < -1.0 || self.max_delta > 0.0 {
            return Err(ConfigError::invalid(
                "strikes.delta",
                "put deltas lie within -1.0..=0.0",
            ));
        }
        finite("strikes.min_credit", self.min_credit)?;
        if self.top_n == 0 {
            return Err(ConfigError::invalid("strikes.top_n", "must be at least 1"));
        }
        Ok(())
    }
}

/// One put contract from an options chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutQuote {
    pub expiration: NaiveDate,
    pub strike: f64,
    pub bid: f64,
    pub ask: f64,
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(default)]
    pub volume: u64,
    #[serde(default)]
    pub open_interest: u64,
}

impl PutQuote {
    /// Bid/ask midpoint; zero when either side is missing.
    pub fn mid(&self) -> f64 {
        if self.bid > 0.0 && self.ask > 0.0 {
            (self.bid + self.ask) / 2.0
        } else {
            0.0
        }
    }
}

/// What the selector needs to know about the underlying.
#[derive(Debug, Clone, PartialEq)]
pub struct StrikeRequest {
    pub ticker: String,
    pub as_of: NaiveDate,
    pub current_price: f64,
    pub max_safe_strike: f64,
    /// Support level the sold strike should sit under.
    pub support_level: f64,
}

/// A priced and scored vertical put spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadCandidate {
    pub expiration: NaiveDate,
    pub dte: i64,
    pub sell_strike: f64,
    pub buy_strike: f64,
    pub sell_mid: f64,
    pub buy_mid: f64,
    pub credit: f64,
    pub width: f64,
    /// Per share.
    pub max_profit: f64,
    /// Per share.
    pub max_loss: f64,
    pub max_profit_per_contract: f64,
    pub max_loss_per_contract: f64,
    pub roi_pct: f64,
    pub breakeven: f64,
    /// Dollars between the support level and the sold strike.
    pub distance_from_support: f64,
    pub delta: f64,
    /// Probability of profit approximated from delta, in percent.
    pub pop_pct: f64,
    pub safety_score: f64,
    pub roi_score: f64,
    pub liquidity_score: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrikeError {
    #[error("{ticker}: options chain is empty")]
    EmptyChain { ticker: String },

    #[error("{ticker}: no expirations in {min_dte}-{max_dte} DTE range")]
    NoExpirationInRange {
        ticker: String,
        min_dte: i64,
        max_dte: i64,
    },

    #[error("{ticker}: no spread passed the safety, delta, liquidity, and credit filters")]
    NoViableSpread { ticker: String },
}

#[derive(Debug, Clone)]
pub struct StrikeSelector {
    config: StrikeSelectorConfig,
}

impl StrikeSelector {
    pub fn new(config: StrikeSelectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StrikeSelectorConfig {
        &self.config
    }

    /// Best `top_n` spreads, highest score first.
    pub fn select(
        &self,
        request: &StrikeRequest,
        chain: &[PutQuote],
    ) -> Result<Vec<SpreadCandidate>, StrikeError> {
        let cfg = &self.config;
        let ticker = request.ticker.clone();
        if chain.is_empty() {
            return Err(StrikeError::EmptyChain { ticker });
        }

        let mut expirations: Vec<(NaiveDate, i64)> = chain
            .iter()
            .map(|q| (q.expiration, (q.expiration - request.as_of).num_days()))
            .filter(|(_, dte)| (cfg.min_dte..=cfg.max_dte).contains(dte))
            .collect();
        expirations.sort_by_key(|&(_, dte)| dte);
        expirations.dedup();
        if expirations.is_empty() {
            return Err(StrikeError::NoExpirationInRange {
                ticker,
                min_dte: cfg.min_dte,
                max_dte: cfg.max_dte,
            });
        }

        let mut spreads = Vec::new();
        for (expiration, dte) in expirations {
            let puts: Vec<&PutQuote> = chain.iter().filter(|q| q.expiration == expiration).collect();
            for sell in puts.iter().copied().filter(|q| self.sellable(q, request)) {
                let Some(buy) = self.protection_put(&puts, sell.strike) else {
                    continue;
                };
                let spread = self.price(sell, buy, dte, request.support_level);
                if spread.credit > cfg.min_credit {
                    spreads.push(spread);
                }
            }
        }
        if spreads.is_empty() {
            return Err(StrikeError::NoViableSpread { ticker });
        }

        spreads.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.expiration.cmp(&b.expiration))
                .then(b.sell_strike.total_cmp(&a.sell_strike))
        });
        spreads.truncate(cfg.top_n);
        Ok(spreads)
    }

    fn sellable(&self, quote: &PutQuote, request: &StrikeRequest) -> bool {
        let cfg = &self.config;
        let safe = quote.strike <= request.max_safe_strike && quote.strike < request.current_price;
        let delta_ok = quote
            .delta
            .is_some_and(|d| (cfg.min_delta..=cfg.max_delta).contains(&d));
        let liquid = quote.volume >= cfg.min_volume || quote.open_interest >= cfg.min_open_interest;
        safe && delta_ok && liquid
    }

    /// Put nearest `sell_strike - spread_width`, strictly below the sold strike.
    fn protection_put<'a>(&self, puts: &[&'a PutQuote], sell_strike: f64) -> Option<&'a PutQuote> {
        let target = sell_strike - self.config.spread_width;
        puts.iter()
            .copied()
            .filter(|q| q.strike < sell_strike)
            .min_by(|a, b| (a.strike - target).abs().total_cmp(&(b.strike - target).abs()))
    }

    fn price(&self, sell: &PutQuote, buy: &PutQuote, dte: i64, support_level: f64) -> SpreadCandidate {
        let sell_mid = sell.mid();
        let buy_mid = buy.mid();
        let credit = sell_mid - buy_mid;
        let width = sell.strike - buy.strike;
        let max_loss = width - credit;
        let roi_pct = if max_loss > 0.0 {
            credit / max_loss * 100.0
        } else {
            0.0
        };
        let distance_from_support = support_level - sell.strike;
        let delta = sell.delta.unwrap_or(0.0);

        let safety_score = (distance_from_support / 10.0 * 100.0).clamp(0.0, 100.0);
        let roi_score = (roi_pct / 50.0 * 100.0).clamp(0.0, 100.0);
        let liquidity_score = liquidity_score(sell, buy);
        let score = 0.5 * safety_score + 0.3 * roi_score + 0.2 * liquidity_score;

        SpreadCandidate {
            expiration: sell.expiration,
            dte,
            sell_strike: sell.strike,
            buy_strike: buy.strike,
            sell_mid,
            buy_mid,
            credit,
            width,
            max_profit: credit,
            max_loss,
            max_profit_per_contract: credit * CONTRACT_MULTIPLIER,
            max_loss_per_contract: max_loss * CONTRACT_MULTIPLIER,
            roi_pct,
            breakeven: sell.strike - credit,
            distance_from_support,
            delta,
            pop_pct: (1.0 + delta) * 100.0,
            safety_score,
            roi_score,
            liquidity_score,
            score,
        }
    }
}

/// 0–100: 40% volume (100 contracts saturates), 60% open interest (500 saturates).
fn liquidity_score(sell: &PutQuote, buy: &PutQuote) -> f64 {
    let avg_volume = (sell.volume + buy.volume) as f64 / 2.0;
    let avg_oi = (sell.open_interest + buy.open_interest) as f64 / 2.0;
    let volume_score = (avg_volume / 100.0 * 100.0).min(100.0);
    let oi_score = (avg_oi / 500.0 * 100.0).min(100.0);
    volume_score * 0.4 + oi_score * 0.6
}
