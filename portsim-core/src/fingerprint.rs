//! Run fingerprinting — deterministic identification of a simulation run.
//!
//! - `config_hash`: BLAKE3 of the canonical JSON of a `SimulationConfig`.
//! - `dataset_hash`: BLAKE3 over every bar in symbol/date order.
//! - `RunFingerprint`: run ID plus a short description of the inputs.

use crate::data::MarketData;
use crate::domain::{ConfigHash, DatasetHash, RunId, SignalFlag};
use crate::engine::SimulationConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Hash of the configuration. Field order is fixed by the struct definition,
/// so the JSON is canonical.
pub fn config_hash(config: &SimulationConfig) -> Result<ConfigHash, serde_json::Error> {
    let json = serde_json::to_vec(config)?;
    Ok(ConfigHash::from_bytes(&json))
}

/// Hash of the input dataset.
///
/// Covers symbol, date, OHLC, ATR and entry flag of every bar. Hash before
/// computing ATR so the value reflects the input table rather than derived
/// values.
pub fn dataset_hash(market: &MarketData) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for series in market.series.values() {
        hasher.update(series.symbol.as_bytes());
        hasher.update(b"\n");
        for (i, bar) in series.bars.iter().enumerate() {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            match series.atr.get(i).copied().flatten() {
                Some(atr) => hasher.update(&atr.to_le_bytes()),
                None => hasher.update(b"-"),
            };
            let flag: &[u8] = match series.flags.get(i) {
                Some(SignalFlag::Long) => b"L",
                Some(SignalFlag::Short) => b"S",
                _ => b"N",
            };
            hasher.update(flag);
        }
    }
    DatasetHash::from_hash(&hasher.finalize().to_hex())
}

/// Identity and input summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub run_id: RunId,
    pub symbols: usize,
    pub bars: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl RunFingerprint {
    pub fn new(
        config: &SimulationConfig,
        market: &MarketData,
    ) -> Result<Self, serde_json::Error> {
        let timeline = market.timeline();
        Ok(Self {
            run_id: RunId::new(config_hash(config)?, dataset_hash(market)),
            symbols: market.series.len(),
            bars: market.bar_count(),
            first_date: timeline.first().copied(),
            last_date: timeline.last().copied(),
        })
    }

    /// Short prefix used to name run directories.
    pub fn short_id(&self) -> String {
        self.run_id.short()
    }
}
