//! Aggregate recovery statistics over the write-off ledger.
//!
//! Covers:
//! 1. **Weighted recovery rate** -- `sum recovered / sum written off`, in percent.
//! 2. **Vintage breakdown** -- the same ratio per year of write-off.
//! 3. **Realised LGD** -- `1 - weighted rate`, floored at zero, for LGD calibration.
//!
//! Each recovery is attributed to the most recent write-off of the same
//! contract dated on or before the recovery.

use std::collections::BTreeMap;

use chrono::Datelike;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::events::{RecoveryEvent, WriteOffEvent};
use crate::types::{Money, Rate};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VintageRecovery {
    pub write_offs: usize,
    pub written_off: Money,
    pub recovered: Money,
    /// Percent.
    pub recovery_rate: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub contracts: usize,
    pub write_offs: usize,
    pub recoveries: usize,
    pub total_written_off: Money,
    pub total_recovered: Money,
    /// Percent.
    pub weighted_recovery_rate: Decimal,
    pub realized_lgd: Rate,
    pub by_year: BTreeMap<i32, VintageRecovery>,
}

/// Recovery rate in percent; zero when nothing was written off.
pub fn recovery_rate(recovered: Money, written_off: Money) -> Decimal {
    if written_off.is_zero() {
        Decimal::ZERO
    } else {
        recovered / written_off * dec!(100)
    }
}

/// Aggregate one contract's events into `stats`. Write-offs must be sorted by date.
pub(crate) fn accumulate(
    stats: &mut RecoveryStats,
    write_offs: &[WriteOffEvent],
    recoveries: &[RecoveryEvent],
) {
    if write_offs.is_empty() {
        return;
    }
    stats.contracts += 1;

    for w in write_offs {
        let year = stats.by_year.entry(w.date.year()).or_default();
        year.write_offs += 1;
        year.written_off += w.amount;
        stats.write_offs += 1;
        stats.total_written_off += w.amount;
    }

    for r in recoveries {
        let vintage = write_offs
            .iter()
            .rev()
            .find(|w| w.date <= r.date)
            .unwrap_or(&write_offs[0]);
        let year = stats.by_year.entry(vintage.date.year()).or_default();
        year.recovered += r.amount;
        stats.recoveries += 1;
        stats.total_recovered += r.amount;
    }
}

/// Fill in the derived ratios once every contract has been accumulated.
pub(crate) fn finish(mut stats: RecoveryStats) -> RecoveryStats {
    stats.weighted_recovery_rate = recovery_rate(stats.total_recovered, stats.total_written_off);
    stats.realized_lgd = if stats.total_written_off.is_zero() {
        Decimal::ZERO
    } else {
        (Decimal::ONE - stats.total_recovered / stats.total_written_off).max(Decimal::ZERO)
    };
    for year in stats.by_year.values_mut() {
        year.recovery_rate = recovery_rate(year.recovered, year.written_off);
    }
    stats
}
