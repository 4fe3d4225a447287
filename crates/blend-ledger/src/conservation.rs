//! Conservation law verification for silo mass ledgers.
//!
//! Discharge only moves mass from a segment to the outlet, so for every
//! segment the loaded mass must equal what left plus what stayed. The
//! bookings log must also add up to each account's discharged total, and
//! the lot and silo roll-ups must agree with the segment rows they were
//! built from.
//!
//! A violation produces a [`LedgerAnomaly`].

use std::collections::BTreeMap;

use blend_types::{LotLedgerRow, MassBalance, SegmentLedgerRow, SiloId, SiloLedgerRow};

use crate::ledger::MassLedger;
use crate::{LedgerAnomaly, mass_tolerance_kg};

/// The result of a conservation check.
#[derive(Debug, Clone, PartialEq)]
pub enum ConservationResult {
    /// Every balance holds within tolerance.
    Balanced,
    /// One or more balances are off.
    Anomaly(LedgerAnomaly),
}

impl ConservationResult {
    /// Whether the check passed.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Record `(expected, actual)` under `key` when they differ by more than
/// the tolerance for `scale_kg` of loaded mass.
fn compare(
    imbalances: &mut BTreeMap<String, (f64, f64)>,
    key: String,
    scale_kg: f64,
    expected: f64,
    actual: f64,
) {
    let gap = (expected - actual).abs();
    if gap.is_nan() || gap > mass_tolerance_kg(scale_kg) {
        imbalances.insert(key, (expected, actual));
    }
}

/// Check `initial == discharged + remaining` for one balance.
fn compare_balance(imbalances: &mut BTreeMap<String, (f64, f64)>, key: &str, b: &MassBalance) {
    compare(
        imbalances,
        key.to_owned(),
        b.initial_mass_kg,
        b.initial_mass_kg,
        b.discharged_mass_kg + b.remaining_mass_kg,
    );
}

fn finish(
    silo_id: Option<SiloId>,
    imbalances: BTreeMap<String, (f64, f64)>,
) -> ConservationResult {
    if imbalances.is_empty() {
        return ConservationResult::Balanced;
    }
    let count = imbalances.len();
    let scope = silo_id
        .as_ref()
        .map_or_else(|| "plant".to_owned(), |id| format!("silo {id}"));
    tracing::error!(scope = %scope, count, "mass conservation violated");
    ConservationResult::Anomaly(LedgerAnomaly {
        silo_id,
        imbalances,
        message: format!("mass conservation violated in {scope} for {count} balance(s)"),
    })
}

/// Verify one silo's ledger.
///
/// For each segment: the bookings sum to the discharged total, nothing was
/// drawn beyond the loaded mass, and the balance identity holds.
pub fn verify_ledger(ledger: &MassLedger) -> ConservationResult {
    let mut booked: BTreeMap<u32, f64> = BTreeMap::new();
    for entry in ledger.entries() {
        *booked.entry(entry.layer_index).or_insert(0.0) += entry.mass_kg;
    }

    let mut imbalances = BTreeMap::new();
    for account in ledger.accounts() {
        let key = format!("{}/layer {}", ledger.silo_id(), account.layer_index);
        let logged = booked.get(&account.layer_index).copied().unwrap_or(0.0);
        compare(
            &mut imbalances,
            format!("{key} bookings"),
            account.initial_mass_kg,
            account.discharged_mass_kg,
            logged,
        );
        let balance = MassBalance::new(account.initial_mass_kg, account.discharged_mass_kg);
        compare_balance(&mut imbalances, &key, &balance);
    }

    finish(Some(ledger.silo_id().clone()), imbalances)
}

/// Verify the reported state ledgers against each other.
///
/// Every row must satisfy the balance identity, each lot and silo row must
/// equal the sum of its segment rows, and the lot and silo ledgers must
/// carry the same plant totals.
pub fn verify_state_ledgers(
    segments: &[SegmentLedgerRow],
    lots: &[LotLedgerRow],
    silos: &[SiloLedgerRow],
) -> ConservationResult {
    let mut imbalances = BTreeMap::new();

    let mut lot_sums: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    let mut silo_sums: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for row in segments {
        let key = format!("{}/layer {}", row.silo_id, row.layer_index);
        compare_balance(&mut imbalances, &key, &row.balance);
        let lot = lot_sums.entry(row.lot_id.as_str()).or_insert((0.0, 0.0));
        lot.0 += row.balance.initial_mass_kg;
        lot.1 += row.balance.discharged_mass_kg;
        let silo = silo_sums.entry(row.silo_id.as_str()).or_insert((0.0, 0.0));
        silo.0 += row.balance.initial_mass_kg;
        silo.1 += row.balance.discharged_mass_kg;
    }

    for row in lots {
        let key = format!("lot {}", row.lot_id);
        compare_balance(&mut imbalances, &key, &row.balance);
        let (initial, discharged) = lot_sums.get(row.lot_id.as_str()).copied().unwrap_or((0.0, 0.0));
        compare(
            &mut imbalances,
            format!("{key} initial"),
            initial,
            initial,
            row.balance.initial_mass_kg,
        );
        compare(
            &mut imbalances,
            format!("{key} discharged"),
            initial,
            discharged,
            row.balance.discharged_mass_kg,
        );
    }

    for row in silos {
        let key = format!("silo {}", row.silo_id);
        compare_balance(&mut imbalances, &key, &row.balance);
        let (initial, discharged) = silo_sums.get(row.silo_id.as_str()).copied().unwrap_or((0.0, 0.0));
        compare(
            &mut imbalances,
            format!("{key} initial"),
            initial,
            initial,
            row.balance.initial_mass_kg,
        );
        compare(
            &mut imbalances,
            format!("{key} discharged"),
            initial,
            discharged,
            row.balance.discharged_mass_kg,
        );
    }

    let plant_initial: f64 = silos.iter().map(|r| r.balance.initial_mass_kg).sum();
    let lot_total: f64 = lots.iter().map(|r| r.balance.discharged_mass_kg).sum();
    let silo_total: f64 = silos.iter().map(|r| r.balance.discharged_mass_kg).sum();
    compare(
        &mut imbalances,
        "plant discharged".to_owned(),
        plant_initial,
        silo_total,
        lot_total,
    );

    finish(None, imbalances)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rollup::lot_rows;
    use blend_types::{LotId, SupplierId};

    fn ledger() -> MassLedger {
        let mut ledger = MassLedger::new(SiloId::from("S1"));
        let _ = ledger.open_segment(0, LotId::from("L1"), SupplierId::from("A"), 100.0);
        let _ = ledger.open_segment(1, LotId::from("L2"), SupplierId::from("B"), 80.0);
        let _ = ledger.record_discharge(0, 0, 60.0);
        let _ = ledger.record_discharge(1, 0, 40.0);
        let _ = ledger.record_discharge(1, 1, 5.0);
        ledger
    }

    #[test]
    fn empty_ledger_is_balanced() {
        let ledger = MassLedger::new(SiloId::from("S1"));
        assert!(verify_ledger(&ledger).is_balanced());
    }

    #[test]
    fn drawn_ledger_is_balanced() {
        assert_eq!(verify_ledger(&ledger()), ConservationResult::Balanced);
    }

    #[test]
    fn consistent_state_ledgers_balance() {
        let ledger = ledger();
        let segments = ledger.segment_rows();
        let lots = lot_rows(&segments);
        let silos = vec![ledger.silo_row()];
        assert!(verify_state_ledgers(&segments, &lots, &silos).is_balanced());
    }

    #[test]
    fn tampered_silo_row_is_an_anomaly() {
        let ledger = ledger();
        let segments = ledger.segment_rows();
        let lots = lot_rows(&segments);
        let mut silo = ledger.silo_row();
        silo.balance = MassBalance::new(silo.balance.initial_mass_kg, 1.0);
        let result = verify_state_ledgers(&segments, &lots, &[silo]);
        assert!(!result.is_balanced());
        if let ConservationResult::Anomaly(anomaly) = result {
            assert!(anomaly.silo_id.is_none());
            assert!(anomaly.imbalances.contains_key("silo S1 discharged"));
            assert!(anomaly.to_string().contains("plant"));
        }
    }

    fn segment(initial: f64, remaining_error: f64) -> SegmentLedgerRow {
        let mut balance = MassBalance::new(initial, initial / 2.0);
        balance.remaining_mass_kg += remaining_error;
        SegmentLedgerRow {
            silo_id: SiloId::from("S1"),
            layer_index: 0,
            lot_id: LotId::from("L1"),
            supplier: SupplierId::from("A"),
            balance,
        }
    }

    #[test]
    fn tolerance_is_relative_to_loaded_mass() {
        assert!(verify_state_ledgers(&[segment(1e7, 1e-3)], &[], &[]).is_balanced());
        assert!(!verify_state_ledgers(&[segment(1e7, 100.0)], &[], &[]).is_balanced());
        assert!(!verify_state_ledgers(&[segment(100.0, 1e-3)], &[], &[]).is_balanced());
    }

    #[test]
    fn tiny_segments_use_one_kilogram_floor() {
        assert!(verify_state_ledgers(&[segment(0.01, 5e-7)], &[], &[]).is_balanced());
        assert!(!verify_state_ledgers(&[segment(0.01, 5e-6)], &[], &[]).is_balanced());
    }

    #[test]
    fn overdrawn_row_breaks_identity() {
        let mut segments = ledger().segment_rows();
        segments.first_mut().unwrap().balance.discharged_mass_kg = 150.0;
        let result = verify_state_ledgers(&segments, &[], &[]);
        assert!(!result.is_balanced());
    }
}
