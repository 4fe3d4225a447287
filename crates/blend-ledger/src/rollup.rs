//! Lot state ledger roll-up.
//!
//! A lot can be split across several silos; its row sums every segment of
//! that lot wherever it was loaded.

use std::collections::{BTreeMap, BTreeSet};

use blend_types::{LotId, LotLedgerRow, MassBalance, SegmentLedgerRow, SiloId, SupplierId};

struct LotTotals {
    supplier: SupplierId,
    silo_ids: BTreeSet<SiloId>,
    initial_mass_kg: f64,
    discharged_mass_kg: f64,
}

/// Aggregate segment rows into one row per lot, ordered by lot id.
pub fn lot_rows(segments: &[SegmentLedgerRow]) -> Vec<LotLedgerRow> {
    let mut totals: BTreeMap<LotId, LotTotals> = BTreeMap::new();
    for row in segments {
        let lot = totals
            .entry(row.lot_id.clone())
            .or_insert_with(|| LotTotals {
                supplier: row.supplier.clone(),
                silo_ids: BTreeSet::new(),
                initial_mass_kg: 0.0,
                discharged_mass_kg: 0.0,
            });
        lot.silo_ids.insert(row.silo_id.clone());
        lot.initial_mass_kg += row.balance.initial_mass_kg;
        lot.discharged_mass_kg += row.balance.discharged_mass_kg;
    }

    totals
        .into_iter()
        .map(|(lot_id, t)| LotLedgerRow {
            lot_id,
            supplier: t.supplier,
            silo_ids: t.silo_ids.into_iter().collect(),
            balance: MassBalance::new(t.initial_mass_kg, t.discharged_mass_kg),
        })
        .collect()
}
