//! Per-silo segment accounts and the discharge booking log.
//!
//! A [`MassLedger`] is opened for one silo, loaded with its segments in
//! outlet-first order, and then drawn down step by step as the simulator
//! withdraws material. Every non-zero withdrawal is appended as a
//! [`DischargeEntry`]; entries are never modified or removed.

use blend_types::{LotId, MassBalance, SegmentLedgerRow, SiloId, SiloLedgerRow, SupplierId};

use crate::conservation::{ConservationResult, verify_ledger};
use crate::{LedgerError, check_quantity, mass_tolerance_kg};

// ---------------------------------------------------------------------------
// Accounts and entries
// ---------------------------------------------------------------------------

/// Running account for one loaded segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentAccount {
    /// Stacking position, 0 at the outlet.
    pub layer_index: u32,
    /// Lot of the segment.
    pub lot_id: LotId,
    /// Supplier of the lot.
    pub supplier: SupplierId,
    /// Mass loaded before the run.
    pub initial_mass_kg: f64,
    /// Mass booked out so far.
    pub discharged_mass_kg: f64,
}

impl SegmentAccount {
    /// Mass still held by the segment, never negative.
    pub fn remaining_mass_kg(&self) -> f64 {
        (self.initial_mass_kg - self.discharged_mass_kg).max(0.0)
    }

    /// Whether the segment holds no more than `epsilon` kg.
    pub fn is_exhausted(&self, epsilon: f64) -> bool {
        self.remaining_mass_kg() <= epsilon
    }
}

/// One booking: mass withdrawn from a segment during a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DischargeEntry {
    /// Simulation step of the withdrawal.
    pub step: u32,
    /// Segment the mass came from.
    pub layer_index: u32,
    /// Mass withdrawn, strictly positive.
    pub mass_kg: f64,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Mass ledger for a single silo.
///
/// Invariants held by construction:
/// 1. Segments are contiguous from layer 0.
/// 2. Every booking is non-negative and finite.
/// 3. No segment is drawn below zero beyond [`mass_tolerance_kg`] of its load.
#[derive(Debug, Clone)]
pub struct MassLedger {
    silo_id: SiloId,
    accounts: Vec<SegmentAccount>,
    entries: Vec<DischargeEntry>,
}

impl MassLedger {
    /// Create an empty ledger for a silo.
    pub const fn new(silo_id: SiloId) -> Self {
        Self {
            silo_id,
            accounts: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// The silo this ledger tracks.
    pub const fn silo_id(&self) -> &SiloId {
        &self.silo_id
    }

    /// Open the next segment with its loaded mass.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the mass is invalid or `layer_index` is
    /// not the next contiguous index.
    pub fn open_segment(
        &mut self,
        layer_index: u32,
        lot_id: LotId,
        supplier: SupplierId,
        initial_mass_kg: f64,
    ) -> Result<(), LedgerError> {
        check_quantity(initial_mass_kg)?;
        let expected = u32::try_from(self.accounts.len()).unwrap_or(u32::MAX);
        if layer_index != expected {
            return Err(LedgerError::OutOfOrderSegment {
                silo_id: self.silo_id.clone(),
                expected,
                actual: layer_index,
            });
        }
        self.accounts.push(SegmentAccount {
            layer_index,
            lot_id,
            supplier,
            initial_mass_kg,
            discharged_mass_kg: 0.0,
        });
        Ok(())
    }

    /// Book `mass_kg` out of the segment at `layer_index`.
    ///
    /// Zero bookings are accepted and not logged. A request exceeding the
    /// remaining mass by no more than [`mass_tolerance_kg`] of the segment's
    /// loaded mass is clipped to what remains.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the quantity is invalid, the segment does
    /// not exist, or the booking would overdraw it.
    pub fn record_discharge(
        &mut self,
        step: u32,
        layer_index: u32,
        mass_kg: f64,
    ) -> Result<f64, LedgerError> {
        check_quantity(mass_kg)?;
        let silo_id = &self.silo_id;
        let account = usize::try_from(layer_index)
            .ok()
            .and_then(|i| self.accounts.get_mut(i))
            .ok_or_else(|| LedgerError::UnknownSegment {
                silo_id: silo_id.clone(),
                layer_index,
            })?;

        let available = account.remaining_mass_kg();
        if mass_kg > available + mass_tolerance_kg(account.initial_mass_kg) {
            return Err(LedgerError::Overdraw {
                silo_id: silo_id.clone(),
                layer_index,
                requested: mass_kg,
                available,
            });
        }

        let booked = mass_kg.min(available);
        if booked <= 0.0 {
            return Ok(0.0);
        }
        account.discharged_mass_kg += booked;
        self.entries.push(DischargeEntry {
            step,
            layer_index,
            mass_kg: booked,
        });
        Ok(booked)
    }

    /// All segment accounts, in layer order.
    pub fn accounts(&self) -> &[SegmentAccount] {
        &self.accounts
    }

    /// All bookings, in insertion order.
    pub fn entries(&self) -> &[DischargeEntry] {
        &self.entries
    }

    /// The account at `layer_index`, if open.
    pub fn account(&self, layer_index: u32) -> Option<&SegmentAccount> {
        usize::try_from(layer_index)
            .ok()
            .and_then(|i| self.accounts.get(i))
    }

    /// Number of open segments.
    pub const fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether no segment has been opened.
    pub const fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Mass loaded across all segments.
    pub fn total_initial_kg(&self) -> f64 {
        self.accounts.iter().map(|a| a.initial_mass_kg).sum()
    }

    /// Mass booked out across all segments.
    pub fn total_discharged_kg(&self) -> f64 {
        self.accounts.iter().map(|a| a.discharged_mass_kg).sum()
    }

    /// Mass still held across all segments.
    pub fn total_remaining_kg(&self) -> f64 {
        self.accounts
            .iter()
            .map(SegmentAccount::remaining_mass_kg)
            .sum()
    }

    /// Segment state ledger rows, in layer order.
    pub fn segment_rows(&self) -> Vec<SegmentLedgerRow> {
        self.accounts
            .iter()
            .map(|a| SegmentLedgerRow {
                silo_id: self.silo_id.clone(),
                layer_index: a.layer_index,
                lot_id: a.lot_id.clone(),
                supplier: a.supplier.clone(),
                balance: MassBalance::new(a.initial_mass_kg, a.discharged_mass_kg),
            })
            .collect()
    }

    /// The silo state ledger row.
    pub fn silo_row(&self) -> SiloLedgerRow {
        SiloLedgerRow {
            silo_id: self.silo_id.clone(),
            balance: MassBalance::new(self.total_initial_kg(), self.total_discharged_kg()),
        }
    }

    /// Verify the conservation law for this silo.
    pub fn verify_conservation(&self) -> ConservationResult {
        verify_ledger(self)
    }
}
