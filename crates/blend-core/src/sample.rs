//! Built-in three-silo demonstration dataset.

use blend_types::{
    Coa, DischargeRecord, InputTables, LayerRecord, LotId, SiloId, SiloRecord, SupplierId,
    SupplierRecord,
};

fn silo(id: &str, body_diameter_m: f64, outlet_diameter_m: f64) -> SiloRecord {
    SiloRecord {
        silo_id: SiloId::from(id),
        capacity_kg: 4000.0,
        body_diameter_m,
        outlet_diameter_m,
        initial_mass_kg: None,
        bulk_density_kg_m3: None,
    }
}

fn layer(silo_id: &str, layer_index: u32, lot: &str, supplier: &str, mass: f64) -> LayerRecord {
    LayerRecord {
        silo_id: SiloId::from(silo_id),
        layer_index,
        lot_id: LotId::from(lot),
        supplier: SupplierId::from(supplier),
        segment_mass_kg: mass,
        quality: None,
    }
}

fn supplier(name: &str, values: [f64; 6]) -> SupplierRecord {
    let [moisture, extract, ph, dp, protein, colour] = values;
    SupplierRecord {
        supplier: SupplierId::from(name),
        coa: Coa {
            moisture_pct: moisture,
            fine_extract_db_pct: extract,
            wort_ph: ph,
            diastatic_power_wk: dp,
            total_protein_pct: protein,
            wort_colour_ebc: colour,
        },
    }
}

fn rule(silo_id: &str, mass: Option<f64>, fraction: Option<f64>) -> DischargeRecord {
    DischargeRecord {
        silo_id: SiloId::from(silo_id),
        discharge_mass_kg: mass,
        discharge_fraction: fraction,
    }
}

/// Three silos loaded with three malt lots from three suppliers.
pub fn sample_tables() -> InputTables {
    InputTables {
        silos: vec![silo("S1", 3.0, 0.20), silo("S2", 3.2, 0.20), silo("S3", 3.1, 0.21)],
        layers: vec![
            layer("S1", 0, "L1001", "BBM", 1200.0),
            layer("S1", 1, "L1002", "COFCO", 900.0),
            layer("S1", 2, "L1003", "Malteurop", 700.0),
            layer("S2", 0, "L1001", "BBM", 1400.0),
            layer("S2", 1, "L1003", "Malteurop", 1000.0),
            layer("S2", 2, "L1002", "COFCO", 600.0),
            layer("S3", 0, "L1002", "COFCO", 700.0),
            layer("S3", 1, "L1003", "Malteurop", 700.0),
        ],
        suppliers: vec![
            supplier("BBM", [4.2, 82.0, 5.98, 342.1, 10.12, 3.8]),
            supplier("COFCO", [4.4, 81.8, 5.93, 317.4, 11.1, 4.0]),
            supplier("Malteurop", [4.3, 81.2, 5.97, 336.9, 10.5, 3.8]),
        ],
        discharge: vec![
            rule("S1", Some(1600.0), None),
            rule("S2", None, Some(0.5)),
            rule("S3", Some(800.0), None),
        ],
    }
}
