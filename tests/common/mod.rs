//! Synthetic survey extract shared by the integration tests.
//!
//! Four strata of six clusters with ten respondents each. Values come from a
//! fixed linear congruential sequence, so every run writes the same file.

use std::fs;
use std::path::{Path, PathBuf};

pub const N_ROWS: usize = 240;
/// Row whose adjusted tooth count is negative.
pub const NEGATIVE_TEETH_ROW: usize = 7;

struct Lcg(u64);

impl Lcg {
    fn uniform(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    fn between(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.uniform()
    }

    fn code(&mut self, p_yes: f64) -> f64 {
        if self.uniform() < p_yes { 1.0 } else { 2.0 }
    }
}

fn fmt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

/// Column names in file order, then one row of cells per respondent.
pub fn survey_rows() -> (Vec<&'static str>, Vec<Vec<String>>) {
    let header = vec![
        "stratum_id",
        "cluster_id",
        "weight_general",
        "weight_dental",
        "household_income",
        "education_level",
        "crowding_index",
        "sbp_1",
        "sbp_2",
        "dbp_1",
        "dbp_2",
        "total_cholesterol",
        "hdl_cholesterol",
        "hba1c",
        "waist_cm",
        "crp",
        "pulse_1",
        "pulse_2",
        "creatinine",
        "med_hypertension",
        "med_lipids",
        "med_diabetes",
        "teeth_total_adjusted",
        "cancer_history",
        "cancer_cervix",
        "cancer_breast",
        "cancer_ovary",
        "cancer_uterus",
        "cancer_prostate",
        "cancer_testis",
        "sex",
        "age",
        "zone",
        "smoking_current",
        "smoking_status",
    ];

    let mut rng = Lcg(20_240_917);
    let rows = (0..N_ROWS)
        .map(|row| {
            let stratum = row / 60 + 1;
            let cluster = stratum * 10 + (row % 60) / 10;
            let male = rng.uniform() < 0.5;
            let age = rng.between(18.0, 85.0).round();
            let teeth = if rng.uniform() < 0.1 {
                0.0
            } else {
                (32.0 - (age - 18.0) * rng.between(0.0, 0.45)).round().max(1.0)
            };
            let teeth = if row == NEGATIVE_TEETH_ROW { -3.0 } else { teeth };

            let linear = -1.6 + 0.03 * (age - 50.0) + 0.04 * (32.0 - teeth.max(0.0));
            let case = rng.uniform() < 1.0 / (1.0 + (-linear).exp());
            let module_answer = |is_site: bool| fmt(Some(if case && is_site { 1.0 } else { 2.0 }));
            let site = (rng.uniform() * 4.0) as usize;

            let mut cells = vec![
                stratum.to_string(),
                cluster.to_string(),
                fmt(Some(rng.between(50.0, 150.0))),
                if row % 3 == 0 {
                    String::new()
                } else {
                    fmt(Some(rng.between(40.0, 180.0)))
                },
                if row % 17 == 0 {
                    String::new()
                } else {
                    fmt(Some(rng.between(50_000.0, 400_000.0).round()))
                },
                fmt(Some((rng.between(1.0, 6.0)).floor())),
                fmt(Some(rng.between(0.5, 4.0))),
                fmt(Some(rng.between(100.0, 170.0))),
                fmt(Some(rng.between(100.0, 170.0))),
                fmt(Some(rng.between(60.0, 100.0))),
                fmt(Some(rng.between(60.0, 100.0))),
                fmt(Some(rng.between(140.0, 260.0))),
                fmt(Some(rng.between(30.0, 80.0))),
                fmt(Some(rng.between(4.5, 8.0))),
                fmt(Some(rng.between(70.0, 120.0))),
                fmt(Some(rng.between(0.2, 6.0))),
                fmt(Some(rng.between(55.0, 100.0))),
                fmt(Some(rng.between(55.0, 100.0))),
                fmt(Some(rng.between(0.6, 1.5))),
                fmt(Some(rng.code(0.2))),
                fmt(Some(rng.code(0.15))),
                fmt(Some(rng.code(0.1))),
                fmt(Some(teeth)),
                fmt(Some(if case || rng.uniform() < 0.05 { 1.0 } else { 2.0 })),
            ];
            for i in 0..4 {
                cells.push(if male { String::new() } else { module_answer(site == i) });
            }
            for i in 0..2 {
                cells.push(if male { module_answer(site % 2 == i) } else { String::new() });
            }
            cells.push(fmt(Some(if male { 1.0 } else { 2.0 })));
            cells.push(fmt(Some(age)));
            cells.push(fmt(Some(rng.code(0.7))));
            cells.push(fmt(Some(rng.code(0.25))));
            cells.push(fmt(Some((rng.between(1.0, 5.0)).floor())));
            cells
        })
        .collect();
    (header, rows)
}

pub fn write_delimited(path: &Path, header: &[&str], rows: &[Vec<String>], separator: char) {
    let sep = separator.to_string();
    let mut text = header.join(&sep);
    text.push('\n');
    for row in rows {
        text.push_str(&row.join(&sep));
        text.push('\n');
    }
    fs::write(path, text).unwrap();
}

/// Writes the standard tab-separated extract into `dir`.
pub fn write_survey(dir: &Path) -> PathBuf {
    let (header, rows) = survey_rows();
    let path = dir.join("survey.tsv");
    write_delimited(&path, &header, &rows, '\t');
    path
}
