//! Per-model error metrics over recorded measurements.
//!
//! Each model's received power is compared against the analytical free-space
//! prediction for the same link. Since both share the transmitter EIRP, the
//! received-power error reduces to `FSPL - PathLoss`: positive bias means the
//! model predicts a stronger signal than free space.

use std::collections::BTreeMap;
use std::fmt;

use super::records::MeasurementRecord;
use crate::propagation::signal_calculations::free_space_path_loss;

/// Received-power levels at which coverage ratios are reported.
pub const COVERAGE_THRESHOLDS_DBM: [f64; 3] = [-90.0, -100.0, -110.0];

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageRatio {
    pub threshold_dbm: f64,
    /// Fraction of samples at or above the threshold.
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelEvaluation {
    pub model: String,
    pub samples: usize,
    /// Samples with a finite path loss; the error metrics cover only these.
    pub finite_samples: usize,
    pub rmse_vs_fspl_db: Option<f64>,
    pub bias_vs_fspl_db: Option<f64>,
    pub mean_path_loss_db: Option<f64>,
    /// Mean of `PathLoss - FSPL`.
    pub mean_excess_loss_db: Option<f64>,
    pub coverage: Vec<CoverageRatio>,
    pub line_of_sight_ratio: f64,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() { None } else { Some(values.iter().sum::<f64>() / values.len() as f64) }
}

fn evaluate_model(model: String, rows: &[&MeasurementRecord]) -> ModelEvaluation {
    let samples = rows.len();
    let mut path_losses = Vec::with_capacity(samples);
    let mut errors = Vec::with_capacity(samples);
    for r in rows {
        let fspl = free_space_path_loss(r.distance_m, r.frequency_mhz);
        if r.path_loss_db.is_finite() && fspl.is_finite() {
            path_losses.push(r.path_loss_db);
            errors.push(fspl - r.path_loss_db);
        }
    }

    let squared: Vec<f64> = errors.iter().map(|e| e * e).collect();
    let bias = mean(&errors);
    let coverage = COVERAGE_THRESHOLDS_DBM
        .iter()
        .map(|&threshold_dbm| {
            let covered = rows.iter().filter(|r| r.signal_dbm >= threshold_dbm).count();
            CoverageRatio {
                threshold_dbm,
                ratio: if samples == 0 { 0.0 } else { covered as f64 / samples as f64 },
            }
        })
        .collect();
    let los = rows.iter().filter(|r| r.line_of_sight).count();

    ModelEvaluation {
        model,
        samples,
        finite_samples: errors.len(),
        rmse_vs_fspl_db: mean(&squared).map(f64::sqrt),
        bias_vs_fspl_db: bias,
        mean_path_loss_db: mean(&path_losses),
        mean_excess_loss_db: bias.map(|b| -b),
        coverage,
        line_of_sight_ratio: if samples == 0 { 0.0 } else { los as f64 / samples as f64 },
    }
}

/// Group `records` by propagation model and compute the metrics of each,
/// ordered by model label.
pub fn evaluate(records: &[MeasurementRecord]) -> Vec<ModelEvaluation> {
    let mut by_model: BTreeMap<&'static str, Vec<&MeasurementRecord>> = BTreeMap::new();
    for r in records {
        by_model.entry(r.model.label()).or_default().push(r);
    }
    by_model.into_iter().map(|(label, rows)| evaluate_model(label.to_string(), &rows)).collect()
}

fn fmt_db(v: Option<f64>) -> String {
    v.map(|v| format!("{:+.2} dB", v)).unwrap_or_else(|| "n/a".to_string())
}

impl fmt::Display for ModelEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} samples, RMSE = {}, Mean Bias = {}, mean PL = {}, excess = {}, LOS {:.0}%",
            self.model,
            self.samples,
            self.rmse_vs_fspl_db.map(|v| format!("{:.2} dB", v)).unwrap_or_else(|| "n/a".to_string()),
            fmt_db(self.bias_vs_fspl_db),
            self.mean_path_loss_db.map(|v| format!("{:.1} dB", v)).unwrap_or_else(|| "n/a".to_string()),
            fmt_db(self.mean_excess_loss_db),
            self.line_of_sight_ratio * 100.0
        )?;
        for c in &self.coverage {
            write!(f, ", >= {:.0} dBm: {:.0}%", c.threshold_dbm, c.ratio * 100.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::types::PropagationModel;
    use chrono::Utc;

    fn row(model: PropagationModel, distance_m: f64, path_loss_db: f64, los: bool) -> MeasurementRecord {
        MeasurementRecord {
            recorded_at: Utc::now(),
            scenario: "eval".into(),
            tick: 1,
            model,
            technology: None,
            transmitter_id: 1,
            receiver_id: 1,
            frequency_mhz: 3500.0,
            tx_power_dbm: 0.0,
            distance_m,
            line_of_sight: los,
            path_loss_db,
            signal_dbm: -path_loss_db,
            sensitivity_dbm: -110.0,
            connected_transmitter: None,
            sinr_db: None,
        }
    }

    #[test]
    fn free_space_rows_have_zero_error() {
        let rows: Vec<_> = [100.0, 500.0, 1000.0]
            .iter()
            .map(|&d| row(PropagationModel::FreeSpace, d, free_space_path_loss(d, 3500.0), true))
            .collect();
        let eval = evaluate(&rows);
        assert_eq!(eval.len(), 1);
        assert!(eval[0].rmse_vs_fspl_db.unwrap() < 1e-9);
        assert!(eval[0].bias_vs_fspl_db.unwrap().abs() < 1e-9);
        assert_eq!(eval[0].line_of_sight_ratio, 1.0);
    }

    #[test]
    fn constant_excess_shows_up_as_bias_and_rmse() {
        let rows: Vec<_> = [200.0, 800.0]
            .iter()
            .map(|&d| row(PropagationModel::LogDistance, d, free_space_path_loss(d, 3500.0) + 6.0, false))
            .collect();
        let eval = &evaluate(&rows)[0];
        assert!((eval.rmse_vs_fspl_db.unwrap() - 6.0).abs() < 1e-9);
        assert!((eval.bias_vs_fspl_db.unwrap() + 6.0).abs() < 1e-9);
        assert!((eval.mean_excess_loss_db.unwrap() - 6.0).abs() < 1e-9);
        assert_eq!(eval.line_of_sight_ratio, 0.0);
    }

    #[test]
    fn unreachable_links_count_against_coverage_only() {
        let rows = vec![
            row(PropagationModel::RayTracing, 100.0, 85.0, true),
            row(PropagationModel::RayTracing, 100.0, f64::INFINITY, false),
        ];
        let eval = &evaluate(&rows)[0];
        assert_eq!(eval.samples, 2);
        assert_eq!(eval.finite_samples, 1);
        assert_eq!(eval.coverage[0].threshold_dbm, -90.0);
        assert_eq!(eval.coverage[0].ratio, 0.5);
        assert!(eval.rmse_vs_fspl_db.unwrap().is_finite());
    }

    #[test]
    fn groups_by_model_label() {
        let rows = vec![
            row(PropagationModel::RayTracing, 100.0, 90.0, true),
            row(PropagationModel::Cost231, 100.0, 95.0, true),
            row(PropagationModel::FreeSpace, 100.0, 83.0, true),
        ];
        let names: Vec<_> = evaluate(&rows).into_iter().map(|e| e.model).collect();
        assert_eq!(names, vec!["COST231", "FreeSpace", "RayTracing"]);
        assert!(evaluate(&[]).is_empty());
    }
}
