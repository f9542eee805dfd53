//! CSV export of measurement rows.

use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::records::MeasurementRecord;

pub const CSV_HEADER: &str = "Timestamp,ScenarioName,Tick,PropagationModel,Technology,TxId,RxId,TxFrequency,TxPower,Distance,IsLOS,PathLoss,RxSignalStrength,RxSensitivity,ConnectedTx,Sinr";

fn escape_csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Whole numbers without a trailing fraction; infinities as `inf` / `-inf`.
fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn format_row(r: &MeasurementRecord) -> String {
    [
        r.recorded_at.to_rfc3339(),
        escape_csv_field(&r.scenario),
        r.tick.to_string(),
        r.model.label().to_string(),
        r.technology.map(|t| t.label().to_string()).unwrap_or_default(),
        r.transmitter_id.to_string(),
        r.receiver_id.to_string(),
        format_float(r.frequency_mhz),
        format_float(r.tx_power_dbm),
        format_float(r.distance_m),
        r.line_of_sight.to_string(),
        format_float(r.path_loss_db),
        format_float(r.signal_dbm),
        format_float(r.sensitivity_dbm),
        r.connected_transmitter.map(|id| id.to_string()).unwrap_or_default(),
        r.sinr_db.map(format_float).unwrap_or_default(),
    ]
    .join(",")
}

pub fn write_csv<W: Write>(writer: &mut W, records: &[MeasurementRecord]) -> std::io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for record in records {
        writeln!(writer, "{}", format_row(record))?;
    }
    Ok(())
}

/// Write `records` to `path`, creating missing parent directories.
pub fn export_csv(path: &Path, records: &[MeasurementRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_csv(&mut writer, records).with_context(|| format!("Failed to write {}", path.display()))?;
    writer.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
    log::info!("Wrote {} measurement rows to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::types::{PropagationModel, Technology};
    use chrono::{TimeZone, Utc};

    fn record() -> MeasurementRecord {
        MeasurementRecord {
            recorded_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            scenario: "city, north".into(),
            tick: 3,
            model: PropagationModel::Cost231,
            technology: Some(Technology::Lte),
            transmitter_id: 1,
            receiver_id: 7,
            frequency_mhz: 700.0,
            tx_power_dbm: 43.0,
            distance_m: 512.25,
            line_of_sight: false,
            path_loss_db: 121.5,
            signal_dbm: -78.5,
            sensitivity_dbm: -110.0,
            connected_transmitter: Some(1),
            sinr_db: Some(4.5),
        }
    }

    #[test]
    fn header_and_row_layout() {
        let mut unconnected = record();
        unconnected.connected_transmitter = None;
        unconnected.sinr_db = None;
        unconnected.technology = None;
        unconnected.signal_dbm = f64::NEG_INFINITY;
        unconnected.path_loss_db = f64::INFINITY;

        let mut out = Vec::new();
        write_csv(&mut out, &[record(), unconnected]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            "2024-05-01T12:00:00+00:00,\"city, north\",3,COST231,LTE,1,7,700,43,512.25,false,121.5,-78.5,-110,1,4.5"
        );
        assert_eq!(lines[2], "2024-05-01T12:00:00+00:00,\"city, north\",3,COST231,,1,7,700,43,512.25,false,inf,-inf,-110,,");
        assert_eq!(lines[2].split(',').count(), CSV_HEADER.split(',').count() + 1);
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(escape_csv_field("a\"b"), "\"a\"\"b\"");
        assert_eq!(escape_csv_field("plain"), "plain");
    }

    #[test]
    fn export_creates_parent_directories() {
        let dir = std::env::temp_dir().join(format!("rf-coverage-csv-{}", std::process::id()));
        let path = dir.join("nested").join("out.csv");
        export_csv(&path, &[record()]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
