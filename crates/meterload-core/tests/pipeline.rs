//! End-to-end: import two overlapping files, aggregate, export, snapshot

use meterload_core::{
    aggregate_hourly, aggregate_periods, collect_inputs, import_files, render_rows, summarize,
    to_csv_string, write_export, CellRef, Dataset, Error, ExportSpec, FieldMapping, ImportOptions,
    Quantity, Resolution,
};
use std::fs;
use std::path::Path;

const JANUARY: &str = "\u{feff}CPE;PT0002000099\n\
Date;Time;Active;Inductive;Capacitive\n\
31/01/2024;22:00;10,0;2,0;0\n\
31/01/2024;22:30;20,0;4,0;0\n\
31/01/2024;23:00;8;1,5;0,25\n\
Total;;38;7,5;0,25\n";

const FEBRUARY: &str = "CPE;OTHER\n\
Date;Time;Active;Inductive;Capacitive\n\
31/01/2024;23:00;8;1,5;0,25\n\
01/02/2024;00:15;6;1;0\n\
01/02/2024;00:45;4;1;0\n";

fn mapping() -> FieldMapping {
    FieldMapping {
        date: CellRef::new(2, 0),
        time: Some(CellRef::new(2, 1)),
        active: Some(CellRef::new(2, 2)),
        inductive: Some(CellRef::new(2, 3)),
        capacitive: Some(CellRef::new(2, 4)),
        cpe: Some(CellRef::new(0, 1)),
    }
}

fn write_sources(dir: &Path) {
    let data = dir.join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("2024-01.csv"), JANUARY).unwrap();
    fs::write(data.join("2024-02.csv"), FEBRUARY).unwrap();
}

#[tokio::test]
async fn test_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());

    let inputs = collect_inputs(&[dir.path().join("data")]).unwrap();
    assert_eq!(inputs.len(), 2);

    let outcome = import_files(&inputs, &mapping(), &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.cpe.as_deref(), Some("PT0002000099"));
    assert_eq!(outcome.readings.len(), 6);
    assert_eq!(outcome.skipped_rows, 1);
    assert!(outcome
        .readings
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));

    let dataset = Dataset::from_merge(outcome);
    let hourly = &dataset.hourly;
    assert_eq!(hourly.len(), 3);
    assert_eq!(hourly[0].label, "31/01/2024 22:00");
    assert_eq!(hourly[0].active.avg, 15.0);
    assert_eq!(hourly[0].active.max, 20.0);
    assert_eq!(hourly[0].active.min, 10.0);
    // The 23:00 reading appears in both files
    assert_eq!(hourly[1].samples, 2);
    assert_eq!(hourly[1].active.avg, 8.0);
    assert_eq!(hourly[2].active.avg, 5.0);

    let summary = summarize(hourly).unwrap();
    assert_eq!(summary.hours, 3);
    assert_eq!(summary.quantities[0].total, 28.0);

    // Daily export
    let daily = render_rows(hourly, &ExportSpec::new(Resolution::Daily));
    let text = to_csv_string(&daily);
    let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(lines[0], "Date;Active (kWh);Inductive (kvarh);Capacitive (kvarh)");
    assert_eq!(lines[1], "31/01/2024;23,00;4,50;0,25");
    assert_eq!(lines[2], "01/02/2024;5,00;1,00;0,00");

    // Hourly export with split date/time and a column subset
    let spec = ExportSpec {
        resolution: Resolution::Hourly,
        split_date_time: true,
        columns: vec![Quantity::Active],
    };
    let out = dir.path().join("out");
    let path = write_export(&out, "plant", &render_rows(hourly, &spec)).unwrap();
    assert_eq!(path.file_name().unwrap(), "plant_export_hourly.csv");
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.starts_with('\u{feff}'));
    assert!(written.contains("Date;Time;Active (kW)\n"));
    assert!(written.contains("31/01/2024;22:00;15,00\n"));

    // Snapshot round trip
    let snapshot_path = out.join("project.json");
    dataset.snapshot("plant", Some(&mapping())).save(&snapshot_path).unwrap();
    let mut restored = Dataset::new();
    let metadata = restored.load_snapshot(&snapshot_path).unwrap();
    assert_eq!(metadata.cpe.as_deref(), Some("PT0002000099"));
    assert_eq!(restored, dataset);
    assert_eq!(aggregate_hourly(&restored.readings), restored.hourly);
}

#[tokio::test]
async fn test_wrong_mapping_reports_no_valid_data() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());

    // Pointing the date at the quantity column resolves nothing
    let mut wrong = mapping();
    wrong.date = CellRef::new(2, 4);
    wrong.time = None;

    let inputs = collect_inputs(&[dir.path().join("data")]).unwrap();
    let err = import_files(&inputs, &wrong, &ImportOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoValidData));
    assert_eq!(err.to_string(), "no valid data found");
}

#[test]
fn test_monthly_equals_sum_of_daily() {
    let readings: Vec<_> = (0..24 * 40)
        .map(|h| meterload_core::RawReading {
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + chrono::Duration::hours(h),
            active: (h % 24) as f64,
            inductive: 1.0,
            capacitive: 0.5,
        })
        .collect();
    let hourly = aggregate_hourly(&readings);

    let daily = aggregate_periods(&hourly, Resolution::Daily);
    let monthly = aggregate_periods(&hourly, Resolution::Monthly);
    assert_eq!(monthly.len(), 2);

    for month in &monthly {
        let days: f64 = daily
            .iter()
            .filter(|d| Resolution::Monthly.period_start(d.period_start) == month.period_start)
            .map(|d| d.active)
            .sum();
        assert!((days - month.active).abs() < 1e-9);
    }
}
