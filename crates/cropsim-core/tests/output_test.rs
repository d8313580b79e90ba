// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for output validation and ingestion.

use std::path::Path;

use cropsim_core::output::{
    CellValue, GEOMETRY_TABLE, IngestOptions, IngestOutcome, OutputTable, ingest_run,
};
use cropsim_core::{Crop, OutputKind, RunStore, SqliteStore};
use tempfile::TempDir;

const SITE: &str = "Beltsville";

const G01: &str = "\
jday, date, time, SoilT, SolRad, TotLeafDM, ETdmd, LA/pl, LAI
119, 4/28/2024, 6, 12.1, 310.5, 1.2, 0.1, 10.5, 0.20
120, 4/29/2024, 6, 12.8, 295.0, 1.4, 0.2, 11.0, 0.25
121, 4/30/2024, 6, 13.0, 301.2, 1.7, 0.2, 11.9, 0.31
";

const G01_MISSING_LAI: &str = "\
jday, date, time, SoilT, SolRad, TotLeafDM, ETdmd, LA/pl, LAI
119, 4/28/2024, 6, 12.1, 310.5, 1.2, 0.1, 10.5, 0.20
120, 4/29/2024, 6, 12.8, 295.0, 1.4, 0.2, 11.0,
121, 4/30/2024, 6, 13.0, 301.2, 1.7, 0.2, 11.9, 0.31
";

const G03: &str = "\
Date_time, Date, X, Y, Area, hNew, thNew, Vx, Vy, Q, NO3N, NH4N, Temp, CO2Conc, O2Conc
45410.25, 04/28/2024, 0.0, 150.0, 12.5, -100, 0.30, 0, 0, 0, 25, 2, 12, 400, 206000
45410.25, 04/28/2024, 37.5, 150.0, 12.5, -110, 0.29, 0, 0, 0, 25, 2, 12, 400, 206000
45411.25, 04/29/2024, 0.0, 150.0, 12.5, -90, 0.31, 0, 0, 0, 24, 2, 13, 410, 205000
45411.25, 04/29/2024, 37.5, 150.0, 12.5, -95, 0.30, 0, 0, 0, 24, 2, 13, 410, 205000
";

const G04: &str = "\
Date_time, Date, X, Y, RDenT, RMassM
45410.25, 04/28/2024, 0.0, 150.0, 0.01, 0.002
45411.25, 04/29/2024, 0.0, 150.0, 0.02, 0.003
";

const G05: &str = "\
Date_time, Date, PSoilEvap, ActualTrans
45410.25, 04/28/2024, 0.12, 0.05
45411.25, 04/29/2024, 0.14, 0.06
";

const G07: &str = "\
Date_time, Date, X, Y, Humus_N, Litter_C
45410.25, 04/28/2024, 0.0, 150.0, 120.5, 30.1
45411.25, 04/29/2024, 0.0, 150.0, 120.4, 30.3
";

const PLANT_STRESS: &str = "\
jday, date, time, waterstress, N_stress
119, 4/28/2024, 6, 1.0, 0.9
120, 4/29/2024, 6, 1.0, 0.8
";

const GRID: &str = "\
***** GRID FOR Beltsville *****
KodBound  NumNP  NumEl
2  3  1
 n     x       y      MatNum
 1    0.0    150.0     1
 2   37.5    150.0     1
 ELEMENT INFORMATION
 e  i  j  k  l  MatNum
 1  1  2  2  1  1
";

fn write_outputs(dir: &Path, g01: &str) {
    let files = [
        (format!("{SITE}.g01"), g01),
        (format!("{SITE}.G03"), G03),
        (format!("{SITE}.G04"), G04),
        (format!("{SITE}.G05"), G05),
        (format!("{SITE}.G07"), G07),
        ("plantstress.crp".to_string(), PLANT_STRESS),
        (format!("{SITE}.grd"), GRID),
    ];
    for (name, contents) in files {
        std::fs::write(dir.join(name), contents).unwrap();
    }
}

async fn store(dir: &TempDir) -> SqliteStore {
    SqliteStore::from_path(dir.path().join("cropsim.db"))
        .await
        .expect("Failed to open store")
}

async fn total_rows(store: &SqliteStore, crop: Crop, run_id: i64) -> i64 {
    let mut total = store.count_rows(GEOMETRY_TABLE, run_id).await.unwrap();
    for table in crop.tables() {
        total += store.count_rows(&table, run_id).await.unwrap();
    }
    total
}

async fn columns(store: &SqliteStore, table: &str) -> Vec<String> {
    sqlx::query_scalar(&format!("SELECT name FROM pragma_table_info('{table}')"))
        .fetch_all(store.pool())
        .await
        .unwrap()
}

// ===== Clean runs =====

#[tokio::test]
async fn test_clean_run_is_stored_with_run_id() {
    let db = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let store = store(&db).await;
    write_outputs(work.path(), G01);

    let outcome = ingest_run(&store, 1, Crop::Maize, SITE, work.path(), IngestOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome, IngestOutcome::Stored { tables: 7, rows: 17 });
    assert_eq!(store.count_rows("g01_maize", 1).await.unwrap(), 3);
    assert_eq!(store.count_rows("g03_maize", 1).await.unwrap(), 4);
    assert_eq!(store.count_rows("plantstress_maize", 1).await.unwrap(), 2);
    assert_eq!(store.count_rows(GEOMETRY_TABLE, 1).await.unwrap(), 2);
    // output files are kept unless removal is requested
    assert!(work.path().join("Beltsville.g01").exists());
}

#[tokio::test]
async fn test_timestamps_follow_file_conventions() {
    let db = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let store = store(&db).await;
    write_outputs(work.path(), G01);

    ingest_run(&store, 1, Crop::Maize, SITE, work.path(), IngestOptions::default())
        .await
        .unwrap();

    let soil: Vec<String> =
        sqlx::query_scalar(r#"SELECT "Date_Time" FROM g05_maize WHERE run_id = 1 ORDER BY rowid"#)
            .fetch_all(store.pool())
            .await
            .unwrap();
    assert_eq!(soil, ["2024-04-28 06:00:00", "2024-04-29 06:00:00"]);

    let growth: Vec<String> =
        sqlx::query_scalar(r#"SELECT "Date_Time" FROM g01_maize WHERE run_id = 1 ORDER BY rowid"#)
            .fetch_all(store.pool())
            .await
            .unwrap();
    assert_eq!(growth[0], "2024-04-28 06:00:00");
}

#[tokio::test]
async fn test_stored_columns_are_pruned_and_sanitised() {
    let db = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let store = store(&db).await;
    write_outputs(work.path(), G01);

    ingest_run(&store, 1, Crop::Maize, SITE, work.path(), IngestOptions::default())
        .await
        .unwrap();

    let g01 = columns(&store, "g01_maize").await;
    assert!(g01.contains(&"LA_pl".to_string()));
    assert!(!g01.contains(&"date".to_string()));
    assert!(!g01.contains(&"time".to_string()));

    let g03 = columns(&store, "g03_maize").await;
    for dropped in ["Area", "Vx", "Vy", "Date", "Date_time"] {
        assert!(!g03.contains(&dropped.to_string()), "{dropped} kept");
    }
    assert!(g03.contains(&"Date_Time".to_string()));

    let geometry = columns(&store, "geometry").await;
    for column in ["run_id", "nodeNum", "X", "Y", "Layer", "Area"] {
        assert!(geometry.contains(&column.to_string()), "{column} missing");
    }
    assert!(!geometry.contains(&"hNew".to_string()));
}

#[tokio::test]
async fn test_output_files_removed_on_request() {
    let db = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let store = store(&db).await;
    write_outputs(work.path(), G01);

    ingest_run(
        &store,
        1,
        Crop::Maize,
        SITE,
        work.path(),
        IngestOptions {
            remove_output_files: true,
        },
    )
    .await
    .unwrap();

    for kind in Crop::Maize.output_kinds() {
        assert!(!work.path().join(kind.file_name(SITE)).exists());
    }
}

// ===== Rejected runs =====

#[tokio::test]
async fn test_missing_cell_rejects_whole_run() {
    let db = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let store = store(&db).await;
    write_outputs(work.path(), G01_MISSING_LAI);

    let outcome = ingest_run(&store, 1, Crop::Maize, SITE, work.path(), IngestOptions::default())
        .await
        .unwrap();

    let IngestOutcome::Rejected(report) = outcome else {
        panic!("expected rejection");
    };
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].file, "Beltsville.g01");
    assert_eq!(report.files[0].columns[0].column, "LAI");
    assert_eq!(report.files[0].columns[0].dates, ["04/29/2024"]);
    assert_eq!(total_rows(&store, Crop::Maize, 1).await, 0);
}

#[tokio::test]
async fn test_rejection_purges_only_that_run() {
    let db = tempfile::tempdir().unwrap();
    let store = store(&db).await;

    let clean = tempfile::tempdir().unwrap();
    write_outputs(clean.path(), G01);
    ingest_run(&store, 1, Crop::Maize, SITE, clean.path(), IngestOptions::default())
        .await
        .unwrap();

    // rows the failing run already owns must go too
    let stray = OutputTable {
        table: OutputKind::G05.table_name(Crop::Maize),
        columns: vec!["PSoilEvap".into()],
        rows: vec![vec![CellValue::Real(0.1)]],
    };
    store.append_rows(2, &stray).await.unwrap();

    let dirty = tempfile::tempdir().unwrap();
    write_outputs(dirty.path(), G01_MISSING_LAI);
    let outcome = ingest_run(&store, 2, Crop::Maize, SITE, dirty.path(), IngestOptions::default())
        .await
        .unwrap();

    assert!(matches!(outcome, IngestOutcome::Rejected(_)));
    assert_eq!(total_rows(&store, Crop::Maize, 2).await, 0);
    assert_eq!(total_rows(&store, Crop::Maize, 1).await, 17);
}

#[tokio::test]
async fn test_missing_file_rejects_run() {
    let db = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let store = store(&db).await;
    write_outputs(work.path(), G01);
    std::fs::remove_file(work.path().join("plantstress.crp")).unwrap();

    let outcome = ingest_run(&store, 1, Crop::Maize, SITE, work.path(), IngestOptions::default())
        .await
        .unwrap();

    let IngestOutcome::Rejected(report) = outcome else {
        panic!("expected rejection");
    };
    assert!(report.files[0].absent);
    assert!(report.to_string().contains("plantstress.crp: file not produced"));
    assert_eq!(total_rows(&store, Crop::Maize, 1).await, 0);
}

#[tokio::test]
async fn test_fallow_needs_only_soil_files() {
    let db = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let store = store(&db).await;
    write_outputs(work.path(), G01);
    std::fs::remove_file(work.path().join("Beltsville.g01")).unwrap();

    let outcome = ingest_run(&store, 3, Crop::Fallow, SITE, work.path(), IngestOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome, IngestOutcome::Stored { tables: 4, rows: 10 });
    assert_eq!(store.count_rows("g03_fallow", 3).await.unwrap(), 4);
}
