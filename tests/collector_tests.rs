use procsol::collector::{collect, SampleQuery};
use procsol::error::ServiceError;
use rusqlite::Connection;

fn create_table(conn: &Connection, table: &str) {
    conn.execute_batch(&format!(
        "CREATE TABLE {table} (PackageName TEXT, Uid, Pids TEXT, Metrics TEXT)"
    ))
    .unwrap();
}

fn seed(conn: &Connection, table: &str, rows: &[(&str, &str, &str)]) {
    create_table(conn, table);
    for (pkg, uid, metrics) in rows {
        conn.execute(
            &format!("INSERT INTO {table} VALUES (?, ?, '', ?)"),
            rusqlite::params![pkg, uid, metrics],
        )
        .unwrap();
    }
}

fn query(limit: usize) -> SampleQuery {
    SampleQuery {
        limit,
        ..Default::default()
    }
}

fn timestamps(samples: &[procsol::metrics::Sample]) -> Vec<i64> {
    samples.iter().map(|s| s.timestamp).collect()
}

#[test]
fn collects_across_tables_sorted_descending() {
    let conn = Connection::open_in_memory().unwrap();
    seed(
        &conn,
        "processes1",
        &[("com.a", "1", "100:1:1:0.1:0:0;300:1:1:0.1:0:0")],
    );
    seed(&conn, "processes3", &[("com.b", "2", "200:1:1:0.1:0:0")]);

    let results = collect(&conn, &query(100)).unwrap();
    assert_eq!(timestamps(&results), vec![300, 200, 100]);
}

#[test]
fn absent_tables_are_skipped_silently() {
    let conn = Connection::open_in_memory().unwrap();
    seed(&conn, "processes2", &[("com.a", "1", "50:1:1:0.1:0:0")]);

    let results = collect(&conn, &query(100)).unwrap();
    assert_eq!(timestamps(&results), vec![50]);
}

#[test]
fn no_source_tables_yields_empty_result() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(collect(&conn, &query(100)).unwrap().is_empty());
}

#[test]
fn package_filter_applies_before_decoding() {
    let conn = Connection::open_in_memory().unwrap();
    seed(
        &conn,
        "processes1",
        &[
            ("com.keep", "1", "10:1:1:0.1:0:0"),
            ("com.drop", "1", "20:1:1:0.1:0:0"),
        ],
    );

    let q = SampleQuery {
        package_name: Some("com.keep".to_string()),
        ..query(100)
    };
    let results = collect(&conn, &q).unwrap();
    assert_eq!(timestamps(&results), vec![10]);
    assert!(results.iter().all(|s| s.package_name == "com.keep"));
}

#[test]
fn uid_filter_matches_integer_cells_as_strings() {
    let conn = Connection::open_in_memory().unwrap();
    create_table(&conn, "processes1");
    conn.execute(
        "INSERT INTO processes1 VALUES ('com.a', 10042, '', '10:1:1:0.1:0:0')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO processes1 VALUES ('com.a', '10043', '', '20:1:1:0.1:0:0')",
        [],
    )
    .unwrap();

    let q = SampleQuery {
        uid: Some("10042".to_string()),
        ..query(100)
    };
    let results = collect(&conn, &q).unwrap();
    assert_eq!(timestamps(&results), vec![10]);
    assert_eq!(results[0].uid, "10042");
}

#[test]
fn range_bounds_are_inclusive_when_supplied() {
    let conn = Connection::open_in_memory().unwrap();
    seed(
        &conn,
        "processes1",
        &[(
            "com.a",
            "1",
            "4:1:1:0.1:0:0;5:1:1:0.1:0:0;9:1:1:0.1:0:0;10:1:1:0.1:0:0",
        )],
    );

    let q = SampleQuery {
        start_ms: Some(5),
        end_ms: Some(9),
        ..query(100)
    };
    let results = collect(&conn, &q).unwrap();
    assert_eq!(timestamps(&results), vec![9, 5]);
}

#[test]
fn early_exit_returns_scan_order_subset_sorted() {
    // Candidates in scan order are 5, 3, 9; the cap is reached at 3, so 9
    // is never scanned. Returned set is [5, 3] sorted descending.
    let conn = Connection::open_in_memory().unwrap();
    seed(
        &conn,
        "processes1",
        &[("com.a", "1", "5:1:1:0.1:0:0;3:1:1:0.1:0:0;9:1:1:0.1:0:0")],
    );

    let results = collect(&conn, &query(2)).unwrap();
    assert_eq!(timestamps(&results), vec![5, 3]);
}

#[test]
fn early_exit_skips_remaining_tables() {
    let conn = Connection::open_in_memory().unwrap();
    seed(
        &conn,
        "processes1",
        &[("com.a", "1", "5:1:1:0.1:0:0;3:1:1:0.1:0:0")],
    );
    seed(&conn, "processes2", &[("com.a", "1", "9:1:1:0.1:0:0")]);

    let results = collect(&conn, &query(2)).unwrap();
    assert_eq!(timestamps(&results), vec![5, 3]);
}

#[test]
fn result_never_exceeds_limit() {
    let conn = Connection::open_in_memory().unwrap();
    let blob: Vec<String> = (0..50).map(|ts| format!("{ts}:1:1:0.1:0:0")).collect();
    seed(&conn, "processes1", &[("com.a", "1", &blob.join(";"))]);

    for limit in [1, 7, 50, 500] {
        let results = collect(&conn, &query(limit)).unwrap();
        assert!(results.len() <= limit);
    }
}

#[test]
fn inverted_range_is_rejected_before_scanning() {
    // No tables exist; the range check has to fire before storage access.
    let conn = Connection::open_in_memory().unwrap();
    let q = SampleQuery {
        start_ms: Some(100),
        end_ms: Some(1),
        ..query(10)
    };
    assert!(matches!(
        collect(&conn, &q),
        Err(ServiceError::InvalidRange { .. })
    ));
}

#[test]
fn chunks_without_timestamp_are_not_counted_toward_the_cap() {
    let conn = Connection::open_in_memory().unwrap();
    seed(
        &conn,
        "processes1",
        &[(
            "com.a",
            "1",
            ":1:1:0.1:0:0;bad:1:1:0.1:0:0;7:1:1:0.1:0:0;8:1:1:0.1:0:0",
        )],
    );

    let results = collect(&conn, &query(2)).unwrap();
    assert_eq!(timestamps(&results), vec![8, 7]);
}
