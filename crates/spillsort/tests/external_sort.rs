//! End-to-end coverage of the input/spill/merge/close lifecycle.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use spillsort::{Builder, Datum, FileSorter, SortError, StatementContext};

fn small_sorter(dir: &Path, descending: Vec<bool>) -> FileSorter {
    // buffer 4 across 2 workers: per-worker batches of 2 rows.
    Builder::new()
        .statement_context(StatementContext::new())
        .schema(descending.len(), 1)
        .buffer(4)
        .descending(descending)
        .workers(2)
        .tmp_dir(dir)
        .build()
        .unwrap()
}

fn feed(sorter: &mut FileSorter, rows: &[(i64, &str, i64)]) {
    for &(key, val, handle) in rows {
        sorter
            .input(vec![Datum::Integer(key)], vec![Datum::Text(val.into())], handle)
            .unwrap();
    }
}

fn drain(sorter: &mut FileSorter) -> Vec<(i64, String, i64)> {
    let mut out = Vec::new();
    while let Some(row) = sorter.output().unwrap() {
        out.push((
            row.key[0].as_integer().unwrap(),
            row.val[0].as_text().unwrap().to_owned(),
            row.handle,
        ));
    }
    out
}

#[test]
fn sorts_ascending() {
    let dir = tempfile::tempdir().unwrap();
    let mut sorter = small_sorter(dir.path(), vec![false]);
    feed(
        &mut sorter,
        &[(5, "a", 1), (2, "b", 2), (8, "c", 3), (1, "d", 4), (3, "e", 5)],
    );
    assert_eq!(
        drain(&mut sorter),
        vec![
            (1, "d".to_owned(), 4),
            (2, "b".to_owned(), 2),
            (3, "e".to_owned(), 5),
            (5, "a".to_owned(), 1),
            (8, "c".to_owned(), 3),
        ]
    );
    sorter.close().unwrap();
}

#[test]
fn sorts_descending() {
    let dir = tempfile::tempdir().unwrap();
    let mut sorter = small_sorter(dir.path(), vec![true]);
    feed(
        &mut sorter,
        &[(5, "a", 1), (2, "b", 2), (8, "c", 3), (1, "d", 4), (3, "e", 5)],
    );
    assert_eq!(
        drain(&mut sorter),
        vec![
            (8, "c".to_owned(), 3),
            (5, "a".to_owned(), 1),
            (3, "e".to_owned(), 5),
            (2, "b".to_owned(), 2),
            (1, "d".to_owned(), 4),
        ]
    );
    sorter.close().unwrap();
}

#[test]
fn equal_keys_preserve_the_multiset() {
    let dir = tempfile::tempdir().unwrap();
    let mut sorter = small_sorter(dir.path(), vec![false]);
    feed(&mut sorter, &[(7, "x", 1), (7, "y", 2), (7, "z", 3)]);

    let mut out = drain(&mut sorter);
    // Relative order of equal keys is unspecified; the multiset is not.
    out.sort_by_key(|&(_, _, handle)| handle);
    assert_eq!(
        out,
        vec![
            (7, "x".to_owned(), 1),
            (7, "y".to_owned(), 2),
            (7, "z".to_owned(), 3),
        ]
    );
    sorter.close().unwrap();
}

#[test]
fn composite_key_with_mixed_directions() {
    let dir = tempfile::tempdir().unwrap();
    // Ascending first column, descending second.
    let mut sorter = small_sorter(dir.path(), vec![false, true]);
    for (key, val, handle) in [
        ((1_i64, 9_i64), "a", 1_i64),
        ((1, 3), "b", 2),
        ((2, 5), "c", 3),
    ] {
        sorter
            .input(
                vec![Datum::Integer(key.0), Datum::Integer(key.1)],
                vec![Datum::Text(val.into())],
                handle,
            )
            .unwrap();
    }

    let mut out = Vec::new();
    while let Some(row) = sorter.output().unwrap() {
        out.push((
            (
                row.key[0].as_integer().unwrap(),
                row.key[1].as_integer().unwrap(),
            ),
            row.handle,
        ));
    }
    assert_eq!(out, vec![((1, 9), 1), ((1, 3), 2), ((2, 5), 3)]);
    sorter.close().unwrap();
}

#[test]
fn input_after_output_is_wrong_phase_and_nonfatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut sorter = small_sorter(dir.path(), vec![false]);
    feed(&mut sorter, &[(2, "b", 2), (1, "a", 1), (3, "c", 3)]);

    let first = sorter.output().unwrap().unwrap();
    assert_eq!(first.key[0].as_integer(), Some(1));

    let err = sorter
        .input(vec![Datum::Integer(9)], vec![Datum::Null], 9)
        .unwrap_err();
    assert!(matches!(err, SortError::WrongPhase));

    // The remainder of the stream is still readable, in order.
    assert_eq!(
        drain(&mut sorter),
        vec![(2, "b".to_owned(), 2), (3, "c".to_owned(), 3)]
    );
    sorter.close().unwrap();
}

#[test]
fn missing_tmp_dir_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Builder::new()
        .statement_context(StatementContext::new())
        .schema(1, 1)
        .buffer(4)
        .descending(vec![false])
        .tmp_dir(dir.path().join("does-not-exist"))
        .build();
    assert!(matches!(result, Err(SortError::Config { .. })));
}

#[test]
fn empty_input_terminates_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let mut sorter = small_sorter(dir.path(), vec![false]);
    assert!(sorter.output().unwrap().is_none());
    sorter.close().unwrap();
}

#[test]
fn single_row_comes_back_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut sorter = small_sorter(dir.path(), vec![false]);
    feed(&mut sorter, &[(42, "only", 7)]);
    assert_eq!(drain(&mut sorter), vec![(42, "only".to_owned(), 7)]);
    assert!(sorter.output().unwrap().is_none());
    sorter.close().unwrap();
}

#[test]
fn input_exactly_at_buffer_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let mut sorter = small_sorter(dir.path(), vec![false]);
    feed(&mut sorter, &[(4, "d", 4), (3, "c", 3), (2, "b", 2), (1, "a", 1)]);
    assert_eq!(
        drain(&mut sorter),
        vec![
            (1, "a".to_owned(), 1),
            (2, "b".to_owned(), 2),
            (3, "c".to_owned(), 3),
            (4, "d".to_owned(), 4),
        ]
    );
    sorter.close().unwrap();
}

#[test]
fn large_input_is_a_sorted_permutation() {
    let dir = tempfile::tempdir().unwrap();
    let mut sorter = Builder::new()
        .statement_context(StatementContext::new())
        .schema(1, 1)
        .buffer(8)
        .descending(vec![false])
        .workers(4)
        .tmp_dir(dir.path())
        .build()
        .unwrap();

    // 100x the total buffer capacity, with plenty of duplicate keys.
    let mut rows: Vec<(i64, i64)> = (0..800).map(|h| (h % 97, h)).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
    rows.shuffle(&mut rng);
    for &(key, handle) in &rows {
        sorter
            .input(
                vec![Datum::Integer(key)],
                vec![Datum::Text(format!("r{handle}"))],
                handle,
            )
            .unwrap();
    }

    let out = drain(&mut sorter);
    assert_eq!(out.len(), rows.len());
    // Total order on output.
    for pair in out.windows(2) {
        assert!(pair[0].0 <= pair[1].0);
    }
    // Output multiset equals input multiset.
    let mut got: Vec<(i64, String, i64)> = out;
    got.sort_by_key(|&(key, _, handle)| (key, handle));
    let mut expected: Vec<(i64, String, i64)> = rows
        .iter()
        .map(|&(key, handle)| (key, format!("r{handle}"), handle))
        .collect();
    expected.sort_by_key(|&(key, _, handle)| (key, handle));
    assert_eq!(got, expected);

    sorter.close().unwrap();
}

#[test]
fn terminator_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut sorter = small_sorter(dir.path(), vec![false]);
    feed(&mut sorter, &[(1, "a", 1)]);
    drain(&mut sorter);
    assert!(sorter.output().unwrap().is_none());
    assert!(sorter.output().unwrap().is_none());
    sorter.close().unwrap();
}

#[test]
fn close_removes_the_tmp_dir() {
    let root = tempfile::tempdir().unwrap();
    let sort_dir = root.path().join("sort");
    std::fs::create_dir(&sort_dir).unwrap();

    let mut sorter = small_sorter(&sort_dir, vec![false]);
    feed(&mut sorter, &[(3, "c", 3), (1, "a", 1), (2, "b", 2)]);
    // Close straight out of the input phase, spilled state and all.
    sorter.close().unwrap();
    assert!(!sort_dir.exists());

    let err = sorter.close().unwrap_err();
    assert!(matches!(err, SortError::AlreadyClosed));
}

#[test]
fn calls_after_close_fail() {
    let dir = tempfile::tempdir().unwrap();
    let mut sorter = small_sorter(dir.path(), vec![false]);
    sorter.close().unwrap();
    assert!(matches!(
        sorter.input(vec![Datum::Integer(1)], vec![Datum::Null], 1),
        Err(SortError::AlreadyClosed)
    ));
    assert!(matches!(sorter.output(), Err(SortError::AlreadyClosed)));
}
