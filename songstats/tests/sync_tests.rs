//! Table sync integration tests
//!
//! Enriches rows with scripted adapters and writes them through
//! `TableSync` into an in-memory table.

mod helpers;

use helpers::*;
use songstats::table::{InMemoryTable, TableStore, TableSync, WriteOutcome};
use songstats::types::{Outcome, Source};
use songstats::SyncError;
use std::collections::HashSet;
use std::sync::Arc;

async fn sync_for(table: &Arc<InMemoryTable>) -> TableSync {
    let header = table.snapshot().await.header;
    TableSync::new(table.clone() as Arc<dyn TableStore>, header)
}

#[tokio::test]
async fn test_non_found_outcomes_leave_cells_intact() {
    let table = Arc::new(InMemoryTable::new(
        &["artist_name", "song_title", "youtube_views", "lyrics"],
        &[&["Weezer", "Island In The Sun", "123", "old lyrics"]],
    ));
    let views = Arc::new(FakeAdapter::new(Source::VideoViews));
    let lyrics = Arc::new(
        FakeAdapter::new(Source::Lyrics)
            .with_candidate("1", "Island In The Sun", "Weezer")
            .with_candidate("2", "Island In The Sun", "Weezer"),
    );
    let enricher = enricher(vec![views, lyrics]);

    let row = enricher
        .enrich(
            &query(0, "Weezer", "Island In The Sun"),
            &[Source::VideoViews, Source::Lyrics],
        )
        .await;
    assert_eq!(row.outcome(Source::VideoViews), Some(&Outcome::NotFound));
    assert_eq!(row.outcome(Source::Lyrics), Some(&Outcome::AmbiguousMatch));

    let snapshot = table.snapshot().await;
    let outcome = sync_for(&table).await.sync(&row, &snapshot.row(0).unwrap()).await;

    assert!(matches!(outcome, WriteOutcome::Unchanged));
    assert_eq!(table.cell(0, "youtube_views").await, "123");
    assert_eq!(table.cell(0, "lyrics").await, "old lyrics");
    assert_eq!(table.batch_writes(), 0);
}

#[tokio::test]
async fn test_second_pass_over_unchanged_sources_writes_nothing() {
    let table = songs_table(&[("Weezer", "Island In The Sun")]);
    let enricher = enricher(vec![
        Arc::new(weezer_catalog()),
        Arc::new(weezer_views()),
        Arc::new(weezer_lyrics()),
    ]);
    let q = query(0, "Weezer", "Island In The Sun");

    let row = enricher.enrich(&q, &Source::ALL).await;
    let snapshot = table.snapshot().await;
    let first = sync_for(&table).await.sync(&row, &snapshot.row(0).unwrap()).await;
    assert!(matches!(first, WriteOutcome::Written { .. }));
    assert_eq!(table.cell(0, "year").await, "2001");
    assert_eq!(table.cell(0, "energy").await, "0.65");

    let row = enricher.enrich(&q, &Source::ALL).await;
    let snapshot = table.snapshot().await;
    let second = sync_for(&table).await.sync(&row, &snapshot.row(0).unwrap()).await;

    assert!(matches!(second, WriteOutcome::Unchanged));
    assert_eq!(table.batch_writes(), 1);
}

#[tokio::test]
async fn test_columns_are_added_once_across_rows() {
    let table = songs_table(&[
        ("Weezer", "Island In The Sun"),
        ("Weezer", "Island In The Sun"),
        ("Weezer", "Island In The Sun"),
    ]);
    let enricher = enricher(vec![Arc::new(weezer_catalog())]);
    let sync = sync_for(&table).await;
    let snapshot = table.snapshot().await;

    let queries: Vec<_> = (0..3).map(|i| query(i, "Weezer", "Island In The Sun")).collect();
    let rows = futures::future::join_all(queries.iter().map(|q| enricher.enrich(q, &[Source::Catalog]))).await;

    let outcomes = futures::future::join_all(rows.iter().map(|row| {
        let row_snapshot = snapshot.row(row.row_index).unwrap();
        let sync = &sync;
        async move { sync.sync(row, &row_snapshot).await }
    }))
    .await;

    let added: usize = outcomes
        .iter()
        .map(|o| match o {
            WriteOutcome::Written { columns_added, .. } => columns_added.len(),
            other => panic!("expected written, got {:?}", other),
        })
        .sum();

    let header = table.snapshot().await.header;
    let unique: HashSet<_> = header.iter().collect();
    assert_eq!(unique.len(), header.len(), "duplicate columns: {:?}", header);
    // genres never creates its column
    assert!(!header.iter().any(|h| h == "genres"));
    assert_eq!(table.columns_appended(), 8);
    assert_eq!(added, 8);
    for i in 0..3 {
        assert_eq!(table.cell(i, "track_id").await, "2MLHyLy5z5l5YRp7momlgw");
    }
}

#[tokio::test]
async fn test_stale_row_is_not_written_or_extended() {
    let table = songs_table(&[("Weezer", "Island In The Sun")]);
    let enricher = enricher(vec![Arc::new(weezer_catalog())]);

    let snapshot = table.snapshot().await;
    let row = enricher
        .enrich(&query(0, "Weezer", "Island In The Sun"), &[Source::Catalog])
        .await;

    table.set_cell(0, "song_title", "Buddy Holly").await;
    let outcome = sync_for(&table).await.sync(&row, &snapshot.row(0).unwrap()).await;

    match outcome {
        WriteOutcome::Failed(SyncError::StaleSnapshot { column }) => assert_eq!(column, "song_title"),
        other => panic!("expected stale snapshot, got {:?}", other),
    }
    assert_eq!(table.columns_appended(), 0);
    assert_eq!(table.batch_writes(), 0);
    assert_eq!(table.snapshot().await.header, SONGS_HEADER);
}

#[tokio::test]
async fn test_lyrics_fill_only_empty_or_marked_cells() {
    let table = Arc::new(InMemoryTable::new(
        &["artist_name", "song_title", "lyrics"],
        &[
            &["Weezer", "Island In The Sun", "hand-edited lyrics"],
            &["Weezer", "Island In The Sun", "!"],
        ],
    ));
    let enricher = enricher(vec![Arc::new(weezer_lyrics())]);
    let sync = sync_for(&table).await;
    let snapshot = table.snapshot().await;

    for i in 0..2 {
        let row = enricher
            .enrich(&query(i, "Weezer", "Island In The Sun"), &[Source::Lyrics])
            .await;
        sync.sync(&row, &snapshot.row(i).unwrap()).await;
    }

    assert_eq!(table.cell(0, "lyrics").await, "hand-edited lyrics");
    assert_eq!(table.cell(1, "lyrics").await, "Hip hip\nWhen you're on a holiday");
    // genius_url is never created
    assert_eq!(table.columns_appended(), 0);
}

#[tokio::test]
async fn test_failed_write_leaves_row_untouched() {
    let table = Arc::new(InMemoryTable::new(
        &["artist_name", "song_title", "youtube_views"],
        &[&["Weezer", "Island In The Sun", "1"]],
    ));
    let enricher = enricher(vec![Arc::new(weezer_views())]);
    let row = enricher
        .enrich(&query(0, "Weezer", "Island In The Sun"), &[Source::VideoViews])
        .await;
    let snapshot = table.snapshot().await;

    table.set_fail_writes(true);
    let outcome = sync_for(&table).await.sync(&row, &snapshot.row(0).unwrap()).await;

    assert!(matches!(outcome, WriteOutcome::Failed(SyncError::Write(_))));
    assert_eq!(table.cell(0, "youtube_views").await, "1");
}
