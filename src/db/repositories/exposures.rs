use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    helpers::{parse_datetime, to_count, to_i64, to_index},
    Database,
};
use crate::exposure::ExposureStore;
use crate::models::{ExposureRecord, SegmentKey};

fn row_to_record(row: &Row) -> Result<ExposureRecord> {
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(ExposureRecord {
        id: row.get("id")?,
        song_id: row.get("song_id")?,
        key: SegmentKey::new(
            to_index(row.get("line_index")?, "line_index")?,
            to_index(row.get("segment_index")?, "segment_index")?,
        ),
        viewer_id: row.get("viewer_id")?,
        view_count: to_count(row.get("view_count")?, "view_count")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// All exposure records for a viewer and song, in song order.
    pub async fn exposure_records(&self, song_id: &str, viewer_id: &str) -> Result<Vec<ExposureRecord>> {
        let song_id = song_id.to_string();
        let viewer_id = viewer_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, song_id, line_index, segment_index, viewer_id, view_count, created_at, updated_at
                 FROM exposures
                 WHERE song_id = ?1 AND viewer_id = ?2
                 ORDER BY line_index ASC, segment_index ASC",
            )?;

            let mut rows = stmt.query(params![song_id, viewer_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }

            Ok(records)
        })
        .await
    }
}

impl ExposureStore for Database {
    async fn fetch_count(&self, song_id: &str, key: SegmentKey, viewer_id: &str) -> Result<Option<u32>> {
        let song_id = song_id.to_string();
        let viewer_id = viewer_id.to_string();
        self.execute(move |conn| {
            let count: Option<i64> = conn
                .query_row(
                    "SELECT view_count FROM exposures
                     WHERE song_id = ?1 AND line_index = ?2 AND segment_index = ?3 AND viewer_id = ?4",
                    params![song_id, to_i64(key.line)?, to_i64(key.segment)?, viewer_id],
                    |row| row.get(0),
                )
                .optional()
                .context("failed to fetch exposure count")?;

            count.map(|value| to_count(value, "view_count")).transpose()
        })
        .await
    }

    async fn upsert_count(&self, song_id: &str, key: SegmentKey, viewer_id: &str, count: u32) -> Result<()> {
        let song_id = song_id.to_string();
        let viewer_id = viewer_id.to_string();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO exposures (id, song_id, line_index, segment_index, viewer_id, view_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT (song_id, line_index, segment_index, viewer_id)
                 DO UPDATE SET view_count = excluded.view_count,
                               updated_at = excluded.updated_at",
                params![
                    Uuid::new_v4().to_string(),
                    song_id,
                    to_i64(key.line)?,
                    to_i64(key.segment)?,
                    viewer_id,
                    i64::from(count),
                    now,
                ],
            )
            .with_context(|| "failed to upsert exposure count")?;
            Ok(())
        })
        .await
    }

    async fn list_counts(&self, song_id: &str, viewer_id: &str) -> Result<Vec<(SegmentKey, u32)>> {
        let records = self.exposure_records(song_id, viewer_id).await?;
        Ok(records
            .into_iter()
            .map(|record| (record.key, record.view_count))
            .collect())
    }
}
