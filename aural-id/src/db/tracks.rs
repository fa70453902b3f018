//! Track table operations

use aural_common::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::Track;

const TRACK_COLUMNS: &str = "id, title, artist, album, duration_seconds, sample_rate, channels, \
     bitrate, format, file_hash_sha256, file_size_bytes, file_path, chromaprint_fingerprint, \
     chromaprint_duration, olaf_indexed, embedding_model, embedding_dim, ingested_at, updated_at";

/// Insert a new track row.
pub async fn insert_track(pool: &SqlitePool, track: &Track) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tracks (
            id, title, artist, album, duration_seconds, sample_rate, channels,
            bitrate, format, file_hash_sha256, file_size_bytes, file_path,
            chromaprint_fingerprint, chromaprint_duration, olaf_indexed,
            embedding_model, embedding_dim, ingested_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(track.id.to_string())
    .bind(&track.title)
    .bind(&track.artist)
    .bind(&track.album)
    .bind(track.duration_seconds)
    .bind(track.sample_rate)
    .bind(track.channels)
    .bind(track.bitrate)
    .bind(&track.format)
    .bind(&track.file_hash_sha256)
    .bind(track.file_size_bytes)
    .bind(&track.file_path)
    .bind(&track.chromaprint_fingerprint)
    .bind(track.chromaprint_duration)
    .bind(track.olaf_indexed)
    .bind(&track.embedding_model)
    .bind(track.embedding_dim)
    .bind(track.ingested_at.to_rfc3339())
    .bind(track.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Find a track id by file hash (phase-1 dedup).
pub async fn find_id_by_hash(pool: &SqlitePool, file_hash: &str) -> Result<Option<Uuid>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT id FROM tracks WHERE file_hash_sha256 = ?")
            .bind(file_hash)
            .fetch_optional(pool)
            .await?;

    row.map(|(id,)| parse_uuid(&id)).transpose()
}

/// Fetch a single track by id.
pub async fn get_track(pool: &SqlitePool, id: Uuid) -> Result<Option<Track>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tracks WHERE id = ?",
        TRACK_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|r| row_to_track(&r)).transpose()
}

/// Fetch several tracks by id, keyed by id.
///
/// Ids missing from the table are simply absent from the map; index
/// entries for deleted tracks resolve to nothing.
pub async fn get_tracks_by_ids(
    pool: &SqlitePool,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Track>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM tracks WHERE id IN ({})",
        TRACK_COLUMNS, placeholders
    );

    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id.to_string());
    }

    let rows = query.fetch_all(pool).await?;

    let mut map = HashMap::with_capacity(rows.len());
    for row in &rows {
        let track = row_to_track(row)?;
        map.insert(track.id, track);
    }
    Ok(map)
}

/// Candidates for content dedup: all fingerprinted tracks whose
/// chromaprint duration lies within the given band.
pub async fn chromaprint_candidates(
    pool: &SqlitePool,
    duration_lower: f64,
    duration_upper: f64,
) -> Result<Vec<(Uuid, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT id, chromaprint_fingerprint
        FROM tracks
        WHERE chromaprint_fingerprint IS NOT NULL
          AND chromaprint_duration IS NOT NULL
          AND chromaprint_duration >= ?
          AND chromaprint_duration <= ?
        "#,
    )
    .bind(duration_lower)
    .bind(duration_upper)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(id, fp)| Ok((parse_uuid(&id)?, fp)))
        .collect()
}

/// Paginated track listing, newest first, optionally filtered by a
/// case-insensitive title/artist substring.
pub async fn list_tracks(
    pool: &SqlitePool,
    page: i64,
    page_size: i64,
    search: Option<&str>,
) -> Result<(Vec<Track>, i64)> {
    let pattern = search.map(|s| {
        format!(
            "%{}%",
            s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
        )
    });

    let total: i64 = match &pattern {
        Some(p) => {
            sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM tracks
                WHERE title LIKE ?1 ESCAPE '\' OR artist LIKE ?1 ESCAPE '\'
                "#,
            )
            .bind(p)
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM tracks")
                .fetch_one(pool)
                .await?
        }
    };

    let offset = (page - 1) * page_size;

    let rows = match &pattern {
        Some(p) => {
            sqlx::query(&format!(
                r#"
                SELECT {} FROM tracks
                WHERE title LIKE ?1 ESCAPE '\' OR artist LIKE ?1 ESCAPE '\'
                ORDER BY ingested_at DESC
                LIMIT ?2 OFFSET ?3
                "#,
                TRACK_COLUMNS
            ))
            .bind(p)
            .bind(page_size)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM tracks ORDER BY ingested_at DESC LIMIT ? OFFSET ?",
                TRACK_COLUMNS
            ))
            .bind(page_size)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };

    let tracks = rows
        .iter()
        .map(row_to_track)
        .collect::<Result<Vec<Track>>>()?;

    Ok((tracks, total))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))
}

fn row_to_track(row: &sqlx::sqlite::SqliteRow) -> Result<Track> {
    Ok(Track {
        id: parse_uuid(row.get("id"))?,
        title: row.get("title"),
        artist: row.get("artist"),
        album: row.get("album"),
        duration_seconds: row.get("duration_seconds"),
        sample_rate: row.get("sample_rate"),
        channels: row.get("channels"),
        bitrate: row.get("bitrate"),
        format: row.get("format"),
        file_hash_sha256: row.get("file_hash_sha256"),
        file_size_bytes: row.get("file_size_bytes"),
        file_path: row.get("file_path"),
        chromaprint_fingerprint: row.get("chromaprint_fingerprint"),
        chromaprint_duration: row.get("chromaprint_duration"),
        olaf_indexed: row.get("olaf_indexed"),
        embedding_model: row.get("embedding_model"),
        embedding_dim: row.get("embedding_dim"),
        ingested_at: parse_timestamp(row.get("ingested_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    fn sample_track(title: &str, hash: &str) -> Track {
        let now = Utc::now();
        Track {
            id: Uuid::new_v4(),
            title: title.to_string(),
            artist: Some("Test Artist".to_string()),
            album: None,
            duration_seconds: 30.0,
            sample_rate: Some(44_100),
            channels: Some(2),
            bitrate: Some(192),
            format: Some("mp3".to_string()),
            file_hash_sha256: hash.to_string(),
            file_size_bytes: 1024,
            file_path: format!("/store/raw/{}/{}.mp3", &hash[..2], hash),
            chromaprint_fingerprint: Some("1,2,3".to_string()),
            chromaprint_duration: Some(30.0),
            olaf_indexed: true,
            embedding_model: None,
            embedding_dim: None,
            ingested_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_round_trip() {
        let pool = init_memory_pool().await.unwrap();
        let track = sample_track("Round Trip", "aa11");
        insert_track(&pool, &track).await.unwrap();

        let fetched = get_track(&pool, track.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Round Trip");
        assert_eq!(fetched.file_hash_sha256, "aa11");
        assert!(fetched.olaf_indexed);
        assert_eq!(fetched.chromaprint_duration, Some(30.0));
    }

    #[tokio::test]
    async fn duplicate_hash_is_rejected_by_schema() {
        let pool = init_memory_pool().await.unwrap();
        insert_track(&pool, &sample_track("One", "bb22")).await.unwrap();
        let result = insert_track(&pool, &sample_track("Two", "bb22")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn hash_lookup_finds_existing_track() {
        let pool = init_memory_pool().await.unwrap();
        let track = sample_track("Hashed", "cc33");
        insert_track(&pool, &track).await.unwrap();

        assert_eq!(
            find_id_by_hash(&pool, "cc33").await.unwrap(),
            Some(track.id)
        );
        assert_eq!(find_id_by_hash(&pool, "dd44").await.unwrap(), None);
    }

    #[tokio::test]
    async fn candidates_respect_duration_band() {
        let pool = init_memory_pool().await.unwrap();
        let mut inside = sample_track("Inside", "ee55");
        inside.chromaprint_duration = Some(30.0);
        let mut outside = sample_track("Outside", "ff66");
        outside.chromaprint_duration = Some(60.0);
        insert_track(&pool, &inside).await.unwrap();
        insert_track(&pool, &outside).await.unwrap();

        let candidates = chromaprint_candidates(&pool, 27.0, 33.0).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].0, inside.id);
    }

    #[tokio::test]
    async fn listing_filters_and_counts() {
        let pool = init_memory_pool().await.unwrap();
        insert_track(&pool, &sample_track("Alpha Song", "0011")).await.unwrap();
        insert_track(&pool, &sample_track("Beta Song", "0022")).await.unwrap();

        let (all, total) = list_tracks(&pool, 1, 50, None).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(all.len(), 2);

        let (filtered, total) = list_tracks(&pool, 1, 50, Some("alpha")).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(filtered[0].title, "Alpha Song");

        // LIKE wildcards in the user's input are escaped, not interpreted
        let (none, total) = list_tracks(&pool, 1, 50, Some("%")).await.unwrap();
        assert_eq!(total, 0);
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn batch_lookup_skips_missing_ids() {
        let pool = init_memory_pool().await.unwrap();
        let track = sample_track("Present", "1234");
        insert_track(&pool, &track).await.unwrap();

        let missing = Uuid::new_v4();
        let map = get_tracks_by_ids(&pool, &[track.id, missing]).await.unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&track.id));
        assert!(!map.contains_key(&missing));
    }
}
