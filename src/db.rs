use axum::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{postgres::PgPool, FromRow};
use utoipa::ToSchema;

pub async fn init_db(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            id SERIAL PRIMARY KEY,
            product_name VARCHAR(200) NOT NULL,
            review_text TEXT NOT NULL,
            sentiment VARCHAR(20),
            confidence DOUBLE PRECISION,
            key_points TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT (now() AT TIME ZONE 'utc')
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Tables created before timestamps were pinned to UTC still carry the session-local default.
    sqlx::query("ALTER TABLE reviews ALTER COLUMN created_at SET DEFAULT (now() AT TIME ZONE 'utc');")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS reviews_created_at_idx ON reviews (created_at DESC);")
        .execute(pool)
        .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("key points encoding error: {0}")]
    KeyPoints(#[from] serde_json::Error),
}

/// A stored, analyzed review. Never modified after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Review {
    pub id: i32,
    pub product_name: String,
    pub review_text: String,
    pub sentiment: String,
    pub confidence: f64,
    pub key_points: Vec<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_name: String,
    pub review_text: String,
    pub sentiment: String,
    pub confidence: f64,
    pub key_points: Vec<String>,
}

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: i32,
    product_name: String,
    review_text: String,
    sentiment: Option<String>,
    confidence: Option<f64>,
    key_points: Option<String>,
    created_at: NaiveDateTime,
}

impl TryFrom<ReviewRow> for Review {
    type Error = StoreError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let key_points = match row.key_points.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => Vec::new(),
        };
        Ok(Review {
            id: row.id,
            product_name: row.product_name,
            review_text: row.review_text,
            sentiment: row.sentiment.unwrap_or_default(),
            confidence: row.confidence.unwrap_or_default(),
            key_points,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Persists the review in one statement; on error nothing is written.
    async fn insert(&self, review: NewReview) -> Result<Review, StoreError>;

    /// All reviews, newest first.
    async fn list(&self) -> Result<Vec<Review>, StoreError>;
}

pub struct PgReviewStore {
    pool: PgPool,
}

impl PgReviewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn insert(&self, review: NewReview) -> Result<Review, StoreError> {
        let key_points = serde_json::to_string(&review.key_points)?;

        let (id, created_at): (i32, NaiveDateTime) = sqlx::query_as(
            r#"
            INSERT INTO reviews (product_name, review_text, sentiment, confidence, key_points)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, created_at
            "#,
        )
        .bind(&review.product_name)
        .bind(&review.review_text)
        .bind(&review.sentiment)
        .bind(review.confidence)
        .bind(&key_points)
        .fetch_one(&self.pool)
        .await?;

        Ok(Review {
            id,
            product_name: review.product_name,
            review_text: review.review_text,
            sentiment: review.sentiment,
            confidence: review.confidence,
            key_points: review.key_points,
            created_at,
        })
    }

    async fn list(&self) -> Result<Vec<Review>, StoreError> {
        let rows: Vec<ReviewRow> = sqlx::query_as(
            r#"SELECT id, product_name, review_text, sentiment, confidence, key_points, created_at
               FROM reviews ORDER BY created_at DESC, id DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Review::try_from).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn row(key_points: Option<&str>) -> ReviewRow {
        ReviewRow {
            id: 7,
            product_name: "Kettle".to_string(),
            review_text: "Boils fast".to_string(),
            sentiment: Some("POSITIVE".to_string()),
            confidence: Some(0.93),
            key_points: key_points.map(str::to_string),
            created_at: chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap(),
        }
    }

    #[test]
    fn test_row_decodes_key_points() {
        let review = Review::try_from(row(Some(r#"["Boils fast", "Loud click"]"#))).unwrap();
        assert_eq!(review.key_points, vec!["Boils fast", "Loud click"]);
        assert_eq!(review.sentiment, "POSITIVE");
        assert_eq!(review.confidence, 0.93);
    }

    #[test]
    fn test_missing_key_points_decode_empty() {
        assert!(Review::try_from(row(None)).unwrap().key_points.is_empty());
        assert!(Review::try_from(row(Some(""))).unwrap().key_points.is_empty());
    }

    #[test]
    fn test_corrupt_key_points_is_error() {
        assert!(matches!(
            Review::try_from(row(Some("{oops"))),
            Err(StoreError::KeyPoints(_))
        ));
    }

    #[test]
    fn test_null_analysis_columns_default() {
        let mut r = row(None);
        r.sentiment = None;
        r.confidence = None;
        let review = Review::try_from(r).unwrap();
        assert_eq!(review.sentiment, "");
        assert_eq!(review.confidence, 0.0);
    }
}
