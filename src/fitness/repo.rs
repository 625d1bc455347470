use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::filters::{Filters, Metadata};

/// One day's tracked fitness entry, owned by a single user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Fitness {
    pub id: Uuid,
    pub user_id: Uuid,
    pub steps: i32,
    pub cups: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    steps: i32,
    cups: i32,
    date: Option<OffsetDateTime>,
) -> Result<Fitness, sqlx::Error> {
    sqlx::query_as::<_, Fitness>(
        r#"
        INSERT INTO fitness (user_id, steps, cups, date)
        VALUES ($1, $2, $3, COALESCE($4::timestamptz, now()))
        RETURNING id, user_id, steps, cups, date
        "#,
    )
    .bind(user_id)
    .bind(steps)
    .bind(cups)
    .bind(date)
    .fetch_one(db)
    .await
}

pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> Result<Option<Fitness>, sqlx::Error> {
    sqlx::query_as::<_, Fitness>(
        r#"
        SELECT id, user_id, steps, cups, date
        FROM fitness
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

/// Counted, filtered, paginated listing of the user's own records. The sort
/// column and direction come from the validated safelist, never raw input.
pub async fn list(
    db: &PgPool,
    user_id: Uuid,
    steps: Option<i32>,
    cups: Option<i32>,
    filters: &Filters,
) -> Result<(Vec<Fitness>, Metadata), sqlx::Error> {
    let query = format!(
        r#"
        SELECT COUNT(*) OVER() AS total_records, id, user_id, steps, cups, date
        FROM fitness
        WHERE user_id = $1
          AND ($2::int IS NULL OR steps = $2)
          AND ($3::int IS NULL OR cups = $3)
        ORDER BY {} {}, id DESC
        LIMIT $4 OFFSET $5
        "#,
        filters.sort_column(),
        filters.sort_order()
    );

    let rows = sqlx::query(&query)
        .bind(user_id)
        .bind(steps)
        .bind(cups)
        .bind(filters.limit())
        .bind(filters.offset())
        .fetch_all(db)
        .await?;

    let mut total_records = 0i64;
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        total_records = row.try_get("total_records")?;
        records.push(Fitness {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            steps: row.try_get("steps")?,
            cups: row.try_get("cups")?,
            date: row.try_get("date")?,
        });
    }

    let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);
    Ok((records, metadata))
}

pub async fn update(db: &PgPool, record: &Fitness) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE fitness
        SET steps = $1, cups = $2, date = $3
        WHERE id = $4 AND user_id = $5
        "#,
    )
    .bind(record.steps)
    .bind(record.cups)
    .bind(record.date)
    .bind(record.id)
    .bind(record.user_id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM fitness
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}
