//! Account-data purge.
//!
//! Deletes every domain row belonging to a user, child tables before their
//! parents so foreign keys are never violated mid-way. Runs inside the
//! caller's transaction; the refresh tokens and the user row itself are the
//! orchestrator's responsibility and come after.

use sqlx::{Postgres, Transaction};
use tracing::debug;

use crate::auth::AuthError;

/// Delete all domain data for a user, children first.
pub async fn delete_all_user_data(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
) -> Result<(), AuthError> {
    // Workout data: sets hang off sessions.
    sqlx::query(
        "DELETE FROM workout_sets \
         WHERE session_id IN (SELECT id FROM workout_sessions WHERE user_id = $1)",
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    debug!(user_id, "deleted workout sets");

    sqlx::query("DELETE FROM workout_sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    debug!(user_id, "deleted workout sessions");

    sqlx::query("DELETE FROM workout_plans WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    debug!(user_id, "deleted workout plans");

    // Nutrition data: meal foods hang off meals.
    sqlx::query(
        "DELETE FROM meal_foods \
         WHERE meal_id IN (SELECT id FROM meals WHERE user_id = $1)",
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    debug!(user_id, "deleted meal foods");

    sqlx::query("DELETE FROM meals WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    debug!(user_id, "deleted meals");

    // User-scoped records.
    sqlx::query("DELETE FROM body_metrics WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    debug!(user_id, "deleted body metrics");

    sqlx::query("DELETE FROM goals WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    debug!(user_id, "deleted goals");

    Ok(())
}
