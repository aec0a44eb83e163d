//! Repository for the `team_members` table.

use sqlx::PgPool;

use crate::models::team::TeamMember;

/// Provides team membership lookups for group recipient expansion.
pub struct TeamRepo;

impl TeamRepo {
    /// Add a member. Adding an existing member is a no-op.
    pub async fn add_member(pool: &PgPool, team: &str, user: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO team_members (team, user_id) VALUES ($1, $2) \
             ON CONFLICT (team, user_id) DO NOTHING",
        )
        .bind(team)
        .bind(user)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove a member. Returns `true` if the membership existed.
    pub async fn remove_member(pool: &PgPool, team: &str, user: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM team_members WHERE team = $1 AND user_id = $2")
            .bind(team)
            .bind(user)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Member rows of a team, ordered by user.
    pub async fn list_members(pool: &PgPool, team: &str) -> Result<Vec<TeamMember>, sqlx::Error> {
        sqlx::query_as::<_, TeamMember>(
            "SELECT team, user_id, created_at FROM team_members \
             WHERE team = $1 ORDER BY user_id",
        )
        .bind(team)
        .fetch_all(pool)
        .await
    }

    /// User ids of a team's members.
    pub async fn member_ids(pool: &PgPool, team: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT user_id FROM team_members WHERE team = $1 ORDER BY user_id")
            .bind(team)
            .fetch_all(pool)
            .await
    }
}
