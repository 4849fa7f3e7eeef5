//! SeaORM-backed implementation of the persistence ports.
//!
//! The repository is generic over `C: ConnectionTrait`. Built over a
//! `DatabaseConnection` it is the store; `begin` hands out the same type
//! built over a `DatabaseTransaction`, which is the unit of work.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::contract::model::{Event, Registration, RegistrationStatus};
use crate::domain::repo::{RegistrationsStore, RegistrationsTx};
use crate::infra::storage::entity::{event, registration};
use crate::infra::storage::mapper::{event_active_model, registration_active_model, to_db_int};

/// `(id, updated_at)` pairs per guarded flag update.
const MARK_CHUNK: usize = 200;

pub struct SeaOrmRegistrationsRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    conn: C,
}

impl<C> SeaOrmRegistrationsRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

/// The store as wired by the module.
pub type SeaOrmStore = SeaOrmRegistrationsRepository<DatabaseConnection>;

#[async_trait]
impl RegistrationsStore for SeaOrmRegistrationsRepository<DatabaseConnection> {
    async fn begin(&self) -> anyhow::Result<Box<dyn RegistrationsTx>> {
        let txn = self.conn.begin().await.context("begin failed")?;
        Ok(Box::new(SeaOrmRegistrationsRepository::new(txn)))
    }

    async fn find_event(&self, id: Uuid) -> anyhow::Result<Option<Event>> {
        find_event(&self.conn, id).await
    }

    async fn list_upcoming_events(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Event>> {
        let rows = event::Entity::find()
            .filter(event::Column::Status.eq(event::Status::Published))
            .filter(event::Column::EventDate.gt(now))
            .order_by_asc(event::Column::EventDate)
            .all(&self.conn)
            .await
            .context("list_upcoming_events failed")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_registration(&self, id: Uuid) -> anyhow::Result<Option<Registration>> {
        find_registration(&self.conn, id).await
    }

    async fn find_registration_for(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Registration>> {
        find_registration_for(&self.conn, event_id, user_id).await
    }

    async fn list_registrations(
        &self,
        event_id: Uuid,
        statuses: &[RegistrationStatus],
    ) -> anyhow::Result<Vec<Registration>> {
        let mut query = registration::Entity::find()
            .filter(registration::Column::EventId.eq(event_id))
            .order_by_asc(registration::Column::CreatedAt);
        if !statuses.is_empty() {
            query = query.filter(registration::Column::Status.is_in(db_statuses(statuses)));
        }
        let rows = query
            .all(&self.conn)
            .await
            .context("list_registrations failed")?;

        let mut regs: Vec<Registration> = rows.into_iter().map(Into::into).collect();
        // Stored status strings do not sort in lifecycle order.
        regs.sort_by_key(|r| (r.status, r.waitlist_position));
        Ok(regs)
    }

    async fn list_waitlist(&self, event_id: Uuid) -> anyhow::Result<Vec<Registration>> {
        let rows = registration::Entity::find()
            .filter(registration::Column::EventId.eq(event_id))
            .filter(registration::Column::Status.eq(registration::Status::Waitlisted))
            .order_by_asc(registration::Column::WaitlistPosition)
            .all(&self.conn)
            .await
            .context("list_waitlist failed")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn status_counts(
        &self,
        event_id: Uuid,
    ) -> anyhow::Result<Vec<(RegistrationStatus, u64, u64)>> {
        let totals = count_by_status(&self.conn, event_id, None).await?;
        let pending = count_by_status(&self.conn, event_id, Some(false)).await?;

        Ok(totals
            .into_iter()
            .map(|(status, total)| {
                let waiting = pending
                    .iter()
                    .find(|(s, _)| *s == status)
                    .map_or(0, |(_, n)| *n);
                (status, total, waiting)
            })
            .collect())
    }
}

#[async_trait]
impl RegistrationsTx for SeaOrmRegistrationsRepository<DatabaseTransaction> {
    async fn lock_event(&self, id: Uuid) -> anyhow::Result<Option<Event>> {
        let res = event::Entity::update_many()
            .col_expr(
                event::Column::LockVersion,
                Expr::col(event::Column::LockVersion).add(1),
            )
            .filter(event::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("lock_event failed")?;
        if res.rows_affected == 0 {
            return Ok(None);
        }
        find_event(&self.conn, id).await
    }

    async fn insert_event(&self, e: &Event) -> anyhow::Result<()> {
        let mut m = event_active_model(e);
        m.lock_version = Set(0);
        let _ = m.insert(&self.conn).await.context("insert_event failed")?;
        Ok(())
    }

    async fn update_event(&self, e: &Event) -> anyhow::Result<()> {
        let _ = event_active_model(e)
            .update(&self.conn)
            .await
            .context("update_event failed")?;
        Ok(())
    }

    async fn delete_event(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = event::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("delete_event failed")?;
        Ok(res.rows_affected > 0)
    }

    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> anyhow::Result<bool> {
        let mut query = event::Entity::find().filter(event::Column::Slug.eq(slug));
        if let Some(id) = except {
            query = query.filter(event::Column::Id.ne(id));
        }
        let count = query
            .count(&self.conn)
            .await
            .context("slug_taken failed")?;
        Ok(count > 0)
    }

    async fn find_registration(&self, id: Uuid) -> anyhow::Result<Option<Registration>> {
        find_registration(&self.conn, id).await
    }

    async fn find_registration_for(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Registration>> {
        find_registration_for(&self.conn, event_id, user_id).await
    }

    async fn count_registrations(&self, event_id: Uuid) -> anyhow::Result<u64> {
        registration::Entity::find()
            .filter(registration::Column::EventId.eq(event_id))
            .count(&self.conn)
            .await
            .context("count_registrations failed")
    }

    async fn count_admitted(&self, event_id: Uuid) -> anyhow::Result<u64> {
        registration::Entity::find()
            .filter(registration::Column::EventId.eq(event_id))
            .filter(registration::Column::Status.is_in([
                registration::Status::Registered,
                registration::Status::Approved,
            ]))
            .count(&self.conn)
            .await
            .context("count_admitted failed")
    }

    async fn max_waitlist_position(&self, event_id: Uuid) -> anyhow::Result<Option<u32>> {
        let max = registration::Entity::find()
            .select_only()
            .column_as(
                Expr::col(registration::Column::WaitlistPosition).max(),
                "max_position",
            )
            .filter(registration::Column::EventId.eq(event_id))
            .filter(registration::Column::Status.eq(registration::Status::Waitlisted))
            .into_tuple::<Option<i32>>()
            .one(&self.conn)
            .await
            .context("max_waitlist_position failed")?;
        Ok(max.flatten().and_then(|p| u32::try_from(p).ok()))
    }

    async fn first_waitlisted(&self, event_id: Uuid) -> anyhow::Result<Option<Registration>> {
        let found = registration::Entity::find()
            .filter(registration::Column::EventId.eq(event_id))
            .filter(registration::Column::Status.eq(registration::Status::Waitlisted))
            .order_by_asc(registration::Column::WaitlistPosition)
            .one(&self.conn)
            .await
            .context("first_waitlisted failed")?;
        Ok(found.map(Into::into))
    }

    async fn close_waitlist_gap(
        &self,
        event_id: Uuid,
        above: u32,
        now: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let res = registration::Entity::update_many()
            .col_expr(
                registration::Column::WaitlistPosition,
                Expr::col(registration::Column::WaitlistPosition).sub(1),
            )
            .col_expr(registration::Column::NotificationSent, Expr::value(false))
            .col_expr(registration::Column::UpdatedAt, Expr::value(now))
            .filter(registration::Column::EventId.eq(event_id))
            .filter(registration::Column::Status.eq(registration::Status::Waitlisted))
            .filter(registration::Column::WaitlistPosition.gt(to_db_int(above)))
            .exec(&self.conn)
            .await
            .context("close_waitlist_gap failed")?;
        Ok(res.rows_affected)
    }

    async fn insert_registration(&self, r: &Registration) -> anyhow::Result<()> {
        let _ = registration_active_model(r)
            .insert(&self.conn)
            .await
            .context("insert_registration failed")?;
        Ok(())
    }

    async fn save_registration(&self, r: &Registration) -> anyhow::Result<()> {
        let _ = registration_active_model(r)
            .update(&self.conn)
            .await
            .context("save_registration failed")?;
        Ok(())
    }

    async fn mark_notified(
        &self,
        seen: &[(Uuid, DateTime<Utc>)],
        statuses: &[RegistrationStatus],
    ) -> anyhow::Result<u64> {
        if seen.is_empty() || statuses.is_empty() {
            return Ok(0);
        }
        let mut marked = 0;
        // Chunked to stay under SQLite's expression depth and bind limits.
        for chunk in seen.chunks(MARK_CHUNK) {
            // Any write since addressing bumps updated_at and drops the row out.
            let unchanged = chunk.iter().fold(Condition::any(), |cond, &(id, at)| {
                cond.add(
                    Condition::all()
                        .add(registration::Column::Id.eq(id))
                        .add(registration::Column::UpdatedAt.eq(at)),
                )
            });
            let res = registration::Entity::update_many()
                .col_expr(registration::Column::NotificationSent, Expr::value(true))
                .filter(unchanged)
                .filter(registration::Column::Status.is_in(db_statuses(statuses)))
                .exec(&self.conn)
                .await
                .context("mark_notified failed")?;
            marked += res.rows_affected;
        }
        Ok(marked)
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        self.conn.commit().await.context("commit failed")
    }
}

async fn find_event<C: ConnectionTrait>(conn: &C, id: Uuid) -> anyhow::Result<Option<Event>> {
    let found = event::Entity::find_by_id(id)
        .one(conn)
        .await
        .context("find_event failed")?;
    Ok(found.map(Into::into))
}

async fn find_registration<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> anyhow::Result<Option<Registration>> {
    let found = registration::Entity::find_by_id(id)
        .one(conn)
        .await
        .context("find_registration failed")?;
    Ok(found.map(Into::into))
}

async fn find_registration_for<C: ConnectionTrait>(
    conn: &C,
    event_id: Uuid,
    user_id: Uuid,
) -> anyhow::Result<Option<Registration>> {
    let found = registration::Entity::find()
        .filter(registration::Column::EventId.eq(event_id))
        .filter(registration::Column::UserId.eq(user_id))
        .one(conn)
        .await
        .context("find_registration_for failed")?;
    Ok(found.map(Into::into))
}

/// `(status, rows)` for the event, optionally restricted by notification flag.
async fn count_by_status<C: ConnectionTrait>(
    conn: &C,
    event_id: Uuid,
    notified: Option<bool>,
) -> anyhow::Result<Vec<(RegistrationStatus, u64)>> {
    let mut query = registration::Entity::find()
        .select_only()
        .column(registration::Column::Status)
        .column_as(Expr::col(registration::Column::Id).count(), "total")
        .filter(registration::Column::EventId.eq(event_id))
        .group_by(registration::Column::Status);
    if let Some(flag) = notified {
        query = query.filter(registration::Column::NotificationSent.eq(flag));
    }
    let rows = query
        .into_tuple::<(registration::Status, i64)>()
        .all(conn)
        .await
        .context("count_by_status failed")?;
    Ok(rows
        .into_iter()
        .map(|(s, n)| (s.into(), u64::try_from(n).unwrap_or_default()))
        .collect())
}

fn db_statuses(statuses: &[RegistrationStatus]) -> Vec<registration::Status> {
    statuses.iter().map(|&s| s.into()).collect()
}
