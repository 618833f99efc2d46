//! Borrow request repository
//!
//! Every status change locks the request row, and the resource row when
//! availability moves, then writes the request, the resource and the
//! notifications in one transaction.

use sqlx::{FromRow, PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{Direction, NotificationRepository, Outcome, resource::ResourceLock};
use crate::{
    error::{ApiError, ApiResult},
    lifecycle::{Party, RequestAction, RequestStatus},
    models::{
        Page,
        notification::{NewNotification, NotificationType},
        resource::{BorrowRequest, CreateBorrowRequest, ResourceAvailability},
    },
};

const SELECT_BORROW_REQUEST: &str = r#"
    SELECT br.id, br.resource_id, r.title AS resource_title,
           br.borrower_id, b.name AS borrower_name,
           br.owner_id, o.name AS owner_name,
           br.message, br.start_date, br.end_date, br.status,
           br.created_at, br.updated_at
    FROM borrow_requests br
    JOIN resources r ON r.id = br.resource_id
    JOIN users b ON b.id = br.borrower_id
    JOIN users o ON o.id = br.owner_id
"#;

#[derive(Debug, FromRow)]
struct RequestLock {
    resource_id: Uuid,
    borrower_id: Uuid,
    owner_id: Uuid,
    #[sqlx(try_from = "String")]
    status: RequestStatus,
}

fn party_column(direction: Direction) -> &'static str {
    match direction {
        Direction::Incoming => "br.owner_id",
        Direction::Outgoing => "br.borrower_id",
    }
}

/// Borrow request repository
#[derive(Clone)]
pub struct BorrowRequestRepository {
    pool: PgPool,
}

impl BorrowRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(conn: &mut PgConnection, id: Uuid) -> ApiResult<BorrowRequest> {
        sqlx::query_as::<_, BorrowRequest>(&format!("{SELECT_BORROW_REQUEST} WHERE br.id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| ApiError::not_found("Borrow request"))
    }

    /// Ask to borrow an available resource owned by someone else
    pub async fn create(
        &self,
        borrower_id: Uuid,
        payload: &CreateBorrowRequest,
    ) -> ApiResult<Outcome<BorrowRequest>> {
        if let (Some(start), Some(end)) = (payload.start_date, payload.end_date) {
            if end < start {
                return Err(ApiError::BadRequest(
                    "End date must not be before start date".to_string(),
                ));
            }
        }

        let mut tx = self.pool.begin().await?;
        let resource = ResourceLock::acquire(&mut tx, payload.resource_id).await?;

        if resource.owner_id == borrower_id {
            return Err(ApiError::BadRequest(
                "You cannot borrow your own resource".to_string(),
            ));
        }
        match resource.availability {
            ResourceAvailability::Available => {}
            ResourceAvailability::Borrowed => {
                return Err(ApiError::BadRequest(
                    "Resource is already borrowed".to_string(),
                ));
            }
            ResourceAvailability::Unavailable => {
                return Err(ApiError::BadRequest(
                    "Resource is not available".to_string(),
                ));
            }
        }

        let pending: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM borrow_requests
                WHERE resource_id = $1 AND borrower_id = $2 AND status = 'pending'
            )
            "#,
        )
        .bind(payload.resource_id)
        .bind(borrower_id)
        .fetch_one(&mut *tx)
        .await?;

        if pending {
            return Err(ApiError::Conflict(
                "You already have a pending request for this resource".to_string(),
            ));
        }

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO borrow_requests (resource_id, borrower_id, owner_id, message, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(payload.resource_id)
        .bind(borrower_id)
        .bind(resource.owner_id)
        .bind(payload.message.as_deref())
        .bind(payload.start_date)
        .bind(payload.end_date)
        .fetch_one(&mut *tx)
        .await?;

        let request = Self::fetch(&mut tx, id).await?;
        let notification = NotificationRepository::insert(
            &mut tx,
            &NewNotification::new(
                request.owner_id,
                NotificationType::BorrowRequest,
                format!(
                    "{} wants to borrow {}",
                    request.borrower_name, request.resource_title
                ),
                request.id,
            ),
        )
        .await?;

        tx.commit().await?;
        info!(
            "Borrow request {} created for resource {}",
            request.id, request.resource_id
        );

        Ok(Outcome::new(request, vec![notification]))
    }

    /// Fetch a request visible to one of its parties
    pub async fn get_for_party(&self, id: Uuid, user_id: Uuid) -> ApiResult<BorrowRequest> {
        let mut conn = self.pool.acquire().await?;
        let request = Self::fetch(&mut conn, id).await?;

        if request.owner_id != user_id && request.borrower_id != user_id {
            return Err(ApiError::Forbidden(
                "You are not a party to this borrow request".to_string(),
            ));
        }

        Ok(request)
    }

    /// Requests on either side of the user, newest first
    pub async fn list(
        &self,
        user_id: Uuid,
        direction: Direction,
        page: Page,
    ) -> ApiResult<(Vec<BorrowRequest>, i64)> {
        let column = party_column(direction);

        let items = sqlx::query_as::<_, BorrowRequest>(&format!(
            "{SELECT_BORROW_REQUEST} WHERE {column} = $1 ORDER BY br.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM borrow_requests br WHERE {column} = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    /// Move a request through its lifecycle on behalf of `user_id`
    pub async fn transition(
        &self,
        id: Uuid,
        user_id: Uuid,
        action: RequestAction,
    ) -> ApiResult<Outcome<BorrowRequest>> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, RequestLock>(
            r#"
            SELECT resource_id, borrower_id, owner_id, status
            FROM borrow_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Borrow request"))?;

        let party = Party::of(user_id, current.owner_id, current.borrower_id).ok_or_else(|| {
            ApiError::Forbidden("You are not a party to this borrow request".to_string())
        })?;
        let next = current.status.apply(action, party)?;

        let mut notifications = Vec::new();

        match action {
            RequestAction::Accept => {
                let resource = ResourceLock::acquire(&mut tx, current.resource_id).await?;
                if resource.availability != ResourceAvailability::Available {
                    return Err(ApiError::BadRequest(
                        "Resource is no longer available".to_string(),
                    ));
                }

                sqlx::query(
                    r#"
                    UPDATE resources
                    SET availability = 'borrowed', borrowed_by = $2, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(current.resource_id)
                .bind(current.borrower_id)
                .execute(&mut *tx)
                .await?;

                let declined: Vec<(Uuid, Uuid)> = sqlx::query_as(
                    r#"
                    UPDATE borrow_requests
                    SET status = 'declined', updated_at = NOW()
                    WHERE resource_id = $1 AND id <> $2 AND status = 'pending'
                    RETURNING id, borrower_id
                    "#,
                )
                .bind(current.resource_id)
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

                for (other_id, other_borrower) in declined {
                    let notification = NotificationRepository::insert(
                        &mut tx,
                        &NewNotification::new(
                            other_borrower,
                            NotificationType::BorrowDeclined,
                            "Your borrow request was declined because the resource has been lent to someone else",
                            other_id,
                        ),
                    )
                    .await?;
                    notifications.push(notification);
                }
            }
            RequestAction::Complete => {
                ResourceLock::acquire(&mut tx, current.resource_id).await?;

                sqlx::query(
                    r#"
                    UPDATE resources
                    SET availability = 'available', borrowed_by = NULL, updated_at = NOW()
                    WHERE id = $1 AND availability = 'borrowed'
                    "#,
                )
                .bind(current.resource_id)
                .execute(&mut *tx)
                .await?;
            }
            RequestAction::Decline | RequestAction::Cancel => {}
        }

        sqlx::query("UPDATE borrow_requests SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;

        let request = Self::fetch(&mut tx, id).await?;

        let counterpart = party.counterpart(current.owner_id, current.borrower_id);
        let notice = match action {
            RequestAction::Accept => Some((
                NotificationType::BorrowAccepted,
                format!(
                    "{} accepted your request to borrow {}",
                    request.owner_name, request.resource_title
                ),
            )),
            RequestAction::Decline => Some((
                NotificationType::BorrowDeclined,
                format!(
                    "{} declined your request to borrow {}",
                    request.owner_name, request.resource_title
                ),
            )),
            RequestAction::Complete => Some((
                NotificationType::BorrowCompleted,
                format!(
                    "The loan of {} has been completed. You can now leave a review",
                    request.resource_title
                ),
            )),
            RequestAction::Cancel => None,
        };

        if let Some((kind, message)) = notice {
            let notification = NotificationRepository::insert(
                &mut tx,
                &NewNotification::new(counterpart, kind, message, request.id),
            )
            .await?;
            notifications.push(notification);
        }

        tx.commit().await?;
        info!(
            "Borrow request {} moved from {} to {}",
            id, current.status, next
        );

        Ok(Outcome::new(request, notifications))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::resource::CreateResourceRequest,
        repositories::ResourceRepository,
        test_support::{insert_user, migrated_pool},
    };

    fn ladder() -> CreateResourceRequest {
        CreateResourceRequest {
            title: "Step ladder".to_string(),
            description: "Three steps, aluminium".to_string(),
            category: "tools".to_string(),
            condition: None,
            location: None,
            image_url: None,
        }
    }

    fn ask(resource_id: Uuid) -> CreateBorrowRequest {
        CreateBorrowRequest {
            resource_id,
            message: None,
            start_date: None,
            end_date: None,
        }
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL"]
    async fn test_accept_lends_resource_and_declines_competing_requests() -> Result<(), Box<dyn std::error::Error>> {
        let pool = migrated_pool().await;
        let resources = ResourceRepository::new(pool.clone());
        let requests = BorrowRequestRepository::new(pool.clone());

        let owner = insert_user(&pool, "Owner").await;
        let first = insert_user(&pool, "First").await;
        let second = insert_user(&pool, "Second").await;
        let late = insert_user(&pool, "Late").await;

        let resource = resources.create(owner, &ladder()).await?;
        assert_eq!(resource.availability, ResourceAvailability::Available);

        let winner = requests.create(first, &ask(resource.id)).await?;
        assert_eq!(winner.value.status, RequestStatus::Pending);
        assert_eq!(winner.notifications.len(), 1);
        assert_eq!(winner.notifications[0].user_id, owner);

        let loser = requests.create(second, &ask(resource.id)).await?;

        let accepted = requests
            .transition(winner.value.id, owner, RequestAction::Accept)
            .await?;
        assert_eq!(accepted.value.status, RequestStatus::Accepted);

        let lent = resources.get(resource.id).await?;
        assert_eq!(lent.availability, ResourceAvailability::Borrowed);
        assert_eq!(lent.borrowed_by, Some(first));

        let declined = requests.get_for_party(loser.value.id, second).await?;
        assert_eq!(declined.status, RequestStatus::Declined);

        let recipients: Vec<Uuid> = accepted.notifications.iter().map(|n| n.user_id).collect();
        assert!(recipients.contains(&first));
        assert!(recipients.contains(&second));

        let refused = requests.create(late, &ask(resource.id)).await;
        assert!(matches!(refused, Err(ApiError::BadRequest(msg)) if msg == "Resource is already borrowed"));

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL"]
    async fn test_complete_returns_resource() -> Result<(), Box<dyn std::error::Error>> {
        let pool = migrated_pool().await;
        let resources = ResourceRepository::new(pool.clone());
        let requests = BorrowRequestRepository::new(pool.clone());

        let owner = insert_user(&pool, "Owner").await;
        let borrower = insert_user(&pool, "Borrower").await;
        let resource = resources.create(owner, &ladder()).await?;

        let request = requests.create(borrower, &ask(resource.id)).await?.value;
        requests
            .transition(request.id, owner, RequestAction::Accept)
            .await?;
        let completed = requests
            .transition(request.id, borrower, RequestAction::Complete)
            .await?;

        assert_eq!(completed.value.status, RequestStatus::Completed);
        assert_eq!(completed.notifications[0].user_id, owner);

        let returned = resources.get(resource.id).await?;
        assert_eq!(returned.availability, ResourceAvailability::Available);
        assert_eq!(returned.borrowed_by, None);

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL"]
    async fn test_request_rules() -> Result<(), Box<dyn std::error::Error>> {
        let pool = migrated_pool().await;
        let resources = ResourceRepository::new(pool.clone());
        let requests = BorrowRequestRepository::new(pool.clone());

        let owner = insert_user(&pool, "Owner").await;
        let borrower = insert_user(&pool, "Borrower").await;
        let resource = resources.create(owner, &ladder()).await?;

        let own = requests.create(owner, &ask(resource.id)).await;
        assert!(matches!(own, Err(ApiError::BadRequest(_))));

        let request = requests.create(borrower, &ask(resource.id)).await?.value;
        let duplicate = requests.create(borrower, &ask(resource.id)).await;
        assert!(matches!(duplicate, Err(ApiError::Conflict(_))));

        let self_accept = requests
            .transition(request.id, borrower, RequestAction::Accept)
            .await;
        assert!(matches!(self_accept, Err(ApiError::Forbidden(_))));

        Ok(())
    }
}
