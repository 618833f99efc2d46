//! Application state shared across handlers

use std::sync::Arc;

use common::{cache::RedisPool, jwt::JwtService};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::ServerConfig,
    models::notification::Notification,
    realtime::{RealtimeHub, ServerEvent},
    repositories::{
        BorrowRequestRepository, EventRepository, HelpRequestRepository, MessageRepository,
        NotificationRepository, ResourceRepository, ReviewRepository, SkillRepository,
        SkillRequestRepository, SkillReviewRepository, UserRepository, UserStatusRepository,
    },
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub redis_pool: RedisPool,
    pub jwt_service: JwtService,
    pub hub: RealtimeHub,
    pub config: Arc<ServerConfig>,
    pub user_repository: UserRepository,
    pub user_status_repository: UserStatusRepository,
    pub resource_repository: ResourceRepository,
    pub borrow_request_repository: BorrowRequestRepository,
    pub review_repository: ReviewRepository,
    pub skill_repository: SkillRepository,
    pub skill_request_repository: SkillRequestRepository,
    pub skill_review_repository: SkillReviewRepository,
    pub help_request_repository: HelpRequestRepository,
    pub event_repository: EventRepository,
    pub message_repository: MessageRepository,
    pub notification_repository: NotificationRepository,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        redis_pool: RedisPool,
        jwt_service: JwtService,
        config: ServerConfig,
    ) -> Self {
        Self {
            user_repository: UserRepository::new(pool.clone()),
            user_status_repository: UserStatusRepository::new(pool.clone()),
            resource_repository: ResourceRepository::new(pool.clone()),
            borrow_request_repository: BorrowRequestRepository::new(pool.clone()),
            review_repository: ReviewRepository::new(pool.clone()),
            skill_repository: SkillRepository::new(pool.clone()),
            skill_request_repository: SkillRequestRepository::new(pool.clone()),
            skill_review_repository: SkillReviewRepository::new(pool.clone()),
            help_request_repository: HelpRequestRepository::new(pool.clone()),
            event_repository: EventRepository::new(pool.clone()),
            message_repository: MessageRepository::new(pool.clone()),
            notification_repository: NotificationRepository::new(pool.clone()),
            db_pool: pool,
            redis_pool,
            jwt_service,
            hub: RealtimeHub::new(),
            config: Arc::new(config),
        }
    }

    /// Push stored notifications to their recipients' rooms
    pub async fn push_notifications(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            let user_id = notification.user_id;
            self.hub
                .emit_to_user(user_id, &ServerEvent::Notification(notification))
                .await;
        }
    }

    /// Broadcast the current state of a resource after its availability moved
    pub async fn broadcast_resource(&self, resource_id: Uuid) {
        match self.resource_repository.find_by_id(resource_id).await {
            Ok(Some(resource)) => {
                self.hub
                    .broadcast(&ServerEvent::ResourceUpdated(resource))
                    .await;
            }
            Ok(None) => {}
            Err(e) => warn!("Could not load resource {} for broadcast: {}", resource_id, e),
        }
    }
}
