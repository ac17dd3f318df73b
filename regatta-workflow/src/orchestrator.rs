//! Workflow orchestrator
//!
//! [`WorkflowOrchestrator::execute`] runs one intent end to end:
//!
//! 1. Load a fresh [`EngineContext`] from the entity store (and the
//!    moderation record from the channel, for resolution intents).
//! 2. Call the pure engine for a [`Decision`].
//! 3. Claim the record the decision resolves by deleting it; a delete
//!    that affects zero rows means another resolver won, and the intent
//!    ends with `NotFound` instead of double-applying.
//! 4. Apply the state effect as one store transaction.
//! 5. Publish the notification drafts, each with bounded retries.
//!
//! Ordering is the whole contract: the claim precedes the state write, so
//! two racing approvals can never both admit; the state write precedes
//! publishing, so a delivery failure after a landed effect surfaces as
//! [`WorkflowError::PartialNotificationFailure`] and is retried with
//! [`WorkflowOrchestrator::republish`] rather than by re-running the
//! intent.

use std::sync::Arc;
use std::time::Duration;

use regatta_shared::models::{
    Competition, CreateNotification, Notification, NotificationKind, Profile, Team, UserRole,
};
use serde::Serialize;
use uuid::Uuid;

use crate::channel::NotificationChannel;
use crate::engine::{decide, DenyReason, EngineContext, StateEffect};
use crate::error::{FailedDelivery, WorkflowError};
use crate::intent::{ModerationAction, WorkflowIntent};
use crate::store::{EntityStore, StoreError};

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delivery attempts per notification draft
    pub max_publish_attempts: u32,

    /// Base delay between delivery attempts in milliseconds
    pub base_retry_delay_ms: u64,

    /// Maximum delay between delivery attempts in milliseconds
    pub max_retry_delay_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            max_publish_attempts: 3,
            base_retry_delay_ms: 100,
            max_retry_delay_ms: 2000,
        }
    }
}

/// What an executed intent did, for the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// A moderation or invite record was opened; no state changed yet
    Requested { notification_ids: Vec<Uuid> },

    /// A user joined a roster
    MemberAdmitted { team_id: Uuid, user_id: Uuid },

    /// A team entered regional moderation
    RegionalSubmitted {
        team_id: Uuid,
        competition_id: Uuid,
        notification_ids: Vec<Uuid>,
    },

    /// A team was accepted into a regional competition
    RegionalApproved {
        team_id: Uuid,
        competition_id: Uuid,
    },

    /// A record was resolved as a rejection
    Rejected { notification_id: Uuid },

    /// Teams were forwarded for federal review
    FederalSubmitted {
        competition_id: Uuid,
        team_ids: Vec<Uuid>,
        notification_ids: Vec<Uuid>,
    },

    /// Teams were approved at the federal level
    FederalApproved {
        competition_id: Uuid,
        team_ids: Vec<Uuid>,
    },

    /// Rewards were granted to a team's roster
    AwardsDistributed { team_id: Uuid, recipients: usize },
}

/// Executes workflow intents against the store and channel ports
pub struct WorkflowOrchestrator {
    store: Arc<dyn EntityStore>,
    channel: Arc<dyn NotificationChannel>,
    config: OrchestratorConfig,
}

impl WorkflowOrchestrator {
    pub fn new(store: Arc<dyn EntityStore>, channel: Arc<dyn NotificationChannel>) -> Self {
        Self::with_config(store, channel, OrchestratorConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn EntityStore>,
        channel: Arc<dyn NotificationChannel>,
        config: OrchestratorConfig,
    ) -> Self {
        WorkflowOrchestrator {
            store,
            channel,
            config,
        }
    }

    /// Runs one intent end to end
    pub async fn execute(&self, intent: WorkflowIntent) -> Result<Effect, WorkflowError> {
        tracing::info!(intent = intent.name(), "Executing workflow intent");

        let ctx = self.load_context(&intent).await?;

        // A record whose metadata names an action this version cannot
        // execute is resolved as a rejection rather than left to wedge
        // the recipient's queue.
        if let Some(ModerationAction::Unknown { action_type }) = &ctx.action {
            return self.resolve_unknown(&ctx, action_type.clone()).await;
        }

        let decision = decide(&intent, &ctx);

        if !decision.allowed {
            let reason = match decision.reason {
                Some(reason) => reason,
                None => DenyReason::IncompleteContext {
                    what: "deny reason",
                },
            };
            return self.deny(&ctx, reason).await;
        }

        // Claim before writing state: the deleted record is the
        // idempotency boundary for concurrent resolvers.
        if let Some(record_id) = decision.resolves {
            let claimed = self.channel.delete(record_id).await?;
            if !claimed {
                tracing::info!(
                    notification_id = %record_id,
                    "Record already resolved by a concurrent intent"
                );
                return Err(WorkflowError::NotFound {
                    what: "notification",
                    id: record_id,
                });
            }
        }

        if let Some(effect) = &decision.effect {
            if let Err(e) = self.store.apply(effect).await {
                return match e {
                    StoreError::StaleTransition(what) => {
                        // The engine approved against a snapshot that a
                        // concurrent write invalidated before our
                        // transaction ran. The record is already claimed.
                        let reason = DenyReason::WriteConflict { what };
                        if let Some(record) = &ctx.moderation {
                            self.notify_stale(record, &reason).await;
                        }
                        tracing::warn!(
                            intent = intent.name(),
                            conflict = what,
                            "State effect lost a write race"
                        );
                        Err(WorkflowError::StaleState { reason })
                    }
                    other => Err(WorkflowError::Store(other)),
                };
            }
        }

        let (delivered, failed) = self.publish_all(decision.notifications).await;
        if !failed.is_empty() {
            return Err(WorkflowError::PartialNotificationFailure { delivered, failed });
        }

        let effect = summarize(decision.effect.as_ref(), decision.resolves, &delivered);
        tracing::info!(intent = intent.name(), "Workflow intent completed");

        Ok(effect)
    }

    /// Retries delivery of drafts that failed in a previous execution
    ///
    /// Only the failed drafts are re-published; the state effect and the
    /// already-delivered notifications are never repeated.
    pub async fn republish(
        &self,
        failed: &[FailedDelivery],
    ) -> Result<Vec<Notification>, WorkflowError> {
        let mut delivered = Vec::new();
        let mut still_failed = Vec::new();

        for delivery in failed {
            match self.publish_with_retry(delivery.draft.clone()).await {
                Ok(notification) => delivered.push(notification),
                Err((draft, error)) => still_failed.push(FailedDelivery { draft, error }),
            }
        }

        if !still_failed.is_empty() {
            return Err(WorkflowError::PartialNotificationFailure {
                delivered,
                failed: still_failed,
            });
        }

        Ok(delivered)
    }

    async fn deny(
        &self,
        ctx: &EngineContext,
        reason: DenyReason,
    ) -> Result<Effect, WorkflowError> {
        if reason.is_stale() {
            let Some(record) = &ctx.moderation else {
                return Err(WorkflowError::StaleState { reason });
            };

            // Stale records are claimed too: leaving one behind would
            // invite the recipient to resolve it again and again.
            let claimed = self.channel.delete(record.id).await?;
            if !claimed {
                return Err(WorkflowError::NotFound {
                    what: "notification",
                    id: record.id,
                });
            }
            self.notify_stale(record, &reason).await;
            tracing::warn!(
                notification_id = %record.id,
                reason = reason.code(),
                "Moderation record went stale; claimed and cleared"
            );

            return Err(WorkflowError::StaleState { reason });
        }

        tracing::debug!(reason = reason.code(), "Workflow intent denied");
        Err(WorkflowError::ValidationFailed { reason })
    }

    /// Tells the record's sender why their request was cleared, best effort
    ///
    /// The stale outcome already happened; a failure here is logged and
    /// must not replace the `StaleState` result.
    async fn notify_stale(&self, record: &Notification, reason: &DenyReason) {
        let Some(sender_id) = record.sender_id else {
            return;
        };

        let draft = CreateNotification {
            to_user: sender_id,
            content: format!("Request could not be completed: {reason}"),
            kind: NotificationKind::Instant,
            metadata: None,
            action_url: None,
            sender_id: None,
        };

        if let Err(e) = self.channel.publish(draft).await {
            tracing::warn!(
                notification_id = %record.id,
                error = %e,
                "Failed to notify sender about a stale request"
            );
        }
    }

    async fn resolve_unknown(
        &self,
        ctx: &EngineContext,
        action_type: String,
    ) -> Result<Effect, WorkflowError> {
        let Some(record) = &ctx.moderation else {
            return Err(WorkflowError::UnhandledActionType { action_type });
        };

        // Dismissal is still a resolution; only the recipient may claim it.
        let Some(actor) = &ctx.actor else {
            return Err(WorkflowError::ValidationFailed {
                reason: DenyReason::IncompleteContext { what: "actor" },
            });
        };
        if record.to_user != actor.id {
            return Err(WorkflowError::ValidationFailed {
                reason: DenyReason::NotRecipient,
            });
        }

        let claimed = self.channel.delete(record.id).await?;
        if !claimed {
            return Err(WorkflowError::NotFound {
                what: "notification",
                id: record.id,
            });
        }

        if let Some(sender_id) = record.sender_id {
            let draft = CreateNotification {
                to_user: sender_id,
                content: "Your request could not be processed and was dismissed".to_string(),
                kind: NotificationKind::Instant,
                metadata: None,
                action_url: None,
                sender_id: None,
            };
            if let Err(e) = self.channel.publish(draft).await {
                tracing::warn!(
                    notification_id = %record.id,
                    error = %e,
                    "Failed to notify sender about an unhandled action"
                );
            }
        }

        tracing::error!(
            notification_id = %record.id,
            action_type = %action_type,
            "Unhandled action type; record cleared"
        );

        Err(WorkflowError::UnhandledActionType { action_type })
    }

    async fn publish_all(
        &self,
        drafts: Vec<CreateNotification>,
    ) -> (Vec<Notification>, Vec<FailedDelivery>) {
        let mut delivered = Vec::new();
        let mut failed = Vec::new();

        for draft in drafts {
            match self.publish_with_retry(draft).await {
                Ok(notification) => delivered.push(notification),
                Err((draft, error)) => {
                    tracing::error!(
                        to_user = %draft.to_user,
                        error = %error,
                        "Notification delivery failed after retries"
                    );
                    failed.push(FailedDelivery { draft, error });
                }
            }
        }

        (delivered, failed)
    }

    async fn publish_with_retry(
        &self,
        draft: CreateNotification,
    ) -> Result<Notification, (CreateNotification, String)> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.channel.publish(draft.clone()).await {
                Ok(notification) => return Ok(notification),
                Err(e) => {
                    if attempt >= self.config.max_publish_attempts {
                        return Err((draft, e.to_string()));
                    }

                    let delay = std::cmp::min(
                        self.config.base_retry_delay_ms * 2u64.pow(attempt - 1),
                        self.config.max_retry_delay_ms,
                    );
                    tracing::warn!(
                        to_user = %draft.to_user,
                        attempt,
                        delay_ms = delay,
                        error = %e,
                        "Notification publish failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    async fn require_profile(&self, id: Uuid) -> Result<Profile, WorkflowError> {
        self.store
            .get_profile(id)
            .await?
            .ok_or(WorkflowError::NotFound { what: "profile", id })
    }

    async fn require_team(&self, id: Uuid) -> Result<Team, WorkflowError> {
        self.store
            .get_team(id)
            .await?
            .ok_or(WorkflowError::NotFound { what: "team", id })
    }

    async fn require_competition(&self, id: Uuid) -> Result<Competition, WorkflowError> {
        self.store
            .get_competition(id)
            .await?
            .ok_or(WorkflowError::NotFound {
                what: "competition",
                id,
            })
    }

    /// Loads the moderation record or reports the idempotency boundary
    async fn require_record(&self, id: Uuid) -> Result<Notification, WorkflowError> {
        self.channel
            .get(id)
            .await?
            .ok_or(WorkflowError::NotFound {
                what: "notification",
                id,
            })
    }

    /// Builds the context snapshot an intent is decided against
    ///
    /// Request intents fail fast with `NotFound` when an entity they name
    /// does not exist. Resolution intents load the record first (its
    /// absence is the already-resolved signal) and then re-read every
    /// entity the pending action touches; entities that vanished flow in
    /// as `None` so the engine can report the precise stale reason.
    async fn load_context(&self, intent: &WorkflowIntent) -> Result<EngineContext, WorkflowError> {
        match intent {
            WorkflowIntent::JoinTeam { team_id, user_id } => Ok(EngineContext {
                actor: Some(self.require_profile(*user_id).await?),
                team: Some(self.require_team(*team_id).await?),
                membership: self.store.get_team_member(*team_id, *user_id).await?,
                member_count: Some(self.store.count_team_members(*team_id).await?),
                captain: self.store.get_team_captain(*team_id).await?,
                ..Default::default()
            }),

            WorkflowIntent::ApproveTeamJoin {
                notification_id,
                approver_id,
            }
            | WorkflowIntent::RejectTeamJoin {
                notification_id,
                approver_id,
            } => {
                let record = self.require_record(*notification_id).await?;
                let action = ModerationAction::from_metadata(record.metadata.as_ref());

                let mut ctx = EngineContext {
                    actor: Some(self.require_profile(*approver_id).await?),
                    action: Some(action.clone()),
                    moderation: Some(record),
                    ..Default::default()
                };

                if let ModerationAction::TeamJoin { team_id, user_id } = action {
                    ctx.team = self.store.get_team(team_id).await?;
                    ctx.subject = self.store.get_profile(user_id).await?;
                    ctx.membership = self.store.get_team_member(team_id, user_id).await?;
                    ctx.member_count = Some(self.store.count_team_members(team_id).await?);
                    ctx.captain = self.store.get_team_captain(team_id).await?;
                }

                Ok(ctx)
            }

            WorkflowIntent::SubmitTeamToRegional {
                team_id,
                competition_id,
                captain_id,
            } => Ok(EngineContext {
                actor: Some(self.require_profile(*captain_id).await?),
                team: Some(self.require_team(*team_id).await?),
                captain: self.store.get_team_captain(*team_id).await?,
                competition: Some(self.require_competition(*competition_id).await?),
                competition_regions: self.store.list_competition_regions(*competition_id).await?,
                link: self.store.get_link(*team_id, *competition_id).await?,
                ..Default::default()
            }),

            WorkflowIntent::ApproveCompetitionJoin {
                notification_id,
                approver_id,
            } => {
                let record = self.require_record(*notification_id).await?;
                let action = ModerationAction::from_metadata(record.metadata.as_ref());

                let mut ctx = EngineContext {
                    actor: Some(self.require_profile(*approver_id).await?),
                    action: Some(action.clone()),
                    moderation: Some(record),
                    ..Default::default()
                };

                if let ModerationAction::CompetitionJoin {
                    team_id,
                    competition_id,
                } = action
                {
                    ctx.team = self.store.get_team(team_id).await?;
                    ctx.competition = self.store.get_competition(competition_id).await?;
                    ctx.competition_regions =
                        self.store.list_competition_regions(competition_id).await?;
                    ctx.link = self.store.get_link(team_id, competition_id).await?;
                    ctx.captain = self.store.get_team_captain(team_id).await?;
                }

                Ok(ctx)
            }

            WorkflowIntent::SubmitTeamsToFederal {
                team_ids,
                competition_id,
                submitter_id,
            } => {
                let teams = self.store.get_teams(team_ids).await?;
                for id in team_ids {
                    if !teams.iter().any(|t| t.id == *id) {
                        return Err(WorkflowError::NotFound { what: "team", id: *id });
                    }
                }

                Ok(EngineContext {
                    actor: Some(self.require_profile(*submitter_id).await?),
                    competition: Some(self.require_competition(*competition_id).await?),
                    teams,
                    federation_admins: self
                        .store
                        .list_profiles_by_role(UserRole::FederationAdmin)
                        .await?,
                    ..Default::default()
                })
            }

            WorkflowIntent::ApproveFederalSubmission {
                notification_id,
                approver_id,
            } => {
                let record = self.require_record(*notification_id).await?;
                let action = ModerationAction::from_metadata(record.metadata.as_ref());

                let mut ctx = EngineContext {
                    actor: Some(self.require_profile(*approver_id).await?),
                    action: Some(action.clone()),
                    moderation: Some(record),
                    ..Default::default()
                };

                if let ModerationAction::FederalSubmission {
                    competition_id,
                    team_ids,
                    ..
                } = action
                {
                    ctx.competition = self.store.get_competition(competition_id).await?;
                    ctx.teams = self.store.get_teams(&team_ids).await?;
                    for team in &ctx.teams {
                        if let Some(captain) = self.store.get_team_captain(team.id).await? {
                            ctx.captains.push(captain);
                        }
                    }
                }

                Ok(ctx)
            }

            WorkflowIntent::RejectAny {
                notification_id,
                actor_id,
            } => {
                let record = self.require_record(*notification_id).await?;
                let action = ModerationAction::from_metadata(record.metadata.as_ref());

                let mut ctx = EngineContext {
                    actor: Some(self.require_profile(*actor_id).await?),
                    action: Some(action.clone()),
                    moderation: Some(record),
                    ..Default::default()
                };

                match action {
                    ModerationAction::TeamJoin { team_id, user_id } => {
                        ctx.team = self.store.get_team(team_id).await?;
                        ctx.subject = self.store.get_profile(user_id).await?;
                    }
                    ModerationAction::CompetitionJoin {
                        team_id,
                        competition_id,
                    } => {
                        ctx.team = self.store.get_team(team_id).await?;
                        ctx.competition = self.store.get_competition(competition_id).await?;
                        ctx.link = self.store.get_link(team_id, competition_id).await?;
                    }
                    ModerationAction::FederalSubmission { competition_id, .. } => {
                        ctx.competition = self.store.get_competition(competition_id).await?;
                    }
                    ModerationAction::TeamInvite { team_id, .. } => {
                        ctx.team = self.store.get_team(team_id).await?;
                    }
                    ModerationAction::Unknown { .. } => {}
                }

                Ok(ctx)
            }

            WorkflowIntent::InviteToTeam {
                team_id,
                user_id,
                captain_id,
            } => Ok(EngineContext {
                actor: Some(self.require_profile(*captain_id).await?),
                subject: Some(self.require_profile(*user_id).await?),
                team: Some(self.require_team(*team_id).await?),
                captain: self.store.get_team_captain(*team_id).await?,
                membership: self.store.get_team_member(*team_id, *user_id).await?,
                member_count: Some(self.store.count_team_members(*team_id).await?),
                ..Default::default()
            }),

            WorkflowIntent::AcceptTeamInvite {
                notification_id,
                user_id,
            }
            | WorkflowIntent::DeclineTeamInvite {
                notification_id,
                user_id,
            } => {
                let record = self.require_record(*notification_id).await?;
                let action = ModerationAction::from_metadata(record.metadata.as_ref());

                let mut ctx = EngineContext {
                    actor: Some(self.require_profile(*user_id).await?),
                    action: Some(action.clone()),
                    moderation: Some(record),
                    ..Default::default()
                };

                if let ModerationAction::TeamInvite { team_id, .. } = action {
                    ctx.team = self.store.get_team(team_id).await?;
                    ctx.membership = self.store.get_team_member(team_id, *user_id).await?;
                    ctx.member_count = Some(self.store.count_team_members(team_id).await?);
                }

                Ok(ctx)
            }

            WorkflowIntent::DistributeAward {
                team_id, actor_id, ..
            } => Ok(EngineContext {
                actor: Some(self.require_profile(*actor_id).await?),
                team: Some(self.require_team(*team_id).await?),
                roster: self.store.list_team_members(*team_id).await?,
                ..Default::default()
            }),
        }
    }
}

/// Maps an applied decision to the caller-facing effect summary
fn summarize(
    effect: Option<&StateEffect>,
    resolves: Option<Uuid>,
    published: &[Notification],
) -> Effect {
    let notification_ids: Vec<Uuid> = published.iter().map(|n| n.id).collect();

    match effect {
        Some(StateEffect::AdmitMember {
            team_id, user_id, ..
        }) => Effect::MemberAdmitted {
            team_id: *team_id,
            user_id: *user_id,
        },
        Some(StateEffect::SubmitRegional {
            team_id,
            competition_id,
            ..
        }) => Effect::RegionalSubmitted {
            team_id: *team_id,
            competition_id: *competition_id,
            notification_ids,
        },
        Some(StateEffect::ApproveRegional {
            team_id,
            competition_id,
        }) => Effect::RegionalApproved {
            team_id: *team_id,
            competition_id: *competition_id,
        },
        Some(StateEffect::SubmitFederal {
            team_ids,
            competition_id,
        }) => Effect::FederalSubmitted {
            competition_id: *competition_id,
            team_ids: team_ids.clone(),
            notification_ids,
        },
        Some(StateEffect::ApproveFederal {
            competition_id,
            team_ids,
        }) => Effect::FederalApproved {
            competition_id: *competition_id,
            team_ids: team_ids.clone(),
        },
        Some(StateEffect::GrantRewards { team_id, grants }) => Effect::AwardsDistributed {
            team_id: *team_id,
            recipients: grants.len(),
        },
        Some(StateEffect::RejectRegional { .. }) | None => match resolves {
            Some(notification_id) => Effect::Rejected { notification_id },
            None => Effect::Requested { notification_ids },
        },
    }
}
