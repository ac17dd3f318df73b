//! In-memory doubles for the store and channel ports
//!
//! [`MemoryStore`] and [`MemoryChannel`] implement the orchestrator's two
//! ports over plain maps, with the same guard semantics as the Postgres
//! and Redis implementations. They exist for exercising workflows without
//! infrastructure:
//!
//! - Integration tests drive the full orchestrator against them.
//! - [`MemoryChannel::fail_publishes_to`] injects delivery failures to
//!   exercise partial-failure handling.
//!
//! Both doubles mirror their production counterparts' failure shapes:
//! `apply` returns the same [`StoreError::StaleTransition`] messages the
//! SQL guards produce, and a memory subscription delivers the same event
//! sequence a Redis tail would.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use regatta_shared::events::{NotificationEvent, NotificationEventKind};
use regatta_shared::models::{
    Competition, CreateNotification, LinkStatus, Notification, Profile, Reward, Team,
    TeamCompetitionLink, TeamMember, TeamRole, TeamStatus, UserRole,
};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::channel::{ChannelError, NotificationChannel, Subscription};
use crate::engine::StateEffect;
use crate::store::{EntityStore, StoreError};

#[derive(Default)]
struct StoreState {
    profiles: HashMap<Uuid, Profile>,
    teams: HashMap<Uuid, Team>,
    members: Vec<TeamMember>,
    competitions: HashMap<Uuid, Competition>,
    regions: HashMap<Uuid, Vec<i32>>,
    links: HashMap<(Uuid, Uuid), TeamCompetitionLink>,
    rewards: Vec<Reward>,
}

/// In-memory entity store
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Inserts or replaces a profile
    pub async fn insert_profile(&self, profile: Profile) {
        self.inner.lock().await.profiles.insert(profile.id, profile);
    }

    /// Removes a profile, for exercising stale-subject paths
    pub async fn remove_profile(&self, id: Uuid) {
        self.inner.lock().await.profiles.remove(&id);
    }

    /// Inserts or replaces a team
    ///
    /// Replacing lets a test mutate team state out from under a pending
    /// moderation record.
    pub async fn insert_team(&self, team: Team) {
        self.inner.lock().await.teams.insert(team.id, team);
    }

    /// Inserts a roster row
    pub async fn insert_member(&self, member: TeamMember) {
        self.inner.lock().await.members.push(member);
    }

    /// Removes a roster row, for exercising captaincy-change paths
    pub async fn remove_member(&self, team_id: Uuid, user_id: Uuid) {
        self.inner
            .lock()
            .await
            .members
            .retain(|m| !(m.team_id == team_id && m.user_id == user_id));
    }

    /// Inserts or replaces a competition and its eligible regions
    pub async fn insert_competition(&self, competition: Competition, regions: Vec<i32>) {
        let mut state = self.inner.lock().await;
        state.regions.insert(competition.id, regions);
        state.competitions.insert(competition.id, competition);
    }

    /// Inserts or replaces a participation link
    pub async fn insert_link(&self, link: TeamCompetitionLink) {
        self.inner
            .lock()
            .await
            .links
            .insert((link.team_id, link.competition_id), link);
    }

    /// Returns all granted rewards
    pub async fn rewards(&self) -> Vec<Reward> {
        self.inner.lock().await.rewards.clone()
    }

    /// Returns a team snapshot
    pub async fn team(&self, id: Uuid) -> Option<Team> {
        self.inner.lock().await.teams.get(&id).cloned()
    }

    fn admit_member(
        state: &mut StoreState,
        team_id: Uuid,
        user_id: Uuid,
        class: &str,
    ) -> Result<(), StoreError> {
        let member_count = state
            .members
            .iter()
            .filter(|m| m.team_id == team_id)
            .count() as i64;

        let Some(team) = state.teams.get_mut(&team_id) else {
            return Err(StoreError::StaleTransition(
                "class slot is no longer available",
            ));
        };
        let slot = team.required_classes.iter().position(|c| c == class);
        let open = team.status == TeamStatus::Forming
            && slot.is_some()
            && member_count < team.max_members as i64;
        if !open {
            return Err(StoreError::StaleTransition(
                "class slot is no longer available",
            ));
        }

        if state
            .members
            .iter()
            .any(|m| m.team_id == team_id && m.user_id == user_id)
        {
            return Err(StoreError::StaleTransition("user is already on the roster"));
        }

        if let Some(index) = slot {
            team.required_classes.remove(index);
        }
        team.updated_at = Utc::now();

        state.members.push(TeamMember {
            team_id,
            user_id,
            class: class.to_string(),
            role: TeamRole::Member,
            joined_at: Utc::now(),
        });

        Ok(())
    }

    fn submit_regional(
        state: &mut StoreState,
        team_id: Uuid,
        competition_id: Uuid,
        captain_id: Uuid,
    ) -> Result<(), StoreError> {
        match state.teams.get(&team_id) {
            Some(team) if team.status == TeamStatus::Forming => {}
            _ => return Err(StoreError::StaleTransition("team is no longer forming")),
        }
        if state.links.contains_key(&(team_id, competition_id)) {
            return Err(StoreError::StaleTransition(
                "team was already submitted to this competition",
            ));
        }

        if let Some(team) = state.teams.get_mut(&team_id) {
            team.status = TeamStatus::Pending;
            team.updated_at = Utc::now();
        }
        state.links.insert(
            (team_id, competition_id),
            TeamCompetitionLink {
                team_id,
                competition_id,
                status: LinkStatus::Pending,
                submitted_by: Some(captain_id),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );

        Ok(())
    }

    fn resolve_regional(
        state: &mut StoreState,
        team_id: Uuid,
        competition_id: Uuid,
        team_status: TeamStatus,
        link_status: LinkStatus,
    ) -> Result<(), StoreError> {
        match state.teams.get(&team_id) {
            Some(team) if team.status == TeamStatus::Pending => {}
            _ => return Err(StoreError::StaleTransition("team is no longer pending")),
        }
        match state.links.get(&(team_id, competition_id)) {
            Some(link) if link.status == LinkStatus::Pending => {}
            _ => {
                return Err(StoreError::StaleTransition(
                    "submission was already resolved",
                ))
            }
        }

        if let Some(team) = state.teams.get_mut(&team_id) {
            team.status = team_status;
            team.updated_at = Utc::now();
        }
        if let Some(link) = state.links.get_mut(&(team_id, competition_id)) {
            link.status = link_status;
            link.updated_at = Utc::now();
        }

        Ok(())
    }

    fn submit_federal(state: &mut StoreState, team_ids: &[Uuid]) -> Result<(), StoreError> {
        // Both-or-neither: every team passes the guard before any change.
        let all_eligible = team_ids.iter().all(|id| {
            state.teams.get(id).is_some_and(|team| {
                matches!(
                    team.status,
                    TeamStatus::ApprovedRegional | TeamStatus::PendingFederal
                )
            })
        });
        if !all_eligible {
            return Err(StoreError::StaleTransition(
                "one or more teams are not eligible",
            ));
        }

        for id in team_ids {
            if let Some(team) = state.teams.get_mut(id) {
                team.status = TeamStatus::PendingFederal;
                team.updated_at = Utc::now();
            }
        }

        Ok(())
    }

    fn approve_federal(
        state: &mut StoreState,
        competition_id: Uuid,
        team_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        let all_pending = team_ids.iter().all(|id| {
            state
                .teams
                .get(id)
                .is_some_and(|team| team.status == TeamStatus::PendingFederal)
        });
        if !all_pending {
            return Err(StoreError::StaleTransition(
                "one or more teams already left federal review",
            ));
        }

        for id in team_ids {
            if let Some(team) = state.teams.get_mut(id) {
                team.status = TeamStatus::ApprovedFederal;
                team.updated_at = Utc::now();
            }
            state
                .links
                .entry((*id, competition_id))
                .and_modify(|link| {
                    link.status = LinkStatus::Approved;
                    link.updated_at = Utc::now();
                })
                .or_insert_with(|| TeamCompetitionLink {
                    team_id: *id,
                    competition_id,
                    status: LinkStatus::Approved,
                    submitted_by: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                });
        }

        Ok(())
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(self.inner.lock().await.profiles.get(&id).cloned())
    }

    async fn list_profiles_by_role(&self, role: UserRole) -> Result<Vec<Profile>, StoreError> {
        let state = self.inner.lock().await;
        let mut profiles: Vec<Profile> = state
            .profiles
            .values()
            .filter(|p| p.role == role)
            .cloned()
            .collect();
        profiles.sort_by_key(|p| p.created_at);
        Ok(profiles)
    }

    async fn get_team(&self, id: Uuid) -> Result<Option<Team>, StoreError> {
        Ok(self.inner.lock().await.teams.get(&id).cloned())
    }

    async fn get_teams(&self, ids: &[Uuid]) -> Result<Vec<Team>, StoreError> {
        let state = self.inner.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.teams.get(id).cloned())
            .collect())
    }

    async fn get_team_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .members
            .iter()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
            .cloned())
    }

    async fn get_team_captain(&self, team_id: Uuid) -> Result<Option<TeamMember>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .members
            .iter()
            .find(|m| m.team_id == team_id && m.role == TeamRole::Captain)
            .cloned())
    }

    async fn list_team_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, StoreError> {
        let state = self.inner.lock().await;
        let mut members: Vec<TeamMember> = state
            .members
            .iter()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| (m.role != TeamRole::Captain, m.joined_at));
        Ok(members)
    }

    async fn count_team_members(&self, team_id: Uuid) -> Result<i64, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .members
            .iter()
            .filter(|m| m.team_id == team_id)
            .count() as i64)
    }

    async fn get_competition(&self, id: Uuid) -> Result<Option<Competition>, StoreError> {
        Ok(self.inner.lock().await.competitions.get(&id).cloned())
    }

    async fn list_competition_regions(&self, id: Uuid) -> Result<Vec<i32>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .regions
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_link(
        &self,
        team_id: Uuid,
        competition_id: Uuid,
    ) -> Result<Option<TeamCompetitionLink>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .links
            .get(&(team_id, competition_id))
            .cloned())
    }

    async fn apply(&self, effect: &StateEffect) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;

        match effect {
            StateEffect::AdmitMember {
                team_id,
                user_id,
                class,
            } => Self::admit_member(&mut state, *team_id, *user_id, class),
            StateEffect::SubmitRegional {
                team_id,
                competition_id,
                captain_id,
            } => Self::submit_regional(&mut state, *team_id, *competition_id, *captain_id),
            StateEffect::ApproveRegional {
                team_id,
                competition_id,
            } => Self::resolve_regional(
                &mut state,
                *team_id,
                *competition_id,
                TeamStatus::ApprovedRegional,
                LinkStatus::Approved,
            ),
            StateEffect::RejectRegional {
                team_id,
                competition_id,
            } => Self::resolve_regional(
                &mut state,
                *team_id,
                *competition_id,
                TeamStatus::Rejected,
                LinkStatus::Rejected,
            ),
            StateEffect::SubmitFederal { team_ids, .. } => {
                Self::submit_federal(&mut state, team_ids)
            }
            StateEffect::ApproveFederal {
                competition_id,
                team_ids,
            } => Self::approve_federal(&mut state, *competition_id, team_ids),
            StateEffect::GrantRewards { grants, .. } => {
                for grant in grants {
                    state.rewards.push(Reward {
                        id: Uuid::new_v4(),
                        user_id: grant.user_id,
                        kind: grant.kind,
                        value: grant.value.clone(),
                        competition_id: grant.competition_id,
                        created_at: Utc::now(),
                    });
                }
                Ok(())
            }
        }
    }
}

#[derive(Default)]
struct ChannelState {
    notifications: Vec<Notification>,
    senders: HashMap<Uuid, Vec<mpsc::UnboundedSender<NotificationEvent>>>,
    fail_for: HashSet<Uuid>,
}

/// In-memory notification channel with failure injection
#[derive(Default)]
pub struct MemoryChannel {
    inner: Mutex<ChannelState>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        MemoryChannel::default()
    }

    /// Makes every publish to this recipient fail until cleared
    pub async fn fail_publishes_to(&self, user_id: Uuid) {
        self.inner.lock().await.fail_for.insert(user_id);
    }

    /// Clears all injected failures
    pub async fn clear_failures(&self) {
        self.inner.lock().await.fail_for.clear();
    }

    /// Returns every stored notification, across all recipients
    pub async fn all(&self) -> Vec<Notification> {
        self.inner.lock().await.notifications.clone()
    }

    fn emit(state: &mut ChannelState, kind: NotificationEventKind, notification: &Notification) {
        if let Some(senders) = state.senders.get_mut(&notification.to_user) {
            senders.retain(|tx| {
                tx.send(NotificationEvent {
                    kind,
                    notification: notification.clone(),
                })
                .is_ok()
            });
        }
    }
}

#[async_trait]
impl NotificationChannel for MemoryChannel {
    async fn publish(&self, draft: CreateNotification) -> Result<Notification, ChannelError> {
        let mut state = self.inner.lock().await;

        if state.fail_for.contains(&draft.to_user) {
            return Err(ChannelError::DeliveryFailed("injected failure".to_string()));
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            to_user: draft.to_user,
            content: draft.content,
            kind: draft.kind,
            is_read: false,
            metadata: draft.metadata,
            action_url: draft.action_url,
            sender_id: draft.sender_id,
            created_at: Utc::now(),
        };

        state.notifications.push(notification.clone());
        Self::emit(&mut state, NotificationEventKind::Inserted, &notification);

        Ok(notification)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, ChannelError> {
        Ok(self
            .inner
            .lock()
            .await
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ChannelError> {
        let mut state = self.inner.lock().await;

        let Some(index) = state.notifications.iter().position(|n| n.id == id) else {
            return Ok(false);
        };
        let removed = state.notifications.remove(index);
        Self::emit(&mut state, NotificationEventKind::Deleted, &removed);

        Ok(true)
    }

    async fn mark_read(&self, id: Uuid) -> Result<bool, ChannelError> {
        let mut state = self.inner.lock().await;

        let Some(index) = state.notifications.iter().position(|n| n.id == id) else {
            return Ok(false);
        };
        state.notifications[index].is_read = true;
        let updated = state.notifications[index].clone();
        Self::emit(&mut state, NotificationEventKind::Updated, &updated);

        Ok(true)
    }

    async fn inbox(&self, user_id: Uuid) -> Result<Vec<Notification>, ChannelError> {
        let state = self.inner.lock().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.to_user == user_id)
            .cloned()
            .collect())
    }

    async fn subscribe(&self, user_id: Uuid) -> Result<Subscription, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .lock()
            .await
            .senders
            .entry(user_id)
            .or_default()
            .push(tx);

        Ok(Subscription::new(rx, CancellationToken::new()))
    }
}
