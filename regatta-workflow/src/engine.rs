//! Pure decision engine
//!
//! [`decide`] maps an intent plus a snapshot of the entities it touches to
//! a [`Decision`]: allowed or denied, the state effect to apply, the
//! notification drafts to publish, and the moderation record the intent
//! resolves. The engine performs no IO and never mutates anything; the
//! orchestrator loads the [`EngineContext`], calls [`decide`], and carries
//! out the decision.
//!
//! Denials come in two classes. A plain denial means the intent was never
//! valid for this actor and state; the moderation record, if any, stays
//! untouched. A stale denial ([`DenyReason::is_stale`]) means the record
//! was valid when created but the world moved on underneath it; the
//! orchestrator claims the record and reports the conflict.

use regatta_shared::mentions::mention;
use regatta_shared::models::{
    Competition, CompetitionKind, CreateNotification, LinkStatus, Notification, NotificationKind,
    Profile, RewardKind, Team, TeamCompetitionLink, TeamMember, TeamStatus, UserRole,
};
use uuid::Uuid;

use crate::intent::{
    competition_join_metadata, federal_submission_metadata, team_invite_metadata,
    team_join_metadata, ModerationAction, WorkflowIntent,
};

/// Entity snapshot an intent is decided against
///
/// The orchestrator fills in the fields the intent needs and leaves the
/// rest at their defaults. A field the decision logic requires but the
/// orchestrator did not load produces an `IncompleteContext` denial; a
/// field that is absent because the entity no longer exists produces the
/// matching stale or not-found denial instead.
#[derive(Debug, Clone, Default)]
pub struct EngineContext {
    /// Who issued the intent
    pub actor: Option<Profile>,

    /// The user the intent is about, when that is not the actor
    pub subject: Option<Profile>,

    /// The team the intent targets
    pub team: Option<Team>,

    /// Teams of a batch submission
    pub teams: Vec<Team>,

    /// The target team's captain row
    pub captain: Option<TeamMember>,

    /// The subject's roster row on the target team, if any
    pub membership: Option<TeamMember>,

    /// Current roster size of the target team
    pub member_count: Option<i64>,

    /// Full roster of the target team
    pub roster: Vec<TeamMember>,

    /// Captain rows for the teams of a batch submission
    pub captains: Vec<TeamMember>,

    /// The competition the intent targets
    pub competition: Option<Competition>,

    /// Eligible regions of the target competition
    pub competition_regions: Vec<i32>,

    /// Participation link between the target team and competition
    pub link: Option<TeamCompetitionLink>,

    /// The moderation record a resolution intent acts on
    pub moderation: Option<Notification>,

    /// The record's decoded pending action
    pub action: Option<ModerationAction>,

    /// Every federation admin, for fan-out submissions
    pub federation_admins: Vec<Profile>,
}

/// One reward to grant when applying a `GrantRewards` effect
#[derive(Debug, Clone, PartialEq)]
pub struct RewardGrant {
    pub user_id: Uuid,
    pub kind: RewardKind,
    pub value: String,
    pub competition_id: Option<Uuid>,
}

/// State mutation an allowed intent requires
///
/// Each variant is applied as a single transaction by the entity store.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEffect {
    /// Consume one class slot and add the user to the roster
    AdmitMember {
        team_id: Uuid,
        user_id: Uuid,
        class: String,
    },

    /// Move a forming team to `pending` and open a pending link
    SubmitRegional {
        team_id: Uuid,
        competition_id: Uuid,
        captain_id: Uuid,
    },

    /// Move a pending team to `approved_regional` and approve its link
    ApproveRegional {
        team_id: Uuid,
        competition_id: Uuid,
    },

    /// Move a pending team to `rejected` and reject its link
    RejectRegional {
        team_id: Uuid,
        competition_id: Uuid,
    },

    /// Park every listed team at `pending_federal`
    SubmitFederal {
        team_ids: Vec<Uuid>,
        competition_id: Uuid,
    },

    /// Move every listed team to `approved_federal` and link them approved
    ApproveFederal {
        competition_id: Uuid,
        team_ids: Vec<Uuid>,
    },

    /// Append reward rows for a team's roster
    GrantRewards {
        team_id: Uuid,
        grants: Vec<RewardGrant>,
    },
}

/// Why an intent was denied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    ActorInactive,
    SubjectInactive,
    AlreadyMember,
    ClassNotRequired,
    RegionMismatch,
    TeamNotForming,
    RosterFull,
    NotCaptain,
    NotRecipient,
    NotRegionalAdmin,
    NotFederationAdmin,
    NotAdmin,
    WrongCompetitionKind,
    RegionNotEligible,
    AlreadyLinked,
    TeamNotEligible,
    EmptySubmission,
    NoModeratorAssigned,
    NoFederationAdmins,
    ActionMismatch,
    IncompleteContext { what: &'static str },

    // Stale denials: the record was valid once, but the world moved on.
    StaleTeamMissing,
    StaleSubjectMissing,
    StaleSubjectInactive,
    StaleAlreadyMember,
    StaleRosterClosed,
    StaleClassFilled,
    StaleRegionChanged,
    StaleTeamState,
    StaleLinkResolved,
    StaleCompetitionMissing,
    StaleModeratorChanged,
    WriteConflict { what: &'static str },
}

impl DenyReason {
    /// Returns the stable machine-readable code for this denial
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::ActorInactive => "actor_inactive",
            DenyReason::SubjectInactive => "subject_inactive",
            DenyReason::AlreadyMember => "already_member",
            DenyReason::ClassNotRequired => "class_not_required",
            DenyReason::RegionMismatch => "region_mismatch",
            DenyReason::TeamNotForming => "team_not_forming",
            DenyReason::RosterFull => "roster_full",
            DenyReason::NotCaptain => "not_captain",
            DenyReason::NotRecipient => "not_recipient",
            DenyReason::NotRegionalAdmin => "not_regional_admin",
            DenyReason::NotFederationAdmin => "not_federation_admin",
            DenyReason::NotAdmin => "not_admin",
            DenyReason::WrongCompetitionKind => "wrong_competition_kind",
            DenyReason::RegionNotEligible => "region_not_eligible",
            DenyReason::AlreadyLinked => "already_linked",
            DenyReason::TeamNotEligible => "team_not_eligible",
            DenyReason::EmptySubmission => "empty_submission",
            DenyReason::NoModeratorAssigned => "no_moderator_assigned",
            DenyReason::NoFederationAdmins => "no_federation_admins",
            DenyReason::ActionMismatch => "action_mismatch",
            DenyReason::IncompleteContext { .. } => "incomplete_context",
            DenyReason::StaleTeamMissing => "stale_team_missing",
            DenyReason::StaleSubjectMissing => "stale_subject_missing",
            DenyReason::StaleSubjectInactive => "stale_subject_inactive",
            DenyReason::StaleAlreadyMember => "stale_already_member",
            DenyReason::StaleRosterClosed => "stale_roster_closed",
            DenyReason::StaleClassFilled => "stale_class_filled",
            DenyReason::StaleRegionChanged => "stale_region_changed",
            DenyReason::StaleTeamState => "stale_team_state",
            DenyReason::StaleLinkResolved => "stale_link_resolved",
            DenyReason::StaleCompetitionMissing => "stale_competition_missing",
            DenyReason::StaleModeratorChanged => "stale_moderator_changed",
            DenyReason::WriteConflict { .. } => "stale_write_conflict",
        }
    }

    /// Checks if this denial means the record was outrun, not invalid
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            DenyReason::StaleTeamMissing
                | DenyReason::StaleSubjectMissing
                | DenyReason::StaleSubjectInactive
                | DenyReason::StaleAlreadyMember
                | DenyReason::StaleRosterClosed
                | DenyReason::StaleClassFilled
                | DenyReason::StaleRegionChanged
                | DenyReason::StaleTeamState
                | DenyReason::StaleLinkResolved
                | DenyReason::StaleCompetitionMissing
                | DenyReason::StaleModeratorChanged
                | DenyReason::WriteConflict { .. }
        )
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::ActorInactive => write!(f, "the acting account is banned or frozen"),
            DenyReason::SubjectInactive => write!(f, "the target account is banned or frozen"),
            DenyReason::AlreadyMember => write!(f, "the user is already on the roster"),
            DenyReason::ClassNotRequired => {
                write!(f, "the team has no open slot for the user's class")
            }
            DenyReason::RegionMismatch => {
                write!(f, "the user's region does not match the team's region")
            }
            DenyReason::TeamNotForming => write!(f, "the team is no longer forming"),
            DenyReason::RosterFull => write!(f, "the roster is full"),
            DenyReason::NotCaptain => write!(f, "only the team captain may do this"),
            DenyReason::NotRecipient => {
                write!(f, "only the record's recipient may resolve it")
            }
            DenyReason::NotRegionalAdmin => write!(f, "only a regional admin may do this"),
            DenyReason::NotFederationAdmin => write!(f, "only a federation admin may do this"),
            DenyReason::NotAdmin => write!(f, "only an admin may do this"),
            DenyReason::WrongCompetitionKind => {
                write!(f, "the competition does not accept this kind of submission")
            }
            DenyReason::RegionNotEligible => {
                write!(f, "the team's region is not eligible for this competition")
            }
            DenyReason::AlreadyLinked => {
                write!(f, "the team was already submitted to this competition")
            }
            DenyReason::TeamNotEligible => {
                write!(f, "one or more teams are not eligible for federal review")
            }
            DenyReason::EmptySubmission => write!(f, "the submission names no teams"),
            DenyReason::NoModeratorAssigned => {
                write!(f, "no moderator is assigned to receive this request")
            }
            DenyReason::NoFederationAdmins => {
                write!(f, "no federation admins exist to review this submission")
            }
            DenyReason::ActionMismatch => {
                write!(f, "the record's pending action does not match the intent")
            }
            DenyReason::IncompleteContext { what } => {
                write!(f, "decision context is missing {what}")
            }
            DenyReason::StaleTeamMissing => write!(f, "the team no longer exists"),
            DenyReason::StaleSubjectMissing => write!(f, "the user's profile no longer exists"),
            DenyReason::StaleSubjectInactive => {
                write!(f, "the user's account was deactivated in the meantime")
            }
            DenyReason::StaleAlreadyMember => {
                write!(f, "the user already joined the roster in the meantime")
            }
            DenyReason::StaleRosterClosed => {
                write!(f, "the roster closed before this request was resolved")
            }
            DenyReason::StaleClassFilled => {
                write!(f, "the class slot was already filled")
            }
            DenyReason::StaleRegionChanged => {
                write!(f, "regions changed and the request is no longer eligible")
            }
            DenyReason::StaleTeamState => {
                write!(f, "the team moved to a different status in the meantime")
            }
            DenyReason::StaleLinkResolved => {
                write!(f, "the submission was already resolved")
            }
            DenyReason::StaleCompetitionMissing => {
                write!(f, "the competition no longer exists")
            }
            DenyReason::StaleModeratorChanged => {
                write!(f, "the reviewing duty moved to someone else in the meantime")
            }
            DenyReason::WriteConflict { what } => {
                write!(f, "a concurrent update got there first: {what}")
            }
        }
    }
}

/// The engine's verdict on an intent
#[derive(Debug, Clone)]
pub struct Decision {
    /// Whether the intent may proceed
    pub allowed: bool,

    /// Why not, when denied
    pub reason: Option<DenyReason>,

    /// State mutation to apply, when allowed
    pub effect: Option<StateEffect>,

    /// Notification drafts to publish, when allowed
    pub notifications: Vec<CreateNotification>,

    /// Moderation record this intent resolves (claims by deletion)
    pub resolves: Option<Uuid>,
}

impl Decision {
    /// Builds an allowing decision
    pub fn allow(
        effect: Option<StateEffect>,
        notifications: Vec<CreateNotification>,
        resolves: Option<Uuid>,
    ) -> Self {
        Decision {
            allowed: true,
            reason: None,
            effect,
            notifications,
            resolves,
        }
    }

    /// Builds a denying decision
    ///
    /// Denials never resolve the record; the orchestrator decides whether
    /// a stale denial claims it.
    pub fn deny(reason: DenyReason) -> Self {
        Decision {
            allowed: false,
            reason: Some(reason),
            effect: None,
            notifications: Vec::new(),
            resolves: None,
        }
    }
}

/// Decides an intent against a context snapshot
pub fn decide(intent: &WorkflowIntent, ctx: &EngineContext) -> Decision {
    match intent {
        WorkflowIntent::JoinTeam { .. } => decide_join(ctx),
        WorkflowIntent::ApproveTeamJoin { .. } => decide_approve_join(ctx),
        WorkflowIntent::RejectTeamJoin { .. } => decide_reject_join(ctx),
        WorkflowIntent::SubmitTeamToRegional { .. } => decide_submit_regional(ctx),
        WorkflowIntent::ApproveCompetitionJoin { .. } => decide_approve_regional(ctx),
        WorkflowIntent::SubmitTeamsToFederal { team_ids, .. } => {
            decide_submit_federal(ctx, team_ids)
        }
        WorkflowIntent::ApproveFederalSubmission { .. } => decide_approve_federal(ctx),
        WorkflowIntent::RejectAny { .. } => decide_reject_any(ctx),
        WorkflowIntent::InviteToTeam { .. } => decide_invite(ctx),
        WorkflowIntent::AcceptTeamInvite { .. } => decide_accept_invite(ctx),
        WorkflowIntent::DeclineTeamInvite { .. } => decide_decline_invite(ctx),
        WorkflowIntent::DistributeAward {
            competition_id,
            kind,
            value,
            ..
        } => decide_award(ctx, *competition_id, *kind, value),
    }
}

fn team_label(ctx: &EngineContext) -> String {
    match &ctx.team {
        Some(team) => mention("team", team.id, &team.name),
        None => "the team".to_string(),
    }
}

fn competition_label(ctx: &EngineContext) -> String {
    match &ctx.competition {
        Some(competition) => mention("competition", competition.id, &competition.name),
        None => "the competition".to_string(),
    }
}

fn decide_join(ctx: &EngineContext) -> Decision {
    let Some(actor) = &ctx.actor else {
        return Decision::deny(DenyReason::IncompleteContext { what: "actor" });
    };
    let Some(team) = &ctx.team else {
        return Decision::deny(DenyReason::IncompleteContext { what: "team" });
    };
    let Some(member_count) = ctx.member_count else {
        return Decision::deny(DenyReason::IncompleteContext { what: "member count" });
    };

    if !actor.role.is_active() {
        return Decision::deny(DenyReason::ActorInactive);
    }
    if ctx.membership.is_some() {
        return Decision::deny(DenyReason::AlreadyMember);
    }
    if team.status != TeamStatus::Forming {
        return Decision::deny(DenyReason::TeamNotForming);
    }
    if member_count >= team.max_members as i64 {
        return Decision::deny(DenyReason::RosterFull);
    }
    if actor.region != Some(team.region) {
        return Decision::deny(DenyReason::RegionMismatch);
    }
    let Some(class) = actor.class.as_deref() else {
        return Decision::deny(DenyReason::ClassNotRequired);
    };
    if !team.required_classes.iter().any(|c| c == class) {
        return Decision::deny(DenyReason::ClassNotRequired);
    }
    let Some(captain) = &ctx.captain else {
        return Decision::deny(DenyReason::NoModeratorAssigned);
    };

    let content = format!(
        "{} requests to join {}",
        mention("user", actor.id, &actor.name),
        mention("team", team.id, &team.name),
    );

    Decision::allow(
        None,
        vec![CreateNotification {
            to_user: captain.user_id,
            content,
            kind: NotificationKind::Moderation,
            metadata: Some(team_join_metadata(team.id, actor.id)),
            action_url: Some(format!("/dashboard?team={}", team.id)),
            sender_id: Some(actor.id),
        }],
        None,
    )
}

fn decide_approve_join(ctx: &EngineContext) -> Decision {
    let Some(record) = &ctx.moderation else {
        return Decision::deny(DenyReason::IncompleteContext { what: "record" });
    };
    let (team_id, user_id) = match &ctx.action {
        Some(ModerationAction::TeamJoin { team_id, user_id }) => (*team_id, *user_id),
        _ => return Decision::deny(DenyReason::ActionMismatch),
    };
    let Some(actor) = &ctx.actor else {
        return Decision::deny(DenyReason::IncompleteContext { what: "actor" });
    };
    if record.to_user != actor.id {
        return Decision::deny(DenyReason::NotRecipient);
    }

    // The record may be arbitrarily old; every precondition is re-checked
    // against the fresh snapshot before the slot is consumed.
    let Some(team) = &ctx.team else {
        return Decision::deny(DenyReason::StaleTeamMissing);
    };
    match &ctx.captain {
        Some(captain) if captain.user_id == actor.id => {}
        _ => return Decision::deny(DenyReason::StaleModeratorChanged),
    }
    let Some(subject) = &ctx.subject else {
        return Decision::deny(DenyReason::StaleSubjectMissing);
    };
    if !subject.role.is_active() {
        return Decision::deny(DenyReason::StaleSubjectInactive);
    }
    if ctx.membership.is_some() {
        return Decision::deny(DenyReason::StaleAlreadyMember);
    }
    if team.status != TeamStatus::Forming {
        return Decision::deny(DenyReason::StaleRosterClosed);
    }
    let Some(member_count) = ctx.member_count else {
        return Decision::deny(DenyReason::IncompleteContext { what: "member count" });
    };
    if member_count >= team.max_members as i64 {
        return Decision::deny(DenyReason::StaleRosterClosed);
    }
    let Some(class) = subject.class.as_deref() else {
        return Decision::deny(DenyReason::StaleClassFilled);
    };
    if !team.required_classes.iter().any(|c| c == class) {
        return Decision::deny(DenyReason::StaleClassFilled);
    }
    if subject.region != Some(team.region) {
        return Decision::deny(DenyReason::StaleRegionChanged);
    }

    let content = format!("You joined {}", mention("team", team.id, &team.name));

    Decision::allow(
        Some(StateEffect::AdmitMember {
            team_id,
            user_id,
            class: class.to_string(),
        }),
        vec![CreateNotification {
            to_user: subject.id,
            content,
            kind: NotificationKind::Instant,
            metadata: None,
            action_url: Some(format!("/dashboard?team={}", team.id)),
            sender_id: Some(actor.id),
        }],
        Some(record.id),
    )
}

fn decide_reject_join(ctx: &EngineContext) -> Decision {
    let Some(record) = &ctx.moderation else {
        return Decision::deny(DenyReason::IncompleteContext { what: "record" });
    };
    if !matches!(&ctx.action, Some(ModerationAction::TeamJoin { .. })) {
        return Decision::deny(DenyReason::ActionMismatch);
    }
    let Some(actor) = &ctx.actor else {
        return Decision::deny(DenyReason::IncompleteContext { what: "actor" });
    };
    if record.to_user != actor.id {
        return Decision::deny(DenyReason::NotRecipient);
    }

    // A rejection succeeds regardless of how stale the request is.
    let mut notifications = Vec::new();
    if let Some(subject) = &ctx.subject {
        notifications.push(CreateNotification {
            to_user: subject.id,
            content: format!("Your request to join {} was declined", team_label(ctx)),
            kind: NotificationKind::Instant,
            metadata: None,
            action_url: None,
            sender_id: Some(actor.id),
        });
    }

    Decision::allow(None, notifications, Some(record.id))
}

fn decide_submit_regional(ctx: &EngineContext) -> Decision {
    let Some(actor) = &ctx.actor else {
        return Decision::deny(DenyReason::IncompleteContext { what: "actor" });
    };
    if !actor.role.is_active() {
        return Decision::deny(DenyReason::ActorInactive);
    }
    let Some(team) = &ctx.team else {
        return Decision::deny(DenyReason::IncompleteContext { what: "team" });
    };
    match &ctx.captain {
        Some(captain) if captain.user_id == actor.id => {}
        _ => return Decision::deny(DenyReason::NotCaptain),
    }
    if team.status != TeamStatus::Forming {
        return Decision::deny(DenyReason::TeamNotForming);
    }
    let Some(competition) = &ctx.competition else {
        return Decision::deny(DenyReason::IncompleteContext { what: "competition" });
    };
    if competition.kind != CompetitionKind::Regional {
        return Decision::deny(DenyReason::WrongCompetitionKind);
    }
    if !ctx.competition_regions.contains(&team.region) {
        return Decision::deny(DenyReason::RegionNotEligible);
    }
    if ctx.link.is_some() {
        return Decision::deny(DenyReason::AlreadyLinked);
    }
    let Some(admin_id) = competition.regional_admin_id else {
        return Decision::deny(DenyReason::NoModeratorAssigned);
    };

    let content = format!(
        "{} requests to join {}",
        mention("team", team.id, &team.name),
        mention("competition", competition.id, &competition.name),
    );

    Decision::allow(
        Some(StateEffect::SubmitRegional {
            team_id: team.id,
            competition_id: competition.id,
            captain_id: actor.id,
        }),
        vec![CreateNotification {
            to_user: admin_id,
            content,
            kind: NotificationKind::Moderation,
            metadata: Some(competition_join_metadata(
                team.id,
                competition.id,
                actor.id,
            )),
            action_url: Some(format!("/dashboard?competition={}", competition.id)),
            sender_id: Some(actor.id),
        }],
        None,
    )
}

fn decide_approve_regional(ctx: &EngineContext) -> Decision {
    let Some(record) = &ctx.moderation else {
        return Decision::deny(DenyReason::IncompleteContext { what: "record" });
    };
    let (team_id, competition_id) = match &ctx.action {
        Some(ModerationAction::CompetitionJoin {
            team_id,
            competition_id,
        }) => (*team_id, *competition_id),
        _ => return Decision::deny(DenyReason::ActionMismatch),
    };
    let Some(actor) = &ctx.actor else {
        return Decision::deny(DenyReason::IncompleteContext { what: "actor" });
    };
    if record.to_user != actor.id {
        return Decision::deny(DenyReason::NotRecipient);
    }
    if actor.role != UserRole::RegionalAdmin {
        return Decision::deny(DenyReason::NotRegionalAdmin);
    }

    let Some(team) = &ctx.team else {
        return Decision::deny(DenyReason::StaleTeamMissing);
    };
    let Some(competition) = &ctx.competition else {
        return Decision::deny(DenyReason::StaleCompetitionMissing);
    };
    // The record holder may have been replaced as the competition's
    // moderator while the submission sat in their queue.
    if competition.regional_admin_id != Some(actor.id) {
        return Decision::deny(DenyReason::StaleModeratorChanged);
    }
    if team.status != TeamStatus::Pending {
        return Decision::deny(DenyReason::StaleTeamState);
    }
    match &ctx.link {
        Some(link) if link.status == LinkStatus::Pending => {}
        _ => return Decision::deny(DenyReason::StaleLinkResolved),
    }
    if !ctx.competition_regions.contains(&team.region) {
        return Decision::deny(DenyReason::StaleRegionChanged);
    }

    let mut notifications = Vec::new();
    if let Some(captain) = &ctx.captain {
        notifications.push(CreateNotification {
            to_user: captain.user_id,
            content: format!(
                "{} was approved for {}",
                mention("team", team.id, &team.name),
                mention("competition", competition.id, &competition.name),
            ),
            kind: NotificationKind::Instant,
            metadata: None,
            action_url: Some(format!("/dashboard?competition={}", competition.id)),
            sender_id: Some(actor.id),
        });
    }

    Decision::allow(
        Some(StateEffect::ApproveRegional {
            team_id,
            competition_id,
        }),
        notifications,
        Some(record.id),
    )
}

fn decide_submit_federal(ctx: &EngineContext, team_ids: &[Uuid]) -> Decision {
    let Some(actor) = &ctx.actor else {
        return Decision::deny(DenyReason::IncompleteContext { what: "actor" });
    };
    if !actor.role.is_active() {
        return Decision::deny(DenyReason::ActorInactive);
    }
    if actor.role != UserRole::RegionalAdmin {
        return Decision::deny(DenyReason::NotRegionalAdmin);
    }
    let Some(competition) = &ctx.competition else {
        return Decision::deny(DenyReason::IncompleteContext { what: "competition" });
    };
    if competition.kind != CompetitionKind::Federal {
        return Decision::deny(DenyReason::WrongCompetitionKind);
    }
    if team_ids.is_empty() {
        return Decision::deny(DenyReason::EmptySubmission);
    }
    let eligible = |team: &Team| {
        matches!(
            team.status,
            TeamStatus::ApprovedRegional | TeamStatus::PendingFederal
        )
    };
    if ctx.teams.len() != team_ids.len() || !ctx.teams.iter().all(eligible) {
        return Decision::deny(DenyReason::TeamNotEligible);
    }
    if ctx.federation_admins.is_empty() {
        return Decision::deny(DenyReason::NoFederationAdmins);
    }

    // One record per federation admin, all with identical metadata, so any
    // one of them can resolve it and the siblings fall to the stale path.
    let metadata = federal_submission_metadata(competition.id, team_ids, actor.region);
    let content = format!(
        "{} submitted {} team(s) for federal review in {}",
        mention("user", actor.id, &actor.name),
        team_ids.len(),
        mention("competition", competition.id, &competition.name),
    );

    let notifications = ctx
        .federation_admins
        .iter()
        .map(|admin| CreateNotification {
            to_user: admin.id,
            content: content.clone(),
            kind: NotificationKind::Moderation,
            metadata: Some(metadata.clone()),
            action_url: Some(format!("/dashboard?competition={}", competition.id)),
            sender_id: Some(actor.id),
        })
        .collect();

    Decision::allow(
        Some(StateEffect::SubmitFederal {
            team_ids: team_ids.to_vec(),
            competition_id: competition.id,
        }),
        notifications,
        None,
    )
}

fn decide_approve_federal(ctx: &EngineContext) -> Decision {
    let Some(record) = &ctx.moderation else {
        return Decision::deny(DenyReason::IncompleteContext { what: "record" });
    };
    let (competition_id, team_ids) = match &ctx.action {
        Some(ModerationAction::FederalSubmission {
            competition_id,
            team_ids,
            ..
        }) => (*competition_id, team_ids.clone()),
        _ => return Decision::deny(DenyReason::ActionMismatch),
    };
    let Some(actor) = &ctx.actor else {
        return Decision::deny(DenyReason::IncompleteContext { what: "actor" });
    };
    if record.to_user != actor.id {
        return Decision::deny(DenyReason::NotRecipient);
    }
    if actor.role != UserRole::FederationAdmin {
        return Decision::deny(DenyReason::NotFederationAdmin);
    }

    let Some(competition) = &ctx.competition else {
        return Decision::deny(DenyReason::StaleCompetitionMissing);
    };
    if ctx.teams.len() != team_ids.len() {
        return Decision::deny(DenyReason::StaleTeamMissing);
    }
    if ctx
        .teams
        .iter()
        .any(|team| team.status != TeamStatus::PendingFederal)
    {
        return Decision::deny(DenyReason::StaleTeamState);
    }

    let mut notifications = Vec::new();
    for captain in &ctx.captains {
        let Some(team) = ctx.teams.iter().find(|t| t.id == captain.team_id) else {
            continue;
        };
        notifications.push(CreateNotification {
            to_user: captain.user_id,
            content: format!(
                "{} was approved at the federal level for {}",
                mention("team", team.id, &team.name),
                mention("competition", competition.id, &competition.name),
            ),
            kind: NotificationKind::Instant,
            metadata: None,
            action_url: Some(format!("/dashboard?competition={}", competition.id)),
            sender_id: Some(actor.id),
        });
    }
    if let Some(sender_id) = record.sender_id {
        notifications.push(CreateNotification {
            to_user: sender_id,
            content: format!(
                "Your federal submission for {} was approved",
                mention("competition", competition.id, &competition.name),
            ),
            kind: NotificationKind::Instant,
            metadata: None,
            action_url: Some(format!("/dashboard?competition={}", competition.id)),
            sender_id: Some(actor.id),
        });
    }

    Decision::allow(
        Some(StateEffect::ApproveFederal {
            competition_id,
            team_ids,
        }),
        notifications,
        Some(record.id),
    )
}

fn decide_reject_any(ctx: &EngineContext) -> Decision {
    let Some(record) = &ctx.moderation else {
        return Decision::deny(DenyReason::IncompleteContext { what: "record" });
    };
    let Some(actor) = &ctx.actor else {
        return Decision::deny(DenyReason::IncompleteContext { what: "actor" });
    };
    if record.to_user != actor.id {
        return Decision::deny(DenyReason::NotRecipient);
    }

    let action = match &ctx.action {
        Some(action) => action,
        None => return Decision::deny(DenyReason::ActionMismatch),
    };

    let mut effect = None;
    let mut notifications = Vec::new();

    match action {
        ModerationAction::TeamJoin { .. } => {
            if let Some(subject) = &ctx.subject {
                notifications.push(CreateNotification {
                    to_user: subject.id,
                    content: format!("Your request to join {} was declined", team_label(ctx)),
                    kind: NotificationKind::Instant,
                    metadata: None,
                    action_url: None,
                    sender_id: Some(actor.id),
                });
            }
        }
        ModerationAction::CompetitionJoin {
            team_id,
            competition_id,
        } => {
            // The rejection edge of the status machine. Only taken while
            // the submission is still pending on both sides; otherwise the
            // record is cleared without touching the team.
            let still_pending = ctx
                .team
                .as_ref()
                .map(|t| t.status == TeamStatus::Pending)
                .unwrap_or(false)
                && ctx
                    .link
                    .as_ref()
                    .map(|l| l.status == LinkStatus::Pending)
                    .unwrap_or(false);
            if still_pending {
                effect = Some(StateEffect::RejectRegional {
                    team_id: *team_id,
                    competition_id: *competition_id,
                });
            }
            if let Some(sender_id) = record.sender_id {
                notifications.push(CreateNotification {
                    to_user: sender_id,
                    content: format!(
                        "{} was declined for {}",
                        team_label(ctx),
                        competition_label(ctx),
                    ),
                    kind: NotificationKind::Instant,
                    metadata: None,
                    action_url: None,
                    sender_id: Some(actor.id),
                });
            }
        }
        ModerationAction::FederalSubmission { .. } => {
            // Teams stay at pending_federal; the regional admin may resubmit.
            if let Some(sender_id) = record.sender_id {
                notifications.push(CreateNotification {
                    to_user: sender_id,
                    content: format!(
                        "Your federal submission for {} was declined",
                        competition_label(ctx),
                    ),
                    kind: NotificationKind::Instant,
                    metadata: None,
                    action_url: None,
                    sender_id: Some(actor.id),
                });
            }
        }
        ModerationAction::TeamInvite { captain_id, .. } => {
            notifications.push(CreateNotification {
                to_user: *captain_id,
                content: format!(
                    "{} declined the invitation to {}",
                    mention("user", actor.id, &actor.name),
                    team_label(ctx),
                ),
                kind: NotificationKind::Instant,
                metadata: None,
                action_url: None,
                sender_id: Some(actor.id),
            });
        }
        ModerationAction::Unknown { .. } => {
            return Decision::deny(DenyReason::ActionMismatch);
        }
    }

    Decision::allow(effect, notifications, Some(record.id))
}

fn decide_invite(ctx: &EngineContext) -> Decision {
    let Some(actor) = &ctx.actor else {
        return Decision::deny(DenyReason::IncompleteContext { what: "actor" });
    };
    if !actor.role.is_active() {
        return Decision::deny(DenyReason::ActorInactive);
    }
    let Some(team) = &ctx.team else {
        return Decision::deny(DenyReason::IncompleteContext { what: "team" });
    };
    match &ctx.captain {
        Some(captain) if captain.user_id == actor.id => {}
        _ => return Decision::deny(DenyReason::NotCaptain),
    }
    if team.status != TeamStatus::Forming {
        return Decision::deny(DenyReason::TeamNotForming);
    }
    let Some(subject) = &ctx.subject else {
        return Decision::deny(DenyReason::IncompleteContext { what: "invitee" });
    };
    if !subject.role.is_active() {
        return Decision::deny(DenyReason::SubjectInactive);
    }
    if ctx.membership.is_some() {
        return Decision::deny(DenyReason::AlreadyMember);
    }
    let Some(member_count) = ctx.member_count else {
        return Decision::deny(DenyReason::IncompleteContext { what: "member count" });
    };
    if member_count >= team.max_members as i64 {
        return Decision::deny(DenyReason::RosterFull);
    }
    if subject.region != Some(team.region) {
        return Decision::deny(DenyReason::RegionMismatch);
    }
    let Some(class) = subject.class.as_deref() else {
        return Decision::deny(DenyReason::ClassNotRequired);
    };
    if !team.required_classes.iter().any(|c| c == class) {
        return Decision::deny(DenyReason::ClassNotRequired);
    }

    let content = format!(
        "{} invites you to join {}",
        mention("user", actor.id, &actor.name),
        mention("team", team.id, &team.name),
    );

    Decision::allow(
        None,
        vec![CreateNotification {
            to_user: subject.id,
            content,
            kind: NotificationKind::Invite,
            metadata: Some(team_invite_metadata(team.id, subject.id, actor.id)),
            action_url: Some(format!("/dashboard?team={}", team.id)),
            sender_id: Some(actor.id),
        }],
        None,
    )
}

fn decide_accept_invite(ctx: &EngineContext) -> Decision {
    let Some(record) = &ctx.moderation else {
        return Decision::deny(DenyReason::IncompleteContext { what: "record" });
    };
    let (team_id, captain_id) = match &ctx.action {
        Some(ModerationAction::TeamInvite {
            team_id,
            captain_id,
            ..
        }) => (*team_id, *captain_id),
        _ => return Decision::deny(DenyReason::ActionMismatch),
    };
    let Some(actor) = &ctx.actor else {
        return Decision::deny(DenyReason::IncompleteContext { what: "actor" });
    };
    if record.to_user != actor.id {
        return Decision::deny(DenyReason::NotRecipient);
    }

    let Some(team) = &ctx.team else {
        return Decision::deny(DenyReason::StaleTeamMissing);
    };
    if !actor.role.is_active() {
        return Decision::deny(DenyReason::StaleSubjectInactive);
    }
    if ctx.membership.is_some() {
        return Decision::deny(DenyReason::StaleAlreadyMember);
    }
    if team.status != TeamStatus::Forming {
        return Decision::deny(DenyReason::StaleRosterClosed);
    }
    let Some(member_count) = ctx.member_count else {
        return Decision::deny(DenyReason::IncompleteContext { what: "member count" });
    };
    if member_count >= team.max_members as i64 {
        return Decision::deny(DenyReason::StaleRosterClosed);
    }
    let Some(class) = actor.class.as_deref() else {
        return Decision::deny(DenyReason::StaleClassFilled);
    };
    if !team.required_classes.iter().any(|c| c == class) {
        return Decision::deny(DenyReason::StaleClassFilled);
    }
    if actor.region != Some(team.region) {
        return Decision::deny(DenyReason::StaleRegionChanged);
    }

    let content = format!(
        "{} accepted the invitation to {}",
        mention("user", actor.id, &actor.name),
        mention("team", team.id, &team.name),
    );

    Decision::allow(
        Some(StateEffect::AdmitMember {
            team_id,
            user_id: actor.id,
            class: class.to_string(),
        }),
        vec![CreateNotification {
            to_user: captain_id,
            content,
            kind: NotificationKind::Instant,
            metadata: None,
            action_url: Some(format!("/dashboard?team={}", team.id)),
            sender_id: Some(actor.id),
        }],
        Some(record.id),
    )
}

fn decide_decline_invite(ctx: &EngineContext) -> Decision {
    let Some(record) = &ctx.moderation else {
        return Decision::deny(DenyReason::IncompleteContext { what: "record" });
    };
    let captain_id = match &ctx.action {
        Some(ModerationAction::TeamInvite { captain_id, .. }) => *captain_id,
        _ => return Decision::deny(DenyReason::ActionMismatch),
    };
    let Some(actor) = &ctx.actor else {
        return Decision::deny(DenyReason::IncompleteContext { what: "actor" });
    };
    if record.to_user != actor.id {
        return Decision::deny(DenyReason::NotRecipient);
    }

    Decision::allow(
        None,
        vec![CreateNotification {
            to_user: captain_id,
            content: format!(
                "{} declined the invitation to {}",
                mention("user", actor.id, &actor.name),
                team_label(ctx),
            ),
            kind: NotificationKind::Instant,
            metadata: None,
            action_url: None,
            sender_id: Some(actor.id),
        }],
        Some(record.id),
    )
}

fn decide_award(
    ctx: &EngineContext,
    competition_id: Option<Uuid>,
    kind: RewardKind,
    value: &str,
) -> Decision {
    let Some(actor) = &ctx.actor else {
        return Decision::deny(DenyReason::IncompleteContext { what: "actor" });
    };
    if !actor.role.is_active() {
        return Decision::deny(DenyReason::ActorInactive);
    }
    if !actor.role.is_admin() {
        return Decision::deny(DenyReason::NotAdmin);
    }
    let Some(team) = &ctx.team else {
        return Decision::deny(DenyReason::IncompleteContext { what: "team" });
    };
    if ctx.roster.is_empty() {
        return Decision::deny(DenyReason::IncompleteContext { what: "team roster" });
    }

    let grants = ctx
        .roster
        .iter()
        .map(|member| RewardGrant {
            user_id: member.user_id,
            kind,
            value: value.to_string(),
            competition_id,
        })
        .collect();

    let content = format!(
        "You received a {} for {}: {}",
        kind.as_str(),
        mention("team", team.id, &team.name),
        value,
    );

    let notifications = ctx
        .roster
        .iter()
        .map(|member| CreateNotification {
            to_user: member.user_id,
            content: content.clone(),
            kind: NotificationKind::Instant,
            metadata: None,
            action_url: Some("/dashboard/awards".to_string()),
            sender_id: Some(actor.id),
        })
        .collect();

    Decision::allow(
        Some(StateEffect::GrantRewards {
            team_id: team.id,
            grants,
        }),
        notifications,
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use regatta_shared::models::{CompetitionStatus, TeamRole};

    fn profile(role: UserRole, class: Option<&str>, region: Option<i32>) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            name: "Dana Kim".to_string(),
            role,
            class: class.map(|c| c.to_string()),
            region,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn team(status: TeamStatus, region: i32, required: &[&str]) -> Team {
        Team {
            id: Uuid::new_v4(),
            name: "Harbor Crew".to_string(),
            region,
            status,
            max_members: 8,
            required_classes: required.iter().map(|c| c.to_string()).collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn captain_row(team_id: Uuid) -> TeamMember {
        TeamMember {
            team_id,
            user_id: Uuid::new_v4(),
            class: "helm".to_string(),
            role: TeamRole::Captain,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn test_join_allowed_creates_moderation_draft() {
        let actor = profile(UserRole::User, Some("striker"), Some(5));
        let team = team(TeamStatus::Forming, 5, &["striker"]);
        let captain = captain_row(team.id);
        let captain_id = captain.user_id;

        let ctx = EngineContext {
            actor: Some(actor.clone()),
            team: Some(team.clone()),
            captain: Some(captain),
            member_count: Some(1),
            ..Default::default()
        };

        let intent = WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: actor.id,
        };
        let decision = decide(&intent, &ctx);

        assert!(decision.allowed);
        assert!(decision.effect.is_none());
        assert!(decision.resolves.is_none());
        assert_eq!(decision.notifications.len(), 1);

        let draft = &decision.notifications[0];
        assert_eq!(draft.to_user, captain_id);
        assert_eq!(draft.kind, NotificationKind::Moderation);
        assert_eq!(draft.metadata.as_ref().unwrap()["actionType"], "team_join");
    }

    #[test]
    fn test_join_denied_on_region_mismatch() {
        let actor = profile(UserRole::User, Some("striker"), Some(6));
        let team = team(TeamStatus::Forming, 5, &["striker"]);
        let captain = captain_row(team.id);

        let ctx = EngineContext {
            actor: Some(actor.clone()),
            team: Some(team.clone()),
            captain: Some(captain),
            member_count: Some(1),
            ..Default::default()
        };

        let intent = WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: actor.id,
        };
        let decision = decide(&intent, &ctx);

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenyReason::RegionMismatch));
        assert_eq!(decision.reason.unwrap().code(), "region_mismatch");
        assert!(decision.notifications.is_empty());
    }

    #[test]
    fn test_join_denied_when_class_not_required() {
        let actor = profile(UserRole::User, Some("navigator"), Some(5));
        let team = team(TeamStatus::Forming, 5, &["striker"]);
        let captain = captain_row(team.id);

        let ctx = EngineContext {
            actor: Some(actor.clone()),
            team: Some(team.clone()),
            captain: Some(captain),
            member_count: Some(1),
            ..Default::default()
        };

        let intent = WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: actor.id,
        };
        let decision = decide(&intent, &ctx);

        assert_eq!(decision.reason, Some(DenyReason::ClassNotRequired));
    }

    #[test]
    fn test_approve_denies_on_action_mismatch() {
        let approver = profile(UserRole::User, None, Some(5));
        let record = Notification {
            id: Uuid::new_v4(),
            to_user: approver.id,
            content: "pending".to_string(),
            kind: NotificationKind::Moderation,
            is_read: false,
            metadata: None,
            action_url: None,
            sender_id: None,
            created_at: Utc::now(),
        };

        let ctx = EngineContext {
            actor: Some(approver.clone()),
            moderation: Some(record.clone()),
            action: Some(ModerationAction::CompetitionJoin {
                team_id: Uuid::new_v4(),
                competition_id: Uuid::new_v4(),
            }),
            ..Default::default()
        };

        let intent = WorkflowIntent::ApproveTeamJoin {
            notification_id: record.id,
            approver_id: approver.id,
        };
        let decision = decide(&intent, &ctx);

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenyReason::ActionMismatch));
        assert!(!decision.reason.unwrap().is_stale());
    }

    #[test]
    fn test_stale_reasons_are_flagged() {
        assert!(DenyReason::StaleClassFilled.is_stale());
        assert!(DenyReason::StaleRosterClosed.is_stale());
        assert!(DenyReason::StaleModeratorChanged.is_stale());
        assert!(DenyReason::WriteConflict { what: "roster" }.is_stale());
        assert!(!DenyReason::RegionMismatch.is_stale());
        assert!(!DenyReason::NotRecipient.is_stale());
    }

    #[test]
    fn test_federal_fanout_is_identical_per_admin() {
        let admin = profile(UserRole::RegionalAdmin, None, Some(5));
        let fed_a = profile(UserRole::FederationAdmin, None, None);
        let fed_b = profile(UserRole::FederationAdmin, None, None);
        let team_a = team(TeamStatus::ApprovedRegional, 5, &[]);
        let team_b = team(TeamStatus::PendingFederal, 5, &[]);
        let competition = Competition {
            id: Uuid::new_v4(),
            name: "National Cup".to_string(),
            kind: CompetitionKind::Federal,
            status: CompetitionStatus::Upcoming,
            max_team_members: 8,
            regional_admin_id: None,
            federal_admin_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let team_ids = vec![team_a.id, team_b.id];
        let ctx = EngineContext {
            actor: Some(admin.clone()),
            competition: Some(competition.clone()),
            teams: vec![team_a, team_b],
            federation_admins: vec![fed_a.clone(), fed_b.clone()],
            ..Default::default()
        };

        let intent = WorkflowIntent::SubmitTeamsToFederal {
            team_ids: team_ids.clone(),
            competition_id: competition.id,
            submitter_id: admin.id,
        };
        let decision = decide(&intent, &ctx);

        assert!(decision.allowed);
        assert_eq!(decision.notifications.len(), 2);
        assert_eq!(decision.notifications[0].to_user, fed_a.id);
        assert_eq!(decision.notifications[1].to_user, fed_b.id);
        assert_eq!(
            decision.notifications[0].metadata,
            decision.notifications[1].metadata,
        );
        assert_eq!(
            decision.notifications[0].content,
            decision.notifications[1].content,
        );
    }
}
