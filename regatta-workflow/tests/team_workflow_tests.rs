/// Integration tests for team-scoped workflows
///
/// These tests drive the full orchestrator pipeline (context loading,
/// decision, record claiming, state effects, notification delivery)
/// against the in-memory store and channel doubles. No external services
/// are required.
use std::sync::Arc;

use chrono::Utc;
use regatta_shared::mentions::first_mention;
use regatta_shared::models::{
    CreateNotification, NotificationKind, Profile, RewardKind, Team, TeamMember, TeamRole,
    TeamStatus, UserRole,
};
use regatta_workflow::intent::competition_join_metadata;
use regatta_workflow::{
    Effect, EntityStore, InboxCache, MemoryChannel, MemoryStore, NotificationChannel,
    OrchestratorConfig, WorkflowError, WorkflowIntent, WorkflowOrchestrator,
};
use uuid::Uuid;

fn make_profile(name: &str, role: UserRole, class: Option<&str>, region: Option<i32>) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        name: name.to_string(),
        role,
        class: class.map(String::from),
        region,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn make_team(name: &str, region: i32, required: &[&str], max_members: i32) -> Team {
    Team {
        id: Uuid::new_v4(),
        name: name.to_string(),
        region,
        status: TeamStatus::Forming,
        max_members,
        required_classes: required.iter().map(|c| c.to_string()).collect(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn make_member(team_id: Uuid, user_id: Uuid, class: &str, role: TeamRole) -> TeamMember {
    TeamMember {
        team_id,
        user_id,
        class: class.to_string(),
        role,
        joined_at: Utc::now(),
    }
}

fn harness() -> (Arc<MemoryStore>, Arc<MemoryChannel>, WorkflowOrchestrator) {
    let store = Arc::new(MemoryStore::new());
    let channel = Arc::new(MemoryChannel::new());
    let orchestrator = WorkflowOrchestrator::new(store.clone(), channel.clone());
    (store, channel, orchestrator)
}

/// Seeds a captain profile, their forming team and the captain roster row
async fn seed_team(
    store: &MemoryStore,
    region: i32,
    required: &[&str],
    max_members: i32,
) -> (Profile, Team) {
    let captain = make_profile("Robin Vega", UserRole::User, Some("helm"), Some(region));
    let team = make_team("Harbor Crew", region, required, max_members);
    store.insert_profile(captain.clone()).await;
    store.insert_team(team.clone()).await;
    store
        .insert_member(make_member(team.id, captain.id, "helm", TeamRole::Captain))
        .await;
    (captain, team)
}

fn deny_code(error: WorkflowError) -> &'static str {
    match error {
        WorkflowError::ValidationFailed { reason } => reason.code(),
        other => panic!("Expected ValidationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_join_request_creates_moderation_record() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    let effect = orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect("Join request failed");

    match effect {
        Effect::Requested { notification_ids } => assert_eq!(notification_ids.len(), 1),
        other => panic!("Expected Requested, got {:?}", other),
    }

    let inbox = channel.inbox(captain.id).await.expect("Inbox read failed");
    assert_eq!(inbox.len(), 1);

    let record = &inbox[0];
    assert_eq!(record.kind, NotificationKind::Moderation);
    assert_eq!(record.sender_id, Some(striker.id));

    let metadata = record.metadata.as_ref().expect("Record without metadata");
    assert_eq!(metadata["actionType"], "team_join");
    assert_eq!(metadata["entityId"], striker.id.to_string());
    assert_eq!(metadata["teamId"], team.id.to_string());

    assert_eq!(
        record.action_url.as_deref(),
        Some(format!("/dashboard?team={}", team.id).as_str()),
    );

    // Content carries a parseable mention of the requester
    let mention = first_mention(&record.content).expect("Content without mention");
    assert_eq!(mention.entity_type, "user");
    assert_eq!(mention.entity_id, striker.id);
}

#[tokio::test]
async fn test_join_denied_when_region_differs() {
    let (store, channel, orchestrator) = harness();
    let (_captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let outsider = make_profile("Sam Ono", UserRole::User, Some("striker"), Some(6));
    store.insert_profile(outsider.clone()).await;

    let error = orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: outsider.id,
        })
        .await
        .expect_err("Join should have been denied");

    assert_eq!(deny_code(error), "region_mismatch");

    // A denied request leaves no notifications behind, for anyone
    assert!(channel.all().await.is_empty());
}

#[tokio::test]
async fn test_join_denied_when_class_not_required() {
    let (store, _channel, orchestrator) = harness();
    let (_captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let navigator = make_profile("Lee Moss", UserRole::User, Some("navigator"), Some(5));
    store.insert_profile(navigator.clone()).await;

    let error = orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: navigator.id,
        })
        .await
        .expect_err("Join should have been denied");

    assert_eq!(deny_code(error), "class_not_required");
}

#[tokio::test]
async fn test_join_denied_when_already_member() {
    let (store, _channel, orchestrator) = harness();
    let (_captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;
    store
        .insert_member(make_member(team.id, striker.id, "striker", TeamRole::Member))
        .await;

    let error = orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect_err("Join should have been denied");

    assert_eq!(deny_code(error), "already_member");
}

#[tokio::test]
async fn test_join_denied_when_team_not_forming() {
    let (store, _channel, orchestrator) = harness();
    let (_captain, mut team) = seed_team(&store, 5, &["striker"], 8).await;
    team.status = TeamStatus::Pending;
    store.insert_team(team.clone()).await;

    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    let error = orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect_err("Join should have been denied");

    assert_eq!(deny_code(error), "team_not_forming");
}

#[tokio::test]
async fn test_join_denied_when_roster_full() {
    let (store, _channel, orchestrator) = harness();
    let (_captain, team) = seed_team(&store, 5, &["striker"], 2).await;
    let filler = make_profile("Ada Brook", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(filler.clone()).await;
    store
        .insert_member(make_member(team.id, filler.id, "striker", TeamRole::Member))
        .await;

    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    let error = orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect_err("Join should have been denied");

    assert_eq!(deny_code(error), "roster_full");
}

#[tokio::test]
async fn test_join_denied_for_banned_actor() {
    let (store, _channel, orchestrator) = harness();
    let (_captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let banned = make_profile("Kit Doyle", UserRole::Banned, Some("striker"), Some(5));
    store.insert_profile(banned.clone()).await;

    let error = orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: banned.id,
        })
        .await
        .expect_err("Join should have been denied");

    assert_eq!(deny_code(error), "actor_inactive");
}

#[tokio::test]
async fn test_approve_join_admits_member_and_claims_record() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect("Join request failed");

    let record_id = channel.inbox(captain.id).await.expect("Inbox read failed")[0].id;

    let effect = orchestrator
        .execute(WorkflowIntent::ApproveTeamJoin {
            notification_id: record_id,
            approver_id: captain.id,
        })
        .await
        .expect("Approve failed");

    assert_eq!(
        effect,
        Effect::MemberAdmitted {
            team_id: team.id,
            user_id: striker.id,
        }
    );

    // Roster row exists and the class slot was consumed
    let membership = store
        .get_team_member(team.id, striker.id)
        .await
        .expect("Store read failed");
    assert!(membership.is_some());
    let team_after = store.team(team.id).await.expect("Team vanished");
    assert!(team_after.required_classes.is_empty());

    // The record is claimed and the requester was told
    assert!(channel.get(record_id).await.expect("Get failed").is_none());
    let striker_inbox = channel.inbox(striker.id).await.expect("Inbox read failed");
    assert_eq!(striker_inbox.len(), 1);
    assert_eq!(striker_inbox[0].kind, NotificationKind::Instant);
    assert!(striker_inbox[0].content.contains("You joined"));
}

#[tokio::test]
async fn test_double_approve_returns_not_found() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect("Join request failed");
    let record_id = channel.inbox(captain.id).await.expect("Inbox read failed")[0].id;

    orchestrator
        .execute(WorkflowIntent::ApproveTeamJoin {
            notification_id: record_id,
            approver_id: captain.id,
        })
        .await
        .expect("First approve failed");

    let error = orchestrator
        .execute(WorkflowIntent::ApproveTeamJoin {
            notification_id: record_id,
            approver_id: captain.id,
        })
        .await
        .expect_err("Second approve should have failed");

    assert!(matches!(
        error,
        WorkflowError::NotFound {
            what: "notification",
            ..
        }
    ));

    // The replay admitted nothing further
    let members = store
        .list_team_members(team.id)
        .await
        .expect("Store read failed");
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn test_approve_stale_class_slot_claims_and_notifies() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect("Join request failed");
    let record_id = channel.inbox(captain.id).await.expect("Inbox read failed")[0].id;

    // The slot fills while the record sits in the captain's queue
    store
        .insert_team(Team {
            required_classes: Vec::new(),
            ..team.clone()
        })
        .await;

    let error = orchestrator
        .execute(WorkflowIntent::ApproveTeamJoin {
            notification_id: record_id,
            approver_id: captain.id,
        })
        .await
        .expect_err("Approve should have gone stale");

    match error {
        WorkflowError::StaleState { reason } => {
            assert_eq!(reason.code(), "stale_class_filled")
        }
        other => panic!("Expected StaleState, got {:?}", other),
    }

    // No roster row, the record is claimed, and the requester was told why
    assert!(store
        .get_team_member(team.id, striker.id)
        .await
        .expect("Store read failed")
        .is_none());
    assert!(channel.get(record_id).await.expect("Get failed").is_none());

    let striker_inbox = channel.inbox(striker.id).await.expect("Inbox read failed");
    assert_eq!(striker_inbox.len(), 1);
    assert!(striker_inbox[0]
        .content
        .contains("Request could not be completed"));
}

#[tokio::test]
async fn test_approve_after_captain_change_goes_stale() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect("Join request failed");
    let record_id = channel.inbox(captain.id).await.expect("Inbox read failed")[0].id;

    // Captaincy moves to someone else before the request is resolved
    let successor = make_profile("Sam Okafor", UserRole::User, Some("helm"), Some(5));
    store.insert_profile(successor.clone()).await;
    store.remove_member(team.id, captain.id).await;
    store
        .insert_member(make_member(team.id, successor.id, "helm", TeamRole::Captain))
        .await;

    let error = orchestrator
        .execute(WorkflowIntent::ApproveTeamJoin {
            notification_id: record_id,
            approver_id: captain.id,
        })
        .await
        .expect_err("Approve by the former captain should have gone stale");
    match error {
        WorkflowError::StaleState { reason } => {
            assert_eq!(reason.code(), "stale_moderator_changed")
        }
        other => panic!("Expected StaleState, got {:?}", other),
    }

    // The outdated record is claimed and nobody was admitted
    assert!(channel.get(record_id).await.expect("Get failed").is_none());
    assert!(store
        .get_team_member(team.id, striker.id)
        .await
        .expect("Store read failed")
        .is_none());
}

#[tokio::test]
async fn test_approve_by_non_recipient_leaves_record() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect("Join request failed");
    let record_id = channel.inbox(captain.id).await.expect("Inbox read failed")[0].id;

    let error = orchestrator
        .execute(WorkflowIntent::ApproveTeamJoin {
            notification_id: record_id,
            approver_id: striker.id,
        })
        .await
        .expect_err("Non-recipient approve should have been denied");

    assert_eq!(deny_code(error), "not_recipient");

    // The plain denial leaves the record for its rightful recipient
    assert!(channel.get(record_id).await.expect("Get failed").is_some());
}

#[tokio::test]
async fn test_approve_with_mismatched_action_leaves_record() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker"], 8).await;

    // A competition_join record cannot satisfy a team-join approval
    let record = channel
        .publish(CreateNotification {
            to_user: captain.id,
            content: "pending submission".to_string(),
            kind: NotificationKind::Moderation,
            metadata: Some(competition_join_metadata(
                team.id,
                Uuid::new_v4(),
                captain.id,
            )),
            action_url: None,
            sender_id: Some(captain.id),
        })
        .await
        .expect("Publish failed");

    let error = orchestrator
        .execute(WorkflowIntent::ApproveTeamJoin {
            notification_id: record.id,
            approver_id: captain.id,
        })
        .await
        .expect_err("Mismatched approve should have been denied");

    assert_eq!(deny_code(error), "action_mismatch");
    assert!(channel.get(record.id).await.expect("Get failed").is_some());
}

#[tokio::test]
async fn test_multiset_class_slots_admit_two_strikers() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker", "striker"], 8).await;

    for name in ["Dana Kim", "Sam Ono"] {
        let striker = make_profile(name, UserRole::User, Some("striker"), Some(5));
        store.insert_profile(striker.clone()).await;

        orchestrator
            .execute(WorkflowIntent::JoinTeam {
                team_id: team.id,
                user_id: striker.id,
            })
            .await
            .expect("Join request failed");
        let record_id = channel.inbox(captain.id).await.expect("Inbox read failed")[0].id;

        orchestrator
            .execute(WorkflowIntent::ApproveTeamJoin {
                notification_id: record_id,
                approver_id: captain.id,
            })
            .await
            .expect("Approve failed");
    }

    let team_after = store.team(team.id).await.expect("Team vanished");
    assert!(team_after.required_classes.is_empty());
    let members = store
        .list_team_members(team.id)
        .await
        .expect("Store read failed");
    assert_eq!(members.len(), 3);

    // Both slots are spent; a third striker has nothing to fill
    let third = make_profile("Kit Doyle", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(third.clone()).await;
    let error = orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: third.id,
        })
        .await
        .expect_err("Third join should have been denied");
    assert_eq!(deny_code(error), "class_not_required");
}

#[tokio::test]
async fn test_reject_join_resolves_without_admitting() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect("Join request failed");
    let record_id = channel.inbox(captain.id).await.expect("Inbox read failed")[0].id;

    let effect = orchestrator
        .execute(WorkflowIntent::RejectTeamJoin {
            notification_id: record_id,
            approver_id: captain.id,
        })
        .await
        .expect("Reject failed");

    assert_eq!(
        effect,
        Effect::Rejected {
            notification_id: record_id,
        }
    );

    assert!(store
        .get_team_member(team.id, striker.id)
        .await
        .expect("Store read failed")
        .is_none());
    assert!(channel.get(record_id).await.expect("Get failed").is_none());

    let striker_inbox = channel.inbox(striker.id).await.expect("Inbox read failed");
    assert_eq!(striker_inbox.len(), 1);
    assert!(striker_inbox[0].content.contains("declined"));

    // The class slot was never consumed
    let team_after = store.team(team.id).await.expect("Team vanished");
    assert_eq!(team_after.required_classes, vec!["striker"]);
}

#[tokio::test]
async fn test_invite_accept_flow() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    let effect = orchestrator
        .execute(WorkflowIntent::InviteToTeam {
            team_id: team.id,
            user_id: striker.id,
            captain_id: captain.id,
        })
        .await
        .expect("Invite failed");
    assert!(matches!(effect, Effect::Requested { .. }));

    let striker_inbox = channel.inbox(striker.id).await.expect("Inbox read failed");
    assert_eq!(striker_inbox.len(), 1);
    let invite = &striker_inbox[0];
    assert_eq!(invite.kind, NotificationKind::Invite);
    assert_eq!(
        invite.metadata.as_ref().expect("Invite without metadata")["actionType"],
        "team_invite",
    );

    let effect = orchestrator
        .execute(WorkflowIntent::AcceptTeamInvite {
            notification_id: invite.id,
            user_id: striker.id,
        })
        .await
        .expect("Accept failed");
    assert_eq!(
        effect,
        Effect::MemberAdmitted {
            team_id: team.id,
            user_id: striker.id,
        }
    );

    let team_after = store.team(team.id).await.expect("Team vanished");
    assert!(team_after.required_classes.is_empty());
    assert!(channel.get(invite.id).await.expect("Get failed").is_none());

    let captain_inbox = channel.inbox(captain.id).await.expect("Inbox read failed");
    assert!(captain_inbox
        .iter()
        .any(|n| n.content.contains("accepted the invitation")));
}

#[tokio::test]
async fn test_invite_decline_flow() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    orchestrator
        .execute(WorkflowIntent::InviteToTeam {
            team_id: team.id,
            user_id: striker.id,
            captain_id: captain.id,
        })
        .await
        .expect("Invite failed");
    let invite_id = channel.inbox(striker.id).await.expect("Inbox read failed")[0].id;

    let effect = orchestrator
        .execute(WorkflowIntent::DeclineTeamInvite {
            notification_id: invite_id,
            user_id: striker.id,
        })
        .await
        .expect("Decline failed");
    assert_eq!(
        effect,
        Effect::Rejected {
            notification_id: invite_id,
        }
    );

    assert!(store
        .get_team_member(team.id, striker.id)
        .await
        .expect("Store read failed")
        .is_none());

    let captain_inbox = channel.inbox(captain.id).await.expect("Inbox read failed");
    assert!(captain_inbox
        .iter()
        .any(|n| n.content.contains("declined the invitation")));
}

#[tokio::test]
async fn test_invite_requires_captain() {
    let (store, _channel, orchestrator) = harness();
    let (_captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    let outsider = make_profile("Sam Ono", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;
    store.insert_profile(outsider.clone()).await;

    let error = orchestrator
        .execute(WorkflowIntent::InviteToTeam {
            team_id: team.id,
            user_id: outsider.id,
            captain_id: striker.id,
        })
        .await
        .expect_err("Non-captain invite should have been denied");

    assert_eq!(deny_code(error), "not_captain");
}

#[tokio::test]
async fn test_award_fanout_grants_whole_roster() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &[], 8).await;
    let mut roster_ids = vec![captain.id];
    for name in ["Dana Kim", "Sam Ono"] {
        let member = make_profile(name, UserRole::User, Some("striker"), Some(5));
        store.insert_profile(member.clone()).await;
        store
            .insert_member(make_member(team.id, member.id, "striker", TeamRole::Member))
            .await;
        roster_ids.push(member.id);
    }

    let admin = make_profile("Pat Iyer", UserRole::RegionalAdmin, None, Some(5));
    store.insert_profile(admin.clone()).await;

    let effect = orchestrator
        .execute(WorkflowIntent::DistributeAward {
            team_id: team.id,
            competition_id: None,
            kind: RewardKind::Medal,
            value: "Gold medal, regional finals".to_string(),
            actor_id: admin.id,
        })
        .await
        .expect("Award distribution failed");

    assert_eq!(
        effect,
        Effect::AwardsDistributed {
            team_id: team.id,
            recipients: 3,
        }
    );

    let rewards = store.rewards().await;
    assert_eq!(rewards.len(), 3);
    for user_id in &roster_ids {
        assert!(rewards.iter().any(|r| r.user_id == *user_id));
        let inbox = channel.inbox(*user_id).await.expect("Inbox read failed");
        assert!(inbox
            .iter()
            .any(|n| n.content.contains("Gold medal, regional finals")));
    }
}

#[tokio::test]
async fn test_award_requires_admin() {
    let (store, _channel, orchestrator) = harness();
    let (_captain, team) = seed_team(&store, 5, &[], 8).await;
    let user = make_profile("Dana Kim", UserRole::User, None, Some(5));
    store.insert_profile(user.clone()).await;

    let error = orchestrator
        .execute(WorkflowIntent::DistributeAward {
            team_id: team.id,
            competition_id: None,
            kind: RewardKind::Certificate,
            value: "Participation".to_string(),
            actor_id: user.id,
        })
        .await
        .expect_err("Non-admin award should have been denied");

    assert_eq!(deny_code(error), "not_admin");
}

#[tokio::test]
async fn test_subscription_sees_insert_and_delete() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    let mut subscription = channel.subscribe(captain.id).await.expect("Subscribe failed");

    orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect("Join request failed");

    let event = subscription.recv().await.expect("Subscription closed");
    assert_eq!(
        event.kind,
        regatta_shared::events::NotificationEventKind::Inserted
    );
    let record_id = event.notification.id;

    orchestrator
        .execute(WorkflowIntent::ApproveTeamJoin {
            notification_id: record_id,
            approver_id: captain.id,
        })
        .await
        .expect("Approve failed");

    let event = subscription.recv().await.expect("Subscription closed");
    assert_eq!(
        event.kind,
        regatta_shared::events::NotificationEventKind::Deleted
    );
    assert_eq!(event.notification.id, record_id);
}

#[tokio::test]
async fn test_inbox_cache_converges_with_live_events() {
    let (store, channel, orchestrator) = harness();
    let (captain, team) = seed_team(&store, 5, &["striker", "striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    let mut subscription = channel.subscribe(captain.id).await.expect("Subscribe failed");
    let mut cache = InboxCache::new();
    cache.reconcile(channel.inbox(captain.id).await.expect("Inbox read failed"));
    assert!(cache.is_empty());

    orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect("Join request failed");

    let event = subscription.recv().await.expect("Subscription closed");
    cache.apply(&event);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.unread_count(), 1);

    let record_id = event.notification.id;
    orchestrator
        .execute(WorkflowIntent::ApproveTeamJoin {
            notification_id: record_id,
            approver_id: captain.id,
        })
        .await
        .expect("Approve failed");

    let event = subscription.recv().await.expect("Subscription closed");
    cache.apply(&event);

    // Cache state matches a fresh reconciliation read
    let fresh = channel.inbox(captain.id).await.expect("Inbox read failed");
    assert_eq!(cache.len(), fresh.len());
}

#[tokio::test]
async fn test_partial_delivery_failure_and_republish() {
    let store = Arc::new(MemoryStore::new());
    let channel = Arc::new(MemoryChannel::new());
    let orchestrator = WorkflowOrchestrator::with_config(
        store.clone(),
        channel.clone(),
        OrchestratorConfig {
            max_publish_attempts: 2,
            base_retry_delay_ms: 1,
            max_retry_delay_ms: 1,
        },
    );

    let (captain, team) = seed_team(&store, 5, &["striker"], 8).await;
    let striker = make_profile("Dana Kim", UserRole::User, Some("striker"), Some(5));
    store.insert_profile(striker.clone()).await;

    orchestrator
        .execute(WorkflowIntent::JoinTeam {
            team_id: team.id,
            user_id: striker.id,
        })
        .await
        .expect("Join request failed");
    let record_id = channel.inbox(captain.id).await.expect("Inbox read failed")[0].id;

    // The admission notice to the striker will not land
    channel.fail_publishes_to(striker.id).await;

    let error = orchestrator
        .execute(WorkflowIntent::ApproveTeamJoin {
            notification_id: record_id,
            approver_id: captain.id,
        })
        .await
        .expect_err("Approve should have reported partial failure");

    let failed = match error {
        WorkflowError::PartialNotificationFailure { delivered, failed } => {
            assert!(delivered.is_empty());
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].draft.to_user, striker.id);
            failed
        }
        other => panic!("Expected PartialNotificationFailure, got {:?}", other),
    };

    // The state effect landed despite the delivery failure
    assert!(store
        .get_team_member(team.id, striker.id)
        .await
        .expect("Store read failed")
        .is_some());
    assert!(channel.get(record_id).await.expect("Get failed").is_none());

    // Recovery re-publishes the failed drafts only; the intent never re-runs
    channel.clear_failures().await;
    let delivered = orchestrator
        .republish(&failed)
        .await
        .expect("Republish failed");
    assert_eq!(delivered.len(), 1);

    let striker_inbox = channel.inbox(striker.id).await.expect("Inbox read failed");
    assert_eq!(striker_inbox.len(), 1);
    let members = store
        .list_team_members(team.id)
        .await
        .expect("Store read failed");
    assert_eq!(members.len(), 2);
}
