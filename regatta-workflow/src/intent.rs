//! Workflow intents and moderation record metadata
//!
//! Intents are the commands a client may issue against the workflow core.
//! Request intents open a moderation record; resolution intents act on an
//! existing record identified by its notification id.
//!
//! # Metadata
//!
//! Moderation records carry their pending action in the notification's
//! `metadata` JSON, keyed in camelCase for wire compatibility:
//!
//! ```json
//! {
//!   "actionType": "team_join",
//!   "entityType": "user",
//!   "entityId": "6c0f...",
//!   "teamId": "a41b..."
//! }
//! ```
//!
//! The metadata is decoded exactly once per resolution, at the orchestrator
//! boundary. A record whose `actionType` is not recognized decodes to
//! [`ModerationAction::Unknown`] and is resolved as a rejection.

use regatta_shared::models::RewardKind;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

/// A command against the workflow core
///
/// Serialized with an `intent` tag so clients can post these as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum WorkflowIntent {
    /// A user asks to join a team; opens a moderation record for the captain
    JoinTeam { team_id: Uuid, user_id: Uuid },

    /// The captain admits the requesting user
    ApproveTeamJoin {
        notification_id: Uuid,
        approver_id: Uuid,
    },

    /// The captain declines the requesting user
    RejectTeamJoin {
        notification_id: Uuid,
        approver_id: Uuid,
    },

    /// The captain submits a forming team to a regional competition
    SubmitTeamToRegional {
        team_id: Uuid,
        competition_id: Uuid,
        captain_id: Uuid,
    },

    /// The regional admin accepts a team into their competition
    ApproveCompetitionJoin {
        notification_id: Uuid,
        approver_id: Uuid,
    },

    /// A regional admin forwards approved teams for federal review
    SubmitTeamsToFederal {
        team_ids: Vec<Uuid>,
        competition_id: Uuid,
        submitter_id: Uuid,
    },

    /// A federation admin accepts a federal submission
    ApproveFederalSubmission {
        notification_id: Uuid,
        approver_id: Uuid,
    },

    /// The record's recipient declines it, whatever its kind
    RejectAny {
        notification_id: Uuid,
        actor_id: Uuid,
    },

    /// The captain invites a user onto their team
    InviteToTeam {
        team_id: Uuid,
        user_id: Uuid,
        captain_id: Uuid,
    },

    /// The invited user accepts and takes a roster slot
    AcceptTeamInvite {
        notification_id: Uuid,
        user_id: Uuid,
    },

    /// The invited user declines
    DeclineTeamInvite {
        notification_id: Uuid,
        user_id: Uuid,
    },

    /// An admin grants a reward to every member of a team
    DistributeAward {
        team_id: Uuid,
        competition_id: Option<Uuid>,
        kind: RewardKind,
        value: String,
        actor_id: Uuid,
    },
}

impl WorkflowIntent {
    /// Returns the intent name used in logs and traces
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowIntent::JoinTeam { .. } => "join_team",
            WorkflowIntent::ApproveTeamJoin { .. } => "approve_team_join",
            WorkflowIntent::RejectTeamJoin { .. } => "reject_team_join",
            WorkflowIntent::SubmitTeamToRegional { .. } => "submit_team_to_regional",
            WorkflowIntent::ApproveCompetitionJoin { .. } => "approve_competition_join",
            WorkflowIntent::SubmitTeamsToFederal { .. } => "submit_teams_to_federal",
            WorkflowIntent::ApproveFederalSubmission { .. } => "approve_federal_submission",
            WorkflowIntent::RejectAny { .. } => "reject_any",
            WorkflowIntent::InviteToTeam { .. } => "invite_to_team",
            WorkflowIntent::AcceptTeamInvite { .. } => "accept_team_invite",
            WorkflowIntent::DeclineTeamInvite { .. } => "decline_team_invite",
            WorkflowIntent::DistributeAward { .. } => "distribute_award",
        }
    }

    /// Returns the moderation record id for resolution intents
    pub fn notification_id(&self) -> Option<Uuid> {
        match self {
            WorkflowIntent::ApproveTeamJoin {
                notification_id, ..
            }
            | WorkflowIntent::RejectTeamJoin {
                notification_id, ..
            }
            | WorkflowIntent::ApproveCompetitionJoin {
                notification_id, ..
            }
            | WorkflowIntent::ApproveFederalSubmission {
                notification_id, ..
            }
            | WorkflowIntent::RejectAny {
                notification_id, ..
            }
            | WorkflowIntent::AcceptTeamInvite {
                notification_id, ..
            }
            | WorkflowIntent::DeclineTeamInvite {
                notification_id, ..
            } => Some(*notification_id),
            _ => None,
        }
    }
}

/// The pending action carried by a moderation record
///
/// Decoded from notification metadata at the orchestrator boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationAction {
    /// A user asked to join a team
    TeamJoin { team_id: Uuid, user_id: Uuid },

    /// A team asked to join a regional competition
    CompetitionJoin {
        team_id: Uuid,
        competition_id: Uuid,
    },

    /// A regional admin forwarded teams for federal review
    ///
    /// Written with `actionType: "regional_submission"`; the older
    /// `"federal_approval"` spelling is accepted on decode.
    FederalSubmission {
        competition_id: Uuid,
        team_ids: Vec<Uuid>,
        region: Option<i32>,
    },

    /// A captain invited a user onto their team
    TeamInvite {
        team_id: Uuid,
        user_id: Uuid,
        captain_id: Uuid,
    },

    /// The record cannot be executed by this version of the workflow
    Unknown { action_type: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamJoinFields {
    entity_type: String,
    entity_id: Uuid,
    team_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompetitionJoinFields {
    team_id: Uuid,
    competition_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FederalSubmissionFields {
    competition_id: Uuid,
    team_ids: Vec<Uuid>,
    region: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamInviteFields {
    team_id: Uuid,
    entity_id: Uuid,
    captain_id: Uuid,
}

impl ModerationAction {
    /// Decodes a record's pending action from its metadata
    ///
    /// Returns [`ModerationAction::Unknown`] when the metadata is absent,
    /// the `actionType` is not recognized, or the fields for a recognized
    /// type do not parse. Unknown actions cannot be approved; the
    /// orchestrator resolves such records as rejections.
    pub fn from_metadata(metadata: Option<&JsonValue>) -> Self {
        let Some(metadata) = metadata else {
            return ModerationAction::Unknown {
                action_type: "none".to_string(),
            };
        };

        let action_type = metadata
            .get("actionType")
            .and_then(|v| v.as_str())
            .unwrap_or("none")
            .to_string();

        match action_type.as_str() {
            "team_join" => {
                match serde_json::from_value::<TeamJoinFields>(metadata.clone()) {
                    Ok(fields) if fields.entity_type == "user" => ModerationAction::TeamJoin {
                        team_id: fields.team_id,
                        user_id: fields.entity_id,
                    },
                    _ => ModerationAction::Unknown { action_type },
                }
            }
            "competition_join" => {
                match serde_json::from_value::<CompetitionJoinFields>(metadata.clone()) {
                    Ok(fields) => ModerationAction::CompetitionJoin {
                        team_id: fields.team_id,
                        competition_id: fields.competition_id,
                    },
                    Err(_) => ModerationAction::Unknown { action_type },
                }
            }
            // "federal_approval" is the legacy spelling of the same record
            "regional_submission" | "federal_approval" => {
                match serde_json::from_value::<FederalSubmissionFields>(metadata.clone()) {
                    Ok(fields) => ModerationAction::FederalSubmission {
                        competition_id: fields.competition_id,
                        team_ids: fields.team_ids,
                        region: fields.region,
                    },
                    Err(_) => ModerationAction::Unknown { action_type },
                }
            }
            "team_invite" => {
                match serde_json::from_value::<TeamInviteFields>(metadata.clone()) {
                    Ok(fields) => ModerationAction::TeamInvite {
                        team_id: fields.team_id,
                        user_id: fields.entity_id,
                        captain_id: fields.captain_id,
                    },
                    Err(_) => ModerationAction::Unknown { action_type },
                }
            }
            _ => ModerationAction::Unknown { action_type },
        }
    }

    /// Returns the wire `actionType` this action was decoded from
    pub fn action_type(&self) -> &str {
        match self {
            ModerationAction::TeamJoin { .. } => "team_join",
            ModerationAction::CompetitionJoin { .. } => "competition_join",
            ModerationAction::FederalSubmission { .. } => "regional_submission",
            ModerationAction::TeamInvite { .. } => "team_invite",
            ModerationAction::Unknown { action_type } => action_type,
        }
    }
}

/// Builds metadata for a team join moderation record
pub fn team_join_metadata(team_id: Uuid, user_id: Uuid) -> JsonValue {
    json!({
        "actionType": "team_join",
        "entityType": "user",
        "entityId": user_id,
        "teamId": team_id,
    })
}

/// Builds metadata for a competition join moderation record
///
/// `captainId` rides along for display purposes; the decoder only
/// requires `teamId` and `competitionId`.
pub fn competition_join_metadata(
    team_id: Uuid,
    competition_id: Uuid,
    captain_id: Uuid,
) -> JsonValue {
    json!({
        "actionType": "competition_join",
        "teamId": team_id,
        "competitionId": competition_id,
        "captainId": captain_id,
    })
}

/// Builds metadata for a federal submission moderation record
pub fn federal_submission_metadata(
    competition_id: Uuid,
    team_ids: &[Uuid],
    region: Option<i32>,
) -> JsonValue {
    json!({
        "actionType": "regional_submission",
        "competitionId": competition_id,
        "teamIds": team_ids,
        "region": region,
    })
}

/// Builds metadata for a team invite record
pub fn team_invite_metadata(team_id: Uuid, user_id: Uuid, captain_id: Uuid) -> JsonValue {
    json!({
        "actionType": "team_invite",
        "entityType": "user",
        "entityId": user_id,
        "teamId": team_id,
        "captainId": captain_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_serde_tag() {
        let intent = WorkflowIntent::JoinTeam {
            team_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };

        let json = serde_json::to_string(&intent).unwrap();
        assert!(json.contains("\"intent\":\"join_team\""));

        let parsed: WorkflowIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name(), "join_team");
    }

    #[test]
    fn test_notification_id_only_for_resolutions() {
        let id = Uuid::new_v4();
        let approve = WorkflowIntent::ApproveTeamJoin {
            notification_id: id,
            approver_id: Uuid::new_v4(),
        };
        assert_eq!(approve.notification_id(), Some(id));

        let join = WorkflowIntent::JoinTeam {
            team_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };
        assert_eq!(join.notification_id(), None);
    }

    #[test]
    fn test_team_join_metadata_round_trip() {
        let team_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let metadata = team_join_metadata(team_id, user_id);
        assert_eq!(metadata["actionType"], "team_join");
        assert_eq!(metadata["entityType"], "user");

        let action = ModerationAction::from_metadata(Some(&metadata));
        assert_eq!(action, ModerationAction::TeamJoin { team_id, user_id });
    }

    #[test]
    fn test_competition_join_metadata_round_trip() {
        let team_id = Uuid::new_v4();
        let competition_id = Uuid::new_v4();

        let metadata = competition_join_metadata(team_id, competition_id, Uuid::new_v4());
        let action = ModerationAction::from_metadata(Some(&metadata));
        assert_eq!(
            action,
            ModerationAction::CompetitionJoin {
                team_id,
                competition_id,
            }
        );
    }

    #[test]
    fn test_federal_submission_metadata_round_trip() {
        let competition_id = Uuid::new_v4();
        let team_ids = vec![Uuid::new_v4(), Uuid::new_v4()];

        let metadata = federal_submission_metadata(competition_id, &team_ids, Some(5));
        let action = ModerationAction::from_metadata(Some(&metadata));
        assert_eq!(
            action,
            ModerationAction::FederalSubmission {
                competition_id,
                team_ids,
                region: Some(5),
            }
        );
    }

    #[test]
    fn test_federal_approval_spelling_is_accepted() {
        let competition_id = Uuid::new_v4();
        let team_ids = vec![Uuid::new_v4()];

        let metadata = json!({
            "actionType": "federal_approval",
            "competitionId": competition_id,
            "teamIds": team_ids,
        });

        let action = ModerationAction::from_metadata(Some(&metadata));
        assert_eq!(
            action,
            ModerationAction::FederalSubmission {
                competition_id,
                team_ids,
                region: None,
            }
        );
    }

    #[test]
    fn test_team_invite_metadata_round_trip() {
        let team_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let captain_id = Uuid::new_v4();

        let metadata = team_invite_metadata(team_id, user_id, captain_id);
        let action = ModerationAction::from_metadata(Some(&metadata));
        assert_eq!(
            action,
            ModerationAction::TeamInvite {
                team_id,
                user_id,
                captain_id,
            }
        );
    }

    #[test]
    fn test_unknown_action_type() {
        let metadata = json!({
            "actionType": "escalate_to_committee",
            "entityId": Uuid::new_v4(),
        });

        let action = ModerationAction::from_metadata(Some(&metadata));
        assert_eq!(
            action,
            ModerationAction::Unknown {
                action_type: "escalate_to_committee".to_string(),
            }
        );
        assert_eq!(action.action_type(), "escalate_to_committee");
    }

    #[test]
    fn test_missing_metadata_is_unknown() {
        let action = ModerationAction::from_metadata(None);
        assert!(matches!(action, ModerationAction::Unknown { .. }));
    }

    #[test]
    fn test_malformed_known_type_is_unknown() {
        // team_join without a teamId cannot be executed
        let metadata = json!({
            "actionType": "team_join",
            "entityType": "user",
            "entityId": Uuid::new_v4(),
        });

        let action = ModerationAction::from_metadata(Some(&metadata));
        assert_eq!(
            action,
            ModerationAction::Unknown {
                action_type: "team_join".to_string(),
            }
        );
    }

    #[test]
    fn test_non_user_entity_type_is_unknown() {
        let metadata = json!({
            "actionType": "team_join",
            "entityType": "team",
            "entityId": Uuid::new_v4(),
            "teamId": Uuid::new_v4(),
        });

        let action = ModerationAction::from_metadata(Some(&metadata));
        assert!(matches!(action, ModerationAction::Unknown { .. }));
    }
}
