use tracing::{debug, info};

use crate::{
    error::{AppError, AppResult},
    models::study_group::{StudyGroup, StudyGroupDraft},
    services::sync::SyncKind,
    state::AppState,
};

const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    AlreadyMember { members: Vec<String> },
    Joined { members: Vec<String> },
}

impl JoinOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            JoinOutcome::AlreadyMember { .. } => "Already joined",
            JoinOutcome::Joined { .. } => "Joined group",
        }
    }

    pub fn members(&self) -> &[String] {
        match self {
            JoinOutcome::AlreadyMember { members } | JoinOutcome::Joined { members } => members,
        }
    }
}

/// `None` when the user already belongs to the group.
pub fn plan_join(group: &StudyGroup, user_id: &str) -> AppResult<Option<Vec<String>>> {
    if group.is_member(user_id) {
        return Ok(None);
    }
    if group.is_full() {
        return Err(AppError::BadRequest("Group full".into()));
    }
    let mut members = group.members.clone();
    members.push(user_id.to_string());
    Ok(Some(members))
}

pub async fn create(state: &AppState, draft: StudyGroupDraft) -> AppResult<StudyGroup> {
    let group = draft.into_group();
    if group.subject.is_empty() {
        return Err(AppError::BadRequest("subject is required".into()));
    }
    if group.max_members < 1 {
        return Err(AppError::BadRequest("maxMembers must be positive".into()));
    }
    if group.members.len() as i64 > group.max_members {
        return Err(AppError::BadRequest(
            "more members than maxMembers allows".into(),
        ));
    }

    state.repo.insert_study_group(&group).await?;
    info!(group = %group.id, train = %group.train_number, "study group created");
    state.sync.publish(SyncKind::StudyGroups, &group.id);
    Ok(group)
}

pub async fn join(state: &AppState, group_id: &str, user_id: &str) -> AppResult<JoinOutcome> {
    for attempt in 1..=MAX_ATTEMPTS {
        let group = state
            .repo
            .find_study_group(group_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Group not found".into()))?;

        let Some(members) = plan_join(&group, user_id)? else {
            return Ok(JoinOutcome::AlreadyMember {
                members: group.members,
            });
        };

        if state
            .repo
            .replace_group_members(group_id, &group.members, &members)
            .await?
        {
            info!(group = %group_id, user = %user_id, "joined study group");
            state.sync.publish(SyncKind::StudyGroups, group_id);
            return Ok(JoinOutcome::Joined { members });
        }
        debug!(attempt, group = %group_id, "members changed while joining, replanning");
    }

    Err(AppError::Conflict(
        "group changed concurrently, please retry".into(),
    ))
}
