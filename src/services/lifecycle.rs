use anyhow::{Context, Result};
use time::OffsetDateTime;

use crate::clients::backend::StudyApi;
use crate::model::types::AttemptKind;
use crate::model::Submission;

/// Explicit attempt lifecycle. Replaces the loose nullable-object/boolean
/// encoding with a tagged state so the transition table is enforced by type.
#[derive(Debug, Clone)]
pub(crate) enum AttemptState {
    /// The competition window has passed and no attempt was ever started.
    /// Nothing is searched for and nothing will be created.
    WindowClosed,
    /// A finalized submission exists; the attempt is immutable, read-only.
    Finalized(Submission),
    /// An open submission, either resumed or freshly created.
    InProgress(Submission),
}

impl AttemptState {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            AttemptState::WindowClosed => "window_closed",
            AttemptState::Finalized(_) => "finalized",
            AttemptState::InProgress(_) => "in_progress",
        }
    }

    pub(crate) fn submission(&self) -> Option<&Submission> {
        match self {
            AttemptState::WindowClosed => None,
            AttemptState::Finalized(submission) | AttemptState::InProgress(submission) => {
                Some(submission)
            }
        }
    }
}

/// Resolve (and if needed create) the attempt record for a user.
///
/// Resolution order: window check, finalized search, in-progress search,
/// create. For competitions whose end time has passed, no submission is
/// searched for or created. Creation happens at most once per call and is
/// guarded by a fresh search right before the POST; a cross-session race
/// is left to the backend's uniqueness rules.
pub(crate) async fn resolve_attempt(
    api: &dyn StudyApi,
    kind: AttemptKind,
    owner_id: &str,
    user_id: &str,
    now: OffsetDateTime,
) -> Result<AttemptState> {
    if kind == AttemptKind::Competition {
        let competition = api
            .get_competition(owner_id)
            .await
            .context("Failed to fetch competition")?;
        if competition.ends_at < now {
            tracing::info!(
                competition_id = %owner_id,
                user_id = %user_id,
                ended_at = %crate::core::time::format_offset(competition.ends_at),
                "Competition window closed; attempt is read-only"
            );
            return Ok(AttemptState::WindowClosed);
        }
    }

    if let Some(finalized) = api
        .find_submission(owner_id, user_id, true)
        .await
        .context("Failed to search for a finalized submission")?
    {
        return Ok(AttemptState::Finalized(finalized));
    }

    if let Some(open) = api
        .find_submission(owner_id, user_id, false)
        .await
        .context("Failed to search for an open submission")?
    {
        tracing::debug!(submission_id = %open.id, "Resuming open submission");
        return Ok(AttemptState::InProgress(open));
    }

    // Narrow the duplicate-create window: another request may have created
    // the row between the search above and now.
    if let Some(open) = api
        .find_submission(owner_id, user_id, false)
        .await
        .context("Failed to re-check for an open submission")?
    {
        return Ok(AttemptState::InProgress(open));
    }

    let created = api
        .create_submission(owner_id, user_id)
        .await
        .context("Failed to create submission")?;
    tracing::info!(
        submission_id = %created.id,
        owner_id = %owner_id,
        kind = kind.as_str(),
        "Created submission"
    );

    Ok(AttemptState::InProgress(created))
}
