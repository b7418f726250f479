//! The vote admission state machine.
//!
//! A submission is validated, checked for eligibility, pre-checked against
//! the ledger for duplicates, and finally inserted. The ledger's atomic
//! insert is what actually enforces one vote per voter and biometric; the
//! pre-checks only make the common rejection cheap and friendly.

use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use regex::Regex;
use rocket::tokio::time::timeout;

use crate::config::Config;
use crate::eligibility::check_eligibility;
use crate::error::Result;
use crate::identity::IdentityHasher;
use crate::ledger::{ConflictKind, InsertError};
use crate::model::{
    api::{
        admission::Admission,
        connection::ConnectionMeta,
        submission::{ValidSubmission, VoteSubmission},
    },
    common::reason::ReasonCode,
    db::{abuse::AbuseEvent, ballot::BallotDraft},
};
use crate::tally::TallyBroadcaster;
use crate::Backends;

/// The deployment's rules for admitting votes.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    voter_key: Regex,
    device_vote_limit: Option<u32>,
    abuse_record_timeout: Duration,
}

impl AdmissionPolicy {
    pub fn new(voter_key: Regex) -> Self {
        Self {
            voter_key,
            device_vote_limit: None,
            abuse_record_timeout: Duration::from_secs(2),
        }
    }

    pub fn from_config(config: &Config) -> std::result::Result<Self, regex::Error> {
        Ok(Self::new(Regex::new(config.voter_key_pattern())?)
            .with_device_vote_limit(config.device_vote_limit())
            .with_abuse_record_timeout(config.abuse_record_timeout()))
    }

    pub fn with_device_vote_limit(mut self, limit: Option<u32>) -> Self {
        self.device_vote_limit = limit;
        self
    }

    pub fn with_abuse_record_timeout(mut self, timeout: Duration) -> Self {
        self.abuse_record_timeout = timeout;
        self
    }
}

/// Everything needed to admit one submission.
pub struct VotePipeline<'a> {
    backends: &'a Backends,
    hasher: &'a IdentityHasher,
    policy: &'a AdmissionPolicy,
    broadcaster: &'a TallyBroadcaster,
}

impl<'a> VotePipeline<'a> {
    pub fn new(
        backends: &'a Backends,
        hasher: &'a IdentityHasher,
        policy: &'a AdmissionPolicy,
        broadcaster: &'a TallyBroadcaster,
    ) -> Self {
        Self {
            backends,
            hasher,
            policy,
            broadcaster,
        }
    }

    /// Decide the fate of one submission.
    ///
    /// Every outcome the voter can act on is an [`Admission`]; `Err` means
    /// the storage layer failed and nothing was recorded.
    pub async fn admit(
        &self,
        submission: VoteSubmission,
        meta: &ConnectionMeta,
    ) -> Result<Admission> {
        let id = meta.request_id;

        let submission = match submission.validate(&self.policy.voter_key) {
            Ok(submission) => submission,
            Err(e) => {
                warn!("req{id} Malformed submission: {e}");
                return Ok(Admission::Malformed(e));
            }
        };

        let eligible = match check_eligibility(
            &*self.backends.registry,
            submission.position_id,
            submission.candidate_id,
            Utc::now(),
        )
        .await?
        {
            Ok(eligible) => eligible,
            Err(reason) => {
                warn!("req{id} Ineligible submission: {reason}");
                return Ok(Admission::Ineligible(reason));
            }
        };

        let digest = submission
            .biometric
            .as_ref()
            .map(|biometric| self.hasher.digest(&biometric.payload));

        if let Some(reason) = self.precheck(&submission, digest.as_deref()).await? {
            return Ok(self.reject(reason, submission, digest, meta).await);
        }

        let draft = BallotDraft {
            voter_primary_key: submission.voter_primary_key.clone(),
            biometric_digest: digest.clone(),
            biometric_kind: submission.biometric_kind(),
            device_token: submission.device_token.clone(),
            position_id: submission.position_id,
            candidate_id: submission.candidate_id,
            origin_address: meta.origin_address.clone(),
            user_agent: meta.user_agent.clone(),
            cast_at: Utc::now(),
        };

        let inserted = {
            let _gate = self.broadcaster.commit_guard().await;
            let inserted = self.backends.ledger.insert(draft).await;
            if let Ok(ref ballot) = inserted {
                self.broadcaster.ballot_committed(ballot);
            }
            inserted
        };

        match inserted {
            Ok(ballot) => {
                info!(
                    "req{id} Accepted ballot {} for position '{}' in '{}'",
                    ballot.id, eligible.position.name, eligible.election.title
                );
                Ok(Admission::Accepted(ballot))
            }
            Err(InsertError::Conflict(kind)) => {
                debug!("req{id} Ledger refused insert ({kind:?} conflict)");
                let reason = self.conflict_reason(kind, &submission, digest.as_deref()).await;
                Ok(self.reject(reason, submission, digest, meta).await)
            }
            Err(InsertError::Storage(e)) => {
                error!("req{id} Failed to record ballot: {e}");
                Err(e)
            }
        }
    }

    /// Look for an existing ballot that this submission would duplicate.
    async fn precheck(
        &self,
        submission: &ValidSubmission,
        digest: Option<&str>,
    ) -> Result<Option<ReasonCode>> {
        let ledger = &self.backends.ledger;
        let position_id = submission.position_id;

        if let Some(digest) = digest {
            if ledger.find_by_biometric(position_id, digest).await?.is_some() {
                return Ok(Some(ReasonCode::DuplicateBiometric));
            }
        }
        if ledger
            .find_by_identity(position_id, &submission.voter_primary_key)
            .await?
            .is_some()
        {
            return Ok(Some(ReasonCode::DuplicateIdentity));
        }
        if let (Some(limit), Some(device)) =
            (self.policy.device_vote_limit, &submission.device_token)
        {
            if ledger.count_by_device(position_id, device).await? >= u64::from(limit) {
                return Ok(Some(ReasonCode::DeviceLimitExceeded));
            }
        }
        Ok(None)
    }

    /// The reason to report for a conflict raised by the ledger.
    ///
    /// A storage constraint only names the first rule it found broken, so an
    /// identity conflict is double checked for a biometric one, which is
    /// reported in preference.
    async fn conflict_reason(
        &self,
        kind: ConflictKind,
        submission: &ValidSubmission,
        digest: Option<&str>,
    ) -> ReasonCode {
        match (kind, digest) {
            (ConflictKind::Biometric, _) => ReasonCode::DuplicateBiometric,
            (ConflictKind::Identity, None) => ReasonCode::DuplicateIdentity,
            (ConflictKind::Identity, Some(digest)) => {
                match self
                    .backends
                    .ledger
                    .find_by_biometric(submission.position_id, digest)
                    .await
                {
                    Ok(Some(_)) => ReasonCode::DuplicateBiometric,
                    Ok(None) => ReasonCode::DuplicateIdentity,
                    Err(e) => {
                        warn!("Could not refine conflict reason: {e}");
                        ReasonCode::DuplicateIdentity
                    }
                }
            }
        }
    }

    /// Record the rejection in the abuse log and build the outcome.
    ///
    /// Waits for the abuse log only up to the configured timeout. A failed or
    /// late write is logged and does not change the decision.
    async fn reject(
        &self,
        reason: ReasonCode,
        submission: ValidSubmission,
        digest: Option<String>,
        meta: &ConnectionMeta,
    ) -> Admission {
        let id = meta.request_id;
        warn!(
            "req{id} Rejected vote by '{}' for position {}: {reason}",
            submission.voter_primary_key, submission.position_id
        );

        let event = AbuseEvent {
            biometric_kind: Some(submission.biometric_kind()),
            voter_primary_key: Some(submission.voter_primary_key),
            biometric_digest: digest,
            device_token: submission.device_token,
            origin_address: meta.origin_address.clone(),
            user_agent: meta.user_agent.clone(),
            reason_code: reason,
        };
        match timeout(
            self.policy.abuse_record_timeout,
            self.backends.abuse.record(event),
        )
        .await
        {
            Ok(Ok(record)) => debug!("req{id} Wrote abuse record {}", record.id),
            Ok(Err(e)) => error!("req{id} Failed to write abuse record: {e}"),
            Err(_) => warn!("req{id} Gave up waiting for abuse record"),
        }

        Admission::Rejected(reason)
    }
}
