use crate::application_impl::RuntimeSettings;
use crate::application_port::{
    EventOutcome, GatewayError, IgnoreReason, JoinGateway, Notice, VerificationError,
    VerificationService,
};
use crate::domain_model::{
    ChallengeOption, ChallengePrompt, ChatId, FailureAction, Language, Phase, PromptToken,
    RecordKey, UserId, VerificationRecord, VerificationStatus,
};
use crate::domain_port::{RecordStore, RosterList, RosterStore};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

fn after(now: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    now + chrono::Duration::seconds(timeout.as_secs() as i64)
}

/// The verification state machine.
///
/// Handlers serialize per (chat, user) through a lock table, so every event
/// sees a consistent record; the store's compare-and-swap version is the
/// backstop against anything that slips past. The gateway only receives
/// directives after the decision has been persisted.
pub struct VerificationEngine {
    records: Arc<dyn RecordStore>,
    roster: Arc<dyn RosterStore>,
    gateway: Arc<dyn JoinGateway>,
    settings: Arc<RuntimeSettings>,
    key_locks: DashMap<RecordKey, Arc<Mutex<()>>>,
}

impl VerificationEngine {
    pub fn new(
        records: Arc<dyn RecordStore>,
        roster: Arc<dyn RosterStore>,
        gateway: Arc<dyn JoinGateway>,
        settings: Arc<RuntimeSettings>,
    ) -> Self {
        Self {
            records,
            roster,
            gateway,
            settings,
            key_locks: DashMap::new(),
        }
    }

    fn key_lock(&self, key: RecordKey) -> Arc<Mutex<()>> {
        self.key_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    fn notice_language(record: &VerificationRecord) -> Language {
        record.language.unwrap_or(Language::English)
    }

    /// Close out a record that cannot complete successfully, per the
    /// configured failure action. `expired` selects the `Expired` terminal
    /// status on the reject path; exhausted attempts and unreachable users
    /// use `Rejected`.
    async fn apply_failure_action(
        &self,
        mut record: VerificationRecord,
        expired: bool,
    ) -> Result<EventOutcome, VerificationError> {
        let policy = self.settings.policy();
        record.updated_at = Utc::now();

        let (status, notice, outcome) = match policy.failure_action {
            FailureAction::Reject if expired => {
                (VerificationStatus::Expired, Notice::Expired, EventOutcome::Expired)
            }
            FailureAction::Reject => {
                (VerificationStatus::Rejected, Notice::Failed, EventOutcome::Rejected)
            }
            FailureAction::Pending => (
                VerificationStatus::PendingReview,
                Notice::HeldForReview,
                EventOutcome::HeldForReview,
            ),
        };
        record.status = status;
        let record = self.records.put(&record).await?;
        info!(key = %record.key(), status = %record.status, "verification closed");

        if matches!(status, VerificationStatus::Rejected | VerificationStatus::Expired) {
            if let Err(e) = self.gateway.decline_join(record.chat_id, record.user_id).await {
                warn!(key = %record.key(), error = %e, "decline directive failed");
            }
        }
        if let Err(e) = self
            .gateway
            .notify(record.user_id, notice, Self::notice_language(&record))
            .await
        {
            debug!(key = %record.key(), error = %e, "failure notice not delivered");
        }
        Ok(outcome)
    }

    /// Rotate the token and re-arm the challenge deadline, then hand the
    /// gateway a fresh shuffled presentation. An unreachable DM channel at
    /// this point is a hard failure, like everywhere else.
    async fn issue_challenge(
        &self,
        mut record: VerificationRecord,
        now: DateTime<Utc>,
    ) -> Result<EventOutcome, VerificationError> {
        let policy = self.settings.policy();
        record.token = PromptToken::issue();
        record.challenge_issued_at = now;
        record.deadline = after(now, policy.verify_timeout);
        record.updated_at = now;
        let record = self.records.put(&record).await?;

        let prompt = ChallengePrompt {
            token: record.token.clone(),
            language: Self::notice_language(&record),
            shuffle_seed: rand::random(),
            attempts_left: record.attempts_left(),
        };
        match self
            .gateway
            .prompt_challenge(record.chat_id, record.user_id, &prompt)
            .await
        {
            Ok(()) => Ok(EventOutcome::ChallengeIssued {
                attempts_left: record.attempts_left(),
            }),
            Err(GatewayError::Unreachable) => {
                warn!(key = %record.key(), "user unreachable for challenge prompt");
                self.apply_failure_action(record, false).await
            }
            Err(e) => {
                // Transient transport trouble; the prompt can be re-sent via
                // /start while the deadline is still running.
                warn!(key = %record.key(), error = %e, "challenge prompt failed");
                Ok(EventOutcome::ChallengeIssued {
                    attempts_left: record.attempts_left(),
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl VerificationService for VerificationEngine {
    async fn on_join_request(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<EventOutcome, VerificationError> {
        let key = RecordKey::new(chat_id, user_id);
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let policy = self.settings.policy();
        let now = Utc::now();
        let existing = self.records.get(key).await?;

        if self.roster.contains(RosterList::Blacklist, user_id).await? {
            let mut record =
                VerificationRecord::new_join(key, policy.max_attempts, policy.lang_timeout, now);
            record.status = VerificationStatus::Rejected;
            if let Some(prior) = &existing {
                record.version = prior.version;
            }
            self.records.put(&record).await?;
            if let Err(e) = self.gateway.decline_join(chat_id, user_id).await {
                warn!(%key, error = %e, "decline directive failed");
            }
            info!(%key, "blacklisted join request declined");
            return Ok(EventOutcome::Rejected);
        }

        // A repeated join request supersedes whatever was in flight: the
        // fresh token invalidates the prior prompt and any timer armed for it.
        let mut record =
            VerificationRecord::new_join(key, policy.max_attempts, policy.lang_timeout, now);
        if let Some(prior) = &existing {
            record.version = prior.version;
        }
        let record = self.records.put(&record).await?;

        match self
            .gateway
            .prompt_language(chat_id, user_id, record.token.as_str())
            .await
        {
            Ok(()) => {
                debug!(%key, "language prompt sent");
                Ok(EventOutcome::LanguagePromptSent)
            }
            Err(GatewayError::Unreachable) => {
                // Never approve a user we cannot talk to.
                warn!(%key, "user unreachable for DM");
                self.apply_failure_action(record, false).await
            }
            Err(e) => {
                warn!(%key, error = %e, "language prompt failed");
                self.apply_failure_action(record, false).await
            }
        }
    }

    async fn on_language_selected(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        token: &str,
        language: Language,
    ) -> Result<EventOutcome, VerificationError> {
        let key = RecordKey::new(chat_id, user_id);
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let Some(record) = self.records.get(key).await? else {
            debug!(%key, "language selection for unknown record");
            return Ok(EventOutcome::Ignored(IgnoreReason::NotFound));
        };
        if record.is_terminal() {
            debug!(%key, status = %record.status, "language selection for settled record");
            return Ok(EventOutcome::Ignored(IgnoreReason::Terminal));
        }
        if record.status != VerificationStatus::AwaitingLanguage {
            return Ok(EventOutcome::Ignored(IgnoreReason::WrongPhase));
        }
        if !record.token.matches(token) {
            debug!(%key, "stale language token replayed");
            return Ok(EventOutcome::Ignored(IgnoreReason::StaleToken));
        }

        let now = Utc::now();
        if record.is_past_deadline(now) {
            return self.apply_failure_action(record, true).await;
        }

        let mut record = record;
        record.language = Some(language);
        record.status = VerificationStatus::AwaitingVerification;
        info!(%key, language = %language, "language selected");
        self.issue_challenge(record, now).await
    }

    async fn on_challenge_response(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        token: &str,
        choice: ChallengeOption,
    ) -> Result<EventOutcome, VerificationError> {
        let key = RecordKey::new(chat_id, user_id);
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let Some(record) = self.records.get(key).await? else {
            return Ok(EventOutcome::Ignored(IgnoreReason::NotFound));
        };
        if record.is_terminal() {
            debug!(%key, status = %record.status, "challenge response for settled record");
            return Ok(EventOutcome::Ignored(IgnoreReason::Terminal));
        }
        if record.status != VerificationStatus::AwaitingVerification {
            return Ok(EventOutcome::Ignored(IgnoreReason::WrongPhase));
        }
        if !record.token.matches(token) {
            debug!(%key, "stale challenge token replayed");
            return Ok(EventOutcome::Ignored(IgnoreReason::StaleToken));
        }

        let now = Utc::now();
        if record.is_past_deadline(now) {
            return self.apply_failure_action(record, true).await;
        }

        let mut record = record;
        if choice.is_correct() {
            record.status = VerificationStatus::Approved;
            record.updated_at = now;
            let record = self.records.put(&record).await?;
            info!(%key, attempts_used = record.attempts_used, "verification passed");

            if let Err(e) = self.gateway.approve_join(chat_id, user_id).await {
                warn!(%key, error = %e, "approve directive failed");
            }
            if let Err(e) = self
                .gateway
                .notify(user_id, Notice::Approved, Self::notice_language(&record))
                .await
            {
                debug!(%key, error = %e, "approval notice not delivered");
            }
            return Ok(EventOutcome::Approved);
        }

        record.attempts_used += 1;
        debug!(%key, attempts_used = record.attempts_used, "wrong challenge answer");
        if record.attempts_used >= record.max_attempts {
            return self.apply_failure_action(record, false).await;
        }
        match self.issue_challenge(record, now).await? {
            EventOutcome::ChallengeIssued { attempts_left } => {
                Ok(EventOutcome::WrongAnswer { attempts_left })
            }
            other => Ok(other),
        }
    }

    async fn on_deadline(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        phase: Phase,
        token: &str,
    ) -> Result<EventOutcome, VerificationError> {
        let key = RecordKey::new(chat_id, user_id);
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let Some(record) = self.records.get(key).await? else {
            return Ok(EventOutcome::Ignored(IgnoreReason::NotFound));
        };
        if record.is_terminal() {
            return Ok(EventOutcome::Ignored(IgnoreReason::Terminal));
        }
        if record.phase() != Some(phase) {
            debug!(%key, "timer fired for a superseded phase");
            return Ok(EventOutcome::Ignored(IgnoreReason::WrongPhase));
        }
        if !record.token.matches(token) {
            debug!(%key, "timer fired for a superseded token");
            return Ok(EventOutcome::Ignored(IgnoreReason::StaleToken));
        }
        if !record.is_past_deadline(Utc::now()) {
            return Ok(EventOutcome::Ignored(IgnoreReason::NotDue));
        }

        info!(%key, phase = ?phase, "verification deadline elapsed");
        self.apply_failure_action(record, true).await
    }

    async fn resume_prompt(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<EventOutcome, VerificationError> {
        let key = RecordKey::new(chat_id, user_id);
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let Some(record) = self.records.get(key).await? else {
            return Ok(EventOutcome::Ignored(IgnoreReason::NotFound));
        };
        if record.is_terminal() {
            return Ok(EventOutcome::Ignored(IgnoreReason::Terminal));
        }

        let policy = self.settings.policy();
        let now = Utc::now();
        let mut record = record;
        match record.status {
            VerificationStatus::AwaitingLanguage => {
                record.token = PromptToken::issue();
                record.deadline = after(now, policy.lang_timeout);
                record.updated_at = now;
                let record = self.records.put(&record).await?;
                match self
                    .gateway
                    .prompt_language(chat_id, user_id, record.token.as_str())
                    .await
                {
                    Ok(()) => Ok(EventOutcome::LanguagePromptSent),
                    Err(GatewayError::Unreachable) => {
                        self.apply_failure_action(record, false).await
                    }
                    Err(e) => {
                        warn!(%key, error = %e, "language prompt failed");
                        Ok(EventOutcome::LanguagePromptSent)
                    }
                }
            }
            VerificationStatus::AwaitingVerification => self.issue_challenge(record, now).await,
            _ => Ok(EventOutcome::Ignored(IgnoreReason::Terminal)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{FakeJoinGateway, SentDirective};
    use crate::infra_memory::{MemoryRecordStore, MemoryRosterStore, MemorySettingsStore};
    use crate::domain_model::VerificationPolicy;

    struct Fixture {
        engine: VerificationEngine,
        records: Arc<MemoryRecordStore>,
        roster: Arc<MemoryRosterStore>,
        gateway: Arc<FakeJoinGateway>,
        settings: Arc<RuntimeSettings>,
    }

    const CHAT: ChatId = ChatId(-1001);
    const USER: UserId = UserId(42);

    async fn fixture(policy: VerificationPolicy) -> Fixture {
        let records = Arc::new(MemoryRecordStore::new());
        let roster = Arc::new(MemoryRosterStore::new());
        let gateway = Arc::new(FakeJoinGateway::new());
        let settings = Arc::new(
            RuntimeSettings::load(policy, Arc::new(MemorySettingsStore::new()))
                .await
                .unwrap(),
        );
        let engine = VerificationEngine::new(
            records.clone(),
            roster.clone(),
            gateway.clone(),
            settings.clone(),
        );
        Fixture {
            engine,
            records,
            roster,
            gateway,
            settings,
        }
    }

    async fn stored(f: &Fixture) -> VerificationRecord {
        f.records
            .get(RecordKey::new(CHAT, USER))
            .await
            .unwrap()
            .expect("record should exist")
    }

    fn last_token(f: &Fixture) -> String {
        f.gateway
            .sent()
            .iter()
            .rev()
            .find_map(|d| match d {
                SentDirective::LanguagePrompt { token, .. }
                | SentDirective::ChallengePrompt { token, .. } => Some(token.clone()),
                _ => None,
            })
            .expect("no prompt sent")
    }

    /// Walk a fresh join up to the challenge phase.
    async fn advance_to_challenge(f: &Fixture) -> String {
        assert_eq!(
            f.engine.on_join_request(CHAT, USER).await.unwrap(),
            EventOutcome::LanguagePromptSent
        );
        let token = last_token(f);
        let outcome = f
            .engine
            .on_language_selected(CHAT, USER, &token, Language::Hindi)
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::ChallengeIssued { .. }));
        last_token(f)
    }

    #[tokio::test]
    async fn first_try_pass_approves_with_zero_attempts() {
        let f = fixture(VerificationPolicy::default()).await;
        let token = advance_to_challenge(&f).await;

        let outcome = f
            .engine
            .on_challenge_response(CHAT, USER, &token, ChallengeOption::Human)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Approved);

        let record = stored(&f).await;
        assert_eq!(record.status, VerificationStatus::Approved);
        assert_eq!(record.attempts_used, 0);
        assert_eq!(record.language, Some(Language::Hindi));
        assert!(f.gateway.sent().contains(&SentDirective::Approve {
            chat_id: CHAT,
            user_id: USER
        }));
    }

    #[tokio::test]
    async fn two_wrong_answers_reject_under_default_action() {
        let f = fixture(VerificationPolicy {
            max_attempts: 2,
            ..VerificationPolicy::default()
        })
        .await;
        let token = advance_to_challenge(&f).await;

        let outcome = f
            .engine
            .on_challenge_response(CHAT, USER, &token, ChallengeOption::Bot)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::WrongAnswer { attempts_left: 1 });

        let token = last_token(&f);
        let outcome = f
            .engine
            .on_challenge_response(CHAT, USER, &token, ChallengeOption::Auto)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Rejected);

        let record = stored(&f).await;
        assert_eq!(record.status, VerificationStatus::Rejected);
        assert_eq!(record.attempts_used, 2);
        assert!(f.gateway.sent().contains(&SentDirective::Decline {
            chat_id: CHAT,
            user_id: USER
        }));
    }

    #[tokio::test]
    async fn two_wrong_answers_hold_for_review_under_pending_action() {
        let f = fixture(VerificationPolicy {
            max_attempts: 2,
            failure_action: FailureAction::Pending,
            ..VerificationPolicy::default()
        })
        .await;
        let token = advance_to_challenge(&f).await;

        f.engine
            .on_challenge_response(CHAT, USER, &token, ChallengeOption::Skip)
            .await
            .unwrap();
        let token = last_token(&f);
        let outcome = f
            .engine
            .on_challenge_response(CHAT, USER, &token, ChallengeOption::Skip)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::HeldForReview);

        let record = stored(&f).await;
        assert_eq!(record.status, VerificationStatus::PendingReview);
        // No automatic decline on the pending path.
        assert!(!f.gateway.sent().contains(&SentDirective::Decline {
            chat_id: CHAT,
            user_id: USER
        }));
    }

    #[tokio::test]
    async fn attempts_never_exceed_ceiling() {
        let f = fixture(VerificationPolicy {
            max_attempts: 3,
            ..VerificationPolicy::default()
        })
        .await;
        let mut token = advance_to_challenge(&f).await;

        for _ in 0..3 {
            let _ = f
                .engine
                .on_challenge_response(CHAT, USER, &token, ChallengeOption::Bot)
                .await
                .unwrap();
            let record = stored(&f).await;
            assert!(record.attempts_used <= record.max_attempts);
            if record.is_terminal() {
                break;
            }
            token = last_token(&f);
        }
        let record = stored(&f).await;
        assert_eq!(record.attempts_used, 3);
        assert_eq!(record.status, VerificationStatus::Rejected);

        // Further answers bounce off the terminal record.
        let outcome = f
            .engine
            .on_challenge_response(CHAT, USER, &token, ChallengeOption::Human)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Ignored(IgnoreReason::Terminal));
        assert_eq!(stored(&f).await.attempts_used, 3);
    }

    #[tokio::test]
    async fn stale_token_is_a_no_op() {
        let f = fixture(VerificationPolicy::default()).await;
        f.engine.on_join_request(CHAT, USER).await.unwrap();
        let old_token = last_token(&f);

        // Selecting a language rotates the token.
        f.engine
            .on_language_selected(CHAT, USER, &old_token, Language::English)
            .await
            .unwrap();
        let before = stored(&f).await;

        // Replaying the language button from the previous phase does nothing.
        let outcome = f
            .engine
            .on_language_selected(CHAT, USER, &old_token, Language::Hinglish)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Ignored(IgnoreReason::WrongPhase));

        // A bad token in the current phase does nothing either.
        let outcome = f
            .engine
            .on_challenge_response(CHAT, USER, "ffffffffffffffff", ChallengeOption::Human)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Ignored(IgnoreReason::StaleToken));
        assert_eq!(stored(&f).await, before);
    }

    #[tokio::test]
    async fn challenge_timeout_applies_failure_action() {
        let f = fixture(VerificationPolicy::default()).await;
        let token = advance_to_challenge(&f).await;

        // Backdate the deadline as if verify_timeout elapsed.
        let mut record = stored(&f).await;
        record.deadline = Utc::now() - chrono::Duration::seconds(1);
        f.records.put(&record).await.unwrap();

        let outcome = f
            .engine
            .on_deadline(CHAT, USER, Phase::Challenge, &token)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Expired);
        assert_eq!(stored(&f).await.status, VerificationStatus::Expired);
    }

    #[tokio::test]
    async fn late_timer_after_completion_is_a_no_op() {
        let f = fixture(VerificationPolicy::default()).await;
        let token = advance_to_challenge(&f).await;
        f.engine
            .on_challenge_response(CHAT, USER, &token, ChallengeOption::Human)
            .await
            .unwrap();

        let outcome = f
            .engine
            .on_deadline(CHAT, USER, Phase::Challenge, &token)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Ignored(IgnoreReason::Terminal));
        assert_eq!(stored(&f).await.status, VerificationStatus::Approved);
    }

    #[tokio::test]
    async fn timer_for_superseded_token_is_discarded() {
        let f = fixture(VerificationPolicy::default()).await;
        f.engine.on_join_request(CHAT, USER).await.unwrap();
        let old_token = last_token(&f);

        // A second join request supersedes the first.
        f.engine.on_join_request(CHAT, USER).await.unwrap();

        let outcome = f
            .engine
            .on_deadline(CHAT, USER, Phase::Language, &old_token)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Ignored(IgnoreReason::StaleToken));
        assert_eq!(
            stored(&f).await.status,
            VerificationStatus::AwaitingLanguage
        );
    }

    #[tokio::test]
    async fn timer_before_deadline_is_discarded() {
        let f = fixture(VerificationPolicy::default()).await;
        f.engine.on_join_request(CHAT, USER).await.unwrap();
        let token = last_token(&f);

        let outcome = f
            .engine
            .on_deadline(CHAT, USER, Phase::Language, &token)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Ignored(IgnoreReason::NotDue));
    }

    #[tokio::test]
    async fn blacklisted_join_is_declined_without_prompts() {
        let f = fixture(VerificationPolicy::default()).await;
        f.roster.add(RosterList::Blacklist, USER).await.unwrap();

        let outcome = f.engine.on_join_request(CHAT, USER).await.unwrap();
        assert_eq!(outcome, EventOutcome::Rejected);
        assert_eq!(stored(&f).await.status, VerificationStatus::Rejected);
        assert_eq!(
            f.gateway.sent(),
            vec![SentDirective::Decline {
                chat_id: CHAT,
                user_id: USER
            }]
        );
    }

    #[tokio::test]
    async fn unreachable_user_is_never_left_pending_prompt() {
        let f = fixture(VerificationPolicy::default()).await;
        f.gateway.mark_unreachable(USER);

        let outcome = f.engine.on_join_request(CHAT, USER).await.unwrap();
        assert_eq!(outcome, EventOutcome::Rejected);
        assert_eq!(stored(&f).await.status, VerificationStatus::Rejected);
    }

    #[tokio::test]
    async fn unreachable_user_held_for_review_under_pending_action() {
        let f = fixture(VerificationPolicy {
            failure_action: FailureAction::Pending,
            ..VerificationPolicy::default()
        })
        .await;
        f.gateway.mark_unreachable(USER);

        let outcome = f.engine.on_join_request(CHAT, USER).await.unwrap();
        assert_eq!(outcome, EventOutcome::HeldForReview);
        assert_eq!(stored(&f).await.status, VerificationStatus::PendingReview);
    }

    #[tokio::test]
    async fn new_join_supersedes_in_flight_record() {
        let f = fixture(VerificationPolicy::default()).await;
        let token = advance_to_challenge(&f).await;

        f.engine.on_join_request(CHAT, USER).await.unwrap();
        let record = stored(&f).await;
        assert_eq!(record.status, VerificationStatus::AwaitingLanguage);
        assert_eq!(record.attempts_used, 0);
        assert!(!record.token.matches(&token));

        // The old challenge button is dead.
        let outcome = f
            .engine
            .on_challenge_response(CHAT, USER, &token, ChallengeOption::Human)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Ignored(IgnoreReason::WrongPhase));
    }

    #[tokio::test]
    async fn wrong_answer_reissues_with_fresh_token_and_deadline() {
        let f = fixture(VerificationPolicy::default()).await;
        let token = advance_to_challenge(&f).await;
        let before = stored(&f).await;

        let outcome = f
            .engine
            .on_challenge_response(CHAT, USER, &token, ChallengeOption::Bot)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::WrongAnswer { attempts_left: 2 });

        let record = stored(&f).await;
        assert_eq!(record.status, VerificationStatus::AwaitingVerification);
        assert_eq!(record.attempts_used, 1);
        assert_ne!(record.token, before.token);
        assert!(record.deadline >= before.deadline);
    }

    #[tokio::test]
    async fn settings_change_applies_to_reissued_prompts_only() {
        let f = fixture(VerificationPolicy::default()).await;
        let token = advance_to_challenge(&f).await;
        let before = stored(&f).await;

        f.settings.set_verify_timeout(600).await.unwrap();
        // In-flight deadline untouched.
        assert_eq!(stored(&f).await.deadline, before.deadline);

        f.engine
            .on_challenge_response(CHAT, USER, &token, ChallengeOption::Bot)
            .await
            .unwrap();
        let record = stored(&f).await;
        let armed = (record.deadline - record.challenge_issued_at).num_seconds();
        assert_eq!(armed, 600);
    }

    #[tokio::test]
    async fn resume_prompt_rotates_token_and_resends() {
        let f = fixture(VerificationPolicy::default()).await;
        f.engine.on_join_request(CHAT, USER).await.unwrap();
        let old = stored(&f).await;

        let outcome = f.engine.resume_prompt(CHAT, USER).await.unwrap();
        assert_eq!(outcome, EventOutcome::LanguagePromptSent);
        let record = stored(&f).await;
        assert_ne!(record.token, old.token);

        // No pipeline: nothing to resume.
        let outcome = f.engine.resume_prompt(CHAT, UserId(999)).await.unwrap();
        assert_eq!(outcome, EventOutcome::Ignored(IgnoreReason::NotFound));
    }

    #[tokio::test]
    async fn no_approval_without_correct_answer() {
        let f = fixture(VerificationPolicy::default()).await;
        let token = advance_to_challenge(&f).await;

        for wrong in [ChallengeOption::Bot, ChallengeOption::Skip, ChallengeOption::Auto] {
            let current = stored(&f).await;
            if current.is_terminal() {
                break;
            }
            let _ = f
                .engine
                .on_challenge_response(CHAT, USER, &token, wrong)
                .await
                .unwrap();
        }
        let record = stored(&f).await;
        assert_ne!(record.status, VerificationStatus::Approved);
        assert!(!f.gateway.sent().iter().any(|d| matches!(
            d,
            SentDirective::Approve { .. }
        )));
    }
}
