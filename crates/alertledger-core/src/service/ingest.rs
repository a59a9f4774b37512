//! Ingestion pipeline and sync cycle.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use sqlx::sqlite::SqliteConnection;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::fetch::MailFetcher;
use crate::dlq::{DlqRepository, NewDeadLetter, QuarantineOutcome};
use crate::ledger::{ClaimOutcome, MessageKey, ProcessedEmailRepository, content_hash};
use crate::records::{
    BalanceType, BalanceUpdateRepository, NewBalanceUpdate, NewTransaction, RecordRef,
    TransactionRepository,
};
use crate::sync_source::{ActiveAccounts, SyncSource, SyncSourceStatus};
use crate::{
    Database, DispatchFailure, Dispatched, Dispatcher, EmailMessage, Error, FailureKind,
    ParseResult, Result, SyncSourceId, UserId,
};

/// `update_source` of balance updates derived from alert emails.
pub const EMAIL_ALERT_SOURCE: &str = "email_alert";

/// Merchant recorded for card payment transactions.
pub const PAYMENT_MERCHANT: &str = "Payment";

/// Terminal outcome of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Converted and stored.
    Persisted(RecordRef),
    /// Stored in the dead-letter queue.
    Quarantined(FailureKind),
    /// The ledger already had this message.
    AlreadyProcessed,
    /// The dead-letter queue already had this message.
    AlreadyQuarantined,
    /// The ledger or the dead-letter queue had this UID with different
    /// content. Nothing was written.
    ContentMismatch {
        /// Hash recorded with the ledger entry.
        stored: String,
        /// Hash of the message just fetched.
        incoming: String,
    },
}

/// Summary of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Messages returned by the fetcher, after deduplication.
    pub fetched: usize,
    /// Messages at or below the checkpoint.
    pub skipped: usize,
    /// Records written.
    pub persisted: usize,
    /// New dead-letter entries.
    pub quarantined: usize,
    /// Messages already in the ledger or the dead-letter queue.
    pub already_handled: usize,
    /// Ledger or dead-letter hits with differing content.
    pub mismatched: usize,
    /// Highest UID handled in this cycle.
    pub last_uid: Option<u32>,
}

impl CycleReport {
    fn record(&mut self, uid: u32, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Persisted(_) => self.persisted += 1,
            MessageOutcome::Quarantined(_) => self.quarantined += 1,
            MessageOutcome::AlreadyProcessed | MessageOutcome::AlreadyQuarantined => {
                self.already_handled += 1;
            }
            MessageOutcome::ContentMismatch { .. } => self.mismatched += 1,
        }
        self.last_uid = Some(uid);
    }
}

/// Drives messages from a [`MailFetcher`] through dispatch into storage.
///
/// Cheap to clone. Cycles for the same sync source are serialized; cycles for
/// different sources run concurrently.
#[derive(Debug, Clone)]
pub struct Ingestor {
    db: Database,
    dispatcher: Arc<Dispatcher>,
    locks: Arc<std::sync::Mutex<HashMap<SyncSourceId, Arc<Mutex<()>>>>>,
}

impl Ingestor {
    /// Create an ingestor over a database and a dispatcher.
    #[must_use]
    pub fn new(db: Database, dispatcher: Dispatcher) -> Self {
        Self {
            db,
            dispatcher: Arc::new(dispatcher),
            locks: Arc::default(),
        }
    }

    /// The underlying database.
    #[must_use]
    pub const fn db(&self) -> &Database {
        &self.db
    }

    /// The dispatcher in use.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn source_lock(&self, id: SyncSourceId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id).or_default())
    }

    /// Convert one message, or quarantine it.
    ///
    /// The ledger entry and the derived record (or the dead-letter entry) are
    /// written in one transaction, so a message is never half-handled.
    ///
    /// # Errors
    ///
    /// Returns an error only for database failures.
    pub async fn process_message(
        &self,
        source: &SyncSource,
        accounts: &ActiveAccounts,
        email: &EmailMessage,
    ) -> Result<MessageOutcome> {
        let key = MessageKey::new(source.id, email.message_uid);

        match self.dispatcher.dispatch(email, accounts) {
            Ok(dispatched) => {
                let hash = content_hash(email);
                self.persist(source, key, &hash, email, &dispatched, None)
                    .await
            }
            Err(failure) => self.quarantine(source, key, email, &failure).await,
        }
    }

    async fn persist(
        &self,
        source: &SyncSource,
        key: MessageKey,
        hash: &str,
        email: &EmailMessage,
        dispatched: &Dispatched,
        replayed: Option<i64>,
    ) -> Result<MessageOutcome> {
        let mut tx = self.db.pool().begin().await?;

        if let Some(dead_letter_id) = replayed {
            DlqRepository::delete_in(&mut tx, dead_letter_id).await?;
        }

        let processed_email_id = match ProcessedEmailRepository::claim(&mut tx, key, Some(hash))
            .await?
        {
            ClaimOutcome::Claimed(id) => id,
            ClaimOutcome::AlreadyProcessed => {
                tx.rollback().await?;
                debug!(%key, "Message already processed");
                return Ok(MessageOutcome::AlreadyProcessed);
            }
            ClaimOutcome::Quarantined => {
                tx.rollback().await?;
                debug!(%key, "Message already quarantined");
                return Ok(MessageOutcome::AlreadyQuarantined);
            }
            ClaimOutcome::ContentMismatch { stored, incoming } => {
                tx.rollback().await?;
                warn!(%key, %stored, %incoming, "Processed message UID seen with different content");
                return Ok(MessageOutcome::ContentMismatch { stored, incoming });
            }
        };

        let record =
            insert_record(&mut tx, source, processed_email_id, email, dispatched).await?;
        tx.commit().await?;

        info!(
            %key,
            parser = dispatched.parser,
            account = %dispatched.account_id,
            ?record,
            "Persisted alert"
        );
        Ok(MessageOutcome::Persisted(record))
    }

    async fn quarantine(
        &self,
        source: &SyncSource,
        key: MessageKey,
        email: &EmailMessage,
        failure: &DispatchFailure,
    ) -> Result<MessageOutcome> {
        let entry = NewDeadLetter::from_failure(source.user_id, key, email, failure);
        let mut tx = self.db.pool().begin().await?;

        match DlqRepository::quarantine_in(&mut tx, &entry).await? {
            QuarantineOutcome::Recorded(id) => {
                tx.commit().await?;
                warn!(%key, dead_letter = id, error_type = %failure.kind, "{}", failure.message);
                Ok(MessageOutcome::Quarantined(failure.kind))
            }
            QuarantineOutcome::AlreadyQuarantined => {
                tx.rollback().await?;
                debug!(%key, "Message already quarantined");
                Ok(MessageOutcome::AlreadyQuarantined)
            }
            QuarantineOutcome::AlreadyProcessed => {
                tx.rollback().await?;
                debug!(%key, "Message already processed");
                Ok(MessageOutcome::AlreadyProcessed)
            }
            QuarantineOutcome::ContentMismatch { stored, incoming } => {
                tx.rollback().await?;
                warn!(%key, %stored, %incoming, "Handled message UID seen with different content");
                Ok(MessageOutcome::ContentMismatch { stored, incoming })
            }
        }
    }

    /// Run one sync cycle for a source.
    ///
    /// Messages are handled in ascending UID order and the checkpoint advances
    /// after each one, so an aborted cycle resumes after the last handled UID.
    ///
    /// # Errors
    ///
    /// - [`Error::SyncSourceNotFound`], [`Error::SyncSourceInactive`] or
    ///   [`Error::ReconnectRequired`] if the source can't be synced.
    /// - [`Error::Fetch`] after moving the source to the error state.
    /// - [`Error::Database`] if storage fails; the source state is untouched.
    pub async fn run_cycle<F>(&self, source_id: SyncSourceId, fetcher: &F) -> Result<CycleReport>
    where
        F: MailFetcher,
    {
        let lock = self.source_lock(source_id);
        let _guard = lock.lock().await;

        let sources = self.db.sync_sources();
        let source = sources
            .get(source_id)
            .await?
            .ok_or(Error::SyncSourceNotFound(source_id))?;
        if !source.is_active {
            return Err(Error::SyncSourceInactive(source_id));
        }
        if source.status == SyncSourceStatus::Error {
            return Err(Error::ReconnectRequired(source_id));
        }

        let user_sources = sources.list_active_for_user(source.user_id).await?;
        let accounts = ActiveAccounts::for_source(&source, &user_sources);

        let mut messages = match fetcher.fetch_since(&source, source.last_processed_uid).await {
            Ok(messages) => messages,
            Err(e) => {
                sources.mark_error(source_id, &e.to_string()).await?;
                return Err(e.into());
            }
        };
        messages.sort_by_key(|m| m.message_uid);
        messages.dedup_by_key(|m| m.message_uid);

        let mut report = CycleReport {
            fetched: messages.len(),
            ..CycleReport::default()
        };

        for email in &messages {
            if source
                .last_processed_uid
                .is_some_and(|checkpoint| email.message_uid <= checkpoint)
            {
                report.skipped += 1;
                continue;
            }
            let outcome = self.process_message(&source, &accounts, email).await?;
            sources.advance_checkpoint(source_id, email.message_uid).await?;
            report.record(email.message_uid, &outcome);
        }

        sources.touch_synced(source_id).await?;
        info!(
            source = %source_id,
            fetched = report.fetched,
            persisted = report.persisted,
            quarantined = report.quarantined,
            "Sync cycle complete"
        );
        Ok(report)
    }

    /// Run a cycle for every active source concurrently.
    ///
    /// Sources in the error state are skipped until reconnected. One source
    /// failing does not affect the others.
    ///
    /// # Errors
    ///
    /// Returns an error if the sources can't be listed.
    pub async fn sync_all<F>(
        &self,
        fetcher: Arc<F>,
    ) -> Result<Vec<(SyncSourceId, Result<CycleReport>)>>
    where
        F: MailFetcher + 'static,
    {
        let sources = self.db.sync_sources().list_active().await?;
        let mut tasks = JoinSet::new();

        for source in sources {
            if source.status == SyncSourceStatus::Error {
                debug!(source = %source.id, "Skipping source awaiting reconnection");
                continue;
            }
            let ingestor = self.clone();
            let fetcher = Arc::clone(&fetcher);
            tasks.spawn(async move {
                let result = ingestor.run_cycle(source.id, &*fetcher).await;
                (source.id, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, result)) => {
                    if let Err(e) = &result {
                        warn!(source = %id, error = %e, "Sync cycle failed");
                    }
                    results.push((id, result));
                }
                Err(e) => warn!(error = %e, "Sync task aborted"),
            }
        }
        results.sort_by_key(|(id, _)| *id);
        Ok(results)
    }

    /// Check the mailbox again and return the source to the active state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] (and keeps the error state) if the check fails.
    pub async fn reconnect<F>(&self, source_id: SyncSourceId, fetcher: &F) -> Result<()>
    where
        F: MailFetcher,
    {
        let lock = self.source_lock(source_id);
        let _guard = lock.lock().await;

        let sources = self.db.sync_sources();
        let source = sources
            .get(source_id)
            .await?
            .ok_or(Error::SyncSourceNotFound(source_id))?;
        if !source.is_active {
            return Err(Error::SyncSourceInactive(source_id));
        }

        match fetcher.check_connection(&source).await {
            Ok(()) => {
                sources.mark_active(source_id).await?;
                Ok(())
            }
            Err(e) => {
                sources.mark_error(source_id, &e.to_string()).await?;
                Err(e.into())
            }
        }
    }

    /// Run a quarantined message through dispatch again.
    ///
    /// On success the dead-letter entry is removed in the same transaction
    /// that claims the ledger. On another failure the entry stays as it was.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeadLetterNotFound`] if the user has no such entry,
    /// [`Error::SyncSourceInactive`] if its source was deactivated, or an
    /// error on database failure.
    pub async fn replay_dead_letter(&self, user_id: UserId, id: i64) -> Result<MessageOutcome> {
        let entry = self
            .db
            .dead_letters()
            .get_for_user(user_id, id)
            .await?
            .ok_or(Error::DeadLetterNotFound(id))?;

        let lock = self.source_lock(entry.sync_source_id);
        let _guard = lock.lock().await;

        let sources = self.db.sync_sources();
        let source = sources
            .get(entry.sync_source_id)
            .await?
            .ok_or(Error::SyncSourceNotFound(entry.sync_source_id))?;
        if !source.is_active {
            return Err(Error::SyncSourceInactive(source.id));
        }
        let user_sources = sources.list_active_for_user(source.user_id).await?;
        let accounts = ActiveAccounts::for_source(&source, &user_sources);

        let email = entry.to_email();
        match self.dispatcher.dispatch(&email, &accounts) {
            Ok(dispatched) => {
                let hash = content_hash(&email);
                self.persist(&source, entry.key(), &hash, &email, &dispatched, Some(id))
                    .await
            }
            Err(failure) => {
                info!(dead_letter = id, error_type = %failure.kind, "Replay failed again");
                Ok(MessageOutcome::Quarantined(failure.kind))
            }
        }
    }
}

async fn insert_record(
    conn: &mut SqliteConnection,
    source: &SyncSource,
    processed_email_id: i64,
    email: &EmailMessage,
    dispatched: &Dispatched,
) -> Result<RecordRef> {
    let transaction = |date, amount, merchant: &str, card_last4: &str, pending| NewTransaction {
        user_id: source.user_id,
        account_id: dispatched.account_id,
        sync_source_id: source.id,
        processed_email_id,
        date,
        amount,
        merchant: merchant.to_string(),
        card_last4: card_last4.to_string(),
        pending,
    };
    let balance = |balance_type, new_balance| NewBalanceUpdate {
        user_id: source.user_id,
        account_id: dispatched.account_id,
        sync_source_id: Some(source.id),
        processed_email_id: Some(processed_email_id),
        balance_type,
        new_balance,
        update_date: email.date.date_naive(),
        update_source: EMAIL_ALERT_SOURCE.to_string(),
    };

    let record = match &dispatched.result {
        ParseResult::Transaction(t) => RecordRef::Transaction(
            TransactionRepository::insert_in(
                conn,
                &transaction(t.date, t.amount, &t.merchant, &t.card_last4, t.pending),
            )
            .await?,
        ),
        ParseResult::Payment(p) => RecordRef::Transaction(
            TransactionRepository::insert_in(
                conn,
                &transaction(p.date, p.amount, PAYMENT_MERCHANT, &p.card_last4, false),
            )
            .await?,
        ),
        ParseResult::CreditUpdate(c) => RecordRef::BalanceUpdate(
            BalanceUpdateRepository::insert_in(
                conn,
                &balance(BalanceType::AvailableBalance, c.available_credit),
            )
            .await?,
        ),
        ParseResult::AccountBalance(b) => RecordRef::BalanceUpdate(
            BalanceUpdateRepository::insert_in(
                conn,
                &balance(BalanceType::CurrentBalance, b.balance),
            )
            .await?,
        ),
    };
    Ok(record)
}
