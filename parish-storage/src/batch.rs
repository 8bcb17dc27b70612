//! Financial batch resolution.
//!
//! Incoming transactions are grouped into daily batches keyed by a resolved
//! name and a one-day window. The name carries a suffix derived from the
//! payment's credit card or currency defined values, so "Online Giving VISA"
//! and "Online Giving Cash" land in separate batches.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveTime, TimeDelta};
use tracing::debug;

use parish_core::{
    new_entity_guid, BatchError, BatchStatus, FinancialBatch, ParishResult, Timestamp,
};

use crate::cache::DefinedValueRecord;
use crate::store::{BackingStore, MemoryStore, Model};

/// Attribute key on credit-card defined values that overrides the batch
/// name suffix.
pub const BATCH_NAME_SUFFIX_ATTRIBUTE: &str = "BatchNameSuffix";

/// Build a batch name from its parts.
///
/// The suffix between prefix and `name_suffix` comes from, in order of
/// precedence: the credit card type's `BatchNameSuffix` attribute, the
/// credit card type's value, the currency type's value. A blank suffix
/// collapses to the bare prefix with no trailing space.
pub fn resolve_batch_name(
    prefix: &str,
    name_suffix: &str,
    currency_type: Option<&DefinedValueRecord>,
    credit_card_type: Option<&DefinedValueRecord>,
) -> String {
    let mut cc_suffix = String::new();

    if let Some(credit_card) = credit_card_type {
        cc_suffix = credit_card
            .get_attribute(BATCH_NAME_SUFFIX_ATTRIBUTE)
            .unwrap_or("")
            .trim()
            .to_string();
        if cc_suffix.is_empty() {
            cc_suffix = credit_card.value.trim().to_string();
        }
    }

    if cc_suffix.is_empty() {
        if let Some(currency) = currency_type {
            cc_suffix = currency.value.trim().to_string();
        }
    }

    let mut name = prefix.trim().to_string();
    if !cc_suffix.is_empty() {
        name.push(' ');
        name.push_str(&cc_suffix);
    }
    name.push_str(name_suffix);
    name
}

/// Store operations the batch service needs beyond generic reads.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Open batches with exactly this name.
    async fn find_open_by_name(&self, name: &str) -> ParishResult<Vec<FinancialBatch>>;

    /// Persist a new batch, assigning its id, and return the stored row.
    async fn add(&self, batch: FinancialBatch) -> ParishResult<FinancialBatch>;
}

#[async_trait]
impl BatchStore for MemoryStore<FinancialBatch> {
    async fn find_open_by_name(&self, name: &str) -> ParishResult<Vec<FinancialBatch>> {
        Ok(self
            .find_all()
            .await?
            .into_iter()
            .filter(|batch| batch.status == BatchStatus::Open && batch.name == name)
            .collect())
    }

    async fn add(&self, mut batch: FinancialBatch) -> ParishResult<FinancialBatch> {
        if batch.id == 0 {
            let max_id = self.find_all().await?.iter().map(Model::id).max();
            batch.id = max_id.unwrap_or(0) + 1;
        }
        self.insert(batch.clone())?;
        Ok(batch)
    }
}

/// Service that resolves transactions to their daily batch.
pub struct FinancialBatchService<S: BatchStore> {
    store: Arc<S>,
}

impl<S: BatchStore> FinancialBatchService<S> {
    /// Create a service over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Find the open batch covering `transaction_date` under `batch_name`,
    /// creating one if none exists.
    ///
    /// A caller-supplied `known` list is searched before the store (batch
    /// imports resolve many transactions in one pass); any batch found in
    /// the store or newly created is appended to it.
    ///
    /// `batch_time_offset` shifts the batch day boundary away from midnight:
    /// a new batch starts at the transaction's date plus the offset, rolled
    /// back one day when that start would land after the transaction itself.
    /// The window is always exactly one day.
    pub async fn get_or_create(
        &self,
        batch_name: &str,
        transaction_date: Timestamp,
        batch_time_offset: TimeDelta,
        mut known: Option<&mut Vec<FinancialBatch>>,
    ) -> ParishResult<FinancialBatch> {
        let name = batch_name.trim();
        if name.is_empty() {
            return Err(BatchError::EmptyName {
                prefix: batch_name.to_string(),
            }
            .into());
        }
        if batch_time_offset < TimeDelta::zero() || batch_time_offset >= TimeDelta::days(1) {
            return Err(BatchError::InvalidWindow {
                name: name.to_string(),
                reason: "batch time offset must be within one day".to_string(),
            }
            .into());
        }

        // A list the caller already holds wins over a store round trip.
        if let Some(list) = known.as_deref() {
            if let Some(found) = Self::covering_batch(list, name, transaction_date) {
                return Ok(found.clone());
            }
        }

        let candidates = self.store.find_open_by_name(name).await?;
        if let Some(found) = Self::covering_batch(&candidates, name, transaction_date) {
            let found = found.clone();
            if let Some(list) = known.as_mut() {
                list.push(found.clone());
            }
            return Ok(found);
        }

        let mut start =
            transaction_date.date_naive().and_time(NaiveTime::MIN).and_utc() + batch_time_offset;
        if start > transaction_date {
            start -= TimeDelta::days(1);
        }

        debug!(name, %start, "creating batch");
        let batch = self
            .store
            .add(FinancialBatch {
                id: 0,
                guid: new_entity_guid(),
                name: name.to_string(),
                status: BatchStatus::Open,
                batch_start_date_time: Some(start),
                batch_end_date_time: Some(start + TimeDelta::days(1)),
                control_amount: 0,
            })
            .await?;
        if let Some(list) = known {
            list.push(batch.clone());
        }
        Ok(batch)
    }

    /// Latest-starting open batch whose window covers `transaction_date`.
    fn covering_batch<'a>(
        batches: &'a [FinancialBatch],
        name: &str,
        transaction_date: Timestamp,
    ) -> Option<&'a FinancialBatch> {
        batches
            .iter()
            .filter(|batch| {
                batch.status == BatchStatus::Open
                    && batch.name == name
                    && batch
                        .batch_start_date_time
                        .is_some_and(|start| start <= transaction_date)
                    && batch
                        .batch_end_date_time
                        .is_some_and(|end| end > transaction_date)
            })
            .max_by_key(|batch| batch.batch_start_date_time)
    }
}

// ============================================================================
// TESTS
// ============================================================================
