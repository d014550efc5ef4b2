use serde_json::Value;

use crate::domain::entities::BookingRecord;
use crate::domain::errors::BookingError;
use crate::domain::normalizer::FieldNormalizer;
use crate::domain::ports::{Clock, DocumentStore};
use crate::domain::token::TokenCodec;
use crate::use_cases::authorize::authorize;

// Rewrites a booking's context with canonical keys, merging the admin's edits over it.
pub struct UpdateContextUseCase<C, S> {
    pub clock: C,
    pub codec: TokenCodec,
    pub store: S,
    pub normalizer: FieldNormalizer,
}

impl<C, S> UpdateContextUseCase<C, S>
where
    C: Clock,
    S: DocumentStore,
{
    pub async fn execute(
        &self,
        token: Option<&str>,
        public_id: &str,
        context: Value,
    ) -> Result<BookingRecord, BookingError> {
        authorize(&self.codec, token, self.clock.now_epoch_seconds())
            .map_err(|_| BookingError::Unauthorized)?;

        let public_id = public_id.trim();
        if public_id.is_empty() {
            return Err(BookingError::InvalidInput("public_id is required"));
        }
        let Value::Object(incoming) = context else {
            return Err(BookingError::InvalidInput("context must be an object"));
        };

        let existing = self
            .store
            .fetch(public_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        let table = self.normalizer.table();
        let mut merged = self
            .normalizer
            .normalize(&existing.raw_fields())
            .to_raw(table);
        // Incoming keys win. A null extra survives the overlay and is dropped when flattened.
        merged.extend(self.normalizer.normalize(&incoming).to_raw(table));

        let flat = self.normalizer.normalize(&merged).to_flat_context(table);
        let updated = self.store.update_context(public_id, &flat).await?;

        Ok(BookingRecord::from_resource(updated, &self.normalizer))
    }
}
