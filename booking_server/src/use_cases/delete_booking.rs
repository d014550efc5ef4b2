use crate::domain::errors::BookingError;
use crate::domain::ports::{Clock, DocumentStore};
use crate::domain::token::TokenCodec;
use crate::use_cases::authorize::authorize;

const PDF_SUFFIX: &str = ".pdf";

#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted { public_id: String },
    NotFound { attempted_ids: Vec<String> },
}

// Booking deletion use case with injected dependencies.
pub struct DeleteBookingUseCase<C, S> {
    pub clock: C,
    pub codec: TokenCodec,
    pub store: S,
}

impl<C, S> DeleteBookingUseCase<C, S>
where
    C: Clock,
    S: DocumentStore,
{
    pub async fn execute(
        &self,
        token: Option<&str>,
        public_id: &str,
    ) -> Result<DeleteOutcome, BookingError> {
        authorize(&self.codec, token, self.clock.now_epoch_seconds())
            .map_err(|_| BookingError::Unauthorized)?;

        let public_id = public_id.trim();
        if public_id.is_empty() {
            return Err(BookingError::InvalidInput("public_id is required"));
        }

        let attempted_ids = candidate_ids(public_id);
        for candidate in &attempted_ids {
            if self.store.delete(candidate).await? {
                return Ok(DeleteOutcome::Deleted {
                    public_id: candidate.clone(),
                });
            }
        }

        Ok(DeleteOutcome::NotFound { attempted_ids })
    }
}

// Raw uploads are sometimes listed with their extension and stored without it.
fn candidate_ids(public_id: &str) -> Vec<String> {
    let mut ids = vec![public_id.to_string()];
    if let Some(stem) = public_id.strip_suffix(PDF_SUFFIX) {
        if !stem.is_empty() {
            ids.push(stem.to_string());
        }
    }
    ids
}
