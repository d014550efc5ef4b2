use crate::domain::entities::{BookingRecord, QueryFilter};
use crate::domain::errors::BookingError;
use crate::domain::ports::{Clock, DocumentStore};
use crate::domain::query::QueryCompiler;
use crate::domain::token::TokenCodec;
use crate::use_cases::authorize::authorize;

// One page of normalized bookings.
#[derive(Debug)]
pub struct SearchBookingsResponse {
    pub records: Vec<BookingRecord>,
    pub next_cursor: Option<String>,
}

// Booking search use case with injected dependencies.
pub struct SearchBookingsUseCase<C, S> {
    pub clock: C,
    pub codec: TokenCodec,
    pub store: S,
    pub compiler: QueryCompiler,
}

impl<C, S> SearchBookingsUseCase<C, S>
where
    C: Clock,
    S: DocumentStore,
{
    pub async fn execute(
        &self,
        token: Option<&str>,
        filter: QueryFilter,
    ) -> Result<SearchBookingsResponse, BookingError> {
        authorize(&self.codec, token, self.clock.now_epoch_seconds())
            .map_err(|_| BookingError::Unauthorized)?;

        let request = self.compiler.search_request(&filter);
        let page = self.store.search(request).await?;

        let normalizer = self.compiler.normalizer();
        let records = page
            .resources
            .into_iter()
            .map(|resource| BookingRecord::from_resource(resource, &normalizer))
            .collect();

        Ok(SearchBookingsResponse {
            records,
            next_cursor: page.next_cursor,
        })
    }
}
