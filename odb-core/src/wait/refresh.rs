//! Status projection for wait refresh functions

use std::future::Future;

use crate::provider::ProviderResult;

/// One poll result: `None` while the resource is not visible
pub type Observation<R, L> = Option<(R, L)>;

/// Turn a fetch into a wait refresh step.
///
/// A not-found error from `fetch` becomes `Ok(None)`; other errors are
/// returned unchanged. On success `label_of` projects the record onto its
/// status label (top-level status, or the status of one embedded
/// sub-capability).
pub async fn project_status<R, L, Fut, P>(fetch: Fut, label_of: P) -> ProviderResult<Observation<R, L>>
where
    Fut: Future<Output = ProviderResult<R>>,
    P: FnOnce(&R) -> ProviderResult<L>,
{
    match fetch.await {
        Ok(record) => {
            let label = label_of(&record)?;
            Ok(Some((record, label)))
        }
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
