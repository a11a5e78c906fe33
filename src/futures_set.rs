use std::{future::Future, num::NonZeroUsize};

use tokio::task::JoinSet;

use crate::error::Error;

/// Runs the futures on a `JoinSet` with at most `capacity` in flight and
/// returns their outputs in input order. The first error aborts the rest.
pub async fn try_join_ordered<Iterable, FutureOk>(
    iterable: Iterable,
    capacity: NonZeroUsize,
) -> Result<Vec<FutureOk>, Error>
where
    Iterable: IntoIterator,
    Iterable::Item: Future<Output = Result<FutureOk, Error>> + Send + 'static,
    FutureOk: Send + 'static,
{
    let mut pending = iterable.into_iter().enumerate().fuse();
    let mut results: Vec<Option<FutureOk>> = Vec::new();
    let mut set = JoinSet::new();

    for (index, future) in (&mut pending).take(capacity.get()) {
        results.push(None);
        set.spawn(async move { (index, future.await) });
    }

    while let Some(result) = set.join_next().await {
        let (index, output) = result?;
        results[index] = Some(output?);

        if let Some((index, future)) = pending.next() {
            results.push(None);
            set.spawn(async move { (index, future.await) });
        }
    }

    results
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            item.ok_or_else(|| {
                Error::TaskError(format!("future {} produced no output", index))
            })
        })
        .collect()
}
