use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Per-item business logic run by pool workers.
///
/// Every worker owns its own clone of the processor, so a processor holding
/// a storage client gives each worker a dedicated client.
pub(crate) trait Processor: Clone + Send + Sync + 'static {
    type Item: Send + 'static;

    fn process(&self, item: Self::Item) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Run `processor` over `items` with a fixed-size pool of workers.
///
/// The queue is fully populated before any worker is spawned; nothing is
/// enqueued afterwards.  Workers race to dequeue, so no processing order is
/// guaranteed, but each item is delivered to exactly one worker.  Workers in
/// excess of the item count find the queue drained and exit immediately.
///
/// The first processing error cancels the pool: in-flight items finish,
/// idle workers stop dequeuing, and once every worker has terminated all
/// collected errors are returned as a [`MultiError`], first error first.
pub(crate) async fn run_pool<P: Processor>(
    workers: NonZeroUsize,
    items: Vec<P::Item>,
    processor: &P,
) -> Result<(), MultiError> {
    let (sender, receiver) = async_channel::unbounded();
    for item in items {
        sender
            .try_send(item)
            .expect("unbounded queue should accept every item");
    }
    drop(sender);
    let token = CancellationToken::new();
    let mut tasks: JoinSet<anyhow::Result<()>> = JoinSet::new();
    for _ in 0..workers.get() {
        let processor = processor.clone();
        let receiver = receiver.clone();
        let token = token.clone();
        tasks.spawn(async move {
            while let Ok(item) = receiver.recv().await {
                if token.is_cancelled() {
                    return Ok(());
                }
                if let Err(e) = Box::pin(processor.process(item)).await {
                    token.cancel();
                    return Err(e);
                }
            }
            Ok(())
        });
    }
    let mut errors = Vec::new();
    while let Some(outcome) = tasks.join_next().await {
        match outcome {
            Ok(Ok(())) => (),
            Ok(Err(e)) => {
                tracing::error!(error = ?e, "Worker failed");
                errors.push(e);
            }
            Err(e) => {
                tracing::error!(error = ?e, "Worker did not run to completion");
                errors.push(e.into());
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(MultiError(errors))
    }
}

/// Aggregate of the errors raised by pool workers
#[derive(Debug)]
pub(crate) struct MultiError(pub(crate) Vec<anyhow::Error>);

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() > 1 {
            writeln!(f, "{} ERRORS:\n---", self.0.len())?;
        }
        let mut first = true;
        for e in &self.0 {
            if !std::mem::replace(&mut first, false) {
                writeln!(f, "\n---")?;
            }
            write!(f, "{e:?}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}
