//! Grouped registration with cooperative cancellation.

use crate::error::ConvertError;
use crate::factory::RecordFactory;
use crate::record::ConversionRecord;
use crate::registry::{AddOutcome, Registry};
use crate::types::TypeKey;
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Shared cancellation flag for a batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Result of committing a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Adds applied before the batch finished or was cancelled.
    pub applied: usize,
    /// Adds never attempted because the token fired.
    pub skipped: usize,
    pub cancelled: bool,
}

struct PendingAdd {
    record: ConversionRecord,
    declaring: Option<TypeKey>,
    allow_disambiguates: bool,
}

/// Called after each applied add with its position in the batch.
type Progress<'a> = Box<dyn FnMut(usize, AddOutcome) + 'a>;

/// Collects adds and applies them on [`AddBuilder::end`].
#[must_use = "a batch does nothing until `end` is called"]
pub struct AddBuilder<'a> {
    registry: &'a Registry,
    pending: Vec<PendingAdd>,
    token: Option<CancelToken>,
    progress: Option<Progress<'a>>,
}

impl<'a> AddBuilder<'a> {
    pub(crate) fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            pending: Vec::new(),
            token: None,
            progress: None,
        }
    }

    /// Stop applying adds once `token` is cancelled.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Observe each add as it is applied.
    pub fn on_applied(mut self, f: impl FnMut(usize, AddOutcome) + 'a) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn add(self, record: ConversionRecord) -> Self {
        self.add_with(record, None, false)
    }

    pub fn add_with(
        mut self,
        record: ConversionRecord,
        declaring: Option<TypeKey>,
        allow_disambiguates: bool,
    ) -> Self {
        self.pending.push(PendingAdd {
            record,
            declaring,
            allow_disambiguates,
        });
        self
    }

    pub fn add_fn<In, Out, F>(self, f: F) -> Self
    where
        In: Any,
        Out: Any + Send + Sync,
        F: Fn(&In) -> Out + Send + Sync + 'static,
    {
        self.add(RecordFactory::from_fn(f))
    }

    pub fn add_pair<A, B, F, G>(self, forward: F, backward: G) -> Self
    where
        A: Any + Send + Sync,
        B: Any + Send + Sync,
        F: Fn(&A) -> B + Send + Sync + 'static,
        G: Fn(&B) -> A + Send + Sync + 'static,
    {
        self.add_fn(forward).add_fn(backward)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Apply the collected adds in order.
    ///
    /// The token is checked before each add. Adds applied before
    /// cancellation stay; the first failing add stops the batch.
    pub fn end(mut self) -> Result<BatchReport, ConvertError> {
        let total = self.pending.len();
        let mut applied = 0;
        for add in std::mem::take(&mut self.pending) {
            if self.token.as_ref().is_some_and(CancelToken::is_cancelled) {
                debug!(applied, skipped = total - applied, "batch cancelled");
                return Ok(BatchReport {
                    applied,
                    skipped: total - applied,
                    cancelled: true,
                });
            }
            let outcome = self
                .registry
                .add(add.record, add.declaring, add.allow_disambiguates)?;
            if let Some(progress) = self.progress.as_mut() {
                progress(applied, outcome);
            }
            applied += 1;
        }
        Ok(BatchReport {
            applied,
            skipped: 0,
            cancelled: false,
        })
    }

    /// Discard the batch. Returns how many adds were dropped.
    pub fn cancel(self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_applies_in_order() {
        let registry = Registry::new();
        let report = registry
            .batch()
            .add_fn(|n: &u8| u16::from(*n))
            .add_pair(|n: &i32| n.to_string(), |s: &String| s.len() as i32)
            .end()
            .unwrap();

        assert_eq!(report.applied, 3);
        assert!(!report.cancelled);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.records()[0].source(), TypeKey::of::<u8>());
    }

    #[test]
    fn test_cancel_discards() {
        let registry = Registry::new();
        let dropped = registry
            .batch()
            .add_fn(|n: &u8| u16::from(*n))
            .cancel();
        assert_eq!(dropped, 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancelled_token_applies_nothing() {
        let registry = Registry::new();
        let token = CancelToken::new();
        token.cancel();

        let report = registry
            .batch()
            .cancel_token(token)
            .add_fn(|n: &u8| u16::from(*n))
            .add_fn(|n: &u8| u32::from(*n))
            .end()
            .unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(report.skipped, 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_between_adds() {
        let registry = Registry::new();
        let token = CancelToken::new();
        let trigger = token.clone();
        let mut seen = Vec::new();

        let report = registry
            .batch()
            .cancel_token(token)
            .on_applied(|i, outcome| {
                seen.push((i, outcome));
                trigger.cancel();
            })
            .add_fn(|n: &u8| u16::from(*n))
            .add_fn(|n: &u8| u32::from(*n))
            .add_fn(|n: &u8| u64::from(*n))
            .end()
            .unwrap();

        assert_eq!(
            report,
            BatchReport {
                applied: 1,
                skipped: 2,
                cancelled: true
            }
        );
        assert_eq!(seen, vec![(0, AddOutcome::Inserted)]);
        assert_eq!(registry.len(), 1);
        assert!(registry.can_convert::<u8, u16>());
        assert!(!registry.can_convert::<u8, u32>());
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let registry = Registry::new();
        let token = CancelToken::new();
        let (applied_tx, applied_rx) = std::sync::mpsc::channel();
        let (resume_tx, resume_rx) = std::sync::mpsc::channel::<()>();

        std::thread::scope(|s| {
            let canceller = token.clone();
            s.spawn(move || {
                applied_rx.recv().unwrap();
                canceller.cancel();
                resume_tx.send(()).unwrap();
            });

            let report = registry
                .batch()
                .cancel_token(token.clone())
                .on_applied(|_, _| {
                    let _ = applied_tx.send(());
                    let _ = resume_rx.recv();
                })
                .add_fn(|n: &u8| u16::from(*n))
                .add_fn(|n: &u8| u32::from(*n))
                .end()
                .unwrap();
            assert!(report.cancelled);
            assert_eq!(report.applied, 1);
            assert_eq!(report.skipped, 1);
        });
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_failure_keeps_applied_adds() {
        let registry = Registry::new();
        let err = registry
            .batch()
            .add_fn(|n: &u8| u16::from(*n))
            .add_fn(|n: &u8| u16::from(*n) + 1)
            .add_fn(|n: &u8| u32::from(*n))
            .end()
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConverterExists);
        assert_eq!(registry.len(), 1);
    }
}
