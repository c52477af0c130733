//! Facilities for reporting reconciliation outcomes
//!
//! The primary entry point is [`report_reconciled`].

use std::error::Error;

use crate::{reconcile::Trigger, status::UnitStatus};

/// [`Error`] extensions that help report reconciliation errors
///
/// This should be implemented for reconciler error types.
pub trait ReconcilerError: Error {
    /// `PascalCase`d name for the error category
    ///
    /// This can typically be implemented by delegating to [`strum::EnumDiscriminants`] and
    /// [`strum::IntoStaticStr`].
    fn category(&self) -> &'static str;
}

/// Renders `error` together with all of its sources, separated by `: `.
pub fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        message.push_str(": ");
        message.push_str(&source.to_string());
        current = source.source();
    }
    message
}

/// Reports the outcome of handling `trigger` to the current [`tracing::Subscriber`].
pub fn report_reconciled<E>(trigger: Trigger, result: &Result<(), E>, status: &UnitStatus)
where
    E: ReconcilerError,
{
    match result {
        Ok(()) => {
            tracing::info!(%trigger, %status, "Reconciled unit");
        }
        Err(err) => {
            tracing::warn!(
                %trigger,
                %status,
                error.category = err.category(),
                error = error_chain(err),
                "Failed to reconcile unit",
            );
        }
    }
}
