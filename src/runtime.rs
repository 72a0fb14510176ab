//! Generic component runtime — shared scaffolding for the proxy's
//! concurrently-running units (one Application Supervisor per configured
//! application).
//!
//! # Component model
//!
//! A [`Component`] is any independently-runnable unit owned by `main`: here,
//! an Application Supervisor. `main` constructs components with their
//! shared state already captured inside them, then hands them to
//! [`spawn_components`].
//!
//! # SubsystemHandle
//!
//! [`spawn_components`] returns a [`SubsystemHandle`] that the caller
//! `.await`s, blocking until every component finishes. Any component error
//! or panic cancels the shared [`CancellationToken`] so siblings shut down
//! cooperatively rather than leaving half the applications still consuming
//! events after one of them has died.

use std::future::Future;
use std::pin::Pin;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::AppError;

/// A boxed, owned future returned by [`Component::run`].
pub type ComponentFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

/// A self-contained, concurrently-runnable unit owned by `main`.
///
/// Implementors capture all shared state (`Arc<AppContext>`, shutdown
/// token, ...) at construction time. [`Component::run`] is called once by
/// [`spawn_components`] and should run until `shutdown` is cancelled or the
/// component's own work is done.
pub trait Component: Send + 'static {
    /// Stable identifier used in log messages.
    fn id(&self) -> &str;

    /// Consume the component and return its async run-loop as a boxed
    /// future. Must be `Send + 'static` so it can be spawned on the Tokio
    /// thread pool.
    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture;
}

/// An opaque handle to a running set of components.
pub struct SubsystemHandle {
    inner: JoinHandle<Result<(), AppError>>,
}

impl SubsystemHandle {
    /// Await all components and return the first error, if any.
    pub async fn join(self) -> Result<(), AppError> {
        match self.inner.await {
            Ok(result) => result,
            Err(e) => Err(AppError::Bus(format!("component task panicked: {e}"))),
        }
    }
}

/// Spawn each [`Component`] as an independent Tokio task and return a
/// [`SubsystemHandle`] that resolves when all components have exited.
///
/// If any component returns `Err` or panics, `shutdown` is cancelled so all
/// siblings receive the cancellation signal and stop cooperatively; the
/// manager task then drains the remaining components and returns the first
/// error encountered.
pub fn spawn_components(components: Vec<Box<dyn Component>>, shutdown: CancellationToken) -> SubsystemHandle {
    let handle = tokio::spawn(async move {
        let mut set: JoinSet<Result<(), AppError>> = JoinSet::new();

        for component in components {
            let id = component.id().to_string();
            let shutdown = shutdown.clone();
            debug!(component = %id, "spawning component");
            set.spawn(component.run(shutdown));
        }

        let mut first_err: Option<AppError> = None;

        while let Some(res) = set.join_next().await {
            match res {
                Err(e) => {
                    error!("component panicked: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert_with(|| AppError::Bus(format!("component panicked: {e}")));
                }
                Ok(Err(e)) => {
                    error!("component error: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert(e);
                }
                Ok(Ok(())) => {}
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    });

    SubsystemHandle { inner: handle }
}
