//! Typed view over an untyped [`FutureHandle`].

use crate::error::FutureError;
use crate::handle::FutureHandle;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;
use types::FutureId;

/// A [`FutureHandle`] with the expected result type fixed at the call site,
/// so extraction reads as `future.get()` instead of turbofished downcasts.
pub struct TypedFuture<T> {
    handle: FutureHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedFuture<T>
where
    T: Clone + Send + fmt::Debug + 'static,
{
    pub fn new(handle: FutureHandle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> FutureId {
        self.handle.id()
    }

    pub fn is_resolved(&self) -> bool {
        self.handle.is_resolved()
    }

    pub fn is_awaited(&self) -> bool {
        self.handle.is_awaited()
    }

    /// Wait (under the configured default limit) and extract the value.
    pub fn get(&self) -> Result<T, FutureError> {
        self.handle.get_result()
    }

    /// Wait up to `timeout`, then extract the value.
    pub fn get_within(&self, timeout: Duration) -> Result<T, FutureError> {
        self.handle.wait_for(Some(timeout))?;
        self.handle.get_result()
    }

    /// Non-blocking peek. `None` while the future is still pending.
    pub fn try_get(&self) -> Option<Result<T, FutureError>> {
        if self.handle.is_resolved() {
            Some(self.handle.get_result())
        } else {
            None
        }
    }

    pub fn handle(&self) -> &FutureHandle {
        &self.handle
    }

    pub fn into_handle(self) -> FutureHandle {
        self.handle
    }
}

impl<T> Clone for TypedFuture<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TypedFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedFuture")
            .field("handle", &self.handle)
            .finish()
    }
}

impl<T> From<FutureHandle> for TypedFuture<T>
where
    T: Clone + Send + fmt::Debug + 'static,
{
    fn from(handle: FutureHandle) -> Self {
        Self::new(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::thread;
    use types::{BodyId, ResultSlot};

    fn detached() -> FutureHandle {
        FutureHandle::detached(FutureId::new(BodyId::new(), 1))
    }

    #[test]
    fn get_waits_for_the_resolver() {
        let handle = detached();
        let future = TypedFuture::<String>::new(handle.clone());

        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.receive_reply(ResultSlot::with_value("done".to_string()))
        });

        assert_eq!(future.get().as_deref(), Ok("done"));
        worker.join().expect("resolver panicked").expect("resolve ok");
    }

    #[test]
    fn try_get_never_blocks() {
        let handle = detached();
        let future = TypedFuture::<u32>::new(handle.clone());
        assert!(future.try_get().is_none());
        assert!(future.is_awaited());

        handle
            .receive_reply(ResultSlot::with_value(11u32))
            .expect("resolve ok");
        assert_eq!(future.try_get(), Some(Ok(11)));
    }

    #[test]
    fn wrong_type_is_reported_not_panicked() {
        let handle = detached();
        handle
            .receive_reply(ResultSlot::with_value(11u32))
            .expect("resolve ok");

        let future = TypedFuture::<String>::new(handle);
        let err = future.get().expect_err("stored type is u32");
        assert_matches!(err, FutureError::TypeMismatch { .. });
    }

    #[test]
    fn get_within_surfaces_the_timeout() {
        let future = TypedFuture::<u8>::new(detached());
        let err = future
            .get_within(Duration::from_millis(30))
            .expect_err("nothing resolves this future");
        assert!(err.is_timeout());
        // The verdict is terminal for the underlying handle too.
        assert!(future.is_resolved());
    }
}
