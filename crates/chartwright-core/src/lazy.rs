//! Race-tolerant lazy initialization
//!
//! [`LazyHandle`] defers building an expensive value (typically a remote
//! client) until it is first needed, then hands out the same value forever.
//!
//! The factory runs outside of any lock. When several callers hit an
//! unresolved handle at the same time, each of them may run the factory;
//! the first value to be published wins and every caller, including the
//! ones whose construction lost the race, gets that value back. Losing
//! values are dropped. Factories must therefore be cheap enough or
//! idempotent enough to be called more than once.
//!
//! ```
//! use chartwright_core::LazyHandle;
//!
//! let handle = LazyHandle::new(|| String::from("client"));
//! assert!(!handle.is_resolved());
//! assert_eq!(handle.get(), "client");
//! assert!(handle.is_resolved());
//! ```

use once_cell::race::OnceBox;
use std::convert::Infallible;
use std::fmt;

type Factory<T, E> = Box<dyn Fn() -> std::result::Result<T, E> + Send + Sync>;

/// Lazily built value that converges on a single instance
pub struct LazyHandle<T, E = Infallible> {
    cell: OnceBox<T>,
    factory: Factory<T, E>,
}

impl<T> LazyHandle<T, Infallible> {
    /// Create a handle around an infallible factory
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            cell: OnceBox::new(),
            factory: Box::new(move || Ok(factory())),
        }
    }

    /// Get the value, building it on first access
    pub fn get(&self) -> &T {
        match self.try_get() {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<T, E> LazyHandle<T, E> {
    /// Create a handle around a factory that can fail
    ///
    /// Failures are returned to the caller and not cached: the next access
    /// runs the factory again.
    pub fn fallible<F>(factory: F) -> Self
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
    {
        Self {
            cell: OnceBox::new(),
            factory: Box::new(factory),
        }
    }

    /// Get the value, building it on first access
    pub fn try_get(&self) -> std::result::Result<&T, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let built = Box::new((self.factory)()?);
        let candidate: *const T = &*built;
        let published = self.cell.get_or_init(|| built);
        if !std::ptr::eq(candidate, published) {
            tracing::debug!("lazy handle lost construction race, using the published value");
        }
        Ok(published)
    }

    /// Whether a value has been published
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: fmt::Debug, E> fmt::Debug for LazyHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyHandle")
            .field("value", &self.cell.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_get_invokes_factory_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let handle = LazyHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            1
        });

        let sum: i32 = (0..10).map(|_| *handle.get()).sum();

        assert_eq!(sum, 10);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_access_converges_on_published_value() {
        let count = Arc::new(AtomicUsize::new(0));
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = std::sync::Mutex::new(entered_tx);
        let release_rx = std::sync::Mutex::new(release_rx);

        let counter = Arc::clone(&count);
        let handle = Arc::new(LazyHandle::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                // First construction: park until the main thread has resolved the handle
                entered_tx.lock().unwrap().send(()).unwrap();
                let _ = release_rx
                    .lock()
                    .unwrap()
                    .recv_timeout(Duration::from_secs(5));
                return 1337;
            }
            1
        }));

        let background = {
            let handle = Arc::clone(&handle);
            std::thread::spawn(move || *handle.get())
        };
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("background construction never started");

        let sum: i32 = (0..10).map(|_| *handle.get()).sum();
        release_tx.send(()).unwrap();
        let concurrent = background.join().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(sum, 10);
        assert_eq!(concurrent, 1);
        assert_eq!(*handle.get(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_construction_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let handle: LazyHandle<String, String> = LazyHandle::fallible(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("connection refused".to_string())
            } else {
                Ok("session".to_string())
            }
        });

        assert_eq!(handle.try_get().unwrap_err(), "connection refused");
        assert!(!handle.is_resolved());
        assert_eq!(handle.try_get().unwrap(), "session");
        assert_eq!(handle.try_get().unwrap(), "session");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_debug_shows_resolution() {
        let handle = LazyHandle::new(|| 7u8);
        assert!(format!("{:?}", handle).contains("None"));
        handle.get();
        assert!(format!("{:?}", handle).contains("Some(7)"));
    }
}
