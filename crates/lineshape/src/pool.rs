use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::mapper::{BoundToken, Mapper};

/// Forward cursor over a mapper's token sequence.
///
/// Owned by one in-flight decode at a time. The counters are atomics so a
/// worker can be inspected through a shared reference.
pub struct Worker<T> {
    id: usize,
    position: AtomicUsize,
    cached_length: AtomicUsize,
    mapper: Arc<Mapper<T>>,
}

impl<T> Worker<T> {
    fn new(id: usize, mapper: Arc<Mapper<T>>) -> Self {
        Self {
            id,
            position: AtomicUsize::new(0),
            cached_length: AtomicUsize::new(mapper.len()),
            mapper,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn mapper(&self) -> &Mapper<T> {
        &self.mapper
    }

    /// Rewind to the first token and return it.
    pub fn first(&self) -> Option<BoundToken<'_, T>> {
        self.position.store(0, Ordering::Relaxed);
        self.next()
    }

    /// Return the token under the cursor and advance, `None` once exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Option<BoundToken<'_, T>> {
        let length = self.cached_length.load(Ordering::Relaxed);
        let position = self
            .position
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| (p < length).then_some(p + 1))
            .ok()?;
        self.mapper.token(position)
    }

    /// Number of tokens handed out since the last rewind.
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.position.store(0, Ordering::Relaxed);
        self.cached_length.store(self.mapper.len(), Ordering::Relaxed);
    }
}

/// Bounded set of reusable workers sharing one mapper.
///
/// Callers beyond `capacity` block in [`WorkerPool::acquire`] until a guard
/// is dropped.
pub struct WorkerPool<T> {
    free: Mutex<Vec<Worker<T>>>,
    available: Condvar,
    capacity: usize,
}

impl<T> WorkerPool<T> {
    pub fn new(mapper: Arc<Mapper<T>>, capacity: usize) -> Self {
        let free = (0..capacity)
            .map(|id| Worker::new(id, Arc::clone(&mapper)))
            .collect();
        debug!(capacity, "worker pool created");
        Self {
            free: Mutex::new(free),
            available: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Workers currently free.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    /// Check out a worker, blocking while all of them are in use.
    pub fn acquire(&self) -> WorkerGuard<'_, T> {
        let mut free = self.free.lock();
        loop {
            if let Some(worker) = free.pop() {
                return self.guard(worker);
            }
            self.available.wait(&mut free);
        }
    }

    pub fn try_acquire(&self) -> Option<WorkerGuard<'_, T>> {
        let worker = self.free.lock().pop()?;
        Some(self.guard(worker))
    }

    /// Like [`WorkerPool::acquire`] but gives up after `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<WorkerGuard<'_, T>> {
        let deadline = Instant::now() + timeout;
        let mut free = self.free.lock();
        loop {
            if let Some(worker) = free.pop() {
                return Some(self.guard(worker));
            }
            if self.available.wait_until(&mut free, deadline).timed_out() {
                return free.pop().map(|worker| self.guard(worker));
            }
        }
    }

    fn guard(&self, worker: Worker<T>) -> WorkerGuard<'_, T> {
        WorkerGuard {
            pool: self,
            worker: Some(worker),
        }
    }

    fn release(&self, worker: Worker<T>) {
        worker.reset();
        self.free.lock().push(worker);
        self.available.notify_one();
    }
}

/// Checked-out worker, returned to its pool on drop.
pub struct WorkerGuard<'p, T> {
    pool: &'p WorkerPool<T>,
    worker: Option<Worker<T>>,
}

impl<T> Deref for WorkerGuard<'_, T> {
    type Target = Worker<T>;

    fn deref(&self) -> &Worker<T> {
        // only taken in drop
        self.worker.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T> Drop for WorkerGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.pool.release(worker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecoderConfig;
    use crate::schema::{Record, SchemaBuilder};
    use std::sync::mpsc;

    #[derive(Default)]
    struct Pair {
        a: String,
        b: String,
    }

    impl Record for Pair {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .field("a", "a", |p: &mut Pair| &mut p.a)
                .field("b", "b", |p: &mut Pair| &mut p.b);
        }
    }

    fn pool(capacity: usize) -> WorkerPool<Pair> {
        let mapper = Mapper::build(":a :- :b", &DecoderConfig::default()).unwrap();
        WorkerPool::new(Arc::new(mapper), capacity)
    }

    #[test]
    fn test_worker_cursor_walks_tokens() {
        let pool = pool(1);
        let worker = pool.acquire();

        assert_eq!(worker.first().unwrap().spec.name, "a");
        assert_eq!(worker.next().unwrap().spec.name, "-");
        assert_eq!(worker.next().unwrap().spec.name, "b");
        assert!(worker.next().is_none());
        assert!(worker.next().is_none());
        assert_eq!(worker.position(), 3);

        // rewinds
        assert_eq!(worker.first().unwrap().spec.name, "a");
        assert_eq!(worker.position(), 1);
    }

    #[test]
    fn test_worker_cursor_hands_out_each_token_once() {
        let pool = pool(1);
        let worker = pool.acquire();
        let seen = Mutex::new(Vec::new());

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    while let Some(token) = worker.next() {
                        seen.lock().push(token.spec.position);
                    }
                });
            }
        });

        let mut seen = seen.into_inner();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(worker.position(), 3);
        assert!(worker.next().is_none());
    }

    #[test]
    fn test_guard_returns_worker_reset() {
        let pool = pool(2);
        assert_eq!(pool.available(), 2);

        {
            let worker = pool.acquire();
            worker.first();
            worker.next();
            assert_eq!(pool.available(), 1);
            assert_eq!(pool.in_use(), 1);
        }

        assert_eq!(pool.available(), 2);
        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(a.position(), 0);
        assert_eq!(b.position(), 0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_try_acquire_when_exhausted() {
        let pool = pool(1);
        let held = pool.try_acquire();
        assert!(held.is_some());
        assert!(pool.try_acquire().is_none());
        drop(held);
        assert!(pool.try_acquire().is_some());
    }

    #[test]
    fn test_acquire_timeout_expires() {
        let pool = pool(1);
        let _held = pool.acquire();
        assert!(pool.acquire_timeout(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn test_exhausted_pool_blocks_until_release() {
        let pool = pool(1);
        let held = pool.acquire();
        let (tx, rx) = mpsc::channel();
        let shared = &pool;

        std::thread::scope(|s| {
            s.spawn(move || {
                let worker = shared.acquire();
                tx.send(worker.id()).unwrap();
            });

            // still blocked while the only worker is held
            assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
            let id = held.id();
            drop(held);
            assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), id);
        });

        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_concurrent_acquire_never_exceeds_capacity() {
        let pool = pool(3);
        let peak = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let worker = pool.acquire();
                        peak.fetch_max(pool.in_use(), Ordering::Relaxed);
                        let mut n = 0;
                        let mut token = worker.first();
                        while token.is_some() {
                            n += 1;
                            token = worker.next();
                        }
                        assert_eq!(n, 3);
                    }
                });
            }
        });

        assert!(peak.load(Ordering::Relaxed) <= 3);
        assert_eq!(pool.available(), 3);
    }
}
