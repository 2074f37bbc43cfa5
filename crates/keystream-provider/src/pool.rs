//! Generic resource pool with three policies
//!
//! Pooled resources are handed out as `Arc<T>`. What happens on return
//! depends on the [`PoolingPolicy`] fixed at construction:
//!
//! | policy           | get                          | put              |
//! |------------------|------------------------------|------------------|
//! | `Reuse`          | pop an idle instance or make | park for reuse   |
//! | `AlwaysCreate`   | always make                  | drop (release)   |
//! | `SingleInstance` | the one shared instance      | nothing          |
//!
//! # Concurrency
//!
//! `Reuse` is backed by a lock-free queue and may be used from many threads
//! without external locking; no ordering is promised on which idle instance
//! comes back. `SingleInstance` hands the same object to every caller and
//! does not serialize access to it. Only use it for resources that are
//! stateless or synchronized internally.

use std::{fmt, ops::Deref, sync::Arc};

use crossbeam_queue::SegQueue;

/// How a [`ResourcePool`] recycles its objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolingPolicy {
    /// Reuse returned objects, create new ones when none are idle
    Reuse,
    /// Create a new object for every request and release it on return
    AlwaysCreate,
    /// Create one object up front and hand it to everyone
    SingleInstance,
}

type Generator<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;

enum Store<T> {
    Reuse(SegQueue<Arc<T>>),
    AlwaysCreate,
    SingleInstance(Arc<T>),
}

/// Pool of expensive resources made by a zero-argument generator.
pub struct ResourcePool<T, E> {
    generator: Generator<T, E>,
    store: Store<T>,
}

impl<T, E> ResourcePool<T, E> {
    /// Create a pool.
    ///
    /// With [`PoolingPolicy::SingleInstance`] the generator runs exactly once,
    /// here, and its error is returned. The other policies never call it
    /// before the first [`get_object`](Self::get_object).
    pub fn new<F>(policy: PoolingPolicy, generator: F) -> Result<Self, E>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        let store = match policy {
            PoolingPolicy::Reuse => Store::Reuse(SegQueue::new()),
            PoolingPolicy::AlwaysCreate => Store::AlwaysCreate,
            PoolingPolicy::SingleInstance => Store::SingleInstance(Arc::new(generator()?)),
        };

        tracing::debug!(?policy, "resource pool created");
        Ok(Self { generator: Box::new(generator), store })
    }

    /// Policy chosen at construction.
    pub fn policy(&self) -> PoolingPolicy {
        match self.store {
            Store::Reuse(_) => PoolingPolicy::Reuse,
            Store::AlwaysCreate => PoolingPolicy::AlwaysCreate,
            Store::SingleInstance(_) => PoolingPolicy::SingleInstance,
        }
    }

    /// Number of parked objects waiting for reuse. Always 0 unless `Reuse`.
    pub fn idle(&self) -> usize {
        match &self.store {
            Store::Reuse(idle) => idle.len(),
            Store::AlwaysCreate | Store::SingleInstance(_) => 0,
        }
    }

    /// Take an object out of the pool.
    ///
    /// # Errors
    ///
    /// Whatever the generator returns when a new object has to be made.
    pub fn get_object(&self) -> Result<Arc<T>, E> {
        match &self.store {
            Store::Reuse(idle) => match idle.pop() {
                Some(item) => Ok(item),
                None => self.generate(),
            },
            Store::AlwaysCreate => self.generate(),
            Store::SingleInstance(instance) => Ok(Arc::clone(instance)),
        }
    }

    /// Give an object back.
    ///
    /// Under `AlwaysCreate` this drops the pool's reference, which releases
    /// the resource once no other reference remains.
    pub fn put_object(&self, item: Arc<T>) {
        match &self.store {
            Store::Reuse(idle) => idle.push(item),
            Store::AlwaysCreate => drop(item),
            Store::SingleInstance(_) => {},
        }
    }

    /// Take an object for the duration of a scope.
    ///
    /// The returned [`PoolLease`] gives the object back when dropped, on every
    /// exit path.
    pub fn lease(&self) -> Result<PoolLease<'_, T, E>, E> {
        let item = self.get_object()?;
        Ok(PoolLease { pool: self, item: Some(item) })
    }

    fn generate(&self) -> Result<Arc<T>, E> {
        tracing::debug!(policy = ?self.policy(), "creating pooled resource");
        (self.generator)().map(Arc::new)
    }
}

impl<T, E> fmt::Debug for ResourcePool<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("policy", &self.policy())
            .field("idle", &self.idle())
            .finish_non_exhaustive()
    }
}

/// A pooled object borrowed for one scope.
pub struct PoolLease<'a, T, E> {
    pool: &'a ResourcePool<T, E>,
    /// Present until the lease is dropped
    item: Option<Arc<T>>,
}

impl<T, E> Deref for PoolLease<'_, T, E> {
    type Target = T;

    fn deref(&self) -> &T {
        let Some(item) = self.item.as_deref() else {
            unreachable!("lease holds its object until dropped");
        };
        item
    }
}

impl<T, E> Drop for PoolLease<'_, T, E> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put_object(item);
        }
    }
}
