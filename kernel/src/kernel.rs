// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Kernel module
//!
//! The [`KernelRef`] is the explicitly constructed, explicitly passed process
//! context of this crate. It owns one slot per type for shared actors and one
//! slot per type for shared services, and guarantees that the factory for a
//! given type runs exactly once per kernel, however many tasks race on first
//! access. It replaces hidden global singletons: components that need a
//! shared instance receive a `KernelRef` and ask it.
//!

use crate::{
    Error,
    actor::{Actor, ActorRef},
    runner::{ActorRunner, StopSender},
};

use tokio::sync::{RwLock, oneshot};
use tokio_util::sync::CancellationToken;

use tracing::{debug, error};

use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    sync::Arc,
};

/// Type-erased slot map keyed by the stored type.
type SlotMap = Arc<RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>;

/// Kernel factory.
pub struct Kernel {}

impl Kernel {
    /// Creates a new kernel bound to the given cancellation token.
    ///
    /// Cancelling the token stops every actor registered on the kernel,
    /// waiting for each to confirm.
    pub fn create(token: CancellationToken) -> KernelRef {
        KernelRef::new(token)
    }
}

/// Reference to a kernel. Cheap to clone; all clones share the same slots.
#[derive(Clone)]
pub struct KernelRef {
    /// The shared actors running on this kernel, keyed by actor type.
    actors: SlotMap,

    /// Shared non-actor services, keyed by service type.
    services: SlotMap,

    /// Stop senders for every actor spawned on this kernel.
    stop_senders: Arc<RwLock<Vec<StopSender>>>,

    token: CancellationToken,
}

impl KernelRef {
    /// Creates a kernel reference and installs the shutdown watcher.
    fn new(token: CancellationToken) -> Self {
        let stop_senders = Arc::new(RwLock::new(Vec::<StopSender>::new()));
        let stop_senders_clone = stop_senders.clone();
        let token_clone = token.clone();

        tokio::spawn(async move {
            token_clone.cancelled().await;
            debug!("Stopping kernel...");
            Self::drain(&stop_senders_clone).await;
        });

        KernelRef {
            actors: Arc::new(RwLock::new(HashMap::new())),
            services: Arc::new(RwLock::new(HashMap::new())),
            stop_senders,
            token,
        }
    }

    /// Stops every registered actor, awaiting each confirmation.
    async fn drain(stop_senders: &Arc<RwLock<Vec<StopSender>>>) {
        let mut senders = stop_senders.write().await;
        while let Some(sender) = senders.pop() {
            let (confirm, confirmed) = oneshot::channel();
            if sender.send(Some(confirm)).await.is_ok() {
                let _ = confirmed.await;
            }
        }
    }

    /// Retrieves the shared actor of type `A`, if one has been created.
    pub async fn get_actor<A>(&self) -> Option<ActorRef<A>>
    where
        A: Actor,
    {
        let actors = self.actors.read().await;
        actors
            .get(&TypeId::of::<A>())
            .and_then(|any| any.downcast_ref::<ActorRef<A>>().cloned())
    }

    /// Returns the shared actor of type `A`, constructing and spawning it on
    /// first access.
    ///
    /// The factory runs at most once per kernel, even under concurrent first
    /// access: a fast read-locked lookup is followed, on miss, by a
    /// write-locked re-check before construction.
    ///
    /// # Errors
    ///
    /// Returns `Error::Start` if the actor's `pre_start` hook fails.
    pub async fn singleton_actor<A, F>(
        &self,
        factory: F,
    ) -> Result<ActorRef<A>, Error>
    where
        A: Actor,
        F: FnOnce() -> A,
    {
        // Fast path: already created.
        if let Some(actor_ref) = self.get_actor::<A>().await {
            return Ok(actor_ref);
        }

        let (mut runner, actor_ref, stop_sender) = {
            let mut actors = self.actors.write().await;
            // Re-check: another task may have won the race.
            if let Some(any) = actors.get(&TypeId::of::<A>()) {
                if let Some(existing) = any.downcast_ref::<ActorRef<A>>() {
                    return Ok(existing.clone());
                }
            }
            let (runner, actor_ref, stop_sender) =
                ActorRunner::create(factory());
            actors.insert(TypeId::of::<A>(), Box::new(actor_ref.clone()));
            (runner, actor_ref, stop_sender)
        };
        {
            let mut senders = self.stop_senders.write().await;
            senders.push(stop_sender);
        }

        let kernel = self.clone();
        let (started, started_receiver) = oneshot::channel::<bool>();
        tokio::spawn(async move {
            runner.init(kernel, Some(started)).await;
        });

        if started_receiver
            .await
            .map_err(|e| Error::Start(e.to_string()))?
        {
            Ok(actor_ref)
        } else {
            error!("Runner can not init {}", type_name::<A>());
            Err(Error::Start(type_name::<A>().to_owned()))
        }
    }

    /// Returns the shared service of type `T`, constructing it on first
    /// access. Construction runs at most once per kernel.
    pub async fn singleton<T, F>(&self, factory: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        {
            let services = self.services.read().await;
            if let Some(any) = services.get(&TypeId::of::<T>()) {
                if let Some(service) = any.downcast_ref::<Arc<T>>() {
                    return service.clone();
                }
            }
        }
        let mut services = self.services.write().await;
        if let Some(any) = services.get(&TypeId::of::<T>()) {
            if let Some(service) = any.downcast_ref::<Arc<T>>() {
                return service.clone();
            }
        }
        let service = Arc::new(factory());
        services.insert(TypeId::of::<T>(), Box::new(service.clone()));
        service
    }

    /// Removes the actor slot for type `A`. Called by the runner when the
    /// actor stops.
    pub(crate) async fn remove_actor<A>(&self)
    where
        A: Actor,
    {
        let mut actors = self.actors.write().await;
        actors.remove(&TypeId::of::<A>());
    }

    /// The kernel's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels the kernel token and stops every registered actor, waiting
    /// for each to confirm.
    pub async fn shutdown(&self) {
        self.token.cancel();
        Self::drain(&self.stop_senders).await;
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::actor::{ActorContext, Message};

    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Clone)]
    struct Probe;

    impl Message for Probe {}

    struct Lonely;

    #[async_trait]
    impl Actor for Lonely {
        type Message = Probe;
        type Response = ();

        async fn handle(
            &mut self,
            _message: Probe,
            _ctx: &mut ActorContext<Self>,
        ) {
        }
    }

    #[tokio::test]
    async fn test_singleton_actor_constructed_once() {
        let kernel = Kernel::create(CancellationToken::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let kernel = kernel.clone();
            handles.push(tokio::spawn(async move {
                kernel
                    .singleton_actor::<Lonely, _>(|| {
                        BUILT.fetch_add(1, Ordering::SeqCst);
                        Lonely
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        kernel.shutdown().await;
        assert!(kernel.get_actor::<Lonely>().await.is_none());
    }
}
