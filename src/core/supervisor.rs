//! # Supervisor: runs a group of actors with all-or-nothing lifecycle semantics.
//!
//! The [`Supervisor`] owns the event bus and the [`SubscriberSet`]. [`Supervisor::run`]
//! starts every actor concurrently and waits for the first one to return. Whatever the
//! reason (interrupt, failure, orderly completion), that return is the trigger: the shared
//! [`ShutdownContext`] is cancelled, every actor is asked to stop, and the group is drained
//! under a single deadline.
//!
//! ## Run sequence
//! ```text
//! run(actors)
//!   ├─► spawn start(ctx) per actor ────────────────► ActorStarting
//!   ├─► first join_next() = trigger ──────────────► ActorExited / ActorFailed
//!   ├─► ctx.begin(stop_deadline) ─────────────────► ShutdownRequested
//!   ├─► stop(deadline) on every actor, concurrently ─► StopTimedOut (per overrun, logged only)
//!   ├─► drain remaining start tasks until deadline:
//!   │      ├─ all joined   → AllStoppedWithin
//!   │      └─ deadline hit → abort_all, GraceExceeded(stuck names)
//!   ├─► flush subscribers (queued events handled)
//!   └─► return trigger result
//! ```
//!
//! ## Rules
//! - Only the trigger's outcome is returned; failures observed while draining are
//!   reported as events.
//! - `stop` is called exactly once per actor, always after its `start` was spawned.
//! - `run` returns only after every `start` task has completed or been aborted.
//!
//! ## Example
//! ```rust,no_run
//! use storagevisor::{SignalActor, Supervisor, SupervisorConfig, LogWriter, ActorRef, Subscribe};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), storagevisor::RuntimeError> {
//! let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//! let sup = Supervisor::builder(SupervisorConfig::default())
//!     .with_subscribers(subs)
//!     .build();
//!
//! let actors: Vec<ActorRef> = vec![Arc::new(SignalActor::new())];
//! sup.run(actors).await
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{
    actor::ActorRef, builder::SupervisorBuilder, config::SupervisorConfig,
    shutdown::ShutdownContext,
};
use crate::error::{ActorError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{SubscriberSet, panic_message};

/// Coordinates an actor group, event delivery (via [`SubscriberSet`]) and bounded shutdown.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
}

impl Supervisor {
    /// Returns a builder; see [`SupervisorBuilder`].
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(cfg: SupervisorConfig, bus: Bus, subs: Arc<SubscriberSet>) -> Self {
        Self { cfg, bus, subs }
    }

    /// Configuration of this supervisor.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Receiver of every lifecycle event published from now on.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Runs `actors` until the first one returns, then stops the whole group.
    ///
    /// Returns `Ok(())` when the trigger returned cleanly (e.g. an interrupt), the
    /// trigger's error otherwise. An empty group returns `Ok(())` immediately.
    ///
    /// Every event of the run has been handled by the subscribers when this returns.
    pub async fn run(&self, actors: Vec<ActorRef>) -> Result<(), RuntimeError> {
        if actors.is_empty() {
            return Ok(());
        }

        let done = CancellationToken::new();
        let listener = self.subscriber_listener(done.clone());
        let res = self.drive(actors).await;

        done.cancel();
        let _ = listener.await;
        self.subs.flush().await;
        res
    }

    async fn drive(&self, actors: Vec<ActorRef>) -> Result<(), RuntimeError> {
        debug!(actors = actors.len(), "starting actor group");

        let ctx = ShutdownContext::new();
        let mut set = JoinSet::new();
        let mut names = HashMap::with_capacity(actors.len());
        for actor in &actors {
            let name: Arc<str> = Arc::from(actor.name());
            self.bus
                .publish(Event::new(EventKind::ActorStarting).with_actor(Arc::clone(&name)));

            let (actor, ctx) = (Arc::clone(actor), ctx.clone());
            let handle = set.spawn(async move { actor.start(ctx).await });
            names.insert(handle.id(), name);
        }

        let Some(joined) = set.join_next_with_id().await else {
            return Ok(());
        };
        let (trigger, result) = self.settle(&mut names, joined);

        let deadline = ctx.begin(self.cfg.stop_deadline);
        self.bus.publish(
            Event::new(EventKind::ShutdownRequested)
                .with_actor(trigger)
                .with_deadline(self.cfg.stop_deadline),
        );

        self.stop_all(&actors, deadline).await;
        self.drain(&mut set, &mut names, deadline).await;
        result
    }

    /// Calls `stop` on every actor concurrently, each bounded by the shared deadline.
    async fn stop_all(&self, actors: &[ActorRef], deadline: Instant) {
        let grace = self.cfg.stop_deadline;
        let until = tokio::time::Instant::from_std(deadline);

        let stops = actors.iter().map(|actor| async move {
            let res = match tokio::time::timeout_at(until, actor.stop(grace)).await {
                Ok(res) => res,
                Err(_elapsed) => Err(ActorError::StopTimeout { deadline: grace }),
            };
            (actor.name(), res)
        });

        for (name, res) in futures::future::join_all(stops).await {
            let Err(err) = res else { continue };
            if err.is_stop_timeout() {
                self.bus.publish(
                    Event::new(EventKind::StopTimedOut)
                        .with_actor(name)
                        .with_deadline(grace)
                        .with_reason(err.to_string()),
                );
            } else {
                self.bus.publish(
                    Event::new(EventKind::ActorFailed)
                        .with_actor(name)
                        .with_reason(format!("stop: {err}")),
                );
            }
        }
    }

    /// Waits for the remaining `start` tasks until `deadline`, then aborts the rest.
    async fn drain(
        &self,
        set: &mut JoinSet<Result<(), ActorError>>,
        names: &mut HashMap<Id, Arc<str>>,
        deadline: Instant,
    ) {
        let until = tokio::time::Instant::from_std(deadline);
        let drained = tokio::time::timeout_at(until, async {
            while let Some(joined) = set.join_next_with_id().await {
                // Later outcomes are reported only; the trigger already decided the result.
                let _ = self.settle(names, joined);
            }
        })
        .await;

        if drained.is_ok() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            return;
        }

        let mut stuck: Vec<&str> = names.values().map(|n| n.as_ref()).collect();
        stuck.sort_unstable();
        self.bus.publish(
            Event::new(EventKind::GraceExceeded)
                .with_deadline(self.cfg.stop_deadline)
                .with_reason(stuck.join(", ")),
        );

        set.abort_all();
        while set.join_next().await.is_some() {}
    }

    /// Maps one joined task to its actor name and outcome, publishing the matching event.
    fn settle(
        &self,
        names: &mut HashMap<Id, Arc<str>>,
        joined: Result<(Id, Result<(), ActorError>), JoinError>,
    ) -> (Arc<str>, Result<(), RuntimeError>) {
        let (id, outcome) = match joined {
            Ok((id, Ok(()))) => (id, Ok(())),
            Ok((id, Err(source))) => (id, Err(source)),
            Err(join_err) => {
                let id = join_err.id();
                let reason = if join_err.is_panic() {
                    panic_message(join_err.into_panic().as_ref())
                } else {
                    "task cancelled".to_string()
                };
                let actor = names.remove(&id).unwrap_or_else(|| Arc::from("unknown"));
                self.bus.publish(
                    Event::new(EventKind::ActorFailed)
                        .with_actor(Arc::clone(&actor))
                        .with_reason(format!("panicked: {reason}")),
                );
                let err = RuntimeError::ActorPanicked {
                    actor: actor.to_string(),
                    reason,
                };
                return (actor, Err(err));
            }
        };

        let actor = names.remove(&id).unwrap_or_else(|| Arc::from("unknown"));
        match outcome {
            Ok(()) => {
                self.bus
                    .publish(Event::new(EventKind::ActorExited).with_actor(Arc::clone(&actor)));
                (actor, Ok(()))
            }
            Err(source) => {
                self.bus.publish(
                    Event::new(EventKind::ActorFailed)
                        .with_actor(Arc::clone(&actor))
                        .with_reason(source.to_string()),
                );
                let err = RuntimeError::ActorFailed {
                    actor: actor.to_string(),
                    source,
                };
                (actor, Err(err))
            }
        }
    }

    /// Forwards bus events to the subscriber set until `done`, then flushes what is queued.
    fn subscriber_listener(&self, done: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => return,
                    },
                    _ = done.cancelled() => break,
                }
            }
            loop {
                match rx.try_recv() {
                    Ok(ev) => set.emit(&ev),
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actor::{Actor, ActorState, Lifecycle};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Copy)]
    enum Mode {
        /// Fails after the given delay.
        Fail(Duration),
        /// Returns `Ok` after the given delay.
        Finish(Duration),
        /// Runs until stopped or cancelled.
        UntilStopped,
        /// Ignores every stop request.
        Stubborn,
        /// Runs until cancelled, but `stop` itself overruns.
        SlowStop,
    }

    struct Probe {
        name: &'static str,
        mode: Mode,
        lifecycle: Lifecycle,
        stops: AtomicUsize,
        saw_cancel: AtomicBool,
    }

    impl Probe {
        fn arc(name: &'static str, mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                name,
                mode,
                lifecycle: Lifecycle::new(),
                stops: AtomicUsize::new(0),
                saw_cancel: AtomicBool::new(false),
            })
        }

        fn stops(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Actor for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn state(&self) -> ActorState {
            self.lifecycle.state()
        }

        async fn start(&self, ctx: ShutdownContext) -> Result<(), ActorError> {
            let stopped = self.lifecycle.stop_signal(&ctx);
            self.lifecycle
                .run(async move {
                    match self.mode {
                        Mode::Fail(after) => {
                            tokio::time::sleep(after).await;
                            Err(ActorError::Fail("bind failed".into()))
                        }
                        Mode::Finish(after) => {
                            tokio::time::sleep(after).await;
                            Ok(())
                        }
                        Mode::UntilStopped | Mode::SlowStop => {
                            stopped.await;
                            self.saw_cancel.store(ctx.is_cancelled(), Ordering::SeqCst);
                            Ok(())
                        }
                        Mode::Stubborn => {
                            tokio::time::sleep(Duration::from_secs(30)).await;
                            Ok(())
                        }
                    }
                })
                .await
        }

        async fn stop(&self, deadline: Duration) -> Result<(), ActorError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if let Mode::SlowStop = self.mode {
                tokio::time::sleep(deadline * 4).await;
            }
            self.lifecycle.stop(deadline).await
        }
    }

    fn supervisor(deadline: Duration) -> Supervisor {
        Supervisor::builder(SupervisorConfig::default().with_stop_deadline(deadline)).build()
    }

    fn collect(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn empty_group_returns_ok() {
        let sup = supervisor(Duration::from_millis(100));
        assert!(sup.run(Vec::new()).await.is_ok());
    }

    #[tokio::test]
    async fn failing_actor_stops_the_rest_and_propagates() {
        let a = Probe::arc("A", Mode::Fail(Duration::from_millis(10)));
        let b = Probe::arc("B", Mode::UntilStopped);
        let c = Probe::arc("C", Mode::UntilStopped);
        let sup = supervisor(Duration::from_secs(2));
        let mut rx = sup.events();

        let actors: Vec<ActorRef> = vec![a.clone(), b.clone(), c.clone()];
        let err = sup.run(actors).await.unwrap_err();

        assert_eq!(err.actor(), "A");
        match &err {
            RuntimeError::ActorFailed { source, .. } => assert_eq!(source.to_string(), "bind failed"),
            other => panic!("unexpected error: {other}"),
        }

        for probe in [&a, &b, &c] {
            assert_eq!(probe.stops(), 1, "{} stop count", probe.name);
            assert_eq!(probe.state(), ActorState::Stopped, "{} state", probe.name);
        }
        assert!(b.saw_cancel.load(Ordering::SeqCst));
        assert!(c.saw_cancel.load(Ordering::SeqCst));

        let kinds: Vec<EventKind> = collect(&mut rx).iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&EventKind::ShutdownRequested));
        assert!(kinds.contains(&EventKind::AllStoppedWithin));
        assert!(!kinds.contains(&EventKind::GraceExceeded));
    }

    #[tokio::test]
    async fn clean_trigger_returns_ok_and_everyone_observes_cancellation() {
        let trigger = Probe::arc("signal", Mode::Finish(Duration::from_millis(10)));
        let others: Vec<_> = ["revad", "debug"]
            .into_iter()
            .map(|n| Probe::arc(n, Mode::UntilStopped))
            .collect();
        let sup = supervisor(Duration::from_secs(2));

        let mut actors: Vec<ActorRef> = vec![trigger.clone()];
        actors.extend(others.iter().map(|p| p.clone() as ActorRef));
        sup.run(actors).await.unwrap();

        assert_eq!(trigger.stops(), 1);
        for p in &others {
            assert!(p.saw_cancel.load(Ordering::SeqCst), "{} saw cancel", p.name);
            assert_eq!(p.stops(), 1);
            assert_eq!(p.state(), ActorState::Stopped);
        }
    }

    #[tokio::test]
    async fn overrunning_stop_is_bounded_by_deadline() {
        let deadline = Duration::from_millis(200);
        let a = Probe::arc("A", Mode::Fail(Duration::from_millis(10)));
        let b = Probe::arc("B", Mode::Stubborn);
        let c = Probe::arc("C", Mode::SlowStop);
        let sup = supervisor(deadline);
        let mut rx = sup.events();

        let started = std::time::Instant::now();
        let actors: Vec<ActorRef> = vec![a.clone(), b.clone(), c.clone()];
        let res = sup.run(actors).await;
        let elapsed = started.elapsed();

        assert!(res.is_err());
        assert!(elapsed >= deadline, "returned before the deadline: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "not bounded: {elapsed:?}");

        // The stubborn actor was aborted; its lifecycle still ends stopped.
        assert_eq!(b.state(), ActorState::Stopped);
        assert_eq!(c.stops(), 1);

        let events = collect(&mut rx);
        let grace = events
            .iter()
            .find(|e| e.kind == EventKind::GraceExceeded)
            .expect("grace exceeded event");
        assert_eq!(grace.reason.as_deref(), Some("B"));
        assert!(
            events
                .iter()
                .any(|e| e.kind == EventKind::StopTimedOut && e.actor.as_deref() == Some("C"))
        );
    }

    #[tokio::test]
    async fn subscribers_have_seen_every_event_when_run_returns() {
        use crate::subscribers::Subscribe;
        use std::sync::Mutex;

        #[derive(Default)]
        struct Recorder(Mutex<Vec<(EventKind, Option<String>)>>);

        #[async_trait]
        impl Subscribe for Recorder {
            async fn on_event(&self, ev: &Event) {
                tokio::task::yield_now().await;
                let actor = ev.actor.as_deref().map(str::to_string);
                self.0.lock().unwrap().push((ev.kind, actor));
            }
            fn name(&self) -> &'static str {
                "recorder"
            }
        }

        let rec = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![rec.clone()];
        let sup = Supervisor::builder(
            SupervisorConfig::default().with_stop_deadline(Duration::from_millis(100)),
        )
        .with_subscribers(subs)
        .build();

        let actors: Vec<ActorRef> = vec![
            Probe::arc("A", Mode::Fail(Duration::ZERO)),
            Probe::arc("C", Mode::SlowStop),
        ];
        assert!(sup.run(actors).await.is_err());

        let seen = rec.0.lock().unwrap().clone();
        let has = |kind: EventKind, actor: &str| {
            seen.iter()
                .any(|(k, a)| *k == kind && a.as_deref() == Some(actor))
        };
        assert!(has(EventKind::ActorFailed, "A"), "{seen:?}");
        assert!(has(EventKind::StopTimedOut, "C"), "{seen:?}");
        assert!(seen.iter().any(|(k, _)| *k == EventKind::ShutdownRequested));
    }

    #[tokio::test]
    async fn panicking_trigger_is_reported() {
        struct Panics(Lifecycle);

        fn crash() -> Result<(), ActorError> {
            panic!("listener crashed")
        }

        #[async_trait]
        impl Actor for Panics {
            fn name(&self) -> &str {
                "panics"
            }
            fn state(&self) -> ActorState {
                self.0.state()
            }
            async fn start(&self, _ctx: ShutdownContext) -> Result<(), ActorError> {
                self.0.run(async { crash() }).await
            }
            async fn stop(&self, deadline: Duration) -> Result<(), ActorError> {
                self.0.stop(deadline).await
            }
        }

        let other = Probe::arc("other", Mode::UntilStopped);
        let sup = supervisor(Duration::from_secs(1));
        let actors: Vec<ActorRef> = vec![Arc::new(Panics(Lifecycle::new())), other.clone()];

        match sup.run(actors).await {
            Err(RuntimeError::ActorPanicked { actor, reason }) => {
                assert_eq!(actor, "panics");
                assert_eq!(reason, "listener crashed");
            }
            res => panic!("unexpected result: {res:?}"),
        }
        assert_eq!(other.state(), ActorState::Stopped);
    }
}
