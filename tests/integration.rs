use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

use session_router::boundary::{BoundaryHandle, IsolationBoundary, LogicalBoundary, TaskBoundary};
use session_router::call::{CallEnvelope, CallResult, FaultKind};
use session_router::error::{BoundaryError, RoutingError, ServiceError};
use session_router::middleware::rate_limit::RateLimit;
use session_router::service::{
    CounterService, RemoteService, ServiceFactory, ServiceRef, service_factory,
};
use session_router::transport::{ChannelRegistry, InProcBinding, ObjectDirectory};
use session_router::{ClientProxy, IdleTimeout, SessionRegistry, TcpHost};

const NODE: &str = "node-a";
const TARGET: &str = "inproc://node-a/calc";

/// Logical boundary that counts lifecycle calls and can be made slow.
struct CountingBoundary {
    inner: LogicalBoundary,
    creates: AtomicUsize,
    teardowns: AtomicUsize,
    create_delay: Duration,
    create_started: Notify,
}

impl CountingBoundary {
    fn new(create_delay: Duration) -> Self {
        Self {
            inner: LogicalBoundary::new(),
            creates: AtomicUsize::new(0),
            teardowns: AtomicUsize::new(0),
            create_delay,
            create_started: Notify::new(),
        }
    }

    fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IsolationBoundary for CountingBoundary {
    fn kind(&self) -> &'static str {
        "counting"
    }

    async fn create(&self, client_id: &str) -> Result<BoundaryHandle, BoundaryError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.create_started.notify_one();
        if !self.create_delay.is_zero() {
            sleep(self.create_delay).await;
        }
        self.inner.create(client_id).await
    }

    async fn instantiate(
        &self,
        handle: &BoundaryHandle,
        factory: &ServiceFactory,
    ) -> Result<ServiceRef, BoundaryError> {
        self.inner.instantiate(handle, factory).await
    }

    async fn teardown(&self, handle: BoundaryHandle) -> Result<(), BoundaryError> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        self.inner.teardown(handle).await
    }
}

struct Harness {
    registry: SessionRegistry,
    directory: Arc<ObjectDirectory>,
    channels: ChannelRegistry,
    boundary: Arc<CountingBoundary>,
    factory_calls: Arc<AtomicUsize>,
}

impl Harness {
    async fn new(idle_timeout: IdleTimeout, create_delay: Duration) -> Self {
        Self::with_rate_limit(idle_timeout, create_delay, None).await
    }

    async fn with_rate_limit(
        idle_timeout: IdleTimeout,
        create_delay: Duration,
        rate_limit: Option<RateLimit>,
    ) -> Self {
        let directory = Arc::new(ObjectDirectory::new(NODE));
        let inproc = Arc::new(InProcBinding::new());
        inproc.add_node(Arc::clone(&directory));
        let channels = ChannelRegistry::with_defaults(inproc);

        let boundary = Arc::new(CountingBoundary::new(create_delay));
        let factory_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&factory_calls);
        let factory = service_factory(move |client_id| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(CounterService::new(client_id))
        });

        let mut builder = SessionRegistry::builder("calc", factory)
            .idle_timeout(idle_timeout)
            .boundary(Arc::clone(&boundary) as Arc<dyn IsolationBoundary>)
            .directory(Arc::clone(&directory));
        if let Some(rate_limit) = rate_limit {
            builder = builder.rate_limit(rate_limit);
        }
        let registry = builder.build().await.unwrap();

        Self {
            registry,
            directory,
            channels,
            boundary,
            factory_calls,
        }
    }

    fn proxy(&self, client_id: &str) -> ClientProxy {
        ClientProxy::new(TARGET, client_id, &self.channels).unwrap()
    }

    fn factory_calls(&self) -> usize {
        self.factory_calls.load(Ordering::SeqCst)
    }
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_get_or_create_builds_one_session() {
    let harness = Harness::new(IdleTimeout::Disabled, millis(20)).await;

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let registry = harness.registry.clone();
        tasks.push(tokio::spawn(async move {
            registry.get_or_create("shared").await.unwrap()
        }));
    }

    let mut sessions = Vec::new();
    for task in tasks {
        sessions.push(task.await.unwrap());
    }

    assert_eq!(harness.factory_calls(), 1);
    assert_eq!(harness.boundary.creates(), 1);
    assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
    assert_eq!(harness.registry.session_count().await, 1);

    harness.registry.dispose().await;
}

#[test]
fn test_two_threads_racing_on_c2_share_one_session() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let harness = runtime.block_on(Harness::new(IdleTimeout::Disabled, millis(30)));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let registry = harness.registry.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let local = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                barrier.wait();
                local.block_on(async {
                    let session = registry.get_or_create("c2").await.unwrap();
                    session.bridge().unwrap()
                })
            })
        })
        .collect();

    let bridges: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(harness.factory_calls(), 1);
    assert_eq!(harness.boundary.creates(), 1);
    assert!(Arc::ptr_eq(&bridges[0], &bridges[1]));

    runtime.block_on(harness.registry.dispose());
}

#[tokio::test(start_paused = true)]
async fn test_second_call_resets_idle_deadline() {
    let harness = Harness::new(IdleTimeout::After(millis(200)), Duration::ZERO).await;
    let proxy = harness.proxy("c1");

    assert_eq!(proxy.call("increment", Value::Null).await, Ok(json!(1)));
    sleep(millis(150)).await;
    assert_eq!(proxy.call("increment", Value::Null).await, Ok(json!(2)));

    sleep(millis(150)).await; // t = 300ms
    assert!(harness.registry.contains("c1").await);

    sleep(millis(200)).await; // t = 500ms
    assert!(!harness.registry.contains("c1").await);
    assert_eq!(harness.boundary.teardowns(), 1);
    assert_eq!(harness.registry.stats().await.sessions_evicted, 1);
}

#[tokio::test(start_paused = true)]
async fn test_every_access_pushes_eviction_back() {
    let harness = Harness::new(IdleTimeout::After(millis(200)), Duration::ZERO).await;
    let proxy = harness.proxy("steady");

    for _ in 0..5 {
        proxy.call("increment", Value::Null).await.unwrap();
        sleep(millis(150)).await;
    }
    // Last access at 600ms; deadline 800ms.
    assert!(harness.registry.contains("steady").await);
    assert_eq!(proxy.call("get", Value::Null).await, Ok(json!(5)));

    sleep(millis(250)).await;
    assert!(!harness.registry.contains("steady").await);
    assert_eq!(harness.factory_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_evicted_client_gets_a_fresh_session() {
    let harness = Harness::new(IdleTimeout::After(millis(100)), Duration::ZERO).await;
    let proxy = harness.proxy("returning");

    proxy.call("increment", json!(10)).await.unwrap();
    sleep(millis(150)).await;
    assert!(!harness.registry.contains("returning").await);

    assert_eq!(proxy.call("increment", Value::Null).await, Ok(json!(1)));
    let stats = harness.registry.stats().await;
    assert_eq!(stats.sessions_created, 2);
    assert_eq!(stats.sessions_evicted, 1);
    assert_eq!(stats.live_sessions, 1);

    harness.registry.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_disabled_timeout_never_evicts() {
    let harness = Harness::new(IdleTimeout::Disabled, Duration::ZERO).await;
    let proxy = harness.proxy("forever");

    proxy.call("increment", Value::Null).await.unwrap();
    sleep(Duration::from_secs(24 * 60 * 60)).await;

    assert!(harness.registry.contains("forever").await);
    assert_eq!(proxy.call("get", Value::Null).await, Ok(json!(1)));
    assert_eq!(harness.boundary.teardowns(), 0);

    harness.registry.dispose().await;
    assert_eq!(harness.boundary.teardowns(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_during_creation_tears_new_session_down() {
    let harness = Harness::new(IdleTimeout::Disabled, millis(50)).await;

    let registry = harness.registry.clone();
    let creating = tokio::spawn(async move { registry.get_or_create("late").await });

    harness.boundary.create_started.notified().await;
    harness.registry.dispose().await;

    let session = creating.await.unwrap().unwrap();
    assert!(session.is_disposed());
    assert!(matches!(session.bridge(), Err(RoutingError::Disposed(_))));
    assert_eq!(harness.boundary.creates(), 1);
    assert_eq!(harness.boundary.teardowns(), 1);
    assert_eq!(harness.boundary.inner.live_count(), 0);
    assert_eq!(harness.registry.session_count().await, 0);
}

#[tokio::test]
async fn test_routed_call_without_identity_is_rejected() {
    let harness = Harness::new(IdleTimeout::Disabled, Duration::ZERO).await;

    let anonymous = CallEnvelope::new("increment", Value::Null).with_destination(TARGET);
    let fault = harness
        .directory
        .dispatch("/calc", anonymous)
        .await
        .unwrap_err();
    assert_eq!(fault.kind, FaultKind::MissingClientIdentity);

    let blank = CallEnvelope::new("increment", Value::Null)
        .with_destination(TARGET)
        .with_context(session_router::CLIENT_ID_KEY, json!(""));
    let fault = harness.directory.dispatch("/calc", blank).await.unwrap_err();
    assert_eq!(fault.kind, FaultKind::MissingClientIdentity);

    assert_eq!(harness.factory_calls(), 0);
    assert_eq!(harness.boundary.creates(), 0);
    assert_eq!(harness.registry.session_count().await, 0);
}

#[tokio::test]
async fn test_calls_reach_only_their_own_client_session() {
    let harness = Harness::new(IdleTimeout::Disabled, Duration::ZERO).await;
    let alice = harness.proxy("A");
    let bob = harness.proxy("B");

    for _ in 0..3 {
        alice.call("increment", Value::Null).await.unwrap();
    }
    bob.call("increment", Value::Null).await.unwrap();

    assert_eq!(alice.call("whoami", Value::Null).await, Ok(json!("A")));
    assert_eq!(bob.call("whoami", Value::Null).await, Ok(json!("B")));
    assert_eq!(alice.call("get", Value::Null).await, Ok(json!(3)));
    assert_eq!(bob.call("get", Value::Null).await, Ok(json!(1)));

    let sessions = harness
        .directory
        .dispatch("/calc", CallEnvelope::new("registry.sessions", Value::Null))
        .await;
    assert_eq!(sessions, Ok(json!(["A", "B"])));

    harness.registry.dispose().await;
}

#[tokio::test]
async fn test_unrouted_calls_reach_the_registry_endpoint() {
    let harness = Harness::new(IdleTimeout::Disabled, Duration::ZERO).await;
    harness.proxy("A").call("increment", Value::Null).await.unwrap();

    let ping = harness
        .directory
        .dispatch("/calc", CallEnvelope::new("registry.ping", Value::Null))
        .await;
    assert_eq!(ping, Ok(json!("pong")));

    let stats = harness
        .directory
        .dispatch("/calc", CallEnvelope::new("registry.stats", Value::Null))
        .await
        .unwrap();
    assert_eq!(stats["live_sessions"], json!(1));
    assert_eq!(stats["sessions_created"], json!(1));

    let unknown = harness
        .directory
        .dispatch("/calc", CallEnvelope::new("registry.reboot", Value::Null))
        .await
        .unwrap_err();
    assert_eq!(unknown.kind, FaultKind::UnknownMethod);

    harness.registry.dispose().await;
}

#[tokio::test]
async fn test_call_racing_disposal_sees_disposed_fault() {
    let harness = Harness::new(IdleTimeout::Disabled, Duration::ZERO).await;
    let bridge = harness.registry.resolve_bridge("racer").await.unwrap();

    harness.registry.dispose().await;

    let fault = bridge
        .invoke(CallEnvelope::new("get", Value::Null))
        .await
        .unwrap_err();
    assert_eq!(fault.kind, FaultKind::Disposed);
    assert!(matches!(
        harness.registry.resolve_bridge("racer").await,
        Err(RoutingError::Disposed(_))
    ));
}

struct StubbornService;

#[async_trait]
impl RemoteService for StubbornService {
    async fn invoke(&self, _call: CallEnvelope) -> CallResult {
        Ok(Value::Null)
    }

    async fn dispose(&self) -> Result<(), ServiceError> {
        Err(ServiceError::DisposeFailed("still busy".into()))
    }
}

#[tokio::test]
async fn test_service_dispose_failure_does_not_stop_teardown() {
    let boundary = Arc::new(CountingBoundary::new(Duration::ZERO));
    let registry = SessionRegistry::builder("stubborn", service_factory(|_| Ok(StubbornService)))
        .boundary(Arc::clone(&boundary) as Arc<dyn IsolationBoundary>)
        .build()
        .await
        .unwrap();

    let first = registry.get_or_create("one").await.unwrap();
    let second = registry.get_or_create("two").await.unwrap();
    registry.dispose().await;

    assert!(first.is_disposed());
    assert!(second.is_disposed());
    assert_eq!(boundary.teardowns(), 2);
    assert_eq!(boundary.inner.live_count(), 0);
}

#[tokio::test]
async fn test_factory_failure_releases_boundary() {
    let boundary = Arc::new(CountingBoundary::new(Duration::ZERO));
    let directory = Arc::new(ObjectDirectory::new(NODE));
    let inproc = Arc::new(InProcBinding::new());
    inproc.add_node(Arc::clone(&directory));
    let channels = ChannelRegistry::with_defaults(inproc);

    let registry = SessionRegistry::builder(
        "calc",
        service_factory(|_| -> Result<CounterService, ServiceError> {
            Err(ServiceError::ConstructionFailed("quota exceeded".into()))
        }),
    )
    .boundary(Arc::clone(&boundary) as Arc<dyn IsolationBoundary>)
    .directory(directory)
    .build()
    .await
    .unwrap();

    let proxy = ClientProxy::new(TARGET, "unlucky", &channels).unwrap();
    let fault = proxy.call("get", Value::Null).await.unwrap_err();
    assert_eq!(fault.kind, FaultKind::Service);
    assert!(fault.message.contains("quota exceeded"));

    assert_eq!(boundary.creates(), 1);
    assert_eq!(boundary.teardowns(), 1);
    assert_eq!(registry.session_count().await, 0);
    registry.dispose().await;
}

#[tokio::test]
async fn test_rate_limit_applies_per_client() {
    let limit = RateLimit {
        max_calls: 2,
        window: Duration::from_secs(60),
    };
    let harness =
        Harness::with_rate_limit(IdleTimeout::Disabled, Duration::ZERO, Some(limit)).await;
    let busy = harness.proxy("busy");
    let quiet = harness.proxy("quiet");

    busy.call("increment", Value::Null).await.unwrap();
    busy.call("increment", Value::Null).await.unwrap();
    let fault = busy.call("increment", Value::Null).await.unwrap_err();
    assert_eq!(fault.kind, FaultKind::RateLimited);

    assert_eq!(quiet.call("increment", Value::Null).await, Ok(json!(1)));
    harness.registry.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_task_boundary_sessions_are_evicted_and_stopped() {
    let boundary = Arc::new(TaskBoundary::new());
    let directory = Arc::new(ObjectDirectory::new(NODE));
    let inproc = Arc::new(InProcBinding::new());
    inproc.add_node(Arc::clone(&directory));
    let channels = ChannelRegistry::with_defaults(inproc);

    let registry = SessionRegistry::builder(
        "calc",
        service_factory(|id| Ok(CounterService::new(id))),
    )
    .idle_timeout(IdleTimeout::After(millis(100)))
    .boundary(Arc::clone(&boundary) as Arc<dyn IsolationBoundary>)
    .directory(directory)
    .build()
    .await
    .unwrap();

    let proxy = ClientProxy::new(TARGET, "tasked", &channels).unwrap();
    assert_eq!(proxy.call("increment", json!(2)).await, Ok(json!(2)));
    assert_eq!(boundary.live_count(), 1);

    sleep(millis(150)).await;
    assert_eq!(boundary.live_count(), 0);
    assert!(!registry.contains("tasked").await);

    registry.dispose().await;
}

#[tokio::test]
async fn test_calls_route_over_tcp() {
    let harness = Harness::new(IdleTimeout::Disabled, Duration::ZERO).await;
    let host = TcpHost::bind("127.0.0.1:0", Arc::clone(&harness.directory), 64 * 1024)
        .await
        .unwrap();
    let addr = host.local_addr().unwrap();
    let server = host.spawn();

    let target = format!("tcp://{}/calc", addr);
    let alice = ClientProxy::new(&target, "A", &harness.channels).unwrap();
    let bob = ClientProxy::new(&target, "B", &harness.channels).unwrap();

    assert_eq!(alice.call("increment", Value::Null).await, Ok(json!(1)));
    assert_eq!(alice.call("increment", Value::Null).await, Ok(json!(2)));
    assert_eq!(bob.call("whoami", Value::Null).await, Ok(json!("B")));

    let fault = alice.call("explode", Value::Null).await.unwrap_err();
    assert_eq!(fault.kind, FaultKind::UnknownMethod);

    harness.registry.dispose().await;
    let gone = alice.call("get", Value::Null).await.unwrap_err();
    assert_eq!(gone.kind, FaultKind::NoSuchObject);

    server.abort();
}

/// Sleeps, then calls another client's session through the same registry.
struct RelayService {
    client_id: String,
    channels: Arc<ChannelRegistry>,
}

#[async_trait]
impl RemoteService for RelayService {
    async fn invoke(&self, call: CallEnvelope) -> CallResult {
        match call.method.as_str() {
            "whoami" => Ok(json!(self.client_id)),
            "relay" => {
                sleep(millis(300)).await;
                let peer = call.payload.as_str().unwrap_or_default();
                let proxy = ClientProxy::new(TARGET, peer, &self.channels)?;
                proxy.call("whoami", Value::Null).await
            }
            other => Err(session_router::Fault::unknown_method(other)),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_eviction_of_busy_session_does_not_block_registry() {
    let boundary = Arc::new(TaskBoundary::new());
    let directory = Arc::new(ObjectDirectory::new(NODE));
    let inproc = Arc::new(InProcBinding::new());
    inproc.add_node(Arc::clone(&directory));
    let channels = Arc::new(ChannelRegistry::with_defaults(inproc));

    let relay_channels = Arc::clone(&channels);
    let registry = SessionRegistry::builder(
        "calc",
        service_factory(move |client_id| {
            Ok(RelayService {
                client_id: client_id.to_string(),
                channels: Arc::clone(&relay_channels),
            })
        }),
    )
    .idle_timeout(IdleTimeout::After(millis(100)))
    .boundary(Arc::clone(&boundary) as Arc<dyn IsolationBoundary>)
    .directory(directory)
    .build()
    .await
    .unwrap();

    let proxy = ClientProxy::new(TARGET, "A", &channels).unwrap();
    let relay = tokio::spawn(async move { proxy.call("relay", json!("B")).await });

    // "A" is evicted while its call is still running inside the boundary.
    sleep(millis(150)).await;
    let count = tokio::time::timeout(Duration::from_secs(1), registry.session_count()).await;
    assert_eq!(count, Ok(0));

    let outcome = tokio::time::timeout(Duration::from_secs(3), relay)
        .await
        .expect("relay call should not hang")
        .unwrap();
    assert_eq!(outcome, Ok(json!("B")));
    assert_eq!(registry.stats().await.sessions_evicted, 1);

    sleep(millis(500)).await;
    assert_eq!(boundary.live_count(), 0);
    registry.dispose().await;
}

#[tokio::test]
async fn test_client_side_frame_cap_rejects_large_replies() {
    let harness = Harness::new(IdleTimeout::Disabled, Duration::ZERO).await;
    let host = TcpHost::bind("127.0.0.1:0", Arc::clone(&harness.directory), 64 * 1024)
        .await
        .unwrap();
    let addr = host.local_addr().unwrap();
    let server = host.spawn();

    let capped = ChannelRegistry::with_max_frame_length(Arc::new(InProcBinding::new()), 256);
    let proxy = ClientProxy::new(&format!("tcp://{}/calc", addr), "A", &capped).unwrap();

    let fault = proxy.call("echo", json!("y".repeat(1000))).await.unwrap_err();
    assert_eq!(fault.kind, FaultKind::Transport);
    assert!(fault.message.contains("Frame too long"));

    // The connection is reopened for the next call.
    assert_eq!(proxy.call("echo", json!("small")).await, Ok(json!("small")));

    harness.registry.dispose().await;
    server.abort();
}
