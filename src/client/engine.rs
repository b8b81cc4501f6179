use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ClientError, ClientResult, RoomApi};
use crate::merge::{Entry, Transcript, DEFAULT_RECONCILE_WINDOW};
use crate::model::{now_ms, Message, RoomId};
use crate::protocol::{CreatedRoom, RoomListing};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Pause between the end of one poll and the start of the next.
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// How far apart an optimistic entry and its server echo may be stamped.
    pub reconcile_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            request_timeout: super::http::DEFAULT_TIMEOUT,
            reconcile_window: DEFAULT_RECONCILE_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Creating,
    Joining,
    Active,
    Left,
    /// The room vanished server side. Needs a fresh join or a leave.
    Lost,
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub room_id: Option<RoomId>,
    pub participants: Vec<String>,
    pub messages: Vec<Entry>,
    pub cursor: i64,
    /// Failure of the last create, join or post, or the reason the room was lost.
    /// A failed post stays here until every optimistic entry has been confirmed.
    pub last_error: Option<ClientError>,
    /// Latest transient poll failure; the next good poll clears it.
    pub poll_error: Option<ClientError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Joined { room_id: RoomId },
    Merged { count: usize },
    PollFailed(ClientError),
    Posted(Message),
    PostFailed(ClientError),
    RoomLost { room_id: RoomId },
    Left,
}

struct Session {
    phase: SessionPhase,
    room_id: Option<RoomId>,
    participants: Vec<String>,
    transcript: Transcript,
    last_error: Option<ClientError>,
    poll_error: Option<ClientError>,
    /// Bumped whenever the session switches rooms, so late responses for the
    /// old room can be recognised and dropped.
    epoch: u64,
}

struct Poller {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// One client's view of one room at a time.
///
/// Joining starts a background poll task; leaving, joining elsewhere or
/// dropping the engine stops it.
pub struct SyncEngine<A: RoomApi> {
    api: Arc<A>,
    config: EngineConfig,
    session: Arc<Mutex<Session>>,
    poller: Mutex<Option<Poller>>,
    events: broadcast::Sender<SyncEvent>,
    shutdown: CancellationToken,
}

async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = ClientResult<T>>,
) -> ClientResult<T> {
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(ClientError::Timeout))
}

fn required(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}

impl<A: RoomApi> SyncEngine<A> {
    pub fn new(api: A, config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api: Arc::new(api),
            config,
            session: Arc::new(Mutex::new(Session {
                phase: SessionPhase::Idle,
                room_id: None,
                participants: Vec::new(),
                transcript: Transcript::new(config.reconcile_window),
                last_error: None,
                poll_error: None,
                epoch: 0,
            })),
            poller: Mutex::new(None),
            events,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.lock().await;
        SessionSnapshot {
            phase: session.phase,
            room_id: session.room_id.clone(),
            participants: session.participants.clone(),
            messages: session.transcript.entries().to_vec(),
            cursor: session.transcript.cursor(),
            last_error: session.last_error.clone(),
            poll_error: session.poll_error.clone(),
        }
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }

    /// Create a room. The local transcript is reset; the caller still has to join.
    pub async fn create(&self) -> ClientResult<CreatedRoom> {
        self.stop_polling().await;
        {
            let mut session = self.session.lock().await;
            session.epoch += 1;
            session.phase = SessionPhase::Creating;
            session.room_id = None;
            session.participants.clear();
            session.transcript.clear();
            session.last_error = None;
            session.poll_error = None;
        }

        let result = bounded(self.config.request_timeout, self.api.create_room()).await;

        let mut session = self.session.lock().await;
        session.phase = SessionPhase::Idle;
        match &result {
            Ok(created) => info!(room_id = %created.room_id, "Room created"),
            Err(e) => session.last_error = Some(e.clone()),
        }
        result
    }

    /// Join `room` as `name`, replacing whatever history was shown before.
    pub async fn join(&self, room: &RoomId, name: &str) -> ClientResult<()> {
        let Some(name) = required(name) else {
            return Err(ClientError::Validation("name required".into()));
        };
        self.stop_polling().await;

        let epoch = {
            let mut session = self.session.lock().await;
            session.epoch += 1;
            session.phase = SessionPhase::Joining;
            session.room_id = Some(room.clone());
            session.participants.clear();
            session.transcript.clear();
            session.last_error = None;
            session.poll_error = None;
            session.epoch
        };

        let result =
            bounded(self.config.request_timeout, self.api.join_room(room, name)).await;

        let mut session = self.session.lock().await;
        if session.epoch != epoch {
            debug!(room_id = %room, "Join overtaken by a later join or leave");
            return Err(ClientError::NoActiveRoom);
        }
        match result {
            Ok(joined) => {
                info!(room_id = %room, name, history = joined.messages.len(), "Joined room");
                session.participants = joined.participants;
                session.transcript.replace(joined.messages);
                session.phase = SessionPhase::Active;
                drop(session);

                self.start_polling(room.clone(), epoch).await;
                self.emit(SyncEvent::Joined { room_id: room.clone() });
                Ok(())
            }
            Err(e) => {
                warn!(room_id = %room, error = %e, "Join failed");
                session.phase = SessionPhase::Idle;
                session.room_id = None;
                session.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Stop polling. Nothing fetched after this returns is merged.
    pub async fn leave(&self) {
        self.stop_polling().await;
        let mut session = self.session.lock().await;
        session.epoch += 1;
        session.phase = SessionPhase::Left;
        if let Some(room) = &session.room_id {
            info!(room_id = %room, "Left room");
        }
        drop(session);
        self.emit(SyncEvent::Left);
    }

    /// Send a message, showing it locally before the server answers.
    ///
    /// A failed post keeps the optimistic entry on screen and records the error.
    pub async fn post(&self, author: &str, text: &str) -> ClientResult<Message> {
        let (Some(author), Some(text)) = (required(author), required(text)) else {
            return Err(ClientError::Validation("author/name and text required".into()));
        };

        let (room, epoch, local) = {
            let mut session = self.session.lock().await;
            let room = match (&session.phase, &session.room_id) {
                (SessionPhase::Active, Some(room)) => room.clone(),
                _ => return Err(ClientError::NoActiveRoom),
            };
            let local = Message {
                author: author.to_owned(),
                text: text.to_owned(),
                ts: now_ms(),
                client_id: Some(Uuid::now_v7()),
            };
            session.transcript.push_optimistic(local.clone());
            (room, session.epoch, local)
        };

        let result = bounded(
            self.config.request_timeout,
            self.api.post_message(&room, author, text, local.client_id),
        )
        .await;

        let mut session = self.session.lock().await;
        if session.epoch != epoch {
            return result;
        }
        match &result {
            Ok(confirmed) => {
                debug!(room_id = %room, ts = confirmed.ts, "Message confirmed");
                session.transcript.confirm(&local, confirmed.clone());
                if !session.transcript.entries().iter().any(|e| e.optimistic) {
                    session.last_error = None;
                }
                drop(session);
                self.emit(SyncEvent::Posted(confirmed.clone()));
            }
            Err(e) => {
                warn!(room_id = %room, error = %e, "Post failed");
                session.last_error = Some(e.clone());
                let lost = matches!(e, ClientError::NotFound(_));
                if lost {
                    session.phase = SessionPhase::Lost;
                }
                drop(session);

                self.emit(SyncEvent::PostFailed(e.clone()));
                if lost {
                    if let Some(poller) = self.poller.lock().await.as_ref() {
                        poller.token.cancel();
                    }
                    self.emit(SyncEvent::RoomLost { room_id: room });
                }
            }
        }
        result
    }

    pub async fn suggest_replies(&self, text: &str) -> ClientResult<Vec<String>> {
        let room = self.session.lock().await.room_id.clone().ok_or(ClientError::NoActiveRoom)?;
        bounded(self.config.request_timeout, self.api.suggest_replies(&room, text)).await
    }

    pub async fn list_rooms(
        &self,
        limit: usize,
        since_updated_at: i64,
    ) -> ClientResult<Vec<RoomListing>> {
        bounded(self.config.request_timeout, self.api.list_rooms(limit, since_updated_at)).await
    }

    async fn start_polling(&self, room: RoomId, epoch: u64) {
        let token = self.shutdown.child_token();
        let task = tokio::spawn(poll_loop(PollContext {
            api: self.api.clone(),
            session: self.session.clone(),
            events: self.events.clone(),
            config: self.config,
            room,
            epoch,
            token: token.clone(),
        }));
        *self.poller.lock().await = Some(Poller { token, task });
    }

    async fn stop_polling(&self) {
        let poller = self.poller.lock().await.take();
        if let Some(Poller { token, task }) = poller {
            token.cancel();
            let _ = task.await;
        }
    }
}

impl<A: RoomApi> Drop for SyncEngine<A> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct PollContext<A> {
    api: Arc<A>,
    session: Arc<Mutex<Session>>,
    events: broadcast::Sender<SyncEvent>,
    config: EngineConfig,
    room: RoomId,
    epoch: u64,
    token: CancellationToken,
}

async fn poll_loop<A: RoomApi>(cx: PollContext<A>) {
    debug!(room_id = %cx.room, "Polling started");
    let mut drain = false;
    loop {
        if !drain {
            tokio::select! {
                _ = cx.token.cancelled() => break,
                _ = tokio::time::sleep(cx.config.poll_interval) => {}
            }
        }

        let cursor = cx.session.lock().await.transcript.cursor();
        let fetch = bounded(cx.config.request_timeout, cx.api.room_state(&cx.room, cursor));
        let result = tokio::select! {
            _ = cx.token.cancelled() => break,
            result = fetch => result,
        };

        let mut session = cx.session.lock().await;
        if cx.token.is_cancelled() || session.epoch != cx.epoch {
            break;
        }
        match result {
            Ok(state) => {
                drain = state.has_more && !state.messages.is_empty();
                session.participants = state.participants;
                session.poll_error = None;
                let count = session.transcript.merge_page(state.messages);
                if count > 0 {
                    let cursor = session.transcript.cursor();
                    debug!(room_id = %cx.room, count, cursor, "Merged messages");
                    let _ = cx.events.send(SyncEvent::Merged { count });
                }
            }
            Err(ClientError::NotFound(message)) => {
                warn!(room_id = %cx.room, "Room disappeared, polling stopped");
                session.phase = SessionPhase::Lost;
                session.last_error = Some(ClientError::NotFound(message));
                let _ = cx.events.send(SyncEvent::RoomLost { room_id: cx.room.clone() });
                break;
            }
            Err(e) => {
                warn!(room_id = %cx.room, error = %e, "Poll failed");
                drain = false;
                session.poll_error = Some(e.clone());
                let _ = cx.events.send(SyncEvent::PollFailed(e));
            }
        }
    }
    debug!(room_id = %cx.room, "Polling stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::protocol::{JoinedRoom, RoomState};
    use crate::service::{tests::memory_service, RoomService};

    fn fast() -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_millis(20),
            request_timeout: Duration::from_secs(2),
            reconcile_window: DEFAULT_RECONCILE_WINDOW,
        }
    }

    async fn eventually<A: RoomApi>(
        engine: &SyncEngine<A>,
        check: impl Fn(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        for _ in 0..200 {
            let snapshot = engine.snapshot().await;
            if check(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition never held: {:?}", engine.snapshot().await);
    }

    fn texts(snapshot: &SessionSnapshot) -> Vec<&str> {
        snapshot.messages.iter().map(|e| e.message.text.as_str()).collect()
    }

    fn confirmed(snapshot: &SessionSnapshot) -> Vec<Message> {
        snapshot
            .messages
            .iter()
            .filter(|e| !e.optimistic)
            .map(|e| e.message.clone())
            .collect()
    }

    #[tokio::test]
    async fn two_clients_converge() {
        let service = memory_service();
        let alice = SyncEngine::new(service.clone(), fast());
        let bob = SyncEngine::new(service.clone(), fast());

        let room = alice.create().await.unwrap().room_id;
        alice.join(&room, "Alice").await.unwrap();
        bob.join(&room, "Bob").await.unwrap();

        alice.post("Alice", "Salut").await.unwrap();
        bob.post("Bob", "Yo").await.unwrap();

        let a = eventually(&alice, |s| confirmed(s).len() == 2).await;
        let b = eventually(&bob, |s| confirmed(s).len() == 2).await;
        assert_eq!(confirmed(&a), confirmed(&b));
        assert_eq!(a.messages.len(), 2);
        assert_eq!(b.participants, vec!["Alice".to_string(), "Bob".to_string()]);
    }

    #[tokio::test]
    async fn own_message_is_not_duplicated_by_the_poll_echo() {
        let engine = SyncEngine::new(memory_service(), fast());
        let room = engine.create().await.unwrap().room_id;
        engine.join(&room, "Alice").await.unwrap();

        let posted = engine.post("  Alice ", "Bonjour").await.unwrap();
        let snapshot = eventually(&engine, |s| s.cursor >= posted.ts).await;
        assert_eq!(texts(&snapshot), ["Bonjour"]);
        assert!(!snapshot.messages[0].optimistic);
        assert_eq!(snapshot.messages[0].message, posted);
    }

    #[tokio::test]
    async fn join_replaces_history() {
        let service = memory_service();
        let first = service.create_room().await.unwrap().room_id;
        let second = service.create_room().await.unwrap().room_id;
        service.post_message(&first, Some("Bob"), Some("old room"), None).await.unwrap();
        service.post_message(&second, Some("Carol"), Some("new room"), None).await.unwrap();

        let engine = SyncEngine::new(service, fast());
        engine.join(&first, "Alice").await.unwrap();
        assert_eq!(texts(&engine.snapshot().await), ["old room"]);

        engine.join(&second, "Alice").await.unwrap();
        let snapshot = engine.snapshot().await;
        assert_eq!(texts(&snapshot), ["new room"]);
        assert_eq!(snapshot.room_id, Some(second));
        assert_eq!(snapshot.cursor, snapshot.messages[0].message.ts);
    }

    #[tokio::test]
    async fn nothing_is_merged_after_leaving() {
        let service = memory_service();
        let room = service.create_room().await.unwrap().room_id;
        let engine = SyncEngine::new(service.clone(), fast());
        engine.join(&room, "Alice").await.unwrap();
        engine.leave().await;

        service.post_message(&room, Some("Bob"), Some("too late"), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Left);
        assert!(snapshot.messages.is_empty());
        assert_eq!(engine.post("Alice", "hello?").await, Err(ClientError::NoActiveRoom));
    }

    #[tokio::test]
    async fn failed_join_does_not_poll() {
        let engine = SyncEngine::new(memory_service(), fast());
        let err = engine.join(&RoomId::from("nope00"), "Alice").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert_eq!(snapshot.last_error, Some(err));
        assert!(engine.poller.lock().await.is_none());
    }

    #[tokio::test]
    async fn vanished_room_ends_the_session() {
        let service = memory_service();
        let room = service.create_room().await.unwrap().room_id;
        let engine = SyncEngine::new(service.clone(), fast());
        let mut events = engine.subscribe();
        engine.join(&room, "Alice").await.unwrap();

        service.sweep_idle(i64::MAX).await.unwrap();
        let snapshot = eventually(&engine, |s| s.phase == SessionPhase::Lost).await;
        assert!(matches!(snapshot.last_error, Some(ClientError::NotFound(_))));

        loop {
            match events.recv().await.unwrap() {
                SyncEvent::RoomLost { room_id } => {
                    assert_eq!(room_id, room);
                    break;
                }
                _ => continue,
            }
        }
        let poller = engine.poller.lock().await.take().unwrap();
        tokio::time::timeout(Duration::from_secs(1), poller.task).await.unwrap().unwrap();
    }

    /// Wraps the in-process service with injected failures.
    #[derive(Default)]
    struct Faults {
        /// Polls to fail before behaving.
        poll_failures: AtomicUsize,
        /// Failing polls hang instead of answering.
        stall_polls: bool,
        fail_posts: bool,
        join_delay: Duration,
    }

    struct Flaky {
        inner: RoomService,
        faults: Faults,
    }

    impl Flaky {
        fn new(inner: RoomService, faults: Faults) -> Self {
            Self { inner, faults }
        }
    }

    #[async_trait]
    impl RoomApi for Flaky {
        async fn create_room(&self) -> ClientResult<CreatedRoom> {
            RoomApi::create_room(&self.inner).await
        }

        async fn list_rooms(&self, limit: usize, since: i64) -> ClientResult<Vec<RoomListing>> {
            RoomApi::list_rooms(&self.inner, limit, since).await
        }

        async fn join_room(&self, room: &RoomId, name: &str) -> ClientResult<JoinedRoom> {
            tokio::time::sleep(self.faults.join_delay).await;
            RoomApi::join_room(&self.inner, room, name).await
        }

        async fn post_message(
            &self,
            room: &RoomId,
            author: &str,
            text: &str,
            client_id: Option<Uuid>,
        ) -> ClientResult<Message> {
            if self.faults.fail_posts {
                return Err(ClientError::Server {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            RoomApi::post_message(&self.inner, room, author, text, client_id).await
        }

        async fn room_state(&self, room: &RoomId, since_ts: i64) -> ClientResult<RoomState> {
            let remaining = self.faults.poll_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.faults.poll_failures.store(remaining - 1, Ordering::SeqCst);
                if self.faults.stall_polls {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                return Err(ClientError::Server {
                    status: 502,
                    message: "bad gateway".into(),
                });
            }
            RoomApi::room_state(&self.inner, room, since_ts).await
        }

        async fn suggest_replies(&self, room: &RoomId, text: &str) -> ClientResult<Vec<String>> {
            RoomApi::suggest_replies(&self.inner, room, text).await
        }
    }

    #[tokio::test]
    async fn transient_failures_keep_polling() {
        let service = memory_service();
        let room = service.create_room().await.unwrap().room_id;
        let faults = Faults {
            poll_failures: AtomicUsize::new(3),
            ..Faults::default()
        };
        let engine = SyncEngine::new(Flaky::new(service.clone(), faults), fast());
        let mut events = engine.subscribe();
        engine.join(&room, "Alice").await.unwrap();
        service.post_message(&room, Some("Bob"), Some("still here"), None).await.unwrap();

        let snapshot = eventually(&engine, |s| s.messages.len() == 1).await;
        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(snapshot.last_error, None);
        assert_eq!(snapshot.poll_error, None);

        let mut failures = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SyncEvent::PollFailed(_)) {
                failures += 1;
            }
        }
        assert_eq!(failures, 3);
    }

    #[tokio::test]
    async fn slow_polls_time_out_as_transient() {
        let service = memory_service();
        let room = service.create_room().await.unwrap().room_id;
        let config = EngineConfig {
            request_timeout: Duration::from_millis(50),
            ..fast()
        };
        let faults = Faults {
            poll_failures: AtomicUsize::new(1),
            stall_polls: true,
            ..Faults::default()
        };
        let engine = SyncEngine::new(Flaky::new(service.clone(), faults), config);
        let mut events = engine.subscribe();
        engine.join(&room, "Alice").await.unwrap();

        loop {
            if let SyncEvent::PollFailed(err) = events.recv().await.unwrap() {
                assert_eq!(err, ClientError::Timeout);
                break;
            }
        }
        service.post_message(&room, Some("Bob"), Some("after timeout"), None).await.unwrap();
        let snapshot = eventually(&engine, |s| s.messages.len() == 1).await;
        assert_eq!(snapshot.phase, SessionPhase::Active);
    }

    #[tokio::test]
    async fn failed_post_keeps_entry_and_error_across_polls() {
        let service = memory_service();
        let room = service.create_room().await.unwrap().room_id;
        let faults = Faults {
            fail_posts: true,
            ..Faults::default()
        };
        let engine = SyncEngine::new(Flaky::new(service.clone(), faults), fast());
        let mut events = engine.subscribe();
        engine.join(&room, "Alice").await.unwrap();

        let err = engine.post("Alice", "lost in transit").await.unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 503, .. }));
        loop {
            match events.recv().await.unwrap() {
                SyncEvent::PostFailed(failed) => {
                    assert_eq!(failed, err);
                    break;
                }
                _ => continue,
            }
        }

        // a good poll lands after the failure
        service.post_message(&room, Some("Bob"), Some("hello?"), None).await.unwrap();
        let snapshot = eventually(&engine, |s| s.messages.len() == 2).await;
        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(snapshot.last_error, Some(err));
        assert_eq!(snapshot.poll_error, None);
        let unsent: Vec<_> = snapshot
            .messages
            .iter()
            .filter(|e| e.optimistic)
            .map(|e| e.message.text.as_str())
            .collect();
        assert_eq!(unsent, ["lost in transit"]);
    }

    #[tokio::test]
    async fn join_overtaken_by_leave_reports_no_room() {
        let service = memory_service();
        let room = service.create_room().await.unwrap().room_id;
        let faults = Faults {
            join_delay: Duration::from_millis(100),
            ..Faults::default()
        };
        let engine = SyncEngine::new(Flaky::new(service, faults), fast());

        let (joined, ()) = tokio::join!(engine.join(&room, "Alice"), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            engine.leave().await;
        });
        assert_eq!(joined, Err(ClientError::NoActiveRoom));

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Left);
        assert!(engine.poller.lock().await.is_none());
    }

    #[tokio::test]
    async fn backlog_is_drained_across_pages() {
        let service = memory_service();
        let room = service.create_room().await.unwrap().room_id;
        let engine = SyncEngine::new(service.clone(), fast());
        engine.join(&room, "Alice").await.unwrap();
        for i in 0..120 {
            service.post_message(&room, Some("Bob"), Some(&format!("m{i}")), None).await.unwrap();
        }
        let snapshot = eventually(&engine, |s| s.messages.len() == 120).await;
        assert_eq!(snapshot.messages.last().unwrap().message.text, "m119");
    }

    #[tokio::test]
    async fn post_validates_locally() {
        let engine = SyncEngine::new(memory_service(), fast());
        let room = engine.create().await.unwrap().room_id;
        engine.join(&room, "Alice").await.unwrap();
        assert!(matches!(engine.post("Alice", "   ").await, Err(ClientError::Validation(_))));
        assert!(engine.snapshot().await.messages.is_empty());
    }
}
