//! The foreground session: registration, the six user actions, teardown.
//!
//! A session runs one action to completion before the next, so the
//! request-reply channel never sees overlapping commands. The only state
//! shared with another task is the notification buffer.

use crate::audit::{self, AuditLevel, AuditLog};
use crate::buffer::{DEFAULT_CAPACITY, NotificationBuffer};
use crate::channel::{RequestChannel, SubscribeChannel};
use crate::clock::{Clock, ClockOffset, OffsetOutOfRange, POST_TIME_FORMAT, SystemClock};
use crate::command::{CommandClient, FollowOutcome, MessageOutcome, PostOutcome, RegisterOutcome};
use crate::conversation::Conversation;
use crate::listener::{ListenerExit, NotificationListener};
use crate::report::{MessageReport, NotificationReport};
use crate::{CommandError, PreconditionRejected, SessionError};
use socialnet_core::{Status, TimelinePost};
use std::future::Future;
use std::sync::Arc;

/// Who this session is, as assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub id: u64,
    pub topic: String,
}

/// Source of replacement usernames after a rejected registration.
pub trait UsernamePrompt {
    /// Another username to try, or `None` to give up.
    fn retry(&mut self, rejected: &str, status: Status) -> impl Future<Output = Option<String>>;
}

/// Collects the dependencies of a [`Session`] before registering.
pub struct SessionBuilder<C = SystemClock> {
    audit: Arc<dyn AuditLog>,
    clock: C,
    capacity: usize,
}

impl SessionBuilder<SystemClock> {
    /// Start with the system clock and the default buffer capacity.
    pub fn new(audit: Arc<dyn AuditLog>) -> Self {
        Self {
            audit,
            clock: SystemClock,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl<C: Clock> SessionBuilder<C> {
    /// Use another time source for outgoing timestamps.
    pub fn clock<C2: Clock>(self, clock: C2) -> SessionBuilder<C2> {
        SessionBuilder {
            audit: self.audit,
            clock,
            capacity: self.capacity,
        }
    }

    /// How many unread notifications to hold before dropping new ones.
    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Register, retrying with usernames from `prompt` until the server
    /// accepts one, then subscribe and start the notification listener.
    pub async fn register<R, S, P>(
        self,
        channel: R,
        mut subscriber: S,
        username: impl Into<String>,
        prompt: &mut P,
    ) -> Result<Session<R, C>, SessionError>
    where
        R: RequestChannel,
        S: SubscribeChannel,
        P: UsernamePrompt,
    {
        let mut client = CommandClient::new(channel);
        let mut username = username.into();

        let assignment = loop {
            match client.register(&username).await? {
                RegisterOutcome::Registered(assignment) => break assignment,
                RegisterOutcome::Rejected(status) => {
                    audit::emit(
                        &*self.audit,
                        AuditLevel::Warning,
                        &format!("Registration rejected for username '{username}' ({status})"),
                    );
                    match prompt.retry(&username, status).await {
                        Some(next) => username = next,
                        None => return Err(SessionError::RegistrationAborted { username }),
                    }
                }
            }
        };

        subscriber.subscribe(&assignment.topic).await?;
        audit::emit(
            &*self.audit,
            AuditLevel::Info,
            &format!(
                "User '{}' registered. ID: {}, topic: {}",
                username, assignment.id, assignment.topic
            ),
        );

        let buffer = Arc::new(NotificationBuffer::new(self.capacity));
        let listener = NotificationListener::spawn(subscriber, buffer.clone());

        Ok(Session {
            client,
            registration: Registration {
                username,
                id: assignment.id,
                topic: assignment.topic,
            },
            offset: ClockOffset::ZERO,
            clock: self.clock,
            audit: self.audit,
            buffer,
            listener: Some(listener),
            following: Vec::new(),
        })
    }
}

/// A registered user's session.
pub struct Session<R, C = SystemClock> {
    client: CommandClient<R>,
    registration: Registration,
    offset: ClockOffset,
    clock: C,
    audit: Arc<dyn AuditLog>,
    buffer: Arc<NotificationBuffer>,
    listener: Option<NotificationListener>,
    following: Vec<String>,
}

impl<R: RequestChannel, C: Clock> Session<R, C> {
    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// The accepted username, which may differ from the first one tried.
    pub fn username(&self) -> &str {
        &self.registration.username
    }

    /// Current clock delay.
    pub fn delay(&self) -> ClockOffset {
        self.offset
    }

    /// Users successfully followed during this session.
    pub fn following(&self) -> &[String] {
        &self.following
    }

    /// Notifications received but not yet checked.
    pub fn buffer(&self) -> &Arc<NotificationBuffer> {
        &self.buffer
    }

    fn audit(&self, level: AuditLevel, message: &str) {
        audit::emit(&*self.audit, level, message);
    }

    /// Publish `text`, stamped with the delayed local time.
    pub async fn post(&mut self, text: &str) -> Result<PostOutcome, CommandError> {
        let sent_at = self
            .offset
            .apply(self.clock.now())
            .format(POST_TIME_FORMAT)
            .to_string();
        let Registration { username, id, .. } = &self.registration;
        let outcome = self.client.post_text(username, *id, text, sent_at).await?;

        let username = self.username();
        match outcome {
            PostOutcome::Published => {
                self.audit(AuditLevel::Info, &format!("User '{username}' posted: '{text}'"))
            }
            PostOutcome::Failed(status) => self.audit(
                AuditLevel::Error,
                &format!("Post by '{username}' failed ({status})"),
            ),
        }
        Ok(outcome)
    }

    /// Follow `target`. Following oneself is refused without contacting
    /// the server.
    pub async fn follow(&mut self, target: &str) -> Result<FollowOutcome, CommandError> {
        if target == self.username() {
            self.audit(
                AuditLevel::Warning,
                &format!("User '{}' tried to follow themselves", self.username()),
            );
            return Err(PreconditionRejected::SelfFollow.into());
        }

        let outcome = self.client.follow(self.registration.id, target).await?;
        let username = self.username();
        match outcome {
            FollowOutcome::Following => {
                self.audit(
                    AuditLevel::Info,
                    &format!("User '{username}' followed '{target}'"),
                );
                if !self.following.iter().any(|f| f == target) {
                    self.following.push(target.to_string());
                }
            }
            FollowOutcome::NotFound => self.audit(
                AuditLevel::Warning,
                &format!("User '{target}' not found to be followed by '{username}'"),
            ),
            FollowOutcome::Failed(status) => self.audit(
                AuditLevel::Error,
                &format!("Error when '{username}' tried to follow '{target}' ({status})"),
            ),
        }
        Ok(outcome)
    }

    /// Full history with `peer`, laid out from this user's side.
    pub async fn conversation(&mut self, peer: &str) -> Result<Conversation, CommandError> {
        let messages = self
            .client
            .private_messages(&self.registration.username, peer)
            .await?;
        Ok(Conversation::render(self.username(), peer, &messages))
    }

    /// Send a private message. On delivery the conversation is fetched again
    /// so the caller can show it. Messaging oneself is refused locally.
    pub async fn send_message(
        &mut self,
        recipient: &str,
        text: &str,
    ) -> Result<MessageReport, CommandError> {
        if recipient == self.username() {
            self.audit(
                AuditLevel::Warning,
                &format!("User '{}' tried to send a message to themselves", self.username()),
            );
            return Err(PreconditionRejected::SelfMessage.into());
        }

        let timestamp = self.offset.apply(self.clock.now()).timestamp();
        if !self.offset.is_zero() {
            self.audit(
                AuditLevel::Info,
                &format!("Delay of {} applied to private message", self.offset),
            );
        }

        let outcome = self
            .client
            .send_private_message(&self.registration.username, recipient, text, timestamp)
            .await?;

        let username = self.username();
        let conversation = match outcome {
            MessageOutcome::Delivered => {
                self.audit(
                    AuditLevel::Info,
                    &format!("User '{username}' sent a message to '{recipient}': '{text}'"),
                );
                Some(self.conversation(recipient).await?)
            }
            MessageOutcome::RecipientNotFound => {
                self.audit(
                    AuditLevel::Warning,
                    &format!("User '{username}' tried to message unknown user '{recipient}'"),
                );
                None
            }
            MessageOutcome::Failed(status) => {
                self.audit(
                    AuditLevel::Error,
                    &format!("Failed to send message from '{username}' to '{recipient}' ({status})"),
                );
                None
            }
        };
        Ok(MessageReport {
            outcome,
            conversation,
        })
    }

    /// Take every buffered notification. Rendering happens after the
    /// buffer lock is released.
    pub fn check_notifications(&self) -> NotificationReport {
        let notifications = self.buffer.drain();
        self.audit(
            AuditLevel::Info,
            &format!(
                "User '{}' checked notifications. Total: {}",
                self.username(),
                notifications.len()
            ),
        );
        NotificationReport { notifications }
    }

    /// Every post on the server, in server order.
    pub async fn timeline(&mut self) -> Result<Vec<TimelinePost>, CommandError> {
        let posts = self.client.timeline().await?;
        self.audit(
            AuditLevel::Info,
            &format!("User '{}' viewed the timeline", self.username()),
        );
        Ok(posts)
    }

    /// Skew every later timestamp by `secs` seconds. Earlier messages keep
    /// the time they were sent with.
    pub fn set_delay(&mut self, secs: i64) -> Result<(), OffsetOutOfRange> {
        self.offset = ClockOffset::from_secs(secs)?;
        self.audit(
            AuditLevel::Info,
            &format!(
                "User '{}' set forced delay to {} seconds",
                self.username(),
                secs
            ),
        );
        Ok(())
    }

    /// End the session: stop the notification listener, which closes the
    /// subscribe channel, then close the command channel.
    pub async fn shutdown(mut self) -> ListenerExit {
        self.audit(AuditLevel::Info, "Session ended");
        let exit = match self.listener.take() {
            Some(listener) => listener.shutdown().await,
            None => ListenerExit::Shutdown,
        };
        if let Err(e) = self.client.close().await {
            tracing::warn!("Failed to close command channel: {}", e);
        }
        exit
    }

    /// Whether the listener has stopped on its own (channel closed or failed).
    pub fn listener_stopped(&self) -> bool {
        self.listener.as_ref().is_none_or(|l| l.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::clock::FixedClock;
    use crate::memory::{self, MemoryRequestChannel, NotificationPublisher, RequestLog};
    use chrono::{DateTime, Local, TimeZone};
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::time::Duration;

    /// Just enough of a server to exercise the client.
    #[derive(Default)]
    struct FakeServer {
        users: HashMap<String, u64>,
        messages: Vec<(String, String, String, i64)>,
    }

    impl FakeServer {
        fn with_users(names: &[&str]) -> Self {
            let mut server = Self::default();
            for name in names {
                let id = server.users.len() as u64 + 1;
                server.users.insert(name.to_string(), id);
            }
            server
        }

        fn handle(&mut self, req: &Value) -> Value {
            let s = |key: &str| req[key].as_str().unwrap_or_default().to_string();
            match req["action"].as_str() {
                Some("add_user") => {
                    let name = s("username");
                    if self.users.contains_key(&name) {
                        return json!({ "ret": 1, "id": null, "topic": null });
                    }
                    let id = self.users.len() as u64 + 1;
                    self.users.insert(name, id);
                    json!({ "ret": 0, "id": id, "topic": format!("notificacao_user_{id}") })
                }
                Some("post_text") => json!({ "ret": 0, "msg": "Post received!" }),
                Some("add_follower") if self.users.contains_key(&s("to_follow")) => {
                    json!({ "ret": 0 })
                }
                Some("add_follower") => json!({ "ret": 2 }),
                Some("add_private_message") => {
                    if !self.users.contains_key(&s("destinatario")) {
                        return json!({ "ret": 2 });
                    }
                    let ts = req["timestamp"].as_i64().unwrap_or_default();
                    self.messages
                        .push((s("remetente"), s("destinatario"), s("mensagem"), ts));
                    json!({ "ret": 0 })
                }
                Some("get_private_messages") => {
                    let (a, b) = (s("remetente"), s("destinatario"));
                    let msgs: Vec<Value> = self
                        .messages
                        .iter()
                        .filter(|(from, to, ..)| {
                            (*from == a && *to == b) || (*from == b && *to == a)
                        })
                        .map(|(from, _, text, ts)| json!([text, ts, from]))
                        .collect();
                    if msgs.is_empty() {
                        json!({ "ret": 0 })
                    } else {
                        json!({ "ret": 0, "mensagens": msgs })
                    }
                }
                Some("get_timeline") => json!([]),
                _ => json!({ "ret": -99, "msg": "unknown action" }),
            }
        }
    }

    /// Hands out scripted usernames and checks nobody subscribed yet.
    struct ScriptedPrompt {
        names: Vec<&'static str>,
        rejected: Vec<String>,
        publisher: NotificationPublisher,
    }

    impl UsernamePrompt for ScriptedPrompt {
        async fn retry(&mut self, rejected: &str, _status: Status) -> Option<String> {
            assert!(
                self.publisher.subscriptions().is_empty(),
                "subscribed before registration succeeded"
            );
            self.rejected.push(rejected.to_string());
            if self.names.is_empty() {
                None
            } else {
                Some(self.names.remove(0).to_string())
            }
        }
    }

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    struct Harness {
        session: Session<MemoryRequestChannel, FixedClock>,
        log: RequestLog,
        audit: Arc<MemoryAuditLog>,
        publisher: NotificationPublisher,
    }

    async fn harness(existing: &[&str], username: &str) -> Harness {
        let mut server = FakeServer::with_users(existing);
        let channel = MemoryRequestChannel::json(move |req| server.handle(req));
        let log = channel.log();
        let (publisher, subscriber) = memory::subscription();
        let audit = Arc::new(MemoryAuditLog::new());
        let mut prompt = ScriptedPrompt {
            names: Vec::new(),
            rejected: Vec::new(),
            publisher: publisher.clone(),
        };
        let session = SessionBuilder::new(audit.clone())
            .clock(FixedClock(noon()))
            .register(channel, subscriber, username, &mut prompt)
            .await
            .unwrap();
        Harness {
            session,
            log,
            audit,
            publisher,
        }
    }

    #[tokio::test]
    async fn registration_retries_until_accepted() {
        let mut server = FakeServer::with_users(&["alice", "alice2"]);
        let channel = MemoryRequestChannel::json(move |req| server.handle(req));
        let log = channel.log();
        let (publisher, subscriber) = memory::subscription();
        let audit = Arc::new(MemoryAuditLog::new());
        let mut prompt = ScriptedPrompt {
            names: vec!["alice2", "carol"],
            rejected: Vec::new(),
            publisher: publisher.clone(),
        };

        let session = SessionBuilder::new(audit.clone())
            .register(channel, subscriber, "alice", &mut prompt)
            .await
            .unwrap();

        assert_eq!(prompt.rejected, ["alice", "alice2"]);
        assert_eq!(log.actions(), ["add_user", "add_user", "add_user"]);
        assert_eq!(
            session.registration(),
            &Registration {
                username: "carol".into(),
                id: 3,
                topic: "notificacao_user_3".into(),
            }
        );
        assert_eq!(publisher.subscriptions(), ["notificacao_user_3"]);
        assert!(audit.contains(AuditLevel::Warning, "Registration rejected for username 'alice'"));
        assert!(audit.contains(AuditLevel::Info, "User 'carol' registered. ID: 3"));
        assert!(matches!(session.shutdown().await, ListenerExit::Shutdown));
    }

    #[tokio::test]
    async fn registration_can_be_abandoned() {
        let mut server = FakeServer::with_users(&["alice"]);
        let channel = MemoryRequestChannel::json(move |req| server.handle(req));
        let (publisher, subscriber) = memory::subscription();
        let mut prompt = ScriptedPrompt {
            names: Vec::new(),
            rejected: Vec::new(),
            publisher: publisher.clone(),
        };

        let result = SessionBuilder::new(Arc::new(MemoryAuditLog::new()))
            .register(channel, subscriber, "alice", &mut prompt)
            .await;

        assert!(matches!(
            result,
            Err(SessionError::RegistrationAborted { ref username }) if username == "alice"
        ));
        assert!(publisher.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn self_follow_never_reaches_the_server() {
        let mut h = harness(&[], "alice").await;
        let before = h.log.len();

        let err = h.session.follow("alice").await.unwrap_err();

        assert!(matches!(
            err,
            CommandError::Rejected(PreconditionRejected::SelfFollow)
        ));
        assert_eq!(h.log.len(), before);
        assert!(h.audit.contains(AuditLevel::Warning, "tried to follow themselves"));
    }

    #[tokio::test]
    async fn self_message_never_reaches_the_server() {
        let mut h = harness(&[], "alice").await;
        let before = h.log.len();

        let err = h.session.send_message("alice", "note to self").await.unwrap_err();

        assert!(matches!(
            err,
            CommandError::Rejected(PreconditionRejected::SelfMessage)
        ));
        assert_eq!(h.log.len(), before);
    }

    #[tokio::test]
    async fn follow_outcomes_are_audited() {
        let mut h = harness(&["bob"], "alice").await;

        assert_eq!(h.session.follow("bob").await.unwrap(), FollowOutcome::Following);
        assert_eq!(h.session.follow("bob").await.unwrap(), FollowOutcome::Following);
        assert_eq!(h.session.follow("ghost").await.unwrap(), FollowOutcome::NotFound);

        assert_eq!(h.session.following(), ["bob"]);
        assert!(h.audit.contains(AuditLevel::Info, "User 'alice' followed 'bob'"));
        assert!(h.audit.contains(AuditLevel::Warning, "User 'ghost' not found"));
    }

    #[tokio::test]
    async fn delay_skews_each_later_timestamp() {
        let mut h = harness(&["bob"], "alice").await;

        h.session.set_delay(30).unwrap();
        h.session.post("first").await.unwrap();
        h.session.set_delay(90).unwrap();
        h.session.post("second").await.unwrap();
        h.session.send_message("bob", "hi").await.unwrap();

        let requests = h.log.json();
        let posts: Vec<&Value> = requests
            .iter()
            .filter(|r| r["action"] == "post_text")
            .collect();
        assert_eq!(posts[0]["tempoEnvioMensagem"], "2024-05-01T11:59:30");
        assert_eq!(posts[1]["tempoEnvioMensagem"], "2024-05-01T11:58:30");
        assert_eq!(posts[1]["texto"], "second");

        let message = requests
            .iter()
            .find(|r| r["action"] == "add_private_message")
            .unwrap();
        assert_eq!(message["timestamp"], noon().timestamp() - 90);
        assert!(h.audit.contains(AuditLevel::Info, "Delay of 90s applied"));
        assert!(h.audit.contains(AuditLevel::Info, "set forced delay to 90 seconds"));
    }

    #[tokio::test]
    async fn out_of_range_delay_keeps_the_old_one() {
        let mut h = harness(&[], "alice").await;
        h.session.set_delay(5).unwrap();
        assert!(h.session.set_delay(i64::MAX).is_err());
        assert_eq!(h.session.delay().secs(), 5);
    }

    #[tokio::test]
    async fn empty_conversation_renders_placeholder() {
        let mut h = harness(&["bob"], "alice").await;
        let conversation = h.session.conversation("bob").await.unwrap();
        assert!(conversation.is_empty());
        assert!(conversation.to_string().contains("no messages yet"));
    }

    #[tokio::test]
    async fn delivered_message_refreshes_conversation() {
        let mut h = harness(&["bob"], "alice").await;

        let report = h.session.send_message("bob", "hello bob").await.unwrap();

        assert_eq!(report.outcome, MessageOutcome::Delivered);
        let conversation = report.conversation.unwrap();
        assert_eq!(conversation.lines().len(), 1);
        assert_eq!(conversation.lines()[0].text, "hello bob");
        assert_eq!(
            h.log.actions().last().map(String::as_str),
            Some("get_private_messages")
        );
    }

    #[tokio::test]
    async fn unknown_recipient_skips_refresh() {
        let mut h = harness(&[], "alice").await;
        let report = h.session.send_message("ghost", "anyone?").await.unwrap();
        assert_eq!(report.outcome, MessageOutcome::RecipientNotFound);
        assert!(report.conversation.is_none());
        assert_eq!(
            h.log.actions().last().map(String::as_str),
            Some("add_private_message")
        );
    }

    #[tokio::test]
    async fn notifications_are_drained_once() {
        let h = harness(&[], "alice").await;
        let topic = h.session.registration().topic.clone();

        h.publisher.notify(&topic, "New post from bob is available!");
        h.publisher.notify("someone_else", "not for alice");
        h.publisher.notify(&topic, "New post from carol is available!");
        for _ in 0..200 {
            if h.session.buffer().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let report = h.session.check_notifications();
        assert_eq!(
            report.to_string(),
            "[1] New post from bob is available!\n[2] New post from carol is available!\n"
        );
        assert!(h.session.check_notifications().is_empty());
        assert!(h.audit.contains(AuditLevel::Info, "checked notifications. Total: 2"));
        assert!(h.audit.contains(AuditLevel::Info, "checked notifications. Total: 0"));
    }

    #[tokio::test]
    async fn shutdown_closes_both_channels() {
        let h = harness(&[], "alice").await;
        let topic = h.session.registration().topic.clone();
        assert!(!h.log.is_closed());

        let exit = tokio::time::timeout(Duration::from_secs(5), h.session.shutdown())
            .await
            .unwrap();

        assert!(matches!(exit, ListenerExit::Shutdown));
        assert!(h.log.is_closed());
        assert!(!h.publisher.notify(&topic, "after the end"));
        assert!(h.audit.contains(AuditLevel::Info, "Session ended"));
    }

    #[tokio::test]
    async fn notification_capacity_is_configurable() {
        let mut server = FakeServer::default();
        let channel = MemoryRequestChannel::json(move |req| server.handle(req));
        let (publisher, subscriber) = memory::subscription();
        let mut prompt = ScriptedPrompt {
            names: Vec::new(),
            rejected: Vec::new(),
            publisher: publisher.clone(),
        };

        let session = SessionBuilder::new(Arc::new(MemoryAuditLog::new()))
            .notification_capacity(2)
            .register(channel, subscriber, "alice", &mut prompt)
            .await
            .unwrap();
        assert_eq!(session.buffer().capacity(), 2);

        let topic = session.registration().topic.clone();
        for i in 0..3 {
            publisher.notify(&topic, &format!("post {i}"));
        }
        for _ in 0..200 {
            if session.buffer().dropped() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(session.buffer().len(), 2);
        assert_eq!(session.buffer().dropped(), 1);
        session.shutdown().await;
    }
}
