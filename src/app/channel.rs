#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ChannelAction {
    Connect,
    NotifyIndicator(bool),
    Dispatch(StatusEvent),
    DropMessage(String),
    ScheduleRetry { attempt: u32, delay: Duration },
    GiveUp,
}

#[derive(Debug, Error)]
enum ClassifyError {
    #[error("malformed feed message: {0}")]
    Malformed(serde_json::Error),
    #[error("feed message has no type discriminator")]
    MissingType,
    #[error("unknown feed message type `{0}`")]
    UnknownType(String),
}

fn classify_message(text: &str) -> Result<StatusEvent, ClassifyError> {
    let value: Value = serde_json::from_str(text).map_err(ClassifyError::Malformed)?;
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Err(ClassifyError::MissingType);
    };
    match kind {
        "status" | "error" | "progress" | "crawling_status" => {
            serde_json::from_value(value).map_err(ClassifyError::Malformed)
        }
        other => Err(ClassifyError::UnknownType(other.to_string())),
    }
}

/// Connection state machine for the live status feed. Pure: every input
/// returns the actions the driver must carry out, so the retry schedule is
/// testable without sockets or timers.
#[derive(Debug)]
struct ChannelCore {
    state: ConnectionState,
    attempts: u32,
    policy: RetryPolicy,
}

impl ChannelCore {
    fn new(policy: RetryPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            policy,
        }
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn start(&mut self) -> Vec<ChannelAction> {
        match self.state {
            ConnectionState::Disconnected => {
                self.state = ConnectionState::Connecting;
                vec![ChannelAction::Connect]
            }
            _ => Vec::new(),
        }
    }

    fn on_open(&mut self) -> Vec<ChannelAction> {
        match self.state {
            ConnectionState::Connecting => {
                self.state = ConnectionState::Connected;
                self.attempts = 0;
                vec![ChannelAction::NotifyIndicator(true)]
            }
            _ => Vec::new(),
        }
    }

    // Decode failures are isolated per message; they never touch the
    // connection state.
    fn on_message(&mut self, text: &str) -> Vec<ChannelAction> {
        match classify_message(text) {
            Ok(event) => vec![ChannelAction::Dispatch(event)],
            Err(err) => vec![ChannelAction::DropMessage(err.to_string())],
        }
    }

    fn on_drop(&mut self) -> Vec<ChannelAction> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                if self.attempts < self.policy.max_attempts {
                    self.attempts += 1;
                    self.state = ConnectionState::Reconnecting;
                    vec![
                        ChannelAction::NotifyIndicator(false),
                        ChannelAction::ScheduleRetry {
                            attempt: self.attempts,
                            delay: self.policy.delay,
                        },
                    ]
                } else {
                    self.state = ConnectionState::Exhausted;
                    vec![ChannelAction::NotifyIndicator(false), ChannelAction::GiveUp]
                }
            }
            _ => Vec::new(),
        }
    }

    fn retry_elapsed(&mut self) -> Vec<ChannelAction> {
        match self.state {
            ConnectionState::Reconnecting => {
                self.state = ConnectionState::Connecting;
                vec![ChannelAction::Connect]
            }
            _ => Vec::new(),
        }
    }
}

// An https base maps to wss; the socket crate carries the rustls backend
// for that case, same as the HTTP client.
fn feed_url(base: &Url, ws_path: &str) -> Result<Url, url::ParseError> {
    let mut url = base.join(ws_path)?;
    let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
    let _ = url.set_scheme(scheme);
    Ok(url)
}

fn forward(tx: &UnboundedSender<UiEvent>, action: ChannelAction) {
    match action {
        ChannelAction::NotifyIndicator(connected) => {
            let _ = tx.send(UiEvent::ConnectionChanged(connected));
        }
        ChannelAction::Dispatch(event) => {
            let _ = tx.send(UiEvent::Feed(event));
        }
        ChannelAction::DropMessage(reason) => {
            warn!("dropping feed message: {reason}");
            let _ = tx.send(UiEvent::FeedDropped(reason));
        }
        ChannelAction::Connect | ChannelAction::ScheduleRetry { .. } | ChannelAction::GiveUp => {}
    }
}

fn forward_all(tx: &UnboundedSender<UiEvent>, actions: Vec<ChannelAction>) {
    for action in actions {
        forward(tx, action);
    }
}

/// Drives `ChannelCore` against a real WebSocket. Holds at most one socket
/// at a time; a reconnect never starts while a connection attempt is
/// outstanding.
async fn feed_loop(url: Url, policy: RetryPolicy, tx: UnboundedSender<UiEvent>) {
    let mut core = ChannelCore::new(policy);
    let mut pending = core.start();
    loop {
        let mut next = Vec::new();
        for action in pending.drain(..) {
            match action {
                ChannelAction::Connect => match connect_async(url.as_str()).await {
                    Ok((ws, _)) => {
                        info!("live feed connected to {url}");
                        forward_all(&tx, core.on_open());
                        next.extend(read_feed(ws, &mut core, &tx).await);
                    }
                    Err(err) => {
                        next.extend(core.on_drop());
                        warn!(
                            "live feed connect failed ({}): {err}",
                            core.state().label()
                        );
                    }
                },
                ChannelAction::ScheduleRetry { attempt, delay } => {
                    info!(
                        "live feed reconnect attempt {attempt}/{max} in {delay:?}",
                        max = policy.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    next.extend(core.retry_elapsed());
                }
                ChannelAction::GiveUp => {
                    warn!("live feed retry budget exhausted");
                    let _ = tx.send(UiEvent::FeedExhausted);
                    return;
                }
                other => forward(&tx, other),
            }
        }
        if next.is_empty() {
            return;
        }
        pending = next;
    }
}

async fn read_feed(
    mut ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    core: &mut ChannelCore,
    tx: &UnboundedSender<UiEvent>,
) -> Vec<ChannelAction> {
    loop {
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => forward_all(tx, core.on_message(text.as_str())),
            Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => {
                warn!("live feed dropped");
                return core.on_drop();
            }
            Some(Ok(_)) => {}
        }
    }
}

#[cfg(test)]
mod channel_tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_secs(3),
        }
    }

    #[test]
    fn start_connects_once() {
        let mut core = ChannelCore::new(policy());
        assert_eq!(core.start(), vec![ChannelAction::Connect]);
        assert_eq!(core.state(), ConnectionState::Connecting);
        assert!(core.start().is_empty());
    }

    #[test]
    fn open_notifies_indicator_and_resets_attempts() {
        let mut core = ChannelCore::new(policy());
        core.start();
        core.on_drop();
        core.retry_elapsed();
        core.on_drop();
        core.retry_elapsed();
        assert_eq!(core.on_open(), vec![ChannelAction::NotifyIndicator(true)]);
        assert_eq!(core.state(), ConnectionState::Connected);

        // The budget is restored: another full run of drops is allowed.
        for attempt in 1..=5 {
            let actions = core.on_drop();
            assert_eq!(
                actions,
                vec![
                    ChannelAction::NotifyIndicator(false),
                    ChannelAction::ScheduleRetry {
                        attempt,
                        delay: Duration::from_secs(3)
                    }
                ]
            );
            assert!(matches!(
                core.retry_elapsed().as_slice(),
                [ChannelAction::Connect]
            ));
        }
    }

    #[test]
    fn each_drop_schedules_exactly_one_retry_until_budget_spent() {
        let mut core = ChannelCore::new(policy());
        core.start();
        for attempt in 1..=5 {
            let actions = core.on_drop();
            let retries = actions
                .iter()
                .filter(|action| matches!(action, ChannelAction::ScheduleRetry { .. }))
                .count();
            assert_eq!(retries, 1, "attempt {attempt}");
            assert_eq!(core.state(), ConnectionState::Reconnecting);
            assert_eq!(core.retry_elapsed(), vec![ChannelAction::Connect]);
        }

        // Sixth drop: budget spent, the channel gives up for good.
        let actions = core.on_drop();
        assert_eq!(
            actions,
            vec![ChannelAction::NotifyIndicator(false), ChannelAction::GiveUp]
        );
        assert_eq!(core.state(), ConnectionState::Exhausted);
    }

    #[test]
    fn exhausted_is_terminal() {
        let mut core = ChannelCore::new(RetryPolicy {
            max_attempts: 0,
            delay: Duration::from_secs(3),
        });
        core.start();
        core.on_drop();
        assert_eq!(core.state(), ConnectionState::Exhausted);
        assert!(core.start().is_empty());
        assert!(core.on_drop().is_empty());
        assert!(core.retry_elapsed().is_empty());
        assert!(core.on_open().is_empty());
        assert_eq!(core.state(), ConnectionState::Exhausted);
    }

    #[test]
    fn classifies_every_known_discriminator() {
        let event = classify_message(r#"{"type":"status","message":"crawl queued"}"#).unwrap();
        assert_eq!(
            event,
            StatusEvent::Status {
                message: "crawl queued".to_string()
            }
        );

        let event = classify_message(r#"{"type":"error","message":"boom"}"#).unwrap();
        assert_eq!(
            event,
            StatusEvent::Error {
                message: "boom".to_string()
            }
        );

        let event =
            classify_message(r#"{"type":"progress","current":4,"total":10,"message":"keyword 4"}"#)
                .unwrap();
        assert_eq!(
            event,
            StatusEvent::Progress {
                current: Some(4),
                total: Some(10),
                message: Some("keyword 4".to_string()),
            }
        );

        let event = classify_message(r#"{"type":"progress"}"#).unwrap();
        assert_eq!(
            event,
            StatusEvent::Progress {
                current: None,
                total: None,
                message: None,
            }
        );

        let event = classify_message(
            r#"{"type":"crawling_status","current_keyword":"VR","processed_count":3,"total_keywords":15,"total_results":120}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StatusEvent::CrawlingStatus(CrawlingStatus {
                current_keyword: Some("VR".to_string()),
                processed_count: 3,
                total_keywords: 15,
                total_results: 120,
            })
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_messages() {
        assert!(matches!(
            classify_message(r#"{"type":"heartbeat"}"#),
            Err(ClassifyError::UnknownType(kind)) if kind == "heartbeat"
        ));
        assert!(matches!(
            classify_message(r#"{"message":"no type"}"#),
            Err(ClassifyError::MissingType)
        ));
        assert!(matches!(
            classify_message("not json"),
            Err(ClassifyError::Malformed(_))
        ));
        assert!(matches!(
            classify_message(r#"{"type":"status","message":7}"#),
            Err(ClassifyError::Malformed(_))
        ));
    }

    #[test]
    fn bad_message_is_dropped_without_state_change() {
        let mut core = ChannelCore::new(policy());
        core.start();
        core.on_open();
        let actions = core.on_message("not json");
        assert!(matches!(
            actions.as_slice(),
            [ChannelAction::DropMessage(_)]
        ));
        assert_eq!(core.state(), ConnectionState::Connected);

        let actions = core.on_message(r#"{"type":"status","message":"still alive"}"#);
        assert!(matches!(actions.as_slice(), [ChannelAction::Dispatch(_)]));
    }

    #[test]
    fn feed_url_maps_scheme_and_path() {
        let base = Url::parse("http://127.0.0.1:8000").unwrap();
        assert_eq!(
            feed_url(&base, "/ws").unwrap().as_str(),
            "ws://127.0.0.1:8000/ws"
        );

        let base = Url::parse("https://crawl.example.com").unwrap();
        assert_eq!(
            feed_url(&base, "/ws").unwrap().as_str(),
            "wss://crawl.example.com/ws"
        );
    }
}
