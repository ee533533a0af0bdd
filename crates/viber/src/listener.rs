use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cmdbot_core::envelope::{EnvelopeKind, RelayEnvelope};
use cmdbot_core::executor::CommandExecutor;
use cmdbot_core::registry::OutputFormat;
use cmdbot_relay::{Relay, RelayError, DEFAULT_RECEIVE_TIMEOUT};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::MessageSender;
use crate::dispatcher::deliver;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Consumes the relay channel: runs `execute` envelopes addressed to this
/// host and logs everything else.
pub struct RelayListener {
    relay: Arc<Relay>,
    executor: CommandExecutor,
    sender: Arc<dyn MessageSender>,
    hostname: String,
    reconnect_policy: ReconnectPolicy,
    receive_timeout: Duration,
}

impl RelayListener {
    pub fn new(
        relay: Arc<Relay>,
        executor: CommandExecutor,
        sender: Arc<dyn MessageSender>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            relay,
            executor,
            sender,
            hostname: hostname.into(),
            reconnect_policy: ReconnectPolicy::default(),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }

    pub fn with_reconnect_policy(mut self, reconnect_policy: ReconnectPolicy) -> Self {
        self.reconnect_policy = reconnect_policy;
        self
    }

    pub fn with_receive_timeout(mut self, receive_timeout: Duration) -> Self {
        self.receive_timeout = receive_timeout;
        self
    }

    /// Runs until `shutdown` turns true. A session that managed to subscribe
    /// resets the retry budget; running out of retries is an error.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let max_retries = self.reconnect_policy.max_retries;
        let mut attempt = 0;
        loop {
            let mut subscribed = false;
            let relay_error =
                match self.listen_and_pump(attempt, &mut subscribed, &mut shutdown).await {
                    Ok(()) => return Ok(()),
                    Err(relay_error) => relay_error,
                };
            if subscribed {
                attempt = 0;
            }
            warn!(
                event_name = "relay.listener_failed",
                attempt,
                max_retries,
                error = %relay_error,
                "relay listener failed"
            );

            if attempt >= max_retries {
                error!(
                    event_name = "relay.listener_exhausted",
                    max_retries,
                    error = %relay_error,
                    "relay listener retries exhausted"
                );
                return Err(anyhow::Error::new(relay_error)
                    .context(format!("relay listener gave up after {} attempts", attempt + 1)));
            }

            let delay = self.reconnect_policy.backoff(attempt);
            attempt += 1;
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => return Ok(()),
                }
            }
        }
    }

    async fn listen_and_pump(
        &self,
        attempt: u32,
        subscribed: &mut bool,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), RelayError> {
        self.relay.listen().await?;
        *subscribed = true;
        info!(
            event_name = "relay.listening",
            attempt,
            channel = self.relay.channel().unwrap_or_default(),
            hostname = %self.hostname,
            "listening on relay channel"
        );

        loop {
            if *shutdown.borrow() {
                info!(event_name = "relay.listener_stopped", "relay listener shutting down");
                return Ok(());
            }

            let received = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    continue;
                }
                received = self.relay.get_message(self.receive_timeout) => received?,
            };

            if let Some(envelope) = received {
                self.handle(envelope).await;
            }
        }
    }

    async fn handle(&self, envelope: RelayEnvelope) {
        match envelope.kind {
            EnvelopeKind::Text => info!(
                event_name = "relay.message_received",
                user_id = %envelope.user_id,
                name = %envelope.name,
                date = %envelope.date,
                text = %envelope.text,
                media = envelope.media.as_deref().unwrap_or_default(),
                "relay message"
            ),
            EnvelopeKind::Execute => self.execute(envelope).await,
        }
    }

    async fn execute(&self, envelope: RelayEnvelope) {
        let correlation_id = Uuid::new_v4().to_string();
        if !envelope.is_addressed_to(&self.hostname) {
            debug!(
                event_name = "relay.execute_skipped",
                correlation_id = %correlation_id,
                hostname = %self.hostname,
                destination = ?envelope.destination,
                "execute envelope is addressed to other hosts"
            );
            return;
        }

        info!(
            event_name = "relay.execute_started",
            correlation_id = %correlation_id,
            user_id = %envelope.user_id,
            command = %envelope.text,
            "running relayed command"
        );
        let output = self.executor.run(&envelope.text, envelope.output_format).await;
        if envelope.output_format == OutputFormat::None {
            return;
        }

        let media = output.media.as_deref();
        deliver(self.sender.as_ref(), &envelope.user_id, &output.text, media, &correlation_id)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use cmdbot_core::envelope::RelayEnvelope;
    use cmdbot_core::executor::CommandExecutor;
    use cmdbot_core::messages::OutboundMessage;
    use cmdbot_core::registry::OutputFormat;
    use cmdbot_relay::{InMemoryRelay, Relay, RelayError};
    use tokio::sync::watch;

    use super::{ReconnectPolicy, RelayListener};
    use crate::client::RecordingSender;

    const POLL: Duration = Duration::from_millis(10);

    fn listener(relay: Arc<Relay>, sender: Arc<RecordingSender>) -> RelayListener {
        RelayListener::new(relay, CommandExecutor::default(), sender, "alpha")
            .with_receive_timeout(Duration::from_millis(20))
            .with_reconnect_policy(ReconnectPolicy {
                max_retries: 2,
                base_delay_ms: 0,
                max_delay_ms: 0,
            })
    }

    async fn wait_for_deliveries(sender: &RecordingSender, count: usize) {
        for _ in 0..500 {
            if sender.deliveries().await.len() >= count {
                return;
            }
            tokio::time::sleep(POLL).await;
        }
        panic!("expected {count} deliveries");
    }

    #[test]
    fn backoff_grows_exponentially_and_is_capped() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 100, max_delay_ms: 1_000 };

        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn executes_envelopes_addressed_to_this_host() {
        let backend = Arc::new(InMemoryRelay::default());
        let relay = Arc::new(Relay::new(backend, "viber", "Command Bot"));
        let sender = Arc::new(RecordingSender::default());
        relay.listen().await.expect("listen");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener = listener(relay.clone(), sender.clone());
        let task = tokio::spawn(async move { listener.start(shutdown_rx).await });

        relay.publish(RelayEnvelope::text("u1", "just chatter", "Operator")).await;
        relay
            .publish(
                RelayEnvelope::execute("u1", "echo skipped", "Operator", OutputFormat::Text)
                    .with_destination(vec!["beta".to_owned()]),
            )
            .await;
        relay.publish(RelayEnvelope::execute("u1", "true", "Operator", OutputFormat::None)).await;
        relay
            .publish(
                RelayEnvelope::execute("u1", "echo from alpha", "Operator", OutputFormat::Text)
                    .with_destination(vec!["ALPHA".to_owned(), "beta".to_owned()]),
            )
            .await;

        wait_for_deliveries(&sender, 1).await;
        shutdown_tx.send(true).expect("signal shutdown");
        task.await.expect("join").expect("listener result");

        assert_eq!(
            sender.deliveries().await,
            vec![("u1".to_owned(), vec![OutboundMessage::Text("from alpha".to_owned())])]
        );
    }

    #[tokio::test]
    async fn exhausted_retries_are_reported_as_an_error() {
        let backend = Arc::new(InMemoryRelay::default());
        backend.set_unavailable(true);
        let relay = Arc::new(Relay::new(backend, "viber", "Command Bot"));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let error = listener(relay, Arc::new(RecordingSender::default()))
            .start(shutdown_rx)
            .await
            .expect_err("listener gives up");
        assert!(error.to_string().contains("gave up after 3 attempts"), "{error}");
    }

    #[tokio::test]
    async fn disabled_relay_cannot_be_listened_to() {
        let relay = Arc::new(Relay::disabled("Command Bot"));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let sender = Arc::new(RecordingSender::default());
        let error = listener(relay, sender.clone()).start(shutdown_rx).await.expect_err("disabled");
        assert!(matches!(error.downcast_ref::<RelayError>(), Some(RelayError::Disabled)));
        assert!(sender.deliveries().await.is_empty());
    }

    #[tokio::test]
    async fn healthy_sessions_reset_the_retry_budget() {
        let backend = Arc::new(InMemoryRelay::default());
        let relay = Arc::new(Relay::new(backend.clone(), "viber", "Command Bot"));
        let sender = Arc::new(RecordingSender::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener = listener(relay.clone(), sender.clone());
        let task = tokio::spawn(async move { listener.start(shutdown_rx).await });

        // Twice the retry budget of two: each drop follows a working session.
        for round in 1..=6 {
            for _ in 0..500 {
                if backend.subscriber_count("viber").await > 0 {
                    break;
                }
                tokio::time::sleep(POLL).await;
            }
            let command = format!("echo round {round}");
            relay.publish(RelayEnvelope::execute("u1", command, "", OutputFormat::Text)).await;
            wait_for_deliveries(&sender, round).await;
            backend.disconnect_subscribers().await;
        }

        assert!(!task.is_finished(), "listener must survive repeated drops");
        shutdown_tx.send(true).expect("signal shutdown");
        task.await.expect("join").expect("listener result");
        assert_eq!(sender.texts_for("u1").await.len(), 6);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_idle_listener() {
        let relay = Arc::new(Relay::new(
            Arc::new(InMemoryRelay::default()),
            "viber",
            "Command Bot",
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener = listener(relay, Arc::new(RecordingSender::default()))
            .with_receive_timeout(Duration::from_secs(60));

        let task = tokio::spawn(async move { listener.start(shutdown_rx).await });
        tokio::time::sleep(POLL).await;
        shutdown_tx.send(true).expect("signal shutdown");

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("listener stops promptly")
            .expect("join")
            .expect("listener result");
    }
}
