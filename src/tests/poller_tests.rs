//! tests/poller_tests.rs

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::{
        config::dispatch_config::PollSettings,
        models::delivery_model::Channel,
        services::status_poller::{is_terminal, StatusPoller},
        tests::support::{ScriptedGateway, ScriptedSend},
    };

    fn gateway(statuses: &[&str]) -> ScriptedGateway {
        ScriptedGateway::new(Channel::Whatsapp, ScriptedSend::Trackable("SM-1")).with_statuses(statuses)
    }

    #[actix_rt::test]
    async fn test_failed_on_first_check_returns_immediately() {
        let poller = StatusPoller::new(PollSettings::default());
        let gw = gateway(&["failed"]);

        let start = Instant::now();
        let outcome = poller.await_confirmation(&gw, "SM-1").await;

        assert!(outcome.is_final);
        assert_eq!(outcome.status, "failed");
        assert_eq!(gw.fetch_count(), 1);
        assert!(start.elapsed() < Duration::from_secs(1), "no debe esperar el timeout");
    }

    #[actix_rt::test]
    async fn test_delivered_after_several_checks() {
        let poller = StatusPoller::new(PollSettings {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(5),
        });
        let gw = gateway(&["queued", "sent", "delivered"]);

        let outcome = poller.await_confirmation(&gw, "SM-1").await;

        assert!(outcome.is_final);
        assert_eq!(outcome.status, "delivered");
        assert_eq!(gw.fetch_count(), 3);
        assert_eq!(outcome.info["sid"], "SM-1");
    }

    #[actix_rt::test]
    async fn test_timeout_when_never_terminal() {
        let poller = StatusPoller::new(PollSettings {
            timeout: Duration::from_millis(50),
            interval: Duration::from_millis(10),
        });
        let gw = gateway(&["sent"]);

        let start = Instant::now();
        let outcome = poller.await_confirmation(&gw, "SM-1").await;

        assert!(!outcome.is_final);
        assert_eq!(outcome.status, "timeout");
        assert!(outcome.info.is_null());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(gw.fetch_count() >= 2);
    }

    #[actix_rt::test]
    async fn test_transport_error_stops_without_retry() {
        let poller = StatusPoller::new(PollSettings {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(5),
        });
        let gw = ScriptedGateway::new(Channel::Whatsapp, ScriptedSend::Trackable("SM-1"))
            .with_status_error("timed out");

        let outcome = poller.await_confirmation(&gw, "SM-1").await;

        assert!(!outcome.is_final);
        assert_eq!(outcome.status, "error");
        assert_eq!(outcome.info, "timed out");
        assert_eq!(gw.fetch_count(), 1);
    }

    #[actix_rt::test]
    async fn test_unrepresentable_timeout_waits_without_deadline() {
        let poller = StatusPoller::new(PollSettings {
            timeout: Duration::from_secs(u64::MAX),
            interval: Duration::from_millis(5),
        });
        let gw = gateway(&["queued", "sent", "delivered"]);

        let outcome = poller.await_confirmation(&gw, "SM-1").await;

        assert!(outcome.is_final);
        assert_eq!(outcome.status, "delivered");
        assert_eq!(gw.fetch_count(), 3);
    }

    #[test]
    fn test_terminal_states() {
        for status in ["delivered", "read", "failed", "undelivered"] {
            assert!(is_terminal(status), "{} debería ser terminal", status);
        }
        for status in ["queued", "sending", "sent", "accepted"] {
            assert!(!is_terminal(status), "{} no es terminal", status);
        }
    }
}
