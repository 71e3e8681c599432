//! tests/orchestrator_tests.rs
//! Pruebas del fallback WhatsApp -> SMS -> Email.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_rt::test;

    use crate::{
        config::dispatch_config::{DispatchConfig, PollSettings},
        models::delivery_model::Channel,
        services::{
            audit_logger::AuditLogger, delivery_orchestrator::DeliveryOrchestrator,
            gateway::Gateways, status_poller::StatusPoller,
        },
        tests::support::{
            always, announcement, fast_poll, harness, never, recipient, BrokenAuditStore,
            ScriptedGateway, ScriptedSend,
        },
    };

    #[test]
    async fn test_whatsapp_fails_sms_succeeds() {
        let h = harness(
            Gateways::new(never(Channel::Whatsapp), always(Channel::Sms), always(Channel::Email)),
            fast_poll(),
        );

        let result = h
            .orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Sms);
        assert!(result.success);
        assert_eq!(result.recipient_id, "r1");

        let records = h.store.snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].channel, Channel::Whatsapp);
        assert!(!records[0].success);
        assert_eq!(records[1].channel, Channel::Sms);
        assert!(records[1].success);
        assert!(records.iter().all(|r| r.announcement_id == "ann-1"));
    }

    #[test]
    async fn test_all_channels_fail() {
        let h = harness(
            Gateways::new(never(Channel::Whatsapp), never(Channel::Sms), never(Channel::Email)),
            fast_poll(),
        );

        let result = h
            .orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Email);
        assert!(!result.success);

        let channels: Vec<_> = h.store.snapshot().iter().map(|r| (r.channel, r.success)).collect();
        assert_eq!(
            channels,
            vec![
                (Channel::Whatsapp, false),
                (Channel::Sms, false),
                (Channel::Email, false)
            ]
        );
    }

    #[test]
    async fn test_mock_whatsapp_success_short_circuits() {
        let h = harness(
            Gateways::new(always(Channel::Whatsapp), always(Channel::Sms), always(Channel::Email)),
            fast_poll(),
        );

        let result = h
            .orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Whatsapp);
        assert!(result.success);
        assert_eq!(h.store.snapshot().len(), 1);
    }

    #[test]
    async fn test_whatsapp_confirmed_after_polling() {
        let whatsapp = Arc::new(
            ScriptedGateway::new(Channel::Whatsapp, ScriptedSend::Trackable("SM-wa-1"))
                .with_statuses(&["queued", "sent", "read"]),
        );
        let h = harness(
            Gateways::new(whatsapp.clone(), never(Channel::Sms), never(Channel::Email)),
            PollSettings {
                timeout: std::time::Duration::from_secs(5),
                interval: std::time::Duration::from_millis(5),
            },
        );

        let result = h
            .orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Whatsapp);
        assert!(result.success);
        assert_eq!(whatsapp.fetch_count(), 3);

        let records = h.store.snapshot();
        assert_eq!(records.len(), 2, "envío + confirmación");
        assert!(records.iter().all(|r| r.channel == Channel::Whatsapp));
        assert_eq!(records[1].response["status"], "read");
        assert_eq!(records[1].response["message_id"], "SM-wa-1");
        assert!(records[1].response.get("outcome").is_none());
    }

    #[test]
    async fn test_huge_configured_timeout_still_confirms_whatsapp() {
        let poll = DispatchConfig::from_lookup(|key| match key {
            "WHATSAPP_POLL_TIMEOUT_SECS" => Some(u64::MAX.to_string()),
            _ => None,
        })
        .poll;
        let whatsapp = Arc::new(
            ScriptedGateway::new(Channel::Whatsapp, ScriptedSend::Trackable("SM-wa-9"))
                .with_statuses(&["delivered"]),
        );
        let h = harness(
            Gateways::new(whatsapp, never(Channel::Sms), never(Channel::Email)),
            poll,
        );

        let result = h
            .orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Whatsapp);
        assert!(result.success);
        let records = h.store.snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].response["status"], "delivered");
    }

    #[test]
    async fn test_whatsapp_explicit_failure_falls_back() {
        let whatsapp = Arc::new(
            ScriptedGateway::new(Channel::Whatsapp, ScriptedSend::Trackable("SM-wa-2"))
                .with_statuses(&["undelivered"]),
        );
        let h = harness(
            Gateways::new(whatsapp, always(Channel::Sms), never(Channel::Email)),
            fast_poll(),
        );

        let result = h
            .orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Sms);
        assert!(result.success);

        let records = h.store.snapshot();
        assert_eq!(records.len(), 3);
        // el envío fue aceptado, la confirmación no
        assert!(records[0].success);
        assert!(!records[1].success);
        assert_eq!(records[1].response["status"], "undelivered");
        assert_eq!(records[2].channel, Channel::Sms);
    }

    #[test]
    async fn test_whatsapp_timeout_is_tagged_and_falls_back() {
        let whatsapp = Arc::new(
            ScriptedGateway::new(Channel::Whatsapp, ScriptedSend::Trackable("SM-wa-3"))
                .with_statuses(&["sent"]),
        );
        let h = harness(
            Gateways::new(whatsapp.clone(), never(Channel::Sms), always(Channel::Email)),
            fast_poll(),
        );

        let result = h
            .orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Email);
        assert!(result.success);
        assert!(whatsapp.fetch_count() >= 2);

        let records = h.store.snapshot();
        let confirmation = &records[1];
        assert_eq!(confirmation.channel, Channel::Whatsapp);
        assert!(!confirmation.success);
        assert_eq!(confirmation.response["status"], "timeout");
        assert_eq!(records.len(), 4);
    }

    #[test]
    async fn test_whatsapp_status_error_falls_back() {
        let whatsapp = Arc::new(
            ScriptedGateway::new(Channel::Whatsapp, ScriptedSend::Trackable("SM-wa-4"))
                .with_status_error("503 service unavailable"),
        );
        let h = harness(
            Gateways::new(whatsapp.clone(), always(Channel::Sms), never(Channel::Email)),
            fast_poll(),
        );

        let result = h
            .orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Sms);
        assert_eq!(whatsapp.fetch_count(), 1, "sin reintento ante error de transporte");

        let records = h.store.snapshot();
        assert_eq!(records[1].response["status"], "error");
        assert_eq!(records[1].response["error_message"], "503 service unavailable");
    }

    #[test]
    async fn test_whatsapp_transport_error_is_recorded() {
        let whatsapp = Arc::new(ScriptedGateway::new(
            Channel::Whatsapp,
            ScriptedSend::TransportError,
        ));
        let h = harness(
            Gateways::new(whatsapp, always(Channel::Sms), never(Channel::Email)),
            fast_poll(),
        );

        let result = h
            .orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Sms);
        let records = h.store.snapshot();
        assert_eq!(records.len(), 2);
        assert!(!records[0].success);
        assert_eq!(records[0].response["status"], "error");
        assert!(records[0].response["info"]["error_message"]
            .as_str()
            .unwrap()
            .contains("connection reset"));
    }

    #[test]
    async fn test_sms_single_check_sent_confirms() {
        let sms = Arc::new(
            ScriptedGateway::new(Channel::Sms, ScriptedSend::Trackable("SM-sms-1"))
                .with_statuses(&["sent"]),
        );
        let h = harness(
            Gateways::new(never(Channel::Whatsapp), sms.clone(), always(Channel::Email)),
            fast_poll(),
        );

        let result = h
            .orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Sms);
        assert!(result.success);
        assert_eq!(sms.fetch_count(), 1);

        let records = h.store.snapshot();
        assert_eq!(records.len(), 3);
        assert!(records[2].success);
        assert_eq!(records[2].channel, Channel::Sms);
    }

    #[test]
    async fn test_sms_unconfirmed_falls_to_email() {
        let sms = Arc::new(
            ScriptedGateway::new(Channel::Sms, ScriptedSend::Trackable("SM-sms-2"))
                .with_statuses(&["queued", "delivered"]),
        );
        let h = harness(
            Gateways::new(never(Channel::Whatsapp), sms.clone(), never(Channel::Email)),
            fast_poll(),
        );

        let result = h
            .orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Email);
        assert!(!result.success);
        assert_eq!(sms.fetch_count(), 1, "SMS no hace polling");

        let channels: Vec<_> = h.store.snapshot().iter().map(|r| r.channel).collect();
        assert_eq!(
            channels,
            vec![Channel::Whatsapp, Channel::Sms, Channel::Sms, Channel::Email]
        );
    }

    #[test]
    async fn test_sms_rejected_skips_status_check() {
        let sms = Arc::new(ScriptedGateway::new(Channel::Sms, ScriptedSend::Rejected));
        let h = harness(
            Gateways::new(never(Channel::Whatsapp), sms.clone(), always(Channel::Email)),
            fast_poll(),
        );

        let result = h
            .orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Email);
        assert_eq!(sms.fetch_count(), 0);
        assert_eq!(h.store.snapshot().len(), 3);
    }

    #[test]
    async fn test_missing_whatsapp_address_skips_channel() {
        let h = harness(
            Gateways::new(always(Channel::Whatsapp), always(Channel::Sms), always(Channel::Email)),
            fast_poll(),
        );
        let mut r = recipient("r1");
        r.whatsapp_address = None;

        let result = h.orchestrator.orchestrate(&announcement(), &r).await;

        assert_eq!(result.channel, Channel::Sms);
        let records = h.store.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].channel, Channel::Sms);
    }

    #[test]
    async fn test_missing_email_reports_missing_recipient() {
        let h = harness(
            Gateways::new(always(Channel::Whatsapp), always(Channel::Sms), always(Channel::Email)),
            fast_poll(),
        );
        let r = crate::models::announcement_model::Recipient {
            id: "r-sin-datos".to_string(),
            ..Default::default()
        };

        let result = h.orchestrator.orchestrate(&announcement(), &r).await;

        assert_eq!(result.channel, Channel::Email);
        assert!(!result.success);
        assert_eq!(result.response["info"]["reason"], "missing_recipient");
        assert_eq!(h.store.snapshot().len(), 1);
    }

    #[test]
    async fn test_audit_failure_does_not_abort() {
        let audit = AuditLogger::new(Arc::new(BrokenAuditStore));
        let orchestrator = DeliveryOrchestrator::new(
            Gateways::new(never(Channel::Whatsapp), never(Channel::Sms), always(Channel::Email)),
            audit,
            StatusPoller::new(fast_poll()),
        );

        let result = orchestrator
            .orchestrate(&announcement(), &recipient("r1"))
            .await;

        assert_eq!(result.channel, Channel::Email);
        assert!(result.success);
    }
}
