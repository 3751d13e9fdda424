#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::app_system::DeskSystem;
    use crate::clients::transport::{ScriptRequest, TransportReply};
    use crate::clients::HttpTransport;
    use crate::config::test_config;
    use crate::domain::{Attachment, FormField, OrderForm};
    use crate::error::{AdminError, RemoteError, SubmissionError};
    use crate::flows::admin::Password;
    use crate::mock_framework::{
        create_mock_transport, expect_no_request, expect_request, spawn_script_server, TransportCall,
    };
    use crate::shell::{Shell, ShellCommand, ShellSettings};
    use crate::storage::{MemoryStore, OrderCache};
    use tokio::sync::mpsc;

    async fn start(store: MemoryStore, upload_readable: bool) -> (DeskSystem, mpsc::Receiver<TransportCall>) {
        let (transport, requests) = create_mock_transport(10, upload_readable);
        let catalog = test_config().catalog().unwrap();
        let system = DeskSystem::with_parts(catalog, Box::new(store), Arc::new(transport), None).await;
        (system, requests)
    }

    fn form(quantity: &str) -> OrderForm {
        OrderForm {
            name: "Asha".into(),
            phone: "9800000000".into(),
            sensor_type: "linx".into(),
            quantity: quantity.into(),
            pickup_location: "cubbon-park".into(),
            notes: "after 5pm".into(),
            ..OrderForm::default()
        }
    }

    fn proof() -> Vec<Attachment> {
        vec![Attachment::new(Some("upi.jpg".into()), Some("image/jpeg".into()), b"jpeg".to_vec())]
    }

    #[tokio::test]
    async fn test_order_submission_flow() {
        let store = MemoryStore::new();
        let (system, mut requests) = start(store.clone(), true).await;
        let client = system.client.clone();

        let submit = tokio::spawn(async move { client.submit_order(&form("2"), &proof()).await });

        let (request, responder) = expect_request(&mut requests).await.expect("Expected submitOrder");
        match &request {
            ScriptRequest::SubmitOrder(upload) => {
                assert_eq!(upload.filename, "upi.jpg");
                assert_eq!(upload.mime_type, "image/jpeg");
                assert_eq!(upload.screenshot, "anBlZw==");
                assert_eq!(upload.order_details.quantity, 2);
                assert_eq!(upload.order_details.notes.as_deref(), Some("after 5pm"));
            }
            other => panic!("Unexpected request: {:?}", other),
        }
        responder
            .send(Ok(TransportReply::Body(json!({
                "success": true,
                "upload": {"fileUrl": "https://drive.example/proof"},
                "sheet": {"ok": false, "error": "quota"}
            }))))
            .unwrap();

        let confirmation = submit.await.unwrap().expect("Submission should succeed");
        assert_eq!(confirmation.total, 7800);
        assert_eq!(confirmation.savings, 1200);
        assert_eq!(confirmation.payment_proof_url, "https://drive.example/proof");
        assert_eq!(system.client.desk().cached_order_count().await.unwrap(), 1);

        system.shutdown().await.unwrap();

        // The persisted list survives a restart
        let reloaded = OrderCache::load(Box::new(store)).await;
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.orders()[0].total_amount, 7800);
        assert_eq!(reloaded.orders()[0].payment_proof_url, "https://drive.example/proof");
    }

    #[tokio::test]
    async fn test_remote_failure_leaves_cache_untouched() {
        let (system, mut requests) = start(MemoryStore::new(), true).await;

        for reply in [
            Err(RemoteError::Network("connection refused".into())),
            Err(RemoteError::Status(500)),
            Ok(TransportReply::Body(json!({"success": false, "error": "Drive full"}))),
        ] {
            let client = system.client.clone();
            let submit = tokio::spawn(async move { client.submit_order(&form("1"), &proof()).await });
            let (_, responder) = expect_request(&mut requests).await.unwrap();
            responder.send(reply).unwrap();

            let result = submit.await.unwrap();
            assert!(matches!(result, Err(SubmissionError::Upload(_))), "got {:?}", result);
            assert_eq!(system.client.desk().cached_order_count().await.unwrap(), 0);
        }

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_form_never_reaches_network() {
        let (system, mut requests) = start(MemoryStore::new(), true).await;

        for quantity in ["0", "11"] {
            let result = system.client.submit_order(&form(quantity), &proof()).await;
            assert!(matches!(result, Err(SubmissionError::Validation(_))));
        }
        let result = system.client.submit_order(&form("3"), &[]).await;
        assert!(matches!(result, Err(SubmissionError::Validation(_))));

        // Keys outside the catalog are refused rather than stored as typed
        let mut mistyped = form("2");
        mistyped.sensor_type = "lnx".into();
        match system.client.submit_order(&mistyped, &proof()).await {
            Err(SubmissionError::Validation(errors)) => {
                assert_eq!(errors.iter().map(|e| e.field).collect::<Vec<_>>(), vec!["sensor"]);
            }
            other => panic!("Expected validation error, got {:?}", other),
        }

        assert!(expect_no_request(&mut requests));
        assert_eq!(system.client.desk().cached_order_count().await.unwrap(), 0);
        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_opaque_upload_assumes_success() {
        let (system, mut requests) = start(MemoryStore::new(), false).await;
        let client = system.client.clone();

        let submit = tokio::spawn(async move { client.submit_order(&form("1"), &proof()).await });
        let (_, responder) = expect_request(&mut requests).await.unwrap();
        responder.send(Ok(TransportReply::Opaque)).unwrap();

        let confirmation = submit.await.unwrap().unwrap();
        assert_eq!(confirmation.payment_proof_url, "");
        assert_eq!(system.client.desk().cached_order_count().await.unwrap(), 1);

        // Only uploads are unreadable: the status is still asked for and adopted
        let client = system.client.clone();
        let fetch = tokio::spawn(async move { client.fetch_status().await });
        let (request, responder) = expect_request(&mut requests).await.expect("Expected getStatus");
        assert_eq!(request, ScriptRequest::GetStatus);
        responder
            .send(Ok(TransportReply::Body(json!({"success": true, "ordersEnabled": false}))))
            .unwrap();
        assert_eq!(fetch.await.unwrap(), Ok(false));

        let result = system.client.submit_order(&form("1"), &proof()).await;
        assert_eq!(result, Err(SubmissionError::OrdersDisabled));
        assert!(expect_no_request(&mut requests));
        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_opaque_http_deployment_end_to_end() {
        let url = spawn_script_server(|request| match request["action"].as_str() {
            Some("submitOrder") => json!({"success": true, "fileUrl": "https://drive.example/ignored"}),
            Some("getStatus") => json!({"success": true, "ordersEnabled": false}),
            Some("toggleOrders") if request["password"] == "admin-pw" => {
                json!({"success": true, "ordersEnabled": request["enabled"]})
            }
            Some("toggleOrders") => json!({"success": false, "error": "Invalid password"}),
            _ => json!({"success": false}),
        })
        .await;
        let catalog = test_config().catalog().unwrap();
        let transport = HttpTransport::new(url, true);
        let system = DeskSystem::with_parts(catalog, Box::new(MemoryStore::new()), Arc::new(transport), None).await;

        // Upload reply is never read, so the reference stays empty
        let confirmation = system.client.submit_order(&form("2"), &proof()).await.unwrap();
        assert_eq!(confirmation.payment_proof_url, "");
        assert_eq!(confirmation.total, 7800);

        // Status and toggle replies are read
        assert_eq!(system.client.fetch_status().await, Ok(false));
        let outcome = system.client.set_orders_enabled(true, Some("wrong".into())).await;
        assert!(!outcome.shown);
        assert_eq!(outcome.error, Some(AdminError::Rejected("Invalid password".into())));

        let outcome = system.client.set_orders_enabled(true, Some("admin-pw".into())).await;
        assert!(outcome.shown);
        assert_eq!(outcome.error, None);
        assert!(system.client.desk().orders_enabled().await.unwrap());

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_toggle_disables_and_restores_submissions() {
        let (system, mut requests) = start(MemoryStore::new(), true).await;

        // Turn ordering off
        let client = system.client.clone();
        let toggle = tokio::spawn(async move { client.set_orders_enabled(false, Some("admin-pw".into())).await });
        let (request, responder) = expect_request(&mut requests).await.unwrap();
        assert_eq!(
            request,
            ScriptRequest::ToggleOrders { enabled: false, password: Password::new("admin-pw") }
        );
        responder
            .send(Ok(TransportReply::Body(json!({"success": true, "ordersEnabled": false}))))
            .unwrap();
        let outcome = toggle.await.unwrap();
        assert!(!outcome.shown);
        assert_eq!(outcome.error, None);

        // Submissions are refused without any network call
        let result = system.client.submit_order(&form("1"), &proof()).await;
        assert_eq!(result, Err(SubmissionError::OrdersDisabled));
        assert!(expect_no_request(&mut requests));

        // Turn it back on
        let client = system.client.clone();
        let toggle = tokio::spawn(async move { client.set_orders_enabled(true, Some("admin-pw".into())).await });
        let (_, responder) = expect_request(&mut requests).await.unwrap();
        responder
            .send(Ok(TransportReply::Body(json!({"success": true, "ordersEnabled": true}))))
            .unwrap();
        assert!(toggle.await.unwrap().shown);

        let client = system.client.clone();
        let submit = tokio::spawn(async move { client.submit_order(&form("1"), &proof()).await });
        let (_, responder) = expect_request(&mut requests).await.unwrap();
        responder.send(Ok(TransportReply::Body(json!({"success": true})))).unwrap();
        assert!(submit.await.unwrap().is_ok());

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_toggle_failures_keep_previous_value() {
        let (system, mut requests) = start(MemoryStore::new(), true).await;

        // Empty or cancelled password: no request at all
        for input in [None, Some(String::new())] {
            let outcome = system.client.set_orders_enabled(false, input).await;
            assert!(outcome.shown);
            assert_eq!(outcome.error, Some(AdminError::PasswordRequired));
        }
        assert!(expect_no_request(&mut requests));

        // Wrong password
        let client = system.client.clone();
        let toggle = tokio::spawn(async move { client.set_orders_enabled(false, Some("nope".into())).await });
        let (_, responder) = expect_request(&mut requests).await.unwrap();
        responder
            .send(Ok(TransportReply::Body(json!({"success": false, "error": "Invalid password"}))))
            .unwrap();
        let outcome = toggle.await.unwrap();
        assert!(outcome.shown);
        assert_eq!(outcome.error, Some(AdminError::Rejected("Invalid password".into())));

        // Network failure
        let client = system.client.clone();
        let toggle = tokio::spawn(async move { client.set_orders_enabled(false, Some("pw".into())).await });
        let (_, responder) = expect_request(&mut requests).await.unwrap();
        responder.send(Err(RemoteError::Network("offline".into()))).unwrap();
        let outcome = toggle.await.unwrap();
        assert!(outcome.shown);
        assert!(matches!(outcome.error, Some(AdminError::Network(_))));

        assert!(system.client.desk().orders_enabled().await.unwrap());
        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_refresh_is_best_effort() {
        let (system, mut requests) = start(MemoryStore::new(), true).await;

        let client = system.client.clone();
        let fetch = tokio::spawn(async move { client.fetch_status().await });
        let (request, responder) = expect_request(&mut requests).await.unwrap();
        assert_eq!(request, ScriptRequest::GetStatus);
        responder.send(Err(RemoteError::Network("offline".into()))).unwrap();
        assert_eq!(fetch.await.unwrap(), Ok(true));

        let client = system.client.clone();
        let fetch = tokio::spawn(async move { client.fetch_status().await });
        let (_, responder) = expect_request(&mut requests).await.unwrap();
        responder
            .send(Ok(TransportReply::Body(json!({"success": true, "ordersEnabled": false}))))
            .unwrap();
        assert_eq!(fetch.await.unwrap(), Ok(false));
        assert!(!system.client.desk().orders_enabled().await.unwrap());

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shell_resets_draft_after_submit() {
        let (system, mut requests) = start(MemoryStore::new(), true).await;
        let dir = tempfile::tempdir().unwrap();
        let screenshot = dir.path().join("paid.png");
        std::fs::write(&screenshot, b"png-bytes").unwrap();

        let settings = ShellSettings {
            upi_id: "groupbuy@okbank".into(),
            run_text: "(October 2026)".into(),
            recent_limit: 10,
        };
        let mut shell = Shell::new(system.client.clone(), settings);

        for (field, value) in [
            (FormField::Name, "Asha"),
            (FormField::Phone, "+91 98000 00000"),
            (FormField::PickupLocation, "cubbon-park"),
        ] {
            shell.dispatch(ShellCommand::Set(field, value.into()), None).await;
        }
        let reply = shell.dispatch(ShellCommand::Set(FormField::Quantity, "2".into()), None).await;
        assert!(reply.text.contains("₹7,800"));
        assert!(reply.text.contains("groupbuy@okbank"));
        assert!(shell.preview().is_some());

        let reply = shell.dispatch(ShellCommand::Attach(screenshot.clone()), None).await;
        assert!(reply.text.starts_with("Attached"));

        let submit = tokio::spawn(async move {
            let reply = shell.dispatch(ShellCommand::Submit, None).await;
            (shell, reply)
        });
        let (request, responder) = expect_request(&mut requests).await.unwrap();
        match request {
            ScriptRequest::SubmitOrder(upload) => {
                assert_eq!(upload.mime_type, "image/png");
                assert_eq!(upload.order_details.sensor_type, "linx");
            }
            other => panic!("Unexpected request: {:?}", other),
        }
        responder
            .send(Ok(TransportReply::Body(json!({"success": true, "fileUrl": "https://drive.example/p"}))))
            .unwrap();

        let (mut shell, reply) = submit.await.unwrap();
        assert!(reply.text.contains("Order submitted successfully!"));
        assert!(reply.text.contains("You save: ₹1,200"));
        assert_eq!(shell.draft(), &OrderForm::default());
        assert_eq!(shell.preview(), None);

        let reply = shell.dispatch(ShellCommand::Summary, None).await;
        assert!(reply.text.contains("Total orders:  1"));
        assert!(reply.text.contains("Total sensors: 2"));

        let export_path = dir.path().join("orders.csv");
        let reply = shell.dispatch(ShellCommand::Export(Some(export_path.clone())), None).await;
        assert!(reply.text.starts_with("Exported 1 orders"));
        let csv = std::fs::read_to_string(&export_path).unwrap();
        assert_eq!(csv.lines().count(), 2);

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_recent_orders_fall_back_to_cache() {
        let (transport, mut requests) = create_mock_transport(10, true);
        let catalog = test_config().catalog().unwrap();
        let system =
            DeskSystem::with_parts(catalog, Box::new(MemoryStore::new()), Arc::new(transport), Some(25)).await;

        let client = system.client.clone();
        let recent = tokio::spawn(async move { client.recent_orders(10).await });
        let (request, responder) = expect_request(&mut requests).await.unwrap();
        assert_eq!(request, ScriptRequest::GetOrders { limit: 25 });
        responder
            .send(Ok(TransportReply::Body(json!({
                "success": true,
                "orders": [{"name": "Ravi", "phone": "98", "sensorType": "linx", "quantity": "3",
                            "pickupLocation": "cubbon-park", "timestamp": "2026-10-16T08:00:00Z"}]
            }))))
            .unwrap();
        let views = recent.await.unwrap().unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].name, "Ravi");
        assert_eq!(views[0].amount, 11700);

        let client = system.client.clone();
        let recent = tokio::spawn(async move { client.recent_orders(10).await });
        let (_, responder) = expect_request(&mut requests).await.unwrap();
        responder.send(Err(RemoteError::Status(503))).unwrap();
        assert!(recent.await.unwrap().unwrap().is_empty());

        system.shutdown().await.unwrap();
    }
}
