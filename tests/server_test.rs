//! Integration tests for the sentry control server

#[cfg(feature = "server")]
mod server_tests {
    use std::sync::Arc;
    use std::time::Duration;
    use vigia_sentry::ai::AiCapability;
    use vigia_sentry::camera::{MemoryCamera, MemoryFeed};
    use vigia_sentry::config::Config;
    use vigia_sentry::sentry::{Collaborators, Sentry, SentryHandle};
    use vigia_sentry::server::{run, ServerConfig};
    use vigia_sentry::speech::LogVoice;

    fn start_sentry() -> (SentryHandle, tokio::task::JoinHandle<vigia_sentry::TransparencyStats>) {
        let collaborators = Collaborators {
            camera: Box::new(MemoryCamera::new(MemoryFeed::new(), 64, 48)),
            voice: Arc::new(LogVoice),
            recognizer: None,
            ai: AiCapability::Absent("test".to_string()),
        };
        let (sentry, handle) = Sentry::new(collaborators, &Config::default());
        (handle, tokio::spawn(sentry.run()))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (handle, _task) = start_sentry();

        // Start server on a random port
        let (addr, shutdown_tx) = run(ServerConfig::new(0), handle.clone())
            .await
            .expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        handle.shutdown();
        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_status_and_missing_capture() {
        let (handle, _task) = start_sentry();
        let (addr, shutdown_tx) = run(ServerConfig::new(0), handle.clone())
            .await
            .expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();
        let body: serde_json::Value = client
            .get(format!("http://{}/status", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");

        assert_eq!(body["status"], "standby");
        assert_eq!(body["label"], "EN ESPERA");
        assert_eq!(body["ai_available"], false);
        assert_eq!(body["voice_chat_available"], false);
        assert!(body["capture"].is_null());

        // Nothing captured yet
        let response = client
            .get(format!("http://{}/capture/photo", addr))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "NO_CAPTURE");

        handle.shutdown();
        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_commands_after_shutdown_are_refused() {
        let (handle, task) = start_sentry();
        let (addr, shutdown_tx) = run(ServerConfig::new(0), handle.clone())
            .await
            .expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/reset", addr))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["command"], "Reset");

        handle.shutdown();
        task.await.expect("sentry task panicked");

        let response = client
            .post(format!("http://{}/chat/start", addr))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (handle, _task) = start_sentry();
        let (addr, shutdown_tx) = run(ServerConfig::new(0), handle.clone())
            .await
            .expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Send OPTIONS request to check CORS
        let client = reqwest::Client::new();
        let response = client
            .request(reqwest::Method::OPTIONS, format!("http://{}/reset", addr))
            .header("Origin", "http://localhost")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .expect("Failed to send request");

        // CORS preflight should succeed
        assert!(
            response.status().is_success() || response.status() == reqwest::StatusCode::NO_CONTENT,
            "CORS preflight failed: {}",
            response.status()
        );

        handle.shutdown();
        let _ = shutdown_tx.send(());
    }
}
