//! End-to-end tests for the chatterbox session engine against a local HTTP endpoint.
//! Every server binds a loopback port; no external network is used.

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::body::Body;
    use axum::http::header;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};
    use httpmock::prelude::*;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    use chatterbox::{
        ChatConfig, ChatSession, OpenAiClient, Renderer, Role, TokenUsage, Transport, TurnOutcome,
        chat::{FAILURE_NOTICE, STOPPED_NOTICE},
    };

    const COMPLETIONS: &str = "/v1/chat/completions";

    fn session_for(base_url: String) -> ChatSession {
        let config = ChatConfig::new()
            .with_base_url(base_url)
            .with_api_key("sk-local")
            .with_model("local-model")
            .with_system_prompt("be brief");
        ChatSession::new(OpenAiClient::new().unwrap(), config)
    }

    struct CancelOnText(CancellationToken);

    impl Renderer for CancelOnText {
        fn print_text(&mut self, _: &str) {
            self.0.cancel();
        }
    }

    #[tokio::test]
    async fn streamed_reply_over_http() {
        let server = MockServer::start_async().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
            "\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}],",
            "\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":2,\"total_tokens\":6}}\n",
            "data: [DONE]\n",
        );
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(COMPLETIONS)
                    .header("authorization", "Bearer sk-local")
                    .json_body(json!({
                        "model": "local-model",
                        "messages": [
                            {"role": "system", "content": "be brief"},
                            {"role": "user", "content": "hi"}
                        ],
                        "stream": true
                    }));
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .body(body);
            })
            .await;

        let mut session = session_for(server.url("/v1"));
        let outcome = session
            .send_message("hi", vec![], CancellationToken::new())
            .await;
        assert!(outcome.is_completed(), "{outcome:?}");
        mock.assert_async().await;

        let history = session.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history[2].content, "Hello");
        assert_eq!(session.usage(), Some(TokenUsage::new(4, 2, 6)));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn json_reply_over_http() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(COMPLETIONS);
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "choices": [{"message": {"content": "Hi"}}],
                        "usage": {"prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6}
                    }));
            })
            .await;

        let mut session = session_for(server.url("/v1"));
        let outcome = session
            .send_message("hello", vec![], CancellationToken::new())
            .await;
        assert!(outcome.is_completed(), "{outcome:?}");
        mock.assert_async().await;
        assert_eq!(session.history().last().unwrap().content, "Hi");
        assert_eq!(session.usage(), Some(TokenUsage::new(5, 1, 6)));
    }

    #[tokio::test]
    async fn rejected_request_becomes_notice() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(COMPLETIONS);
                then.status(401)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "error": {
                            "message": "Incorrect API key provided",
                            "type": "invalid_request_error"
                        }
                    }));
            })
            .await;

        let mut session = session_for(server.url("/v1"));
        let outcome = session
            .send_message("hello", vec![], CancellationToken::new())
            .await;
        let TurnOutcome::Failed(err) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(err.is_authentication());
        assert_eq!(err.status_code(), Some(401));
        let content = session.history().last().unwrap().content.clone();
        assert!(content.starts_with(FAILURE_NOTICE), "{content}");
        assert!(content.contains("Incorrect API key provided"), "{content}");
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn rate_limited_request_becomes_notice() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(COMPLETIONS);
                then.status(429)
                    .header("content-type", "application/json")
                    .header("retry-after", "7")
                    .json_body(json!({"error": {"message": "slow down"}}));
            })
            .await;

        let mut session = session_for(server.url("/v1"));
        let outcome = session
            .send_message("hello", vec![], CancellationToken::new())
            .await;
        let TurnOutcome::Failed(err) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(err.is_rate_limit());
        assert_eq!(err.status_code(), Some(429));
        let content = session.history().last().unwrap().content.clone();
        assert!(content.starts_with(FAILURE_NOTICE), "{content}");
        assert!(
            content.contains("slow down (retry after 7 seconds)"),
            "{content}"
        );
    }

    #[tokio::test]
    async fn cancellation_mid_stream() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        // One record, then the body stays open until the client goes away.
        let app = Router::new().route(
            COMPLETIONS,
            post(move || {
                seen.fetch_add(1, Ordering::SeqCst);
                async move {
                    let first = Bytes::from_static(
                        b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
                    );
                    let body = stream::iter([Ok::<_, Infallible>(first)]).chain(stream::pending());
                    (
                        [(header::CONTENT_TYPE, "text/event-stream")],
                        Body::from_stream(body),
                    )
                        .into_response()
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let mut session = session_for(format!("http://{addr}/v1"));
        let cancel = CancellationToken::new();
        let mut renderer = CancelOnText(cancel.clone());
        let outcome = session
            .send_message_with_renderer("hi", vec![], cancel, &mut renderer)
            .await;
        assert!(outcome.is_cancelled(), "{outcome:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            session.history().last().unwrap().content,
            format!("Hel\n{STOPPED_NOTICE}")
        );
        assert!(!session.is_busy());
        assert_eq!(session.active_index(), None);
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_cleanly() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let mut session = session_for(format!("http://{addr}/v1"));
        let outcome = session
            .send_message("hello", vec![], CancellationToken::new())
            .await;
        let TurnOutcome::Failed(err) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(err.is_connection(), "{err:?}");
        assert_eq!(err.status_code(), None);
        assert!(
            session
                .history()
                .last()
                .unwrap()
                .content
                .starts_with(FAILURE_NOTICE)
        );
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn model_listing_over_http() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/models");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "object": "list",
                        "data": [
                            {"id": "older", "created": 1},
                            {"id": "newer", "created": 2}
                        ]
                    }));
            })
            .await;

        let client = OpenAiClient::new().unwrap();
        let config = ChatConfig::new().with_base_url(server.url("/v1"));
        let models = client.list_models(&config).await.unwrap();
        assert_eq!(models, vec!["newer", "older"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn model_listing_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/models");
                then.status(404).body("{}");
            })
            .await;

        let client = OpenAiClient::new().unwrap();
        let config = ChatConfig::new().with_base_url(server.url("/v1"));
        let err = client.list_models(&config).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
