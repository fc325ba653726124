mod harness;

use axum::http::StatusCode;
use conduit_core::RequestContext;
use conduit_llm::types::{Content, ContentPart, FinishReason, ImageUrl, Message, Role, Usage};
use conduit_llm::{Adapter, ChatCompletionRequest, LlmError, UsageHandle, chat_provider};
use harness::config::ali_channel;
use harness::mock_upstream::{Canned, MockUpstream};
use serde_json::json;

const SCENARIO_A: &str = r#"{"output":{"choices":[{"finish_reason":"stop","message":{"role":"assistant","content":"hi"}}]},"usage":{"total_tokens":33,"output_tokens":19,"input_tokens":14},"request_id":"5b9a1d2e-0c5f-9c8e-a1b4-7f3e2d1c0b9a"}"#;

fn request(model: &str) -> ChatCompletionRequest {
    ChatCompletionRequest::new(model, vec![Message::text(Role::User, "hi")])
}

async fn complete(
    channel: conduit_config::ChannelConfig,
    request: &ChatCompletionRequest,
) -> (Result<conduit_llm::ChatCompletionResponse, LlmError>, Usage) {
    let usage = UsageHandle::new();
    let mut provider = chat_provider("dashscope", &channel);
    provider.set_usage(usage.clone());

    let result = provider.create_chat_completion(request, &RequestContext::new()).await;
    (result, usage.snapshot())
}

#[tokio::test]
async fn reply_is_translated_and_usage_recorded() {
    let mock = MockUpstream::start(Canned::json(SCENARIO_A)).await.unwrap();
    let channel = ali_channel(&mock.base_url(), &["qwen-turbo"]);

    let (result, usage) = complete(channel, &request("qwen-turbo")).await;
    let response = result.unwrap();

    assert_eq!(response.id, "5b9a1d2e-0c5f-9c8e-a1b4-7f3e2d1c0b9a");
    assert_eq!(response.object, "chat.completion");
    assert_eq!(response.model, "qwen-turbo");
    assert_eq!(response.choices.len(), 1);
    assert_eq!(response.choices[0].message.role, Role::Assistant);
    assert_eq!(response.choices[0].message.content.as_deref(), Some("hi"));
    assert_eq!(response.choices[0].finish_reason, Some(FinishReason::Stop));
    assert_eq!(
        usage,
        Usage {
            prompt_tokens: 14,
            completion_tokens: 19,
            total_tokens: 33
        }
    );

    let upstream = mock.single_request();
    assert_eq!(upstream.path, "/api/v1/services/aigc/text-generation/generation");
    assert_eq!(upstream.headers["authorization"], "Bearer sk-test");
    assert_eq!(upstream.headers["accept"], "application/json");
    assert!(!upstream.headers.contains_key("x-dashscope-sse"));
    assert_eq!(
        upstream.body,
        json!({
            "model": "qwen-turbo",
            "input": {"messages": [{"role": "user", "content": "hi"}]},
            "parameters": {"result_format": "message", "incremental_output": false}
        })
    );
}

#[tokio::test]
async fn vendor_error_in_success_body_is_400_without_usage() {
    let mock = MockUpstream::start(Canned::json(
        r#"{"code":"InvalidParameter","message":"Role must be user or assistant and Content length must be greater than 0","request_id":"4883ee8d-f095-94ff-a94a-5ce0a94bc81f"}"#,
    ))
    .await
    .unwrap();
    let channel = ali_channel(&mock.base_url(), &["qwen-turbo"]);

    let (result, usage) = complete(channel, &request("qwen-turbo")).await;

    let Err(LlmError::Vendor(vendor)) = result else {
        panic!("expected a vendor error");
    };
    assert_eq!(vendor.status, StatusCode::BAD_REQUEST);
    assert_eq!(vendor.error.error_type, "InvalidParameter");
    assert_eq!(vendor.error.code.as_deref(), Some("InvalidParameter"));
    assert_eq!(
        vendor.error.message,
        "Role must be user or assistant and Content length must be greater than 0"
    );
    assert_eq!(vendor.error.param.as_deref(), Some("4883ee8d-f095-94ff-a94a-5ce0a94bc81f"));
    assert_eq!(usage, Usage::default());
}

#[tokio::test]
async fn error_status_with_vendor_body_keeps_status() {
    let mock = MockUpstream::start(
        Canned::json(r#"{"code":"InvalidApiKey","message":"Invalid API-key provided.","request_id":"a1"}"#)
            .with_status(StatusCode::UNAUTHORIZED),
    )
    .await
    .unwrap();
    let channel = ali_channel(&mock.base_url(), &["qwen-turbo"]);

    let (result, _) = complete(channel, &request("qwen-turbo")).await;

    let Err(LlmError::Vendor(vendor)) = result else {
        panic!("expected a vendor error");
    };
    assert_eq!(vendor.status, StatusCode::UNAUTHORIZED);
    assert_eq!(vendor.error.error_type, "InvalidApiKey");
    assert_eq!(vendor.error.message, "Invalid API-key provided.");
}

#[tokio::test]
async fn error_status_without_vendor_body_falls_back() {
    let mock = MockUpstream::start(
        Canned::json("<html>bad gateway</html>")
            .with_status(StatusCode::BAD_GATEWAY)
            .with_content_type("text/html"),
    )
    .await
    .unwrap();
    let channel = ali_channel(&mock.base_url(), &["qwen-turbo"]);

    let (result, _) = complete(channel, &request("qwen-turbo")).await;

    let Err(LlmError::Vendor(vendor)) = result else {
        panic!("expected a vendor error");
    };
    assert_eq!(vendor.status, StatusCode::BAD_GATEWAY);
    assert_eq!(vendor.error.error_type, "upstream_error");
    assert_eq!(vendor.error.code.as_deref(), Some("bad_response_status_code"));
    assert_eq!(vendor.error.param.as_deref(), Some("502"));
    assert_eq!(vendor.error.message, "bad response status code 502");
}

#[tokio::test]
async fn undecodable_body_is_malformed_response() {
    let mock = MockUpstream::start(Canned::json("{\"output\": [")).await.unwrap();
    let channel = ali_channel(&mock.base_url(), &["qwen-turbo"]);

    let (result, usage) = complete(channel, &request("qwen-turbo")).await;

    let err = result.unwrap_err();
    assert!(matches!(err, LlmError::MalformedResponse(_)));
    assert_eq!(err.to_error_with_status().status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(usage, Usage::default());
}

#[tokio::test]
async fn multimodal_model_sends_parts() {
    let mock = MockUpstream::start(Canned::json(
        r#"{"output":{"choices":[{"message":{"role":"assistant","content":[{"text":"A cat."}]}}],"finish_reason":"stop"},"usage":{"input_tokens":1271,"output_tokens":4},"request_id":"mm"}"#,
    ))
    .await
    .unwrap();
    let channel = ali_channel(&mock.base_url(), &["qwen-vl-plus"]);

    let request = ChatCompletionRequest::new(
        "qwen-vl-plus",
        vec![Message {
            role: Role::User,
            content: Some(Content::Parts(vec![
                ContentPart::Text {
                    text: "What is in the picture?".to_owned(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "https://example.com/cat.png".to_owned(),
                        detail: None,
                    },
                },
            ])),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }],
    );

    let (result, usage) = complete(channel, &request).await;
    let response = result.unwrap();

    assert_eq!(response.choices[0].message.content.as_deref(), Some("A cat."));
    assert_eq!(response.choices[0].finish_reason, Some(FinishReason::Stop));
    assert_eq!(usage, Usage::new(1271, 4));

    let upstream = mock.single_request();
    assert_eq!(upstream.path, "/api/v1/services/aigc/multimodal-generation/generation");
    assert_eq!(
        upstream.body["input"]["messages"][0]["content"],
        json!([{"text": "What is in the picture?"}, {"image": "https://example.com/cat.png"}])
    );
}

#[tokio::test]
async fn search_marker_is_stripped_and_flag_set() {
    let mock = MockUpstream::start(Canned::json(SCENARIO_A)).await.unwrap();
    let mut channel = ali_channel(&mock.base_url(), &["qwen-search"]);
    channel
        .model_mapping
        .insert("qwen-search".to_owned(), "qwen-max-internet".to_owned());

    let (result, _) = complete(channel, &request("qwen-search")).await;

    assert_eq!(result.unwrap().model, "qwen-search");

    let upstream = mock.single_request();
    assert_eq!(upstream.body["model"], "qwen-max");
    assert_eq!(upstream.body["parameters"]["enable_search"], true);
}

#[tokio::test]
async fn plugin_header_is_forwarded() {
    let mock = MockUpstream::start(Canned::json(SCENARIO_A)).await.unwrap();
    let mut channel = ali_channel(&mock.base_url(), &["qwen-turbo"]);
    channel.plugin = Some(r#"{"pdf_extracter":{}}"#.to_owned());

    let (result, _) = complete(channel, &request("qwen-turbo")).await;
    result.unwrap();

    let upstream = mock.single_request();
    assert_eq!(upstream.headers["x-dashscope-plugin"], r#"{"pdf_extracter":{}}"#);
}
