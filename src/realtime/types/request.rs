use bon::Builder;
use serde::Serialize;

/// Payload of an outbound `chat:message` event.
#[non_exhaustive]
#[derive(Clone, Debug, Serialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct ChatMessageRequest {
    /// Conversation the message belongs to
    pub conversation_id: String,
    /// Message body
    pub content: String,
}

/// Payload of an outbound `chat:typing` event.
#[non_exhaustive]
#[derive(Clone, Debug, Serialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct TypingRequest {
    pub conversation_id: String,
    pub is_typing: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn chat_message_request_is_camel_case() {
        let request = ChatMessageRequest::builder()
            .conversation_id("c-1")
            .content("Is this still available?")
            .build();

        assert_eq!(
            serde_json::to_value(&request).expect("serializable"),
            json!({ "conversationId": "c-1", "content": "Is this still available?" })
        );
    }

    #[test]
    fn typing_request_is_camel_case() {
        let request = TypingRequest::builder()
            .conversation_id("c-1")
            .is_typing(false)
            .build();

        assert_eq!(
            serde_json::to_value(&request).expect("serializable"),
            json!({ "conversationId": "c-1", "isTyping": false })
        );
    }
}
