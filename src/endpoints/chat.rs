//! Chat completions: one-shot, explicit conversations, streaming and sessions.

use tracing::debug;

use crate::client::{Client, ClientError};
use crate::model::Message;
use crate::options::ParameterSet;
use crate::request::{build_chat_request, CHAT_PATH};
use crate::result::ChatMessage;
use crate::stream::{self, StreamSummary};

/// Either a bare prompt or a full message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Prompt(String),
    Messages(Vec<Message>),
}

impl ChatInput {
    fn into_messages(self) -> Vec<Message> {
        match self {
            ChatInput::Prompt(prompt) => vec![Message::user(prompt)],
            ChatInput::Messages(messages) => messages,
        }
    }
}

impl From<&str> for ChatInput {
    fn from(prompt: &str) -> Self {
        ChatInput::Prompt(prompt.to_string())
    }
}

impl From<String> for ChatInput {
    fn from(prompt: String) -> Self {
        ChatInput::Prompt(prompt)
    }
}

impl From<Vec<Message>> for ChatInput {
    fn from(messages: Vec<Message>) -> Self {
        ChatInput::Messages(messages)
    }
}

impl From<Message> for ChatInput {
    fn from(message: Message) -> Self {
        ChatInput::Messages(vec![message])
    }
}

/// Stateless access to `/v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct Chat {
    client: Client,
}

impl Chat {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// One-shot request with default parameters.
    pub async fn generate(&self, input: impl Into<ChatInput>) -> Result<ChatMessage, ClientError> {
        self.generate_with_options(input, &ParameterSet::default())
            .await
    }

    pub async fn generate_with_options(
        &self,
        input: impl Into<ChatInput>,
        params: &ParameterSet,
    ) -> Result<ChatMessage, ClientError> {
        let messages = input.into().into_messages();
        self.dispatch(&messages, params).await
    }

    /// Send an explicit message list. No session state is involved.
    pub async fn conversation(&self, messages: &[Message]) -> Result<ChatMessage, ClientError> {
        self.dispatch(messages, &ParameterSet::default()).await
    }

    pub async fn conversation_with_options(
        &self,
        messages: &[Message],
        params: &ParameterSet,
    ) -> Result<ChatMessage, ClientError> {
        self.dispatch(messages, params).await
    }

    /// Stream a reply, calling `callback` once per chunk in arrival order.
    pub async fn stream_chat<F>(
        &self,
        input: impl Into<ChatInput>,
        callback: F,
    ) -> Result<StreamSummary, ClientError>
    where
        F: FnMut(ChatMessage),
    {
        self.stream_chat_with_options(input, &ParameterSet::default(), callback)
            .await
    }

    pub async fn stream_chat_with_options<F>(
        &self,
        input: impl Into<ChatInput>,
        params: &ParameterSet,
        callback: F,
    ) -> Result<StreamSummary, ClientError>
    where
        F: FnMut(ChatMessage),
    {
        let messages = input.into().into_messages();
        let params = params.clone().with_stream(true);
        let model = self.client.resolve_model(&params)?;
        let payload = build_chat_request(&messages, &params, model)?;

        let bytes = self.client.post_stream(CHAT_PATH, &payload).await?;
        let config = self.client.config();
        stream::deliver(bytes, config.stream_buffer_size, config.timeout, callback).await
    }

    /// Start a session that keeps its own history.
    pub fn begin_conversation(&self) -> ChatSession {
        ChatSession::new(self.client.clone())
    }

    pub(crate) async fn dispatch(
        &self,
        messages: &[Message],
        params: &ParameterSet,
    ) -> Result<ChatMessage, ClientError> {
        let params = params.clone().with_stream(false);
        let model = self.client.resolve_model(&params)?;
        let payload = build_chat_request(messages, &params, model)?;
        self.client.post(CHAT_PATH, &payload).await
    }
}

/// A multi-turn conversation that exclusively owns its history.
///
/// Every successful [`send`](ChatSession::send) appends the user message and
/// the assistant reply, in that order; a failed send leaves the history as it
/// was. `send` takes `&mut self`, so one session cannot run two sends at once.
#[derive(Debug, Clone)]
pub struct ChatSession {
    chat: Chat,
    history: Vec<Message>,
}

impl ChatSession {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            chat: Chat::new(client),
            history: Vec::new(),
        }
    }

    /// Replace the history.
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// Read-only snapshot of the history.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn into_history(self) -> Vec<Message> {
        self.history
    }

    pub async fn send(&mut self, message: impl Into<String>) -> Result<ChatMessage, ClientError> {
        self.send_with_options(message, &ParameterSet::default())
            .await
    }

    pub async fn send_with_options(
        &mut self,
        message: impl Into<String>,
        params: &ParameterSet,
    ) -> Result<ChatMessage, ClientError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ClientError::validation("message must not be empty"));
        }

        self.history.push(Message::user(message));
        match self.chat.dispatch(&self.history, params).await {
            Ok(reply) => {
                self.history.push(reply.to_message());
                debug!(turns = self.history.len(), "conversation history updated");
                Ok(reply)
            }
            Err(err) => {
                self.history.pop();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chat_body, ScriptedTransport};
    use serde_json::json;

    #[tokio::test]
    async fn test_send_accumulates_history() {
        let (client, transport) = ScriptedTransport::client(vec![
            (200, chat_body("Hi Alice")),
            (200, chat_body("You said your name is Alice")),
        ]);
        let mut session = client.begin_conversation();

        let reply = session.send("My name is Alice").await.unwrap();
        assert_eq!(reply.content().as_deref(), Some("Hi Alice"));
        assert_eq!(
            session.history(),
            &[Message::user("My name is Alice"), Message::assistant("Hi Alice")]
        );

        session.send("What is my name?").await.unwrap();
        assert_eq!(session.history().len(), 4);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].0, CHAT_PATH);
        assert_eq!(
            requests[1].1["messages"],
            json!([
                {"role": "user", "content": "My name is Alice"},
                {"role": "assistant", "content": "Hi Alice"},
                {"role": "user", "content": "What is my name?"}
            ])
        );
    }

    #[tokio::test]
    async fn test_failed_send_leaves_history_untouched() {
        let (client, _transport) = ScriptedTransport::client(vec![(
            400,
            json!({"error": {"message": "bad request"}}),
        )]);
        let mut session = client
            .begin_conversation()
            .with_history(vec![Message::user("a"), Message::assistant("b")]);

        let err = session.send("c").await.unwrap_err();
        assert!(matches!(err, ClientError::Api { .. }));
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_without_dispatch() {
        let (client, transport) = ScriptedTransport::client(vec![]);
        let mut session = client.begin_conversation();
        assert!(matches!(
            session.send("   ").await,
            Err(ClientError::Validation { .. })
        ));
        assert!(session.history().is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_generate_and_conversation_are_stateless() {
        let (client, transport) = ScriptedTransport::client(vec![
            (200, chat_body("one")),
            (200, chat_body("two")),
        ]);
        let chat = client.chat();
        let params = ParameterSet::new()
            .with_system_message("Be brief")
            .with_model("grok-3");

        let reply = chat.generate_with_options("Hello", &params).await.unwrap();
        assert_eq!(reply.content().as_deref(), Some("one"));

        let reply = chat
            .conversation(&[Message::user("x"), Message::assistant("y"), Message::user("z")])
            .await
            .unwrap();
        assert_eq!(reply.content().as_deref(), Some("two"));

        let requests = transport.requests();
        assert_eq!(requests[0].1["model"], json!("grok-3"));
        assert_eq!(requests[0].1["messages"][0], json!({"role": "system", "content": "Be brief"}));
        assert_eq!(requests[1].1["model"], json!("grok-2"));
        assert_eq!(requests[1].1["messages"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unary_calls_never_request_a_stream() {
        let (client, transport) = ScriptedTransport::client(vec![
            (200, chat_body("one")),
            (200, chat_body("two")),
        ]);
        let params = ParameterSet::new().with_stream(true);

        let reply = client.chat().generate_with_options("Hello", &params).await.unwrap();
        assert_eq!(reply.content().as_deref(), Some("one"));
        let mut session = client.begin_conversation();
        session.send_with_options("Hi", &params).await.unwrap();

        for (_, body) in transport.requests() {
            assert_eq!(body["stream"], json!(false));
        }
    }

    #[tokio::test]
    async fn test_invalid_model_fails_before_dispatch() {
        let (client, transport) = ScriptedTransport::client(vec![]);
        let params = ParameterSet::new().with_model("not-a-model");
        let err = client
            .chat()
            .generate_with_options("hi", &params)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_stream_chat_forces_stream_flag() {
        let (client, transport) = ScriptedTransport::client_with_stream(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"!\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n"
        ));
        let mut chunks = Vec::new();
        let summary = client
            .chat()
            .stream_chat("Hello", |chunk| chunks.push(chunk))
            .await
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(ChatMessage::is_stream_chunk));
        assert!(chunks[1].is_finished());
        assert_eq!(summary.content, "Hi!");
        assert_eq!(transport.requests()[0].1["stream"], json!(true));
    }
}
