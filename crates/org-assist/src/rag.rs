//! Pure question-answering path.
//!
//! Retrieves context for the question, renders it into the system prompt
//! and asks the model once, with no tools bound. Cancellation is honored
//! while retrieving and while waiting on the model.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use org_assist_core::chat::{ChatMessage, ChatModel};
use org_assist_core::error::EngineError;
use org_assist_core::models::{ConversationTurn, Identity, RetrievedChunk, Role};

use crate::retrieval::RetrievalService;

#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
}

pub struct RagAnswerer {
    retrieval: Arc<RetrievalService>,
    chat: Arc<dyn ChatModel>,
}

impl RagAnswerer {
    pub fn new(retrieval: Arc<RetrievalService>, chat: Arc<dyn ChatModel>) -> Self {
        Self { retrieval, chat }
    }

    pub async fn answer(
        &self,
        identity: &Identity,
        question: &str,
        history: &[ConversationTurn],
        cancel: &CancellationToken,
    ) -> Result<RagAnswer, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let retrieved = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            r = self.retrieval.retrieve(&identity.organization_id, question) => r,
        };
        let retrieval =
            retrieved.map_err(|e| EngineError::RetrievalFailure(EngineError::describe(&e)))?;

        let mut messages = vec![ChatMessage::system(system_prompt(identity, &retrieval.context))];
        messages.extend(history_messages(history));
        messages.push(ChatMessage::user(question));

        let invoked = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(organization_id = %identity.organization_id, "rag answer cancelled");
                return Err(EngineError::Cancelled);
            }
            r = self.chat.invoke(&messages, &[]) => r,
        };
        let response = invoked
            .map_err(|e| EngineError::ModelInvocationFailure(EngineError::describe(&e)))?;

        Ok(RagAnswer {
            answer: response.text,
            sources: retrieval.hits,
        })
    }
}

fn system_prompt(identity: &Identity, context: &str) -> String {
    format!(
        "You are the assistant for organization {org}, speaking with user {user}.\n\
         Answer the user's question using only the context below. When the context \
         contains counts or statistics, quote them exactly. If the context does not \
         contain the answer, say so plainly instead of guessing.\n\n\
         Context:\n{context}",
        org = identity.organization_id,
        user = identity.user_id,
        context = context,
    )
}

/// Replay stored turns as chat messages, oldest first.
pub fn history_messages(history: &[ConversationTurn]) -> impl Iterator<Item = ChatMessage> + '_ {
    history.iter().map(|turn| match turn.role {
        Role::User => ChatMessage::user(&turn.content),
        Role::Assistant => ChatMessage::assistant(&turn.content),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_identity_and_context() {
        let who = Identity {
            organization_id: "org1".into(),
            user_id: "u7".into(),
        };
        let prompt = system_prompt(&who, "[1] Client (Acme, relevance 91%): Acme renewal");
        assert!(prompt.contains("organization org1"));
        assert!(prompt.contains("user u7"));
        assert!(prompt.ends_with("Acme renewal"));
    }

    #[test]
    fn test_history_roles_map_to_messages() {
        let who = Identity {
            organization_id: "org1".into(),
            user_id: "u1".into(),
        };
        let turns = vec![
            ConversationTurn::new(&who, "s", Role::User, "hi"),
            ConversationTurn::new(&who, "s", Role::Assistant, "hello"),
        ];
        let messages: Vec<_> = history_messages(&turns).collect();
        assert_eq!(messages, vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]);
    }
}
