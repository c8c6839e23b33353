use crate::error::CoreError;
use crate::models::HistoryTurn;
use crate::traits::CompletionModel;

/// How many history turns are ever shown to the model.
pub const MAX_HISTORY_TURNS: usize = 3;

/// Turns a possibly context-dependent message into a standalone query.
///
/// The persisted original message is never altered; only the text forwarded
/// to retrieval is rewritten. A model failure propagates instead of falling
/// back to the raw message, since an ambiguous raw query would silently
/// degrade answer quality.
pub struct QueryRewriter<M: CompletionModel> {
    model: M,
    max_history: usize,
}

impl<M: CompletionModel> QueryRewriter<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            max_history: MAX_HISTORY_TURNS,
        }
    }

    pub async fn rewrite(
        &self,
        message: &str,
        history: &[HistoryTurn],
    ) -> Result<String, CoreError> {
        if history.is_empty() {
            return Ok(message.to_string());
        }

        let start = history.len().saturating_sub(self.max_history);
        let mut context = String::new();
        for turn in &history[start..] {
            context.push_str("User: ");
            context.push_str(&turn.user_message);
            context.push_str("\nAssistant: ");
            context.push_str(&turn.ai_response);
            context.push('\n');
        }

        let prompt = format!(
            "Given the conversation history and current user message, return the current \
             message as-is if it's standalone and clear. If it references previous context \
             or is unclear without history, rephrase it to be a complete, standalone \
             question.\n\nConversation History:\n{context}\nCurrent Message: {message}\n\n\
             Return only the standalone version of the message:"
        );

        let standalone = self.model.complete(&prompt).await?;
        let standalone = standalone.trim();
        if standalone.is_empty() {
            return Err(CoreError::Engine(
                "completion model returned an empty rewrite".to_string(),
            ));
        }

        Ok(standalone.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{QueryRewriter, MAX_HISTORY_TURNS};
    use crate::error::CoreError;
    use crate::models::HistoryTurn;
    use crate::traits::CompletionModel;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct RecordingModel {
        prompts: Arc<Mutex<Vec<String>>>,
        reply: Result<String, String>,
    }

    impl RecordingModel {
        fn answering(reply: &str) -> (Self, Arc<Mutex<Vec<String>>>) {
            let prompts = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    prompts: Arc::clone(&prompts),
                    reply: Ok(reply.to_string()),
                },
                prompts,
            )
        }

        fn failing(detail: &str) -> Self {
            Self {
                prompts: Arc::new(Mutex::new(Vec::new())),
                reply: Err(detail.to_string()),
            }
        }
    }

    #[async_trait]
    impl CompletionModel for RecordingModel {
        async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
            self.prompts
                .lock()
                .expect("prompt log lock")
                .push(prompt.to_string());
            self.reply.clone().map_err(CoreError::Engine)
        }
    }

    fn turn(index: usize) -> HistoryTurn {
        HistoryTurn {
            user_message: format!("question {index}"),
            ai_response: format!("answer {index}"),
        }
    }

    #[tokio::test]
    async fn empty_history_returns_message_without_model_call() {
        let (model, prompts) = RecordingModel::answering("unused");
        let rewriter = QueryRewriter::new(model);

        let result = rewriter
            .rewrite("what about branches?", &[])
            .await
            .expect("rewrite should pass the message through");

        assert_eq!(result, "what about branches?");
        assert!(prompts.lock().expect("prompt log lock").is_empty());
    }

    #[tokio::test]
    async fn history_is_truncated_to_last_three_turns_oldest_first() {
        let (model, prompts) = RecordingModel::answering("standalone question");
        let rewriter = QueryRewriter::new(model);
        let history: Vec<HistoryTurn> = (0..5).map(turn).collect();

        rewriter
            .rewrite("and that one?", &history)
            .await
            .expect("rewrite should succeed");

        let prompts = prompts.lock().expect("prompt log lock");
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];

        assert!(!prompt.contains("question 0"));
        assert!(!prompt.contains("question 1"));
        for index in 2..5 {
            assert!(prompt.contains(&format!("question {index}")));
        }

        let oldest = prompt.find("question 2").expect("oldest retained turn");
        let newest = prompt.find("question 4").expect("newest retained turn");
        assert!(oldest < newest);
        assert_eq!(history.len() - MAX_HISTORY_TURNS, 2);
    }

    #[tokio::test]
    async fn model_reply_is_trimmed() {
        let (model, _prompts) = RecordingModel::answering("  where is the office?  \n");
        let rewriter = QueryRewriter::new(model);

        let result = rewriter
            .rewrite("where?", &[turn(0)])
            .await
            .expect("rewrite should succeed");

        assert_eq!(result, "where is the office?");
    }

    #[tokio::test]
    async fn model_failure_propagates_instead_of_falling_back() {
        let rewriter = QueryRewriter::new(RecordingModel::failing("rate limited"));

        let result = rewriter.rewrite("where?", &[turn(0)]).await;

        assert!(matches!(result, Err(CoreError::Engine(_))));
    }

    #[tokio::test]
    async fn empty_model_reply_is_an_engine_error() {
        let (model, _prompts) = RecordingModel::answering("   ");
        let rewriter = QueryRewriter::new(model);

        let result = rewriter.rewrite("where?", &[turn(0)]).await;

        assert!(matches!(result, Err(CoreError::Engine(_))));
    }
}
