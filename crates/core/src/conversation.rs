use crate::models::{ChatMessage, ConversationTurn, Retrieval};
use crate::retriever::MultiStageRetriever;
use crate::traits::GenerationService;
use crate::PipelineError;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

/// Append-only record of answered questions, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Alternating user/assistant messages, the shape the history is rendered in.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .flat_map(|turn| {
                [
                    ChatMessage::user(turn.question.clone()),
                    ChatMessage::assistant(turn.answer.clone()),
                ]
            })
            .collect()
    }

    fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    /// Rewritten question used for retrieval, when follow-up condensing is on.
    pub standalone_question: Option<String>,
    pub retrieval: Retrieval,
    pub history: Vec<ConversationTurn>,
}

/// Retriever, chat model and memory behind a single `answer` call.
pub struct ConversationEngine {
    retriever: MultiStageRetriever,
    generator: Arc<dyn GenerationService>,
    history: ConversationHistory,
}

impl ConversationEngine {
    pub fn new(retriever: MultiStageRetriever, generator: Arc<dyn GenerationService>) -> Self {
        Self {
            retriever,
            generator,
            history: ConversationHistory::default(),
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn retriever(&self) -> &MultiStageRetriever {
        &self.retriever
    }

    /// Retrieves, generates and records one turn. On any failure the history
    /// is left exactly as it was.
    pub async fn answer(&mut self, question: &str) -> Result<Answer, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::InvalidArgument("question is empty".to_string()));
        }

        let standalone_question = if self.retriever.options().condense_follow_ups
            && !self.history.is_empty()
        {
            Some(self.condense(question).await?)
        } else {
            None
        };

        let retrieval = self
            .retriever
            .retrieve(standalone_question.as_deref().unwrap_or(question))
            .await?;

        let messages = answer_prompt(&retrieval, &self.history, question);
        let answer = self.generator.generate(&messages).await.map_err(|source| {
            error!(error = %source, "answer generation failed");
            PipelineError::GenerationService(source)
        })?;
        let answer = answer.trim().to_string();

        self.history.append(ConversationTurn {
            question: question.to_string(),
            answer: answer.clone(),
            asked_at: Utc::now(),
        });
        info!(
            turns = self.history.len(),
            passages = retrieval.passages.len(),
            "question answered"
        );

        Ok(Answer {
            answer,
            standalone_question,
            retrieval,
            history: self.history.turns().to_vec(),
        })
    }

    async fn condense(&self, question: &str) -> Result<String, PipelineError> {
        let messages = condense_prompt(&self.history, question);
        let rewritten = self.generator.generate(&messages).await.map_err(|source| {
            error!(error = %source, "follow-up condensing failed");
            PipelineError::GenerationService(source)
        })?;

        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(rewritten.to_string())
        }
    }
}

pub fn answer_prompt(
    retrieval: &Retrieval,
    history: &ConversationHistory,
    question: &str,
) -> Vec<ChatMessage> {
    let context = retrieval
        .passages
        .iter()
        .map(|passage| passage.text())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::system(format!(
        "Use the following pieces of context to answer the user's question. \
         If you don't know the answer, just say that you don't know, \
         don't try to make up an answer.\n\
         ----------------\n{context}"
    )));
    messages.extend(history.messages());
    messages.push(ChatMessage::user(question));
    messages
}

pub fn condense_prompt(history: &ConversationHistory, question: &str) -> Vec<ChatMessage> {
    let transcript = history
        .turns()
        .iter()
        .map(|turn| format!("Human: {}\nAssistant: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n");

    vec![ChatMessage::user(format!(
        "Given the following conversation and a follow up question, rephrase the follow up \
         question to be a standalone question, in its original language.\n\n\
         Chat History:\n{transcript}\n\
         Follow Up Input: {question}\n\
         Standalone question:"
    ))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, RetrievalStage, RetrievedPassage, Role, StageCounts};

    fn history_with(turns: &[(&str, &str)]) -> ConversationHistory {
        let mut history = ConversationHistory::default();
        for (question, answer) in turns {
            history.append(ConversationTurn {
                question: question.to_string(),
                answer: answer.to_string(),
                asked_at: Utc::now(),
            });
        }
        history
    }

    fn retrieval_of(texts: &[&str]) -> Retrieval {
        Retrieval {
            query: "q".to_string(),
            passages: texts
                .iter()
                .enumerate()
                .map(|(index, text)| RetrievedPassage {
                    chunk: Chunk {
                        chunk_id: format!("c{index}"),
                        chunk_index: index,
                        text: format!("full {text}"),
                    },
                    score: 1.0,
                    stage: RetrievalStage::Compression,
                    extracted: Some(text.to_string()),
                })
                .collect(),
            counts: StageCounts::default(),
        }
    }

    #[test]
    fn history_renders_as_alternating_messages() {
        let history = history_with(&[("q1", "a1"), ("q2", "a2")]);
        let roles = history
            .messages()
            .iter()
            .map(|message| message.role)
            .collect::<Vec<_>>();

        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(history.messages()[2].content, "q2");
    }

    #[test]
    fn answer_prompt_stuffs_extracted_passages_then_history_then_question() {
        let history = history_with(&[("Where is Paris?", "In France.")]);
        let retrieval = retrieval_of(&["first span", "second span"]);
        let messages = answer_prompt(&retrieval, &history, "And Lyon?");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.ends_with("first span\n\nsecond span"));
        assert!(!messages[0].content.contains("full first span"));
        assert_eq!(messages[1].content, "Where is Paris?");
        assert_eq!(messages[3], ChatMessage::user("And Lyon?"));
    }

    #[test]
    fn condense_prompt_lists_prior_turns() {
        let history = history_with(&[("Name two rivers", "Seine and Loire")]);
        let messages = condense_prompt(&history, "How long is the second one?");

        assert!(messages[0]
            .content
            .contains("Human: Name two rivers\nAssistant: Seine and Loire"));
        assert!(messages[0]
            .content
            .contains("Follow Up Input: How long is the second one?"));
    }
}
