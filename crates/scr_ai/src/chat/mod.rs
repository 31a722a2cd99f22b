use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use scr_core::config::{AssistantConfig, RetrievalParams};
use scr_core::error::{AppError, CHAT_MODEL_UNKNOWN, CHAT_QUESTION_EMPTY};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::IndexCacheManager;
use crate::index::SearchIndex;
use crate::llm::Llm;
use crate::retrieve::RetrievedSegment;
use crate::websearch::WebSearch;

pub mod models;
pub mod prompts;

pub use models::{ModelInfo, CATALOG, COMPARISON_PAIR};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Model that produced an assistant message.
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Exchange {
    question: String,
    answer: String,
}

/// Visible transcript plus one rolling memory per model.
#[derive(Debug, Clone)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
    memories: BTreeMap<String, VecDeque<Exchange>>,
    memory_turns: usize,
}

impl ConversationState {
    pub fn new(memory_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            memories: BTreeMap::new(),
            memory_turns,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn push(&mut self, role: Role, content: impl Into<String>, model: Option<&str>) {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
            model: model.map(str::to_string),
        });
    }

    fn remember(&mut self, model: &str, question: &str, answer: &str) {
        if self.memory_turns == 0 {
            return;
        }
        let mem = self.memories.entry(model.to_string()).or_default();
        mem.push_back(Exchange {
            question: question.to_string(),
            answer: answer.to_string(),
        });
        while mem.len() > self.memory_turns {
            mem.pop_front();
        }
    }

    /// Past exchanges with `model`, oldest first, as plain text.
    pub fn history_for(&self, model: &str) -> String {
        self.memories
            .get(model)
            .map(|mem| {
                mem.iter()
                    .map(|x| format!("Usuário: {}\nAssistente: {}", x.question, x.answer))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.memories.clear();
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TurnReply {
    pub model: String,
    pub answer: String,
    pub sources: Vec<RetrievedSegment>,
    /// Supplementary web result, when the lookup produced one.
    pub web_note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelAnswer {
    pub model: String,
    pub result: Result<TurnReply, AppError>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComparisonSummary {
    /// Mean answer length in characters over successful answers.
    pub average_answer_chars: Option<usize>,
    pub succeeded: usize,
    /// Model with the longest answer, only when every model succeeded.
    pub most_detailed: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub answers: Vec<ModelAnswer>,
    pub summary: ComparisonSummary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatSettings {
    pub retrieval: RetrievalParams,
    pub memory_turns: usize,
}

impl ChatSettings {
    pub fn from_config(cfg: &AssistantConfig) -> Self {
        Self {
            retrieval: cfg.retrieval,
            memory_turns: cfg.chat.memory_turns,
        }
    }
}

/// Conversation loop over the shared index.
pub struct ChatSession {
    cache: Arc<IndexCacheManager>,
    llm: Arc<dyn Llm>,
    web: Option<Arc<dyn WebSearch>>,
    retrieval: RetrievalParams,
    state: ConversationState,
}

impl ChatSession {
    pub fn new(cache: Arc<IndexCacheManager>, llm: Arc<dyn Llm>, settings: ChatSettings) -> Self {
        Self {
            cache,
            llm,
            web: None,
            retrieval: settings.retrieval,
            state: ConversationState::new(settings.memory_turns),
        }
    }

    pub fn with_web_search(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.state.messages()
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn clear_history(&mut self) {
        self.state.clear();
    }

    /// Answer `question` with one model. The transcript records the answer, or the error
    /// text when the turn fails.
    pub fn ask(&mut self, question: &str, model: &str) -> Result<TurnReply, AppError> {
        let question = normalize_question(question)?;
        let info = resolve_model(model)?;
        self.state.push(Role::User, question.as_str(), None);

        let result = self
            .cache
            .load_or_build_index()
            .and_then(|index| self.answer(&index, &question, info.id));
        match result {
            Ok(mut reply) => {
                reply.web_note = self.web_lookup(&question);
                self.state.push(Role::Assistant, reply.answer.as_str(), Some(info.id));
                Ok(reply)
            }
            Err(e) => {
                warn!(model = info.id, error = %e, "turn failed");
                self.state
                    .push(Role::Assistant, format!("Error: {e}"), Some(info.id));
                Err(e)
            }
        }
    }

    /// Ask every model in `models` the same question. Each model keeps its own memory, so
    /// none sees another's answers.
    pub fn compare(&mut self, question: &str, models: &[&str]) -> Result<ComparisonReport, AppError> {
        let question = normalize_question(question)?;
        let infos = models
            .iter()
            .map(|m| resolve_model(m))
            .collect::<Result<Vec<_>, _>>()?;
        self.state.push(Role::User, question.as_str(), None);

        // One index for every model; a failed build is reported once.
        let index = match self.cache.load_or_build_index() {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "comparison skipped, index unavailable");
                self.state.push(Role::Assistant, format!("Error: {e}"), None);
                return Err(e);
            }
        };

        let mut answers = Vec::with_capacity(infos.len());
        for info in infos {
            let result = self.answer(&index, &question, info.id);
            let content = match &result {
                Ok(reply) => reply.answer.clone(),
                Err(e) => {
                    warn!(model = info.id, error = %e, "comparison turn failed");
                    format!("Error: {e}")
                }
            };
            self.state.push(Role::Assistant, content, Some(info.id));
            answers.push(ModelAnswer {
                model: info.id.to_string(),
                result,
            });
        }

        let summary = summarize(&answers);
        Ok(ComparisonReport { answers, summary })
    }

    fn answer(
        &mut self,
        index: &SearchIndex,
        question: &str,
        model: &str,
    ) -> Result<TurnReply, AppError> {
        let history = self.state.history_for(model);
        let query = if history.is_empty() {
            question.to_string()
        } else {
            format!("{question}\n\n{history}")
        };

        let sources = index.retrieve(self.cache.embedder(), &query, &self.retrieval)?;
        let prompt = prompts::answer_prompt(&prompts::context_blocks(&sources), &history, question);
        let answer = self.llm.generate(model, &prompt)?;
        info!(model, sources = sources.len(), "answered");

        self.state.remember(model, question, &answer);
        Ok(TurnReply {
            model: model.to_string(),
            answer,
            sources,
            web_note: None,
        })
    }

    fn web_lookup(&self, question: &str) -> Option<String> {
        self.web
            .as_ref()
            .and_then(|w| w.search(&prompts::web_query(question)))
            .filter(|note| !note.trim().is_empty())
    }
}

fn normalize_question(question: &str) -> Result<String, AppError> {
    let q = question.trim();
    if q.is_empty() {
        return Err(AppError::new(CHAT_QUESTION_EMPTY, "Question must not be empty"));
    }
    Ok(q.to_string())
}

fn resolve_model(name: &str) -> Result<&'static ModelInfo, AppError> {
    models::find(name).ok_or_else(|| {
        AppError::new(CHAT_MODEL_UNKNOWN, "Unknown chat model").with_details(format!(
            "model={}; known={}",
            name,
            CATALOG.iter().map(|m| m.id).collect::<Vec<_>>().join(",")
        ))
    })
}

fn summarize(answers: &[ModelAnswer]) -> ComparisonSummary {
    let lengths: Vec<(&str, usize)> = answers
        .iter()
        .filter_map(|a| {
            a.result
                .as_ref()
                .ok()
                .map(|r| (a.model.as_str(), r.answer.chars().count()))
        })
        .collect();
    let succeeded = lengths.len();
    let average_answer_chars = if succeeded == 0 {
        None
    } else {
        Some(lengths.iter().map(|(_, n)| n).sum::<usize>() / succeeded)
    };
    let most_detailed = if succeeded == answers.len() && succeeded > 0 {
        // First model wins ties.
        lengths
            .iter()
            .fold(None::<(&str, usize)>, |best, &(m, n)| match best {
                Some((_, bn)) if bn >= n => best,
                _ => Some((m, n)),
            })
            .map(|(m, _)| m.to_string())
    } else {
        None
    };
    ComparisonSummary {
        average_answer_chars,
        succeeded,
        most_detailed,
    }
}
