mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

use common::{manager, settings, CountingEmbedder, FailingEmbedder, FakeWeb, ScriptedLlm};
use scr_ai::cache::IndexCacheManager;
use scr_ai::chat::{ChatSession, ChatSettings, Role, COMPARISON_PAIR};
use scr_ai::embeddings::Embedder;
use scr_ai::llm::Llm;
use scr_ai::websearch::WebSearch;
use scr_core::config::RetrievalParams;
use scr_core::error::{CHAT_MODEL_UNKNOWN, CHAT_QUESTION_EMPTY, INDEX_EMBEDDINGS_FAILED};

struct Fixture {
    _tmp: TempDir,
    llm: Arc<ScriptedLlm>,
    web: Arc<FakeWeb>,
    session: ChatSession,
}

fn fixture(llm: ScriptedLlm, note: Option<&str>) -> Fixture {
    let tmp = tempdir().unwrap();
    let paths = common::write_corpus(tmp.path());
    let embedder = Arc::new(CountingEmbedder::new());
    let cache = Arc::new(manager(settings(tmp.path(), paths), &embedder));

    let llm = Arc::new(llm);
    let web = Arc::new(FakeWeb::returning(note));
    let llm_dyn: Arc<dyn Llm> = llm.clone();
    let web_dyn: Arc<dyn WebSearch> = web.clone();
    let session = ChatSession::new(
        cache,
        llm_dyn,
        ChatSettings {
            retrieval: RetrievalParams::default(),
            memory_turns: 6,
        },
    )
    .with_web_search(web_dyn);

    Fixture {
        _tmp: tmp,
        llm,
        web,
        session,
    }
}

#[test]
fn ask_answers_from_retrieved_context_and_records_the_turn() {
    let mut f = fixture(ScriptedLlm::new(), Some("Resultado da web"));

    let reply = f
        .session
        .ask("Qual o formato da data-base?", "gpt-4o-mini")
        .expect("ask");
    assert_eq!(reply.model, "gpt-4o-mini");
    assert!(reply.answer.starts_with("Resposta de gpt-4o-mini"));
    assert!(!reply.sources.is_empty() && reply.sources.len() <= 5);
    assert_eq!(reply.web_note.as_deref(), Some("Resultado da web"));

    let prompts = f.llm.prompts_for("gpt-4o-mini");
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Pergunta: Qual o formato da data-base?"));
    assert!(prompts[0].contains(&reply.sources[0].segment.provenance()));

    assert_eq!(
        f.web.queries.lock().unwrap().clone(),
        vec!["SCR 3040 Banco Central Qual o formato da data-base?".to_string()]
    );

    let roles: Vec<Role> = f.session.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
    assert_eq!(f.session.messages()[1].model.as_deref(), Some("gpt-4o-mini"));
}

#[test]
fn empty_web_result_is_not_attached() {
    let mut f = fixture(ScriptedLlm::new(), None);
    let reply = f.session.ask("O que e o CNPJ?", "GPT-4o Mini").expect("ask");
    assert_eq!(reply.web_note, None);
    assert_eq!(f.web.query_count(), 1);
}

#[test]
fn failed_turn_is_recorded_and_skips_web_lookup() {
    let mut f = fixture(ScriptedLlm::failing_for("gpt-4o"), Some("nota"));

    let err = f.session.ask("Quais criticas existem?", "gpt-4o").unwrap_err();
    assert_eq!(err.code, "LLM_REQUEST_FAILED");
    assert!(!err.is_fatal_to_process());
    assert_eq!(f.web.query_count(), 0);

    let last = f.session.messages().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.content.contains("LLM_REQUEST_FAILED"));

    // The session keeps working after a failed turn.
    f.session.ask("Quais criticas existem?", "gpt-3.5-turbo").expect("ask");
}

#[test]
fn invalid_input_is_rejected_before_touching_the_transcript() {
    let mut f = fixture(ScriptedLlm::new(), None);

    let err = f.session.ask("   ", "gpt-4o").unwrap_err();
    assert_eq!(err.code, CHAT_QUESTION_EMPTY);
    let err = f.session.ask("pergunta", "unknown-model").unwrap_err();
    assert_eq!(err.code, CHAT_MODEL_UNKNOWN);
    assert!(f.session.messages().is_empty());
}

#[test]
fn models_keep_separate_memories() {
    let mut f = fixture(ScriptedLlm::new(), None);

    f.session.ask("Primeira pergunta sobre vencimentos", "gpt-4o").expect("ask");
    f.session
        .ask("Segunda pergunta sobre modalidade", "gpt-3.5-turbo")
        .expect("ask");
    f.session.ask("Terceira pergunta sobre remessa", "gpt-4o").expect("ask");

    let prompts = f.llm.prompts_for("gpt-4o");
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("Usuário: Primeira pergunta sobre vencimentos"));
    assert!(prompts[1].contains("Assistente: Resposta de gpt-4o"));
    assert!(!prompts[1].contains("Segunda pergunta"));

    let other = f.llm.prompts_for("gpt-3.5-turbo");
    assert!(!other[0].contains("Primeira pergunta"));
}

#[test]
fn compare_runs_each_model_and_summarizes() {
    let mut f = fixture(ScriptedLlm::new(), Some("nota"));

    let report = f
        .session
        .compare("Como informar a modalidade?", &COMPARISON_PAIR)
        .expect("compare");
    let models: Vec<&str> = report.answers.iter().map(|a| a.model.as_str()).collect();
    assert_eq!(models, vec!["gpt-4o", "gpt-3.5-turbo"]);
    assert_eq!(report.summary.succeeded, 2);
    assert!(report.summary.average_answer_chars.is_some());
    // gpt-3.5-turbo has the longer model name, hence the longer scripted answer.
    assert_eq!(report.summary.most_detailed.as_deref(), Some("gpt-3.5-turbo"));

    let roles: Vec<Role> = f.session.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Assistant]);
    assert_eq!(f.web.query_count(), 0);
}

#[test]
fn compare_tolerates_one_failing_model() {
    let mut f = fixture(ScriptedLlm::failing_for("gpt-3.5-turbo"), None);

    let report = f
        .session
        .compare("Como informar a modalidade?", &COMPARISON_PAIR)
        .expect("compare");
    assert!(report.answers[0].result.is_ok());
    assert!(report.answers[1].result.is_err());
    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.summary.most_detailed, None);
}

#[test]
fn clear_history_resets_transcript_and_memories() {
    let mut f = fixture(ScriptedLlm::new(), None);
    f.session.ask("Primeira pergunta", "gpt-4o").expect("ask");
    f.session.clear_history();
    assert!(f.session.messages().is_empty());
    assert_eq!(f.session.state().history_for("gpt-4o"), "");

    f.session.ask("Nova pergunta", "gpt-4o").expect("ask");
    let prompts = f.llm.prompts_for("gpt-4o");
    assert!(!prompts[1].contains("Primeira pergunta"));
}

#[test]
fn compare_builds_the_index_once_and_reports_a_failed_build_once() {
    let tmp = tempdir().unwrap();
    let paths = common::write_corpus(tmp.path());
    let embedder = Arc::new(FailingEmbedder::new());
    let embedder_dyn: Arc<dyn Embedder> = embedder.clone();
    let cache = Arc::new(IndexCacheManager::new(
        settings(tmp.path(), paths),
        embedder_dyn,
    ));
    let llm = Arc::new(ScriptedLlm::new());
    let llm_dyn: Arc<dyn Llm> = llm.clone();
    let mut session = ChatSession::new(
        cache,
        llm_dyn,
        ChatSettings {
            retrieval: RetrievalParams::default(),
            memory_turns: 6,
        },
    );

    let err = session
        .compare("Como informar a modalidade?", &COMPARISON_PAIR)
        .unwrap_err();
    assert_eq!(err.code, INDEX_EMBEDDINGS_FAILED);
    assert_eq!(embedder.call_count(), 1);
    assert!(llm.prompts_for("gpt-4o").is_empty());

    let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
    assert!(session.messages()[1].content.contains(INDEX_EMBEDDINGS_FAILED));
}
