use crate::retrieve::RetrievedSegment;

/// Prompt for one answer. The assistant answers in Portuguese, the language of the corpus.
pub fn answer_prompt(context_blocks: &str, chat_history: &str, question: &str) -> String {
    // Contract: answer only from the retrieved context; admit when it is not there.
    format!(
        r#"Você é um assistente especializado em documentos do Banco Central do Brasil,
especificamente no documento SCR 3040. Sua função é ajudar usuários a entender e preencher
corretamente este documento.

Use APENAS as informações fornecidas no contexto abaixo para responder. Se a informação
não estiver no contexto, seja honesto e diga que não tem essa informação nos documentos.

Contexto:
{context_blocks}

Histórico da conversa:
{chat_history}

Pergunta: {question}

Resposta detalhada e precisa:"#
    )
}

/// Render retrieved passages with their provenance tags, best first.
pub fn context_blocks(hits: &[RetrievedSegment]) -> String {
    hits.iter()
        .map(|h| format!("[{}]\n{}", h.segment.provenance(), h.segment.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Query sent to the web lookup for a question.
pub fn web_query(question: &str) -> String {
    format!("SCR 3040 Banco Central {}", question.trim())
}
