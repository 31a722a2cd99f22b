#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use scr_ai::cache::{IndexBuildSettings, IndexCacheManager};
use scr_ai::embeddings::Embedder;
use scr_ai::llm::Llm;
use scr_ai::websearch::WebSearch;
use scr_core::config::{ChunkingConfig, SourcePaths};
use scr_core::error::AppError;

pub const MODEL: &str = "fake-embed";

/// Deterministic embedding: ASCII letter frequencies plus a constant bias so no vector is zero.
pub fn letter_vector(input: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 27];
    for ch in input.chars() {
        let c = ch.to_ascii_lowercase();
        if c.is_ascii_lowercase() {
            v[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    v[26] = 1.0;
    v
}

pub struct CountingEmbedder {
    calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(letter_vector(input))
    }
}

pub struct FailingEmbedder {
    calls: AtomicUsize,
}

impl FailingEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for FailingEmbedder {
    fn embed(&self, _model: &str, _input: &str) -> Result<Vec<f32>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::new("INDEX_EMBEDDINGS_FAILED", "embedding service down").with_retryable(true))
    }
}

/// Answers with a fixed text per model and records every prompt it sees.
pub struct ScriptedLlm {
    pub prompts: Mutex<Vec<(String, String)>>,
    pub fail_for: Option<String>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail_for: None,
        }
    }

    pub fn failing_for(model: &str) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail_for: Some(model.to_string()),
        }
    }

    pub fn prompts_for(&self, model: &str) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == model)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl Llm for ScriptedLlm {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        self.prompts
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string()));
        if self.fail_for.as_deref() == Some(model) {
            return Err(AppError::new("LLM_REQUEST_FAILED", "model unavailable"));
        }
        Ok(format!("Resposta de {model}: o campo DtBase usa o formato AAAA-MM."))
    }
}

pub struct FakeWeb {
    pub queries: Mutex<Vec<String>>,
    pub note: Option<String>,
}

impl FakeWeb {
    pub fn returning(note: Option<&str>) -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            note: note.map(str::to_string),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

impl WebSearch for FakeWeb {
    fn search(&self, query: &str) -> Option<String> {
        self.queries.lock().unwrap().push(query.to_string());
        self.note.clone()
    }
}

pub fn write_pdf(path: &Path, pages: &[&[&str]]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        let mut y: i64 = 780;
        for line in lines.iter() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 10_i64.into()]));
            operations.push(Operation::new("Td", vec![40_i64.into(), y.into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
            y -= 14;
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("save pdf");
}

pub const LAYOUT_CSV: &str = "Tag,Atributo,Descricao\n\
Doc3040,DtBase,Data-base das informacoes no formato AAAA-MM\n\
Doc3040,CNPJ,CNPJ da instituicao remetente com oito posicoes\n\
Doc3040,Remessa,Numero sequencial da remessa no mes\n\
Cli,Tp,Tipo de pessoa do cliente fisica ou juridica\n\
Cli,Cd,Codigo do cliente CPF ou CNPJ\n\
Op,Contrt,Numero do contrato da operacao de credito\n\
Op,Mod,Modalidade da operacao conforme tabela do anexo\n\
Venc,v110,Valor a vencer ate trinta dias\n";

pub const CRITICAS_CSV: &str = "Codigo,Critica\n\
101,Data-base invalida ou fora do periodo de remessa\n\
102,CNPJ nao confere com o remetente autorizado\n\
205,Modalidade incompativel com o tipo de cliente\n";

pub const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Doc3040 DtBase="2024-01" CNPJ="12345678" Remessa="1">
  <Cli Tp="1" Cd="11122233344">
    <Op Contrt="C-001" Mod="0202">
      <Venc v110="1500.00"/>
    </Op>
  </Cli>
</Doc3040>
"#;

/// Lay out a complete four-source corpus under `dir`.
pub fn write_corpus(dir: &Path) -> SourcePaths {
    let paths = SourcePaths {
        pdf: dir.join("instrucoes.pdf"),
        table: dir.join("leiaute.csv"),
        table_aux: Some(dir.join("criticas.csv")),
        structured_sample: dir.join("simulacao.xml"),
    };
    write_pdf(
        &paths.pdf,
        &[
            &[
                "Instrucoes de preenchimento do Documento 3040",
                "O documento deve ser remetido mensalmente ao Banco Central.",
                "A data-base corresponde ao ultimo dia do mes de referencia.",
            ],
            &[
                "Capitulo 2: Operacoes de credito",
                "Cada operacao deve informar contrato, modalidade e vencimentos.",
                "Valores a vencer sao distribuidos por faixas de prazo.",
            ],
            &[
                "Capitulo 3: Criticas",
                "Arquivos com erros de validacao sao rejeitados integralmente.",
            ],
        ],
    );
    fs::write(&paths.table, LAYOUT_CSV).expect("write table");
    fs::write(paths.table_aux.as_ref().expect("aux"), CRITICAS_CSV).expect("write aux");
    fs::write(&paths.structured_sample, SAMPLE_XML).expect("write sample");
    paths
}

pub fn small_chunking() -> ChunkingConfig {
    ChunkingConfig {
        max_chars: 120,
        overlap_chars: 30,
    }
}

pub fn settings(dir: &Path, sources: SourcePaths) -> IndexBuildSettings {
    IndexBuildSettings {
        sources,
        index_dir: dir.join("vectorstore"),
        chunking: small_chunking(),
        embedding_model: MODEL.to_string(),
        verify_sources: true,
    }
}

pub fn manager(settings: IndexBuildSettings, embedder: &Arc<CountingEmbedder>) -> IndexCacheManager {
    let embedder: Arc<dyn Embedder> = embedder.clone();
    IndexCacheManager::new(settings, embedder)
}
