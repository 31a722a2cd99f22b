#![allow(dead_code)]

use std::fs;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use scr_core::config::SourcePaths;

/// Write a minimal PDF with one page per entry; each inner slice is a list of text lines.
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
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("save pdf");
}

pub const LAYOUT_CSV: &str = "Tag,Atributo,Descricao\n\
Doc3040,DtBase,Data-base das informacoes no formato AAAA-MM\n\
Doc3040,CNPJ,CNPJ da instituicao remetente\n\
Cli,Tp,Tipo de pessoa do cliente\n\
Op,Contrt,Numero do contrato\n";

pub const CRITICAS_CSV: &str = "Codigo,Critica\n\
101,Data-base invalida\n\
102,CNPJ nao confere com o remetente\n";

pub const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Doc3040 DtBase="2024-01" CNPJ="12345678">
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
            &["Instrucoes de preenchimento do Documento 3040", "Capitulo 1"],
            &["Capitulo 2: Operacoes de credito", "Vencimentos"],
        ],
    );
    fs::write(&paths.table, LAYOUT_CSV).expect("write table");
    fs::write(paths.table_aux.as_ref().expect("aux"), CRITICAS_CSV).expect("write aux");
    fs::write(&paths.structured_sample, SAMPLE_XML).expect("write sample");
    paths
}
