use vocab_translator::docx::reader::SourceDocument;
use vocab_translator::docx::template::{document_xml, package_with_document, write_default_template};
use vocab_translator::docx::writer::OutputDocument;
use vocab_translator::llm::{CachedCompletion, MockCompletion};
use vocab_translator::pipeline::{PipelineConfig, PipelineStage, TemplateSource, VocabularyPipeline};
use vocab_translator::progress::ConsoleProgress;
use vocab_translator::vocabulary::VocabularyEntry;

const HELLO_WORLD: &str = r#"<w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:rPr><w:highlight w:val="yellow"/></w:rPr><w:t>world</w:t></w:r><w:r><w:t>.</w:t></w:r></w:p>"#;

fn docx(body: &str) -> Vec<u8> {
    package_with_document(&document_xml(body))
        .to_bytes()
        .expect("build docx")
}

fn mock() -> MockCompletion {
    MockCompletion::new("mock")
        .with_rule("Words and phrases:", "world | /wɜːrld/ | n. | 世界")
        .with_rule("Translate the following text", "你好，世界。")
}

fn config_with_template(dir: &std::path::Path) -> PipelineConfig {
    let template = dir.join("vocabulary_template.docx");
    write_default_template(&template, false).expect("template");
    PipelineConfig {
        template_path: template,
        ..PipelineConfig::default()
    }
}

#[test]
fn hello_world_produces_row_and_paragraph() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut pipeline =
        VocabularyPipeline::new(config_with_template(dir.path()), mock(), ConsoleProgress::silent());

    let out = pipeline.run(&docx(HELLO_WORLD)).expect("run");
    assert_eq!(pipeline.stage(), PipelineStage::Done);
    assert_eq!(out.file_name, "vocabulary.docx");
    assert_eq!(out.translation, "你好，世界。");
    assert_eq!(
        out.vocabulary,
        vec![VocabularyEntry::new("world", "/wɜːrld/", "n.", "世界")]
    );

    let doc = OutputDocument::from_bytes(&out.bytes).expect("reopen output");
    let rows = doc.table_rows(0).expect("table");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1], vec!["world", "/wɜːrld/", "n.", "世界"]);
    assert_eq!(
        doc.body_paragraph_texts().last().map(String::as_str),
        Some("你好，世界。")
    );

    // the output is itself a readable document, and nothing in it is highlighted
    let reread = SourceDocument::from_bytes(&out.bytes).expect("reader");
    assert!(reread.extract_content().ends_with("你好，世界。"));
    assert!(reread.extract_highlighted().is_empty());
}

#[test]
fn multi_line_translation_and_phrase_entries() {
    let body = concat!(
        r#"<w:p><w:r><w:t xml:space="preserve">I </w:t></w:r><w:r><w:rPr><w:highlight w:val="green"/></w:rPr><w:t>look up</w:t></w:r>"#,
        r#"<w:r><w:t xml:space="preserve"> the </w:t></w:r>"#,
        r#"<w:r><w:rPr><w:highlight w:val="yellow"/></w:rPr><w:t>cat</w:t></w:r><w:r><w:t>.</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t>Second paragraph.</w:t></w:r></w:p>"#
    );
    let mock = MockCompletion::new("mock")
        .with_rule(
            "Words and phrases:",
            "look up | | | 查阅\ncat | /kæt/ | n. | 猫\n",
        )
        .with_rule("Translate the following text", "我查了那只猫。\n\n第二段。  \n");
    let dir = tempfile::tempdir().expect("tempdir");
    let mut pipeline =
        VocabularyPipeline::new(config_with_template(dir.path()), mock, ConsoleProgress::silent());

    let out = pipeline.run(&docx(body)).expect("run");
    assert_eq!(out.paragraphs_added, 2);

    let prompts = pipeline.client().prompts();
    assert!(prompts[0].ends_with("I look up the cat.\nSecond paragraph."));
    assert!(prompts[1].contains("Words and phrases:\nlook up\ncat\n"));

    let doc = OutputDocument::from_bytes(&out.bytes).expect("reopen");
    let rows = doc.table_rows(0).expect("table");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], vec!["look up", "", "", "查阅"]);
    assert_eq!(rows[2], vec!["cat", "/kæt/", "n.", "猫"]);
    let paras = doc.body_paragraph_texts();
    let n = paras.len();
    assert_eq!(&paras[n - 2..], &["我查了那只猫。", "第二段。  "]);
}

#[test]
fn repeated_runs_are_byte_identical() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config_with_template(dir.path());
    let input = docx(HELLO_WORLD);

    let first = VocabularyPipeline::new(cfg.clone(), mock(), ConsoleProgress::silent())
        .run(&input)
        .expect("first")
        .bytes;
    let mut pipeline = VocabularyPipeline::new(cfg, mock(), ConsoleProgress::silent());
    let second = pipeline.run(&input).expect("second").bytes;
    let third = pipeline.run(&input).expect("third").bytes;
    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn template_is_reread_for_every_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config_with_template(dir.path());
    let mut pipeline = VocabularyPipeline::new(cfg, mock(), ConsoleProgress::silent());
    let input = docx(HELLO_WORLD);

    for _ in 0..2 {
        let out = pipeline.run(&input).expect("run");
        let doc = OutputDocument::from_bytes(&out.bytes).expect("reopen");
        assert_eq!(doc.table_rows(0).expect("table").len(), 2);
    }
}

#[test]
fn cached_client_answers_repeat_runs_without_backend_calls() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config_with_template(dir.path());
    let cache_dir = dir.path().join("cache");
    let input = docx(HELLO_WORLD);

    let client = CachedCompletion::with_dir(mock(), &cache_dir).expect("cache");
    let mut pipeline = VocabularyPipeline::new(cfg.clone(), client, ConsoleProgress::silent());
    let uncached = pipeline.run(&input).expect("first").bytes;
    pipeline.run(&input).expect("second");
    assert_eq!(pipeline.client().inner().calls(), 2);
    assert_eq!(pipeline.client().hits(), 2);

    // a fresh process sees the records on disk; the backend would fail if it were called
    let client = CachedCompletion::with_dir(mock().failing_on_call(1), &cache_dir).expect("cache");
    let mut pipeline = VocabularyPipeline::new(cfg, client, ConsoleProgress::silent());
    let cached = pipeline.run(&input).expect("from disk").bytes;
    assert_eq!(pipeline.client().inner().calls(), 0);
    assert_eq!(cached, uncached);
}

#[test]
fn builtin_template_matches_written_template() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config_with_template(dir.path());
    let input = docx(HELLO_WORLD);

    let from_file = VocabularyPipeline::new(cfg.clone(), mock(), ConsoleProgress::silent())
        .run(&input)
        .expect("file template")
        .bytes;
    let builtin = VocabularyPipeline::new(cfg, mock(), ConsoleProgress::silent())
        .with_template(TemplateSource::Builtin)
        .run(&input)
        .expect("builtin template")
        .bytes;
    let from_file = OutputDocument::from_bytes(&from_file).expect("file output");
    let builtin = OutputDocument::from_bytes(&builtin).expect("builtin output");
    assert_eq!(from_file.table_rows(0), builtin.table_rows(0));
    assert_eq!(from_file.body_paragraph_texts(), builtin.body_paragraph_texts());
}

#[test]
fn shipped_template_asset_has_a_four_column_table() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/vocabulary_template.docx");
    let doc = OutputDocument::open(&path).expect("asset");
    assert_eq!(doc.table_count(), 1);
    assert_eq!(doc.table_columns(0), Some(4));
    assert_eq!(
        doc.table_rows(0).expect("rows"),
        vec![vec!["Word", "Pronunciation", "Part of speech", "Translation"]]
    );
}
