//! Integration tests for the filter → extract → tabularize pipeline.

use std::sync::Arc;

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use freeports::format::{FormatPipeline, FormatRegistry, INSTRUMENT_COLUMN};
use freeports::parser::{LopdfBackend, PdfBackend};
use freeports::{
    extract_bytes, render_blocks, BBox, Error, Extractor, LopdfRenderer, PdfBlock, Renderer,
    Targets, Value,
};

fn line(page: u32, y: f32, font: &str, content: &str) -> PdfBlock {
    PdfBlock::text(page, BBox::new(40.0, y, 550.0, y + 9.0), content).with_font(font)
}

/// Two pages of an EURIZON-like report; only the second carries the anchor.
fn eurizon_blocks() -> Vec<PdfBlock> {
    vec![
        line(1, 60.0, "Frutiger-Black", "STATEMENT OF NET ASSETS"),
        line(1, 100.0, "Frutiger-Light", "9.999.999\tIGNORED SPA\tEUR\t1.000.000,00\t9,99"),
        line(2, 40.0, "Frutiger-Black", "PORTFOLIO AS AT 31/12/2023"),
        line(2, 80.0, "Frutiger-Light", "1.500.000\tENEL SPA\tEUR\t12.345.678,90\t1,25"),
        line(2, 92.0, "Frutiger-Light", "2.250.000\tBTP 2,5% 01/12/2032\tEUR\t240.000,00\t0,80"),
        line(2, 104.0, "Frutiger-Light", "Total\t12.585.678,90"),
    ]
}

fn eurizon() -> Arc<dyn FormatPipeline> {
    FormatRegistry::with_defaults()
        .unwrap()
        .get("EURIZON")
        .unwrap()
}

#[test]
fn test_eurizon_rows() {
    let table = eurizon().run(&eurizon_blocks(), &Targets::default()).unwrap();

    assert_eq!(table.format, "EURIZON");
    assert_eq!(table.len(), 2);
    assert_eq!(
        table.column("Issuer").unwrap(),
        vec![
            Some(&Value::Text("ENEL SPA".into())),
            Some(&Value::Text("BTP 2,5% 01/12/2032".into())),
        ]
    );
    assert_eq!(
        table.column("Quantity").unwrap(),
        vec![Some(&Value::Decimal(1_500_000.0)), Some(&Value::Decimal(2_250_000.0))]
    );
    assert_eq!(
        table.column("Market value").unwrap()[0],
        Some(&Value::Decimal(12_345_678.9))
    );
    assert_eq!(
        table.column("% net assets").unwrap()[0],
        Some(&Value::Decimal(0.0125))
    );
    assert_eq!(
        table.column("Page").unwrap(),
        vec![Some(&Value::Integer(2)), Some(&Value::Integer(2))]
    );
}

#[test]
fn test_bond_columns_and_instrument() {
    let table = eurizon().run(&eurizon_blocks(), &Targets::default()).unwrap();

    assert_eq!(
        table.column("Interest rate").unwrap(),
        vec![None, Some(&Value::Decimal(0.025))]
    );
    assert_eq!(
        table.column("Maturity").unwrap()[1],
        Some(&Value::Date(NaiveDate::from_ymd_opt(2032, 12, 1).unwrap()))
    );
    assert_eq!(
        table.column(INSTRUMENT_COLUMN).unwrap(),
        vec![
            Some(&Value::Text("equity".into())),
            Some(&Value::Text("bond".into())),
        ]
    );
}

#[test]
fn test_targets_keep_matching_issuers() {
    let targets = Targets::new(["Enel"]);
    let table = eurizon().run(&eurizon_blocks(), &targets).unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.column("Issuer").unwrap(), vec![Some(&Value::Text("Enel".into()))]);
}

#[test]
fn test_missing_anchor_is_reported() {
    let blocks: Vec<PdfBlock> = eurizon_blocks().into_iter().filter(|b| b.page == 1).collect();
    let err = eurizon().run(&blocks, &Targets::default()).unwrap_err();
    assert!(matches!(err, Error::ExpectedPdfBlockNotFound { anchor } if anchor == "portfolio"));
}

#[test]
fn test_pipeline_is_deterministic() {
    let blocks = eurizon_blocks();
    let format = eurizon();
    let first = format.run(&blocks, &Targets::default()).unwrap();
    let second = format.run(&blocks, &Targets::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_csv_output_header() {
    let table = eurizon().run(&eurizon_blocks(), &Targets::default()).unwrap();
    let csv = table.to_csv_string().unwrap();
    let header = csv.lines().next().unwrap();
    assert_eq!(
        header,
        "Issuer,Quantity,Currency,Market value,% net assets,Interest rate,Maturity,Page,Instrument"
    );
    assert!(csv.contains("ENEL SPA,1500000,EUR,12345678.9,0.0125,,,2,equity"));
}

#[test]
fn test_custom_format_with_sections() {
    let mut registry = FormatRegistry::with_defaults().unwrap();
    registry
        .load_yaml(
            r#"
formats:
  - id: DEMO
    url_patterns: ['demo\.example']
    filter:
      anchors: [{ name: holdings, text: Holdings, font: Demo-Bold }]
      section: { font: Demo-Italic, y_range: { bottom: 30 } }
      body: { font: Demo, min_cells: 2 }
    fields:
      - { name: Issuer, tag: issuer, locate: { by: cell, index: 0 } }
      - { name: Quantity, tag: quantity, kind: integer, locate: { by: cell, index: 1 } }
      - { name: Fund, tag: section, required: false, locate: { by: section } }
    on_partial_row: fill_null
"#,
        )
        .unwrap();

    let blocks = vec![
        line(1, 10.0, "Demo-Italic", "Global Equity"),
        line(1, 40.0, "Demo-Bold", "Holdings"),
        line(1, 60.0, "Demo", "ENI\t1.000"),
        line(1, 72.0, "Demo", "ENEL\tn/a"),
        line(2, 40.0, "Demo-Bold", "Holdings"),
        line(2, 60.0, "Demo", "STELLANTIS\t250"),
    ];
    let format = registry
        .resolve(None, Some("https://demo.example/report.pdf"))
        .unwrap();
    let table = format.run(&blocks, &Targets::default()).unwrap();

    assert_eq!(table.columns, vec!["Issuer", "Quantity", "Fund"]);
    assert_eq!(table.len(), 3);
    assert_eq!(
        table.column("Quantity").unwrap(),
        vec![Some(&Value::Integer(1000)), None, Some(&Value::Integer(250))]
    );
    // the label is not repeated on page 2
    assert_eq!(
        table.column("Fund").unwrap()[2],
        Some(&Value::Text("Global Equity".into()))
    );
}

fn font(doc: &mut Document, base: &str) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(base.as_bytes().to_vec()),
    })
}

fn show(ops: &mut Vec<Operation>, font: &str, size: i64, x: i64, y: i64, cells: &[&str]) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(size)],
    ));
    ops.push(Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]));
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            ops.push(Operation::new("Td", vec![Object::Integer(110), Object::Integer(0)]));
        }
        ops.push(Operation::new("Tj", vec![Object::string_literal(*cell)]));
    }
    ops.push(Operation::new("ET", vec![]));
}

/// A two-page PDF laid out like an EURIZON report.
fn eurizon_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let black = font(&mut doc, "Frutiger-Black");
    let light = font(&mut doc, "Frutiger-Light");
    let resources = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => Object::Reference(black),
            "F2" => Object::Reference(light),
        },
    });

    let mut cover = Vec::new();
    show(&mut cover, "F1", 14, 50, 780, &["ANNUAL REPORT 2023"]);

    let mut portfolio = Vec::new();
    show(&mut portfolio, "F1", 12, 50, 780, &["PORTFOLIO AS AT 31/12/2023"]);
    show(
        &mut portfolio,
        "F2",
        8,
        50,
        700,
        &["1.500.000", "ENEL SPA", "EUR", "12.345.678,90", "1,25"],
    );
    show(
        &mut portfolio,
        "F2",
        8,
        50,
        688,
        &["2.250.000", "BTP 01/12/2032", "EUR", "240.000,00", "0,80"],
    );

    let mut kids = Vec::new();
    for ops in [cover, portfolio] {
        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
            "Resources" => Object::Reference(resources),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        });
        kids.push(Object::Reference(page_id));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

#[test]
fn test_render_generated_pdf() {
    let blocks = render_blocks(&eurizon_pdf()).unwrap();

    let anchor = blocks
        .iter()
        .find(|b| b.content.contains("PORTFOLIO AS AT"))
        .unwrap();
    assert_eq!(anchor.page, 2);
    assert_eq!(anchor.font.as_deref(), Some("Frutiger-Black"));

    let row = blocks.iter().find(|b| b.content.starts_with("1.500.000")).unwrap();
    assert_eq!(row.font.as_deref(), Some("Frutiger-Light"));
    assert_eq!(row.cells("\t"), vec!["1.500.000", "ENEL SPA", "EUR", "12.345.678,90", "1,25"]);
}

#[test]
fn test_extract_generated_pdf() {
    let table = extract_bytes(&eurizon_pdf(), "EURIZON", &Targets::default()).unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(
        table.column("Issuer").unwrap(),
        vec![
            Some(&Value::Text("ENEL SPA".into())),
            Some(&Value::Text("BTP 01/12/2032".into())),
        ]
    );
    assert_eq!(
        table.column(INSTRUMENT_COLUMN).unwrap()[1],
        Some(&Value::Text("bond".into()))
    );
}

#[test]
fn test_split_render_matches_sequential() {
    let pdf = eurizon_pdf();
    let sequential = render_blocks(&pdf).unwrap();

    let threaded = Extractor::default().with_workers(2).render(&pdf).unwrap();
    assert_eq!(threaded, sequential);
    // more parts than pages
    assert_eq!(LopdfRenderer::new().render_split(&pdf, 8).unwrap(), sequential);
}

#[test]
fn test_backend_pages_and_fonts() {
    let backend = LopdfBackend::load_bytes(&eurizon_pdf()).unwrap();
    assert_eq!(backend.pages().len(), 2);
    assert!(backend.page(0).is_none());
    assert!(backend.page(3).is_none());

    let page = backend.page(2).unwrap();
    assert_eq!(page.number, 2);
    assert_eq!((page.width, page.height), (595.0, 842.0));

    let fonts = backend.fonts(page.id).unwrap();
    assert_eq!(fonts.len(), 2);
    assert_eq!(fonts.base_name(b"F1"), Some("Frutiger-Black"));
    assert_eq!(fonts.decode(b"F2", b"ENEL SPA"), "ENEL SPA");
}
