//! End-to-end tests: XML document in, rendered document out.

use pod_template::{DialectKind, PodContext, PodValue};
use pod_xml::{Error, XmlTemplateOptions, compile};
use pretty_assertions::assert_eq;

fn odf() -> XmlTemplateOptions {
    XmlTemplateOptions::for_dialect(DialectKind::Odf)
}

fn html() -> XmlTemplateOptions {
    XmlTemplateOptions::for_dialect(DialectKind::Html)
}

fn render(source: &str, options: &XmlTemplateOptions, ctx: &mut PodContext) -> String {
    compile(source, options)
        .expect("template compiles")
        .render(ctx)
        .expect("template renders")
}

/// An ODF note whose paragraphs are the statement's lines.
fn annotation(lines: &[&str]) -> String {
    let body: String = lines
        .iter()
        .map(|line| format!("<text:p>{line}</text:p>"))
        .collect();
    format!("<office:annotation><dc:creator>author</dc:creator><dc:date>2025-01-01</dc:date>{body}</office:annotation>")
}

#[test]
fn odf_field_in_paragraph() {
    let source = "<office:text><text:p>Dear <text:text-input text:description=\"\">name</text:text-input>,</text:p></office:text>";
    let mut ctx = PodContext::new();
    ctx.insert("name", "Ada & co");
    assert_eq!(
        render(source, &odf(), &mut ctx),
        "<office:text><text:p>Dear Ada &amp; co,</text:p></office:text>"
    );
}

#[test]
fn odf_conditional_paragraphs() {
    let source = format!(
        "<office:text><text:p>{}Yes</text:p><text:p>{}No</text:p></office:text>",
        annotation(&["do text if vip"]),
        annotation(&["do text else"]),
    );
    let mut ctx = PodContext::new();
    ctx.insert("vip", true);
    assert_eq!(
        render(&source, &odf(), &mut ctx),
        "<office:text><text:p>Yes</text:p></office:text>"
    );
    ctx.insert("vip", false);
    assert_eq!(
        render(&source, &odf(), &mut ctx),
        "<office:text><text:p>No</text:p></office:text>"
    );
}

#[test]
fn odf_statement_spread_over_note_paragraphs() {
    let source = format!(
        "<text:section>{}<text:p><text:text-input>n</text:text-input></text:p></text:section>",
        annotation(&["do section for n in names", "if show"]),
    );
    let mut ctx = PodContext::new();
    ctx.insert("names", vec!["a", "b"]);
    ctx.insert("show", true);
    assert_eq!(
        render(&source, &odf(), &mut ctx),
        "<text:section><text:p>a</text:p></text:section><text:section><text:p>b</text:p></text:section>"
    );
    ctx.insert("show", false);
    assert_eq!(render(&source, &odf(), &mut ctx), "");
}

#[test]
fn odf_repeated_cells_use_declared_columns() {
    let source = format!(
        "<table:table><table:table-column table:number-columns-repeated=\"2\"/>\
         <table:table-row><table:table-cell><text:p>{}<text:text-input>x</text:text-input></text:p></table:table-cell></table:table-row>\
         </table:table>",
        annotation(&["do cell for x in xs"]),
    );
    let mut ctx = PodContext::new();
    ctx.insert("xs", vec!["a", "b", "c"]);
    assert_eq!(
        render(&source, &odf(), &mut ctx),
        "<table:table><table:table-column table:number-columns-repeated=\"2\"/>\
         <table:table-row>\
         <table:table-cell office:value-type=\"string\"><text:p>a</text:p></table:table-cell>\
         <table:table-cell office:value-type=\"string\"><text:p>b</text:p></table:table-cell>\
         </table:table-row><table:table-row>\
         <table:table-cell office:value-type=\"string\"><text:p>c</text:p></table:table-cell>\
         <table:table-cell/></table:table-row>\
         </table:table>"
    );
}

#[test]
fn odf_numeric_cell_value_type() {
    let source = "<table:table><table:table-row><table:table-cell><text:p><text:text-input>n</text:text-input></text:p></table:table-cell></table:table-row></table:table>";
    let mut ctx = PodContext::new();
    ctx.insert("n", PodValue::Int(42));
    assert_eq!(
        render(source, &odf(), &mut ctx),
        "<table:table><table:table-row>\
         <table:table-cell office:value-type=\"float\" office:value=\"42\"><text:p>42</text:p></table:table-cell>\
         </table:table-row></table:table>"
    );
}

#[test]
fn odf_existing_value_type_is_kept() {
    let source = "<table:table><table:table-row><table:table-cell office:value-type=\"string\"><text:p><text:text-input>n</text:text-input></text:p></table:table-cell></table:table-row></table:table>";
    let mut ctx = PodContext::new();
    ctx.insert("n", PodValue::Int(1));
    assert_eq!(
        render(source, &odf(), &mut ctx),
        "<table:table><table:table-row><table:table-cell office:value-type=\"string\"><text:p>1</text:p></table:table-cell></table:table-row></table:table>"
    );
}

#[test]
fn odf_spaces_inside_a_field() {
    let source = "<text:p><text:text-input>a<text:s/>+<text:s/>b</text:text-input></text:p>";
    let mut ctx = PodContext::new();
    ctx.insert("a", 1);
    ctx.insert("b", 2);
    assert_eq!(render(source, &odf(), &mut ctx), "<text:p>3</text:p>");
}

#[test]
fn plain_annotation_is_copied() {
    let note = annotation(&["Please check the figures"]);
    let source = format!("<text:p>{note}Total</text:p>");
    assert_eq!(
        render(&source, &odf(), &mut PodContext::new()),
        source
    );
}

#[test]
fn html_loop_over_rows() {
    let source = "<table><tr><td><pod:note>do row for p in people</pod:note><pod:expr>p.name</pod:expr></td><td><pod:expr>p.age</pod:expr></td></tr></table>";
    let mut ctx = PodContext::new();
    ctx.insert(
        "people",
        PodValue::List(vec![
            PodValue::map([("name", "Ann".into()), ("age", PodValue::Int(31))]),
            PodValue::map([("name", "Bob".into()), ("age", PodValue::Int(27))]),
        ]),
    );
    assert_eq!(
        render(source, &html(), &mut ctx),
        "<table><tr><td>Ann</td><td data-pod-type=\"number\">31</td></tr>\
         <tr><td>Bob</td><td data-pod-type=\"number\">27</td></tr></table>"
    );
}

#[test]
fn html_meta_if_reproduces_the_statement() {
    let source = "<p><pod:note>do text meta-if final</pod:note>Dear <pod:expr>name</pod:expr></p>";
    let mut ctx = PodContext::new();
    ctx.insert("final", false);
    ctx.insert("name", "Ada");
    assert_eq!(render(source, &html(), &mut ctx), source);
}

#[test]
fn template_without_statements_reproduces_its_source() {
    let source = "<section><p>A <pod:expr>x</pod:expr></p><table><tr><td>1</td></tr></table></section>";
    let template = compile(source, &html()).unwrap();
    assert_eq!(template.reproduce().unwrap(), source);
}

#[test]
fn malformed_statement_leaves_a_note() {
    let source = "<section>\n<p><pod:note>do text if</pod:note>x</p>\n</section>";
    let options = html().with_document_name("report.html");
    let template = compile(source, &options).unwrap();

    let diagnostics = template.build_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    let summary = diagnostics[0].summary();
    assert!(summary.starts_with("[P-1-"), "{summary}");
    assert!(summary.ends_with("(report.html:2:4)"), "{summary}");

    let output = template.render(&mut PodContext::new()).unwrap();
    assert!(output.contains("<span class=\"pod-error\">"), "{output}");
    assert!(output.ends_with("x</p>\n</section>"), "{output}");
}

#[test]
fn strict_mode_rejects_malformed_statement() {
    let source = "<p><pod:note>do text if</pod:note>x</p>";
    let err = compile(source, &html().with_strict_mode(true)).unwrap_err();
    assert!(matches!(err, Error::Template(_)), "{err}");
}

#[test]
fn statement_without_target_is_reported() {
    let source = "<p><pod:note>do row for x in xs</pod:note>x</p>";
    let err = compile(source, &html().with_strict_mode(true)).unwrap_err();
    insta::assert_snapshot!(
        err.to_diagnostic().summary(),
        @"[P-1-2] Target Not Found: No open `row` encloses the statement (open elements: text)"
    );
}

#[test]
fn invalid_xml_is_a_syntax_error() {
    let err = compile("<p>a</q>", &html()).unwrap_err();
    assert!(matches!(err, Error::XmlSyntax { .. }), "{err}");
    assert_eq!(err.to_diagnostic().code.as_deref(), Some("P-9-1"));
}
