/*
 * engine_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end tests: build templates from document events and render them.
 */

use pod_template::{
    BuildOptions, DefaultEvaluator, DialectKind, ElementKind, EvaluationError, PodContext,
    PodError, PodValue, RenderOptions, Template, TemplateBuilder,
};
use pretty_assertions::assert_eq;

fn builder() -> TemplateBuilder {
    Template::builder(BuildOptions {
        dialect: DialectKind::Html,
        ..BuildOptions::default()
    })
}

/// `<p>` + `text` + `</p>`, with an optional statement and fields.
fn paragraph(b: &mut TemplateBuilder, statement: Option<&str>, parts: &[&str]) {
    b.start_element(ElementKind::Paragraph, "<p>");
    if let Some(statement) = statement {
        b.add_statement(statement, None).unwrap();
    }
    for part in parts {
        match part.strip_prefix('=') {
            Some(expression) => b.add_expression(expression, None).unwrap(),
            None => b.write(part),
        }
    }
    b.end_element("</p>").unwrap();
}

fn render(template: &Template, ctx: &mut PodContext) -> String {
    template.render(ctx).unwrap()
}

fn render_lenient(template: &Template, ctx: &mut PodContext) -> (String, Vec<String>) {
    let (output, diagnostics) = template
        .render_with(ctx, &DefaultEvaluator::new(), &RenderOptions::default())
        .unwrap();
    let codes = diagnostics
        .into_iter()
        .map(|d| d.code.unwrap_or_default())
        .collect();
    (output, codes)
}

#[test]
fn test_hello() {
    let mut b = builder();
    paragraph(&mut b, None, &["Hello ", "=name"]);
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("name", "Ada");
    assert_eq!(render(&template, &mut ctx), "<p>Hello Ada</p>");
}

#[test]
fn test_fields_escape_unless_raw() {
    let mut b = builder();
    paragraph(&mut b, None, &["=html", "|", "=:html"]);
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("html", "<b>");
    assert_eq!(render(&template, &mut ctx), "<p>&lt;b&gt;|<b></p>");
}

#[test]
fn test_if_else_are_exclusive() {
    let mut b = builder();
    paragraph(&mut b, Some("do text if c"), &["yes"]);
    paragraph(&mut b, Some("do text else"), &["no"]);
    let template = b.finish().unwrap();

    let values: Vec<(PodValue, bool)> = vec![
        (true.into(), true),
        (false.into(), false),
        (0.into(), false),
        (1.into(), true),
        ("".into(), false),
        ("x".into(), true),
        (PodValue::None, false),
        (PodValue::List(vec![]), false),
        (vec![1].into(), true),
    ];
    for (value, truthy) in values {
        let mut ctx = PodContext::new();
        ctx.insert("c", value.clone());
        let expected = if truthy { "<p>yes</p>" } else { "<p>no</p>" };
        assert_eq!(render(&template, &mut ctx), expected, "condition {value}");
    }
}

#[test]
fn test_named_else() {
    let mut b = builder();
    paragraph(&mut b, Some("do text if a as first"), &["A"]);
    paragraph(&mut b, Some("do text if b"), &["B"]);
    paragraph(&mut b, Some("do text else first"), &["not A"]);
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("a", false);
    ctx.insert("b", true);
    assert_eq!(render(&template, &mut ctx), "<p>B</p><p>not A</p>");
}

#[test]
fn test_loop_status_and_restore() {
    let mut b = builder();
    paragraph(
        &mut b,
        Some("do text for item in items"),
        &["=loop.item.index", "-", "=item", "='!' if loop.item.isLast else ''"],
    );
    paragraph(&mut b, None, &["=item"]);
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("items", vec!["a", "b", "c"]);
    ctx.insert("item", "outer");
    assert_eq!(
        render(&template, &mut ctx),
        "<p>0-a</p><p>1-b</p><p>2-c!</p><p>outer</p>"
    );
    assert!(!ctx.contains("loop"));
}

#[test]
fn test_loop_over_map_keys_and_unpacking() {
    let mut b = builder();
    paragraph(&mut b, Some("do text for k, v in items(prices)"), &["=k", ":", "=v"]);
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert(
        "prices",
        PodValue::map([("tea", PodValue::Int(3)), ("cake", PodValue::Int(5))]),
    );
    assert_eq!(render(&template, &mut ctx), "<p>tea:3</p><p>cake:5</p>");
}

#[test]
fn test_nested_loops_see_both_statuses() {
    let mut b = builder();
    b.start_element(ElementKind::Section, "<section>");
    b.add_statement("do section for row in rows", None).unwrap();
    paragraph(
        &mut b,
        Some("do text for col in row"),
        &["=loop.row.index", ".", "=loop.col.index"],
    );
    b.end_element("</section>").unwrap();
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("rows", vec![vec![1, 2], vec![3]]);
    assert_eq!(
        render(&template, &mut ctx),
        "<section><p>0.0</p><p>0.1</p></section><section><p>1.0</p></section>"
    );
}

#[test]
fn test_with_bindings_are_scoped_unless_global() {
    let mut b = builder();
    paragraph(
        &mut b,
        Some("do text with greeting = 'Hi ' + name; @seen = True"),
        &["=greeting"],
    );
    paragraph(&mut b, None, &["=greeting", "/", "=seen"]);
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("name", "Ada");
    ctx.insert("greeting", "orig");
    assert_eq!(render(&template, &mut ctx), "<p>Hi Ada</p><p>orig/True</p>");
    assert_eq!(ctx.get("seen"), Some(&PodValue::Bool(true)));
}

/// A three-column table whose single cell repeats over `xs`.
fn repeated_cell_table() -> Template {
    let mut b = builder();
    b.start_element(ElementKind::Table, "<table>");
    b.declare_columns(3);
    b.start_element(ElementKind::Row, "<tr>");
    b.start_cell_with_value_type("<td", ">");
    b.add_statement("do cell for x in xs", None).unwrap();
    b.add_expression("x", None).unwrap();
    b.end_element("</td>").unwrap();
    b.end_element("</tr>").unwrap();
    b.end_element("</table>").unwrap();
    b.finish().unwrap()
}

#[test]
fn test_repeated_cells_fill_rows() {
    let template = repeated_cell_table();
    let mut ctx = PodContext::new();
    ctx.insert("xs", vec!["a", "b", "c", "d", "e", "f", "g"]);
    assert_eq!(
        render(&template, &mut ctx),
        "<table><tr><td>a</td><td>b</td><td>c</td></tr>\
         <tr><td>d</td><td>e</td><td>f</td></tr>\
         <tr><td>g</td><td/><td/></tr></table>"
    );
}

#[test]
fn test_empty_cell_loop_pads_the_row() {
    let template = repeated_cell_table();
    let mut ctx = PodContext::new();
    ctx.insert("xs", PodValue::List(vec![]));
    assert_eq!(
        render(&template, &mut ctx),
        "<table><tr><td/><td/><td/></tr></table>"
    );
}

#[test]
fn test_cell_value_type() {
    let template = repeated_cell_table();
    let mut ctx = PodContext::new();
    ctx.insert("xs", vec![PodValue::Int(7), "b".into(), PodValue::Float(1.5)]);
    assert_eq!(
        render(&template, &mut ctx),
        "<table><tr><td data-pod-type=\"number\">7</td><td>b</td>\
         <td data-pod-type=\"number\">1.5</td></tr></table>"
    );
}

#[test]
fn test_false_cell_condition_keeps_the_cell() {
    let mut b = builder();
    b.start_element(ElementKind::Table, "<table>");
    b.start_element(ElementKind::Row, "<tr>");
    b.start_element(ElementKind::Cell, "<td>");
    b.add_statement("do cell if False", None).unwrap();
    b.write("a");
    b.end_element("</td>").unwrap();
    b.end_element("</tr>").unwrap();
    b.end_element("</table>").unwrap();
    let template = b.finish().unwrap();
    assert_eq!(
        render(&template, &mut PodContext::new()),
        "<table><tr><td/></tr></table>"
    );
}

#[test]
fn test_minus_removes_section() {
    let mut b = builder();
    b.start_element(ElementKind::Section, "<section>");
    b.add_statement("do section- if True", None).unwrap();
    paragraph(&mut b, None, &["x"]);
    b.end_element("</section>").unwrap();
    let template = b.finish().unwrap();
    assert_eq!(render(&template, &mut PodContext::new()), "<p>x</p>");
}

fn table(cells: &[&str], statement: &str) -> Template {
    let mut b = builder();
    b.start_element(ElementKind::Table, "<table>");
    b.start_element(ElementKind::Row, "<tr>");
    for (i, text) in cells.iter().enumerate() {
        b.start_element(ElementKind::Cell, "<td>");
        b.write(text);
        if i == 0 {
            b.add_statement(statement, None).unwrap();
        }
        b.end_element("</td>").unwrap();
    }
    b.end_element("</tr>").unwrap();
    b.end_element("</table>").unwrap();
    b.finish().unwrap()
}

#[test]
fn test_minus_removes_single_cell_table() {
    let template = table(&["inner"], "do table- if True");
    assert_eq!(render(&template, &mut PodContext::new()), "inner");
}

#[test]
fn test_minus_on_table_with_several_cells_is_reported() {
    let template = table(&["a", "b"], "do table- if True");
    let (output, codes) = render_lenient(&template, &mut PodContext::new());
    assert_eq!(codes, vec!["P-3-1"]);
    assert!(output.starts_with("<span class=\"pod-error\">"));
    assert!(output.ends_with("<table><tr><td>a</td><td>b</td></tr></table>"));
}

#[test]
fn test_errors_are_isolated_when_lenient() {
    let mut b = builder();
    paragraph(&mut b, None, &["=missing"]);
    paragraph(&mut b, None, &["fine"]);
    let template = b.finish().unwrap();

    let (output, codes) = render_lenient(&template, &mut PodContext::new());
    assert_eq!(codes, vec!["P-2-1"]);
    assert!(output.contains("pod-error"));
    assert!(output.ends_with("<p>fine</p>"));
}

#[test]
fn test_strict_mode_stops_at_first_error() {
    let mut b = builder();
    paragraph(&mut b, None, &["=missing"]);
    paragraph(&mut b, None, &["fine"]);
    let template = b.finish().unwrap();

    let options = RenderOptions {
        strict: true,
        ..RenderOptions::default()
    };
    let mut out = String::new();
    let err = template
        .render_into(
            &mut out,
            &mut PodContext::new(),
            &DefaultEvaluator::new(),
            &options,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PodError::Evaluation(EvaluationError::Expression { .. })
    ));
    assert_eq!(out, "<p>");
}

/// Three sibling statements; the middle condition names nothing in the context.
fn three_siblings() -> Template {
    let mut b = builder();
    paragraph(&mut b, Some("do text if True"), &["first"]);
    paragraph(&mut b, Some("do text if missing"), &["second"]);
    paragraph(&mut b, Some("do text if True"), &["third"]);
    b.finish().unwrap()
}

#[test]
fn test_failing_sibling_is_replaced_by_a_note() {
    let template = three_siblings();
    let (output, codes) = render_lenient(&template, &mut PodContext::new());
    assert_eq!(codes, vec!["P-2-1"]);
    assert!(output.starts_with("<p>first</p><span class=\"pod-error\">"), "{output}");
    assert!(output.ends_with("</span><p>third</p>"), "{output}");
    assert!(!output.contains("second"));
}

#[test]
fn test_failing_sibling_stops_strict_rendering() {
    let template = three_siblings();
    let mut out = String::new();
    let err = template
        .render_into(
            &mut out,
            &mut PodContext::new(),
            &DefaultEvaluator::new(),
            &RenderOptions::default().with_strict_mode(true),
        )
        .unwrap_err();
    assert_eq!(err.code(), "P-2-1");
    assert_eq!(out, "<p>first</p>");
}

#[test]
fn test_loop_status_parity() {
    let mut b = builder();
    paragraph(
        &mut b,
        Some("do text for x in xs"),
        &[
            "=x",
            ":",
            "=loop.x.isFirst",
            ",",
            "=loop.x.isLast",
            ",",
            "=loop.x.isOdd",
            ",",
            "=loop.x.isEven",
        ],
    );
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("xs", vec![10, 20, 30]);
    assert_eq!(
        render(&template, &mut ctx),
        "<p>10:True,False,False,True</p>\
         <p>20:False,False,True,False</p>\
         <p>30:False,True,False,True</p>"
    );
}

#[test]
fn test_abort_stops_even_when_lenient() {
    let mut b = builder();
    paragraph(&mut b, None, &["=abort('no data')"]);
    let template = b.finish().unwrap();
    let err = template.render(&mut PodContext::new()).unwrap_err();
    assert!(matches!(err, PodError::Aborted { message } if message == "no data"));
}

#[test]
fn test_not_iterable() {
    let mut b = builder();
    paragraph(&mut b, Some("do text for x in 5"), &["=x"]);
    let template = b.finish().unwrap();
    let (_, codes) = render_lenient(&template, &mut PodContext::new());
    assert_eq!(codes, vec!["P-2-2"]);
}

#[test]
fn test_meta_if() {
    let mut b = builder();
    paragraph(&mut b, Some("do text meta-if final"), &["Dear ", "=name"]);
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("name", "Ada");
    ctx.insert("final", true);
    assert_eq!(render(&template, &mut ctx), "<p>Dear Ada</p>");

    ctx.insert("final", false);
    assert_eq!(
        render(&template, &mut ctx),
        "<p><pod:note>do text meta-if final</pod:note>Dear <pod:expr>name</pod:expr></p>"
    );
}

#[test]
fn test_field_meta_condition() {
    let mut b = Template::builder(
        BuildOptions::default()
            .with_dialect(DialectKind::Html)
            .with_field_meta_condition("final"),
    );
    paragraph(&mut b, None, &["Dear ", "=name"]);
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("name", "Ada");
    ctx.insert("final", false);
    assert_eq!(
        render(&template, &mut ctx),
        "<p>Dear <pod:expr>name</pod:expr></p>"
    );
    ctx.insert("final", true);
    assert_eq!(render(&template, &mut ctx), "<p>Dear Ada</p>");
}

#[test]
fn test_from_replaces_content() {
    let mut b = builder();
    paragraph(&mut b, Some("do text from greeting"), &["old"]);
    paragraph(&mut b, Some("do text from+ greeting"), &["old"]);
    paragraph(&mut b, Some("do text from+ :greeting"), &["old"]);
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("greeting", "<i>hi</i>");
    assert_eq!(
        render(&template, &mut ctx),
        "&lt;i&gt;hi&lt;/i&gt;<p>&lt;i&gt;hi&lt;/i&gt;</p><p><i>hi</i></p>"
    );

    ctx.insert("greeting", PodValue::None);
    assert_eq!(
        render(&template, &mut ctx),
        "<p>old</p><p>old</p><p>old</p>"
    );
}

#[test]
fn test_multi_line_statement_chain() {
    let mut b = builder();
    paragraph(
        &mut b,
        Some("do text if show\nfor n in names\nfrom+ n"),
        &["placeholder"],
    );
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("names", vec!["x", "y"]);
    ctx.insert("show", true);
    assert_eq!(render(&template, &mut ctx), "<p>x</p><p>y</p>");
    ctx.insert("show", false);
    assert_eq!(render(&template, &mut ctx), "");
}

fn greeting_template() -> Template {
    let mut b = builder();
    paragraph(&mut b, None, &["Hi ", "=name"]);
    b.finish().unwrap()
}

#[test]
fn test_nested_template_renders_with_current_context() {
    let mut b = builder();
    b.start_element(ElementKind::Section, "<section>");
    b.add_expression("inner", None).unwrap();
    b.end_element("</section>").unwrap();
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("inner", greeting_template());
    ctx.insert("name", "<Ada>");
    assert_eq!(
        render(&template, &mut ctx),
        "<section><p>Hi &lt;Ada&gt;</p></section>"
    );
}

#[test]
fn test_nested_template_depth_limit() {
    let mut b = builder();
    paragraph(&mut b, None, &["=inner"]);
    let template = b.finish().unwrap();

    let mut ctx = PodContext::new();
    ctx.insert("inner", greeting_template());
    ctx.insert("name", "Ada");
    let options = RenderOptions {
        max_template_depth: 0,
        ..RenderOptions::default()
    };
    let (_, diagnostics) = template
        .render_with(&mut ctx, &DefaultEvaluator::new(), &options)
        .unwrap();
    assert_eq!(diagnostics[0].code.as_deref(), Some("P-2-4"));
}

#[test]
fn test_host_functions() {
    let mut b = builder();
    paragraph(&mut b, None, &["=shout(name)"]);
    let template = b.finish().unwrap();

    let evaluator = DefaultEvaluator::new().with_function("shout", |args| match args {
        [PodValue::Str(s)] => Ok(PodValue::Str(format!("{}!", s.to_uppercase()))),
        _ => Ok(PodValue::None),
    });
    let mut ctx = PodContext::new();
    ctx.insert("name", "ada");
    let (output, _) = template
        .render_with(&mut ctx, &evaluator, &RenderOptions::default())
        .unwrap();
    assert_eq!(output, "<p>ADA!</p>");
}

#[test]
fn test_dangling_else_is_a_build_diagnostic() {
    let mut b = builder();
    paragraph(&mut b, Some("do text else"), &["x"]);
    let template = b.finish().unwrap();
    assert_eq!(template.build_diagnostics().len(), 1);
    assert_eq!(
        template.build_diagnostics()[0].code.as_deref(),
        Some("P-1-4")
    );
    insta::assert_snapshot!(
        render(&template, &mut PodContext::new()),
        @"<p><span class=\"pod-error\">[P-1-4] Dangling Else: No preceding `if` is waiting for an `else`</span>x</p>"
    );
}

#[test]
fn test_rendering_twice_gives_the_same_output() {
    let template = repeated_cell_table();
    let mut ctx = PodContext::new();
    ctx.insert("xs", vec![1, 2]);
    let first = render(&template, &mut ctx);
    let second = render(&template, &mut ctx);
    assert_eq!(first, second);
}
