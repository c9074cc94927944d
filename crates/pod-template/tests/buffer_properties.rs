/*
 * buffer_properties.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Property tests for cutting and re-joining buffers.
 */

use pod_template::{Buffer, ElementId, ElementKind, Expression};
use proptest::prelude::*;

fn buffer_with(text: &str, fields: usize) -> Buffer {
    let mut buffer = Buffer::new();
    buffer.open_element(ElementId(1), ElementKind::Section, "<s>");
    buffer.write(text);
    for _ in 0..fields {
        buffer.add_expression(Expression::parse("x"));
        buffer.write("-");
    }
    buffer.close_element(ElementId(1), "</s>");
    buffer
}

proptest! {
    #[test]
    fn cut_then_transfer_restores_content(
        text in "[a-z<>/ ]{0,40}",
        fields in 0usize..4,
        at in 0usize..200,
    ) {
        let mut head = buffer_with(&text, fields);
        let original = head.content().to_string();
        let index = at % (original.len() + 1);

        let tail = head.cut(index, false);
        prop_assert_eq!(head.len(), index);
        prop_assert_eq!(head.len() + tail.len(), original.len());
        prop_assert_eq!(head.entries().count() + tail.entries().count(), fields);

        tail.transfer_all_content(&mut head);
        prop_assert_eq!(head.content(), original.as_str());
        prop_assert_eq!(head.entries().count(), fields);
    }

    #[test]
    fn keep_first_part_mirrors_cut(
        text in "[a-z ]{0,30}",
        fields in 0usize..3,
        at in 0usize..100,
    ) {
        let mut first = buffer_with(&text, fields);
        let mut second = buffer_with(&text, fields);
        let index = at % (first.len() + 1);

        let tail = first.cut(index, false);
        let head = second.cut(index, true);
        prop_assert_eq!(first.content(), head.content());
        prop_assert_eq!(second.content(), tail.content());
    }

    #[test]
    fn entries_stay_on_placeholders(
        text in "[a-z]{0,20}",
        fields in 1usize..4,
        at in 0usize..100,
    ) {
        let mut head = buffer_with(&text, fields);
        let index = at % (head.len() + 1);
        let tail = head.cut(index, false);
        for part in [&head, &tail] {
            for (offset, _) in part.entries() {
                prop_assert_eq!(&part.content()[offset..offset + 1], " ");
            }
        }
    }
}
