// XML artifacts

use std::fmt::Write as _;

use crate::encoding::layouts::{Column, FieldSource, Value};
use crate::encoding::sanitize;

fn element(out: &mut String, name: &str, value: Option<Value>, date_pattern: &str) {
    match value {
        Some(v) => {
            let text = sanitize::xml_escape(&sanitize::plain_text(&sanitize::render(
                &v,
                date_pattern,
            )));
            let _ = writeln!(out, "    <{name}>{text}</{name}>");
        }
        None => {
            let _ = writeln!(out, "    <{name}/>");
        }
    }
}

pub fn render<'a>(
    root: &str,
    record: &str,
    jurisdiction: &str,
    elements: &[Column],
    sources: Vec<FieldSource<'a>>,
    date_pattern: &str,
) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<{root} jurisdiction=\"{}\" recordCount=\"{}\">",
        sanitize::xml_escape(jurisdiction),
        sources.len()
    );
    for src in &sources {
        let _ = writeln!(
            out,
            "  <{record} referenceId=\"{}\">",
            sanitize::xml_escape(&sanitize::plain_text(src.reference))
        );
        for col in elements {
            element(&mut out, col.header, col.field.read(src), date_pattern);
        }
        out.push_str("    <TargetGroups>\n");
        for group in src.groups {
            let _ = writeln!(out, "      <Group code=\"{}\"/>", group.code());
        }
        out.push_str("    </TargetGroups>\n");
        let _ = writeln!(out, "  </{record}>");
    }
    let _ = writeln!(out, "</{root}>");
    out
}
