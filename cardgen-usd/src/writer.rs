//! USDA serialization

use crate::layer::{Attribute, Layer, PrimSpec, Property, Relationship, Variability, VariantSet};
use crate::value::{format_number, quote_asset, quote_string, Metadata, Value};
use cardgen_core::Result;
use std::path::Path;

const INDENT: &str = "    ";

fn indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}

/// Serialize a layer to USDA text
pub fn layer_to_string(layer: &Layer) -> String {
    let mut out = String::new();
    out.push_str("#usda ");
    out.push_str(&layer.version);
    out.push('\n');
    if !layer.metadata.is_empty() {
        write_metadata_block(&layer.metadata, 0, &mut out);
        out.push('\n');
    }
    for prim in &layer.prims {
        out.push('\n');
        write_prim(prim, 0, &mut out);
    }
    out
}

/// Serialize a layer and write it to `path`
pub fn write_layer(layer: &Layer, path: &Path) -> Result<()> {
    std::fs::write(path, layer_to_string(layer))?;
    Ok(())
}

fn write_metadata_block(metadata: &Metadata, level: usize, out: &mut String) {
    out.push_str("(\n");
    for entry in &metadata.entries {
        indent(level + 1, out);
        if let Some(op) = entry.list_op {
            out.push_str(op.keyword());
            out.push(' ');
        }
        out.push_str(&entry.key);
        out.push_str(" = ");
        write_value(&entry.value, level + 1, out);
        out.push('\n');
    }
    indent(level, out);
    out.push(')');
}

fn write_prim(prim: &PrimSpec, level: usize, out: &mut String) {
    indent(level, out);
    out.push_str(prim.specifier.keyword());
    out.push(' ');
    if let Some(type_name) = &prim.type_name {
        out.push_str(type_name);
        out.push(' ');
    }
    quote_string(&prim.name, out);
    if !prim.metadata.is_empty() {
        out.push(' ');
        write_metadata_block(&prim.metadata, level, out);
    }
    out.push('\n');
    write_prim_body(prim, level, out);
    out.push('\n');
}

fn write_prim_body(prim: &PrimSpec, level: usize, out: &mut String) {
    indent(level, out);
    out.push_str("{\n");
    write_prim_contents(prim, level + 1, out);
    indent(level, out);
    out.push('}');
}

fn write_prim_contents(prim: &PrimSpec, level: usize, out: &mut String) {
    for (target, value) in &prim.reorders {
        indent(level, out);
        out.push_str("reorder ");
        out.push_str(target);
        out.push_str(" = ");
        write_value(value, level, out);
        out.push('\n');
    }
    for property in &prim.properties {
        match property {
            Property::Attribute(attribute) => write_attribute(attribute, level, out),
            Property::Relationship(relationship) => write_relationship(relationship, level, out),
        }
    }
    for (i, child) in prim.children.iter().enumerate() {
        if i > 0 || !prim.properties.is_empty() {
            out.push('\n');
        }
        write_prim(child, level, out);
    }
    for set in &prim.variant_sets {
        out.push('\n');
        write_variant_set(set, level, out);
    }
}

fn write_variant_set(set: &VariantSet, level: usize, out: &mut String) {
    indent(level, out);
    out.push_str("variantSet ");
    quote_string(&set.name, out);
    out.push_str(" = {\n");
    for variant in &set.variants {
        indent(level + 1, out);
        quote_string(&variant.name, out);
        if !variant.metadata.is_empty() {
            out.push(' ');
            write_metadata_block(&variant.metadata, level + 1, out);
        }
        out.push_str(" {\n");
        write_prim_contents(variant, level + 2, out);
        indent(level + 1, out);
        out.push_str("}\n");
    }
    indent(level, out);
    out.push_str("}\n");
}

fn attribute_declaration(attribute: &Attribute, out: &mut String) {
    if attribute.custom {
        out.push_str("custom ");
    }
    match attribute.variability {
        Variability::Varying => {}
        Variability::Uniform => out.push_str("uniform "),
        Variability::Config => out.push_str("config "),
    }
    out.push_str(&attribute.type_name);
    if attribute.is_array {
        out.push_str("[]");
    }
    out.push(' ');
    out.push_str(&attribute.name);
}

fn write_attribute(attribute: &Attribute, level: usize, out: &mut String) {
    let has_value_line = attribute.default.is_some()
        || (attribute.time_samples.is_none() && attribute.connections.is_none());

    if has_value_line {
        indent(level, out);
        attribute_declaration(attribute, out);
        if let Some(value) = &attribute.default {
            out.push_str(" = ");
            write_value(value, level, out);
        }
        if !attribute.metadata.is_empty() {
            out.push(' ');
            write_metadata_block(&attribute.metadata, level, out);
        }
        out.push('\n');
    }

    if let Some(samples) = &attribute.time_samples {
        indent(level, out);
        attribute_declaration(attribute, out);
        out.push_str(".timeSamples = ");
        write_value(&Value::TimeSamples(samples.clone()), level, out);
        if !has_value_line && !attribute.metadata.is_empty() {
            out.push(' ');
            write_metadata_block(&attribute.metadata, level, out);
        }
        out.push('\n');
    }

    if let Some(connections) = &attribute.connections {
        indent(level, out);
        attribute_declaration(attribute, out);
        out.push_str(".connect = ");
        write_value(connections, level, out);
        if !has_value_line && attribute.time_samples.is_none() && !attribute.metadata.is_empty() {
            out.push(' ');
            write_metadata_block(&attribute.metadata, level, out);
        }
        out.push('\n');
    }
}

fn write_relationship(relationship: &Relationship, level: usize, out: &mut String) {
    indent(level, out);
    if relationship.custom {
        out.push_str("custom ");
    }
    if relationship.varying {
        out.push_str("varying ");
    }
    out.push_str("rel ");
    out.push_str(&relationship.name);
    if let Some(targets) = &relationship.targets {
        out.push_str(" = ");
        write_value(targets, level, out);
    }
    if !relationship.metadata.is_empty() {
        out.push(' ');
        write_metadata_block(&relationship.metadata, level, out);
    }
    out.push('\n');
}

/// Serialize a single value at the given indentation level
pub(crate) fn write_value(value: &Value, level: usize, out: &mut String) {
    match value {
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Number(n) => format_number(*n, out),
        Value::String(s) => quote_string(s, out),
        Value::Ident(ident) => out.push_str(ident),
        Value::Asset(asset) => quote_asset(asset, out),
        Value::Path(path) => {
            out.push('<');
            out.push_str(path);
            out.push('>');
        }
        Value::Reference {
            asset,
            prim_path,
            arguments,
        } => {
            if let Some(asset) = asset {
                quote_asset(asset, out);
            }
            if let Some(path) = prim_path {
                out.push('<');
                out.push_str(path);
                out.push('>');
            }
            if !arguments.is_empty() {
                out.push_str(" (");
                for (i, entry) in arguments.entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    out.push_str(&entry.key);
                    out.push_str(" = ");
                    write_value(&entry.value, level, out);
                }
                out.push(')');
            }
        }
        Value::Tuple(items) => {
            out.push('(');
            write_items(items, level, out);
            out.push(')');
        }
        Value::List(items) => {
            out.push('[');
            write_items(items, level, out);
            out.push(']');
        }
        Value::Dictionary(entries) => {
            out.push_str("{\n");
            for entry in entries {
                indent(level + 1, out);
                out.push_str(&entry.type_name);
                out.push(' ');
                if is_identifier(&entry.key) {
                    out.push_str(&entry.key);
                } else {
                    quote_string(&entry.key, out);
                }
                out.push_str(" = ");
                write_value(&entry.value, level + 1, out);
                out.push('\n');
            }
            indent(level, out);
            out.push('}');
        }
        Value::TimeSamples(samples) => {
            out.push_str("{\n");
            for (time, sample) in samples {
                indent(level + 1, out);
                format_number(*time, out);
                out.push_str(": ");
                write_value(sample, level + 1, out);
                out.push_str(",\n");
            }
            indent(level, out);
            out.push('}');
        }
    }
}

fn write_items(items: &[Value], level: usize, out: &mut String) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_value(item, level, out);
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Specifier;
    use crate::parser::parse_layer;

    #[test]
    fn test_write_simple_layer() {
        let mut layer = Layer::new("out.usda");
        layer.set_default_prim("Root");
        layer.metadata.set("metersPerUnit", Value::Number(0.01));
        let mut root = PrimSpec::new(Specifier::Def, Some("Xform"), "Root");
        root.set_attribute(
            Attribute::new("token", "model:drawMode", Value::token("cards")).uniform(),
        );
        layer.prims.push(root);

        let text = layer_to_string(&layer);
        assert!(text.starts_with("#usda 1.0\n(\n    defaultPrim = \"Root\"\n"));
        assert!(text.contains("def Xform \"Root\"\n{\n    uniform token model:drawMode = \"cards\"\n}"));
    }

    #[test]
    fn test_large_integers_round_trip_exactly() {
        let source = r#"#usda 1.0

def Xform "A" (
    customData = {
        uint64 assetHash = 18446744073709551615
    }
)
{
    int64 j = 9007199254740993
    int64[] ids = [9007199254740993, -9223372036854775808]
    double half = 0.5
}
"#;
        let layer = parse_layer(source, "ids.usda").unwrap();
        let a = layer.root_prim("A").unwrap();
        assert_eq!(
            a.attribute("j").unwrap().resolved_value(),
            Some(&Value::Int(9_007_199_254_740_993))
        );

        let text = layer_to_string(&layer);
        assert!(text.contains("int64 j = 9007199254740993\n"));
        assert!(text.contains("int64[] ids = [9007199254740993, -9223372036854775808]"));
        assert!(text.contains("uint64 assetHash = 18446744073709551615"));
        assert!(text.contains("double half = 0.5"));
        assert_eq!(parse_layer(&text, "ids.usda").unwrap(), layer);
    }

    #[test]
    fn test_written_layer_parses_back() {
        let source = r#"#usda 1.0
(
    defaultPrim = "A"
    subLayers = [@./base.usda@]
)

def Xform "A" (
    prepend apiSchemas = ["GeomModelAPI"]
    references = @./r.usda@</R> (offset = 5)
    customData = {
        dictionary nested = {
            string "odd key" = "v"
        }
    }
)
{
    float xformOp:rotateX.timeSamples = {
        0: 0,
        10: 45,
    }
    asset tex = @./t.png@ (
        colorSpace = "raw"
    )
    rel proxyPrim = </A/Proxy>

    over "Proxy"
    {
    }

    variantSet "lod" = {
        "high" {
            double radius = 2
        }
    }
}
"#;
        let first = parse_layer(source, "a.usda").unwrap();
        let text = layer_to_string(&first);
        let second = parse_layer(&text, "a.usda").unwrap();
        assert_eq!(first, second);
    }
}
