//! SDL Printer
//!
//! Renders an assembled [`Schema`] as GraphQL SDL. Definitions come out in a
//! fixed order (scalars, enums, interfaces, unions, types, models) and in
//! registration order within each group, so the output is stable across
//! identical builds.

use serde_json::Value;

use crate::schema::{
    Argument, EnumType, Field, InterfaceType, ObjectType, ScalarType, Schema, UnionType,
};

const INDENT: &str = "  ";

// =============================================================================
// Public API
// =============================================================================

/// Print the whole schema
pub fn print_schema(schema: &Schema) -> String {
    let mut definitions: Vec<String> = Vec::new();
    definitions.extend(schema.scalars().map(print_scalar));
    definitions.extend(schema.enums().map(print_enum));
    definitions.extend(schema.interfaces().map(print_interface));
    definitions.extend(schema.unions().map(print_union));
    definitions.extend(schema.types().map(print_object));
    definitions.extend(schema.models().map(|model| print_object(model.as_object())));

    let mut output = definitions.join("\n");
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output
}

// =============================================================================
// Definitions
// =============================================================================

fn print_scalar(scalar: &ScalarType) -> String {
    let mut output = String::new();
    print_description(&mut output, scalar.description.as_deref(), "");
    output.push_str(&format!("scalar {}", scalar.name));
    if let Some(url) = &scalar.specified_by {
        output.push_str(&format!(" @specifiedBy(url: {})", quote(url)));
    }
    output.push('\n');
    output
}

fn print_enum(enum_type: &EnumType) -> String {
    let mut output = String::new();
    print_description(&mut output, enum_type.description.as_deref(), "");
    output.push_str(&format!("enum {} {{\n", enum_type.name));
    for (name, value) in &enum_type.values {
        print_description(&mut output, value.description.as_deref(), INDENT);
        output.push_str(&format!("{}{}\n", INDENT, name));
    }
    output.push_str("}\n");
    output
}

fn print_interface(interface: &InterfaceType) -> String {
    let mut output = String::new();
    print_description(&mut output, interface.description.as_deref(), "");
    output.push_str(&format!("interface {} {{\n", interface.name));
    for field in interface.fields.values() {
        print_field(&mut output, field);
    }
    output.push_str("}\n");
    output
}

fn print_union(union: &UnionType) -> String {
    let mut output = String::new();
    print_description(&mut output, union.description.as_deref(), "");
    let members: Vec<&str> = union.types.iter().map(String::as_str).collect();
    output.push_str(&format!("union {} = {}\n", union.name, members.join(" | ")));
    output
}

fn print_object(ty: &ObjectType) -> String {
    let mut output = String::new();
    print_description(&mut output, ty.description.as_deref(), "");
    let keyword = if ty.input { "input" } else { "type" };
    output.push_str(&format!("{} {}", keyword, ty.name));
    if !ty.interfaces.is_empty() {
        let interfaces: Vec<&str> = ty.interfaces.iter().map(String::as_str).collect();
        output.push_str(&format!(" implements {}", interfaces.join(" & ")));
    }
    output.push_str(" {\n");
    for field in ty.fields.values() {
        print_field(&mut output, field);
    }
    output.push_str("}\n");
    output
}

// =============================================================================
// Members
// =============================================================================

fn print_field(output: &mut String, field: &Field) {
    print_description(output, field.description.as_deref(), INDENT);
    output.push_str(&format!("{}{}", INDENT, field.name));
    if !field.args.is_empty() {
        let args: Vec<String> = field.args.values().map(print_argument).collect();
        output.push_str(&format!("({})", args.join(", ")));
    }
    output.push_str(&format!(": {}\n", field.type_ref));
}

fn print_argument(arg: &Argument) -> String {
    let mut printed = format!("{}: {}", arg.name, arg.type_ref);
    if let Some(default) = &arg.default_value {
        printed.push_str(&format!(" = {}", literal(default)));
    }
    printed
}

fn print_description(output: &mut String, description: Option<&str>, indent: &str) {
    let Some(description) = description.filter(|d| !d.is_empty()) else {
        return;
    };
    let escaped = description.replace("\"\"\"", "\\\"\"\"");
    if escaped.contains('\n') {
        output.push_str(&format!("{}\"\"\"\n", indent));
        for line in escaped.lines() {
            output.push_str(&format!("{}{}\n", indent, line));
        }
        output.push_str(&format!("{}\"\"\"\n", indent));
    } else {
        output.push_str(&format!("{}\"\"\"{}\"\"\"\n", indent, escaped));
    }
}

// =============================================================================
// Literals
// =============================================================================

fn quote(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// A JSON value as a GraphQL input literal
fn literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(key, value)| format!("{}: {}", key, literal(value)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}
