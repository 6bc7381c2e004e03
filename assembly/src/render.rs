//! Rendering of proto files to bytes for packaging.

use protogen_core::{FieldLabel, Message, PROTO_SYNTAX, ProtoFile};

/// Converts a proto file to the bytes stored in the archive.
pub trait Renderer {
    /// Renders `file`, returning a reason on failure.
    fn render(&self, file: &ProtoFile) -> Result<Vec<u8>, String>;
}

/// Renders `.proto` source text.
///
/// Output depends only on the file, so identical files render to identical
/// bytes.
///
/// # Examples
///
/// ```
/// use protogen_assembly::{ProtoTextRenderer, Renderer};
/// use protogen_core::*;
///
/// let file = ProtoFile::new("codes.proto", "google.fhir.r5.core")
///     .with_message(Message::new("Code").with_field(Field::new("value", 1, "string")));
///
/// let text = String::from_utf8(ProtoTextRenderer::new().render(&file).unwrap()).unwrap();
/// assert!(text.contains("package google.fhir.r5.core;"));
/// assert!(text.contains("  string value = 1;"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProtoTextRenderer {
    header: Vec<String>,
}

impl ProtoTextRenderer {
    /// Creates a renderer without a header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a renderer whose output starts with a license comment for
    /// `license_date`. An empty date renders no header.
    pub fn with_license_date(license_date: &str) -> Self {
        if license_date.trim().is_empty() {
            return Self::new();
        }
        Self {
            header: vec![
                format!("Copyright {license_date} Google LLC"),
                String::new(),
                "Licensed under the Apache License, Version 2.0 (the \"License\");".into(),
                "you may not use this file except in compliance with the License.".into(),
                "You may obtain a copy of the License at".into(),
                String::new(),
                "    https://www.apache.org/licenses/LICENSE-2.0".into(),
            ],
        }
    }
}

impl Renderer for ProtoTextRenderer {
    fn render(&self, file: &ProtoFile) -> Result<Vec<u8>, String> {
        if file.package.trim().is_empty() {
            return Err(format!("{} has no package", file.path));
        }

        let mut out = String::new();
        for line in &self.header {
            if line.is_empty() {
                out.push_str("//\n");
            } else {
                out.push_str(&format!("// {line}\n"));
            }
        }
        if !self.header.is_empty() {
            out.push('\n');
        }

        out.push_str(&format!("syntax = \"{PROTO_SYNTAX}\";\n\n"));
        out.push_str(&format!("package {};\n", file.package));

        if !file.imports.is_empty() {
            out.push('\n');
            for import in &file.imports {
                out.push_str(&format!("import \"{import}\";\n"));
            }
        }

        let options = &file.options;
        if options.java_multiple_files
            || options.java_package.is_some()
            || options.go_package.is_some()
        {
            out.push('\n');
        }
        if options.java_multiple_files {
            out.push_str("option java_multiple_files = true;\n");
        }
        if let Some(java_package) = &options.java_package {
            out.push_str(&format!("option java_package = \"{java_package}\";\n"));
        }
        if let Some(go_package) = &options.go_package {
            out.push_str(&format!("option go_package = \"{go_package}\";\n"));
        }

        for message in &file.messages {
            out.push('\n');
            render_message(&mut out, message, 0);
        }

        Ok(out.into_bytes())
    }
}

fn render_message(out: &mut String, message: &Message, depth: usize) {
    let indent = "  ".repeat(depth);
    let inner = "  ".repeat(depth + 1);

    out.push_str(&format!("{indent}message {} {{\n", message.name));

    for range in &message.reserved_ranges {
        if range.start == range.end {
            out.push_str(&format!("{inner}reserved {};\n", range.start));
        } else {
            out.push_str(&format!("{inner}reserved {} to {};\n", range.start, range.end));
        }
    }
    if !message.reserved_names.is_empty() {
        let names: Vec<String> = message
            .reserved_names
            .iter()
            .map(|name| format!("\"{name}\""))
            .collect();
        out.push_str(&format!("{inner}reserved {};\n", names.join(", ")));
    }

    for field in &message.fields {
        let label = match field.label {
            FieldLabel::Repeated => "repeated ",
            FieldLabel::Optional => "",
        };
        out.push_str(&format!(
            "{inner}{label}{} {} = {};\n",
            field.type_name, field.name, field.tag
        ));
    }

    for nested in &message.nested {
        out.push('\n');
        render_message(out, nested, depth + 1);
    }

    out.push_str(&format!("{indent}}}\n"));
}
