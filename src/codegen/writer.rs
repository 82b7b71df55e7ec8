//! Indented source buffer.

const INDENT: &str = "    ";

pub const GENERATED_BANNER: &str = "//! Generated by sheetschema. Do not edit.";

#[derive(Debug, Default)]
pub struct SourceWriter {
    buf: String,
    depth: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a file with the banner and a one-line module doc.
    pub fn with_banner(summary: &str) -> Self {
        let mut w = Self::new();
        w.line(GENERATED_BANNER);
        w.line(format!("//! {summary}"));
        w.blank();
        w
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.buf.push_str(INDENT);
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        if !self.buf.is_empty() && !self.buf.ends_with("\n\n") && !self.buf.ends_with("{\n") {
            self.buf.push('\n');
        }
    }

    /// `header {` … `}` with the body indented one level.
    pub fn block(&mut self, header: impl AsRef<str>, body: impl FnOnce(&mut Self)) {
        self.line(format!("{} {{", header.as_ref()));
        self.depth += 1;
        body(self);
        self.depth -= 1;
        self.line("}");
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Rust string literal for `s`.
pub fn lit(s: &str) -> String {
    format!("{s:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_blocks_indent() {
        let mut w = SourceWriter::new();
        w.block("impl A", |w| {
            w.block("fn f()", |w| w.line("1"));
            w.blank();
            w.line("const X: u8 = 0;");
        });
        assert_eq!(
            w.into_string(),
            "impl A {\n    fn f() {\n        1\n    }\n\n    const X: u8 = 0;\n}\n"
        );
    }

    #[test]
    fn literals_are_escaped() {
        assert_eq!(lit("a\"b\\"), r#""a\"b\\""#);
    }
}
