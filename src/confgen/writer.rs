//! Indentation-aware writer for the block-structured configuration format
//! of the device under test: named blocks containing option lines,
//! arbitrarily nested.

use crate::constants::CONFIG_INDENT;

pub struct ConfigWriter {
    out: String,
    depth: usize,
}

impl ConfigWriter {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            depth: 0,
        }
    }

    fn indent(&self) -> String {
        CONFIG_INDENT.repeat(self.depth)
    }

    /// Open a named block, populate it through the closure, close it.
    pub fn block(&mut self, header: &str, body: impl FnOnce(&mut Self)) {
        self.out.push_str(&format!("{}{} {{\n", self.indent(), header));
        self.depth += 1;
        body(self);
        self.depth -= 1;
        self.out.push_str(&format!("{}}}\n\n", self.indent()));
    }

    /// One option line inside the current block. A trailing newline is
    /// added when missing; empty input writes nothing.
    pub fn line(&mut self, content: &str) {
        if content.is_empty() {
            return;
        }
        for part in content.lines() {
            self.out.push_str(&self.indent());
            self.out.push_str(part);
            self.out.push('\n');
        }
    }

    pub fn finish(self) -> String {
        debug_assert_eq!(self.depth, 0, "unbalanced configuration blocks");
        self.out
    }
}

impl Default for ConfigWriter {
    fn default() -> Self {
        Self::new()
    }
}
