//! Quine templates – wrap an encoded fragment in a program that prints itself.
//!
//! An artifact is a *data region* followed by an *engine region*:
//!
//! ```text
//! let d="<fragment>"          <- data region
//! ;let m="standard";...       <- engine region
//! ```
//!
//! Under [`TargetModel::Reflective`] the engine reads its own source, finds
//! where it starts via [`marker`], and prints the rebuilt data region followed
//! by that slice. Under [`TargetModel::Classic`] the engine text is carried as
//! a Standard-escaped string constant `e` and printed twice: once escaped,
//! once verbatim. The quote character is always produced with `chr(34)`.
//!
//! Every marker contains a `"` preceded by a non-backslash. No strategy can
//! emit that inside a fragment (Standard always writes `\"`, Unicode and Hex
//! never write a quote, Raw refuses quotes), so the first occurrence of the
//! marker is the start of the engine region.

use crate::error::GenerationError;
use crate::escape::{self, EscapeStrategy};
use crate::types::{Layout, TargetModel};

pub const DEFAULT_INDENT: &str = "    ";

/// The two layouts of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub one_line: String,
    pub multi_line: String,
}

/// Assembles artifacts for one strategy/target pair.
#[derive(Debug, Clone)]
pub struct Template<'a> {
    strategy: EscapeStrategy,
    target: TargetModel,
    indent: &'a str,
    trailing_newline: bool,
}

impl<'a> Template<'a> {
    pub fn new(strategy: EscapeStrategy, target: TargetModel) -> Self {
        Self {
            strategy,
            target,
            indent: DEFAULT_INDENT,
            trailing_newline: true,
        }
    }

    /// Indentation for continuation lines of the multi-line layout. Must be
    /// spaces and tabs only; the orchestrator validates this.
    pub fn indent(mut self, indent: &'a str) -> Self {
        self.indent = indent;
        self
    }

    pub fn trailing_newline(mut self, on: bool) -> Self {
        self.trailing_newline = on;
        self
    }

    /// Build both layouts around an already-encoded `fragment`.
    pub fn assemble(&self, fragment: &str) -> Result<Artifacts, GenerationError> {
        Ok(Artifacts {
            one_line: self.assemble_layout(fragment, Layout::OneLine)?,
            multi_line: self.assemble_layout(fragment, Layout::MultiLine)?,
        })
    }

    fn assemble_layout(&self, fragment: &str, layout: Layout) -> Result<String, GenerationError> {
        let data = data_region(fragment, self.strategy, layout);
        let engine = match self.target {
            TargetModel::Reflective => self.reflective_engine(layout),
            TargetModel::Classic => self.classic_engine(layout),
        };
        let mut text = String::with_capacity(data.len() + engine.len());
        text.push_str(&data);
        text.push_str(&engine);

        if self.target == TargetModel::Reflective
            && text.find(&marker(self.strategy, layout)) != Some(data.len())
        {
            return Err(GenerationError::MarkerNotFound { layout });
        }
        Ok(text)
    }

    fn raw_prefix(&self) -> &'static str {
        match self.strategy {
            EscapeStrategy::Raw => "r",
            _ => "",
        }
    }

    fn tail(&self) -> &'static str {
        if self.trailing_newline {
            "\n"
        } else {
            ""
        }
    }

    fn reflective_engine(&self, layout: Layout) -> String {
        let marker = marker(self.strategy, layout);
        let r = self.raw_prefix();
        match layout {
            Layout::OneLine => format!(
                "{marker}let q=chr(34);let t=source();\
                 print(\"let d={r}\"+q+escape(d,m)+q+slice(t,find(t,\";let m=\"+q+m+q+\";\")))"
            ),
            Layout::MultiLine => {
                let i1 = self.indent;
                let i2 = self.indent.repeat(2);
                format!(
                    "{marker}\n\
                     let q = chr(34);\n\
                     let t = source();\n\
                     print(\n\
                     {i1}\"let d = {r}\" + q + escape(d, m) + q\n\
                     {i2}+ slice(t, find(t, \";\\nlet m = \" + q + m + q + \";\"))\n\
                     );{tail}",
                    tail = self.tail()
                )
            }
        }
    }

    fn classic_engine(&self, layout: Layout) -> String {
        let mode = self.strategy.name();
        let r = self.raw_prefix();
        let (head, body) = match layout {
            Layout::OneLine => (
                format!(";let m=\"{mode}\";let e="),
                format!(
                    ";let q=chr(34);\
                     print(\"let d={r}\"+q+escape(d,m)+q+\";let m=\"+q+m+q+\";let e=\"+q\
                     +escape(e,\"standard\")+q+e)"
                ),
            ),
            Layout::MultiLine => {
                let i1 = self.indent;
                let i2 = self.indent.repeat(2);
                (
                    format!(";\nlet m = \"{mode}\";\nlet e = "),
                    format!(
                        ";\n\
                         let q = chr(34);\n\
                         print(\n\
                         {i1}\"let d = {r}\" + q + escape(d, m) + q\n\
                         {i2}+ \";\\nlet m = \" + q + m + q\n\
                         {i2}+ \";\\nlet e = \" + q + escape(e, \"standard\") + q + e\n\
                         );{tail}",
                        tail = self.tail()
                    ),
                )
            }
        };
        let carried = escape::encode_standard(&body);
        format!("{head}\"{carried}\"{body}")
    }
}

/// `let d=` + opener + fragment + closing quote.
fn data_region(fragment: &str, strategy: EscapeStrategy, layout: Layout) -> String {
    let binding = match layout {
        Layout::OneLine => "let d=",
        Layout::MultiLine => "let d = ",
    };
    format!("{binding}{}{fragment}\"", strategy.literal_opener())
}

/// The text a reflective engine searches for to find its own start.
pub fn marker(strategy: EscapeStrategy, layout: Layout) -> String {
    match layout {
        Layout::OneLine => format!(";let m=\"{}\";", strategy.name()),
        Layout::MultiLine => format!(";\nlet m = \"{}\";", strategy.name()),
    }
}
