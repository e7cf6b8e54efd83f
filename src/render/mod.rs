//! Rendering strategies for commands and pipelines.

use crate::cmd::{CommandSpec, PipelineSpec};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotePolicy { Strict, Loose }

pub trait Renderer {
    fn render_cmd(&self, cmd: &CommandSpec) -> Result<String, Error>;
    fn render_pipe(&self, pipe: &PipelineSpec) -> Result<String, Error> {
        if pipe.is_empty() {
            return Err(Error::RenderError("pipeline empty".into()));
        }
        let mut parts = Vec::new();
        for c in &pipe.0 { parts.push(self.render_cmd(c)?); }
        Ok(parts.join(" | "))
    }
    fn render_cmd_plan(&self, cmd: &CommandSpec) -> Result<String, Error> { self.render_cmd(cmd) }
    fn render_pipe_plan(&self, pipe: &PipelineSpec) -> Result<String, Error> {
        if pipe.is_empty() {
            return Err(Error::RenderError("pipeline empty".into()));
        }
        let mut parts = Vec::new();
        for c in &pipe.0 { parts.push(self.render_cmd_plan(c)?); }
        Ok(parts.join(" | "))
    }
}

#[derive(Debug, Clone)]
pub struct PosixRenderer { pub quote: QuotePolicy }

impl Default for PosixRenderer { fn default() -> Self { Self { quote: QuotePolicy::Strict } } }

impl PosixRenderer {
    pub fn loose() -> Self { Self { quote: QuotePolicy::Loose } }

    fn quote_arg(&self, a: &str) -> String {
        match self.quote {
            QuotePolicy::Strict => quote_sh(a),
            QuotePolicy::Loose if !a.is_empty() && is_simple_word(a) => a.to_string(),
            QuotePolicy::Loose => quote_sh(a),
        }
    }
}

impl Renderer for PosixRenderer {
    fn render_cmd(&self, cmd: &CommandSpec) -> Result<String, Error> {
        if cmd.program.is_empty() {
            return Err(Error::RenderError("program empty".into()));
        }

        let mut parts: Vec<String> = Vec::new();

        for (k, v) in &cmd.env {
            if !is_env_name(k) {
                return Err(Error::RenderError(format!("invalid environment name: {}", k)));
            }
            parts.push(format!("{}={}", k, self.quote_arg(v)));
        }

        parts.push(quote_prog(&cmd.program));

        for a in &cmd.args {
            parts.push(self.quote_arg(a));
        }

        Ok(parts.join(" "))
    }

    fn render_cmd_plan(&self, cmd: &CommandSpec) -> Result<String, Error> {
        if cmd.flags.sensitive {
            if cmd.program.is_empty() {
                return Err(Error::RenderError("program empty".into()));
            }
            return Ok(format!("{}  # sensitive, arguments suppressed", quote_prog(&cmd.program)));
        }
        <Self as Renderer>::render_cmd(self, cmd)
    }
}

fn quote_prog(p: &str) -> String {
    if is_simple_word(p) { p.to_string() } else { quote_sh(p) }
}

fn is_simple_word(s: &str) -> bool {
    s.chars().all(|c| matches!(c,
        'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' | '/' | ':' | '+' | '%' | '@' | '=' | ','))
}

fn is_env_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn quote_sh(s: &str) -> String {
    if s.is_empty() { return "''".to_string(); }
    let escaped = s.replace('\'', "'\"'\"'");
    format!("'{}'", escaped)
}
