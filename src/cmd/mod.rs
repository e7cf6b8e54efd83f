//! Command modeling for client tool invocations.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub flags: CmdFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdFlags {
    /// Arguments or environment carry a credential.
    pub sensitive: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec { program: program.into(), ..Default::default() }
    }

    pub fn arg(mut self, a: impl Into<String>) -> Self { self.args.push(a.into()); self }

    pub fn args<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.env.insert(k.into(), v.into());
        self
    }

    pub fn sensitive(mut self, yes: bool) -> Self { self.flags.sensitive |= yes; self }

    /// Value following the first occurrence of `flag`, e.g. `value_of("-U")`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        let i = self.args.iter().position(|a| a == flag)?;
        self.args.get(i + 1).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSpec(pub Vec<CommandSpec>);

impl PipelineSpec {
    pub fn new() -> Self { PipelineSpec(Vec::new()) }
    pub fn push(&mut self, cmd: CommandSpec) { self.0.push(cmd); }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn first(&self) -> Option<&CommandSpec> { self.0.first() }
    pub fn is_sensitive(&self) -> bool { self.0.iter().any(|c| c.flags.sensitive) }
}

impl From<CommandSpec> for PipelineSpec {
    fn from(cmd: CommandSpec) -> Self { PipelineSpec(vec![cmd]) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_args_and_env() {
        let c = CommandSpec::new("psql").arg("-c").args(["SELECT 1", "-U"]).env("PGPASSWORD", "x");
        assert_eq!(c.args, vec!["-c", "SELECT 1", "-U"]);
        assert_eq!(c.env.get("PGPASSWORD").map(String::as_str), Some("x"));
        assert_eq!(c.value_of("-c"), Some("SELECT 1"));
        assert_eq!(c.value_of("-U"), None);
    }

    #[test]
    fn sensitive_is_sticky() {
        let c = CommandSpec::new("psql").sensitive(true).sensitive(false);
        assert!(c.flags.sensitive);
        let p = PipelineSpec::from(c);
        assert!(p.is_sensitive());
    }
}
