use crate::tokens::Loc;
use std::fmt;

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub loc: Option<Loc>,
    pub context: Vec<String>,
}

impl ConfigError {
    pub fn new(message: impl Into<String>, loc: Option<Loc>) -> Self {
        Self {
            message: message.into(),
            loc,
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[1;31mconfiguration error\x1b[0m: {}", self.message)?;
        if let Some(loc) = self.loc {
            write!(f, " \x1b[38;5;244m(at {})\x1b[0m", loc)?;
        }
        if !self.context.is_empty() {
            writeln!(f, "\n  \x1b[1;34mcontext:\x1b[0m")?;
            for (i, ctx) in self.context.iter().rev().enumerate() {
                writeln!(f, "{}\u{21b3} {}", " ".repeat(2 + i * 2), ctx)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

pub type ParseResult<T> = Result<T, ConfigError>;
