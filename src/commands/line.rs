//! Splitting a command line into a command object.

/// A command line split into its first word and the remaining arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine<'a> {
    /// First word, without a leading `.` or `!`.
    pub name: &'a str,
    /// Everything after the first word, trimmed.
    pub args: &'a str,
}

impl<'a> CommandLine<'a> {
    /// Parses `text`; returns `None` for a blank line.
    ///
    /// ```
    /// use worldvisor::CommandLine;
    ///
    /// let line = CommandLine::parse(".account create bob secret").unwrap();
    /// assert_eq!(line.name, "account");
    /// assert_eq!(line.args, "create bob secret");
    /// assert!(CommandLine::parse("   ").is_none());
    /// ```
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.trim();
        let text = text
            .strip_prefix('.')
            .or_else(|| text.strip_prefix('!'))
            .unwrap_or(text)
            .trim_start();
        if text.is_empty() {
            return None;
        }
        let (name, args) = match text.find(char::is_whitespace) {
            Some(at) => (&text[..at], text[at..].trim()),
            None => (text, ""),
        };
        Some(Self { name, args })
    }

    /// Parses the arguments as a nested command line (`server exit` → `exit`).
    pub fn subcommand(&self) -> Option<CommandLine<'a>> {
        CommandLine::parse(self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_word() {
        let line = CommandLine::parse("help").unwrap();
        assert_eq!(line.name, "help");
        assert_eq!(line.args, "");
        assert!(line.subcommand().is_none());
    }

    #[test]
    fn nested_subcommand() {
        let line = CommandLine::parse("  server   restart now ").unwrap();
        assert_eq!(line.name, "server");
        let sub = line.subcommand().unwrap();
        assert_eq!(sub.name, "restart");
        assert_eq!(sub.args, "now");
    }

    #[test]
    fn bang_prefix_is_stripped() {
        assert_eq!(CommandLine::parse("!gm on").unwrap().name, "gm");
        assert!(CommandLine::parse(".").is_none());
    }
}
