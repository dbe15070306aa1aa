//! Input line tokenizing.

/// A `/command` line split into its name and positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub command: String,
    pub args: Vec<String>,
}

/// Split a `/command arg "quoted arg"` line. Returns `None` for non-command input.
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    let line = line.trim();
    if !line.starts_with('/') {
        return None;
    }

    let mut tokens = split_args(line).into_iter();
    let command = tokens.next()?;
    Some(ParsedLine {
        command,
        args: tokens.collect(),
    })
}

/// Split on whitespace; a token opened with `"` runs to the next `"`,
/// keeping embedded spaces. An unterminated quote runs to end of input.
pub fn split_args(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;

    for ch in input.trim().chars() {
        if !in_token {
            if ch.is_whitespace() {
                continue;
            }
            in_token = true;
            if ch == '"' {
                in_quotes = true;
            } else {
                current.push(ch);
            }
        } else if in_quotes {
            if ch == '"' {
                tokens.push(std::mem::take(&mut current));
                in_token = false;
                in_quotes = false;
            } else {
                current.push(ch);
            }
        } else if ch.is_whitespace() {
            tokens.push(std::mem::take(&mut current));
            in_token = false;
        } else {
            current.push(ch);
        }
    }

    if in_token {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_arguments() {
        let parsed = parse_line("/cmd arg1 arg2").unwrap();
        assert_eq!(parsed.command, "/cmd");
        assert_eq!(parsed.args, vec!["arg1", "arg2"]);
    }

    #[test]
    fn test_no_arguments() {
        let parsed = parse_line("  /whoami  ").unwrap();
        assert_eq!(parsed.command, "/whoami");
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn test_quoted_segment_keeps_spaces() {
        let parsed = parse_line(r#"/python-test log "Test debug message" debug"#).unwrap();
        assert_eq!(parsed.args, vec!["log", "Test debug message", "debug"]);
    }

    #[test]
    fn test_repeated_whitespace_collapses() {
        assert_eq!(split_args("a    b\tc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unterminated_quote_runs_to_end() {
        assert_eq!(split_args(r#"/say "hello there"#), vec!["/say", "hello there"]);
    }

    #[test]
    fn test_empty_quotes_yield_empty_argument() {
        assert_eq!(split_args(r#"/set name """#), vec!["/set", "name", ""]);
    }

    #[test]
    fn test_non_command_input() {
        assert!(parse_line("hello /cmd").is_none());
        assert!(parse_line("").is_none());
    }
}
