//! Line commands understood by the `dapmux` prompt.
//!
//! ```text
//! [@session] launch <language> <program> [args...]
//! [@session] break <file>:<line> [if <expr>] [hit <expr>] [log <message>]
//! [@session] step --granularity line 3
//! ```

use std::path::PathBuf;

use dapmux_engine::{BreakpointSpec, Language, StepKind};

/// A parsed prompt line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Explicit `@id` target; the default session otherwise.
    pub session: Option<String>,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Launch {
        language: Language,
        program: PathBuf,
        args: Vec<String>,
        stop_on_entry: bool,
    },
    Attach {
        language: Language,
        host: String,
        port: u16,
    },
    Break {
        file: PathBuf,
        spec: BreakpointSpec,
    },
    Clear {
        file: PathBuf,
        line: Option<i64>,
    },
    Delete(i64),
    Breakpoints,
    FunctionBreak(Vec<String>),
    Exceptions(Vec<String>),
    Continue(Option<i64>),
    Pause(Option<i64>),
    Step {
        kind: StepKind,
        thread: Option<i64>,
        granularity: Option<String>,
    },
    Wait,
    Threads,
    Stack(Option<i64>),
    Scopes(i64),
    Variables(i64),
    Evaluate {
        expression: String,
        frame: Option<i64>,
    },
    Output,
    State,
    Sessions,
    Use(String),
    Stop,
    Help,
    Quit,
}

/// Parse one prompt line. Blank lines and `#` comments yield `None`.
pub fn parse_line(input: &str) -> Result<Option<Line>, String> {
    let input = input.trim();
    if input.is_empty() || input.starts_with('#') {
        return Ok(None);
    }
    let mut words: Vec<&str> = input.split_whitespace().collect();
    let session = match words.first() {
        Some(w) if w.starts_with('@') => {
            let id = w[1..].to_string();
            if id.is_empty() {
                return Err("expected a session id after '@'".into());
            }
            words.remove(0);
            Some(id)
        }
        _ => None,
    };
    let Some((&name, rest)) = words.split_first() else {
        return Err("missing command".into());
    };
    let command = parse_command(name, rest)?;
    Ok(Some(Line { session, command }))
}

fn parse_command(name: &str, rest: &[&str]) -> Result<Command, String> {
    let command = match name {
        "launch" | "run" => {
            let (stop_on_entry, rest) = match rest.split_first() {
                Some((&"--stop-on-entry", tail)) => (true, tail),
                _ => (false, rest),
            };
            let language = language_arg(rest.first())?;
            let program = rest
                .get(1)
                .ok_or("usage: launch [--stop-on-entry] <language> <program> [args...]")?;
            Command::Launch {
                language,
                program: PathBuf::from(program),
                args: rest[2..].iter().map(|s| s.to_string()).collect(),
                stop_on_entry,
            }
        }
        "attach" => {
            let language = language_arg(rest.first())?;
            let address = rest.get(1).ok_or("usage: attach <language> <host>:<port>")?;
            let (host, port) = address
                .rsplit_once(':')
                .ok_or_else(|| format!("expected <host>:<port>, got {address:?}"))?;
            Command::Attach {
                language,
                host: host.to_string(),
                port: number(port, "port")?,
            }
        }
        "break" | "b" => parse_break(rest)?,
        "clear" => {
            let target = rest.first().ok_or("usage: clear <file>[:<line>]")?;
            match split_location(target) {
                Some((file, line)) => Command::Clear {
                    file,
                    line: Some(line),
                },
                None => Command::Clear {
                    file: PathBuf::from(target),
                    line: None,
                },
            }
        }
        "delete" => Command::Delete(number(
            rest.first().ok_or("usage: delete <breakpoint-id>")?,
            "breakpoint id",
        )?),
        "breakpoints" | "bps" => Command::Breakpoints,
        "fbreak" => Command::FunctionBreak(rest.iter().map(|s| s.to_string()).collect()),
        "exceptions" => Command::Exceptions(rest.iter().map(|s| s.to_string()).collect()),
        "continue" | "c" => Command::Continue(optional_number(rest.first(), "thread id")?),
        "pause" => Command::Pause(optional_number(rest.first(), "thread id")?),
        "next" | "n" => parse_step(StepKind::Over, rest)?,
        "step" | "s" => parse_step(StepKind::Into, rest)?,
        "finish" | "out" => parse_step(StepKind::Out, rest)?,
        "wait" => Command::Wait,
        "threads" => Command::Threads,
        "stack" | "bt" => Command::Stack(optional_number(rest.first(), "thread id")?),
        "scopes" => Command::Scopes(number(
            rest.first().ok_or("usage: scopes <frame-id>")?,
            "frame id",
        )?),
        "vars" | "variables" => Command::Variables(number(
            rest.first().ok_or("usage: vars <variables-reference>")?,
            "variables reference",
        )?),
        "eval" | "p" => {
            let (frame, rest) = match rest {
                [flag, id, tail @ ..] if *flag == "--frame" => (Some(number(id, "frame id")?), tail),
                _ => (None, rest),
            };
            if rest.is_empty() {
                return Err("usage: eval [--frame <id>] <expression>".into());
            }
            Command::Evaluate {
                expression: rest.join(" "),
                frame,
            }
        }
        "output" => Command::Output,
        "state" => Command::State,
        "sessions" => Command::Sessions,
        "use" => Command::Use(rest.first().ok_or("usage: use <session-id>")?.to_string()),
        "stop" | "kill" => Command::Stop,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command {other:?} (try `help`)")),
    };
    Ok(command)
}

fn parse_break(rest: &[&str]) -> Result<Command, String> {
    const USAGE: &str = "usage: break <file>:<line> [if <expr>] [hit <expr>] [log <message>]";
    let (target, mut words) = rest.split_first().ok_or(USAGE)?;
    let (file, line) =
        split_location(target).ok_or_else(|| format!("expected <file>:<line>, got {target:?}"))?;
    let mut spec = BreakpointSpec::new(line);
    while let Some((&keyword, tail)) = words.split_first() {
        // `log` swallows the rest of the line; the others stop at the next keyword.
        if keyword == "log" {
            if tail.is_empty() {
                return Err("log needs a message".into());
            }
            spec = spec.with_log_message(tail.join(" "));
            break;
        }
        let end = tail
            .iter()
            .position(|w| matches!(*w, "if" | "hit" | "log"))
            .unwrap_or(tail.len());
        if end == 0 {
            return Err(format!("{keyword} needs an expression"));
        }
        let text = tail[..end].join(" ");
        spec = match keyword {
            "if" => spec.with_condition(text),
            "hit" => spec.with_hit_condition(text),
            other => return Err(format!("unexpected {other:?}; {USAGE}")),
        };
        words = &tail[end..];
    }
    Ok(Command::Break { file, spec })
}

fn parse_step(kind: StepKind, rest: &[&str]) -> Result<Command, String> {
    let (granularity, rest) = match rest {
        [flag, value, tail @ ..] if *flag == "--granularity" => (Some(value.to_string()), tail),
        _ => (None, rest),
    };
    Ok(Command::Step {
        kind,
        thread: optional_number(rest.first(), "thread id")?,
        granularity,
    })
}

fn split_location(target: &str) -> Option<(PathBuf, i64)> {
    let (file, line) = target.rsplit_once(':')?;
    let line = line.parse().ok()?;
    (!file.is_empty()).then(|| (PathBuf::from(file), line))
}

fn language_arg(word: Option<&&str>) -> Result<Language, String> {
    let word = word.ok_or("expected a language (python, javascript, java)")?;
    word.parse::<Language>().map_err(|e| e.to_string())
}

fn number<T: std::str::FromStr>(word: &str, what: &str) -> Result<T, String> {
    word.parse()
        .map_err(|_| format!("expected a {what}, got {word:?}"))
}

fn optional_number(word: Option<&&str>, what: &str) -> Result<Option<i64>, String> {
    word.map(|w| number(w, what)).transpose()
}

pub const HELP: &str = "\
launch [--stop-on-entry] <language> <program> [args...]
attach <language> <host>:<port>
break <file>:<line> [if <expr>] [hit <expr>] [log <message>]
clear <file>[:<line>]    delete <breakpoint-id>    breakpoints
fbreak <name>...         exceptions <filter>...
continue [thread]        pause [thread]            wait
next|step|finish [--granularity statement|line|instruction] [thread]
threads    stack [thread]    scopes <frame-id>    vars <ref>
eval [--frame <id>] <expression>
output    state    sessions    use <session-id>    stop    quit
Prefix any command with @<session-id> to target a specific session.";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Line {
        parse_line(input).unwrap().unwrap()
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# setup").unwrap(), None);
    }

    #[test]
    fn launch_collects_program_arguments() {
        let line = parse("launch --stop-on-entry py app.py --fast 3");
        assert_eq!(
            line.command,
            Command::Launch {
                language: Language::Python,
                program: PathBuf::from("app.py"),
                args: vec!["--fast".into(), "3".into()],
                stop_on_entry: true,
            }
        );
        assert_eq!(line.session, None);
    }

    #[test]
    fn session_prefix_targets_a_session() {
        let line = parse("@python-2 continue 4");
        assert_eq!(line.session.as_deref(), Some("python-2"));
        assert_eq!(line.command, Command::Continue(Some(4)));
        assert!(parse_line("@ continue").is_err());
    }

    #[test]
    fn break_with_condition_and_hit_condition() {
        let line = parse("break src/app.py:12 if x > 3 hit >= 2");
        let Command::Break { file, spec } = line.command else {
            panic!("expected a break command");
        };
        assert_eq!(file, PathBuf::from("src/app.py"));
        assert_eq!(spec.line, 12);
        assert_eq!(spec.condition.as_deref(), Some("x > 3"));
        assert_eq!(spec.hit_condition.as_deref(), Some(">= 2"));
        assert_eq!(spec.log_message, None);
    }

    #[test]
    fn logpoint_message_takes_the_rest_of_the_line() {
        let line = parse("b app.js:4 log value is {x} if ignored");
        let Command::Break { spec, .. } = line.command else {
            panic!("expected a break command");
        };
        assert_eq!(spec.log_message.as_deref(), Some("value is {x} if ignored"));
        assert_eq!(spec.condition, None);
    }

    #[test]
    fn break_rejects_missing_line() {
        assert!(parse_line("break app.py").is_err());
        assert!(parse_line("break app.py:7 if").is_err());
    }

    #[test]
    fn attach_splits_host_and_port() {
        assert_eq!(
            parse("attach java localhost:5005").command,
            Command::Attach {
                language: Language::Java,
                host: "localhost".into(),
                port: 5005,
            }
        );
        assert!(parse_line("attach java localhost").is_err());
    }

    #[test]
    fn step_accepts_granularity_and_thread() {
        assert_eq!(
            parse("next --granularity instruction 2").command,
            Command::Step {
                kind: StepKind::Over,
                thread: Some(2),
                granularity: Some("instruction".into()),
            }
        );
        assert_eq!(
            parse("finish").command,
            Command::Step {
                kind: StepKind::Out,
                thread: None,
                granularity: None,
            }
        );
    }

    #[test]
    fn eval_joins_the_expression() {
        assert_eq!(
            parse("eval --frame 100 a + b").command,
            Command::Evaluate {
                expression: "a + b".into(),
                frame: Some(100),
            }
        );
        assert!(parse_line("eval").is_err());
    }

    #[test]
    fn clear_with_and_without_line() {
        assert_eq!(
            parse("clear app.py:3").command,
            Command::Clear {
                file: PathBuf::from("app.py"),
                line: Some(3),
            }
        );
        assert_eq!(
            parse("clear app.py").command,
            Command::Clear {
                file: PathBuf::from("app.py"),
                line: None,
            }
        );
    }

    #[test]
    fn unknown_commands_and_languages_are_errors() {
        assert!(parse_line("frobnicate").unwrap_err().contains("unknown command"));
        assert!(parse_line("launch cobol main.cbl").is_err());
        assert!(parse_line("continue first").is_err());
    }
}
