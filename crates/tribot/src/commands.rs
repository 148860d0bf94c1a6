//! REPL input parsing

use std::path::PathBuf;

pub const HELP: &str = "\
Commands:
  /new                 start a new conversation
  /lang <language>     change preferred language (english, arabic, hindi, bangla, tamil)
  /transcribe <file>   transcribe a WAV recording and send it
  /stop                halt the assistant immediately
  /quit                exit
Anything else is sent to the assistant as a patient message.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message(String),
    New,
    Lang(String),
    Transcribe(PathBuf),
    Stop,
    Quit,
    Help,
    Empty,
    /// Known command with a missing argument, or an unknown command
    Invalid(String),
}

pub fn parse(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if !line.starts_with('/') {
        return Command::Message(line.to_string());
    }

    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (line, ""),
    };

    match (name, arg) {
        ("/new", _) => Command::New,
        ("/stop", _) => Command::Stop,
        ("/quit" | "/exit", _) => Command::Quit,
        ("/help", _) => Command::Help,
        ("/lang", "") => Command::Invalid("usage: /lang <language>".into()),
        ("/lang", lang) => Command::Lang(lang.to_lowercase()),
        ("/transcribe", "") => Command::Invalid("usage: /transcribe <file.wav>".into()),
        ("/transcribe", path) => Command::Transcribe(PathBuf::from(path)),
        (other, _) => Command::Invalid(format!("unknown command {other}, try /help")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_message() {
        assert_eq!(
            parse("  I have a fever  "),
            Command::Message("I have a fever".into())
        );
        assert_eq!(parse("   "), Command::Empty);
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse("/new"), Command::New);
        assert_eq!(parse("/stop"), Command::Stop);
        assert_eq!(parse("/quit"), Command::Quit);
        assert_eq!(parse("/lang Tamil"), Command::Lang("tamil".into()));
        assert_eq!(
            parse("/transcribe /tmp/clip one.wav"),
            Command::Transcribe(PathBuf::from("/tmp/clip one.wav"))
        );
    }

    #[test]
    fn test_invalid_commands() {
        assert!(matches!(parse("/lang"), Command::Invalid(_)));
        assert!(matches!(parse("/transcribe   "), Command::Invalid(_)));
        assert!(matches!(parse("/dance"), Command::Invalid(_)));
    }
}
