//! Text encoding of customized commands inside notebook blocks.
//!
//! ~~~text
//! [[local-telegram-bot/run]] greet name {{renderer :local_telegram_bot-debugCmd}}
//! ```js
//! return "hi " + name;
//! ```
//! Says hi
//! ~~~

use crate::command::{Command, CommandKind, DEBUG_MARKER};
use crate::error::DecodeError;

const FENCE: &str = "```";

/// Parse a block's text into a command.
pub fn decode(text: &str) -> Result<Command, DecodeError> {
    let (kind, rest) = CommandKind::ALL
        .iter()
        .find_map(|kind| text.strip_prefix(kind.prefix().as_str()).map(|rest| (*kind, rest)))
        .ok_or(DecodeError::UnknownPrefix)?;

    let segments: Vec<&str> = rest.split(FENCE).collect();
    if segments.len() < 2 {
        return Err(DecodeError::MissingFence);
    }

    let signature = segments[0].trim();
    let signature = signature
        .strip_suffix(DEBUG_MARKER)
        .map(str::trim)
        .unwrap_or(signature);

    let mut tokens = signature.split_whitespace();
    let name = tokens.next().ok_or(DecodeError::EmptyName)?;
    let params = tokens.map(str::to_string).collect();

    // The fence's opening line carries the language tag.
    let script = segments[1]
        .split_once('\n')
        .map(|(_, body)| body.trim())
        .unwrap_or_default();

    let description = segments.get(2).map(|s| s.trim()).unwrap_or_default();

    Ok(Command {
        kind,
        name: name.to_string(),
        params,
        script: script.to_string(),
        description: description.to_string(),
    })
}

/// Serialize a command to block text; the inverse of [`decode`].
pub fn encode(command: &Command) -> String {
    let mut signature = command.name.clone();
    for param in &command.params {
        signature.push(' ');
        signature.push_str(param);
    }
    format!(
        "{prefix} {signature} {DEBUG_MARKER}\n{FENCE}{language}\n{script}\n{FENCE}\n{description}\n",
        prefix = command.kind.prefix(),
        language = command.kind.language(),
        script = command.script,
        description = command.description,
    )
}

/// Skeleton inserted by the "define customized command" slash commands.
pub fn slash_template(kind: CommandKind) -> String {
    format!(
        "{prefix} name param0 param1 {DEBUG_MARKER}\n{FENCE}{language}\n{FENCE}\ndescription",
        prefix = kind.prefix(),
        language = kind.language(),
    )
}

/// Whether `text` starts with a catalog link (`[[local-telegram-bot/query]]` ...).
pub fn has_catalog_prefix(text: &str) -> bool {
    CommandKind::ALL
        .iter()
        .any(|kind| text.starts_with(kind.prefix().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_query_scenario() {
        let text = "[[local-telegram-bot/query]] listTodos\n```clojure\n[:find ...]\n```\nLists todos";
        let cmd = decode(text).unwrap();
        assert_eq!(
            cmd,
            Command::new(CommandKind::Query, "listTodos", "[:find ...]").with_description("Lists todos")
        );
    }

    #[test]
    fn test_decode_strips_debug_marker() {
        let text = "[[local-telegram-bot/run]]  greet name title {{renderer :local_telegram_bot-debugCmd}}\n```js\nreturn name;\n```";
        let cmd = decode(text).unwrap();
        assert_eq!(cmd.kind, CommandKind::Run);
        assert_eq!(cmd.name, "greet");
        assert_eq!(cmd.params, vec!["name", "title"]);
        assert_eq!(cmd.script, "return name;");
        assert_eq!(cmd.description, "");
    }

    #[test]
    fn test_decode_multiline_script() {
        let text = "[[local-telegram-bot/run]] calc a b\n```js\nconst s = a + b;\n\nreturn s;\n```\n  Adds  \n";
        let cmd = decode(text).unwrap();
        assert_eq!(cmd.script, "const s = a + b;\n\nreturn s;");
        assert_eq!(cmd.description, "Adds");
    }

    #[test]
    fn test_decode_unknown_prefix() {
        assert_eq!(decode("hello"), Err(DecodeError::UnknownPrefix));
        assert_eq!(
            decode("[[local-telegram-bot/other]] x\n```js\n```"),
            Err(DecodeError::UnknownPrefix)
        );
        assert_eq!(
            decode(" [[local-telegram-bot/run]] x\n```js\n```"),
            Err(DecodeError::UnknownPrefix)
        );
    }

    #[test]
    fn test_decode_missing_fence() {
        assert_eq!(
            decode("[[local-telegram-bot/run]] greet name"),
            Err(DecodeError::MissingFence)
        );
    }

    #[test]
    fn test_decode_single_fence_is_enough() {
        let cmd = decode("[[local-telegram-bot/run]] greet ```js\nreturn 1;").unwrap();
        assert_eq!(cmd.script, "return 1;");
    }

    #[test]
    fn test_decode_empty_name() {
        assert_eq!(
            decode("[[local-telegram-bot/run]] {{renderer :local_telegram_bot-debugCmd}}\n```js\nx\n```"),
            Err(DecodeError::EmptyName)
        );
    }

    #[test]
    fn test_decode_fence_without_newline() {
        let cmd = decode("[[local-telegram-bot/query]] q\n```clojure```").unwrap();
        assert_eq!(cmd.script, "");
    }

    #[test]
    fn test_encode_shape() {
        let cmd = Command::new(CommandKind::Run, "greet", "return \"hi \" + name;")
            .with_params(["name"])
            .with_description("Says hi");
        assert_eq!(
            encode(&cmd),
            "[[local-telegram-bot/run]] greet name {{renderer :local_telegram_bot-debugCmd}}\n```js\nreturn \"hi \" + name;\n```\nSays hi\n"
        );
    }

    #[test]
    fn test_roundtrip() {
        let commands = vec![
            Command::new(CommandKind::Query, "listTodos", "[:find (pull ?b [*])\n :where [?b :block/marker \"TODO\"]]")
                .with_description("Lists todos"),
            Command::new(CommandKind::Run, "greet", "return \"hi \" + name;").with_params(["name"]),
            Command::new(CommandKind::Run, "multi", "const a = 1;\n\n// comment\nreturn a;")
                .with_params(["x", "y", "z"])
                .with_description("line one\nline two"),
            Command::new(CommandKind::Query, "empty", ""),
        ];
        for cmd in commands {
            assert_eq!(decode(&encode(&cmd)), Ok(cmd.clone()), "roundtrip of {}", cmd.name);
        }
    }

    #[test]
    fn test_slash_template() {
        assert_eq!(
            slash_template(CommandKind::Query),
            "[[local-telegram-bot/query]] name param0 param1 {{renderer :local_telegram_bot-debugCmd}}\n```clojure\n```\ndescription"
        );
        let skeleton = decode(&slash_template(CommandKind::Run)).unwrap();
        assert_eq!(skeleton.name, "name");
        assert_eq!(skeleton.params, vec!["param0", "param1"]);
        assert_eq!(skeleton.script, "");
    }

    #[test]
    fn test_has_catalog_prefix() {
        assert!(has_catalog_prefix("[[local-telegram-bot/run]] x"));
        assert!(!has_catalog_prefix("see [[local-telegram-bot/run]]"));
    }
}
