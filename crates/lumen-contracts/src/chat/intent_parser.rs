use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, MULTI_PATH_COMMANDS, NO_ARG_COMMANDS, RAW_ARG_COMMANDS, SINGLE_PATH_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn arg_list(&self, key: &str) -> Vec<String> {
        self.command_args
            .get(key)
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn find_spec<'a>(command: &str, specs: &'a [CommandSpec]) -> Option<&'a CommandSpec> {
    specs.iter().find(|spec| spec.command == command)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

/// Turns one line of chat input into an intent. Anything that is not a
/// slash command is a `submit` carrying the trimmed text as `prompt`.
pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(spec) = find_spec(&command, RAW_ARG_COMMANDS) {
                let mut intent = Intent::new(spec.action, text);
                intent
                    .command_args
                    .insert(spec.arg_key.to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(spec) = find_spec(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(spec.action, text);
                intent.command_args.insert(
                    spec.arg_key.to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if let Some(spec) = find_spec(&command, MULTI_PATH_COMMANDS) {
                let mut intent = Intent::new(spec.action, text);
                intent.command_args.insert(
                    spec.arg_key.to_string(),
                    Value::Array(
                        parse_path_args(arg)
                            .into_iter()
                            .map(Value::String)
                            .collect(),
                    ),
                );
                return intent;
            }

            if let Some(spec) = find_spec(&command, NO_ARG_COMMANDS) {
                return Intent::new(spec.action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("submit", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn plain_text_is_a_submission() {
        let intent = parse_intent("  a cat astronaut  ");
        assert_eq!(intent.action, "submit");
        assert_eq!(intent.prompt.as_deref(), Some("a cat astronaut"));
    }

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn parse_attach_quoted_paths() {
        let intent = parse_intent("/attach \"/tmp/a b.png\" c.jpg");
        assert_eq!(intent.action, "attach");
        assert_eq!(intent.command_args["paths"], json!(["/tmp/a b.png", "c.jpg"]));
        assert_eq!(intent.arg_list("paths").len(), 2);
    }

    #[test]
    fn parse_raw_arg_commands() {
        let ratio = parse_intent("/ratio 16:9");
        assert_eq!(ratio.action, "set_aspect_ratio");
        assert_eq!(ratio.arg_str("ratio"), Some("16:9"));

        let size = parse_intent("/size 4K");
        assert_eq!(size.action, "set_image_size");
        assert_eq!(size.arg_str("size"), Some("4K"));

        let model = parse_intent("/image_model gemini-2.5-flash-image");
        assert_eq!(model.action, "set_image_model");
        assert_eq!(model.command_args["model"], json!("gemini-2.5-flash-image"));

        let show = parse_intent("/show");
        assert_eq!(show.action, "show_payload");
        assert_eq!(show.arg_str("index"), None);
    }

    #[test]
    fn parse_save_path() {
        let intent = parse_intent("  /save   /tmp/out dir/poster.png  ");
        assert_eq!(intent.action, "save_image");
        assert_eq!(intent.command_args["path"], json!("/tmp/out dir/poster.png"));
    }

    #[test]
    fn parse_no_arg_commands_and_aliases() {
        assert_eq!(parse_intent("/help").action, "help");
        assert_eq!(parse_intent("/DETACH").action, "detach");
        assert_eq!(parse_intent("/exit").action, "quit");
        assert_eq!(parse_intent("/connect").action, "connect");
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }

    #[test]
    fn lone_slash_is_submitted_as_text() {
        let intent = parse_intent("/ 2 halves");
        assert_eq!(intent.action, "submit");
    }
}
