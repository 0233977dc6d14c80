use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, BRAND_ADD_COMMAND, EXPORT_COMMAND, NO_ARG_COMMANDS, SINGLE_ARG_COMMANDS,
    TEXT_ARG_COMMANDS,
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
        self.command_args.get(key).and_then(Value::as_str)
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn split_args(arg: &str) -> Vec<String> {
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

fn parse_single_arg(arg: &str) -> String {
    let parts = split_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

// `/brand_add <kind> <name> <value...>`; quoted names keep their spaces.
fn parse_brand_add(arg: &str, intent: &mut Intent) {
    let mut parts = split_args(arg).into_iter();
    let kind = parts.next().unwrap_or_default();
    let name = parts.next().unwrap_or_default();
    let value = parts.collect::<Vec<String>>().join(" ");
    intent
        .command_args
        .insert("kind".to_string(), Value::String(kind));
    intent
        .command_args
        .insert("name".to_string(), Value::String(name));
    intent
        .command_args
        .insert("value".to_string(), Value::String(value));
}

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
            let remainder = &slash_tail[command_len..];
            let arg = remainder.trim();

            if let Some(action) = find_action(&command, TEXT_ARG_COMMANDS) {
                let mut intent = Intent::new(action, text);
                if !arg.is_empty() {
                    intent.prompt = Some(arg.to_string());
                }
                return intent;
            }

            if let Some(action) = find_action(&command, SINGLE_ARG_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent
                    .command_args
                    .insert("id".to_string(), Value::String(parse_single_arg(arg)));
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            if command == BRAND_ADD_COMMAND.command {
                let mut intent = Intent::new(BRAND_ADD_COMMAND.action, text);
                parse_brand_add(arg, &mut intent);
                return intent;
            }

            if command == EXPORT_COMMAND.command {
                let mut intent = Intent::new(EXPORT_COMMAND.action, text);
                let dir = parse_single_arg(arg);
                intent.command_args.insert(
                    "dir".to_string(),
                    Value::String(if dir.is_empty() { ".".to_string() } else { dir }),
                );
                return intent;
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

    let mut intent = Intent::new("generate", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn free_text_is_a_generate_prompt() {
        let intent = parse_intent("  red wool coat  ");
        assert_eq!(intent.action, "generate");
        assert_eq!(intent.prompt.as_deref(), Some("red wool coat"));
    }

    #[test]
    fn blank_input_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn edit_keeps_instruction_verbatim() {
        let intent = parse_intent("/edit add gold buttons, \"shorter\" sleeves");
        assert_eq!(intent.action, "edit");
        assert_eq!(
            intent.prompt.as_deref(),
            Some("add gold buttons, \"shorter\" sleeves")
        );
        assert_eq!(parse_intent("/edit").prompt, None);
    }

    #[test]
    fn navigation_commands() {
        assert_eq!(parse_intent("/workspace").action, "show_workspace");
        assert_eq!(parse_intent("/new").action, "new_design");
        assert_eq!(parse_intent("/Trends").action, "show_trends");
        assert_eq!(parse_intent("/production").action, "show_production");
        assert_eq!(parse_intent("/exit").action, "quit");

        let open = parse_intent("/open 1760000000000-abcd1234");
        assert_eq!(open.action, "open_design");
        assert_eq!(open.command_args["id"], json!("1760000000000-abcd1234"));
    }

    #[test]
    fn brand_add_splits_kind_name_and_value() {
        let intent = parse_intent("/brand_add color \"Signal Red\" #d62828");
        assert_eq!(intent.action, "add_brand");
        assert_eq!(intent.arg_str("kind"), Some("color"));
        assert_eq!(intent.arg_str("name"), Some("Signal Red"));
        assert_eq!(intent.arg_str("value"), Some("#d62828"));

        let fit = parse_intent("/brand_add fit Boxy cropped body, dropped shoulder");
        assert_eq!(fit.arg_str("name"), Some("Boxy"));
        assert_eq!(fit.arg_str("value"), Some("cropped body, dropped shoulder"));
    }

    #[test]
    fn export_defaults_to_current_dir() {
        assert_eq!(parse_intent("/export").command_args["dir"], json!("."));
        assert_eq!(
            parse_intent("/export \"/tmp/out dir\"").command_args["dir"],
            json!("/tmp/out dir")
        );
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
