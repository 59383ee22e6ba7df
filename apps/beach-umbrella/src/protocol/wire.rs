//! JSON framing for backend traffic: each text frame carries one instruction
//! or a batch of them; commands go out one per frame.

use serde::Deserialize;

use super::{BackendInstruction, ClientCommand};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed backend message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("empty backend message")]
    Empty,
}

/// The backend either sends a single instruction or a batch of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum InboundMessage {
    Batch(Vec<BackendInstruction>),
    Single(BackendInstruction),
}

/// Decodes one inbound text frame into the instructions it carries, in order.
pub fn decode_instructions(text: &str) -> Result<Vec<BackendInstruction>, WireError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(WireError::Empty);
    }
    match serde_json::from_str::<InboundMessage>(trimmed) {
        Ok(InboundMessage::Batch(batch)) => Ok(batch),
        Ok(InboundMessage::Single(instruction)) => Ok(vec![instruction]),
        // untagged enums swallow the underlying error; decode again for a useful message
        Err(_) => {
            let single = serde_json::from_str::<BackendInstruction>(trimmed)?;
            Ok(vec![single])
        }
    }
}

pub fn encode_command(command: &ClientCommand) -> Result<String, WireError> {
    Ok(serde_json::to_string(command)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::KeyDescriptor;
    use serde_json::json;

    #[test_timeout::timeout]
    fn decodes_single_instruction() {
        let decoded = decode_instructions(r#"{"op":"setLine","line":3,"content":"abc"}"#).unwrap();
        assert_eq!(
            decoded,
            vec![BackendInstruction::SetLine {
                line: 3,
                content: "abc".into()
            }]
        );
    }

    #[test_timeout::timeout]
    fn decodes_batches_in_order() {
        let text = r#"[
            {"op":"appendLine","content":"one"},
            {"op":"removeLastLine"},
            {"op":"insertFrame","line":0,"id":"f1","source":"http://f1.localhost/"},
            {"op":"setApplicationMode","enabled":true}
        ]"#;
        let decoded = decode_instructions(text).unwrap();
        let ops: Vec<&str> = decoded.iter().map(BackendInstruction::op).collect();
        assert_eq!(
            ops,
            vec!["appendLine", "removeLastLine", "insertFrame", "setApplicationMode"]
        );
    }

    #[test_timeout::timeout]
    fn rejects_unknown_ops_and_blank_frames() {
        let err = decode_instructions(r#"{"op":"eval","code":"alert(1)"}"#).unwrap_err();
        assert!(matches!(err, WireError::Malformed(_)), "{err}");
        assert!(matches!(decode_instructions("  "), Err(WireError::Empty)));
    }

    #[test_timeout::timeout]
    fn commands_use_kebab_case_tags() {
        let resize = encode_command(&ClientCommand::Resize { cols: 80, lines: 24 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&resize).unwrap();
        assert_eq!(value, json!({"cmd": "resize", "cols": 80, "lines": 24}));

        let evict = encode_command(&ClientCommand::RemoveHistory { count: 7 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&evict).unwrap();
        assert_eq!(value, json!({"cmd": "remove-history", "count": 7}));

        let key = KeyDescriptor {
            code: 38,
            name: Some("Up".into()),
            string: None,
            shift: false,
            alt: false,
            control: false,
            chord: "up".into(),
        };
        let press = encode_command(&ClientCommand::Keypress { key }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&press).unwrap();
        assert_eq!(value["cmd"], "keypress");
        assert_eq!(value["key"]["name"], "Up");
        assert_eq!(value["key"]["chord"], "up");
    }
}
