//! JSON codec for commands and replies.
//!
//! Replies do not carry their command's action, so decoding is directed by
//! the [`CommandKind`] that was sent. Optional fields the server leaves out
//! decode to empty values; only input that is not a record of the expected
//! shape is an error.

use crate::message::{Command, CommandKind};
use crate::response::{Assignment, MessageTime, PrivateMessage, Response, Status, TimelinePost};
use serde::Deserialize;
use serde_json::Value;

/// A payload that could not be mapped to or from a record.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to encode {kind} command: {source}")]
    Encode {
        kind: CommandKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed {kind} reply: {source}")]
    Malformed {
        kind: CommandKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("{kind} reply is not {expected}")]
    UnexpectedShape {
        kind: CommandKind,
        expected: &'static str,
    },
    #[error("{kind} reply is missing field `{field}`")]
    MissingField {
        kind: CommandKind,
        field: &'static str,
    },
}

/// Fields any reply object may carry.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    ret: Option<i64>,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    mensagens: Option<Vec<Value>>,
}

/// Encode a command for the request-reply channel.
pub fn encode(command: &Command) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(command).map_err(|source| ProtocolError::Encode {
        kind: command.kind(),
        source,
    })
}

/// Decode the reply to a command of the given kind.
pub fn decode(kind: CommandKind, bytes: &[u8]) -> Result<Response, ProtocolError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|source| ProtocolError::Malformed { kind, source })?;

    if kind == CommandKind::GetTimeline && value.is_array() {
        let posts: Vec<TimelinePost> =
            serde_json::from_value(value).map_err(|source| ProtocolError::Malformed { kind, source })?;
        return Ok(Response::Timeline {
            status: Status::Ok,
            posts,
        });
    }

    if !value.is_object() {
        let expected = match kind {
            CommandKind::GetTimeline => "a list of posts",
            _ => "an object",
        };
        return Err(ProtocolError::UnexpectedShape { kind, expected });
    }
    let envelope: Envelope =
        serde_json::from_value(value).map_err(|source| ProtocolError::Malformed { kind, source })?;
    let status = Status::from_code(envelope.ret);

    let response = match kind {
        CommandKind::Register => {
            let assignment = if status.is_ok() {
                Some(Assignment {
                    id: envelope
                        .id
                        .ok_or(ProtocolError::MissingField { kind, field: "id" })?,
                    topic: envelope
                        .topic
                        .ok_or(ProtocolError::MissingField { kind, field: "topic" })?,
                })
            } else {
                None
            };
            Response::Register { status, assignment }
        }
        CommandKind::PostText => Response::PostText {
            status,
            message: envelope.msg,
        },
        CommandKind::Follow => Response::Follow { status },
        CommandKind::SendPrivateMessage => Response::SendPrivateMessage { status },
        CommandKind::GetPrivateMessages => Response::PrivateMessages {
            status,
            messages: envelope
                .mensagens
                .unwrap_or_default()
                .iter()
                .filter_map(private_message)
                .collect(),
        },
        // A failing server answers the timeline query with a status object.
        CommandKind::GetTimeline => Response::Timeline {
            status,
            posts: Vec::new(),
        },
    };
    Ok(response)
}

/// `[text, timestamp, sender]`; any other arity is skipped.
fn private_message(entry: &Value) -> Option<PrivateMessage> {
    let [text, sent_at, sender] = entry.as_array()?.as_slice() else {
        return None;
    };
    Some(PrivateMessage {
        text: text_of(text),
        sent_at: message_time(sent_at),
        sender: text_of(sender),
    })
}

fn message_time(value: &Value) -> MessageTime {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    match parsed {
        Some(secs) => MessageTime::Epoch(secs),
        None => MessageTime::Malformed(text_of(value)),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_ok_carries_assignment() {
        let reply = br#"{"ret": 0, "id": 4, "topic": "notificacao_user_4"}"#;
        let response = decode(CommandKind::Register, reply).unwrap();
        assert_eq!(
            response,
            Response::Register {
                status: Status::Ok,
                assignment: Some(Assignment {
                    id: 4,
                    topic: "notificacao_user_4".into(),
                }),
            }
        );
    }

    #[test]
    fn register_rejection_needs_no_assignment() {
        let response = decode(CommandKind::Register, br#"{"ret": 1}"#).unwrap();
        assert_eq!(
            response,
            Response::Register {
                status: Status::Error(1),
                assignment: None,
            }
        );
    }

    #[test]
    fn register_ok_without_topic_is_an_error() {
        let err = decode(CommandKind::Register, br#"{"ret": 0, "id": 4}"#).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MissingField { field: "topic", .. }
        ));
    }

    #[test]
    fn follow_not_found() {
        let response = decode(CommandKind::Follow, br#"{"ret": 2}"#).unwrap();
        assert_eq!(response.status(), Status::NotFound);
    }

    #[test]
    fn missing_messages_decode_empty() {
        let response = decode(CommandKind::GetPrivateMessages, br#"{"ret": 0}"#).unwrap();
        assert_eq!(
            response,
            Response::PrivateMessages {
                status: Status::Ok,
                messages: Vec::new(),
            }
        );
    }

    #[test]
    fn messages_accept_numeric_and_string_timestamps() {
        let reply = br#"{"ret": 0, "mensagens": [
            ["hi", 1700000000, "alice"],
            ["yo", "1700000060", "bob"],
            ["??", "soon", "bob"],
            ["short", 1]
        ]}"#;
        let Response::PrivateMessages { messages, .. } =
            decode(CommandKind::GetPrivateMessages, reply).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].sent_at, MessageTime::Epoch(1_700_000_000));
        assert_eq!(messages[1].sent_at, MessageTime::Epoch(1_700_000_060));
        assert_eq!(messages[1].sender, "bob");
        assert_eq!(messages[2].sent_at, MessageTime::Malformed("soon".into()));
    }

    #[test]
    fn timeline_is_a_bare_list() {
        let reply = br#"[
            {"username": "alice", "texto": "first", "tempoEnvioMensagem": "2024-05-01T10:00:00", "id": 1},
            {"username": "bob", "texto": "second"}
        ]"#;
        let Response::Timeline { status, posts } =
            decode(CommandKind::GetTimeline, reply).unwrap()
        else {
            panic!("wrong variant");
        };
        assert!(status.is_ok());
        assert_eq!(posts[0].author, "alice");
        assert_eq!(posts[1].text, "second");
        assert_eq!(posts[1].sent_at, "");
    }

    #[test]
    fn timeline_failure_object() {
        let response = decode(CommandKind::GetTimeline, br#"{"ret": -1, "msg": "boom"}"#).unwrap();
        assert_eq!(response.status(), Status::Error(-1));
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        let err = decode(CommandKind::Follow, b"not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { .. }));

        let err = decode(CommandKind::Follow, b"[1, 2]").unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedShape { .. }));
    }

    #[test]
    fn encode_is_json() {
        let bytes = encode(&Command::GetTimeline).unwrap();
        assert_eq!(bytes, br#"{"action":"get_timeline"}"#);
    }
}
