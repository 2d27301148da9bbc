//! Switcher wire protocol (OBS-WebSocket v5)
//!
//! Every message is a JSON text frame `{"op": <opcode>, "d": {...}}`. Field
//! names inside `d` are camelCase.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// Protocol version sent in `Identify`
pub const RPC_VERSION: u32 = 1;

/// WebSocket close code used by the server when authentication fails
pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4009;

/// Message opcodes
pub mod op {
    pub const HELLO: u8 = 0;
    pub const IDENTIFY: u8 = 1;
    pub const IDENTIFIED: u8 = 2;
    pub const EVENT: u8 = 5;
    pub const REQUEST: u8 = 6;
    pub const REQUEST_RESPONSE: u8 = 7;
}

/// Request type names used by the client
pub mod request {
    pub const GET_SCENE_LIST: &str = "GetSceneList";
    pub const SET_CURRENT_PROGRAM_SCENE: &str = "SetCurrentProgramScene";
    pub const GET_RECORD_STATUS: &str = "GetRecordStatus";
    pub const GET_STREAM_STATUS: &str = "GetStreamStatus";
    pub const START_RECORD: &str = "StartRecord";
    pub const STOP_RECORD: &str = "StopRecord";
    pub const START_STREAM: &str = "StartStream";
    pub const STOP_STREAM: &str = "StopStream";
    pub const SET_INPUT_MUTE: &str = "SetInputMute";
    pub const GET_SCENE_ITEM_ID: &str = "GetSceneItemId";
    pub const SET_SCENE_ITEM_ENABLED: &str = "SetSceneItemEnabled";
}

/// Event type names the client reacts to
pub mod event {
    pub const CURRENT_PROGRAM_SCENE_CHANGED: &str = "CurrentProgramSceneChanged";
    pub const SCENE_LIST_CHANGED: &str = "SceneListChanged";
    pub const SCENE_CREATED: &str = "SceneCreated";
    pub const SCENE_REMOVED: &str = "SceneRemoved";
    pub const SCENE_NAME_CHANGED: &str = "SceneNameChanged";
    pub const RECORD_STATE_CHANGED: &str = "RecordStateChanged";
    pub const STREAM_STATE_CHANGED: &str = "StreamStateChanged";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope<T> {
    op: u8,
    d: T,
}

/// Authentication challenge carried by `Hello`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

/// Op 0, server -> client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub obs_web_socket_version: Option<String>,
    #[serde(default = "default_rpc_version")]
    pub rpc_version: u32,
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

fn default_rpc_version() -> u32 {
    RPC_VERSION
}

/// Op 1, client -> server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
}

/// Op 2, server -> client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    #[serde(default = "default_rpc_version")]
    pub negotiated_rpc_version: u32,
}

/// Op 5, server -> client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    #[serde(default)]
    pub event_data: Value,
}

/// Op 6, client -> server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_type: String,
    pub request_id: String,
    pub request_data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    #[serde(default)]
    pub code: Option<u32>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Op 7, server -> client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    #[serde(default)]
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Option<Value>,
}

/// Decoded server message
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Hello(Hello),
    Identified(Identified),
    Event(Event),
    RequestResponse(RequestResponse),
    /// Opcode this client does not handle (e.g. batch responses)
    Other(u8),
}

/// Decode a text frame received from the server
pub fn decode(text: &str) -> Result<ServerMessage> {
    let envelope: Envelope<Value> = serde_json::from_str(text)?;
    let message = match envelope.op {
        op::HELLO => ServerMessage::Hello(serde_json::from_value(envelope.d)?),
        op::IDENTIFIED => ServerMessage::Identified(serde_json::from_value(envelope.d)?),
        op::EVENT => ServerMessage::Event(serde_json::from_value(envelope.d)?),
        op::REQUEST_RESPONSE => {
            ServerMessage::RequestResponse(serde_json::from_value(envelope.d)?)
        }
        op::IDENTIFY | op::REQUEST => {
            return Err(AppError::Protocol(format!(
                "Unexpected client opcode {} from server",
                envelope.op
            )))
        }
        other => ServerMessage::Other(other),
    };
    Ok(message)
}

pub fn encode_identify(identify: &Identify) -> Result<String> {
    Ok(serde_json::to_string(&Envelope {
        op: op::IDENTIFY,
        d: identify,
    })?)
}

pub fn encode_request(request: &Request) -> Result<String> {
    Ok(serde_json::to_string(&Envelope {
        op: op::REQUEST,
        d: request,
    })?)
}

/// Scene names from a `GetSceneList` response or `SceneListChanged` event,
/// in the order the server reports them
pub fn scene_names(data: &Value) -> Vec<String> {
    data.get("scenes")
        .and_then(Value::as_array)
        .map(|scenes| {
            scenes
                .iter()
                .filter_map(|s| s.get("sceneName").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_hello_with_auth() {
        let text = r#"{"op":0,"d":{"obsWebSocketVersion":"5.1.0","rpcVersion":1,
            "authentication":{"challenge":"abc","salt":"xyz"}}}"#;
        match decode(text).unwrap() {
            ServerMessage::Hello(hello) => {
                assert_eq!(hello.rpc_version, 1);
                assert_eq!(
                    hello.authentication,
                    Some(AuthChallenge {
                        challenge: "abc".to_string(),
                        salt: "xyz".to_string()
                    })
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_response() {
        let text = r#"{"op":7,"d":{"requestType":"StartRecord","requestId":"r1",
            "requestStatus":{"result":false,"code":500,"comment":"Output already active"}}}"#;
        match decode(text).unwrap() {
            ServerMessage::RequestResponse(resp) => {
                assert_eq!(resp.request_id, "r1");
                assert!(!resp.request_status.result);
                assert_eq!(
                    resp.request_status.comment.as_deref(),
                    Some("Output already active")
                );
                assert!(resp.response_data.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_and_invalid() {
        assert_eq!(
            decode(r#"{"op":9,"d":{}}"#).unwrap(),
            ServerMessage::Other(9)
        );
        assert!(decode(r#"{"op":6,"d":{}}"#).is_err());
        assert!(decode("not json").is_err());
    }

    #[test]
    fn test_encode_identify_omits_missing_auth() {
        let text = encode_identify(&Identify {
            rpc_version: RPC_VERSION,
            authentication: None,
        })
        .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"op": 1, "d": {"rpcVersion": 1}}));
    }

    #[test]
    fn test_encode_request() {
        let text = encode_request(&Request {
            request_type: "SetCurrentProgramScene".to_string(),
            request_id: "id-1".to_string(),
            request_data: json!({"sceneName": "Camera 1"}),
        })
        .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["op"], 6);
        assert_eq!(value["d"]["requestId"], "id-1");
        assert_eq!(value["d"]["requestData"]["sceneName"], "Camera 1");
    }

    #[test]
    fn test_scene_names() {
        let data = json!({
            "currentProgramSceneName": "Camera 1",
            "scenes": [
                {"sceneIndex": 2, "sceneName": "Intro"},
                {"sceneIndex": 1, "sceneName": "Camera 2"},
                {"sceneIndex": 0, "sceneName": "Camera 1"}
            ]
        });
        assert_eq!(scene_names(&data), vec!["Intro", "Camera 2", "Camera 1"]);
        assert!(scene_names(&json!({})).is_empty());
    }
}
