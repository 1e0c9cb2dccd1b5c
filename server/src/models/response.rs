use core::fmt;

use serde::{Deserialize, Serialize};

/// What the client does with a frame's payload.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseMode {
    Print,    // show and carry on
    Readline, // show as a prompt and answer with one line
    Quit,     // show and end the session
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mode = match *self {
            ResponseMode::Print => "PRINT",
            ResponseMode::Readline => "READLINE",
            ResponseMode::Quit => "QUIT",
        };
        write!(f, "{}", mode)
    }
}

/// One server-to-client frame, sent as a JSON text message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub payload: String,
    pub mode: ResponseMode,
}

impl Response {
    pub fn message(payload: impl Into<String>) -> Self {
        Response { payload: payload.into(), mode: ResponseMode::Print }
    }

    pub fn read_line(payload: impl Into<String>) -> Self {
        Response { payload: payload.into(), mode: ResponseMode::Readline }
    }

    pub fn quit(payload: impl Into<String>) -> Self {
        Response { payload: payload.into(), mode: ResponseMode::Quit }
    }

    pub fn error(payload: impl fmt::Display) -> Self {
        Response::message(format!("ERROR: {}", payload))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!(r#"{{"payload":"","mode":"{}"}}"#, self.mode))
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
