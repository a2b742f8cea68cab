//! Operation descriptors and the records the relay keeps for them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::RelayError;

/// Browser actions understood by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Click,
    Type,
    Scroll,
    Navigate,
    GetPageData,
    WaitForElement,
    ExecuteScript,
    Screenshot,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Click,
        Action::Type,
        Action::Scroll,
        Action::Navigate,
        Action::GetPageData,
        Action::WaitForElement,
        Action::ExecuteScript,
        Action::Screenshot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::Type => "type",
            Action::Scroll => "scroll",
            Action::Navigate => "navigate",
            Action::GetPageData => "get_page_data",
            Action::WaitForElement => "wait_for_element",
            Action::ExecuteScript => "execute_script",
            Action::Screenshot => "screenshot",
        }
    }

    /// Whether the action can be expressed as an in-page script.
    pub fn is_scriptable(&self) -> bool {
        !matches!(self, Action::Screenshot)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Bridge channel names (camelCase / short forms) are accepted as aliases.
        match s.trim() {
            "click" => Ok(Action::Click),
            "type" => Ok(Action::Type),
            "scroll" => Ok(Action::Scroll),
            "navigate" => Ok(Action::Navigate),
            "get_page_data" | "getPageData" => Ok(Action::GetPageData),
            "wait_for_element" | "waitForElement" | "wait" => Ok(Action::WaitForElement),
            "execute_script" | "executeScript" | "execute" => Ok(Action::ExecuteScript),
            "screenshot" => Ok(Action::Screenshot),
            other => Err(RelayError::UnknownAction(other.to_string())),
        }
    }
}

/// Scroll direction for [`Action::Scroll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
    Top,
    Bottom,
}

impl FromStr for ScrollDirection {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            "left" => Ok(ScrollDirection::Left),
            "right" => Ok(ScrollDirection::Right),
            "top" => Ok(ScrollDirection::Top),
            "bottom" => Ok(ScrollDirection::Bottom),
            other => Err(RelayError::InvalidArgument(format!(
                "invalid scroll direction: '{other}'. Use up, down, left, right, top or bottom"
            ))),
        }
    }
}

impl ScrollDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
            ScrollDirection::Top => "top",
            ScrollDirection::Bottom => "bottom",
        }
    }
}

/// Optional knobs carried with a descriptor.
///
/// Keys the relay does not know about are preserved in `extra` so that they
/// round-trip to the executor untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationOptions {
    /// Scroll distance in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,

    /// Wait timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Wait polling interval in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,

    /// Clear the field before typing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<bool>,

    /// Code for `execute_script` (alternative to `text`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// What a requester wants done in the browser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OperationOptions>,
}

impl OperationDescriptor {
    pub fn new(action: Action) -> Self {
        Self {
            action: action.as_str().to_string(),
            ..Default::default()
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_direction(mut self, direction: impl Into<String>) -> Self {
        self.direction = Some(direction.into());
        self
    }

    pub fn with_options(mut self, options: OperationOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Parses the action name.
    pub fn action(&self) -> Result<Action, RelayError> {
        self.action.parse()
    }

    pub fn options(&self) -> OperationOptions {
        self.options.clone().unwrap_or_default()
    }
}

/// Identifier of a queued operation (`op_<uuid>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn generate() -> Self {
        Self(format!("op_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OperationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An operation waiting for the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: OperationId,
    pub operation: OperationDescriptor,
    /// Enqueue time, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// A result submitted back by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    #[serde(rename = "operationId")]
    pub operation_id: OperationId,
    pub result: serde_json::Value,
    pub timestamp: i64,
}

/// Builds the `{ success: false, error }` shape used for every failure that
/// travels back through the relay.
pub fn failure_result(error: impl fmt::Display) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error": error.to_string(),
    })
}
