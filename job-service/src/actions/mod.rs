// Actions Module
// Built-in step actions

pub mod command;
pub mod coverage;
pub mod log;
pub mod script;

pub use command::CommandAction;
pub use coverage::{CoberturaAction, SimplecovAction};
pub use log::LogAction;
pub use script::ScriptAction;

use crate::plugins::{ActionArgs, ActionError};

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserialize an action's arguments into its typed form
pub(crate) fn parse_args<T: DeserializeOwned>(action: &str, args: &ActionArgs) -> Result<T, ActionError> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|e| ActionError::invalid(action, e))
}
