// Log Action
// Writes an interpolated message to the job log

use crate::actions::parse_args;
use crate::execution::context::ExecutionContext;
use crate::execution::notifier::Notifier;
use crate::expression::interpolate;
use crate::plugins::{Action, ActionArgs, ActionError, ActionOutcome, Transport};

use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
struct LogArgs {
    message: String,
}

/// `action: log`
pub struct LogAction {
    args: LogArgs,
    message: Option<String>,
}

impl LogAction {
    pub fn from_args(args: &ActionArgs) -> Result<Self, ActionError> {
        Ok(Self {
            args: parse_args("log", args)?,
            message: None,
        })
    }
}

#[async_trait::async_trait]
impl Action for LogAction {
    fn prepare(&mut self, _transport: Arc<dyn Transport>, ctx: &ExecutionContext) -> Result<(), ActionError> {
        self.message = Some(interpolate(&self.args.message, ctx)?);
        Ok(())
    }

    async fn perform(&mut self, log: &mut dyn Notifier) -> Result<ActionOutcome, ActionError> {
        let message = self.message.as_deref().ok_or(ActionError::NotPrepared)?;
        log.write_line(message);
        Ok(ActionOutcome::from_exit(true, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requires_message() {
        let args = json!({"text": "hello"});
        assert!(LogAction::from_args(args.as_object().unwrap()).is_err());
    }
}
