//! One-shot administrative commands against the messaging transport.

use async_trait::async_trait;

use crate::channels::Quiescent;
use crate::error::ActionError;

/// An administrative command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a direct message.
    Send { recipient: String, message: String },
    /// Add a member to a group.
    AddToGroup { group_id: String, member: String },
    /// Set the bot account's display name and about text.
    UpdateProfile { name: String, about: String },
}

impl Action {
    /// Transport operation name.
    pub fn operation(&self) -> &'static str {
        match self {
            Action::Send { .. } => "send",
            Action::AddToGroup { .. } => "updateGroup",
            Action::UpdateProfile { .. } => "updateProfile",
        }
    }

    /// Operation name followed by its arguments.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.operation().to_string()];
        match self {
            Action::Send { recipient, message } => {
                args.extend(["-m".into(), message.clone(), recipient.clone()]);
            }
            Action::AddToGroup { group_id, member } => {
                args.extend(["-g".into(), group_id.clone(), "-m".into(), member.clone()]);
            }
            Action::UpdateProfile { name, about } => {
                args.extend([
                    "--name".into(),
                    name.clone(),
                    "--about".into(),
                    about.clone(),
                ]);
            }
        }
        args
    }
}

/// Result of a single command. Failures are reported, never retried.
#[derive(Debug)]
pub enum ActionOutcome {
    Ok,
    Failed(ActionError),
}

impl ActionOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ActionOutcome::Ok)
    }
}

/// Executes administrative commands.
///
/// Callers must hold a [`Quiescent`] token: the transport cannot accept
/// commands while a subscription is open.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, idle: &Quiescent, action: &Action) -> ActionOutcome;
}
