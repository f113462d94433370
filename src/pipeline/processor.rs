//! Join processor: classifies a requester and carries out the routing.
//!
//! Flow:
//! 1. Hidden-number check (no classifier or allow-list involved)
//! 2. Carrier check (only for visible numbers)
//! 3. Area-code routing
//!
//! Command failures are logged and absorbed. A failed send never prevents
//! the group move that follows it, and nothing is retried.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::actions::{Action, ActionExecutor, ActionOutcome};
use crate::carrier::{LineClassifier, LineStatus};
use crate::channels::Quiescent;
use crate::config::BotConfig;
use crate::pipeline::messages;
use crate::pipeline::rules::{AreaCodeRules, Routing};
use crate::pipeline::types::{JoinRequest, Verdict};

/// Join-verification pipeline.
pub struct JoinPipeline {
    config: Arc<BotConfig>,
    rules: AreaCodeRules,
    executor: Arc<dyn ActionExecutor>,
    classifier: Arc<dyn LineClassifier>,
}

impl JoinPipeline {
    pub fn new(
        config: Arc<BotConfig>,
        executor: Arc<dyn ActionExecutor>,
        classifier: Arc<dyn LineClassifier>,
    ) -> Self {
        let rules = AreaCodeRules::new(config.allowed_area_codes.clone());
        Self {
            config,
            rules,
            executor,
            classifier,
        }
    }

    /// Run the pipeline for one request and carry out its verdict.
    pub async fn handle(&self, idle: &Quiescent, request: &JoinRequest) -> Verdict {
        let verdict = self.evaluate(request).await;
        info!(
            source = %request.source,
            verdict = verdict.label(),
            "Join request evaluated"
        );

        let (send, group_move) = self.plan(verdict, request);
        self.run_action(idle, &send).await;
        if let Some(group_move) = group_move {
            self.run_action(idle, &group_move).await;
        }

        verdict
    }

    /// Decide the verdict without side effects on the transport.
    pub async fn evaluate(&self, request: &JoinRequest) -> Verdict {
        if !request.has_visible_number() {
            info!(source = %request.source, "Hidden number detected");
            return Verdict::HiddenNumberWarning;
        }

        match self.classifier.classify(&request.source).await {
            LineStatus::NonMobile { line_type } => {
                info!(source = %request.source, line_type = %line_type, "Non-mobile line rejected");
                return Verdict::CarrierRejected;
            }
            LineStatus::Mobile => debug!(source = %request.source, "Mobile line confirmed"),
            LineStatus::Indeterminate(reason) => {
                debug!(source = %request.source, ?reason, "Carrier check passed by default");
            }
        }

        match self.rules.route(&request.source) {
            Routing::Verified => Verdict::RoutedVerified,
            Routing::Unverified => Verdict::RoutedUnverified,
        }
    }

    /// The message to send and the optional group move for a verdict.
    pub fn plan(&self, verdict: Verdict, request: &JoinRequest) -> (Action, Option<Action>) {
        let send = Action::Send {
            recipient: request.source.clone(),
            message: messages::for_verdict(verdict, &self.config.admin_contact),
        };

        let group_id = match verdict {
            Verdict::HiddenNumberWarning | Verdict::CarrierRejected => None,
            Verdict::RoutedVerified => Some(&self.config.verified_group_id),
            Verdict::RoutedUnverified => Some(&self.config.unverified_group_id),
        };
        let group_move = group_id.map(|group_id| Action::AddToGroup {
            group_id: group_id.clone(),
            member: request.source.clone(),
        });

        (send, group_move)
    }

    async fn run_action(&self, idle: &Quiescent, action: &Action) {
        if let ActionOutcome::Failed(e) = self.executor.execute(idle, action).await {
            warn!(operation = action.operation(), "Continuing after failed action: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::carrier::Indeterminate;
    use crate::error::{ActionError, CarrierError};

    /// Records every action; optionally fails all of them.
    #[derive(Default)]
    struct RecordingExecutor {
        actions: Mutex<Vec<Action>>,
        fail: bool,
    }

    impl RecordingExecutor {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn actions(&self) -> Vec<Action> {
            self.actions.lock().unwrap().clone()
        }

        fn group_moves(&self) -> Vec<Action> {
            self.actions()
                .into_iter()
                .filter(|a| matches!(a, Action::AddToGroup { .. }))
                .collect()
        }
    }

    #[async_trait]
    impl ActionExecutor for RecordingExecutor {
        async fn execute(&self, _idle: &Quiescent, action: &Action) -> ActionOutcome {
            self.actions.lock().unwrap().push(action.clone());
            if self.fail {
                ActionOutcome::Failed(ActionError::NonZeroExit {
                    operation: action.operation().into(),
                    code: 1,
                    stderr: "simulated".into(),
                })
            } else {
                ActionOutcome::Ok
            }
        }
    }

    /// Returns a fixed classification.
    enum StubClassifier {
        Mobile,
        LineType(&'static str),
        Timeout,
        Disabled,
    }

    #[async_trait]
    impl LineClassifier for StubClassifier {
        async fn classify(&self, _phone: &str) -> LineStatus {
            match self {
                StubClassifier::Mobile => LineStatus::Mobile,
                StubClassifier::LineType(t) => LineStatus::from_line_type(Some(*t)),
                StubClassifier::Timeout => {
                    LineStatus::Indeterminate(Indeterminate::LookupFailed(CarrierError::Timeout))
                }
                StubClassifier::Disabled => LineStatus::Indeterminate(Indeterminate::Disabled),
            }
        }
    }

    /// Panics if consulted; proves hidden numbers short-circuit.
    struct UnreachableClassifier;

    #[async_trait]
    impl LineClassifier for UnreachableClassifier {
        async fn classify(&self, phone: &str) -> LineStatus {
            panic!("classifier consulted for {phone}");
        }
    }

    fn config() -> Arc<BotConfig> {
        Arc::new(
            BotConfig::from_yaml(
                r#"
bot_number: "+14155550100"
allowed_area_codes: ["415"]
verified_group_id: "verified-group"
unverified_group_id: "decoy-group"
admin_contact: "@admin.01"
"#,
            )
            .unwrap(),
        )
    }

    fn pipeline(
        executor: Arc<RecordingExecutor>,
        classifier: impl LineClassifier + 'static,
    ) -> JoinPipeline {
        JoinPipeline::new(config(), executor, Arc::new(classifier))
    }

    async fn run(
        classifier: impl LineClassifier + 'static,
        source: &str,
    ) -> (Verdict, Arc<RecordingExecutor>) {
        let executor = Arc::new(RecordingExecutor::default());
        let p = pipeline(Arc::clone(&executor), classifier);
        let verdict = p.handle(&Quiescent::new(), &JoinRequest::new(source)).await;
        (verdict, executor)
    }

    #[tokio::test]
    async fn allow_listed_area_code_joins_verified_group() {
        let (verdict, executor) = run(StubClassifier::Disabled, "+14155551234").await;
        assert_eq!(verdict, Verdict::RoutedVerified);
        assert_eq!(
            executor.actions(),
            vec![
                Action::Send {
                    recipient: "+14155551234".into(),
                    message: messages::WELCOME.into(),
                },
                Action::AddToGroup {
                    group_id: "verified-group".into(),
                    member: "+14155551234".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn other_area_code_joins_unverified_group() {
        let (verdict, executor) = run(StubClassifier::Disabled, "+12125551234").await;
        assert_eq!(verdict, Verdict::RoutedUnverified);
        let actions = executor.actions();
        assert_eq!(actions.len(), 2);
        match &actions[0] {
            Action::Send { recipient, message } => {
                assert_eq!(recipient, "+12125551234");
                assert!(message.contains("@admin.01"));
            }
            other => panic!("expected send first, got {other:?}"),
        }
        assert_eq!(
            actions[1],
            Action::AddToGroup {
                group_id: "decoy-group".into(),
                member: "+12125551234".into(),
            }
        );
    }

    #[tokio::test]
    async fn hidden_number_gets_warning_only() {
        let (verdict, executor) = run(UnreachableClassifier, "abcd-uuid-1234").await;
        assert_eq!(verdict, Verdict::HiddenNumberWarning);
        let actions = executor.actions();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::Send { recipient, message } => {
                assert_eq!(recipient, "abcd-uuid-1234");
                assert!(message.contains("Settings > Privacy"));
                assert!(message.contains("@admin.01"));
            }
            other => panic!("expected send, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn voip_line_is_rejected_regardless_of_area_code() {
        for source in ["+14155551234", "+12125551234"] {
            let (verdict, executor) = run(StubClassifier::LineType("voip"), source).await;
            assert_eq!(verdict, Verdict::CarrierRejected);
            assert_eq!(executor.actions().len(), 1);
            assert!(executor.group_moves().is_empty());
            match &executor.actions()[0] {
                Action::Send { message, .. } => assert!(message.contains("@admin.01")),
                other => panic!("expected send, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn lookup_timeout_falls_through_to_area_code() {
        let (verdict, executor) = run(StubClassifier::Timeout, "+14155551234").await;
        assert_eq!(verdict, Verdict::RoutedVerified);
        assert_eq!(executor.group_moves().len(), 1);
    }

    #[tokio::test]
    async fn confirmed_mobile_passes() {
        let (verdict, _) = run(StubClassifier::Mobile, "+12125551234").await;
        assert_eq!(verdict, Verdict::RoutedUnverified);
    }

    #[tokio::test]
    async fn unknown_line_type_passes() {
        let (verdict, _) = run(StubClassifier::LineType("Unknown"), "+14155551234").await;
        assert_eq!(verdict, Verdict::RoutedVerified);
    }

    #[tokio::test]
    async fn failed_send_still_moves_member() {
        let executor = Arc::new(RecordingExecutor::failing());
        let p = pipeline(Arc::clone(&executor), StubClassifier::Disabled);
        let verdict = p
            .handle(&Quiescent::new(), &JoinRequest::new("+14155551234"))
            .await;
        assert_eq!(verdict, Verdict::RoutedVerified);
        assert_eq!(executor.actions().len(), 2);
        assert_eq!(executor.group_moves().len(), 1);
    }

    #[tokio::test]
    async fn hidden_numbers_never_move_whatever_the_classifier() {
        for source in ["abcd-uuid-1234", "14155551234", "PNI:1234"] {
            let (verdict, executor) = run(StubClassifier::LineType("voip"), source).await;
            assert_eq!(verdict, Verdict::HiddenNumberWarning);
            assert!(executor.group_moves().is_empty());
        }
    }

    #[test]
    fn every_verdict_plans_one_send_and_at_most_one_move() {
        let p = pipeline(
            Arc::new(RecordingExecutor::default()),
            StubClassifier::Disabled,
        );
        let request = JoinRequest::new("+14155551234");
        for verdict in [
            Verdict::HiddenNumberWarning,
            Verdict::CarrierRejected,
            Verdict::RoutedVerified,
            Verdict::RoutedUnverified,
        ] {
            let (send, group_move) = p.plan(verdict, &request);
            assert!(matches!(send, Action::Send { .. }));
            let expects_move = matches!(
                verdict,
                Verdict::RoutedVerified | Verdict::RoutedUnverified
            );
            assert_eq!(group_move.is_some(), expects_move, "{verdict:?}");
        }
    }
}
