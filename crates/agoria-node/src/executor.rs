//! Dispatches a task to the agent's advertised HTTP endpoint and parses the
//! reply into an `ExecutorReport`. Raw `reqwest` + `serde_json` rather than
//! a full RPC client crate, mirroring `chronx-wallet`'s `WalletRpcClient`.

use agoria_cards::card::AgentCard;
use agoria_core::AgoriaError;
use agoria_orchestrator::{Executor, ExecutorReport};
use agoria_queue::Task;

pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Deserialize)]
struct AgentResponse {
    ok: bool,
    result: Option<serde_json::Value>,
    error: Option<String>,
    cost: Option<u128>,
}

impl Executor for HttpExecutor {
    async fn execute_task(&self, task: &Task, agent_card: &AgentCard) -> Result<ExecutorReport, AgoriaError> {
        let endpoint = agent_card
            .network
            .endpoints
            .first()
            .ok_or_else(|| AgoriaError::NoSuitableAgent(agent_card.subject.to_string()))?;

        let body = serde_json::json!({
            "task_id": task.id.to_string(),
            "task_type": task.task_type,
            "input": task.input,
        });

        let resp = self
            .client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgoriaError::Network(e.to_string()))?;

        let parsed: AgentResponse = resp
            .json()
            .await
            .map_err(|e| AgoriaError::Serialization(e.to_string()))?;

        Ok(report_from_response(parsed, agent_card.economic.price_per_task))
    }
}

fn report_from_response(resp: AgentResponse, default_cost: u128) -> ExecutorReport {
    if resp.ok {
        ExecutorReport::success(
            resp.result.unwrap_or(serde_json::Value::Null),
            resp.cost.unwrap_or(default_cost),
        )
    } else {
        ExecutorReport::failure(resp.error.unwrap_or_else(|| "agent reported failure with no message".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agoria_queue::TaskStatus;

    #[test]
    fn ok_response_without_explicit_cost_falls_back_to_card_price() {
        let report = report_from_response(
            AgentResponse {
                ok: true,
                result: Some(serde_json::json!({"answer": 42})),
                error: None,
                cost: None,
            },
            1_000,
        );
        assert!(matches!(report.status, TaskStatus::Completed));
        assert_eq!(report.cost, 1_000);
        assert_eq!(report.result, Some(serde_json::json!({"answer": 42})));
    }

    #[test]
    fn ok_response_with_explicit_cost_overrides_card_price() {
        let report = report_from_response(
            AgentResponse {
                ok: true,
                result: None,
                error: None,
                cost: Some(50),
            },
            1_000,
        );
        assert_eq!(report.cost, 50);
    }

    #[test]
    fn failed_response_without_message_gets_a_default_error() {
        let report = report_from_response(
            AgentResponse {
                ok: false,
                result: None,
                error: None,
                cost: None,
            },
            1_000,
        );
        assert!(matches!(report.status, TaskStatus::Failed));
        assert!(report.error.is_some());
    }
}
