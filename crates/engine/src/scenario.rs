//! Scenario runner – execute scripted batches of commands from YAML files.

use crate::commands::CommandRegistry;
use crate::context::AppContext;
use crate::types::*;

/// Load a scenario from a YAML string.
pub fn load_scenario(yaml: &str) -> Result<Scenario, String> {
    serde_yaml::from_str(yaml).map_err(|e| format!("failed to parse scenario YAML: {}", e))
}

/// Execute every step in order and return the overall result.
pub fn run_scenario(
    scenario: &Scenario,
    ctx: &AppContext,
    registry: &CommandRegistry,
) -> ScenarioResult {
    let mut step_results = Vec::with_capacity(scenario.steps.len());
    let mut overall = Status::Pass;

    for (i, step) in scenario.steps.iter().enumerate() {
        let r = registry.execute(&step.call, step.args.clone(), ctx);
        let actual = r.status.as_str();
        if !actual.eq_ignore_ascii_case(step.expect_status.trim()) {
            tracing::warn!(
                step = i,
                call = %step.call,
                expected = %step.expect_status,
                actual = %actual,
                "scenario step status mismatch"
            );
            overall = Status::Fail;
        }
        step_results.push(r);
    }

    ScenarioResult {
        name: scenario.name.clone(),
        overall_status: overall,
        step_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenario() {
        let yaml = r#"
name: strategies
steps:
  - call: "generate_quine"
    args:
      input: "hello"
      options:
        escape_strategy: "hex"
    expect_status: "pass"
  - call: "list_strategies"
"#;
        let s = load_scenario(yaml).expect("should parse");
        assert_eq!(s.name, Some("strategies".into()));
        assert_eq!(s.steps.len(), 2);
        assert_eq!(s.steps[1].expect_status, "pass");
    }

    #[test]
    fn test_run_scenario_expectations() {
        let yaml = r#"
steps:
  - call: "generate_quine"
    args: { input: "hi" }
  - call: "generate_quine"
    args: { input: "say \"hi\"", options: { escape_strategy: "raw" } }
    expect_status: "error"
  - call: "verify_quine"
    args: { program: "print(1)" }
    expect_status: "fail"
"#;
        let scenario = load_scenario(yaml).unwrap();
        let result = run_scenario(&scenario, &AppContext::default(), &CommandRegistry::new());
        assert_eq!(result.overall_status, Status::Pass);
        assert_eq!(result.step_results.len(), 3);
    }

    #[test]
    fn test_mismatch_fails_scenario() {
        let yaml = r#"
name: wrong expectation
steps:
  - call: "generate_quine"
    args: { input: "" }
"#;
        let scenario = load_scenario(yaml).unwrap();
        let result = run_scenario(&scenario, &AppContext::default(), &CommandRegistry::new());
        assert_eq!(result.overall_status, Status::Fail);
        assert_eq!(result.step_results[0].status, Status::Error);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(load_scenario("steps: [call: ").is_err());
    }
}
