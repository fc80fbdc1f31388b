//! Per-dataset build pipeline: checkout → install → validate → test → lint.

use cldfbot_shared::{
    BuildFactory, CheckoutMethod, CheckoutMode, Dataset, OrgProfile, PipelineConfig, Step,
    StepAction,
};
use tracing::debug;

/// Step names, in execution order.
pub const STEP_CHECKOUT: &str = "checkout";
pub const STEP_INSTALL_DATASET: &str = "install dataset";
pub const STEP_INSTALL_TOOLS: &str = "install tools";
pub const STEP_VALIDATE: &str = "validate";
pub const STEP_PYTEST: &str = "pytest";
pub const STEP_LEXICHECK: &str = "lexicheck";

/// Log level passed to `cldfbench` for the lint step.
const CHECK_LOG_LEVEL: &str = "WARN";

/// Build the step sequence of one dataset.
///
/// The organization profile decides the two optional steps: format
/// validation runs when it names a metadata file, the lint step runs when it
/// names a check command. Pure: the same inputs always give the same factory.
pub fn build_pipeline(
    dataset: &Dataset,
    org: &OrgProfile,
    config: &PipelineConfig,
) -> BuildFactory {
    let mut factory = BuildFactory::new();

    // Fresh full clone; any previous workspace content is discarded.
    factory.add_step(
        Step {
            name: STEP_CHECKOUT.into(),
            action: StepAction::Checkout {
                repo_url: dataset.url.clone(),
                mode: CheckoutMode::Full,
                method: CheckoutMethod::Fresh,
            },
            workdir: None,
            env: Default::default(),
        }
        .with_env("PYTHONPATH", config.python_path.as_str()),
    );

    factory.add_step(workspace_step(
        STEP_INSTALL_DATASET,
        ["pip", "install", "--upgrade", "."].map(String::from),
        config,
    ));

    let install_tools = ["pip", "install", "--upgrade"]
        .into_iter()
        .map(String::from)
        .chain(config.tools.iter().cloned());
    factory.add_step(workspace_step(STEP_INSTALL_TOOLS, install_tools, config));

    if let Some(metadata) = org.metadata_file() {
        factory.add_step(workspace_step(
            STEP_VALIDATE,
            ["cldf".into(), "validate".into(), format!("cldf/{metadata}")],
            config,
        ));
    } else {
        debug!(dataset = %dataset, "no metadata file configured, skipping validation");
    }

    factory.add_step(workspace_step(STEP_PYTEST, [String::from("pytest")], config));

    if let Some(check) = org.check_command() {
        factory.add_step(workspace_step(
            STEP_LEXICHECK,
            [
                "cldfbench".into(),
                "--log-level".into(),
                CHECK_LOG_LEVEL.into(),
                check.to_string(),
                dataset.name.clone(),
            ],
            config,
        ));
    }

    factory
}

/// A shell step running inside the dataset workspace.
fn workspace_step<I>(name: &str, command: I, config: &PipelineConfig) -> Step
where
    I: IntoIterator<Item = String>,
{
    Step::shell(name, command)
        .with_workdir(config.workdir.as_str())
        .with_env("PYTHONPATH", config.python_path.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cldfbot_shared::AppConfig;

    fn profiles() -> AppConfig {
        AppConfig::default()
    }

    fn build(org: &str, url: &str) -> BuildFactory {
        let config = profiles();
        let profile = config.org(org).expect("profile");
        build_pipeline(&Dataset::new(org, url), profile, &config.pipeline)
    }

    #[test]
    fn lexibank_gets_validation_and_lint() {
        let factory = build("lexibank", "https://github.com/lexibank/abvd.git");

        assert_eq!(factory.len(), 6);
        assert_eq!(
            factory.step_names(),
            [
                STEP_CHECKOUT,
                STEP_INSTALL_DATASET,
                STEP_INSTALL_TOOLS,
                STEP_VALIDATE,
                STEP_PYTEST,
                STEP_LEXICHECK
            ]
        );
        assert_eq!(
            factory.steps[3].command(),
            ["cldf", "validate", "cldf/cldf-metadata.json"]
        );
        assert_eq!(
            factory.steps[5].command(),
            ["cldfbench", "--log-level", "WARN", "lexibank.check", "abvd"]
        );
    }

    #[test]
    fn other_orgs_skip_validation_and_lint() {
        let lexibank = build("lexibank", "https://github.com/lexibank/abvd.git");
        let other = build("cldf-datasets", "https://github.com/cldf-datasets/wals.git");

        let names = other.step_names();
        assert!(!names.contains(&STEP_VALIDATE));
        assert!(!names.contains(&STEP_LEXICHECK));
        assert_eq!(other.len(), lexibank.len() - 2);
        assert_eq!(
            names,
            [STEP_CHECKOUT, STEP_INSTALL_DATASET, STEP_INSTALL_TOOLS, STEP_PYTEST]
        );
    }

    #[test]
    fn steps_share_env_and_workdir() {
        let factory = build("lexibank", "https://github.com/lexibank/abvd.git");

        for step in &factory.steps {
            assert_eq!(step.env.get("PYTHONPATH").map(String::as_str), Some("."));
        }
        assert!(factory.steps[0].workdir.is_none());
        assert!(
            factory.steps[1..]
                .iter()
                .all(|s| s.workdir.as_deref() == Some("build"))
        );
    }

    #[test]
    fn checkout_is_fresh_full_clone() {
        let factory = build("cldf-datasets", "https://github.com/cldf-datasets/wals.git");
        assert_eq!(
            factory.steps[0].action,
            StepAction::Checkout {
                repo_url: "https://github.com/cldf-datasets/wals.git".into(),
                mode: CheckoutMode::Full,
                method: CheckoutMethod::Fresh,
            }
        );
        assert_eq!(
            factory.steps[2].command(),
            ["pip", "install", "--upgrade", "pytest", "pytest-cldf"]
        );
    }

    #[test]
    fn empty_metadata_file_skips_validation() {
        let profile = OrgProfile {
            metadata_file: Some(String::new()),
            ..OrgProfile::new("lexibank")
        };
        let factory = build_pipeline(
            &Dataset::new("lexibank", "https://github.com/lexibank/abvd.git"),
            &profile,
            &PipelineConfig::default(),
        );
        assert!(!factory.step_names().contains(&STEP_VALIDATE));
    }

    #[test]
    fn third_org_only_needs_a_profile() {
        let profile = OrgProfile {
            metadata_file: Some("StructureDataset-metadata.json".into()),
            ..OrgProfile::new("grambank")
        };
        let factory = build_pipeline(
            &Dataset::new("grambank", "https://github.com/grambank/grambank.git"),
            &profile,
            &PipelineConfig::default(),
        );
        assert!(factory.step_names().contains(&STEP_VALIDATE));
        assert!(!factory.step_names().contains(&STEP_LEXICHECK));
    }

    #[test]
    fn building_twice_is_identical() {
        let a = build("lexibank", "https://github.com/lexibank/abvd.git");
        let b = build("lexibank", "https://github.com/lexibank/abvd.git");
        assert_eq!(a, b);
    }
}
