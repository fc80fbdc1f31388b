//! Scheduler bindings: a force trigger per dataset and the aggregate
//! `release` group that fans out to all of them.

use cldfbot_shared::{BuildFactory, BuilderConfig, Dataset, Scheduler, Step, StepAction};

/// Name of the aggregate trigger group and of the builder that fires it.
pub const RELEASE: &str = "release";

/// Force-trigger name of a build target.
pub fn force_scheduler_name(builder: &str) -> String {
    format!("{builder}-force")
}

/// The manual trigger of one dataset's builder.
pub fn dataset_schedulers(dataset: &Dataset) -> Vec<Scheduler> {
    let id = dataset.id();
    vec![Scheduler::Force {
        name: force_scheduler_name(&id),
        builder_names: vec![id],
    }]
}

/// The `release` triggerable over all datasets, and its own force trigger.
pub fn release_schedulers(datasets: &[Dataset]) -> Vec<Scheduler> {
    vec![
        Scheduler::Triggerable {
            name: RELEASE.into(),
            builder_names: datasets.iter().map(Dataset::id).collect(),
        },
        Scheduler::Force {
            name: force_scheduler_name(RELEASE),
            builder_names: vec![RELEASE.into()],
        },
    ]
}

/// The `release` builder: one step that fires the `release` group without
/// waiting for the dataset builds.
pub fn release_builder(worker: &str) -> BuilderConfig {
    let mut factory = BuildFactory::new();
    factory.add_step(Step {
        name: "trigger".into(),
        action: StepAction::Trigger {
            scheduler_names: vec![RELEASE.into()],
            wait_for_finish: false,
        },
        workdir: None,
        env: Default::default(),
    });

    BuilderConfig {
        name: RELEASE.into(),
        worker_names: vec![worker.into()],
        factory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_scheduler_per_dataset() {
        let ds = Dataset::new("cldf-datasets", "https://github.com/cldf-datasets/foo.git");
        let schedulers = dataset_schedulers(&ds);

        assert_eq!(
            schedulers,
            [Scheduler::Force {
                name: "cldf-datasets-foo-force".into(),
                builder_names: vec!["cldf-datasets-foo".into()],
            }]
        );
    }

    #[test]
    fn release_group_covers_all_datasets() {
        let datasets = [
            Dataset::new("cldf-datasets", "https://github.com/cldf-datasets/wals.git"),
            Dataset::new("lexibank", "https://github.com/lexibank/abvd.git"),
        ];
        let schedulers = release_schedulers(&datasets);

        assert_eq!(schedulers[0].name(), "release");
        assert_eq!(
            schedulers[0].builder_names(),
            ["cldf-datasets-wals", "lexibank-abvd"]
        );
        assert_eq!(schedulers[1].name(), "release-force");
        assert_eq!(schedulers[1].builder_names(), ["release"]);
    }

    #[test]
    fn release_builder_triggers_without_waiting() {
        let builder = release_builder("worker");
        assert_eq!(builder.name, "release");
        assert_eq!(builder.worker_names, ["worker"]);
        assert_eq!(
            builder.factory.steps[0].action,
            StepAction::Trigger {
                scheduler_names: vec!["release".into()],
                wait_for_finish: false,
            }
        );
    }
}
