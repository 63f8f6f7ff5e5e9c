//! Whole-pipeline E2E tests: ruleset loading, transformation,
//! classification and statistics persistence working together.

use indoc::indoc;
use pretty_assertions::assert_eq;

use repotrack::batch::{classify_projects, transform_packages};
use repotrack::repository::RepositoryTable;
use repotrack::rules::{RuleStats, RuleTransformer, Ruleset};
use repotrack::{Package, PackageStatus};

fn package(repo: &str, family: &str, name: &str, version: &str) -> Package {
    Package {
        repo: repo.to_string(),
        family: family.to_string(),
        name: Some(name.to_string()),
        version: version.to_string(),
        rawversion: version.to_string(),
        ..Default::default()
    }
}

fn repositories() -> RepositoryTable {
    RepositoryTable::from_yaml(indoc! {"
        - name: freebsd
          family: freebsd
          rulesets: [freebsd]
        - name: debian_12
          family: debuntu
          rulesets: [debian, debuntu]
        - name: ubuntu_24
          family: debuntu
          rulesets: [ubuntu, debuntu]
    "})
    .unwrap()
}

#[test]
fn transform_then_classify() {
    // 1. Load rules from a directory tree, sorted by file name
    let rules_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        rules_dir.path().join("100-names.yaml"),
        indoc! {r#"
            - { namepat: "mozilla-(.*)", setname: "$1" }
            - { name: firefox-esr, setname: firefox, addflavor: esr }
        "#},
    )
    .unwrap();
    std::fs::write(
        rules_dir.path().join("200-versions.yaml"),
        indoc! {r#"
            - { name: firefox, verpat: "(.*)esr", setver: "$1", addflavor: esr }
            - { verpat: ".*(alpha|beta|rc).*", devel: true }
            - { ruleset: debian, verpat: "(.*)[+~]dfsg.*", setver: "$1" }
        "#},
    )
    .unwrap();
    let ruleset = Ruleset::from_dir(rules_dir.path()).unwrap();

    let transformer = RuleTransformer::new(ruleset, repositories(), &RuleStats::default());

    // 2. Transform a batch spanning three repositories
    let outcome = transform_packages(
        &transformer,
        vec![
            package("freebsd", "freebsd", "mozilla-firefox", "141.0"),
            package("debian_12", "debuntu", "firefox-esr", "140.2+dfsg1"),
            package("ubuntu_24", "debuntu", "firefox", "142.0beta3"),
            package("freebsd", "freebsd", "zlib", "1.3"),
        ],
    );
    assert!(outcome.failures.is_empty());

    let by_repo = |repo: &str| {
        outcome
            .packages
            .iter()
            .find(|p| p.repo == repo)
            .unwrap()
            .clone()
    };
    assert_eq!(by_repo("freebsd").effname, "firefox");
    assert_eq!(by_repo("debian_12").effname, "firefox");
    assert_eq!(by_repo("debian_12").version, "140.2");
    assert_eq!(by_repo("debian_12").origversion.as_deref(), Some("140.2+dfsg1"));
    assert_eq!(by_repo("debian_12").flavors, vec!["esr".to_string()]);
    assert_eq!(by_repo("ubuntu_24").effname, "firefox");

    // 3. Classify; firefox spans two families, zlib is unique
    let classified = classify_projects(outcome.packages);
    assert!(classified.failures.is_empty());

    let status = |repo: &str, name: &str| {
        classified
            .packages
            .iter()
            .find(|p| p.repo == repo && p.effname == name)
            .and_then(|p| p.status)
    };
    assert_eq!(status("ubuntu_24", "firefox"), Some(PackageStatus::Devel));
    assert_eq!(status("freebsd", "firefox"), Some(PackageStatus::Newest));
    assert_eq!(status("debian_12", "firefox"), Some(PackageStatus::Outdated));
    assert_eq!(status("freebsd", "zlib"), Some(PackageStatus::Unique));
}

#[test]
fn statistics_survive_a_restart_and_do_not_change_results() {
    let yaml = indoc! {r#"
        - { name: rare-one, ignore: true }
        - { name: rare-two, ignore: true }
        - { verpat: ".*beta.*", devel: true }
    "#};

    let batch = || {
        vec![
            package("freebsd", "freebsd", "rare-one", "1.0"),
            package("debian_12", "debuntu", "common", "2.0beta1"),
            package("ubuntu_24", "debuntu", "common", "2.0"),
        ]
    };

    // 1. First run starts from empty statistics and persists its delta
    let stats_file = tempfile::tempdir().unwrap();
    let stats_path = stats_file.path().join("stats.json");

    let transformer = RuleTransformer::new(
        Ruleset::from_yaml(yaml).unwrap(),
        repositories(),
        &RuleStats::load(&stats_path),
    );
    let first = transform_packages(&transformer, batch());
    RuleStats::default()
        .merged(&first.stats)
        .save(&stats_path)
        .unwrap();

    // 2. Second run plans from the persisted snapshot
    let stats = RuleStats::load(&stats_path);
    assert_eq!(stats.total_packages, 3);

    let retrained = RuleTransformer::new(
        Ruleset::from_yaml(yaml).unwrap(),
        repositories(),
        &stats,
    );
    let second = transform_packages(&retrained, batch());

    // 3. Same input, same output, whatever the plan looks like
    let summarize = |packages: &[Package]| {
        let mut summary: Vec<(String, String, String)> = packages
            .iter()
            .map(|p| (p.repo.clone(), p.effname.clone(), p.flags.to_string()))
            .collect();
        summary.sort();
        summary
    };
    assert_eq!(summarize(&first.packages), summarize(&second.packages));
}

#[test]
fn ruleset_edits_reset_only_their_own_counters() {
    let transformer = RuleTransformer::new(
        Ruleset::from_yaml(indoc! {r#"
            - { name: kept, ignore: true }
            - { name: edited, devel: true }
        "#})
        .unwrap(),
        RepositoryTable::default(),
        &RuleStats::default(),
    );

    let outcome = transform_packages(
        &transformer,
        vec![
            package("freebsd", "freebsd", "kept", "1.0"),
            package("freebsd", "freebsd", "edited", "1.0"),
        ],
    );
    let stats = RuleStats::default().merged(&outcome.stats);

    // the kept rule compiles to the same text in the edited ruleset, so
    // its counter carries over; the edited rule starts from zero
    let edited = Ruleset::from_yaml(indoc! {r#"
        - { name: kept, ignore: true }
        - { name: edited, untrusted: true }
    "#})
    .unwrap();
    assert_eq!(stats.frequency(&edited.rules[0].hash), 0.5);
    assert_eq!(stats.frequency(&edited.rules[1].hash), 0.0);
}
