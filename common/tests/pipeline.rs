use std::{
    fs::write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use common::{
    config::Settings,
    group::{Dimensions, GroupKey, select_group},
    ingest::{HOSTS, MergeOutcome, load_unified},
    plot::{Renderer, render_partitions},
    report::{MetricGroup, Report, ReportLayout},
};
use eyre::Result;
use tempfile::tempdir;

const HEADER: &str = "delay,hosts,metric_wall_sum";

fn write_files(dir: &Path, files: &[(&str, String)]) {
    for (name, content) in files {
        write(dir.join(name), content).unwrap();
    }
}

#[derive(Default)]
struct Recording {
    reports: Mutex<Vec<Report>>,
}

impl Renderer for Recording {
    fn render(&self, report: &Report, path: &Path) -> Result<()> {
        write(path, b"png")?;
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

fn layout() -> ReportLayout {
    ReportLayout {
        title: "Byzcoin Simulation Monitor".to_owned(),
        grid: (1, 1),
        panels: vec![MetricGroup::new("phases", &["metric_wall_sum"])],
        ..Default::default()
    }
}

#[tokio::test]
async fn batched_and_plain_runs_split_into_groups() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            ("coins_a.csv", format!("{HEADER}\n10,4,1.0\n")),
            ("coins_a_batch.csv", format!("{HEADER}\n10,8,2.0\n")),
        ],
    );

    let (table, summary) = load_unified(dir.path(), &Settings::default())
        .await
        .unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(summary.accepted(), 2);

    let dims = Dimensions::index(&table).unwrap();
    assert_eq!(dims.delays, vec![10.0]);
    assert_eq!(dims.keeps, vec![true]);
    let mut batches = dims.batches.clone();
    batches.sort();
    assert_eq!(batches, vec![false, true]);

    let plain = select_group(
        &table,
        &GroupKey {
            delay: 10.0,
            keep: true,
            batch: false,
        },
    )
    .unwrap();
    assert_eq!(plain.numbers(HOSTS).unwrap(), vec![4.0]);
    assert_eq!(plain.numbers("metric_wall_sum").unwrap(), vec![1.0]);

    let batched = select_group(
        &table,
        &GroupKey {
            delay: 10.0,
            keep: true,
            batch: true,
        },
    )
    .unwrap();
    assert_eq!(batched.numbers(HOSTS).unwrap(), vec![8.0]);
    assert_eq!(batched.numbers("metric_wall_sum").unwrap(), vec![2.0]);
}

#[tokio::test]
async fn mismatched_files_never_reach_the_table() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            ("coins_1.csv", format!("{HEADER}\n10,4,1.0\n10,8,1.0\n")),
            ("coins_2.csv", format!("{HEADER},extra\n10,4,9.0,1\n")),
            ("coins_3_nokeep.csv", format!("{HEADER}\n20,4,1.0\n")),
            ("coins_4.csv", "hosts,delay,metric_wall_sum\n4,10,9.0\n".to_owned()),
            ("coins_5_batch.csv", format!("{HEADER}\n20,2,1.0\n20,16,1.0\n20,8,1.0\n")),
        ],
    );

    let (table, summary) = load_unified(dir.path(), &Settings::default())
        .await
        .unwrap();
    assert_eq!(table.len(), 6);
    assert!(!table.numbers("metric_wall_sum").unwrap().contains(&9.0));
    assert_eq!(summary.accepted(), 3);
    assert_eq!(summary.skipped(), 2);

    let skipped = summary
        .files
        .iter()
        .filter(|f| matches!(f.outcome, MergeOutcome::Skipped(_)))
        .map(|f| f.path.file_name().unwrap().to_str().unwrap().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(skipped, vec!["coins_2.csv", "coins_4.csv"]);

    let nokeep = select_group(
        &table,
        &GroupKey {
            delay: 20.0,
            keep: false,
            batch: false,
        },
    )
    .unwrap();
    assert_eq!(nokeep.len(), 1);
    assert_eq!(nokeep.bools("keep").unwrap(), vec![false]);
    assert_eq!(nokeep.bools("batch").unwrap(), vec![false]);

    let batched = select_group(
        &table,
        &GroupKey {
            delay: 20.0,
            keep: true,
            batch: true,
        },
    )
    .unwrap();
    assert_eq!(batched.numbers(HOSTS).unwrap(), vec![2.0, 8.0, 16.0]);
}

#[tokio::test]
async fn rerunning_gives_identical_panels() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            ("coins_a.csv", format!("{HEADER}\n10,8,1.0\n10,4,2.0\n")),
            ("coins_a_batch.csv", format!("{HEADER}\n10,8,3.0\n")),
            ("coins_b_nokeep.csv", format!("{HEADER}\n30,4,0.5\n")),
        ],
    );

    let mut runs: Vec<(Vec<Report>, Vec<PathBuf>)> = Vec::new();
    for _ in 0..2 {
        let out = tempdir().unwrap();
        let (table, _) = load_unified(dir.path(), &Settings::default())
            .await
            .unwrap();
        let renderer = Recording::default();
        let written = render_partitions(
            &layout(),
            &table,
            &renderer,
            out.path(),
            &Settings::default(),
        )
        .await
        .unwrap();
        runs.push((renderer.reports.into_inner().unwrap(), written));
    }

    let (first, first_paths) = &runs[0];
    let (second, second_paths) = &runs[1];
    // 2 delays x 2 keep values x 2 batch values
    assert_eq!(first.len(), 8);
    assert_eq!(first_paths.len(), second_paths.len());
    for (a, b) in first.iter().zip(second) {
        assert_eq!(a.key, b.key);
        assert_eq!(a.panels, b.panels);
    }
}
