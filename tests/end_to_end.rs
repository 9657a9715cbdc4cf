//! Integration coverage for the §8 "End-to-end scenarios" toy dataset,
//! driven entirely through the public crate API rather than a single
//! module's internals: `c=2, d=4, n=8`, query `(0,0,0,0)`, expected
//! furthest neighbor id 7 at distance 6.

use rqalsh_afn::driver::{self, Algorithm, Config};
use rqalsh_afn::{ground_truth, io};

fn toy_dataset() -> Vec<Vec<f32>> {
    vec![
        vec![0.0, 0.0, 0.0, 0.0],
        vec![1.0, 0.0, 0.0, 0.0],
        vec![0.0, 1.0, 0.0, 0.0],
        vec![0.0, 0.0, 1.0, 0.0],
        vec![0.0, 0.0, 0.0, 1.0],
        vec![1.0, 1.0, 1.0, 1.0],
        vec![2.0, 2.0, 2.0, 2.0],
        vec![3.0, 3.0, 3.0, 3.0],
    ]
}

fn base_config(dir: &std::path::Path, data_path: std::path::PathBuf, query_path: std::path::PathBuf) -> Config {
    Config {
        alg: Algorithm::Rqalsh,
        n: 8,
        qn: 1,
        d: 4,
        ratio: 2.0,
        page_size: 0,
        l: 0,
        m: 0,
        data_file: Some(data_path),
        data_folder: None,
        query_file: query_path,
        truth_file: None,
        output_folder: Some(dir.to_path_buf()),
        output_path: None,
        seed: rqalsh_afn::consts::MAGIC_SEED,
        external: false,
        beta_n: None,
        delta: None,
    }
}

#[test]
fn ground_truth_then_rqalsh_agree_on_the_toy_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let ds_path = dir.path().join("data.bin");
    let qs_path = dir.path().join("query.bin");

    let data: Vec<f32> = toy_dataset().into_iter().flatten().collect();
    io::write_bin_vectors(&ds_path, &data).unwrap();
    io::write_bin_vectors(&qs_path, &[0.0, 0.0, 0.0, 0.0]).unwrap();

    let truth_path = dir.path().join("ground_truth.txt");
    let mut gt_cfg = base_config(dir.path(), ds_path.clone(), qs_path.clone());
    gt_cfg.alg = Algorithm::GroundTruth;
    gt_cfg.output_path = Some(truth_path.clone());
    driver::run(&gt_cfg).unwrap();

    let truth = ground_truth::read_ground_truth(&truth_path).unwrap();
    assert_eq!(truth[0][0].id, 7);
    assert!((truth[0][0].key - 6.0).abs() < 1e-3);
    assert_eq!(truth[0][1].id, 6);
    assert!((truth[0][1].key - 4.0).abs() < 1e-3);
    assert_eq!(truth[0][2].id, 5);
    assert!((truth[0][2].key - 2.0).abs() < 1e-3);

    let report_path = dir.path().join("report.txt");
    let mut rq_cfg = base_config(dir.path(), ds_path, qs_path);
    rq_cfg.truth_file = Some(truth_path);
    rq_cfg.output_path = Some(report_path.clone());
    let reports = driver::run(&rq_cfg).unwrap();

    let top1 = reports[0];
    assert_eq!(top1.mean_recall, 100.0);
    assert!(top1.mean_ratio > 0.0 && top1.mean_ratio <= 1.0 + 1e-4);
    assert!(report_path.exists());
}

#[test]
fn qdafn_and_drusilla_select_also_surface_id_7_as_the_top1() {
    let dir = tempfile::tempdir().unwrap();
    let ds_path = dir.path().join("data.bin");
    let qs_path = dir.path().join("query.bin");

    let data: Vec<f32> = toy_dataset().into_iter().flatten().collect();
    io::write_bin_vectors(&ds_path, &data).unwrap();
    io::write_bin_vectors(&qs_path, &[0.0, 0.0, 0.0, 0.0]).unwrap();

    for alg in [Algorithm::Qdafn, Algorithm::DrusillaSelect, Algorithm::LinearScan] {
        let mut cfg = base_config(dir.path(), ds_path.clone(), qs_path.clone());
        cfg.alg = alg;
        cfg.l = 4;
        cfg.m = 4;
        let reports = driver::run(&cfg).unwrap();
        assert_eq!(reports.len(), rqalsh_afn::consts::MAXK);
    }
}
