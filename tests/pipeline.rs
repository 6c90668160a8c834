use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use flate2::{write::GzEncoder, Compression};

use latent_interpret::{
    load_sources, run_overrepresentation, write_manifest, write_records, Direction, Distribution,
    GeneDictionary, GeneSetSource, GseaConfig, Namespace, Pipeline, PipelineConfig, Translator,
    UnitStatus,
};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn config(z_dim: usize) -> PipelineConfig {
    PipelineConfig::builder()
        .dataset("target")
        .z_dim(z_dim)
        .algorithms(vec!["pca".to_string()])
        .gsea(GseaConfig::builder().permutations(20).seed(3).build())
        .build()
}

#[test]
fn two_genes_two_features_end_to_end() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "model_5_weight_matrix.tsv",
        "\tpca_0\tpca_1\nA\t1.0\t-0.5\nB\t-2.0\t0.0\n",
    );
    write(dir.path(), "sets.gmt", "ONLY_A\tna\tA\n");

    let gene_sets = load_sources(
        &[GeneSetSource::from(
            dir.path().join("sets.gmt").to_str().unwrap(),
        )],
        dir.path(),
    )
    .unwrap();
    let config = config(2);
    let output = Pipeline::new(&config, &gene_sets, None)
        .run_dir(dir.path())
        .unwrap();

    let units = output
        .records
        .iter()
        .map(|r| {
            (
                r.provenance.current_z,
                r.provenance.distribution,
                r.provenance.direction,
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        units,
        vec![
            (0, Distribution::Full, Direction::Both),
            (0, Distribution::FullSquared, Direction::Both),
            (0, Distribution::PosNeg, Direction::Positive),
            (1, Distribution::Full, Direction::Both),
            (1, Distribution::FullSquared, Direction::Both),
            (1, Distribution::PosNeg, Direction::Negative),
        ]
    );
    for record in &output.records {
        assert_eq!(record.result.term, "ONLY_A");
        assert_eq!(record.result.overlap, 1);
        assert_eq!(record.provenance.seed, 5);
        assert_eq!(record.provenance.full_z, 2);
        assert!(record.result.pvalue >= 0.0 && record.result.pvalue <= 1.0);
    }

    // two genes flag nothing as high weight; pca_1 has no positive weight
    assert_eq!(output.manifest.len(), 5);
    assert!(output
        .manifest
        .iter()
        .all(|entry| entry.status == UnitStatus::Skipped));
    let high_weight = output
        .manifest
        .iter()
        .filter(|entry| {
            entry
                .unit
                .as_ref()
                .is_some_and(|u| u.distribution == Distribution::PosNegHighWeight)
        })
        .count();
    assert_eq!(high_weight, 4);

    let mut buffer = Vec::new();
    write_records(&mut buffer, &output.records).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    assert_eq!(text.lines().count(), 7);
    assert!(text.lines().nth(1).unwrap().starts_with("ONLY_A\t"));
}

#[test]
fn gzipped_weight_files_are_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model_7_weight_matrix.tsv.gz");
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    encoder.write_all(b"\tpca_0\nA\t1.0\nB\t-1.0\n").unwrap();
    encoder.finish().unwrap();
    write(dir.path(), "sets.gmt", "ONLY_A\tna\tA\n");

    let gene_sets = load_sources(
        &[GeneSetSource::Gmt(dir.path().join("sets.gmt"))],
        dir.path(),
    )
    .unwrap();
    let config = PipelineConfig::builder()
        .dataset("target")
        .z_dim(1)
        .algorithms(vec!["pca".to_string()])
        .distributions(vec![Distribution::Full])
        .build();
    let output = Pipeline::new(&config, &gene_sets, None)
        .run_dir(dir.path())
        .unwrap();

    assert!(output.manifest.is_empty());
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].provenance.seed, 7);
    assert_eq!(output.records[0].result.term, "ONLY_A");
}

#[test]
fn broken_files_are_recorded_and_others_continue() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "model_1_weight_matrix.tsv",
        "\tpca_0\nA\t2.0\nB\t1.0\nC\t-1.0\n",
    );
    write(
        dir.path(),
        "model_2_weight_matrix.tsv",
        "\tpca_0\nA\tnot_a_number\n",
    );
    write(dir.path(), "model_x_weight_matrix.tsv", "\tpca_0\nA\t1.0\n");
    write(dir.path(), "sets.gmt", "AB\tna\tA\tB\n");

    let gene_sets = load_sources(
        &[GeneSetSource::Gmt(dir.path().join("sets.gmt"))],
        dir.path(),
    )
    .unwrap();
    let config = PipelineConfig::builder()
        .dataset("target")
        .z_dim(1)
        .algorithms(vec!["pca".to_string()])
        .distributions(vec![Distribution::Full])
        .build();
    let output = Pipeline::new(&config, &gene_sets, None)
        .run_dir(dir.path())
        .unwrap();

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].provenance.seed, 1);

    let failed = output
        .manifest
        .iter()
        .map(|entry| (entry.seed, entry.status, entry.unit.is_none()))
        .collect::<Vec<_>>();
    assert_eq!(
        failed,
        vec![
            (Some(2), UnitStatus::Failed, true),
            (None, UnitStatus::Failed, true),
        ]
    );

    let mut buffer = Vec::new();
    write_manifest(&mut buffer, &output.manifest).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn translated_matrix_matches_symbol_gene_sets() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "genes.tsv",
        "entrez_gene_id\tsymbol\tgene_type\tsynonyms\n\
         7157\tTP53\tprotein-coding\tP53|LFS1\n\
         672\tBRCA1\tprotein-coding\t\n\
         675\tBRCA2\tprotein-coding\tFANCD1\n\
         100\tLNC1\tncRNA\t\n",
    );
    write(
        dir.path(),
        "updater.tsv",
        "old_entrez_gene_id\tnew_entrez_gene_id\n999\t675\n",
    );
    write(
        dir.path(),
        "run_9_weight_matrix.tsv",
        "\tpca_0\n7157\t3.0\n672\t2.0\n999\t-1.0\n100\t0.5\n",
    );
    write(dir.path(), "KEGG_TEST.gmt", "P53_PATHWAY\tna\tTP53\tBRCA1\n");

    let genes_path = dir.path().join("genes.tsv");
    let updater_path = dir.path().join("updater.tsv");
    let translator = Translator::with_loader(move || {
        GeneDictionary::load(genes_path.clone(), Some(updater_path.clone()))
    });
    let gene_sets = load_sources(&[GeneSetSource::from("KEGG_TEST")], dir.path()).unwrap();
    let config = PipelineConfig::builder()
        .dataset("target")
        .z_dim(1)
        .algorithms(vec!["pca".to_string()])
        .distributions(vec![Distribution::Full])
        .translation((Namespace::EntrezGeneId, Namespace::Symbol))
        .build();

    let output = Pipeline::new(&config, &gene_sets, Some(&translator))
        .run(&[dir.path().join("run_9_weight_matrix.tsv")]);
    assert!(translator.is_loaded());
    assert!(output.manifest.is_empty());
    assert_eq!(output.records.len(), 1);
    let record = &output.records[0];
    assert_eq!(record.result.term, "P53_PATHWAY");
    assert_eq!(record.result.overlap, 2);
    assert!(record.result.es > 0.0);
}

#[test]
fn translation_without_dictionary_fails_the_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "run_4_weight_matrix.tsv", "\tpca_0\n7157\t3.0\n");
    let gene_sets = load_sources(&[], dir.path()).unwrap();
    let config = PipelineConfig::builder()
        .dataset("target")
        .z_dim(1)
        .algorithms(vec!["pca".to_string()])
        .translation((Namespace::EntrezGeneId, Namespace::Symbol))
        .build();
    let output = Pipeline::new(&config, &gene_sets, None)
        .run(&[dir.path().join("run_4_weight_matrix.tsv")]);
    assert!(output.records.is_empty());
    assert_eq!(output.manifest.len(), 1);
    assert_eq!(output.manifest[0].seed, Some(4));
    assert_eq!(output.manifest[0].status, UnitStatus::Failed);
}

#[test]
fn overrepresentation_from_gmt() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "sets.gmt", "AB\tna\tA\tB\nCD\tna\tC\tD\n");
    let gene_sets = load_sources(
        &[GeneSetSource::Gmt(dir.path().join("sets.gmt"))],
        dir.path(),
    )
    .unwrap();

    let candidates = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    let background = ["A", "B", "C", "D", "E"]
        .iter()
        .map(|g| g.to_string())
        .collect::<Vec<_>>();
    let results = run_overrepresentation(&candidates, &gene_sets, &background).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].gene_set, "AB");
    assert!((results[0].odds_ratio - 7.5).abs() < 1e-9);
    assert!((results[0].pval - 80.0 / 330.0).abs() < 1e-9);
    assert_eq!(results[1].overlap, 1);
}
