//! VCF file in, annotated CSV out

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use variant_annotator::annotator::{AnnotateError, AnnotationPipeline, PipelineConfig};
use variant_annotator::output::csv::CsvVariantWriter;
use variant_annotator::vcf::VcfReader;

use crate::support::FakeVep;

const VCF: &str = "\
##fileformat=VCFv4.1
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total read depth at the locus\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tvcf_sample
1\t931393\t.\tG\tT\t2.17\t.\tAF=0.0232;AO=95;DP=4124;RO=4029;TYPE=snp\tGT\t0/1
1\t935222\t.\tC\tA\t8237.4\t.\tAF=0.5;AO=1171;DP=2200;RO=1027;TYPE=snp\tGT\t0/1
1\t1267483\t.\tG\tA,T\t1.0\t.\tAF=0.3,0.1;AO=30,10;DP=100;RO=60;TYPE=snp,snp\tGT\t1/2
2\t1000\t.\tCTT\tC\t50\t.\tAF=0.5;AO=20;DP=40;RO=20;TYPE=del\tGT\t0/1
3\t2000\t.\tA\tATG\t50\t.\tAF=0.25;AO=10;DP=40;RO=30;TYPE=ins\tGT\t0/1
";

const HEADER: &str =
    "chrom,pos,ref,alt,depth,ref_reads,alt_reads,maf,type,alt_perc,hgvs,variant_type,gene,consequence";

async fn annotate_file(input: &Path, output: &Path, threads: usize, batch_size: usize) -> u64 {
    let service = Arc::new(FakeVep::new().with_latency(1, 10));
    let pipeline = AnnotationPipeline::new(PipelineConfig::new(threads, batch_size), service).unwrap();

    let reader = VcfReader::open(input).unwrap();
    let mut writer = CsvVariantWriter::new(output).unwrap();
    let summary = pipeline.run(reader, &mut writer).await.unwrap();
    writer.close().unwrap();
    summary.records_written
}

#[tokio::test]
async fn test_vcf_to_csv() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sample.vcf");
    let output = dir.path().join("annotated_variants.csv");
    std::fs::write(&input, VCF).unwrap();

    let written = annotate_file(&input, &output, 2, 2).await;
    assert_eq!(written, 6);

    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], HEADER);
    assert_eq!(
        lines[1],
        "1,931393,G,T,4124,4029,95,0.02,snp,2.3,1:g.931393G>T,sub,GENE931393,missense_variant"
    );
    // Multi-ALT record expands in ALT order
    assert!(lines[3].starts_with("1,1267483,G,A,100,60,30,0.3,snp,33.33,1:g.1267483G>A,sub,"));
    assert!(lines[4].starts_with("1,1267483,G,T,100,60,10,0.1,snp,14.29,1:g.1267483G>T,sub,"));
    assert!(lines[5].contains(",2:g.1001_1002del,del,"));
    assert!(lines[6].contains(",3:g.2000_2001insTG,ins,"));
    assert_eq!(lines.len(), 7);
}

#[tokio::test]
async fn test_gzip_input_matches_plain() {
    let dir = TempDir::new().unwrap();
    let plain = dir.path().join("sample.vcf");
    let gz = dir.path().join("sample.vcf.gz");
    std::fs::write(&plain, VCF).unwrap();

    let mut encoder = GzEncoder::new(std::fs::File::create(&gz).unwrap(), Compression::default());
    encoder.write_all(VCF.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let plain_out = dir.path().join("plain.csv");
    let gz_out = dir.path().join("gz.csv");
    annotate_file(&plain, &plain_out, 3, 1).await;
    annotate_file(&gz, &gz_out, 1, 4).await;

    assert_eq!(
        std::fs::read_to_string(&plain_out).unwrap(),
        std::fs::read_to_string(&gz_out).unwrap()
    );
}

#[tokio::test]
async fn test_malformed_record_fails_with_input_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.vcf");
    let output = dir.path().join("out.csv");
    let broken = format!("{VCF}4\tnot_a_position\t.\tA\tG\t50\t.\tAF=0.5;AO=1;DP=2;RO=1;TYPE=snp\n");
    std::fs::write(&input, broken).unwrap();

    let service = Arc::new(FakeVep::new());
    let pipeline = AnnotationPipeline::new(PipelineConfig::new(2, 2), service).unwrap();
    let reader = VcfReader::open(&input).unwrap();
    let mut writer = CsvVariantWriter::new(&output).unwrap();

    let result = pipeline.run(reader, &mut writer).await;
    writer.close().unwrap();

    match result {
        Err(AnnotateError::Input(e)) => assert!(e.to_string().contains("line 9")),
        other => panic!("expected input error, got {other:?}"),
    }
    // Six good variants fill batches 0-2 and are written before the error
    let rows = std::fs::read_to_string(&output).unwrap().lines().count();
    assert_eq!(rows, 7);
}
