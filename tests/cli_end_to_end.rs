//! End-to-end tests of the grit-peaks binary.

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

fn write_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn reads(chrom: &str, pos: u64, depth: usize) -> String {
    format!("{}\t{}\t{}\n", chrom, pos, pos + 1).repeat(depth)
}

fn genome_file() -> NamedTempFile {
    write_file("chr1\t1000\nchr2\t1000\n")
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_grit-peaks"))
        .args(args)
        .output()
        .expect("Failed to run grit-peaks")
}

fn data_lines(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.starts_with('#'))
        .map(String::from)
        .collect()
}

#[test]
fn test_poisson_layout() {
    let genome = genome_file();
    let case = write_file(&(reads("chr1", 100, 6) + &reads("chr1", 101, 6) + &reads("chr2", 5, 1)));

    let output = run(&[
        "poisson",
        "--case",
        case.path().to_str().unwrap(),
        "-g",
        genome.path().to_str().unwrap(),
        "-s",
        "3",
        "--local-window",
        "0",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("# Table Generated by Program CallPeakPoisson"));
    assert!(stdout.contains("# chr\tstart\tend\tid\tscore\taverage\tnormalized\n"));

    let lines = data_lines(&output.stdout);
    assert_eq!(lines.len(), 1, "got: {:?}", lines);
    let fields: Vec<&str> = lines[0].split('\t').collect();
    assert_eq!(&fields[..4], &["chr1", "100", "102", "Peak1"]);
    assert_eq!(fields[5], "6.0000");
    assert_eq!(fields.len(), 7);
}

#[test]
fn test_enrich_writes_output_file() {
    let genome = genome_file();
    let case = write_file(&reads("chr1", 200, 9));
    let control = write_file(&reads("chr2", 300, 2));
    let out = NamedTempFile::new().unwrap();
    let details = NamedTempFile::new().unwrap();

    let output = run(&[
        "enrich",
        "--case",
        case.path().to_str().unwrap(),
        "--control",
        control.path().to_str().unwrap(),
        "-g",
        genome.path().to_str().unwrap(),
        "-s",
        "3",
        "--prefix",
        "Enr",
        "-o",
        out.path().to_str().unwrap(),
        "-d",
        details.path().to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let text = std::fs::read(out.path()).unwrap();
    let lines = data_lines(&text);
    let detail_text = std::fs::read_to_string(details.path()).unwrap();
    let detail_lines: Vec<&str> = detail_text.lines().collect();
    assert_eq!(detail_lines.len(), 2);
    assert!(detail_lines[0].ends_with("\tcase_sum\tcontrol_sum"));
    assert!(detail_lines[1].starts_with("Enr1\tchr1\t200\t201\t1\t"));
    assert!(detail_lines[1].ends_with("\t9\t0"));
    assert_eq!(lines.len(), 1, "got: {:?}", lines);
    let fields: Vec<&str> = lines[0].split('\t').collect();
    assert_eq!(fields.len(), 8);
    assert_eq!(&fields[..4], &["chr1", "200", "201", "Enr1"]);
    assert_eq!(fields[6], "0.0000");
}

#[test]
fn test_diff_sharded_layout() {
    let genome = genome_file();
    let case_a = write_file(&(reads("chr1", 50, 9) + &reads("chr2", 70, 9)));
    let control_a = write_file(&reads("chr1", 900, 1));
    let case_b = write_file(&reads("chr2", 10, 1));
    let control_b = write_file(&reads("chr2", 20, 1));

    let output = run(&[
        "--threads",
        "2",
        "diff",
        "--case-a",
        case_a.path().to_str().unwrap(),
        "--control-a",
        control_a.path().to_str().unwrap(),
        "--case-b",
        case_b.path().to_str().unwrap(),
        "--control-b",
        control_b.path().to_str().unwrap(),
        "-g",
        genome.path().to_str().unwrap(),
        "-s",
        "4",
        "--paired-case-b",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# FoldChange always >= 1.0"));
    assert!(stdout.contains(&format!("# CASEA : {} (single)", case_a.path().display())));
    assert!(stdout.contains(&format!("# CASEB : {} (paired)", case_b.path().display())));
    let lines = data_lines(&output.stdout);
    assert_eq!(lines.len(), 2, "got: {:?}", lines);
    assert!(lines[0].starts_with("chr1\t50\t51\tPeak1\t"));
    assert!(lines[1].starts_with("chr2\t70\t71\tPeak2\t"));
    assert!(lines.iter().all(|l| l.split('\t').count() == 14));
}

#[test]
fn test_chrom_restricts_scan() {
    let genome = genome_file();
    let case = write_file(&(reads("chr1", 100, 8) + &reads("chr2", 100, 8)));

    let output = run(&[
        "poisson",
        "--case",
        case.path().to_str().unwrap(),
        "-g",
        genome.path().to_str().unwrap(),
        "-s",
        "3",
        "--chrom",
        "chr2",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let lines = data_lines(&output.stdout);
    assert_eq!(lines.len(), 1, "got: {:?}", lines);
    assert!(lines[0].starts_with("chr2\t100\t101\t"));
}

#[test]
fn test_unsorted_input_fails() {
    let genome = genome_file();
    let case = write_file("chr1\t500\t501\nchr1\t100\t101\n");

    let output = run(&[
        "poisson",
        "--case",
        case.path().to_str().unwrap(),
        "-g",
        genome.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr: {}", stderr);
    assert!(stderr.contains("not sorted"), "stderr: {}", stderr);
}

#[test]
fn test_unknown_chromosome_fails() {
    let genome = genome_file();
    let case = write_file("chrUn\t1\t2\n");

    let output = run(&[
        "poisson",
        "--case",
        case.path().to_str().unwrap(),
        "-g",
        genome.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("chrUn"), "stderr: {}", stderr);
}

#[test]
fn test_global_paired_flag_marks_every_track() {
    let genome = genome_file();
    let case = write_file(&reads("chr1", 200, 9));
    let control = write_file(&reads("chr1", 300, 1));

    let output = run(&[
        "enrich",
        "--case",
        case.path().to_str().unwrap(),
        "--control",
        control.path().to_str().unwrap(),
        "--paired-case",
        "--paired",
        "-g",
        genome.path().to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("# CASE : {} (paired)", case.path().display())));
    assert!(stdout.contains(&format!("# CONTROL : {} (paired)", control.path().display())));
}

#[test]
fn test_threaded_run_keeps_peaks_of_valid_chromosomes() {
    let genome = genome_file();
    let case = write_file(&(reads("chr1", 100, 8) + "chr2\t500\t501\nchr2\t10\t11\n"));

    let output = run(&[
        "--threads",
        "2",
        "poisson",
        "--case",
        case.path().to_str().unwrap(),
        "-g",
        genome.path().to_str().unwrap(),
        "-s",
        "3",
        "--local-window",
        "0",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not sorted"), "stderr: {}", stderr);

    let lines = data_lines(&output.stdout);
    assert_eq!(lines.len(), 1, "got: {:?}", lines);
    assert!(lines[0].starts_with("chr1\t100\t101\tPeak1\t"));
}
