// src/cli.rs
use clap::Parser;
use std::path::PathBuf;

/// Mutation instrumentation for C and C++ sources.
///
/// Rewrites each input file in place so that mutants can be enabled at run
/// time through the linked runtime library, and writes a JSON manifest
/// describing every instrumented mutation.
#[derive(Debug, Parser)]
#[command(name = "graft", version, about = "Mutation instrumenter for C and C++")]
pub struct Cli {
    /// Source files to instrument (rewritten in place)
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// File into which mutation information is written as JSON
    #[arg(long, value_name = "PATH")]
    pub mutation_info_file: PathBuf,

    /// Disable redundancy pruning of mutant variants
    #[arg(long)]
    pub no_mutation_opts: bool,

    /// Track which mutant sites are reached instead of applying mutants
    #[arg(long)]
    pub only_track_mutant_coverage: bool,

    /// Dump each AST that is processed to standard error (debugging)
    #[arg(long)]
    pub dump_asts: bool,

    /// Build the mutation tree and manifest without rewriting any source
    #[arg(long)]
    pub mutant_pass: bool,

    /// JSON manifest restricting which mutations are instrumented
    #[arg(long, value_name = "PATH")]
    pub enabled_mutations_file: Option<PathBuf>,

    /// Compiler flags after `--`, accepted for build-system compatibility
    #[arg(last = true, value_name = "FLAGS")]
    pub compiler_flags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_invocation_parses() {
        let cli = Cli::try_parse_from(["graft", "a.cc", "--mutation-info-file", "out.json"])
            .expect("valid args");
        assert_eq!(cli.files.len(), 1);
        assert!(!cli.no_mutation_opts);
        assert!(!cli.mutant_pass);
    }

    #[test]
    fn test_manifest_path_is_required() {
        assert!(Cli::try_parse_from(["graft", "a.cc"]).is_err());
    }

    #[test]
    fn test_passthrough_flags_after_double_dash() {
        let cli = Cli::try_parse_from([
            "graft",
            "a.cc",
            "--mutation-info-file",
            "out.json",
            "--",
            "-I",
            "include",
            "-std=c++17",
        ])
        .expect("valid args");
        assert_eq!(cli.compiler_flags, vec!["-I", "include", "-std=c++17"]);
    }

    #[test]
    fn test_mode_flags() {
        let cli = Cli::try_parse_from([
            "graft",
            "a.cc",
            "b.cc",
            "--mutation-info-file",
            "out.json",
            "--no-mutation-opts",
            "--only-track-mutant-coverage",
            "--mutant-pass",
        ])
        .expect("valid args");
        assert_eq!(cli.files.len(), 2);
        assert!(cli.no_mutation_opts);
        assert!(cli.only_track_mutant_coverage);
        assert!(cli.mutant_pass);
    }
}
