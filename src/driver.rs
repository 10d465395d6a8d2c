// src/driver.rs
//! Orchestration: one pass per translation unit, manifest aggregation, and
//! the run-wide id counter.
//!
//! Each file is processed in the order given on the command line; callers
//! wanting reproducible ids across runs pass files in a fixed order. A
//! front-end failure skips the file and poisons the exit code without
//! aborting its siblings; the manifest is only written when every file
//! succeeded.

use crate::cli::Cli;
use crate::exit::GraftExit;
use crate::ids::IdAllocator;
use crate::lang::Lang;
use crate::manifest::{self, Manifest};
use crate::mutation::{self, Mutation, PlannedSite};
use crate::rewrite::{self, EmitMode, RewriteOptions};
use crate::visitor;
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tree_sitter::Parser;

/// Runs the whole tool. Argument validation has already happened in clap;
/// everything returned as `Err` here is reported once and exits 1.
///
/// # Errors
/// Returns an error for manifest I/O failures; per-file front-end errors
/// are reported on stderr and reflected in the exit code instead.
pub fn run(cli: &Cli) -> Result<GraftExit> {
    let enabled = match &cli.enabled_mutations_file {
        None => None,
        Some(path) => Some(Manifest::read(path)?.local_ids_by_file()),
    };

    let mut driver = Driver {
        optimise: !cli.no_mutation_opts,
        coverage_only: cli.only_track_mutant_coverage,
        dump_asts: cli.dump_asts,
        mutant_pass: cli.mutant_pass,
        enabled,
        alloc: IdAllocator::new(),
        manifest: Manifest::default(),
    };

    let mut failed = false;
    for path in &cli.files {
        if let Err(e) = driver.process_file(path) {
            eprintln!("{} {}: {e:#}", "Error:".red(), path.display());
            failed = true;
        }
    }
    if failed {
        return Ok(GraftExit::Error);
    }

    driver.manifest.write(&cli.mutation_info_file)?;
    Ok(GraftExit::Success)
}

struct Driver {
    optimise: bool,
    coverage_only: bool,
    dump_asts: bool,
    mutant_pass: bool,
    enabled: Option<HashMap<String, HashSet<i32>>>,
    alloc: IdAllocator,
    manifest: Manifest,
}

impl Driver {
    fn process_file(&mut self, path: &Path) -> Result<()> {
        let lang = Lang::from_path(path)
            .ok_or_else(|| anyhow!("unrecognised source file extension"))?;
        let source = std::fs::read_to_string(path)
            .with_context(|| "failed to read source file".to_string())?;

        let mut parser = Parser::new();
        parser
            .set_language(&lang.grammar())
            .context("failed to load grammar")?;
        let ast = parser
            .parse(&source, None)
            .ok_or_else(|| anyhow!("front-end failed to parse the file"))?;
        if self.dump_asts {
            eprintln!("{}:", path.display());
            eprintln!("{}", ast.root_node().to_sexp());
        }
        if ast.root_node().has_error() {
            return Err(anyhow!("front-end reported syntax errors"));
        }

        // Discovery and finalisation are pure: they produce the tree and
        // the plan; rewriting is a second stage that consumes the plan.
        let mut discovery = visitor::discover(&ast, &source, lang);
        discovery.tree.tidy_up();

        self.alloc.begin_file();
        let path_key = path.display().to_string();
        let enabled_for_file = self.enabled.as_ref().and_then(|m| m.get(&path_key));
        let plans = mutation::build_plan(
            &discovery.mutations,
            self.optimise,
            enabled_for_file,
            &mut self.alloc,
        );

        if !self.mutant_pass {
            self.rewrite_file(path, &source, lang, &discovery, &plans)?;
        }

        self.manifest.files.push(manifest::file_entry(
            &path_key,
            self.alloc.first_id_in_file(),
            &discovery.tree,
            &discovery.mutations,
            &plans,
        ));
        Ok(())
    }

    fn rewrite_file(
        &self,
        path: &Path,
        source: &str,
        lang: Lang,
        discovery: &visitor::DiscoveryResult,
        plans: &[Option<PlannedSite>],
    ) -> Result<()> {
        let opts = RewriteOptions {
            lang,
            optimise: self.optimise,
            mode: if self.coverage_only {
                EmitMode::Coverage
            } else {
                EmitMode::Mutants
            },
        };
        let rewritten = rewrite::rewrite(
            source,
            &discovery.mutations,
            plans,
            &self.alloc,
            discovery.first_decl_byte,
            opts,
        );
        if let Some(text) = rewritten {
            std::fs::write(path, text)
                .with_context(|| "failed to write instrumented source".to_string())?;
        }
        Ok(())
    }
}

/// Convenience wrapper for tests and library users: instruments a single
/// in-memory translation unit with default options.
///
/// # Errors
/// Returns an error when the source does not parse.
pub fn instrument_source(
    source: &str,
    lang: Lang,
    optimise: bool,
    mode: EmitMode,
) -> Result<(String, Vec<Mutation>, Vec<Option<PlannedSite>>)> {
    let mut parser = Parser::new();
    parser
        .set_language(&lang.grammar())
        .context("failed to load grammar")?;
    let ast = parser
        .parse(source, None)
        .ok_or_else(|| anyhow!("front-end failed to parse the source"))?;
    if ast.root_node().has_error() {
        return Err(anyhow!("front-end reported syntax errors"));
    }
    let mut discovery = visitor::discover(&ast, source, lang);
    discovery.tree.tidy_up();
    let mut alloc = IdAllocator::new();
    alloc.begin_file();
    let plans = mutation::build_plan(&discovery.mutations, optimise, None, &mut alloc);
    let opts = RewriteOptions {
        lang,
        optimise,
        mode,
    };
    let text = rewrite::rewrite(
        source,
        &discovery.mutations,
        &plans,
        &alloc,
        discovery.first_decl_byte,
        opts,
    )
    .unwrap_or_else(|| source.to_string());
    Ok((text, discovery.mutations, plans))
}
