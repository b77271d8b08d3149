//! Report emission: one JSON document per report, the Mermaid diagram, and
//! the optional full graph dump.

use anyhow::Context;
use oracle::Reporter;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Writes every report into `output`, creating the directory if needed.
pub fn write_reports(reporter: &Reporter, output: &Path, include_dump: bool) -> anyhow::Result<()> {
    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;

    write_json(
        &output.join("dead-symbols.json"),
        &reporter.collect_dead_symbols(),
    )?;
    write_json(
        &output.join("alive-symbols.json"),
        &reporter.collect_alive_symbols(),
    )?;
    write_json(
        &output.join("alive-by-test-symbols.json"),
        &reporter.collect_alive_by_test_symbols(),
    )?;
    write_json(
        &output.join("needlessly-public-symbols.json"),
        &reporter.collect_needlessly_public_symbols(),
    )?;
    write_json(
        &output.join("unreferenced-assemblies.json"),
        &reporter.collect_unreferenced_assemblies(),
    )?;
    write_json(
        &output.join("unanalyzed-assemblies.json"),
        &reporter.collect_unanalyzed_assemblies(),
    )?;
    write_json(
        &output.join("duplicate-assemblies.json"),
        &reporter.collect_duplicate_assemblies(),
    )?;
    write_json(
        &output.join("needless-internals-visible-to.json"),
        &reporter.collect_needless_internals_visible_to(),
    )?;
    write_json(
        &output.join("assembly-layer-cake.json"),
        &reporter.create_assembly_layer_cake(),
    )?;

    let diagram_path = output.join("dependency-diagram.mmd");
    fs::write(&diagram_path, reporter.create_dependency_diagram())
        .with_context(|| format!("writing {}", diagram_path.display()))?;

    if include_dump {
        let dump_path = output.join("graph-dump.txt");
        let file =
            File::create(&dump_path).with_context(|| format!("creating {}", dump_path.display()))?;
        let mut writer = BufWriter::new(file);
        reporter
            .dump(&mut writer)
            .with_context(|| format!("writing {}", dump_path.display()))?;
    }
    Ok(())
}
