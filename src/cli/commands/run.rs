//! `run`: classify a flow table and write the summaries

use crate::app::AppConfig;
use crate::cli::args::RunArgs;
use crate::config::{load_config_or_default, PipelineConfig};
use crate::flow::{BlockListFile, FlowSource, StatTable};
use crate::pipeline::{
    CsvPartitionWriter, ExecutionMode, NullSink, PartitionSink, Pipeline, PipelineOutput,
    RunReport,
};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info};

pub async fn run_pipeline(args: RunArgs, app: &AppConfig) -> Result<()> {
    let config = resolve_config(&args).await?;
    let source_path = config.require_source()?.clone();
    let blocks_path = config.require_membership_path()?.clone();

    // Membership first: an empty study area aborts before the flow table is opened.
    let selector = BlockListFile::new(&blocks_path, config.membership.column.as_str());
    let mut pipeline = Pipeline::from_config(&config, &selector)?;
    let study_area_blocks = pipeline.membership().len();
    println!(
        "✓ Study area: {} blocks from {}",
        study_area_blocks,
        blocks_path.display()
    );

    let source = FlowSource::open(&source_path, &config.columns, pipeline.normalizer())?;

    let mut sink: Box<dyn PartitionSink + Send> = if config.export_partitions {
        Box::new(CsvPartitionWriter::create(
            &config.output_dir,
            source.headers(),
        )?)
    } else {
        Box::new(NullSink)
    };

    let spinner = app.show_progress().then(create_spinner);
    if let Some(spinner) = &spinner {
        pipeline = pipeline.with_progress(spinner.clone());
    }

    let mode = if config.execution.parallel {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Sequential
    };
    debug!("Running in {} mode", mode);

    let result = match mode {
        ExecutionMode::Parallel => pipeline
            .run_parallel(source, sink.as_mut())
            .await
            .map(|_| ()),
        ExecutionMode::Sequential => pipeline.run_sequential(source, sink.as_mut()).map(|_| ()),
    };
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    result?;

    let output = pipeline.output()?;
    let written = output.write_tables(&config.output_dir, &config.columns.measure)?;
    let workers = match mode {
        ExecutionMode::Parallel => config.execution.workers,
        ExecutionMode::Sequential => 1,
    };
    let report = RunReport::new(
        output,
        Some(source_path.clone()),
        mode,
        workers,
        study_area_blocks,
    );
    let report_path = report.write(&config.output_dir)?;
    info!("Run report written to {}", report_path.display());

    print_summary(output, &config);
    println!(
        "✅ Wrote {} summary tables to {}",
        written.len(),
        config.output_dir.display()
    );
    if config.export_partitions {
        println!("✓ Partition tables exported");
    }
    Ok(())
}

/// File, then environment, then flags
async fn resolve_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = load_config_or_default(args.config.as_deref()).await?;
    config.merge_env_vars()?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} rows read {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn print_summary(output: &PipelineOutput, config: &PipelineConfig) {
    println!(
        "✓ Read {} rows: {} accepted, {} discarded, {} outside the study area",
        output.rows_read,
        output.records_accepted(),
        output.discards.total(),
        output.unclassified()
    );

    for table in StatTable::ALL {
        let summary = output.summary(table);
        println!(
            "  {:<11} {:<30} {:>8} keys  {:>12} {}",
            table.name(),
            table.layer_name(),
            summary.len(),
            summary.total(),
            config.columns.measure
        );
    }

    if !output.discards.is_empty() {
        println!("⚠️  Discarded rows by reason:");
        for (kind, count) in output.discards.iter() {
            println!("  {:<24} {}", kind, count);
        }
    }
}
