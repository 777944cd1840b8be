use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use roadsense_windows::config::Args;
use roadsense_windows::dataset::DatasetLoader;
use roadsense_windows::output::{output_path, write_dataset_csv, write_manifest, DataSource, Manifest};
use roadsense_windows::synthetic::create_synthetic_data;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args
        .pipeline_config()
        .context("Invalid pipeline configuration")?;

    info!(
        "Window: {} samples ({:.2} s), step {} ({:.0}% overlap) at {} Hz",
        config.window.window_size,
        config.window.window_seconds(),
        config.window.step_size,
        config.window.overlap() * 100.0,
        config.window.sampling_rate
    );
    if config.filter.enabled {
        info!(
            "High-pass: order {}, cutoff {} Hz",
            config.filter.order, config.filter.cutoff_hz
        );
    } else {
        info!("High-pass: disabled");
    }

    let loader = DatasetLoader::new(config.clone())?.with_parallel(args.parallel);
    let (mut dataset, report) = loader.load_dir(&args.input_dir);

    for skipped in &report.skipped {
        warn!(
            "  skipped {} ({:?}): {}",
            skipped.path.display(),
            skipped.reason,
            skipped.message
        );
    }

    let source = if dataset.is_empty() {
        warn!(
            "No windows found in {}. Generating {} synthetic windows instead.",
            args.input_dir.display(),
            args.synthetic_samples
        );
        dataset = create_synthetic_data(args.synthetic_samples, &config, args.seed);
        DataSource::Synthetic
    } else {
        DataSource::Directory
    };

    let (n, w, c) = dataset.x.dim();
    info!("Dataset: X = ({}, {}, {}), y = ({},)", n, w, c, dataset.y.len());
    for (label, count) in dataset.class_counts() {
        let name = config.labels.name(label).unwrap_or("?");
        info!("  {} ({}): {} windows", name, label, count);
    }

    if let Some(prefix) = &args.output {
        write_dataset_csv(&output_path(prefix, "windows.csv"), &dataset)?;
        let manifest = Manifest::new(source, &config, &dataset, Some(report));
        write_manifest(&output_path(prefix, "manifest.json"), &manifest)?;
    }

    Ok(())
}
