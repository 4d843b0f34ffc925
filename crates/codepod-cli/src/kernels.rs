//! Kernels command: show which languages have an installed kernelspec.

use std::path::PathBuf;

use codepod_core::kernelspec::default_kernelspec_dir;
use codepod_core::{KernelSpecIndex, Language};

use crate::colors;

pub fn execute(kernelspec_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let Some(dir) = kernelspec_dir.or_else(default_kernelspec_dir) else {
        anyhow::bail!("Could not determine the Jupyter kernels directory; pass --kernelspec-dir");
    };
    let index = KernelSpecIndex::discover(&dir)?;

    println!(
        "{}Kernelspecs in {}{}",
        colors::BOLD,
        dir.display(),
        colors::RESET
    );

    for language in Language::ALL {
        match index.get(language) {
            Some(spec) => println!(
                "  {}✓{} {:<12} {} {}({}){}",
                colors::GREEN,
                colors::RESET,
                language,
                spec.display_name,
                colors::DIM,
                spec.resource_dir.display(),
                colors::RESET
            ),
            None => println!(
                "  {}-{} {:<12} {}not installed{}",
                colors::YELLOW,
                colors::RESET,
                language,
                colors::DIM,
                colors::RESET
            ),
        }
    }

    if index.is_empty() {
        println!("\nNo kernelspecs found.");
    }

    Ok(())
}
