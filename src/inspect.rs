use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use solstice_backup::{BackupFile, parse_region_path};

#[derive(Args)]
pub struct InspectArgs {
    /// Backup file (`<root>/<world>/<rx>_<rz>.bin`)
    path: PathBuf,
    /// Also print every sample's palette entry, one column per line
    #[arg(long)]
    samples: bool,
}

pub fn run(args: InspectArgs) -> Result<(), Box<dyn Error>> {
    let bytes = fs::read(&args.path)?;
    let file = BackupFile::decode(&bytes)?;
    let g = file.grid;

    match parse_region_path(&args.path) {
        Some((world, coord)) => println!("region     {world} {coord}"),
        None => println!("region     (unrecognised path)"),
    }
    println!("size       {} bytes", bytes.len());
    println!("grid       step_xz={} step_y={} y={}..{}", g.step_xz, g.step_y, g.min_y, g.max_y);
    println!(
        "samples    {} ({} columns x {} layers)",
        file.indices.len(),
        g.columns_per_axis() * g.columns_per_axis(),
        g.layers()
    );
    println!(
        "palette    {} entries, {} indices",
        file.palette.len(),
        if file.uses_byte_indices() { "u8" } else { "u16" }
    );
    let mut counts = vec![0usize; file.palette.len()];
    for &i in &file.indices {
        if let Some(c) = counts.get_mut(i as usize) {
            *c += 1;
        }
    }
    for (slot, (name, n)) in file.palette.iter().zip(&counts).enumerate() {
        println!("  [{slot:>3}] {name:<28} {n}");
    }

    if args.samples && g.layers() > 0 {
        for (col, chunk) in file.indices.chunks(g.layers()).enumerate() {
            let n = g.columns_per_axis();
            let step = usize::from(g.step_xz);
            let line: Vec<String> = chunk.iter().map(|i| i.to_string()).collect();
            println!("  x={:<2} z={:<2} {}", (col / n) * step, (col % n) * step, line.join(" "));
        }
    }
    Ok(())
}
